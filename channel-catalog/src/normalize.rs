//! Backend service record shapes and their conversion to [`CanonicalService`].
//!
//! Two shapes are supported:
//!
//! - Mirakurun `GET /api/services` objects ([`MirakurunService`])
//! - EDCB `ChSet5.txt` lines ([`ChSet5Service`])

use serde::Deserialize;

use crate::error::NormalizeError;
use crate::text::format_string;
use crate::types::CanonicalService;

/// One element of Mirakurun's `/api/services` response.
///
/// Every field is optional so a single odd record cannot fail the whole
/// response; [`MirakurunService::normalize`] decides what is required.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MirakurunService {
    #[serde(rename = "type")]
    pub service_type: Option<i64>,
    pub onid: Option<i64>,
    pub sid: Option<i64>,
    pub network_id: Option<i64>,
    pub service_id: Option<i64>,
    pub remote_control_key_id: Option<i64>,
    pub name: Option<String>,
}

impl MirakurunService {
    /// Convert to the canonical record.
    ///
    /// `networkId`/`serviceId` win over `onid`/`sid` when both are present.
    pub fn normalize(&self) -> Result<CanonicalService, NormalizeError> {
        let network_id = self
            .network_id
            .or(self.onid)
            .ok_or(NormalizeError::MissingField("networkId"))?;
        let service_id = self
            .service_id
            .or(self.sid)
            .ok_or(NormalizeError::MissingField("serviceId"))?;
        let service_type = self
            .service_type
            .ok_or(NormalizeError::MissingField("type"))?;
        let name = self
            .name
            .as_deref()
            .ok_or(NormalizeError::MissingField("name"))?;

        let remocon_id = match self.remote_control_key_id {
            Some(v) => Some(
                i32::try_from(v)
                    .map_err(|_| NormalizeError::OutOfRange { field: "remoteControlKeyId", value: v })?,
            ),
            None => None,
        };

        Ok(CanonicalService {
            network_id: narrow_u16("networkId", network_id)?,
            service_id: narrow_u16("serviceId", service_id)?,
            transport_stream_id: None,
            remocon_id,
            service_type: u8::try_from(service_type)
                .map_err(|_| NormalizeError::OutOfRange { field: "type", value: service_type })?,
            name: format_string(name),
        })
    }
}

fn narrow_u16(field: &'static str, value: i64) -> Result<u16, NormalizeError> {
    u16::try_from(value).map_err(|_| NormalizeError::OutOfRange { field, value })
}

/// One line of EDCB's `ChSet5.txt`.
///
/// Column order:
/// `service_name \t network_name \t onid \t tsid \t sid \t service_type \t partial \t epg_cap \t search`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChSet5Service {
    pub service_name: String,
    pub network_name: String,
    pub onid: u16,
    pub tsid: u16,
    pub sid: u16,
    pub service_type: u8,
    pub partial_flag: bool,
    pub epg_cap_flag: bool,
    pub search_flag: bool,
}

impl ChSet5Service {
    /// Convert to the canonical record. ChSet5 never carries a remote control key.
    pub fn to_canonical(&self) -> CanonicalService {
        CanonicalService {
            network_id: self.onid,
            service_id: self.sid,
            transport_stream_id: Some(self.tsid),
            remocon_id: None,
            service_type: self.service_type,
            name: format_string(&self.service_name),
        }
    }
}

/// Decode the raw `ChSet5.txt` bytes.
///
/// Recent EDCB builds write UTF-8 (optionally with BOM); older ones write
/// Shift_JIS (CP932).
pub fn decode_chset5(bytes: &[u8]) -> String {
    if let Some(rest) = bytes.strip_prefix(&[0xEF, 0xBB, 0xBF]) {
        return String::from_utf8_lossy(rest).into_owned();
    }
    match std::str::from_utf8(bytes) {
        Ok(text) => text.to_string(),
        Err(_) => {
            let (text, _, _) = encoding_rs::SHIFT_JIS.decode(bytes);
            text.into_owned()
        }
    }
}

/// Parse the decoded `ChSet5.txt` contents.
///
/// Blank lines are skipped. Every other line yields either a service or the
/// reason it could not be read, so callers can log and move on.
pub fn parse_chset5(text: &str) -> Vec<Result<ChSet5Service, NormalizeError>> {
    text.lines()
        .enumerate()
        .filter(|(_, line)| !line.trim().is_empty())
        .map(|(index, line)| parse_chset5_line(index + 1, line))
        .collect()
}

fn parse_chset5_line(line_no: usize, line: &str) -> Result<ChSet5Service, NormalizeError> {
    let columns: Vec<&str> = line.trim_end_matches('\r').split('\t').collect();
    if columns.len() < 6 {
        return Err(NormalizeError::MalformedLine {
            line: line_no,
            reason: format!("expected at least 6 columns, got {}", columns.len()),
        });
    }

    let number = |index: usize, name: &str| -> Result<i64, NormalizeError> {
        columns[index].trim().parse::<i64>().map_err(|e| NormalizeError::MalformedLine {
            line: line_no,
            reason: format!("{}: {}", name, e),
        })
    };
    let flag = |index: usize| columns.get(index).map(|v| v.trim() == "1").unwrap_or(false);

    let service_type = number(5, "service_type")?;

    Ok(ChSet5Service {
        service_name: columns[0].to_string(),
        network_name: columns[1].to_string(),
        onid: narrow_u16("onid", number(2, "onid")?)?,
        tsid: narrow_u16("tsid", number(3, "tsid")?)?,
        sid: narrow_u16("sid", number(4, "sid")?)?,
        service_type: u8::try_from(service_type)
            .map_err(|_| NormalizeError::OutOfRange { field: "service_type", value: service_type })?,
        partial_flag: flag(6),
        epg_cap_flag: flag(7),
        search_flag: flag(8),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mirakurun(json: &str) -> MirakurunService {
        serde_json::from_str(json).unwrap()
    }

    #[test]
    fn test_mirakurun_normalize() {
        let service = mirakurun(
            r#"{"id":3273601024,"serviceId":1024,"networkId":32736,"name":"ＮＨＫ総合１・東京",
                "type":1,"remoteControlKeyId":1,"onid":32736,"sid":1024}"#,
        );
        let canonical = service.normalize().unwrap();
        assert_eq!(canonical.network_id, 32736);
        assert_eq!(canonical.service_id, 1024);
        assert_eq!(canonical.remocon_id, Some(1));
        assert_eq!(canonical.transport_stream_id, None);
        assert_eq!(canonical.service_type, 1);
        assert_eq!(canonical.name, "NHK総合1・東京");
    }

    #[test]
    fn test_mirakurun_without_remote_control_key() {
        let service = mirakurun(r#"{"onid":4,"sid":101,"type":1,"name":"NHK BS1"}"#);
        let canonical = service.normalize().unwrap();
        assert_eq!(canonical.network_id, 4);
        assert_eq!(canonical.service_id, 101);
        assert_eq!(canonical.remocon_id, None);
    }

    #[test]
    fn test_mirakurun_missing_fields() {
        let service = mirakurun(r#"{"networkId":4,"type":1,"name":"x"}"#);
        assert_eq!(service.normalize(), Err(NormalizeError::MissingField("serviceId")));

        let service = mirakurun(r#"{"networkId":4,"serviceId":101,"name":"x"}"#);
        assert_eq!(service.normalize(), Err(NormalizeError::MissingField("type")));
    }

    #[test]
    fn test_mirakurun_out_of_range() {
        let service = mirakurun(r#"{"networkId":70000,"serviceId":101,"type":1,"name":"x"}"#);
        assert_eq!(
            service.normalize(),
            Err(NormalizeError::OutOfRange { field: "networkId", value: 70000 })
        );
    }

    #[test]
    fn test_parse_chset5() {
        let text = "ＮＨＫ総合１・東京\tＮＨＫ総合\t32736\t32736\t1024\t1\t0\t1\t1\r\n\
                    \r\n\
                    broken line\r\n\
                    ＢＳ朝日１\tＢＳデジタル\t4\t16400\t151\t1\t0\t1\t1\r\n";
        let parsed = parse_chset5(text);
        assert_eq!(parsed.len(), 3);

        let first = parsed[0].as_ref().unwrap();
        assert_eq!(first.onid, 32736);
        assert_eq!(first.sid, 1024);
        assert!(first.epg_cap_flag);
        assert!(!first.partial_flag);

        assert!(matches!(parsed[1], Err(NormalizeError::MalformedLine { line: 3, .. })));

        let canonical = parsed[2].as_ref().unwrap().to_canonical();
        assert_eq!(canonical.network_id, 4);
        assert_eq!(canonical.transport_stream_id, Some(16400));
        assert_eq!(canonical.remocon_id, None);
        assert_eq!(canonical.name, "BS朝日1");
    }

    #[test]
    fn test_parse_chset5_bad_number() {
        let parsed = parse_chset5("name\tnet\tabc\t1\t1\t1\n");
        assert!(matches!(parsed[0], Err(NormalizeError::MalformedLine { line: 1, .. })));
    }

    #[test]
    fn test_decode_chset5_utf8_bom() {
        let mut bytes = vec![0xEF, 0xBB, 0xBF];
        bytes.extend_from_slice("テスト\t".as_bytes());
        assert_eq!(decode_chset5(&bytes), "テスト\t");
    }

    #[test]
    fn test_decode_chset5_shift_jis() {
        let (encoded, _, _) = encoding_rs::SHIFT_JIS.encode("ＮＨＫ総合\t32736");
        assert_eq!(decode_chset5(&encoded), "ＮＨＫ総合\t32736");
    }
}
