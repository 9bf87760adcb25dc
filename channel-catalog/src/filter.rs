//! Exclusion rules applied to canonical services before numbering.

use crate::network_type::classify_network_id;
use crate::numbering::NumberingTables;
use crate::types::{CanonicalService, ChannelType, SERVICE_TYPE_DIGITAL_AUDIO, WATCHABLE_SERVICE_TYPES};

/// Name prefix used by placeholder services on CATV and SKY.
pub const TEST_CHANNEL_PREFIX: &str = "試験チャンネル";

/// Service ID range STARDIGIO audio channels are broadcast on.
pub const STARDIGIO_SERVICE_IDS: std::ops::RangeInclusive<u16> = 400..=499;

/// Why a service was left out of the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Rejection {
    /// One-seg, data broadcasting, engineering services, ...
    UnsupportedServiceType(u8),
    /// The network ID is not one of the recognized families.
    UnknownNetwork(u16),
    /// BS service that has ended but may still linger in a backend scan.
    DefunctBsService(u16),
    /// STARDIGIO service outside the audio channel range.
    StardigioOutOfRange(u16),
    /// Name starts with [`TEST_CHANNEL_PREFIX`].
    TestChannel,
}

/// A service that passed every exclusion rule.
///
/// Only [`accept`] creates these, so `channel_type` is never
/// [`ChannelType::OTHER`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Candidate {
    pub service: CanonicalService,
    pub channel_type: ChannelType,
    pub is_radiochannel: bool,
}

/// Run the exclusion rules in order; the first failing rule wins.
pub fn accept(service: CanonicalService, tables: &NumberingTables) -> Result<Candidate, Rejection> {
    if !WATCHABLE_SERVICE_TYPES.contains(&service.service_type) {
        return Err(Rejection::UnsupportedServiceType(service.service_type));
    }

    let channel_type = classify_network_id(service.network_id);
    if channel_type == ChannelType::OTHER {
        return Err(Rejection::UnknownNetwork(service.network_id));
    }

    if channel_type == ChannelType::BS && tables.bs_defunct_service_ids.contains(&service.service_id) {
        return Err(Rejection::DefunctBsService(service.service_id));
    }

    if channel_type == ChannelType::STARDIGIO && !STARDIGIO_SERVICE_IDS.contains(&service.service_id) {
        return Err(Rejection::StardigioOutOfRange(service.service_id));
    }

    if service.name.starts_with(TEST_CHANNEL_PREFIX) {
        return Err(Rejection::TestChannel);
    }

    let is_radiochannel = service.service_type == SERVICE_TYPE_DIGITAL_AUDIO;
    Ok(Candidate {
        service,
        channel_type,
        is_radiochannel,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(network_id: u16, service_id: u16, service_type: u8, name: &str) -> CanonicalService {
        CanonicalService {
            network_id,
            service_id,
            transport_stream_id: None,
            remocon_id: None,
            service_type,
            name: name.to_string(),
        }
    }

    #[test]
    fn test_accepts_terrestrial_tv() {
        let candidate = accept(service(0x7FE8, 1024, 0x01, "NHK総合1"), &NumberingTables::default()).unwrap();
        assert_eq!(candidate.channel_type, ChannelType::GR);
        assert!(!candidate.is_radiochannel);
    }

    #[test]
    fn test_radio_flag() {
        let candidate = accept(service(1, 440, 0x02, "スターデジオ"), &NumberingTables::default()).unwrap();
        assert_eq!(candidate.channel_type, ChannelType::STARDIGIO);
        assert!(candidate.is_radiochannel);

        // Temporary audio services are accepted but not flagged as radio.
        let candidate = accept(service(4, 531, 0xA2, "放送大学ラジオ"), &NumberingTables::default()).unwrap();
        assert!(!candidate.is_radiochannel);
    }

    #[test]
    fn test_rejects_service_types() {
        let tables = NumberingTables::default();
        assert_eq!(
            accept(service(0x7FE8, 1408, 0xC0, "NHK携帯"), &tables),
            Err(Rejection::UnsupportedServiceType(0xC0))
        );
        assert_eq!(
            accept(service(4, 700, 0xA4, "engineering"), &tables),
            Err(Rejection::UnsupportedServiceType(0xA4))
        );
        for service_type in [0x01, 0x02, 0xA1, 0xA2, 0xAD] {
            assert!(accept(service(4, 101, service_type, "NHK BS"), &tables).is_ok());
        }
    }

    #[test]
    fn test_rejects_unknown_network() {
        assert_eq!(
            accept(service(0x000B, 101, 0xAD, "NHK BS4K"), &NumberingTables::default()),
            Err(Rejection::UnknownNetwork(0x000B))
        );
    }

    #[test]
    fn test_rejects_defunct_bs() {
        let tables = NumberingTables::default();
        for sid in [238, 241, 258] {
            assert_eq!(
                accept(service(4, sid, 0x01, "ended"), &tables),
                Err(Rejection::DefunctBsService(sid))
            );
        }
        // Same service IDs on CS are fine.
        assert!(accept(service(6, 238, 0x01, "cs"), &tables).is_ok());
    }

    #[test]
    fn test_stardigio_range() {
        let tables = NumberingTables::default();
        assert!(accept(service(1, 400, 0x02, "a"), &tables).is_ok());
        assert!(accept(service(1, 499, 0x02, "a"), &tables).is_ok());
        assert_eq!(
            accept(service(1, 399, 0x02, "a"), &tables),
            Err(Rejection::StardigioOutOfRange(399))
        );
        assert_eq!(
            accept(service(1, 500, 0x02, "a"), &tables),
            Err(Rejection::StardigioOutOfRange(500))
        );
    }

    #[test]
    fn test_rejects_test_channel() {
        let tables = NumberingTables::default();
        assert_eq!(
            accept(service(0xFFFE, 300, 0x01, "試験チャンネルX"), &tables),
            Err(Rejection::TestChannel)
        );
        assert!(accept(service(0xFFFE, 300, 0x01, "ケーブル試験チャンネル"), &tables).is_ok());
    }
}
