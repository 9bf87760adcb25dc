//! Channel number, display channel ID and sub-channel resolution.
//!
//! Numbering walks the accepted services in order and keeps two running
//! counters for the pass in a [`NumberingState`]:
//!
//! - services seen so far per network ID (terrestrial `xx1`, `xx2`, ... suffix)
//! - networks seen so far per remote control key (terrestrial `-1`, `-2` branch)
//!
//! Because of the counters the result depends on input order. EDCB input must
//! go through [`sort_by_network_order`] first.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

use crate::filter::{self, Candidate, Rejection};
use crate::types::{CanonicalService, ChannelType, EpgService, ResolvedChannel, UNKNOWN_REMOCON_ID};

/// Bits of a terrestrial service ID holding the service type (2bit) and
/// service number (3bit).
///
/// ARIB TR-B14 第五分冊 第七編 9.1 lays the 16bit ID out as
/// `(地域種別:6)(県複フラグ:1)(サービス種別:2)(地域事業者識別:4)(サービス番号:3)`.
/// Both fields are zero only for the primary TV service.
pub const GR_SUBCHANNEL_MASK: u16 = 0x0187;

/// Inclusive service ID range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ServiceIdRange {
    pub first: u16,
    pub last: u16,
}

impl ServiceIdRange {
    pub const fn new(first: u16, last: u16) -> Self {
        Self { first, last }
    }

    pub const fn single(id: u16) -> Self {
        Self { first: id, last: id }
    }

    pub fn contains(&self, service_id: u16) -> bool {
        (self.first..=self.last).contains(&service_id)
    }
}

/// Remote control key assigned to a BS service ID range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoconOverride {
    pub first: u16,
    pub last: u16,
    pub remocon_id: i32,
}

impl RemoconOverride {
    pub const fn new(first: u16, last: u16, remocon_id: i32) -> Self {
        Self { first, last, remocon_id }
    }
}

/// Hand-maintained BS allocation tables.
///
/// Backends cannot tell which BS services are sub-channels or which
/// remote control button they sit on, so these follow the current
/// allocation and can be replaced from configuration when it changes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct NumberingTables {
    /// FOXスポーツ＆エンターテインメント, BSスカパー!, Dlife
    pub bs_defunct_service_ids: Vec<u16>,
    pub bs_remocon_overrides: Vec<RemoconOverride>,
    pub bs_subchannels: Vec<ServiceIdRange>,
}

impl Default for NumberingTables {
    fn default() -> Self {
        Self {
            bs_defunct_service_ids: vec![238, 241, 258],
            bs_remocon_overrides: vec![
                RemoconOverride::new(101, 102, 1),
                RemoconOverride::new(103, 104, 3),
                RemoconOverride::new(141, 149, 4),
                RemoconOverride::new(151, 159, 5),
                RemoconOverride::new(161, 169, 6),
                RemoconOverride::new(171, 179, 7),
                RemoconOverride::new(181, 189, 8),
                RemoconOverride::new(191, 193, 9),
                RemoconOverride::new(200, 202, 10),
                RemoconOverride::new(211, 211, 11),
                RemoconOverride::new(222, 222, 12),
            ],
            bs_subchannels: vec![
                ServiceIdRange::single(102),
                ServiceIdRange::single(104),
                ServiceIdRange::new(142, 149),
                ServiceIdRange::new(152, 159),
                ServiceIdRange::new(162, 169),
                ServiceIdRange::new(172, 179),
                ServiceIdRange::new(182, 189),
                ServiceIdRange::single(232),
                ServiceIdRange::single(233),
            ],
        }
    }
}

impl NumberingTables {
    /// Remote control key for a BS service, if it falls in an override range.
    pub fn bs_remocon_id(&self, service_id: u16) -> Option<i32> {
        self.bs_remocon_overrides
            .iter()
            .find(|o| (o.first..=o.last).contains(&service_id))
            .map(|o| o.remocon_id)
    }

    pub fn is_bs_subchannel(&self, service_id: u16) -> bool {
        self.bs_subchannels.iter().any(|r| r.contains(service_id))
    }
}

/// Whether a service is a sub-channel. Depends only on type and service ID.
///
/// # Example
/// ```
/// use channel_catalog::numbering::{is_subchannel, NumberingTables};
/// use channel_catalog::types::ChannelType;
///
/// let tables = NumberingTables::default();
/// assert!(!is_subchannel(ChannelType::GR, 1024, &tables));
/// assert!(is_subchannel(ChannelType::GR, 1025, &tables));
/// assert!(is_subchannel(ChannelType::BS, 102, &tables));
/// assert!(!is_subchannel(ChannelType::CS, 102, &tables));
/// ```
pub fn is_subchannel(channel_type: ChannelType, service_id: u16, tables: &NumberingTables) -> bool {
    match channel_type {
        ChannelType::GR => service_id & GR_SUBCHANNEL_MASK != 0,
        ChannelType::BS => tables.is_bs_subchannel(service_id),
        _ => false,
    }
}

/// Where terrestrial remote control keys come from when the service list
/// itself does not carry them.
#[derive(Debug, Clone, Copy)]
pub enum RemoconFallback<'a> {
    /// Missing keys stay [`UNKNOWN_REMOCON_ID`] (Mirakurun).
    Placeholder,
    /// EDCB: schedule-derived service list, then the previously persisted
    /// value, then any other service on the same network.
    Epg {
        epg_services: &'a [EpgService],
        previous: &'a HashMap<String, i32>,
    },
}

impl RemoconFallback<'_> {
    fn resolve(&self, service: &CanonicalService) -> i32 {
        if let Some(remocon_id) = service.remocon_id {
            return remocon_id;
        }

        let (epg_services, previous) = match self {
            RemoconFallback::Placeholder => return UNKNOWN_REMOCON_ID,
            RemoconFallback::Epg { epg_services, previous } => (*epg_services, *previous),
        };

        if let Some(epg) = epg_services
            .iter()
            .find(|e| e.network_id == service.network_id && e.service_id == service.service_id)
        {
            return epg.remote_control_key_id;
        }

        let backup = previous
            .get(&service.channel_id())
            .copied()
            .unwrap_or(UNKNOWN_REMOCON_ID);
        if backup > 0 {
            return backup;
        }

        // Temporary terrestrial services rarely have schedule data of their
        // own; borrow the key of a sibling service on the same network.
        epg_services
            .iter()
            .find(|e| e.network_id == service.network_id && e.service_id != service.service_id)
            .map(|e| e.remote_control_key_id)
            .unwrap_or(backup)
    }
}

/// Running counters for one numbering pass.
#[derive(Debug, Clone, Default)]
pub struct NumberingState {
    same_network_count: HashMap<u16, u32>,
    same_remocon_count: HashMap<i32, i32>,
}

impl NumberingState {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number one accepted service and advance the counters.
    pub fn number(
        &mut self,
        candidate: Candidate,
        fallback: &RemoconFallback<'_>,
        tables: &NumberingTables,
    ) -> ResolvedChannel {
        let Candidate {
            service,
            channel_type,
            is_radiochannel,
        } = candidate;
        let service_id = service.service_id;

        let network_count = {
            let count = self.same_network_count.entry(service.network_id).or_insert(0);
            *count += 1;
            *count
        };

        let (remocon_id, channel_number) = match channel_type {
            // 上2桁はリモコン番号、下1桁は同じネットワーク内のサービス番号
            ChannelType::GR => {
                let remocon_id = fallback.resolve(&service);
                // 011(-0), 011-1, 011-2 ... so branches start at -1
                let branch = self.same_remocon_count.entry(remocon_id).or_insert(-1);
                // Only a network's first service takes a branch, or sub-channels
                // would be branch-numbered too.
                if network_count == 1 {
                    *branch += 1;
                }
                let mut number = format!("{:02}{}", remocon_id, network_count);
                if *branch > 0 {
                    number.push_str(&format!("-{}", branch));
                }
                (remocon_id, number)
            }
            ChannelType::BS | ChannelType::CS | ChannelType::CATV | ChannelType::STARDIGIO => {
                let remocon_id = match channel_type {
                    ChannelType::BS => tables.bs_remocon_id(service_id).unwrap_or(service_id as i32),
                    _ => service_id as i32,
                };
                (remocon_id, format!("{:03}", service_id))
            }
            // SPHD is service_id - 32768 and SPSD-SKY service_id - 16384;
            // both offsets are multiples of 1024.
            ChannelType::SKY => {
                let number = service_id % 1024;
                (number as i32, format!("{:03}", number))
            }
            // Candidates never carry OTHER.
            ChannelType::OTHER => (service.remocon_id.unwrap_or(UNKNOWN_REMOCON_ID), String::new()),
        };

        ResolvedChannel {
            id: service.channel_id(),
            display_channel_id: format!("{}{}", channel_type.as_str().to_lowercase(), channel_number),
            network_id: service.network_id,
            service_id,
            transport_stream_id: service.transport_stream_id,
            remocon_id,
            channel_number,
            channel_type,
            name: service.name,
            is_subchannel: is_subchannel(channel_type, service_id, tables),
            is_radiochannel,
        }
    }
}

/// Outcome of running filter and numbering over a whole service list.
#[derive(Debug, Clone, Default)]
pub struct Resolution {
    pub channels: Vec<ResolvedChannel>,
    pub rejected: Vec<(CanonicalService, Rejection)>,
}

/// Filter and number a service list in order.
///
/// # Example
/// ```
/// use channel_catalog::numbering::{resolve_services, NumberingTables, RemoconFallback};
/// use channel_catalog::types::CanonicalService;
///
/// let bs = CanonicalService {
///     network_id: 4,
///     service_id: 103,
///     transport_stream_id: None,
///     remocon_id: None,
///     service_type: 0x01,
///     name: "NHK BSプレミアム".to_string(),
/// };
/// let resolution = resolve_services(vec![bs], &RemoconFallback::Placeholder, &NumberingTables::default());
/// let channel = &resolution.channels[0];
/// assert_eq!(channel.remocon_id, 3);
/// assert_eq!(channel.channel_number, "103");
/// assert_eq!(channel.display_channel_id, "bs103");
/// ```
pub fn resolve_services(
    services: Vec<CanonicalService>,
    fallback: &RemoconFallback<'_>,
    tables: &NumberingTables,
) -> Resolution {
    let mut state = NumberingState::new();
    let mut resolution = Resolution::default();

    for service in services {
        match filter::accept(service.clone(), tables) {
            Ok(candidate) => resolution.channels.push(state.number(candidate, fallback, tables)),
            Err(rejection) => resolution.rejected.push((service, rejection)),
        }
    }

    resolution
}

/// Sort so that services of one network are contiguous and in service ID order.
///
/// Branch numbers depend on which network reaches a remote control key first,
/// so backends without a stable listing order must be sorted before numbering.
pub fn sort_by_network_order(services: &mut [CanonicalService]) {
    services.sort_by_key(|s| s.network_id as u64 * 100_000 + s.service_id as u64);
}

#[cfg(test)]
mod tests {
    use super::*;

    fn service(network_id: u16, service_id: u16, remocon_id: Option<i32>) -> CanonicalService {
        CanonicalService {
            network_id,
            service_id,
            transport_stream_id: None,
            remocon_id,
            service_type: 0x01,
            name: format!("Service {}", service_id),
        }
    }

    fn resolve(services: Vec<CanonicalService>) -> Vec<ResolvedChannel> {
        resolve_services(services, &RemoconFallback::Placeholder, &NumberingTables::default()).channels
    }

    #[test]
    fn test_terrestrial_same_network() {
        let channels = resolve(vec![
            service(0x7FE0, 1024, Some(1)),
            service(0x7FE0, 1025, Some(1)),
        ]);
        assert_eq!(channels[0].channel_number, "011");
        assert_eq!(channels[0].display_channel_id, "gr011");
        assert!(!channels[0].is_subchannel);
        assert_eq!(channels[1].channel_number, "012");
        assert!(channels[1].is_subchannel);
    }

    #[test]
    fn test_terrestrial_branch_numbers() {
        // Two networks both on remote control key 7; the later network branches.
        let channels = resolve(vec![
            service(0x7FE3, 1064, Some(7)),
            service(0x7FE3, 1065, Some(7)),
            service(0x7E87, 23608, Some(7)),
            service(0x7E87, 23609, Some(7)),
            service(0x7E88, 23610, Some(7)),
        ]);
        let numbers: Vec<_> = channels.iter().map(|c| c.channel_number.as_str()).collect();
        assert_eq!(numbers, vec!["071", "072", "071-1", "072-1", "071-2"]);
        assert_eq!(channels[2].display_channel_id, "gr071-1");
    }

    #[test]
    fn test_terrestrial_prefix_shared_within_network() {
        let channels = resolve(vec![
            service(0x7FE1, 1032, Some(2)),
            service(0x7FE1, 1033, Some(2)),
            service(0x7FE1, 1034, Some(2)),
        ]);
        for channel in &channels {
            let base = channel.channel_number.split('-').next().unwrap();
            assert_eq!(&base[..2], "02");
        }
    }

    #[test]
    fn test_terrestrial_missing_key_is_placeholder() {
        let channels = resolve(vec![service(0x7FE0, 1024, None)]);
        assert_eq!(channels[0].remocon_id, UNKNOWN_REMOCON_ID);
        assert_eq!(channels[0].channel_number, "-11");
    }

    #[test]
    fn test_rejected_service_consumes_no_slot() {
        let mut one_seg = service(0x7FE0, 1408, Some(1));
        one_seg.service_type = 0xC0;
        let resolution = resolve_services(
            vec![one_seg, service(0x7FE0, 1024, Some(1))],
            &RemoconFallback::Placeholder,
            &NumberingTables::default(),
        );
        assert_eq!(resolution.rejected.len(), 1);
        assert_eq!(resolution.channels[0].channel_number, "011");
    }

    #[test]
    fn test_bs_numbering() {
        let tables = NumberingTables::default();
        let channels = resolve(vec![
            service(4, 101, None),
            service(4, 103, None),
            service(4, 141, None),
            service(4, 211, None),
            service(4, 222, None),
            service(4, 181, None),
            service(4, 191, None),
            service(4, 200, None),
            service(4, 234, None),
        ]);
        let remocons: Vec<_> = channels.iter().map(|c| c.remocon_id).collect();
        assert_eq!(remocons, vec![1, 3, 4, 11, 12, 8, 9, 10, 234]);
        for channel in &channels {
            assert_eq!(channel.channel_number, format!("{:03}", channel.service_id));
            assert_eq!(channel.channel_type, ChannelType::BS);
            assert_eq!(channel.is_subchannel, tables.is_bs_subchannel(channel.service_id));
        }
        assert_eq!(channels[1].display_channel_id, "bs103");
    }

    #[test]
    fn test_bs_subchannels() {
        let tables = NumberingTables::default();
        for sid in [102, 104, 142, 149, 152, 159, 162, 169, 172, 179, 182, 189, 232, 233] {
            assert!(is_subchannel(ChannelType::BS, sid, &tables), "sid {}", sid);
        }
        for sid in [101, 103, 141, 151, 161, 171, 181, 191, 211, 234] {
            assert!(!is_subchannel(ChannelType::BS, sid, &tables), "sid {}", sid);
        }
    }

    #[test]
    fn test_gr_subchannel_mask() {
        let tables = NumberingTables::default();
        for sid in [0u16, 1024, 1025, 1026, 1032, 1408, 23608, 0x0180, 0x0007, 0xFFFF] {
            assert_eq!(
                is_subchannel(ChannelType::GR, sid, &tables),
                (sid & 0x0187) != 0,
                "sid {}",
                sid
            );
        }
    }

    #[test]
    fn test_cs_catv_stardigio_numbering() {
        let mut radio = service(1, 440, None);
        radio.service_type = 0x02;
        let channels = resolve(vec![service(6, 55, None), service(0xFFFE, 700, None), radio]);

        assert_eq!(channels[0].channel_number, "055");
        assert_eq!(channels[0].remocon_id, 55);
        assert_eq!(channels[0].display_channel_id, "cs055");
        assert_eq!(channels[1].display_channel_id, "catv700");
        assert_eq!(channels[2].display_channel_id, "stardigio440");
        assert!(channels[2].is_radiochannel);
    }

    #[test]
    fn test_sky_numbering() {
        let channels = resolve(vec![service(10, 32768 + 801, None), service(3, 16384 + 5, None)]);
        assert_eq!(channels[0].channel_number, "801");
        assert_eq!(channels[0].remocon_id, 801);
        assert_eq!(channels[0].display_channel_id, "sky801");
        assert_eq!(channels[1].channel_number, "005");
    }

    #[test]
    fn test_epg_fallback_exact_match() {
        let epg = vec![EpgService { network_id: 0x7FE0, service_id: 1024, remote_control_key_id: 1 }];
        let previous = HashMap::new();
        let fallback = RemoconFallback::Epg { epg_services: &epg, previous: &previous };
        let resolution = resolve_services(vec![service(0x7FE0, 1024, None)], &fallback, &NumberingTables::default());
        assert_eq!(resolution.channels[0].remocon_id, 1);
        assert_eq!(resolution.channels[0].channel_number, "011");
    }

    #[test]
    fn test_epg_fallback_previous_value() {
        let epg = vec![EpgService { network_id: 0x7FE0, service_id: 1024, remote_control_key_id: 1 }];
        let previous = HashMap::from([("NID32738-SID1056".to_string(), 4)]);
        let fallback = RemoconFallback::Epg { epg_services: &epg, previous: &previous };
        let resolution = resolve_services(vec![service(0x7FE2, 1056, None)], &fallback, &NumberingTables::default());
        assert_eq!(resolution.channels[0].remocon_id, 4);
    }

    #[test]
    fn test_epg_fallback_sibling_service() {
        let epg = vec![
            EpgService { network_id: 0x7FE0, service_id: 1024, remote_control_key_id: 1 },
            EpgService { network_id: 0x7FE1, service_id: 1032, remote_control_key_id: 2 },
        ];
        let previous = HashMap::from([("NID32737-SID1034".to_string(), 0)]);
        let fallback = RemoconFallback::Epg { epg_services: &epg, previous: &previous };
        let resolution = resolve_services(
            vec![service(0x7FE1, 1032, None), service(0x7FE1, 1034, None)],
            &fallback,
            &NumberingTables::default(),
        );
        assert_eq!(resolution.channels[1].remocon_id, 2);
        assert_eq!(resolution.channels[1].channel_number, "022");
    }

    #[test]
    fn test_epg_fallback_nothing_known() {
        let epg = Vec::new();
        let previous = HashMap::new();
        let fallback = RemoconFallback::Epg { epg_services: &epg, previous: &previous };
        let resolution = resolve_services(vec![service(0x7FE0, 1024, None)], &fallback, &NumberingTables::default());
        assert_eq!(resolution.channels[0].remocon_id, UNKNOWN_REMOCON_ID);
    }

    #[test]
    fn test_sort_by_network_order() {
        let mut services = vec![
            service(0x7FE1, 1032, None),
            service(4, 101, None),
            service(0x7FE0, 1025, None),
            service(0x7FE0, 1024, None),
        ];
        sort_by_network_order(&mut services);
        let keys: Vec<_> = services.iter().map(|s| (s.network_id, s.service_id)).collect();
        assert_eq!(keys, vec![(4, 101), (0x7FE0, 1024), (0x7FE0, 1025), (0x7FE1, 1032)]);
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let services = vec![
            service(0x7FE0, 1024, Some(1)),
            service(0x7FE0, 1025, Some(1)),
            service(0x7E87, 23608, Some(1)),
            service(4, 151, None),
        ];
        assert_eq!(resolve(services.clone()), resolve(services));
    }

    #[test]
    fn test_tables_from_override() {
        let tables = NumberingTables {
            bs_remocon_overrides: vec![RemoconOverride::new(300, 309, 13)],
            ..NumberingTables::default()
        };
        let channels =
            resolve_services(vec![service(4, 301, None), service(4, 101, None)], &RemoconFallback::Placeholder, &tables)
                .channels;
        assert_eq!(channels[0].remocon_id, 13);
        assert_eq!(channels[1].remocon_id, 101);
    }
}
