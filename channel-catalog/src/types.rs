//! Channel record types shared by the normalizer, filter and numbering stages.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Digital TV service (デジタルTVサービス).
pub const SERVICE_TYPE_DIGITAL_TV: u8 = 0x01;
/// Digital audio service (デジタル音声サービス).
pub const SERVICE_TYPE_DIGITAL_AUDIO: u8 = 0x02;
/// Temporary video service (臨時映像サービス).
pub const SERVICE_TYPE_TEMPORARY_VIDEO: u8 = 0xA1;
/// Temporary audio service (臨時音声サービス).
pub const SERVICE_TYPE_TEMPORARY_AUDIO: u8 = 0xA2;
/// 4K-only TV service (超高精細度4K専用TVサービス).
pub const SERVICE_TYPE_UHD_TV: u8 = 0xAD;

/// Service types that carry something a viewer can watch or listen to.
///
/// One-seg / data broadcasting (0xC0) and engineering services (0xA4) are
/// intentionally absent. See ARIB STD-B10 第2部 6.2.13.
pub const WATCHABLE_SERVICE_TYPES: [u8; 5] = [
    SERVICE_TYPE_DIGITAL_TV,
    SERVICE_TYPE_DIGITAL_AUDIO,
    SERVICE_TYPE_TEMPORARY_VIDEO,
    SERVICE_TYPE_TEMPORARY_AUDIO,
    SERVICE_TYPE_UHD_TV,
];

/// Placeholder remote control key when the backend does not report one.
pub const UNKNOWN_REMOCON_ID: i32 = -1;

/// Broadcast network family a channel belongs to.
///
/// The string form (`"GR"`, `"BS"`, ...) is what gets persisted and what the
/// display channel ID prefix is derived from.
#[allow(clippy::upper_case_acronyms)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ChannelType {
    /// Digital terrestrial television (地上デジタル放送)
    GR,
    /// BS satellite (BSデジタル放送)
    BS,
    /// 110度CS satellite (CS1, CS2)
    CS,
    /// Cable television (ケーブルテレビ)
    CATV,
    /// 124/128度CS (スカパー!プレミアムサービス)
    SKY,
    /// スターデジオ (SPSD-PerfecTV audio channels)
    STARDIGIO,
    /// Unrecognized network
    OTHER,
}

impl ChannelType {
    /// All recognized types in catalog listing order.
    pub const LISTING_ORDER: [ChannelType; 6] = [
        ChannelType::GR,
        ChannelType::BS,
        ChannelType::CS,
        ChannelType::CATV,
        ChannelType::SKY,
        ChannelType::STARDIGIO,
    ];

    /// Persisted string form.
    pub fn as_str(&self) -> &'static str {
        match self {
            ChannelType::GR => "GR",
            ChannelType::BS => "BS",
            ChannelType::CS => "CS",
            ChannelType::CATV => "CATV",
            ChannelType::SKY => "SKY",
            ChannelType::STARDIGIO => "STARDIGIO",
            ChannelType::OTHER => "OTHER",
        }
    }

    /// Get display name in Japanese.
    pub fn display_name(&self) -> &'static str {
        match self {
            ChannelType::GR => "地デジ",
            ChannelType::BS => "BS",
            ChannelType::CS => "CS",
            ChannelType::CATV => "CATV",
            ChannelType::SKY => "スカパー!",
            ChannelType::STARDIGIO => "スターデジオ",
            ChannelType::OTHER => "その他",
        }
    }

    /// Position in [`ChannelType::LISTING_ORDER`]; unrecognized networks sort last.
    pub fn listing_rank(&self) -> usize {
        Self::LISTING_ORDER
            .iter()
            .position(|t| t == self)
            .unwrap_or(Self::LISTING_ORDER.len())
    }
}

impl fmt::Display for ChannelType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChannelType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "GR" => Ok(ChannelType::GR),
            "BS" => Ok(ChannelType::BS),
            "CS" => Ok(ChannelType::CS),
            "CATV" => Ok(ChannelType::CATV),
            "SKY" => Ok(ChannelType::SKY),
            "STARDIGIO" => Ok(ChannelType::STARDIGIO),
            "OTHER" => Ok(ChannelType::OTHER),
            other => Err(format!("unknown channel type: {}", other)),
        }
    }
}

/// Backend-independent service record produced by the normalizer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CanonicalService {
    pub network_id: u16,
    pub service_id: u16,
    /// Only present when the backend reports it (EDCB).
    pub transport_stream_id: Option<u16>,
    /// Remote control key as reported by the service list itself.
    /// `None` means the list does not carry one.
    pub remocon_id: Option<i32>,
    pub service_type: u8,
    /// Width-normalized service name.
    pub name: String,
}

impl CanonicalService {
    /// Stable catalog identity of this service.
    pub fn channel_id(&self) -> String {
        channel_id(self.network_id, self.service_id)
    }
}

/// Schedule-derived service entry from EDCB, used only for remote control key lookup.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EpgService {
    pub network_id: u16,
    pub service_id: u16,
    pub remote_control_key_id: i32,
}

/// A service after filtering and numbering, ready to be written to the catalog.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedChannel {
    /// `NID<network_id>-SID<service_id:03>`
    pub id: String,
    /// `<type lowercase><channel_number>`
    pub display_channel_id: String,
    pub network_id: u16,
    pub service_id: u16,
    pub transport_stream_id: Option<u16>,
    pub remocon_id: i32,
    pub channel_number: String,
    pub channel_type: ChannelType,
    pub name: String,
    pub is_subchannel: bool,
    pub is_radiochannel: bool,
}

/// Build the catalog identity for a network/service pair.
///
/// # Example
/// ```
/// use channel_catalog::types::channel_id;
///
/// assert_eq!(channel_id(32736, 1024), "NID32736-SID1024");
/// assert_eq!(channel_id(4, 101), "NID4-SID101");
/// assert_eq!(channel_id(4, 9), "NID4-SID009");
/// ```
pub fn channel_id(network_id: u16, service_id: u16) -> String {
    format!("NID{}-SID{:03}", network_id, service_id)
}
