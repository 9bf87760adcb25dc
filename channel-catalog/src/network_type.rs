//! Broadcast network classification based on Network ID (NID).
//!
//! NID allocation follows ARIB STD-B10 第2部 付録N and TR-B14/TR-B15.
//! ref: https://www.arib.or.jp/english/html/overview/doc/6-STD-B10v5_13-E1.pdf

use crate::types::ChannelType;

/// Classify a network ID into a [`ChannelType`].
///
/// Never fails: anything not recognized is [`ChannelType::OTHER`].
///
/// # NID Allocation
/// - Terrestrial: 0x7880-0x7FE8 (region specific, including 県複フラグ=1 range)
/// - BS: 0x0004
/// - CS (110度): 0x0006, 0x0007
/// - SKY (124/128度CS): 0x000A (SPHD), 0x0003 (SPSD-SKY)
/// - STARDIGIO: 0x0001 (SPSD-PerfecTV)
/// - CATV: 0xFFFE, 0xFFFA, 0xFFFD, 0xFFF9, 0xFFF7
///
/// # Example
/// ```
/// use channel_catalog::network_type::classify_network_id;
/// use channel_catalog::types::ChannelType;
///
/// assert_eq!(classify_network_id(0x7FE8), ChannelType::GR);
/// assert_eq!(classify_network_id(4), ChannelType::BS);
/// assert_eq!(classify_network_id(0x000B), ChannelType::OTHER);
/// ```
pub fn classify_network_id(network_id: u16) -> ChannelType {
    match network_id {
        // 地上デジタル放送
        // 県複フラグ=0: 0x7C10 〜 0x7FEF, 県複フラグ=1: 0x7810 〜 0x7BEF
        // Actual allocation: 0x7880 (福岡・北九州) to 0x7FE8 (関東広域)
        0x7880..=0x7FE8 => ChannelType::GR,

        // BSデジタル放送
        0x0004 => ChannelType::BS,

        // 110度CSデジタル放送
        // CS1: 0x0006 (旧プラット・ワン系)
        // CS2: 0x0007 (旧スカイパーフェクTV!2系)
        0x0006 | 0x0007 => ChannelType::CS,

        // 124/128度CSデジタル放送
        // SPHD: 0x000A, SPSD-SKY: 0x0003 (運用終了)
        0x000A | 0x0003 => ChannelType::SKY,

        // SPSD-PerfecTV: 0x0001 (スターデジオ)
        0x0001 => ChannelType::STARDIGIO,

        // デジタル放送リマックス: 0xFFFE
        // デジタル放送高度リマックス: 0xFFFA
        // JC-HITSトランスモジュレーション: 0xFFFD
        // 高度JC-HITSトランスモジュレーション: 0xFFF9
        // 高度ケーブル自主放送: 0xFFF7
        0xFFFE | 0xFFFA | 0xFFFD | 0xFFF9 | 0xFFF7 => ChannelType::CATV,

        // BS4K (0x000B), CS4K (0x000C) and everything else
        _ => ChannelType::OTHER,
    }
}

/// Classify a network ID that came from an untyped payload.
///
/// Values outside the 16-bit range can never be a valid NID.
pub fn classify_raw_network_id(network_id: i64) -> ChannelType {
    u16::try_from(network_id)
        .map(classify_network_id)
        .unwrap_or(ChannelType::OTHER)
}
