//! Service name normalization.
//!
//! Service names arrive already decoded from ARIB STD-B24 by the backend, but
//! with full-width alphanumerics mixed in. Names are normalized to half-width
//! before the exclusion rules and display see them.

/// Full-width symbols that stay full-width after normalization.
///
/// Converting these to ASCII makes Japanese names look broken (e.g. brackets
/// around kana), so only letters, digits and a few marks are narrowed.
const KEEP_FULLWIDTH: &str = "＂＃＄％＆＇（）＋，．／：；＜＝＞［＼］＾＿｀｛｜｝";

/// Offset between a full-width ASCII variant (U+FF01..U+FF5E) and its ASCII form.
const FULLWIDTH_OFFSET: u32 = 0xFEE0;

/// Normalize a broadcast service name for storage and display.
///
/// # Example
/// ```
/// use channel_catalog::text::format_string;
///
/// assert_eq!(format_string("ＮＨＫ総合１・東京"), "NHK総合1・東京");
/// assert_eq!(format_string("ＢＳ１１　イレブン"), "BS11 イレブン");
/// ```
pub fn format_string(value: &str) -> String {
    value
        .trim_matches(|c| c == '\r' || c == '\n' || c == '\0')
        .chars()
        .map(narrow_char)
        .collect()
}

fn narrow_char(c: char) -> char {
    match c {
        // 全角スペース
        '\u{3000}' => ' ',
        '\u{FF01}'..='\u{FF5E}' if !KEEP_FULLWIDTH.contains(c) => {
            char::from_u32(c as u32 - FULLWIDTH_OFFSET).unwrap_or(c)
        }
        _ => c,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_alphanumerics_are_narrowed() {
        assert_eq!(format_string("ＴＯＫＹＯ　ＭＸ１"), "TOKYO MX1");
        assert_eq!(format_string("ｔｖｋ"), "tvk");
    }

    #[test]
    fn test_symbols_are_kept() {
        assert_eq!(format_string("ＢＳ（テスト）"), "BS（テスト）");
        assert_eq!(format_string("ＷＯＷＯＷ！"), "WOWOW!");
    }

    #[test]
    fn test_japanese_untouched() {
        assert_eq!(format_string("試験チャンネル"), "試験チャンネル");
        assert_eq!(format_string("ｱｲｳ"), "ｱｲｳ");
    }

    #[test]
    fn test_line_endings_trimmed() {
        assert_eq!(format_string("フジテレビ\r\n"), "フジテレビ");
        assert_eq!(format_string(""), "");
    }
}
