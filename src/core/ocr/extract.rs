use super::engine::{OcrText, SharedOcr};
use super::preprocess::{prepare_for_ocr, PreprocessConfig};
use crate::core::scrape::record::{OddsEntry, PLACEHOLDER, UNKNOWN_HEADER};
use image::{GenericImageView, Rgb};
use once_cell::sync::Lazy;
use regex::Regex;

static ODDS_PATTERN: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\d+([.,]\d+)?$").expect("odds pattern is valid")
});

fn or_placeholder(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        PLACEHOLDER.to_string()
    } else {
        trimmed.to_string()
    }
}

/// 十进制逗号统一成小数点（仅对纯数字赔率生效）
pub fn normalize_odds_value(text: &str) -> String {
    let trimmed = text.trim();
    if ODDS_PATTERN.is_match(trimmed) {
        trimmed.replace(',', ".")
    } else {
        or_placeholder(trimmed)
    }
}

/// First text is the selection label, second the odds; missing ones are `"-"`.
pub fn odds_entry_from_texts(texts: &[OcrText]) -> OddsEntry {
    let label = texts.first().map(|t| or_placeholder(&t.text));
    let odds = texts.get(1).map(|t| normalize_odds_value(&t.text));
    OddsEntry::new(
        label.unwrap_or_else(|| PLACEHOLDER.to_string()),
        odds.unwrap_or_else(|| PLACEHOLDER.to_string()),
    )
}

pub fn header_from_texts(texts: &[OcrText]) -> String {
    let joined = texts
        .iter()
        .map(|t| t.text.trim())
        .filter(|t| !t.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    if joined.is_empty() {
        UNKNOWN_HEADER.to_string()
    } else {
        joined
    }
}

/// `"<t0> vs <t2>"` when at least three texts were read.
pub fn team_pairing_from_texts(texts: &[OcrText]) -> Option<String> {
    if texts.len() < 3 {
        return None;
    }
    let home = texts[0].text.trim();
    let away = texts[2].text.trim();
    if home.is_empty() || away.is_empty() {
        return None;
    }
    Some(format!("{} vs {}", home, away))
}

pub fn read_texts<I>(ocr: &SharedOcr, view: &I, preprocess: &PreprocessConfig) -> Vec<OcrText>
where
    I: GenericImageView<Pixel = Rgb<u8>>,
{
    match prepare_for_ocr(view, preprocess) {
        Some(prepared) => ocr.read_text_or_empty(&prepared),
        None => Vec::new(),
    }
}

pub fn read_odds_cell<I>(ocr: &SharedOcr, cell: &I, preprocess: &PreprocessConfig) -> OddsEntry
where
    I: GenericImageView<Pixel = Rgb<u8>>,
{
    odds_entry_from_texts(&read_texts(ocr, cell, preprocess))
}

/// OCR over the left half of the header bar.
pub fn read_header_text<I>(ocr: &SharedOcr, header: &I, preprocess: &PreprocessConfig) -> String
where
    I: GenericImageView<Pixel = Rgb<u8>>,
{
    let (width, height) = header.dimensions();
    let half = width / 2;
    if half == 0 || height == 0 {
        return UNKNOWN_HEADER.to_string();
    }
    let left = header.view(0, 0, half, height);
    header_from_texts(&read_texts(ocr, &*left, preprocess))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::ocr::engine::MockOcrEngine;
    use image::RgbImage;
    use std::time::Duration;

    fn texts(items: &[&str]) -> Vec<OcrText> {
        items.iter().map(|t| OcrText::new(*t, 0.9)).collect()
    }

    #[test]
    fn test_odds_entry_padding() {
        assert_eq!(odds_entry_from_texts(&[]), OddsEntry::new("-", "-"));
        assert_eq!(odds_entry_from_texts(&texts(&["Home"])), OddsEntry::new("Home", "-"));
        assert_eq!(
            odds_entry_from_texts(&texts(&["Home", "1,85", "extra"])),
            OddsEntry::new("Home", "1.85")
        );
        assert_eq!(odds_entry_from_texts(&texts(&["  ", ""])), OddsEntry::new("-", "-"));
    }

    #[test]
    fn test_non_numeric_odds_kept_verbatim() {
        assert_eq!(normalize_odds_value(" 2.10 "), "2.10");
        assert_eq!(normalize_odds_value("EVS"), "EVS");
        assert_eq!(normalize_odds_value("1,2,3"), "1,2,3");
    }

    #[test]
    fn test_header_join_and_fallback() {
        assert_eq!(header_from_texts(&texts(&["Total", "Goals"])), "Total Goals");
        assert_eq!(header_from_texts(&[]), "Unknown");
        assert_eq!(header_from_texts(&texts(&[" "])), "Unknown");
    }

    #[test]
    fn test_team_pairing() {
        assert_eq!(
            team_pairing_from_texts(&texts(&["Arsenal", "v", "Chelsea"])),
            Some("Arsenal vs Chelsea".to_string())
        );
        assert_eq!(team_pairing_from_texts(&texts(&["Arsenal", "Chelsea"])), None);
    }

    #[test]
    fn test_header_reads_left_half_only() {
        let ocr = SharedOcr::new(
            Box::new(MockOcrEngine::with_responder(|img| {
                // 2x upscale of the 50px left half
                assert_eq!(img.width(), 100);
                Ok(vec![OcrText::new("Handicap", 0.9)])
            })),
            Duration::from_secs(1),
        );
        let header = RgbImage::from_pixel(100, 20, Rgb([225, 225, 225]));
        assert_eq!(
            read_header_text(&ocr, &header, &PreprocessConfig::default()),
            "Handicap"
        );
    }

    #[test]
    fn test_ocr_failure_yields_placeholders() {
        let ocr = SharedOcr::new(Box::new(MockOcrEngine::failing("boom")), Duration::from_secs(1));
        let cell = RgbImage::from_pixel(40, 20, Rgb([200, 200, 200]));
        assert_eq!(
            read_odds_cell(&ocr, &cell, &PreprocessConfig::default()),
            OddsEntry::placeholder()
        );
    }
}
