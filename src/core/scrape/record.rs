use serde::{Deserialize, Serialize};

pub const PLACEHOLDER: &str = "-";
pub const UNKNOWN_HEADER: &str = "Unknown";

/// One odds cell after OCR: selection label and numeric odds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OddsEntry {
    pub label: String,
    pub odds: String,
}

impl OddsEntry {
    pub fn new(label: impl Into<String>, odds: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            odds: odds.into(),
        }
    }

    pub fn placeholder() -> Self {
        Self::new(PLACEHOLDER, PLACEHOLDER)
    }

    pub fn render(&self) -> String {
        format!("({}, {})", self.label, self.odds)
    }
}

/// 渲染一行赔率文本
///
/// 不超过 2 个单元格时用 `", "` 连接；更多时按每行 2 或 3 个分组
/// （偶数且不是 6 的倍数取 2，否则取 3），组间以 `",\n"` 连接。
pub fn render_odds(entries: &[OddsEntry]) -> String {
    let rendered: Vec<String> = entries.iter().map(OddsEntry::render).collect();
    let n = rendered.len();
    if n <= 2 {
        return rendered.join(", ");
    }

    let chunk = if n % 2 == 0 && n % 6 != 0 { 2 } else { 3 };
    rendered
        .chunks(chunk)
        .map(|line| line.join(", "))
        .collect::<Vec<_>>()
        .join(",\n")
}

/// 结果表中的一行
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultRecord {
    pub sequence_id: u64,
    pub header_text: String,
    pub odds_text: String,
}
