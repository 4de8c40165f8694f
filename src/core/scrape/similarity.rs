//! 合并孤儿行时的近似重复抑制

use super::record::OddsEntry;

/// Similarity in `[0, 1]`: `2 * LCS / (len_a + len_b)` over chars.
/// Two empty strings are identical.
pub fn similarity_ratio(a: &str, b: &str) -> f32 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let total = a.len() + b.len();
    if total == 0 {
        return 1.0;
    }

    // 单行滚动 DP
    let mut prev = vec![0usize; b.len() + 1];
    let mut curr = vec![0usize; b.len() + 1];
    for ca in &a {
        for (j, cb) in b.iter().enumerate() {
            curr[j + 1] = if ca == cb {
                prev[j] + 1
            } else {
                prev[j + 1].max(curr[j])
            };
        }
        std::mem::swap(&mut prev, &mut curr);
    }
    let lcs = prev[b.len()];

    (2 * lcs) as f32 / total as f32
}

fn compact(text: &str) -> String {
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn parse_odds(text: &str) -> Option<f64> {
    text.trim().replace(',', ".").parse::<f64>().ok()
}

/// Odds equal within `tolerance` when both parse, else exact string match.
pub fn odds_close(a: &str, b: &str, tolerance: f64) -> bool {
    match (parse_odds(a), parse_odds(b)) {
        (Some(x), Some(y)) => (x - y).abs() < tolerance,
        _ => a.trim() == b.trim(),
    }
}

/// Drops every entry whose label is more than `label_threshold` similar to an
/// already kept entry and whose odds are close to it. Keeps first occurrences.
pub fn suppress_near_duplicates(
    entries: Vec<OddsEntry>,
    label_threshold: f32,
    odds_tolerance: f64,
) -> Vec<OddsEntry> {
    let mut kept: Vec<OddsEntry> = Vec::with_capacity(entries.len());
    for entry in entries {
        let label = compact(&entry.label);
        let duplicate = kept.iter().any(|k| {
            similarity_ratio(&compact(&k.label), &label) > label_threshold
                && odds_close(&k.odds, &entry.odds, odds_tolerance)
        });
        if duplicate {
            log::debug!("✂️ dropped near-duplicate cell {}", entry.render());
        } else {
            kept.push(entry);
        }
    }
    kept
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ratio_bounds() {
        assert_eq!(similarity_ratio("", ""), 1.0);
        assert_eq!(similarity_ratio("abc", "abc"), 1.0);
        assert_eq!(similarity_ratio("abc", ""), 0.0);
        assert_eq!(similarity_ratio("abc", "xyz"), 0.0);
        assert!((similarity_ratio("abcd", "abxd") - 0.75).abs() < 1e-6);
    }

    #[test]
    fn test_odds_close() {
        assert!(odds_close("1.85", "1.855", 0.01));
        assert!(odds_close("1,85", "1.85", 0.01));
        assert!(!odds_close("1.85", "1.95", 0.01));
        assert!(odds_close("-", "-", 0.01));
        assert!(!odds_close("-", "1.85", 0.01));
    }

    #[test]
    fn test_suppress_overlap_between_halves() {
        let entries = vec![
            OddsEntry::new("Over 2.5", "1.85"),
            OddsEntry::new("Under 2.5", "1.95"),
            OddsEntry::new("Under  2.5", "1.95"),
            OddsEntry::new("Over 3.5", "2.40"),
        ];
        let kept = suppress_near_duplicates(entries, 0.9, 0.01);
        let labels: Vec<&str> = kept.iter().map(|e| e.label.as_str()).collect();
        assert_eq!(labels, vec!["Over 2.5", "Under 2.5", "Over 3.5"]);
    }

    #[test]
    fn test_similar_label_different_odds_kept() {
        let entries = vec![
            OddsEntry::new("Draw", "3.10"),
            OddsEntry::new("Draw", "3.40"),
        ];
        assert_eq!(suppress_near_duplicates(entries, 0.9, 0.01).len(), 2);
    }
}
