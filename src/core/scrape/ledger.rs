use std::collections::HashSet;
use std::fmt;

/// Upper-cases and strips all whitespace so OCR spacing drift does not
/// change the fingerprint.
pub fn normalize(raw: &str) -> String {
    raw.chars()
        .filter(|c| !c.is_whitespace())
        .flat_map(char::to_uppercase)
        .collect()
}

/// 128 位内容指纹（blake3 截断）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct Fingerprint([u8; 16]);

impl Fingerprint {
    pub fn of(canonical: &str) -> Self {
        let hash = blake3::hash(canonical.as_bytes());
        let mut bytes = [0u8; 16];
        bytes.copy_from_slice(&hash.as_bytes()[..16]);
        Self(bytes)
    }

    /// Normalizes `raw` first.
    pub fn of_text(raw: &str) -> Self {
        Self::of(&normalize(raw))
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }
}

impl fmt::Display for Fingerprint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for byte in &self.0 {
            write!(f, "{:02x}", byte)?;
        }
        Ok(())
    }
}

/// 去重决策结果
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DedupDecision {
    pub is_duplicate: bool,
    pub reason: DedupReason,
    pub fingerprint: Fingerprint,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DedupReason {
    NewRow,       // 首次出现，记录并输出
    AlreadySeen,  // 重复渲染，丢弃
}

/// Set of fingerprints emitted in the current scrape session.
#[derive(Debug, Default)]
pub struct DeduplicationLedger {
    seen: HashSet<Fingerprint>,
}

impl DeduplicationLedger {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn fingerprint(canonical: &str) -> Fingerprint {
        Fingerprint::of(canonical)
    }

    pub fn seen(&self, fingerprint: &Fingerprint) -> bool {
        self.seen.contains(fingerprint)
    }

    pub fn record(&mut self, fingerprint: Fingerprint) {
        self.seen.insert(fingerprint);
    }

    pub fn reset(&mut self) {
        if !self.seen.is_empty() {
            log::debug!("🧹 ledger cleared ({} fingerprints)", self.seen.len());
        }
        self.seen.clear();
    }

    pub fn len(&self) -> usize {
        self.seen.len()
    }

    pub fn is_empty(&self) -> bool {
        self.seen.is_empty()
    }

    /// Normalizes and fingerprints `raw`, recording it when new.
    pub fn check_and_record(&mut self, raw: &str) -> DedupDecision {
        let fingerprint = Fingerprint::of_text(raw);
        let is_new = self.seen.insert(fingerprint);
        DedupDecision {
            is_duplicate: !is_new,
            reason: if is_new {
                DedupReason::NewRow
            } else {
                DedupReason::AlreadySeen
            },
            fingerprint,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_strips_whitespace_and_uppercases() {
        assert_eq!(normalize("A  B"), normalize("AB"));
        assert_eq!(normalize(" (home, 1.5),\n(away, 2.1) "), "(HOME,1.5),(AWAY,2.1)");
        assert_eq!(normalize(""), "");
    }

    #[test]
    fn test_fingerprint_deterministic() {
        let s = "(Over 2.5, 1.85), (Under 2.5, 1.95)";
        assert_eq!(Fingerprint::of(&normalize(s)), Fingerprint::of(&normalize(s)));
        assert_eq!(Fingerprint::of_text("a b"), Fingerprint::of_text("AB"));
        assert_ne!(Fingerprint::of_text("1.85"), Fingerprint::of_text("1.86"));
        assert_eq!(Fingerprint::of("x").to_string().len(), 32);
    }

    #[test]
    fn test_check_and_record_is_idempotent() {
        let mut ledger = DeduplicationLedger::new();
        let first = ledger.check_and_record("(-, -), (-, -)");
        let second = ledger.check_and_record("(-,-),(-,-)");

        assert!(!first.is_duplicate);
        assert_eq!(first.reason, DedupReason::NewRow);
        assert!(second.is_duplicate);
        assert_eq!(second.reason, DedupReason::AlreadySeen);
        assert_eq!(ledger.len(), 1);
    }

    #[test]
    fn test_seen_record_reset() {
        let mut ledger = DeduplicationLedger::new();
        let fp = DeduplicationLedger::fingerprint("ROW");
        assert!(!ledger.seen(&fp));
        ledger.record(fp);
        ledger.record(fp);
        assert!(ledger.seen(&fp));
        assert_eq!(ledger.len(), 1);

        ledger.reset();
        assert!(ledger.is_empty());
        assert!(!ledger.seen(&fp));
    }
}
