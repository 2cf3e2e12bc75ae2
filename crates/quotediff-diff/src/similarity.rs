//! String similarity measures for matching and text comparison.

use std::collections::{BTreeSet, HashMap};

/// Containment counts for a bit less than an exact token overlap, so that
/// "backup" vs "backup server" ranks below "backup server" vs itself.
const CONTAINMENT_WEIGHT: f64 = 0.9;
const TOKEN_WEIGHT: f64 = 0.7;
const BIGRAM_WEIGHT: f64 = 0.3;

/// Token overlap of two canonical token strings: the larger of Dice and
/// (discounted) containment of the shorter in the longer.
pub fn token_similarity(a: &str, b: &str) -> f64 {
    let ta: BTreeSet<&str> = a.split_whitespace().collect();
    let tb: BTreeSet<&str> = b.split_whitespace().collect();
    if ta.is_empty() || tb.is_empty() {
        return if ta.is_empty() && tb.is_empty() { 1.0 } else { 0.0 };
    }
    let shared = ta.intersection(&tb).count() as f64;
    let dice = 2.0 * shared / (ta.len() + tb.len()) as f64;
    let containment = shared / ta.len().min(tb.len()) as f64;
    dice.max(CONTAINMENT_WEIGHT * containment)
}

fn bigrams(s: &str) -> HashMap<(char, char), usize> {
    let chars: Vec<char> = s.chars().filter(|c| !c.is_whitespace()).collect();
    let mut counts = HashMap::new();
    for pair in chars.windows(2) {
        *counts.entry((pair[0], pair[1])).or_insert(0) += 1;
    }
    counts
}

/// Character bigram Dice coefficient (whitespace ignored).
pub fn bigram_dice(a: &str, b: &str) -> f64 {
    let ba = bigrams(a);
    let bb = bigrams(b);
    let total: usize = ba.values().sum::<usize>() + bb.values().sum::<usize>();
    if total == 0 {
        let squash = |s: &str| s.split_whitespace().collect::<String>();
        return if squash(a) == squash(b) { 1.0 } else { 0.0 };
    }
    let shared: usize = ba
        .iter()
        .map(|(k, n)| (*n).min(bb.get(k).copied().unwrap_or(0)))
        .sum();
    2.0 * shared as f64 / total as f64
}

/// Similarity of two canonical names in [0, 1].
pub fn name_similarity(a: &str, b: &str) -> f64 {
    if a == b {
        return 1.0;
    }
    TOKEN_WEIGHT * token_similarity(a, b) + BIGRAM_WEIGHT * bigram_dice(a, b)
}

/// Word-multiset Dice similarity of two texts, as a percentage.
pub fn text_similarity(a: &str, b: &str) -> f64 {
    fn words(s: &str) -> HashMap<String, usize> {
        let mut counts = HashMap::new();
        for w in s
            .split(|c: char| !c.is_alphanumeric())
            .filter(|w| !w.is_empty())
        {
            *counts.entry(w.to_lowercase()).or_insert(0) += 1;
        }
        counts
    }

    let wa = words(a);
    let wb = words(b);
    let total: usize = wa.values().sum::<usize>() + wb.values().sum::<usize>();
    if total == 0 {
        return 100.0;
    }
    let shared: usize = wa
        .iter()
        .map(|(w, n)| (*n).min(wb.get(w).copied().unwrap_or(0)))
        .sum();
    let pct = 200.0 * shared as f64 / total as f64;
    (pct * 100.0).round() / 100.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_names() {
        assert_eq!(name_similarity("dev s4hana", "dev s4hana"), 1.0);
        assert_eq!(token_similarity("", ""), 1.0);
    }

    #[test]
    fn test_containment_beats_dice() {
        let s = name_similarity("additional storage", "additional dev s4hana storage");
        assert!(s > 0.8, "got {}", s);
        assert!(s < 1.0);
    }

    #[test]
    fn test_different_environments_stay_apart() {
        assert!(name_similarity("dev s4hana", "qas s4hana") < 0.6);
        assert_eq!(name_similarity("dev", "prd"), 0.0);
    }

    #[test]
    fn test_symmetric() {
        let pairs = [("backup", "backup server"), ("a b c", "c d"), ("x", "")];
        for (a, b) in pairs {
            assert_eq!(name_similarity(a, b), name_similarity(b, a));
        }
    }

    #[test]
    fn test_text_similarity_percent() {
        assert_eq!(text_similarity("RAM 512 GB", "ram 512 gb"), 100.0);
        assert_eq!(text_similarity("a b", "c d"), 0.0);
        assert_eq!(text_similarity("a b c d", "a b x y"), 50.0);
        assert_eq!(text_similarity("", ""), 100.0);
    }
}
