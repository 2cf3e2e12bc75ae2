//! Record matching across versions.
//!
//! Candidate pairs are scored, then assigned greedily highest-first under a
//! minimum score. The ranking uses only keys that are symmetric in (old, new)
//! so swapping the documents transposes the result.

use std::cmp::Ordering;

use quotediff_core::{Canonical, DiffConfig, Field, Record};
use tracing::debug;

use crate::similarity::{name_similarity, token_similarity};
use crate::types::{Correspondence, MatchedPair};

/// Weights of the score components. Components missing on both sides are
/// left out and the remaining weights renormalized.
const NAME_WEIGHT: f64 = 0.6;
const COMPONENTS: &[(Field, f64)] = &[
    (Field::Service, 0.15),
    (Field::TierName, 0.1),
    (Field::TierType, 0.05),
    (Field::Database, 0.1),
];

#[derive(Debug, Clone)]
struct Candidate {
    old: usize,
    new: usize,
    score: f64,
    same_section: bool,
}

fn text_of(record: &Record, field: Field) -> Option<String> {
    match record.canonical(field) {
        Some(Canonical::Text(t)) => Some(t.clone()),
        Some(_) => None,
        None => record.get(field).map(|v| v.display.trim().to_lowercase()),
    }
}

fn component_similarity(a: Option<String>, b: Option<String>) -> Option<f64> {
    match (a, b) {
        (None, None) => None,
        (Some(a), Some(b)) if a == b => Some(1.0),
        (Some(a), Some(b)) => Some(token_similarity(&a, &b)),
        _ => Some(0.0),
    }
}

/// Weighted similarity of two normalized records in [0, 1].
pub fn score_pair(old: &Record, new: &Record) -> f64 {
    let mut total = NAME_WEIGHT * name_similarity(&old.match_name, &new.match_name);
    let mut weight = NAME_WEIGHT;
    for &(field, w) in COMPONENTS {
        if let Some(sim) = component_similarity(text_of(old, field), text_of(new, field)) {
            total += w * sim;
            weight += w;
        }
    }
    total / weight
}

/// Rank candidates: score, then same section, then closeness in position,
/// then position.
fn rank(a: &Candidate, b: &Candidate, prefer_same_section: bool) -> Ordering {
    b.score
        .partial_cmp(&a.score)
        .unwrap_or(Ordering::Equal)
        .then_with(|| {
            if prefer_same_section {
                b.same_section.cmp(&a.same_section)
            } else {
                Ordering::Equal
            }
        })
        .then_with(|| a.old.abs_diff(a.new).cmp(&b.old.abs_diff(b.new)))
        .then_with(|| a.old.min(a.new).cmp(&b.old.min(b.new)))
        .then_with(|| a.old.max(a.new).cmp(&b.old.max(b.new)))
        .then_with(|| a.old.cmp(&b.old))
}

/// Match two normalized record sequences (each in document order).
pub fn match_records(old: &[Record], new: &[Record], config: &DiffConfig) -> Correspondence {
    let mut candidates = Vec::new();
    for (i, o) in old.iter().enumerate() {
        for (j, n) in new.iter().enumerate() {
            let same_section = o.match_section == n.match_section;
            if !same_section
                && name_similarity(&o.match_name, &n.match_name) < config.cross_section_floor
            {
                continue;
            }
            let score = score_pair(o, n);
            if score >= config.similarity_threshold {
                candidates.push(Candidate {
                    old: i,
                    new: j,
                    score,
                    same_section,
                });
            }
        }
    }
    candidates.sort_by(|a, b| rank(a, b, config.prefer_same_section));

    let mut old_taken = vec![false; old.len()];
    let mut new_taken = vec![false; new.len()];
    let mut pairs = Vec::new();
    for c in candidates {
        if old_taken[c.old] || new_taken[c.new] {
            continue;
        }
        old_taken[c.old] = true;
        new_taken[c.new] = true;
        if !c.same_section {
            debug!(
                "Moved: {:?} ({}) -> {:?} ({}), score {:.3}",
                old[c.old].name, old[c.old].section, new[c.new].name, new[c.new].section, c.score
            );
        }
        pairs.push(MatchedPair {
            old: c.old,
            new: c.new,
            score: c.score,
            moved: !c.same_section,
        });
    }
    pairs.sort_by_key(|p| p.old);

    let unmatched = |taken: &[bool]| {
        taken
            .iter()
            .enumerate()
            .filter(|(_, t)| !**t)
            .map(|(i, _)| i)
            .collect::<Vec<_>>()
    };

    Correspondence {
        unmatched_old: unmatched(&old_taken),
        unmatched_new: unmatched(&new_taken),
        pairs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotediff_ingest::Normalizer;

    fn rec(name: &str, section: &str, fields: &[(Field, &str)]) -> Record {
        let mut r = Record::new(name, section, 0);
        for (f, v) in fields {
            r = r.with(*f, *v);
        }
        Normalizer::default().normalize(&r)
    }

    fn old_doc() -> Vec<Record> {
        vec![
            rec("S4 DEV", "Domestic S4HANA", &[(Field::TierName, "S"), (Field::Database, "HANA")]),
            rec("S4 QAS", "Domestic S4HANA", &[(Field::TierName, "S"), (Field::Database, "HANA")]),
            rec("S4 PRD", "Domestic S4HANA", &[(Field::TierName, "L"), (Field::Database, "HANA")]),
            rec("Additional Storage", "DEV Storage", &[(Field::Storage, "20480 GB")]),
            rec("Web Dispatcher", "Others IaaS", &[(Field::Os, "SLES")]),
        ]
    }

    fn new_doc() -> Vec<Record> {
        vec![
            rec("S/4HANA Development", "Domestic S4HANA", &[(Field::TierName, "M"), (Field::Database, "HANA")]),
            rec("S4 PRD", "Domestic S4HANA", &[(Field::TierName, "L"), (Field::Database, "HANA")]),
            rec("Additional Storage for S4 DEV", "Others IaaS", &[(Field::Storage, "10,880 GB")]),
            rec("Backup Server", "Others IaaS", &[(Field::Os, "RHEL")]),
        ]
    }

    #[test]
    fn test_greedy_matching() {
        let c = match_records(&old_doc(), &new_doc(), &DiffConfig::default());
        let links: Vec<(usize, usize, bool)> = c.pairs.iter().map(|p| (p.old, p.new, p.moved)).collect();
        assert_eq!(links, vec![(0, 0, false), (2, 1, false), (3, 2, true)]);
        assert_eq!(c.unmatched_old, vec![1, 4]);
        assert_eq!(c.unmatched_new, vec![3]);
    }

    #[test]
    fn test_symmetry() {
        let config = DiffConfig::default();
        let forward = match_records(&old_doc(), &new_doc(), &config);
        let backward = match_records(&new_doc(), &old_doc(), &config);
        assert_eq!(forward, backward.transposed());
    }

    #[test]
    fn test_conservation() {
        let (old, new) = (old_doc(), new_doc());
        let c = match_records(&old, &new, &DiffConfig::default());
        let mut olds: Vec<usize> = c.pairs.iter().map(|p| p.old).chain(c.unmatched_old.clone()).collect();
        let mut news: Vec<usize> = c.pairs.iter().map(|p| p.new).chain(c.unmatched_new.clone()).collect();
        olds.sort();
        news.sort();
        assert_eq!(olds, (0..old.len()).collect::<Vec<_>>());
        assert_eq!(news, (0..new.len()).collect::<Vec<_>>());
    }

    #[test]
    fn test_identical_record_in_other_section_is_moved() {
        let fields = [(Field::Service, "IaaS"), (Field::Storage, "4 TB")];
        let old = vec![rec("Backup Storage", "DEV Storage", &fields)];
        let new = vec![rec("Backup Storage", "Others IaaS", &fields)];
        let c = match_records(&old, &new, &DiffConfig::default());
        assert_eq!(c.pairs.len(), 1);
        assert!(c.pairs[0].moved);
        assert!(c.unmatched_old.is_empty() && c.unmatched_new.is_empty());
    }

    #[test]
    fn test_equal_scores_prefer_same_section() {
        let old = vec![rec("Backup", "Others IaaS", &[])];
        let new = vec![rec("Backup", "DEV Storage", &[]), rec("Backup", "Others IaaS", &[])];
        let c = match_records(&old, &new, &DiffConfig::default());
        assert_eq!(c.pairs[0].new, 1);
        assert!(!c.pairs[0].moved);

        let config = DiffConfig {
            prefer_same_section: false,
            ..DiffConfig::default()
        };
        let c = match_records(&old, &new, &config);
        assert_eq!(c.pairs[0].new, 0);
        assert!(c.pairs[0].moved);
    }

    #[test]
    fn test_threshold_leaves_pairs_unmatched() {
        let old = vec![rec("S4 DEV", "Domestic", &[])];
        let new = vec![rec("S4 QAS", "Domestic", &[])];
        let c = match_records(&old, &new, &DiffConfig::default());
        assert!(c.pairs.is_empty());

        let loose = DiffConfig {
            similarity_threshold: 0.3,
            ..DiffConfig::default()
        };
        assert_eq!(match_records(&old, &new, &loose).pairs.len(), 1);
    }
}
