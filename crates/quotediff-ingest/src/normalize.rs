//! Record normalization — canonical numbers, units, flags and name tokens.
//!
//! Canonical values are always recomputed from display values, so
//! normalizing a normalized record returns it unchanged.

use std::collections::BTreeMap;

use once_cell::sync::Lazy;
use quotediff_core::{Canonical, Error, Field, FieldIssue, FieldKind, Record, Result};
use regex::Regex;

// A number starts the value or follows a separator; `RAID-5` and `Tier-2`
// are words, and only a free-standing `-` is a sign.
static NUMBER_TOKEN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?:^|[^\w\-.,])(-\s*)?(\d[\d,.]*)").unwrap());
static CAPACITY: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"(?i)(?:^|[^\w\-.,])(-\s*)?(\d[\d,.]*)\s*(pib|tib|gib|mib|pb|tb|gb|mb|p|t|g|m)?\b",
    )
    .unwrap()
});
static THOUSANDS_COMMA: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(,\d{3})+(\.\d+)?$").unwrap());
static THOUSANDS_DOT: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^\d{1,3}(\.\d{3})+(,\d+)?$").unwrap());

/// Values that mean "not stated".
const PLACEHOLDERS: &[&str] = &["n/a", "na", "not specified", "not applicable", "-", "--", "tbd", "none specified"];

/// Multi-word phrases folded before tokenizing.
const PHRASES: &[(&str, &str)] = &[
    ("s/4 hana", "s4hana"),
    ("s/4hana", "s4hana"),
    ("s4 hana", "s4hana"),
    ("disaster recovery", "dr"),
    ("high availability", "ha"),
];

/// Single-token synonyms.
const TOKEN_SYNONYMS: &[(&str, &str)] = &[
    ("development", "dev"),
    ("develop", "dev"),
    ("production", "prd"),
    ("prod", "prd"),
    ("quality", "qas"),
    ("qa", "qas"),
    ("test", "tst"),
    ("sandbox", "sbx"),
    ("s4", "s4hana"),
    ("others", "other"),
    ("servers", "server"),
    ("systems", "system"),
];

const STOP_WORDS: &[&str] = &["for", "the", "of", "and", "a", "an", "with", "in", "on", "to"];

/// Canonical values are rounded to this many decimals so unit conversions
/// land on exact values ("10.88 TB" == "10880 GB").
const ROUND_DECIMALS: i32 = 6;

pub fn is_placeholder(value: &str) -> bool {
    let v = value.trim().to_lowercase();
    v.is_empty() || PLACEHOLDERS.contains(&v.as_str())
}

fn round(v: f64) -> f64 {
    let scale = 10f64.powi(ROUND_DECIMALS);
    (v * scale).round() / scale
}

/// Parse a single numeric token, handling thousands separators and
/// decimal commas.
pub fn parse_number(token: &str) -> Option<f64> {
    let t = token.trim().trim_end_matches(|c: char| c == '.' || c == ',');
    if t.is_empty() {
        return None;
    }
    let cleaned = if THOUSANDS_COMMA.is_match(t) {
        t.replace(',', "")
    } else if THOUSANDS_DOT.is_match(t) && t.contains(',') {
        t.replace('.', "").replace(',', ".")
    } else if t.contains(',') && !t.contains('.') {
        t.replace(',', ".")
    } else {
        t.to_string()
    };
    cleaned.parse::<f64>().ok().filter(|v| v.is_finite())
}

/// Why a display value failed its field kind; becomes [`Error::SchemaMismatch`].
type Mismatch<T> = std::result::Result<T, String>;

fn first_number(s: &str) -> Mismatch<f64> {
    let caps = NUMBER_TOKEN
        .captures(s)
        .ok_or_else(|| "no number found".to_string())?;
    let value = parse_number(&caps[2]).ok_or_else(|| format!("unparseable number {:?}", &caps[2]))?;
    if caps.get(1).is_some() {
        return Err("negative value".into());
    }
    Ok(value)
}

/// Parse a capacity and convert it to GB. No unit means GB.
fn parse_capacity_gb(s: &str) -> Mismatch<f64> {
    let caps = CAPACITY
        .captures(s)
        .ok_or_else(|| "no capacity found".to_string())?;
    if caps.get(1).is_some() {
        return Err("negative capacity".into());
    }
    let value = parse_number(&caps[2]).ok_or_else(|| format!("unparseable number {:?}", &caps[2]))?;
    let unit = caps.get(3).map(|m| m.as_str().to_lowercase());
    let factor = match unit.as_deref() {
        None | Some("gb") | Some("g") | Some("gib") => 1.0,
        Some("tb") | Some("t") => 1_000.0,
        Some("pb") | Some("p") => 1_000_000.0,
        Some("mb") | Some("m") => 0.001,
        Some("tib") => 1_024.0,
        Some("pib") => 1_048_576.0,
        Some("mib") => 1.0 / 1_024.0,
        Some(other) => return Err(format!("unknown unit {:?}", other)),
    };
    Ok(round(value * factor))
}

fn parse_percent(s: &str) -> Mismatch<f64> {
    let v = first_number(s)?;
    if v > 100.0 {
        return Err(format!("percentage out of range: {}", v));
    }
    Ok(round(v))
}

fn parse_count(s: &str) -> Mismatch<u64> {
    let lower = s.trim().to_lowercase();
    if matches!(lower.as_str(), "none" | "no" | "zero") {
        return Ok(0);
    }
    let v = first_number(s)?;
    if v.fract() != 0.0 {
        return Err(format!("not a whole number: {}", v));
    }
    Ok(v as u64)
}

fn parse_flag(s: &str) -> Mismatch<bool> {
    let lower = s.trim().to_lowercase();
    let first = lower.split_whitespace().next().unwrap_or("");
    match first {
        "no" | "n" | "not" | "false" | "without" | "none" | "excluded" | "0" => Ok(false),
        "yes" | "y" | "true" | "included" | "with" | "x" | "✓" | "✔" | "1" => Ok(true),
        _ => Err(format!("not a yes/no value: {:?}", s)),
    }
}

fn parse_roman(s: &str) -> Option<u64> {
    let v = match s {
        "i" => 1,
        "ii" => 2,
        "iii" => 3,
        "iv" => 4,
        "v" => 5,
        "vi" => 6,
        "vii" => 7,
        "viii" => 8,
        "ix" => 9,
        "x" => 10,
        _ => return None,
    };
    Some(v)
}

fn parse_ordinal(s: &str) -> Mismatch<u64> {
    if let Ok(v) = parse_count(s) {
        return Ok(v);
    }
    let lower = s.to_lowercase();
    lower
        .split(|c: char| !c.is_alphanumeric())
        .filter(|t| *t != "phase")
        .find_map(parse_roman)
        .ok_or_else(|| format!("not a phase number: {:?}", s))
}

fn canonical_text(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Canonicalize a display value according to its field's kind.
///
/// Fails with [`Error::SchemaMismatch`] when the value does not fit.
pub fn canonicalize(field: Field, display: &str) -> Result<Canonical> {
    let parsed = match field.kind() {
        FieldKind::Text => Ok(Canonical::Text(canonical_text(display))),
        FieldKind::Number => first_number(display).map(|v| Canonical::Number(round(v))),
        FieldKind::Capacity => parse_capacity_gb(display).map(Canonical::Number),
        FieldKind::Percent => parse_percent(display).map(Canonical::Number),
        FieldKind::Count => parse_count(display).map(Canonical::Count),
        FieldKind::Flag => parse_flag(display).map(Canonical::Flag),
        FieldKind::Ordinal => parse_ordinal(display).map(Canonical::Count),
    };
    parsed.map_err(|reason| Error::SchemaMismatch {
        field: field.key().to_string(),
        value: display.to_string(),
        reason,
    })
}

/// Turns extracted records into comparable ones.
#[derive(Debug, Clone)]
pub struct Normalizer {
    synonyms: BTreeMap<String, String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new(&BTreeMap::new())
    }
}

impl Normalizer {
    /// Built-in synonyms plus `extra` (which win on conflict).
    pub fn new(extra: &BTreeMap<String, String>) -> Self {
        let mut synonyms: BTreeMap<String, String> = TOKEN_SYNONYMS
            .iter()
            .map(|(from, to)| (from.to_string(), to.to_string()))
            .collect();
        for (from, to) in extra {
            synonyms.insert(from.to_lowercase(), to.to_lowercase());
        }
        Self { synonyms }
    }

    /// Canonical token string for a name: lower-cased, punctuation and stop
    /// words removed, synonyms applied, tokens sorted and deduplicated.
    pub fn canonical_name(&self, name: &str) -> String {
        let mut lower = name.to_lowercase();
        for (phrase, replacement) in PHRASES {
            lower = lower.replace(phrase, replacement);
        }

        let mut tokens: Vec<String> = lower
            .split(|c: char| !c.is_alphanumeric())
            .filter(|t| !t.is_empty() && !STOP_WORDS.contains(t))
            .map(|t| self.synonyms.get(t).cloned().unwrap_or_else(|| t.to_string()))
            .collect();
        tokens.sort();
        tokens.dedup();
        tokens.join(" ")
    }

    /// Normalize one record. Display values are never modified; placeholder
    /// values are dropped; unparseable values keep their display text, get no
    /// canonical value and are listed in `issues`.
    pub fn normalize(&self, record: &Record) -> Record {
        let mut out = record.clone();
        out.issues.clear();
        out.fields.retain(|_, v| !is_placeholder(&v.display));

        for (field, value) in out.fields.iter_mut() {
            match canonicalize(*field, &value.display) {
                Ok(c) => value.canonical = Some(c),
                Err(e) => {
                    value.canonical = None;
                    out.issues.push(Self::issue(*field, &value.display, e));
                }
            }
        }

        out.match_name = self.canonical_name(&record.name);
        out.match_section = self.canonical_name(&record.section);
        out
    }

    fn issue(field: Field, display: &str, err: Error) -> FieldIssue {
        let reason = match err {
            Error::SchemaMismatch { reason, .. } => reason,
            other => other.to_string(),
        };
        FieldIssue {
            field,
            value: display.to_string(),
            reason,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use quotediff_core::Field;

    #[test]
    fn test_parse_number_separators() {
        assert_eq!(parse_number("10,880"), Some(10880.0));
        assert_eq!(parse_number("1,234,567.5"), Some(1234567.5));
        assert_eq!(parse_number("99,5"), Some(99.5));
        assert_eq!(parse_number("10.880,25"), Some(10880.25));
        assert_eq!(parse_number("20480."), Some(20480.0));
        assert_eq!(parse_number("abc"), None);
    }

    #[test]
    fn test_capacity_units_agree() {
        let gb = parse_capacity_gb("10,880 GB").unwrap();
        let gb_compact = parse_capacity_gb("10880GB").unwrap();
        let tb = parse_capacity_gb("10.88 TB").unwrap();
        assert_eq!(gb, 10880.0);
        assert_eq!(gb, gb_compact);
        assert_eq!(gb, tb);
        assert_eq!(parse_capacity_gb("512").unwrap(), 512.0);
        assert_eq!(parse_capacity_gb("2 TiB").unwrap(), 2048.0);
        assert!(parse_capacity_gb("-5 GB").is_err());
        assert!(parse_capacity_gb("plenty").is_err());
    }

    #[test]
    fn test_flags_and_counts() {
        let ok = |field, display| canonicalize(field, display).unwrap();
        assert_eq!(ok(Field::Dr, "Yes"), Canonical::Flag(true));
        assert_eq!(ok(Field::Pacemaker, "not included"), Canonical::Flag(false));
        assert!(canonicalize(Field::Dr, "maybe").is_err());
        assert_eq!(ok(Field::HanaNodes, "2 nodes"), Canonical::Count(2));
        assert_eq!(ok(Field::StandbyNodes, "none"), Canonical::Count(0));
        assert!(canonicalize(Field::HanaNodes, "1.5").is_err());
        assert_eq!(ok(Field::Phase, "Phase II"), Canonical::Count(2));
        assert_eq!(ok(Field::Phase, "Phase 3"), Canonical::Count(3));
        assert_eq!(ok(Field::Sla, "99.5%"), Canonical::Number(99.5));
        assert!(canonicalize(Field::Sla, "150%").is_err());
    }

    #[test]
    fn test_mismatch_is_typed_error() {
        match canonicalize(Field::Storage, "-5 GB") {
            Err(Error::SchemaMismatch {
                field,
                value,
                reason,
            }) => {
                assert_eq!(field, "storage");
                assert_eq!(value, "-5 GB");
                assert_eq!(reason, "negative capacity");
            }
            other => panic!("expected schema mismatch, got {:?}", other),
        }
        assert!(matches!(
            canonicalize(Field::Amount, "- 3"),
            Err(Error::SchemaMismatch { .. })
        ));
    }

    #[test]
    fn test_hyphenated_words_are_not_signs() {
        assert_eq!(parse_capacity_gb("RAID-5 10 TB").unwrap(), 10000.0);
        assert_eq!(parse_capacity_gb("Tier-2 512 GB").unwrap(), 512.0);
        assert_eq!(parse_capacity_gb("(2 TiB)").unwrap(), 2048.0);
        assert!(parse_capacity_gb("about -5 GB").is_err());
        assert_eq!(
            canonicalize(Field::HanaNodes, "Node-1 x 3").unwrap(),
            Canonical::Count(3)
        );
    }

    #[test]
    fn test_canonical_name_variants() {
        let n = Normalizer::default();
        assert_eq!(n.canonical_name("Domestic DEV"), n.canonical_name("DEV  domestic"));
        assert_eq!(n.canonical_name("S/4HANA Production"), n.canonical_name("S4 HANA PRD"));
        assert_eq!(n.canonical_name("Storage for the Sandbox"), "sbx storage");
    }

    #[test]
    fn test_extra_synonyms() {
        let mut extra = BTreeMap::new();
        extra.insert("Iaas".to_string(), "infra".to_string());
        let n = Normalizer::new(&extra);
        assert_eq!(n.canonical_name("Others IaaS"), "infra other");
    }

    #[test]
    fn test_normalize_flags_schema_mismatch() {
        let record = Record::new("PRD", "Domestic", 0)
            .with(Field::Ram, "lots")
            .with(Field::Storage, "10,880 GB")
            .with(Field::Os, "N/A");
        let normalized = Normalizer::default().normalize(&record);

        assert!(normalized.get(Field::Os).is_none());
        assert_eq!(normalized.canonical(Field::Storage), Some(&Canonical::Number(10880.0)));
        assert!(normalized.canonical(Field::Ram).is_none());
        assert_eq!(normalized.get(Field::Ram).unwrap().display, "lots");
        assert!(normalized.has_issue(Field::Ram));
        assert_eq!(normalized.issues.len(), 1);
        assert_eq!(normalized.issues[0].reason, "no capacity found");
    }

    #[test]
    fn test_normalize_is_idempotent() {
        let record = Record::new("Additional Storage for S4 DEV", "Others IaaS", 3)
            .with(Field::Storage, "10.88 TB")
            .with(Field::Ram, "1,024 GB")
            .with(Field::Sla, "99,5 %")
            .with(Field::Dr, "No")
            .with(Field::HanaNodes, "bad")
            .with(Field::Phase, "Phase 2");
        let normalizer = Normalizer::default();
        let once = normalizer.normalize(&record);
        let twice = normalizer.normalize(&once);
        assert_eq!(once, twice);
        assert_eq!(once.name, "Additional Storage for S4 DEV");
    }
}
