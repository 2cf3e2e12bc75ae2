//! Quote header scan — date, version, currency, customer, duration.
//!
//! Header data is pattern-matched from the full text; it never goes through
//! the extraction backend.

use chrono::NaiveDate;
use once_cell::sync::Lazy;
use quotediff_core::DocumentMetadata;
use regex::Regex;

static DATE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bdate\s*:?\s+(\d{4}[/\-.]\d{1,2}[/\-.]\d{1,2})").unwrap());
static VERSION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bversion\s*:\s*([\w\-.]+)").unwrap());
static CURRENCY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?i:currency)\s*:?\s+([A-Z]{3})\b").unwrap());
static CUSTOMER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)\b(?i:customer)\s*:?[ \t]+([^\n]+?)[ \t]*$").unwrap());
static DURATION: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)\bcontract\s*(?:term|duration)?\s*:?\s*(\d+)\s*months?").unwrap());
static COUNTRY: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b(?i:country)\s*:?\s+([A-Z]{2,3})\b").unwrap());
static DATA_CENTER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?m)\bDC\s*:?[ \t]+([^\n]+?)[ \t]*$").unwrap());

/// Parse `YYYY/MM/DD`, `YYYY-MM-DD` or `YYYY.MM.DD`.
pub fn parse_date(s: &str) -> Option<NaiveDate> {
    ["%Y/%m/%d", "%Y-%m-%d", "%Y.%m.%d"]
        .iter()
        .find_map(|fmt| NaiveDate::parse_from_str(s, fmt).ok())
}

fn capture(re: &Regex, text: &str) -> Option<String> {
    re.captures(text)
        .and_then(|c| c.get(1))
        .map(|m| m.as_str().trim().to_string())
        .filter(|s| !s.is_empty())
}

/// Scan page texts for header fields.
pub fn scan_metadata(pages: &[String]) -> DocumentMetadata {
    let text = pages.join("\n");

    DocumentMetadata {
        date: capture(&DATE, &text).and_then(|d| parse_date(&d)),
        page_count: pages.len(),
        version_label: capture(&VERSION, &text),
        currency: capture(&CURRENCY, &text),
        customer: capture(&CUSTOMER, &text),
        duration_months: capture(&DURATION, &text).and_then(|d| d.parse().ok()),
        country: capture(&COUNTRY, &text),
        data_center: capture(&DATA_CENTER, &text),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scan_header() {
        let pages = vec![
            "Customer ACME Manufacturing\nDate 2024/03/15\nVersion: 3-2\nCurrency EUR\nContract 36 months\nCountry DE\nDC Frankfurt (EU10)".to_string(),
            "System Name: PRD".to_string(),
        ];
        let meta = scan_metadata(&pages);
        assert_eq!(meta.page_count, 2);
        assert_eq!(meta.date, NaiveDate::from_ymd_opt(2024, 3, 15));
        assert_eq!(meta.version_label.as_deref(), Some("3-2"));
        assert_eq!(meta.currency.as_deref(), Some("EUR"));
        assert_eq!(meta.customer.as_deref(), Some("ACME Manufacturing"));
        assert_eq!(meta.duration_months, Some(36));
        assert_eq!(meta.country.as_deref(), Some("DE"));
        assert_eq!(meta.data_center.as_deref(), Some("Frankfurt (EU10)"));
    }

    #[test]
    fn test_missing_header_fields() {
        let meta = scan_metadata(&["System Name: PRD".to_string()]);
        assert_eq!(meta.page_count, 1);
        assert!(meta.date.is_none());
        assert!(meta.currency.is_none());
    }

    #[test]
    fn test_parse_date_formats() {
        assert_eq!(parse_date("2024-01-05"), NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(parse_date("2024/1/5"), NaiveDate::from_ymd_opt(2024, 1, 5));
        assert_eq!(parse_date("05.01.2024"), None);
    }
}
