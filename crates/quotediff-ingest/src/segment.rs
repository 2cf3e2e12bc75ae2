//! Document segmentation — page text → line-item blocks.
//!
//! A block is a run of lines describing one line item. Boundaries come from
//! headings (which also set the current section), blank lines, and a known
//! field key repeating inside the current block.

use std::collections::HashSet;

use once_cell::sync::Lazy;
use quotediff_core::schema::{resolve_label, Label};
use quotediff_core::{Error, Result};
use regex::Regex;
use serde::{Deserialize, Serialize};
use tracing::debug;

/// Longest line still considered a heading.
pub const MAX_HEADING_LEN: usize = 60;

static MARKDOWN_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^#{1,6}\s+(.+?)\s*#*$").unwrap());
static BRACKET_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^\[([^\]]+)\]$").unwrap());
static EXPLICIT_HEADING: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"(?i)^(?:section|category)\s*[:\-]\s*(.+)$").unwrap());
static COLON_HEADING: Lazy<Regex> = Lazy::new(|| Regex::new(r"^([^:]+):$").unwrap());
static FIELD_LINE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"^\s*(?:[-*•]\s*)?([A-Za-z][A-Za-z0-9 ./()&\-]*?)\s*(?::|=|\t|\s{2,})\s*(\S.*?)\s*$")
        .unwrap()
});

/// A span of document text believed to describe one line item.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    /// Position in the document, 0-based and dense.
    pub index: usize,
    /// Page the block starts on, 0-based.
    pub page: usize,
    /// Heading in effect when the block started.
    pub section: Option<String>,
    pub text: String,
}

/// A `key: value` line whose key names a known attribute.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FieldLine<'a> {
    pub label: Label,
    pub key: &'a str,
    pub value: &'a str,
}

/// Parse a `key: value` line (also `key = value`, tab- or wide-space-separated).
/// Returns `None` unless the key resolves to a known label.
pub fn parse_field_line(line: &str) -> Option<FieldLine<'_>> {
    let caps = FIELD_LINE.captures(line)?;
    let key = caps.get(1)?.as_str().trim();
    let value = caps.get(2)?.as_str();
    let label = resolve_label(key)?;
    Some(FieldLine { label, key, value })
}

/// Splits documents into blocks.
#[derive(Debug, Clone)]
pub struct Segmenter {
    max_heading_len: usize,
}

impl Default for Segmenter {
    fn default() -> Self {
        Self {
            max_heading_len: MAX_HEADING_LEN,
        }
    }
}

struct Pending<'a> {
    lines: Vec<&'a str>,
    keys: HashSet<Label>,
    page: usize,
}

impl Segmenter {
    pub fn new(max_heading_len: usize) -> Self {
        Self { max_heading_len }
    }

    /// Segment ordered page texts into ordered blocks.
    ///
    /// Fails with [`Error::Segmentation`] when no block carries a recognizable
    /// field line.
    pub fn segment(&self, pages: &[String]) -> Result<Vec<Block>> {
        let mut blocks = Vec::new();
        let mut section: Option<String> = None;
        let mut pending = Pending {
            lines: Vec::new(),
            keys: HashSet::new(),
            page: 0,
        };

        for (page_no, page) in pages.iter().enumerate() {
            for line in page.lines() {
                let trimmed = line.trim();

                if trimmed.is_empty() {
                    Self::flush(&mut pending, &section, &mut blocks);
                    continue;
                }

                if let Some(heading) = self.heading(trimmed, pending.lines.is_empty()) {
                    Self::flush(&mut pending, &section, &mut blocks);
                    debug!("Section heading on page {}: {}", page_no, heading);
                    section = Some(heading);
                    continue;
                }

                if let Some(field) = parse_field_line(trimmed) {
                    if pending.keys.contains(&field.label) {
                        Self::flush(&mut pending, &section, &mut blocks);
                    }
                    pending.keys.insert(field.label);
                }

                if pending.lines.is_empty() {
                    pending.page = page_no;
                }
                pending.lines.push(trimmed);
            }
        }
        Self::flush(&mut pending, &section, &mut blocks);

        if blocks.is_empty() {
            return Err(Error::Segmentation(format!(
                "no line-item blocks found in {} page(s)",
                pages.len()
            )));
        }

        debug!("Segmented {} pages into {} blocks", pages.len(), blocks.len());
        Ok(blocks)
    }

    fn flush(pending: &mut Pending<'_>, section: &Option<String>, blocks: &mut Vec<Block>) {
        if pending.lines.is_empty() {
            return;
        }
        if pending.keys.is_empty() {
            debug!("Skipping prose block: {:?}", pending.lines.first());
        } else {
            blocks.push(Block {
                index: blocks.len(),
                page: pending.page,
                section: section.clone(),
                text: pending.lines.join("\n"),
            });
        }
        pending.lines.clear();
        pending.keys.clear();
    }

    /// Heading text if the line is a heading. Weaker cues (explicit
    /// `Section:` lines, upper-case titles) only count at a block start.
    fn heading(&self, line: &str, at_block_start: bool) -> Option<String> {
        if line.len() > self.max_heading_len {
            return None;
        }
        if let Some(c) = MARKDOWN_HEADING.captures(line) {
            return Some(c[1].trim().to_string());
        }
        if let Some(c) = BRACKET_HEADING.captures(line) {
            return Some(c[1].trim().to_string());
        }
        if let Some(c) = COLON_HEADING.captures(line) {
            let key = c[1].trim();
            // `OS:` with an empty value is still a field, not a heading.
            if resolve_label(key).is_none() {
                return Some(key.to_string());
            }
        }
        if !at_block_start {
            return None;
        }
        if let Some(c) = EXPLICIT_HEADING.captures(line) {
            return Some(c[1].trim().to_string());
        }
        if parse_field_line(line).is_none() && Self::is_title_case_caps(line) {
            return Some(line.to_string());
        }
        None
    }

    fn is_title_case_caps(line: &str) -> bool {
        let letters: Vec<char> = line.chars().filter(|c| c.is_alphabetic()).collect();
        letters.len() >= 3
            && letters.iter().all(|c| c.is_uppercase())
            && !line.contains(':')
            && line.split_whitespace().count() >= 2
    }
}

/// Segment with default settings.
pub fn segment_document(pages: &[String]) -> Result<Vec<Block>> {
    Segmenter::default().segment(pages)
}
