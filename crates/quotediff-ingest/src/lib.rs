//! quotediff ingest — document segmentation, header scanning, record normalization.

pub mod metadata;
pub mod normalize;
pub mod segment;

pub use metadata::scan_metadata;
pub use normalize::{is_placeholder, Normalizer};
pub use segment::{parse_field_line, segment_document, Block, FieldLine, Segmenter};
