//! quotediff core — line-item model, field schema, errors, configuration.

pub mod config;
pub mod error;
pub mod model;
pub mod schema;

pub use config::DiffConfig;
pub use error::{Error, Result};
pub use model::*;
pub use schema::{ExtractionSchema, Field, FieldKind, FieldSpec, Label};
