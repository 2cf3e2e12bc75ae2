//! Engine configuration: concurrency, retries, matching thresholds.

use std::collections::BTreeMap;
use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::{Error, Result};
use crate::schema::Field;

pub const DEFAULT_WORKER_COUNT: usize = 5;
pub const DEFAULT_TIMEOUT_PER_CALL_SECS: u64 = 60;
pub const DEFAULT_RETRY_COUNT: u32 = 2;
pub const DEFAULT_RETRY_BACKOFF_MS: u64 = 750;
pub const DEFAULT_RUN_TIMEOUT_SECS: u64 = 600;
pub const DEFAULT_SIMILARITY_THRESHOLD: f64 = 0.6;
pub const DEFAULT_CROSS_SECTION_FLOOR: f64 = 0.75;

/// Options recognized by a comparison run.
///
/// Passed explicitly into the engine; nothing here is global.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DiffConfig {
    /// Where extraction calls are sent. `None` uses the provider default.
    pub backend_endpoint: Option<String>,
    /// Maximum concurrent backend calls, shared by both documents.
    pub worker_count: usize,
    pub timeout_per_call_secs: u64,
    /// Retries after the first attempt.
    pub retry_count: u32,
    /// First backoff delay; doubles per retry.
    pub retry_backoff_ms: u64,
    /// Budget for all extraction in one run.
    pub run_timeout_secs: u64,
    /// Minimum match score for a correspondence.
    pub similarity_threshold: f64,
    /// Name similarity needed to consider a pair across sections.
    pub cross_section_floor: f64,
    /// Break equal scores in favour of same-section pairs.
    pub prefer_same_section: bool,
    /// Per-field comparison tolerances, in canonical units.
    pub field_epsilon_overrides: BTreeMap<Field, f64>,
    /// Extra name-token synonyms (`from` → `to`), applied after the built-ins.
    pub synonyms: BTreeMap<String, String>,
}

impl Default for DiffConfig {
    fn default() -> Self {
        Self {
            backend_endpoint: None,
            worker_count: DEFAULT_WORKER_COUNT,
            timeout_per_call_secs: DEFAULT_TIMEOUT_PER_CALL_SECS,
            retry_count: DEFAULT_RETRY_COUNT,
            retry_backoff_ms: DEFAULT_RETRY_BACKOFF_MS,
            run_timeout_secs: DEFAULT_RUN_TIMEOUT_SECS,
            similarity_threshold: DEFAULT_SIMILARITY_THRESHOLD,
            cross_section_floor: DEFAULT_CROSS_SECTION_FLOOR,
            prefer_same_section: true,
            field_epsilon_overrides: BTreeMap::new(),
            synonyms: BTreeMap::new(),
        }
    }
}

impl DiffConfig {
    /// Load from a JSON file (missing keys take defaults), then apply
    /// `QUOTEDIFF_*` environment overrides and validate.
    pub fn load(path: &Path) -> Result<Self> {
        let mut config: DiffConfig = match std::fs::read_to_string(path) {
            Ok(s) => serde_json::from_str(&s)
                .map_err(|e| Error::Config(format!("{}: {}", path.display(), e)))?,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                warn!("Config {} not found, using defaults", path.display());
                DiffConfig::default()
            }
            Err(e) => return Err(e.into()),
        };
        config.apply_env();
        config.validate()?;
        info!(
            "Loaded config from {}: workers={}, threshold={}",
            path.display(),
            config.worker_count,
            config.similarity_threshold
        );
        Ok(config)
    }

    /// Defaults plus environment overrides.
    pub fn from_env() -> Result<Self> {
        let mut config = DiffConfig::default();
        config.apply_env();
        config.validate()?;
        Ok(config)
    }

    fn apply_env(&mut self) {
        if let Ok(v) = std::env::var("QUOTEDIFF_BACKEND_ENDPOINT") {
            self.backend_endpoint = Some(v);
        }
        if let Some(v) = env_parse("QUOTEDIFF_WORKERS") {
            self.worker_count = v;
        }
        if let Some(v) = env_parse("QUOTEDIFF_TIMEOUT_SECS") {
            self.timeout_per_call_secs = v;
        }
        if let Some(v) = env_parse("QUOTEDIFF_RETRIES") {
            self.retry_count = v;
        }
        if let Some(v) = env_parse("QUOTEDIFF_RUN_TIMEOUT_SECS") {
            self.run_timeout_secs = v;
        }
        if let Some(v) = env_parse("QUOTEDIFF_SIMILARITY_THRESHOLD") {
            self.similarity_threshold = v;
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(Error::Config("worker_count must be at least 1".into()));
        }
        if self.timeout_per_call_secs == 0 || self.run_timeout_secs == 0 {
            return Err(Error::Config("timeouts must be positive".into()));
        }
        for (name, v) in [
            ("similarity_threshold", self.similarity_threshold),
            ("cross_section_floor", self.cross_section_floor),
        ] {
            if !(0.0..=1.0).contains(&v) {
                return Err(Error::Config(format!("{} must be within 0..=1, got {}", name, v)));
            }
        }
        if let Some((field, eps)) = self
            .field_epsilon_overrides
            .iter()
            .find(|(_, eps)| !eps.is_finite() || **eps < 0.0)
        {
            return Err(Error::Config(format!(
                "epsilon for {} must be a non-negative number, got {}",
                field.key(),
                eps
            )));
        }
        Ok(())
    }

    pub fn timeout_per_call(&self) -> Duration {
        Duration::from_secs(self.timeout_per_call_secs)
    }

    pub fn run_timeout(&self) -> Duration {
        Duration::from_secs(self.run_timeout_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }
}

fn env_parse<T: std::str::FromStr>(key: &str) -> Option<T> {
    std::env::var(key).ok().and_then(|v| v.parse().ok())
}
