//! Shared application state.

use quotediff_core::DiffConfig;
use quotediff_extract::{create_backend, LlmConfig};
use quotediff_runtime::Comparator;

/// Shared application state accessible from all route handlers.
///
/// Provider settings are read once at startup and handed to the engine.
pub struct AppState {
    pub config: DiffConfig,
    pub llm_config: LlmConfig,
    pub comparator: Comparator,
}

impl AppState {
    pub fn new(config: DiffConfig, llm_config: LlmConfig) -> Self {
        let comparator = Comparator::new(config.clone(), create_backend(&llm_config, &config));
        Self {
            config,
            llm_config,
            comparator,
        }
    }
}
