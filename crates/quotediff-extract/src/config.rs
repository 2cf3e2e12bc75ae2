//! LLM provider settings and provider selection.
//!
//! Read once at startup and passed to the engine explicitly; nothing here
//! writes keys back to disk.

use std::path::Path;

use serde::Deserialize;
use tracing::warn;

use crate::types::{LlmConfigResponse, LlmProvider};

pub const DEFAULT_TEMPERATURE: f64 = 0.2;

/// LLM configuration as read from llm-config.json.
#[derive(Debug, Clone, Deserialize)]
pub struct LlmConfig {
    #[serde(default = "default_preferred")]
    pub preferred_provider: String,
    #[serde(default)]
    pub openai_api_key: Option<String>,
    #[serde(default)]
    pub anthropic_api_key: Option<String>,
    #[serde(default)]
    pub groq_api_key: Option<String>,
    #[serde(default = "default_openai_model")]
    pub openai_model: String,
    #[serde(default = "default_anthropic_model")]
    pub anthropic_model: String,
    #[serde(default = "default_groq_model")]
    pub groq_model: String,
    #[serde(default = "default_temperature")]
    pub temperature: f64,
}

fn default_preferred() -> String {
    "auto".into()
}
fn default_openai_model() -> String {
    LlmProvider::OpenAI.default_model().into()
}
fn default_anthropic_model() -> String {
    LlmProvider::Anthropic.default_model().into()
}
fn default_groq_model() -> String {
    LlmProvider::Groq.default_model().into()
}
fn default_temperature() -> f64 {
    DEFAULT_TEMPERATURE
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            preferred_provider: default_preferred(),
            openai_api_key: None,
            anthropic_api_key: None,
            groq_api_key: None,
            openai_model: default_openai_model(),
            anthropic_model: default_anthropic_model(),
            groq_model: default_groq_model(),
            temperature: DEFAULT_TEMPERATURE,
        }
    }
}

/// Provider, model and key chosen for a run.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedProvider {
    pub provider: LlmProvider,
    pub model: String,
    pub api_key: String,
}

impl LlmConfig {
    /// Load config from file, falling back to env vars and defaults.
    pub fn load(config_path: &Path) -> Self {
        let mut config: LlmConfig = match std::fs::read_to_string(config_path) {
            Ok(s) => serde_json::from_str(&s).unwrap_or_else(|e| {
                warn!("Ignoring unreadable LLM config {}: {}", config_path.display(), e);
                LlmConfig::default()
            }),
            Err(_) => LlmConfig::default(),
        };

        if !(0.0..=2.0).contains(&config.temperature) {
            warn!(
                "Temperature {} out of range [0, 2], using {}",
                config.temperature, DEFAULT_TEMPERATURE
            );
            config.temperature = DEFAULT_TEMPERATURE;
        }
        config.apply_env();
        config
    }

    /// Env vars as fallback for API keys.
    fn apply_env(&mut self) {
        let env_key = |name: &str| std::env::var(name).ok().filter(|k| !k.trim().is_empty());
        if self.openai_api_key.is_none() {
            self.openai_api_key = env_key("OPENAI_API_KEY");
        }
        if self.anthropic_api_key.is_none() {
            self.anthropic_api_key = env_key("ANTHROPIC_API_KEY");
        }
        if self.groq_api_key.is_none() {
            self.groq_api_key = env_key("GROQ_API_KEY");
        }
    }

    fn settings(&self, provider: LlmProvider) -> Option<ResolvedProvider> {
        let (key, model) = match provider {
            LlmProvider::OpenAI => (&self.openai_api_key, &self.openai_model),
            LlmProvider::Anthropic => (&self.anthropic_api_key, &self.anthropic_model),
            LlmProvider::Groq => (&self.groq_api_key, &self.groq_model),
        };
        key.as_ref().map(|k| ResolvedProvider {
            provider,
            model: model.clone(),
            api_key: k.clone(),
        })
    }

    /// Resolve which provider and model to use.
    pub fn resolve_provider(&self) -> Option<ResolvedProvider> {
        // Explicit preference
        if self.preferred_provider != "auto" {
            return self
                .preferred_provider
                .parse::<LlmProvider>()
                .ok()
                .and_then(|p| self.settings(p));
        }

        // Auto mode: OpenAI > Groq > Anthropic
        [LlmProvider::OpenAI, LlmProvider::Groq, LlmProvider::Anthropic]
            .into_iter()
            .find_map(|p| self.settings(p))
    }

    /// Build the public config response (no API keys exposed).
    pub fn to_response(&self) -> LlmConfigResponse {
        LlmConfigResponse {
            preferred_provider: self.preferred_provider.clone(),
            openai_configured: self.openai_api_key.is_some(),
            anthropic_configured: self.anthropic_api_key.is_some(),
            groq_configured: self.groq_api_key.is_some(),
            openai_model: self.openai_model.clone(),
            anthropic_model: self.anthropic_model.clone(),
            groq_model: self.groq_model.clone(),
            temperature: self.temperature,
            active_provider: self.resolve_provider().map(|r| r.provider.to_string()),
        }
    }
}
