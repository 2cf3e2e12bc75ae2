//! External LLM providers as extraction backends.
//!
//! OpenAI and Groq (and any OpenAI-compatible `backend_endpoint`) share the
//! chat-completions format. Anthropic uses the Messages API.

use futures::future::BoxFuture;
use quotediff_core::{DiffConfig, Error, ExtractionSchema, Result};
use quotediff_ingest::Block;
use reqwest::Client;
use serde_json::json;
use tracing::{debug, info};

use crate::backend::{ExtractionBackend, RawRecord};
use crate::config::LlmConfig;
use crate::types::LlmProvider;

const MAX_TOKENS: usize = 1024;

const SYSTEM_PROMPT: &str = "You extract one line item from a cloud infrastructure quote. \
Return a single JSON object with the requested keys. Copy values exactly as written, \
including units such as GB or TB. Omit keys that the text does not mention. \
Do not invent values.";

/// Chat-based extraction backend.
#[derive(Clone)]
pub struct ChatBackend {
    client: Client,
    provider: LlmProvider,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f64,
}

impl ChatBackend {
    pub fn new(
        provider: LlmProvider,
        endpoint: Option<String>,
        model: impl Into<String>,
        api_key: impl Into<String>,
        temperature: f64,
    ) -> Self {
        let endpoint = endpoint
            .unwrap_or_else(|| provider.default_endpoint().to_string())
            .trim_end_matches('/')
            .to_string();
        Self {
            client: Client::new(),
            provider,
            endpoint,
            model: model.into(),
            api_key: api_key.into(),
            temperature,
        }
    }

    /// Build from the configured provider, or `None` if no key is available.
    pub fn from_config(llm: &LlmConfig, config: &DiffConfig) -> Option<Self> {
        let resolved = llm.resolve_provider()?;
        info!(
            "Using {} ({}) for extraction",
            resolved.provider, resolved.model
        );
        Some(Self::new(
            resolved.provider,
            config.backend_endpoint.clone(),
            resolved.model,
            resolved.api_key,
            llm.temperature,
        ))
    }

    pub fn provider(&self) -> LlmProvider {
        self.provider
    }

    async fn call_openai_compat(&self, block: &Block, schema: &ExtractionSchema) -> Result<RawRecord> {
        let (system, user) = build_prompts(block, schema);
        let url = format!("{}/chat/completions", self.endpoint);

        let response_format = match self.provider {
            LlmProvider::Groq => json!({"type": "json_object"}),
            _ => json!({
                "type": "json_schema",
                "json_schema": {"name": "line_item", "schema": schema.to_json_schema()},
            }),
        };
        let body = json!({
            "model": self.model,
            "messages": [
                {"role": "system", "content": system},
                {"role": "user", "content": user},
            ],
            "temperature": self.temperature,
            "max_tokens": MAX_TOKENS,
            "response_format": response_format,
        });

        debug!("Extracting block {} via {} with model {}", block.index, url, self.model);

        let response = self
            .client
            .post(&url)
            .header("Authorization", format!("Bearer {}", self.api_key))
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Backend(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("Unreadable response: {}", e)))?;
        parse_openai_response(&value)
    }

    async fn call_anthropic(&self, block: &Block, schema: &ExtractionSchema) -> Result<RawRecord> {
        let (system, user) = build_prompts(block, schema);
        let url = format!("{}/messages", self.endpoint);

        let body = json!({
            "model": self.model,
            "system": system,
            "messages": [{"role": "user", "content": user}],
            "temperature": self.temperature,
            "max_tokens": MAX_TOKENS,
        });

        debug!("Extracting block {} via Anthropic with model {}", block.index, self.model);

        let response = self
            .client
            .post(&url)
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", "2023-06-01")
            .header("Content-Type", "application/json")
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::Backend(format!("Request failed: {}", e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(classify_status(status.as_u16(), &body));
        }

        let value: serde_json::Value = response
            .json()
            .await
            .map_err(|e| Error::Backend(format!("Unreadable response: {}", e)))?;
        parse_anthropic_response(&value)
    }
}

impl ExtractionBackend for ChatBackend {
    fn extract<'a>(
        &'a self,
        block: &'a Block,
        schema: &'a ExtractionSchema,
    ) -> BoxFuture<'a, Result<RawRecord>> {
        Box::pin(async move {
            if self.provider.is_openai_compatible() {
                self.call_openai_compat(block, schema).await
            } else {
                self.call_anthropic(block, schema).await
            }
        })
    }

    fn name(&self) -> &str {
        match self.provider {
            LlmProvider::OpenAI => "openai",
            LlmProvider::Anthropic => "anthropic",
            LlmProvider::Groq => "groq",
        }
    }
}

/// System and user prompts for one block.
pub fn build_prompts(block: &Block, schema: &ExtractionSchema) -> (String, String) {
    let keys: Vec<String> = schema
        .fields
        .iter()
        .map(|s| format!("- {} ({})", s.field.key(), s.field.label()))
        .collect();

    let mut user = String::new();
    if let Some(section) = &block.section {
        user.push_str(&format!("Section heading: {}\n\n", section));
    }
    user.push_str("Keys:\n- name (System Name)\n- section\n");
    user.push_str(&keys.join("\n"));
    user.push_str("\n\nText:\n");
    user.push_str(&block.text);

    (SYSTEM_PROMPT.to_string(), user)
}

/// Map a non-success status to an error. Rate limits and server errors are
/// retryable; other client errors are final.
pub fn classify_status(status: u16, body: &str) -> Error {
    let message = format!("API error {}: {}", status, body.trim());
    if status == 429 || status >= 500 {
        Error::Backend(message)
    } else {
        Error::Http(message)
    }
}

/// Read `choices[0].message.content` from a chat-completions response.
pub fn parse_openai_response(value: &serde_json::Value) -> Result<RawRecord> {
    let content = value["choices"][0]["message"]["content"]
        .as_str()
        .ok_or_else(|| Error::Backend("response has no message content".into()))?;
    parse_content(content)
}

/// Read the first text block from a Messages API response.
pub fn parse_anthropic_response(value: &serde_json::Value) -> Result<RawRecord> {
    let content = value["content"]
        .as_array()
        .and_then(|blocks| {
            blocks
                .iter()
                .find(|b| b["type"] == "text")
                .and_then(|b| b["text"].as_str())
        })
        .ok_or_else(|| Error::Backend("response has no text content".into()))?;
    parse_content(content)
}

fn parse_content(content: &str) -> Result<RawRecord> {
    let json: serde_json::Value = serde_json::from_str(strip_code_fences(content))?;
    RawRecord::from_json(&json)
}

fn strip_code_fences(content: &str) -> &str {
    let trimmed = content.trim();
    let Some(rest) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let rest = rest.strip_prefix("json").unwrap_or(rest);
    rest.strip_suffix("```").unwrap_or(rest).trim()
}
