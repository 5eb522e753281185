mod client;
pub(crate) mod types;

use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;

use crate::traits::{Message, StructuredModel, StructuredPrompt};
use crate::util::strip_code_blocks;

use client::OpenAiClient;
use types::*;

// =============================================================================
// OpenAi
// =============================================================================

/// Client for OpenAI-compatible chat completion endpoints.
///
/// Gemini works through `with_base_url("https://generativelanguage.googleapis.com/v1beta/openai")`.
#[derive(Clone)]
pub struct OpenAi {
    api_key: String,
    model: String,
    base_url: Option<String>,
    timeout: Option<Duration>,
    http: reqwest::Client,
}

impl OpenAi {
    pub fn new(api_key: impl Into<String>, model: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            model: model.into(),
            base_url: None,
            timeout: None,
            http: reqwest::Client::new(),
        }
    }

    pub fn with_base_url(mut self, url: impl Into<String>) -> Self {
        self.base_url = Some(url.into());
        self
    }

    /// Per-request HTTP timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn base_url(&self) -> &str {
        self.base_url.as_deref().unwrap_or(client::OPENAI_API_URL)
    }

    fn client(&self) -> OpenAiClient {
        let client = OpenAiClient::new(&self.api_key, self.http.clone()).with_timeout(self.timeout);
        match self.base_url {
            Some(ref url) => client.with_base_url(url),
            None => client,
        }
    }

    fn build_request(&self, prompt: StructuredPrompt) -> StructuredRequest {
        let mut messages = Vec::with_capacity(prompt.messages.len() + 1);
        if !prompt.system.is_empty() {
            messages.push(WireMessage::from(&Message::system(prompt.system)));
        }
        messages.extend(prompt.messages.iter().map(WireMessage::from));

        StructuredRequest {
            model: self.model.clone(),
            messages,
            temperature: accepts_temperature(&self.model).then_some(0.0),
            response_format: ResponseFormat {
                format_type: "json_schema".to_string(),
                json_schema: JsonSchemaFormat {
                    name: prompt.schema_name,
                    strict: true,
                    schema: prompt.schema,
                },
            },
        }
    }
}

#[async_trait]
impl StructuredModel for OpenAi {
    fn model(&self) -> &str {
        &self.model
    }

    async fn structured(&self, prompt: StructuredPrompt) -> Result<Value> {
        let request = self.build_request(prompt);
        let text = self.client().structured_output(&request).await?;

        serde_json::from_str(strip_code_blocks(&text))
            .map_err(|e| anyhow!("Structured output is not valid JSON: {}", e))
    }
}
