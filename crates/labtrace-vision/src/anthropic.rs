use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use crate::error::VisionError;
use crate::provider::{VisionInput, VisionProvider};
use crate::retry::parse_retry_after;

const API_VERSION: &str = "2023-06-01";

/// Reads native PDF bytes via the Messages API's `document` content block —
/// no rasterization needed for this provider.
pub struct AnthropicVision {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_payload_bytes: usize,
}

impl AnthropicVision {
    pub fn new(api_key: String, model: String, max_payload_bytes: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://api.anthropic.com".to_string(),
            model,
            max_payload_bytes,
        }
    }
}

#[async_trait]
impl VisionProvider for AnthropicVision {
    fn name(&self) -> &str {
        "anthropic"
    }

    fn accepts_native_pdf(&self) -> bool {
        true
    }

    fn max_payload_bytes(&self) -> usize {
        self.max_payload_bytes
    }

    async fn analyze(
        &self,
        input: &VisionInput,
        system_prompt: &str,
        user_prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, VisionError> {
        self.check_payload_size(input)?;

        let content_blocks = match input {
            VisionInput::NativePdf(bytes) => vec![serde_json::json!({
                "type": "document",
                "source": {
                    "type": "base64",
                    "media_type": "application/pdf",
                    "data": base64::engine::general_purpose::STANDARD.encode(bytes),
                }
            })],
            VisionInput::Images(pages) => pages
                .iter()
                .map(|page| {
                    serde_json::json!({
                        "type": "image",
                        "source": {
                            "type": "base64",
                            "media_type": "image/png",
                            "data": base64::engine::general_purpose::STANDARD.encode(page),
                        }
                    })
                })
                .collect(),
        };

        let mut blocks = content_blocks;
        blocks.push(serde_json::json!({ "type": "text", "text": user_prompt }));

        let body = serde_json::json!({
            "model": self.model,
            "max_tokens": 8192,
            "system": system_prompt,
            "messages": [{ "role": "user", "content": blocks }],
            "tools": [{
                "name": "emit_structured_result",
                "description": "Emit the extracted lab report data conforming exactly to the given schema.",
                "input_schema": schema,
            }],
            "tool_choice": { "type": "tool", "name": "emit_structured_result" },
        });

        debug!(model = %self.model, "sending vision request to anthropic");

        let resp = self
            .client
            .post(format!("{}/v1/messages", self.base_url))
            .header("x-api-key", &self.api_key)
            .header("anthropic-version", API_VERSION)
            .header("content-type", "application/json")
            .json(&body)
            .send()
            .await?;

        let status = resp.status().as_u16();
        if status == 429 {
            let retry_after_ms = resp
                .headers()
                .get("retry-after")
                .and_then(|v| v.to_str().ok())
                .and_then(parse_retry_after)
                .map(|d| d.as_millis() as u64)
                .unwrap_or(5_000);
            return Err(VisionError::RateLimited {
                provider: self.name().to_string(),
                retry_after_ms,
            });
        }

        if !resp.status().is_success() {
            let message = resp.text().await.unwrap_or_default();
            return Err(VisionError::Api {
                provider: self.name().to_string(),
                status,
                message,
            });
        }

        let parsed: AnthropicMessage = resp.json().await?;
        let tool_use = parsed
            .content
            .into_iter()
            .find_map(|block| match block {
                ContentBlock::ToolUse { input, .. } => Some(input),
                _ => None,
            })
            .ok_or_else(|| VisionError::SchemaViolation {
                provider: self.name().to_string(),
                reason: "no tool_use block in response".to_string(),
            })?;

        Ok(tool_use)
    }
}

#[derive(Debug, Deserialize)]
struct AnthropicMessage {
    content: Vec<ContentBlock>,
}

#[derive(Debug, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentBlock {
    Text { text: String },
    ToolUse { id: String, name: String, input: serde_json::Value },
}
