use async_trait::async_trait;
use base64::Engine;
use serde::Deserialize;
use tracing::debug;

use crate::error::VisionError;
use crate::provider::{VisionInput, VisionProvider};
use crate::retry::parse_retry_after;

/// Rasterized-image-only backend via the Chat Completions image content
/// block. Never accepts `VisionInput::NativePdf` — callers must rasterize
/// first (`labtrace-ingest::rasterize`).
pub struct OpenAiVision {
    client: reqwest::Client,
    api_key: String,
    base_url: String,
    model: String,
    max_payload_bytes: usize,
}

impl OpenAiVision {
    pub fn new(api_key: String, model: String, max_payload_bytes: usize) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key,
            base_url: "https://api.openai.com".to_string(),
            model,
            max_payload_bytes,
        }
    }
}

#[async_trait]
impl VisionProvider for OpenAiVision {
    fn name(&self) -> &str {
        "openai"
    }

    fn accepts_native_pdf(&self) -> bool {
        false
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

        let pages = match input {
            VisionInput::Images(pages) => pages,
            VisionInput::NativePdf(_) => {
                return Err(VisionError::SchemaViolation {
                    provider: self.name().to_string(),
                    reason: "openai vision requires rasterized pages, not native PDF".to_string(),
                })
            }
        };

        let mut content = vec![serde_json::json!({ "type": "text", "text": user_prompt })];
        for page in pages {
            content.push(serde_json::json!({
                "type": "image_url",
                "image_url": {
                    "url": format!(
                        "data:image/png;base64,{}",
                        base64::engine::general_purpose::STANDARD.encode(page)
                    ),
                }
            }));
        }

        let body = serde_json::json!({
            "model": self.model,
            "messages": [
                { "role": "system", "content": system_prompt },
                { "role": "user", "content": content },
            ],
            "response_format": {
                "type": "json_schema",
                "json_schema": { "name": "lab_report_extraction", "schema": schema, "strict": true },
            },
        });

        debug!(model = %self.model, "sending vision request to openai");

        let resp = self
            .client
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
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

        let parsed: ChatCompletion = resp.json().await?;
        let content = parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .ok_or_else(|| VisionError::SchemaViolation {
                provider: self.name().to_string(),
                reason: "no choices in response".to_string(),
            })?;

        serde_json::from_str(&content).map_err(|e| VisionError::SchemaViolation {
            provider: self.name().to_string(),
            reason: format!("response was not valid JSON: {e}"),
        })
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletion {
    choices: Vec<Choice>,
}

#[derive(Debug, Deserialize)]
struct Choice {
    message: ChatMessageBody,
}

#[derive(Debug, Deserialize)]
struct ChatMessageBody {
    content: String,
}
