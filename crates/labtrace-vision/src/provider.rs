use async_trait::async_trait;

use crate::error::VisionError;

/// The bytes a vision provider is asked to read. Native-PDF-capable
/// providers accept `NativePdf` directly; rasterization-only providers
/// require `Images` (produced by `labtrace-ingest`'s rasterize stage).
#[derive(Debug, Clone)]
pub enum VisionInput {
    NativePdf(Vec<u8>),
    Images(Vec<Vec<u8>>),
}

impl VisionInput {
    pub fn byte_len(&self) -> usize {
        match self {
            VisionInput::NativePdf(bytes) => bytes.len(),
            VisionInput::Images(pages) => pages.iter().map(|p| p.len()).sum(),
        }
    }
}

/// Common interface for OCR backends. Mirrors the reference architecture's
/// `LlmProvider` trait shape — a `name()` for attribution plus one async
/// entry point — generalized to a structured-output vision call instead of
/// a chat completion.
#[async_trait]
pub trait VisionProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Whether this provider accepts `VisionInput::NativePdf` directly.
    /// If `false`, callers must rasterize before calling `analyze`.
    fn accepts_native_pdf(&self) -> bool;

    fn max_payload_bytes(&self) -> usize;

    /// Run OCR + structured extraction. The returned JSON conforms
    /// bit-exactly to `schema` (every property present, nulls rather than
    /// missing fields) — providers are responsible for enforcing this via
    /// their structured-output mechanism.
    async fn analyze(
        &self,
        input: &VisionInput,
        system_prompt: &str,
        user_prompt: &str,
        schema: &serde_json::Value,
    ) -> Result<serde_json::Value, VisionError>;

    fn check_payload_size(&self, input: &VisionInput) -> Result<(), VisionError> {
        let size = input.byte_len();
        let limit = self.max_payload_bytes();
        if size > limit {
            return Err(VisionError::TooLarge {
                provider: self.name().to_string(),
                size,
                limit,
            });
        }
        Ok(())
    }
}
