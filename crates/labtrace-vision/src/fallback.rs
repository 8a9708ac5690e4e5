use std::sync::{Arc, RwLock};

use tracing::{info, warn};

use crate::error::VisionError;
use crate::provider::{VisionInput, VisionProvider};
use crate::retry::{with_retry, DEFAULT_MAX_ATTEMPTS};

/// Invoked once when the wrapper fails over from primary to secondary.
/// Passed per call (not wired once at construction) so a caller with more
/// context than a provider name pair — e.g. `labtrace-ingest` reporting
/// failover through a specific job's progress record — can close over it.
pub type OnSwitch = dyn Fn(&str, &str) + Sync;

#[derive(Debug, thiserror::Error)]
#[error("both providers failed: primary ({primary}), secondary ({secondary})")]
pub struct FallbackError {
    pub primary: VisionError,
    pub secondary: VisionError,
}

/// Wraps a primary and secondary [`VisionProvider`]. Tries primary first;
/// on a retryable-class error, notifies via the caller's `on_switch` and
/// retries once against secondary. Generalizes the reference architecture's
/// reconnect-with-backoff wrapper to a two-provider failover instead of a
/// single-provider retry loop.
pub struct FallbackProvider {
    primary: Arc<dyn VisionProvider>,
    secondary: Arc<dyn VisionProvider>,
    last_used_model: RwLock<String>,
}

impl FallbackProvider {
    pub fn new(primary: Arc<dyn VisionProvider>, secondary: Arc<dyn VisionProvider>) -> Self {
        let initial = primary.name().to_string();
        Self {
            primary,
            secondary,
            last_used_model: RwLock::new(initial),
        }
    }

    pub fn last_used_model(&self) -> String {
        self.last_used_model.read().expect("lock poisoned").clone()
    }

    /// Rasterize-on-demand gate for callers: `true` iff the currently
    /// preferred provider needs rasterized input rather than native PDF.
    pub fn primary_needs_rasterized_input(&self) -> bool {
        !self.primary.accepts_native_pdf()
    }

    pub async fn analyze(
        &self,
        input_for_primary: &VisionInput,
        input_for_secondary: &VisionInput,
        system_prompt: &str,
        user_prompt: &str,
        schema: &serde_json::Value,
        on_switch: Option<&OnSwitch>,
    ) -> Result<serde_json::Value, FallbackError> {
        let primary_result = with_retry(self.primary.name(), DEFAULT_MAX_ATTEMPTS, || {
            self.primary.analyze(input_for_primary, system_prompt, user_prompt, schema)
        })
        .await;

        match primary_result {
            Ok(value) => {
                *self.last_used_model.write().expect("lock poisoned") = self.primary.name().to_string();
                Ok(value)
            }
            Err(primary_err) if primary_err.is_retryable() => {
                warn!(
                    primary = self.primary.name(),
                    secondary = self.secondary.name(),
                    error = %primary_err,
                    "primary vision provider failed, switching to secondary"
                );
                if let Some(hook) = on_switch {
                    hook(self.primary.name(), self.secondary.name());
                }

                let secondary_result = with_retry(self.secondary.name(), DEFAULT_MAX_ATTEMPTS, || {
                    self.secondary.analyze(input_for_secondary, system_prompt, user_prompt, schema)
                })
                .await;

                match secondary_result {
                    Ok(value) => {
                        info!(provider = self.secondary.name(), "secondary vision provider succeeded");
                        *self.last_used_model.write().expect("lock poisoned") =
                            self.secondary.name().to_string();
                        Ok(value)
                    }
                    Err(secondary_err) => Err(FallbackError {
                        primary: primary_err,
                        secondary: secondary_err,
                    }),
                }
            }
            Err(primary_err) => Err(FallbackError {
                primary: primary_err,
                secondary: VisionError::Unavailable {
                    provider: self.secondary.name().to_string(),
                    reason: "not attempted: primary error was not retryable".to_string(),
                },
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};

    struct StubProvider {
        name: &'static str,
        fail_times: AtomicUsize,
        native_pdf: bool,
    }

    #[async_trait]
    impl VisionProvider for StubProvider {
        fn name(&self) -> &str {
            self.name
        }
        fn accepts_native_pdf(&self) -> bool {
            self.native_pdf
        }
        fn max_payload_bytes(&self) -> usize {
            10_000_000
        }
        async fn analyze(
            &self,
            _input: &VisionInput,
            _system_prompt: &str,
            _user_prompt: &str,
            _schema: &serde_json::Value,
        ) -> Result<serde_json::Value, VisionError> {
            if self.fail_times.load(Ordering::SeqCst) > 0 {
                self.fail_times.fetch_sub(1, Ordering::SeqCst);
                return Err(VisionError::Api {
                    provider: self.name.to_string(),
                    status: 529,
                    message: "overloaded".to_string(),
                });
            }
            Ok(serde_json::json!({ "ok": true }))
        }
    }

    #[tokio::test]
    async fn falls_over_on_retryable_primary_error() {
        let primary = Arc::new(StubProvider {
            name: "primary",
            fail_times: AtomicUsize::new(10),
            native_pdf: true,
        });
        let secondary = Arc::new(StubProvider {
            name: "secondary",
            fail_times: AtomicUsize::new(0),
            native_pdf: false,
        });
        let switched = Arc::new(AtomicBool::new(false));
        let switched_clone = switched.clone();
        let on_switch = move |_from: &str, _to: &str| switched_clone.store(true, Ordering::SeqCst);

        let wrapper = FallbackProvider::new(primary, secondary);

        let input = VisionInput::NativePdf(vec![1, 2, 3]);
        let result = wrapper
            .analyze(&input, &input, "sys", "user", &serde_json::json!({}), Some(&on_switch))
            .await;

        assert!(result.is_ok());
        assert!(switched.load(Ordering::SeqCst));
        assert_eq!(wrapper.last_used_model(), "secondary");
    }
}
