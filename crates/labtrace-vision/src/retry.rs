use std::future::Future;
use std::time::Duration;

use tracing::warn;

use crate::error::VisionError;

/// Default attempt ceiling (§4.4).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 5;
/// Backoff base for generic transient errors (network, 5xx).
const BACKOFF_BASE_MS: u64 = 500;
/// Backoff base for rate limits with no `Retry-After` header — rate limits
/// warrant a longer initial wait than a transient 5xx.
const RATE_LIMIT_BASE_MS: u64 = 2_000;
const BACKOFF_CAP_MS: u64 = 30_000;
const JITTER_FRACTION: f64 = 0.20;

/// Parse a `Retry-After` header value: either an integer delay in seconds,
/// or an HTTP-date.
pub fn parse_retry_after(value: &str) -> Option<Duration> {
    if let Ok(secs) = value.trim().parse::<u64>() {
        return Some(Duration::from_secs(secs));
    }
    let at = httpdate::parse_http_date(value.trim()).ok()?;
    let now = std::time::SystemTime::now();
    at.duration_since(now).ok()
}

fn jittered(base_ms: u64) -> Duration {
    let nanos = std::time::SystemTime::now()
        .duration_since(std::time::UNIX_EPOCH)
        .map(|d| d.subsec_nanos())
        .unwrap_or(0);
    let max_jitter = (base_ms as f64 * JITTER_FRACTION) as u64;
    let jitter = if max_jitter == 0 { 0 } else { (nanos as u64) % max_jitter };
    Duration::from_millis(base_ms + jitter)
}

/// Run `f` up to `max_attempts` times, applying exponential backoff with
/// jitter between retryable failures. Honors an explicit `Retry-After`
/// delay carried on `VisionError::RateLimited` in preference to the
/// computed backoff schedule.
pub async fn with_retry<F, Fut, T>(
    provider_name: &str,
    max_attempts: u32,
    f: F,
) -> Result<T, VisionError>
where
    F: Fn() -> Fut,
    Fut: Future<Output = Result<T, VisionError>>,
{
    let mut delay_ms = BACKOFF_BASE_MS;

    for attempt in 1..=max_attempts {
        match f().await {
            Ok(value) => return Ok(value),
            Err(e) if attempt == max_attempts || !e.is_retryable() => return Err(e),
            Err(VisionError::RateLimited { retry_after_ms, .. }) => {
                let wait = jittered(retry_after_ms.max(RATE_LIMIT_BASE_MS));
                warn!(provider = provider_name, attempt, wait_ms = wait.as_millis() as u64, "rate limited, retrying");
                tokio::time::sleep(wait).await;
                delay_ms = RATE_LIMIT_BASE_MS;
            }
            Err(e) => {
                let wait = jittered(delay_ms);
                warn!(provider = provider_name, attempt, error = %e, wait_ms = wait.as_millis() as u64, "transient error, retrying");
                tokio::time::sleep(wait).await;
                delay_ms = (delay_ms * 2).min(BACKOFF_CAP_MS);
            }
        }
    }

    unreachable!("loop always returns on the final attempt")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_delay_seconds_form() {
        let d = parse_retry_after("120").expect("should parse");
        assert_eq!(d, Duration::from_secs(120));
    }

    #[test]
    fn parses_http_date_form_in_the_future() {
        let future = httpdate::fmt_http_date(std::time::SystemTime::now() + Duration::from_secs(60));
        let d = parse_retry_after(&future).expect("should parse http-date");
        assert!(d.as_secs() <= 61);
    }

    #[tokio::test]
    async fn succeeds_without_retry_on_first_try() {
        let result = with_retry("test", 3, || async { Ok::<_, VisionError>(42) }).await;
        assert_eq!(result.unwrap(), 42);
    }

    #[tokio::test]
    async fn gives_up_after_max_attempts() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result: Result<(), VisionError> = with_retry("test", 2, || {
            attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async {
                Err(VisionError::Unavailable {
                    provider: "test".to_string(),
                    reason: "down".to_string(),
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn non_retryable_error_stops_immediately() {
        let attempts = std::sync::atomic::AtomicU32::new(0);
        let result: Result<(), VisionError> = with_retry("test", 5, || {
            attempts.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            async {
                Err(VisionError::TooLarge {
                    provider: "test".to_string(),
                    size: 100,
                    limit: 10,
                })
            }
        })
        .await;
        assert!(result.is_err());
        assert_eq!(attempts.load(std::sync::atomic::Ordering::SeqCst), 1);
    }
}
