//! Retry policy with exponential backoff for transient transport failures.
//!
//! A failed exchange is classified into a [`FailureKind`]; the
//! [`RetryPolicy`] then decides whether the handler retries and after what
//! delay. Only idempotent requests are ever retried (the handler enforces
//! that), and the whole retry loop stays inside the handler so the director
//! sees a single terminal outcome.

use std::time::Duration;

use rand::Rng;
use tracing::debug;

use super::TransportError;

/// Default maximum attempts (including the initial attempt).
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for the first retry.
const DEFAULT_BASE_DELAY: Duration = Duration::from_millis(500);

/// Default delay cap.
const DEFAULT_MAX_DELAY: Duration = Duration::from_secs(16);

/// Default backoff multiplier (doubles each attempt).
const DEFAULT_BACKOFF_MULTIPLIER: f32 = 2.0;

/// Maximum jitter added to each delay (250ms).
const MAX_JITTER: Duration = Duration::from_millis(250);

/// Maximum honored Retry-After value (1 hour).
const MAX_RETRY_AFTER: Duration = Duration::from_secs(3600);

/// Classification of a failed exchange for retry purposes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FailureKind {
    /// Temporary failure that may succeed on retry (timeouts, 5xx, 408).
    Transient,

    /// Failure that no amount of retrying will fix (4xx, decode errors,
    /// unroutable requests).
    Permanent,

    /// Server rate limiting (HTTP 429); retried with backoff, honoring
    /// Retry-After when present.
    RateLimited,
}

/// Decision on whether to retry a failed exchange.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RetryDecision {
    /// Retry after the given delay.
    Retry {
        /// How long to wait before the next attempt.
        delay: Duration,
        /// The attempt number the retry will be (1-indexed).
        attempt: u32,
    },

    /// Give up and surface the error.
    GiveUp {
        /// Human-readable reason retrying stopped.
        reason: String,
    },
}

/// Exponential-backoff retry configuration.
///
/// Delays follow `min(base_delay * multiplier^(attempt-1), max_delay)` plus
/// up to [`MAX_JITTER`] of random jitter. Defaults: 3 attempts, 500ms base,
/// 16s cap, doubling.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    max_attempts: u32,
    base_delay: Duration,
    max_delay: Duration,
    backoff_multiplier: f32,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            base_delay: DEFAULT_BASE_DELAY,
            max_delay: DEFAULT_MAX_DELAY,
            backoff_multiplier: DEFAULT_BACKOFF_MULTIPLIER,
        }
    }
}

impl RetryPolicy {
    /// Creates a policy with custom settings. `max_attempts` is clamped to
    /// at least 1.
    #[must_use]
    pub fn new(
        max_attempts: u32,
        base_delay: Duration,
        max_delay: Duration,
        backoff_multiplier: f32,
    ) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            base_delay,
            max_delay,
            backoff_multiplier,
        }
    }

    /// Creates a policy that never retries.
    #[must_use]
    pub fn none() -> Self {
        Self {
            max_attempts: 1,
            ..Self::default()
        }
    }

    /// Creates a policy with a custom attempt limit and default backoff.
    #[must_use]
    pub fn with_max_attempts(max_attempts: u32) -> Self {
        Self {
            max_attempts: max_attempts.max(1),
            ..Self::default()
        }
    }

    /// Returns the configured attempt limit.
    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    /// Decides whether the attempt that just failed should be retried.
    ///
    /// `attempt` is the 1-indexed attempt that failed. A server-provided
    /// `retry_after` overrides the computed backoff delay for rate-limited
    /// failures.
    pub fn should_retry(
        &self,
        kind: FailureKind,
        attempt: u32,
        retry_after: Option<Duration>,
    ) -> RetryDecision {
        if kind == FailureKind::Permanent {
            return RetryDecision::GiveUp {
                reason: "permanent failure, retry would not help".to_string(),
            };
        }

        if attempt >= self.max_attempts {
            debug!(attempt, max = self.max_attempts, "attempt limit reached");
            return RetryDecision::GiveUp {
                reason: format!("attempt limit ({}) exhausted", self.max_attempts),
            };
        }

        let delay = match retry_after {
            Some(server_delay) if kind == FailureKind::RateLimited => {
                server_delay.min(MAX_RETRY_AFTER)
            }
            _ => self.backoff_delay(attempt),
        };

        debug!(
            attempt,
            next_attempt = attempt + 1,
            delay_ms = delay.as_millis(),
            "will retry"
        );

        RetryDecision::Retry {
            delay,
            attempt: attempt + 1,
        }
    }

    /// Backoff delay for the retry following `attempt`, with jitter.
    fn backoff_delay(&self, attempt: u32) -> Duration {
        let base_ms = duration_as_ms_f64(self.base_delay);
        let exponent = f64::from(attempt.saturating_sub(1));
        let raw_ms = base_ms * f64::from(self.backoff_multiplier).powf(exponent);
        let capped_ms = raw_ms.min(duration_as_ms_f64(self.max_delay));

        let jitter_ms = rand::thread_rng().gen_range(0..=as_ms_u64(MAX_JITTER));

        Duration::from_millis(to_ms_u64(capped_ms)) + Duration::from_millis(jitter_ms)
    }
}

#[allow(clippy::cast_precision_loss)]
fn duration_as_ms_f64(d: Duration) -> f64 {
    d.as_millis() as f64
}

#[allow(clippy::cast_possible_truncation)]
fn as_ms_u64(d: Duration) -> u64 {
    d.as_millis() as u64
}

#[allow(clippy::cast_possible_truncation, clippy::cast_sign_loss)]
fn to_ms_u64(ms: f64) -> u64 {
    ms as u64
}

/// Classifies a terminal HTTP status for retry purposes.
///
/// 408 and 5xx are transient, 429 is rate-limited, every other non-success
/// status is permanent (including 401/403: retrying without new credentials
/// cannot change the answer).
#[must_use]
pub fn classify_status(status: u16) -> FailureKind {
    match status {
        408 => FailureKind::Transient,
        429 => FailureKind::RateLimited,
        500..=599 => FailureKind::Transient,
        _ => FailureKind::Permanent,
    }
}

/// Classifies a transport error for retry purposes.
#[must_use]
pub fn classify_transport(error: &TransportError) -> FailureKind {
    match error {
        TransportError::HttpStatus { status, .. } => classify_status(*status),
        TransportError::Timeout { .. } => FailureKind::Transient,
        TransportError::Network { source, .. } => {
            // TLS/certificate problems will not clear up on retry
            if source.to_string().to_ascii_lowercase().contains("certificate") {
                FailureKind::Permanent
            } else {
                FailureKind::Transient
            }
        }
        TransportError::NoHandler { .. }
        | TransportError::Decode { .. }
        | TransportError::InvalidRequest { .. } => FailureKind::Permanent,
    }
}

/// Parses a Retry-After header value into a delay.
///
/// Accepts integer seconds (`"120"`) or an HTTP-date; negative and
/// unparseable values yield `None`, past dates yield zero, and everything
/// is capped at one hour.
#[must_use]
pub fn parse_retry_after(header_value: &str) -> Option<Duration> {
    let trimmed = header_value.trim();

    if let Ok(seconds) = trimmed.parse::<i64>() {
        if seconds < 0 {
            debug!(seconds, "negative Retry-After value, ignoring");
            return None;
        }
        #[allow(clippy::cast_sign_loss)]
        let delay = Duration::from_secs(seconds as u64);
        if delay > MAX_RETRY_AFTER {
            debug!(seconds, "Retry-After exceeds maximum, capping at 1 hour");
            return Some(MAX_RETRY_AFTER);
        }
        return Some(delay);
    }

    if let Ok(datetime) = httpdate::parse_http_date(trimmed) {
        return match datetime.duration_since(std::time::SystemTime::now()) {
            Ok(delay) if delay > MAX_RETRY_AFTER => {
                debug!("Retry-After date exceeds maximum, capping at 1 hour");
                Some(MAX_RETRY_AFTER)
            }
            Ok(delay) => Some(delay),
            Err(_) => {
                debug!("Retry-After date is in the past, returning zero");
                Some(Duration::ZERO)
            }
        };
    }

    debug!(header_value, "unparseable Retry-After value");
    None
}
