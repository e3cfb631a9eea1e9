//! Vendor error classification and retry policy
//!
//! Adapters map their vendor's failures onto four categories. The loops only
//! ever look at the category, never at the vendor error itself.

use std::time::Duration;

use http::StatusCode;
use relay_config::OperateDefaults;

use crate::error::VendorError;

/// Back-off suggested to callers when a vendor reports quota exhaustion
pub const RATE_LIMIT_DELAY_MS: u64 = 60_000;

/// Coarse failure category
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorCategory {
    /// Quota exhausted; never retried by the loop
    RateLimit,
    /// Transient server-side failure
    Retryable,
    /// Auth, permission, not-found or bad-request failure
    Unrecoverable,
    /// Anything the classifier could not map
    Unknown,
}

impl ErrorCategory {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::RateLimit => "rate_limit",
            Self::Retryable => "retryable",
            Self::Unrecoverable => "unrecoverable",
            Self::Unknown => "unknown",
        }
    }
}

/// Outcome of classifying one vendor error
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ErrorClassification {
    pub category: ErrorCategory,
    pub should_retry: bool,
    pub suggested_delay_ms: Option<u64>,
}

impl ErrorClassification {
    pub const fn rate_limit() -> Self {
        Self {
            category: ErrorCategory::RateLimit,
            should_retry: false,
            suggested_delay_ms: Some(RATE_LIMIT_DELAY_MS),
        }
    }

    pub const fn retryable() -> Self {
        Self {
            category: ErrorCategory::Retryable,
            should_retry: true,
            suggested_delay_ms: None,
        }
    }

    pub const fn unrecoverable() -> Self {
        Self {
            category: ErrorCategory::Unrecoverable,
            should_retry: false,
            suggested_delay_ms: None,
        }
    }

    pub const fn unknown() -> Self {
        Self {
            category: ErrorCategory::Unknown,
            should_retry: true,
            suggested_delay_ms: None,
        }
    }
}

/// Classification shared by every vendor
///
/// Adapters check their own error codes first and fall back to this.
pub fn classify_common(error: &VendorError) -> ErrorClassification {
    if error.mentions_rate_limit() {
        return ErrorClassification::rate_limit();
    }

    match error {
        VendorError::Status { status, .. } => classify_status(*status),
        VendorError::Connect(_) | VendorError::Timeout(_) => ErrorClassification::retryable(),
        VendorError::Decode(_) | VendorError::Service { .. } | VendorError::Other(_) => {
            ErrorClassification::unknown()
        }
    }
}

/// Map an HTTP status onto a category
pub fn classify_status(status: StatusCode) -> ErrorClassification {
    match status.as_u16() {
        429 => ErrorClassification::rate_limit(),
        400 | 401 | 403 | 404 | 405 | 413 | 422 => ErrorClassification::unrecoverable(),
        408 | 500 | 502 | 503 | 504 | 529 => ErrorClassification::retryable(),
        _ => ErrorClassification::unknown(),
    }
}

/// Bounds on how often a failed vendor call is retried
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries allowed for `Retryable` errors
    pub max_retries: u32,
    /// Retries allowed for `Unknown` errors
    pub unknown_max_retries: u32,
    /// Delay used when the classifier suggests none
    pub default_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self::from(&OperateDefaults::default())
    }
}

impl From<&OperateDefaults> for RetryPolicy {
    fn from(defaults: &OperateDefaults) -> Self {
        Self {
            max_retries: defaults.max_retries,
            unknown_max_retries: defaults.unknown_max_retries,
            default_delay: Duration::from_millis(defaults.retry_delay_ms),
        }
    }
}

impl RetryPolicy {
    /// Policy that never retries
    pub const fn none() -> Self {
        Self {
            max_retries: 0,
            unknown_max_retries: 0,
            default_delay: Duration::ZERO,
        }
    }

    /// Retry bound for a category, `None` when the category is never retried
    pub const fn limit_for(&self, category: ErrorCategory) -> Option<u32> {
        match category {
            ErrorCategory::Retryable => Some(self.max_retries),
            ErrorCategory::Unknown => Some(self.unknown_max_retries),
            ErrorCategory::RateLimit | ErrorCategory::Unrecoverable => None,
        }
    }

    /// Delay before the next attempt
    pub fn delay_for(&self, classification: &ErrorClassification) -> Duration {
        classification
            .suggested_delay_ms
            .map_or(self.default_delay, Duration::from_millis)
    }
}
