//! Bounded polling of the cookie store for the session token.

use crate::actuator::WebActuator;
use crate::errors::{RegistrationError, TokenError};
use crate::messages::MessageKey;
use crate::reporter::CompletionReporter;
use crate::timing::sleep_or_cancel;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

pub const SESSION_SEPARATOR: &str = "::";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SessionToken {
    /// Cookie value exactly as read from the browser.
    pub raw: String,
    pub normalized: String,
}

/// Pure mapping from a raw cookie value to the token callers use.
pub trait TokenNormalizer: Send + Sync {
    fn normalize(&self, raw: &str) -> String;
}

/// Percent-decodes the value and keeps what follows the last `::`.
#[derive(Debug, Default, Clone, Copy)]
pub struct SessionCookieNormalizer;

impl TokenNormalizer for SessionCookieNormalizer {
    fn normalize(&self, raw: &str) -> String {
        let decoded = urlencoding::decode(raw)
            .map(|d| d.into_owned())
            .unwrap_or_else(|_| raw.to_string());
        match decoded.rsplit_once(SESSION_SEPARATOR) {
            Some((_, token)) => token.to_string(),
            None => decoded,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TokenPolicy {
    pub cookie_name: String,
    pub max_attempts: u32,
    pub retry_interval: Duration,
}

impl Default for TokenPolicy {
    fn default() -> Self {
        Self {
            cookie_name: "session_token".to_string(),
            max_attempts: 30,
            retry_interval: Duration::from_secs(2),
        }
    }
}

impl From<&crate::config::TokenConfig> for TokenPolicy {
    fn from(config: &crate::config::TokenConfig) -> Self {
        Self {
            cookie_name: config.cookie_name.clone(),
            max_attempts: config.max_attempts,
            retry_interval: config.retry_interval,
        }
    }
}

/// Read cookies until `policy.cookie_name` shows up or the attempt budget is
/// spent. A failed cookie read counts as an attempt.
#[instrument(skip_all, fields(cookie = %policy.cookie_name, max_attempts = policy.max_attempts))]
pub async fn acquire_token(
    actuator: &dyn WebActuator,
    policy: &TokenPolicy,
    normalizer: &dyn TokenNormalizer,
    reporter: &CompletionReporter,
    cancel: &CancellationToken,
) -> Result<SessionToken, RegistrationError> {
    reporter.progress(MessageKey::TokenFetching, &[])?;

    for attempt in 1..=policy.max_attempts {
        match actuator.read_cookies().await {
            Ok(cookies) => {
                debug!("Attempt {}: read {} cookies", attempt, cookies.len());
                if let Some(cookie) = cookies.into_iter().find(|c| c.name == policy.cookie_name) {
                    let token = SessionToken {
                        normalized: normalizer.normalize(&cookie.value),
                        raw: cookie.value,
                    };
                    info!("Session token found on attempt {}", attempt);
                    reporter.progress(MessageKey::TokenSuccess, &[])?;
                    return Ok(token);
                }
            }
            Err(e) => {
                warn!("Attempt {}: reading cookies failed: {}", attempt, e);
                reporter.progress(MessageKey::TokenReadFailed, &[("error", &e)])?;
            }
        }

        if attempt < policy.max_attempts {
            reporter.progress(
                MessageKey::TokenAttempt,
                &[
                    ("attempt", &attempt),
                    ("wait", &policy.retry_interval.as_secs_f64()),
                ],
            )?;
            if !sleep_or_cancel(policy.retry_interval, cancel).await {
                return Err(TokenError::Interrupted.into());
            }
        }
    }

    warn!("Session token not found after {} attempts", policy.max_attempts);
    reporter.progress(MessageKey::TokenMaxAttempts, &[("max", &policy.max_attempts)])?;
    Err(TokenError::MaxAttemptsExceeded(policy.max_attempts).into())
}
