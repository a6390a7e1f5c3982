//! Run configuration. Every field has a default so an empty file is valid.

use crate::duration::{serde_duration, TimingRange};
use crate::finder::ControlCriteria;
use crate::messages::Language;
use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use tracing::debug;

pub const DEFAULT_WEBDRIVER_URL: &str = "http://localhost:9515";
pub const CODE_FILE_NAME: &str = "autoreg_verification_code.txt";
pub const CANCEL_FILE_NAME: &str = "autoreg_registration_cancel.txt";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RegistrationConfig {
    pub language: Language,
    pub webdriver: WebDriverConfig,
    pub signup: SignupConfig,
    /// Opened before the token is read, when set.
    pub account_url: Option<String>,
    /// Element whose text ends in the account's total usage, e.g. `12 / 150`.
    /// Read once the account page is open; unset skips the read.
    pub usage_locator: Option<String>,
    /// Opened before the payment workflow, when set.
    pub dashboard_url: Option<String>,
    pub token: TokenConfig,
    pub handoff: HandoffConfig,
    pub payment: PaymentConfig,
    pub timing: TimingConfig,
    pub cooldowns: CooldownConfig,
    /// Overrides `<work_dir>/bank_card_config.json`.
    pub billing_profile_path: Option<PathBuf>,
}

impl RegistrationConfig {
    /// Load from YAML. JSON files parse too since JSON is valid YAML.
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        let config = Self::from_yaml(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))?;
        debug!("Loaded configuration from {}", path.display());
        Ok(config)
    }

    pub fn from_yaml(content: &str) -> Result<Self> {
        if content.trim().is_empty() {
            return Ok(Self::default());
        }
        Ok(serde_yaml::from_str(content)?)
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct WebDriverConfig {
    pub url: String,
    /// `chrome` or `firefox`; picks the capability block sent on session creation.
    pub browser: String,
    pub headless: bool,
    /// Extra browser command-line arguments.
    pub args: Vec<String>,
    /// Interval between element lookups while waiting for one to appear.
    #[serde(with = "serde_duration")]
    pub poll_interval: Duration,
}

impl Default for WebDriverConfig {
    fn default() -> Self {
        Self {
            url: DEFAULT_WEBDRIVER_URL.to_string(),
            browser: "chrome".to_string(),
            headless: false,
            args: Vec::new(),
            poll_interval: Duration::from_millis(250),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SignupConfig {
    pub url: Option<String>,
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub password: String,
    pub submit: String,
    /// A single input, or a template containing `{index}` for one box per digit.
    pub code_input: String,
    pub code_length: usize,
    #[serde(with = "serde_duration")]
    pub field_timeout: Duration,
    /// Pause after the code is entered so the site can finish signing in.
    #[serde(with = "serde_duration")]
    pub post_code_wait: Duration,
}

impl Default for SignupConfig {
    fn default() -> Self {
        Self {
            url: None,
            first_name: "@name=first_name".to_string(),
            last_name: "@name=last_name".to_string(),
            email: "@name=email".to_string(),
            password: "@name=password".to_string(),
            submit: "css:button[type=submit]".to_string(),
            code_input: "@data-index={index}".to_string(),
            code_length: 6,
            field_timeout: Duration::from_secs(10),
            post_code_wait: Duration::from_secs(5),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TokenConfig {
    pub cookie_name: String,
    pub max_attempts: u32,
    #[serde(with = "serde_duration")]
    pub retry_interval: Duration,
}

impl Default for TokenConfig {
    fn default() -> Self {
        Self {
            cookie_name: "session_token".to_string(),
            max_attempts: 30,
            retry_interval: Duration::from_secs(2),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct HandoffConfig {
    /// Directory holding the marker files. Defaults to the system temp dir.
    pub dir: Option<PathBuf>,
    pub code_file: String,
    pub cancel_file: String,
    #[serde(with = "serde_duration")]
    pub timeout: Duration,
    #[serde(with = "serde_duration")]
    pub poll_interval: Duration,
    #[serde(with = "serde_duration")]
    pub progress_interval: Duration,
}

impl Default for HandoffConfig {
    fn default() -> Self {
        Self {
            dir: None,
            code_file: CODE_FILE_NAME.to_string(),
            cancel_file: CANCEL_FILE_NAME.to_string(),
            timeout: Duration::from_secs(60),
            poll_interval: Duration::from_secs(1),
            progress_interval: Duration::from_secs(10),
        }
    }
}

impl HandoffConfig {
    pub fn dir(&self) -> PathBuf {
        self.dir.clone().unwrap_or_else(std::env::temp_dir)
    }

    pub fn code_path(&self) -> PathBuf {
        self.dir().join(&self.code_file)
    }

    pub fn cancel_path(&self) -> PathBuf {
        self.dir().join(&self.cancel_file)
    }
}

/// Locators for the card-entry form, in the string forms `Locator` accepts.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentFields {
    pub card_number: String,
    pub card_expiry: String,
    pub card_cvc: String,
    pub billing_name: String,
    pub postal_code: String,
    pub administrative_area: String,
    pub locality: String,
    pub dependent_locality: String,
    pub address_line1: String,
}

impl Default for PaymentFields {
    fn default() -> Self {
        Self {
            card_number: "#cardNumber".to_string(),
            card_expiry: "#cardExpiry".to_string(),
            card_cvc: "#cardCvc".to_string(),
            billing_name: "#billingName".to_string(),
            postal_code: "#billingPostalCode".to_string(),
            administrative_area: "#billingAdministrativeArea".to_string(),
            locality: "#billingLocality".to_string(),
            dependent_locality: "#billingDependentLocality".to_string(),
            address_line1: "#billingAddressLine1".to_string(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct PaymentConfig {
    pub fields: PaymentFields,
    /// `billingCountry` value that selects the domestic address branch.
    pub domestic_country: String,
    pub trial_control: ControlCriteria,
    pub reveal_control: ControlCriteria,
    pub submit_control: ControlCriteria,
    #[serde(with = "serde_duration")]
    pub card_form_settle: Duration,
    #[serde(with = "serde_duration")]
    pub reveal_settle: Duration,
    #[serde(with = "serde_duration")]
    pub card_field_timeout: Duration,
    #[serde(with = "serde_duration")]
    pub review_wait: Duration,
    #[serde(with = "serde_duration")]
    pub submit_settle: Duration,
    #[serde(with = "serde_duration")]
    pub address_enter_wait: Duration,
    #[serde(with = "serde_duration")]
    pub soft_failure_wait: Duration,
    #[serde(with = "serde_duration")]
    pub liveness_interval: Duration,
}

impl Default for PaymentConfig {
    fn default() -> Self {
        Self {
            fields: PaymentFields::default(),
            domestic_country: "China".to_string(),
            trial_control: ControlCriteria::with_labels(["start trial", "free trial", "try"]),
            reveal_control: ControlCriteria::with_labels(["card", "add payment", "pay with card"]),
            submit_control: ControlCriteria::with_labels([
                "start trial",
                "subscribe",
                "submit",
                "confirm",
            ]),
            card_form_settle: Duration::from_secs(30),
            reveal_settle: Duration::from_secs(1),
            card_field_timeout: Duration::from_secs(15),
            review_wait: Duration::from_secs(5),
            submit_settle: Duration::from_secs(20),
            address_enter_wait: Duration::from_secs(3),
            soft_failure_wait: Duration::from_secs(10),
            liveness_interval: Duration::from_secs(5),
        }
    }
}

/// Randomized settle delays.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TimingConfig {
    pub page_load_wait: TimingRange,
    /// After every field write.
    pub input_wait: TimingRange,
    pub submit_wait: TimingRange,
}

impl Default for TimingConfig {
    fn default() -> Self {
        Self {
            page_load_wait: TimingRange::from_millis(100, 800),
            input_wait: TimingRange::from_millis(100, 800),
            submit_wait: TimingRange::from_millis(100, 800),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CooldownConfig {
    #[serde(with = "serde_duration")]
    pub after_submit: Duration,
    #[serde(with = "serde_duration")]
    pub after_payment_failure: Duration,
    #[serde(with = "serde_duration")]
    pub after_registration_failure: Duration,
}

impl Default for CooldownConfig {
    fn default() -> Self {
        Self {
            after_submit: Duration::from_secs(15),
            after_payment_failure: Duration::from_secs(10),
            after_registration_failure: Duration::from_secs(5),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_config_uses_defaults() {
        let config = RegistrationConfig::from_yaml("").unwrap();
        assert_eq!(config.token.max_attempts, 30);
        assert_eq!(config.token.retry_interval, Duration::from_secs(2));
        assert_eq!(config.handoff.timeout, Duration::from_secs(60));
        assert_eq!(config.payment.domestic_country, "China");
        assert_eq!(config.webdriver.url, DEFAULT_WEBDRIVER_URL);
        assert!(config.payment.submit_control.ordinal_fallback.is_none());
    }

    #[test]
    fn test_partial_yaml_overrides() {
        let yaml = r#"
language: zh
token:
  cookie_name: SessionCookie
  retry_interval: 500ms
handoff:
  dir: /tmp/handoff
  timeout: 2m
timing:
  input_wait: "0.2-0.4"
payment:
  domestic_country: Japan
  submit_control:
    labels: [pay]
    ordinal_fallback: 4
"#;
        let config = RegistrationConfig::from_yaml(yaml).unwrap();
        assert_eq!(config.language, Language::Zh);
        assert_eq!(config.token.cookie_name, "SessionCookie");
        assert_eq!(config.token.max_attempts, 30);
        assert_eq!(config.token.retry_interval, Duration::from_millis(500));
        assert_eq!(config.handoff.timeout, Duration::from_secs(120));
        assert_eq!(
            config.handoff.code_path(),
            PathBuf::from("/tmp/handoff").join(CODE_FILE_NAME)
        );
        assert_eq!(config.timing.input_wait, TimingRange::from_millis(200, 400));
        assert_eq!(config.payment.domestic_country, "Japan");
        assert_eq!(config.payment.submit_control.labels, vec!["pay"]);
        assert_eq!(config.payment.submit_control.ordinal_fallback, Some(4));
        assert_eq!(config.payment.submit_control.scan_limit, 10);
    }

    #[test]
    fn test_load_reports_path_on_error() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("bad.yaml");
        std::fs::write(&path, "token: [not, a, map]").unwrap();
        let err = RegistrationConfig::load(&path).unwrap_err();
        assert!(format!("{err:#}").contains("bad.yaml"));
    }
}
