use std::time::Duration;
use thiserror::Error;

/// Failures raised by a web actuator session.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ActuatorError {
    #[error("Element not found: {0}")]
    ElementNotFound(String),

    #[error("Operation timed out: {0}")]
    Timeout(String),

    #[error("Invalid locator: {0}")]
    InvalidLocator(String),

    #[error("Browser session is closed: {0}")]
    SessionClosed(String),

    #[error("WebDriver protocol error: {0}")]
    Protocol(String),

    #[error("Transport error: {0}")]
    Transport(String),

    #[error("Unsupported operation: {0}")]
    UnsupportedOperation(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<reqwest::Error> for ActuatorError {
    fn from(e: reqwest::Error) -> Self {
        ActuatorError::Transport(e.to_string())
    }
}

/// Malformed identity supplied at process start. Fatal before any browser opens.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum InputError {
    #[error("Email address is required")]
    MissingEmail,

    #[error("Invalid email address: {0}")]
    InvalidEmail(String),
}

/// Ways the verification-code handoff can end without a code.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum HandoffError {
    #[error("verification cancelled")]
    Cancelled,

    #[error("timed out after {0:?} waiting for verification code")]
    TimedOut(Duration),

    #[error("invalid verification code: {0}")]
    Invalid(String),
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TokenError {
    #[error("max attempts exceeded ({0})")]
    MaxAttemptsExceeded(u32),

    #[error("token acquisition interrupted")]
    Interrupted,
}

/// Terminal for the payment workflow, never for the overall attempt.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FormError {
    #[error("no_trial_button")]
    NoTrialButton,

    #[error("card_form_not_loaded")]
    CardFormNotLoaded,

    #[error("missing_required_field: {0}")]
    MissingRequiredField(String),

    #[error("no_submit_control")]
    NoSubmitControl,

    #[error("billing_profile_unavailable: {0}")]
    BillingProfileUnavailable(String),

    /// The browser failed before the card form was reached.
    #[error("actuator_error: {0}")]
    Actuator(String),
}

/// The downstream consumer closed the output channel.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
#[error("output channel closed")]
pub struct OutputClosed;

#[derive(Error, Debug)]
pub enum RegistrationError {
    #[error(transparent)]
    Input(#[from] InputError),

    #[error(transparent)]
    Handoff(#[from] HandoffError),

    #[error(transparent)]
    Token(#[from] TokenError),

    #[error(transparent)]
    Actuator(#[from] ActuatorError),

    #[error(transparent)]
    Output(#[from] OutputClosed),

    #[error("failed to persist account: {0}")]
    Persist(String),

    #[error("account creation was rejected: {0}")]
    SignupRejected(String),

    #[error("interrupted by operator")]
    Interrupted,
}

impl RegistrationError {
    /// Whether the attempt ended on request rather than by failure.
    pub fn is_cancellation(&self) -> bool {
        matches!(
            self,
            RegistrationError::Interrupted
                | RegistrationError::Handoff(HandoffError::Cancelled)
                | RegistrationError::Token(TokenError::Interrupted)
        )
    }
}
