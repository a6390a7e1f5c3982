//! Browser-driven account registration
//!
//! Creates an account through a web actuator, takes the verification code
//! from a file-based handoff, captures the session token from cookies and
//! then fills the payment-setup form, either submitting it or handing the
//! open browser to a human operator.

pub mod accounts;
pub mod actuator;
pub mod billing;
pub mod config;
pub mod duration;
pub mod element;
pub mod errors;
pub mod finder;
pub mod handoff;
pub mod locator;
pub mod messages;
pub mod orchestrator;
pub mod payment;
pub mod reporter;
pub mod session;
pub mod signup;
#[cfg(test)]
mod tests;
pub mod timing;
pub mod token;
pub mod webdriver;

pub use accounts::{AccountRecord, AccountStore, JsonAccountStore};
pub use actuator::{ActuatorLauncher, Cookie, WebActuator};
pub use billing::{BillingBranch, BillingProfile};
pub use config::RegistrationConfig;
pub use element::{Key, WebElement, WebElementImpl};
pub use errors::{
    ActuatorError, FormError, HandoffError, InputError, OutputClosed, RegistrationError,
    TokenError,
};
pub use finder::{ControlCriteria, ControlFinder, LabelControlFinder};
pub use handoff::{CodeResult, CodeSource, VerificationHandoff};
pub use locator::Locator;
pub use messages::{localize, Language, MessageCatalog, MessageKey};
pub use orchestrator::{RegistrationOrchestrator, RegistrationReport};
pub use payment::{HumanExit, PaymentOutcome, PaymentSetupWorkflow, PaymentState};
pub use reporter::{CompletionRecord, CompletionReporter, CompletionStatus};
pub use session::{RegistrationSession, RegistrationSessionBuilder};
pub use signup::{AccountCreator, FormSignup, SignupOutcome};
pub use token::{acquire_token, SessionCookieNormalizer, SessionToken, TokenNormalizer, TokenPolicy};
pub use webdriver::{WebDriverActuator, WebDriverLauncher};
