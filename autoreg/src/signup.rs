use crate::actuator::WebActuator;
use crate::config::{SignupConfig, TimingConfig};
use crate::element::WebElement;
use crate::errors::RegistrationError;
use crate::handoff::CodeSource;
use crate::locator::Locator;
use crate::session::RegistrationSession;
use crate::timing::{settle, sleep_or_cancel};
use async_trait::async_trait;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument};

pub const CODE_INDEX_PLACEHOLDER: &str = "{index}";

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SignupOutcome {
    /// Page the browser landed on once the account existed.
    pub landing_url: Option<String>,
}

/// Creates the account in the browser, pulling the verification code from
/// `codes` when the site asks for it.
#[async_trait]
pub trait AccountCreator: Send + Sync {
    async fn create_account(
        &self,
        actuator: &dyn WebActuator,
        session: &RegistrationSession,
        codes: &dyn CodeSource,
    ) -> Result<SignupOutcome, RegistrationError>;
}

/// Fills a conventional name/email, password, then code signup form.
pub struct FormSignup {
    config: SignupConfig,
    timing: TimingConfig,
    cancel: CancellationToken,
}

impl FormSignup {
    pub fn new(config: SignupConfig, timing: TimingConfig, cancel: CancellationToken) -> Self {
        Self {
            config,
            timing,
            cancel,
        }
    }

    async fn required(
        &self,
        actuator: &dyn WebActuator,
        locator: &str,
        name: &str,
    ) -> Result<WebElement, RegistrationError> {
        actuator
            .find_element(&Locator::from(locator), Some(self.config.field_timeout))
            .await?
            .ok_or_else(|| {
                RegistrationError::SignupRejected(format!("{name} field not found ({locator})"))
            })
    }

    async fn fill(
        &self,
        actuator: &dyn WebActuator,
        locator: &str,
        name: &str,
        value: &str,
    ) -> Result<(), RegistrationError> {
        let field = self.required(actuator, locator, name).await?;
        field.fill(value).await?;
        settle(&self.timing.input_wait, &self.cancel).await;
        Ok(())
    }

    async fn submit(&self, actuator: &dyn WebActuator) -> Result<(), RegistrationError> {
        let button = self.required(actuator, &self.config.submit, "submit").await?;
        button.click().await?;
        settle(&self.timing.submit_wait, &self.cancel).await;
        Ok(())
    }

    async fn enter_code(
        &self,
        actuator: &dyn WebActuator,
        code: &str,
    ) -> Result<(), RegistrationError> {
        let template = &self.config.code_input;
        if !template.contains(CODE_INDEX_PLACEHOLDER) {
            return self.fill(actuator, template, "verification code", code).await;
        }
        for (index, digit) in code.chars().enumerate() {
            let locator = template.replace(CODE_INDEX_PLACEHOLDER, &index.to_string());
            let field = self.required(actuator, &locator, "verification digit").await?;
            field.type_text(&digit.to_string()).await?;
        }
        settle(&self.timing.input_wait, &self.cancel).await;
        Ok(())
    }
}

#[async_trait]
impl AccountCreator for FormSignup {
    #[instrument(skip_all, fields(email = %session.email()))]
    async fn create_account(
        &self,
        actuator: &dyn WebActuator,
        session: &RegistrationSession,
        codes: &dyn CodeSource,
    ) -> Result<SignupOutcome, RegistrationError> {
        let url = self.config.url.as_deref().ok_or_else(|| {
            RegistrationError::SignupRejected("no signup URL configured".to_string())
        })?;
        info!("Opening signup page {}", url);
        actuator.navigate(url).await?;
        settle(&self.timing.page_load_wait, &self.cancel).await;

        self.fill(actuator, &self.config.first_name, "first name", session.first_name())
            .await?;
        self.fill(actuator, &self.config.last_name, "last name", session.last_name())
            .await?;
        self.fill(actuator, &self.config.email, "email", session.email())
            .await?;
        self.submit(actuator).await?;

        let password = Locator::from(self.config.password.as_str());
        match actuator
            .find_element(&password, Some(self.config.field_timeout))
            .await?
        {
            Some(field) => {
                field.fill(session.password()).await?;
                settle(&self.timing.input_wait, &self.cancel).await;
                self.submit(actuator).await?;
            }
            None => debug!("No password step on this signup form"),
        }

        let code = codes.verification_code().await?.into_code(codes.timeout())?;
        self.enter_code(actuator, &code).await?;
        sleep_or_cancel(self.config.post_code_wait, &self.cancel).await;

        let landing_url = actuator.current_url().await.ok();
        info!("Account created, landed on {:?}", landing_url);
        Ok(SignupOutcome { landing_url })
    }
}
