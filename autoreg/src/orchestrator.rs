//! Top-level sequencing of one registration attempt.

use crate::accounts::{AccountStore, JsonAccountStore};
use crate::actuator::{ActuatorLauncher, WebActuator};
use crate::billing::BillingProfile;
use crate::config::RegistrationConfig;
use crate::errors::{OutputClosed, RegistrationError};
use crate::finder::{ControlFinder, LabelControlFinder};
use crate::handoff::VerificationHandoff;
use crate::locator::Locator;
use crate::messages::MessageKey;
use crate::payment::{HumanExit, PaymentOutcome, PaymentSetupWorkflow};
use crate::reporter::{CompletionRecord, CompletionReporter, CompletionStatus};
use crate::session::{RegistrationSession, RegistrationSessionBuilder};
use crate::signup::{AccountCreator, FormSignup};
use crate::timing::{settle, sleep_or_cancel};
use crate::token::{acquire_token, SessionCookieNormalizer, SessionToken, TokenNormalizer, TokenPolicy};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub const TOKEN_SAVED_MESSAGE: &str = "Registration completed, session token saved";

/// What happened, for callers that want more than the emitted record.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistrationReport {
    pub record: CompletionRecord,
    pub payment: Option<PaymentOutcome>,
    pub human_exit: Option<HumanExit>,
    /// The browser session was left open for the operator.
    pub kept_open: bool,
}

impl RegistrationReport {
    fn new(record: CompletionRecord) -> Self {
        Self {
            record,
            payment: None,
            human_exit: None,
            kept_open: false,
        }
    }
}

pub struct RegistrationOrchestrator {
    config: RegistrationConfig,
    launcher: Arc<dyn ActuatorLauncher>,
    reporter: Arc<CompletionReporter>,
    cancel: CancellationToken,
    creator: Arc<dyn AccountCreator>,
    finder: Arc<dyn ControlFinder>,
    normalizer: Arc<dyn TokenNormalizer>,
    store: Option<Arc<dyn AccountStore>>,
}

impl RegistrationOrchestrator {
    pub fn new(
        config: RegistrationConfig,
        launcher: Arc<dyn ActuatorLauncher>,
        reporter: Arc<CompletionReporter>,
        cancel: CancellationToken,
    ) -> Self {
        let creator = Arc::new(FormSignup::new(
            config.signup.clone(),
            config.timing.clone(),
            cancel.clone(),
        ));
        Self {
            config,
            launcher,
            reporter,
            cancel,
            creator,
            finder: Arc::new(LabelControlFinder),
            normalizer: Arc::new(SessionCookieNormalizer),
            store: None,
        }
    }

    pub fn with_account_creator(mut self, creator: Arc<dyn AccountCreator>) -> Self {
        self.creator = creator;
        self
    }

    pub fn with_control_finder(mut self, finder: Arc<dyn ControlFinder>) -> Self {
        self.finder = finder;
        self
    }

    pub fn with_token_normalizer(mut self, normalizer: Arc<dyn TokenNormalizer>) -> Self {
        self.normalizer = normalizer;
        self
    }

    /// Defaults to `accounts.json` in the session's work directory.
    pub fn with_account_store(mut self, store: Arc<dyn AccountStore>) -> Self {
        self.store = Some(store);
        self
    }

    /// Run one attempt. Only invalid input and a closed output channel come
    /// back as errors; every other outcome is emitted as a completion record.
    pub async fn run(
        &self,
        identity: RegistrationSessionBuilder,
    ) -> Result<RegistrationReport, RegistrationError> {
        let session = identity.build()?;
        self.run_session(&session).await
    }

    #[instrument(skip_all, fields(email = %session.email()))]
    pub async fn run_session(
        &self,
        session: &RegistrationSession,
    ) -> Result<RegistrationReport, RegistrationError> {
        self.reporter.progress(MessageKey::RegisterStart, &[])?;
        self.reporter.progress(
            MessageKey::Identity,
            &[
                ("first_name", &session.first_name()),
                ("last_name", &session.last_name()),
                ("email", &session.email()),
            ],
        )?;
        self.reporter.progress(
            MessageKey::PasswordGenerated,
            &[("length", &session.password().len())],
        )?;

        let actuator = match self.launcher.launch(session.use_incognito()).await {
            Ok(actuator) => actuator,
            Err(e) => {
                error!("Could not open browser session: {}", e);
                let record = CompletionRecord::failure(session, CompletionStatus::Failed, &e);
                self.reporter.report(&record)?;
                return Ok(RegistrationReport::new(record));
            }
        };

        let result = self.drive(session, actuator.as_ref()).await;

        let keep_open = matches!(&result, Ok(report) if report.kept_open);
        if keep_open {
            info!("Leaving browser session open for the operator");
        } else if let Err(e) = actuator.close().await {
            debug!("Closing browser session failed: {}", e);
        }
        result
    }

    async fn drive(
        &self,
        session: &RegistrationSession,
        actuator: &dyn WebActuator,
    ) -> Result<RegistrationReport, RegistrationError> {
        let token = match self.register(session, actuator).await {
            Ok(token) => token,
            Err(RegistrationError::Output(closed)) => return Err(closed.into()),
            Err(e) => return self.report_registration_failure(session, e).await,
        };

        let record = CompletionRecord::success(session, TOKEN_SAVED_MESSAGE).with_token(&token);
        self.reporter.report(&record)?;

        if let Some(url) = &self.config.dashboard_url {
            if let Err(e) = actuator.navigate(url).await {
                warn!("Could not open dashboard {}: {}", url, e);
            }
            settle(&self.config.timing.page_load_wait, &self.cancel).await;
        }

        let mut workflow = PaymentSetupWorkflow::new(
            actuator,
            self.finder.as_ref(),
            &self.config.payment,
            &self.config.timing,
            &self.reporter,
            self.cancel.clone(),
        );
        let outcome = if self.cancel.is_cancelled() {
            PaymentOutcome::Interrupted
        } else {
            match BillingProfile::load(
                self.config.billing_profile_path.as_deref(),
                session.work_dir(),
            ) {
                Ok(profile) => workflow.run(&profile).await?,
                Err(e) => PaymentOutcome::Failed(e),
            }
        };
        info!("Payment setup finished: {:?}", outcome);

        let mut report = RegistrationReport::new(record);
        match &outcome {
            PaymentOutcome::Submitted | PaymentOutcome::CompletedWithWarnings(_) => {
                self.cooldown(self.config.cooldowns.after_submit).await?;
            }
            PaymentOutcome::Failed(e) => {
                self.reporter
                    .progress(MessageKey::PaymentFailed, &[("error", e)])?;
                self.cooldown(self.config.cooldowns.after_payment_failure)
                    .await?;
            }
            PaymentOutcome::Interrupted => {
                self.reporter.progress(MessageKey::Interrupted, &[])?;
            }
            PaymentOutcome::AwaitingHuman => {
                let (exit, record) = workflow.await_human(session).await?;
                report.record = record;
                report.human_exit = Some(exit);
                report.kept_open = true;
            }
        }
        if !report.kept_open {
            report.record = self.reporter.finish(session)?;
        }
        report.payment = Some(outcome);
        Ok(report)
    }

    /// Account creation through token persistence.
    async fn register(
        &self,
        session: &RegistrationSession,
        actuator: &dyn WebActuator,
    ) -> Result<SessionToken, RegistrationError> {
        let handoff = VerificationHandoff::new(&self.config.handoff, &self.reporter, self.cancel.clone());
        let signup = self
            .creator
            .create_account(actuator, session, &handoff)
            .await?;
        debug!("Signup finished: {:?}", signup);
        if self.cancel.is_cancelled() {
            return Err(RegistrationError::Interrupted);
        }

        if let Some(url) = &self.config.account_url {
            actuator.navigate(url).await?;
            settle(&self.config.timing.page_load_wait, &self.cancel).await;
        }
        let total_usage = self.read_usage(actuator).await;

        let policy = TokenPolicy::from(&self.config.token);
        let token = acquire_token(
            actuator,
            &policy,
            self.normalizer.as_ref(),
            &self.reporter,
            &self.cancel,
        )
        .await?;

        let store: Arc<dyn AccountStore> = match &self.store {
            Some(store) => store.clone(),
            None => Arc::new(JsonAccountStore::in_dir(session.work_dir())),
        };
        store.save(session, &token, total_usage.as_deref())?;
        self.reporter
            .progress(MessageKey::AccountSaved, &[("email", &session.email())])?;
        Ok(token)
    }

    /// Best effort. A missing or unreadable element leaves the usage unset.
    async fn read_usage(&self, actuator: &dyn WebActuator) -> Option<String> {
        let locator = Locator::from(self.config.usage_locator.as_deref()?);
        let element = match actuator
            .find_element(&locator, Some(self.config.signup.field_timeout))
            .await
        {
            Ok(Some(element)) => element,
            Ok(None) => {
                warn!("Usage element {} not found", locator);
                return None;
            }
            Err(e) => {
                warn!("Could not look up usage element {}: {}", locator, e);
                return None;
            }
        };
        match element.text().await {
            Ok(text) => {
                let usage = parse_usage(&text);
                debug!("Total usage: {:?}", usage);
                usage
            }
            Err(e) => {
                warn!("Could not read usage text: {}", e);
                None
            }
        }
    }

    async fn report_registration_failure(
        &self,
        session: &RegistrationSession,
        e: RegistrationError,
    ) -> Result<RegistrationReport, RegistrationError> {
        let status = if e.is_cancellation() || self.cancel.is_cancelled() {
            CompletionStatus::Cancelled
        } else {
            CompletionStatus::Failed
        };
        error!("Registration failed: {}", e);
        self.reporter
            .progress(MessageKey::RegistrationFailed, &[("error", &e)])?;
        let record = CompletionRecord::failure(session, status, &e);
        self.reporter.report(&record)?;
        if status == CompletionStatus::Failed {
            self.cooldown(self.config.cooldowns.after_registration_failure)
                .await?;
        }
        Ok(RegistrationReport::new(record))
    }

    async fn cooldown(&self, duration: Duration) -> Result<(), OutputClosed> {
        self.reporter
            .progress(MessageKey::Cooldown, &[("seconds", &duration.as_secs())])?;
        if !sleep_or_cancel(duration, &self.cancel).await {
            self.reporter.progress(MessageKey::Interrupted, &[])?;
        }
        Ok(())
    }
}

/// The part after the last `/`, so `"12 / 150"` yields `"150"`.
fn parse_usage(text: &str) -> Option<String> {
    text.rsplit('/')
        .next()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
