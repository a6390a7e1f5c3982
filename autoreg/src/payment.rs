//! Payment-setup workflow: reveal the card form, fill it for the billing
//! locale, then either submit or hand the open session to a human.

use crate::actuator::WebActuator;
use crate::billing::{BillingBranch, BillingProfile};
use crate::config::{PaymentConfig, TimingConfig};
use crate::element::{Key, WebElement};
use crate::errors::{ActuatorError, FormError, OutputClosed};
use crate::finder::ControlFinder;
use crate::locator::Locator;
use crate::messages::MessageKey;
use crate::reporter::{CompletionRecord, CompletionReporter};
use crate::session::RegistrationSession;
use crate::timing::{settle, sleep_or_cancel};
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, instrument, warn};

const HTML_SNIPPET_LEN: usize = 2000;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PaymentState {
    Start,
    TrialTriggered,
    CardFormRevealed,
    FieldsFilled(BillingBranch),
    Submitted,
    AwaitingHuman,
    Done,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PaymentOutcome {
    Submitted,
    /// The form is filled as far as automation goes; a human finishes it.
    AwaitingHuman,
    /// Something went wrong mid-fill. The form may be partly complete.
    CompletedWithWarnings(String),
    Failed(FormError),
    Interrupted,
}

/// Why the manual-completion wait ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HumanExit {
    Interrupted,
    SessionLost(String),
}

impl std::fmt::Display for HumanExit {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            HumanExit::Interrupted => write!(f, "interrupted"),
            HumanExit::SessionLost(reason) => write!(f, "browser session lost ({reason})"),
        }
    }
}

enum StepError {
    Form(FormError),
    Actuator(ActuatorError),
    Output(OutputClosed),
    Interrupted,
}

impl From<FormError> for StepError {
    fn from(e: FormError) -> Self {
        StepError::Form(e)
    }
}

impl From<ActuatorError> for StepError {
    fn from(e: ActuatorError) -> Self {
        StepError::Actuator(e)
    }
}

impl From<OutputClosed> for StepError {
    fn from(e: OutputClosed) -> Self {
        StepError::Output(e)
    }
}

pub struct PaymentSetupWorkflow<'a> {
    actuator: &'a dyn WebActuator,
    finder: &'a dyn ControlFinder,
    config: &'a PaymentConfig,
    timing: &'a TimingConfig,
    reporter: &'a CompletionReporter,
    cancel: CancellationToken,
    history: Vec<PaymentState>,
}

impl<'a> PaymentSetupWorkflow<'a> {
    pub fn new(
        actuator: &'a dyn WebActuator,
        finder: &'a dyn ControlFinder,
        config: &'a PaymentConfig,
        timing: &'a TimingConfig,
        reporter: &'a CompletionReporter,
        cancel: CancellationToken,
    ) -> Self {
        Self {
            actuator,
            finder,
            config,
            timing,
            reporter,
            cancel,
            history: vec![PaymentState::Start],
        }
    }

    pub fn state(&self) -> PaymentState {
        self.history
            .last()
            .copied()
            .unwrap_or(PaymentState::Start)
    }

    pub fn history(&self) -> &[PaymentState] {
        &self.history
    }

    /// Whether field filling has started. Only errors after this point are soft.
    fn form_revealed(&self) -> bool {
        self.history.contains(&PaymentState::CardFormRevealed)
    }

    fn transition(&mut self, next: PaymentState) {
        debug!("Payment state {:?} -> {:?}", self.state(), next);
        self.history.push(next);
    }

    /// Drive the form up to submission or the manual hand-off.
    /// Only a closed output channel is returned as an error.
    #[instrument(skip_all, fields(country = %profile.billing_country))]
    pub async fn run(&mut self, profile: &BillingProfile) -> Result<PaymentOutcome, OutputClosed> {
        self.reporter.progress(MessageKey::PaymentStart, &[])?;

        let outcome = match self.fill_and_submit(profile).await {
            Ok(outcome) => outcome,
            Err(StepError::Output(closed)) => return Err(closed),
            Err(StepError::Interrupted) => PaymentOutcome::Interrupted,
            Err(StepError::Form(e)) => {
                warn!("Payment setup stopped: {}", e);
                PaymentOutcome::Failed(e)
            }
            Err(StepError::Actuator(e)) if !self.form_revealed() => {
                warn!("Browser error before the card form loaded: {}", e);
                PaymentOutcome::Failed(FormError::Actuator(e.to_string()))
            }
            Err(StepError::Actuator(e)) => {
                warn!("Payment form error, treating as partial success: {}", e);
                self.reporter
                    .progress(MessageKey::PaymentSoftFailure, &[("error", &e)])?;
                sleep_or_cancel(self.config.soft_failure_wait, &self.cancel).await;
                PaymentOutcome::CompletedWithWarnings(e.to_string())
            }
        };

        if outcome != PaymentOutcome::AwaitingHuman {
            self.transition(PaymentState::Done);
        }
        Ok(outcome)
    }

    async fn fill_and_submit(
        &mut self,
        profile: &BillingProfile,
    ) -> Result<PaymentOutcome, StepError> {
        self.trigger_trial().await?;
        let card_number = self.reveal_card_form().await?;

        self.fill_element(&card_number, &profile.card_number, "cardNumber")
            .await?;
        self.fill_required(&self.config.fields.card_expiry, &profile.card_expiry, "cardExpiry")
            .await?;
        self.fill_required(&self.config.fields.card_cvc, &profile.card_cvc, "cardCvc")
            .await?;
        self.fill_optional(&self.config.fields.billing_name, &profile.billing_name, "billingName")
            .await?;

        let branch = profile.branch(&self.config.domestic_country);
        info!("Billing branch: {}", branch);
        match branch {
            BillingBranch::Domestic => self.fill_domestic(profile).await,
            BillingBranch::International => self.fill_international(profile).await,
        }
    }

    async fn trigger_trial(&mut self) -> Result<(), StepError> {
        let Some(control) = self
            .finder
            .find_control(self.actuator, &self.config.trial_control)
            .await?
        else {
            self.reporter
                .progress(MessageKey::TrialButtonMissing, &[])?;
            return Err(FormError::NoTrialButton.into());
        };
        control.click().await?;
        self.transition(PaymentState::TrialTriggered);

        self.pause_range(&self.timing.submit_wait).await?;
        self.pause(self.config.card_form_settle).await
    }

    async fn reveal_card_form(&mut self) -> Result<WebElement, StepError> {
        match self
            .finder
            .find_control(self.actuator, &self.config.reveal_control)
            .await
        {
            Ok(Some(control)) => {
                if let Err(e) = control.click().await {
                    warn!("Could not activate card form control: {}", e);
                }
            }
            Ok(None) => debug!("No card form control found, probing for the form anyway"),
            Err(e) => warn!("Looking for card form control failed: {}", e),
        }
        self.pause(self.config.reveal_settle).await?;

        let locator = Locator::from(self.config.fields.card_number.as_str());
        match self
            .actuator
            .find_element(&locator, Some(self.config.card_field_timeout))
            .await?
        {
            Some(field) => {
                self.transition(PaymentState::CardFormRevealed);
                Ok(field)
            }
            None => {
                self.log_page_diagnostics().await;
                self.reporter.progress(MessageKey::CardFormMissing, &[])?;
                Err(FormError::CardFormNotLoaded.into())
            }
        }
    }

    async fn log_page_diagnostics(&self) {
        if let Ok(inputs) = self.actuator.find_elements(&Locator::from("tag:input")).await {
            debug!("Card form missing; page has {} input fields", inputs.len());
        }
        if let Ok(html) = self.actuator.page_html().await {
            let snippet: String = html.chars().take(HTML_SNIPPET_LEN).collect();
            debug!("Page HTML: {}", snippet);
        }
    }

    async fn fill_domestic(&mut self, profile: &BillingProfile) -> Result<PaymentOutcome, StepError> {
        let fields = &self.config.fields;
        self.fill_optional(&fields.postal_code, &profile.billing_postal_code, "billingPostalCode")
            .await?;
        self.select_optional(
            &fields.administrative_area,
            &profile.billing_administrative_area,
            "billingAdministrativeArea",
        )
        .await?;
        self.fill_optional(&fields.locality, &profile.billing_locality, "billingLocality")
            .await?;
        self.fill_optional(
            &fields.dependent_locality,
            &profile.billing_dependent_locality,
            "billingDependentLocality",
        )
        .await?;
        self.fill_optional(
            &fields.address_line1,
            &profile.billing_address_line1,
            "billingAddressLine1",
        )
        .await?;

        self.transition(PaymentState::FieldsFilled(BillingBranch::Domestic));
        self.reporter.progress(
            MessageKey::FieldsFilled,
            &[("branch", &BillingBranch::Domestic)],
        )?;

        self.pause(self.config.review_wait).await?;
        self.submit().await
    }

    async fn fill_international(
        &mut self,
        profile: &BillingProfile,
    ) -> Result<PaymentOutcome, StepError> {
        let locator = Locator::from(self.config.fields.address_line1.as_str());
        match self.actuator.find_element(&locator, None).await? {
            Some(field) => {
                self.fill_element(&field, &profile.billing_address_line1, "billingAddressLine1")
                    .await?;
                self.pause(self.config.address_enter_wait).await?;
                field.press_key(Key::Enter).await?;
            }
            None => warn!("Address line field not found, leaving it to the operator"),
        }

        self.transition(PaymentState::FieldsFilled(BillingBranch::International));
        self.reporter.progress(
            MessageKey::FieldsFilled,
            &[("branch", &BillingBranch::International)],
        )?;
        self.transition(PaymentState::AwaitingHuman);
        self.reporter.progress(MessageKey::AwaitingHuman, &[])?;
        Ok(PaymentOutcome::AwaitingHuman)
    }

    async fn submit(&mut self) -> Result<PaymentOutcome, StepError> {
        let Some(control) = self
            .finder
            .find_control(self.actuator, &self.config.submit_control)
            .await?
        else {
            return Err(FormError::NoSubmitControl.into());
        };
        control.click().await?;
        info!("Payment form submitted");
        self.pause(self.config.submit_settle).await?;
        self.transition(PaymentState::Submitted);
        self.reporter.progress(MessageKey::PaymentSubmitted, &[])?;
        Ok(PaymentOutcome::Submitted)
    }

    /// Keep the session open until the operator interrupts or the browser
    /// goes away, then emit the terminal record. There is no timeout.
    #[instrument(skip_all)]
    pub async fn await_human(
        &mut self,
        session: &RegistrationSession,
    ) -> Result<(HumanExit, CompletionRecord), OutputClosed> {
        info!("Waiting for manual completion");
        let exit = loop {
            if !sleep_or_cancel(self.config.liveness_interval, &self.cancel).await {
                break HumanExit::Interrupted;
            }
            match self.actuator.current_url().await {
                Ok(url) => debug!("Session alive at {}", url),
                Err(e) => break HumanExit::SessionLost(e.to_string()),
            }
        };
        info!("Manual session ended: {}", exit);
        self.transition(PaymentState::Done);
        self.reporter
            .progress(MessageKey::HumanSessionEnded, &[("reason", &exit)])?;
        let record = self.reporter.finish(session)?;
        Ok((exit, record))
    }

    async fn fill_required(
        &self,
        locator: &str,
        value: &str,
        name: &str,
    ) -> Result<(), StepError> {
        let Some(field) = self.actuator.find_element(&Locator::from(locator), None).await? else {
            self.reporter
                .progress(MessageKey::FieldMissing, &[("field", &name)])?;
            return Err(FormError::MissingRequiredField(name.to_string()).into());
        };
        self.fill_element(&field, value, name).await
    }

    async fn fill_optional(&self, locator: &str, value: &str, name: &str) -> Result<(), StepError> {
        if value.trim().is_empty() {
            debug!("No value for {}, skipping", name);
            return Ok(());
        }
        match self.actuator.find_element(&Locator::from(locator), None).await? {
            Some(field) => self.fill_element(&field, value, name).await,
            None => {
                debug!("Optional field {} not present", name);
                Ok(())
            }
        }
    }

    async fn select_optional(&self, locator: &str, value: &str, name: &str) -> Result<(), StepError> {
        if value.trim().is_empty() {
            return Ok(());
        }
        match self.actuator.find_element(&Locator::from(locator), None).await? {
            Some(field) => {
                if let Err(e) = field.select_option(value).await {
                    warn!("Could not select {} for {}: {}", value, name, e);
                }
                self.pause_range(&self.timing.input_wait).await
            }
            None => {
                debug!("Optional field {} not present", name);
                Ok(())
            }
        }
    }

    async fn fill_element(&self, field: &WebElement, value: &str, name: &str) -> Result<(), StepError> {
        field.fill(value).await?;
        debug!("Filled {}", name);
        self.pause_range(&self.timing.input_wait).await
    }

    async fn pause(&self, duration: Duration) -> Result<(), StepError> {
        if sleep_or_cancel(duration, &self.cancel).await {
            Ok(())
        } else {
            Err(StepError::Interrupted)
        }
    }

    async fn pause_range(&self, range: &crate::duration::TimingRange) -> Result<(), StepError> {
        if settle(range, &self.cancel).await {
            Ok(())
        } else {
            Err(StepError::Interrupted)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::finder::LabelControlFinder;
    use crate::finder::DEFAULT_SCAN_SELECTOR;
    use crate::messages::English;
    use crate::tests::{FakeActuator, FakeElement, SharedBuffer};

    fn profile(country: &str) -> BillingProfile {
        BillingProfile {
            card_number: "4000000000000002".into(),
            card_expiry: "12/30".into(),
            card_cvc: "123".into(),
            billing_name: "Test Holder".into(),
            billing_country: country.into(),
            billing_postal_code: "100000".into(),
            billing_administrative_area: "Beijing".into(),
            billing_locality: "Beijing".into(),
            billing_dependent_locality: "Dongcheng".into(),
            billing_address_line1: "1 Test Road".into(),
        }
    }

    fn controls() -> Vec<FakeElement> {
        vec![
            FakeElement::button("trial", "Start free trial"),
            FakeElement::button("reveal", "Pay with card"),
            FakeElement::button("subscribe", "Subscribe"),
        ]
    }

    fn payment_page() -> FakeActuator {
        let actuator = FakeActuator::new();
        actuator.add_group(DEFAULT_SCAN_SELECTOR, controls());
        for (locator, name) in [
            ("#cardNumber", "card_number"),
            ("#cardExpiry", "card_expiry"),
            ("#cardCvc", "card_cvc"),
            ("#billingName", "billing_name"),
            ("#billingPostalCode", "postal_code"),
            ("#billingAdministrativeArea", "admin_area"),
            ("#billingLocality", "locality"),
            ("#billingDependentLocality", "dependent_locality"),
            ("#billingAddressLine1", "address_line1"),
        ] {
            actuator.add_element(locator, FakeElement::named(name));
        }
        actuator
    }

    struct Harness {
        config: PaymentConfig,
        timing: TimingConfig,
        reporter: CompletionReporter,
        buf: SharedBuffer,
    }

    impl Harness {
        fn new() -> Self {
            let buf = SharedBuffer::default();
            Self {
                config: PaymentConfig::default(),
                timing: TimingConfig::default(),
                reporter: CompletionReporter::new(Box::new(buf.clone()), &English),
                buf,
            }
        }

        fn workflow<'a>(
            &'a self,
            actuator: &'a FakeActuator,
            cancel: CancellationToken,
        ) -> PaymentSetupWorkflow<'a> {
            PaymentSetupWorkflow::new(
                actuator,
                &LabelControlFinder,
                &self.config,
                &self.timing,
                &self.reporter,
                cancel,
            )
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_domestic_fills_address_and_submits() {
        let harness = Harness::new();
        let actuator = payment_page();
        let mut workflow = harness.workflow(&actuator, CancellationToken::new());

        let outcome = workflow.run(&profile("China")).await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Submitted);

        for entry in [
            "click:trial",
            "click:reveal",
            "type:card_number=4000000000000002",
            "type:card_expiry=12/30",
            "type:card_cvc=123",
            "type:billing_name=Test Holder",
            "type:postal_code=100000",
            "select:admin_area=Beijing",
            "type:locality=Beijing",
            "type:dependent_locality=Dongcheng",
            "type:address_line1=1 Test Road",
            "click:subscribe",
        ] {
            assert!(actuator.has_call(entry), "missing {entry}: {:?}", actuator.calls());
        }
        assert!(!actuator.has_call_prefix("key:"));
        assert_eq!(
            workflow.history(),
            &[
                PaymentState::Start,
                PaymentState::TrialTriggered,
                PaymentState::CardFormRevealed,
                PaymentState::FieldsFilled(BillingBranch::Domestic),
                PaymentState::Submitted,
                PaymentState::Done,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_international_hands_off_without_submitting() {
        let harness = Harness::new();
        let actuator = payment_page();
        let mut workflow = harness.workflow(&actuator, CancellationToken::new());

        let outcome = workflow.run(&profile("Japan")).await.unwrap();
        assert_eq!(outcome, PaymentOutcome::AwaitingHuman);
        assert!(actuator.has_call("type:address_line1=1 Test Road"));
        assert!(actuator.has_call("key:address_line1=Enter"));
        assert!(!actuator.has_call_prefix("type:postal_code"));
        assert!(!actuator.has_call_prefix("select:"));
        assert!(!actuator.has_call("click:subscribe"));
        assert_eq!(workflow.state(), PaymentState::AwaitingHuman);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_trial_button() {
        let harness = Harness::new();
        let actuator = FakeActuator::new();
        actuator.add_group(
            DEFAULT_SCAN_SELECTOR,
            vec![FakeElement::button("help", "Help"), FakeElement::button("docs", "Docs")],
        );
        let mut workflow = harness.workflow(&actuator, CancellationToken::new());

        let outcome = workflow.run(&profile("China")).await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Failed(FormError::NoTrialButton));
        assert!(!actuator.has_call_prefix("click:"));
        assert!(harness
            .buf
            .lines()
            .contains(&"⚠️ Trial button not found".to_string()));
    }

    #[tokio::test(start_paused = true)]
    async fn test_card_form_not_loaded_after_reveal_failure() {
        let harness = Harness::new();
        let actuator = FakeActuator::new();
        actuator.add_group(
            DEFAULT_SCAN_SELECTOR,
            vec![FakeElement::button("trial", "Start free trial")],
        );
        actuator.set_html("<html><body>loading</body></html>");
        let mut workflow = harness.workflow(&actuator, CancellationToken::new());

        let outcome = workflow.run(&profile("China")).await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Failed(FormError::CardFormNotLoaded));
        assert_eq!(
            workflow.history(),
            &[PaymentState::Start, PaymentState::TrialTriggered, PaymentState::Done]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_required_field_aborts() {
        let harness = Harness::new();
        let actuator = FakeActuator::new();
        actuator.add_group(DEFAULT_SCAN_SELECTOR, controls());
        actuator.add_element("#cardNumber", FakeElement::named("card_number"));
        actuator.add_element("#cardExpiry", FakeElement::named("card_expiry"));
        let mut workflow = harness.workflow(&actuator, CancellationToken::new());

        let outcome = workflow.run(&profile("China")).await.unwrap();
        assert_eq!(
            outcome,
            PaymentOutcome::Failed(FormError::MissingRequiredField("cardCvc".into()))
        );
        assert!(!actuator.has_call("click:subscribe"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_optional_fields_may_be_absent() {
        let harness = Harness::new();
        let actuator = FakeActuator::new();
        actuator.add_group(DEFAULT_SCAN_SELECTOR, controls());
        actuator.add_element("#cardNumber", FakeElement::named("card_number"));
        actuator.add_element("#cardExpiry", FakeElement::named("card_expiry"));
        actuator.add_element("#cardCvc", FakeElement::named("card_cvc"));
        let mut workflow = harness.workflow(&actuator, CancellationToken::new());

        let outcome = workflow.run(&profile("China")).await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Submitted);
        assert!(actuator.has_call("click:subscribe"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_select_failure_is_not_fatal() {
        let harness = Harness::new();
        let actuator = payment_page();
        actuator.add_element(
            "#billingAdministrativeArea",
            FakeElement::named("admin_area").failing_select(),
        );
        let mut workflow = harness.workflow(&actuator, CancellationToken::new());

        let outcome = workflow.run(&profile("china")).await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Submitted);
        assert!(actuator.has_call("type:locality=Beijing"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_no_submit_control() {
        let harness = Harness::new();
        let actuator = payment_page();
        actuator.add_group(
            DEFAULT_SCAN_SELECTOR,
            vec![
                FakeElement::button("trial", "Start free trial"),
                FakeElement::button("reveal", "Pay with card"),
            ],
        );
        let mut workflow = harness.workflow(&actuator, CancellationToken::new());

        let outcome = workflow.run(&profile("China")).await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Failed(FormError::NoSubmitControl));
    }

    // Which control the submit step picks is still a heuristic. These pin the
    // current contract: label match first, position only when configured.
    #[tokio::test(start_paused = true)]
    async fn test_submit_position_fallback_is_opt_in() {
        let mut harness = Harness::new();
        harness.config.submit_control.labels = vec!["never shown".into()];
        harness.config.submit_control.ordinal_fallback = Some(2);
        let actuator = payment_page();
        let mut workflow = harness.workflow(&actuator, CancellationToken::new());

        let outcome = workflow.run(&profile("China")).await.unwrap();
        assert_eq!(outcome, PaymentOutcome::Submitted);
        assert!(actuator.has_call("click:subscribe"));
    }

    struct LostBrowser;

    #[async_trait::async_trait]
    impl ControlFinder for LostBrowser {
        async fn find_control(
            &self,
            _actuator: &dyn WebActuator,
            _criteria: &crate::finder::ControlCriteria,
        ) -> Result<Option<WebElement>, ActuatorError> {
            Err(ActuatorError::SessionClosed("gone".into()))
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_browser_error_before_card_form_is_failure() {
        let harness = Harness::new();
        let actuator = payment_page();
        let mut workflow = PaymentSetupWorkflow::new(
            &actuator,
            &LostBrowser,
            &harness.config,
            &harness.timing,
            &harness.reporter,
            CancellationToken::new(),
        );

        let start = tokio::time::Instant::now();
        let outcome = workflow.run(&profile("China")).await.unwrap();

        assert_eq!(
            outcome,
            PaymentOutcome::Failed(FormError::Actuator(
                ActuatorError::SessionClosed("gone".into()).to_string()
            ))
        );
        assert!(start.elapsed() < harness.config.soft_failure_wait);
        assert_eq!(workflow.history(), &[PaymentState::Start, PaymentState::Done]);
        assert!(!harness
            .buf
            .lines()
            .iter()
            .any(|l| l.contains("partly filled")));
    }

    #[tokio::test(start_paused = true)]
    async fn test_actuator_error_is_soft_failure() {
        let harness = Harness::new();
        let actuator = payment_page();
        actuator.add_element("#cardExpiry", FakeElement::named("card_expiry").failing_type());
        let mut workflow = harness.workflow(&actuator, CancellationToken::new());

        let start = tokio::time::Instant::now();
        let outcome = workflow.run(&profile("China")).await.unwrap();
        assert!(matches!(outcome, PaymentOutcome::CompletedWithWarnings(_)));
        assert!(actuator.has_call("type:card_number=4000000000000002"));
        assert!(!actuator.has_call("click:subscribe"));
        assert!(start.elapsed() >= harness.config.soft_failure_wait);
    }

    #[tokio::test(start_paused = true)]
    async fn test_human_wait_ends_when_session_lost() {
        let harness = Harness::new();
        let actuator = payment_page();
        actuator.fail_url_after(3);
        let session = RegistrationSession::builder("ada@example.com").build().unwrap();
        let record = CompletionRecord::success(&session, "token saved");
        harness.reporter.report(&record).unwrap();

        let mut workflow = harness.workflow(&actuator, CancellationToken::new());
        assert_eq!(workflow.run(&profile("Japan")).await.unwrap(), PaymentOutcome::AwaitingHuman);
        let (exit, finished) = workflow.await_human(&session).await.unwrap();

        assert!(matches!(exit, HumanExit::SessionLost(_)));
        assert_eq!(actuator.url_calls(), 4);
        assert_eq!(finished, record);
        assert_eq!(workflow.state(), PaymentState::Done);

        let lines = harness.buf.lines();
        let records: Vec<&String> = lines.iter().filter(|l| **l == record.to_line()).collect();
        assert_eq!(records.len(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_human_wait_ends_on_interrupt() {
        let harness = Harness::new();
        let actuator = payment_page();
        let session = RegistrationSession::builder("ada@example.com").build().unwrap();
        let cancel = CancellationToken::new();
        let mut workflow = harness.workflow(&actuator, cancel.clone());

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_secs(600)).await;
            trigger.cancel();
        });

        let (exit, finished) = workflow.await_human(&session).await.unwrap();
        assert_eq!(exit, HumanExit::Interrupted);
        assert!(finished.success);
        assert!(actuator.url_calls() >= 100);
        assert!(!actuator.was_closed());
    }
}
