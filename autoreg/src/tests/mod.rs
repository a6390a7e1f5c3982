//! Scripted fakes shared by the unit tests.

use crate::actuator::{ActuatorLauncher, Cookie, WebActuator};
use crate::element::{Key, WebElement, WebElementImpl};
use crate::errors::ActuatorError;
use crate::locator::Locator;
use async_trait::async_trait;
use std::collections::{HashMap, VecDeque};
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;

/// In-memory output channel that can be inspected after the fact.
#[derive(Debug, Clone, Default)]
pub struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    pub fn lines(&self) -> Vec<String> {
        let bytes = self.0.lock().unwrap().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(str::to_string)
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Output channel whose reader has gone away.
pub struct BrokenPipe;

impl Write for BrokenPipe {
    fn write(&mut self, _: &[u8]) -> io::Result<usize> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }

    fn flush(&mut self) -> io::Result<()> {
        Err(io::Error::from(io::ErrorKind::BrokenPipe))
    }
}

/// Behaviour of one fake page element. `name` identifies it in the call log.
#[derive(Debug, Clone, Default)]
pub struct FakeElement {
    pub name: String,
    pub text: String,
    pub attributes: HashMap<String, String>,
    pub fail_type: bool,
    pub fail_select: bool,
}

impl FakeElement {
    pub fn named(name: &str) -> Self {
        Self {
            name: name.to_string(),
            ..Self::default()
        }
    }

    pub fn button(name: &str, text: &str) -> Self {
        Self {
            text: text.to_string(),
            ..Self::named(name)
        }
    }

    pub fn with_attr(mut self, name: &str, value: &str) -> Self {
        self.attributes.insert(name.to_string(), value.to_string());
        self
    }

    pub fn failing_type(mut self) -> Self {
        self.fail_type = true;
        self
    }

    pub fn failing_select(mut self) -> Self {
        self.fail_select = true;
        self
    }
}

#[derive(Debug)]
struct FakeHandle {
    template: FakeElement,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeHandle {
    fn record(&self, entry: String) {
        self.log.lock().unwrap().push(entry);
    }
}

#[async_trait]
impl WebElementImpl for FakeHandle {
    async fn text(&self) -> Result<String, ActuatorError> {
        Ok(self.template.text.clone())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, ActuatorError> {
        Ok(self.template.attributes.get(name).cloned())
    }

    async fn click(&self) -> Result<(), ActuatorError> {
        self.record(format!("click:{}", self.template.name));
        Ok(())
    }

    async fn clear(&self) -> Result<(), ActuatorError> {
        self.record(format!("clear:{}", self.template.name));
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), ActuatorError> {
        if self.template.fail_type {
            return Err(ActuatorError::Protocol("element not interactable".into()));
        }
        self.record(format!("type:{}={}", self.template.name, text));
        Ok(())
    }

    async fn select_option(&self, label: &str) -> Result<(), ActuatorError> {
        if self.template.fail_select {
            return Err(ActuatorError::ElementNotFound(format!("option {label}")));
        }
        self.record(format!("select:{}={}", self.template.name, label));
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<(), ActuatorError> {
        self.record(format!("key:{}={:?}", self.template.name, key));
        Ok(())
    }
}

#[derive(Default)]
struct FakeState {
    elements: HashMap<Locator, FakeElement>,
    groups: HashMap<Locator, Vec<FakeElement>>,
    cookies: VecDeque<Result<Vec<Cookie>, ActuatorError>>,
    cookie_reads: usize,
    url_limit: Option<usize>,
    url_calls: usize,
    html: String,
    closed: bool,
}

/// Scripted actuator. Every interaction is appended to a shared call log.
#[derive(Default)]
pub struct FakeActuator {
    state: Mutex<FakeState>,
    log: Arc<Mutex<Vec<String>>>,
}

impl FakeActuator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add_element(&self, locator: &str, element: FakeElement) {
        self.state
            .lock()
            .unwrap()
            .elements
            .insert(Locator::from(locator), element);
    }

    pub fn add_group(&self, locator: &str, elements: Vec<FakeElement>) {
        self.state
            .lock()
            .unwrap()
            .groups
            .insert(Locator::from(locator), elements);
    }

    pub fn push_cookies(&self, result: Result<Vec<Cookie>, ActuatorError>) {
        self.state.lock().unwrap().cookies.push_back(result);
    }

    /// `current_url` succeeds `calls` times, then reports the session gone.
    pub fn fail_url_after(&self, calls: usize) {
        self.state.lock().unwrap().url_limit = Some(calls);
    }

    pub fn set_html(&self, html: &str) {
        self.state.lock().unwrap().html = html.to_string();
    }

    pub fn cookie_reads(&self) -> usize {
        self.state.lock().unwrap().cookie_reads
    }

    pub fn url_calls(&self) -> usize {
        self.state.lock().unwrap().url_calls
    }

    pub fn was_closed(&self) -> bool {
        self.state.lock().unwrap().closed
    }

    pub fn calls(&self) -> Vec<String> {
        self.log.lock().unwrap().clone()
    }

    pub fn has_call(&self, entry: &str) -> bool {
        self.calls().iter().any(|c| c == entry)
    }

    pub fn has_call_prefix(&self, prefix: &str) -> bool {
        self.calls().iter().any(|c| c.starts_with(prefix))
    }

    fn handle(&self, template: FakeElement) -> WebElement {
        WebElement::new(Box::new(FakeHandle {
            template,
            log: self.log.clone(),
        }))
    }

    fn ensure_open(&self) -> Result<(), ActuatorError> {
        if self.state.lock().unwrap().closed {
            return Err(ActuatorError::SessionClosed("closed".into()));
        }
        Ok(())
    }
}

#[async_trait]
impl WebActuator for FakeActuator {
    async fn navigate(&self, url: &str) -> Result<(), ActuatorError> {
        self.ensure_open()?;
        self.log.lock().unwrap().push(format!("navigate:{url}"));
        Ok(())
    }

    async fn find_element(
        &self,
        locator: &Locator,
        timeout: Option<Duration>,
    ) -> Result<Option<WebElement>, ActuatorError> {
        self.ensure_open()?;
        if let Locator::Invalid(reason) = locator {
            return Err(ActuatorError::InvalidLocator(reason.clone()));
        }
        let found = self.state.lock().unwrap().elements.get(locator).cloned();
        match found {
            Some(template) => Ok(Some(self.handle(template))),
            None => {
                if let Some(timeout) = timeout {
                    tokio::time::sleep(timeout).await;
                }
                Ok(None)
            }
        }
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<WebElement>, ActuatorError> {
        self.ensure_open()?;
        let templates = self
            .state
            .lock()
            .unwrap()
            .groups
            .get(locator)
            .cloned()
            .unwrap_or_default();
        Ok(templates.into_iter().map(|template| self.handle(template)).collect())
    }

    async fn read_cookies(&self) -> Result<Vec<Cookie>, ActuatorError> {
        let mut state = self.state.lock().unwrap();
        state.cookie_reads += 1;
        state.cookies.pop_front().unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn current_url(&self) -> Result<String, ActuatorError> {
        let mut state = self.state.lock().unwrap();
        state.url_calls += 1;
        if state.closed {
            return Err(ActuatorError::SessionClosed("closed".into()));
        }
        match state.url_limit {
            Some(limit) if state.url_calls > limit => {
                Err(ActuatorError::SessionClosed("browser window gone".into()))
            }
            _ => Ok("https://app.test/dashboard".to_string()),
        }
    }

    async fn page_title(&self) -> Result<String, ActuatorError> {
        self.ensure_open()?;
        Ok("Fake page".to_string())
    }

    async fn page_html(&self) -> Result<String, ActuatorError> {
        self.ensure_open()?;
        Ok(self.state.lock().unwrap().html.clone())
    }

    async fn close(&self) -> Result<(), ActuatorError> {
        self.state.lock().unwrap().closed = true;
        self.log.lock().unwrap().push("close".to_string());
        Ok(())
    }
}

/// Hands out one shared fake actuator and records each launch.
pub struct FakeLauncher {
    pub actuator: Arc<FakeActuator>,
    pub launches: Mutex<Vec<bool>>,
    pub fail: bool,
}

impl FakeLauncher {
    pub fn new(actuator: Arc<FakeActuator>) -> Self {
        Self {
            actuator,
            launches: Mutex::new(Vec::new()),
            fail: false,
        }
    }

    pub fn launch_count(&self) -> usize {
        self.launches.lock().unwrap().len()
    }
}

#[async_trait]
impl ActuatorLauncher for FakeLauncher {
    async fn launch(&self, incognito: bool) -> Result<Arc<dyn WebActuator>, ActuatorError> {
        self.launches.lock().unwrap().push(incognito);
        if self.fail {
            return Err(ActuatorError::Transport("connection refused".into()));
        }
        let actuator: Arc<dyn WebActuator> = self.actuator.clone();
        Ok(actuator)
    }
}
