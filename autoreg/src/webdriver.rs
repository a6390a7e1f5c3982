//! W3C WebDriver actuator over HTTP (chromedriver, geckodriver).

use crate::actuator::{ActuatorLauncher, Cookie, WebActuator};
use crate::config::WebDriverConfig;
use crate::element::{Key, WebElement, WebElementImpl};
use crate::errors::ActuatorError;
use crate::locator::Locator;
use async_trait::async_trait;
use reqwest::Method;
use serde_json::{json, Value};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::time::Instant;
use tracing::{debug, info, instrument, warn};

/// Key the W3C protocol uses for element references.
pub const ELEMENT_KEY: &str = "element-6066-11e4-a52e-4f735466cecf";

/// Build the `POST /session` payload for `config`.
pub fn capabilities(config: &WebDriverConfig, incognito: bool) -> Value {
    let mut args = config.args.clone();
    let firefox = config.browser.eq_ignore_ascii_case("firefox");
    if firefox {
        if incognito {
            args.push("-private".to_string());
        }
        if config.headless {
            args.push("-headless".to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": "firefox",
                    "moz:firefoxOptions": { "args": args }
                }
            }
        })
    } else {
        if incognito {
            args.push("--incognito".to_string());
        }
        if config.headless {
            args.push("--headless=new".to_string());
        }
        json!({
            "capabilities": {
                "alwaysMatch": {
                    "browserName": config.browser.to_lowercase(),
                    "goog:chromeOptions": { "args": args }
                }
            }
        })
    }
}

/// Map a WebDriver error payload (`{"error": ..., "message": ...}`).
pub fn protocol_error(value: &Value) -> ActuatorError {
    let error = value.get("error").and_then(Value::as_str).unwrap_or("unknown error");
    let message = value
        .get("message")
        .and_then(Value::as_str)
        .unwrap_or_default()
        .to_string();
    match error {
        "no such element" | "stale element reference" => ActuatorError::ElementNotFound(message),
        "invalid session id" | "no such window" => ActuatorError::SessionClosed(message),
        "invalid selector" | "invalid argument" => ActuatorError::InvalidLocator(message),
        "timeout" | "script timeout" => ActuatorError::Timeout(message),
        "unsupported operation" | "unknown command" => {
            ActuatorError::UnsupportedOperation(message)
        }
        other => ActuatorError::Protocol(format!("{other}: {message}")),
    }
}

pub fn element_id(value: &Value) -> Result<String, ActuatorError> {
    value
        .get(ELEMENT_KEY)
        .or_else(|| value.get("ELEMENT"))
        .and_then(Value::as_str)
        .map(str::to_string)
        .ok_or_else(|| ActuatorError::Protocol(format!("Not an element reference: {value}")))
}

#[derive(Debug)]
struct Session {
    client: reqwest::Client,
    /// `<server>/session/<id>`
    base: String,
    poll_interval: Duration,
    closed: AtomicBool,
}

impl Session {
    async fn command(
        &self,
        method: Method,
        path: &str,
        body: Option<Value>,
    ) -> Result<Value, ActuatorError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(ActuatorError::SessionClosed(self.base.clone()));
        }
        send(&self.client, method, &format!("{}{}", self.base, path), body).await
    }
}

async fn send(
    client: &reqwest::Client,
    method: Method,
    url: &str,
    body: Option<Value>,
) -> Result<Value, ActuatorError> {
    let mut request = client.request(method, url);
    if let Some(body) = body {
        request = request.json(&body);
    }
    let response = request.send().await?;
    let status = response.status();
    let mut payload: Value = response.json().await?;
    let value = payload.get_mut("value").map(Value::take).unwrap_or(Value::Null);
    if !status.is_success() || value.get("error").is_some() {
        return Err(protocol_error(&value));
    }
    Ok(value)
}

/// One live WebDriver session.
#[derive(Debug, Clone)]
pub struct WebDriverActuator {
    session: Arc<Session>,
}

impl WebDriverActuator {
    /// Open a new browser session on the WebDriver server.
    #[instrument(skip(config), fields(url = %config.url, browser = %config.browser))]
    pub async fn connect(config: &WebDriverConfig, incognito: bool) -> Result<Self, ActuatorError> {
        let client = reqwest::Client::new();
        let server = config.url.trim_end_matches('/');
        let value = send(
            &client,
            Method::POST,
            &format!("{server}/session"),
            Some(capabilities(config, incognito)),
        )
        .await?;
        let id = value
            .get("sessionId")
            .and_then(Value::as_str)
            .ok_or_else(|| ActuatorError::Protocol(format!("No sessionId in {value}")))?;
        info!("WebDriver session {} started", id);
        Ok(Self {
            session: Arc::new(Session {
                client,
                base: format!("{server}/session/{id}"),
                poll_interval: config.poll_interval,
                closed: AtomicBool::new(false),
            }),
        })
    }

    fn wrap(&self, reference: &Value) -> Result<WebElement, ActuatorError> {
        Ok(WebElement::new(Box::new(WebDriverElement {
            session: self.session.clone(),
            id: element_id(reference)?,
        })))
    }

    async fn find_once(&self, locator: &Locator) -> Result<Option<WebElement>, ActuatorError> {
        let (using, value) = locator.to_webdriver().map_err(ActuatorError::InvalidLocator)?;
        match self
            .session
            .command(
                Method::POST,
                "/element",
                Some(json!({ "using": using, "value": value })),
            )
            .await
        {
            Ok(reference) => self.wrap(&reference).map(Some),
            Err(ActuatorError::ElementNotFound(_)) => Ok(None),
            Err(e) => Err(e),
        }
    }

    async fn get_string(&self, path: &str) -> Result<String, ActuatorError> {
        let value = self.session.command(Method::GET, path, None).await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }
}

#[async_trait]
impl WebActuator for WebDriverActuator {
    async fn navigate(&self, url: &str) -> Result<(), ActuatorError> {
        debug!("Navigating to {}", url);
        self.session
            .command(Method::POST, "/url", Some(json!({ "url": url })))
            .await?;
        Ok(())
    }

    async fn find_element(
        &self,
        locator: &Locator,
        timeout: Option<Duration>,
    ) -> Result<Option<WebElement>, ActuatorError> {
        let deadline = Instant::now() + timeout.unwrap_or_default();
        loop {
            if let Some(element) = self.find_once(locator).await? {
                return Ok(Some(element));
            }
            if Instant::now() >= deadline {
                debug!("No element for {} within {:?}", locator, timeout);
                return Ok(None);
            }
            tokio::time::sleep(self.session.poll_interval).await;
        }
    }

    async fn find_elements(&self, locator: &Locator) -> Result<Vec<WebElement>, ActuatorError> {
        let (using, value) = locator.to_webdriver().map_err(ActuatorError::InvalidLocator)?;
        let references = self
            .session
            .command(
                Method::POST,
                "/elements",
                Some(json!({ "using": using, "value": value })),
            )
            .await?;
        references
            .as_array()
            .map(|refs| refs.iter().map(|r| self.wrap(r)).collect())
            .unwrap_or_else(|| Ok(Vec::new()))
    }

    async fn read_cookies(&self) -> Result<Vec<Cookie>, ActuatorError> {
        let value = self.session.command(Method::GET, "/cookie", None).await?;
        serde_json::from_value(value)
            .map_err(|e| ActuatorError::Protocol(format!("Malformed cookie list: {e}")))
    }

    async fn current_url(&self) -> Result<String, ActuatorError> {
        self.get_string("/url").await
    }

    async fn page_title(&self) -> Result<String, ActuatorError> {
        self.get_string("/title").await
    }

    async fn page_html(&self) -> Result<String, ActuatorError> {
        self.get_string("/source").await
    }

    async fn close(&self) -> Result<(), ActuatorError> {
        let result = self.session.command(Method::DELETE, "", None).await;
        self.session.closed.store(true, Ordering::SeqCst);
        match result {
            Ok(_) => {
                info!("WebDriver session closed");
                Ok(())
            }
            Err(ActuatorError::SessionClosed(_)) => Ok(()),
            Err(e) => Err(e),
        }
    }
}

#[derive(Debug)]
struct WebDriverElement {
    session: Arc<Session>,
    id: String,
}

impl WebDriverElement {
    fn path(&self, suffix: &str) -> String {
        format!("/element/{}{}", self.id, suffix)
    }
}

#[async_trait]
impl WebElementImpl for WebDriverElement {
    async fn text(&self) -> Result<String, ActuatorError> {
        let value = self
            .session
            .command(Method::GET, &self.path("/text"), None)
            .await?;
        Ok(value.as_str().unwrap_or_default().to_string())
    }

    async fn attribute(&self, name: &str) -> Result<Option<String>, ActuatorError> {
        let value = self
            .session
            .command(Method::GET, &self.path(&format!("/attribute/{name}")), None)
            .await?;
        Ok(value.as_str().map(str::to_string))
    }

    async fn click(&self) -> Result<(), ActuatorError> {
        self.session
            .command(Method::POST, &self.path("/click"), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn clear(&self) -> Result<(), ActuatorError> {
        self.session
            .command(Method::POST, &self.path("/clear"), Some(json!({})))
            .await?;
        Ok(())
    }

    async fn type_text(&self, text: &str) -> Result<(), ActuatorError> {
        self.session
            .command(Method::POST, &self.path("/value"), Some(json!({ "text": text })))
            .await?;
        Ok(())
    }

    async fn select_option(&self, label: &str) -> Result<(), ActuatorError> {
        let xpath = format!(
            ".//option[normalize-space(.)={}]",
            crate::locator::xpath_literal(label)
        );
        let option = self
            .session
            .command(
                Method::POST,
                &self.path("/element"),
                Some(json!({ "using": "xpath", "value": xpath })),
            )
            .await
            .map_err(|e| match e {
                ActuatorError::ElementNotFound(_) => {
                    ActuatorError::ElementNotFound(format!("option '{label}'"))
                }
                other => other,
            })?;
        let option_id = element_id(&option)?;
        self.session
            .command(
                Method::POST,
                &format!("/element/{option_id}/click"),
                Some(json!({})),
            )
            .await?;
        Ok(())
    }

    async fn press_key(&self, key: Key) -> Result<(), ActuatorError> {
        self.session
            .command(
                Method::POST,
                &self.path("/value"),
                Some(json!({ "text": key.webdriver_code().to_string() })),
            )
            .await?;
        Ok(())
    }
}

/// Opens [`WebDriverActuator`] sessions.
#[derive(Debug, Clone)]
pub struct WebDriverLauncher {
    config: WebDriverConfig,
}

impl WebDriverLauncher {
    pub fn new(config: WebDriverConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl ActuatorLauncher for WebDriverLauncher {
    async fn launch(&self, incognito: bool) -> Result<Arc<dyn WebActuator>, ActuatorError> {
        let actuator = WebDriverActuator::connect(&self.config, incognito)
            .await
            .map_err(|e| {
                warn!("Could not start WebDriver session at {}: {}", self.config.url, e);
                e
            })?;
        Ok(Arc::new(actuator))
    }
}
