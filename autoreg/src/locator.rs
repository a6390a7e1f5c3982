//! Locator expressions for page elements

/// Represents ways to locate an element on a page
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Locator {
    /// CSS selector
    Css(String),
    /// XPath expression
    XPath(String),
    /// Element id attribute (`#cardNumber`)
    Id(String),
    /// Tag name (`tag:button`)
    Tag(String),
    /// Element whose normalized visible text contains the value
    Text(String),
    /// Attribute equality (`@name=email`)
    Attribute { name: String, value: String },
    /// Represents an invalid locator string, with a reason.
    Invalid(String),
}

impl std::fmt::Display for Locator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self:?}")
    }
}

impl From<&str> for Locator {
    fn from(s: &str) -> Self {
        let s = s.trim();
        let lower = s.to_lowercase();
        match s {
            "" => Locator::Invalid("Empty locator".to_string()),
            _ if lower.starts_with("css:") => Locator::Css(s[4..].trim().to_string()),
            _ if lower.starts_with("xpath:") => Locator::XPath(s[6..].trim().to_string()),
            _ if lower.starts_with("tag:") => Locator::Tag(s[4..].trim().to_string()),
            _ if lower.starts_with("text:") => Locator::Text(s[5..].trim().to_string()),
            _ if lower.starts_with("id:") => Locator::Id(s[3..].trim().to_string()),
            _ if s.starts_with('#') && s.len() > 1 => Locator::Id(s[1..].to_string()),
            _ if s.starts_with('/') || s.starts_with('(') => Locator::XPath(s.to_string()),
            _ if s.starts_with('@') => match s[1..].split_once('=') {
                Some((name, value)) if !name.trim().is_empty() => Locator::Attribute {
                    name: name.trim().to_string(),
                    value: value.trim().trim_matches(|c| c == '"' || c == '\'').to_string(),
                },
                _ => Locator::Invalid(format!("Invalid attribute locator: '{s}'")),
            },
            _ => Locator::Invalid(format!(
                "Unknown locator format: \"{s}\". Use prefixes like 'css:', 'xpath:', '#', 'tag:', 'text:' or '@attr=value'."
            )),
        }
    }
}

impl From<String> for Locator {
    fn from(s: String) -> Self {
        Locator::from(s.as_str())
    }
}

impl Locator {
    /// Translate to a W3C WebDriver `(using, value)` strategy pair.
    pub fn to_webdriver(&self) -> Result<(&'static str, String), String> {
        match self {
            Locator::Css(css) => Ok(("css selector", css.clone())),
            Locator::XPath(xpath) => Ok(("xpath", xpath.clone())),
            Locator::Id(id) => Ok(("css selector", format!("[id=\"{}\"]", escape_css(id)))),
            Locator::Tag(tag) => Ok(("tag name", tag.clone())),
            Locator::Text(text) => Ok((
                "xpath",
                format!(
                    "//*[contains(normalize-space(.), {})][not(*[contains(normalize-space(.), {})])]",
                    xpath_literal(text),
                    xpath_literal(text)
                ),
            )),
            Locator::Attribute { name, value } => Ok((
                "css selector",
                format!("[{}=\"{}\"]", name, escape_css(value)),
            )),
            Locator::Invalid(reason) => Err(reason.clone()),
        }
    }

    pub fn is_valid(&self) -> bool {
        !matches!(self, Locator::Invalid(_))
    }
}

fn escape_css(value: &str) -> String {
    value.replace('\\', "\\\\").replace('"', "\\\"")
}

/// XPath 1.0 has no escape sequences, so mixed quotes need `concat()`.
pub fn xpath_literal(value: &str) -> String {
    if !value.contains('\'') {
        format!("'{value}'")
    } else if !value.contains('"') {
        format!("\"{value}\"")
    } else {
        let parts: Vec<String> = value.split('\'').map(|p| format!("'{p}'")).collect();
        format!("concat({})", parts.join(", \"'\", "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_prefixed_locators() {
        assert_eq!(
            Locator::from("css:div.card > input"),
            Locator::Css("div.card > input".to_string())
        );
        assert_eq!(Locator::from("#cardNumber"), Locator::Id("cardNumber".to_string()));
        assert_eq!(Locator::from("tag:button"), Locator::Tag("button".to_string()));
        assert_eq!(
            Locator::from("text:Start trial"),
            Locator::Text("Start trial".to_string())
        );
        assert_eq!(
            Locator::from("//button[@type='submit']"),
            Locator::XPath("//button[@type='submit']".to_string())
        );
        assert_eq!(
            Locator::from("@name='email'"),
            Locator::Attribute {
                name: "name".to_string(),
                value: "email".to_string()
            }
        );
    }

    #[test]
    fn test_unknown_format_is_invalid() {
        assert!(matches!(Locator::from("button"), Locator::Invalid(_)));
        assert!(matches!(Locator::from(""), Locator::Invalid(_)));
        assert!(matches!(Locator::from("@=x"), Locator::Invalid(_)));
    }

    #[test]
    fn test_webdriver_strategies() {
        assert_eq!(
            Locator::from("#billingName").to_webdriver().unwrap(),
            ("css selector", "[id=\"billingName\"]".to_string())
        );
        assert_eq!(
            Locator::from("tag:button").to_webdriver().unwrap(),
            ("tag name", "button".to_string())
        );
        assert!(Locator::from("nope").to_webdriver().is_err());
    }

    #[test]
    fn test_xpath_literal_mixed_quotes() {
        assert_eq!(xpath_literal("plain"), "'plain'");
        assert_eq!(xpath_literal("it's"), "\"it's\"");
        assert_eq!(
            xpath_literal("a'b\"c"),
            "concat('a', \"'\", 'b\"c')"
        );
    }
}
