use std::fmt;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use super::error::LabResult;

/// XPath expression identifying zero or more page elements.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Locator(String);

impl Locator {
    pub fn xpath(expression: impl Into<String>) -> Self {
        Self(expression.into())
    }

    /// Fills a `{key}` placeholder of a configured selector template.
    pub fn from_template(template: &str, key: &str, value: &str) -> Self {
        Self(template.replace(&format!("{{{key}}}"), value))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PageLink {
    pub text: String,
    pub href: String,
}

/// The browser capability the lab lifecycle is written against.
///
/// Implementations must not assume a particular engine beyond locating
/// elements, reading their text/attributes and clicking them. All waiting is
/// done by callers through bounded polling.
#[async_trait(?Send)]
pub trait PageDriver {
    async fn navigate(&mut self, url: &str) -> LabResult<()>;
    async fn reload(&mut self) -> LabResult<()>;
    async fn current_url(&mut self) -> LabResult<String>;
    async fn count(&mut self, locator: &Locator) -> LabResult<usize>;
    async fn texts(&mut self, locator: &Locator) -> LabResult<Vec<String>>;
    async fn attribute(
        &mut self,
        locator: &Locator,
        index: usize,
        name: &str,
    ) -> LabResult<Option<String>>;
    async fn click(&mut self, locator: &Locator, index: usize) -> LabResult<()>;
    /// Replaces the value of an input element and fires its input events.
    async fn type_text(&mut self, locator: &Locator, index: usize, text: &str) -> LabResult<()>;
    async fn links(&mut self, locator: &Locator) -> LabResult<Vec<PageLink>>;
    async fn execute(&mut self, script: &str) -> LabResult<()>;
    /// Dismisses the cookie-consent overlay if one is showing.
    async fn accept_cookie_consent(&mut self) -> LabResult<bool>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn template_substitution_replaces_placeholder() {
        let locator = Locator::from_template(
            r#"//*[@id="course-tabs-tab-{id}"]"#,
            "id",
            "8",
        );
        assert_eq!(locator.as_str(), r#"//*[@id="course-tabs-tab-8"]"#);
    }

    #[test]
    fn template_without_placeholder_is_unchanged() {
        let locator = Locator::from_template("//table/tr[1]/td[1]/time", "row", "2");
        assert_eq!(locator.to_string(), "//table/tr[1]/td[1]/time");
    }
}
