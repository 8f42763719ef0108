use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{debug, warn};

use super::driver::{Locator, PageDriver};
use super::error::{LabError, LabResult};
use super::interface::InterfaceVariant;
use super::session::LabSession;
use super::wait::{wait_for_present, Deadline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum CourseTab {
    Index,
    Course,
    LabEnvironment,
}

impl CourseTab {
    pub fn as_str(&self) -> &'static str {
        match self {
            CourseTab::Index => "index",
            CourseTab::Course => "course",
            CourseTab::LabEnvironment => "lab-environment",
        }
    }

    pub fn old_id(&self) -> &'static str {
        match self {
            CourseTab::Index => "1",
            CourseTab::Course => "2",
            CourseTab::LabEnvironment => "8",
        }
    }

    pub fn new_label(&self) -> &'static str {
        match self {
            CourseTab::Index | CourseTab::Course => "Course",
            CourseTab::LabEnvironment => "Lab Environment",
        }
    }
}

impl fmt::Display for CourseTab {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CourseTab {
    type Err = LabError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_lowercase().as_str() {
            "index" => Ok(CourseTab::Index),
            "course" => Ok(CourseTab::Course),
            "lab-environment" | "lab" => Ok(CourseTab::LabEnvironment),
            other => Err(LabError::InvalidTab(other.to_string())),
        }
    }
}

impl<D: PageDriver> LabSession<D> {
    /// Clicks `tab` and waits for it to report `aria-selected="true"`.
    pub async fn select_tab(&mut self, tab: CourseTab) -> LabResult<()> {
        self.normalize_viewport().await;
        let variant = self.interface_variant().await;
        let locator = variant.tab_locator(&self.config.selectors, tab);
        let timeout = variant.tab_timeout(&self.config.timing);

        if self.try_select(&locator, timeout).await? {
            sleep(self.config.timing.tab_settle()).await;
            return Ok(());
        }

        if variant.recovers_with_cookie_consent() {
            warn!(
                tab = %tab,
                "tab did not become selected, dismissing cookie consent and retrying"
            );
            self.metrics.record_tab_retry();
            if let Err(err) = self.driver.accept_cookie_consent().await {
                debug!(error = %err, "cookie consent dismissal failed");
            }
            sleep(self.config.timing.tab_recovery_pause()).await;
            if self.try_select(&locator, timeout).await? {
                sleep(self.config.timing.tab_settle()).await;
                return Ok(());
            }
        }

        Err(LabError::TabSelectionFailed {
            tab: tab.to_string(),
            interface: variant.to_string(),
        })
    }

    async fn try_select(&mut self, locator: &Locator, timeout: Duration) -> LabResult<bool> {
        let poll = self.config.timing.poll_interval();
        if !wait_for_present(&mut self.driver, locator, timeout, poll).await? {
            return Ok(false);
        }
        match self.driver.click(locator, 0).await {
            Ok(()) => {}
            Err(LabError::ElementNotFound(_)) => return Ok(false),
            Err(err) => return Err(err),
        }
        let deadline = Deadline::new(timeout, poll);
        loop {
            // The tab node can vanish while the panel re-renders after a click.
            let selected = match self.driver.attribute(locator, 0, "aria-selected").await {
                Ok(value) => value.as_deref() == Some("true"),
                Err(LabError::ElementNotFound(_)) => false,
                Err(err) => return Err(err),
            };
            if selected {
                return Ok(true);
            }
            if deadline.expired() {
                return Ok(false);
            }
            deadline.tick().await;
        }
    }

    pub async fn interface_variant(&mut self) -> InterfaceVariant {
        self.interface
            .detect(&mut self.driver, &self.config.selectors, &self.config.timing)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tab_names_parse_case_insensitively() {
        assert_eq!("Lab-Environment".parse::<CourseTab>().unwrap(), CourseTab::LabEnvironment);
        assert_eq!("lab".parse::<CourseTab>().unwrap(), CourseTab::LabEnvironment);
        assert_eq!("INDEX".parse::<CourseTab>().unwrap(), CourseTab::Index);
        assert!(matches!(
            "console".parse::<CourseTab>(),
            Err(LabError::InvalidTab(name)) if name == "console"
        ));
    }
}
