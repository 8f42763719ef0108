use std::fmt;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::SelectorSection;

use super::driver::{Locator, PageDriver};
use super::error::LabResult;
use super::session::LabSession;
use super::tabs::CourseTab;
use super::wait::Deadline;

/// Upper-cased button captions the lab panel is known to render.
pub mod label {
    pub const CREATE: &str = "CREATE";
    pub const CREATING: &str = "CREATING";
    pub const DELETE: &str = "DELETE";
    pub const DELETING: &str = "DELETING";
    pub const START: &str = "START";
    pub const STARTING: &str = "STARTING";
    pub const STOP: &str = "STOP";
    pub const STOPPING: &str = "STOPPING";
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ButtonPosition {
    Primary,
    Secondary,
}

impl ButtonPosition {
    pub fn index(&self) -> usize {
        match self {
            ButtonPosition::Primary => 0,
            ButtonPosition::Secondary => 1,
        }
    }
}

/// Captions of the first two lab action buttons, in page order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct LabStatus {
    pub primary: Option<String>,
    pub secondary: Option<String>,
}

impl LabStatus {
    pub fn new(primary: Option<&str>, secondary: Option<&str>) -> Self {
        Self {
            primary: primary.and_then(normalize),
            secondary: secondary.and_then(normalize),
        }
    }

    pub fn from_texts<S: AsRef<str>>(texts: &[S]) -> Self {
        Self::new(
            texts.first().map(AsRef::as_ref),
            texts.get(1).map(AsRef::as_ref),
        )
    }

    pub fn primary(&self) -> Option<&str> {
        self.primary.as_deref()
    }

    pub fn secondary(&self) -> Option<&str> {
        self.secondary.as_deref()
    }

    pub fn at(&self, position: ButtonPosition) -> Option<&str> {
        match position {
            ButtonPosition::Primary => self.primary(),
            ButtonPosition::Secondary => self.secondary(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.primary.is_none() && self.secondary.is_none()
    }

    pub fn state(&self) -> LabState {
        use label::*;

        match (self.primary(), self.secondary()) {
            (Some(CREATE), _) => LabState::Absent,
            (Some(CREATING), _) => LabState::Creating,
            (Some(DELETING), _) => LabState::Deleting,
            (Some(DELETE), Some(STOP)) => LabState::Running,
            (Some(DELETE), Some(START)) => LabState::Stopped,
            (Some(DELETE), Some(STOPPING)) => LabState::Stopping,
            (Some(DELETE), Some(STARTING)) => LabState::Starting,
            // DELETE alone cannot tell running from stopped.
            _ => LabState::Anomaly,
        }
    }
}

impl fmt::Display for LabStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "({}, {})",
            self.primary().unwrap_or("-"),
            self.secondary().unwrap_or("-")
        )
    }
}

fn normalize(text: &str) -> Option<String> {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        None
    } else {
        Some(trimmed.to_uppercase())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabState {
    Absent,
    Creating,
    Starting,
    Running,
    Stopped,
    Stopping,
    Deleting,
    Anomaly,
}

impl LabState {
    pub fn is_transient(&self) -> bool {
        matches!(self, LabState::Creating | LabState::Deleting)
    }

    pub fn is_active(&self) -> bool {
        matches!(
            self,
            LabState::Starting | LabState::Running | LabState::Stopping
        )
    }
}

impl fmt::Display for LabState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = match self {
            LabState::Absent => "no lab",
            LabState::Creating => "creating",
            LabState::Starting => "starting",
            LabState::Running => "running",
            LabState::Stopped => "stopped",
            LabState::Stopping => "stopping",
            LabState::Deleting => "deleting",
            LabState::Anomaly => "anomaly",
        };
        f.write_str(text)
    }
}

/// Anything that can report the current button pair of a lab panel.
#[async_trait(?Send)]
pub trait StatusSource {
    async fn read(&mut self) -> LabResult<LabStatus>;
}

/// Reads the lab button row of whatever page is loaded, without touching tabs.
/// No controls within `timeout` yields an empty status.
#[derive(Debug)]
pub struct ButtonPanel<'a, D: ?Sized> {
    driver: &'a mut D,
    selectors: &'a SelectorSection,
    timeout: Duration,
    poll: Duration,
}

impl<'a, D: PageDriver + ?Sized> ButtonPanel<'a, D> {
    pub fn new(
        driver: &'a mut D,
        selectors: &'a SelectorSection,
        timeout: Duration,
        poll: Duration,
    ) -> Self {
        Self {
            driver,
            selectors,
            timeout,
            poll,
        }
    }
}

#[async_trait(?Send)]
impl<D: PageDriver + ?Sized> StatusSource for ButtonPanel<'_, D> {
    async fn read(&mut self) -> LabResult<LabStatus> {
        let locator = Locator::xpath(&self.selectors.lab_buttons);
        let deadline = Deadline::new(self.timeout, self.poll);
        loop {
            match self.driver.texts(&locator).await {
                Ok(texts) if !texts.is_empty() => return Ok(LabStatus::from_texts(&texts)),
                Ok(_) => {}
                Err(err) => debug!(error = %err, "failed to read lab buttons"),
            }
            if deadline.expired() {
                return Ok(LabStatus::default());
            }
            deadline.tick().await;
        }
    }
}

impl<D: PageDriver> LabSession<D> {
    /// Selects the lab-environment tab and reads the action buttons by position.
    pub async fn probe(&mut self) -> LabResult<LabStatus> {
        self.select_tab(CourseTab::LabEnvironment).await?;
        let status = self
            .button_panel(self.config.timing.status_probe())
            .read()
            .await?;
        self.metrics.record_probe();
        debug!(
            primary = status.primary().unwrap_or("-"),
            secondary = status.secondary().unwrap_or("-"),
            "lab status"
        );
        Ok(status)
    }

    pub(crate) fn button_panel(&mut self, timeout: Duration) -> ButtonPanel<'_, D> {
        let poll = self.config.timing.poll_interval();
        ButtonPanel::new(&mut self.driver, &self.config.selectors, timeout, poll)
    }
}

#[cfg(test)]
mod tests {
    use super::label::*;
    use super::*;

    fn state(primary: Option<&str>, secondary: Option<&str>) -> LabState {
        LabStatus::new(primary, secondary).state()
    }

    #[test]
    fn canonical_pairs_classify() {
        assert_eq!(state(Some(CREATE), None), LabState::Absent);
        assert_eq!(state(Some(CREATING), Some(STARTING)), LabState::Creating);
        assert_eq!(state(Some(DELETE), Some(STOP)), LabState::Running);
        assert_eq!(state(Some(DELETE), Some(START)), LabState::Stopped);
        assert_eq!(state(Some(DELETE), Some(STOPPING)), LabState::Stopping);
        assert_eq!(state(Some(DELETING), None), LabState::Deleting);
    }

    #[test]
    fn creating_tolerates_transient_secondaries() {
        assert_eq!(state(Some(CREATING), Some(DELETE)), LabState::Creating);
        assert_eq!(state(Some(CREATING), Some(DELETING)), LabState::Creating);
        assert_eq!(state(Some(CREATING), None), LabState::Creating);
    }

    #[test]
    fn delete_without_secondary_is_anomaly() {
        assert_eq!(state(Some(DELETE), None), LabState::Anomaly);
    }

    #[test]
    fn no_buttons_is_anomaly() {
        let status = LabStatus::from_texts::<&str>(&[]);
        assert!(status.is_empty());
        assert_eq!(status.state(), LabState::Anomaly);
    }

    #[test]
    fn captions_are_trimmed_and_uppercased() {
        let status = LabStatus::from_texts(&["  Delete ", "Stop\n", "ignored"]);
        assert_eq!(status.primary(), Some(DELETE));
        assert_eq!(status.secondary(), Some(STOP));
        assert_eq!(status.to_string(), "(DELETE, STOP)");
    }

    #[test]
    fn blank_caption_counts_as_absent() {
        let status = LabStatus::from_texts(&["Create", "   "]);
        assert_eq!(status.secondary(), None);
        assert_eq!(status.to_string(), "(CREATE, -)");
    }

    #[test]
    fn activity_flags() {
        assert!(LabState::Running.is_active());
        assert!(LabState::Starting.is_active());
        assert!(!LabState::Stopped.is_active());
        assert!(LabState::Creating.is_transient());
        assert!(!LabState::Anomaly.is_transient());
    }
}
