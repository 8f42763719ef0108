use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use super::driver::{Locator, PageDriver};
use super::error::{LabError, LabResult};
use super::session::LabSession;
use super::status::{label, ButtonPosition, LabStatus, StatusSource};
use super::wait::{wait_for_present, Deadline};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum LabAction {
    Create,
    Start,
    Stop,
    Delete,
    Settle,
}

impl LabAction {
    pub fn as_str(&self) -> &'static str {
        match self {
            LabAction::Create => "create",
            LabAction::Start => "start",
            LabAction::Stop => "stop",
            LabAction::Delete => "delete",
            LabAction::Settle => "settle",
        }
    }
}

impl fmt::Display for LabAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Result of a lifecycle command that did not fail hard.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum ActionOutcome {
    /// The button was pressed and the panel reached `reached`.
    Performed { reached: String },
    /// The lab was already where the command would take it.
    AlreadySatisfied { observed: LabStatus },
    /// Wrong prior state; nothing was clicked.
    Skipped { observed: LabStatus },
}

impl ActionOutcome {
    pub fn performed(&self) -> bool {
        matches!(self, ActionOutcome::Performed { .. })
    }

    pub fn succeeded(&self) -> bool {
        !matches!(self, ActionOutcome::Skipped { .. })
    }
}

impl fmt::Display for ActionOutcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ActionOutcome::Performed { reached } => write!(f, "performed, now {reached}"),
            ActionOutcome::AlreadySatisfied { observed } => {
                write!(f, "already satisfied {observed}")
            }
            ActionOutcome::Skipped { observed } => write!(f, "skipped, lab is {observed}"),
        }
    }
}

impl<D: PageDriver> LabSession<D> {
    pub async fn create(&mut self, course_id: &str) -> LabResult<ActionOutcome> {
        self.steps.step(format!("Creating lab for {course_id}"));
        let status = self.probe().await?;
        if status.primary() != Some(label::CREATE) {
            info!(course = course_id, %status, "create not available, skipping");
            return Ok(ActionOutcome::Skipped { observed: status });
        }

        self.press(ButtonPosition::Primary).await?;
        let reached = self
            .await_transition(
                LabAction::Create,
                ButtonPosition::Primary,
                &[label::CREATING, label::DELETE, label::DELETING],
                self.config.timing.create_transition(),
            )
            .await?;
        info!(course = course_id, reached = %reached, "lab creation started");
        Ok(ActionOutcome::Performed { reached })
    }

    pub async fn start(&mut self, course_id: &str) -> LabResult<ActionOutcome> {
        self.steps.step(format!("Starting lab for {course_id}"));
        let status = self.probe().await?;
        match status.secondary() {
            Some(label::START) => {}
            Some(label::STOP) | Some(label::STOPPING) | Some(label::STARTING) => {
                info!(course = course_id, %status, "lab already running");
                return Ok(ActionOutcome::AlreadySatisfied { observed: status });
            }
            _ => {
                warn!(course = course_id, %status, "start button not available, skipping");
                return Ok(ActionOutcome::Skipped { observed: status });
            }
        }

        self.press(ButtonPosition::Secondary).await?;
        sleep(self.config.timing.post_click_pause()).await;
        let reached = self
            .await_transition(
                LabAction::Start,
                ButtonPosition::Secondary,
                &[label::STARTING, label::STOP, label::STOPPING],
                self.config.timing.start_transition(),
            )
            .await?;
        info!(course = course_id, reached = %reached, "lab start issued");
        Ok(ActionOutcome::Performed { reached })
    }

    pub async fn stop(&mut self, course_id: &str) -> LabResult<ActionOutcome> {
        self.steps.step(format!("Stopping lab for {course_id}"));
        let status = self.probe().await?;
        match status.secondary() {
            Some(label::STOP) => {}
            Some(label::START) | Some(label::STOPPING) => {
                info!(course = course_id, %status, "lab already stopped");
                return Ok(ActionOutcome::AlreadySatisfied { observed: status });
            }
            _ => {
                warn!(course = course_id, %status, "stop button not available, skipping");
                return Ok(ActionOutcome::Skipped { observed: status });
            }
        }

        self.press(ButtonPosition::Secondary).await?;
        self.confirm(LabAction::Stop, "Stop").await?;
        sleep(self.config.timing.post_click_pause()).await;
        let reached = self
            .await_transition(
                LabAction::Stop,
                ButtonPosition::Secondary,
                &[label::STOPPING, label::START],
                self.config.timing.stop_transition(),
            )
            .await?;
        info!(course = course_id, reached = %reached, "lab stop issued");
        Ok(ActionOutcome::Performed { reached })
    }

    pub async fn delete(&mut self, course_id: &str) -> LabResult<ActionOutcome> {
        self.steps.step(format!("Deleting lab for {course_id}"));
        let status = self.probe().await?;
        match status.primary() {
            Some(label::DELETE) => {}
            Some(label::CREATE) => {
                info!(course = course_id, "no lab to delete");
                return Ok(ActionOutcome::AlreadySatisfied { observed: status });
            }
            _ => {
                warn!(course = course_id, %status, "delete button not available, skipping");
                return Ok(ActionOutcome::Skipped { observed: status });
            }
        }

        self.press(ButtonPosition::Primary).await?;
        self.confirm(LabAction::Delete, "Delete").await?;
        sleep(self.config.timing.post_click_pause()).await;
        let mut reached = self
            .await_transition(
                LabAction::Delete,
                ButtonPosition::Primary,
                &[label::DELETING, label::CREATE],
                self.config.timing.delete_transition(),
            )
            .await?;
        if reached == label::DELETING {
            self.steps.step("Waiting for lab deletion to complete");
            reached = self
                .await_transition(
                    LabAction::Delete,
                    ButtonPosition::Primary,
                    &[label::CREATE],
                    self.config.timing.delete_completion(),
                )
                .await?;
        }
        info!(course = course_id, "lab deleted");
        Ok(ActionOutcome::Performed { reached })
    }

    pub(crate) async fn press(&mut self, position: ButtonPosition) -> LabResult<()> {
        let locator = Locator::xpath(&self.config.selectors.lab_buttons);
        self.driver.click(&locator, position.index()).await?;
        self.metrics.record_click();
        Ok(())
    }

    async fn confirm(&mut self, action: LabAction, caption: &str) -> LabResult<()> {
        let locator =
            Locator::from_template(&self.config.selectors.confirm_button, "label", caption);
        let timeout = self.config.timing.dialog_confirm();
        let poll = self.config.timing.poll_interval();
        if !wait_for_present(&mut self.driver, &locator, timeout, poll).await? {
            return Err(LabError::ConfirmationMissing { action });
        }
        self.driver.click(&locator, 0).await?;
        self.metrics.record_confirmation();
        Ok(())
    }

    /// Polls the button at `position` until its caption is one of `expected`.
    /// Tabs are not re-selected between reads.
    pub(crate) async fn await_transition(
        &mut self,
        action: LabAction,
        position: ButtonPosition,
        expected: &[&str],
        timeout: Duration,
    ) -> LabResult<String> {
        let poll = self.config.timing.poll_interval();
        let mut panel = self.button_panel(self.config.timing.transition_poll());
        let result = await_caption(&mut panel, action, position, expected, timeout, poll).await;
        match &result {
            Ok(_) => self.metrics.record_transition(),
            Err(err) if err.is_transition_timeout() => self.metrics.record_transition_timeout(),
            Err(_) => {}
        }
        result
    }
}

/// Reads `source` until the caption at `position` is one of `expected`,
/// failing with `TransitionTimeout` and the last observed pair after `timeout`.
pub async fn await_caption<S>(
    source: &mut S,
    action: LabAction,
    position: ButtonPosition,
    expected: &[&str],
    timeout: Duration,
    poll: Duration,
) -> LabResult<String>
where
    S: StatusSource + ?Sized,
{
    let deadline = Deadline::new(timeout, poll);
    loop {
        let status = source.read().await?;
        if let Some(caption) = status.at(position) {
            if expected.contains(&caption) {
                return Ok(caption.to_string());
            }
        }
        if deadline.expired() {
            warn!(%action, %status, ?expected, "lab transition timed out");
            return Err(LabError::TransitionTimeout {
                action,
                expected: expected.iter().map(|s| s.to_string()).collect(),
                observed: status,
            });
        }
        deadline.tick().await;
    }
}
