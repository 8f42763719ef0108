use std::time::Duration;

use tracing::info;

use super::driver::{Locator, PageDriver};
use super::error::{LabError, LabResult};
use super::session::LabSession;
use super::tabs::CourseTab;
use super::wait::{wait_for_present, Deadline};

impl<D: PageDriver> LabSession<D> {
    /// Switches the portal to `username` through the "Switch user" form, then
    /// returns to `course_id` (or the current course) on the lab-environment tab.
    pub async fn impersonate(
        &mut self,
        username: &str,
        course_id: Option<&str>,
    ) -> LabResult<()> {
        let username = username.trim();
        if username.is_empty() {
            return Err(LabError::MissingUsername);
        }
        self.steps.step(format!("Impersonating user '{username}'"));

        self.driver.reload().await?;
        self.interface.reset();
        self.wait_for_site_ready().await;

        let timeout = self.config.timing.impersonate();
        let switch = Locator::xpath(&self.config.selectors.switch_user_button);
        self.click_when_present(&switch, timeout).await?;

        let field = Locator::xpath(&self.config.selectors.impersonate_username);
        self.await_present(&field, timeout).await?;
        self.driver.type_text(&field, 0, username).await?;

        let confirm = Locator::xpath(&self.config.selectors.impersonate_confirm);
        self.click_when_present(&confirm, timeout).await?;
        if !self.await_gone(&field, timeout).await? {
            return Err(LabError::ImpersonationStalled(username.to_string()));
        }
        self.wait_for_site_ready().await;

        let course = course_id
            .map(str::to_string)
            .or_else(|| self.course_id.clone());
        if let Some(course) = course {
            self.go_to_course(&course, None).await?;
        }
        self.select_tab(CourseTab::LabEnvironment).await?;
        info!(user = username, environment = %self.environment, "impersonation active");
        Ok(())
    }

    async fn await_present(&mut self, locator: &Locator, timeout: Duration) -> LabResult<()> {
        let poll = self.config.timing.poll_interval();
        if wait_for_present(&mut self.driver, locator, timeout, poll).await? {
            Ok(())
        } else {
            Err(LabError::ElementNotFound(locator.to_string()))
        }
    }

    async fn click_when_present(
        &mut self,
        locator: &Locator,
        timeout: Duration,
    ) -> LabResult<()> {
        self.await_present(locator, timeout).await?;
        self.driver.click(locator, 0).await
    }

    async fn await_gone(&mut self, locator: &Locator, timeout: Duration) -> LabResult<bool> {
        let deadline = Deadline::new(timeout, self.config.timing.poll_interval());
        loop {
            if self.driver.count(locator).await? == 0 {
                return Ok(true);
            }
            if deadline.expired() {
                return Ok(false);
            }
            deadline.tick().await;
        }
    }
}
