use std::sync::Arc;

use tokio::time::sleep;
use tracing::{debug, info, warn};

use crate::config::LabConfig;

use super::driver::{Locator, PageDriver};
use super::environment::Environment;
use super::error::LabResult;
use super::interface::InterfaceDetector;
use super::metrics::LabMetrics;
use super::steps::StepLog;
use super::wait::wait_for_present;

const NORMALIZE_VIEWPORT_SCRIPT: &str =
    "document.body.style.zoom = '0.70'; window.scrollTo(0, 0);";
const SCROLL_BOTTOM_SCRIPT: &str = "window.scrollTo(0, document.body.scrollHeight);";
const DEFAULT_CHAPTER_SECTION: &str = "pr01";

/// One authenticated browser page bound to one environment.
///
/// The interface-type cache, current course and step log live here; nothing
/// is shared across sessions.
#[derive(Debug)]
pub struct LabSession<D> {
    pub(crate) driver: D,
    pub(crate) config: Arc<LabConfig>,
    pub(crate) environment: Environment,
    pub(crate) course_id: Option<String>,
    pub(crate) interface: InterfaceDetector,
    pub(crate) steps: StepLog,
    pub(crate) metrics: LabMetrics,
}

impl<D: PageDriver> LabSession<D> {
    pub fn new(driver: D, config: Arc<LabConfig>, environment: Environment) -> Self {
        Self {
            driver,
            config,
            environment,
            course_id: None,
            interface: InterfaceDetector::new(),
            steps: StepLog::new(environment.as_str()),
            metrics: LabMetrics::default(),
        }
    }

    pub fn environment(&self) -> Environment {
        self.environment
    }

    pub fn course_id(&self) -> Option<&str> {
        self.course_id.as_deref()
    }

    pub fn metrics(&self) -> &LabMetrics {
        &self.metrics
    }

    pub fn driver(&self) -> &D {
        &self.driver
    }

    /// First navigation after launch; lands on a course page so the portal
    /// redirects to its login flow when the browser is not authenticated yet.
    pub async fn open_portal(&mut self, course_id: &str) -> LabResult<bool> {
        self.steps
            .step(format!("Opening '{}' portal", self.environment));
        let url = self
            .environment
            .course_url(&self.config.environments, course_id, None)?;
        self.driver.navigate(&url).await?;
        self.interface.reset();
        Ok(self.wait_for_site_ready().await)
    }

    pub async fn go_to_course(
        &mut self,
        course_id: &str,
        chapter_section: Option<&str>,
    ) -> LabResult<()> {
        let chapter = chapter_section.unwrap_or(DEFAULT_CHAPTER_SECTION);
        self.steps.step(format!(
            "Navigating to course: {course_id} {chapter} in {}",
            self.environment
        ));
        let url = self
            .environment
            .course_url(&self.config.environments, course_id, Some(chapter))?;
        self.driver.navigate(&url).await?;
        self.course_id = Some(course_id.to_string());
        self.interface.reset();
        self.wait_for_site_ready().await;
        Ok(())
    }

    /// Returns `false` after two unsuccessful attempts; never errors.
    pub async fn wait_for_site_ready(&mut self) -> bool {
        self.normalize_viewport().await;
        let selector = match self.environment {
            Environment::Factory => &self.config.selectors.factory_site_ready,
            Environment::Rol | Environment::China => &self.config.selectors.site_ready,
        };
        let locator = Locator::xpath(selector);
        let timeout = self.config.timing.site_ready();
        let poll = self.config.timing.poll_interval();

        for attempt in 1..=2u32 {
            if let Err(err) = self.driver.accept_cookie_consent().await {
                debug!(error = %err, "cookie consent dismissal failed");
            }
            match wait_for_present(&mut self.driver, &locator, timeout, poll).await {
                Ok(true) => {
                    if attempt > 1 {
                        info!(environment = %self.environment, "site ready on retry");
                    }
                    return true;
                }
                Ok(false) => {
                    warn!(
                        environment = %self.environment,
                        attempt,
                        timeout_s = timeout.as_secs(),
                        "site ready check timed out"
                    );
                }
                Err(err) => {
                    warn!(
                        environment = %self.environment,
                        attempt,
                        error = %err,
                        "site ready check error"
                    );
                }
            }
            sleep(poll).await;
        }

        let url = self.driver.current_url().await.unwrap_or_default();
        warn!(
            environment = %self.environment,
            url = %url,
            expected = %locator,
            "site ready check failed: login failed, wrong page, or page still loading"
        );
        false
    }

    /// Running-adjacent secondaries count as running. Errors degrade to `false`.
    pub async fn is_lab_running(&mut self) -> bool {
        match self.probe().await {
            Ok(status) => {
                let running = status.state().is_active();
                debug!(%status, running, "lab running check");
                running
            }
            Err(err) => {
                warn!(error = %err, "could not determine if lab is running");
                false
            }
        }
    }

    pub(crate) async fn normalize_viewport(&mut self) {
        if let Err(err) = self.driver.execute(NORMALIZE_VIEWPORT_SCRIPT).await {
            debug!(error = %err, "viewport normalization failed");
        }
    }

    pub(crate) async fn scroll_to_bottom(&mut self) {
        if let Err(err) = self.driver.execute(SCROLL_BOTTOM_SCRIPT).await {
            debug!(error = %err, "scroll to bottom failed");
        }
    }
}
