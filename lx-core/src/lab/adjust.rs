use std::sync::OnceLock;

use regex::Regex;
use tokio::time::sleep;
use tracing::{debug, error, warn};

use super::driver::{Locator, PageDriver};
use super::error::{LabError, LabResult};
use super::session::LabSession;
use super::tabs::CourseTab;
use super::wait::wait_for_present;

/// Rows of the lab timer table; each row's second cell holds a "+" button.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AdjustmentRow {
    Autostop,
    Lifespan,
}

impl AdjustmentRow {
    pub fn row(&self) -> &'static str {
        match self {
            AdjustmentRow::Autostop => "1",
            AdjustmentRow::Lifespan => "2",
        }
    }
}

fn digits() -> &'static Regex {
    static DIGITS: OnceLock<Regex> = OnceLock::new();
    DIGITS.get_or_init(|| Regex::new(r"(\d+)").expect("valid digits regex"))
}

/// Parses relative auto-stop text such as "in an hour" or "in 9 hours".
pub fn parse_hours_remaining(text: &str) -> Option<u32> {
    let text = text.trim().to_lowercase();
    if text.contains("an hour") || text.contains("a hour") {
        return Some(1);
    }
    if text.contains("minute") || text.contains("second") {
        return Some(0);
    }
    digits()
        .captures(&text)
        .and_then(|caps| caps.get(1))
        .and_then(|m| m.as_str().parse().ok())
}

impl<D: PageDriver> LabSession<D> {
    /// Raises the auto-stop timer to the configured cap. Returns clicks made.
    pub async fn increase_autostop(&mut self, course_id: &str) -> u32 {
        let cap = self.config.adjustments.autostop_max_hours;
        let current = match self.autostop_hours_remaining().await {
            Ok(Some(hours)) => hours,
            Ok(None) => {
                warn!(course = course_id, "could not parse auto-stop time");
                0
            }
            Err(err) => {
                warn!(course = course_id, error = %err, "could not determine auto-stop time");
                0
            }
        };
        let clicks = cap.saturating_sub(current);
        if clicks == 0 {
            self.steps.step(format!(
                "Auto-stop already at {current}h (max: {cap}h), no increase needed"
            ));
            return 0;
        }
        let description = format!(
            "Increasing auto-stop ({current}h -> {}h)",
            current + clicks
        );
        self.adjust(course_id, AdjustmentRow::Autostop, clicks, &description)
            .await
    }

    /// Clicks the lifespan button the configured number of times.
    pub async fn increase_lifespan(&mut self, course_id: &str) -> u32 {
        let clicks = self.config.adjustments.lifespan_clicks;
        self.adjust(
            course_id,
            AdjustmentRow::Lifespan,
            clicks,
            "Increasing auto-destroy (lifespan) to max",
        )
        .await
    }

    pub async fn autostop_hours_remaining(&mut self) -> LabResult<Option<u32>> {
        self.select_tab(CourseTab::LabEnvironment).await?;
        self.scroll_to_bottom().await;
        let locator = Locator::xpath(&self.config.selectors.autostop_time);
        let timeout = self.config.timing.autostop_read();
        let poll = self.config.timing.poll_interval();
        if !wait_for_present(&mut self.driver, &locator, timeout, poll).await? {
            return Err(LabError::ElementNotFound(locator.to_string()));
        }
        let texts = self.driver.texts(&locator).await?;
        let hours = texts.first().and_then(|text| parse_hours_remaining(text));
        debug!(text = ?texts.first(), hours = ?hours, "auto-stop reading");
        Ok(hours)
    }

    async fn adjust(
        &mut self,
        course_id: &str,
        row: AdjustmentRow,
        times: u32,
        description: &str,
    ) -> u32 {
        self.steps
            .step(format!("{description} for course {course_id} ({times} times)"));
        match self.click_adjustment(row, times).await {
            Ok(clicks) => clicks,
            Err(err) => {
                error!(
                    course = course_id,
                    row = ?row,
                    error = %err,
                    "{description} failed, lab might not be ready or button not found"
                );
                0
            }
        }
    }

    async fn click_adjustment(&mut self, row: AdjustmentRow, times: u32) -> LabResult<u32> {
        self.select_tab(CourseTab::LabEnvironment).await?;
        self.normalize_viewport().await;

        let poll = self.config.timing.poll_interval();
        let ready = Locator::xpath(&self.config.selectors.console_ready);
        if !wait_for_present(&mut self.driver, &ready, self.config.timing.console_ready(), poll)
            .await?
        {
            return Err(LabError::ElementNotFound(ready.to_string()));
        }
        self.scroll_to_bottom().await;

        let button = Locator::from_template(&self.config.selectors.adjust_button, "row", row.row());
        if !wait_for_present(&mut self.driver, &button, self.config.timing.dialog_confirm(), poll)
            .await?
        {
            return Err(LabError::ElementNotFound(button.to_string()));
        }

        let pause = self.config.adjustments.click_pause();
        let mut clicks = 0;
        for _ in 0..times {
            self.driver.click(&button, 0).await?;
            self.metrics.record_adjustment_click();
            clicks += 1;
            sleep(pause).await;
        }
        Ok(clicks)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_singular_hour() {
        assert_eq!(parse_hours_remaining("in an hour"), Some(1));
        assert_eq!(parse_hours_remaining("In An Hour"), Some(1));
    }

    #[test]
    fn parses_plural_hours() {
        assert_eq!(parse_hours_remaining("in 2 hours"), Some(2));
        assert_eq!(parse_hours_remaining("in 9 hours "), Some(9));
    }

    #[test]
    fn minutes_round_down_to_zero() {
        assert_eq!(parse_hours_remaining("in 45 minutes"), Some(0));
        assert_eq!(parse_hours_remaining("in a few seconds"), Some(0));
    }

    #[test]
    fn unparsable_text_is_none() {
        assert_eq!(parse_hours_remaining("soon"), None);
        assert_eq!(parse_hours_remaining(""), None);
    }
}
