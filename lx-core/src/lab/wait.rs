use std::time::Duration;

use tokio::time::{sleep, Instant};

use super::driver::{Locator, PageDriver};
use super::error::LabResult;

#[derive(Debug, Clone, Copy)]
pub(crate) struct Deadline {
    until: Instant,
    poll: Duration,
}

impl Deadline {
    pub(crate) fn new(timeout: Duration, poll: Duration) -> Self {
        Self {
            until: Instant::now() + timeout,
            poll,
        }
    }

    pub(crate) fn expired(&self) -> bool {
        Instant::now() >= self.until
    }

    pub(crate) async fn tick(&self) {
        let remaining = self.until.saturating_duration_since(Instant::now());
        sleep(self.poll.min(remaining)).await;
    }
}

pub(crate) async fn wait_for_present<D>(
    driver: &mut D,
    locator: &Locator,
    timeout: Duration,
    poll: Duration,
) -> LabResult<bool>
where
    D: PageDriver + ?Sized,
{
    let deadline = Deadline::new(timeout, poll);
    loop {
        if driver.count(locator).await? > 0 {
            return Ok(true);
        }
        if deadline.expired() {
            return Ok(false);
        }
        deadline.tick().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn deadline_expires_after_timeout() {
        let deadline = Deadline::new(Duration::from_secs(3), Duration::from_secs(1));
        let mut ticks = 0;
        while !deadline.expired() {
            deadline.tick().await;
            ticks += 1;
        }
        assert_eq!(ticks, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn zero_timeout_is_expired_immediately() {
        let deadline = Deadline::new(Duration::ZERO, Duration::from_millis(500));
        assert!(deadline.expired());
    }
}
