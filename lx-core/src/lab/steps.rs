use tracing::info;

/// Numbered progress log for one lab session.
#[derive(Debug, Clone)]
pub struct StepLog {
    scope: String,
    next: u32,
}

impl StepLog {
    pub fn new(scope: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            next: 1,
        }
    }

    pub fn step(&mut self, message: impl AsRef<str>) -> u32 {
        let step = self.next;
        info!(scope = %self.scope, step, "{}", message.as_ref());
        self.next = self.next.saturating_add(1);
        step
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn steps_are_numbered_per_log() {
        let mut first = StepLog::new("rol");
        let mut second = StepLog::new("china");
        assert_eq!(first.step("login"), 1);
        assert_eq!(first.step("navigate"), 2);
        assert_eq!(second.step("login"), 1);
        assert_eq!(first.step("select tab"), 3);
    }
}
