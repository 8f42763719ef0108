use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use super::actions::{ActionOutcome, LabAction};
use super::driver::PageDriver;
use super::error::{LabError, LabResult};
use super::session::LabSession;
use super::status::{label, ButtonPosition, LabState, LabStatus};

/// Summary of one `recreate` run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RecreateReport {
    pub course_id: String,
    pub initial: LabStatus,
    pub passes: usize,
    pub anomaly: bool,
    pub deleted: bool,
    pub created: bool,
    pub autostop_clicks: u32,
    pub lifespan_clicks: u32,
    pub final_status: LabStatus,
    pub finished_at: DateTime<Utc>,
}

impl<D: PageDriver> LabSession<D> {
    /// Deletes any existing lab and provisions a fresh one.
    ///
    /// Transient states are polled until they settle and the panel is
    /// re-evaluated, at most `max_recreate_passes` times. Adjustments are
    /// applied once, after the new lab reports `DELETE` as its primary button.
    pub async fn recreate(&mut self, course_id: &str) -> LabResult<RecreateReport> {
        self.steps.step(format!(
            "Recreating lab for course: {course_id} in {}",
            self.environment
        ));
        let initial = self.probe().await?;
        self.steps.step(format!("Current lab status: {initial}"));

        let max_passes = self.config.timing.max_recreate_passes.max(1);
        let mut status = initial.clone();
        let mut passes = 0;
        let mut anomaly = false;
        let mut deleted = false;
        let mut created = false;

        while passes < max_passes {
            passes += 1;
            match status.state() {
                LabState::Absent => {
                    created = self.create(course_id).await?.performed();
                }
                LabState::Running
                | LabState::Stopped
                | LabState::Stopping
                | LabState::Starting => {
                    let outcome = self.delete(course_id).await?;
                    if outcome.succeeded() {
                        deleted |= outcome.performed();
                        self.await_primary(
                            &[label::CREATE],
                            self.config.timing.delete_completion(),
                        )
                        .await?;
                        created = self.create(course_id).await?.performed();
                    }
                }
                LabState::Creating => {
                    self.steps
                        .step("Lab is currently creating, waiting for completion");
                    self.await_primary(
                        &[label::DELETE, label::CREATE],
                        self.config.timing.recreate_settle(),
                    )
                    .await?;
                }
                LabState::Deleting => {
                    self.steps
                        .step("Lab is currently deleting, waiting for completion");
                    self.await_primary(&[label::CREATE], self.config.timing.recreate_settle())
                        .await?;
                    created = self.create(course_id).await?.performed();
                }
                LabState::Anomaly => {
                    anomaly = true;
                    warn!(
                        course = course_id,
                        %status,
                        "unexpected lab status, attempting fallback delete and create"
                    );
                    match self.fallback_delete(course_id).await {
                        Ok(performed) => deleted |= performed,
                        Err(err) => error!(
                            course = course_id,
                            error = %err,
                            "delete failed during recreate"
                        ),
                    }
                    let outcome = self.create(course_id).await?;
                    if !outcome.performed() {
                        return Err(LabError::UnknownState(status));
                    }
                    created = true;
                }
            }

            if created {
                break;
            }
            status = self.probe().await?;
        }

        if !created {
            return Err(LabError::RecreateExhausted {
                passes,
                observed: status,
            });
        }

        self.steps.step("Waiting for the new lab to settle");
        self.await_primary(&[label::DELETE], self.config.timing.recreate_settle())
            .await?;

        let autostop_clicks = self.increase_autostop(course_id).await;
        let lifespan_clicks = self.increase_lifespan(course_id).await;
        let final_status = self.probe().await?;
        self.steps
            .step(format!("Lab {course_id} recreate sequence finished"));
        info!(
            course = course_id,
            passes,
            final_status = %final_status,
            "lab recreated"
        );

        Ok(RecreateReport {
            course_id: course_id.to_string(),
            initial,
            passes,
            anomaly,
            deleted,
            created,
            autostop_clicks,
            lifespan_clicks,
            final_status,
            finished_at: Utc::now(),
        })
    }

    async fn await_primary(
        &mut self,
        expected: &[&str],
        timeout: std::time::Duration,
    ) -> LabResult<String> {
        self.await_transition(LabAction::Settle, ButtonPosition::Primary, expected, timeout)
            .await
    }

    async fn fallback_delete(&mut self, course_id: &str) -> LabResult<bool> {
        let outcome = self.delete(course_id).await?;
        if let ActionOutcome::Skipped { .. } = outcome {
            return Ok(false);
        }
        self.await_primary(&[label::CREATE], self.config.timing.delete_completion())
            .await?;
        Ok(outcome.performed())
    }
}
