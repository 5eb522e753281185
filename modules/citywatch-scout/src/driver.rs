use std::sync::Arc;
use std::time::Duration;

use citywatch_common::{AnomalyReport, CityWatchError};
use tracing::{error, info};
use typed_builder::TypedBuilder;

use crate::catalog::{AnomalyTask, Catalog};
use crate::extractor::ExtractionOutcome;
use crate::pipeline::Pipeline;
use crate::session::{get_or_create_session, SessionIdentity, SessionStore};

/// Fixed waits around each task and each full pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PacingPolicy {
    pub between_tasks: Duration,
    pub between_passes: Duration,
}

impl PacingPolicy {
    pub fn new(between_tasks: Duration, between_passes: Duration) -> Self {
        Self {
            between_tasks,
            between_passes,
        }
    }

    /// No waiting at all.
    pub fn immediate() -> Self {
        Self::new(Duration::ZERO, Duration::ZERO)
    }
}

impl Default for PacingPolicy {
    fn default() -> Self {
        Self::new(Duration::from_secs(200), Duration::from_secs(3000))
    }
}

/// Stats from one pass over the catalog.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct PassStats {
    pub tasks: u32,
    pub succeeded: u32,
    pub failed: u32,
    pub reports: u32,
    pub rejected: u32,
}

impl std::fmt::Display for PassStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "\n=== Sweep Pass Complete ===")?;
        writeln!(f, "Tasks:      {}", self.tasks)?;
        writeln!(f, "Succeeded:  {}", self.succeeded)?;
        writeln!(f, "Failed:     {}", self.failed)?;
        writeln!(f, "Reports:    {}", self.reports)?;
        write!(f, "Rejected:   {}", self.rejected)
    }
}

/// Sweeps the catalog's cross-product through the pipeline, one task at a
/// time, forever.
#[derive(TypedBuilder)]
pub struct SweepDriver {
    pipeline: Pipeline,
    sessions: Arc<dyn SessionStore>,
    identity: SessionIdentity,
    catalog: Catalog,
    #[builder(default)]
    pacing: PacingPolicy,
}

impl SweepDriver {
    /// Get-or-create the shared session, then run the pipeline for one task.
    pub async fn run_task(&self, task: &AnomalyTask) -> Result<ExtractionOutcome, CityWatchError> {
        let session = get_or_create_session(self.sessions.as_ref(), &self.identity)
            .await
            .map_err(|e| CityWatchError::Session(format!("{e:#}")))?;
        self.pipeline.run(&session, task).await
    }

    /// One full pass, event-major. Task failures are logged and counted; the
    /// pass always runs to the end.
    pub async fn run_pass(&self) -> PassStats {
        let mut stats = PassStats::default();
        info!(
            city = self.catalog.city(),
            tasks = self.catalog.len(),
            "Starting sweep pass"
        );

        for task in self.catalog.tasks() {
            if !self.pacing.between_tasks.is_zero() {
                tokio::time::sleep(self.pacing.between_tasks).await;
            }
            stats.tasks += 1;

            match self.run_task(&task).await {
                Ok(outcome) => {
                    stats.succeeded += 1;
                    stats.reports += outcome.reports.len() as u32;
                    stats.rejected += outcome.rejected.len() as u32;
                    info!(
                        event = %task.event,
                        location = %task.location,
                        reports = outcome.reports.len(),
                        rejected = outcome.rejected.len(),
                        "Task complete"
                    );
                    for report in &outcome.reports {
                        log_report(&task, report);
                    }
                }
                Err(e) => {
                    stats.failed += 1;
                    error!(
                        event = %task.event,
                        location = %task.location,
                        error = %e,
                        "Task failed"
                    );
                }
            }
        }

        stats
    }

    /// Pass after pass with the pass interval in between. Never returns.
    pub async fn run_forever(&self) {
        let mut pass: u64 = 0;
        loop {
            pass += 1;
            let stats = self.run_pass().await;
            info!(pass, "{stats}");
            info!(
                sleep_secs = self.pacing.between_passes.as_secs(),
                "Sleeping until next pass"
            );
            tokio::time::sleep(self.pacing.between_passes).await;
        }
    }
}

fn log_report(task: &AnomalyTask, report: &AnomalyReport) {
    let wire = serde_json::to_string(report).unwrap_or_else(|e| format!("<unserializable: {e}>"));
    info!(
        event = %task.event,
        location = %task.location,
        event_type = %report.event_type,
        severity = %report.severity,
        lat = report.location.latitude,
        lng = report.location.longitude,
        address = %report.location.address.formatted_address,
        report = %wire,
        "Anomaly report"
    );
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_pacing_waits_200s_per_task_and_3000s_per_pass() {
        let pacing = PacingPolicy::default();
        assert_eq!(pacing.between_tasks, Duration::from_secs(200));
        assert_eq!(pacing.between_passes, Duration::from_secs(3000));
    }

    #[test]
    fn stats_display_lists_counts() {
        let stats = PassStats {
            tasks: 4,
            succeeded: 3,
            failed: 1,
            reports: 2,
            rejected: 0,
        };
        let text = stats.to_string();
        assert!(text.contains("Tasks:      4"));
        assert!(text.contains("Failed:     1"));
    }
}
