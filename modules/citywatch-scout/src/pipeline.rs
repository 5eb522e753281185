use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use citywatch_common::CityWatchError;
use serde_json::Value;
use tracing::{debug, info};
use typed_builder::TypedBuilder;

use crate::catalog::AnomalyTask;
use crate::collector::EvidenceCollector;
use crate::extractor::{ExtractionOutcome, ReportExtractor};
use crate::session::SessionHandle;

/// Session state key for the collector's evidence text.
pub const SEARCH_RESULTS_KEY: &str = "search_results";
/// Session state key for the extracted reports (wire-format JSON array).
pub const REPORT_OUTPUT_KEY: &str = "city_anomaly_report_output";

pub const USER_AUTHOR: &str = "user";
pub const COLLECTOR_AUTHOR: &str = "evidence_collector";
pub const EXTRACTOR_AUTHOR: &str = "report_extractor";

/// Runs collection then extraction for one task through a shared session.
#[derive(Clone, TypedBuilder)]
pub struct Pipeline {
    collector: Arc<dyn EvidenceCollector>,
    extractor: Arc<dyn ReportExtractor>,
    /// Upper bound on each stage. `None` waits indefinitely.
    #[builder(default)]
    stage_timeout: Option<Duration>,
}

async fn within<T, F>(
    limit: Option<Duration>,
    stage: &'static str,
    fut: F,
) -> Result<T, CityWatchError>
where
    F: Future<Output = Result<T, CityWatchError>>,
{
    match limit {
        Some(after) => tokio::time::timeout(after, fut)
            .await
            .map_err(|_| CityWatchError::Timeout { stage, after })?,
        None => fut.await,
    }
}

impl Pipeline {
    pub async fn run(
        &self,
        session: &SessionHandle,
        task: &AnomalyTask,
    ) -> Result<ExtractionOutcome, CityWatchError> {
        {
            // A failed stage must not leave the previous task's output behind.
            let mut session = session.lock().await;
            session.remove_state(SEARCH_RESULTS_KEY);
            session.remove_state(REPORT_OUTPUT_KEY);
            session.append_event(USER_AUTHOR, task.description());
        }

        let evidence = within(
            self.stage_timeout,
            "evidence collection",
            self.collector.collect(task),
        )
        .await?;
        debug!(chars = evidence.len(), "Collector finished");

        let state = {
            let mut session = session.lock().await;
            session.set_state(SEARCH_RESULTS_KEY, Value::String(evidence.clone()));
            session.append_event(COLLECTOR_AUTHOR, evidence);
            session.state().clone()
        };

        let outcome = within(
            self.stage_timeout,
            "report extraction",
            self.extractor.extract(&state, task),
        )
        .await?;

        let output = serde_json::to_value(&outcome.reports)
            .map_err(|e| CityWatchError::Extraction(format!("report serialization failed: {e}")))?;
        {
            let mut session = session.lock().await;
            session.set_state(REPORT_OUTPUT_KEY, output);
            session.append_event(
                EXTRACTOR_AUTHOR,
                format!(
                    "{} report(s), {} rejected mention(s)",
                    outcome.reports.len(),
                    outcome.rejected.len()
                ),
            );
        }

        info!(
            event = %task.event,
            location = %task.location,
            reports = outcome.reports.len(),
            "Pipeline complete"
        );
        Ok(outcome)
    }
}
