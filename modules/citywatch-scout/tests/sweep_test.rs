//! Full sweeps through the driver with mock collaborators.

use std::sync::Arc;
use std::time::Duration;

use citywatch_common::EventType;
use citywatch_scout::catalog::{AnomalyTask, Catalog};
use citywatch_scout::collector::SearchCollector;
use citywatch_scout::driver::{PacingPolicy, PassStats, SweepDriver};
use citywatch_scout::extractor::LlmReportExtractor;
use citywatch_scout::pipeline::{Pipeline, REPORT_OUTPUT_KEY, SEARCH_RESULTS_KEY};
use citywatch_scout::session::{InMemorySessionStore, SessionIdentity, SessionStore};
use citywatch_scout::testing::{
    answer, draft, geocoded, FailingSessionStore, MockGeocoder, MockModel, MockSearcher,
    INDIRANAGAR,
};
use serde_json::Value;

const SNIPPET: &str =
    "Indiranagar residents report power outage since 6pm yesterday near 12th Main Road";
const ADDRESS: &str = "12th Main Road, Indiranagar, Bangalore";

struct Harness {
    searcher: Arc<MockSearcher>,
    sessions: Arc<dyn SessionStore>,
    catalog: Catalog,
    max_queries: usize,
    stage_timeout: Option<Duration>,
    pacing: PacingPolicy,
}

impl Harness {
    fn new(searcher: MockSearcher, catalog: Catalog) -> Self {
        Self {
            searcher: Arc::new(searcher),
            sessions: Arc::new(InMemorySessionStore::new()),
            catalog,
            max_queries: 3,
            stage_timeout: None,
            pacing: PacingPolicy::immediate(),
        }
    }

    fn driver(&self) -> SweepDriver {
        let model = MockModel::new().on_evidence(
            "Indiranagar residents",
            answer(vec![draft(
                "Utility Disruption",
                "Power outage in Indiranagar near 12th Main Road",
                "Medium",
                ADDRESS,
            )]),
        );
        let geocoder = MockGeocoder::new().on_address(
            ADDRESS,
            geocoded(INDIRANAGAR, "Indiranagar, Bengaluru", "Indiranagar"),
        );

        let collector = SearchCollector::new(self.searcher.clone())
            .with_max_queries(self.max_queries);
        let pipeline = Pipeline::builder()
            .collector(Arc::new(collector))
            .extractor(Arc::new(LlmReportExtractor::new(
                Arc::new(model),
                Arc::new(geocoder),
            )))
            .stage_timeout(self.stage_timeout)
            .build();

        SweepDriver::builder()
            .pipeline(pipeline)
            .sessions(self.sessions.clone())
            .identity(identity())
            .catalog(self.catalog.clone())
            .pacing(self.pacing)
            .build()
    }
}

fn identity() -> SessionIdentity {
    SessionIdentity::new("new_agent_app", "default_user", "default_session")
}

fn catalog(events: &[&str], locations: &[&str]) -> Catalog {
    Catalog::new(
        "Bangalore",
        events.iter().map(|e| e.to_string()).collect(),
        locations.iter().map(|l| l.to_string()).collect(),
    )
}

#[tokio::test]
async fn scenario_pass_emits_one_utility_report() {
    let harness = Harness::new(
        MockSearcher::new().fallback(SNIPPET),
        catalog(&["power outage"], &["Indiranagar"]),
    );
    let driver = harness.driver();

    let task = AnomalyTask::new("power outage", "Indiranagar", "Bangalore");
    let outcome = driver.run_task(&task).await.unwrap();

    assert_eq!(outcome.reports.len(), 1);
    assert_eq!(outcome.reports[0].event_type, EventType::UtilityDisruption);
    // Three queries, identical payloads collapsed into one.
    assert_eq!(harness.searcher.calls().len(), 3);
}

#[tokio::test]
async fn tasks_run_event_major() {
    let mut harness = Harness::new(
        MockSearcher::new(),
        catalog(&["power outage", "tree fall"], &["Koramangala", "Hebbal"]),
    );
    harness.max_queries = 1;

    let stats = harness.driver().run_pass().await;

    assert_eq!(stats.tasks, 4);
    assert_eq!(
        harness.searcher.calls(),
        vec![
            "power outage Koramangala Bangalore today",
            "power outage Hebbal Bangalore today",
            "tree fall Koramangala Bangalore today",
            "tree fall Hebbal Bangalore today",
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn collector_timeout_is_counted_and_the_pass_continues() {
    let mut harness = Harness::new(
        MockSearcher::new().fallback(SNIPPET).hanging_on("Koramangala"),
        catalog(&["power outage"], &["Koramangala", "Indiranagar"]),
    );
    harness.stage_timeout = Some(Duration::from_secs(120));

    let stats = harness.driver().run_pass().await;

    assert_eq!(
        stats,
        PassStats {
            tasks: 2,
            succeeded: 1,
            failed: 1,
            reports: 1,
            rejected: 0,
        }
    );
}

#[tokio::test]
async fn search_failure_fails_only_that_task() {
    let harness = Harness::new(
        MockSearcher::new().failing("quota exceeded"),
        catalog(&["protest"], &["MG Road", "Majestic"]),
    );

    let stats = harness.driver().run_pass().await;

    assert_eq!(stats.tasks, 2);
    assert_eq!(stats.failed, 2);
    assert_eq!(stats.succeeded, 0);
}

#[tokio::test]
async fn one_session_is_shared_across_tasks() {
    let harness = Harness::new(
        MockSearcher::new().fallback(SNIPPET),
        catalog(&["power outage"], &["Indiranagar", "Whitefield"]),
    );

    harness.driver().run_pass().await;

    let session = harness
        .sessions
        .get_session(&identity())
        .await
        .unwrap()
        .expect("session created on first task");
    let session = session.lock().await;

    // Three log entries per task: task text, evidence, extraction summary.
    assert_eq!(session.events().len(), 6);
    assert_eq!(
        session.events()[0].text,
        AnomalyTask::new("power outage", "Indiranagar", "Bangalore").description()
    );
    assert_eq!(
        session.events()[3].text,
        AnomalyTask::new("power outage", "Whitefield", "Bangalore").description()
    );
    assert_eq!(
        session.get_state(SEARCH_RESULTS_KEY),
        Some(&Value::String(SNIPPET.to_string()))
    );
    let output = session.get_state(REPORT_OUTPUT_KEY).unwrap();
    assert_eq!(output[0]["event_type"], "Utility Disruption");
    assert_eq!(output[0]["severity_level"], "Medium");
}

#[tokio::test(start_paused = true)]
async fn timed_out_task_clears_earlier_task_output() {
    let mut harness = Harness::new(
        MockSearcher::new().fallback(SNIPPET).hanging_on("Whitefield"),
        catalog(&["power outage"], &["Indiranagar", "Whitefield"]),
    );
    harness.stage_timeout = Some(Duration::from_secs(120));

    let stats = harness.driver().run_pass().await;
    assert_eq!(stats.succeeded, 1);
    assert_eq!(stats.reports, 1);
    assert_eq!(stats.failed, 1);

    let session = harness
        .sessions
        .get_session(&identity())
        .await
        .unwrap()
        .expect("session created on first task");
    let session = session.lock().await;
    assert_eq!(session.get_state(SEARCH_RESULTS_KEY), None);
    assert_eq!(session.get_state(REPORT_OUTPUT_KEY), None);
    assert_eq!(
        session.events().last().unwrap().text,
        AnomalyTask::new("power outage", "Whitefield", "Bangalore").description()
    );
}

#[tokio::test]
async fn session_store_failure_fails_every_task() {
    let mut harness = Harness::new(
        MockSearcher::new().fallback(SNIPPET),
        catalog(&["power outage"], &["Indiranagar", "Hebbal"]),
    );
    harness.sessions = Arc::new(FailingSessionStore);

    let stats = harness.driver().run_pass().await;

    assert_eq!(stats.failed, 2);
    assert!(harness.searcher.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn pacing_waits_before_every_task() {
    let mut harness = Harness::new(
        MockSearcher::new(),
        catalog(&["road block"], &["Hebbal", "Yelahanka", "Majestic"]),
    );
    harness.pacing = PacingPolicy::new(Duration::from_secs(200), Duration::from_secs(3000));

    let started = tokio::time::Instant::now();
    let stats = harness.driver().run_pass().await;

    assert_eq!(stats.tasks, 3);
    assert!(started.elapsed() >= Duration::from_secs(600));
    assert!(started.elapsed() < Duration::from_secs(3000));
}

#[tokio::test(start_paused = true)]
async fn run_forever_keeps_sweeping() {
    let mut harness = Harness::new(MockSearcher::new(), catalog(&["metro delay"], &["Majestic"]));
    harness.pacing = PacingPolicy::new(Duration::from_secs(200), Duration::from_secs(3000));
    let driver = harness.driver();

    // Pass one at t=200s, pass two at t=3400s, cut off during the next pass sleep.
    let _ = tokio::time::timeout(Duration::from_secs(4_000), driver.run_forever()).await;

    assert_eq!(harness.searcher.calls().len(), 2 * 3);
}
