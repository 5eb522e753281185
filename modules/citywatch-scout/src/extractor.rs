use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use ai_client::util::render_template;
use ai_client::{StructuredModel, StructuredPrompt};
use chrono::{DateTime, Utc};
use citywatch_common::{
    valid_latitude, valid_longitude, Address, AnomalyReport, CityWatchError, EventType,
    GeoLocation, ReportDefect, Severity,
};
use schemars::gen::SchemaGenerator;
use schemars::schema::{InstanceType, Schema, SchemaObject};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use tracing::{info, warn};

use crate::catalog::AnomalyTask;
use crate::geocoder::Geocoder;
use crate::pipeline::SEARCH_RESULTS_KEY;
use crate::session::SessionState;
use crate::taxonomy;
use crate::temporal::resolve_timestamp;

// --- Model-facing draft ---

/// One anomaly mention as the reasoning model reads it from evidence.
/// The schema pins labels to the canonical sets, but they deserialize as
/// strings and are checked and mapped in Rust, so providers without strict
/// enforcement still parse.
#[derive(Debug, Clone, Default, Serialize, Deserialize, JsonSchema)]
pub struct ExtractedAnomaly {
    /// The single category that best fits the mention.
    #[serde(default)]
    #[schemars(schema_with = "event_type_schema")]
    pub event_type: String,
    /// Concise summary of what happened, where, and its impact.
    #[serde(default)]
    pub description: String,
    /// Impact on residents.
    #[serde(default)]
    #[schemars(schema_with = "severity_schema")]
    pub severity_level: String,
    /// When it happened or was reported, as RFC 3339 with offset. Null if unknown.
    #[serde(default)]
    pub occurred_at: Option<String>,
    /// Only if stated in the evidence. Never guess coordinates.
    #[serde(default)]
    pub latitude: Option<f64>,
    /// Only if stated in the evidence. Never guess coordinates.
    #[serde(default)]
    pub longitude: Option<f64>,
    /// Most specific address text the evidence supports, including locality and city.
    #[serde(default)]
    pub formatted_address: Option<String>,
    #[serde(default)]
    pub house_number: Option<String>,
    #[serde(default)]
    pub street_name: Option<String>,
    /// Locality or neighborhood.
    #[serde(default)]
    pub area_name: Option<String>,
    #[serde(default)]
    pub city: Option<String>,
    #[serde(default)]
    pub district: Option<String>,
    #[serde(default)]
    pub state: Option<String>,
    #[serde(default)]
    pub country: Option<String>,
    /// Two-letter ISO code, e.g. "IN".
    #[serde(default)]
    pub country_code: Option<String>,
    #[serde(default)]
    pub postal_code: Option<String>,
}

fn label_schema(labels: &[&'static str]) -> Schema {
    SchemaObject {
        instance_type: Some(InstanceType::String.into()),
        enum_values: Some(labels.iter().map(|l| Value::from(*l)).collect()),
        ..Default::default()
    }
    .into()
}

fn event_type_schema(_gen: &mut SchemaGenerator) -> Schema {
    label_schema(&EventType::ALL.map(|t| t.label()))
}

fn severity_schema(_gen: &mut SchemaGenerator) -> Schema {
    label_schema(&Severity::ALL.map(|s| s.label()))
}

impl ExtractedAnomaly {
    fn address(&self) -> Address {
        Address {
            formatted_address: clean(&self.formatted_address).unwrap_or_default(),
            house_number: clean(&self.house_number),
            street_name: clean(&self.street_name),
            area_name: clean(&self.area_name),
            city: clean(&self.city),
            district: clean(&self.district),
            state: clean(&self.state),
            country: clean(&self.country),
            country_code: clean(&self.country_code).map(|c| c.to_uppercase()),
            postal_code: clean(&self.postal_code),
        }
    }

    /// Stated coordinates, when both are present and in range. (0, 0) is
    /// treated as a placeholder, not a location.
    fn coordinates(&self) -> Option<(f64, f64)> {
        match (self.latitude, self.longitude) {
            (Some(lat), Some(lng))
                if valid_latitude(lat) && valid_longitude(lng) && !(lat == 0.0 && lng == 0.0) =>
            {
                Some((lat, lng))
            }
            _ => None,
        }
    }
}

fn clean(value: &Option<String>) -> Option<String> {
    value
        .as_deref()
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}

/// Full structured answer: every distinct anomaly in the evidence.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExtractionResponse {
    #[serde(default)]
    pub anomalies: Vec<ExtractedAnomaly>,
}

// --- Outcome ---

/// Why a mention did not become a report.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum Rejection {
    #[error("malformed draft: {0}")]
    Malformed(String),
    #[error("no category for label '{0}'")]
    UnknownCategory(String),
    #[error("no location in evidence")]
    NoLocation,
    #[error("geocoder found no match for '{0}'")]
    Unresolved(String),
    #[error(transparent)]
    Invalid(#[from] ReportDefect),
    #[error("duplicate of an earlier mention")]
    Duplicate,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RejectedMention {
    /// Position of the draft in the model's answer.
    pub index: usize,
    pub description: String,
    pub reason: Rejection,
}

#[derive(Debug, Clone, Default)]
pub struct ExtractionOutcome {
    pub reports: Vec<AnomalyReport>,
    pub rejected: Vec<RejectedMention>,
}

// --- ReportExtractor trait ---

/// Second stage of the pipeline: evidence in session state to reports.
#[async_trait::async_trait]
pub trait ReportExtractor: Send + Sync {
    async fn extract(
        &self,
        state: &SessionState,
        task: &AnomalyTask,
    ) -> Result<ExtractionOutcome, CityWatchError>;
}

const INSTRUCTION: &str = r#"You are an anomaly report formatter for {city}. The user message holds raw search results about city anomalies. Read them and return one entry in "anomalies" for each distinct real-world anomaly they describe. Return an empty list when they describe none.

Current time: {now}

## Categories (event_type, use the label verbatim)
{categories}

## Severity (severity_level)
- Low: minimal impact, easily resolved, minor inconvenience.
- Medium: moderate, localized disruption that needs attention.
- High: immediate danger, urgent intervention needed, or widespread disruption.

## Fields
- description: one or two sentences summarizing what was reported.
- occurred_at: resolve relative times ("yesterday 6pm", "this morning") against the current time and give RFC 3339 with offset. Null when the evidence gives no time.
- latitude/longitude: only when the evidence states coordinates. Otherwise null; addresses are geocoded later.
- formatted_address and address parts: the most specific place the evidence names, always including the locality and "{city}". Leave unknown parts null.
- Mentions of the same incident at the same place are one anomaly."#;

const EVIDENCE_TEMPLATE: &str = "Search results for '{event}' near '{location}':\n---\n{search_results}\n---";

fn categories_text() -> String {
    EventType::ALL
        .iter()
        .map(|t| format!("- {}: {}", t.label(), t.guidance()))
        .collect::<Vec<_>>()
        .join("\n")
}

/// Render the system instruction and the evidence message from session state.
pub fn build_prompt(
    state: &SessionState,
    task: &AnomalyTask,
    now: DateTime<Utc>,
) -> Result<(String, String), CityWatchError> {
    let mut vars: HashMap<String, Value> = state.clone();
    vars.insert("city".into(), Value::String(task.city.clone()));
    vars.insert("event".into(), Value::String(task.event.clone()));
    vars.insert("location".into(), Value::String(task.location.clone()));
    vars.insert("now".into(), Value::String(now.to_rfc3339()));
    vars.insert("categories".into(), Value::String(categories_text()));

    let render = |template: &str| {
        render_template(template, &vars)
            .map_err(|e| CityWatchError::Extraction(format!("prompt rendering failed: {e}")))
    };
    Ok((render(INSTRUCTION)?, render(EVIDENCE_TEMPLATE)?))
}

/// Split the model's answer into drafts. Accepts `{"anomalies": [...]}`, a
/// stringified array under `anomalies`, or a bare array. Items that do not
/// fit the draft shape are rejected individually.
fn parse_drafts(
    value: Value,
) -> Result<(Vec<(usize, ExtractedAnomaly)>, Vec<RejectedMention>), CityWatchError> {
    let items = match value {
        Value::Array(items) => items,
        Value::Object(mut map) => match map.remove("anomalies") {
            Some(Value::Array(items)) => items,
            Some(Value::String(text)) => serde_json::from_str(&text).map_err(|e| {
                CityWatchError::Extraction(format!("anomalies string is not a JSON array: {e}"))
            })?,
            Some(Value::Null) | None => Vec::new(),
            Some(other) => {
                return Err(CityWatchError::Extraction(format!(
                    "anomalies must be an array, got {other}"
                )))
            }
        },
        other => {
            return Err(CityWatchError::Extraction(format!(
                "unexpected model answer: {other}"
            )))
        }
    };

    let mut drafts = Vec::with_capacity(items.len());
    let mut rejected = Vec::new();
    for (index, item) in items.into_iter().enumerate() {
        let description = item
            .get("description")
            .and_then(Value::as_str)
            .unwrap_or_default()
            .to_string();
        match serde_json::from_value::<ExtractedAnomaly>(item) {
            Ok(draft) => drafts.push((index, draft)),
            Err(e) => rejected.push(RejectedMention {
                index,
                description,
                reason: Rejection::Malformed(e.to_string()),
            }),
        }
    }
    Ok((drafts, rejected))
}

/// Canonical label if the model gave one; otherwise the keyword taxonomy over
/// the description, then over the task's event keyword.
pub fn resolve_event_type(label: &str, description: &str, task_event: &str) -> Option<EventType> {
    if let Ok(event_type) = label.parse::<EventType>() {
        return Some(event_type);
    }
    let fallback = taxonomy::classify(description).or_else(|| taxonomy::classify(task_event));
    if let Some(event_type) = fallback {
        warn!(label, fallback = %event_type, "Non-canonical event_type, classified by keywords");
    }
    fallback
}

pub fn resolve_severity(label: &str, description: &str) -> Severity {
    label.parse::<Severity>().unwrap_or_else(|_| {
        let assessed = taxonomy::assess_severity(description);
        warn!(label, fallback = %assessed, "Non-canonical severity_level, assessed by keywords");
        assessed
    })
}

/// Key for collapsing repeated mentions: category plus the address reduced to
/// lowercase alphanumeric words.
fn dedup_key(report: &AnomalyReport) -> (EventType, String) {
    let address = report
        .location
        .address
        .formatted_address
        .to_lowercase()
        .split(|c: char| !c.is_alphanumeric())
        .filter(|w| !w.is_empty())
        .collect::<Vec<_>>()
        .join(" ");
    (report.event_type, address)
}

// --- LLM-backed extractor ---

pub struct LlmReportExtractor {
    model: Arc<dyn StructuredModel>,
    geocoder: Arc<dyn Geocoder>,
}

impl LlmReportExtractor {
    pub fn new(model: Arc<dyn StructuredModel>, geocoder: Arc<dyn Geocoder>) -> Self {
        Self { model, geocoder }
    }

    /// Turn one draft into a report. The outer error is a collaborator
    /// failure; the inner one rejects this draft only.
    async fn assemble(
        &self,
        draft: ExtractedAnomaly,
        task: &AnomalyTask,
        now: DateTime<Utc>,
    ) -> Result<Result<AnomalyReport, Rejection>, CityWatchError> {
        let description = draft.description.trim().to_string();
        if description.is_empty() {
            return Ok(Err(ReportDefect::EmptyDescription.into()));
        }

        let Some(event_type) = resolve_event_type(&draft.event_type, &description, &task.event)
        else {
            return Ok(Err(Rejection::UnknownCategory(draft.event_type.clone())));
        };
        let severity = resolve_severity(&draft.severity_level, &description);
        let timestamp = resolve_timestamp(draft.occurred_at.as_deref(), now);

        let mut address = draft.address();
        let (latitude, longitude) = match draft.coordinates() {
            Some(coordinates) => coordinates,
            None => {
                let Some(query) = address.query_text() else {
                    return Ok(Err(Rejection::NoLocation));
                };
                let geocoded = self
                    .geocoder
                    .geocode(&query)
                    .await
                    .map_err(|e| CityWatchError::Geocoding(format!("'{query}': {e:#}")))?;
                match geocoded {
                    Some(found) => {
                        address.fill_missing_from(&found.address);
                        (found.latitude, found.longitude)
                    }
                    None => return Ok(Err(Rejection::Unresolved(query))),
                }
            }
        };

        if address.formatted_address.trim().is_empty() {
            if let Some(text) = address.query_text() {
                address.formatted_address = text;
            }
        }

        let report = AnomalyReport {
            timestamp,
            event_type,
            description,
            severity,
            location: GeoLocation {
                latitude,
                longitude,
                address,
            },
        };
        Ok(report.validate().map(|()| report).map_err(Rejection::from))
    }
}

#[async_trait::async_trait]
impl ReportExtractor for LlmReportExtractor {
    async fn extract(
        &self,
        state: &SessionState,
        task: &AnomalyTask,
    ) -> Result<ExtractionOutcome, CityWatchError> {
        let evidence = match state.get(SEARCH_RESULTS_KEY) {
            Some(Value::String(text)) => text.as_str(),
            Some(Value::Null) | None => {
                return Err(CityWatchError::Extraction(format!(
                    "session state has no {SEARCH_RESULTS_KEY}"
                )))
            }
            Some(other) => {
                return Err(CityWatchError::Extraction(format!(
                    "{SEARCH_RESULTS_KEY} must be text, got {other}"
                )))
            }
        };
        if evidence.trim().is_empty() {
            info!(event = %task.event, location = %task.location, "No evidence, nothing to extract");
            return Ok(ExtractionOutcome::default());
        }

        let now = Utc::now();
        let (system, user) = build_prompt(state, task, now)?;
        let prompt = StructuredPrompt::for_type::<ExtractionResponse>(system, user);
        let answer = self
            .model
            .structured(prompt)
            .await
            .map_err(|e| CityWatchError::Extraction(format!("{}: {e:#}", self.model.model())))?;

        let (drafts, mut rejected) = parse_drafts(answer)?;
        let mut reports = Vec::with_capacity(drafts.len());
        let mut seen = HashSet::new();

        for (index, draft) in drafts {
            let description = draft.description.clone();
            let reason = match self.assemble(draft, task, now).await? {
                Ok(report) if seen.insert(dedup_key(&report)) => {
                    reports.push(report);
                    continue;
                }
                Ok(_) => Rejection::Duplicate,
                Err(reason) => reason,
            };
            info!(index, reason = %reason, description = %description, "Mention rejected");
            rejected.push(RejectedMention {
                index,
                description,
                reason,
            });
        }

        info!(
            event = %task.event,
            location = %task.location,
            reports = reports.len(),
            rejected = rejected.len(),
            "Extracted anomaly reports"
        );
        Ok(ExtractionOutcome { reports, rejected })
    }
}
