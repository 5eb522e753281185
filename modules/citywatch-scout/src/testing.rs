// Test mocks for the sweep pipeline.
//
// One mock per collaborator boundary:
// - MockSearcher (WebSearcher): query -> canned text, optional hangs or failure
// - MockGeocoder (Geocoder): address -> canned match, call log
// - MockModel (StructuredModel): evidence substring -> canned JSON answer, call log
// - FailingSessionStore (SessionStore): every call errors
//
// Plus builders for geocoded addresses and model drafts.

use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;

use ai_client::{MessageRole, StructuredModel, StructuredPrompt};
use anyhow::{bail, Result};
use async_trait::async_trait;
use citywatch_common::Address;
use serde_json::{json, Value};

use crate::geocoder::{GeocodedAddress, Geocoder};
use crate::searcher::WebSearcher;
use crate::session::{SessionHandle, SessionIdentity, SessionStore};

// ---------------------------------------------------------------------------
// Test constants
// ---------------------------------------------------------------------------

/// Indiranagar, Bangalore.
pub const INDIRANAGAR: (f64, f64) = (12.9719, 77.6412);
/// Koramangala, Bangalore.
pub const KORAMANGALA: (f64, f64) = (12.9352, 77.6245);

// ---------------------------------------------------------------------------
// MockSearcher
// ---------------------------------------------------------------------------

/// Query-keyed searcher. Unregistered queries return the fallback text
/// (empty unless set). Records every query it receives.
pub struct MockSearcher {
    responses: HashMap<String, String>,
    fallback: String,
    failure: Option<String>,
    hang_on: Vec<String>,
    calls: Mutex<Vec<String>>,
}

impl MockSearcher {
    pub fn new() -> Self {
        Self {
            responses: HashMap::new(),
            fallback: String::new(),
            failure: None,
            hang_on: Vec::new(),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_query(mut self, query: &str, text: &str) -> Self {
        self.responses.insert(query.to_string(), text.to_string());
        self
    }

    /// Text for any query without a registered response.
    pub fn fallback(mut self, text: &str) -> Self {
        self.fallback = text.to_string();
        self
    }

    /// Every search fails with `message`.
    pub fn failing(mut self, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self
    }

    /// Queries containing `needle` sleep for an hour before answering.
    pub fn hanging_on(mut self, needle: &str) -> Self {
        self.hang_on.push(needle.to_string());
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for MockSearcher {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl WebSearcher for MockSearcher {
    async fn search(&self, query: &str) -> Result<String> {
        self.calls.lock().unwrap().push(query.to_string());
        if let Some(message) = &self.failure {
            bail!("MockSearcher: {message}");
        }
        if self.hang_on.iter().any(|needle| query.contains(needle.as_str())) {
            tokio::time::sleep(Duration::from_secs(3600)).await;
        }
        Ok(self
            .responses
            .get(query)
            .cloned()
            .unwrap_or_else(|| self.fallback.clone()))
    }
}

// ---------------------------------------------------------------------------
// MockGeocoder
// ---------------------------------------------------------------------------

/// Address-keyed geocoder. Matching is exact on the trimmed address;
/// unregistered addresses resolve to `None`.
pub struct MockGeocoder {
    matches: HashMap<String, GeocodedAddress>,
    fail: bool,
    calls: Mutex<Vec<String>>,
}

impl MockGeocoder {
    pub fn new() -> Self {
        Self {
            matches: HashMap::new(),
            fail: false,
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn on_address(mut self, address: &str, result: GeocodedAddress) -> Self {
        self.matches.insert(address.trim().to_string(), result);
        self
    }

    /// Every lookup is a transport failure.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
        self.calls.lock().unwrap().len()
    }
}

impl Default for MockGeocoder {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Geocoder for MockGeocoder {
    async fn geocode(&self, address: &str) -> Result<Option<GeocodedAddress>> {
        self.calls.lock().unwrap().push(address.to_string());
        if self.fail {
            bail!("MockGeocoder: connection refused");
        }
        Ok(self.matches.get(address.trim()).cloned())
    }
}

/// A geocoder match with a formatted address and area/city components.
pub fn geocoded(coords: (f64, f64), formatted: &str, area: &str) -> GeocodedAddress {
    GeocodedAddress {
        latitude: coords.0,
        longitude: coords.1,
        address: Address {
            formatted_address: formatted.to_string(),
            area_name: Some(area.to_string()),
            city: Some("Bengaluru".to_string()),
            state: Some("Karnataka".to_string()),
            country: Some("India".to_string()),
            country_code: Some("IN".to_string()),
            ..Default::default()
        },
    }
}

// ---------------------------------------------------------------------------
// MockModel
// ---------------------------------------------------------------------------

/// Structured model with canned answers. The first rule whose needle occurs
/// in the final user message wins; otherwise it answers with no anomalies.
pub struct MockModel {
    rules: Vec<(String, Value)>,
    fail: bool,
    prompts: Mutex<Vec<StructuredPrompt>>,
}

impl MockModel {
    pub fn new() -> Self {
        Self {
            rules: Vec::new(),
            fail: false,
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn on_evidence(mut self, needle: &str, answer: Value) -> Self {
        self.rules.push((needle.to_string(), answer));
        self
    }

    /// Every call fails.
    pub fn failing(mut self) -> Self {
        self.fail = true;
        self
    }

    pub fn call_count(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }

    pub fn prompts(&self) -> Vec<StructuredPrompt> {
        self.prompts.lock().unwrap().clone()
    }
}

impl Default for MockModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl StructuredModel for MockModel {
    fn model(&self) -> &str {
        "mock-model"
    }

    async fn structured(&self, prompt: StructuredPrompt) -> Result<Value> {
        let user = prompt
            .messages
            .iter()
            .rev()
            .find(|m| m.role == MessageRole::User)
            .map(|m| m.content.clone())
            .unwrap_or_default();
        self.prompts.lock().unwrap().push(prompt);

        if self.fail {
            bail!("MockModel: service unavailable");
        }
        Ok(self
            .rules
            .iter()
            .find(|(needle, _)| user.contains(needle.as_str()))
            .map(|(_, answer)| answer.clone())
            .unwrap_or_else(|| json!({ "anomalies": [] })))
    }
}

/// A draft as the model would return it, with every optional field null.
pub fn draft(event_type: &str, description: &str, severity: &str, address: &str) -> Value {
    json!({
        "event_type": event_type,
        "description": description,
        "severity_level": severity,
        "occurred_at": null,
        "latitude": null,
        "longitude": null,
        "formatted_address": address,
        "house_number": null,
        "street_name": null,
        "area_name": null,
        "city": null,
        "district": null,
        "state": null,
        "country": null,
        "country_code": null,
        "postal_code": null,
    })
}

/// Wrap drafts in the answer envelope.
pub fn answer(drafts: Vec<Value>) -> Value {
    json!({ "anomalies": drafts })
}

// ---------------------------------------------------------------------------
// FailingSessionStore
// ---------------------------------------------------------------------------

/// Session store whose every call errors.
#[derive(Default)]
pub struct FailingSessionStore;

#[async_trait]
impl SessionStore for FailingSessionStore {
    async fn get_session(&self, _identity: &SessionIdentity) -> Result<Option<SessionHandle>> {
        bail!("FailingSessionStore: store unavailable")
    }

    async fn create_session(&self, _identity: &SessionIdentity) -> Result<SessionHandle> {
        bail!("FailingSessionStore: store unavailable")
    }
}
