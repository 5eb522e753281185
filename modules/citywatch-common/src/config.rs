use std::str::FromStr;
use std::time::Duration;

use crate::error::CityWatchError;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    // Reasoning model (OpenAI-compatible)
    pub openai_api_key: String,
    pub llm_model: String,
    pub llm_base_url: Option<String>,

    // Collaborators
    pub serper_api_key: String,
    pub nominatim_url: String,

    // Sweep
    pub city_name: String,
    pub task_interval_secs: u64,
    pub pass_interval_secs: u64,
    pub stage_timeout_secs: u64,
    pub evidence_word_limit: usize,
    pub search_queries_per_task: usize,
    pub search_results_per_query: usize,

    // Shared session identity
    pub app_name: String,
    pub user_id: String,
    pub session_id: String,
}

impl Config {
    /// Load `.env` (if present) and then the process environment.
    pub fn from_env() -> Result<Self, CityWatchError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build from an arbitrary key lookup. Empty values count as unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, CityWatchError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let required = |key: &str| {
            get(key).ok_or_else(|| {
                CityWatchError::Config(format!("{key} environment variable is required"))
            })
        };
        let text_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        Ok(Self {
            openai_api_key: required("OPENAI_API_KEY")?,
            llm_model: text_or("LLM_MODEL", "gpt-4o-mini"),
            llm_base_url: get("LLM_BASE_URL"),
            serper_api_key: required("SERPER_API_KEY")?,
            nominatim_url: text_or("NOMINATIM_URL", "https://nominatim.openstreetmap.org"),
            city_name: text_or("CITY_NAME", "Bangalore"),
            task_interval_secs: parse_or(get("TASK_INTERVAL_SECS"), "TASK_INTERVAL_SECS", 200)?,
            pass_interval_secs: parse_or(get("PASS_INTERVAL_SECS"), "PASS_INTERVAL_SECS", 3000)?,
            stage_timeout_secs: parse_or(get("STAGE_TIMEOUT_SECS"), "STAGE_TIMEOUT_SECS", 120)?,
            evidence_word_limit: parse_or(get("EVIDENCE_WORD_LIMIT"), "EVIDENCE_WORD_LIMIT", 100)?,
            search_queries_per_task: parse_or(
                get("SEARCH_QUERIES_PER_TASK"),
                "SEARCH_QUERIES_PER_TASK",
                3,
            )?,
            search_results_per_query: parse_or(
                get("SERPER_MAX_RESULTS"),
                "SERPER_MAX_RESULTS",
                5,
            )?,
            app_name: text_or("APP_NAME", "new_agent_app"),
            user_id: text_or("USER_ID", "default_user"),
            session_id: text_or("SESSION_ID", "default_session"),
        })
    }

    pub fn task_interval(&self) -> Duration {
        Duration::from_secs(self.task_interval_secs)
    }

    pub fn pass_interval(&self) -> Duration {
        Duration::from_secs(self.pass_interval_secs)
    }

    /// `None` when stage timeouts are disabled.
    pub fn stage_timeout(&self) -> Option<Duration> {
        (self.stage_timeout_secs > 0).then(|| Duration::from_secs(self.stage_timeout_secs))
    }

    /// Log config with secrets redacted.
    pub fn log_redacted(&self) {
        fn preview(val: &str) -> String {
            let n = val.chars().count().min(5);
            let head: String = val.chars().take(n).collect();
            format!("{}...({} chars)", head, val.len())
        }

        tracing::info!("Config loaded:");
        tracing::info!("  OPENAI_API_KEY: {}", preview(&self.openai_api_key));
        tracing::info!("  SERPER_API_KEY: {}", preview(&self.serper_api_key));
        tracing::info!(
            model = %self.llm_model,
            base_url = self.llm_base_url.as_deref().unwrap_or("<default>"),
            nominatim = %self.nominatim_url,
            "  Collaborators"
        );
        tracing::info!(
            city = %self.city_name,
            task_interval_secs = self.task_interval_secs,
            pass_interval_secs = self.pass_interval_secs,
            stage_timeout_secs = self.stage_timeout_secs,
            evidence_word_limit = self.evidence_word_limit,
            queries = self.search_queries_per_task,
            results_per_query = self.search_results_per_query,
            "  Sweep"
        );
        tracing::info!(
            app = %self.app_name,
            user = %self.user_id,
            session = %self.session_id,
            "  Session"
        );
    }
}

fn parse_or<T: FromStr>(raw: Option<String>, key: &str, default: T) -> Result<T, CityWatchError> {
    match raw {
        None => Ok(default),
        Some(value) => value
            .trim()
            .parse()
            .map_err(|_| CityWatchError::Config(format!("{key} must be a number, got '{value}'"))),
    }
}
