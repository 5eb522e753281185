use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use citywatch_common::CityWatchError;
use tracing::{debug, info};

use crate::catalog::AnomalyTask;
use crate::searcher::WebSearcher;

/// Query phrasings, most recent-sounding first.
const QUERY_TEMPLATES: &[&str] = &[
    "{event} {location} {city} today",
    "{event} in {location} {city} this week",
    "recent news {event} {location} {city}",
];

pub const DEFAULT_WORD_LIMIT: usize = 100;

/// First stage of the pipeline: turn a task into raw evidence text.
#[async_trait]
pub trait EvidenceCollector: Send + Sync {
    async fn collect(&self, task: &AnomalyTask) -> Result<String, CityWatchError>;
}

/// Collector backed by a web searcher. Returns search payloads verbatim,
/// joined by blank lines. The word budget is shared across queries: each
/// payload gets an even split of what is left, so a long first answer cannot
/// crowd out the rest. Queries stop once the budget is spent.
pub struct SearchCollector {
    searcher: Arc<dyn WebSearcher>,
    max_queries: usize,
    word_limit: usize,
}

impl SearchCollector {
    pub fn new(searcher: Arc<dyn WebSearcher>) -> Self {
        Self {
            searcher,
            max_queries: QUERY_TEMPLATES.len(),
            word_limit: DEFAULT_WORD_LIMIT,
        }
    }

    /// Number of query templates used per task, at least one.
    pub fn with_max_queries(mut self, max_queries: usize) -> Self {
        self.max_queries = max_queries.clamp(1, QUERY_TEMPLATES.len());
        self
    }

    /// Word budget for the joined evidence. `0` disables it.
    pub fn with_word_limit(mut self, word_limit: usize) -> Self {
        self.word_limit = word_limit;
        self
    }
}

/// Search queries for a task, in the order they are issued.
pub fn plan_queries(task: &AnomalyTask, max_queries: usize) -> Vec<String> {
    QUERY_TEMPLATES
        .iter()
        .take(max_queries)
        .map(|template| {
            template
                .replace("{event}", &task.event)
                .replace("{location}", &task.location)
                .replace("{city}", &task.city)
        })
        .collect()
}

/// Keep the first `limit` whitespace-separated words, cutting the original
/// text at the end of the last kept word. `0` means no limit.
pub fn cap_words(text: &str, limit: usize) -> &str {
    if limit == 0 {
        return text;
    }
    let mut count = 0;
    let mut in_word = false;
    for (i, c) in text.char_indices() {
        if c.is_whitespace() {
            if in_word && count == limit {
                return &text[..i];
            }
            in_word = false;
        } else if !in_word {
            in_word = true;
            count += 1;
        }
    }
    text
}

#[async_trait]
impl EvidenceCollector for SearchCollector {
    async fn collect(&self, task: &AnomalyTask) -> Result<String, CityWatchError> {
        let queries = plan_queries(task, self.max_queries);
        let mut seen = HashSet::new();
        let mut payloads: Vec<String> = Vec::with_capacity(queries.len());
        let mut remaining = self.word_limit;

        for (i, query) in queries.iter().enumerate() {
            if self.word_limit > 0 && remaining == 0 {
                debug!(query, "Word budget spent, skipping query");
                break;
            }
            let payload = self
                .searcher
                .search(query)
                .await
                .map_err(|e| CityWatchError::Search(format!("query '{query}': {e:#}")))?;
            let payload = payload.trim();
            if payload.is_empty() {
                debug!(query, "Search returned nothing");
                continue;
            }
            if !seen.insert(payload.to_string()) {
                debug!(query, "Duplicate search payload dropped");
                continue;
            }

            let kept = if self.word_limit == 0 {
                payload
            } else {
                let share = remaining.div_ceil(queries.len() - i);
                cap_words(payload, share)
            };
            remaining = remaining.saturating_sub(kept.split_whitespace().count());
            payloads.push(kept.to_string());
        }

        let evidence = payloads.join("\n\n");
        info!(
            event = %task.event,
            location = %task.location,
            queries = queries.len(),
            payloads = payloads.len(),
            words = evidence.split_whitespace().count(),
            "Evidence collected"
        );
        Ok(evidence)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::MockSearcher;

    fn task() -> AnomalyTask {
        AnomalyTask::new("power outage", "Indiranagar", "Bangalore")
    }

    #[test]
    fn queries_embed_keywords_and_recency_terms() {
        let queries = plan_queries(&task(), 3);
        assert_eq!(
            queries,
            vec![
                "power outage Indiranagar Bangalore today",
                "power outage in Indiranagar Bangalore this week",
                "recent news power outage Indiranagar Bangalore",
            ]
        );
        assert_eq!(plan_queries(&task(), 1).len(), 1);
    }

    #[test]
    fn max_queries_is_clamped() {
        let searcher: Arc<dyn WebSearcher> = Arc::new(MockSearcher::new());
        let collector = SearchCollector::new(searcher.clone()).with_max_queries(0);
        assert_eq!(collector.max_queries, 1);
        let collector = SearchCollector::new(searcher).with_max_queries(10);
        assert_eq!(collector.max_queries, QUERY_TEMPLATES.len());
    }

    #[tokio::test]
    async fn payloads_are_joined_verbatim_and_deduplicated() {
        let queries = plan_queries(&task(), 3);
        let searcher = MockSearcher::new()
            .on_query(&queries[0], "Outage on 12th Main\nBESCOM: restoring by 9pm")
            .on_query(&queries[1], "  Outage on 12th Main\nBESCOM: restoring by 9pm ")
            .on_query(&queries[2], "Residents of HAL 2nd Stage without power");
        let collector = SearchCollector::new(Arc::new(searcher)).with_word_limit(0);

        let evidence = collector.collect(&task()).await.unwrap();
        assert_eq!(
            evidence,
            "Outage on 12th Main\nBESCOM: restoring by 9pm\n\nResidents of HAL 2nd Stage without power"
        );
    }

    #[tokio::test]
    async fn evidence_is_capped_to_word_limit() {
        let searcher = MockSearcher::new().fallback("one two three four five");
        let collector = SearchCollector::new(Arc::new(searcher))
            .with_max_queries(1)
            .with_word_limit(3);
        assert_eq!(collector.collect(&task()).await.unwrap(), "one two three");
    }

    #[tokio::test]
    async fn long_first_payload_leaves_room_for_later_queries() {
        let queries = plan_queries(&task(), 3);
        let long = (1..=120).map(|n| format!("w{n}")).collect::<Vec<_>>().join(" ");
        let searcher = Arc::new(
            MockSearcher::new()
                .on_query(&queries[0], &long)
                .on_query(&queries[1], "BESCOM restoring supply on 12th Main")
                .on_query(&queries[2], "HAL 2nd Stage without power overnight"),
        );
        let collector = SearchCollector::new(searcher.clone());

        let evidence = collector.collect(&task()).await.unwrap();

        assert_eq!(searcher.calls().len(), 3);
        assert!(evidence.contains("BESCOM restoring supply on 12th Main"));
        assert!(evidence.contains("HAL 2nd Stage without power overnight"));
        assert!(evidence.starts_with("w1 w2"));
        assert!(!evidence.contains("w35"));
        assert!(evidence.split_whitespace().count() <= DEFAULT_WORD_LIMIT);
    }

    #[tokio::test]
    async fn spent_budget_skips_remaining_queries() {
        let searcher = Arc::new(MockSearcher::new().fallback("flooding near Silk Board"));
        let collector = SearchCollector::new(searcher.clone()).with_word_limit(1);

        let evidence = collector.collect(&task()).await.unwrap();

        assert_eq!(evidence, "flooding");
        assert_eq!(searcher.calls().len(), 1);
    }

    #[tokio::test]
    async fn search_error_propagates_without_retry() {
        let searcher = Arc::new(MockSearcher::new().failing("quota exceeded"));
        let collector = SearchCollector::new(searcher.clone());

        let err = collector.collect(&task()).await.unwrap_err();
        assert!(matches!(err, CityWatchError::Search(ref m) if m.contains("quota exceeded")));
        assert_eq!(searcher.calls().len(), 1);
    }

    #[test]
    fn cap_words_cuts_after_last_kept_word() {
        assert_eq!(cap_words("a b c d", 2), "a b");
        assert_eq!(cap_words("  a\n\nb  c", 2), "  a\n\nb");
        assert_eq!(cap_words("a b", 5), "a b");
        assert_eq!(cap_words("a b c", 0), "a b c");
        assert_eq!(cap_words("", 3), "");
    }
}
