use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::{Arc, Mutex};

use crate::timing::{Delay, LatencyWindow};

const SEARCH_HISTORY_LIMIT: usize = 100;
pub const DEFAULT_MAX_RESULTS: usize = 5;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    pub snippet: String,
    pub source: String,
}

/// Simulated web search with a bounded query history.
pub struct SearchService {
    delay: Arc<dyn Delay>,
    history: Mutex<VecDeque<String>>,
}

impl SearchService {
    pub fn new(delay: Arc<dyn Delay>) -> Self {
        Self {
            delay,
            history: Mutex::new(VecDeque::new()),
        }
    }

    pub async fn search(&self, query: &str, max_results: usize) -> Vec<SearchResult> {
        tracing::info!(query, max_results, "web search");
        {
            let mut history = self.history.lock().unwrap_or_else(|e| e.into_inner());
            history.push_back(query.to_string());
            while history.len() > SEARCH_HISTORY_LIMIT {
                history.pop_front();
            }
        }

        self.delay.pause(LatencyWindow::new(500, 1_500)).await;

        (1..=max_results)
            .map(|i| SearchResult {
                title: format!("Search Result {} for \"{}\"", i, query),
                url: format!("https://example.com/result-{}", i),
                snippet: format!(
                    "This is a simulated search result snippet for the query \"{}\". Real web search integration is pending API configuration.",
                    query
                ),
                source: format!("example{}.com", i),
            })
            .collect()
    }

    pub async fn summarize(&self, results: &[SearchResult]) -> String {
        if results.is_empty() {
            return "No search results to summarize.".to_string();
        }
        self.delay.pause(LatencyWindow::new(1_000, 1_000)).await;
        format!(
            "Based on {} search results, here's a summary: This is a simulated summary of web search results.",
            results.len()
        )
    }

    pub fn related_queries(&self, query: &str) -> Vec<String> {
        vec![
            format!("How to {}", query),
            format!("{} examples", query),
            format!("{} tutorial", query),
        ]
    }

    /// Past queries, newest first.
    pub fn history(&self) -> Vec<String> {
        let history = self.history.lock().unwrap_or_else(|e| e.into_inner());
        history.iter().rev().cloned().collect()
    }

    pub fn clear_history(&self) {
        self.history.lock().unwrap_or_else(|e| e.into_inner()).clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::timing::NoDelay;

    #[tokio::test]
    async fn test_search_returns_requested_count() {
        let search = SearchService::new(Arc::new(NoDelay));
        let results = search.search("rust traits", 3).await;
        assert_eq!(results.len(), 3);
        assert_eq!(results[0].source, "example1.com");
        assert!(results[2].title.contains("rust traits"));
    }

    #[tokio::test]
    async fn test_history_newest_first_and_bounded() {
        let search = SearchService::new(Arc::new(NoDelay));
        for i in 0..105 {
            search.search(&format!("q{}", i), 1).await;
        }
        let history = search.history();
        assert_eq!(history.len(), SEARCH_HISTORY_LIMIT);
        assert_eq!(history[0], "q104");
        assert_eq!(history.last().unwrap(), "q5");

        search.clear_history();
        assert!(search.history().is_empty());
    }

    #[tokio::test]
    async fn test_summarize_empty() {
        let search = SearchService::new(Arc::new(NoDelay));
        assert_eq!(search.summarize(&[]).await, "No search results to summarize.");
        let results = search.search("x", 2).await;
        assert!(search.summarize(&results).await.starts_with("Based on 2 search results"));
    }

    #[test]
    fn test_related_queries() {
        let search = SearchService::new(Arc::new(NoDelay));
        let related = search.related_queries("tokio");
        assert_eq!(related.len(), 3);
        assert_eq!(related[0], "How to tokio");
    }
}
