use crate::form::Form;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Summary of one crawled URL, kept for the crawl report after the page body
/// itself has been dropped.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CrawlResult {
    pub url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub response_time: Duration,
    pub links_found: usize,
    pub forms_found: usize,
    pub error: Option<String>,
}

impl CrawlResult {
    pub fn new(url: String) -> Self {
        Self {
            url,
            status_code: 0,
            content_type: None,
            content_length: None,
            response_time: Duration::from_secs(0),
            links_found: 0,
            forms_found: 0,
            error: None,
        }
    }

    pub fn with_error(url: String, error: String) -> Self {
        Self {
            error: Some(error),
            ..Self::new(url)
        }
    }

    /// The request got an HTTP response at all, whatever its status.
    pub fn is_reachable(&self) -> bool {
        self.error.is_none() && self.status_code != 0
    }
}

/// Everything a crawl produced: per-page records, the links that were queued
/// and the forms extracted along the way.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CrawlOutcome {
    pub pages: Vec<CrawlResult>,
    pub links: Vec<String>,
    pub forms: Vec<Form>,
}

impl CrawlOutcome {
    pub fn pages_crawled(&self) -> usize {
        self.pages.len()
    }

    pub fn any_reachable(&self) -> bool {
        self.pages.iter().any(CrawlResult::is_reachable)
    }
}
