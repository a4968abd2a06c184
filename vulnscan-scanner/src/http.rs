use crate::error::{Result, ScanError};
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

pub const USER_AGENT: &str =
    "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/91.0.4472.124 Safari/537.36 vulnscan/0.2";

/// A fetched page. Only lives while the crawler processes one URL.
#[derive(Debug, Clone)]
pub struct Page {
    pub url: String,
    /// Where the request ended up after redirects; relative URLs in the body
    /// resolve against this.
    pub final_url: String,
    pub status_code: u16,
    pub content_type: Option<String>,
    pub content_length: Option<u64>,
    pub body: String,
    pub response_time: Duration,
}

impl Page {
    pub fn is_html(&self) -> bool {
        self.content_type
            .as_ref()
            .map(|ct| ct.to_lowercase().contains("text/html"))
            .unwrap_or(false)
    }
}

/// Build the shared client. Per-request timeouts are applied by callers, the
/// `timeout` here is the ceiling for anything that does not set its own.
pub fn build_client(timeout: Duration) -> Result<Client> {
    Client::builder()
        .user_agent(USER_AGENT)
        .timeout(timeout)
        .connect_timeout(timeout)
        .pool_max_idle_per_host(50)
        .pool_idle_timeout(Duration::from_secs(90))
        .tcp_keepalive(Duration::from_secs(60))
        .redirect(reqwest::redirect::Policy::limited(5))
        .build()
        .map_err(ScanError::from)
}

/// GET a URL (following redirects) and read the whole body.
pub async fn fetch_page(client: &Client, url: &str, timeout: Duration) -> Result<Page> {
    debug!("Fetching {}", url);

    let start = Instant::now();
    let response = client.get(url).timeout(timeout).send().await?;

    let final_url = response.url().to_string();
    let status_code = response.status().as_u16();
    let content_type = response
        .headers()
        .get("content-type")
        .and_then(|v| v.to_str().ok())
        .map(|s| s.to_string());
    let content_length = response.content_length();

    let body = response.text().await?;
    let response_time = start.elapsed();

    Ok(Page {
        url: url.to_string(),
        final_url,
        status_code,
        content_type,
        content_length,
        body,
        response_time,
    })
}
