use crate::error::{Result, ScanError};
use crate::form::{self, Form};
use crate::http::{self, Page};
use crate::progress::{ProgressCallback, ProgressEvent};
use crate::result::{CrawlOutcome, CrawlResult};
use reqwest::Client;
use scraper::Html;
use std::collections::{HashSet, VecDeque};
use std::time::Duration;
use tracing::{debug, info, warn};
use url::{Origin, Url};

pub const DEFAULT_MAX_PAGES: usize = 10;
pub const DEFAULT_CRAWL_TIMEOUT: Duration = Duration::from_secs(5);
pub const DEFAULT_CRAWL_DELAY: Duration = Duration::from_millis(200);

/// Path extensions that never lead to another HTML page.
pub const ASSET_EXTENSIONS: &[&str] = &[
    "js", "css", "jpg", "jpeg", "png", "gif", "svg", "ico", "webp", "bmp", "pdf", "zip", "gz",
    "tgz", "tar", "rar", "7z", "mp3", "mp4", "avi", "mov", "webm", "woff", "woff2", "ttf", "eot",
    "exe", "dmg", "iso",
];

/// Breadth-first, same-origin crawler.
///
/// One request is in flight at a time and fetches are paced by a fixed delay.
/// The number of fetched pages never exceeds `max_pages` and the frontier never
/// holds more than `2 * max_pages` URLs.
pub struct Crawler {
    client: Client,
    max_pages: usize,
    timeout: Duration,
    delay: Duration,
    progress_callback: Option<ProgressCallback>,
}

impl Crawler {
    pub fn new(client: Client) -> Self {
        Self {
            client,
            max_pages: DEFAULT_MAX_PAGES,
            timeout: DEFAULT_CRAWL_TIMEOUT,
            delay: DEFAULT_CRAWL_DELAY,
            progress_callback: None,
        }
    }

    pub fn with_max_pages(mut self, max_pages: usize) -> Self {
        self.max_pages = max_pages;
        self
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    pub fn with_progress_callback(mut self, callback: ProgressCallback) -> Self {
        self.progress_callback = Some(callback);
        self
    }

    pub fn frontier_cap(&self) -> usize {
        self.max_pages.saturating_mul(2)
    }

    pub async fn crawl(&self, start_url: &str) -> Result<CrawlOutcome> {
        info!("Starting crawl of {} (max {} pages)", start_url, self.max_pages);

        let target = Url::parse(start_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", start_url, e)))?;
        if !matches!(target.scheme(), "http" | "https") {
            return Err(ScanError::InvalidUrl(format!(
                "{}: only http and https targets can be crawled",
                start_url
            )));
        }
        let origin = target.origin();

        let mut outcome = CrawlOutcome::default();
        let mut visited: HashSet<String> = HashSet::new();
        // Everything ever enqueued, so a URL is queued at most once.
        let mut seen: HashSet<String> = HashSet::new();
        let mut frontier: VecDeque<String> = VecDeque::new();

        let start = target.to_string();
        seen.insert(start.clone());
        frontier.push_back(start);

        while visited.len() < self.max_pages {
            let Some(url) = frontier.pop_front() else {
                break;
            };
            if !visited.insert(url.clone()) {
                continue;
            }

            if visited.len() > 1 && !self.delay.is_zero() {
                tokio::time::sleep(self.delay).await;
            }

            let fetched = http::fetch_page(&self.client, &url, self.timeout).await;

            if let Some(ref callback) = self.progress_callback {
                callback(ProgressEvent::page());
            }

            let page = match fetched {
                Ok(page) => page,
                Err(e) => {
                    if e.is_timeout() {
                        warn!("Timeout crawling {}", url);
                    } else {
                        warn!("Error crawling {}: {}", url, e);
                    }
                    outcome.pages.push(CrawlResult::with_error(url, e.to_string()));
                    continue;
                }
            };

            let mut result = Self::record_for(&page);

            if page.status_code != 200 || !page.is_html() {
                debug!(
                    "Skipped non-HTML content: {} (status {}, {:?})",
                    url, page.status_code, page.content_type
                );
                outcome.pages.push(result);
                continue;
            }

            let harvest_links = visited.len() < self.max_pages;
            match Self::extract_elements(&page, harvest_links) {
                Ok((forms, links)) => {
                    info!("Crawled: {} - found {} forms", url, forms.len());
                    result.forms_found = forms.len();
                    result.links_found = links.len();
                    outcome.forms.extend(forms);

                    for link in links {
                        if frontier.len() >= self.frontier_cap() {
                            debug!("Frontier full, dropping {}", link);
                            break;
                        }
                        if Self::should_enqueue(&link, &origin, &visited, &seen) {
                            seen.insert(link.clone());
                            outcome.links.push(link.clone());
                            frontier.push_back(link);
                        }
                    }
                }
                Err(e) => {
                    warn!("Parse error on {}: {}", url, e);
                    result.error = Some(e.to_string());
                }
            }

            outcome.pages.push(result);
        }

        info!(
            "Crawl complete: {} forms found across {} pages",
            outcome.forms.len(),
            outcome.pages.len()
        );
        Ok(outcome)
    }

    fn record_for(page: &Page) -> CrawlResult {
        let mut result = CrawlResult::new(page.url.clone());
        result.status_code = page.status_code;
        result.content_type = page.content_type.clone();
        result.content_length = page.content_length;
        result.response_time = page.response_time;
        result
    }

    /// Parse the page once and pull out its forms and (optionally) its links.
    /// Kept synchronous so the parsed document never lives across an await.
    fn extract_elements(page: &Page, harvest_links: bool) -> Result<(Vec<Form>, Vec<String>)> {
        let page_url = Url::parse(&page.final_url)
            .map_err(|e| ScanError::InvalidUrl(format!("{}: {}", page.final_url, e)))?;
        let document = Html::parse_document(&page.body);

        let forms = form::extract_forms(&document, &page_url)?;

        let mut links = Vec::new();
        if harvest_links {
            let link_selector = form::selector("a[href]")?;
            for element in document.select(&link_selector) {
                if let Some(href) = element.value().attr("href")
                    && let Some(absolute_url) = resolve_url(&page_url, href)
                {
                    links.push(absolute_url);
                }
            }
        }

        Ok((forms, links))
    }

    fn should_enqueue(
        link: &str,
        origin: &Origin,
        visited: &HashSet<String>,
        seen: &HashSet<String>,
    ) -> bool {
        let Ok(parsed) = Url::parse(link) else {
            return false;
        };
        if &parsed.origin() != origin {
            debug!("  -> {} is cross-origin, skipping", link);
            return false;
        }
        if has_asset_extension(&parsed) {
            debug!("  -> {} is a static asset, skipping", link);
            return false;
        }
        !visited.contains(link) && !seen.contains(link)
    }
}

/// Resolve an href against the page it was found on, dropping fragments and
/// hrefs that do not navigate anywhere.
pub fn resolve_url(base: &Url, href: &str) -> Option<String> {
    let href = href.trim();
    if href.is_empty()
        || href.starts_with("javascript:")
        || href.starts_with("mailto:")
        || href.starts_with("tel:")
        || href.starts_with('#')
    {
        return None;
    }

    let mut resolved = base.join(href).ok()?;
    resolved.set_fragment(None);

    Some(resolved.to_string())
}

/// Scheme, host and port all match.
pub fn is_same_origin(url: &str, target: &str) -> bool {
    match (Url::parse(url), Url::parse(target)) {
        (Ok(a), Ok(b)) => a.origin() == b.origin(),
        _ => false,
    }
}

pub fn has_asset_extension(url: &Url) -> bool {
    let path = url.path().to_lowercase();
    let last_segment = path.rsplit('/').next().unwrap_or("");
    match last_segment.rsplit_once('.') {
        Some((_, ext)) => ASSET_EXTENSIONS.contains(&ext),
        None => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use wiremock::{
        Mock, MockServer, ResponseTemplate,
        matchers::{method, path},
    };

    async fn mount_html(server: &MockServer, route: &str, body: String) {
        Mock::given(method("GET"))
            .and(path(route))
            .respond_with(
                ResponseTemplate::new(200).set_body_raw(body, "text/html"),
            )
            .mount(server)
            .await;
    }

    fn crawler(max_pages: usize) -> Crawler {
        let client = http::build_client(Duration::from_secs(5)).unwrap();
        Crawler::new(client)
            .with_max_pages(max_pages)
            .with_delay(Duration::ZERO)
    }

    async fn requested_paths(server: &MockServer) -> Vec<String> {
        server
            .received_requests()
            .await
            .unwrap_or_default()
            .iter()
            .map(|r| r.url.path().to_string())
            .collect()
    }

    /// A links to B and C, budget of two pages: C is discovered but never fetched.
    #[tokio::test]
    async fn test_page_budget_stops_before_third_page() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        mount_html(
            &mock_server,
            "/",
            format!(r#"<a href="{uri}/b">B</a><a href="{uri}/c">C</a>"#),
        )
        .await;
        mount_html(&mock_server, "/b", "<p>B</p>".to_string()).await;
        mount_html(&mock_server, "/c", "<p>C</p>".to_string()).await;

        let outcome = crawler(2).crawl(&uri).await.unwrap();

        assert_eq!(outcome.pages_crawled(), 2);
        assert!(outcome.links.contains(&format!("{uri}/c")));
        let paths = requested_paths(&mock_server).await;
        assert_eq!(paths, vec!["/", "/b"]);
    }

    #[tokio::test]
    async fn test_forms_resolve_against_redirect_target() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        Mock::given(method("GET"))
            .and(path("/login"))
            .respond_with(ResponseTemplate::new(302).insert_header("location", "/app/login.html"))
            .mount(&mock_server)
            .await;
        mount_html(
            &mock_server,
            "/app/login.html",
            r#"<form action="auth" method="post"><input name="user"></form>"#.to_string(),
        )
        .await;

        let outcome = crawler(1).crawl(&format!("{uri}/login")).await.unwrap();

        assert_eq!(outcome.pages[0].url, format!("{uri}/login"));
        assert_eq!(outcome.forms.len(), 1);
        assert_eq!(outcome.forms[0].action, format!("{uri}/app/auth"));
        assert_eq!(outcome.forms[0].source_url, format!("{uri}/app/login.html"));
    }

    #[tokio::test]
    async fn test_forms_are_collected_per_page() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        mount_html(
            &mock_server,
            "/",
            r#"<a href="/contact">contact</a>
            <form action="/search"><input name="q"></form>"#
                .to_string(),
        )
        .await;
        mount_html(
            &mock_server,
            "/contact",
            r#"<form method="post"><input name="q"></form>"#.to_string(),
        )
        .await;

        let outcome = crawler(10).crawl(&uri).await.unwrap();

        assert_eq!(outcome.forms.len(), 2);
        assert_eq!(outcome.forms[0].action, format!("{uri}/search"));
        assert_eq!(outcome.forms[1].source_url, format!("{uri}/contact"));
        assert_eq!(outcome.pages[0].forms_found, 1);
    }

    #[tokio::test]
    async fn test_cross_origin_and_asset_links_are_not_enqueued() {
        let mock_server = MockServer::start().await;
        let other_server = MockServer::start().await;
        let uri = mock_server.uri();
        let other = other_server.uri();

        mount_html(
            &mock_server,
            "/",
            format!(
                r##"<a href="{other}/elsewhere">x</a>
                <a href="/app.js">js</a>
                <a href="/style.CSS">css</a>
                <a href="/report.pdf">pdf</a>
                <a href="mailto:a@b.c">mail</a>
                <a href="javascript:void(0)">js uri</a>
                <a href="#top">top</a>
                <a href="/about#team">about</a>"##
            ),
        )
        .await;
        mount_html(&mock_server, "/about", "<p>about</p>".to_string()).await;

        let outcome = crawler(10).crawl(&uri).await.unwrap();

        assert_eq!(outcome.links, vec![format!("{uri}/about")]);
        for link in &outcome.links {
            assert!(is_same_origin(link, &uri));
        }
        assert!(requested_paths(&other_server).await.is_empty());
    }

    #[tokio::test]
    async fn test_each_url_is_fetched_once() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        mount_html(
            &mock_server,
            "/",
            r#"<a href="/a">a</a><a href="/a">again</a><a href="/">home</a>"#.to_string(),
        )
        .await;
        mount_html(
            &mock_server,
            "/a",
            r#"<a href="/">home</a><a href="/a">self</a>"#.to_string(),
        )
        .await;

        let outcome = crawler(10).crawl(&uri).await.unwrap();

        assert_eq!(outcome.pages_crawled(), 2);
        let mut paths = requested_paths(&mock_server).await;
        paths.sort();
        paths.dedup();
        assert_eq!(paths.len(), 2);
    }

    #[tokio::test]
    async fn test_frontier_is_capped() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        let mut root_html = String::new();
        for i in 1..=50 {
            root_html.push_str(&format!(r#"<a href="/page{i}">{i}</a>"#));
        }
        mount_html(&mock_server, "/", root_html).await;

        let outcome = crawler(3).crawl(&uri).await.unwrap();

        assert!(outcome.links.len() <= 6, "queued {} links", outcome.links.len());
        assert!(outcome.pages_crawled() <= 3);
    }

    #[tokio::test]
    async fn test_non_html_and_error_pages_are_skipped() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();

        mount_html(
            &mock_server,
            "/",
            r#"<a href="/data">data</a><a href="/missing">missing</a>"#.to_string(),
        )
        .await;
        Mock::given(method("GET"))
            .and(path("/data"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_raw(r#"{"html": "<a href='/hidden'>x</a>"}"#, "application/json"),
            )
            .mount(&mock_server)
            .await;

        let outcome = crawler(10).crawl(&uri).await.unwrap();

        assert_eq!(outcome.pages_crawled(), 3);
        let missing = outcome
            .pages
            .iter()
            .find(|p| p.url.ends_with("/missing"))
            .unwrap();
        assert_eq!(missing.status_code, 404);
        assert!(!outcome.links.iter().any(|l| l.ends_with("/hidden")));
    }

    #[tokio::test]
    async fn test_unreachable_target_is_recorded_not_fatal() {
        let client = http::build_client(Duration::from_secs(1)).unwrap();
        let crawler = Crawler::new(client)
            .with_timeout(Duration::from_secs(1))
            .with_delay(Duration::ZERO);

        let outcome = crawler.crawl("http://127.0.0.1:9/").await.unwrap();

        assert_eq!(outcome.pages_crawled(), 1);
        assert!(outcome.pages[0].error.is_some());
        assert!(!outcome.any_reachable());
    }

    #[tokio::test]
    async fn test_one_progress_event_per_page() {
        let mock_server = MockServer::start().await;
        let uri = mock_server.uri();
        mount_html(
            &mock_server,
            "/",
            r#"<a href="/one">1</a><a href="/two">2</a>"#.to_string(),
        )
        .await;

        let pages = Arc::new(AtomicUsize::new(0));
        let pages_clone = pages.clone();
        let crawler = crawler(10).with_progress_callback(Arc::new(move |_event| {
            pages_clone.fetch_add(1, Ordering::Relaxed);
        }));

        let outcome = crawler.crawl(&uri).await.unwrap();

        assert_eq!(pages.load(Ordering::Relaxed), outcome.pages_crawled());
        assert_eq!(outcome.pages_crawled(), 3);
    }

    #[tokio::test]
    async fn test_invalid_start_url() {
        let result = crawler(1).crawl("not a url").await;
        assert!(matches!(result, Err(ScanError::InvalidUrl(_))));

        let result = crawler(1).crawl("ftp://example.com/").await;
        assert!(matches!(result, Err(ScanError::InvalidUrl(_))));
    }

    #[test]
    fn test_resolve_url_strips_fragment() {
        let base = Url::parse("http://example.com/docs/index.html").unwrap();
        assert_eq!(
            resolve_url(&base, "intro.html#part-2"),
            Some("http://example.com/docs/intro.html".to_string())
        );
        assert_eq!(resolve_url(&base, "tel:+3100000"), None);
        assert_eq!(resolve_url(&base, ""), None);
    }

    #[test]
    fn test_same_origin_requires_matching_port_and_scheme() {
        assert!(is_same_origin("http://example.com/a", "http://example.com/"));
        assert!(!is_same_origin("https://example.com/a", "http://example.com/"));
        assert!(!is_same_origin("http://example.com:8080/", "http://example.com/"));
        assert!(!is_same_origin("http://api.example.com/", "http://example.com/"));
    }

    #[test]
    fn test_asset_extension_only_checks_last_segment() {
        let asset = Url::parse("http://example.com/static/app.min.js").unwrap();
        let page = Url::parse("http://example.com/js/index.php").unwrap();
        let dotted_dir = Url::parse("http://example.com/v1.css/home").unwrap();
        assert!(has_asset_extension(&asset));
        assert!(!has_asset_extension(&page));
        assert!(!has_asset_extension(&dotted_dir));
    }
}
