use crate::aggregator::{FindingAggregator, SeverityCounts};
use crate::config::{ConfigError, ScanConfig};
use chrono::{DateTime, Local};
use serde::Serialize;
use std::sync::Arc;
use std::time::{Duration, Instant};
use thiserror::Error;
use tracing::{info, warn};
use uuid::Uuid;
use vulnscan_scanner::crawler::DEFAULT_CRAWL_DELAY;
use vulnscan_scanner::detect::sqli::DEFAULT_DELAY_THRESHOLD;
use vulnscan_scanner::{
    CrawlOutcome, CrawlResult, Crawler, Detector, Finding, PayloadCorpus, ScanError, Sinks,
    SqliDetector, StopHandle, XssDetector, http, run_concurrent, scan_ports,
};

#[derive(Error, Debug)]
pub enum SessionError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Target {target} is unreachable")]
    TargetUnreachable {
        target: String,
        /// Findings gathered before the crawl gave up, port results mostly.
        partial: Vec<Finding>,
    },

    #[error(transparent)]
    Scanner(#[from] ScanError),
}

#[derive(Debug, Clone, Serialize)]
pub struct ScanOutcome {
    pub session_id: String,
    pub target: String,
    pub findings: Vec<Finding>,
    pub pages: Vec<CrawlResult>,
    pub links: Vec<String>,
    pub form_count: usize,
    pub duration: Duration,
    pub stopped: bool,
}

impl ScanOutcome {
    pub fn severity_counts(&self) -> SeverityCounts {
        SeverityCounts::from_findings(&self.findings)
    }
}

/// One scan invocation: crawl the target, fuzz every form it finds, collect
/// the findings.
///
/// The session owns all crawl and fuzz state. Cancellation goes through the
/// [`StopHandle`] returned by [`ScanSession::stop_handle`] and is only
/// observed between phases and before each form.
pub struct ScanSession {
    id: Uuid,
    config: ScanConfig,
    started_at: DateTime<Local>,
    stop: StopHandle,
    corpus: Arc<PayloadCorpus>,
    crawl_delay: Duration,
    delay_threshold: Duration,
}

impl ScanSession {
    pub fn new(config: ScanConfig) -> Result<Self, SessionError> {
        config.validate()?;
        Ok(Self {
            id: Uuid::new_v4(),
            config,
            started_at: Local::now(),
            stop: StopHandle::new(),
            corpus: Arc::new(PayloadCorpus::builtin()),
            crawl_delay: DEFAULT_CRAWL_DELAY,
            delay_threshold: DEFAULT_DELAY_THRESHOLD,
        })
    }

    pub fn with_crawl_delay(mut self, delay: Duration) -> Self {
        self.crawl_delay = delay;
        self
    }

    pub fn with_delay_threshold(mut self, threshold: Duration) -> Self {
        self.delay_threshold = threshold;
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn config(&self) -> &ScanConfig {
        &self.config
    }

    pub fn started_at(&self) -> DateTime<Local> {
        self.started_at
    }

    pub fn stop_handle(&self) -> StopHandle {
        self.stop.clone()
    }

    pub async fn run(&self, sinks: Sinks) -> Result<ScanOutcome, SessionError> {
        let start = Instant::now();
        let mut aggregator = FindingAggregator::new();
        let mut crawl = CrawlOutcome::default();

        info!("Scan {} started against {}", self.id, self.config.target);

        if self.stop.is_stopped() {
            return Ok(self.finish(aggregator, crawl, start, true));
        }

        if self.config.enable_portscan {
            self.port_scan(&mut aggregator, &sinks).await;
        }

        if self.stop.is_stopped() {
            return Ok(self.finish(aggregator, crawl, start, true));
        }

        let client = http::build_client(self.config.timeout())?;
        let mut crawler = Crawler::new(client.clone())
            .with_max_pages(self.config.max_pages)
            .with_timeout(self.config.timeout())
            .with_delay(self.crawl_delay);
        if let Some(ref progress) = sinks.progress {
            crawler = crawler.with_progress_callback(progress.clone());
        }

        crawl = crawler.crawl(&self.config.target).await?;
        if !crawl.any_reachable() {
            warn!("No page of {} could be fetched", self.config.target);
            return Err(SessionError::TargetUnreachable {
                target: self.config.target.clone(),
                partial: aggregator.into_findings(),
            });
        }

        let detectors: [Arc<dyn Detector>; 2] = [
            Arc::new(XssDetector::new(client.clone(), self.corpus.clone())),
            Arc::new(
                SqliDetector::new(client, self.corpus.clone())
                    .with_delay_threshold(self.delay_threshold),
            ),
        ];

        for detector in detectors {
            if self.stop.is_stopped() {
                return Ok(self.finish(aggregator, crawl, start, true));
            }

            info!(
                "Testing {} forms for {}",
                crawl.forms.len(),
                detector.name()
            );
            let found = run_concurrent(
                detector,
                crawl.forms.clone(),
                self.config.threads,
                sinks.clone(),
                self.stop.clone(),
            )
            .await?;
            aggregator.extend(found);
        }

        let stopped = self.stop.is_stopped();
        Ok(self.finish(aggregator, crawl, start, stopped))
    }

    async fn port_scan(&self, aggregator: &mut FindingAggregator, sinks: &Sinks) {
        let Some(host) = self.config.host() else {
            return;
        };
        let records = scan_ports(&host, &self.config.port_range).await;
        for finding in aggregator.add_open_ports(&host, &records) {
            sinks.finding(&finding);
        }
    }

    fn finish(
        &self,
        aggregator: FindingAggregator,
        crawl: CrawlOutcome,
        start: Instant,
        stopped: bool,
    ) -> ScanOutcome {
        let duration = start.elapsed();
        if stopped {
            info!("Scan {} stopped after {:.2}s", self.id, duration.as_secs_f64());
        } else {
            info!(
                "Scan {} finished in {:.2}s with {} findings",
                self.id,
                duration.as_secs_f64(),
                aggregator.len()
            );
        }

        ScanOutcome {
            session_id: self.id.to_string(),
            target: self.config.target.clone(),
            findings: aggregator.into_findings(),
            form_count: crawl.forms.len(),
            pages: crawl.pages,
            links: crawl.links,
            duration,
            stopped,
        }
    }
}
