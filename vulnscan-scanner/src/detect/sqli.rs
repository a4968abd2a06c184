use super::{Detector, submit, with_probe};
use crate::finding::{Finding, FindingType, push_unique};
use crate::form::Form;
use crate::payloads::{Payload, PayloadCorpus, VulnClass};
use crate::progress::Sinks;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const SQLI_PROBE_TIMEOUT: Duration = Duration::from_secs(15);
pub const DEFAULT_DELAY_THRESHOLD: Duration = Duration::from_secs(4);

pub const ERROR_BASED: &str = "Error-based SQLi";
pub const TIME_BASED: &str = "Time-based SQLi";
pub const TIME_BASED_TIMEOUT: &str = "Time-based SQLi (Timeout)";

pub const TIME_DELAY_EVIDENCE: &str = "Time delay detected";
pub const TIMEOUT_EVIDENCE: &str = "Request timeout";

/// Error-based and time-based SQL injection.
///
/// Each probe is checked for a database error signature first. Only payloads
/// tagged time-based can raise a latency finding, either by crossing
/// `delay_threshold` or by running into the probe timeout.
pub struct SqliDetector {
    client: Client,
    corpus: Arc<PayloadCorpus>,
    timeout: Duration,
    delay_threshold: Duration,
}

impl SqliDetector {
    pub fn new(client: Client, corpus: Arc<PayloadCorpus>) -> Self {
        Self {
            client,
            corpus,
            timeout: SQLI_PROBE_TIMEOUT,
            delay_threshold: DEFAULT_DELAY_THRESHOLD,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn with_delay_threshold(mut self, threshold: Duration) -> Self {
        self.delay_threshold = threshold;
        self
    }

    async fn probe(
        &self,
        form: &Form,
        field: &str,
        payload: &Payload,
        base: &[(String, String)],
    ) -> Option<Finding> {
        let inputs = with_probe(base, field, payload.value);

        let response = match submit(&self.client, form, &inputs, self.timeout).await {
            Ok(response) => response,
            Err(e) if e.is_timeout() && payload.is_time_based() => {
                let details = format!(
                    "Possible time-based SQLi in field '{}' at {} (timeout)",
                    field, form.action
                );
                return Some(
                    Finding::for_probe(FindingType::SqlInjection, form, field, payload.value, details)
                        .with_subtype(TIME_BASED_TIMEOUT)
                        .with_error_signature(TIMEOUT_EVIDENCE),
                );
            }
            Err(e) => {
                debug!("SQLi probe on {} [{}] failed: {}", form.action, field, e);
                return None;
            }
        };

        let (subtype, evidence) = if let Some(signature) = self.corpus.match_sql_error(&response.body) {
            (ERROR_BASED, signature)
        } else if payload.is_time_based() && response.elapsed > self.delay_threshold {
            (TIME_BASED, TIME_DELAY_EVIDENCE)
        } else {
            return None;
        };

        let details = format!(
            "Possible {} in field '{}' at {}",
            subtype, field, form.action
        );
        Some(
            Finding::for_probe(FindingType::SqlInjection, form, field, payload.value, details)
                .with_subtype(subtype)
                .with_error_signature(evidence),
        )
    }
}

#[async_trait]
impl Detector for SqliDetector {
    fn name(&self) -> &'static str {
        "sqli"
    }

    async fn test_form(&self, form: &Form, sinks: &Sinks) -> Vec<Finding> {
        let base = form.base_inputs();
        let mut findings = Vec::new();
        let mut flagged: HashSet<String> = HashSet::new();

        for payload in self.corpus.payloads(VulnClass::Sqli) {
            for field in &form.fields {
                if flagged.contains(&field.name) {
                    continue;
                }

                let Some(finding) = self.probe(form, &field.name, payload, &base).await else {
                    continue;
                };

                flagged.insert(field.name.clone());
                if push_unique(&mut findings, finding.clone()) {
                    info!(
                        "SQLi found ({}): {} field '{}'",
                        finding.subtype.as_deref().unwrap_or("unknown"),
                        form.action,
                        field.name
                    );
                    sinks.finding(&finding);
                }
            }
        }

        findings
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::detect::test_support::submitted_pairs;
    use crate::finding::Severity;
    use crate::form::{Field, HttpMethod};
    use crate::http;
    use wiremock::{
        Mock, MockServer, Request, Respond, ResponseTemplate,
        matchers::{method, path},
    };

    /// Responds slowly or with a database error when a submitted value
    /// contains `trigger`.
    struct TriggerResponder {
        trigger: &'static str,
        body: &'static str,
        delay: Duration,
    }

    impl Respond for TriggerResponder {
        fn respond(&self, request: &Request) -> ResponseTemplate {
            let hit = submitted_pairs(request)
                .iter()
                .any(|(_, value)| value.contains(self.trigger));
            let template = ResponseTemplate::new(200);
            if hit {
                template
                    .set_body_raw(self.body, "text/html")
                    .set_delay(self.delay)
            } else {
                template.set_body_raw("<p>No results</p>", "text/html")
            }
        }
    }

    async fn mount(server: &MockServer, responder: TriggerResponder) {
        Mock::given(method("GET"))
            .and(path("/search"))
            .respond_with(responder)
            .mount(server)
            .await;
    }

    fn detector() -> SqliDetector {
        let client = http::build_client(Duration::from_secs(5)).unwrap();
        SqliDetector::new(client, Arc::new(PayloadCorpus::builtin()))
            .with_timeout(Duration::from_secs(3))
            .with_delay_threshold(Duration::from_millis(300))
    }

    fn search_form(uri: &str) -> Form {
        Form::new(
            &format!("{uri}/"),
            &format!("{uri}/search"),
            HttpMethod::Get,
            vec![Field::new("q", "text")],
        )
    }

    #[tokio::test]
    async fn test_error_signature_in_body() {
        let mock_server = MockServer::start().await;
        mount(
            &mock_server,
            TriggerResponder {
                trigger: "' OR 1=1--",
                body: "<b>You have an error in your SQL syntax; check the manual</b>",
                delay: Duration::ZERO,
            },
        )
        .await;

        let uri = mock_server.uri();
        let findings = detector().test_form(&search_form(&uri), &Sinks::new()).await;

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.finding_type, FindingType::SqlInjection);
        assert_eq!(finding.subtype.as_deref(), Some(ERROR_BASED));
        assert_eq!(
            finding.error_signature.as_deref(),
            Some("You have an error in your SQL syntax")
        );
        assert_eq!(finding.payload.as_deref(), Some("' OR 1=1--"));
        assert_eq!(finding.severity, Severity::Critical);
        assert_eq!(
            finding.details,
            format!("Possible Error-based SQLi in field 'q' at {uri}/search")
        );
    }

    #[tokio::test]
    async fn test_time_delay_on_sleep_payload() {
        let mock_server = MockServer::start().await;
        mount(
            &mock_server,
            TriggerResponder {
                trigger: "SLEEP(5)",
                body: "<p>ok</p>",
                delay: Duration::from_millis(600),
            },
        )
        .await;

        let uri = mock_server.uri();
        let findings = detector().test_form(&search_form(&uri), &Sinks::new()).await;

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.subtype.as_deref(), Some(TIME_BASED));
        assert_eq!(finding.error_signature.as_deref(), Some(TIME_DELAY_EVIDENCE));
        assert_eq!(finding.payload.as_deref(), Some("' OR SLEEP(5)--"));
    }

    #[tokio::test]
    async fn test_slow_response_to_non_time_payload_is_ignored() {
        let mock_server = MockServer::start().await;
        mount(
            &mock_server,
            TriggerResponder {
                trigger: "UNION SELECT NULL--",
                body: "<p>ok</p>",
                delay: Duration::from_millis(600),
            },
        )
        .await;

        let uri = mock_server.uri();
        let findings = detector().test_form(&search_form(&uri), &Sinks::new()).await;

        assert!(findings.is_empty());
        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 20);
    }

    #[tokio::test]
    async fn test_timeout_on_non_time_payload_is_ignored() {
        let mock_server = MockServer::start().await;
        mount(
            &mock_server,
            TriggerResponder {
                trigger: "UNION SELECT NULL--",
                body: "<p>ok</p>",
                delay: Duration::from_secs(1),
            },
        )
        .await;

        let uri = mock_server.uri();
        let findings = detector()
            .with_timeout(Duration::from_millis(200))
            .test_form(&search_form(&uri), &Sinks::new())
            .await;

        assert!(findings.is_empty());
        let requests = mock_server.received_requests().await.unwrap();
        assert_eq!(requests.len(), 20);
    }

    #[tokio::test]
    async fn test_timeout_on_time_based_payload() {
        let mock_server = MockServer::start().await;
        mount(
            &mock_server,
            TriggerResponder {
                trigger: "WAITFOR",
                body: "<p>ok</p>",
                delay: Duration::from_secs(1),
            },
        )
        .await;

        let uri = mock_server.uri();
        let findings = detector()
            .with_timeout(Duration::from_millis(200))
            .test_form(&search_form(&uri), &Sinks::new())
            .await;

        assert_eq!(findings.len(), 1);
        let finding = &findings[0];
        assert_eq!(finding.subtype.as_deref(), Some(TIME_BASED_TIMEOUT));
        assert_eq!(finding.error_signature.as_deref(), Some(TIMEOUT_EVIDENCE));
        assert_eq!(
            finding.details,
            format!("Possible time-based SQLi in field 'q' at {uri}/search (timeout)")
        );
    }

    #[tokio::test]
    async fn test_error_signature_wins_over_delay() {
        let mock_server = MockServer::start().await;
        mount(
            &mock_server,
            TriggerResponder {
                trigger: "pg_sleep",
                body: "ERROR: syntax error at or near \"SELECT\"",
                delay: Duration::from_millis(600),
            },
        )
        .await;

        let uri = mock_server.uri();
        let findings = detector().test_form(&search_form(&uri), &Sinks::new()).await;

        assert_eq!(findings.len(), 1);
        assert_eq!(findings[0].subtype.as_deref(), Some(ERROR_BASED));
        assert_eq!(
            findings[0].error_signature.as_deref(),
            Some("syntax error at or near")
        );
    }
}
