use super::{Detector, submit, with_probe};
use crate::finding::{Finding, FindingType, push_unique};
use crate::form::Form;
use crate::payloads::{PayloadCorpus, VulnClass};
use crate::progress::Sinks;
use async_trait::async_trait;
use reqwest::Client;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info};

pub const XSS_PROBE_TIMEOUT: Duration = Duration::from_secs(10);

/// Reflected XSS: a payload echoed back unencoded into the response body.
pub struct XssDetector {
    client: Client,
    corpus: Arc<PayloadCorpus>,
    timeout: Duration,
}

impl XssDetector {
    pub fn new(client: Client, corpus: Arc<PayloadCorpus>) -> Self {
        Self {
            client,
            corpus,
            timeout: XSS_PROBE_TIMEOUT,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }
}

/// The payload shows up in the body as-is, or once both sides are lowercased.
pub fn is_reflected(body: &str, payload: &str) -> bool {
    body.contains(payload) || body.to_lowercase().contains(&payload.to_lowercase())
}

#[async_trait]
impl Detector for XssDetector {
    fn name(&self) -> &'static str {
        "xss"
    }

    async fn test_form(&self, form: &Form, sinks: &Sinks) -> Vec<Finding> {
        let base = form.base_inputs();
        let mut findings = Vec::new();
        let mut flagged: HashSet<String> = HashSet::new();

        for payload in self.corpus.payloads(VulnClass::Xss) {
            for field in &form.fields {
                if flagged.contains(&field.name) {
                    continue;
                }

                let inputs = with_probe(&base, &field.name, payload.value);
                let response = match submit(&self.client, form, &inputs, self.timeout).await {
                    Ok(response) => response,
                    Err(e) => {
                        debug!("XSS probe on {} [{}] failed: {}", form.action, field.name, e);
                        continue;
                    }
                };

                if !is_reflected(&response.body, payload.value) {
                    continue;
                }

                flagged.insert(field.name.clone());
                let details = format!(
                    "Possible XSS in field '{}' at {}",
                    field.name, form.action
                );
                let finding =
                    Finding::for_probe(FindingType::Xss, form, &field.name, payload.value, details);

                if push_unique(&mut findings, finding.clone()) {
                    info!("XSS found: {} field '{}'", form.action, field.name);
                    sinks.finding(&finding);
                }
            }
        }

        findings
    }
}
