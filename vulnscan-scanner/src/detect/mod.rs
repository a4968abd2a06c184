//! Form fuzzing detectors.
//!
//! Every detector probes one form at a time, one field at a time: the field
//! under test carries the payload, every other field keeps its safe default.

pub mod sqli;
pub mod xss;

use crate::error::Result;
use crate::finding::Finding;
use crate::form::{Form, HttpMethod};
use crate::progress::{ProgressEvent, Sinks};
use async_trait::async_trait;
use reqwest::Client;
use std::time::{Duration, Instant};
use tracing::debug;

pub use sqli::SqliDetector;
pub use xss::XssDetector;

#[async_trait]
pub trait Detector: Send + Sync {
    fn name(&self) -> &'static str;

    /// Probe every field of `form`. Accepted findings are pushed to the
    /// finding sink as they are produced; probe failures never surface as errors.
    async fn test_form(&self, form: &Form, sinks: &Sinks) -> Vec<Finding>;
}

/// Response of a single probe submission.
#[derive(Debug)]
pub struct ProbeResponse {
    pub status_code: u16,
    pub body: String,
    pub elapsed: Duration,
}

/// Submit `inputs` to the form's action the way a browser would: query string
/// for GET, urlencoded body for POST.
pub async fn submit(
    client: &Client,
    form: &Form,
    inputs: &[(String, String)],
    timeout: Duration,
) -> Result<ProbeResponse> {
    let request = match form.method {
        HttpMethod::Get => client.get(&form.action).query(inputs),
        HttpMethod::Post => client.post(&form.action).form(inputs),
    };

    let start = Instant::now();
    let response = request.timeout(timeout).send().await?;
    let status_code = response.status().as_u16();
    let body = response.text().await?;

    Ok(ProbeResponse {
        status_code,
        body,
        elapsed: start.elapsed(),
    })
}

/// Run one form through `detector` and report it as done.
pub async fn run_form(detector: &dyn Detector, form: &Form, sinks: &Sinks) -> Vec<Finding> {
    let findings = if form.has_inputs() {
        detector.test_form(form, sinks).await
    } else {
        debug!("{}: no usable inputs on form at {}", detector.name(), form.action);
        Vec::new()
    };
    sinks.progress(ProgressEvent::form());
    findings
}

/// Input list with only `field` replaced by `value`. Built fresh per probe so
/// the defaults are back in place for the next one.
pub(crate) fn with_probe(base: &[(String, String)], field: &str, value: &str) -> Vec<(String, String)> {
    base.iter()
        .map(|(name, default)| {
            if name == field {
                (name.clone(), value.to_string())
            } else {
                (name.clone(), default.clone())
            }
        })
        .collect()
}
