use crate::finding::Finding;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressUnit {
    Page,
    Form,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProgressEvent {
    pub unit: ProgressUnit,
    pub count: usize,
}

impl ProgressEvent {
    pub fn page() -> Self {
        Self {
            unit: ProgressUnit::Page,
            count: 1,
        }
    }

    pub fn form() -> Self {
        Self {
            unit: ProgressUnit::Form,
            count: 1,
        }
    }
}

/// Push-only progress consumer. Called from several workers at once, so
/// implementations must not assume a single caller; the CLI forwards into an
/// mpsc channel drained by one task.
pub type ProgressCallback = Arc<dyn Fn(ProgressEvent) + Send + Sync>;

/// Streaming consumer for findings as soon as a detector accepts them.
pub type FindingCallback = Arc<dyn Fn(&Finding) + Send + Sync>;

/// Optional sinks handed to the crawler and detectors.
#[derive(Clone, Default)]
pub struct Sinks {
    pub progress: Option<ProgressCallback>,
    pub findings: Option<FindingCallback>,
}

impl Sinks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_progress(mut self, callback: ProgressCallback) -> Self {
        self.progress = Some(callback);
        self
    }

    pub fn with_findings(mut self, callback: FindingCallback) -> Self {
        self.findings = Some(callback);
        self
    }

    pub fn progress(&self, event: ProgressEvent) {
        if let Some(ref callback) = self.progress {
            callback(event);
        }
    }

    pub fn finding(&self, finding: &Finding) {
        if let Some(ref callback) = self.findings {
            callback(finding);
        }
    }
}
