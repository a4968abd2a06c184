use serde::{Deserialize, Serialize};
use tracing::debug;
use vulnscan_scanner::finding::{Finding, Severity, push_unique};
use vulnscan_scanner::portscan::PortRecord;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SeverityCounts {
    pub critical: usize,
    pub high: usize,
    pub medium: usize,
    pub low: usize,
    pub info: usize,
}

impl SeverityCounts {
    pub fn from_findings(findings: &[Finding]) -> Self {
        let mut counts = Self::default();
        for finding in findings {
            match finding.severity {
                Severity::Critical => counts.critical += 1,
                Severity::High => counts.high += 1,
                Severity::Medium => counts.medium += 1,
                Severity::Low => counts.low += 1,
                Severity::Info => counts.info += 1,
            }
        }
        counts
    }

    pub fn total(&self) -> usize {
        self.critical + self.high + self.medium + self.low + self.info
    }
}

/// Single owner of a scan's accepted findings.
///
/// Findings keep their arrival order. A finding whose `(url, details)` pair is
/// already present is dropped.
#[derive(Debug, Default)]
pub struct FindingAggregator {
    findings: Vec<Finding>,
}

impl FindingAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns false when the finding was a duplicate.
    pub fn push(&mut self, finding: Finding) -> bool {
        let accepted = push_unique(&mut self.findings, finding);
        if !accepted {
            debug!("Dropped duplicate finding");
        }
        accepted
    }

    /// Add a batch, returning how many were new.
    pub fn extend<I: IntoIterator<Item = Finding>>(&mut self, findings: I) -> usize {
        let mut added = 0;
        for finding in findings {
            if self.push(finding) {
                added += 1;
            }
        }
        added
    }

    /// Add port records as `info` findings for `host`, returning the ones
    /// that were new.
    pub fn add_open_ports(&mut self, host: &str, ports: &[PortRecord]) -> Vec<Finding> {
        let mut accepted = Vec::new();
        for finding in ports.iter().map(|p| p.to_finding(host)) {
            if self.push(finding.clone()) {
                accepted.push(finding);
            }
        }
        accepted
    }

    pub fn len(&self) -> usize {
        self.findings.len()
    }

    pub fn is_empty(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn findings(&self) -> &[Finding] {
        &self.findings
    }

    pub fn severity_counts(&self) -> SeverityCounts {
        SeverityCounts::from_findings(&self.findings)
    }

    pub fn into_findings(self) -> Vec<Finding> {
        self.findings
    }
}
