use crate::form::{Form, HttpMethod};
use serde::{Deserialize, Serialize};
use std::fmt;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Critical,
    High,
    Medium,
    Low,
    Info,
}

impl Severity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Severity::Critical => "critical",
            Severity::High => "high",
            Severity::Medium => "medium",
            Severity::Low => "low",
            Severity::Info => "info",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "critical" => Some(Severity::Critical),
            "high" => Some(Severity::High),
            "medium" => Some(Severity::Medium),
            "low" => Some(Severity::Low),
            "info" => Some(Severity::Info),
            _ => None,
        }
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum FindingType {
    #[serde(rename = "XSS")]
    Xss,
    #[serde(rename = "SQL Injection")]
    SqlInjection,
    #[serde(rename = "Open Port")]
    OpenPort,
}

impl FindingType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FindingType::Xss => "XSS",
            FindingType::SqlInjection => "SQL Injection",
            FindingType::OpenPort => "Open Port",
        }
    }

    /// Severity used when the producer did not choose one.
    pub fn default_severity(&self) -> Severity {
        match self {
            FindingType::Xss => Severity::High,
            FindingType::SqlInjection => Severity::Critical,
            FindingType::OpenPort => Severity::Info,
        }
    }

    pub fn remediation(&self) -> &'static str {
        match self {
            FindingType::Xss => {
                "Use proper output encoding and input sanitization. Implement CSP headers."
            }
            FindingType::SqlInjection => {
                "Use parameterized queries/prepared statements. Validate input data."
            }
            FindingType::OpenPort => {
                "Restrict access with firewall rules or close unnecessary services."
            }
        }
    }
}

impl fmt::Display for FindingType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A detected or suspected vulnerability. Immutable once a detector hands it out.
///
/// `(url, details)` is the identity used for deduplication.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Finding {
    #[serde(rename = "type")]
    pub finding_type: FindingType,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub subtype: Option<String>,
    /// Page the tested form lives on (or the host, for port findings).
    pub url: String,
    pub details: String,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub action: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub field: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub payload: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub method: Option<HttpMethod>,
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub error_signature: Option<String>,
    pub severity: Severity,
}

impl Finding {
    pub fn new(finding_type: FindingType, url: &str, details: String) -> Self {
        Self {
            finding_type,
            subtype: None,
            url: url.to_string(),
            details,
            action: None,
            field: None,
            payload: None,
            method: None,
            error_signature: None,
            severity: finding_type.default_severity(),
        }
    }

    /// Finding raised by probing `field` of `form` with `payload`.
    pub fn for_probe(
        finding_type: FindingType,
        form: &Form,
        field: &str,
        payload: &str,
        details: String,
    ) -> Self {
        Self {
            action: Some(form.action.clone()),
            field: Some(field.to_string()),
            payload: Some(payload.to_string()),
            method: Some(form.method),
            ..Self::new(finding_type, &form.source_url, details)
        }
    }

    pub fn with_subtype(mut self, subtype: &str) -> Self {
        self.subtype = Some(subtype.to_string());
        self
    }

    pub fn with_error_signature(mut self, evidence: &str) -> Self {
        self.error_signature = Some(evidence.to_string());
        self
    }

    pub fn with_severity(mut self, severity: Severity) -> Self {
        self.severity = severity;
        self
    }

    pub fn dedup_key(&self) -> (&str, &str) {
        (&self.url, &self.details)
    }
}

/// Keep `finding` only if nothing in `findings` shares its `(url, details)`.
/// Returns whether it was appended.
pub fn push_unique(findings: &mut Vec<Finding>, finding: Finding) -> bool {
    if findings
        .iter()
        .any(|f| f.dedup_key() == finding.dedup_key())
    {
        return false;
    }
    findings.push(finding);
    true
}
