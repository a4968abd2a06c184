// Report rendering for finished scans

use crate::aggregator::SeverityCounts;
use chrono::{DateTime, Local};
use colored::Colorize;
use csv::{Terminator, WriterBuilder};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs::File;
use std::io::Write;
use std::path::Path;
use thiserror::Error;
use url::Url;
use vulnscan_scanner::{CrawlOutcome, Finding, Severity};

pub const PAYLOAD_PREVIEW_CHARS: usize = 100;

pub const CSV_HEADER: &str = "timestamp,target,scan_duration,type,url,details,severity,payload,method,error_signature,subtype";

const RULE: &str = "━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━";
const THIN_RULE: &str = "    ────────────────────────────────────────────────────────────";

#[derive(Error, Debug)]
pub enum ReportError {
    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV encoding failed: {0}")]
    Csv(#[from] csv::Error),

    #[error("CSV output was not UTF-8: {0}")]
    Utf8(#[from] std::string::FromUtf8Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReportFormat {
    Cli,
    Json,
    Csv,
}

impl ReportFormat {
    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "cli" | "text" => Some(ReportFormat::Cli),
            "json" => Some(ReportFormat::Json),
            "csv" => Some(ReportFormat::Csv),
            _ => None,
        }
    }

    pub fn extension(&self) -> &'static str {
        match self {
            ReportFormat::Cli => "txt",
            ReportFormat::Json => "json",
            ReportFormat::Csv => "csv",
        }
    }
}

/// What every renderer consumes: findings plus scan duration and target.
#[derive(Debug, Clone)]
pub struct ReportData {
    pub target: String,
    pub generated_at: DateTime<Local>,
    pub duration_seconds: f64,
    pub findings: Vec<Finding>,
}

impl ReportData {
    pub fn new(findings: Vec<Finding>, duration_seconds: f64, target: &str) -> Self {
        Self {
            target: target.to_string(),
            generated_at: Local::now(),
            duration_seconds,
            findings,
        }
    }

    pub fn timestamp(&self) -> String {
        self.generated_at.format("%Y-%m-%d %H:%M:%S").to_string()
    }

    pub fn severity_counts(&self) -> SeverityCounts {
        SeverityCounts::from_findings(&self.findings)
    }
}

pub fn render(format: ReportFormat, data: &ReportData) -> Result<String, ReportError> {
    match format {
        ReportFormat::Cli => Ok(generate_text_report(data)),
        ReportFormat::Json => Ok(generate_json_report(data)?),
        ReportFormat::Csv => generate_csv_report(data),
    }
}

pub fn generate_text_report(data: &ReportData) -> String {
    let mut report = String::new();

    report.push_str(&format!("{}\n", RULE.cyan()));
    report.push_str(&format!("{}\n", "                           VULNERABILITY REPORT".cyan().bold()));
    report.push_str(&format!("{}\n\n", RULE.cyan()));

    report.push_str(&format!("{}\n", "Scan Details:".blue()));
    report.push_str(&format!("  Target:     {}\n", data.target));
    report.push_str(&format!("  Timestamp:  {}\n", data.timestamp()));
    report.push_str(&format!("  Duration:   {:.2} seconds\n", data.duration_seconds));
    report.push_str(&format!("  Findings:   {} total\n", data.findings.len()));

    if data.findings.is_empty() {
        report.push_str(&format!("\n{}\n", "✓ No vulnerabilities found.".green()));
        report.push_str(&format!(
            "{}\n",
            "[i] This is a preliminary scan. Consider manual testing for a complete assessment."
                .blue()
        ));
        return report;
    }

    let counts = data.severity_counts();
    report.push_str(&format!("\n{}\n", "Severity Breakdown:".blue()));
    if counts.critical > 0 {
        report.push_str(&format!("  {}\n", format!("Critical: {}", counts.critical).red()));
    }
    if counts.high > 0 {
        report.push_str(&format!("  {}\n", format!("High:     {}", counts.high).red()));
    }
    if counts.medium > 0 {
        report.push_str(&format!("  {}\n", format!("Medium:   {}", counts.medium).yellow()));
    }
    if counts.low > 0 {
        report.push_str(&format!("  {}\n", format!("Low:      {}", counts.low).yellow()));
    }
    if counts.info > 0 {
        report.push_str(&format!("  {}\n", format!("Info:     {}", counts.info).cyan()));
    }

    report.push_str(&format!("\n{}\n", "Detailed Findings:".blue()));

    for (idx, finding) in data.findings.iter().enumerate() {
        let title = format!("[{}] {}", idx + 1, finding.finding_type);
        let title = match finding.severity {
            Severity::Critical | Severity::High => title.red(),
            Severity::Medium | Severity::Low => title.yellow(),
            Severity::Info => title.cyan(),
        };

        report.push_str(&format!("\n{}\n", title));
        report.push_str(&format!("    URL:        {}\n", finding.url));
        report.push_str(&format!("    Details:    {}\n", finding.details));
        report.push_str(&format!(
            "    Severity:   {}\n",
            finding.severity.as_str().to_uppercase()
        ));

        if let Some(ref payload) = finding.payload {
            report.push_str(&format!("    Payload:    {}\n", preview(payload)));
        }
        if let Some(method) = finding.method {
            report.push_str(&format!("    Method:     {}\n", method));
        }
        if let Some(ref signature) = finding.error_signature {
            report.push_str(&format!("    Error:      {}\n", signature));
        }
        if let Some(ref subtype) = finding.subtype {
            report.push_str(&format!("    Subtype:    {}\n", subtype));
        }

        report.push_str(&format!(
            "    {}\n",
            format!("Remediation: {}", finding.finding_type.remediation()).green()
        ));
        report.push_str(THIN_RULE);
        report.push('\n');
    }

    report.push_str(&format!(
        "\n{}\n",
        "[!] Disclaimer: This is an automated scan. Manual verification is recommended.".yellow()
    ));
    report.push_str(&format!(
        "{}\n",
        "For authorized testing only. Ensure you have permission to test the target.".blue()
    ));

    report
}

#[derive(Serialize)]
struct JsonReport<'a> {
    scan_info: JsonScanInfo<'a>,
    findings: &'a [Finding],
    summary: SeverityCounts,
}

#[derive(Serialize)]
struct JsonScanInfo<'a> {
    target: &'a str,
    timestamp: String,
    duration_seconds: f64,
    total_findings: usize,
}

pub fn generate_json_report(data: &ReportData) -> Result<String, serde_json::Error> {
    let report = JsonReport {
        scan_info: JsonScanInfo {
            target: &data.target,
            timestamp: data.timestamp(),
            duration_seconds: data.duration_seconds,
            total_findings: data.findings.len(),
        },
        findings: &data.findings,
        summary: data.severity_counts(),
    };

    serde_json::to_string_pretty(&report)
}

/// One row per finding under [`CSV_HEADER`], CRLF-terminated.
pub fn generate_csv_report(data: &ReportData) -> Result<String, ReportError> {
    let mut wtr = WriterBuilder::new()
        .terminator(Terminator::CRLF)
        .from_writer(vec![]);

    wtr.write_record(CSV_HEADER.split(','))?;

    let timestamp = data.timestamp();
    let duration = format!("{:.2}", data.duration_seconds);

    for finding in &data.findings {
        wtr.write_record([
            timestamp.as_str(),
            data.target.as_str(),
            duration.as_str(),
            finding.finding_type.as_str(),
            finding.url.as_str(),
            finding.details.as_str(),
            finding.severity.as_str(),
            finding.payload.as_deref().unwrap_or(""),
            finding.method.map(|m| m.as_str()).unwrap_or(""),
            finding.error_signature.as_deref().unwrap_or(""),
            finding.subtype.as_deref().unwrap_or(""),
        ])?;
    }

    let bytes = wtr
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8(bytes)?)
}

pub fn default_report_filename(format: ReportFormat, at: DateTime<Local>) -> String {
    format!(
        "vulnscan_report_{}.{}",
        at.format("%Y%m%d_%H%M%S"),
        format.extension()
    )
}

pub fn save_report(content: &str, path: &Path) -> std::io::Result<()> {
    let mut file = File::create(path)?;
    file.write_all(content.as_bytes())?;
    Ok(())
}

fn preview(payload: &str) -> String {
    if payload.chars().count() > PAYLOAD_PREVIEW_CHARS {
        let cut: String = payload.chars().take(PAYLOAD_PREVIEW_CHARS).collect();
        format!("{}...", cut)
    } else {
        payload.to_string()
    }
}

/// Pages, queued links and forms of a crawl, grouped by host.
pub fn generate_crawl_report(outcome: &CrawlOutcome) -> String {
    let mut report = String::new();
    report.push_str(RULE);
    report.push_str("\n\n# Summary:\n");
    report.push_str(&format!("  Pages crawled: {}\n", outcome.pages_crawled()));
    report.push_str(&format!("  Links queued:  {}\n", outcome.links.len()));
    report.push_str(&format!("  Forms found:   {}\n", outcome.forms.len()));
    report.push('\n');
    report.push_str(RULE);
    report.push_str("\n\n");

    let mut by_host: BTreeMap<String, Vec<&vulnscan_scanner::CrawlResult>> = BTreeMap::new();
    for page in &outcome.pages {
        let host = Url::parse(&page.url)
            .ok()
            .and_then(|u| u.host_str().map(String::from))
            .unwrap_or_else(|| "unknown".to_string());
        by_host.entry(host).or_default().push(page);
    }

    for (host, pages) in &by_host {
        report.push_str(&format!("## {}\n", host));
        report.push_str(&format!("  {} pages\n\n", pages.len()));

        for page in pages {
            let path = extract_url_path(&page.url);
            let status = match page.status_code {
                0 => "ERR".red().to_string(),
                200..=299 => page.status_code.to_string().green().to_string(),
                300..=399 => page.status_code.to_string().cyan().to_string(),
                400..=499 => page.status_code.to_string().yellow().to_string(),
                500..=599 => page.status_code.to_string().red().to_string(),
                other => other.to_string(),
            };

            let mut line = format!("  {} {}", status, path);
            if page.forms_found > 0 {
                line.push_str(&format!(" ({} forms)", page.forms_found));
            }
            if let Some(ref content_type) = page.content_type
                && !content_type.to_lowercase().starts_with("text/html")
            {
                line.push_str(&format!(" {}", content_type.bright_black()));
            }
            if let Some(ref error) = page.error {
                line.push_str(&format!(" {}", error.bright_black()));
            }
            report.push_str(&line);
            report.push('\n');
        }
        report.push('\n');
    }

    if !outcome.forms.is_empty() {
        report.push_str("## Forms\n");
        for form in &outcome.forms {
            let names: Vec<&str> = form.fields.iter().map(|f| f.name.as_str()).collect();
            report.push_str(&format!(
                "  {} {} [{}]\n",
                form.method,
                form.action,
                names.join(", ")
            ));
        }
        report.push('\n');
    }

    report
}

/// Path component of a URL, `/` for the root.
pub fn extract_url_path(url: &str) -> String {
    Url::parse(url)
        .ok()
        .map(|u| {
            let path = u.path().to_string();
            if path.is_empty() { "/".to_string() } else { path }
        })
        .unwrap_or_else(|| url.to_string())
}
