//! Thin wrapper around an external `nmap` run.
//!
//! Only grepable output (`-oG -`) is read. Anything that goes wrong here is
//! logged and turns into an empty result, a port scan never fails the session.

use crate::error::{Result, ScanError};
use crate::finding::{Finding, FindingType, Severity};
use serde::{Deserialize, Serialize};
use std::process::Stdio;
use std::time::Duration;
use tokio::process::Command;
use tracing::{debug, info, warn};

pub const DEFAULT_PORT_RANGE: &str = "1-1000";
pub const NMAP_ARGS: &[&str] = &["-sS", "-T4", "--max-retries", "1", "--host-timeout", "30s"];

/// Ceiling on the whole nmap process, above its own host timeout.
const PROCESS_TIMEOUT: Duration = Duration::from_secs(60);

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortRecord {
    pub port: u16,
    pub protocol: String,
    pub service: String,
    pub state: String,
}

impl PortRecord {
    pub fn to_finding(&self, host: &str) -> Finding {
        Finding::new(
            FindingType::OpenPort,
            host,
            format!("{}/{} {}", self.port, self.protocol, self.service),
        )
        .with_severity(Severity::Info)
    }
}

/// Scan `ports` on `host` and return the open ones.
pub async fn scan_ports(host: &str, ports: &str) -> Vec<PortRecord> {
    info!("Scanning {} ports {}", host, ports);
    match run_nmap(host, ports).await {
        Ok(output) => {
            let records = parse_grepable(&output);
            for record in &records {
                info!(
                    "Found open port: {}/{} ({})",
                    record.port, record.protocol, record.service
                );
            }
            records
        }
        Err(e) => {
            warn!("Port scan of {} skipped: {}", host, e);
            Vec::new()
        }
    }
}

async fn run_nmap(host: &str, ports: &str) -> Result<String> {
    let nmap = which::which("nmap")
        .map_err(|e| ScanError::ToolUnavailable(format!("nmap not found on PATH: {}", e)))?;
    debug!("Using nmap at {}", nmap.display());

    let mut cmd = Command::new(nmap);
    cmd.args(NMAP_ARGS)
        .arg("-p")
        .arg(ports)
        .arg("-oG")
        .arg("-")
        .arg(host)
        .stdout(Stdio::piped())
        .stderr(Stdio::piped())
        .kill_on_drop(true);

    let output = tokio::time::timeout(PROCESS_TIMEOUT, cmd.output())
        .await
        .map_err(|_| ScanError::Other(format!("nmap did not finish within {:?}", PROCESS_TIMEOUT)))??;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(ScanError::Other(format!(
            "nmap exited with {}: {}",
            output.status,
            stderr.trim()
        )));
    }

    Ok(String::from_utf8_lossy(&output.stdout).into_owned())
}

/// Pull open ports out of nmap's grepable output.
///
/// Each entry of the `Ports:` field reads
/// `port/state/protocol/owner/service/rpc_info/version/`. Entries that do not
/// have that shape are skipped.
pub fn parse_grepable(output: &str) -> Vec<PortRecord> {
    let mut records = Vec::new();

    for line in output.lines() {
        if !line.starts_with("Host:") {
            continue;
        }
        for section in line.split('\t') {
            let Some(ports) = section.strip_prefix("Ports:") else {
                continue;
            };
            for entry in ports.split(", ") {
                if let Some(record) = parse_port_entry(entry.trim())
                    && record.state == "open"
                {
                    records.push(record);
                }
            }
        }
    }

    records
}

fn parse_port_entry(entry: &str) -> Option<PortRecord> {
    let parts: Vec<&str> = entry.split('/').collect();
    if parts.len() < 7 {
        return None;
    }

    let port = parts[0].trim().parse::<u16>().ok()?;
    let state = parts[1].trim();
    let protocol = parts[2].trim();
    if state.is_empty() || protocol.is_empty() {
        return None;
    }

    let name = match parts[4].trim() {
        "" => "unknown",
        name => name,
    };
    let version = parts[6].trim();
    let service = if version.is_empty() {
        name.to_string()
    } else {
        format!("{} ({})", name, version)
    };

    Some(PortRecord {
        port,
        protocol: protocol.to_string(),
        service,
        state: state.to_string(),
    })
}
