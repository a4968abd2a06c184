pub mod aggregator;
pub mod config;
pub mod report;
pub mod session;

pub use aggregator::{FindingAggregator, SeverityCounts};
pub use config::{ConfigError, ScanConfig};
pub use report::{ReportData, ReportError, ReportFormat};
pub use session::{ScanOutcome, ScanSession, SessionError};

use colored::Colorize;

pub fn print_banner() {
    let banner = r#"
 __   __     _        ___
 \ \ / /_  _| |_ _   / __| __ __ _ _ _
  \ V / || | | ' \  \__ \/ _/ _` | ' \
   \_/ \_,_|_|_||_| |___/\__\__,_|_||_|
"#;
    println!("{}", banner.bright_cyan().bold());
    println!(
        "  {} {}",
        format!("v{}", env!("CARGO_PKG_VERSION")).bright_white(),
        "form fuzzer for authorized testing only".bright_black()
    );
    println!();
}
