use std::fs;
use tempfile::TempDir;
use tracing::Level;
use vulnscan::commands::command_argument_builder;
use vulnscan::handlers::*;
use vulnscan_core::report::{CSV_HEADER, ReportData, ReportFormat};
use vulnscan_scanner::{Finding, FindingType};

fn scan_options(args: &[&str]) -> anyhow::Result<ScanOptions> {
    let mut argv = vec!["vulnscan", "scan"];
    argv.extend_from_slice(args);
    let matches = command_argument_builder().try_get_matches_from(argv)?;
    let (_, scan) = matches.subcommand().expect("scan subcommand");
    ScanOptions::from_matches(scan)
}

#[test]
fn test_normalize_target_adds_https() {
    assert_eq!(normalize_target("example.com").unwrap(), "https://example.com");
    assert_eq!(
        normalize_target("  example.com/login ").unwrap(),
        "https://example.com/login"
    );
}

#[test]
fn test_normalize_target_keeps_scheme() {
    assert_eq!(
        normalize_target("http://localhost:8080/").unwrap(),
        "http://localhost:8080/"
    );
}

#[test]
fn test_normalize_target_rejects_bad_input() {
    assert!(normalize_target("").is_err());
    assert!(normalize_target("ftp://example.com").is_err());
    assert!(normalize_target("not a valid url!!!").is_err());
}

#[test]
fn test_verbosity_levels() {
    assert_eq!(level_for(0), Level::WARN);
    assert_eq!(level_for(1), Level::INFO);
    assert_eq!(level_for(2), Level::DEBUG);
    assert_eq!(level_for(7), Level::TRACE);
}

#[test]
fn test_scan_defaults() {
    let options = scan_options(&["-u", "example.com"]).unwrap();

    assert_eq!(options.config.target, "https://example.com");
    assert_eq!(options.config.threads, 5);
    assert_eq!(options.config.max_pages, 10);
    assert_eq!(options.config.timeout_secs, 5);
    assert!(!options.config.enable_portscan);
    assert_eq!(options.format, ReportFormat::Cli);
    assert!(options.output_file.is_none());
}

#[test]
fn test_scan_flags() {
    let options = scan_options(&[
        "-u",
        "http://testphp.vulnweb.com",
        "-t",
        "12",
        "--max-pages",
        "40",
        "--timeout",
        "9",
        "--enable-portscan",
        "-o",
        "JSON",
        "--output-file",
        "out.json",
    ])
    .unwrap();

    assert_eq!(options.config.threads, 12);
    assert_eq!(options.config.max_pages, 40);
    assert_eq!(options.config.timeout_secs, 9);
    assert!(options.config.enable_portscan);
    assert_eq!(options.config.port_range, "1-1000");
    assert_eq!(options.format, ReportFormat::Json);
    assert_eq!(
        options.output_file.as_deref(),
        Some(std::path::Path::new("out.json"))
    );
}

#[test]
fn test_scan_rejects_out_of_range_values() {
    assert!(scan_options(&["-u", "example.com", "-t", "0"]).is_err());
    assert!(scan_options(&["-u", "example.com", "-t", "51"]).is_err());
    assert!(scan_options(&["-u", "example.com", "--max-pages", "101"]).is_err());
    assert!(scan_options(&["-u", "example.com", "--timeout", "0"]).is_err());
    assert!(scan_options(&["-u", "example.com", "-o", "xml"]).is_err());
}

#[test]
fn test_url_is_required() {
    assert!(
        command_argument_builder()
            .try_get_matches_from(["vulnscan", "crawl"])
            .is_err()
    );
}

#[test]
fn test_verbose_flag_counts() {
    let matches = command_argument_builder()
        .try_get_matches_from(["vulnscan", "-vv", "crawl", "-u", "example.com"])
        .unwrap();
    assert_eq!(matches.get_count("verbose"), 2);
}

#[test]
fn test_write_report_to_file() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("report.csv");

    let findings = vec![Finding::new(
        FindingType::OpenPort,
        "example.com",
        "80/tcp http".to_string(),
    )];
    let data = ReportData::new(findings, 3.0, "https://example.com");

    let written = write_report(ReportFormat::Csv, &data, Some(&path)).unwrap();
    assert_eq!(written.as_deref(), Some(path.as_path()));

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.starts_with(CSV_HEADER));
    assert!(content.contains("Open Port,example.com,80/tcp http,info"));
}

#[test]
fn test_text_report_file_has_no_colour_codes() {
    let temp_dir = TempDir::new().unwrap();
    let path = temp_dir.path().join("report.txt");
    let data = ReportData::new(Vec::new(), 1.0, "https://example.com");

    write_report(ReportFormat::Cli, &data, Some(&path)).unwrap();

    let content = fs::read_to_string(&path).unwrap();
    assert!(content.contains("VULNERABILITY REPORT"));
    assert!(!content.contains('\u{1b}'));
}

#[test]
fn test_empty_csv_without_path_is_skipped() {
    let data = ReportData::new(Vec::new(), 1.0, "https://example.com");
    let written = write_report(ReportFormat::Csv, &data, None).unwrap();
    assert!(written.is_none());
}
