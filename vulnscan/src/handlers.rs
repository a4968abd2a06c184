use anyhow::{Context, Result, anyhow, bail};
use chrono::Local;
use clap::ArgMatches;
use colored::Colorize;
use indicatif::{MultiProgress, ProgressBar, ProgressStyle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tracing::Level;
use url::Url;
use vulnscan_core::report::{self, ReportData, ReportFormat};
use vulnscan_core::{ScanConfig, ScanOutcome, ScanSession, SessionError};
use vulnscan_scanner::{Crawler, Finding, ProgressEvent, ProgressUnit, Sinks, http};

/// Prepend `https://` when the target has no scheme, then make sure it is a
/// usable http(s) URL.
pub fn normalize_target(input: &str) -> Result<String> {
    let input = input.trim();
    if input.is_empty() {
        bail!("Target URL must not be empty");
    }

    let candidate = if input.contains("://") {
        input.to_string()
    } else {
        format!("https://{}", input)
    };

    let url = Url::parse(&candidate).with_context(|| format!("Invalid target URL '{}'", input))?;
    if !matches!(url.scheme(), "http" | "https") {
        bail!("Unsupported scheme '{}', use http or https", url.scheme());
    }
    if url.host_str().is_none() {
        bail!("Target URL '{}' has no host", input);
    }

    Ok(candidate)
}

pub fn level_for(verbosity: u8) -> Level {
    match verbosity {
        0 => Level::WARN,
        1 => Level::INFO,
        2 => Level::DEBUG,
        _ => Level::TRACE,
    }
}

/// Log to stderr so reports on stdout stay machine-readable.
pub fn init_tracing(verbosity: u8) {
    let _ = tracing_subscriber::fmt()
        .with_max_level(level_for(verbosity))
        .with_writer(std::io::stderr)
        .with_target(false)
        .try_init();
}

/// Everything `scan` needs, taken from its matches.
#[derive(Debug, Clone)]
pub struct ScanOptions {
    pub config: ScanConfig,
    pub format: ReportFormat,
    pub output_file: Option<PathBuf>,
}

impl ScanOptions {
    pub fn from_matches(args: &ArgMatches) -> Result<Self> {
        let url = args
            .get_one::<String>("url")
            .ok_or_else(|| anyhow!("--url is required"))?;
        let target = normalize_target(url)?;

        let threads = *args.get_one::<u64>("threads").unwrap_or(&5) as usize;
        let max_pages = *args.get_one::<u64>("max-pages").unwrap_or(&10) as usize;
        let timeout = *args.get_one::<u64>("timeout").unwrap_or(&5);
        let ports = args
            .get_one::<String>("ports")
            .map(String::as_str)
            .unwrap_or("1-1000");

        let config = ScanConfig::new(&target)
            .with_threads(threads)
            .with_max_pages(max_pages)
            .with_timeout_secs(timeout)
            .with_portscan(args.get_flag("enable-portscan"))
            .with_port_range(ports);
        config.validate()?;

        let format_name = args
            .get_one::<String>("output")
            .map(String::as_str)
            .unwrap_or("cli");
        let format = ReportFormat::from_str(format_name)
            .ok_or_else(|| anyhow!("Unknown report format '{}'", format_name))?;

        let output_file = args
            .get_one::<String>("output-file")
            .map(|p| PathBuf::from(shellexpand::tilde(p).as_ref()));

        Ok(Self {
            config,
            format,
            output_file,
        })
    }
}

pub fn print_scan_config(config: &ScanConfig) {
    println!("{} Target:     {}", "→".blue(), config.target.bright_white());
    println!("{} Max pages:  {}", "→".blue(), config.max_pages);
    println!("{} Timeout:    {}s", "→".blue(), config.timeout_secs);
    println!("{} Threads:    {}", "→".blue(), config.threads);
    if config.enable_portscan {
        println!("{} Port scan:  {}", "→".blue(), config.port_range);
    }
    println!();
}

enum UiEvent {
    Progress(ProgressEvent),
    Finding(Finding),
}

fn counter_style(template: &str) -> ProgressStyle {
    ProgressStyle::default_spinner()
        .template(template)
        .unwrap_or_else(|_| ProgressStyle::default_spinner())
}

/// Owns the progress bars. Engine callbacks only push into the channel; this
/// task is the single consumer and exits when every sender is gone.
async fn consume_ui_events(mut rx: mpsc::UnboundedReceiver<UiEvent>, max_pages: usize, quiet: bool) {
    let multi = MultiProgress::new();
    if quiet {
        multi.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }

    let pages = multi.add(ProgressBar::new(max_pages as u64));
    pages.set_style(
        ProgressStyle::default_bar()
            .template("{spinner:.cyan} Crawling [{bar:30.cyan/blue}] {pos}/{len} pages")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    pages.enable_steady_tick(Duration::from_millis(100));

    let forms = multi.add(ProgressBar::new_spinner());
    forms.set_style(counter_style("{spinner:.cyan} Testing forms: {pos} done"));

    while let Some(event) = rx.recv().await {
        match event {
            UiEvent::Progress(ProgressEvent {
                unit: ProgressUnit::Page,
                count,
            }) => pages.inc(count as u64),
            UiEvent::Progress(ProgressEvent {
                unit: ProgressUnit::Form,
                count,
            }) => {
                if !pages.is_finished() {
                    pages.finish();
                    forms.enable_steady_tick(Duration::from_millis(100));
                }
                forms.inc(count as u64);
            }
            UiEvent::Finding(finding) => {
                if !quiet {
                    let _ = multi.println(format!(
                        "{} {} {}",
                        "[+]".green().bold(),
                        finding.finding_type.to_string().bright_white(),
                        finding.details
                    ));
                }
            }
        }
    }

    pages.finish_and_clear();
    forms.finish_and_clear();
    let _ = multi.clear();
}

/// Run a full scan with progress bars, stopping cleanly on Ctrl-C.
pub async fn execute_scan(config: ScanConfig, quiet: bool) -> Result<ScanOutcome, SessionError> {
    let max_pages = config.max_pages;
    let session = ScanSession::new(config)?;

    let stop = session.stop_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            eprintln!("\n{} Stopping after in-flight requests finish...", "!".yellow().bold());
            stop.stop();
        }
    });

    let (tx, rx) = mpsc::unbounded_channel();
    let ui = tokio::spawn(consume_ui_events(rx, max_pages, quiet));

    let progress_tx = tx.clone();
    let sinks = Sinks::new()
        .with_progress(Arc::new(move |event| {
            let _ = progress_tx.send(UiEvent::Progress(event));
        }))
        .with_findings(Arc::new(move |finding: &Finding| {
            let _ = tx.send(UiEvent::Finding(finding.clone()));
        }));

    let result = session.run(sinks).await;
    let _ = ui.await;
    result
}

/// Render the report and send it where `format` and `output_file` say.
/// Returns the path written to, if any.
pub fn write_report(
    format: ReportFormat,
    data: &ReportData,
    output_file: Option<&Path>,
) -> Result<Option<PathBuf>> {
    match (format, output_file) {
        (ReportFormat::Csv, None) if data.findings.is_empty() => {
            println!(
                "{}",
                "No vulnerabilities found - CSV report not generated".yellow()
            );
            Ok(None)
        }
        (ReportFormat::Csv, None) => {
            let path = PathBuf::from(report::default_report_filename(format, Local::now()));
            save(format, data, &path)?;
            Ok(Some(path))
        }
        (_, Some(path)) => {
            save(format, data, path)?;
            Ok(Some(path.to_path_buf()))
        }
        (_, None) => {
            let content = report::render(format, data)?;
            println!("{}", content);
            Ok(None)
        }
    }
}

fn save(format: ReportFormat, data: &ReportData, path: &Path) -> Result<()> {
    // Files never get terminal colour codes.
    colored::control::set_override(false);
    let content = report::render(format, data);
    colored::control::unset_override();

    report::save_report(&content?, path)
        .with_context(|| format!("Failed to write report to {}", path.display()))
}

pub async fn handle_scan(args: &ArgMatches, quiet: bool) -> Result<()> {
    let options = ScanOptions::from_matches(args)?;

    if !quiet {
        print_scan_config(&options.config);
    }

    let target = options.config.target.clone();
    let outcome = match execute_scan(options.config, quiet).await {
        Ok(outcome) => outcome,
        Err(SessionError::TargetUnreachable { target, partial }) => {
            if !partial.is_empty() {
                let data = ReportData::new(partial, 0.0, &target);
                write_report(options.format, &data, options.output_file.as_deref())?;
            }
            bail!("Target {} is unreachable, no page could be fetched", target);
        }
        Err(e) => return Err(e.into()),
    };

    if outcome.stopped {
        println!("{} Scan stopped early, reporting partial results", "!".yellow().bold());
    }
    if !quiet {
        println!(
            "{} Crawled {} pages, tested {} forms in {:.2}s\n",
            "✓".green().bold(),
            outcome.pages.len(),
            outcome.form_count,
            outcome.duration.as_secs_f64()
        );
    }

    let data = ReportData::new(outcome.findings, outcome.duration.as_secs_f64(), &target);
    if let Some(path) = write_report(options.format, &data, options.output_file.as_deref())? {
        println!(
            "{} Report saved to {}",
            "✓".green().bold(),
            path.display().to_string().bright_white()
        );
    }

    Ok(())
}

pub async fn handle_crawl(args: &ArgMatches, quiet: bool) -> Result<()> {
    let url = args
        .get_one::<String>("url")
        .ok_or_else(|| anyhow!("--url is required"))?;
    let target = normalize_target(url)?;
    let max_pages = *args.get_one::<u64>("max-pages").unwrap_or(&10) as usize;
    let timeout = *args.get_one::<u64>("timeout").unwrap_or(&5);

    let config = ScanConfig::new(&target)
        .with_max_pages(max_pages)
        .with_timeout_secs(timeout);
    config.validate()?;

    if !quiet {
        println!("\n{} Crawling {}", "→".blue(), target.bright_white());
        println!("Max pages: {}\n", max_pages);
    }

    let progress_bar = ProgressBar::new(max_pages as u64);
    if quiet {
        progress_bar.set_draw_target(indicatif::ProgressDrawTarget::hidden());
    }
    progress_bar.set_style(counter_style("{spinner:.cyan} Crawling... {pos}/{len} pages"));
    progress_bar.enable_steady_tick(Duration::from_millis(100));

    let bar = progress_bar.clone();
    let client = http::build_client(config.timeout())?;
    let crawler = Crawler::new(client)
        .with_max_pages(config.max_pages)
        .with_timeout(config.timeout())
        .with_progress_callback(Arc::new(move |event: ProgressEvent| {
            bar.inc(event.count as u64);
        }));

    let outcome = crawler.crawl(&target).await;
    progress_bar.finish_and_clear();
    let outcome = outcome.context("Crawl failed")?;

    if !outcome.any_reachable() {
        bail!("Target {} is unreachable, no page could be fetched", target);
    }

    if !quiet {
        println!("{} Crawl complete!\n", "✓".green().bold());
    }
    print!("{}", report::generate_crawl_report(&outcome));

    Ok(())
}
