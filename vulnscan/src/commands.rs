use crate::CLAP_STYLING;
use clap::{arg, command};
use vulnscan_core::config::{MAX_PAGES, MAX_TIMEOUT_SECS, MIN_PAGES, MIN_TIMEOUT_SECS};
use vulnscan_scanner::dispatch::{MAX_WORKERS, MIN_WORKERS};

pub fn command_argument_builder() -> clap::Command {
    clap::Command::new("vulnscan")
        .version(env!("CARGO_PKG_VERSION"))
        .bin_name("vulnscan")
        .about("Crawl a web application and fuzz its forms for XSS and SQL injection")
        .styles(CLAP_STYLING)
        .arg(arg!(-q --"quiet" "Suppress banner and non-essential output").required(false))
        .arg(
            arg!(-v --"verbose" "Log more (-v info, -vv debug, -vvv trace)")
                .required(false)
                .action(clap::ArgAction::Count),
        )
        .subcommand_required(false)
        .subcommand(
            command!("scan")
                .about("Crawl the target, then test every discovered form for XSS and SQL injection")
                .arg(target_arg())
                .arg(
                    arg!(-t --"threads" <NUM_WORKERS>)
                        .required(false)
                        .help("Number of forms tested concurrently")
                        .value_parser(
                            clap::value_parser!(u64).range(MIN_WORKERS as u64..=MAX_WORKERS as u64),
                        )
                        .default_value("5"),
                )
                .arg(max_pages_arg())
                .arg(timeout_arg())
                .arg(
                    arg!(--"enable-portscan")
                        .required(false)
                        .help("Run an nmap port scan of the target host first (needs nmap and root)")
                        .action(clap::ArgAction::SetTrue),
                )
                .arg(
                    arg!(--"ports" <RANGE>)
                        .required(false)
                        .help("Ports passed to nmap when port scanning")
                        .default_value("1-1000"),
                )
                .arg(
                    arg!(-o --"output" <FORMAT>)
                        .required(false)
                        .help("Report format")
                        .value_parser(["cli", "json", "csv"])
                        .ignore_case(true)
                        .default_value("cli"),
                )
                .arg(
                    arg!(--"output-file" <PATH>)
                        .required(false)
                        .help("Write the report to this file (csv defaults to vulnscan_report_<timestamp>.csv)"),
                ),
        )
        .subcommand(
            command!("crawl")
                .about("Crawl the target and list pages, links and forms without sending payloads")
                .arg(target_arg())
                .arg(max_pages_arg())
                .arg(timeout_arg()),
        )
}

fn target_arg() -> clap::Arg {
    arg!(-u --"url" <URL>)
        .required(true)
        .help("Target URL (https:// is assumed when no scheme is given)")
}

fn max_pages_arg() -> clap::Arg {
    arg!(--"max-pages" <NUM>)
        .required(false)
        .help("Maximum number of pages to crawl")
        .value_parser(clap::value_parser!(u64).range(MIN_PAGES as u64..=MAX_PAGES as u64))
        .default_value("10")
}

fn timeout_arg() -> clap::Arg {
    arg!(--"timeout" <SECONDS>)
        .required(false)
        .help("Crawl request timeout in seconds")
        .value_parser(clap::value_parser!(u64).range(MIN_TIMEOUT_SECS..=MAX_TIMEOUT_SECS))
        .default_value("5")
}
