mod progress;

use std::fmt::Display;
use std::io::Write;
use std::process;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use colored::*;
use log::info;

use raidscanner_core::detectors::crlf;
use raidscanner_core::{
    parse_custom_headers, read_lines, PayloadLoader, PayloadSource, ScanConfig, ScanReport,
    ScanType, SessionState,
};

use crate::progress::BarObserver;

#[derive(Parser, Debug)]
#[command(
    name = "RaidScanner",
    version,
    about = "Concurrent web vulnerability scanner (LFI, SQLi, XSS, open redirect, CRLF)",
    override_usage = "raidscanner <lfi|sqli|xss|or|crlf> <target>  <options>",
    after_help = "\x1b[1;36mEXAMPLES:\x1b[0m
  LFI on one URL:                 raidscanner lfi 'http://target.com/?file='
  SQLi, MySQL payloads:           raidscanner sqli 'http://target.com/?id=' --db mysql
  XSS via chromedriver:           raidscanner xss 'http://target.com/?q=' --webdriver http://127.0.0.1:9515
  Open redirect from a list:      raidscanner or -l targets.txt -t 20
  CRLF through Burp:              raidscanner crlf http://target.com/ --proxy http://127.0.0.1:8080
  Show planned probes only:       raidscanner lfi 'http://target.com/?file=' --dry-run
  Available payload files:        raidscanner --list-payloads"
)]
pub struct Args {
    #[arg(required_unless_present = "list_payloads", help = "Scan type: lfi, sqli, xss, or, crlf")]
    pub scan_type: Option<ScanType>,

    #[arg(help = "Target URL; payloads are appended to it verbatim")]
    pub target: Option<String>,

    #[arg(short = 'l', long = "list", help = "File containing target URLs (one per line)")]
    pub list: Option<String>,

    #[arg(short = 't', long, help = "Number of concurrent probes [default: 5]")]
    pub threads: Option<usize>,

    #[arg(short = 'p', long, help = "Payload file to use instead of the payload directory")]
    pub payloads: Option<String>,

    #[arg(long, help = "Payload directory [default: payloads]")]
    pub payload_dir: Option<String>,

    #[arg(long = "db", help = "SQLi payload flavour, loads sqli/<db>.txt [default: generic]")]
    pub db: Option<String>,

    #[arg(long, help = "Request timeout in seconds [default: 10]")]
    pub timeout: Option<u64>,

    #[arg(long, help = "Seconds of delay that mark a time-based SQLi hit [default: 10]")]
    pub time_threshold: Option<f64>,

    #[arg(long = "success-marker", help = "LFI success marker (repeatable) [default: root:x:0:]")]
    pub success_markers: Vec<String>,

    #[arg(long = "sql-error", help = "Extra SQL error signature (repeatable)")]
    pub sql_errors: Vec<String>,

    #[arg(long, help = "WebDriver endpoint for XSS scans [default: http://127.0.0.1:9515]")]
    pub webdriver: Option<String>,

    #[arg(long, help = "Proxy URL (e.g. http://127.0.0.1:8080)")]
    pub proxy: Option<String>,

    #[arg(
        short = 'H',
        long = "header",
        help = "Custom header (e.g. \"Authorization: Bearer TOKEN\")"
    )]
    pub headers: Vec<String>,

    #[arg(short = 'o', long, help = "Output file for the JSON report [default: scan_report.json]")]
    pub output: Option<String>,

    #[arg(long, help = "JSON config file; command-line flags take precedence")]
    pub config: Option<String>,

    #[arg(long, help = "List available payload files and exit")]
    pub list_payloads: bool,

    #[arg(long, help = "Print the planned probes without sending any request")]
    pub dry_run: bool,

    #[arg(short = 'v', long, default_value_t = false, help = "Show failed probes and engine logs")]
    pub verbose: bool,
}

#[tokio::main]
async fn main() {
    #[cfg(windows)]
    colored::control::set_virtual_terminal(true).ok();

    let args = Args::parse();
    init_logging(args.verbose);
    print_banner();

    if let Err(e) = run(args).await {
        eprint!("{}\r\n", format!("[!] {:#}", e).red());
        process::exit(1);
    }
}

fn init_logging(verbose: bool) {
    let level = if verbose { "info" } else { "warn" };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level))
        .format_timestamp(None)
        .init();
}

async fn run(args: Args) -> anyhow::Result<()> {
    let config = build_config(&args)?;

    if args.list_payloads {
        return list_payloads(&config);
    }

    let scan_type = args.scan_type.context("a scan type is required")?;
    let targets = collect_targets(&args)?;

    let payloads = if scan_type == ScanType::Crlf {
        crlf::payloads()
    } else {
        config.payload_loader(scan_type).load_payloads(scan_type)?
    };

    if args.dry_run {
        print_dry_run(&config, scan_type, &targets, &payloads);
        return Ok(());
    }

    print_scan_config(&config, scan_type, targets.len(), payloads.len());

    let mut session = config
        .session(scan_type)?
        .with_headers(parse_custom_headers(&args.headers));
    let observer = Arc::new(BarObserver::new(config.verbose));
    session.register_observer(observer.clone());

    let cancel = session.cancel_handle();
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            info!("Interrupt received, stopping after in-flight probes");
            cancel.cancel();
        }
    });

    let report = session.run(&targets, &payloads).await?;
    observer.finish();

    if session.state() == SessionState::Cancelled {
        out("[!] Scan interrupted; the report covers completed probes only.".yellow());
    }
    print_summary(&report);

    report
        .save_json(&config.output)
        .with_context(|| format!("failed to write report to {}", config.output))?;
    out(format!("[+] Report saved to {}", config.output).green().bold());
    Ok(())
}

/// Config file first, then any flag the user actually passed.
fn build_config(args: &Args) -> anyhow::Result<ScanConfig> {
    let mut config = match args.config {
        Some(ref path) => ScanConfig::load(path)?,
        None => ScanConfig::default(),
    };

    if let Some(threads) = args.threads {
        config.threads = threads;
    }
    if let Some(timeout) = args.timeout {
        config.timeout = timeout;
    }
    if let Some(threshold) = args.time_threshold {
        config.time_threshold = threshold;
    }
    if let Some(ref dir) = args.payload_dir {
        config.payload_dir = dir.clone();
    }
    if let Some(ref file) = args.payloads {
        config.payload_file = file.clone();
    }
    if let Some(ref db) = args.db {
        config.sqli_db = db.clone();
    }
    if let Some(ref url) = args.webdriver {
        config.webdriver_url = url.clone();
    }
    if let Some(ref proxy) = args.proxy {
        config.proxy = proxy.clone();
    }
    if let Some(ref output) = args.output {
        config.output = output.clone();
    }
    if !args.success_markers.is_empty() {
        config.success_markers = args.success_markers.clone();
    }
    config.sql_signatures.extend(args.sql_errors.iter().cloned());
    config.verbose |= args.verbose;
    Ok(config)
}

fn collect_targets(args: &Args) -> anyhow::Result<Vec<String>> {
    let mut targets = Vec::new();

    if let Some(ref list_path) = args.list {
        let lines =
            read_lines(list_path).with_context(|| format!("failed to read '{}'", list_path))?;
        out(format!("[+] Loaded {} target(s) from {}", lines.len(), list_path).green().bold());
        targets.extend(lines);
    }
    if let Some(ref t) = args.target {
        targets.push(t.trim().to_string());
    }

    if targets.is_empty() {
        anyhow::bail!("no targets specified; provide a URL or use -l <file>");
    }
    Ok(targets)
}

fn list_payloads(config: &ScanConfig) -> anyhow::Result<()> {
    let loader = PayloadLoader::new(&config.payload_dir);
    let listing = loader.list_available()?;

    out(format!("[*] Payload files under {}", loader.dir().display()).bright_cyan().bold());
    for (category, files) in &listing {
        out(format!("  {}", category).magenta().bold());
        for file in files {
            out(format!("    {} ({} payloads)", file, loader.payload_count(file)));
        }
    }
    out(format!("  built-in: crlf ({} payloads)", crlf::CRLF_PAYLOADS.len()).dimmed());
    Ok(())
}

fn print_dry_run(
    config: &ScanConfig,
    scan_type: ScanType,
    targets: &[String],
    payloads: &[String],
) {
    let detector = config.detector(scan_type);
    for target in targets {
        for payload in payloads {
            println!("[DRY RUN] Would probe {}", detector.target_url(target, payload));
        }
    }
    println!(
        "[DRY RUN] {} {} probe(s) across {} target(s)",
        targets.len() * payloads.len(),
        scan_type,
        targets.len()
    );
}

/// Prints the RaidScanner banner.
fn print_banner() {
    let banner = r#"
    ____        _     _______
   / __ \____ _(_)___/ / ___/_________ _____  ____  ___  _____
  / /_/ / __ `/ / __  /\__ \/ ___/ __ `/ __ \/ __ \/ _ \/ ___/
 / _, _/ /_/ / / /_/ /___/ / /__/ /_/ / / / / / / /  __/ /
/_/ |_|\__,_/_/\__,_//____/\___/\__,_/_/ /_/_/ /_/\___/_/
    "#;
    out(banner.bright_cyan().bold());
    out(SEPARATOR.dimmed());
}

const SEPARATOR: &str = "──────────────────────────────────────────────────";

fn print_scan_config(config: &ScanConfig, scan_type: ScanType, targets: usize, payloads: usize) {
    out(format!("[+] Scan:       {}", scan_type).green().bold());
    out(format!("[+] Targets:    {}", targets).blue());
    out(format!("[+] Payloads:   {}", payloads).blue());
    out(format!("[+] Threads:    {}", config.threads).blue());
    match scan_type {
        ScanType::Sqli => {
            out(format!("[+] Timeout:    {}s", config.sqli_timeout).blue());
            out(format!("[+] Threshold:  {}s", config.time_threshold).magenta());
        }
        ScanType::Xss => {
            out(format!(
                "[+] Page load:  {}s (+{}s dialog wait)",
                config.page_load_timeout, config.dialog_wait
            )
            .blue());
            out(format!("[+] WebDriver:  {}", config.webdriver_url).magenta());
        }
        _ => out(format!("[+] Timeout:    {}s", config.timeout).blue()),
    }
    out(format!("[+] Output:     {}", config.output).blue());
    if let Some(proxy) = config.proxy_ref() {
        out(format!("[+] Proxy:      {}", proxy).yellow());
    }
    out(SEPARATOR.dimmed());
}

fn print_summary(report: &ScanReport) {
    out(format!(
        "[*] {} scan finished in {:.2}s: {} probe(s), {} failed",
        report.scan_type,
        report.duration,
        report.total_scanned,
        report.failed_count()
    )
    .bright_cyan()
    .bold());

    if report.total_found == 0 {
        out("[+] No vulnerabilities found.".green());
        return;
    }
    out(format!("[+] {} finding(s) discovered:", report.total_found).yellow());
    for (i, finding) in report.vulnerable_results().enumerate() {
        out(format!(
            "  #{} {} (evidence: {})",
            i + 1,
            finding.target_url,
            finding.evidence.as_deref().unwrap_or("")
        )
        .red());
    }
}

fn out(line: impl Display) {
    print!("{}\r\n", line);
    std::io::stdout().flush().ok();
}
