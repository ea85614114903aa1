use anyhow::{Context, Result, bail};
use breach_core::data::{DEFAULT_DB_NAME, Database, FindingRecord, SessionRecord};
use breach_core::report::generate_summary;
use breach_core::scan::{ScanHooks, ScanOptions, ScanOutcome, ScanPhase, run_scan};
use breach_core::{Finding, ProbeConfig, Severity};
use breach_scanner::{EngineConfig, FetchEngine};
use chrono::DateTime;
use clap::ArgMatches;
use colored::{ColoredString, Colorize};
use indicatif::{ProgressBar, ProgressStyle};
use std::fs;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;
use tracing::Level;
use url::Url;

pub const DEFAULT_CONFIG_DIR: &str = "~/.config/breach/";

pub fn print_banner() {
    println!(
        "{}",
        r#"
   ___                 _
  / __\_ __ ___  __ _ ___| |__
 /__\// '__/ _ \/ _` / __| '_ \
/ \/  \ | |  __/ (_| \__ \ | | |
\_____/_|  \___|\__,_|___/_| |_|
"#
        .bright_red()
        .bold()
    );
    println!(
        "  {} {}\n",
        "attack surface discovery & injection probing".bright_white(),
        format!("v{}", env!("CARGO_PKG_VERSION")).dimmed()
    );
}

fn print_divider() {
    println!("{}", "═".repeat(60).bright_blue().bold());
}

fn print_prompt(msg: &str) -> Result<String> {
    print!("{} ", msg.bright_cyan().bold());
    io::stdout().flush()?;
    let mut response = String::new();
    io::stdin().read_line(&mut response)?;
    Ok(response.trim().to_lowercase())
}

/// Parse a scan target, adding http:// when the scheme is missing.
pub fn parse_target(raw: &str) -> Result<String> {
    let raw = raw.trim();
    let candidate = if raw.contains("://") {
        Url::parse(raw)
    } else {
        Url::parse(&format!("http://{}", raw))
    }
    .with_context(|| format!("'{}' is not a valid URL", raw))?;

    if !matches!(candidate.scheme(), "http" | "https") {
        bail!("unsupported scheme '{}' in {}", candidate.scheme(), raw);
    }
    if candidate.host_str().is_none_or(str::is_empty) {
        bail!("'{}' has no host", raw);
    }

    Ok(candidate.to_string())
}

/// The path portion of a URL, for compact progress messages.
pub fn describe_path(url: &str) -> String {
    match Url::parse(url) {
        Ok(parsed) => match parsed.query() {
            Some(query) => format!("{}?{}", parsed.path(), query),
            None => parsed.path().to_string(),
        },
        Err(_) => url.to_string(),
    }
}

pub fn log_level(verbose: bool) -> Level {
    if verbose { Level::DEBUG } else { Level::WARN }
}

fn init_tracing(verbose: bool) {
    // a second init (e.g. in tests) is harmless
    let _ = tracing_subscriber::fmt()
        .with_max_level(log_level(verbose))
        .with_target(false)
        .with_writer(io::stderr)
        .try_init();
}

fn expand_path(path: &str) -> PathBuf {
    PathBuf::from(shellexpand::tilde(path).as_ref())
}

/// Assemble scan options from already-validated CLI values.
pub fn build_scan_options(
    target: String,
    max_depth: usize,
    report_path: PathBuf,
    db_path: Option<PathBuf>,
    delay_threshold_ms: u64,
) -> ScanOptions {
    let mut options = ScanOptions::new(target);
    options.max_depth = max_depth;
    options.report_path = report_path;
    options.db_path = db_path;
    options.probe = ProbeConfig {
        delay_threshold: Duration::from_millis(delay_threshold_ms),
        ..ProbeConfig::default()
    };
    options
}

/// Create the config directory and its history database. With `force` an
/// existing database is deleted first; otherwise it is kept as is.
pub fn initialize_database(config_dir: &Path, force: bool) -> Result<PathBuf> {
    fs::create_dir_all(config_dir)
        .with_context(|| format!("failed to create {}", config_dir.display()))?;

    let db_path = config_dir.join(DEFAULT_DB_NAME);
    if force && Database::exists(&db_path) {
        fs::remove_file(&db_path)
            .with_context(|| format!("failed to remove {}", db_path.display()))?;
    }

    Database::new(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;
    Ok(db_path)
}

pub fn handle_init(args: &ArgMatches) -> Result<()> {
    print_divider();
    println!("{}", "  BREACH INITIALIZATION".bright_white().bold());
    print_divider();
    println!();

    let config_dir = expand_path(
        args.get_one::<String>("PATH")
            .map(String::as_str)
            .unwrap_or(DEFAULT_CONFIG_DIR),
    );
    let mut force = args.get_flag("force");
    let db_path = config_dir.join(DEFAULT_DB_NAME);

    println!("{} Parsed arguments", "✓".green().bold());
    println!(
        "{} Target: {}",
        "→".blue(),
        config_dir.display().to_string().bright_white()
    );
    println!();

    if Database::exists(&db_path) && !force {
        println!("{}", "⚠ WARNING".yellow().bold());
        println!("Database already exists at:");
        println!(
            "  {} {}",
            "•".yellow(),
            db_path.display().to_string().bright_white()
        );
        println!();

        let response = print_prompt("Would you like to overwrite it? [y/N]:")?;
        println!();

        if response == "y" || response == "yes" {
            force = true;
        } else {
            println!("{} Keeping existing database", "→".blue());
            println!();
        }
    }

    if force && Database::exists(&db_path) {
        println!("{} Deleting existing database", "→".yellow().bold());
    }

    println!("{} Creating database...", "→".blue());
    let db_path = initialize_database(&config_dir, force)?;

    println!();
    print_divider();
    println!("{}", "  INITIALIZATION COMPLETE".green().bold());
    print_divider();
    println!();
    println!(
        "{} Config directory: {}",
        "✓".green().bold(),
        config_dir.display().to_string().bright_white()
    );
    println!(
        "{} Database: {}",
        "✓".green().bold(),
        db_path.display().to_string().bright_white()
    );
    println!();
    Ok(())
}

fn severity_label(severity: Severity) -> ColoredString {
    match severity {
        Severity::Critical => severity.as_str().bright_red().bold(),
        Severity::High => severity.as_str().red().bold(),
        Severity::Medium => severity.as_str().yellow().bold(),
    }
}

/// One console line per finding, printed as soon as it is recorded.
pub fn format_finding_line(finding: &Finding) -> String {
    format!(
        "{} [{}] {} {} {} {}",
        "⚑".red().bold(),
        severity_label(finding.severity()),
        finding.kind().label().bright_white().bold(),
        finding.endpoint().cyan(),
        "param:".dimmed(),
        finding.parameter().bright_white()
    )
}

fn spinner() -> Result<ProgressBar> {
    let spinner = ProgressBar::new_spinner();
    spinner.set_style(
        ProgressStyle::default_spinner()
            .tick_chars("⠁⠂⠄⡀⢀⠠⠐⠈ ")
            .template("{spinner:.cyan} {msg}")?,
    );
    spinner.enable_steady_tick(Duration::from_millis(100));
    Ok(spinner)
}

fn scan_hooks(spinner: &ProgressBar) -> ScanHooks {
    let page_spinner = spinner.clone();
    let phase_spinner = spinner.clone();
    let finding_spinner = spinner.clone();

    ScanHooks {
        on_page: Some(Arc::new(move |count: usize, url: String| {
            page_spinner.set_message(format!("Crawling [{}] {}", count, describe_path(&url)));
        })),
        on_phase: Some(Arc::new(move |phase: ScanPhase| {
            let message = match phase {
                ScanPhase::Crawling => "Crawling target...",
                ScanPhase::Probing => "Probing discovered inputs...",
                ScanPhase::Done => "Writing results...",
            };
            phase_spinner.set_message(message);
        })),
        on_finding: Some(Arc::new(move |finding: &Finding| {
            finding_spinner.println(format_finding_line(finding));
        })),
    }
}

async fn scan_with<E: FetchEngine>(engine: &E, options: &ScanOptions) -> Result<ScanOutcome> {
    let spinner = spinner()?;
    let outcome = run_scan(engine, options, &scan_hooks(&spinner)).await;
    spinner.finish_and_clear();
    Ok(outcome?)
}

fn print_outcome(outcome: &ScanOutcome) {
    println!();
    print!("{}", generate_summary(&outcome.summary));
    println!();
    println!(
        "{} Report: {}",
        "✓".green().bold(),
        outcome.report_path.display().to_string().bright_white()
    );
    if let Some(ref session_id) = outcome.session_id {
        println!(
            "{} Session: {}",
            "✓".green().bold(),
            session_id.bright_white()
        );
    }
    println!();
}

pub async fn handle_scan(args: &ArgMatches) -> Result<()> {
    let verbose = args.get_flag("verbose");
    init_tracing(verbose);

    let raw_target = args
        .get_one::<String>("url")
        .context("a target URL is required")?;
    let target = parse_target(raw_target)?;
    let token = args.get_one::<String>("token").cloned();
    let max_depth = args.get_one::<usize>("depth").copied().unwrap_or(2);
    let timeout = args.get_one::<u64>("timeout").copied().unwrap_or(10);
    let delay_ms = args.get_one::<u64>("delay-threshold").copied().unwrap_or(2000);
    let report_path = expand_path(
        args.get_one::<String>("output")
            .map(String::as_str)
            .unwrap_or(breach_core::report::DEFAULT_REPORT_PATH),
    );

    // history is recorded only when asked for, or when `breach init` has run
    let db_path = match args.get_one::<String>("db") {
        Some(path) => Some(expand_path(path)),
        None => {
            let default = expand_path(DEFAULT_CONFIG_DIR).join(DEFAULT_DB_NAME);
            Database::exists(&default).then_some(default)
        }
    };

    println!("{} Target: {}", "→".blue(), target.bright_white());
    println!("{} Max depth: {}", "→".blue(), max_depth.to_string().cyan());
    println!("{} Timeout: {}s", "→".blue(), timeout.to_string().cyan());
    if token.as_deref().is_some_and(|t| !t.trim().is_empty()) {
        println!("{} Bearer token: supplied", "→".blue());
    }
    if let Some(ref path) = db_path {
        println!(
            "{} History: {}",
            "→".blue(),
            path.display().to_string().bright_white()
        );
    }
    println!();

    let engine_config = EngineConfig::default()
        .with_timeout(timeout)
        .with_bearer_token(token);
    let options = build_scan_options(target, max_depth, report_path, db_path, delay_ms);

    #[cfg(feature = "browser")]
    if args.get_flag("browser") {
        let engine = breach_scanner::BrowserEngine::launch(&engine_config)
            .await
            .context("failed to launch headless browser")?;
        let outcome = scan_with(&engine, &options).await?;
        print_outcome(&outcome);
        return Ok(());
    }

    let engine = breach_scanner::HttpEngine::new(&engine_config)
        .context("failed to build HTTP client")?;
    let outcome = scan_with(&engine, &options).await?;
    print_outcome(&outcome);
    Ok(())
}

fn format_timestamp(secs: i64) -> String {
    DateTime::from_timestamp(secs, 0)
        .map(|dt| dt.format("%Y-%m-%d %H:%M:%S").to_string())
        .unwrap_or_else(|| secs.to_string())
}

fn status_label(status: &str) -> ColoredString {
    match status {
        "completed" => status.green(),
        "failed" => status.red(),
        _ => status.yellow(),
    }
}

fn print_session(session: &SessionRecord) {
    println!(
        "{} {}  {}  {}",
        "•".blue(),
        session.id.bright_white(),
        format_timestamp(session.start_time).dimmed(),
        status_label(&session.status)
    );
    println!(
        "    {}  forms: {}  apis: {}  findings: {} ({} critical, {} high, {} medium)",
        session.target.cyan(),
        session.form_count,
        session.api_count,
        session.vuln_count,
        session.critical_count,
        session.high_count,
        session.medium_count
    );
}

fn print_finding_record(finding: &FindingRecord) {
    let severity = match Severity::parse(&finding.severity) {
        Some(severity) => severity_label(severity),
        None => finding.severity.normal(),
    };
    println!(
        "  [{}] {} {} {} {}",
        severity,
        finding.vulnerability.bright_white().bold(),
        finding.url.cyan(),
        "param:".dimmed(),
        finding.parameter
    );
    println!("        {}", finding.owasp_category.dimmed());
}

/// One-line severity breakdown, most severe first.
pub fn format_severity_counts(counts: &[(String, i64)]) -> String {
    let mut ordered: Vec<&(String, i64)> = counts.iter().collect();
    ordered.sort_by_key(|(severity, _)| Severity::parse(severity));

    ordered
        .into_iter()
        .map(|(severity, count)| format!("{}: {}", severity, count))
        .collect::<Vec<_>>()
        .join("  ")
}

pub fn handle_history(args: &ArgMatches) -> Result<()> {
    let db_path = expand_path(
        args.get_one::<String>("db")
            .map(String::as_str)
            .unwrap_or("~/.config/breach/breach.db"),
    );

    if !Database::exists(&db_path) {
        bail!(
            "no scan history at {} (run `breach init` first)",
            db_path.display()
        );
    }
    let db = Database::new(&db_path)
        .with_context(|| format!("failed to open database {}", db_path.display()))?;

    print_divider();
    println!("{}", "  SCAN HISTORY".bright_white().bold());
    print_divider();
    println!();

    match args.get_one::<String>("session") {
        Some(session_id) => {
            let session = db
                .get_session(session_id)?
                .with_context(|| format!("no session with id {}", session_id))?;
            print_session(&session);
            println!();

            let findings = db.get_findings_by_session(session_id)?;
            if findings.is_empty() {
                println!("{} No findings recorded", "✓".green().bold());
            } else {
                let counts = db.get_findings_count_by_severity(session_id)?;
                println!("{}", format_severity_counts(&counts));
                println!();
            }
            for finding in &findings {
                print_finding_record(finding);
            }
        }
        None => {
            let sessions = db.list_sessions()?;
            if sessions.is_empty() {
                println!("{} No scans recorded yet", "→".blue());
            }
            for session in &sessions {
                print_session(session);
            }
        }
    }

    println!();
    Ok(())
}
