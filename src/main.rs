mod classifier;
mod config;
mod cycle;
mod email;
mod error;
mod ftp;
mod local;
mod notify;
mod report;
mod snapshot;
mod store;
#[cfg(test)]
mod testing;
mod transport;
mod types;
mod walker;

use chrono::Local;
use clap::Parser;
use colored::Colorize;
use config::{FtpCredentials, Source};
use cycle::{CycleOutcome, Intervals, Monitor};
use email::EmailConfig;
use error::{Error, Result};
use ftp::FtpConnector;
use local::LocalConnector;
use log::error;
use notify::Reporter;
use std::fs::OpenOptions;
use std::io::IsTerminal;
use std::path::{Path, PathBuf};
use std::time::Duration;
use store::SnapshotStore;
use transport::Connector;
use walker::{Filters, Walker};

#[derive(Parser, Debug)]
#[command(version, about, long_about = None)]
struct Args {
    /// ftp://host[:port] or a local directory holding the drop
    #[arg(long, short = 's', required_unless_present_any = ["list", "test_email"])]
    source: Option<String>,

    /// Remote folder to watch
    #[arg(long, short = 'r', default_value = "/")]
    root: String,

    /// Regex a file name must match to be tracked
    #[arg(long, short = 'm', default_value = r"(?:\.mxf|\.mp4)$")]
    file_mask: String,

    /// Regex on the full folder path; matching folders are skipped entirely
    #[arg(long, short = 'x')]
    exclude: Option<String>,

    /// Minutes between scans after a successful scan
    #[arg(long, default_value_t = 30)]
    interval_minutes: u64,

    /// Minutes before retrying after a failed scan
    #[arg(long, default_value_t = 1)]
    retry_minutes: u64,

    /// Snapshot file carried between runs
    #[arg(long, default_value = "drop_watch_snapshot.txt")]
    snapshot: PathBuf,

    /// Append log output to this file instead of stderr
    #[arg(long)]
    log_file: Option<PathBuf>,

    /// Directory holding .ftp_config and .email_config
    #[arg(long, default_value = ".")]
    config_dir: PathBuf,

    /// Run a single scan and exit (non-zero if it failed)
    #[arg(long)]
    once: bool,

    /// Print the tracked files and exit
    #[arg(long, short = 'l')]
    list: bool,

    /// Test email configuration by sending a test email
    #[arg(long)]
    test_email: bool,

    /// Do not show the directory being scanned
    #[arg(long)]
    no_progress: bool,
}

fn main() {
    let args = Args::parse();

    if let Err(e) = init_logging(args.log_file.as_deref()) {
        eprintln!("Error: cannot open log file: {e}");
        std::process::exit(1);
    }

    if args.test_email {
        test_email_config(&args.config_dir);
        return;
    }

    if args.list {
        report::print_snapshot(&SnapshotStore::new(&args.snapshot).load());
        return;
    }

    match run(&args) {
        Ok(code) => std::process::exit(code),
        Err(e) => {
            error!("{e}");
            eprintln!("{} {e}", "Error:".red());
            std::process::exit(1);
        }
    }
}

fn init_logging(log_file: Option<&Path>) -> std::io::Result<()> {
    let mut builder =
        env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info"));
    if let Some(path) = log_file {
        let file = OpenOptions::new().create(true).append(true).open(path)?;
        builder.target(env_logger::Target::Pipe(Box::new(file)));
    }
    builder.init();
    Ok(())
}

fn run(args: &Args) -> Result<i32> {
    let filters = Filters::new(&args.file_mask, args.exclude.as_deref())?;
    let source = Source::parse(
        args.source
            .as_deref()
            .ok_or_else(|| Error::Config("--source is required".to_string()))?,
    )?;

    let store = SnapshotStore::new(&args.snapshot);
    let _lock = store.lock()?;

    let show_progress = !args.no_progress && std::io::stdout().is_terminal();
    let walker = Walker::new(filters, show_progress);
    let intervals = Intervals {
        success: Duration::from_secs(args.interval_minutes * 60),
        failure: Duration::from_secs(args.retry_minutes * 60),
    };
    // With a log file the console would otherwise stay silent
    let mut reporter = Reporter::new(args.log_file.is_some(), EmailConfig::load(&args.config_dir));

    match source {
        Source::Ftp { addr } => {
            let connector = FtpConnector::new(addr, FtpCredentials::load(&args.config_dir));
            watch(connector, args, walker, store, intervals, &mut reporter)
        }
        Source::Local(path) => watch(
            LocalConnector::new(path),
            args,
            walker,
            store,
            intervals,
            &mut reporter,
        ),
    }
}

fn watch<C: Connector>(
    connector: C,
    args: &Args,
    walker: Walker,
    store: SnapshotStore,
    intervals: Intervals,
    reporter: &mut Reporter,
) -> Result<i32> {
    println!(
        "{}",
        format!(
            "=== Watching {}{} since {} ===",
            connector.describe(),
            args.root,
            Local::now().format("%Y-%m-%d %H:%M")
        )
        .cyan()
    );

    let mut monitor = Monitor::new(connector, args.root.as_str(), walker, store, intervals);

    if args.once {
        let outcome = monitor.run_once(reporter)?;
        return Ok(match outcome {
            CycleOutcome::Reconciled { stats, deleted } => {
                println!(
                    "{} {} tracked file(s): {} new, {} changed, {} deleted",
                    "Scan complete.".green(),
                    monitor.snapshot().len(),
                    stats.new,
                    stats.changed,
                    deleted
                );
                0
            }
            CycleOutcome::Failed(e) => {
                eprintln!("{} {e}", "Scan failed:".red());
                1
            }
        });
    }

    monitor.run(reporter)?;
    Ok(0)
}

fn test_email_config(config_dir: &Path) {
    println!("Testing email configuration...");

    let config_path = config_dir.join(config::EMAIL_CONFIG_FILE);
    println!("Looking for config at: {}", config_path.display());

    let config = match EmailConfig::load(config_dir) {
        Some(cfg) => {
            println!("✓ Email config loaded successfully");
            println!("  SMTP Server: {}", cfg.smtp_server);
            println!("  SMTP User: {}", cfg.smtp_user);
            println!("  Recipient: {}", cfg.recipient);
            cfg
        }
        None => {
            eprintln!("✗ Failed to load email config from {}", config_path.display());
            eprintln!("  Expected format:");
            eprintln!("    SMTP_SERVER=smtp.gmail.com   (optional)");
            eprintln!("    SMTP_USER=your-email@gmail.com");
            eprintln!("    SMTP_PASS=your-app-password");
            eprintln!("    RECIPIENT_EMAIL=recipient@example.com");
            eprintln!("    SUBJECT=[drop_watch] changes detected   (optional)");
            std::process::exit(1);
        }
    };

    println!("\nSending test email...");
    let subject = "[drop_watch] Test Email";
    let body = format!(
        "This is a test email from drop_watch.\n\nSent at: {}\n\nIf you received this, change notifications are working correctly!",
        Local::now().format("%Y-%m-%d %H:%M:%S")
    );

    match email::send_alert(subject, &body, &config) {
        Ok(()) => println!("\nTest complete. Check your inbox at: {}", config.recipient),
        Err(e) => {
            eprintln!("{} {e}", "✗".red());
            std::process::exit(1);
        }
    }
}
