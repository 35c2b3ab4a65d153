//! CUFW - Clean UFW
//!
//! Deletes every ufw rule whose source is "Anywhere" (IPv4) or
//! "Anywhere (v6)" (IPv6), except the rule protecting SSH on 22/tcp.
//!
//! # Usage
//!
//! ```bash
//! cufw --dry-run          # Show what would be removed
//! cufw                    # Remove, asking before each rule
//! cufw --yes              # Remove without asking
//! cufw --yes --watch      # Re-check until nothing is left to remove
//! cufw --yes --watch 30   # Same, pausing 30s between cycles
//! cufw --dry-run --json   # Machine-readable summary
//! ```
//!
//! Logs go to stderr (`-v`, `-vv` or `RUST_LOG`); the summary goes to stdout.
//! The exit status is non-zero when a deletion failed or a listing could not
//! be read.

use clap::Parser;
use cufw::audit::AuditLog;
use cufw::config::load_settings;
use cufw::core::cycle::{CleanupConfig, CleanupController, CleanupSummary, WatchMode};
use cufw::core::error::{Error, UfwErrorPattern};
use cufw::core::rule::Family;
use cufw::core::source::UfwCli;
use cufw::elevation::resolve_launcher;
use std::path::PathBuf;
use std::process::ExitCode;
use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

shadow_rs::shadow!(build);

#[derive(Parser)]
#[command(name = "cufw", version = build::CLAP_LONG_VERSION)]
#[command(about = "Remove ufw rules that allow traffic from anywhere, except SSH", long_about = None)]
struct Cli {
    /// Show what would be deleted without deleting anything
    #[arg(long)]
    dry_run: bool,

    /// Delete without asking for confirmation
    #[arg(short = 'y', long)]
    yes: bool,

    /// Repeat until a cycle removes nothing, pausing SECONDS between cycles
    #[arg(short, long, value_name = "SECONDS", num_args = 0..=1)]
    watch: Option<Option<u64>>,

    /// Print the summary as JSON
    #[arg(long)]
    json: bool,

    /// More log output (-v debug, -vv trace)
    #[arg(short, long, action = clap::ArgAction::Count)]
    verbose: u8,

    /// Path to the ufw binary
    #[arg(long, value_name = "PATH")]
    ufw: Option<String>,

    /// Settings file (default: ~/.config/cufw/config.json)
    #[arg(long, value_name = "PATH")]
    config: Option<PathBuf>,
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    init_logging(cli.verbose);

    let runtime = match tokio::runtime::Builder::new_current_thread()
        .enable_all()
        .build()
    {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("Error: failed to start runtime: {e}");
            return ExitCode::FAILURE;
        }
    };

    match runtime.block_on(run(cli)) {
        Ok(summary) if summary.is_clean() => ExitCode::SUCCESS,
        Ok(_) => ExitCode::FAILURE,
        Err(e) => {
            eprintln!("Error: {e}");
            if let Error::Adapter(adapter) = &e {
                for line in hint_lines(&adapter.diagnostic()) {
                    eprintln!("{line}");
                }
            }
            ExitCode::FAILURE
        }
    }
}

/// `-v` flags take precedence over `RUST_LOG`
fn init_logging(verbose: u8) {
    let filter = match verbose {
        0 => EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        1 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false)
        .init();
}

async fn run(cli: Cli) -> Result<CleanupSummary, Error> {
    debug!(
        "cufw {} ({}{}, built {})",
        build::PKG_VERSION,
        build::SHORT_COMMIT,
        if build::GIT_CLEAN { "" } else { "-dirty" },
        build::BUILD_TIME
    );

    let mut settings = load_settings(cli.config.as_deref()).await?;
    if let Some(ufw) = cli.ufw {
        settings.ufw_path = ufw;
    }

    let launcher = resolve_launcher()?;
    info!("Using {} (launcher: {launcher})", settings.ufw_path);

    let non_interactive = cli.yes || cli.dry_run;
    let mut source = UfwCli::new(settings.ufw_path.clone(), launcher)?;
    if !non_interactive {
        source = source.with_confirmation(Box::new(prompt_confirmation));
    }

    let config = CleanupConfig {
        dry_run: cli.dry_run,
        non_interactive,
        watch: WatchMode::from_seconds(cli.watch),
        min_recheck_interval: settings.min_recheck_interval(),
        watch_retry_limit: settings.watch_retry_limit,
    };

    let mut controller = CleanupController::new(source, config);
    if settings.audit_log && !cli.dry_run {
        match AuditLog::new() {
            Ok(audit) => {
                debug!("Audit log: {}", audit.path().display());
                controller = controller.with_audit(audit);
            }
            Err(e) => warn!("Audit log unavailable: {e}"),
        }
    }

    let summary = controller.run().await;

    if cli.json {
        println!("{}", serde_json::to_string_pretty(&summary)?);
    } else {
        print_summary(&summary);
    }

    Ok(summary)
}

/// Asks `[y/N]` with a single keypress; no terminal means no
fn prompt_confirmation(family: Family, number: u32) -> bool {
    use crossterm::event::{self, Event, KeyCode, KeyEventKind, KeyModifiers};
    use std::io::Write;
    use std::os::fd::AsFd;

    if !nix::unistd::isatty(std::io::stdin().as_fd()).unwrap_or(false) {
        warn!("No terminal to confirm deletion of {family} rule #{number}; use --yes");
        return false;
    }

    // Prompt on stderr so `--json` output stays clean
    eprint!("Delete {family} rule #{number}? [y/N] ");
    std::io::stderr().flush().ok();

    if let Err(e) = crossterm::terminal::enable_raw_mode() {
        warn!("Failed to enable raw mode: {e}");
        return false;
    }

    let answer = loop {
        match event::read() {
            Ok(Event::Key(key)) if key.kind == KeyEventKind::Press => {
                if key.code == KeyCode::Char('c') && key.modifiers.contains(KeyModifiers::CONTROL)
                {
                    let _ = crossterm::terminal::disable_raw_mode();
                    eprintln!();
                    std::process::exit(130);
                }
                break matches!(key.code, KeyCode::Char('y' | 'Y'));
            }
            Ok(_) => {}
            Err(_) => break false,
        }
    };

    // Always restore terminal to normal mode
    let _ = crossterm::terminal::disable_raw_mode();
    eprintln!("{}", if answer { "y" } else { "n" });
    answer
}

fn print_summary(summary: &CleanupSummary) {
    let verb = if summary.dry_run {
        "Would remove"
    } else {
        "Removed"
    };
    println!(
        "{verb} {} rule(s) in {} cycle(s), {} family pass(es) completed",
        summary.rules_removed, summary.cycles_run, summary.families_processed
    );

    for failure in &summary.deletion_failures {
        if failure.declined {
            println!("  kept {} rule #{}: {}", failure.family, failure.number, failure.rule);
        } else {
            println!(
                "  ✗ {} rule #{} not deleted: {}",
                failure.family, failure.number, failure.error
            );
            for line in hint_lines(&failure.error) {
                println!("{line}");
            }
        }
    }

    for warning in &summary.warnings {
        println!("  ! {warning}");
        for line in hint_lines(&warning.diagnostic) {
            println!("{line}");
        }
    }
}

fn hint_lines(diagnostic: &str) -> Vec<String> {
    let translation = UfwErrorPattern::match_error(diagnostic);
    std::iter::once(format!("    {}", translation.user_message))
        .chain(translation.suggestions.iter().map(|s| format!("      - {s}")))
        .collect()
}
