//! Cleanup cycle controller
//!
//! Drives the per-family pipeline (list, parse, classify, plan, execute) and
//! the watch loop:
//!
//! ```text
//! Idle -> Running(IPv4) -> Running(IPv6) -> Evaluating -> Sleep -> Running(IPv4) ...
//!                                                    \-> Done
//! ```
//!
//! A cycle that removed nothing ends watch mode. Listing and parse failures
//! abort only the affected family's pass and are reported as warnings.

use crate::audit::{self, AuditLog};
use crate::core::error::{AdapterError, DeletionFailure, ParseError};
use crate::core::executor::{self, ExecutionMode, ExecutionReport};
use crate::core::parser::parse_listing;
use crate::core::planner::plan_deletions;
use crate::core::policy::classify;
use crate::core::rule::Family;
use crate::core::source::RuleSource;
use serde::Serialize;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Default floor for immediate re-checks
pub const DEFAULT_MIN_RECHECK_INTERVAL: Duration = Duration::from_millis(250);

/// Default number of consecutive aborted cycles tolerated in watch mode
pub const DEFAULT_WATCH_RETRY_LIMIT: u32 = 3;

/// Whether and how often cycles repeat
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum WatchMode {
    /// Exactly one cycle
    #[default]
    Off,
    /// Re-check as soon as a cycle finishes (subject to the minimum interval)
    Immediate,
    /// Sleep this long between cycles
    Interval(Duration),
}

impl WatchMode {
    /// Maps `--watch [SECONDS]`: absent is off, missing or zero seconds is
    /// immediate.
    pub fn from_seconds(seconds: Option<Option<u64>>) -> Self {
        match seconds {
            None => WatchMode::Off,
            Some(None | Some(0)) => WatchMode::Immediate,
            Some(Some(secs)) => WatchMode::Interval(Duration::from_secs(secs)),
        }
    }

    pub const fn is_on(self) -> bool {
        !matches!(self, WatchMode::Off)
    }
}

/// Settings the controller runs with, fixed for the whole run
#[derive(Debug, Clone)]
pub struct CleanupConfig {
    pub dry_run: bool,
    /// Suppress per-deletion confirmation
    pub non_interactive: bool,
    pub watch: WatchMode,
    /// Pause used by [`WatchMode::Immediate`]; zero loops without pausing
    pub min_recheck_interval: Duration,
    /// Consecutive cycles with an aborted family pass before watch gives up
    pub watch_retry_limit: u32,
}

impl Default for CleanupConfig {
    fn default() -> Self {
        Self {
            dry_run: false,
            non_interactive: false,
            watch: WatchMode::Off,
            min_recheck_interval: DEFAULT_MIN_RECHECK_INTERVAL,
            watch_retry_limit: DEFAULT_WATCH_RETRY_LIMIT,
        }
    }
}

impl CleanupConfig {
    pub const fn execution_mode(&self) -> ExecutionMode {
        if self.dry_run {
            ExecutionMode::DryRun
        } else {
            ExecutionMode::Live {
                confirm: !self.non_interactive,
            }
        }
    }

    /// Pause between two watch cycles
    pub const fn sleep_interval(&self) -> Duration {
        match self.watch {
            WatchMode::Off => Duration::ZERO,
            WatchMode::Immediate => self.min_recheck_interval,
            WatchMode::Interval(interval) => interval,
        }
    }
}

/// Controller states
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleState {
    Idle,
    Running(Family),
    Evaluating,
    Sleep,
    Done,
}

impl std::fmt::Display for CycleState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            CycleState::Idle => write!(f, "Idle"),
            CycleState::Running(family) => write!(f, "Running({family})"),
            CycleState::Evaluating => write!(f, "Evaluating"),
            CycleState::Sleep => write!(f, "Sleep"),
            CycleState::Done => write!(f, "Done"),
        }
    }
}

/// Result of one family's pass within a cycle
#[derive(Debug, Clone)]
pub enum FamilyOutcome {
    Completed(ExecutionReport),
    /// Listing or parsing failed; nothing was planned for this family
    Aborted {
        family: Family,
        error: String,
        /// Raw text for [`crate::core::error::UfwErrorPattern::match_error`]
        diagnostic: String,
    },
}

impl FamilyOutcome {
    pub fn family(&self) -> Family {
        match self {
            FamilyOutcome::Completed(report) => report.family,
            FamilyOutcome::Aborted { family, .. } => *family,
        }
    }

    pub fn removed(&self) -> usize {
        match self {
            FamilyOutcome::Completed(report) => report.removed,
            FamilyOutcome::Aborted { .. } => 0,
        }
    }

    pub fn is_aborted(&self) -> bool {
        matches!(self, FamilyOutcome::Aborted { .. })
    }

    fn from_adapter_error(family: Family, err: &AdapterError) -> Self {
        FamilyOutcome::Aborted {
            family,
            error: err.to_string(),
            diagnostic: err.diagnostic(),
        }
    }

    fn from_parse_error(family: Family, err: &ParseError) -> Self {
        FamilyOutcome::Aborted {
            family,
            error: err.to_string(),
            diagnostic: err.to_string(),
        }
    }
}

/// Everything that happened in one cycle
#[derive(Debug, Clone, Default)]
pub struct CycleReport {
    /// 1-based cycle index
    pub cycle: u32,
    pub families: Vec<FamilyOutcome>,
}

impl CycleReport {
    pub fn removed(&self) -> usize {
        self.families.iter().map(FamilyOutcome::removed).sum()
    }

    pub fn has_aborted(&self) -> bool {
        self.families.iter().any(FamilyOutcome::is_aborted)
    }
}

/// A family pass that could not run, as surfaced to the caller
#[derive(Debug, Clone, Serialize)]
pub struct CycleWarning {
    pub cycle: u32,
    pub family: Family,
    pub message: String,
    #[serde(skip)]
    pub diagnostic: String,
}

impl std::fmt::Display for CycleWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(
            f,
            "cycle {}: {} pass skipped: {}",
            self.cycle, self.family, self.message
        )
    }
}

/// Totals across all cycles of a run
#[derive(Debug, Clone, Default, Serialize)]
pub struct CleanupSummary {
    pub cycles_run: u32,
    /// Rules deleted, or in dry-run the rules that would have been
    pub rules_removed: usize,
    /// Family passes that completed (listing parsed and plan executed)
    pub families_processed: usize,
    pub dry_run: bool,
    pub deletion_failures: Vec<DeletionFailure>,
    pub warnings: Vec<CycleWarning>,
}

impl CleanupSummary {
    fn absorb(&mut self, report: CycleReport) {
        for outcome in report.families {
            match outcome {
                FamilyOutcome::Completed(execution) => {
                    self.families_processed += 1;
                    self.rules_removed += execution.removed;
                    self.deletion_failures.extend(execution.failures);
                }
                FamilyOutcome::Aborted {
                    family,
                    error,
                    diagnostic,
                } => self.warnings.push(CycleWarning {
                    cycle: report.cycle,
                    family,
                    message: error,
                    diagnostic,
                }),
            }
        }
    }

    /// Failures caused by ufw rather than by the operator declining
    pub fn failed_deletions(&self) -> impl Iterator<Item = &DeletionFailure> {
        self.deletion_failures.iter().filter(|f| !f.declined)
    }

    /// True when no deletion failed and no family pass was skipped
    pub fn is_clean(&self) -> bool {
        self.failed_deletions().next().is_none() && self.warnings.is_empty()
    }
}

/// Runs cleanup cycles against a [`RuleSource`]
pub struct CleanupController<S> {
    source: S,
    config: CleanupConfig,
    audit: Option<AuditLog>,
}

impl<S: RuleSource> CleanupController<S> {
    pub fn new(source: S, config: CleanupConfig) -> Self {
        Self {
            source,
            config,
            audit: None,
        }
    }

    /// Records live deletions and the final summary in `audit`
    pub fn with_audit(mut self, audit: AuditLog) -> Self {
        self.audit = Some(audit);
        self
    }

    pub fn source(&self) -> &S {
        &self.source
    }

    pub fn config(&self) -> &CleanupConfig {
        &self.config
    }

    /// One family's pipeline: list, parse, classify, plan, execute
    pub async fn run_family(&self, family: Family) -> FamilyOutcome {
        let listing = match self.source.list_rules(family).await {
            Ok(listing) => listing,
            Err(e) => {
                warn!("Could not list {family} rules: {e}");
                return FamilyOutcome::from_adapter_error(family, &e);
            }
        };

        let rules = match parse_listing(&listing, family) {
            Ok(rules) => rules,
            Err(e) => {
                warn!("Could not parse {family} listing: {e}");
                return FamilyOutcome::from_parse_error(family, &e);
            }
        };

        let classified = classify(&rules);
        for (rule, verdict) in &classified {
            debug!("{family} rule #{} is {verdict:?}: {}", rule.number, rule.raw_text);
        }

        let plan = plan_deletions(family, &classified, &listing);
        if plan.is_empty() {
            info!("No removable {family} rules");
        } else {
            info!(
                "{} removable {family} rule(s), deleting in order {:?}",
                plan.len(),
                plan.numbers()
            );
        }

        let report = executor::execute(
            &self.source,
            &plan,
            self.config.execution_mode(),
            self.audit.as_ref(),
        )
        .await;

        FamilyOutcome::Completed(report)
    }

    /// One full cycle over every family in fixed order
    pub async fn run_cycle(&self, cycle: u32) -> CycleReport {
        let mut report = CycleReport {
            cycle,
            families: Vec::with_capacity(Family::ORDER.len()),
        };
        for family in Family::ORDER {
            report.families.push(self.run_family(family).await);
        }
        report
    }

    /// Runs cycles until the state machine reaches [`CycleState::Done`]
    pub async fn run(&self) -> CleanupSummary {
        let mut summary = CleanupSummary {
            dry_run: self.config.dry_run,
            ..CleanupSummary::default()
        };
        let mut state = CycleState::Idle;
        let mut current = CycleReport::default();
        let mut aborted_streak: u32 = 0;

        loop {
            let next = match state {
                CycleState::Idle | CycleState::Sleep => {
                    if state == CycleState::Sleep {
                        let interval = self.config.sleep_interval();
                        if !interval.is_zero() {
                            debug!("Sleeping {interval:?} before next cycle");
                            tokio::time::sleep(interval).await;
                        }
                    }
                    summary.cycles_run += 1;
                    current = CycleReport {
                        cycle: summary.cycles_run,
                        families: Vec::with_capacity(Family::ORDER.len()),
                    };
                    info!(
                        "Cycle {} started at {}",
                        current.cycle,
                        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
                    );
                    CycleState::Running(Family::ORDER[0])
                }
                CycleState::Running(family) => {
                    current.families.push(self.run_family(family).await);
                    next_family(family).map_or(CycleState::Evaluating, CycleState::Running)
                }
                CycleState::Evaluating => {
                    let report = std::mem::take(&mut current);
                    let removed = report.removed();
                    let aborted = report.has_aborted();
                    info!("Cycle {} removed {removed} rule(s)", report.cycle);
                    summary.absorb(report);

                    self.evaluate(removed, aborted, &mut aborted_streak)
                }
                CycleState::Done => break,
            };

            debug!("{state} -> {next}");
            state = next;
        }

        if let Some(audit) = &self.audit
            && !self.config.dry_run
        {
            audit::log_cleanup_finished(audit, &summary).await;
        }

        summary
    }

    fn evaluate(&self, removed: usize, aborted: bool, aborted_streak: &mut u32) -> CycleState {
        if !self.config.watch.is_on() {
            return CycleState::Done;
        }

        if removed > 0 {
            *aborted_streak = 0;
            return CycleState::Sleep;
        }

        if aborted {
            *aborted_streak += 1;
            if *aborted_streak < self.config.watch_retry_limit {
                warn!(
                    "Cycle incomplete, retrying ({}/{})",
                    aborted_streak, self.config.watch_retry_limit
                );
                return CycleState::Sleep;
            }
            warn!("Giving up after {aborted_streak} incomplete cycle(s)");
        }

        CycleState::Done
    }
}

fn next_family(family: Family) -> Option<Family> {
    let idx = Family::ORDER.iter().position(|f| *f == family)?;
    Family::ORDER.get(idx + 1).copied()
}
