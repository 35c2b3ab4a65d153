//! Carrying out a deletion plan
//!
//! Entries are deleted strictly in plan order (highest number first) and each
//! call is awaited before the next is issued. A failed deletion is recorded
//! and the rest of the plan still runs: lower numbers are unaffected by a
//! rule that stayed in place.

use crate::audit::{self, AuditLog};
use crate::core::error::{AdapterError, DeletionFailure};
use crate::core::planner::DeletionPlan;
use crate::core::rule::Family;
use crate::core::source::RuleSource;
use serde::Serialize;
use tracing::{info, warn};

/// Whether deletions are performed or only reported
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ExecutionMode {
    /// Report what would be deleted, never call ufw's delete
    DryRun,
    /// Delete for real; `confirm` asks the operator before each rule
    Live { confirm: bool },
}

impl ExecutionMode {
    pub const fn is_dry_run(self) -> bool {
        matches!(self, ExecutionMode::DryRun)
    }
}

/// Outcome of executing one family's plan
#[derive(Debug, Clone, Serialize)]
pub struct ExecutionReport {
    pub family: Family,
    pub planned: usize,
    /// Rules deleted (or, in dry-run, that would have been)
    pub removed: usize,
    pub failures: Vec<DeletionFailure>,
    pub dry_run: bool,
}

impl ExecutionReport {
    fn new(family: Family, planned: usize, dry_run: bool) -> Self {
        Self {
            family,
            planned,
            removed: 0,
            failures: Vec::new(),
            dry_run,
        }
    }
}

/// Executes `plan` against `source`
///
/// Live attempts are written to `audit` when one is given.
pub async fn execute<S: RuleSource>(
    source: &S,
    plan: &DeletionPlan,
    mode: ExecutionMode,
    audit: Option<&AuditLog>,
) -> ExecutionReport {
    let mut report = ExecutionReport::new(plan.family, plan.len(), mode.is_dry_run());

    let confirm = match mode {
        ExecutionMode::DryRun => {
            for entry in &plan.entries {
                info!(
                    "[dry-run] Would delete {} rule #{}: {}",
                    plan.family, entry.number, entry.raw_text
                );
            }
            report.removed = plan.len();
            return report;
        }
        ExecutionMode::Live { confirm } => confirm,
    };

    for entry in &plan.entries {
        info!(
            "Deleting {} rule #{}: {}",
            plan.family, entry.number, entry.raw_text
        );

        let result = source.delete_rule(plan.family, entry.number, confirm).await;

        if let Some(audit) = audit {
            let error = result.as_ref().err().map(ToString::to_string);
            audit::log_delete(audit, plan, entry, error).await;
        }

        match result {
            Ok(()) => report.removed += 1,
            Err(e) => {
                let declined = matches!(e, AdapterError::Declined { .. });
                if declined {
                    info!("Kept {} rule #{}", plan.family, entry.number);
                } else {
                    warn!(
                        "Failed to delete {} rule #{}: {}",
                        plan.family, entry.number, e
                    );
                }
                report.failures.push(DeletionFailure {
                    family: plan.family,
                    number: entry.number,
                    rule: entry.raw_text.clone(),
                    error: e.diagnostic().trim().to_string(),
                    declined,
                });
            }
        }
    }

    report
}
