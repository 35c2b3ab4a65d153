/// Audit logging for rule deletions
///
/// Every live deletion attempt and the outcome of each cleanup run are
/// appended as JSON lines, so an operator can reconstruct which rules cufw
/// removed and from which listing. The log is never read back by cufw
/// itself.
use crate::core::cycle::CleanupSummary;
use crate::core::planner::{DeletionPlan, PlannedDeletion};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tokio::io::AsyncWriteExt;
use uuid::Uuid;

/// Types of auditable events
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventType {
    DeleteRule,
    CleanupFinished,
}

/// A single audit log entry
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuditEvent {
    /// When the event occurred (UTC)
    pub timestamp: chrono::DateTime<chrono::Utc>,

    /// Identifies all events of one cufw invocation
    pub run_id: Uuid,

    /// Type of event
    pub event_type: EventType,

    /// Whether the operation succeeded
    pub success: bool,

    /// Additional structured data about the event
    pub details: serde_json::Value,

    /// Error message if operation failed
    pub error: Option<String>,
}

impl AuditEvent {
    /// Creates a new audit event
    pub fn new(
        run_id: Uuid,
        event_type: EventType,
        success: bool,
        details: serde_json::Value,
        error: Option<String>,
    ) -> Self {
        Self {
            timestamp: chrono::Utc::now(),
            run_id,
            event_type,
            success,
            details,
            error,
        }
    }
}

/// Audit log writer
#[derive(Debug, Clone)]
pub struct AuditLog {
    log_path: PathBuf,
    run_id: Uuid,
}

impl AuditLog {
    /// Creates an audit log in the user's state directory
    ///
    /// # Errors
    ///
    /// Returns `Err` if state directory cannot be determined or created
    pub fn new() -> std::io::Result<Self> {
        crate::utils::ensure_dirs()?;
        let mut log_path = crate::utils::get_state_dir().ok_or_else(|| {
            std::io::Error::new(std::io::ErrorKind::NotFound, "State directory not found")
        })?;
        log_path.push("audit.log");

        Ok(Self::at(log_path))
    }

    /// Creates an audit log writing to `path`
    pub fn at(path: impl Into<PathBuf>) -> Self {
        Self {
            log_path: path.into(),
            run_id: Uuid::new_v4(),
        }
    }

    pub fn run_id(&self) -> Uuid {
        self.run_id
    }

    /// Returns the path to the audit log file
    pub fn path(&self) -> &Path {
        &self.log_path
    }

    /// Appends an event to the audit log
    ///
    /// Events are written as JSON-lines format (one JSON object per line)
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be opened or written
    pub async fn log(&self, event: AuditEvent) -> std::io::Result<()> {
        let json = serde_json::to_string(&event)?;

        let mut options = tokio::fs::OpenOptions::new();
        options.create(true).append(true);
        #[cfg(unix)]
        options.mode(0o600);

        let mut file = options.open(&self.log_path).await?;
        file.write_all(json.as_bytes()).await?;
        file.write_all(b"\n").await?;
        file.sync_all().await?;

        Ok(())
    }

    /// Reads the most recent events from the log, newest first
    ///
    /// # Errors
    ///
    /// Returns `Err` if file cannot be read
    pub async fn read_recent(&self, count: usize) -> std::io::Result<Vec<AuditEvent>> {
        let content = tokio::fs::read_to_string(&self.log_path).await?;

        let events: Vec<AuditEvent> = content
            .lines()
            .rev()
            .take(count)
            .filter_map(|line| serde_json::from_str(line).ok())
            .collect();

        Ok(events)
    }

    async fn record(
        &self,
        event_type: EventType,
        success: bool,
        details: serde_json::Value,
        error: Option<String>,
    ) {
        let event = AuditEvent::new(self.run_id, event_type, success, details, error);
        if let Err(e) = self.log(event).await {
            tracing::warn!("Failed to write audit log {:?}: {}", self.log_path, e);
        }
    }
}

/// Logs one live deletion attempt
pub async fn log_delete(
    audit: &AuditLog,
    plan: &DeletionPlan,
    entry: &PlannedDeletion,
    error: Option<String>,
) {
    audit
        .record(
            EventType::DeleteRule,
            error.is_none(),
            serde_json::json!({
                "family": plan.family,
                "number": entry.number,
                "rule": entry.raw_text,
                "listing_sha256": plan.listing_checksum,
            }),
            error,
        )
        .await;
}

/// Logs the outcome of a complete cleanup run
pub async fn log_cleanup_finished(audit: &AuditLog, summary: &CleanupSummary) {
    let error = (!summary.warnings.is_empty()).then(|| {
        summary
            .warnings
            .iter()
            .map(ToString::to_string)
            .collect::<Vec<_>>()
            .join("; ")
    });
    audit
        .record(
            EventType::CleanupFinished,
            summary.is_clean(),
            serde_json::json!({
                "cycles_run": summary.cycles_run,
                "rules_removed": summary.rules_removed,
                "families_processed": summary.families_processed,
                "deletion_failures": summary.deletion_failures.len(),
            }),
            error,
        )
        .await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rule::Family;

    fn sample_plan() -> DeletionPlan {
        DeletionPlan {
            family: Family::Ipv4,
            entries: vec![PlannedDeletion {
                number: 4,
                raw_text: "[ 4] 8080/tcp ALLOW IN Anywhere".to_string(),
            }],
            listing_checksum: "abc123".to_string(),
        }
    }

    #[test]
    fn test_event_serialization() {
        let event = AuditEvent::new(
            Uuid::nil(),
            EventType::DeleteRule,
            false,
            serde_json::json!({"number": 2}),
            Some("ufw exited with status 1".to_string()),
        );

        let json = serde_json::to_string(&event).unwrap();
        assert!(json.contains("delete_rule"));
        assert!(json.contains("ufw exited with status 1"));
    }

    #[test]
    fn test_event_deserialization() {
        let json = r#"{"timestamp":"2024-01-01T00:00:00Z","run_id":"00000000-0000-0000-0000-000000000000","event_type":"cleanup_finished","success":true,"details":{},"error":null}"#;
        let event: AuditEvent = serde_json::from_str(json).unwrap();

        assert!(event.success);
        assert_eq!(event.event_type, EventType::CleanupFinished);
    }

    #[tokio::test]
    async fn test_log_delete_appends_line() {
        let dir = tempfile::tempdir().unwrap();
        let audit = AuditLog::at(dir.path().join("audit.log"));
        let plan = sample_plan();

        log_delete(&audit, &plan, &plan.entries[0], None).await;
        log_delete(
            &audit,
            &plan,
            &plan.entries[0],
            Some("declined".to_string()),
        )
        .await;

        let events = audit.read_recent(10).await.unwrap();
        assert_eq!(events.len(), 2);
        // Newest first
        assert!(!events[0].success);
        assert!(events[1].success);
        assert_eq!(events[1].details["number"], 4);
        assert_eq!(events[1].details["family"], "ipv4");
        assert_eq!(events[1].details["listing_sha256"], "abc123");
        assert_eq!(events[0].run_id, events[1].run_id);
    }

    #[tokio::test]
    async fn test_unwritable_log_does_not_panic() {
        let audit = AuditLog::at("/nonexistent/cufw-test/audit.log");
        let plan = sample_plan();
        log_delete(&audit, &plan, &plan.entries[0], None).await;
        assert!(audit.read_recent(1).await.is_err());
    }
}
