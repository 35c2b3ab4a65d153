use crate::core::rule::Family;
use serde::Serialize;
use thiserror::Error;

/// Top-level error type for cufw
#[derive(Debug, Error)]
pub enum Error {
    /// I/O operation failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON serialization/deserialization failed
    #[error("JSON error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// Talking to ufw failed
    #[error("ufw error: {0}")]
    Adapter(#[from] AdapterError),

    /// Privilege escalation unavailable
    #[error("Elevation error: {0}")]
    Elevation(#[from] crate::elevation::ElevationError),

    /// Invalid configuration or command-line input
    #[error("Configuration error: {0}")]
    Config(String),
}

/// Failures of the external ufw tool
#[derive(Debug, Error)]
pub enum AdapterError {
    /// ufw (or the elevation wrapper) could not be started
    #[error("failed to run {program}: {source}")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// ufw ran but reported failure
    #[error("ufw exited with {}: {}", describe_exit(.exit_code), .stderr.trim())]
    NonZeroExit {
        exit_code: Option<i32>,
        stderr: String,
    },

    /// ufw produced output that is not valid UTF-8
    #[error("ufw produced unreadable output")]
    InvalidOutput,

    /// The operator refused the deletion
    #[error("deletion of {family} rule #{number} declined")]
    Declined { family: Family, number: u32 },

    /// An argument failed validation before reaching an elevated command
    #[error("refusing to run ufw: {0}")]
    InvalidArgument(String),
}

#[allow(clippy::ref_option)]
fn describe_exit(exit_code: &Option<i32>) -> String {
    exit_code.map_or_else(|| "signal".to_string(), |c| format!("status {c}"))
}

impl AdapterError {
    /// Raw diagnostic text suitable for [`UfwErrorPattern::match_error`]
    pub fn diagnostic(&self) -> String {
        match self {
            AdapterError::NonZeroExit { stderr, .. } => stderr.clone(),
            other => other.to_string(),
        }
    }
}

/// The listing as a whole could not be understood
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ParseError {
    #[error("ufw returned an empty listing")]
    Empty,

    #[error("output does not look like a ufw rule listing")]
    Unrecognized,

    #[error("rule numbers out of order: #{found} follows #{previous}")]
    OutOfOrder { previous: u32, found: u32 },
}

/// One planned deletion that did not succeed
#[derive(Debug, Clone, Serialize)]
pub struct DeletionFailure {
    pub family: Family,
    pub number: u32,
    /// Listing line of the rule that was targeted
    pub rule: String,
    pub error: String,
    /// The operator declined rather than ufw failing
    pub declined: bool,
}

/// Represents a translated error with helpful context
#[derive(Debug, Clone)]
pub struct ErrorTranslation {
    pub user_message: String,
    pub suggestions: Vec<String>,
}

impl ErrorTranslation {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            user_message: message.into(),
            suggestions: Vec::new(),
        }
    }

    pub fn with_suggestion(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }
}

/// Database of ufw error patterns and their translations
pub struct UfwErrorPattern;

impl UfwErrorPattern {
    /// Matches an error message against known patterns and returns a user-friendly translation.
    pub fn match_error(msg: &str) -> ErrorTranslation {
        let lower = msg.to_lowercase();

        if lower.contains("need to be root") || lower.contains("permission denied") {
            return ErrorTranslation::new("Insufficient permissions to modify firewall rules")
                .with_suggestion("Run cufw as root, or let it elevate with sudo/run0/pkexec")
                .with_suggestion("Force a method with CUFW_ELEVATION_METHOD=sudo");
        }

        if lower.contains("no such file") || lower.contains("command not found") {
            return ErrorTranslation::new("ufw is not installed or not found")
                .with_suggestion("Install ufw: sudo apt install ufw  (Debian/Ubuntu)")
                .with_suggestion("Or: sudo dnf install ufw  (Fedora)")
                .with_suggestion("Or point cufw at it with --ufw /path/to/ufw");
        }

        if lower.contains("could not delete non-existent rule")
            || lower.contains("could not find rule")
        {
            return ErrorTranslation::new("The rule number no longer exists")
                .with_suggestion("Another process changed the firewall during cleanup")
                .with_suggestion("Run cufw again; it re-reads the listing every cycle");
        }

        if lower.contains("iptables") || lower.contains("ip6tables") {
            return ErrorTranslation::new("ufw could not talk to the kernel firewall")
                .with_suggestion("Check ufw's backend: sudo ufw status verbose")
                .with_suggestion("Check kernel modules: lsmod | grep -E 'nf_tables|ip_tables'");
        }

        if lower.contains("empty listing") || lower.contains("does not look like") {
            return ErrorTranslation::new("ufw did not return a rule listing")
                .with_suggestion("Verify ufw works: sudo ufw status numbered");
        }

        if lower.contains("declined") {
            return ErrorTranslation::new("Deletion skipped by operator")
                .with_suggestion("Use --yes to delete without prompting");
        }

        ErrorTranslation::new(format!("Firewall error: {msg}"))
            .with_suggestion("Verify ufw is working: sudo ufw status numbered")
    }
}

pub type Result<T> = std::result::Result<T, Error>;
