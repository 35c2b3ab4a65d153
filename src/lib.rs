//! CUFW - Clean UFW
//!
//! Removes ufw rules that admit traffic from anywhere, keeping only the rule
//! that protects SSH (22/tcp).
//!
//! # Architecture
//!
//! - [`core`] - Listing, parsing, classification, planning and deletion
//! - [`elevation`] - Running ufw with root rights (sudo, run0, pkexec)
//! - [`audit`] - JSON-lines log of every deletion
//! - [`validators`] - Checks on everything handed to an elevated command
//! - [`config`] - Settings file and environment overrides
//! - [`utils`] - XDG directories
//!
//! # Safety Features
//!
//! - Deletions in strictly descending rule order, so ufw's renumbering never
//!   shifts a rule still waiting in the plan
//! - Fresh listing for every family pass; nothing is cached between cycles
//! - Per-deletion confirmation unless `--yes`
//! - Dry-run mode that never calls ufw's delete
//! - SHA-256 of the listing recorded with every audited deletion

// Allow pedantic clippy warnings that are not worth fixing for this codebase
#![allow(clippy::must_use_candidate)]
#![allow(clippy::return_self_not_must_use)]
#![allow(clippy::uninlined_format_args)]
#![allow(clippy::missing_errors_doc)]

pub mod audit;
pub mod config;
pub mod core;
pub mod elevation;
pub mod utils;
pub mod validators;

/// Location of the ufw binary, overridable at build time by packagers
pub const SYSTEM_UFW_PATH: &str = match option_env!("CUFW_SYSTEM_UFW_PATH") {
    Some(path) => path,
    None => "/usr/sbin/ufw",
};

// Re-export commonly used types
pub use crate::core::cycle::{CleanupConfig, CleanupController, CleanupSummary, WatchMode};
pub use crate::core::error::{Error, Result};
pub use crate::core::rule::{Family, Rule};
pub use crate::core::source::{RuleSource, UfwCli};
