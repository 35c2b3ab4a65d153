//! Core rule-cleanup engine
//!
//! Everything between "ufw printed a listing" and "these rules were deleted":
//!
//! - [`source`]: The [`source::RuleSource`] seam and the ufw CLI implementation
//! - [`parser`]: `ufw status numbered` text to [`rule::Rule`] records
//! - [`rule`]: Structured rule types (family, ports, source, action)
//! - [`policy`]: The "anywhere, except SSH" removal policy
//! - [`planner`]: Descending deletion order that survives renumbering
//! - [`executor`]: Dry-run and live execution of a plan
//! - [`cycle`]: Per-family pipeline and the watch-mode state machine
//! - [`error`]: Error types and ufw error translation

pub mod cycle;
pub mod error;
pub mod executor;
pub mod parser;
pub mod planner;
pub mod policy;
pub mod rule;
pub mod source;

#[cfg(test)]
pub mod test_helpers;
