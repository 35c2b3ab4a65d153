//! Cleanup policy: "anywhere" rules go, except the SSH rule
//!
//! A rule is removable when its source is the any-source marker of its own
//! family and its destination is not the protected pair (22, TCP). Action,
//! interface and comment play no part in the decision.

use crate::core::rule::{PortEntry, PortSpec, Protocol, Rule};
use serde::Serialize;

/// Port reserved for administrative remote access
pub const PROTECTED_PORT: u16 = 22;

/// Protocol of the protected port
pub const PROTECTED_PROTOCOL: Protocol = Protocol::Tcp;

/// ufw's stock application profile for the SSH daemon (defined as 22/tcp)
pub const PROTECTED_APP: &str = "OpenSSH";

/// Outcome of classifying a single rule
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Verdict {
    /// Open to any source and not the protected port
    Removable,
    /// Open to any source, but guards the protected port
    Protected,
    /// Source is restricted; out of scope for this policy
    Restricted,
}

/// Returns true when `spec` is the protected (22, TCP) pair
///
/// A bare `22` counts because ufw applies it to both tcp and udp.
pub fn is_protected_port(spec: &PortSpec) -> bool {
    match spec {
        PortSpec::Ports { entries, protocol } => {
            matches!(*protocol, None | Some(PROTECTED_PROTOCOL))
                && entries.contains(&PortEntry::Single(PROTECTED_PORT))
        }
        PortSpec::App(name) => name == PROTECTED_APP,
        PortSpec::Any => false,
    }
}

/// Classifies a rule under the cleanup policy
pub fn verdict(rule: &Rule) -> Verdict {
    if !rule.source.is_any_for(rule.family) {
        Verdict::Restricted
    } else if is_protected_port(&rule.port_spec) {
        Verdict::Protected
    } else {
        Verdict::Removable
    }
}

/// Returns true when the rule should be deleted
pub fn is_removable(rule: &Rule) -> bool {
    verdict(rule) == Verdict::Removable
}

/// Pairs every rule with its verdict, preserving listing order
pub fn classify(rules: &[Rule]) -> Vec<(&Rule, Verdict)> {
    rules.iter().map(|rule| (rule, verdict(rule))).collect()
}
