//! Rule records parsed from a `ufw status numbered` listing
//!
//! A [`Rule`] is a read-only view of one line of the live listing at the
//! moment it was parsed. Its `number` is the position ufw reports right now
//! and becomes stale as soon as any rule below it is deleted, so rules are
//! never kept across cycles.
//!
//! # Example
//!
//! ```
//! use cufw::core::parser::parse_listing;
//! use cufw::core::rule::{Family, PortSpec, Source};
//!
//! let listing = "Status: active\n\n[ 1] 80/tcp                     ALLOW IN    Anywhere\n";
//! let rules = parse_listing(listing, Family::Ipv4).unwrap();
//!
//! assert_eq!(rules[0].number, 1);
//! assert_eq!(rules[0].source, Source::Anywhere);
//! assert!(matches!(rules[0].port_spec, PortSpec::Ports { .. }));
//! ```

use ipnetwork::IpNetwork;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Literal "From" marker ufw prints for an unrestricted IPv4 source
pub const ANYWHERE_V4: &str = "Anywhere";

/// Literal "From" marker ufw prints for an unrestricted IPv6 source
pub const ANYWHERE_V6: &str = "Anywhere (v6)";

/// Suffix ufw appends to columns of IPv6 rules
pub const V6_MARKER: &str = "(v6)";

/// Address family of a rule
///
/// Families are always processed in [`Family::ORDER`].
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    Hash,
    strum::Display,
    strum::EnumString,
)]
#[serde(rename_all = "lowercase")]
pub enum Family {
    #[strum(serialize = "IPv4")]
    Ipv4,
    #[strum(serialize = "IPv6")]
    Ipv6,
}

impl Family {
    /// Fixed processing order for one cleanup cycle
    pub const ORDER: [Family; 2] = [Family::Ipv4, Family::Ipv6];

    /// The "From" literal that denotes any source for this family
    pub const fn any_source_marker(self) -> &'static str {
        match self {
            Family::Ipv4 => ANYWHERE_V4,
            Family::Ipv6 => ANYWHERE_V6,
        }
    }
}

/// Transport protocol qualifier of a port spec
#[derive(
    Debug,
    Clone,
    Copy,
    Serialize,
    Deserialize,
    PartialEq,
    Eq,
    strum::Display,
    strum::EnumString,
)]
#[strum(serialize_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum Protocol {
    Tcp,
    Udp,
    Ah,
    Esp,
    Gre,
    Ipv6,
    Igmp,
}

/// One comma-separated element of a ufw port list
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub enum PortEntry {
    Single(u16),
    /// Inclusive range, written `start:end` by ufw
    Range(u16, u16),
}

impl fmt::Display for PortEntry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortEntry::Single(p) => write!(f, "{p}"),
            PortEntry::Range(start, end) => write!(f, "{start}:{end}"),
        }
    }
}

/// Destination port/protocol governed by a rule (the "To" column)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum PortSpec {
    /// No port restriction (`Anywhere`, or a bare destination address)
    Any,
    /// Explicit ports; `protocol: None` means ufw's default of tcp and udp
    Ports {
        entries: Vec<PortEntry>,
        protocol: Option<Protocol>,
    },
    /// Application profile name such as `OpenSSH` or `Nginx Full`
    App(String),
}

impl PortSpec {
    /// Parses a single port token like `22`, `22/tcp`, `80,443/tcp` or `6000:6007/udp`
    ///
    /// Returns `None` when the token is not a port list.
    pub fn parse_ports(token: &str) -> Option<Self> {
        let (list, protocol) = match token.split_once('/') {
            Some((list, proto)) => (list, Some(proto.parse::<Protocol>().ok()?)),
            None => (token, None),
        };

        let entries = list
            .split(',')
            .map(|part| match part.split_once(':') {
                Some((start, end)) => {
                    let start = start.parse::<u16>().ok()?;
                    let end = end.parse::<u16>().ok()?;
                    (start <= end).then_some(PortEntry::Range(start, end))
                }
                None => part.parse::<u16>().ok().map(PortEntry::Single),
            })
            .collect::<Option<Vec<_>>>()?;

        if entries.is_empty() {
            return None;
        }

        Some(PortSpec::Ports { entries, protocol })
    }
}

impl fmt::Display for PortSpec {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PortSpec::Any => write!(f, "any"),
            PortSpec::Ports { entries, protocol } => {
                let list = entries
                    .iter()
                    .map(ToString::to_string)
                    .collect::<Vec<_>>()
                    .join(",");
                match protocol {
                    Some(proto) => write!(f, "{list}/{proto}"),
                    None => write!(f, "{list}"),
                }
            }
            PortSpec::App(name) => write!(f, "{name}"),
        }
    }
}

/// Allowed source of a rule (the "From" column)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub enum Source {
    /// The IPv4 any-source marker `Anywhere`
    Anywhere,
    /// The IPv6 any-source marker `Anywhere (v6)`
    AnywhereV6,
    Network(IpNetwork),
    /// Anything else ufw prints here (source ports, interfaces, app names)
    Other(String),
}

impl Source {
    pub fn parse(descriptor: &str) -> Self {
        if descriptor == ANYWHERE_V4 {
            Source::Anywhere
        } else if descriptor == ANYWHERE_V6 {
            Source::AnywhereV6
        } else if let Ok(network) = descriptor.parse::<IpNetwork>() {
            Source::Network(network)
        } else {
            Source::Other(descriptor.to_string())
        }
    }

    /// Returns true when this is exactly the any-source marker of `family`
    pub fn is_any_for(&self, family: Family) -> bool {
        let marker = match self {
            Source::Anywhere => ANYWHERE_V4,
            Source::AnywhereV6 => ANYWHERE_V6,
            Source::Network(_) | Source::Other(_) => return false,
        };
        marker == family.any_source_marker()
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Anywhere => f.write_str(ANYWHERE_V4),
            Source::AnywhereV6 => f.write_str(ANYWHERE_V6),
            Source::Network(network) => write!(f, "{network}"),
            Source::Other(text) => f.write_str(text),
        }
    }
}

/// Rule verb as printed in the "Action" column
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Verb {
    Allow,
    Deny,
    Reject,
    Limit,
}

/// Traffic direction qualifier following the verb
#[derive(
    Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, strum::Display, strum::EnumString,
)]
#[strum(serialize_all = "UPPERCASE")]
pub enum Direction {
    In,
    Out,
    Fwd,
}

/// Full "Action" column, e.g. `ALLOW IN` or `DENY`
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct Action {
    pub verb: Verb,
    pub direction: Option<Direction>,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.direction {
            Some(direction) => write!(f, "{} {direction}", self.verb),
            None => write!(f, "{}", self.verb),
        }
    }
}

/// One entry of a family's numbered listing
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Rule {
    /// Current 1-based position in ufw's listing (not a stable identifier)
    pub number: u32,
    pub family: Family,
    pub action: Action,
    /// "To" column with the `(v6)` marker and interface qualifier removed
    pub to: String,
    pub port_spec: PortSpec,
    /// `on <iface>` qualifier of the "To" column
    pub interface: Option<String>,
    pub source: Source,
    pub comment: Option<String>,
    /// Original listing line, trimmed
    pub raw_text: String,
}

impl fmt::Display for Rule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.raw_text)
    }
}
