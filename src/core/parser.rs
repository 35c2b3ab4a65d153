//! Parser for `ufw status numbered` output
//!
//! ufw prints a short header followed by one line per rule:
//!
//! ```text
//! Status: active
//!
//!      To                         Action      From
//!      --                         ------      ----
//! [ 1] 22/tcp                     ALLOW IN    Anywhere
//! [ 2] 80,443/tcp                 ALLOW IN    Anywhere                   # web
//! [ 3] Anywhere on eth1           DENY IN     10.0.0.0/8
//! [ 4] 22/tcp (v6)                ALLOW IN    Anywhere (v6)
//! ```
//!
//! Column widths are not fixed (a long "To" value pushes the rest of the
//! line to the right), so the action column is located by keyword rather
//! than by offset. Both families share one numbering space in ufw's output;
//! [`parse_listing`] keeps only the lines of the requested family.

use crate::core::error::ParseError;
use crate::core::rule::{Action, Direction, Family, PortSpec, Rule, Source, V6_MARKER, Verb};
use ipnetwork::IpNetwork;
use tracing::{debug, trace};

/// Logging flags ufw may print after the source
const LOG_MARKERS: [&str; 2] = ["(log)", "(log-all)"];

/// Parses a numbered listing into the rules of one address family
///
/// Headers, separators, blank lines and malformed rule lines are skipped.
///
/// # Errors
///
/// Returns `Err` if:
/// - the listing is empty
/// - it has neither a `Status:` header nor any rule line
/// - rule numbers are not strictly ascending
pub fn parse_listing(text: &str, family: Family) -> Result<Vec<Rule>, ParseError> {
    if text.trim().is_empty() {
        return Err(ParseError::Empty);
    }

    let has_status = text
        .lines()
        .any(|line| line.trim_start().starts_with("Status:"));

    let all: Vec<Rule> = text.lines().filter_map(parse_line).collect();

    if !has_status && all.is_empty() {
        return Err(ParseError::Unrecognized);
    }

    for pair in all.windows(2) {
        if pair[1].number <= pair[0].number {
            return Err(ParseError::OutOfOrder {
                previous: pair[0].number,
                found: pair[1].number,
            });
        }
    }

    let total = all.len();
    let rules: Vec<Rule> = all.into_iter().filter(|r| r.family == family).collect();
    debug!(
        "Parsed {} {} rule(s) out of {} listed",
        rules.len(),
        family,
        total
    );

    Ok(rules)
}

/// Parses one listing line, returning `None` for anything that is not a rule
pub fn parse_line(line: &str) -> Option<Rule> {
    let raw_text = line.trim();
    let rest = raw_text.strip_prefix('[')?;
    let (number, rest) = rest.split_once(']')?;
    let number = number.trim().parse::<u32>().ok().filter(|n| *n > 0)?;

    let (body, comment) = match rest.find(" # ") {
        Some(idx) => (&rest[..idx], Some(rest[idx + 3..].trim().to_string())),
        None => (rest, None),
    };
    let comment = comment.filter(|c| !c.is_empty());

    let tokens: Vec<&str> = body.split_whitespace().collect();
    let verb_idx = tokens.iter().position(|t| t.parse::<Verb>().is_ok())?;
    if verb_idx == 0 {
        trace!("Skipping rule line without destination: {raw_text}");
        return None;
    }

    let verb = tokens[verb_idx].parse::<Verb>().ok()?;
    let direction = tokens
        .get(verb_idx + 1)
        .and_then(|t| t.parse::<Direction>().ok());
    let from_start = verb_idx + 1 + usize::from(direction.is_some());

    let from_tokens: Vec<&str> = tokens[from_start..]
        .iter()
        .copied()
        .filter(|t| !LOG_MARKERS.contains(t))
        .collect();
    if from_tokens.is_empty() {
        trace!("Skipping rule line without source: {raw_text}");
        return None;
    }
    let source = Source::parse(&from_tokens.join(" "));

    let to_tokens = &tokens[..verb_idx];
    let to_is_v6 = to_tokens.contains(&V6_MARKER);
    let (to, interface) = split_interface(to_tokens);
    let port_spec = parse_port_spec(&to);

    let family = if to_is_v6
        || from_tokens.last() == Some(&V6_MARKER)
        || matches!(source, Source::Network(IpNetwork::V6(_)))
    {
        Family::Ipv6
    } else {
        Family::Ipv4
    };

    Some(Rule {
        number,
        family,
        action: Action { verb, direction },
        to,
        port_spec,
        interface,
        source,
        comment,
        raw_text: raw_text.to_string(),
    })
}

/// Removes the `(v6)` marker and the `on <iface>` qualifier from the "To" column
fn split_interface(tokens: &[&str]) -> (String, Option<String>) {
    let mut kept = Vec::with_capacity(tokens.len());
    let mut interface = None;
    let mut iter = tokens.iter().copied().filter(|t| *t != V6_MARKER);

    while let Some(token) = iter.next() {
        if token == "on"
            && interface.is_none()
            && let Some(name) = iter.next()
        {
            interface = Some(name.to_string());
            continue;
        }
        kept.push(token);
    }

    (kept.join(" "), interface)
}

/// Interprets the normalized "To" column
///
/// `Anywhere` and bare destination addresses carry no port restriction;
/// a trailing port token wins over a preceding destination address;
/// anything else is an application profile name.
///
/// Ports are tried before addresses: `ipnetwork` reads `22` as `22.0.0.0`.
fn parse_port_spec(to: &str) -> PortSpec {
    let tokens: Vec<&str> = to.split_whitespace().collect();

    match tokens.as_slice() {
        [] | ["Anywhere"] => PortSpec::Any,
        [.., last] => PortSpec::parse_ports(last).unwrap_or_else(|| {
            if tokens.len() == 1 && last.parse::<IpNetwork>().is_ok() {
                PortSpec::Any
            } else {
                PortSpec::App(to.to_string())
            }
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::rule::{PortEntry, Protocol};

    const LISTING: &str = "\
Status: active

     To                         Action      From
     --                         ------      ----
[ 1] 22/tcp                     ALLOW IN    Anywhere
[ 2] 80,443/tcp                 ALLOW IN    Anywhere                   # web
[ 3] Anywhere on eth1           DENY IN     10.0.0.0/8
[ 4] OpenSSH                    ALLOW IN    Anywhere
[ 5] 22/tcp (v6)                ALLOW IN    Anywhere (v6)
[ 6] 80,443/tcp (v6)            ALLOW IN    Anywhere (v6)              # web
[ 7] 53/udp (v6)                ALLOW IN    2001:db8::/32

";

    #[test]
    fn test_parse_ipv4_rules() {
        let rules = parse_listing(LISTING, Family::Ipv4).unwrap();
        let numbers: Vec<u32> = rules.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![1, 2, 3, 4]);

        assert_eq!(rules[0].source, Source::Anywhere);
        assert_eq!(
            rules[0].port_spec,
            PortSpec::Ports {
                entries: vec![PortEntry::Single(22)],
                protocol: Some(Protocol::Tcp),
            }
        );
        assert_eq!(rules[1].comment.as_deref(), Some("web"));
        assert_eq!(rules[2].interface.as_deref(), Some("eth1"));
        assert_eq!(rules[2].port_spec, PortSpec::Any);
        assert_eq!(rules[2].action.verb, Verb::Deny);
        assert_eq!(rules[3].port_spec, PortSpec::App("OpenSSH".to_string()));
    }

    #[test]
    fn test_parse_ipv6_rules() {
        let rules = parse_listing(LISTING, Family::Ipv6).unwrap();
        let numbers: Vec<u32> = rules.iter().map(|r| r.number).collect();
        assert_eq!(numbers, vec![5, 6, 7]);

        assert_eq!(rules[0].source, Source::AnywhereV6);
        assert_eq!(rules[0].to, "22/tcp");
        assert!(matches!(rules[2].source, Source::Network(_)));
    }

    #[test]
    fn test_raw_text_is_preserved() {
        let rules = parse_listing(LISTING, Family::Ipv4).unwrap();
        assert_eq!(
            rules[1].raw_text,
            "[ 2] 80,443/tcp                 ALLOW IN    Anywhere                   # web"
        );
    }

    #[test]
    fn test_headers_and_garbage_are_skipped() {
        assert!(parse_line("Status: active").is_none());
        assert!(parse_line("     To                         Action      From").is_none());
        assert!(parse_line("     --                         ------      ----").is_none());
        assert!(parse_line("").is_none());
        assert!(parse_line("[ x] 22/tcp ALLOW IN Anywhere").is_none());
        assert!(parse_line("[ 0] 22/tcp ALLOW IN Anywhere").is_none());
        assert!(parse_line("[ 3] 22/tcp ALLOW IN").is_none());
        assert!(parse_line("[ 3] ALLOW IN Anywhere").is_none());
        assert!(parse_line("[ 3] 22/tcp GRANT IN Anywhere").is_none());
    }

    #[test]
    fn test_long_destination_single_space() {
        let rule =
            parse_line("[12] 10.20.30.40 8000:8100/tcp on enp3s0 ALLOW IN    Anywhere").unwrap();
        assert_eq!(rule.number, 12);
        assert_eq!(rule.interface.as_deref(), Some("enp3s0"));
        assert_eq!(
            rule.port_spec,
            PortSpec::Ports {
                entries: vec![PortEntry::Range(8000, 8100)],
                protocol: Some(Protocol::Tcp),
            }
        );
    }

    #[test]
    fn test_action_without_direction() {
        let rule = parse_line("[ 1] 25                         DENY        Anywhere").unwrap();
        assert_eq!(rule.action.verb, Verb::Deny);
        assert_eq!(rule.action.direction, None);
        assert_eq!(rule.source, Source::Anywhere);
        assert_eq!(
            rule.port_spec,
            PortSpec::Ports {
                entries: vec![PortEntry::Single(25)],
                protocol: None,
            }
        );
    }

    #[test]
    fn test_bare_port_is_not_an_address() {
        let rule = parse_line("[ 1] 22                         ALLOW IN    Anywhere").unwrap();
        assert!(matches!(rule.port_spec, PortSpec::Ports { .. }));

        let rule = parse_line("[ 2] 10.0.0.1                   ALLOW IN    Anywhere").unwrap();
        assert_eq!(rule.port_spec, PortSpec::Any);
    }

    #[test]
    fn test_outbound_and_log_markers() {
        let rule = parse_line("[ 2] 443/tcp                    ALLOW OUT   Anywhere (log)").unwrap();
        assert_eq!(rule.action.direction, Some(Direction::Out));
        assert_eq!(rule.source, Source::Anywhere);
    }

    #[test]
    fn test_app_profile_with_spaces() {
        let rule = parse_line("[ 3] Nginx Full                 ALLOW IN    Anywhere").unwrap();
        assert_eq!(rule.port_spec, PortSpec::App("Nginx Full".to_string()));
    }

    #[test]
    fn test_inactive_firewall_is_empty_not_error() {
        let rules = parse_listing("Status: inactive\n", Family::Ipv4).unwrap();
        assert!(rules.is_empty());
    }

    #[test]
    fn test_no_rules_of_family() {
        let listing = "Status: active\n\n[ 1] 22/tcp ALLOW IN Anywhere\n";
        assert!(parse_listing(listing, Family::Ipv6).unwrap().is_empty());
    }

    #[test]
    fn test_empty_listing_is_error() {
        assert!(matches!(
            parse_listing("", Family::Ipv4),
            Err(ParseError::Empty)
        ));
        assert!(matches!(
            parse_listing("  \n\n", Family::Ipv6),
            Err(ParseError::Empty)
        ));
    }

    #[test]
    fn test_unrecognized_listing_is_error() {
        let result = parse_listing("ERROR: problem running iptables\n", Family::Ipv4);
        assert!(matches!(result, Err(ParseError::Unrecognized)));
    }

    #[test]
    fn test_out_of_order_numbers_are_error() {
        let listing = "Status: active\n[ 2] 80/tcp ALLOW IN Anywhere\n[ 1] 81/tcp ALLOW IN Anywhere\n";
        assert!(matches!(
            parse_listing(listing, Family::Ipv4),
            Err(ParseError::OutOfOrder {
                previous: 2,
                found: 1
            })
        ));
    }
}
