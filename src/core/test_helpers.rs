//! Shared test utilities for core module tests
//!
//! Provides a simulated ufw that keeps rules in one numbered list, prints
//! them the way `ufw status numbered` does and renumbers on delete.
//! This module is only compiled in test mode.

use crate::core::error::AdapterError;
use crate::core::rule::Family;
use crate::core::source::RuleSource;
use std::collections::{HashSet, VecDeque};
use std::sync::Mutex;

/// Mutex for tests that need exclusive access to environment variables.
///
/// ```ignore
/// let _guard = ENV_VAR_MUTEX.lock().unwrap();
/// unsafe {
///     std::env::set_var("CUFW_ELEVATION_METHOD", "sudo");
/// }
/// // ... test with custom env state ...
/// unsafe {
///     std::env::remove_var("CUFW_ELEVATION_METHOD");
/// }
/// ```
pub static ENV_VAR_MUTEX: Mutex<()> = Mutex::new(());

/// One row of the simulated listing, stored as the columns ufw prints
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SimRule {
    pub to: String,
    pub action: String,
    pub from: String,
}

impl SimRule {
    /// IPv4 `ALLOW IN` rule
    pub fn v4(to: &str, from: &str) -> Self {
        Self {
            to: to.to_string(),
            action: "ALLOW IN".to_string(),
            from: from.to_string(),
        }
    }

    /// IPv6 `ALLOW IN` rule; `(v6)` is appended to the "To" column
    pub fn v6(to: &str, from: &str) -> Self {
        Self {
            to: format!("{to} (v6)"),
            action: "ALLOW IN".to_string(),
            from: from.to_string(),
        }
    }

    pub fn with_action(mut self, action: &str) -> Self {
        self.action = action.to_string();
        self
    }
}

#[derive(Debug, Default)]
struct SimState {
    rules: Vec<SimRule>,
    /// Batches added by "another actor" at the start of later cycles
    arrivals: VecDeque<Vec<SimRule>>,
    ipv4_lists: usize,
    list_calls: Vec<Family>,
    delete_calls: Vec<(Family, u32, bool)>,
    failing_lists: HashSet<Family>,
    failing_deletes: HashSet<u32>,
    garbage_listing: bool,
}

/// In-memory stand-in for ufw with ufw's renumbering behavior
#[derive(Debug, Default)]
pub struct SimulatedUfw {
    state: Mutex<SimState>,
}

impl SimulatedUfw {
    pub fn new(rules: Vec<SimRule>) -> Self {
        Self {
            state: Mutex::new(SimState {
                rules,
                ..SimState::default()
            }),
        }
    }

    /// Queues rules that appear when the next cycle starts listing
    pub fn queue_arrivals(&self, batch: Vec<SimRule>) {
        self.state.lock().unwrap().arrivals.push_back(batch);
    }

    /// Makes every listing for `family` fail
    pub fn fail_listing(&self, family: Family) {
        self.state.lock().unwrap().failing_lists.insert(family);
    }

    /// Makes deletion of rule `number` fail
    pub fn fail_delete(&self, number: u32) {
        self.state.lock().unwrap().failing_deletes.insert(number);
    }

    /// Makes listings return text that is not a ufw listing
    pub fn return_garbage(&self) {
        self.state.lock().unwrap().garbage_listing = true;
    }

    pub fn rules(&self) -> Vec<SimRule> {
        self.state.lock().unwrap().rules.clone()
    }

    pub fn delete_calls(&self) -> Vec<(Family, u32, bool)> {
        self.state.lock().unwrap().delete_calls.clone()
    }

    pub fn list_calls(&self) -> Vec<Family> {
        self.state.lock().unwrap().list_calls.clone()
    }

    /// Renders the current rules as `ufw status numbered` output
    pub fn listing(&self) -> String {
        render_listing(&self.state.lock().unwrap().rules)
    }
}

/// Formats rules with ufw's column layout
pub fn render_listing(rules: &[SimRule]) -> String {
    let mut out = String::from(
        "Status: active\n\n     To                         Action      From\n     --                         ------      ----\n",
    );
    for (idx, rule) in rules.iter().enumerate() {
        out.push_str(&format!(
            "[{:>2}] {:<26} {:<12}{}\n",
            idx + 1,
            rule.to,
            rule.action,
            rule.from
        ));
    }
    out.push('\n');
    out
}

impl RuleSource for SimulatedUfw {
    async fn list_rules(&self, family: Family) -> Result<String, AdapterError> {
        let mut state = self.state.lock().unwrap();
        state.list_calls.push(family);

        if family == Family::Ipv4 {
            state.ipv4_lists += 1;
            if state.ipv4_lists > 1
                && let Some(batch) = state.arrivals.pop_front()
            {
                state.rules.extend(batch);
            }
        }

        if state.failing_lists.contains(&family) {
            return Err(AdapterError::NonZeroExit {
                exit_code: Some(1),
                stderr: "ERROR: problem running ip6tables".to_string(),
            });
        }

        if state.garbage_listing {
            return Ok("Usage: ufw COMMAND\n".to_string());
        }

        Ok(render_listing(&state.rules))
    }

    async fn delete_rule(
        &self,
        family: Family,
        number: u32,
        confirm: bool,
    ) -> Result<(), AdapterError> {
        let mut state = self.state.lock().unwrap();
        state.delete_calls.push((family, number, confirm));

        if state.failing_deletes.contains(&number) {
            return Err(AdapterError::NonZeroExit {
                exit_code: Some(1),
                stderr: "ERROR: Could not delete non-existent rule".to_string(),
            });
        }

        let idx = number as usize;
        if idx == 0 || idx > state.rules.len() {
            return Err(AdapterError::NonZeroExit {
                exit_code: Some(1),
                stderr: format!("ERROR: Could not find rule '{number}'"),
            });
        }

        state.rules.remove(idx - 1);
        Ok(())
    }
}
