//! Deletion ordering
//!
//! ufw renumbers every rule above a deleted position down by one. Deleting
//! the highest planned number first means every number still waiting in the
//! plan sits below each deletion already made, so it keeps pointing at the
//! same rule without re-reading the listing in between.

use crate::core::policy::Verdict;
use crate::core::rule::{Family, Rule};
use serde::Serialize;
use sha2::{Digest, Sha256};

/// A rule scheduled for deletion
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlannedDeletion {
    pub number: u32,
    pub raw_text: String,
}

/// Removable rules of one family, highest number first
#[derive(Debug, Clone, Serialize)]
pub struct DeletionPlan {
    pub family: Family,
    pub entries: Vec<PlannedDeletion>,
    /// SHA-256 of the listing the plan was computed from
    pub listing_checksum: String,
}

impl DeletionPlan {
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Planned rule numbers in execution order
    pub fn numbers(&self) -> Vec<u32> {
        self.entries.iter().map(|e| e.number).collect()
    }
}

/// Builds the plan for `family` from classified rules
pub fn plan_deletions(family: Family, verdicts: &[(&Rule, Verdict)], listing: &str) -> DeletionPlan {
    let mut entries: Vec<PlannedDeletion> = verdicts
        .iter()
        .filter(|(rule, verdict)| *verdict == Verdict::Removable && rule.family == family)
        .map(|(rule, _)| PlannedDeletion {
            number: rule.number,
            raw_text: rule.raw_text.clone(),
        })
        .collect();

    entries.sort_unstable_by(|a, b| b.number.cmp(&a.number));
    entries.dedup_by_key(|e| e.number);

    DeletionPlan {
        family,
        entries,
        listing_checksum: compute_checksum(listing),
    }
}

/// Computes the SHA-256 checksum of a listing as lowercase hex
pub fn compute_checksum(listing: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(listing.as_bytes());
    format!("{:x}", hasher.finalize())
}
