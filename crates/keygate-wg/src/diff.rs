// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Pure desired/live peer diff.
//!
//! Every desired peer is re-submitted in full; the control surface decides
//! whether anything actually changed. Field-level diffing is deliberately
//! absent so no stale field ever survives an upsert. Live peers missing
//! from the desired set are removed.

use std::collections::{BTreeMap, BTreeSet};

use crate::spec::PeerSpec;

/// The changes that converge a live peer table to the desired set.
#[derive(Debug, Clone, Default)]
pub struct PeerDiff {
	/// Full specs for every desired peer, sorted by public key.
	pub upserts: Vec<PeerSpec>,
	/// Public keys configured on the interface but no longer desired,
	/// sorted.
	pub removals: Vec<String>,
}

impl PeerDiff {
	pub fn is_empty(&self) -> bool {
		self.upserts.is_empty() && self.removals.is_empty()
	}
}

/// Compute the diff between the complete desired peer set and the live
/// key set. Deterministic: both outputs follow BTree key order.
pub fn compute_diff(desired: &BTreeMap<String, PeerSpec>, live: &BTreeSet<String>) -> PeerDiff {
	PeerDiff {
		upserts: desired.values().cloned().collect(),
		removals: live
			.iter()
			.filter(|key| !desired.contains_key(*key))
			.cloned()
			.collect(),
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	fn desired(keys: &[&str]) -> BTreeMap<String, PeerSpec> {
		keys.iter()
			.map(|k| (k.to_string(), PeerSpec::new(*k)))
			.collect()
	}

	fn live(keys: &[&str]) -> BTreeSet<String> {
		keys.iter().map(|k| k.to_string()).collect()
	}

	fn upsert_keys(diff: &PeerDiff) -> Vec<&str> {
		diff.upserts.iter().map(|p| p.public_key.as_str()).collect()
	}

	#[test]
	fn test_new_peer_upserted_nothing_removed() {
		let mut want = desired(&["A"]);
		want.get_mut("A").unwrap().allowed_ips = vec!["10.0.0.2/32".to_string()];

		let diff = compute_diff(&want, &live(&[]));
		assert_eq!(upsert_keys(&diff), vec!["A"]);
		assert!(diff.removals.is_empty());
	}

	#[test]
	fn test_stale_live_peer_removed() {
		let diff = compute_diff(&desired(&["A"]), &live(&["A", "B"]));
		assert_eq!(upsert_keys(&diff), vec!["A"]);
		assert_eq!(diff.removals, vec!["B"]);
	}

	#[test]
	fn test_empty_desired_removes_every_live_peer() {
		let diff = compute_diff(&desired(&[]), &live(&["A", "B", "C"]));
		assert!(diff.upserts.is_empty());
		assert_eq!(diff.removals, vec!["A", "B", "C"]);
	}

	#[test]
	fn test_key_set_algebra() {
		let want = desired(&["A", "B", "C"]);
		let have = live(&["B", "C", "D", "E"]);
		let diff = compute_diff(&want, &have);

		// Upserts are exactly the desired keys.
		assert_eq!(upsert_keys(&diff), vec!["A", "B", "C"]);
		// Removals are exactly live minus desired.
		assert_eq!(diff.removals, vec!["D", "E"]);
		// The intersection never shows up as a removal.
		for key in ["B", "C"] {
			assert!(!diff.removals.iter().any(|k| k == key));
		}
	}

	#[test]
	fn test_matching_peer_resubmitted_in_full() {
		let mut want = desired(&["A"]);
		want.get_mut("A").unwrap().endpoint = Some("192.0.2.1:51820".to_string());

		let diff = compute_diff(&want, &live(&["A"]));
		assert_eq!(diff.upserts.len(), 1);
		assert_eq!(
			diff.upserts[0].endpoint.as_deref(),
			Some("192.0.2.1:51820")
		);
		assert!(diff.removals.is_empty());
	}

	#[test]
	fn test_deterministic_ordering() {
		let want = desired(&["C", "A", "B"]);
		let have = live(&["Z", "X", "Y"]);

		let first = compute_diff(&want, &have);
		let second = compute_diff(&want, &have);
		assert_eq!(upsert_keys(&first), vec!["A", "B", "C"]);
		assert_eq!(first.removals, vec!["X", "Y", "Z"]);
		assert_eq!(upsert_keys(&first), upsert_keys(&second));
		assert_eq!(first.removals, second.removals);
	}

	#[test]
	fn test_empty_both_is_empty_diff() {
		assert!(compute_diff(&desired(&[]), &live(&[])).is_empty());
	}
}
