// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Reconciler: resolve, read, diff, batched apply.

use std::collections::BTreeMap;

use tracing::{info, instrument};
use wireguard_control::Key;

use crate::diff::compute_diff;
use crate::error::{Result, WgError};
use crate::spec::{PeerSpec, ResolvedPeer};
use crate::surface::{ControlSurface, PeerChange};

/// Counts from one reconciliation pass.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileSummary {
	pub upserts: usize,
	pub removals: usize,
}

/// Converges one interface's peer table to the desired set. Stateless
/// across calls: each pass reads the live table fresh, so a pass after
/// any external mutation converges the interface again. Reads and the
/// apply are not transactional against concurrent writers; full resync
/// per call is the mitigation.
#[derive(Debug)]
pub struct Reconciler<S> {
	interface: String,
	surface: S,
}

impl<S: ControlSurface> Reconciler<S> {
	pub fn new(interface: impl Into<String>, surface: S) -> Self {
		Self {
			interface: interface.into(),
			surface,
		}
	}

	pub fn interface(&self) -> &str {
		&self.interface
	}

	/// One pass: parse every desired spec (all of them, before touching
	/// the control surface), read the live peers, diff, apply as one
	/// batched call.
	#[instrument(skip(self, desired), fields(interface = %self.interface, desired = desired.len()))]
	pub fn reconcile(&self, desired: &BTreeMap<String, PeerSpec>) -> Result<ReconcileSummary> {
		let mut resolved: BTreeMap<String, ResolvedPeer> = BTreeMap::new();
		for (key, spec) in desired {
			resolved.insert(key.clone(), spec.resolve()?);
		}

		let live = self.surface.read_peers(&self.interface)?;
		let diff = compute_diff(desired, &live);

		let mut changes = Vec::with_capacity(diff.upserts.len() + diff.removals.len());
		for spec in &diff.upserts {
			// Resolved above for every desired key.
			changes.push(PeerChange::Upsert(resolved[&spec.public_key].clone()));
		}
		for key in &diff.removals {
			let parsed = Key::from_base64(key)
				.map_err(|e| WgError::invalid_peer_spec(key, "public_key", e))?;
			changes.push(PeerChange::Remove(parsed));
		}

		self.surface.apply(&self.interface, &changes)?;

		let summary = ReconcileSummary {
			upserts: diff.upserts.len(),
			removals: diff.removals.len(),
		};
		info!(
			upserts = summary.upserts,
			removals = summary.removals,
			"reconciled peer table"
		);
		Ok(summary)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::surface::testing::MemorySurface;

	const KEY_A: &str = "YWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFhYWFhYWE=";
	const KEY_B: &str = "YmJiYmJiYmJiYmJiYmJiYmJiYmJiYmJiYmJiYmJiYmI=";

	fn desired(keys: &[&str]) -> BTreeMap<String, PeerSpec> {
		keys.iter()
			.map(|k| {
				let mut spec = PeerSpec::new(*k);
				spec.allowed_ips = vec!["10.0.0.2/32".to_string()];
				(k.to_string(), spec)
			})
			.collect()
	}

	#[test]
	fn test_reconcile_adds_and_removes() {
		let surface = MemorySurface::with_device("wg0", &[KEY_B]);
		let reconciler = Reconciler::new("wg0", surface);

		let summary = reconciler.reconcile(&desired(&[KEY_A])).unwrap();
		assert_eq!(
			summary,
			ReconcileSummary {
				upserts: 1,
				removals: 1
			}
		);

		let live = reconciler.surface.peers("wg0");
		assert!(live.contains(KEY_A));
		assert!(!live.contains(KEY_B));
	}

	#[test]
	fn test_reconcile_is_idempotent() {
		let surface = MemorySurface::with_device("wg0", &[]);
		let reconciler = Reconciler::new("wg0", surface);
		let want = desired(&[KEY_A, KEY_B]);

		reconciler.reconcile(&want).unwrap();
		let live = reconciler.surface.peers("wg0");
		assert_eq!(live.len(), 2);

		// The second pass re-submits every desired peer and removes
		// nothing; the live key set is unchanged.
		let summary = reconciler.reconcile(&want).unwrap();
		assert_eq!(summary.removals, 0);
		assert_eq!(reconciler.surface.peers("wg0"), live);
	}

	#[test]
	fn test_empty_desired_clears_interface() {
		let surface = MemorySurface::with_device("wg0", &[KEY_A, KEY_B]);
		let reconciler = Reconciler::new("wg0", surface);

		let summary = reconciler.reconcile(&BTreeMap::new()).unwrap();
		assert_eq!(summary.upserts, 0);
		assert_eq!(summary.removals, 2);
		assert!(reconciler.surface.peers("wg0").is_empty());
	}

	#[test]
	fn test_missing_interface_leaves_no_partial_state() {
		let surface = MemorySurface::default();
		let reconciler = Reconciler::new("wg0", surface);

		assert!(matches!(
			reconciler.reconcile(&desired(&[KEY_A])),
			Err(WgError::InterfaceNotFound { .. })
		));
		assert!(reconciler.surface.peers("wg0").is_empty());
	}

	#[test]
	fn test_bad_spec_aborts_before_any_read_or_apply() {
		let surface = MemorySurface::with_device("wg0", &[KEY_B]);
		let reconciler = Reconciler::new("wg0", surface);

		let mut want = desired(&[KEY_A]);
		want.insert("bad".to_string(), PeerSpec::new("bad"));

		assert!(matches!(
			reconciler.reconcile(&want),
			Err(WgError::InvalidPeerSpec { .. })
		));
		// Nothing touched the device: the stale peer is still there.
		assert_eq!(reconciler.surface.peers("wg0").len(), 1);
	}

	#[test]
	fn test_converges_after_external_mutation() {
		let surface = MemorySurface::with_device("wg0", &[]);
		let reconciler = Reconciler::new("wg0", surface);
		let want = desired(&[KEY_A]);

		reconciler.reconcile(&want).unwrap();

		// Another actor adds a peer behind our back; the next pass
		// converges the table back to the desired set.
		reconciler
			.surface
			.apply(
				"wg0",
				&[PeerChange::Upsert(PeerSpec::new(KEY_B).resolve().unwrap())],
			)
			.unwrap();

		reconciler.reconcile(&want).unwrap();
		let live = reconciler.surface.peers("wg0");
		assert!(live.contains(KEY_A));
		assert!(!live.contains(KEY_B));
	}
}
