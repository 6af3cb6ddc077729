// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! WireGuard peer reconciliation for Keygate.
//!
//! Given a complete desired peer set, [`Reconciler::reconcile`] reads the
//! live peer table from the interface control surface, computes the diff
//! (every desired peer re-submitted in full, every live-only peer removed)
//! and applies it as one batched configuration call. Each call states the
//! entire desired world; there is no incremental mutation API, and a
//! subsequent pass converges the interface regardless of intervening
//! external changes.
//!
//! The engine depends only on the narrow [`ControlSurface`] contract;
//! [`KernelSurface`] backs it with the kernel netlink interface.

pub mod diff;
pub mod engine;
pub mod error;
pub mod route;
pub mod spec;
pub mod surface;

pub use diff::{compute_diff, PeerDiff};
pub use engine::{ReconcileSummary, Reconciler};
pub use error::{Result, WgError};
pub use route::ensure_peer_route;
pub use spec::{PeerSpec, ResolvedPeer, DEFAULT_KEEPALIVE_SECS};
pub use surface::{ControlSurface, KernelSurface, PeerChange};
