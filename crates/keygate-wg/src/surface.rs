// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The narrow interface-control contract the engine depends on.
//!
//! `read_peers` returns the public keys currently configured on the
//! device; `apply` submits upserts and removals in one batched
//! configuration call so the device applies them as close to atomically
//! as it supports. The engine adds no locking of its own and relies on
//! the control surface to serialize configuration writes.

use std::collections::BTreeSet;

use tracing::debug;
use wireguard_control::{Backend, Device, DeviceUpdate, InterfaceName, Key};

use crate::error::{Result, WgError};
use crate::spec::ResolvedPeer;

/// One element of a batched configuration call.
#[derive(Debug, Clone)]
pub enum PeerChange {
	Upsert(ResolvedPeer),
	Remove(Key),
}

pub trait ControlSurface {
	/// Public keys (base64) of the peers currently on the device.
	fn read_peers(&self, interface: &str) -> Result<BTreeSet<String>>;

	/// Apply all changes in a single configuration call.
	fn apply(&self, interface: &str, changes: &[PeerChange]) -> Result<()>;
}

/// Kernel netlink control surface.
#[derive(Debug, Clone, Copy, Default)]
pub struct KernelSurface;

impl KernelSurface {
	pub fn new() -> Self {
		Self
	}
}

impl ControlSurface for KernelSurface {
	fn read_peers(&self, interface: &str) -> Result<BTreeSet<String>> {
		let name = parse_interface_name(interface)?;
		let device =
			Device::get(&name, Backend::Kernel).map_err(|e| device_error(interface, e))?;
		let peers = device
			.peers
			.iter()
			.map(|peer| peer.config.public_key.to_base64())
			.collect::<BTreeSet<_>>();
		debug!(interface, live_peers = peers.len(), "read device");
		Ok(peers)
	}

	fn apply(&self, interface: &str, changes: &[PeerChange]) -> Result<()> {
		let name = parse_interface_name(interface)?;
		let mut update = DeviceUpdate::new();
		for change in changes {
			update = match change {
				PeerChange::Upsert(peer) => update.add_peer(peer.to_builder()),
				PeerChange::Remove(key) => update.remove_peer_by_key(key),
			};
		}
		update
			.apply(&name, Backend::Kernel)
			.map_err(|e| device_error(interface, e))?;
		debug!(interface, changes = changes.len(), "configured device");
		Ok(())
	}
}

fn parse_interface_name(interface: &str) -> Result<InterfaceName> {
	interface
		.parse()
		.map_err(|e| WgError::InvalidInterfaceName {
			interface: interface.to_string(),
			reason: format!("{e}"),
		})
}

fn device_error(interface: &str, source: std::io::Error) -> WgError {
	let missing = source.kind() == std::io::ErrorKind::NotFound
		|| source.raw_os_error() == Some(nix::libc::ENODEV);
	if missing {
		WgError::InterfaceNotFound {
			interface: interface.to_string(),
		}
	} else {
		WgError::ControlSurface {
			interface: interface.to_string(),
			source,
		}
	}
}
