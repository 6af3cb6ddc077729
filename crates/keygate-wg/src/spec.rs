// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Peer specifications and their fully parsed form.
//!
//! A [`PeerSpec`] is the caller-facing description of one peer: base64
//! public key (its identity), optional preshared key, optional endpoint
//! and a list of allowed-IP CIDR blocks. [`PeerSpec::resolve`] parses
//! every field up front so a single bad entry aborts a reconciliation
//! before anything touches the control surface.

use std::net::{SocketAddr, ToSocketAddrs};

use serde::Deserialize;
use wireguard_control::{AllowedIp, Key, PeerConfigBuilder};

use crate::error::{Result, WgError};

/// Keepalive applied to every peer unless `persistent_keepalive` is set.
/// These peers sit behind NAT and need periodic traffic to keep the
/// mapping alive.
pub const DEFAULT_KEEPALIVE_SECS: u16 = 25;

/// Desired configuration for one peer. Identity is the public key; two
/// specs with the same key describe the same peer.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PeerSpec {
	/// Base64-encoded WireGuard public key.
	pub public_key: String,
	/// Base64-encoded preshared key.
	#[serde(default)]
	pub preshared_key: Option<String>,
	/// `host:port` UDP endpoint.
	#[serde(default)]
	pub endpoint: Option<String>,
	/// CIDR blocks routable through this peer.
	#[serde(default)]
	pub allowed_ips: Vec<String>,
	/// Keepalive interval in seconds; defaults to [`DEFAULT_KEEPALIVE_SECS`].
	#[serde(default)]
	pub persistent_keepalive: Option<u16>,
}

impl PeerSpec {
	pub fn new(public_key: impl Into<String>) -> Self {
		Self {
			public_key: public_key.into(),
			preshared_key: None,
			endpoint: None,
			allowed_ips: Vec::new(),
			persistent_keepalive: None,
		}
	}

	/// Parse every field into control-surface types. Fails on the first
	/// invalid field, naming the peer and the field.
	pub fn resolve(&self) -> Result<ResolvedPeer> {
		let public_key = Key::from_base64(&self.public_key)
			.map_err(|e| WgError::invalid_peer_spec(&self.public_key, "public_key", e))?;

		let preshared_key = match &self.preshared_key {
			Some(psk) => Some(
				Key::from_base64(psk)
					.map_err(|e| WgError::invalid_peer_spec(&self.public_key, "preshared_key", e))?,
			),
			None => None,
		};

		let endpoint = match &self.endpoint {
			Some(endpoint) => Some(resolve_endpoint(&self.public_key, endpoint)?),
			None => None,
		};

		let allowed_ips = self
			.allowed_ips
			.iter()
			.map(|cidr| parse_allowed_ip(&self.public_key, cidr))
			.collect::<Result<Vec<_>>>()?;

		Ok(ResolvedPeer {
			public_key,
			preshared_key,
			endpoint,
			allowed_ips,
			persistent_keepalive: self.persistent_keepalive.unwrap_or(DEFAULT_KEEPALIVE_SECS),
		})
	}
}

/// A [`PeerSpec`] with every field parsed, ready for submission.
#[derive(Debug, Clone)]
pub struct ResolvedPeer {
	pub public_key: Key,
	pub preshared_key: Option<Key>,
	pub endpoint: Option<SocketAddr>,
	pub allowed_ips: Vec<AllowedIp>,
	pub persistent_keepalive: u16,
}

impl ResolvedPeer {
	pub(crate) fn to_builder(&self) -> PeerConfigBuilder {
		let mut builder = PeerConfigBuilder::new(&self.public_key)
			.set_persistent_keepalive_interval(self.persistent_keepalive)
			.add_allowed_ips(&self.allowed_ips);
		if let Some(psk) = &self.preshared_key {
			builder = builder.set_preshared_key(psk.clone());
		}
		if let Some(endpoint) = self.endpoint {
			builder = builder.set_endpoint(endpoint);
		}
		builder
	}
}

fn resolve_endpoint(peer: &str, endpoint: &str) -> Result<SocketAddr> {
	endpoint
		.to_socket_addrs()
		.map_err(|e| WgError::invalid_peer_spec(peer, "endpoint", e))?
		.next()
		.ok_or_else(|| {
			WgError::invalid_peer_spec(peer, "endpoint", format!("{endpoint:?} resolves to nothing"))
		})
}

fn parse_allowed_ip(peer: &str, cidr: &str) -> Result<AllowedIp> {
	let invalid = |reason: String| WgError::invalid_peer_spec(peer, "allowed_ips", reason);
	let (address, prefix) = cidr
		.split_once('/')
		.ok_or_else(|| invalid(format!("{cidr:?} is not in address/prefix form")))?;
	let address: std::net::IpAddr = address
		.parse()
		.map_err(|e| invalid(format!("{cidr:?}: {e}")))?;
	let prefix: u8 = prefix
		.parse()
		.map_err(|e| invalid(format!("{cidr:?}: {e}")))?;
	let max = if address.is_ipv4() { 32 } else { 128 };
	if prefix > max {
		return Err(invalid(format!("{cidr:?}: prefix exceeds /{max}")));
	}
	Ok(AllowedIp {
		address,
		cidr: prefix,
	})
}
