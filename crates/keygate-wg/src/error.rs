// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WgError {
	#[error("invalid interface name {interface:?}: {reason}")]
	InvalidInterfaceName { interface: String, reason: String },

	#[error("interface {interface} does not exist")]
	InterfaceNotFound { interface: String },

	#[error("invalid peer spec for {peer}: {field} {reason}")]
	InvalidPeerSpec {
		peer: String,
		field: &'static str,
		reason: String,
	},

	#[error("control surface call on {interface} failed: {source}")]
	ControlSurface {
		interface: String,
		#[source]
		source: std::io::Error,
	},

	#[error("route to {subnet} via {interface} failed: {source}")]
	Route {
		interface: String,
		subnet: String,
		#[source]
		source: std::io::Error,
	},
}

impl WgError {
	pub(crate) fn invalid_peer_spec(
		peer: impl Into<String>,
		field: &'static str,
		reason: impl ToString,
	) -> Self {
		Self::InvalidPeerSpec {
			peer: peer.into(),
			field,
			reason: reason.to_string(),
		}
	}
}

pub type Result<T> = std::result::Result<T, WgError>;
