// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};

use clap::Parser;
use keygate_wg::PeerSpec;
use serde::Deserialize;
use thiserror::Error;

/// Keygate daemon - OAuth2-gated WireGuard peer management
#[derive(Parser, Debug)]
#[command(name = "keygated")]
pub struct Args {
	/// Path to the keygate config file
	#[arg(long, env = "KEYGATE_CONFIG", default_value = "/etc/keygate/config.toml")]
	pub config: PathBuf,

	/// Log verbosity (trace|debug|info|warn|error)
	#[arg(long, env = "KEYGATE_LOG_LEVEL", default_value = "info")]
	pub log_level: String,

	/// Seconds between reconciliation passes
	#[arg(long, env = "KEYGATE_RECONCILE_SECS", default_value_t = 60)]
	pub reconcile_secs: u64,
}

#[derive(Debug, Error)]
pub enum ConfigError {
	#[error("cannot read config {path}: {source}")]
	Read {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("cannot parse config {path}: {source}")]
	Parse {
		path: String,
		#[source]
		source: toml::de::Error,
	},
}

/// config.toml format
#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Config {
	/// WireGuard interface to manage.
	#[serde(default = "default_interface")]
	pub interface: String,

	/// Subnet routed through the interface (CIDR).
	pub peer_subnet: String,

	/// Where the identity credential is cached.
	pub credentials_file: PathBuf,

	pub oauth: OauthSection,

	/// The complete desired peer set.
	#[serde(default)]
	pub peers: Vec<PeerSpec>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct OauthSection {
	pub client_id: String,
	pub auth_url: String,
	pub token_url: String,
}

fn default_interface() -> String {
	"wg0".to_string()
}

impl Config {
	pub fn load(path: &Path) -> Result<Self, ConfigError> {
		let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
			path: path.display().to_string(),
			source,
		})?;
		toml::from_str(&content).map_err(|source| ConfigError::Parse {
			path: path.display().to_string(),
			source,
		})
	}
}
