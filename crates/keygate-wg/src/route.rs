// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Kernel route for the peer subnet.
//!
//! One static subnet routed through the WireGuard interface, installed at
//! startup and idempotent against "route already exists".

use std::net::IpAddr;

use net_route::{Handle, Route};
use tracing::{info, warn};

use crate::error::{Result, WgError};

/// Install the route for `subnet` (CIDR form) through `interface`. An
/// already-present route is logged and treated as success.
pub async fn ensure_peer_route(interface: &str, subnet: &str) -> Result<()> {
	let (address, prefix) = parse_subnet(interface, subnet)?;

	let ifindex = nix::net::if_::if_nametoindex(interface).map_err(|_| {
		WgError::InterfaceNotFound {
			interface: interface.to_string(),
		}
	})?;

	let route_error = |source: std::io::Error| WgError::Route {
		interface: interface.to_string(),
		subnet: subnet.to_string(),
		source,
	};

	let handle = Handle::new().map_err(route_error)?;
	let route = Route::new(address, prefix).with_ifindex(ifindex);

	match handle.add(&route).await {
		Ok(()) => {
			info!(interface, subnet, "installed peer subnet route");
			Ok(())
		}
		Err(e)
			if e.kind() == std::io::ErrorKind::AlreadyExists
				|| e.raw_os_error() == Some(nix::libc::EEXIST) =>
		{
			warn!(interface, subnet, "peer subnet route already present");
			Ok(())
		}
		Err(e) => Err(route_error(e)),
	}
}

fn parse_subnet(interface: &str, subnet: &str) -> Result<(IpAddr, u8)> {
	let invalid = |reason: String| WgError::Route {
		interface: interface.to_string(),
		subnet: subnet.to_string(),
		source: std::io::Error::new(std::io::ErrorKind::InvalidInput, reason),
	};
	let (address, prefix) = subnet
		.split_once('/')
		.ok_or_else(|| invalid("not in address/prefix form".to_string()))?;
	let address: IpAddr = address.parse().map_err(|e| invalid(format!("{e}")))?;
	let prefix: u8 = prefix.parse().map_err(|e| invalid(format!("{e}")))?;
	let max = if address.is_ipv4() { 32 } else { 128 };
	if prefix > max {
		return Err(invalid(format!("prefix exceeds /{max}")));
	}
	Ok((address, prefix))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_parse_subnet() {
		let (address, prefix) = parse_subnet("wg0", "10.10.0.0/16").unwrap();
		assert_eq!(address, "10.10.0.0".parse::<IpAddr>().unwrap());
		assert_eq!(prefix, 16);
	}

	#[test]
	fn test_parse_subnet_rejects_garbage() {
		for bad in ["10.10.0.0", "nope/16", "10.10.0.0/33"] {
			assert!(matches!(
				parse_subnet("wg0", bad),
				Err(WgError::Route { .. })
			));
		}
	}
}
