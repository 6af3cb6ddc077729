// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! PKCE (Proof Key for Code Exchange) implementation for OAuth 2.0.
//!
//! Implements RFC 7636 with S256 challenge method.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use sha2::{Digest, Sha256};

use crate::error::{AuthError, Result};

/// PKCE (Proof Key for Code Exchange) values for OAuth 2.0.
#[derive(Debug, Clone)]
pub struct Pkce {
	/// The code verifier (random string, 43-128 characters).
	pub verifier: String,
	/// The code challenge (SHA256 hash of verifier, base64url encoded).
	pub challenge: String,
}

impl Pkce {
	/// Generate a new PKCE pair with cryptographically secure random bytes.
	pub fn generate() -> Result<Self> {
		let mut verifier_bytes = [0u8; 32];
		getrandom::getrandom(&mut verifier_bytes)
			.map_err(|e| AuthError::ChallengeGeneration(e.to_string()))?;
		let verifier = URL_SAFE_NO_PAD.encode(verifier_bytes);

		Ok(Self::from_verifier(verifier))
	}

	/// Create a PKCE pair from an existing verifier (for testing or reconstruction).
	pub fn from_verifier(verifier: impl Into<String>) -> Self {
		let verifier = verifier.into();
		let mut hasher = Sha256::new();
		hasher.update(verifier.as_bytes());
		let hash = hasher.finalize();
		let challenge = URL_SAFE_NO_PAD.encode(hash);

		Self {
			verifier,
			challenge,
		}
	}
}

/// Generate an opaque anti-forgery state value for the authorization request.
pub fn random_state() -> Result<String> {
	let mut bytes = [0u8; 16];
	getrandom::getrandom(&mut bytes).map_err(|e| AuthError::ChallengeGeneration(e.to_string()))?;
	Ok(URL_SAFE_NO_PAD.encode(bytes))
}
