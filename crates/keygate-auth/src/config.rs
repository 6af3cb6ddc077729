// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use url::Url;

use crate::error::{AuthError, Result};

/// Default local redirect captured by the callback listener.
pub const DEFAULT_REDIRECT_URL: &str = "http://localhost:7773/oauth2/callback";

/// Scopes requested during authorization. Identity is the goal, so only
/// OpenID Connect scopes are asked for.
pub const SCOPES: &[&str] = &["openid", "email"];

/// OAuth 2.0 endpoint configuration for a [`crate::TokenAuthority`].
#[derive(Debug, Clone)]
pub struct OauthConfig {
	pub client_id: String,
	pub auth_url: Url,
	pub token_url: Url,
	pub redirect_url: Url,
	pub scopes: Vec<String>,
}

impl OauthConfig {
	pub fn new(client_id: impl Into<String>, auth_url: &str, token_url: &str) -> Result<Self> {
		let client_id = client_id.into();
		if client_id.is_empty() {
			return Err(AuthError::Config("client_id must not be empty".to_string()));
		}
		Ok(Self {
			client_id,
			auth_url: parse_url("auth_url", auth_url)?,
			token_url: parse_url("token_url", token_url)?,
			redirect_url: Url::parse(DEFAULT_REDIRECT_URL).expect("default redirect URL is valid"),
			scopes: SCOPES.iter().map(|s| s.to_string()).collect(),
		})
	}

	/// Override the redirect URL (tests, non-default listener port).
	pub fn with_redirect_url(mut self, redirect_url: &str) -> Result<Self> {
		self.redirect_url = parse_url("redirect_url", redirect_url)?;
		Ok(self)
	}
}

fn parse_url(field: &str, value: &str) -> Result<Url> {
	Url::parse(value).map_err(|e| AuthError::Config(format!("invalid {field} {value:?}: {e}")))
}
