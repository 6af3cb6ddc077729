// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The authorization-code ceremony state machine.
//!
//! One [`TokenAuthority`] runs one ceremony at a time. `begin_challenge`
//! mints the PKCE pair and hands back a [`Ceremony`] (held by the caller)
//! and a [`CodeSink`] (handed to the redirect listener). The sink is a
//! single-slot oneshot handoff: [`Ceremony::wait_for_code`] is the one
//! suspension point, with no timeout at this layer. A second concurrent
//! ceremony needs a second `begin_challenge` call, which mints a fresh
//! pair; instances share no mutable state.

use chrono::{Duration, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;
use tracing::{debug, info, warn};
use url::Url;

use crate::config::OauthConfig;
use crate::credentials::{Credential, CredentialFile};
use crate::error::{AuthError, Result};
use crate::pkce::{random_state, Pkce};

/// Query parameters captured from the authorization redirect.
#[derive(Debug, Clone)]
pub struct RedirectParams {
	pub code: String,
	pub state: String,
}

/// Sending half of the code handoff, owned by the redirect listener.
#[derive(Debug)]
pub struct CodeSink(oneshot::Sender<RedirectParams>);

impl CodeSink {
	/// Deliver the captured redirect to the waiting ceremony. Returns false
	/// if the ceremony was dropped before the code arrived.
	pub fn deliver(self, params: RedirectParams) -> bool {
		self.0.send(params).is_ok()
	}
}

/// A ceremony whose challenge has been issued; waiting for the redirect.
#[derive(Debug)]
pub struct Ceremony {
	authorize_url: Url,
	verifier: String,
	expected_state: String,
	code_rx: oneshot::Receiver<RedirectParams>,
}

impl Ceremony {
	/// The URL the user agent must be directed to.
	pub fn authorize_url(&self) -> &Url {
		&self.authorize_url
	}

	/// Suspend until the listener delivers the authorization code. The
	/// delivered state must match the one embedded in the challenge.
	pub async fn wait_for_code(self) -> Result<AuthorizedCeremony> {
		let params = self.code_rx.await.map_err(|_| AuthError::ListenerClosed)?;
		if params.state != self.expected_state {
			warn!("authorization redirect carried a mismatched state value");
			return Err(AuthError::StateMismatch {
				expected: self.expected_state,
				received: params.state,
			});
		}
		debug!("authorization code received");
		Ok(AuthorizedCeremony {
			code: params.code,
			verifier: self.verifier,
		})
	}
}

/// A ceremony holding a received code, ready for the token exchange.
#[derive(Debug)]
pub struct AuthorizedCeremony {
	code: String,
	verifier: String,
}

/// Token exchange request body (form-encoded).
#[derive(Debug, Serialize)]
struct TokenExchangeRequest {
	grant_type: &'static str,
	code: String,
	redirect_uri: String,
	client_id: String,
	code_verifier: String,
}

/// Successful token response. Only the identity fields matter here; the
/// access/refresh tokens are not a valid outcome on their own.
#[derive(Debug, Deserialize)]
struct TokenResponse {
	#[serde(default)]
	id_token: Option<String>,
	#[serde(default)]
	expires_in: Option<i64>,
}

/// Error response from the token endpoint.
#[derive(Debug, Deserialize)]
struct TokenErrorResponse {
	error: String,
	#[serde(default)]
	error_description: Option<String>,
}

/// Runs PKCE authorization-code ceremonies and owns the credential cache.
#[derive(Debug)]
pub struct TokenAuthority {
	config: OauthConfig,
	store: CredentialFile,
}

impl TokenAuthority {
	pub fn new(config: OauthConfig, store: CredentialFile) -> Self {
		Self { config, store }
	}

	/// Start a ceremony: generate the PKCE pair and anti-forgery state,
	/// build the authorization URL. The returned sink goes to the redirect
	/// listener; it is single-use and never persisted.
	pub fn begin_challenge(&self) -> Result<(Ceremony, CodeSink)> {
		let pkce = Pkce::generate()?;
		let state = random_state()?;

		let mut url = self.config.auth_url.clone();
		{
			let mut params = url.query_pairs_mut();
			params.append_pair("client_id", &self.config.client_id);
			params.append_pair("response_type", "code");
			params.append_pair("redirect_uri", self.config.redirect_url.as_str());
			params.append_pair("scope", &self.config.scopes.join(" "));
			params.append_pair("code_challenge", &pkce.challenge);
			params.append_pair("code_challenge_method", "S256");
			params.append_pair("state", &state);
		}

		let (tx, rx) = oneshot::channel();
		debug!("issued PKCE challenge");

		Ok((
			Ceremony {
				authorize_url: url,
				verifier: pkce.verifier,
				expected_state: state,
				code_rx: rx,
			},
			CodeSink(tx),
		))
	}

	/// Exchange the authorization code for an identity token, persist the
	/// resulting credential, and return it. Any failure aborts the in-flight
	/// ceremony and is surfaced to the caller; retry policy lives there.
	pub async fn exchange_token(&self, ceremony: AuthorizedCeremony) -> Result<Credential> {
		let request = TokenExchangeRequest {
			grant_type: "authorization_code",
			code: ceremony.code,
			redirect_uri: self.config.redirect_url.to_string(),
			client_id: self.config.client_id.clone(),
			code_verifier: ceremony.verifier,
		};

		debug!(endpoint = %self.config.token_url, "exchanging authorization code");

		let response = crate::http::new_client()
			.post(self.config.token_url.clone())
			.form(&request)
			.send()
			.await?;

		let status = response.status();
		let body = response.text().await?;

		if !status.is_success() {
			let message = match serde_json::from_str::<TokenErrorResponse>(&body) {
				Ok(err) => err.error_description.unwrap_or(err.error),
				Err(_) => body,
			};
			warn!(status = %status, error = %message, "token exchange rejected");
			return Err(AuthError::ExchangeRejected {
				status: status.as_u16(),
				message,
			});
		}

		let credential = parse_token_response(&body)?;
		self.store.save(&credential)?;
		info!("token exchange succeeded");
		Ok(credential)
	}

	/// Read the cached credential, independent of any live ceremony. Does
	/// not check expiry.
	pub fn load_cached_credential(&self) -> Result<Credential> {
		self.store.load()
	}

	pub fn persist_credential(&self, credential: &Credential) -> Result<()> {
		self.store.save(credential)
	}
}

/// Extract the identity credential from a successful token response body.
fn parse_token_response(body: &str) -> Result<Credential> {
	let response: TokenResponse = serde_json::from_str(body)
		.map_err(|e| AuthError::MalformedTokenResponse(e.to_string()))?;
	let id_token = response.id_token.ok_or(AuthError::MissingIdentityToken)?;
	let expiry = response
		.expires_in
		.map(|seconds| Utc::now() + Duration::seconds(seconds));
	Ok(Credential { id_token, expiry })
}
