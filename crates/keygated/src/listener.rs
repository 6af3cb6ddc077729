// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Local HTTP listener for the authorization redirect.
//!
//! Serves exactly one route: the OAuth callback. The first request
//! carrying `code` and `state` is delivered through the [`CodeSink`] to
//! the waiting ceremony; later hits get a stale-ceremony page. Timeout
//! and cancellation live here and in the caller, never in the ceremony.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use axum::extract::{Query, State};
use axum::response::Html;
use axum::routing::get;
use axum::Router;
use keygate_auth::{CodeSink, RedirectParams};
use serde::Deserialize;
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

/// Fixed local address the redirect URI points at.
pub const CALLBACK_ADDR: &str = "127.0.0.1:7773";
pub const CALLBACK_PATH: &str = "/oauth2/callback";

const SUCCESS_PAGE: &str =
	"<html><body><p>Signed in. You can close this tab and return to keygated.</p></body></html>";
const MISSING_PARAMS_PAGE: &str =
	"<html><body><p>Redirect is missing the code or state parameter.</p></body></html>";
const STALE_PAGE: &str = "<html><body><p>No ceremony is waiting for this code.</p></body></html>";

/// A bound callback listener; abort the handle once the ceremony is done.
#[derive(Debug)]
pub struct CallbackListener {
	pub local_addr: SocketAddr,
	handle: JoinHandle<()>,
}

impl CallbackListener {
	/// Bind `addr` and serve the callback route, delivering the first
	/// captured code through `sink`.
	pub async fn bind(addr: &str, sink: CodeSink) -> std::io::Result<Self> {
		let listener = TcpListener::bind(addr).await?;
		let local_addr = listener.local_addr()?;

		let state = Arc::new(ListenerState {
			sink: Mutex::new(Some(sink)),
		});
		let app = Router::new()
			.route(CALLBACK_PATH, get(callback))
			.with_state(state);

		info!(%local_addr, "callback listener bound");
		let handle = tokio::spawn(async move {
			if let Err(e) = axum::serve(listener, app).await {
				warn!(error = %e, "callback listener stopped");
			}
		});

		Ok(Self { local_addr, handle })
	}

	pub fn shutdown(self) {
		self.handle.abort();
	}
}

#[derive(Debug)]
struct ListenerState {
	sink: Mutex<Option<CodeSink>>,
}

#[derive(Debug, Deserialize)]
struct CallbackQuery {
	#[serde(default)]
	code: Option<String>,
	#[serde(default)]
	state: Option<String>,
}

async fn callback(
	State(listener): State<Arc<ListenerState>>,
	Query(query): Query<CallbackQuery>,
) -> Html<&'static str> {
	let (Some(code), Some(state)) = (query.code, query.state) else {
		warn!("callback hit without code/state parameters");
		return Html(MISSING_PARAMS_PAGE);
	};

	let Some(sink) = listener.sink.lock().expect("sink lock poisoned").take() else {
		warn!("callback hit but no ceremony is waiting");
		return Html(STALE_PAGE);
	};

	if sink.deliver(RedirectParams { code, state }) {
		debug!("authorization code delivered to ceremony");
		Html(SUCCESS_PAGE)
	} else {
		warn!("ceremony dropped before the code arrived");
		Html(STALE_PAGE)
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use keygate_auth::{CredentialFile, OauthConfig, TokenAuthority};

	fn authority(dir: &std::path::Path) -> TokenAuthority {
		let config = OauthConfig::new(
			"keygate-client",
			"https://issuer.example.com/authorize",
			"https://issuer.example.com/token",
		)
		.unwrap();
		TokenAuthority::new(config, CredentialFile::new(dir.join("credential.json")))
	}

	#[tokio::test]
	async fn test_callback_delivers_code_to_ceremony() {
		let dir = tempfile::tempdir().unwrap();
		let (ceremony, sink) = authority(dir.path()).begin_challenge().unwrap();
		let state = ceremony
			.authorize_url()
			.query_pairs()
			.find(|(k, _)| k == "state")
			.map(|(_, v)| v.into_owned())
			.unwrap();

		let listener = CallbackListener::bind("127.0.0.1:0", sink).await.unwrap();
		let url = format!(
			"http://{}{CALLBACK_PATH}?code=auth-code&state={state}",
			listener.local_addr
		);

		let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
		assert!(body.contains("Signed in"));

		ceremony.wait_for_code().await.unwrap();
		listener.shutdown();
	}

	#[tokio::test]
	async fn test_second_hit_is_stale() {
		let dir = tempfile::tempdir().unwrap();
		let (ceremony, sink) = authority(dir.path()).begin_challenge().unwrap();
		drop(ceremony);

		let listener = CallbackListener::bind("127.0.0.1:0", sink).await.unwrap();
		let url = format!(
			"http://{}{CALLBACK_PATH}?code=c&state=s",
			listener.local_addr
		);

		// First hit consumes the sink (delivery fails, ceremony gone).
		reqwest::get(&url).await.unwrap();
		let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
		assert!(body.contains("No ceremony"));
		listener.shutdown();
	}

	#[tokio::test]
	async fn test_missing_params_page() {
		let dir = tempfile::tempdir().unwrap();
		let (_ceremony, sink) = authority(dir.path()).begin_challenge().unwrap();

		let listener = CallbackListener::bind("127.0.0.1:0", sink).await.unwrap();
		let url = format!("http://{}{CALLBACK_PATH}", listener.local_addr);

		let body = reqwest::get(&url).await.unwrap().text().await.unwrap();
		assert!(body.contains("missing"));
		listener.shutdown();
	}
}
