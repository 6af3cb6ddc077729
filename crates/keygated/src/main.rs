// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

mod config;
mod listener;

use std::collections::BTreeMap;

use anyhow::Context;
use chrono::Utc;
use clap::Parser;
use keygate_auth::{AuthError, Credential, CredentialFile, OauthConfig, TokenAuthority};
use keygate_wg::{ensure_peer_route, KernelSurface, PeerSpec, Reconciler};
use tracing::{error, info, warn};
use tracing_subscriber::EnvFilter;

use config::{Args, Config};
use listener::{CallbackListener, CALLBACK_ADDR};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	tracing_subscriber::fmt()
		.with_env_filter(
			EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| EnvFilter::new(args.log_level.clone())),
		)
		.init();

	let config = Config::load(&args.config)
		.with_context(|| format!("loading {}", args.config.display()))?;
	info!(config = %args.config.display(), interface = %config.interface, "starting keygated");

	let oauth = OauthConfig::new(
		&config.oauth.client_id,
		&config.oauth.auth_url,
		&config.oauth.token_url,
	)?;
	let authority = TokenAuthority::new(oauth, CredentialFile::new(&config.credentials_file));

	let mut credential = obtain_credential(&authority).await?;
	info!(
		expiry = credential.expiry.map(|e| e.to_rfc3339()).as_deref(),
		"holding identity credential"
	);

	ensure_peer_route(&config.interface, &config.peer_subnet).await?;

	let desired: BTreeMap<String, PeerSpec> = config
		.peers
		.iter()
		.map(|spec| (spec.public_key.clone(), spec.clone()))
		.collect();
	let reconciler = Reconciler::new(config.interface.clone(), KernelSurface::new());

	let mut ticker = tokio::time::interval(std::time::Duration::from_secs(args.reconcile_secs));
	loop {
		ticker.tick().await;

		if credential.is_expired(Utc::now()) {
			warn!("identity credential expired; running a new ceremony");
			match run_ceremony(&authority).await {
				Ok(fresh) => credential = fresh,
				Err(e) => {
					error!(error = %e, "ceremony failed; skipping reconciliation pass");
					continue;
				}
			}
		}

		if let Err(e) = reconciler.reconcile(&desired) {
			error!(error = %e, "reconciliation pass failed");
		}
	}
}

/// Reuse the cached credential when present and unexpired; otherwise run
/// a fresh ceremony. Absent, expired and corrupt caches all mean
/// re-ceremony, but each is logged for what it is.
async fn obtain_credential(authority: &TokenAuthority) -> anyhow::Result<Credential> {
	match authority.load_cached_credential() {
		Ok(credential) if !credential.is_expired(Utc::now()) => {
			info!("using cached credential");
			return Ok(credential);
		}
		Ok(_) => info!("cached credential has expired"),
		Err(AuthError::CredentialNotFound { .. }) => info!("no cached credential; first-time setup"),
		Err(AuthError::CorruptCredential { path, .. }) => {
			warn!(path = %path, "cached credential is corrupt; discarding")
		}
		Err(e) => return Err(e).context("reading credential cache"),
	}
	run_ceremony(authority).await
}

/// One full authorization ceremony: challenge, browser redirect, code
/// handoff, token exchange. The credential is persisted by the exchange.
async fn run_ceremony(authority: &TokenAuthority) -> anyhow::Result<Credential> {
	let (ceremony, sink) = authority.begin_challenge()?;
	let listener = CallbackListener::bind(CALLBACK_ADDR, sink)
		.await
		.context("binding the OAuth callback listener")?;

	println!("Visit the following URL to sign in:\n\n  {}\n", ceremony.authorize_url());

	let authorized = ceremony.wait_for_code().await;
	listener.shutdown();

	let credential = authority.exchange_token(authorized?).await?;
	Ok(credential)
}
