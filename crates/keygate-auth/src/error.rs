// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AuthError {
	#[error("cannot generate PKCE challenge: {0}")]
	ChallengeGeneration(String),

	#[error("callback listener closed before delivering an authorization code")]
	ListenerClosed,

	#[error("anti-forgery state mismatch: expected {expected}, redirect carried {received}")]
	StateMismatch { expected: String, received: String },

	#[error("token exchange request failed: {0}")]
	Http(#[from] reqwest::Error),

	#[error("token endpoint rejected the exchange: {status} - {message}")]
	ExchangeRejected { status: u16, message: String },

	#[error("token response cannot be parsed: {0}")]
	MalformedTokenResponse(String),

	#[error("token response carries no id_token; identity is required, an access token alone is not enough")]
	MissingIdentityToken,

	#[error("no cached credential at {path}")]
	CredentialNotFound { path: String },

	#[error("cached credential at {path} cannot be parsed: {source}")]
	CorruptCredential {
		path: String,
		#[source]
		source: serde_json::Error,
	},

	#[error("credential store I/O error at {path}: {source}")]
	CredentialIo {
		path: String,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid OAuth configuration: {0}")]
	Config(String),
}

pub type Result<T> = std::result::Result<T, AuthError>;
