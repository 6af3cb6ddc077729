// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! OAuth 2.0 + PKCE identity-token ceremony for Keygate.
//!
//! This crate turns a browser redirect into a cached, verifiable identity
//! credential:
//!
//! 1. [`TokenAuthority::begin_challenge`] mints a PKCE pair and an
//!    anti-forgery state value, and builds the authorization URL.
//! 2. The external callback listener captures the redirect and delivers the
//!    authorization code through the [`CodeSink`].
//! 3. [`Ceremony::wait_for_code`] resumes the waiting caller.
//! 4. [`TokenAuthority::exchange_token`] trades the code (plus the original
//!    verifier) for an identity token and persists it as a [`Credential`].
//!
//! The cached credential is readable at any time via [`CredentialFile`],
//! independent of any live ceremony. Expiry evaluation is the caller's
//! responsibility: an expired credential and an absent one warrant
//! different behavior.

pub mod ceremony;
pub mod config;
pub mod credentials;
pub mod error;
pub mod http;
pub mod pkce;

pub use ceremony::{AuthorizedCeremony, Ceremony, CodeSink, RedirectParams, TokenAuthority};
pub use config::OauthConfig;
pub use credentials::{Credential, CredentialFile};
pub use error::{AuthError, Result};
pub use pkce::Pkce;
