// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable identity-credential cache.
//!
//! The credential file is the terminal artifact of a ceremony: a JSON
//! object with `id_token` and an optional RFC 3339 `expiry`, stored with
//! owner-only permissions and overwritten wholesale on each exchange.
//! Writes go through a temp file and a rename so a crash mid-write never
//! leaves a half-written credential readable by a later load.

use std::fs::{self, File, OpenOptions};
use std::io::Write;
use std::os::unix::fs::OpenOptionsExt;
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::error::{AuthError, Result};

/// Identity credential produced by a successful token exchange.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credential {
	pub id_token: String,
	#[serde(default, skip_serializing_if = "Option::is_none")]
	pub expiry: Option<DateTime<Utc>>,
}

impl Credential {
	/// Whether the credential has expired as of `now`. A credential with no
	/// recorded expiry never expires. Load does not call this; the caller
	/// decides whether an expired credential warrants a new ceremony.
	pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
		self.expiry.is_some_and(|e| e <= now)
	}
}

/// File-backed credential store with full-file overwrite semantics.
#[derive(Debug, Clone)]
pub struct CredentialFile {
	path: PathBuf,
}

impl CredentialFile {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// Read the cached credential. Does not check expiry.
	pub fn load(&self) -> Result<Credential> {
		let data = match fs::read(&self.path) {
			Ok(data) => data,
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
				return Err(AuthError::CredentialNotFound {
					path: self.path.display().to_string(),
				});
			}
			Err(e) => {
				return Err(AuthError::CredentialIo {
					path: self.path.display().to_string(),
					source: e,
				});
			}
		};
		let credential = serde_json::from_slice(&data).map_err(|e| AuthError::CorruptCredential {
			path: self.path.display().to_string(),
			source: e,
		})?;
		debug!(path = %self.path.display(), "loaded cached credential");
		Ok(credential)
	}

	/// Overwrite the store atomically: write a 0600 temp file next to the
	/// target, then rename it into place.
	pub fn save(&self, credential: &Credential) -> Result<()> {
		let tmp = self.tmp_path();
		{
			let mut file = self.open_owner_only(&tmp)?;
			let data = serde_json::to_vec(credential).map_err(|e| {
				self.io_error(std::io::Error::new(std::io::ErrorKind::InvalidData, e))
			})?;
			file.write_all(&data).map_err(|e| self.io_error(e))?;
			file.sync_all().map_err(|e| self.io_error(e))?;
		}
		fs::rename(&tmp, &self.path).map_err(|e| self.io_error(e))?;
		info!(path = %self.path.display(), "saved credential");
		Ok(())
	}

	fn tmp_path(&self) -> PathBuf {
		let name = self
			.path
			.file_name()
			.map(|n| n.to_string_lossy().into_owned())
			.unwrap_or_else(|| "credential".to_string());
		self.path.with_file_name(format!("{name}.tmp"))
	}

	fn open_owner_only(&self, path: &Path) -> Result<File> {
		OpenOptions::new()
			.write(true)
			.create(true)
			.truncate(true)
			.mode(0o600)
			.open(path)
			.map_err(|e| self.io_error(e))
	}

	fn io_error(&self, source: std::io::Error) -> AuthError {
		AuthError::CredentialIo {
			path: self.path.display().to_string(),
			source,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::TimeZone;

	fn sample() -> Credential {
		Credential {
			id_token: "eyJhbGciOiJSUzI1NiJ9.payload.sig".to_string(),
			expiry: Some(Utc.with_ymd_and_hms(2026, 1, 1, 0, 0, 0).unwrap()),
		}
	}

	#[test]
	fn test_save_load_roundtrip() {
		let dir = tempfile::tempdir().unwrap();
		let store = CredentialFile::new(dir.path().join("credential.json"));

		let credential = sample();
		store.save(&credential).unwrap();

		let loaded = store.load().unwrap();
		assert_eq!(loaded, credential);
	}

	#[test]
	fn test_save_overwrites_wholesale() {
		let dir = tempfile::tempdir().unwrap();
		let store = CredentialFile::new(dir.path().join("credential.json"));

		store.save(&sample()).unwrap();
		let replacement = Credential {
			id_token: "second".to_string(),
			expiry: None,
		};
		store.save(&replacement).unwrap();

		assert_eq!(store.load().unwrap(), replacement);
	}

	#[test]
	fn test_load_missing_is_not_found() {
		let dir = tempfile::tempdir().unwrap();
		let store = CredentialFile::new(dir.path().join("absent.json"));

		assert!(matches!(
			store.load(),
			Err(AuthError::CredentialNotFound { .. })
		));
	}

	#[test]
	fn test_load_corrupt_is_distinct() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("credential.json");
		fs::write(&path, b"{not json").unwrap();
		let store = CredentialFile::new(&path);

		assert!(matches!(
			store.load(),
			Err(AuthError::CorruptCredential { .. })
		));
	}

	#[test]
	fn test_expiry_omitted_when_none() {
		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("credential.json");
		let store = CredentialFile::new(&path);
		store
			.save(&Credential {
				id_token: "tok".to_string(),
				expiry: None,
			})
			.unwrap();

		let raw = fs::read_to_string(&path).unwrap();
		assert!(!raw.contains("expiry"));
	}

	#[test]
	fn test_owner_only_permissions() {
		use std::os::unix::fs::PermissionsExt;

		let dir = tempfile::tempdir().unwrap();
		let path = dir.path().join("credential.json");
		CredentialFile::new(&path).save(&sample()).unwrap();

		let mode = fs::metadata(&path).unwrap().permissions().mode();
		assert_eq!(mode & 0o777, 0o600);
	}

	#[test]
	fn test_is_expired() {
		let credential = sample();
		let before = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
		let after = Utc.with_ymd_and_hms(2027, 1, 1, 0, 0, 0).unwrap();

		assert!(!credential.is_expired(before));
		assert!(credential.is_expired(after));

		let forever = Credential {
			id_token: "tok".to_string(),
			expiry: None,
		};
		assert!(!forever.is_expired(after));
	}
}
