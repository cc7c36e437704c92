// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::keys::{WgKeyPair, WgPrivateKey, WgPublicKey};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::fs;
use tokio::io::AsyncWriteExt;
use tracing::{info, instrument, warn};

pub const SERVER_PRIVATE_KEY_FILE: &str = "server_private.key";
pub const SERVER_PUBLIC_KEY_FILE: &str = "server_public.key";

#[derive(Error, Debug)]
pub enum KeyFileError {
	#[error("failed to access key file {path}: {source}")]
	Io {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid key in {path}: {source}")]
	InvalidFormat {
		path: PathBuf,
		#[source]
		source: crate::keys::KeyError,
	},
}

pub type Result<T> = std::result::Result<T, KeyFileError>;

fn io_err(path: &Path) -> impl FnOnce(std::io::Error) -> KeyFileError + '_ {
	move |source| KeyFileError::Io {
		path: path.to_path_buf(),
		source,
	}
}

#[instrument(skip_all, fields(path = %path.as_ref().display()))]
pub async fn load_private_key(path: impl AsRef<Path>) -> Result<WgKeyPair> {
	let path = path.as_ref();
	let content = zeroize::Zeroizing::new(fs::read_to_string(path).await.map_err(io_err(path))?);
	let private =
		WgPrivateKey::from_base64(content.trim()).map_err(|source| KeyFileError::InvalidFormat {
			path: path.to_path_buf(),
			source,
		})?;
	Ok(WgKeyPair::from_private_key(private))
}

/// Writes `content` to `path` with the given unix mode, replacing any
/// existing file. Parent directories are created.
#[instrument(skip(content), fields(path = %path.display()))]
pub async fn write_file_with_mode(path: &Path, content: &[u8], mode: u32) -> std::io::Result<()> {
	if let Some(parent) = path.parent() {
		fs::create_dir_all(parent).await?;
	}

	let mut options = fs::OpenOptions::new();
	options.write(true).create(true).truncate(true);
	#[cfg(unix)]
	options.mode(mode);
	#[cfg(not(unix))]
	let _ = mode;

	let mut file = options.open(path).await?;
	file.write_all(content).await?;
	file.sync_all().await?;

	// `mode` only applies on creation; tighten a pre-existing file too.
	#[cfg(unix)]
	{
		use std::os::unix::fs::PermissionsExt;
		fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await?;
	}

	Ok(())
}

#[instrument(skip(key), fields(dir = %dir.as_ref().display()))]
pub async fn save_server_key(key: &WgKeyPair, dir: impl AsRef<Path>) -> Result<()> {
	let dir = dir.as_ref();
	let private_path = dir.join(SERVER_PRIVATE_KEY_FILE);
	let public_path = dir.join(SERVER_PUBLIC_KEY_FILE);

	let private_b64 = key.private_key().to_base64();
	let content = zeroize::Zeroizing::new(format!("{}\n", private_b64.as_str()));
	write_file_with_mode(&private_path, content.as_bytes(), 0o600)
		.await
		.map_err(io_err(&private_path))?;

	let public = format!("{}\n", key.public_key().to_base64());
	write_file_with_mode(&public_path, public.as_bytes(), 0o644)
		.await
		.map_err(io_err(&public_path))?;

	Ok(())
}

/// Loads the server identity from `dir`, generating and persisting a new
/// key pair on first use.
///
/// The public key file is rewritten when it is missing or disagrees with
/// the private key, since the private key is the only source of truth.
#[instrument(skip_all, fields(dir = %dir.as_ref().display()))]
pub async fn load_or_create_server_key(dir: impl AsRef<Path>) -> Result<WgKeyPair> {
	let dir = dir.as_ref();
	let private_path = dir.join(SERVER_PRIVATE_KEY_FILE);

	if fs::try_exists(&private_path)
		.await
		.map_err(io_err(&private_path))?
	{
		let keypair = load_private_key(&private_path).await?;
		let public_path = dir.join(SERVER_PUBLIC_KEY_FILE);
		let stored_public = fs::read_to_string(&public_path)
			.await
			.ok()
			.and_then(|s| WgPublicKey::from_base64(&s).ok());
		if stored_public.as_ref() != Some(keypair.public_key()) {
			warn!("server public key file missing or stale, rewriting");
			let public = format!("{}\n", keypair.public_key().to_base64());
			write_file_with_mode(&public_path, public.as_bytes(), 0o644)
				.await
				.map_err(io_err(&public_path))?;
		}
		return Ok(keypair);
	}

	let keypair = WgKeyPair::generate();
	save_server_key(&keypair, dir).await?;
	info!(public_key = %keypair.public_key(), "generated server key pair");
	Ok(keypair)
}

#[cfg(test)]
mod tests {
	use super::*;
	use tempfile::TempDir;

	#[tokio::test]
	async fn creates_then_reuses_server_key() {
		let temp_dir = TempDir::new().unwrap();

		let first = load_or_create_server_key(temp_dir.path()).await.unwrap();
		let second = load_or_create_server_key(temp_dir.path()).await.unwrap();

		assert_eq!(first.public_key(), second.public_key());
		assert!(temp_dir.path().join(SERVER_PRIVATE_KEY_FILE).exists());
	}

	#[tokio::test]
	async fn public_key_file_matches_private_key() {
		let temp_dir = TempDir::new().unwrap();
		let keypair = load_or_create_server_key(temp_dir.path()).await.unwrap();

		let public = std::fs::read_to_string(temp_dir.path().join(SERVER_PUBLIC_KEY_FILE)).unwrap();
		assert_eq!(public.trim(), keypair.public_key().to_base64());
	}

	#[tokio::test]
	async fn rewrites_stale_public_key_file() {
		let temp_dir = TempDir::new().unwrap();
		let keypair = load_or_create_server_key(temp_dir.path()).await.unwrap();
		let public_path = temp_dir.path().join(SERVER_PUBLIC_KEY_FILE);
		std::fs::write(&public_path, "garbage\n").unwrap();

		load_or_create_server_key(temp_dir.path()).await.unwrap();

		let public = std::fs::read_to_string(&public_path).unwrap();
		assert_eq!(public.trim(), keypair.public_key().to_base64());
	}

	#[tokio::test]
	#[cfg(unix)]
	async fn private_key_is_owner_only() {
		use std::os::unix::fs::PermissionsExt;

		let temp_dir = TempDir::new().unwrap();
		load_or_create_server_key(temp_dir.path()).await.unwrap();

		let metadata = std::fs::metadata(temp_dir.path().join(SERVER_PRIVATE_KEY_FILE)).unwrap();
		assert_eq!(metadata.permissions().mode() & 0o777, 0o600);
	}

	#[tokio::test]
	async fn corrupt_private_key_is_reported() {
		let temp_dir = TempDir::new().unwrap();
		std::fs::write(temp_dir.path().join(SERVER_PRIVATE_KEY_FILE), "short\n").unwrap();

		let err = load_or_create_server_key(temp_dir.path()).await.unwrap_err();
		assert!(matches!(err, KeyFileError::InvalidFormat { .. }));
	}
}
