// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{info, instrument, warn};
use wgmgr_common::{write_file_with_mode, Peer, WgKeyPair, WgPublicKey};
use zeroize::Zeroizing;

use crate::control::DaemonControl;
use crate::error::{Result, SyncError};
use crate::render::{render_server_config, InterfaceSettings};

/// Projects a registry snapshot onto the daemon.
///
/// Every sync rewrites the whole configuration file from the peers it is
/// given and then reloads the daemon, so the daemon's view never depends on
/// an earlier sync.
pub struct Synchronizer {
	settings: InterfaceSettings,
	server_key: WgKeyPair,
	config_path: PathBuf,
	control: Arc<dyn DaemonControl>,
	reload_timeout: Duration,
}

impl Synchronizer {
	pub fn new(
		settings: InterfaceSettings,
		server_key: WgKeyPair,
		config_path: impl Into<PathBuf>,
		control: Arc<dyn DaemonControl>,
		reload_timeout: Duration,
	) -> Self {
		Self {
			settings,
			server_key,
			config_path: config_path.into(),
			control,
			reload_timeout,
		}
	}

	pub fn config_path(&self) -> &Path {
		&self.config_path
	}

	pub fn server_public_key(&self) -> &WgPublicKey {
		self.server_key.public_key()
	}

	pub fn render(&self, peers: &[Peer]) -> Zeroizing<String> {
		render_server_config(&self.settings, self.server_key.private_key(), peers)
	}

	/// Writes the configuration for `peers` without reloading the daemon.
	#[instrument(skip_all, fields(config = %self.config_path.display(), peers = peers.len()))]
	pub async fn write_config(&self, peers: &[Peer]) -> Result<()> {
		let rendered = self.render(peers);
		write_atomic(&self.config_path, rendered.as_bytes()).await
	}

	/// Writes the configuration for `peers` and waits for the daemon to load
	/// it. Any failure, including the reload outliving its timeout, means the
	/// daemon cannot be assumed to run this configuration.
	#[instrument(
		skip_all,
		fields(config = %self.config_path.display(), control = self.control.name(), peers = peers.len())
	)]
	pub async fn sync(&self, peers: &[Peer]) -> Result<()> {
		self.write_config(peers).await?;

		match timeout(self.reload_timeout, self.control.reload(&self.config_path)).await {
			Ok(Ok(())) => {
				info!("daemon reloaded");
				Ok(())
			}
			Ok(Err(e)) => {
				warn!(error = %e, "daemon reload failed");
				Err(e)
			}
			Err(_) => {
				warn!(timeout = ?self.reload_timeout, "daemon reload timed out");
				Err(SyncError::Timeout(self.reload_timeout))
			}
		}
	}
}

/// Replaces `path` with `content` via a sibling temp file and a rename, so
/// readers see either the old file or the new one.
async fn write_atomic(path: &Path, content: &[u8]) -> Result<()> {
	let mut tmp_name = path
		.file_name()
		.map(|n| n.to_os_string())
		.unwrap_or_default();
	tmp_name.push(".tmp");
	let tmp_path = path.with_file_name(tmp_name);

	let write_err = |source: std::io::Error| SyncError::WriteConfig {
		path: path.to_path_buf(),
		source,
	};

	write_file_with_mode(&tmp_path, content, 0o600)
		.await
		.map_err(write_err)?;
	if let Err(e) = tokio::fs::rename(&tmp_path, path).await {
		let _ = tokio::fs::remove_file(&tmp_path).await;
		return Err(write_err(e));
	}
	Ok(())
}
