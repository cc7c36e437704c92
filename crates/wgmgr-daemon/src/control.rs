// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Ways of telling the tunnel daemon to pick up a rewritten configuration.

use std::path::{Path, PathBuf};
use std::process::Output;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, instrument, warn};
use wgmgr_common::write_file_with_mode;
use zeroize::Zeroizing;

use crate::error::{Result, SyncError};

/// Reloads the daemon from a configuration file.
///
/// Implementations only need to report success once the daemon runs the new
/// configuration; the caller bounds the whole call with a timeout and drops
/// the future on expiry.
#[async_trait]
pub trait DaemonControl: Send + Sync {
	fn name(&self) -> &'static str;

	async fn reload(&self, config_path: &Path) -> Result<()>;
}

/// Hot reload through `wg-quick strip` and `wg syncconf`. Existing sessions
/// survive the reload.
#[derive(Debug, Clone)]
pub struct SyncconfControl {
	interface: String,
}

impl SyncconfControl {
	pub fn new(interface: impl Into<String>) -> Self {
		Self {
			interface: interface.into(),
		}
	}
}

#[async_trait]
impl DaemonControl for SyncconfControl {
	fn name(&self) -> &'static str {
		"syncconf"
	}

	#[instrument(skip(self), fields(interface = %self.interface, config = %config_path.display()))]
	async fn reload(&self, config_path: &Path) -> Result<()> {
		let config_arg = config_path.to_string_lossy().into_owned();
		let output = run("wg-quick", &["strip", &config_arg]).await?;
		let stripped = Zeroizing::new(output.stdout);

		let stripped_file = TempConfig::new(stripped_path(config_path));
		write_file_with_mode(stripped_file.path(), &stripped, 0o600)
			.await
			.map_err(|source| SyncError::WriteConfig {
				path: stripped_file.path().to_path_buf(),
				source,
			})?;

		let stripped_arg = stripped_file.path().to_string_lossy().into_owned();
		run("wg", &["syncconf", &self.interface, &stripped_arg]).await?;
		Ok(())
	}
}

/// A key-bearing scratch file, deleted when dropped. The reload future can be
/// dropped mid-command by the sync timeout, so cleanup cannot wait on it.
struct TempConfig {
	path: PathBuf,
}

impl TempConfig {
	fn new(path: PathBuf) -> Self {
		Self { path }
	}

	fn path(&self) -> &Path {
		&self.path
	}
}

impl Drop for TempConfig {
	fn drop(&mut self) {
		match std::fs::remove_file(&self.path) {
			Ok(()) => {}
			Err(e) if e.kind() == std::io::ErrorKind::NotFound => {}
			Err(e) => {
				warn!(path = %self.path.display(), error = %e, "failed to remove stripped config");
			}
		}
	}
}

fn stripped_path(config_path: &Path) -> PathBuf {
	let mut name = config_path
		.file_name()
		.map(|n| n.to_os_string())
		.unwrap_or_default();
	name.push(".stripped");
	config_path.with_file_name(name)
}

/// Runs an operator-supplied command, e.g. `systemctl restart wg-quick@wg0`.
/// The command reads the configuration from its usual location.
#[derive(Debug, Clone)]
pub struct CommandControl {
	argv: Vec<String>,
}

impl CommandControl {
	/// Returns `None` for an empty argument vector.
	pub fn new(argv: Vec<String>) -> Option<Self> {
		if argv.is_empty() {
			return None;
		}
		Some(Self { argv })
	}

	pub fn argv(&self) -> &[String] {
		&self.argv
	}
}

#[async_trait]
impl DaemonControl for CommandControl {
	fn name(&self) -> &'static str {
		"command"
	}

	#[instrument(skip(self), fields(command = %self.argv.join(" "), config = %config_path.display()))]
	async fn reload(&self, config_path: &Path) -> Result<()> {
		let (program, args) = match self.argv.split_first() {
			Some(split) => split,
			None => return Err(SyncError::Rejected("empty reload command".to_string())),
		};
		let args: Vec<&str> = args.iter().map(String::as_str).collect();
		run(program, &args).await.map(|_| ())
	}
}

/// Spawns `program` and waits for it. The child is killed if the returned
/// future is dropped before it exits.
async fn run(program: &str, args: &[&str]) -> Result<Output> {
	let command = std::iter::once(program)
		.chain(args.iter().copied())
		.collect::<Vec<_>>()
		.join(" ");
	debug!(%command, "running daemon command");

	let output = Command::new(program)
		.args(args)
		.kill_on_drop(true)
		.output()
		.await
		.map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				SyncError::NotInstalled {
					program: program.to_string(),
				}
			} else {
				SyncError::Spawn {
					command: command.clone(),
					source: e,
				}
			}
		})?;

	if !output.status.success() {
		let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
		return Err(SyncError::CommandFailed {
			command,
			status: output.status.to_string(),
			stderr,
		});
	}

	Ok(output)
}
