// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tunnel daemon control section.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

pub const DEFAULT_RELOAD_TIMEOUT_SECS: u64 = 10;

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfigLayer {
	pub config_path: Option<PathBuf>,
	pub reload_command: Option<Vec<String>>,
	pub reload_timeout_secs: Option<u64>,
}

impl DaemonConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.config_path.is_some() {
			self.config_path = other.config_path;
		}
		if other.reload_command.is_some() {
			self.reload_command = other.reload_command;
		}
		if other.reload_timeout_secs.is_some() {
			self.reload_timeout_secs = other.reload_timeout_secs;
		}
	}

	/// The rendered config defaults to `<state_dir>/<interface>.conf`, where
	/// wg-quick looks for it.
	pub fn finalize(self, state_dir: &Path, interface: &str) -> DaemonConfig {
		DaemonConfig {
			config_path: self
				.config_path
				.unwrap_or_else(|| state_dir.join(format!("{interface}.conf"))),
			reload_command: self.reload_command.filter(|argv| !argv.is_empty()),
			reload_timeout_secs: self
				.reload_timeout_secs
				.unwrap_or(DEFAULT_RELOAD_TIMEOUT_SECS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
	pub config_path: PathBuf,
	/// Program and arguments run to reload the daemon. `None` selects
	/// `wg syncconf`.
	pub reload_command: Option<Vec<String>>,
	pub reload_timeout_secs: u64,
}

impl DaemonConfig {
	pub fn reload_timeout(&self) -> Duration {
		Duration::from_secs(self.reload_timeout_secs)
	}
}
