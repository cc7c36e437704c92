// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Filesystem locations section.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

pub const DEFAULT_STATE_DIR: &str = "/etc/wireguard";

fn default_database_url(state_dir: &Path) -> String {
	format!("sqlite:{}", state_dir.join("peers.db").display())
}

fn default_clients_dir(state_dir: &Path) -> PathBuf {
	state_dir.join("clients")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PathsConfigLayer {
	pub state_dir: Option<PathBuf>,
	pub database_url: Option<String>,
	pub clients_dir: Option<PathBuf>,
}

impl PathsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.state_dir.is_some() {
			self.state_dir = other.state_dir;
		}
		if other.database_url.is_some() {
			self.database_url = other.database_url;
		}
		if other.clients_dir.is_some() {
			self.clients_dir = other.clients_dir;
		}
	}

	pub fn finalize(self) -> PathsConfig {
		let state_dir = self
			.state_dir
			.unwrap_or_else(|| PathBuf::from(DEFAULT_STATE_DIR));
		PathsConfig {
			database_url: self
				.database_url
				.unwrap_or_else(|| default_database_url(&state_dir)),
			clients_dir: self
				.clients_dir
				.unwrap_or_else(|| default_clients_dir(&state_dir)),
			state_dir,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
	/// Holds the server key pair and, by default, everything else.
	pub state_dir: PathBuf,
	pub database_url: String,
	pub clients_dir: PathBuf,
}

impl Default for PathsConfig {
	fn default() -> Self {
		PathsConfigLayer::default().finalize()
	}
}
