// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

/// Why the daemon could not be confirmed to run the current configuration.
#[derive(Debug, Error)]
pub enum SyncError {
	#[error("failed to write daemon config {path}: {source}")]
	WriteConfig {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("`{program}` not found in PATH")]
	NotInstalled { program: String },

	#[error("failed to run `{command}`: {source}")]
	Spawn {
		command: String,
		#[source]
		source: std::io::Error,
	},

	#[error("`{command}` exited with {status}: {stderr}")]
	CommandFailed {
		command: String,
		status: String,
		stderr: String,
	},

	#[error("daemon reload did not finish within {0:?}")]
	Timeout(Duration),

	#[error("daemon reload rejected: {0}")]
	Rejected(String),
}

pub type Result<T> = std::result::Result<T, SyncError>;
