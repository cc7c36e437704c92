// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A [`DaemonControl`] that records what it was asked to load.

use std::path::Path;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::control::DaemonControl;
use crate::error::{Result, SyncError};

#[derive(Default)]
pub struct RecordingControl {
	reloads: Mutex<Vec<String>>,
	fail: AtomicBool,
	hang: AtomicBool,
	stall_after_apply: AtomicBool,
}

impl RecordingControl {
	pub fn new() -> Self {
		Self::default()
	}

	/// Reject every reload while set.
	pub fn fail(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}

	/// Never complete a reload while set.
	pub fn hang(&self, hang: bool) {
		self.hang.store(hang, Ordering::SeqCst);
	}

	/// Accept each reload, then never report back while set.
	pub fn stall_after_apply(&self, stall: bool) {
		self.stall_after_apply.store(stall, Ordering::SeqCst);
	}

	/// Contents of the config file at each accepted reload, oldest first.
	pub fn reloads(&self) -> Vec<String> {
		self.reloads.lock().map(|r| r.clone()).unwrap_or_default()
	}

	pub fn last_reload(&self) -> Option<String> {
		self.reloads().pop()
	}
}

#[async_trait]
impl DaemonControl for RecordingControl {
	fn name(&self) -> &'static str {
		"recording"
	}

	async fn reload(&self, config_path: &Path) -> Result<()> {
		if self.hang.load(Ordering::SeqCst) {
			std::future::pending::<()>().await;
		}
		if self.fail.load(Ordering::SeqCst) {
			return Err(SyncError::Rejected("injected reload failure".to_string()));
		}

		let content = tokio::fs::read_to_string(config_path)
			.await
			.map_err(|source| SyncError::WriteConfig {
				path: config_path.to_path_buf(),
				source,
			})?;
		self.reloads
			.lock()
			.map_err(|_| SyncError::Rejected("recorder mutex poisoned".to_string()))?
			.push(content);
		if self.stall_after_apply.load(Ordering::SeqCst) {
			std::future::pending::<()>().await;
		}
		Ok(())
	}
}
