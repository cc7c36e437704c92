// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};
use std::sync::Arc;

use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{info, instrument, warn};
use wgmgr_common::profile::remove_profile;
use wgmgr_common::{
	ClientProfile, Peer, PeerKeyMaterial, PeerName, PeerState, PeerSummary, PoolStatus,
	ProfileTemplate, WgPublicKey,
};
use wgmgr_daemon::{SyncError, Synchronizer};
use wgmgr_registry::Registry;

use crate::error::{Authority, LifecycleError, PartialCause, Result, Stage};

/// Everything handed back for a newly added peer.
#[derive(Debug, Clone, Serialize)]
pub struct PeerConfig {
	pub peer: PeerSummary,
	pub profile: ClientProfile,
	pub profile_path: PathBuf,
}

/// The peer operations exposed to operators.
///
/// Mutations (add, remove, repair, reconcile) run one at a time behind a
/// write gate. Reads go straight to the registry and never wait for a sync.
/// Every mutation commits to the registry before the daemon is touched on
/// add, and after the daemon has dropped the peer on remove.
pub struct PeerLifecycleService {
	registry: Arc<Registry>,
	synchronizer: Synchronizer,
	template: ProfileTemplate,
	clients_dir: PathBuf,
	write_gate: Mutex<()>,
}

fn parse_name(name: &str) -> Result<PeerName> {
	PeerName::new(name).map_err(|source| LifecycleError::InvalidName {
		name: name.to_string(),
		source,
	})
}

impl PeerLifecycleService {
	pub fn new(
		registry: Arc<Registry>,
		synchronizer: Synchronizer,
		template: ProfileTemplate,
		clients_dir: impl Into<PathBuf>,
	) -> Self {
		Self {
			registry,
			synchronizer,
			template,
			clients_dir: clients_dir.into(),
			write_gate: Mutex::new(()),
		}
	}

	pub fn clients_dir(&self) -> &Path {
		&self.clients_dir
	}

	pub fn server_public_key(&self) -> &WgPublicKey {
		self.synchronizer.server_public_key()
	}

	async fn snapshot(&self) -> Vec<Peer> {
		self.registry
			.list()
			.await
			.into_iter()
			.map(|p| p.peer)
			.collect()
	}

	/// Registers a peer, syncs the daemon and writes the client profile.
	///
	/// A failed sync leaves the peer registered and returns `PartialFailure`
	/// carrying the profile; `repair` finishes the job.
	#[instrument(skip(self))]
	pub async fn add_peer(&self, name: &str) -> Result<PeerConfig> {
		let name = parse_name(name)?;
		let _gate = self.write_gate.lock().await;

		let keys = PeerKeyMaterial::generate();
		let peer = self
			.registry
			.create(name.clone(), &keys)
			.await
			.map_err(|e| LifecycleError::registry(&name, Stage::Persist, e))?;
		let profile = self
			.template
			.for_peer(&peer, keys.keypair.private_key().clone());

		let snapshot = self.snapshot().await;
		if let Err(e) = self.synchronizer.sync(&snapshot).await {
			self.salvage_profile(&profile).await;
			return Err(LifecycleError::PartialFailure {
				peer: name,
				stage: Stage::Sync,
				authoritative: Authority::Registry,
				state: PeerState::Registered,
				profile: Some(Box::new(profile)),
				source: e.into(),
			});
		}

		let synced: Vec<PeerName> = snapshot.into_iter().map(|p| p.name).collect();
		if let Err(e) = self.registry.mark_synced(&synced).await {
			self.salvage_profile(&profile).await;
			return Err(LifecycleError::PartialFailure {
				peer: name,
				stage: Stage::Persist,
				authoritative: Authority::Daemon,
				state: PeerState::Registered,
				profile: Some(Box::new(profile)),
				source: e.into(),
			});
		}

		let profile_path = match profile.write_to(&self.clients_dir).await {
			Ok(path) => path,
			Err(e) => {
				return Err(LifecycleError::PartialFailure {
					peer: name,
					stage: Stage::Profile,
					authoritative: Authority::Registry,
					state: PeerState::Synced,
					profile: Some(Box::new(profile)),
					source: e.into(),
				});
			}
		};

		info!(peer = %name, address = %peer.address, "peer added");
		Ok(PeerConfig {
			peer: PeerSummary::new(&peer, PeerState::Synced),
			profile,
			profile_path,
		})
	}

	async fn salvage_profile(&self, profile: &ClientProfile) {
		if let Err(e) = profile.write_to(&self.clients_dir).await {
			warn!(peer = %profile.name, error = %e, "failed to write client profile");
		}
	}

	/// Drops the peer from the daemon, then from the registry.
	///
	/// If the daemon cannot be reloaded the peer is kept, its state drops to
	/// `registered` and the call fails with `DaemonUnreachable`.
	#[instrument(skip(self))]
	pub async fn remove_peer(&self, name: &str) -> Result<PeerSummary> {
		let name = parse_name(name)?;
		let _gate = self.write_gate.lock().await;

		let current = self
			.registry
			.get(&name)
			.await
			.map_err(|e| LifecycleError::registry(&name, Stage::Validate, e))?;

		let full = self.snapshot().await;
		let remaining: Vec<Peer> = full.iter().filter(|p| p.name != name).cloned().collect();
		if let Err(e) = self.synchronizer.sync(&remaining).await {
			// The daemon may already have applied the removal.
			self.mark_unconfirmed(&name).await;
			self.restore_config(&full).await;
			return Err(LifecycleError::DaemonUnreachable { peer: name, source: e });
		}

		let removed = match self.registry.remove(&name).await {
			Ok(peer) => peer,
			Err(e) => {
				self.mark_unconfirmed(&name).await;
				return Err(LifecycleError::PartialFailure {
					peer: name,
					stage: Stage::Persist,
					authoritative: Authority::Daemon,
					state: PeerState::Registered,
					profile: None,
					source: e.into(),
				});
			}
		};

		if let Err(e) = remove_profile(&self.clients_dir, &name).await {
			warn!(peer = %name, error = %e, "failed to delete client profile");
		}

		info!(peer = %name, address = %removed.address, "peer removed");
		Ok(PeerSummary::new(&removed, current.state))
	}

	/// Drops `name` back to `registered` so `repair` and `reconcile` pick it up.
	async fn mark_unconfirmed(&self, name: &PeerName) {
		if let Err(e) = self.registry.mark_registered(std::slice::from_ref(name)).await {
			warn!(peer = %name, error = %e, "failed to record peer as pending");
		}
	}

	/// Puts the registry's view back on disk after a failed reload so the
	/// file keeps matching the registry.
	async fn restore_config(&self, peers: &[Peer]) {
		if let Err(e) = self.synchronizer.write_config(peers).await {
			warn!(error = %e, "failed to restore daemon config");
		}
	}

	/// All peers in creation order.
	pub async fn list_peers(&self) -> Vec<PeerSummary> {
		self.registry
			.list()
			.await
			.iter()
			.map(|p| p.summary())
			.collect()
	}

	pub async fn get_peer(&self, name: &str) -> Result<PeerSummary> {
		let name = parse_name(name)?;
		self.registry
			.get(&name)
			.await
			.map(|p| p.summary())
			.map_err(|e| LifecycleError::registry(&name, Stage::Validate, e))
	}

	/// Re-syncs the daemon so `name` reaches `synced`. Never allocates or
	/// registers anything, so it is safe to repeat.
	#[instrument(skip(self))]
	pub async fn repair(&self, name: &str) -> Result<PeerSummary> {
		let name = parse_name(name)?;
		let _gate = self.write_gate.lock().await;

		let current = self
			.registry
			.get(&name)
			.await
			.map_err(|e| LifecycleError::registry(&name, Stage::Validate, e))?;

		let snapshot = self.snapshot().await;
		if let Err(e) = self.synchronizer.sync(&snapshot).await {
			return Err(LifecycleError::PartialFailure {
				peer: name,
				stage: Stage::Sync,
				authoritative: Authority::Registry,
				state: current.state,
				profile: None,
				source: e.into(),
			});
		}

		let synced: Vec<PeerName> = snapshot.into_iter().map(|p| p.name).collect();
		if let Err(e) = self.registry.mark_synced(&synced).await {
			return Err(LifecycleError::PartialFailure {
				peer: name,
				stage: Stage::Persist,
				authoritative: Authority::Daemon,
				state: current.state,
				profile: None,
				source: e.into(),
			});
		}

		if current.state == PeerState::Registered {
			info!(peer = %name, "peer repaired");
		}
		Ok(PeerSummary::new(&current.peer, PeerState::Synced))
	}

	/// Re-syncs the whole registry and returns the peers that moved from
	/// `registered` to `synced`. Run at startup to recover from a crash or an
	/// earlier partial failure.
	#[instrument(skip(self))]
	pub async fn reconcile(&self) -> Result<Vec<PeerName>> {
		let _gate = self.write_gate.lock().await;

		let pending = self.registry.pending().await;
		let snapshot = self.snapshot().await;

		if let Err(e) = self.synchronizer.sync(&snapshot).await {
			return Err(LifecycleError::ReconcileFailed {
				pending,
				stage: Stage::Sync,
				source: e.into(),
			});
		}
		if let Err(e) = self.registry.mark_synced(&pending).await {
			return Err(LifecycleError::ReconcileFailed {
				pending,
				stage: Stage::Persist,
				source: e.into(),
			});
		}

		if !pending.is_empty() {
			info!(count = pending.len(), "pending peers synced");
		}
		Ok(pending)
	}

	pub async fn pool_status(&self) -> PoolStatus {
		self.registry.pool_status().await
	}

	/// Writes the daemon configuration for the current registry without
	/// reloading. Used when provisioning a host before the daemon runs.
	pub async fn write_daemon_config(&self) -> std::result::Result<PathBuf, SyncError> {
		let _gate = self.write_gate.lock().await;
		let snapshot = self.snapshot().await;
		self.synchronizer.write_config(&snapshot).await?;
		Ok(self.synchronizer.config_path().to_path_buf())
	}
}
