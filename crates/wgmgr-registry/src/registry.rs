// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The peer registry.
//!
//! The registry owns the address pool and an in-memory copy of every peer,
//! both guarded by one lock. A mutation allocates or releases an address,
//! commits to the store and updates memory while holding the write lock, so
//! readers see either the state before the mutation or the state after it.
//! If the store write fails the pool change is undone before the lock is
//! released.

use chrono::Utc;
use ipnet::Ipv4Net;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use wgmgr_common::{
	AddressPool, Peer, PeerKeyMaterial, PeerName, PeerState, PeerSummary, PoolError, PoolStatus,
};

use crate::error::{RegistryError, Result};
use crate::store::PeerStore;

/// A peer together with whether the daemon is known to carry it.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredPeer {
	pub peer: Peer,
	pub state: PeerState,
}

impl RegisteredPeer {
	pub fn summary(&self) -> PeerSummary {
		PeerSummary::new(&self.peer, self.state)
	}
}

struct RegistryState {
	peers: Vec<RegisteredPeer>,
	pool: AddressPool,
}

impl RegistryState {
	fn position(&self, name: &PeerName) -> Option<usize> {
		self.peers.iter().position(|p| &p.peer.name == name)
	}
}

pub struct Registry {
	store: Arc<dyn PeerStore>,
	state: RwLock<RegistryState>,
}

impl Registry {
	/// Loads every stored peer and rebuilds the pool from their addresses.
	///
	/// Fails with `PoolMismatch` when the store was created for another
	/// network, and with `Corrupt` when stored records overlap or fall
	/// outside the pool.
	#[instrument(skip(store, pool), fields(network = %pool.network()))]
	pub async fn open(store: Arc<dyn PeerStore>, mut pool: AddressPool) -> Result<Self> {
		let stored_network = store.ensure_network(pool.network()).await?;
		if stored_network != pool.network() {
			return Err(RegistryError::PoolMismatch {
				stored: stored_network,
				configured: pool.network(),
			});
		}

		let stored = store.load_peers().await?;
		let mut peers: Vec<RegisteredPeer> = Vec::with_capacity(stored.len());
		for row in stored {
			if peers.iter().any(|p| p.peer.public_key == row.peer.public_key) {
				return Err(RegistryError::Corrupt(format!(
					"peer '{}' reuses another peer's public key",
					row.peer.name
				)));
			}
			pool.claim(row.peer.address).map_err(|e| {
				RegistryError::Corrupt(format!("peer '{}': {e}", row.peer.name))
			})?;
			peers.push(RegisteredPeer {
				peer: row.peer,
				state: row.state,
			});
		}

		let pending = peers
			.iter()
			.filter(|p| p.state == PeerState::Registered)
			.count();
		info!(peers = peers.len(), pending, "registry loaded");

		Ok(Self {
			store,
			state: RwLock::new(RegistryState { peers, pool }),
		})
	}

	/// Registers a new peer on the lowest free address.
	///
	/// Only the public half of `keys` is stored. The peer starts in state
	/// `registered`.
	#[instrument(skip(self, keys), fields(peer = %name))]
	pub async fn create(&self, name: PeerName, keys: &PeerKeyMaterial) -> Result<Peer> {
		let mut state = self.state.write().await;

		if state.position(&name).is_some() {
			return Err(RegistryError::DuplicateName(name));
		}

		let network = state.pool.network();
		let address = state.pool.allocate().map_err(|e| match e {
			PoolError::PoolExhausted => RegistryError::PoolExhausted(network),
			other => RegistryError::Corrupt(other.to_string()),
		})?;

		let peer = Peer {
			name,
			address,
			public_key: *keys.keypair.public_key(),
			preshared_key: keys.preshared_key.clone(),
			created_at: Utc::now(),
		};

		if let Err(e) = self.store.insert_peer(&peer).await {
			if let Err(release) = state.pool.release(address) {
				warn!(%address, error = %release, "failed to roll back address allocation");
			}
			warn!(peer = %peer.name, %address, error = %e, "peer insert failed, allocation rolled back");
			return Err(RegistryError::Persistence(e));
		}

		state.peers.push(RegisteredPeer {
			peer: peer.clone(),
			state: PeerState::Registered,
		});
		info!(peer = %peer.name, address = %peer.address, "peer registered");
		Ok(peer)
	}

	/// Deletes a peer and frees its address. The address is only released
	/// once the store has committed the delete.
	#[instrument(skip(self), fields(peer = %name))]
	pub async fn remove(&self, name: &PeerName) -> Result<Peer> {
		let mut state = self.state.write().await;

		let index = state
			.position(name)
			.ok_or_else(|| RegistryError::NotFound(name.clone()))?;

		let existed = self
			.store
			.delete_peer(name)
			.await
			.map_err(RegistryError::Persistence)?;
		if !existed {
			warn!(peer = %name, "peer was already missing from the store");
		}

		let removed = state.peers.remove(index);
		if let Err(e) = state.pool.release(removed.peer.address) {
			warn!(peer = %name, address = %removed.peer.address, error = %e, "address was not allocated");
		}

		info!(peer = %name, address = %removed.peer.address, "peer removed");
		Ok(removed.peer)
	}

	pub async fn get(&self, name: &PeerName) -> Result<RegisteredPeer> {
		let state = self.state.read().await;
		state
			.position(name)
			.map(|i| state.peers[i].clone())
			.ok_or_else(|| RegistryError::NotFound(name.clone()))
	}

	/// Point-in-time copy of every peer, in creation order.
	pub async fn list(&self) -> Vec<RegisteredPeer> {
		self.state.read().await.peers.clone()
	}

	/// Peers still waiting for a successful daemon sync.
	pub async fn pending(&self) -> Vec<PeerName> {
		self.state
			.read()
			.await
			.peers
			.iter()
			.filter(|p| p.state == PeerState::Registered)
			.map(|p| p.peer.name.clone())
			.collect()
	}

	/// Records that the daemon accepted a configuration containing `names`.
	/// Names no longer registered are skipped.
	#[instrument(skip(self, names), fields(count = names.len()))]
	pub async fn mark_synced(&self, names: &[PeerName]) -> Result<()> {
		let mut state = self.state.write().await;

		let names: Vec<PeerName> = names
			.iter()
			.filter(|n| {
				state
					.position(n)
					.is_some_and(|i| state.peers[i].state != PeerState::Synced)
			})
			.cloned()
			.collect();
		if names.is_empty() {
			return Ok(());
		}

		self.store
			.set_state(&names, PeerState::Synced)
			.await
			.map_err(RegistryError::Persistence)?;

		for peer in state.peers.iter_mut().filter(|p| names.contains(&p.peer.name)) {
			peer.state = PeerState::Synced;
		}
		Ok(())
	}

	/// Records that the daemon may no longer match `names`, so they show as
	/// pending until the next successful sync.
	///
	/// The in-memory state is downgraded even when the store rejects the
	/// update; the error is still returned.
	#[instrument(skip(self, names), fields(count = names.len()))]
	pub async fn mark_registered(&self, names: &[PeerName]) -> Result<()> {
		let mut state = self.state.write().await;

		let names: Vec<PeerName> = names
			.iter()
			.filter(|n| {
				state
					.position(n)
					.is_some_and(|i| state.peers[i].state != PeerState::Registered)
			})
			.cloned()
			.collect();
		if names.is_empty() {
			return Ok(());
		}

		for peer in state.peers.iter_mut().filter(|p| names.contains(&p.peer.name)) {
			peer.state = PeerState::Registered;
		}

		self.store
			.set_state(&names, PeerState::Registered)
			.await
			.map_err(RegistryError::Persistence)
	}

	pub async fn pool_status(&self) -> PoolStatus {
		self.state.read().await.pool.status()
	}

	pub async fn network(&self) -> Ipv4Net {
		self.state.read().await.pool.network()
	}
}
