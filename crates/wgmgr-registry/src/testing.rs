// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory [`PeerStore`] with switchable write failures, for exercising
//! the registry's rollback paths.

use async_trait::async_trait;
use ipnet::Ipv4Net;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use wgmgr_common::{Peer, PeerName, PeerState};

use crate::error::StoreError;
use crate::store::{PeerStore, Result, StoredPeer};

#[derive(Default)]
pub struct MemoryPeerStore {
	network: Mutex<Option<Ipv4Net>>,
	peers: Mutex<Vec<StoredPeer>>,
	fail_insert: AtomicBool,
	fail_delete: AtomicBool,
	fail_set_state: AtomicBool,
}

impl MemoryPeerStore {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn fail_inserts(&self, fail: bool) {
		self.fail_insert.store(fail, Ordering::SeqCst);
	}

	pub fn fail_deletes(&self, fail: bool) {
		self.fail_delete.store(fail, Ordering::SeqCst);
	}

	pub fn fail_state_updates(&self, fail: bool) {
		self.fail_set_state.store(fail, Ordering::SeqCst);
	}

	/// Current stored rows, bypassing the registry.
	pub fn rows(&self) -> Vec<StoredPeer> {
		self.peers.lock().map(|p| p.clone()).unwrap_or_default()
	}

	fn injected(flag: &AtomicBool, op: &str) -> Result<()> {
		if flag.load(Ordering::SeqCst) {
			return Err(StoreError::Internal(format!("injected {op} failure")));
		}
		Ok(())
	}

	fn lock_peers(&self) -> Result<std::sync::MutexGuard<'_, Vec<StoredPeer>>> {
		self.peers
			.lock()
			.map_err(|_| StoreError::Internal("store mutex poisoned".to_string()))
	}
}

#[async_trait]
impl PeerStore for MemoryPeerStore {
	async fn ensure_network(&self, network: Ipv4Net) -> Result<Ipv4Net> {
		let mut stored = self
			.network
			.lock()
			.map_err(|_| StoreError::Internal("store mutex poisoned".to_string()))?;
		Ok(*stored.get_or_insert(network))
	}

	async fn load_peers(&self) -> Result<Vec<StoredPeer>> {
		Ok(self.lock_peers()?.clone())
	}

	async fn insert_peer(&self, peer: &Peer) -> Result<()> {
		Self::injected(&self.fail_insert, "insert")?;
		let mut peers = self.lock_peers()?;
		if peers.iter().any(|p| {
			p.peer.name == peer.name
				|| p.peer.address == peer.address
				|| p.peer.public_key == peer.public_key
		}) {
			return Err(StoreError::Conflict(format!("peer '{}' collides", peer.name)));
		}
		peers.push(StoredPeer {
			peer: peer.clone(),
			state: PeerState::Registered,
		});
		Ok(())
	}

	async fn delete_peer(&self, name: &PeerName) -> Result<bool> {
		Self::injected(&self.fail_delete, "delete")?;
		let mut peers = self.lock_peers()?;
		let before = peers.len();
		peers.retain(|p| &p.peer.name != name);
		Ok(peers.len() != before)
	}

	async fn set_state(&self, names: &[PeerName], state: PeerState) -> Result<()> {
		Self::injected(&self.fail_set_state, "state update")?;
		let mut peers = self.lock_peers()?;
		for stored in peers.iter_mut().filter(|p| names.contains(&p.peer.name)) {
			stored.state = state;
		}
		Ok(())
	}
}
