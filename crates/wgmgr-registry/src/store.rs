// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable storage for peer records.
//!
//! `wg_peers` holds one row per peer and nothing else, so backup tooling can
//! enumerate it directly. Sync state lives in `wg_peer_sync` and the network
//! the registry was created for in `wg_registry_meta`.

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use ipnet::Ipv4Net;
use sqlx::sqlite::SqlitePool;
use std::net::Ipv4Addr;
use wgmgr_common::{Peer, PeerName, PeerState, PresharedKey, WgPublicKey};

use crate::error::StoreError;

pub type Result<T> = std::result::Result<T, StoreError>;

const META_NETWORK: &str = "network";

/// A peer as loaded from the store, with its last recorded sync state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredPeer {
	pub peer: Peer,
	pub state: PeerState,
}

#[async_trait]
pub trait PeerStore: Send + Sync {
	/// Records `network` on first use and returns whichever network the
	/// store was created for.
	async fn ensure_network(&self, network: Ipv4Net) -> Result<Ipv4Net>;

	/// All peers in creation order.
	async fn load_peers(&self) -> Result<Vec<StoredPeer>>;

	/// Inserts the peer in state `registered`. Atomic: either both rows are
	/// committed or neither.
	async fn insert_peer(&self, peer: &Peer) -> Result<()>;

	/// Returns false when no such peer was stored.
	async fn delete_peer(&self, name: &PeerName) -> Result<bool>;

	async fn set_state(&self, names: &[PeerName], state: PeerState) -> Result<()>;
}

type PeerRow = (String, String, String, String, String, Option<String>);

fn timestamp(at: &DateTime<Utc>) -> String {
	at.to_rfc3339_opts(SecondsFormat::Micros, true)
}

fn decode_row(row: PeerRow) -> Result<StoredPeer> {
	let (name, address, public_key, preshared_key, created_at, state) = row;
	let corrupt = |what: &str, detail: String| {
		StoreError::Corrupt(format!("peer '{name}': invalid {what}: {detail}"))
	};

	let peer = Peer {
		name: PeerName::new(name.as_str()).map_err(|e| corrupt("name", e.to_string()))?,
		address: address
			.parse::<Ipv4Addr>()
			.map_err(|e| corrupt("address", e.to_string()))?,
		public_key: WgPublicKey::from_base64(&public_key)
			.map_err(|e| corrupt("public key", e.to_string()))?,
		preshared_key: PresharedKey::from_base64(&preshared_key)
			.map_err(|e| corrupt("preshared key", e.to_string()))?,
		created_at: DateTime::parse_from_rfc3339(&created_at)
			.map_err(|e| corrupt("created_at", e.to_string()))?
			.with_timezone(&Utc),
	};
	let state = match state {
		Some(s) => s.parse().map_err(|e: String| corrupt("state", e))?,
		None => PeerState::Registered,
	};

	Ok(StoredPeer { peer, state })
}

fn map_insert_error(e: sqlx::Error, peer: &Peer) -> StoreError {
	match &e {
		sqlx::Error::Database(db) if db.is_unique_violation() => StoreError::Conflict(format!(
			"peer '{}' collides with an existing name, address or key",
			peer.name
		)),
		_ => StoreError::Sqlx(e),
	}
}

/// SQLite-backed [`PeerStore`].
#[derive(Clone)]
pub struct SqlitePeerStore {
	pool: SqlitePool,
}

impl SqlitePeerStore {
	/// Wraps `pool` and creates the registry tables if they do not exist.
	#[tracing::instrument(skip(pool))]
	pub async fn open(pool: SqlitePool) -> Result<Self> {
		let store = Self { pool };
		store.create_schema().await?;
		Ok(store)
	}

	async fn create_schema(&self) -> Result<()> {
		let mut tx = self.pool.begin().await?;

		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS wg_peers (
				name TEXT PRIMARY KEY,
				address TEXT NOT NULL UNIQUE,
				public_key TEXT NOT NULL UNIQUE,
				preshared_key TEXT NOT NULL,
				created_at TEXT NOT NULL
			)
			"#,
		)
		.execute(&mut *tx)
		.await?;

		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS wg_peer_sync (
				name TEXT PRIMARY KEY REFERENCES wg_peers(name) ON DELETE CASCADE,
				state TEXT NOT NULL,
				updated_at TEXT NOT NULL
			)
			"#,
		)
		.execute(&mut *tx)
		.await?;

		sqlx::query(
			r#"
			CREATE TABLE IF NOT EXISTS wg_registry_meta (
				key TEXT PRIMARY KEY,
				value TEXT NOT NULL
			)
			"#,
		)
		.execute(&mut *tx)
		.await?;

		tx.commit().await?;
		tracing::debug!("registry schema ready");
		Ok(())
	}
}

#[async_trait]
impl PeerStore for SqlitePeerStore {
	#[tracing::instrument(skip(self))]
	async fn ensure_network(&self, network: Ipv4Net) -> Result<Ipv4Net> {
		sqlx::query("INSERT OR IGNORE INTO wg_registry_meta (key, value) VALUES (?, ?)")
			.bind(META_NETWORK)
			.bind(network.to_string())
			.execute(&self.pool)
			.await?;

		let (stored,): (String,) = sqlx::query_as("SELECT value FROM wg_registry_meta WHERE key = ?")
			.bind(META_NETWORK)
			.fetch_one(&self.pool)
			.await?;

		stored
			.parse()
			.map_err(|e| StoreError::Corrupt(format!("stored network '{stored}': {e}")))
	}

	#[tracing::instrument(skip(self))]
	async fn load_peers(&self) -> Result<Vec<StoredPeer>> {
		let rows: Vec<PeerRow> = sqlx::query_as(
			"SELECT p.name, p.address, p.public_key, p.preshared_key, p.created_at, s.state
			 FROM wg_peers p LEFT JOIN wg_peer_sync s ON s.name = p.name
			 ORDER BY p.created_at ASC, p.rowid ASC",
		)
		.fetch_all(&self.pool)
		.await?;

		rows.into_iter().map(decode_row).collect()
	}

	#[tracing::instrument(skip(self, peer), fields(peer = %peer.name, address = %peer.address))]
	async fn insert_peer(&self, peer: &Peer) -> Result<()> {
		let created_at = timestamp(&peer.created_at);
		let preshared_key = peer.preshared_key.to_base64();
		let mut tx = self.pool.begin().await?;

		sqlx::query(
			"INSERT INTO wg_peers (name, address, public_key, preshared_key, created_at)
			 VALUES (?, ?, ?, ?, ?)",
		)
		.bind(peer.name.as_str())
		.bind(peer.address.to_string())
		.bind(peer.public_key.to_base64())
		.bind(preshared_key.as_str())
		.bind(&created_at)
		.execute(&mut *tx)
		.await
		.map_err(|e| map_insert_error(e, peer))?;

		sqlx::query("INSERT INTO wg_peer_sync (name, state, updated_at) VALUES (?, ?, ?)")
			.bind(peer.name.as_str())
			.bind(PeerState::Registered.as_str())
			.bind(&created_at)
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;
		Ok(())
	}

	#[tracing::instrument(skip(self), fields(peer = %name))]
	async fn delete_peer(&self, name: &PeerName) -> Result<bool> {
		let mut tx = self.pool.begin().await?;

		sqlx::query("DELETE FROM wg_peer_sync WHERE name = ?")
			.bind(name.as_str())
			.execute(&mut *tx)
			.await?;
		let result = sqlx::query("DELETE FROM wg_peers WHERE name = ?")
			.bind(name.as_str())
			.execute(&mut *tx)
			.await?;

		tx.commit().await?;
		Ok(result.rows_affected() > 0)
	}

	#[tracing::instrument(skip(self, names), fields(count = names.len()))]
	async fn set_state(&self, names: &[PeerName], state: PeerState) -> Result<()> {
		let updated_at = timestamp(&Utc::now());
		let mut tx = self.pool.begin().await?;

		for name in names {
			sqlx::query(
				"INSERT INTO wg_peer_sync (name, state, updated_at) VALUES (?, ?, ?)
				 ON CONFLICT(name) DO UPDATE SET state = excluded.state, updated_at = excluded.updated_at",
			)
			.bind(name.as_str())
			.bind(state.as_str())
			.bind(&updated_at)
			.execute(&mut *tx)
			.await?;
		}

		tx.commit().await?;
		Ok(())
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::pool::create_pool;
	use tempfile::TempDir;
	use wgmgr_common::PeerKeyMaterial;

	async fn open_store(dir: &TempDir) -> SqlitePeerStore {
		let url = format!("sqlite:{}", dir.path().join("peers.db").display());
		let pool = create_pool(&url).await.unwrap();
		SqlitePeerStore::open(pool).await.unwrap()
	}

	fn peer(name: &str, last_octet: u8) -> Peer {
		let keys = PeerKeyMaterial::generate();
		Peer {
			name: PeerName::new(name).unwrap(),
			address: Ipv4Addr::new(10, 8, 0, last_octet),
			public_key: *keys.keypair.public_key(),
			preshared_key: keys.preshared_key.clone(),
			created_at: Utc::now(),
		}
	}

	#[tokio::test]
	async fn test_insert_and_load_roundtrip() {
		let dir = TempDir::new().unwrap();
		let store = open_store(&dir).await;
		let alice = peer("alice", 2);

		store.insert_peer(&alice).await.unwrap();
		let loaded = store.load_peers().await.unwrap();

		assert_eq!(loaded.len(), 1);
		assert_eq!(loaded[0].state, PeerState::Registered);
		assert_eq!(loaded[0].peer.name, alice.name);
		assert_eq!(loaded[0].peer.address, alice.address);
		assert_eq!(loaded[0].peer.public_key, alice.public_key);
		assert_eq!(loaded[0].peer.preshared_key, alice.preshared_key);
	}

	#[tokio::test]
	async fn test_load_preserves_creation_order() {
		let dir = TempDir::new().unwrap();
		let store = open_store(&dir).await;

		for (i, name) in ["carol", "alice", "bob"].iter().enumerate() {
			store.insert_peer(&peer(name, 2 + i as u8)).await.unwrap();
		}

		let names: Vec<_> = store
			.load_peers()
			.await
			.unwrap()
			.into_iter()
			.map(|p| p.peer.name.to_string())
			.collect();
		assert_eq!(names, vec!["carol", "alice", "bob"]);
	}

	#[tokio::test]
	async fn test_duplicate_address_is_a_conflict() {
		let dir = TempDir::new().unwrap();
		let store = open_store(&dir).await;

		store.insert_peer(&peer("alice", 2)).await.unwrap();
		let err = store.insert_peer(&peer("bob", 2)).await.unwrap_err();

		assert!(matches!(err, StoreError::Conflict(_)));
		assert_eq!(store.load_peers().await.unwrap().len(), 1);
	}

	#[tokio::test]
	async fn test_delete_removes_sync_row() {
		let dir = TempDir::new().unwrap();
		let store = open_store(&dir).await;
		let alice = peer("alice", 2);

		store.insert_peer(&alice).await.unwrap();
		assert!(store.delete_peer(&alice.name).await.unwrap());
		assert!(!store.delete_peer(&alice.name).await.unwrap());

		let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM wg_peer_sync")
			.fetch_one(&store.pool)
			.await
			.unwrap();
		assert_eq!(count, 0);
	}

	#[tokio::test]
	async fn test_set_state_persists() {
		let dir = TempDir::new().unwrap();
		let store = open_store(&dir).await;
		let alice = peer("alice", 2);
		let bob = peer("bob", 3);
		store.insert_peer(&alice).await.unwrap();
		store.insert_peer(&bob).await.unwrap();

		store
			.set_state(&[alice.name.clone()], PeerState::Synced)
			.await
			.unwrap();

		let loaded = store.load_peers().await.unwrap();
		assert_eq!(loaded[0].state, PeerState::Synced);
		assert_eq!(loaded[1].state, PeerState::Registered);
	}

	#[tokio::test]
	async fn test_ensure_network_keeps_first_value() {
		let dir = TempDir::new().unwrap();
		let store = open_store(&dir).await;
		let first: Ipv4Net = "10.8.0.0/24".parse().unwrap();
		let second: Ipv4Net = "10.9.0.0/24".parse().unwrap();

		assert_eq!(store.ensure_network(first).await.unwrap(), first);
		assert_eq!(store.ensure_network(second).await.unwrap(), first);
	}

	#[tokio::test]
	async fn test_corrupt_row_is_reported() {
		let dir = TempDir::new().unwrap();
		let store = open_store(&dir).await;

		sqlx::query(
			"INSERT INTO wg_peers (name, address, public_key, preshared_key, created_at)
			 VALUES ('mallory', 'not-an-ip', 'AAAA', 'AAAA', '2025-01-01T00:00:00Z')",
		)
		.execute(&store.pool)
		.await
		.unwrap();

		let err = store.load_peers().await.unwrap_err();
		assert!(matches!(err, StoreError::Corrupt(_)));
	}

	#[tokio::test]
	async fn test_data_survives_reopen() {
		let dir = TempDir::new().unwrap();
		let alice = peer("alice", 2);
		{
			let store = open_store(&dir).await;
			store.insert_peer(&alice).await.unwrap();
			store.pool.close().await;
		}

		let store = open_store(&dir).await;
		let loaded = store.load_peers().await.unwrap();
		assert_eq!(loaded.len(), 1);
		assert_eq!(loaded[0].peer.name, alice.name);
	}
}
