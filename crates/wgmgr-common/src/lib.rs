// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Shared types for WireGuard peer management.
//!
//! Key material, the address pool, peer records and client profiles. Nothing
//! in here talks to the database or the tunnel daemon.

pub mod keys;
pub mod keys_file;
pub mod peer;
pub mod pool;
pub mod profile;

pub use keys::{KeyError, PeerKeyMaterial, PresharedKey, WgKeyPair, WgPrivateKey, WgPublicKey};
pub use keys_file::{load_or_create_server_key, write_file_with_mode, KeyFileError};
pub use peer::{Peer, PeerName, PeerNameError, PeerState, PeerSummary};
pub use pool::{AddressPool, PoolError, PoolStatus};
pub use profile::{push_line, ClientProfile, ProfileTemplate};
