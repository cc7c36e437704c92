// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Durable registry of VPN peers.
//!
//! [`Registry`] is the single owner of peer records and of the address pool
//! they are drawn from. Records are persisted through a [`PeerStore`];
//! [`SqlitePeerStore`] is the production implementation.

pub mod error;
pub mod pool;
pub mod registry;
pub mod store;
pub mod testing;

pub use error::{RegistryError, Result, StoreError};
pub use pool::create_pool;
pub use registry::{RegisteredPeer, Registry};
pub use store::{PeerStore, SqlitePeerStore, StoredPeer};
