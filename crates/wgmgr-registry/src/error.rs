// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use ipnet::Ipv4Net;
use wgmgr_common::PeerName;

/// Failures of the durable store underneath the registry.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
	#[error("Database error: {0}")]
	Sqlx(#[from] sqlx::Error),

	#[error("Conflict: {0}")]
	Conflict(String),

	#[error("Corrupt record: {0}")]
	Corrupt(String),

	#[error("Internal: {0}")]
	Internal(String),
}

#[derive(Debug, thiserror::Error)]
pub enum RegistryError {
	#[error("peer '{0}' already exists")]
	DuplicateName(PeerName),

	#[error("peer '{0}' not found")]
	NotFound(PeerName),

	#[error("no free address left in {0}")]
	PoolExhausted(Ipv4Net),

	#[error("registry store write failed: {0}")]
	Persistence(#[source] StoreError),

	#[error("registry store is corrupt: {0}")]
	Corrupt(String),

	#[error("registry was created for network {stored}, configured network is {configured}")]
	PoolMismatch { stored: Ipv4Net, configured: Ipv4Net },
}

impl From<StoreError> for RegistryError {
	fn from(e: StoreError) -> Self {
		match e {
			StoreError::Corrupt(message) => RegistryError::Corrupt(message),
			other => RegistryError::Persistence(other),
		}
	}
}

pub type Result<T> = std::result::Result<T, RegistryError>;
