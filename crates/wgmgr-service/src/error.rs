// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::fmt;

use ipnet::Ipv4Net;
use serde::Serialize;
use thiserror::Error;
use wgmgr_common::{ClientProfile, PeerName, PeerNameError, PeerState};
use wgmgr_daemon::SyncError;
use wgmgr_registry::RegistryError;

/// The step of an operation that failed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Stage {
	Validate,
	Allocate,
	Persist,
	Sync,
	Profile,
}

impl fmt::Display for Stage {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Stage::Validate => "validate",
			Stage::Allocate => "allocate",
			Stage::Persist => "persist",
			Stage::Sync => "sync",
			Stage::Profile => "profile",
		})
	}
}

/// Which side holds the state an operator should trust after a partial
/// failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Authority {
	Registry,
	Daemon,
}

impl fmt::Display for Authority {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(match self {
			Authority::Registry => "registry",
			Authority::Daemon => "daemon",
		})
	}
}

#[derive(Debug, Error)]
pub enum PartialCause {
	#[error(transparent)]
	Sync(#[from] SyncError),

	#[error(transparent)]
	Persist(#[from] RegistryError),

	#[error("failed to write client profile: {0}")]
	Profile(#[from] std::io::Error),
}

#[derive(Debug, Error)]
pub enum LifecycleError {
	#[error("invalid peer name '{name}' (stage: validate): {source}")]
	InvalidName {
		name: String,
		#[source]
		source: PeerNameError,
	},

	#[error("peer '{0}' already exists (stage: validate)")]
	DuplicateName(PeerName),

	#[error("peer '{0}' not found (stage: validate)")]
	NotFound(PeerName),

	#[error("cannot add peer '{peer}': no free address left in {network} (stage: allocate)")]
	PoolExhausted { peer: PeerName, network: Ipv4Net },

	#[error("peer '{peer}': daemon unreachable (stage: sync): {source}")]
	DaemonUnreachable {
		peer: PeerName,
		#[source]
		source: SyncError,
	},

	#[error(
		"peer '{peer}' is {state}: {stage} failed, {authoritative} is authoritative: {source}"
	)]
	PartialFailure {
		peer: PeerName,
		stage: Stage,
		authoritative: Authority,
		/// Registry state of the peer after the failure.
		state: PeerState,
		/// The client profile when the peer was newly created, so the only
		/// copy of its private key is not lost.
		profile: Option<Box<ClientProfile>>,
		#[source]
		source: PartialCause,
	},

	#[error("peer '{peer}': registry write failed (stage: {stage}): {source}")]
	Persistence {
		peer: PeerName,
		stage: Stage,
		#[source]
		source: RegistryError,
	},

	#[error("reconcile of pending peers [{}] failed (stage: {stage}): {source}", join(.pending))]
	ReconcileFailed {
		pending: Vec<PeerName>,
		stage: Stage,
		#[source]
		source: PartialCause,
	},
}

fn join(names: &[PeerName]) -> String {
	names
		.iter()
		.map(PeerName::as_str)
		.collect::<Vec<_>>()
		.join(", ")
}

impl LifecycleError {
	/// Maps a registry failure for `peer` during `stage`.
	pub(crate) fn registry(peer: &PeerName, stage: Stage, e: RegistryError) -> Self {
		match e {
			RegistryError::DuplicateName(name) => LifecycleError::DuplicateName(name),
			RegistryError::NotFound(name) => LifecycleError::NotFound(name),
			RegistryError::PoolExhausted(network) => LifecycleError::PoolExhausted {
				peer: peer.clone(),
				network,
			},
			other => LifecycleError::Persistence {
				peer: peer.clone(),
				stage,
				source: other,
			},
		}
	}

	/// The peer the failure concerns, if it names exactly one.
	pub fn peer(&self) -> Option<&str> {
		match self {
			LifecycleError::InvalidName { name, .. } => Some(name),
			LifecycleError::DuplicateName(peer)
			| LifecycleError::NotFound(peer)
			| LifecycleError::PoolExhausted { peer, .. }
			| LifecycleError::DaemonUnreachable { peer, .. }
			| LifecycleError::PartialFailure { peer, .. }
			| LifecycleError::Persistence { peer, .. } => Some(peer.as_str()),
			LifecycleError::ReconcileFailed { .. } => None,
		}
	}

	pub fn stage(&self) -> Stage {
		match self {
			LifecycleError::InvalidName { .. }
			| LifecycleError::DuplicateName(_)
			| LifecycleError::NotFound(_) => Stage::Validate,
			LifecycleError::PoolExhausted { .. } => Stage::Allocate,
			LifecycleError::DaemonUnreachable { .. } => Stage::Sync,
			LifecycleError::PartialFailure { stage, .. }
			| LifecycleError::Persistence { stage, .. }
			| LifecycleError::ReconcileFailed { stage, .. } => *stage,
		}
	}

	/// Client profile salvaged from a partially failed add.
	pub fn profile(&self) -> Option<&ClientProfile> {
		match self {
			LifecycleError::PartialFailure {
				profile: Some(profile),
				..
			} => Some(&**profile),
			_ => None,
		}
	}
}

pub type Result<T> = std::result::Result<T, LifecycleError>;
