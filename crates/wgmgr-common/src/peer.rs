// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use crate::keys::{PresharedKey, WgPublicKey};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::net::Ipv4Addr;
use std::str::FromStr;
use thiserror::Error;

pub const MAX_PEER_NAME_LEN: usize = 64;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PeerNameError {
	#[error("peer name must not be empty")]
	Empty,

	#[error("peer name is longer than {MAX_PEER_NAME_LEN} characters")]
	TooLong,

	#[error("peer name must not start with '{0}'")]
	BadLeadingChar(char),

	#[error("peer name contains invalid character '{0}'")]
	InvalidChar(char),
}

/// A validated peer name.
///
/// Names double as client profile file names, so only `[A-Za-z0-9_.-]` is
/// accepted and a leading `.` or `-` is refused.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(transparent)]
pub struct PeerName(String);

impl PeerName {
	pub fn new(name: impl Into<String>) -> Result<Self, PeerNameError> {
		let name = name.into();
		let first = name.chars().next().ok_or(PeerNameError::Empty)?;
		if name.len() > MAX_PEER_NAME_LEN {
			return Err(PeerNameError::TooLong);
		}
		if first == '.' || first == '-' {
			return Err(PeerNameError::BadLeadingChar(first));
		}
		if let Some(c) = name
			.chars()
			.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-')))
		{
			return Err(PeerNameError::InvalidChar(c));
		}
		Ok(Self(name))
	}

	pub fn as_str(&self) -> &str {
		&self.0
	}
}

impl fmt::Display for PeerName {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(&self.0)
	}
}

impl FromStr for PeerName {
	type Err = PeerNameError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		Self::new(s)
	}
}

impl AsRef<str> for PeerName {
	fn as_ref(&self) -> &str {
		&self.0
	}
}

impl<'de> Deserialize<'de> for PeerName {
	fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
	where
		D: serde::Deserializer<'de>,
	{
		let s = String::deserialize(deserializer)?;
		Self::new(s).map_err(serde::de::Error::custom)
	}
}

/// A registered VPN client. Immutable once created; rotation is
/// remove-then-add.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Peer {
	pub name: PeerName,
	pub address: Ipv4Addr,
	pub public_key: WgPublicKey,
	pub preshared_key: PresharedKey,
	pub created_at: DateTime<Utc>,
}

/// Whether the running daemon is known to carry a peer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PeerState {
	/// Committed to the registry, not yet confirmed by a daemon reload.
	Registered,
	/// Present in the last configuration the daemon accepted.
	Synced,
}

impl PeerState {
	pub fn as_str(&self) -> &'static str {
		match self {
			PeerState::Registered => "registered",
			PeerState::Synced => "synced",
		}
	}
}

impl fmt::Display for PeerState {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		f.write_str(self.as_str())
	}
}

impl FromStr for PeerState {
	type Err = String;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s {
			"registered" => Ok(PeerState::Registered),
			"synced" => Ok(PeerState::Synced),
			other => Err(format!("unknown peer state '{other}'")),
		}
	}
}

/// Read-only view of a peer handed to list/get callers. Carries no secret
/// material.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PeerSummary {
	pub name: PeerName,
	pub address: Ipv4Addr,
	pub public_key: WgPublicKey,
	pub created_at: DateTime<Utc>,
	pub state: PeerState,
}

impl PeerSummary {
	pub fn new(peer: &Peer, state: PeerState) -> Self {
		Self {
			name: peer.name.clone(),
			address: peer.address,
			public_key: peer.public_key,
			created_at: peer.created_at,
			state,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn accepts_typical_names() {
		for name in ["alice", "bob-laptop", "phone_2", "ops.jump01", "A"] {
			assert!(PeerName::new(name).is_ok(), "{name} should be valid");
		}
	}

	#[test]
	fn rejects_path_like_names() {
		assert_eq!(
			PeerName::new("../etc/passwd"),
			Err(PeerNameError::BadLeadingChar('.'))
		);
		assert_eq!(PeerName::new("a/b"), Err(PeerNameError::InvalidChar('/')));
		assert_eq!(PeerName::new("a b"), Err(PeerNameError::InvalidChar(' ')));
		assert_eq!(PeerName::new("-rf"), Err(PeerNameError::BadLeadingChar('-')));
	}

	#[test]
	fn rejects_empty_and_long_names() {
		assert_eq!(PeerName::new(""), Err(PeerNameError::Empty));
		assert_eq!(
			PeerName::new("x".repeat(MAX_PEER_NAME_LEN + 1)),
			Err(PeerNameError::TooLong)
		);
		assert!(PeerName::new("x".repeat(MAX_PEER_NAME_LEN)).is_ok());
	}

	#[test]
	fn name_deserialize_validates() {
		assert!(serde_json::from_str::<PeerName>("\"alice\"").is_ok());
		assert!(serde_json::from_str::<PeerName>("\"a/b\"").is_err());
	}

	#[test]
	fn state_string_roundtrip() {
		for state in [PeerState::Registered, PeerState::Synced] {
			assert_eq!(state.as_str().parse::<PeerState>().unwrap(), state);
		}
		assert!("gone".parse::<PeerState>().is_err());
	}

	#[test]
	fn serialized_peer_redacts_preshared_key() {
		let keys = crate::keys::PeerKeyMaterial::generate();
		let peer = Peer {
			name: PeerName::new("alice").unwrap(),
			address: Ipv4Addr::new(10, 8, 0, 2),
			public_key: *keys.keypair.public_key(),
			preshared_key: keys.preshared_key.clone(),
			created_at: Utc::now(),
		};
		let json = serde_json::to_string(&peer).unwrap();
		assert!(json.contains(crate::keys::REDACTED));
		assert!(!json.contains(keys.preshared_key.to_base64().as_str()));
	}
}
