// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{
	ClientConfigLayer, DaemonConfigLayer, InterfaceConfigLayer, LoggingConfigLayer,
	NetworkConfigLayer, PathsConfigLayer,
};

/// Top-level configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct WgmgrConfigLayer {
	#[serde(default)]
	pub network: Option<NetworkConfigLayer>,
	#[serde(default)]
	pub interface: Option<InterfaceConfigLayer>,
	#[serde(default)]
	pub client: Option<ClientConfigLayer>,
	#[serde(default)]
	pub paths: Option<PathsConfigLayer>,
	#[serde(default)]
	pub daemon: Option<DaemonConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl WgmgrConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: WgmgrConfigLayer) {
		merge_option(&mut self.network, other.network, NetworkConfigLayer::merge);
		merge_option(
			&mut self.interface,
			other.interface,
			InterfaceConfigLayer::merge,
		);
		merge_option(&mut self.client, other.client, ClientConfigLayer::merge);
		merge_option(&mut self.paths, other.paths, PathsConfigLayer::merge);
		merge_option(&mut self.daemon, other.daemon, DaemonConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_empty_layers() {
		let mut base = WgmgrConfigLayer::default();
		base.merge(WgmgrConfigLayer::default());
		assert!(base.interface.is_none());
	}

	#[test]
	fn test_merge_other_overwrites() {
		let mut base = WgmgrConfigLayer {
			interface: Some(InterfaceConfigLayer {
				listen_port: Some(51820),
				name: Some("wg0".to_string()),
				..Default::default()
			}),
			..Default::default()
		};
		let other = WgmgrConfigLayer {
			interface: Some(InterfaceConfigLayer {
				listen_port: Some(51821),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(other);
		let interface = base.interface.as_ref().unwrap();
		assert_eq!(interface.listen_port, Some(51821));
		assert_eq!(interface.name, Some("wg0".to_string()));
	}

	#[test]
	fn test_merge_adds_missing_sections() {
		let mut base = WgmgrConfigLayer {
			client: Some(ClientConfigLayer {
				keepalive_secs: Some(15),
				..Default::default()
			}),
			..Default::default()
		};
		let other = WgmgrConfigLayer {
			daemon: Some(DaemonConfigLayer {
				reload_timeout_secs: Some(3),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(other);
		assert_eq!(base.client.as_ref().unwrap().keepalive_secs, Some(15));
		assert_eq!(base.daemon.as_ref().unwrap().reload_timeout_secs, Some(3));
	}

	#[test]
	fn test_unknown_section_is_rejected() {
		let result: Result<WgmgrConfigLayer, _> = toml::from_str("[htpp]\nport = 1\n");
		assert!(result.is_err());
	}
}
