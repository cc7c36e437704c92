// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client profile defaults.

use ipnet::{IpNet, Ipv4Net};
use serde::{Deserialize, Serialize};
use std::net::{IpAddr, Ipv4Addr};

pub const DEFAULT_KEEPALIVE_SECS: u16 = 25;

fn default_dns() -> Vec<IpAddr> {
	vec![IpAddr::V4(Ipv4Addr::new(8, 8, 8, 8))]
}

fn default_allowed_routes() -> Vec<IpNet> {
	vec![IpNet::V4(Ipv4Net::default())]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct ClientConfigLayer {
	pub dns: Option<Vec<IpAddr>>,
	pub allowed_routes: Option<Vec<IpNet>>,
	pub keepalive_secs: Option<u16>,
}

impl ClientConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.dns.is_some() {
			self.dns = other.dns;
		}
		if other.allowed_routes.is_some() {
			self.allowed_routes = other.allowed_routes;
		}
		if other.keepalive_secs.is_some() {
			self.keepalive_secs = other.keepalive_secs;
		}
	}

	pub fn finalize(self) -> ClientConfig {
		ClientConfig {
			dns: self.dns.unwrap_or_else(default_dns),
			allowed_routes: self.allowed_routes.unwrap_or_else(default_allowed_routes),
			keepalive_secs: self.keepalive_secs.unwrap_or(DEFAULT_KEEPALIVE_SECS),
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ClientConfig {
	pub dns: Vec<IpAddr>,
	pub allowed_routes: Vec<IpNet>,
	/// Zero disables keepalive in rendered profiles.
	pub keepalive_secs: u16,
}

impl Default for ClientConfig {
	fn default() -> Self {
		Self {
			dns: default_dns(),
			allowed_routes: default_allowed_routes(),
			keepalive_secs: DEFAULT_KEEPALIVE_SECS,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_default_values() {
		let config = ClientConfig::default();
		assert_eq!(config.dns, vec!["8.8.8.8".parse::<IpAddr>().unwrap()]);
		assert_eq!(
			config.allowed_routes,
			vec!["0.0.0.0/0".parse::<IpNet>().unwrap()]
		);
		assert_eq!(config.keepalive_secs, 25);
	}

	#[test]
	fn test_layer_finalize_defaults() {
		assert_eq!(ClientConfigLayer::default().finalize(), ClientConfig::default());
	}

	#[test]
	fn test_split_tunnel_routes() {
		let toml_str = r#"
allowed_routes = ["10.8.0.0/24", "192.168.10.0/24"]
dns = ["1.1.1.1", "2606:4700:4700::1111"]
"#;
		let layer: ClientConfigLayer = toml::from_str(toml_str).unwrap();
		let config = layer.finalize();
		assert_eq!(config.allowed_routes.len(), 2);
		assert_eq!(config.dns.len(), 2);
		assert_eq!(config.keepalive_secs, 25);
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = ClientConfigLayer {
			keepalive_secs: Some(25),
			..Default::default()
		};
		base.merge(ClientConfigLayer {
			keepalive_secs: Some(0),
			..Default::default()
		});
		assert_eq!(base.keepalive_secs, Some(0));
		assert!(base.dns.is_none());
	}

	#[test]
	fn test_keepalive_out_of_range_is_rejected() {
		let result: Result<ClientConfigLayer, _> = toml::from_str("keepalive_secs = 70000");
		assert!(result.is_err());
	}
}
