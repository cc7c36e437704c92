// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server interface configuration section.

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_INTERFACE: &str = "wg0";
pub const DEFAULT_LISTEN_PORT: u16 = 51820;
pub const DEFAULT_EGRESS_INTERFACE: &str = "eth0";

/// Forwarding and NAT rules run by wg-quick when the interface comes up.
/// `%i` is expanded by wg-quick to the interface name.
pub fn default_post_up(egress: &str) -> Vec<String> {
	vec![
		"echo 1 > /proc/sys/net/ipv4/ip_forward".to_string(),
		"iptables -A FORWARD -i %i -j ACCEPT".to_string(),
		"iptables -A FORWARD -o %i -j ACCEPT".to_string(),
		format!("iptables -t nat -A POSTROUTING -o {egress} -j MASQUERADE"),
	]
}

pub fn default_post_down(egress: &str) -> Vec<String> {
	vec![
		"iptables -D FORWARD -i %i -j ACCEPT".to_string(),
		"iptables -D FORWARD -o %i -j ACCEPT".to_string(),
		format!("iptables -t nat -D POSTROUTING -o {egress} -j MASQUERADE"),
	]
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct InterfaceConfigLayer {
	pub name: Option<String>,
	pub listen_port: Option<u16>,
	pub endpoint: Option<String>,
	pub egress_interface: Option<String>,
	pub post_up: Option<Vec<String>>,
	pub post_down: Option<Vec<String>>,
}

impl InterfaceConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.name.is_some() {
			self.name = other.name;
		}
		if other.listen_port.is_some() {
			self.listen_port = other.listen_port;
		}
		if other.endpoint.is_some() {
			self.endpoint = other.endpoint;
		}
		if other.egress_interface.is_some() {
			self.egress_interface = other.egress_interface;
		}
		if other.post_up.is_some() {
			self.post_up = other.post_up;
		}
		if other.post_down.is_some() {
			self.post_down = other.post_down;
		}
	}

	/// Fails when no public endpoint was configured; it cannot be guessed.
	pub fn finalize(self) -> Result<InterfaceConfig, ConfigError> {
		let endpoint = self.endpoint.ok_or_else(|| ConfigError::MissingValue {
			key: "interface.endpoint".to_string(),
			env: "WGMGR_ENDPOINT".to_string(),
		})?;
		validate_endpoint(&endpoint)?;

		let egress_interface = self
			.egress_interface
			.unwrap_or_else(|| DEFAULT_EGRESS_INTERFACE.to_string());
		let post_up = self
			.post_up
			.unwrap_or_else(|| default_post_up(&egress_interface));
		let post_down = self
			.post_down
			.unwrap_or_else(|| default_post_down(&egress_interface));

		Ok(InterfaceConfig {
			name: self.name.unwrap_or_else(|| DEFAULT_INTERFACE.to_string()),
			listen_port: self.listen_port.unwrap_or(DEFAULT_LISTEN_PORT),
			endpoint,
			egress_interface,
			post_up,
			post_down,
		})
	}
}

/// Checks `host:port`. Bracketed IPv6 hosts are accepted.
fn validate_endpoint(endpoint: &str) -> Result<(), ConfigError> {
	let invalid = |message: &str| ConfigError::InvalidValue {
		key: "interface.endpoint".to_string(),
		message: format!("'{endpoint}' {message}"),
	};

	let (host, port) = endpoint
		.rsplit_once(':')
		.ok_or_else(|| invalid("must be host:port"))?;
	if host.is_empty() || host.contains(char::is_whitespace) {
		return Err(invalid("has an empty or malformed host"));
	}
	match port.parse::<u16>() {
		Ok(0) | Err(_) => Err(invalid("has an invalid port")),
		Ok(_) => Ok(()),
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InterfaceConfig {
	pub name: String,
	pub listen_port: u16,
	/// Public `host:port` clients dial.
	pub endpoint: String,
	pub egress_interface: String,
	pub post_up: Vec<String>,
	pub post_down: Vec<String>,
}

#[cfg(test)]
mod tests {
	use super::*;

	fn with_endpoint(endpoint: &str) -> InterfaceConfigLayer {
		InterfaceConfigLayer {
			endpoint: Some(endpoint.to_string()),
			..Default::default()
		}
	}

	#[test]
	fn test_layer_finalize_defaults() {
		let config = with_endpoint("vpn.example.com:51820").finalize().unwrap();
		assert_eq!(config.name, "wg0");
		assert_eq!(config.listen_port, 51820);
		assert_eq!(config.egress_interface, "eth0");
		assert_eq!(config.post_up.len(), 4);
		assert!(config.post_up[3].contains("-o eth0 -j MASQUERADE"));
		assert_eq!(config.post_down.len(), 3);
	}

	#[test]
	fn test_egress_interface_flows_into_nat_rules() {
		let layer = InterfaceConfigLayer {
			egress_interface: Some("ens5".to_string()),
			..with_endpoint("203.0.113.7:51820")
		};
		let config = layer.finalize().unwrap();
		assert!(config.post_up.iter().any(|r| r.contains("-o ens5")));
		assert!(config.post_down.iter().any(|r| r.contains("-o ens5")));
	}

	#[test]
	fn test_missing_endpoint_is_reported() {
		let err = InterfaceConfigLayer::default().finalize().unwrap_err();
		assert!(matches!(err, ConfigError::MissingValue { ref key, .. } if key == "interface.endpoint"));
	}

	#[test]
	fn test_endpoint_validation() {
		assert!(validate_endpoint("203.0.113.7:51820").is_ok());
		assert!(validate_endpoint("[2001:db8::1]:51820").is_ok());
		assert!(validate_endpoint("vpn.example.com").is_err());
		assert!(validate_endpoint(":51820").is_err());
		assert!(validate_endpoint("host:0").is_err());
		assert!(validate_endpoint("host:99999").is_err());
	}

	#[test]
	fn test_explicit_empty_rules_are_kept() {
		let layer = InterfaceConfigLayer {
			post_up: Some(Vec::new()),
			post_down: Some(Vec::new()),
			..with_endpoint("203.0.113.7:51820")
		};
		let config = layer.finalize().unwrap();
		assert!(config.post_up.is_empty());
		assert!(config.post_down.is_empty());
	}

	#[test]
	fn test_merge_overwrites() {
		let mut base = InterfaceConfigLayer {
			name: Some("wg0".to_string()),
			listen_port: Some(51820),
			..Default::default()
		};
		base.merge(InterfaceConfigLayer {
			listen_port: Some(51999),
			..Default::default()
		});
		assert_eq!(base.name, Some("wg0".to_string()));
		assert_eq!(base.listen_port, Some(51999));
	}

	#[test]
	fn test_deserialize_layer_partial() {
		let toml_str = r#"
endpoint = "vpn.example.com:51820"
post_up = ["sysctl -w net.ipv4.ip_forward=1"]
"#;
		let layer: InterfaceConfigLayer = toml::from_str(toml_str).unwrap();
		assert_eq!(layer.endpoint.as_deref(), Some("vpn.example.com:51820"));
		assert_eq!(layer.post_up.as_ref().map(Vec::len), Some(1));
		assert!(layer.post_down.is_none());
	}
}
