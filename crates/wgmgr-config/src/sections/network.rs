// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Tunnel network configuration section.

use ipnet::Ipv4Net;
use serde::{Deserialize, Serialize};
use std::net::Ipv4Addr;
use wgmgr_common::AddressPool;

use crate::error::ConfigError;

fn default_cidr() -> Ipv4Net {
	Ipv4Net::new(Ipv4Addr::new(10, 8, 0, 0), 24).unwrap_or_default()
}

fn default_gateway() -> Ipv4Addr {
	Ipv4Addr::new(10, 8, 0, 1)
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfigLayer {
	pub cidr: Option<Ipv4Net>,
	pub gateway: Option<Ipv4Addr>,
}

impl NetworkConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.cidr.is_some() {
			self.cidr = other.cidr;
		}
		if other.gateway.is_some() {
			self.gateway = other.gateway;
		}
	}

	pub fn finalize(self) -> NetworkConfig {
		NetworkConfig {
			cidr: self.cidr.map(|c| c.trunc()).unwrap_or_else(default_cidr),
			gateway: self.gateway.unwrap_or_else(default_gateway),
		}
	}
}

/// The peer address network and the server's own address inside it.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct NetworkConfig {
	pub cidr: Ipv4Net,
	pub gateway: Ipv4Addr,
}

impl NetworkConfig {
	/// An empty address pool for this network.
	pub fn address_pool(&self) -> Result<AddressPool, ConfigError> {
		AddressPool::new(self.cidr, self.gateway)
			.map_err(|e| ConfigError::Validation(format!("network: {e}")))
	}
}

impl Default for NetworkConfig {
	fn default() -> Self {
		Self {
			cidr: default_cidr(),
			gateway: default_gateway(),
		}
	}
}
