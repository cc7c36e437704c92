// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Address allocation for peers.
//!
//! An [`AddressPool`] covers one IPv4 network. The network address, the
//! gateway (the server's own tunnel address) and the broadcast address are
//! reserved; every other host address is either allocated or free.
//! Allocation always hands out the lowest free address so results are
//! reproducible.

use ipnet::Ipv4Net;
use serde::Serialize;
use std::collections::BTreeSet;
use std::net::Ipv4Addr;
use thiserror::Error;

pub const DEFAULT_NETWORK: &str = "10.8.0.0/24";
pub const DEFAULT_GATEWAY: &str = "10.8.0.1";

/// Smallest pool that still leaves an allocatable host after reservations.
pub const MAX_PREFIX_LEN: u8 = 30;

/// Largest pool accepted; allocation scans the host range linearly.
pub const MIN_PREFIX_LEN: u8 = 16;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum PoolError {
	#[error("address pool exhausted")]
	PoolExhausted,

	#[error("address {0} is not allocated")]
	UnknownAddress(Ipv4Addr),

	#[error("address {0} is already allocated")]
	AlreadyAllocated(Ipv4Addr),

	#[error("address {0} is reserved")]
	Reserved(Ipv4Addr),

	#[error("address {addr} is outside {network}")]
	OutOfRange { addr: Ipv4Addr, network: Ipv4Net },

	#[error("invalid pool: {0}")]
	InvalidPool(String),
}

pub type Result<T> = std::result::Result<T, PoolError>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct PoolStatus {
	pub network: Ipv4Net,
	pub total: u32,
	pub reserved: u32,
	pub allocated: u32,
	pub free: u32,
}

#[derive(Debug, Clone)]
pub struct AddressPool {
	network: Ipv4Net,
	gateway: Ipv4Addr,
	allocated: BTreeSet<Ipv4Addr>,
}

impl AddressPool {
	pub fn new(network: Ipv4Net, gateway: Ipv4Addr) -> Result<Self> {
		let network = network.trunc();
		if network.prefix_len() > MAX_PREFIX_LEN {
			return Err(PoolError::InvalidPool(format!(
				"{network} is too small, prefix must be /{MAX_PREFIX_LEN} or shorter"
			)));
		}
		if network.prefix_len() < MIN_PREFIX_LEN {
			return Err(PoolError::InvalidPool(format!(
				"{network} is too large, prefix must be /{MIN_PREFIX_LEN} or longer"
			)));
		}
		if !network.contains(&gateway) {
			return Err(PoolError::InvalidPool(format!(
				"gateway {gateway} is outside {network}"
			)));
		}
		if gateway == network.network() || gateway == network.broadcast() {
			return Err(PoolError::InvalidPool(format!(
				"gateway {gateway} must be a host address of {network}"
			)));
		}

		Ok(Self {
			network,
			gateway,
			allocated: BTreeSet::new(),
		})
	}

	pub fn network(&self) -> Ipv4Net {
		self.network
	}

	pub fn gateway(&self) -> Ipv4Addr {
		self.gateway
	}

	pub fn reserved(&self) -> [Ipv4Addr; 3] {
		[self.network.network(), self.gateway, self.network.broadcast()]
	}

	pub fn is_reserved(&self, addr: Ipv4Addr) -> bool {
		self.reserved().contains(&addr)
	}

	/// True when `addr` is a host address of this pool that may ever be
	/// handed to a peer.
	pub fn is_allocatable(&self, addr: Ipv4Addr) -> bool {
		self.network.contains(&addr) && !self.is_reserved(addr)
	}

	pub fn is_allocated(&self, addr: Ipv4Addr) -> bool {
		self.allocated.contains(&addr)
	}

	pub fn allocated(&self) -> impl Iterator<Item = Ipv4Addr> + '_ {
		self.allocated.iter().copied()
	}

	pub fn allocate(&mut self) -> Result<Ipv4Addr> {
		let addr = self
			.network
			.hosts()
			.find(|addr| !self.is_reserved(*addr) && !self.allocated.contains(addr))
			.ok_or(PoolError::PoolExhausted)?;
		self.allocated.insert(addr);
		Ok(addr)
	}

	/// Returns `addr` to the free set. Releasing an address twice fails.
	pub fn release(&mut self, addr: Ipv4Addr) -> Result<()> {
		self.check_in_range(addr)?;
		if !self.allocated.remove(&addr) {
			return Err(PoolError::UnknownAddress(addr));
		}
		Ok(())
	}

	/// Marks a specific address as allocated; used to rebuild pool state
	/// from persisted peers.
	pub fn claim(&mut self, addr: Ipv4Addr) -> Result<()> {
		self.check_in_range(addr)?;
		if !self.allocated.insert(addr) {
			return Err(PoolError::AlreadyAllocated(addr));
		}
		Ok(())
	}

	fn check_in_range(&self, addr: Ipv4Addr) -> Result<()> {
		if !self.network.contains(&addr) {
			return Err(PoolError::OutOfRange {
				addr,
				network: self.network,
			});
		}
		if self.is_reserved(addr) {
			return Err(PoolError::Reserved(addr));
		}
		Ok(())
	}

	pub fn status(&self) -> PoolStatus {
		let total = 1u32 << (32 - u32::from(self.network.prefix_len()));
		let reserved = self.reserved().len() as u32;
		let allocated = self.allocated.len() as u32;
		PoolStatus {
			network: self.network,
			total,
			reserved,
			allocated,
			free: total - reserved - allocated,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	fn pool(cidr: &str, gateway: &str) -> AddressPool {
		AddressPool::new(cidr.parse().unwrap(), gateway.parse().unwrap()).unwrap()
	}

	fn default_pool() -> AddressPool {
		pool(DEFAULT_NETWORK, DEFAULT_GATEWAY)
	}

	#[test]
	fn allocates_lowest_free_address_after_gateway() {
		let mut pool = default_pool();
		assert_eq!(pool.allocate().unwrap(), Ipv4Addr::new(10, 8, 0, 2));
		assert_eq!(pool.allocate().unwrap(), Ipv4Addr::new(10, 8, 0, 3));
	}

	#[test]
	fn reuses_gaps_left_by_release() {
		let mut pool = default_pool();
		let a = pool.allocate().unwrap();
		let b = pool.allocate().unwrap();
		let c = pool.allocate().unwrap();

		pool.release(b).unwrap();
		assert_eq!(pool.allocate().unwrap(), b);
		assert_ne!(a, c);
	}

	#[test]
	fn gateway_in_middle_of_range_is_skipped() {
		let mut pool = pool("10.9.0.0/29", "10.9.0.3");
		let got: Vec<_> = std::iter::from_fn(|| pool.allocate().ok()).collect();
		assert_eq!(
			got,
			vec![
				Ipv4Addr::new(10, 9, 0, 1),
				Ipv4Addr::new(10, 9, 0, 2),
				Ipv4Addr::new(10, 9, 0, 4),
				Ipv4Addr::new(10, 9, 0, 5),
				Ipv4Addr::new(10, 9, 0, 6),
			]
		);
	}

	#[test]
	fn exhaustion_is_reported() {
		let mut pool = pool("10.9.0.0/30", "10.9.0.1");
		assert_eq!(pool.allocate().unwrap(), Ipv4Addr::new(10, 9, 0, 2));
		assert_eq!(pool.allocate(), Err(PoolError::PoolExhausted));
	}

	#[test]
	fn double_release_fails() {
		let mut pool = default_pool();
		let addr = pool.allocate().unwrap();
		pool.release(addr).unwrap();
		assert_eq!(pool.release(addr), Err(PoolError::UnknownAddress(addr)));
	}

	#[test]
	fn reserved_addresses_cannot_be_released_or_claimed() {
		let mut pool = default_pool();
		for addr in pool.reserved() {
			assert_eq!(pool.release(addr), Err(PoolError::Reserved(addr)));
			assert_eq!(pool.claim(addr), Err(PoolError::Reserved(addr)));
		}
	}

	#[test]
	fn out_of_range_addresses_are_rejected() {
		let mut pool = default_pool();
		let addr = Ipv4Addr::new(192, 168, 1, 10);
		assert!(matches!(pool.claim(addr), Err(PoolError::OutOfRange { .. })));
		assert!(matches!(pool.release(addr), Err(PoolError::OutOfRange { .. })));
	}

	#[test]
	fn claim_rejects_duplicates() {
		let mut pool = default_pool();
		let addr = Ipv4Addr::new(10, 8, 0, 7);
		pool.claim(addr).unwrap();
		assert_eq!(pool.claim(addr), Err(PoolError::AlreadyAllocated(addr)));
		assert_eq!(pool.allocate().unwrap(), Ipv4Addr::new(10, 8, 0, 2));
	}

	#[test]
	fn status_counts_partition() {
		let mut pool = default_pool();
		pool.allocate().unwrap();
		let status = pool.status();
		assert_eq!(status.total, 256);
		assert_eq!(status.reserved, 3);
		assert_eq!(status.allocated, 1);
		assert_eq!(status.free, 252);
	}

	#[test]
	fn rejects_bad_pools() {
		let net: Ipv4Net = "10.8.0.0/24".parse().unwrap();
		assert!(AddressPool::new(net, Ipv4Addr::new(10, 9, 0, 1)).is_err());
		assert!(AddressPool::new(net, Ipv4Addr::new(10, 8, 0, 0)).is_err());
		assert!(AddressPool::new(net, Ipv4Addr::new(10, 8, 0, 255)).is_err());
		assert!(AddressPool::new("10.8.0.0/31".parse().unwrap(), Ipv4Addr::new(10, 8, 0, 1)).is_err());
		assert!(AddressPool::new("10.0.0.0/8".parse().unwrap(), Ipv4Addr::new(10, 0, 0, 1)).is_err());
	}

	#[derive(Debug, Clone)]
	enum Op {
		Allocate,
		Release(usize),
	}

	fn op() -> impl Strategy<Value = Op> {
		prop_oneof![Just(Op::Allocate), any::<usize>().prop_map(Op::Release)]
	}

	proptest! {
		#[test]
		fn partition_invariant_holds(ops in prop::collection::vec(op(), 0..200)) {
			let mut pool = pool("10.8.0.0/27", "10.8.0.1");
			let mut live: Vec<Ipv4Addr> = Vec::new();

			for op in ops {
				match op {
					Op::Allocate => match pool.allocate() {
						Ok(addr) => {
							prop_assert!(pool.is_allocatable(addr));
							prop_assert!(!live.contains(&addr));
							live.push(addr);
						}
						Err(e) => {
							prop_assert_eq!(e, PoolError::PoolExhausted);
							prop_assert_eq!(pool.status().free, 0);
						}
					},
					Op::Release(i) if !live.is_empty() => {
						let addr = live.swap_remove(i % live.len());
						prop_assert!(pool.release(addr).is_ok());
					}
					Op::Release(_) => {}
				}

				let status = pool.status();
				prop_assert_eq!(status.allocated as usize, live.len());
				prop_assert_eq!(status.total, status.reserved + status.allocated + status.free);
				for reserved in pool.reserved() {
					prop_assert!(!pool.is_allocated(reserved));
				}
			}
		}

		#[test]
		fn allocate_release_roundtrip_restores_state(pre in 0usize..20) {
			let mut pool = default_pool();
			for _ in 0..pre {
				pool.allocate().unwrap();
			}
			let before = pool.status();
			let before_set: Vec<_> = pool.allocated().collect();

			let addr = pool.allocate().unwrap();
			pool.release(addr).unwrap();

			prop_assert_eq!(pool.status(), before);
			prop_assert_eq!(pool.allocated().collect::<Vec<_>>(), before_set);
			prop_assert_eq!(pool.release(addr), Err(PoolError::UnknownAddress(addr)));
		}
	}
}
