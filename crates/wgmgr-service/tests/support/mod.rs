// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use std::net::Ipv4Addr;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use ipnet::Ipv4Net;
use tempfile::TempDir;
use wgmgr_common::{AddressPool, ProfileTemplate, WgKeyPair};
use wgmgr_daemon::testing::RecordingControl;
use wgmgr_daemon::{InterfaceSettings, Synchronizer};
use wgmgr_registry::testing::MemoryPeerStore;
use wgmgr_registry::{PeerStore, Registry};
use wgmgr_service::PeerLifecycleService;

pub const RELOAD_TIMEOUT: Duration = Duration::from_millis(200);

/// A service wired to an in-memory store and a recording daemon, with
/// handles on both for fault injection.
pub struct Harness {
	pub service: Arc<PeerLifecycleService>,
	pub store: Arc<MemoryPeerStore>,
	pub control: Arc<RecordingControl>,
	pub network: Ipv4Net,
	pub dir: TempDir,
}

impl Harness {
	pub async fn new() -> Self {
		Self::with_network("10.8.0.0/24").await
	}

	pub async fn with_network(cidr: &str) -> Self {
		let network: Ipv4Net = cidr.parse().unwrap();
		let gateway = network
			.hosts()
			.next()
			.unwrap_or(Ipv4Addr::new(10, 8, 0, 1));
		let pool = AddressPool::new(network, gateway).unwrap();

		let store = Arc::new(MemoryPeerStore::new());
		let registry = Registry::open(store.clone() as Arc<dyn PeerStore>, pool)
			.await
			.unwrap();

		let dir = TempDir::new().unwrap();
		let control = Arc::new(RecordingControl::new());
		let server_key = WgKeyPair::generate();
		let template = ProfileTemplate::new(*server_key.public_key(), "vpn.example.com:51820");
		let synchronizer = Synchronizer::new(
			InterfaceSettings::new(network, gateway, 51820),
			server_key,
			dir.path().join("wg0.conf"),
			control.clone(),
			RELOAD_TIMEOUT,
		);
		let service = PeerLifecycleService::new(
			Arc::new(registry),
			synchronizer,
			template,
			dir.path().join("clients"),
		);

		Self {
			service: Arc::new(service),
			store,
			control,
			network,
			dir,
		}
	}

	pub fn config_path(&self) -> PathBuf {
		self.dir.path().join("wg0.conf")
	}

	pub fn profile_path(&self, name: &str) -> PathBuf {
		self.dir.path().join("clients").join(format!("{name}.conf"))
	}

	pub fn daemon_config(&self) -> String {
		std::fs::read_to_string(self.config_path()).unwrap_or_default()
	}
}
