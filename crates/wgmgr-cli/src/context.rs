// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;
use std::sync::Arc;

use anyhow::Context as _;
use tracing::{debug, instrument};
use wgmgr_common::{load_or_create_server_key, ProfileTemplate};
use wgmgr_config::WgmgrConfig;
use wgmgr_daemon::{CommandControl, DaemonControl, InterfaceSettings, Synchronizer, SyncconfControl};
use wgmgr_registry::{create_pool, Registry, SqlitePeerStore};
use wgmgr_service::PeerLifecycleService;

/// Everything a command needs, built once from the resolved configuration.
pub struct CliContext {
	pub config: WgmgrConfig,
	pub service: PeerLifecycleService,
}

impl CliContext {
	#[instrument(skip_all, fields(state_dir = %config.paths.state_dir.display()))]
	pub async fn open(config: WgmgrConfig) -> anyhow::Result<Self> {
		create_private_dir(&config.paths.state_dir).await?;
		create_private_dir(&config.paths.clients_dir).await?;

		let server_key = load_or_create_server_key(&config.paths.state_dir)
			.await
			.context("failed to load server key")?;
		debug!(public_key = %server_key.public_key(), "server key ready");

		let pool = config.network.address_pool()?;
		let db = create_pool(&config.paths.database_url)
			.await
			.with_context(|| format!("failed to open {}", config.paths.database_url))?;
		let store = SqlitePeerStore::open(db).await?;
		let registry = Registry::open(Arc::new(store), pool).await?;

		let control: Arc<dyn DaemonControl> = match &config.daemon.reload_command {
			Some(argv) => Arc::new(
				CommandControl::new(argv.clone())
					.ok_or_else(|| anyhow::anyhow!("daemon.reload_command is empty"))?,
			),
			None => Arc::new(SyncconfControl::new(&config.interface.name)),
		};

		let settings = InterfaceSettings::new(
			config.network.cidr,
			config.network.gateway,
			config.interface.listen_port,
		)
		.with_hooks(
			config.interface.post_up.clone(),
			config.interface.post_down.clone(),
		);

		let template = ProfileTemplate {
			server_public_key: *server_key.public_key(),
			server_endpoint: config.interface.endpoint.clone(),
			dns: config.client.dns.clone(),
			allowed_routes: config.client.allowed_routes.clone(),
			keepalive_seconds: config.client.keepalive_secs,
		};

		let synchronizer = Synchronizer::new(
			settings,
			server_key,
			config.daemon.config_path.clone(),
			control,
			config.daemon.reload_timeout(),
		);

		let service = PeerLifecycleService::new(
			Arc::new(registry),
			synchronizer,
			template,
			config.paths.clients_dir.clone(),
		);

		Ok(Self { config, service })
	}
}

async fn create_private_dir(path: &Path) -> anyhow::Result<()> {
	let mut builder = tokio::fs::DirBuilder::new();
	builder.recursive(true);
	#[cfg(unix)]
	builder.mode(0o700);
	builder
		.create(path)
		.await
		.with_context(|| format!("failed to create {}", path.display()))
}

#[cfg(all(test, unix))]
mod tests {
	use super::*;
	use wgmgr_common::PeerState;
	use wgmgr_config::{DaemonConfigLayer, InterfaceConfigLayer, PathsConfigLayer, WgmgrConfigLayer};

	fn config(state_dir: &Path) -> WgmgrConfig {
		wgmgr_config::finalize(WgmgrConfigLayer {
			interface: Some(InterfaceConfigLayer {
				endpoint: Some("203.0.113.7:51820".to_string()),
				..Default::default()
			}),
			paths: Some(PathsConfigLayer {
				state_dir: Some(state_dir.to_path_buf()),
				..Default::default()
			}),
			daemon: Some(DaemonConfigLayer {
				reload_command: Some(vec!["true".to_string()]),
				..Default::default()
			}),
			..Default::default()
		})
		.unwrap()
	}

	#[tokio::test]
	async fn open_provisions_state_and_survives_restart() {
		let dir = tempfile::TempDir::new().unwrap();

		let ctx = CliContext::open(config(dir.path())).await.unwrap();
		let added = ctx.service.add_peer("alice").await.unwrap();
		assert!(dir.path().join("server_private.key").exists());
		assert!(dir.path().join("clients").join("alice.conf").exists());
		let server_key = *ctx.service.server_public_key();
		drop(ctx);

		let ctx = CliContext::open(config(dir.path())).await.unwrap();
		assert_eq!(*ctx.service.server_public_key(), server_key);
		let alice = ctx.service.get_peer("alice").await.unwrap();
		assert_eq!(alice.address, added.peer.address);
		assert_eq!(alice.state, PeerState::Synced);

		let rendered = std::fs::read_to_string(dir.path().join("wg0.conf")).unwrap();
		assert!(rendered.contains("# alice"));
	}
}
