// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use console::style;
use serde_json::json;
use tracing::instrument;
use wgmgr_common::PeerState;

use super::{print_json, Output};
use crate::context::CliContext;

/// Writes the daemon configuration for the current registry. Opening the
/// context has already created the state directories and the server key.
#[instrument(skip(ctx))]
pub async fn handle_init(ctx: &CliContext, output: Output) -> anyhow::Result<()> {
	let config_path = ctx.service.write_daemon_config().await?;
	let public_key = ctx.service.server_public_key();

	if output == Output::Json {
		return print_json(&json!({
			"config_path": config_path,
			"server_public_key": public_key,
			"endpoint": ctx.config.interface.endpoint,
		}));
	}

	println!("{} Initialized {}", style("✓").green().bold(), ctx.config.interface.name);
	println!("  Config:     {}", style(config_path.display()).cyan());
	println!("  Public key: {}", style(public_key).cyan());
	println!("  Endpoint:   {}", ctx.config.interface.endpoint);
	println!();
	println!(
		"Start the tunnel with 'wg-quick up {}' or 'systemctl enable --now wg-quick@{}'.",
		config_path.display(),
		ctx.config.interface.name
	);
	Ok(())
}

pub async fn handle_status(ctx: &CliContext, output: Output) -> anyhow::Result<()> {
	let pool = ctx.service.pool_status().await;
	let pending: Vec<String> = ctx
		.service
		.list_peers()
		.await
		.into_iter()
		.filter(|p| p.state == PeerState::Registered)
		.map(|p| p.name.to_string())
		.collect();

	if output == Output::Json {
		return print_json(&json!({
			"interface": ctx.config.interface.name,
			"endpoint": ctx.config.interface.endpoint,
			"server_public_key": ctx.service.server_public_key(),
			"pool": pool,
			"pending": pending,
		}));
	}

	println!("{}", style(&ctx.config.interface.name).cyan().bold());
	println!("  Endpoint:   {}", ctx.config.interface.endpoint);
	println!("  Public key: {}", ctx.service.server_public_key());
	println!("  Network:    {}", pool.network);
	println!(
		"  Addresses:  {} allocated, {} free, {} reserved, {} total",
		pool.allocated, pool.free, pool.reserved, pool.total
	);
	if pending.is_empty() {
		println!("  Pending:    none");
	} else {
		println!(
			"  Pending:    {} (run 'wgmgr repair')",
			style(pending.join(", ")).yellow()
		);
	}
	Ok(())
}
