// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `wgmgr`: manage the peers of a WireGuard server.

use std::path::PathBuf;

use clap::Parser;
use console::style;

mod commands;
mod context;
mod logging;

use commands::{Command, Output};
use context::CliContext;

#[derive(Parser, Debug)]
#[command(name = "wgmgr", about = "Manage WireGuard peers", version)]
struct Args {
	/// Configuration file (default: /etc/wgmgr/wgmgr.toml)
	#[arg(long, global = true, env = "WGMGR_CONFIG")]
	config: Option<PathBuf>,

	/// Print machine readable JSON
	#[arg(long, global = true)]
	json: bool,

	#[command(subcommand)]
	command: Command,
}

#[tokio::main]
async fn main() {
	let args = Args::parse();

	let logging = wgmgr_config::load_logging_config(args.config.as_deref()).unwrap_or_default();
	logging::init(&logging);

	if let Err(e) = run(args).await {
		tracing::debug!(error = ?e, "command failed");
		eprintln!("{} {:#}", style("error:").red().bold(), e);
		std::process::exit(commands::peers::exit_code(&e));
	}
}

async fn run(args: Args) -> anyhow::Result<()> {
	let config = match &args.config {
		Some(path) => wgmgr_config::load_config_with_file(path)?,
		None => wgmgr_config::load_config()?,
	};
	let output = if args.json { Output::Json } else { Output::Human };

	let ctx = CliContext::open(config).await?;
	commands::run(args.command, &ctx, output).await
}
