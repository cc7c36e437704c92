// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

pub mod host;
pub mod peers;

use clap::Subcommand;

use crate::context::CliContext;

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Create the state directories, server key and daemon configuration
	Init,
	/// Register a new peer and print its client configuration
	Add(peers::AddArgs),
	/// Remove a peer from the daemon and the registry
	Remove(peers::RemoveArgs),
	/// List registered peers
	List,
	/// Show a single peer
	Show(peers::ShowArgs),
	/// Re-sync the daemon for one peer, or for every pending peer
	Repair(peers::RepairArgs),
	/// Show address pool usage and pending peers
	Status,
}

/// How results are printed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Output {
	Human,
	Json,
}

pub async fn run(command: Command, ctx: &CliContext, output: Output) -> anyhow::Result<()> {
	match command {
		Command::Init => host::handle_init(ctx, output).await,
		Command::Add(args) => peers::handle_add(args, ctx, output).await,
		Command::Remove(args) => peers::handle_remove(args, ctx, output).await,
		Command::List => peers::handle_list(ctx, output).await,
		Command::Show(args) => peers::handle_show(args, ctx, output).await,
		Command::Repair(args) => peers::handle_repair(args, ctx, output).await,
		Command::Status => host::handle_status(ctx, output).await,
	}
}

pub(crate) fn print_json(value: &serde_json::Value) -> anyhow::Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}
