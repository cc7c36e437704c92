// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use clap::Args;
use console::{style, Term};
use qrcode::render::unicode;
use qrcode::QrCode;
use serde_json::json;
use tracing::instrument;
use wgmgr_common::{PeerState, PeerSummary};
use wgmgr_service::LifecycleError;

use super::{print_json, Output};
use crate::context::CliContext;

#[derive(Debug, Clone, Args)]
pub struct AddArgs {
	/// Peer name; also the client profile file name
	pub name: String,
}

#[derive(Debug, Clone, Args)]
pub struct RemoveArgs {
	pub name: String,

	/// Skip the confirmation prompt
	#[arg(long, short)]
	pub yes: bool,
}

#[derive(Debug, Clone, Args)]
pub struct ShowArgs {
	pub name: String,
}

#[derive(Debug, Clone, Args)]
pub struct RepairArgs {
	/// Peer to repair; every pending peer when omitted
	pub name: Option<String>,
}

fn state_label(state: PeerState) -> console::StyledObject<&'static str> {
	match state {
		PeerState::Synced => style(state.as_str()).green(),
		PeerState::Registered => style(state.as_str()).yellow(),
	}
}

#[instrument(skip(ctx))]
pub async fn handle_add(args: AddArgs, ctx: &CliContext, output: Output) -> anyhow::Result<()> {
	let config = match ctx.service.add_peer(&args.name).await {
		Ok(config) => config,
		Err(e) => {
			// The private key exists nowhere else; show it before failing.
			if let Some(profile) = e.profile() {
				eprintln!(
					"{} peer '{}' was registered but not completed; its client configuration follows",
					style("!").yellow().bold(),
					profile.name
				);
				let rendered = profile.render();
				println!("{}", rendered.as_str());
				print_qr(&rendered);
			}
			return Err(e.into());
		}
	};

	if output == Output::Json {
		return print_json(&json!({
			"peer": config.peer,
			"profile_path": config.profile_path,
			"profile": config.profile.render().as_str(),
		}));
	}

	println!(
		"{} Added peer {} ({})",
		style("✓").green().bold(),
		style(&config.peer.name).cyan(),
		config.peer.address
	);
	println!("  Profile: {}", style(config.profile_path.display()).cyan());
	println!();
	let rendered = config.profile.render();
	println!("{}", rendered.as_str());
	print_qr(&rendered);
	Ok(())
}

/// Renders `text` as a QR code made of half-height unicode blocks, light
/// modules on dark so it scans from a dark terminal.
pub(crate) fn render_qr(text: &str) -> Result<String, qrcode::types::QrError> {
	let code = QrCode::new(text.as_bytes())?;
	Ok(code
		.render::<unicode::Dense1x2>()
		.dark_color(unicode::Dense1x2::Light)
		.light_color(unicode::Dense1x2::Dark)
		.build())
}

fn print_qr(text: &str) {
	match render_qr(text) {
		Ok(qr) => println!("{qr}"),
		Err(e) => eprintln!("{} could not render QR code: {e}", style("!").yellow().bold()),
	}
}

fn confirm(prompt: &str) -> std::io::Result<bool> {
	let term = Term::stderr();
	term.write_str(&format!("{prompt} (y/n) "))?;
	let answer = term.read_line()?;
	Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

#[instrument(skip(ctx))]
pub async fn handle_remove(args: RemoveArgs, ctx: &CliContext, output: Output) -> anyhow::Result<()> {
	let peer = ctx.service.get_peer(&args.name).await?;

	if !args.yes {
		let prompt = format!("Remove peer '{}' ({})?", peer.name, peer.address);
		if !confirm(&prompt)? {
			println!("Aborted");
			return Ok(());
		}
	}

	let removed = ctx.service.remove_peer(&args.name).await?;

	if output == Output::Json {
		return print_json(&json!({ "removed": removed }));
	}
	println!(
		"{} Removed peer {} ({})",
		style("✓").green().bold(),
		style(&removed.name).cyan(),
		removed.address
	);
	Ok(())
}

pub(crate) fn format_list(peers: &[PeerSummary]) -> String {
	let mut lines: Vec<String> = peers
		.iter()
		.enumerate()
		.map(|(i, p)| format!("{}. {} ({}) [{}]", i + 1, p.name, p.address, p.state))
		.collect();
	let noun = if peers.len() == 1 { "peer" } else { "peers" };
	lines.push(format!("Total: {} {noun}", peers.len()));
	lines.join("\n")
}

pub async fn handle_list(ctx: &CliContext, output: Output) -> anyhow::Result<()> {
	let peers = ctx.service.list_peers().await;
	match output {
		Output::Json => print_json(&json!(peers)),
		Output::Human => {
			println!("{}", format_list(&peers));
			Ok(())
		}
	}
}

pub async fn handle_show(args: ShowArgs, ctx: &CliContext, output: Output) -> anyhow::Result<()> {
	let peer = ctx.service.get_peer(&args.name).await?;
	if output == Output::Json {
		return print_json(&json!(peer));
	}

	let profile = ctx.service.clients_dir().join(format!("{}.conf", peer.name));
	println!("{}", style(&peer.name).cyan().bold());
	println!("  Address:    {}", peer.address);
	println!("  Public key: {}", peer.public_key);
	println!("  Created:    {}", peer.created_at.to_rfc3339());
	println!("  State:      {}", state_label(peer.state));
	if profile.exists() {
		println!("  Profile:    {}", profile.display());
	}
	Ok(())
}

#[instrument(skip(ctx))]
pub async fn handle_repair(args: RepairArgs, ctx: &CliContext, output: Output) -> anyhow::Result<()> {
	let repaired: Vec<String> = match &args.name {
		Some(name) => {
			let before = ctx.service.get_peer(name).await?;
			let after = ctx.service.repair(name).await?;
			if before.state == PeerState::Registered {
				vec![after.name.to_string()]
			} else {
				Vec::new()
			}
		}
		None => ctx
			.service
			.reconcile()
			.await?
			.into_iter()
			.map(|n| n.to_string())
			.collect(),
	};

	if output == Output::Json {
		return print_json(&json!({ "repaired": repaired }));
	}
	if repaired.is_empty() {
		println!("{} Daemon in sync, nothing pending", style("✓").green().bold());
	} else {
		println!(
			"{} Synced {}",
			style("✓").green().bold(),
			style(repaired.join(", ")).cyan()
		);
	}
	Ok(())
}

/// Exit status for a failed command.
pub(crate) fn exit_code(err: &anyhow::Error) -> i32 {
	match err.downcast_ref::<LifecycleError>() {
		Some(LifecycleError::PartialFailure { .. }) | Some(LifecycleError::ReconcileFailed { .. }) => 3,
		Some(LifecycleError::DaemonUnreachable { .. }) => 4,
		_ => 1,
	}
}
