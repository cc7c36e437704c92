// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Client connection profiles.
//!
//! A profile is what an operator hands to the person behind a new peer. It
//! renders to a standard wg-quick client file.

use crate::keys::{PresharedKey, WgPrivateKey, WgPublicKey};
use crate::keys_file::write_file_with_mode;
use crate::peer::{Peer, PeerName};
use ipnet::{IpNet, Ipv4Net};
use serde::Serialize;
use std::net::IpAddr;
use std::path::{Path, PathBuf};
use tracing::{debug, instrument};
use zeroize::Zeroizing;

pub const DEFAULT_KEEPALIVE_SECS: u16 = 25;
pub const DEFAULT_DNS: &str = "8.8.8.8";
pub const ROUTE_ALL: &str = "0.0.0.0/0";

/// Server-side values shared by every client profile.
#[derive(Debug, Clone)]
pub struct ProfileTemplate {
	pub server_public_key: WgPublicKey,
	pub server_endpoint: String,
	pub dns: Vec<IpAddr>,
	pub allowed_routes: Vec<IpNet>,
	pub keepalive_seconds: u16,
}

impl ProfileTemplate {
	pub fn new(server_public_key: WgPublicKey, server_endpoint: impl Into<String>) -> Self {
		Self {
			server_public_key,
			server_endpoint: server_endpoint.into(),
			dns: vec![IpAddr::from([8, 8, 8, 8])],
			allowed_routes: vec![IpNet::from(Ipv4Net::default())],
			keepalive_seconds: DEFAULT_KEEPALIVE_SECS,
		}
	}

	pub fn for_peer(&self, peer: &Peer, private_key: WgPrivateKey) -> ClientProfile {
		ClientProfile {
			name: peer.name.clone(),
			address: Ipv4Net::from(peer.address),
			private_key,
			dns: self.dns.clone(),
			server_public_key: self.server_public_key,
			preshared_key: peer.preshared_key.clone(),
			server_endpoint: self.server_endpoint.clone(),
			allowed_routes: self.allowed_routes.clone(),
			keepalive_seconds: self.keepalive_seconds,
		}
	}
}

#[derive(Debug, Clone, Serialize)]
pub struct ClientProfile {
	pub name: PeerName,
	/// Single-host (`/32`) tunnel address of the client.
	pub address: Ipv4Net,
	pub private_key: WgPrivateKey,
	pub dns: Vec<IpAddr>,
	pub server_public_key: WgPublicKey,
	pub preshared_key: PresharedKey,
	pub server_endpoint: String,
	pub allowed_routes: Vec<IpNet>,
	pub keepalive_seconds: u16,
}

/// Appends a `Key = value` line in wg-quick syntax.
pub fn push_line(out: &mut String, key: &str, value: &str) {
	out.push_str(key);
	out.push_str(" = ");
	out.push_str(value);
	out.push('\n');
}

fn join<T: std::fmt::Display>(items: &[T]) -> String {
	items
		.iter()
		.map(ToString::to_string)
		.collect::<Vec<_>>()
		.join(", ")
}

impl ClientProfile {
	/// Renders the wg-quick client file. The result contains the client's
	/// private key.
	pub fn render(&self) -> Zeroizing<String> {
		let mut out = Zeroizing::new(String::from("[Interface]\n"));
		let private_key = self.private_key.to_base64();
		let preshared_key = self.preshared_key.to_base64();

		push_line(&mut out, "Address", &self.address.to_string());
		push_line(&mut out, "PrivateKey", private_key.as_str());
		if !self.dns.is_empty() {
			push_line(&mut out, "DNS", &join(&self.dns));
		}
		out.push_str("\n[Peer]\n");
		push_line(&mut out, "PublicKey", &self.server_public_key.to_string());
		push_line(&mut out, "PresharedKey", preshared_key.as_str());
		push_line(&mut out, "Endpoint", &self.server_endpoint);
		push_line(&mut out, "AllowedIPs", &join(&self.allowed_routes));
		if self.keepalive_seconds > 0 {
			push_line(&mut out, "PersistentKeepalive", &self.keepalive_seconds.to_string());
		}
		out
	}

	/// Writes the rendered profile to `<dir>/<name>.conf`, owner-readable only.
	#[instrument(skip(self), fields(peer = %self.name, dir = %dir.display()))]
	pub async fn write_to(&self, dir: &Path) -> std::io::Result<PathBuf> {
		let path = profile_path(dir, &self.name);
		let rendered = self.render();
		write_file_with_mode(&path, rendered.as_bytes(), 0o600).await?;
		debug!(path = %path.display(), "wrote client profile");
		Ok(path)
	}
}

pub fn profile_path(dir: &Path, name: &PeerName) -> PathBuf {
	dir.join(format!("{name}.conf"))
}

/// Deletes a peer's profile file. A missing file is not an error.
#[instrument(fields(peer = %name, dir = %dir.display()))]
pub async fn remove_profile(dir: &Path, name: &PeerName) -> std::io::Result<bool> {
	match tokio::fs::remove_file(profile_path(dir, name)).await {
		Ok(()) => Ok(true),
		Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(false),
		Err(e) => Err(e),
	}
}
