// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Server-side wg-quick configuration rendering.

use std::net::Ipv4Addr;

use ipnet::Ipv4Net;
use wgmgr_common::{push_line, Peer, WgPrivateKey};
use zeroize::Zeroizing;

/// The `[Interface]` half of the server configuration.
#[derive(Debug, Clone)]
pub struct InterfaceSettings {
	pub gateway: Ipv4Addr,
	pub prefix_len: u8,
	pub listen_port: u16,
	pub post_up: Vec<String>,
	pub post_down: Vec<String>,
}

impl InterfaceSettings {
	pub fn new(network: Ipv4Net, gateway: Ipv4Addr, listen_port: u16) -> Self {
		Self {
			gateway,
			prefix_len: network.prefix_len(),
			listen_port,
			post_up: Vec::new(),
			post_down: Vec::new(),
		}
	}

	pub fn with_hooks(mut self, post_up: Vec<String>, post_down: Vec<String>) -> Self {
		self.post_up = post_up;
		self.post_down = post_down;
		self
	}
}

/// Renders the complete server configuration for `peers`, in the order given.
///
/// The output embeds the server private key and every preshared key.
pub fn render_server_config(
	settings: &InterfaceSettings,
	private_key: &WgPrivateKey,
	peers: &[Peer],
) -> Zeroizing<String> {
	let mut out = Zeroizing::new(String::from("[Interface]\n"));
	let private_key = private_key.to_base64();

	push_line(&mut out, "Address", &format!("{}/{}", settings.gateway, settings.prefix_len));
	push_line(&mut out, "ListenPort", &settings.listen_port.to_string());
	push_line(&mut out, "PrivateKey", private_key.as_str());
	push_line(&mut out, "SaveConfig", "false");
	for rule in &settings.post_up {
		push_line(&mut out, "PostUp", rule);
	}
	for rule in &settings.post_down {
		push_line(&mut out, "PostDown", rule);
	}

	for peer in peers {
		let preshared_key = peer.preshared_key.to_base64();
		out.push_str("\n[Peer]\n# ");
		out.push_str(peer.name.as_str());
		out.push('\n');
		push_line(&mut out, "PublicKey", &peer.public_key.to_string());
		push_line(&mut out, "PresharedKey", preshared_key.as_str());
		push_line(&mut out, "AllowedIPs", &format!("{}/32", peer.address));
	}

	out
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;
	use wgmgr_common::{PeerKeyMaterial, PeerName, WgKeyPair};

	fn peer(name: &str, last_octet: u8) -> Peer {
		let keys = PeerKeyMaterial::generate();
		Peer {
			name: PeerName::new(name).unwrap(),
			address: Ipv4Addr::new(10, 8, 0, last_octet),
			public_key: *keys.keypair.public_key(),
			preshared_key: keys.preshared_key,
			created_at: Utc::now(),
		}
	}

	fn settings() -> InterfaceSettings {
		InterfaceSettings::new(
			"10.8.0.0/24".parse().unwrap(),
			Ipv4Addr::new(10, 8, 0, 1),
			51820,
		)
	}

	#[test]
	fn renders_interface_without_peers() {
		let server = WgKeyPair::generate();
		let rendered = render_server_config(&settings(), server.private_key(), &[]);

		let expected = format!(
			"[Interface]\n\
			 Address = 10.8.0.1/24\n\
			 ListenPort = 51820\n\
			 PrivateKey = {}\n\
			 SaveConfig = false\n",
			server.private_key().to_base64().as_str()
		);
		assert_eq!(rendered.as_str(), expected);
	}

	#[test]
	fn renders_hooks_and_peers_in_order() {
		let server = WgKeyPair::generate();
		let alice = peer("alice", 2);
		let bob = peer("bob", 3);
		let settings = settings().with_hooks(
			vec!["iptables -A FORWARD -i %i -j ACCEPT".to_string()],
			vec!["iptables -D FORWARD -i %i -j ACCEPT".to_string()],
		);

		let rendered = render_server_config(&settings, server.private_key(), &[alice.clone(), bob]);

		assert!(rendered.contains("PostUp = iptables -A FORWARD -i %i -j ACCEPT\n"));
		assert!(rendered.contains("PostDown = iptables -D FORWARD -i %i -j ACCEPT\n"));
		assert_eq!(rendered.matches("[Peer]").count(), 2);

		let alice_block = format!(
			"\n[Peer]\n# alice\nPublicKey = {}\nPresharedKey = {}\nAllowedIPs = 10.8.0.2/32\n",
			alice.public_key,
			alice.preshared_key.to_base64().as_str()
		);
		assert!(rendered.contains(&alice_block));

		let alice_at = rendered.find("# alice").unwrap();
		let bob_at = rendered.find("# bob").unwrap();
		assert!(alice_at < bob_at);
	}
}
