// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};

use anyhow::Context;
use console::style;
use tokio::io::AsyncWriteExt;
use tracing::instrument;
use wgpanel_config::PanelConfig;
use wgpanel_registry::{AddPeerRequest, PeerService, PeerStatus};

pub fn show_config(config: &PanelConfig) -> anyhow::Result<()> {
	println!("{}", serde_json::to_string_pretty(config)?);
	Ok(())
}

#[instrument(skip(config))]
pub async fn list(config: &PanelConfig, json: bool) -> anyhow::Result<()> {
	let service = PeerService::open(config).await?;
	let peers = service.list_peers().await?;

	if json {
		println!("{}", serde_json::to_string_pretty(&peers)?);
	} else if peers.is_empty() {
		println!("No peers connected to {}", config.daemon.interface);
	} else {
		print!("{}", render_table(&peers));
	}
	Ok(())
}

#[instrument(skip(config))]
pub async fn add(config: &PanelConfig, name: String, ip: String) -> anyhow::Result<()> {
	let service = PeerService::open(config).await?;
	let record = service
		.add_peer(&AddPeerRequest {
			name,
			local_ip: ip,
		})
		.await?;

	println!(
		"{} Added peer {}",
		style("✓").green().bold(),
		style(&record.name).cyan()
	);
	println!("  Tunnel IP:  {}", record.tunnel_ip);
	println!("  Public key: {}", record.public_key);
	Ok(())
}

#[instrument(skip(config))]
pub async fn remove(config: &PanelConfig, name: &str) -> anyhow::Result<()> {
	let service = PeerService::open(config).await?;
	service.delete_peer(name).await?;
	println!("{} Removed peer {}", style("✓").green().bold(), style(name).cyan());
	Ok(())
}

#[instrument(skip(config))]
pub async fn config(config: &PanelConfig, name: &str, output: Option<PathBuf>) -> anyhow::Result<()> {
	let service = PeerService::open(config).await?;
	let bytes = service.peer_config(name).await?;

	match output {
		Some(path) => write_output(&path, &bytes).await,
		None => {
			let mut stdout = tokio::io::stdout();
			stdout.write_all(&bytes).await?;
			if !bytes.ends_with(b"\n") {
				stdout.write_all(b"\n").await?;
			}
			stdout.flush().await?;
			Ok(())
		}
	}
}

#[instrument(skip(config))]
pub async fn qr(config: &PanelConfig, name: &str, output: &Path) -> anyhow::Result<()> {
	let service = PeerService::open(config).await?;
	let bytes = service.peer_image(name).await?;
	write_output(output, &bytes).await
}

async fn write_output(path: &Path, bytes: &[u8]) -> anyhow::Result<()> {
	tokio::fs::write(path, bytes)
		.await
		.with_context(|| format!("failed to write {}", path.display()))?;
	eprintln!("{} Wrote {}", style("✓").green().bold(), path.display());
	Ok(())
}

fn render_table(peers: &[PeerStatus]) -> String {
	let name_width = peers
		.iter()
		.map(|p| p.name.as_deref().map_or(9, str::len))
		.max()
		.unwrap_or(0)
		.max(4);
	let ip_width = peers
		.iter()
		.map(|p| p.local_ip.len())
		.max()
		.unwrap_or(0)
		.max(8);

	let mut out = format!("{:<name_width$}  {:<ip_width$}  REMOTE\n", "NAME", "LOCAL IP");
	for peer in peers {
		let name = peer.name.as_deref().unwrap_or("(unknown)");
		out.push_str(&format!(
			"{name:<name_width$}  {:<ip_width$}  {}\n",
			peer.local_ip, peer.remote_status
		));
	}
	out
}

#[cfg(test)]
mod tests {
	use super::*;

	fn status(name: Option<&str>, ip: &str, remote: &str) -> PeerStatus {
		PeerStatus {
			name: name.map(str::to_string),
			local_ip: ip.to_string(),
			remote_status: remote.to_string(),
		}
	}

	#[test]
	fn test_table_layout() {
		let table = render_table(&[
			status(Some("bob"), "10.0.0.5/32", "not connected"),
			status(None, "10.0.0.9/32", "203.0.113.7:40000"),
		]);
		let lines: Vec<_> = table.lines().collect();
		assert_eq!(lines[0], "NAME       LOCAL IP     REMOTE");
		assert_eq!(lines[1], "bob        10.0.0.5/32  not connected");
		assert_eq!(lines[2], "(unknown)  10.0.0.9/32  203.0.113.7:40000");
	}

	#[tokio::test]
	async fn test_write_output_creates_file() {
		let dir = tempfile::TempDir::new().unwrap();
		let path = dir.path().join("alice.conf");
		write_output(&path, b"[Interface]").await.unwrap();
		assert_eq!(std::fs::read(&path).unwrap(), b"[Interface]");
	}
}
