// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, instrument, warn};

use crate::daemon::DaemonControl;
use crate::document::RegistryDocument;
use crate::error::Result;

pub const NOT_CONNECTED: &str = "not connected";

/// One peer as the daemon currently sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PeerStatus {
	/// `None` when the daemon knows a key the registry does not.
	pub name: Option<String>,
	pub local_ip: String,
	#[serde(rename = "remote_ip")]
	pub remote_status: String,
}

pub struct LiveStatusReconciler {
	daemon: Arc<dyn DaemonControl>,
	document: Arc<RwLock<RegistryDocument>>,
}

impl LiveStatusReconciler {
	pub fn new(daemon: Arc<dyn DaemonControl>, document: Arc<RwLock<RegistryDocument>>) -> Self {
		Self { daemon, document }
	}

	/// Live peers in dump order, named from the registry.
	#[instrument(skip(self))]
	pub async fn get_peers(&self) -> Result<Vec<PeerStatus>> {
		let dump = self.daemon.dump().await?;
		let document = self.document.read().await;
		let peers = parse_dump(&dump, |key| document.get_peer_name(key).map(str::to_string));
		debug!(peers = peers.len(), "reconciled live status");
		Ok(peers)
	}
}

/// Parses `wg show <iface> dump`.
///
/// The first line describes the interface and is skipped. Each following line
/// is `public-key preshared-key endpoint allowed-ips ...`.
pub fn parse_dump<F>(dump: &str, resolve_name: F) -> Vec<PeerStatus>
where
	F: Fn(&str) -> Option<String>,
{
	dump
		.lines()
		.skip(1)
		.filter(|line| !line.trim().is_empty())
		.filter_map(|line| {
			let fields: Vec<&str> = line.split_whitespace().collect();
			if fields.len() < 4 {
				warn!(fields = fields.len(), "skipping short line in daemon dump");
				return None;
			}
			let remote_status = match fields[2] {
				"(none)" => NOT_CONNECTED.to_string(),
				endpoint => endpoint.to_string(),
			};
			Some(PeerStatus {
				name: resolve_name(fields[0]),
				local_ip: fields[3].to_string(),
				remote_status,
			})
		})
		.collect()
}
