// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use async_trait::async_trait;
use tracing::{error, info, instrument};

use crate::command::CommandRunner;
use crate::error::{RegistryError, Result, ToolError};

/// Lifecycle and status operations of the running WireGuard daemon.
#[async_trait]
pub trait DaemonControl: Send + Sync {
	async fn stop_interface(&self) -> std::result::Result<(), ToolError>;

	async fn start_interface(&self) -> std::result::Result<(), ToolError>;

	/// Raw `wg show <iface> dump` output: an interface line followed by one
	/// tab separated line per peer.
	async fn dump(&self) -> std::result::Result<String, ToolError>;
}

/// `wg-quick down|up <iface>` and `wg show <iface> dump`.
#[derive(Debug, Clone)]
pub struct WgQuickDaemon {
	runner: CommandRunner,
	interface: String,
}

impl WgQuickDaemon {
	pub fn new(runner: CommandRunner, interface: impl Into<String>) -> Self {
		Self {
			runner,
			interface: interface.into(),
		}
	}

	pub fn interface(&self) -> &str {
		&self.interface
	}
}

#[async_trait]
impl DaemonControl for WgQuickDaemon {
	async fn stop_interface(&self) -> std::result::Result<(), ToolError> {
		self
			.runner
			.run("wg-quick", &["down", &self.interface], None)
			.await?;
		Ok(())
	}

	async fn start_interface(&self) -> std::result::Result<(), ToolError> {
		self
			.runner
			.run("wg-quick", &["up", &self.interface], None)
			.await?;
		Ok(())
	}

	async fn dump(&self) -> std::result::Result<String, ToolError> {
		self
			.runner
			.run("wg", &["show", &self.interface, "dump"], None)
			.await
	}
}

/// Stop then start the interface so it picks up the rewritten config.
///
/// A failed stop leaves the daemon running the old config and is returned as
/// is. A failed start after a successful stop leaves the tunnel down and is
/// reported as [`RegistryError::DaemonDown`]; nothing tries to bring it back.
#[instrument(skip(daemon))]
pub async fn reload_daemon(daemon: &dyn DaemonControl) -> Result<()> {
	daemon.stop_interface().await?;

	if let Err(e) = daemon.start_interface().await {
		error!(error = %e, "interface stopped but failed to start, tunnel is down");
		return Err(RegistryError::DaemonDown(e));
	}

	info!("daemon reloaded");
	Ok(())
}
