// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{info, instrument};
use wgpanel_config::{KeyBackend, PanelConfig};

use crate::command::CommandRunner;
use crate::daemon::{DaemonControl, WgQuickDaemon};
use crate::document::RegistryDocument;
use crate::engine::RegistrySyncEngine;
use crate::error::Result;
use crate::keys::{KeyMaterialGenerator, NativeKeyGenerator, WgCliKeyGenerator};
use crate::paths::PeerPaths;
use crate::render::{CodeImageRenderer, QrencodeRenderer};
use crate::status::{LiveStatusReconciler, PeerStatus};
use crate::store::{PeerRecord, PeerRecordStore};

/// Body of an add-peer request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddPeerRequest {
	pub name: String,
	pub local_ip: String,
}

/// Entry point for anything that exposes peer management (CLI, HTTP).
pub struct PeerService {
	engine: RegistrySyncEngine,
	status: LiveStatusReconciler,
}

impl PeerService {
	pub fn new(engine: RegistrySyncEngine, status: LiveStatusReconciler) -> Self {
		Self { engine, status }
	}

	/// Wires the production implementations from a resolved configuration and
	/// loads the registry file.
	#[instrument(skip_all, fields(registry = %config.paths.registry_file.display()))]
	pub async fn open(config: &PanelConfig) -> Result<Self> {
		let runner = CommandRunner::new(
			config.daemon.exec_prefix.clone(),
			config.daemon.command_timeout(),
		);

		let keys: Arc<dyn KeyMaterialGenerator> = match config.daemon.key_backend {
			KeyBackend::Wg => Arc::new(WgCliKeyGenerator::new(runner.clone())),
			KeyBackend::Native => Arc::new(NativeKeyGenerator::new()),
		};
		let renderer: Arc<dyn CodeImageRenderer> = Arc::new(QrencodeRenderer::new(runner.clone()));
		let daemon: Arc<dyn DaemonControl> = Arc::new(WgQuickDaemon::new(
			runner,
			config.daemon.interface.clone(),
		));

		let document = RegistryDocument::load(
			&config.paths.registry_file,
			&config.paths.server_public_key_file,
		)
		.await?;
		let document = Arc::new(RwLock::new(document));

		let store = PeerRecordStore::new(
			PeerPaths::new(&config.paths.storage_root),
			keys,
			renderer,
			config.endpoint.clone(),
			config.peer.clone(),
		);
		store.ensure_root().await?;

		info!(
			interface = %config.daemon.interface,
			key_backend = %config.daemon.key_backend,
			"peer service ready"
		);

		Ok(Self::new(
			RegistrySyncEngine::new(store, document.clone(), daemon.clone()),
			LiveStatusReconciler::new(daemon, document),
		))
	}

	pub async fn list_peers(&self) -> Result<Vec<PeerStatus>> {
		self.status.get_peers().await
	}

	pub async fn add_peer(&self, request: &AddPeerRequest) -> Result<PeerRecord> {
		self.engine.add_peer(&request.name, &request.local_ip).await
	}

	pub async fn delete_peer(&self, name: &str) -> Result<()> {
		self.engine.remove_peer(name).await
	}

	pub async fn peer_config(&self, name: &str) -> Result<Vec<u8>> {
		self.engine.store().read_config(name).await
	}

	pub async fn peer_image(&self, name: &str) -> Result<Vec<u8>> {
		self.engine.store().read_image(name).await
	}
}
