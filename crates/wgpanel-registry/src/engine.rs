// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Add/remove orchestration across peer storage, the registry file and the
//! daemon.
//!
//! Every mutation holds one mutex for its whole run, so check, create,
//! document update and reload never interleave between two callers. Under
//! the mutex it also takes an exclusive `flock` on the registry's sibling
//! lock file and re-reads the registry, which extends the same guarantee to
//! separate processes sharing one `wg0.conf`. The document's write lock is
//! held only while it reloads, mutates and persists, which keeps status reads
//! from ever seeing a half-applied change.

use std::net::IpAddr;
use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tracing::{debug, error, info, instrument, warn};

use crate::daemon::{reload_daemon, DaemonControl};
use crate::document::RegistryDocument;
use crate::error::{RegistryError, Result};
use crate::files::FileLock;
use crate::paths::validate_peer_name;
use crate::store::{PeerRecord, PeerRecordStore};

pub struct RegistrySyncEngine {
	store: PeerRecordStore,
	document: Arc<RwLock<RegistryDocument>>,
	daemon: Arc<dyn DaemonControl>,
	mutation: Mutex<()>,
}

impl RegistrySyncEngine {
	pub fn new(
		store: PeerRecordStore,
		document: Arc<RwLock<RegistryDocument>>,
		daemon: Arc<dyn DaemonControl>,
	) -> Self {
		Self {
			store,
			document,
			daemon,
			mutation: Mutex::new(()),
		}
	}

	pub fn store(&self) -> &PeerRecordStore {
		&self.store
	}

	pub fn document(&self) -> &Arc<RwLock<RegistryDocument>> {
		&self.document
	}

	#[instrument(skip(self))]
	pub async fn add_peer(&self, name: &str, tunnel_ip: &str) -> Result<PeerRecord> {
		validate_peer_name(name)?;
		let ip: IpAddr = tunnel_ip.trim().parse().map_err(|_| {
			RegistryError::InvalidInput(format!("'{tunnel_ip}' is not an IP address"))
		})?;

		let _guard = self.mutation.lock().await;
		let _lock = self.lock_registry().await?;

		let server_public_key = {
			let mut document = self.document.write().await;
			document.reload().await?;
			if document.contains_name(name) {
				return Err(RegistryError::AlreadyExists(format!("peer '{name}'")));
			}
			if document.contains_tunnel_ip(ip) {
				return Err(RegistryError::AlreadyExists(format!("tunnel IP {ip}")));
			}
			document.server_public_key().to_string()
		};

		let record = self.store.create_peer(name, ip, &server_public_key).await?;

		let added = self.document.write().await.add_peer(&record).await;
		if let Err(e) = added {
			warn!(error = %e, "registry update failed, removing peer files");
			if let Err(cleanup) = self.store.delete_peer(name).await {
				error!(error = %cleanup, "failed to remove peer files after registry failure");
			}
			return Err(e);
		}

		reload_daemon(self.daemon.as_ref()).await?;
		info!(%ip, "peer added");
		Ok(record)
	}

	#[instrument(skip(self))]
	pub async fn remove_peer(&self, name: &str) -> Result<()> {
		validate_peer_name(name)?;

		let _guard = self.mutation.lock().await;
		let _lock = self.lock_registry().await?;

		let removed = {
			let mut document = self.document.write().await;
			document.reload().await?;
			document.remove_peer(name).await
		};
		if let Err(e) = removed {
			// With the lock held no add is in flight, so an unregistered
			// directory is left over from a failed one.
			if matches!(e, RegistryError::NotFound(_)) && self.store.has_directory(name).await? {
				warn!("peer is not registered, removing its leftover directory");
				self.store.delete_peer(name).await?;
			}
			return Err(e);
		}

		self.store.delete_peer(name).await?;
		reload_daemon(self.daemon.as_ref()).await?;

		info!("peer removed");
		Ok(())
	}

	async fn lock_registry(&self) -> Result<FileLock> {
		let path = self.document.read().await.lock_path();
		let lock = FileLock::acquire(&path)
			.await
			.map_err(|e| RegistryError::persistence(&path, e))?;
		debug!(path = %lock.path().display(), "registry lock held");
		Ok(lock)
	}
}
