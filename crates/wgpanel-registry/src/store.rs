// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Directory-per-peer storage: key files, the client config and its QR image.

use std::io;
use std::net::IpAddr;
use std::path::Path;
use std::sync::Arc;

use tokio::fs;
use tracing::{debug, error, info, instrument, warn};
use wgpanel_config::{EndpointConfig, PeerConfig, ENDPOINT_HOST_SETTING};

use crate::error::{RegistryError, Result};
use crate::files::{self, CONFIG_MODE, DIR_MODE, SECRET_MODE};
use crate::keys::{key_prefix, KeyMaterialGenerator, KeyTriple};
use crate::ownership::{FileOwnership, SystemOwnership};
use crate::paths::{validate_peer_name, PeerPaths};
use crate::render::CodeImageRenderer;
use crate::secret::SecretString;

/// A fully provisioned peer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerRecord {
	pub name: String,
	pub public_key: String,
	pub preshared_key: SecretString,
	pub tunnel_ip: IpAddr,
}

/// Values written into the `[Peer]` section of a generated client config.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerSettings {
	/// `host:port` of the daemon.
	pub endpoint: String,
	pub dns: String,
	pub allowed_ips: String,
}

impl PeerSettings {
	/// Fails with [`RegistryError::Configuration`] naming the first missing
	/// endpoint setting.
	pub fn resolve(endpoint: &EndpointConfig, peer: &PeerConfig) -> Result<Self> {
		let host = endpoint
			.host
			.as_deref()
			.filter(|h| !h.trim().is_empty())
			.ok_or_else(|| missing(endpoint))?;
		let port = endpoint.port.ok_or_else(|| missing(endpoint))?;

		Ok(Self {
			endpoint: format!("{host}:{port}"),
			dns: peer.dns.clone(),
			allowed_ips: peer.allowed_ips.clone(),
		})
	}
}

fn missing(endpoint: &EndpointConfig) -> RegistryError {
	let settings = endpoint.missing_settings();
	RegistryError::Configuration(settings.first().copied().unwrap_or(ENDPOINT_HOST_SETTING).to_string())
}

/// Renders the client-side config for a new peer.
pub fn render_peer_config(
	tunnel_ip: IpAddr,
	keys: &KeyTriple,
	daemon_public_key: &str,
	settings: &PeerSettings,
) -> SecretString {
	SecretString::new(format!(
		"[Interface]\n\
		 Address = {tunnel_ip}\n\
		 PrivateKey = {private}\n\
		 ListenPort = 51820\n\
		 DNS = {dns}\n\
		 \n\
		 [Peer]\n\
		 PublicKey = {daemon_public_key}\n\
		 PresharedKey = {psk}\n\
		 Endpoint = {endpoint}\n\
		 AllowedIPs = {allowed_ips}",
		private = keys.private_key.expose(),
		dns = settings.dns,
		psk = keys.preshared_key.expose(),
		endpoint = settings.endpoint,
		allowed_ips = settings.allowed_ips,
	))
}

pub struct PeerRecordStore {
	paths: PeerPaths,
	keys: Arc<dyn KeyMaterialGenerator>,
	renderer: Arc<dyn CodeImageRenderer>,
	ownership: Arc<dyn FileOwnership>,
	endpoint: EndpointConfig,
	peer: PeerConfig,
}

impl PeerRecordStore {
	pub fn new(
		paths: PeerPaths,
		keys: Arc<dyn KeyMaterialGenerator>,
		renderer: Arc<dyn CodeImageRenderer>,
		endpoint: EndpointConfig,
		peer: PeerConfig,
	) -> Self {
		Self {
			paths,
			keys,
			renderer,
			ownership: Arc::new(SystemOwnership),
			endpoint,
			peer,
		}
	}

	/// Replaces the default `chown(2)` used when `peer.owner` is set.
	pub fn with_ownership(mut self, ownership: Arc<dyn FileOwnership>) -> Self {
		self.ownership = ownership;
		self
	}

	pub fn paths(&self) -> &PeerPaths {
		&self.paths
	}

	/// Creates the storage root if it is missing.
	pub async fn ensure_root(&self) -> Result<()> {
		let root = self.paths.root();
		fs::create_dir_all(root)
			.await
			.map_err(|e| RegistryError::persistence(root, e))
	}

	#[instrument(skip(self))]
	pub async fn create_directory(&self, name: &str) -> Result<()> {
		validate_peer_name(name)?;
		let dir = self.paths.peer_dir(name);

		match files::create_dir(&dir, DIR_MODE).await {
			Ok(()) => {}
			Err(e) if e.kind() == io::ErrorKind::AlreadyExists => {
				return Err(RegistryError::AlreadyExists(format!(
					"peer directory {}",
					dir.display()
				)));
			}
			Err(e) => return Err(RegistryError::persistence(&dir, e)),
		}

		if let Err(e) = self.chown(&dir).await {
			warn!(error = %e, "failed to hand over peer directory, removing it");
			if let Err(cleanup) = fs::remove_dir_all(&dir).await {
				error!(error = %cleanup, "failed to remove peer directory");
			}
			return Err(e);
		}

		debug!(dir = %dir.display(), "created peer directory");
		Ok(())
	}

	/// Generates a key triple and writes each key to its own owner-only file.
	#[instrument(skip(self))]
	pub async fn generate_keys(&self, name: &str) -> Result<KeyTriple> {
		let triple = self
			.keys
			.generate()
			.await
			.map_err(RegistryError::KeyGeneration)?;

		let outputs = [
			(self.paths.private_key_file(name), triple.private_key.expose().as_str()),
			(self.paths.public_key_file(name), triple.public_key.as_str()),
			(self.paths.preshared_key_file(name), triple.preshared_key.expose().as_str()),
		];
		for (path, content) in &outputs {
			files::write_new(path, content.as_bytes(), SECRET_MODE)
				.await
				.map_err(|e| RegistryError::persistence(path, e))?;
		}

		debug!(key = %key_prefix(&triple.public_key), "wrote peer keys");
		Ok(triple)
	}

	/// Provisions a peer directory end to end. On any failure after the
	/// directory exists, the directory is removed before the error is returned.
	#[instrument(skip(self, daemon_public_key))]
	pub async fn create_peer(
		&self,
		name: &str,
		tunnel_ip: IpAddr,
		daemon_public_key: &str,
	) -> Result<PeerRecord> {
		self.create_directory(name).await?;

		match self.provision(name, tunnel_ip, daemon_public_key).await {
			Ok(record) => {
				info!(key = %key_prefix(&record.public_key), "peer provisioned");
				Ok(record)
			}
			Err(e) => {
				warn!(error = %e, "peer provisioning failed, removing directory");
				if let Err(cleanup) = self.delete_peer(name).await {
					error!(error = %cleanup, "failed to remove partially provisioned peer");
				}
				Err(e)
			}
		}
	}

	async fn provision(
		&self,
		name: &str,
		tunnel_ip: IpAddr,
		daemon_public_key: &str,
	) -> Result<PeerRecord> {
		let keys = self.generate_keys(name).await?;
		let settings = PeerSettings::resolve(&self.endpoint, &self.peer)?;

		let config_path = self.paths.config_file(name);
		let config = render_peer_config(tunnel_ip, &keys, daemon_public_key, &settings);
		files::write_new(&config_path, config.expose().as_bytes(), CONFIG_MODE)
			.await
			.map_err(|e| RegistryError::persistence(&config_path, e))?;

		self.chown(&config_path).await?;

		self
			.renderer
			.render(&config_path, &self.paths.image_file(name))
			.await?;

		Ok(PeerRecord {
			name: name.to_string(),
			public_key: keys.public_key,
			preshared_key: keys.preshared_key,
			tunnel_ip,
		})
	}

	/// Removes the peer directory. A peer that is already gone is not an error.
	#[instrument(skip(self))]
	pub async fn delete_peer(&self, name: &str) -> Result<()> {
		validate_peer_name(name)?;
		let dir = self.paths.peer_dir(name);
		match fs::remove_dir_all(&dir).await {
			Ok(()) => {
				debug!(dir = %dir.display(), "removed peer directory");
				Ok(())
			}
			Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
			Err(e) => Err(RegistryError::persistence(&dir, e)),
		}
	}

	/// Whether a directory exists for `name`, registered or not.
	pub async fn has_directory(&self, name: &str) -> Result<bool> {
		validate_peer_name(name)?;
		let dir = self.paths.peer_dir(name);
		fs::try_exists(&dir)
			.await
			.map_err(|e| RegistryError::persistence(&dir, e))
	}

	pub async fn read_config(&self, name: &str) -> Result<Vec<u8>> {
		validate_peer_name(name)?;
		read_peer_file(&self.paths.config_file(name), name).await
	}

	pub async fn read_image(&self, name: &str) -> Result<Vec<u8>> {
		validate_peer_name(name)?;
		read_peer_file(&self.paths.image_file(name), name).await
	}

	async fn chown(&self, path: &Path) -> Result<()> {
		let Some(owner) = self.peer.owner else {
			return Ok(());
		};
		self
			.ownership
			.set_owner(path, owner)
			.await
			.map_err(|e| RegistryError::persistence(path, e))
	}
}

async fn read_peer_file(path: &Path, name: &str) -> Result<Vec<u8>> {
	match fs::read(path).await {
		Ok(bytes) => Ok(bytes),
		Err(e) if e.kind() == io::ErrorKind::NotFound => {
			Err(RegistryError::NotFound(format!("peer '{name}'")))
		}
		Err(e) => Err(RegistryError::persistence(path, e)),
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::testing::{FakeKeyGenerator, FakeOwnership, FakeRenderer};
	use tempfile::TempDir;
	use wgpanel_config::FileOwner;

	fn endpoint() -> EndpointConfig {
		EndpointConfig {
			host: Some("vpn.example.com".to_string()),
			port: Some(51820),
		}
	}

	fn store_with(
		dir: &TempDir,
		keys: FakeKeyGenerator,
		renderer: FakeRenderer,
		endpoint: EndpointConfig,
	) -> PeerRecordStore {
		PeerRecordStore::new(
			PeerPaths::new(dir.path()),
			Arc::new(keys),
			Arc::new(renderer),
			endpoint,
			PeerConfig::default(),
		)
	}

	fn store(dir: &TempDir) -> PeerRecordStore {
		store_with(dir, FakeKeyGenerator::new(), FakeRenderer::new(), endpoint())
	}

	fn owned_store(dir: &TempDir, ownership: Arc<FakeOwnership>) -> PeerRecordStore {
		PeerRecordStore::new(
			PeerPaths::new(dir.path()),
			Arc::new(FakeKeyGenerator::new()),
			Arc::new(FakeRenderer::new()),
			endpoint(),
			PeerConfig {
				owner: Some(FileOwner {
					uid: 1000,
					gid: 1000,
				}),
				..PeerConfig::default()
			},
		)
		.with_ownership(ownership)
	}

	fn ip(s: &str) -> IpAddr {
		s.parse().unwrap()
	}

	#[tokio::test]
	async fn test_create_peer_writes_everything() {
		let dir = TempDir::new().unwrap();
		let store = store(&dir);

		let record = store
			.create_peer("alice", ip("10.0.0.2"), "PKSERVER")
			.await
			.unwrap();

		assert_eq!(record.name, "alice");
		assert_eq!(record.tunnel_ip, ip("10.0.0.2"));
		let paths = store.paths();
		assert_eq!(
			std::fs::read_to_string(paths.public_key_file("alice")).unwrap(),
			record.public_key
		);
		assert_eq!(
			std::fs::read_to_string(paths.preshared_key_file("alice")).unwrap(),
			record.preshared_key.expose().as_str()
		);
		assert!(paths.private_key_file("alice").exists());
		assert!(paths.image_file("alice").exists());

		let config = String::from_utf8(store.read_config("alice").await.unwrap()).unwrap();
		assert!(config.starts_with("[Interface]\nAddress = 10.0.0.2\nPrivateKey = "));
		assert!(config.contains("\nDNS = 1.1.1.1\n\n[Peer]\nPublicKey = PKSERVER\n"));
		assert!(config.contains("\nEndpoint = vpn.example.com:51820\n"));
		assert!(config.ends_with("AllowedIPs = 0.0.0.0/0, ::/0"));
	}

	#[cfg(unix)]
	#[tokio::test]
	async fn test_file_modes() {
		use std::os::unix::fs::PermissionsExt;
		let mode = |p: &Path| std::fs::metadata(p).unwrap().permissions().mode() & 0o777;

		let dir = TempDir::new().unwrap();
		let store = store(&dir);
		store
			.create_peer("alice", ip("10.0.0.2"), "PKSERVER")
			.await
			.unwrap();

		let paths = store.paths();
		assert_eq!(mode(&paths.peer_dir("alice")), 0o750);
		assert_eq!(mode(&paths.private_key_file("alice")), 0o600);
		assert_eq!(mode(&paths.public_key_file("alice")), 0o600);
		assert_eq!(mode(&paths.preshared_key_file("alice")), 0o600);
		assert_eq!(mode(&paths.config_file("alice")), 0o640);
	}

	#[tokio::test]
	async fn test_existing_directory_is_already_exists() {
		let dir = TempDir::new().unwrap();
		let store = store(&dir);
		std::fs::create_dir(dir.path().join("alice")).unwrap();

		let err = store
			.create_peer("alice", ip("10.0.0.2"), "PKSERVER")
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::AlreadyExists(_)));
		// Someone else's directory is left alone.
		assert!(dir.path().join("alice").exists());
	}

	#[tokio::test]
	async fn test_key_generation_failure_rolls_back() {
		let dir = TempDir::new().unwrap();
		let keys = FakeKeyGenerator::new();
		keys.fail(true);
		let store = store_with(&dir, keys, FakeRenderer::new(), endpoint());

		let err = store
			.create_peer("alice", ip("10.0.0.2"), "PKSERVER")
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::KeyGeneration(_)));
		assert!(!dir.path().join("alice").exists());
	}

	#[tokio::test]
	async fn test_missing_endpoint_rolls_back() {
		let dir = TempDir::new().unwrap();
		let store = store_with(
			&dir,
			FakeKeyGenerator::new(),
			FakeRenderer::new(),
			EndpointConfig {
				host: Some("vpn.example.com".to_string()),
				port: None,
			},
		);

		let err = store
			.create_peer("alice", ip("10.0.0.2"), "PKSERVER")
			.await
			.unwrap_err();
		match err {
			RegistryError::Configuration(setting) => assert_eq!(setting, "SERVERPORT"),
			other => panic!("expected Configuration, got {other:?}"),
		}
		assert!(!dir.path().join("alice").exists());
	}

	#[tokio::test]
	async fn test_config_write_failure_rolls_back() {
		let dir = TempDir::new().unwrap();
		let conf = PeerPaths::new(dir.path()).config_file("alice");
		let keys = FakeKeyGenerator::new();
		// Occupy the config path so writing it fails.
		keys.on_generate(move || std::fs::create_dir(&conf).unwrap());
		let store = store_with(&dir, keys, FakeRenderer::new(), endpoint());

		let err = store
			.create_peer("alice", ip("10.0.0.2"), "PKSERVER")
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::Persistence { .. }));
		assert!(!dir.path().join("alice").exists());
	}

	#[tokio::test]
	async fn test_render_failure_rolls_back() {
		let dir = TempDir::new().unwrap();
		let renderer = FakeRenderer::new();
		renderer.fail(true);
		let store = store_with(&dir, FakeKeyGenerator::new(), renderer, endpoint());

		let err = store
			.create_peer("alice", ip("10.0.0.2"), "PKSERVER")
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::ExternalTool(_)));
		assert!(!dir.path().join("alice").exists());
	}

	#[tokio::test]
	async fn test_owner_applied_to_directory_and_config() {
		let dir = TempDir::new().unwrap();
		let ownership = Arc::new(FakeOwnership::new());
		let store = owned_store(&dir, ownership.clone());

		store
			.create_peer("alice", ip("10.0.0.2"), "PKSERVER")
			.await
			.unwrap();

		let paths = store.paths();
		assert_eq!(
			ownership.calls(),
			vec![paths.peer_dir("alice"), paths.config_file("alice")]
		);
	}

	#[tokio::test]
	async fn test_no_owner_means_no_chown() {
		let dir = TempDir::new().unwrap();
		let ownership = Arc::new(FakeOwnership::new());
		let store = store(&dir).with_ownership(ownership.clone());

		store
			.create_peer("alice", ip("10.0.0.2"), "PKSERVER")
			.await
			.unwrap();
		assert!(ownership.calls().is_empty());
	}

	#[tokio::test]
	async fn test_directory_chown_failure_removes_directory() {
		let dir = TempDir::new().unwrap();
		let ownership = Arc::new(FakeOwnership::new());
		let peer_dir = dir.path().join("alice");
		let refused = peer_dir.clone();
		ownership.fail_when(move |p| p == refused);
		let store = owned_store(&dir, ownership.clone());

		let err = store
			.create_peer("alice", ip("10.0.0.2"), "PKSERVER")
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::Persistence { .. }));
		assert!(!peer_dir.exists());

		// The name is free again once ownership works.
		ownership.succeed();
		store
			.create_peer("alice", ip("10.0.0.2"), "PKSERVER")
			.await
			.unwrap();
		assert!(peer_dir.exists());
	}

	#[tokio::test]
	async fn test_config_chown_failure_rolls_back() {
		let dir = TempDir::new().unwrap();
		let ownership = Arc::new(FakeOwnership::new());
		ownership.fail_when(|p| p.extension().is_some_and(|ext| ext == "conf"));
		let store = owned_store(&dir, ownership.clone());

		let err = store
			.create_peer("alice", ip("10.0.0.2"), "PKSERVER")
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::Persistence { .. }));
		assert!(!dir.path().join("alice").exists());
		assert_eq!(ownership.calls().len(), 2);
	}

	#[tokio::test]
	async fn test_has_directory() {
		let dir = TempDir::new().unwrap();
		let store = store(&dir);
		assert!(!store.has_directory("alice").await.unwrap());
		std::fs::create_dir(dir.path().join("alice")).unwrap();
		assert!(store.has_directory("alice").await.unwrap());
		assert!(matches!(
			store.has_directory("../alice").await,
			Err(RegistryError::InvalidInput(_))
		));
	}

	#[tokio::test]
	async fn test_delete_is_idempotent() {
		let dir = TempDir::new().unwrap();
		let store = store(&dir);
		store.delete_peer("nobody").await.unwrap();

		store
			.create_peer("alice", ip("10.0.0.2"), "PKSERVER")
			.await
			.unwrap();
		store.delete_peer("alice").await.unwrap();
		store.delete_peer("alice").await.unwrap();
		assert!(!dir.path().join("alice").exists());
	}

	#[tokio::test]
	async fn test_read_missing_peer_is_not_found() {
		let dir = TempDir::new().unwrap();
		let store = store(&dir);
		assert!(matches!(
			store.read_config("ghost").await,
			Err(RegistryError::NotFound(_))
		));
		assert!(matches!(
			store.read_image("ghost").await,
			Err(RegistryError::NotFound(_))
		));
	}

	#[tokio::test]
	async fn test_invalid_name_never_touches_disk() {
		let dir = TempDir::new().unwrap();
		let store = store(&dir);
		let err = store
			.create_peer("../escape", ip("10.0.0.2"), "PKSERVER")
			.await
			.unwrap_err();
		assert!(matches!(err, RegistryError::InvalidInput(_)));
		assert!(matches!(
			store.delete_peer("..").await,
			Err(RegistryError::InvalidInput(_))
		));
	}

	#[test]
	fn test_settings_require_host() {
		let err = PeerSettings::resolve(&EndpointConfig::default(), &PeerConfig::default())
			.unwrap_err();
		match err {
			RegistryError::Configuration(setting) => assert_eq!(setting, "SERVERURL"),
			other => panic!("expected Configuration, got {other:?}"),
		}
	}
}
