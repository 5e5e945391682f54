// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Peer key material: the [`KeyMaterialGenerator`] seam and its two backends.

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use rand::rngs::OsRng;
use rand::RngCore;
use tracing::{debug, instrument};
use x25519_dalek::{PublicKey, StaticSecret};

use crate::command::CommandRunner;
use crate::error::ToolError;
use crate::secret::SecretString;

/// Keys for one peer, generated once when the peer is created.
#[derive(Debug, Clone)]
pub struct KeyTriple {
	pub private_key: SecretString,
	pub public_key: String,
	pub preshared_key: SecretString,
}

#[async_trait]
pub trait KeyMaterialGenerator: Send + Sync {
	async fn generate_private_key(&self) -> Result<SecretString, ToolError>;

	async fn derive_public_key(&self, private_key: &SecretString) -> Result<String, ToolError>;

	async fn generate_preshared_key(&self) -> Result<SecretString, ToolError>;

	/// Private key first, public key derived from it, preshared key last.
	async fn generate(&self) -> Result<KeyTriple, ToolError> {
		let private_key = self.generate_private_key().await?;
		let public_key = self.derive_public_key(&private_key).await?;
		let preshared_key = self.generate_preshared_key().await?;
		Ok(KeyTriple {
			private_key,
			public_key,
			preshared_key,
		})
	}
}

/// Shells out to `wg genkey`, `wg pubkey` and `wg genpsk`.
#[derive(Debug, Clone)]
pub struct WgCliKeyGenerator {
	runner: CommandRunner,
}

impl WgCliKeyGenerator {
	pub fn new(runner: CommandRunner) -> Self {
		Self { runner }
	}
}

#[async_trait]
impl KeyMaterialGenerator for WgCliKeyGenerator {
	#[instrument(skip(self))]
	async fn generate_private_key(&self) -> Result<SecretString, ToolError> {
		let key = self.runner.run("wg", &["genkey"], None).await?;
		Ok(SecretString::new(key))
	}

	#[instrument(skip_all)]
	async fn derive_public_key(&self, private_key: &SecretString) -> Result<String, ToolError> {
		let public = self
			.runner
			.run("wg", &["pubkey"], Some(private_key.expose().as_bytes()))
			.await?;
		debug!(prefix = %key_prefix(&public), "derived public key");
		Ok(public)
	}

	#[instrument(skip(self))]
	async fn generate_preshared_key(&self) -> Result<SecretString, ToolError> {
		let key = self.runner.run("wg", &["genpsk"], None).await?;
		Ok(SecretString::new(key))
	}
}

/// Generates Curve25519 keys in-process, in the same base64 form `wg` prints.
#[derive(Debug, Clone, Copy, Default)]
pub struct NativeKeyGenerator;

impl NativeKeyGenerator {
	pub fn new() -> Self {
		Self
	}

	fn decode_private(private_key: &SecretString) -> Result<[u8; 32], ToolError> {
		let bytes = STANDARD
			.decode(private_key.expose().trim())
			.map_err(|e| invalid_key(format!("private key is not base64: {e}")))?;
		bytes
			.try_into()
			.map_err(|b: Vec<u8>| invalid_key(format!("private key is {} bytes, expected 32", b.len())))
	}
}

fn invalid_key(message: String) -> ToolError {
	ToolError::Io {
		program: "x25519".to_string(),
		source: std::io::Error::new(std::io::ErrorKind::InvalidInput, message),
	}
}

#[async_trait]
impl KeyMaterialGenerator for NativeKeyGenerator {
	async fn generate_private_key(&self) -> Result<SecretString, ToolError> {
		let secret = StaticSecret::random_from_rng(OsRng);
		Ok(SecretString::new(STANDARD.encode(secret.to_bytes())))
	}

	async fn derive_public_key(&self, private_key: &SecretString) -> Result<String, ToolError> {
		let secret = StaticSecret::from(Self::decode_private(private_key)?);
		Ok(STANDARD.encode(PublicKey::from(&secret).as_bytes()))
	}

	async fn generate_preshared_key(&self) -> Result<SecretString, ToolError> {
		let mut bytes = [0u8; 32];
		OsRng.fill_bytes(&mut bytes);
		let key = SecretString::new(STANDARD.encode(bytes));
		zeroize::Zeroize::zeroize(&mut bytes);
		Ok(key)
	}
}

/// First characters of a public key, enough to correlate log lines.
pub(crate) fn key_prefix(key: &str) -> &str {
	key.get(..8).unwrap_or(key)
}
