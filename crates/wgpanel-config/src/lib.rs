// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration for the wgpanel peer registry.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file, environment)
//! - Type-safe configuration, validated once at startup
//! - Environment variables named `WGPANEL_*`, plus the linuxserver wireguard
//!   image names for the endpoint and peer defaults
//!
//! # Usage
//!
//! ```ignore
//! use wgpanel_config::load_config;
//!
//! let config = load_config()?;
//! println!("registry file: {}", config.paths.registry_file.display());
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::PanelConfigLayer;
pub use sections::*;
pub use sources::{ConfigSource, DefaultsSource, EnvSource, Precedence, TomlSource};

use serde::Serialize;
use tracing::{debug, info, warn};

/// Fully resolved panel configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct PanelConfig {
	pub paths: PathsConfig,
	pub endpoint: EndpointConfig,
	pub peer: PeerConfig,
	pub daemon: DaemonConfig,
	pub logging: LoggingConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables
/// 2. Config file (`/etc/wgpanel/wgpanel.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<PanelConfig, ConfigError> {
	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource::new()),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(
	config_path: impl Into<std::path::PathBuf>,
) -> Result<PanelConfig, ConfigError> {
	load_config_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource::new()),
	])
}

/// Merge the given sources in precedence order and finalize the result.
pub fn load_config_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<PanelConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = PanelConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: PanelConfigLayer) -> Result<PanelConfig, ConfigError> {
	let paths = layer.paths.unwrap_or_default().finalize();
	let endpoint = layer.endpoint.unwrap_or_default().finalize();
	let peer = layer.peer.unwrap_or_default().finalize()?;
	let daemon = layer.daemon.unwrap_or_default().finalize()?;
	let logging = layer.logging.unwrap_or_default().finalize();

	let missing = endpoint.missing_settings();
	if !missing.is_empty() {
		warn!(
			missing = %missing.join(", "),
			"endpoint is incomplete, adding peers will fail until it is configured"
		);
	}

	info!(
		storage_root = %paths.storage_root.display(),
		registry_file = %paths.registry_file.display(),
		interface = %daemon.interface,
		key_backend = %daemon.key_backend,
		exec_prefix = daemon.exec_prefix.len(),
		endpoint_configured = endpoint.is_complete(),
		"Panel configuration loaded"
	);

	Ok(PanelConfig {
		paths,
		endpoint,
		peer,
		daemon,
		logging,
	})
}
