// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: environment variables and TOML files.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::PanelConfigLayer;
use crate::sections::{
	DaemonConfigLayer, EndpointConfigLayer, LoggingConfigLayer, PathsConfigLayer, PeerConfigLayer,
};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<PanelConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<PanelConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(PanelConfigLayer::default())
	}
}

/// TOML file configuration source.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/wgpanel/wgpanel.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<PanelConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(PanelConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: PanelConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: `WGPANEL_<SECTION>_<FIELD>`. The endpoint and peer defaults
/// also accept the variable names of the linuxserver wireguard image
/// (`SERVERURL`, `SERVERPORT`, `PEERDNS`, `ALLOWEDIPS`); the `WGPANEL_` name
/// wins when both are set.
pub struct EnvSource {
	lookup: Box<dyn Fn(&str) -> Option<String> + Send + Sync>,
}

impl EnvSource {
	pub fn new() -> Self {
		Self::with_lookup(|name| std::env::var(name).ok())
	}

	/// Reads variables through `lookup` instead of the process environment.
	pub fn with_lookup(lookup: impl Fn(&str) -> Option<String> + Send + Sync + 'static) -> Self {
		Self {
			lookup: Box::new(lookup),
		}
	}

	fn var(&self, name: &str) -> Option<String> {
		(self.lookup)(name).filter(|s| !s.is_empty())
	}

	fn var_or(&self, name: &str, fallback: &str) -> Option<String> {
		self.var(name).or_else(|| self.var(fallback))
	}

	fn parse<T: std::str::FromStr>(
		&self,
		name: &str,
		value: Option<String>,
	) -> Result<Option<T>, ConfigError> {
		match value {
			Some(v) => v.parse().map(Some).map_err(|_| ConfigError::InvalidValue {
				key: name.to_string(),
				message: format!("invalid value '{v}'"),
			}),
			None => Ok(None),
		}
	}

	fn load_paths(&self) -> PathsConfigLayer {
		PathsConfigLayer {
			storage_root: self.var("WGPANEL_STORAGE_ROOT").map(PathBuf::from),
			registry_file: self.var("WGPANEL_REGISTRY_FILE").map(PathBuf::from),
			server_public_key_file: self
				.var("WGPANEL_SERVER_PUBLIC_KEY_FILE")
				.map(PathBuf::from),
		}
	}

	fn load_endpoint(&self) -> Result<EndpointConfigLayer, ConfigError> {
		Ok(EndpointConfigLayer {
			host: self.var_or("WGPANEL_ENDPOINT_HOST", "SERVERURL"),
			port: self.parse(
				"WGPANEL_ENDPOINT_PORT",
				self.var_or("WGPANEL_ENDPOINT_PORT", "SERVERPORT"),
			)?,
		})
	}

	fn load_peer(&self) -> Result<PeerConfigLayer, ConfigError> {
		Ok(PeerConfigLayer {
			dns: self.var_or("WGPANEL_PEER_DNS", "PEERDNS"),
			allowed_ips: self.var_or("WGPANEL_PEER_ALLOWED_IPS", "ALLOWEDIPS"),
			owner_uid: self.parse(
				"WGPANEL_PEER_OWNER_UID",
				self.var("WGPANEL_PEER_OWNER_UID"),
			)?,
			owner_gid: self.parse(
				"WGPANEL_PEER_OWNER_GID",
				self.var("WGPANEL_PEER_OWNER_GID"),
			)?,
		})
	}

	fn load_daemon(&self) -> Result<DaemonConfigLayer, ConfigError> {
		Ok(DaemonConfigLayer {
			interface: self.var("WGPANEL_DAEMON_INTERFACE"),
			exec_prefix: self
				.var("WGPANEL_DAEMON_EXEC_PREFIX")
				.map(|v| v.split_whitespace().map(str::to_string).collect()),
			command_timeout_secs: self.parse(
				"WGPANEL_DAEMON_COMMAND_TIMEOUT_SECS",
				self.var("WGPANEL_DAEMON_COMMAND_TIMEOUT_SECS"),
			)?,
			key_backend: self
				.var("WGPANEL_KEY_BACKEND")
				.map(|v| v.parse())
				.transpose()?,
		})
	}

	fn load_logging(&self) -> Result<LoggingConfigLayer, ConfigError> {
		Ok(LoggingConfigLayer {
			level: self.var("WGPANEL_LOG_LEVEL"),
			format: self
				.var("WGPANEL_LOG_FORMAT")
				.map(|v| v.parse())
				.transpose()?,
		})
	}
}

impl Default for EnvSource {
	fn default() -> Self {
		Self::new()
	}
}

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<PanelConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(PanelConfigLayer {
			paths: Some(self.load_paths()),
			endpoint: Some(self.load_endpoint()?),
			peer: Some(self.load_peer()?),
			daemon: Some(self.load_daemon()?),
			logging: Some(self.load_logging()?),
		})
	}
}
