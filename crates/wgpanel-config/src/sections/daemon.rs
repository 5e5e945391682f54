// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! How the WireGuard daemon and its tooling are reached.

use std::fmt;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

const DEFAULT_INTERFACE: &str = "wg0";
const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Where peer key material comes from.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum KeyBackend {
	/// `wg genkey` / `wg pubkey` / `wg genpsk`, run through the exec prefix.
	#[default]
	Wg,
	/// In-process x25519 generation.
	Native,
}

impl FromStr for KeyBackend {
	type Err = ConfigError;

	fn from_str(s: &str) -> Result<Self, Self::Err> {
		match s.to_lowercase().as_str() {
			"wg" => Ok(Self::Wg),
			"native" => Ok(Self::Native),
			other => Err(ConfigError::InvalidValue {
				key: "daemon.key_backend".to_string(),
				message: format!("unknown key backend '{other}' (expected wg or native)"),
			}),
		}
	}
}

impl fmt::Display for KeyBackend {
	fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
		match self {
			Self::Wg => f.write_str("wg"),
			Self::Native => f.write_str("native"),
		}
	}
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfigLayer {
	pub interface: Option<String>,
	/// Prepended to every external command, e.g. `["docker", "exec", "-i", "wireguard"]`.
	pub exec_prefix: Option<Vec<String>>,
	pub command_timeout_secs: Option<u64>,
	pub key_backend: Option<KeyBackend>,
}

impl DaemonConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.interface.is_some() {
			self.interface = other.interface;
		}
		if other.exec_prefix.is_some() {
			self.exec_prefix = other.exec_prefix;
		}
		if other.command_timeout_secs.is_some() {
			self.command_timeout_secs = other.command_timeout_secs;
		}
		if other.key_backend.is_some() {
			self.key_backend = other.key_backend;
		}
	}

	pub fn finalize(self) -> Result<DaemonConfig, ConfigError> {
		let interface = self
			.interface
			.unwrap_or_else(|| DEFAULT_INTERFACE.to_string());
		if interface.trim().is_empty() {
			return Err(ConfigError::Validation(
				"daemon.interface must not be empty".to_string(),
			));
		}

		let command_timeout_secs = self
			.command_timeout_secs
			.unwrap_or(DEFAULT_COMMAND_TIMEOUT_SECS);
		if command_timeout_secs == 0 {
			return Err(ConfigError::InvalidValue {
				key: "daemon.command_timeout_secs".to_string(),
				message: "must be greater than zero".to_string(),
			});
		}

		Ok(DaemonConfig {
			interface,
			exec_prefix: self
				.exec_prefix
				.unwrap_or_default()
				.into_iter()
				.filter(|s| !s.is_empty())
				.collect(),
			command_timeout_secs,
			key_backend: self.key_backend.unwrap_or_default(),
		})
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DaemonConfig {
	pub interface: String,
	pub exec_prefix: Vec<String>,
	pub command_timeout_secs: u64,
	pub key_backend: KeyBackend,
}

impl DaemonConfig {
	pub fn command_timeout(&self) -> Duration {
		Duration::from_secs(self.command_timeout_secs)
	}
}

impl Default for DaemonConfig {
	fn default() -> Self {
		Self {
			interface: DEFAULT_INTERFACE.to_string(),
			exec_prefix: Vec::new(),
			command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
			key_backend: KeyBackend::Wg,
		}
	}
}
