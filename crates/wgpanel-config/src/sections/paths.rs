// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Storage paths configuration section.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

fn default_storage_root() -> PathBuf {
	PathBuf::from("/config")
}

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PathsConfigLayer {
	pub storage_root: Option<PathBuf>,
	pub registry_file: Option<PathBuf>,
	pub server_public_key_file: Option<PathBuf>,
}

impl PathsConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.storage_root.is_some() {
			self.storage_root = other.storage_root;
		}
		if other.registry_file.is_some() {
			self.registry_file = other.registry_file;
		}
		if other.server_public_key_file.is_some() {
			self.server_public_key_file = other.server_public_key_file;
		}
	}

	/// Resolves unset file paths relative to the storage root, the layout the
	/// linuxserver wireguard image uses.
	pub fn finalize(self) -> PathsConfig {
		let storage_root = self.storage_root.unwrap_or_else(default_storage_root);
		let registry_file = self
			.registry_file
			.unwrap_or_else(|| storage_root.join("wg_confs").join("wg0.conf"));
		let server_public_key_file = self
			.server_public_key_file
			.unwrap_or_else(|| storage_root.join("server").join("publickey-server"));

		PathsConfig {
			storage_root,
			registry_file,
			server_public_key_file,
		}
	}
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PathsConfig {
	pub storage_root: PathBuf,
	pub registry_file: PathBuf,
	pub server_public_key_file: PathBuf,
}

impl Default for PathsConfig {
	fn default() -> Self {
		PathsConfigLayer::default().finalize()
	}
}
