// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::{Path, PathBuf};

use crate::error::{RegistryError, Result};

pub const MAX_PEER_NAME_LEN: usize = 64;

/// Resolves every per-peer path from one storage root:
///
/// ```text
/// <root>/<name>/<name>.conf
/// <root>/<name>/<name>.png
/// <root>/<name>/privatekey-<name>
/// <root>/<name>/publickey-<name>
/// <root>/<name>/presharedkey-<name>
/// ```
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PeerPaths {
	root: PathBuf,
}

impl PeerPaths {
	pub fn new(root: impl Into<PathBuf>) -> Self {
		Self { root: root.into() }
	}

	pub fn root(&self) -> &Path {
		&self.root
	}

	pub fn peer_dir(&self, name: &str) -> PathBuf {
		self.root.join(name)
	}

	pub fn config_file(&self, name: &str) -> PathBuf {
		self.peer_dir(name).join(format!("{name}.conf"))
	}

	pub fn image_file(&self, name: &str) -> PathBuf {
		self.peer_dir(name).join(format!("{name}.png"))
	}

	pub fn private_key_file(&self, name: &str) -> PathBuf {
		self.peer_dir(name).join(format!("privatekey-{name}"))
	}

	pub fn public_key_file(&self, name: &str) -> PathBuf {
		self.peer_dir(name).join(format!("publickey-{name}"))
	}

	pub fn preshared_key_file(&self, name: &str) -> PathBuf {
		self.peer_dir(name).join(format!("presharedkey-{name}"))
	}
}

/// Peer names double as directory names and as the `# <name>` comment in the
/// daemon config, so they are restricted to `[A-Za-z0-9_.-]` and may not start
/// with a dot.
pub fn validate_peer_name(name: &str) -> Result<()> {
	if name.is_empty() {
		return Err(RegistryError::InvalidInput(
			"peer name must not be empty".to_string(),
		));
	}
	if name.len() > MAX_PEER_NAME_LEN {
		return Err(RegistryError::InvalidInput(format!(
			"peer name is longer than {MAX_PEER_NAME_LEN} characters"
		)));
	}
	if name.starts_with('.') {
		return Err(RegistryError::InvalidInput(format!(
			"peer name '{name}' must not start with '.'"
		)));
	}
	if let Some(c) = name
		.chars()
		.find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '.')))
	{
		return Err(RegistryError::InvalidInput(format!(
			"peer name '{name}' contains invalid character {c:?}"
		)));
	}
	Ok(())
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_layout() {
		let paths = PeerPaths::new("/config");
		assert_eq!(paths.peer_dir("alice"), PathBuf::from("/config/alice"));
		assert_eq!(
			paths.config_file("alice"),
			PathBuf::from("/config/alice/alice.conf")
		);
		assert_eq!(
			paths.image_file("alice"),
			PathBuf::from("/config/alice/alice.png")
		);
		assert_eq!(
			paths.private_key_file("alice"),
			PathBuf::from("/config/alice/privatekey-alice")
		);
		assert_eq!(
			paths.public_key_file("alice"),
			PathBuf::from("/config/alice/publickey-alice")
		);
		assert_eq!(
			paths.preshared_key_file("alice"),
			PathBuf::from("/config/alice/presharedkey-alice")
		);
	}

	#[test]
	fn test_rejects_traversal_and_separators() {
		for name in ["", "..", ".hidden", "a/b", "../etc", "with space", "tab\there"] {
			assert!(
				validate_peer_name(name).is_err(),
				"{name:?} should be rejected"
			);
		}
	}

	#[test]
	fn test_accepts_typical_names() {
		for name in ["alice", "bob-laptop", "phone_2", "server.lan", "X1"] {
			validate_peer_name(name).unwrap();
		}
	}

	#[test]
	fn test_rejects_overlong_name() {
		let name = "a".repeat(MAX_PEER_NAME_LEN + 1);
		assert!(validate_peer_name(&name).is_err());
	}

	proptest! {
		#[test]
		fn prop_valid_names_stay_inside_root(name in "[A-Za-z0-9_-][A-Za-z0-9_.-]{0,40}") {
			prop_assert!(validate_peer_name(&name).is_ok());
			let paths = PeerPaths::new("/config");
			let dir = paths.peer_dir(&name);
			prop_assert_eq!(dir.parent(), Some(Path::new("/config")));
		}
	}
}
