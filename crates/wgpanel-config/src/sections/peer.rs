// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Defaults written into every generated peer config.

use ipnet::IpNet;
use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_PEER_DNS: &str = "1.1.1.1";
pub const DEFAULT_PEER_ALLOWED_IPS: &str = "0.0.0.0/0, ::/0";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct PeerConfigLayer {
	pub dns: Option<String>,
	pub allowed_ips: Option<String>,
	pub owner_uid: Option<u32>,
	pub owner_gid: Option<u32>,
}

impl PeerConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.dns.is_some() {
			self.dns = other.dns;
		}
		if other.allowed_ips.is_some() {
			self.allowed_ips = other.allowed_ips;
		}
		if other.owner_uid.is_some() {
			self.owner_uid = other.owner_uid;
		}
		if other.owner_gid.is_some() {
			self.owner_gid = other.owner_gid;
		}
	}

	pub fn finalize(self) -> Result<PeerConfig, ConfigError> {
		let dns = self
			.dns
			.filter(|d| !d.trim().is_empty())
			.unwrap_or_else(|| DEFAULT_PEER_DNS.to_string());
		let allowed_ips = self
			.allowed_ips
			.filter(|a| !a.trim().is_empty())
			.unwrap_or_else(|| DEFAULT_PEER_ALLOWED_IPS.to_string());
		parse_allowed_ips(&allowed_ips)?;

		let owner = match (self.owner_uid, self.owner_gid) {
			(Some(uid), Some(gid)) => Some(FileOwner { uid, gid }),
			(None, None) => None,
			_ => {
				return Err(ConfigError::Validation(
					"peer.owner_uid and peer.owner_gid must be set together".to_string(),
				))
			}
		};

		Ok(PeerConfig {
			dns,
			allowed_ips,
			owner,
		})
	}
}

/// Numeric identity that peer directories and config files are handed to.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct FileOwner {
	pub uid: u32,
	pub gid: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PeerConfig {
	pub dns: String,
	pub allowed_ips: String,
	pub owner: Option<FileOwner>,
}

impl Default for PeerConfig {
	fn default() -> Self {
		Self {
			dns: DEFAULT_PEER_DNS.to_string(),
			allowed_ips: DEFAULT_PEER_ALLOWED_IPS.to_string(),
			owner: None,
		}
	}
}

/// Parses a comma separated AllowedIPs list, e.g. `0.0.0.0/0, ::/0`.
pub fn parse_allowed_ips(value: &str) -> Result<Vec<IpNet>, ConfigError> {
	value
		.split(',')
		.map(str::trim)
		.filter(|s| !s.is_empty())
		.map(|s| {
			s.parse::<IpNet>().map_err(|e| ConfigError::InvalidValue {
				key: "peer.allowed_ips".to_string(),
				message: format!("'{s}' is not an IP network: {e}"),
			})
		})
		.collect()
}

#[cfg(test)]
mod tests {
	use super::*;
	use proptest::prelude::*;

	#[test]
	fn test_default_values() {
		let config = PeerConfigLayer::default().finalize().unwrap();
		assert_eq!(config.dns, "1.1.1.1");
		assert_eq!(config.allowed_ips, "0.0.0.0/0, ::/0");
		assert!(config.owner.is_none());
	}

	#[test]
	fn test_owner_requires_both_ids() {
		let result = PeerConfigLayer {
			owner_uid: Some(1000),
			..Default::default()
		}
		.finalize();
		assert!(matches!(result, Err(ConfigError::Validation(_))));
	}

	#[test]
	fn test_owner_pair() {
		let config = PeerConfigLayer {
			owner_uid: Some(1000),
			owner_gid: Some(1000),
			..Default::default()
		}
		.finalize()
		.unwrap();
		assert_eq!(config.owner, Some(FileOwner { uid: 1000, gid: 1000 }));
	}

	#[test]
	fn test_invalid_allowed_ips_rejected() {
		let result = PeerConfigLayer {
			allowed_ips: Some("10.0.0.0/8, not-a-net".to_string()),
			..Default::default()
		}
		.finalize();
		assert!(matches!(result, Err(ConfigError::InvalidValue { .. })));
	}

	#[test]
	fn test_split_tunnel_allowed_ips() {
		let nets = parse_allowed_ips("10.13.13.0/24,192.168.1.0/24").unwrap();
		assert_eq!(nets.len(), 2);
	}

	proptest! {
		#[test]
		fn prop_ipv4_networks_always_parse(a in 0u8..=255, b in 0u8..=255, prefix in 0u8..=32) {
			let value = format!("{a}.{b}.0.0/{prefix}, ::/0");
			prop_assert_eq!(parse_allowed_ips(&value).unwrap().len(), 2);
		}
	}
}
