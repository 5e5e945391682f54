// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Public endpoint that generated peer configs point at.

use serde::{Deserialize, Serialize};

/// Setting names reported when the endpoint is incomplete.
pub const ENDPOINT_HOST_SETTING: &str = "SERVERURL";
pub const ENDPOINT_PORT_SETTING: &str = "SERVERPORT";

#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EndpointConfigLayer {
	pub host: Option<String>,
	pub port: Option<u16>,
}

impl EndpointConfigLayer {
	pub fn merge(&mut self, other: Self) {
		if other.host.is_some() {
			self.host = other.host;
		}
		if other.port.is_some() {
			self.port = other.port;
		}
	}

	pub fn finalize(self) -> EndpointConfig {
		EndpointConfig {
			host: self.host.filter(|h| !h.trim().is_empty()),
			port: self.port,
		}
	}
}

/// Both fields stay optional here: listing peers works without them, only
/// peer creation needs a complete endpoint.
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct EndpointConfig {
	pub host: Option<String>,
	pub port: Option<u16>,
}

impl EndpointConfig {
	pub fn is_complete(&self) -> bool {
		self.host.is_some() && self.port.is_some()
	}

	/// Names of the settings that are still unset.
	pub fn missing_settings(&self) -> Vec<&'static str> {
		let mut missing = Vec::new();
		if self.host.is_none() {
			missing.push(ENDPOINT_HOST_SETTING);
		}
		if self.port.is_none() {
			missing.push(ENDPOINT_PORT_SETTING);
		}
		missing
	}
}
