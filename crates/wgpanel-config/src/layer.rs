// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{
	DaemonConfigLayer, EndpointConfigLayer, LoggingConfigLayer, PathsConfigLayer, PeerConfigLayer,
};

/// Panel configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct PanelConfigLayer {
	#[serde(default)]
	pub paths: Option<PathsConfigLayer>,
	#[serde(default)]
	pub endpoint: Option<EndpointConfigLayer>,
	#[serde(default)]
	pub peer: Option<PeerConfigLayer>,
	#[serde(default)]
	pub daemon: Option<DaemonConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
}

impl PanelConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: PanelConfigLayer) {
		merge_option(&mut self.paths, other.paths, PathsConfigLayer::merge);
		merge_option(&mut self.endpoint, other.endpoint, EndpointConfigLayer::merge);
		merge_option(&mut self.peer, other.peer, PeerConfigLayer::merge);
		merge_option(&mut self.daemon, other.daemon, DaemonConfigLayer::merge);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}
