// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections for wgpanel.

pub mod daemon;
pub mod endpoint;
pub mod logging;
pub mod paths;
pub mod peer;

pub use daemon::{DaemonConfig, DaemonConfigLayer, KeyBackend};
pub use endpoint::{
	EndpointConfig, EndpointConfigLayer, ENDPOINT_HOST_SETTING, ENDPOINT_PORT_SETTING,
};
pub use logging::{LogFormat, LoggingConfig, LoggingConfigLayer};
pub use paths::{PathsConfig, PathsConfigLayer};
pub use peer::{parse_allowed_ips, FileOwner, PeerConfig, PeerConfigLayer};
