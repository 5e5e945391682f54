// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use wgpanel_config::{LogFormat, LoggingConfig};

/// Logs go to stderr so command output on stdout stays machine readable.
/// `RUST_LOG` overrides the configured level.
pub fn init(config: &LoggingConfig) {
	let filter =
		EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
	let registry = tracing_subscriber::registry().with(filter);

	match config.format {
		LogFormat::Json => registry
			.with(fmt::layer().json().with_writer(std::io::stderr))
			.init(),
		LogFormat::Text => registry
			.with(fmt::layer().with_writer(std::io::stderr))
			.init(),
	}
}
