// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::Path;

use async_trait::async_trait;

use crate::command::CommandRunner;
use crate::error::ToolError;

/// Turns a peer config file into a scannable image for mobile clients.
#[async_trait]
pub trait CodeImageRenderer: Send + Sync {
	async fn render(&self, config_path: &Path, image_path: &Path) -> Result<(), ToolError>;
}

/// `qrencode -o <image> -r <config>`.
#[derive(Debug, Clone)]
pub struct QrencodeRenderer {
	runner: CommandRunner,
}

impl QrencodeRenderer {
	pub fn new(runner: CommandRunner) -> Self {
		Self { runner }
	}
}

#[async_trait]
impl CodeImageRenderer for QrencodeRenderer {
	async fn render(&self, config_path: &Path, image_path: &Path) -> Result<(), ToolError> {
		let image = image_path.to_string_lossy();
		let config = config_path.to_string_lossy();
		self
			.runner
			.run("qrencode", &["-o", &image, "-r", &config], None)
			.await?;
		Ok(())
	}
}
