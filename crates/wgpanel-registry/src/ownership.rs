// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io;
use std::path::Path;

use async_trait::async_trait;
use wgpanel_config::FileOwner;

use crate::files;

/// Hands provisioned peer files to the account that serves them.
#[async_trait]
pub trait FileOwnership: Send + Sync {
	async fn set_owner(&self, path: &Path, owner: FileOwner) -> io::Result<()>;
}

/// `chown(2)` on the local filesystem.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemOwnership;

#[async_trait]
impl FileOwnership for SystemOwnership {
	async fn set_owner(&self, path: &Path, owner: FileOwner) -> io::Result<()> {
		files::set_owner(path, owner).await
	}
}
