// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

/// Failure of an external program (`wg`, `wg-quick`, `qrencode`).
#[derive(Debug, Error)]
pub enum ToolError {
	#[error("failed to start {program}: {source}")]
	Spawn {
		program: String,
		#[source]
		source: std::io::Error,
	},

	#[error("{program} exited with {status}: {stderr}")]
	Failed {
		program: String,
		status: String,
		stderr: String,
	},

	#[error("{program} did not finish within {timeout:?}")]
	TimedOut { program: String, timeout: Duration },

	#[error("IO error talking to {program}: {source}")]
	Io {
		program: String,
		#[source]
		source: std::io::Error,
	},
}

#[derive(Debug, Error)]
pub enum RegistryError {
	#[error("not found: {0}")]
	NotFound(String),

	#[error("already exists: {0}")]
	AlreadyExists(String),

	#[error("malformed peer block #{index}: {reason}")]
	MalformedRecord { index: usize, reason: String },

	#[error("missing required setting: {0}")]
	Configuration(String),

	#[error("key generation failed: {0}")]
	KeyGeneration(#[source] ToolError),

	#[error("external tool failed: {0}")]
	ExternalTool(#[from] ToolError),

	#[error("daemon was stopped but failed to start again, the tunnel is down: {0}")]
	DaemonDown(#[source] ToolError),

	#[error("failed to write {path}: {source}")]
	Persistence {
		path: PathBuf,
		#[source]
		source: std::io::Error,
	},

	#[error("invalid input: {0}")]
	InvalidInput(String),
}

impl RegistryError {
	pub(crate) fn persistence(path: impl Into<PathBuf>, source: std::io::Error) -> Self {
		Self::Persistence {
			path: path.into(),
			source,
		}
	}

	/// True when the caller asked for something impossible (bad input, unknown
	/// or duplicate peer) rather than the panel failing internally.
	pub fn is_client_error(&self) -> bool {
		matches!(
			self,
			Self::NotFound(_) | Self::AlreadyExists(_) | Self::InvalidInput(_)
		)
	}

	/// True when the daemon was left stopped and needs operator attention.
	pub fn is_critical(&self) -> bool {
		matches!(self, Self::DaemonDown(_))
	}
}

pub type Result<T> = std::result::Result<T, RegistryError>;
