// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::process::Stdio;
use std::time::Duration;

use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tokio::time::timeout;
use tracing::{trace, warn};

use crate::error::ToolError;

/// Runs external programs, optionally through a prefix such as
/// `docker exec -i wireguard`, and never for longer than `timeout`.
#[derive(Debug, Clone)]
pub struct CommandRunner {
	prefix: Vec<String>,
	timeout: Duration,
}

impl CommandRunner {
	pub fn new(prefix: Vec<String>, timeout: Duration) -> Self {
		Self { prefix, timeout }
	}

	pub fn timeout(&self) -> Duration {
		self.timeout
	}

	/// Runs `program args..` and returns its trimmed stdout on success.
	///
	/// `stdin` is written to the child and then closed. The child is killed if
	/// the timeout fires.
	pub async fn run(
		&self,
		program: &str,
		args: &[&str],
		stdin: Option<&[u8]>,
	) -> Result<String, ToolError> {
		let (bin, rest) = match self.prefix.split_first() {
			Some((first, rest)) => (first.as_str(), rest),
			None => (program, &[][..]),
		};

		let mut cmd = Command::new(bin);
		cmd.args(rest);
		if !self.prefix.is_empty() {
			cmd.arg(program);
		}
		cmd.args(args)
			.stdin(if stdin.is_some() {
				Stdio::piped()
			} else {
				Stdio::null()
			})
			.stdout(Stdio::piped())
			.stderr(Stdio::piped())
			.kill_on_drop(true);

		trace!(
			cmd = %format!("{} {}", program, args.join(" ")),
			prefixed = !self.prefix.is_empty(),
			"running external command"
		);

		let mut child = cmd.spawn().map_err(|e| {
			if e.kind() == std::io::ErrorKind::NotFound {
				warn!(program = bin, "program not found in PATH");
			}
			ToolError::Spawn {
				program: bin.to_string(),
				source: e,
			}
		})?;

		if let (Some(input), Some(mut pipe)) = (stdin, child.stdin.take()) {
			pipe.write_all(input).await.map_err(|e| ToolError::Io {
				program: program.to_string(),
				source: e,
			})?;
			drop(pipe);
		}

		let output = match timeout(self.timeout, child.wait_with_output()).await {
			Ok(result) => result.map_err(|e| ToolError::Io {
				program: program.to_string(),
				source: e,
			})?,
			Err(_) => {
				warn!(program, timeout = ?self.timeout, "external command timed out");
				return Err(ToolError::TimedOut {
					program: program.to_string(),
					timeout: self.timeout,
				});
			}
		};

		if output.status.success() {
			Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
		} else {
			Err(ToolError::Failed {
				program: program.to_string(),
				status: output.status.to_string(),
				stderr: String::from_utf8_lossy(&output.stderr).trim().to_string(),
			})
		}
	}
}
