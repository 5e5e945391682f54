// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tracing::{debug, instrument, warn};
use wgpanel_config::FileOwner;

pub(crate) const DIR_MODE: u32 = 0o750;
pub(crate) const SECRET_MODE: u32 = 0o600;
pub(crate) const CONFIG_MODE: u32 = 0o640;

/// Creates `path` with `mode`, failing if it already exists.
#[instrument(skip(content), fields(path = %path.display()))]
pub(crate) async fn write_new(path: &Path, content: &[u8], mode: u32) -> io::Result<()> {
	let mut options = OpenOptions::new();
	options.write(true).create_new(true);
	#[cfg(unix)]
	options.mode(mode);

	let mut file = options.open(path).await?;
	file.write_all(content).await?;
	file.flush().await?;
	drop(file);

	// The open mode is filtered by the umask.
	set_mode(path, mode).await
}

/// Replaces `path` with `content` without ever exposing a partial file.
///
/// The content goes to a sibling temp file which is fsynced, given the
/// permissions of the file it replaces (or [`SECRET_MODE`]), and renamed over
/// the target. The temp file is removed on any failure.
#[instrument(skip(content), fields(path = %path.display()))]
pub(crate) async fn write_atomic(path: &Path, content: &[u8]) -> io::Result<()> {
	let tmp = temp_sibling(path);
	let result = write_and_rename(path, &tmp, content).await;
	if result.is_err() {
		if let Err(e) = fs::remove_file(&tmp).await {
			if e.kind() != io::ErrorKind::NotFound {
				warn!(path = %tmp.display(), error = %e, "failed to remove temp file");
			}
		}
	}
	result
}

async fn write_and_rename(path: &Path, tmp: &Path, content: &[u8]) -> io::Result<()> {
	let mode = match fs::metadata(path).await {
		Ok(meta) => permissions_mode(&meta),
		Err(e) if e.kind() == io::ErrorKind::NotFound => SECRET_MODE,
		Err(e) => return Err(e),
	};

	{
		let mut options = OpenOptions::new();
		options.write(true).create(true).truncate(true);
		#[cfg(unix)]
		options.mode(mode);

		let mut file = options.open(tmp).await?;
		file.write_all(content).await?;
		file.flush().await?;
		file.sync_all().await?;
	}

	set_mode(tmp, mode).await?;
	fs::rename(tmp, path).await
}

static TEMP_COUNTER: AtomicU64 = AtomicU64::new(0);

/// Unique per call, so concurrent writers in one process never share a temp file.
pub(crate) fn temp_sibling(path: &Path) -> PathBuf {
	let n = TEMP_COUNTER.fetch_add(1, Ordering::Relaxed);
	path.with_file_name(format!(
		".{}.wgpanel-{}-{n}.tmp",
		file_name(path),
		std::process::id()
	))
}

/// `.<name>.lock` next to `path`.
pub(crate) fn lock_sibling(path: &Path) -> PathBuf {
	path.with_file_name(format!(".{}.lock", file_name(path)))
}

fn file_name(path: &Path) -> String {
	path
		.file_name()
		.map(|n| n.to_string_lossy().into_owned())
		.unwrap_or_default()
}

/// Exclusive advisory lock (`flock`) on a lock file, held until dropped.
///
/// The lock belongs to the open file description, so two handles in the same
/// process exclude each other just like two processes do.
#[derive(Debug)]
pub(crate) struct FileLock {
	#[cfg_attr(not(unix), allow(dead_code))]
	file: std::fs::File,
	path: PathBuf,
}

impl FileLock {
	/// Blocks (off the async workers) until the lock on `lock_path` is ours.
	pub(crate) async fn acquire(lock_path: &Path) -> io::Result<Self> {
		let path = lock_path.to_path_buf();
		tokio::task::spawn_blocking(move || lock_exclusive(path))
			.await
			.map_err(io::Error::other)?
	}

	pub(crate) fn path(&self) -> &Path {
		&self.path
	}
}

#[cfg(unix)]
fn lock_exclusive(path: PathBuf) -> io::Result<FileLock> {
	use std::os::unix::fs::OpenOptionsExt;
	use std::os::unix::io::AsRawFd;

	let file = std::fs::OpenOptions::new()
		.read(true)
		.write(true)
		.create(true)
		.truncate(false)
		.mode(SECRET_MODE)
		.open(&path)?;

	// SAFETY: the descriptor is owned by `file`, which outlives both calls.
	let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX | libc::LOCK_NB) };
	if result != 0 {
		let err = io::Error::last_os_error();
		if err.kind() != io::ErrorKind::WouldBlock {
			return Err(err);
		}
		debug!(path = %path.display(), "waiting for registry lock");
		loop {
			// SAFETY: as above.
			let result = unsafe { libc::flock(file.as_raw_fd(), libc::LOCK_EX) };
			if result == 0 {
				break;
			}
			let err = io::Error::last_os_error();
			if err.kind() != io::ErrorKind::Interrupted {
				return Err(err);
			}
		}
	}

	Ok(FileLock { file, path })
}

#[cfg(not(unix))]
fn lock_exclusive(path: PathBuf) -> io::Result<FileLock> {
	let file = std::fs::OpenOptions::new()
		.read(true)
		.write(true)
		.create(true)
		.truncate(false)
		.open(&path)?;
	Ok(FileLock { file, path })
}

#[cfg(unix)]
impl Drop for FileLock {
	fn drop(&mut self) {
		use std::os::unix::io::AsRawFd;
		// SAFETY: the descriptor is still open; closing it would also release the lock.
		unsafe {
			libc::flock(self.file.as_raw_fd(), libc::LOCK_UN);
		}
	}
}

/// Creates a single directory (not its parents) with `mode`.
pub(crate) async fn create_dir(path: &Path, mode: u32) -> io::Result<()> {
	fs::create_dir(path).await?;
	set_mode(path, mode).await
}

#[cfg(unix)]
pub(crate) async fn set_mode(path: &Path, mode: u32) -> io::Result<()> {
	use std::os::unix::fs::PermissionsExt;
	fs::set_permissions(path, std::fs::Permissions::from_mode(mode)).await
}

#[cfg(not(unix))]
pub(crate) async fn set_mode(_path: &Path, _mode: u32) -> io::Result<()> {
	Ok(())
}

#[cfg(unix)]
fn permissions_mode(meta: &std::fs::Metadata) -> u32 {
	use std::os::unix::fs::PermissionsExt;
	meta.permissions().mode() & 0o7777
}

#[cfg(not(unix))]
fn permissions_mode(_meta: &std::fs::Metadata) -> u32 {
	SECRET_MODE
}

#[cfg(unix)]
pub(crate) async fn set_owner(path: &Path, owner: FileOwner) -> io::Result<()> {
	let path = path.to_path_buf();
	tokio::task::spawn_blocking(move || {
		std::os::unix::fs::chown(&path, Some(owner.uid), Some(owner.gid))
	})
	.await
	.map_err(io::Error::other)?
}

#[cfg(not(unix))]
pub(crate) async fn set_owner(_path: &Path, _owner: FileOwner) -> io::Result<()> {
	Ok(())
}
