// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory fakes for the external-tool seams.

use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;
use wgpanel_config::FileOwner;

use crate::daemon::DaemonControl;
use crate::error::ToolError;
use crate::keys::KeyMaterialGenerator;
use crate::ownership::FileOwnership;
use crate::render::CodeImageRenderer;
use crate::secret::SecretString;

fn failure(program: &str) -> ToolError {
	ToolError::Failed {
		program: program.to_string(),
		status: "exit status: 1".to_string(),
		stderr: "injected failure".to_string(),
	}
}

/// Records stop/start calls and serves a canned dump.
#[derive(Default)]
pub struct FakeDaemon {
	calls: Mutex<Vec<&'static str>>,
	fail_stop: AtomicBool,
	fail_start: AtomicBool,
	dump: Mutex<String>,
}

impl FakeDaemon {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn calls(&self) -> Vec<&'static str> {
		self.calls.lock().unwrap().clone()
	}

	pub fn fail_stop(&self, fail: bool) {
		self.fail_stop.store(fail, Ordering::SeqCst);
	}

	pub fn fail_start(&self, fail: bool) {
		self.fail_start.store(fail, Ordering::SeqCst);
	}

	pub fn set_dump(&self, dump: impl Into<String>) {
		*self.dump.lock().unwrap() = dump.into();
	}
}

#[async_trait]
impl DaemonControl for FakeDaemon {
	async fn stop_interface(&self) -> Result<(), ToolError> {
		self.calls.lock().unwrap().push("stop");
		if self.fail_stop.load(Ordering::SeqCst) {
			return Err(failure("wg-quick"));
		}
		Ok(())
	}

	async fn start_interface(&self) -> Result<(), ToolError> {
		self.calls.lock().unwrap().push("start");
		if self.fail_start.load(Ordering::SeqCst) {
			return Err(failure("wg-quick"));
		}
		Ok(())
	}

	async fn dump(&self) -> Result<String, ToolError> {
		self.calls.lock().unwrap().push("dump");
		Ok(self.dump.lock().unwrap().clone())
	}
}

type Hook = Box<dyn Fn() + Send + Sync>;

/// Hands out distinct, recognisable keys: `PK<n>`, `SK<n>`, `PSK<n>`.
#[derive(Default)]
pub struct FakeKeyGenerator {
	counter: AtomicU64,
	fail: AtomicBool,
	hook: Mutex<Option<Hook>>,
}

impl FakeKeyGenerator {
	pub fn new() -> Self {
		Self::default()
	}

	/// Numbers keys from `n`, so two generators never hand out the same key.
	pub fn starting_at(n: u64) -> Self {
		Self {
			counter: AtomicU64::new(n),
			..Self::default()
		}
	}

	pub fn fail(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}

	/// Runs `hook` every time a private key is generated.
	pub fn on_generate(&self, hook: impl Fn() + Send + Sync + 'static) {
		*self.hook.lock().unwrap() = Some(Box::new(hook));
	}
}

#[async_trait]
impl KeyMaterialGenerator for FakeKeyGenerator {
	async fn generate_private_key(&self) -> Result<SecretString, ToolError> {
		if self.fail.load(Ordering::SeqCst) {
			return Err(failure("wg"));
		}
		if let Some(hook) = self.hook.lock().unwrap().as_ref() {
			hook();
		}
		let n = self.counter.fetch_add(1, Ordering::SeqCst);
		Ok(SecretString::new(format!("SK{n}")))
	}

	async fn derive_public_key(&self, private_key: &SecretString) -> Result<String, ToolError> {
		Ok(private_key.expose().replacen("SK", "PK", 1))
	}

	async fn generate_preshared_key(&self) -> Result<SecretString, ToolError> {
		let n = self.counter.load(Ordering::SeqCst);
		Ok(SecretString::new(format!("PSK{n}")))
	}
}

/// Writes a placeholder image, or fails on demand.
#[derive(Default)]
pub struct FakeRenderer {
	fail: AtomicBool,
}

impl FakeRenderer {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn fail(&self, fail: bool) {
		self.fail.store(fail, Ordering::SeqCst);
	}
}

#[async_trait]
impl CodeImageRenderer for FakeRenderer {
	async fn render(&self, _config_path: &Path, image_path: &Path) -> Result<(), ToolError> {
		if self.fail.load(Ordering::SeqCst) {
			return Err(failure("qrencode"));
		}
		tokio::fs::write(image_path, b"\x89PNG")
			.await
			.map_err(|e| ToolError::Io {
				program: "qrencode".to_string(),
				source: e,
			})
	}
}

type PathFilter = Box<dyn Fn(&Path) -> bool + Send + Sync>;

/// Records every ownership change and refuses the ones `fail_when` matches.
#[derive(Default)]
pub struct FakeOwnership {
	calls: Mutex<Vec<PathBuf>>,
	fail_when: Mutex<Option<PathFilter>>,
}

impl FakeOwnership {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn calls(&self) -> Vec<PathBuf> {
		self.calls.lock().unwrap().clone()
	}

	pub fn fail_when(&self, filter: impl Fn(&Path) -> bool + Send + Sync + 'static) {
		*self.fail_when.lock().unwrap() = Some(Box::new(filter));
	}

	pub fn succeed(&self) {
		*self.fail_when.lock().unwrap() = None;
	}
}

#[async_trait]
impl FileOwnership for FakeOwnership {
	async fn set_owner(&self, path: &Path, _owner: FileOwner) -> io::Result<()> {
		self.calls.lock().unwrap().push(path.to_path_buf());
		let refused = self
			.fail_when
			.lock()
			.unwrap()
			.as_ref()
			.is_some_and(|filter| filter(path));
		if refused {
			return Err(io::Error::from(io::ErrorKind::PermissionDenied));
		}
		Ok(())
	}
}
