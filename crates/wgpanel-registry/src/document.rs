// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The daemon's configuration file (`wg0.conf`) as an in-memory registry.
//!
//! The file is an opaque header (the daemon's own `[Interface]` section)
//! followed by one block per peer, blocks separated by a blank line:
//!
//! ```text
//! [Peer]
//! # <name>
//! PublicKey = <key>
//! PresharedKey = <key>
//! AllowedIPs = <ip>/32
//! ```
//!
//! The header is written back byte for byte. Peer blocks are regenerated from
//! the entries on every persist.

use std::collections::HashSet;
use std::io;
use std::net::IpAddr;
use std::path::{Path, PathBuf};

use tokio::fs;
use tracing::{debug, info, instrument, warn};

use crate::error::{RegistryError, Result};
use crate::files;
use crate::keys::key_prefix;
use crate::paths::validate_peer_name;
use crate::secret::SecretString;
use crate::store::PeerRecord;

const BLOCK_SEPARATOR: &str = "\n\n";
const PEER_SECTION: &str = "[Peer]";

/// One `[Peer]` block.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegistryEntry {
	pub name: String,
	pub public_key: String,
	pub preshared_key: SecretString,
	/// As written in the file, e.g. `10.0.0.2/32`.
	pub allowed_ips: String,
}

impl RegistryEntry {
	pub fn from_record(record: &PeerRecord) -> Self {
		Self {
			name: record.name.clone(),
			public_key: record.public_key.clone(),
			preshared_key: record.preshared_key.clone(),
			allowed_ips: host_route(record.tunnel_ip),
		}
	}

	/// The address part of `allowed_ips`, if it is a single host route.
	pub fn tunnel_ip(&self) -> Option<IpAddr> {
		let first = self.allowed_ips.split(',').next()?.trim();
		let addr = first.split_once('/').map_or(first, |(addr, _)| addr);
		addr.parse().ok()
	}

	fn write_block(&self, out: &mut String) {
		out.push_str(BLOCK_SEPARATOR);
		out.push_str(PEER_SECTION);
		out.push_str("\n# ");
		out.push_str(&self.name);
		out.push_str("\nPublicKey = ");
		out.push_str(&self.public_key);
		out.push_str("\nPresharedKey = ");
		out.push_str(self.preshared_key.expose());
		out.push_str("\nAllowedIPs = ");
		out.push_str(&self.allowed_ips);
	}
}

/// `/32` for IPv4, `/128` for IPv6.
pub fn host_route(ip: IpAddr) -> String {
	match ip {
		IpAddr::V4(v4) => format!("{v4}/32"),
		IpAddr::V6(v6) => format!("{v6}/128"),
	}
}

#[derive(Debug)]
pub struct RegistryDocument {
	path: PathBuf,
	header: String,
	entries: Vec<RegistryEntry>,
	server_public_key: String,
}

impl RegistryDocument {
	/// Reads the registry file and the daemon's public key file.
	#[instrument(skip_all, fields(path = %path.as_ref().display()))]
	pub async fn load(path: impl AsRef<Path>, public_key_path: impl AsRef<Path>) -> Result<Self> {
		let path = path.as_ref();
		let text = read_existing(path).await?;
		let server_public_key = read_existing(public_key_path.as_ref())
			.await?
			.trim()
			.to_string();

		let (header, entries) = parse(&text)?;
		info!(peers = entries.len(), "loaded peer registry");

		Ok(Self {
			path: path.to_path_buf(),
			header,
			entries,
			server_public_key,
		})
	}

	/// Builds a document that is not yet backed by a file.
	pub fn new(
		path: impl Into<PathBuf>,
		header: impl Into<String>,
		server_public_key: impl Into<String>,
	) -> Self {
		Self {
			path: path.into(),
			header: header.into(),
			entries: Vec::new(),
			server_public_key: server_public_key.into(),
		}
	}

	/// Re-reads the registry file, replacing the header and entries. Another
	/// process may have rewritten it since this document was loaded.
	#[instrument(skip(self), fields(path = %self.path.display()))]
	pub async fn reload(&mut self) -> Result<()> {
		let text = read_existing(&self.path).await?;
		let (header, entries) = parse(&text)?;
		if entries != self.entries {
			debug!(
				before = self.entries.len(),
				after = entries.len(),
				"registry changed on disk"
			);
		}
		self.header = header;
		self.entries = entries;
		Ok(())
	}

	pub fn path(&self) -> &Path {
		&self.path
	}

	/// The advisory lock file that serializes writers across processes.
	pub fn lock_path(&self) -> PathBuf {
		files::lock_sibling(&self.path)
	}

	pub fn header(&self) -> &str {
		&self.header
	}

	pub fn entries(&self) -> &[RegistryEntry] {
		&self.entries
	}

	pub fn server_public_key(&self) -> &str {
		&self.server_public_key
	}

	pub fn get_peer_name(&self, public_key: &str) -> Option<&str> {
		self
			.entries
			.iter()
			.find(|e| e.public_key == public_key)
			.map(|e| e.name.as_str())
	}

	pub fn contains_name(&self, name: &str) -> bool {
		self.entries.iter().any(|e| e.name == name)
	}

	pub fn contains_tunnel_ip(&self, ip: IpAddr) -> bool {
		self.entries.iter().any(|e| e.tunnel_ip() == Some(ip))
	}

	/// Appends the peer and persists. The entry is dropped again if the file
	/// cannot be written.
	#[instrument(skip(self, record), fields(name = %record.name, key = %key_prefix(&record.public_key)))]
	pub async fn add_peer(&mut self, record: &PeerRecord) -> Result<()> {
		if self.contains_name(&record.name) {
			return Err(RegistryError::AlreadyExists(format!(
				"peer '{}'",
				record.name
			)));
		}
		if self.get_peer_name(&record.public_key).is_some() {
			return Err(RegistryError::AlreadyExists(format!(
				"public key {}",
				key_prefix(&record.public_key)
			)));
		}

		self.entries.push(RegistryEntry::from_record(record));
		if let Err(e) = self.persist().await {
			self.entries.pop();
			return Err(e);
		}

		info!("peer added to registry");
		Ok(())
	}

	/// Removes the first entry named `name` and persists. The entry is put back
	/// at its index if the file cannot be written.
	#[instrument(skip(self))]
	pub async fn remove_peer(&mut self, name: &str) -> Result<RegistryEntry> {
		let index = self
			.entries
			.iter()
			.position(|e| e.name == name)
			.ok_or_else(|| RegistryError::NotFound(format!("peer '{name}'")))?;

		let removed = self.entries.remove(index);
		if let Err(e) = self.persist().await {
			self.entries.insert(index, removed);
			return Err(e);
		}

		info!("peer removed from registry");
		Ok(removed)
	}

	pub fn serialize(&self) -> String {
		serialize(&self.header, &self.entries)
	}

	pub async fn persist(&self) -> Result<()> {
		let content = self.serialize();
		files::write_atomic(&self.path, content.as_bytes())
			.await
			.map_err(|e| RegistryError::persistence(&self.path, e))?;
		debug!(path = %self.path.display(), bytes = content.len(), "registry persisted");
		Ok(())
	}
}

async fn read_existing(path: &Path) -> Result<String> {
	match fs::read_to_string(path).await {
		Ok(text) => Ok(text),
		Err(e) if e.kind() == io::ErrorKind::NotFound => Err(RegistryError::NotFound(format!(
			"file {}",
			path.display()
		))),
		Err(e) => Err(RegistryError::persistence(path, e)),
	}
}

pub fn serialize(header: &str, entries: &[RegistryEntry]) -> String {
	let mut out = String::with_capacity(header.len() + entries.len() * 160);
	out.push_str(header);
	for entry in entries {
		entry.write_block(&mut out);
	}
	out
}

/// Splits registry text into the verbatim header and the peer entries.
pub fn parse(text: &str) -> Result<(String, Vec<RegistryEntry>)> {
	let mut blocks = text.split(BLOCK_SEPARATOR);
	let header = blocks.next().unwrap_or_default().to_string();

	let mut entries: Vec<RegistryEntry> = Vec::new();
	let mut names = HashSet::new();
	let mut keys = HashSet::new();

	for (i, raw) in blocks.enumerate() {
		let index = i + 1;
		let block = raw.trim_matches('\n');
		if block.trim().is_empty() {
			continue;
		}

		let entry = parse_block(index, block)?;
		if !names.insert(entry.name.clone()) {
			return Err(malformed(index, format!("duplicate peer name '{}'", entry.name)));
		}
		if !keys.insert(entry.public_key.clone()) {
			return Err(malformed(
				index,
				format!("duplicate public key {}", key_prefix(&entry.public_key)),
			));
		}
		entries.push(entry);
	}

	Ok((header, entries))
}

fn parse_block(index: usize, block: &str) -> Result<RegistryEntry> {
	let mut lines: Vec<&str> = block.lines().collect();
	if lines.first().map(|l| l.trim()) == Some(PEER_SECTION) {
		lines.remove(0);
	}
	if lines.len() < 4 {
		return Err(malformed(
			index,
			format!("expected 4 lines, found {}", lines.len()),
		));
	}
	if lines.len() > 4 {
		warn!(index, extra = lines.len() - 4, "ignoring extra lines in peer block");
	}

	let name = lines[0]
		.trim()
		.strip_prefix('#')
		.ok_or_else(|| malformed(index, "first line is not a '# <name>' comment".to_string()))?
		.trim();
	if name.is_empty() {
		return Err(malformed(index, "peer name is empty".to_string()));
	}
	if validate_peer_name(name).is_err() {
		return Err(malformed(index, format!("invalid peer name '{name}'")));
	}

	let public_key = key_value(index, lines[1], "PublicKey")?;
	let preshared_key = key_value(index, lines[2], "PresharedKey")?;
	let allowed_ips = key_value(index, lines[3], "AllowedIPs")?;

	Ok(RegistryEntry {
		name: name.to_string(),
		public_key: public_key.to_string(),
		preshared_key: SecretString::from(preshared_key),
		allowed_ips: allowed_ips.to_string(),
	})
}

fn key_value<'a>(index: usize, line: &'a str, expected: &str) -> Result<&'a str> {
	let (key, value) = line
		.split_once('=')
		.ok_or_else(|| malformed(index, format!("expected '{expected} = ...'")))?;
	if key.trim() != expected {
		return Err(malformed(
			index,
			format!("expected '{expected}', found '{}'", key.trim()),
		));
	}
	let value = value.trim();
	if value.is_empty() {
		return Err(malformed(index, format!("{expected} is empty")));
	}
	Ok(value)
}

fn malformed(index: usize, reason: String) -> RegistryError {
	RegistryError::MalformedRecord { index, reason }
}
