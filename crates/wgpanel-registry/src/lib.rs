// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! WireGuard peer registry.
//!
//! Keeps three things in step: a directory of key material and client config
//! per peer, the `[Peer]` blocks of the daemon's `wg0.conf`, and the running
//! daemon, which is restarted after every change.
//!
//! External programs (`wg`, `wg-quick`, `qrencode`) sit behind the
//! [`KeyMaterialGenerator`], [`CodeImageRenderer`] and [`DaemonControl`]
//! traits. [`PeerService::open`] wires the real implementations from a
//! [`wgpanel_config::PanelConfig`].

pub mod command;
pub mod daemon;
pub mod document;
pub mod engine;
pub mod error;
mod files;
pub mod keys;
pub mod ownership;
pub mod paths;
pub mod render;
pub mod secret;
pub mod service;
pub mod status;
pub mod store;

#[cfg(test)]
mod testing;

pub use command::CommandRunner;
pub use daemon::{reload_daemon, DaemonControl, WgQuickDaemon};
pub use document::{RegistryDocument, RegistryEntry};
pub use engine::RegistrySyncEngine;
pub use error::{RegistryError, Result, ToolError};
pub use keys::{KeyMaterialGenerator, KeyTriple, NativeKeyGenerator, WgCliKeyGenerator};
pub use ownership::{FileOwnership, SystemOwnership};
pub use paths::{validate_peer_name, PeerPaths};
pub use render::{CodeImageRenderer, QrencodeRenderer};
pub use secret::{Secret, SecretString};
pub use service::{AddPeerRequest, PeerService};
pub use status::{LiveStatusReconciler, PeerStatus};
pub use store::{PeerRecord, PeerRecordStore, PeerSettings};
