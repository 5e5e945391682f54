// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! `wgpanel`: manage the peers of a WireGuard daemon from the command line.

mod commands;
mod logging;

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use console::style;
use wgpanel_config::PanelConfig;
use wgpanel_registry::RegistryError;

#[derive(Parser, Debug)]
#[command(name = "wgpanel", about = "WireGuard peer registry", version)]
struct Cli {
	/// Config file (default: /etc/wgpanel/wgpanel.toml)
	#[arg(long, global = true, env = "WGPANEL_CONFIG")]
	config: Option<PathBuf>,

	#[command(subcommand)]
	command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
	/// List peers known to the running daemon
	List {
		/// Print JSON instead of a table
		#[arg(long)]
		json: bool,
	},
	/// Provision a peer and restart the daemon
	Add {
		name: String,
		/// Tunnel IP assigned to the peer
		ip: String,
	},
	/// Revoke a peer and restart the daemon
	Remove { name: String },
	/// Print or save a peer's client config
	Config {
		name: String,
		#[arg(long, short)]
		output: Option<PathBuf>,
	},
	/// Save a peer's QR code image
	Qr {
		name: String,
		#[arg(long, short)]
		output: PathBuf,
	},
	/// Print the resolved configuration
	ShowConfig,
}

fn load_config(path: Option<&PathBuf>) -> Result<PanelConfig, wgpanel_config::ConfigError> {
	match path {
		Some(path) => wgpanel_config::load_config_with_file(path),
		None => wgpanel_config::load_config(),
	}
}

#[tokio::main]
async fn main() -> ExitCode {
	let cli = Cli::parse();

	let config = match load_config(cli.config.as_ref()) {
		Ok(config) => config,
		Err(e) => {
			eprintln!("{} {e}", style("error:").red().bold());
			return ExitCode::FAILURE;
		}
	};

	logging::init(&config.logging);

	match run(cli.command, &config).await {
		Ok(()) => ExitCode::SUCCESS,
		Err(e) => {
			report(&e);
			ExitCode::FAILURE
		}
	}
}

async fn run(command: Command, config: &PanelConfig) -> anyhow::Result<()> {
	match command {
		Command::ShowConfig => commands::show_config(config),
		Command::List { json } => commands::list(config, json).await,
		Command::Add { name, ip } => commands::add(config, name, ip).await,
		Command::Remove { name } => commands::remove(config, &name).await,
		Command::Config { name, output } => commands::config(config, &name, output).await,
		Command::Qr { name, output } => commands::qr(config, &name, &output).await,
	}
}

fn report(error: &anyhow::Error) {
	if let Some(registry) = error.downcast_ref::<RegistryError>() {
		if registry.is_critical() {
			tracing::error!(error = %registry, "tunnel is down");
			eprintln!(
				"{} {registry}\n  The registry file was updated but the interface did not come back up.\n  Check the daemon and run `wg-quick up` by hand.",
				style("CRITICAL:").red().bold()
			);
			return;
		}
	}
	eprintln!("{} {error:#}", style("error:").red().bold());
}
