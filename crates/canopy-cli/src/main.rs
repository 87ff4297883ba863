// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Canopy permission hierarchy administration binary.

use std::path::PathBuf;
use std::sync::Arc;

use canopy_server_config::{
	load_config_with_overrides, CanopyConfigLayer, DatabaseConfigLayer, LoggingConfigLayer,
};
use canopy_server_db::{create_pool, run_migrations, PermissionRepository};
use canopy_server_hierarchy::HierarchyService;
use clap::Parser;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

use commands::Command;

/// Canopy - manage permission hierarchies stored in SQLite.
#[derive(Parser, Debug)]
#[command(name = "canopy", version, about, long_about = None)]
struct Args {
	/// Config file (defaults to /etc/canopy/canopy.toml)
	#[arg(short, long, global = true)]
	config: Option<PathBuf>,

	/// Database URL, e.g. sqlite:./canopy.db
	#[arg(long, global = true)]
	database_url: Option<String>,

	/// Log filter used when RUST_LOG is unset
	#[arg(long, global = true)]
	log_level: Option<String>,

	/// Allow structural changes to system permissions
	#[arg(long, global = true)]
	admin: bool,

	#[command(subcommand)]
	command: Command,
}

impl Args {
	fn overrides(&self) -> CanopyConfigLayer {
		CanopyConfigLayer {
			database: self.database_url.clone().map(|url| DatabaseConfigLayer { url: Some(url) }),
			logging: self
				.log_level
				.clone()
				.map(|level| LoggingConfigLayer { level: Some(level) }),
			hierarchy: None,
		}
	}
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
	let args = Args::parse();

	let config = load_config_with_overrides(args.config.clone(), args.overrides())?;

	// Logs go to stderr; stdout carries command output only.
	tracing_subscriber::registry()
		.with(
			tracing_subscriber::EnvFilter::try_from_default_env()
				.unwrap_or_else(|_| config.logging.level.clone().into()),
		)
		.with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
		.init();

	tracing::debug!(database = %config.database.url, command = ?args.command, "starting canopy");

	let pool = create_pool(&config.database.url).await?;
	run_migrations(&pool).await?;

	if matches!(args.command, Command::Migrate) {
		tracing::info!(database = %config.database.url, "migrations applied");
		return Ok(());
	}

	let store = Arc::new(PermissionRepository::new(pool));
	let mut service = HierarchyService::new(store, config.hierarchy.clone());
	if args.admin {
		service = service.administrative();
	}

	commands::run(&service, args.command).await
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::CommandFactory;

	#[test]
	fn cli_definition_is_consistent() {
		Args::command().debug_assert();
	}

	#[test]
	fn global_flags_become_overrides() {
		let args = Args::try_parse_from([
			"canopy",
			"types",
			"--database-url",
			"sqlite::memory:",
			"--log-level",
			"debug",
		])
		.unwrap();
		let overrides = args.overrides();
		assert_eq!(
			overrides.database.and_then(|d| d.url).as_deref(),
			Some("sqlite::memory:")
		);
		assert_eq!(
			overrides.logging.and_then(|l| l.level).as_deref(),
			Some("debug")
		);
		assert!(overrides.hierarchy.is_none());
		assert!(!args.admin);
	}

	#[test]
	fn no_flags_means_no_overrides() {
		let args = Args::try_parse_from(["canopy", "--admin", "validate"]).unwrap();
		let overrides = args.overrides();
		assert!(overrides.database.is_none());
		assert!(overrides.logging.is_none());
		assert!(args.admin);
	}
}
