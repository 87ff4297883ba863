// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Centralized configuration management for Canopy.
//!
//! This crate provides:
//! - Layered configuration from multiple sources (defaults, TOML file,
//!   environment, command-line overrides)
//! - Type-safe configuration with validation
//! - Consistent environment variable naming (`CANOPY_*`)
//!
//! # Usage
//!
//! ```ignore
//! use canopy_server_config::load_config;
//!
//! let config = load_config()?;
//! println!("database at {}", config.database.url);
//! ```

pub mod error;
pub mod layer;
pub mod sections;
pub mod sources;

pub use error::ConfigError;
pub use layer::CanopyConfigLayer;
pub use sections::*;
pub use sources::{
	ConfigSource, DefaultsSource, EnvSource, OverrideSource, Precedence, TomlSource,
};

use std::path::PathBuf;

use tracing::{debug, info};

/// Fully resolved configuration.
#[derive(Debug, Clone, Default)]
pub struct CanopyConfig {
	pub database: DatabaseConfig,
	pub logging: LoggingConfig,
	pub hierarchy: HierarchyConfig,
}

/// Load configuration from all sources with standard precedence.
///
/// Precedence (highest to lowest):
/// 1. Environment variables (`CANOPY_*`)
/// 2. Config file (`/etc/canopy/canopy.toml`)
/// 3. Built-in defaults
pub fn load_config() -> Result<CanopyConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::system()),
		Box::new(EnvSource),
	])
}

/// Load configuration with a custom config file path.
pub fn load_config_with_file(config_path: impl Into<PathBuf>) -> Result<CanopyConfig, ConfigError> {
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(TomlSource::new(config_path)),
		Box::new(EnvSource),
	])
}

/// Load configuration with command-line overrides on top of every other
/// source. `config_path` replaces the system config file when given.
pub fn load_config_with_overrides(
	config_path: Option<PathBuf>,
	overrides: CanopyConfigLayer,
) -> Result<CanopyConfig, ConfigError> {
	let file = match config_path {
		Some(path) => TomlSource::new(path),
		None => TomlSource::system(),
	};
	load_from_sources(vec![
		Box::new(DefaultsSource),
		Box::new(file),
		Box::new(EnvSource),
		Box::new(OverrideSource::new(overrides)),
	])
}

/// Merge `sources` in precedence order and finalize the result.
pub fn load_from_sources(
	mut sources: Vec<Box<dyn ConfigSource>>,
) -> Result<CanopyConfig, ConfigError> {
	sources.sort_by_key(|s| s.precedence());

	let mut merged = CanopyConfigLayer::default();
	for source in sources {
		debug!(source = source.name(), "loading configuration source");
		let layer = source.load()?;
		merged.merge(layer);
	}

	finalize(merged)
}

/// Finalize configuration layer into resolved config.
fn finalize(layer: CanopyConfigLayer) -> Result<CanopyConfig, ConfigError> {
	let database = layer.database.unwrap_or_default().finalize();
	let logging = layer.logging.unwrap_or_default().finalize();
	let hierarchy = layer.hierarchy.unwrap_or_default().finalize()?;

	info!(
		database = %database.url,
		log_level = %logging.level,
		audit_max_depth = hierarchy.audit_max_depth,
		max_bulk_size = hierarchy.max_bulk_size,
		"Canopy configuration loaded"
	);

	Ok(CanopyConfig {
		database,
		logging,
		hierarchy,
	})
}
