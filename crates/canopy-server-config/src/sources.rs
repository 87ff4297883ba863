// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sources: defaults, TOML files, environment variables and
//! command-line overrides.

use std::path::PathBuf;

use tracing::{debug, trace};

use crate::error::ConfigError;
use crate::layer::CanopyConfigLayer;
use crate::sections::{DatabaseConfigLayer, HierarchyConfigLayer, LoggingConfigLayer};

/// Source precedence levels (higher = overrides lower).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum Precedence {
	Defaults = 10,
	ConfigFile = 20,
	Environment = 50,
	CommandLine = 60,
}

/// Trait for configuration sources.
pub trait ConfigSource: Send + Sync {
	fn name(&self) -> &'static str;
	fn precedence(&self) -> Precedence;
	fn load(&self) -> Result<CanopyConfigLayer, ConfigError>;
}

/// Built-in defaults source.
pub struct DefaultsSource;

impl ConfigSource for DefaultsSource {
	fn name(&self) -> &'static str {
		"defaults"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Defaults
	}

	fn load(&self) -> Result<CanopyConfigLayer, ConfigError> {
		debug!("loading defaults");
		Ok(CanopyConfigLayer::default())
	}
}

/// TOML file configuration source. A missing file is not an error.
pub struct TomlSource {
	path: PathBuf,
}

impl TomlSource {
	pub fn new(path: impl Into<PathBuf>) -> Self {
		Self { path: path.into() }
	}

	pub fn system() -> Self {
		Self::new("/etc/canopy/canopy.toml")
	}
}

impl ConfigSource for TomlSource {
	fn name(&self) -> &'static str {
		"toml-config"
	}

	fn precedence(&self) -> Precedence {
		Precedence::ConfigFile
	}

	fn load(&self) -> Result<CanopyConfigLayer, ConfigError> {
		if !self.path.exists() {
			debug!(path = %self.path.display(), "config file not found, skipping");
			return Ok(CanopyConfigLayer::default());
		}

		debug!(path = %self.path.display(), "loading config file");
		let content = std::fs::read_to_string(&self.path).map_err(|e| ConfigError::FileRead {
			path: self.path.clone(),
			source: e,
		})?;

		let layer: CanopyConfigLayer =
			toml::from_str(&content).map_err(|e| ConfigError::TomlParse {
				path: self.path.clone(),
				source: e,
			})?;

		trace!("parsed config layer from TOML");
		Ok(layer)
	}
}

/// Environment variable source.
///
/// Convention: CANOPY_<FIELD>
pub struct EnvSource;

impl ConfigSource for EnvSource {
	fn name(&self) -> &'static str {
		"environment"
	}

	fn precedence(&self) -> Precedence {
		Precedence::Environment
	}

	fn load(&self) -> Result<CanopyConfigLayer, ConfigError> {
		debug!("loading environment variables");
		Ok(CanopyConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: env_var("CANOPY_DATABASE_URL"),
			}),
			logging: Some(LoggingConfigLayer {
				level: env_var("CANOPY_LOG_LEVEL"),
			}),
			hierarchy: Some(HierarchyConfigLayer {
				audit_max_depth: env_usize("CANOPY_AUDIT_MAX_DEPTH")?,
				max_bulk_size: env_usize("CANOPY_MAX_BULK_SIZE")?,
			}),
		})
	}
}

/// A pre-built layer, typically assembled from command-line flags.
pub struct OverrideSource {
	layer: CanopyConfigLayer,
}

impl OverrideSource {
	pub fn new(layer: CanopyConfigLayer) -> Self {
		Self { layer }
	}
}

impl ConfigSource for OverrideSource {
	fn name(&self) -> &'static str {
		"command-line"
	}

	fn precedence(&self) -> Precedence {
		Precedence::CommandLine
	}

	fn load(&self) -> Result<CanopyConfigLayer, ConfigError> {
		Ok(self.layer.clone())
	}
}

fn env_var(name: &str) -> Option<String> {
	std::env::var(name).ok().filter(|s| !s.is_empty())
}

fn env_usize(name: &str) -> Result<Option<usize>, ConfigError> {
	match env_var(name) {
		Some(v) => parse_usize(name, &v).map(Some),
		None => Ok(None),
	}
}

fn parse_usize(name: &str, value: &str) -> Result<usize, ConfigError> {
	value
		.trim()
		.parse()
		.map_err(|_| ConfigError::InvalidValue {
			key: name.to_string(),
			message: format!("invalid unsigned integer '{value}'"),
		})
}
