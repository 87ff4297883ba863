// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Hierarchy engine limits.

use canopy_permissions_core::DEFAULT_AUDIT_MAX_DEPTH;
use serde::Deserialize;

use crate::error::ConfigError;

pub const DEFAULT_MAX_BULK_SIZE: usize = 500;

/// Hierarchy engine configuration (runtime, fully resolved).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HierarchyConfig {
	/// Parent-chain length at which the audit stops walking and reports
	/// excessive depth.
	pub audit_max_depth: usize,
	/// Upper bound on ids accepted by one bulk operation, after descendant
	/// expansion.
	pub max_bulk_size: usize,
}

impl Default for HierarchyConfig {
	fn default() -> Self {
		Self {
			audit_max_depth: DEFAULT_AUDIT_MAX_DEPTH,
			max_bulk_size: DEFAULT_MAX_BULK_SIZE,
		}
	}
}

/// Hierarchy configuration layer (partial, for merging).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HierarchyConfigLayer {
	#[serde(default)]
	pub audit_max_depth: Option<usize>,
	#[serde(default)]
	pub max_bulk_size: Option<usize>,
}

impl HierarchyConfigLayer {
	pub fn merge(&mut self, other: HierarchyConfigLayer) {
		if other.audit_max_depth.is_some() {
			self.audit_max_depth = other.audit_max_depth;
		}
		if other.max_bulk_size.is_some() {
			self.max_bulk_size = other.max_bulk_size;
		}
	}

	pub fn finalize(self) -> Result<HierarchyConfig, ConfigError> {
		let config = HierarchyConfig {
			audit_max_depth: self.audit_max_depth.unwrap_or(DEFAULT_AUDIT_MAX_DEPTH),
			max_bulk_size: self.max_bulk_size.unwrap_or(DEFAULT_MAX_BULK_SIZE),
		};

		if config.audit_max_depth == 0 {
			return Err(ConfigError::Validation(
				"hierarchy.audit_max_depth must be at least 1".to_string(),
			));
		}
		if config.max_bulk_size == 0 {
			return Err(ConfigError::Validation(
				"hierarchy.max_bulk_size must be at least 1".to_string(),
			));
		}

		Ok(config)
	}
}
