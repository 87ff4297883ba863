// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration layer for merging from multiple sources.

use serde::Deserialize;

use crate::sections::{DatabaseConfigLayer, HierarchyConfigLayer, LoggingConfigLayer};

/// Canopy configuration layer - all fields are Option for merging.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CanopyConfigLayer {
	#[serde(default)]
	pub database: Option<DatabaseConfigLayer>,
	#[serde(default)]
	pub logging: Option<LoggingConfigLayer>,
	#[serde(default)]
	pub hierarchy: Option<HierarchyConfigLayer>,
}

impl CanopyConfigLayer {
	/// Merge another layer into this one. Other layer takes precedence.
	pub fn merge(&mut self, other: CanopyConfigLayer) {
		merge_option(
			&mut self.database,
			other.database,
			DatabaseConfigLayer::merge,
		);
		merge_option(&mut self.logging, other.logging, LoggingConfigLayer::merge);
		merge_option(
			&mut self.hierarchy,
			other.hierarchy,
			HierarchyConfigLayer::merge,
		);
	}
}

fn merge_option<T, F>(target: &mut Option<T>, source: Option<T>, merge_fn: F)
where
	F: FnOnce(&mut T, T),
{
	match (target.as_mut(), source) {
		(Some(t), Some(s)) => merge_fn(t, s),
		(None, Some(s)) => *target = Some(s),
		_ => {}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn test_merge_empty_layers() {
		let mut base = CanopyConfigLayer::default();
		base.merge(CanopyConfigLayer::default());
		assert!(base.database.is_none());
		assert!(base.hierarchy.is_none());
	}

	#[test]
	fn test_merge_other_overwrites_field_by_field() {
		let mut base = CanopyConfigLayer {
			hierarchy: Some(HierarchyConfigLayer {
				audit_max_depth: Some(10),
				max_bulk_size: Some(100),
			}),
			..Default::default()
		};
		let other = CanopyConfigLayer {
			hierarchy: Some(HierarchyConfigLayer {
				max_bulk_size: Some(5),
				..Default::default()
			}),
			..Default::default()
		};
		base.merge(other);
		let hierarchy = base.hierarchy.unwrap();
		assert_eq!(hierarchy.audit_max_depth, Some(10));
		assert_eq!(hierarchy.max_bulk_size, Some(5));
	}

	#[test]
	fn test_merge_adds_missing_sections() {
		let mut base = CanopyConfigLayer::default();
		let other = CanopyConfigLayer {
			database: Some(DatabaseConfigLayer {
				url: Some("sqlite::memory:".to_string()),
			}),
			..Default::default()
		};
		base.merge(other);
		assert_eq!(
			base.database.as_ref().unwrap().url.as_deref(),
			Some("sqlite::memory:")
		);
	}
}
