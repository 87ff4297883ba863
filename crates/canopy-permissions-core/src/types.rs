// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core type definitions for the permission hierarchy.
//!
//! - **ID newtypes**: [`PermissionId`] and [`PermissionTypeId`] wrap the
//!   store-assigned integer keys so the two can never be mixed up
//! - **Records**: [`Permission`] (a node of the tree) and [`PermissionType`]
//!   (the category a whole tree belongs to)
//! - **Payloads**: [`NewPermission`], [`NewPermissionType`] and
//!   [`PermissionChanges`] used by create/update operations
//!
//! All ID types serialize transparently as integers.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

// =============================================================================
// ID Newtypes
// =============================================================================

macro_rules! define_id_type {
	($name:ident, $doc:expr) => {
		#[doc = $doc]
		#[derive(
			Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
		)]
		#[serde(transparent)]
		pub struct $name(i64);

		impl $name {
			/// Create an ID from a raw store key.
			pub const fn new(id: i64) -> Self {
				Self(id)
			}

			/// Get the raw store key.
			pub const fn get(self) -> i64 {
				self.0
			}
		}

		impl fmt::Display for $name {
			fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
				write!(f, "{}", self.0)
			}
		}

		impl FromStr for $name {
			type Err = std::num::ParseIntError;

			fn from_str(s: &str) -> Result<Self, Self::Err> {
				s.trim().parse::<i64>().map(Self)
			}
		}

		impl From<i64> for $name {
			fn from(id: i64) -> Self {
				Self(id)
			}
		}

		impl From<$name> for i64 {
			fn from(id: $name) -> Self {
				id.0
			}
		}
	};
}

define_id_type!(PermissionId, "Unique identifier for a permission node.");
define_id_type!(
	PermissionTypeId,
	"Unique identifier for a permission type (e.g. \"Domain\", \"Zone\")."
);

// =============================================================================
// Permission
// =============================================================================

/// A node of the permission hierarchy.
///
/// `level` and `hierarchy_path` are materialized from the parent chain and are
/// only trustworthy while the audit reports them consistent.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Permission {
	pub id: PermissionId,
	pub permission_type_id: PermissionTypeId,
	/// `None` marks a root.
	pub parent_permission_id: Option<PermissionId>,
	pub name: String,
	pub description: Option<String>,
	/// 0-based depth; 0 for roots.
	pub level: u32,
	/// Ancestor ids, root first and ending with this node, joined by `/`.
	pub hierarchy_path: String,
	pub sort_order: i32,
	pub can_have_children: bool,
	pub is_active: bool,
	pub is_system_permission: bool,
	pub created_at: DateTime<Utc>,
	pub updated_at: DateTime<Utc>,
}

impl Permission {
	/// Returns true if this node has no parent.
	pub fn is_root(&self) -> bool {
		self.parent_permission_id.is_none()
	}

	/// Decode the stored hierarchy path into ids.
	///
	/// Returns `None` if the stored path is malformed.
	pub fn path_ids(&self) -> Option<Vec<PermissionId>> {
		crate::path::parse_path(&self.hierarchy_path)
	}
}

/// Insert payload for a permission.
///
/// The store assigns the id; level and path are computed after insert.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPermission {
	pub permission_type_id: PermissionTypeId,
	pub parent_permission_id: Option<PermissionId>,
	pub name: String,
	pub description: Option<String>,
	/// `None` appends after the current last sibling.
	pub sort_order: Option<i32>,
	pub can_have_children: bool,
	pub is_active: bool,
	pub is_system_permission: bool,
}

impl NewPermission {
	/// A new active root permission that may have children.
	pub fn root(permission_type_id: PermissionTypeId, name: impl Into<String>) -> Self {
		Self {
			permission_type_id,
			parent_permission_id: None,
			name: name.into(),
			description: None,
			sort_order: None,
			can_have_children: true,
			is_active: true,
			is_system_permission: false,
		}
	}

	/// A new active permission under `parent`.
	pub fn child(
		permission_type_id: PermissionTypeId,
		parent: PermissionId,
		name: impl Into<String>,
	) -> Self {
		Self {
			parent_permission_id: Some(parent),
			..Self::root(permission_type_id, name)
		}
	}

	pub fn with_description(mut self, description: impl Into<String>) -> Self {
		self.description = Some(description.into());
		self
	}

	pub fn with_sort_order(mut self, sort_order: i32) -> Self {
		self.sort_order = Some(sort_order);
		self
	}

	/// Forbid children under the new node.
	pub fn leaf(mut self) -> Self {
		self.can_have_children = false;
		self
	}

	pub fn inactive(mut self) -> Self {
		self.is_active = false;
		self
	}

	pub fn system(mut self) -> Self {
		self.is_system_permission = true;
		self
	}
}

/// Partial, non-structural update of a permission.
///
/// Parent and type are deliberately absent: reparenting goes through move.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionChanges {
	#[serde(default)]
	pub name: Option<String>,
	/// `Some(None)` clears the description.
	#[serde(default)]
	pub description: Option<Option<String>>,
	#[serde(default)]
	pub can_have_children: Option<bool>,
	#[serde(default)]
	pub is_active: Option<bool>,
}

impl PermissionChanges {
	pub fn is_empty(&self) -> bool {
		self.name.is_none()
			&& self.description.is_none()
			&& self.can_have_children.is_none()
			&& self.is_active.is_none()
	}
}

// =============================================================================
// Permission Type
// =============================================================================

/// The category a permission tree belongs to.
///
/// Every node in one parent chain shares its type. Icon and color are display
/// metadata consumed by the tree builder.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermissionType {
	pub id: PermissionTypeId,
	pub name: String,
	pub description: Option<String>,
	pub icon: Option<String>,
	pub color: Option<String>,
	pub sort_order: i32,
}

/// Insert payload for a permission type.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewPermissionType {
	pub name: String,
	pub description: Option<String>,
	pub icon: Option<String>,
	pub color: Option<String>,
	pub sort_order: i32,
}

impl NewPermissionType {
	pub fn new(name: impl Into<String>) -> Self {
		Self {
			name: name.into(),
			description: None,
			icon: None,
			color: None,
			sort_order: 0,
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;

	mod ids {
		use super::*;

		#[test]
		fn display_is_raw_integer() {
			assert_eq!(PermissionId::new(42).to_string(), "42");
			assert_eq!(PermissionTypeId::new(7).to_string(), "7");
		}

		#[test]
		fn parses_from_string() {
			assert_eq!("12".parse::<PermissionId>().unwrap(), PermissionId::new(12));
			assert_eq!(" 3 ".parse::<PermissionId>().unwrap(), PermissionId::new(3));
			assert!("abc".parse::<PermissionId>().is_err());
		}

		#[test]
		fn serializes_transparently() {
			let json = serde_json::to_string(&PermissionId::new(5)).unwrap();
			assert_eq!(json, "5");
			let id: PermissionTypeId = serde_json::from_str("9").unwrap();
			assert_eq!(id.get(), 9);
		}
	}

	mod new_permission {
		use super::*;

		#[test]
		fn root_defaults() {
			let p = NewPermission::root(PermissionTypeId::new(1), "Read");
			assert!(p.parent_permission_id.is_none());
			assert!(p.can_have_children);
			assert!(p.is_active);
			assert!(!p.is_system_permission);
			assert!(p.sort_order.is_none());
		}

		#[test]
		fn child_builder_chain() {
			let p = NewPermission::child(PermissionTypeId::new(1), PermissionId::new(3), "Details")
				.with_sort_order(4)
				.leaf()
				.system();
			assert_eq!(p.parent_permission_id, Some(PermissionId::new(3)));
			assert_eq!(p.sort_order, Some(4));
			assert!(!p.can_have_children);
			assert!(p.is_system_permission);
		}
	}

	#[test]
	fn empty_changes() {
		assert!(PermissionChanges::default().is_empty());
		let changes = PermissionChanges {
			is_active: Some(false),
			..Default::default()
		};
		assert!(!changes.is_empty());
	}
}
