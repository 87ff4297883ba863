// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use thiserror::Error;

use crate::types::{PermissionId, PermissionTypeId};

/// A proposed structural change that would break a hierarchy invariant.
///
/// These are expected outcomes, not faults: bulk operations record them per
/// id and keep going.
#[derive(Clone, Error, Debug, PartialEq, Eq)]
pub enum HierarchyViolation {
	#[error("permission {0} cannot be its own parent")]
	SelfParent(PermissionId),

	#[error(
		"permission {node} belongs to type {node_type} but parent {parent} belongs to type {parent_type}"
	)]
	CrossType {
		node: PermissionId,
		node_type: PermissionTypeId,
		parent: PermissionId,
		parent_type: PermissionTypeId,
	},

	#[error(
		"parent {parent} belongs to type {parent_type}, not to the new permission's type {permission_type}"
	)]
	ParentTypeMismatch {
		parent: PermissionId,
		parent_type: PermissionTypeId,
		permission_type: PermissionTypeId,
	},

	#[error("moving permission {node} under {parent} would create a cycle")]
	WouldCreateCycle {
		node: PermissionId,
		parent: PermissionId,
	},

	#[error("permission {0} cannot have children")]
	ParentCannotHaveChildren(PermissionId),

	#[error("permission {0} has children, so it must keep allowing children")]
	ChildrenPresent(PermissionId),

	#[error("permission {0} is already a root")]
	AlreadyRoot(PermissionId),

	#[error("a permission named '{name}' already exists in type {permission_type_id}")]
	DuplicateName {
		name: String,
		permission_type_id: PermissionTypeId,
	},

	#[error("permission names must not be empty")]
	EmptyName,

	#[error("permission {0} has children; delete with cascade to remove the subtree")]
	HasChildren(PermissionId),
}
