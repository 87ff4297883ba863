// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Legality checks for proposed structural changes.
//!
//! All checks are pure functions over a [`PermissionArena`] holding (at least)
//! the permissions of the node's type. They never touch the store.

use crate::arena::PermissionArena;
use crate::error::HierarchyViolation;
use crate::types::{Permission, PermissionId, PermissionTypeId};

/// Outcome of [`can_reparent`] in the shape callers display.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ReparentDecision {
	Allowed,
	Denied(HierarchyViolation),
}

impl ReparentDecision {
	pub fn is_allowed(&self) -> bool {
		matches!(self, ReparentDecision::Allowed)
	}

	/// Human-readable reason when denied.
	pub fn reason(&self) -> Option<String> {
		match self {
			ReparentDecision::Allowed => None,
			ReparentDecision::Denied(violation) => Some(violation.to_string()),
		}
	}
}

impl From<Result<(), HierarchyViolation>> for ReparentDecision {
	fn from(result: Result<(), HierarchyViolation>) -> Self {
		match result {
			Ok(()) => ReparentDecision::Allowed,
			Err(violation) => ReparentDecision::Denied(violation),
		}
	}
}

/// True iff placing `candidate_parent_id` above `node_id` would make `node_id`
/// its own ancestor: the candidate is the node itself or one of its
/// descendants.
pub fn would_create_cycle(
	arena: &PermissionArena,
	node_id: PermissionId,
	candidate_parent_id: PermissionId,
) -> bool {
	candidate_parent_id == node_id || arena.descendant_ids(node_id).contains(&candidate_parent_id)
}

/// Decide whether `node` may be placed under `candidate_parent`.
///
/// `None` promotes to root, which is legal unless the node already is one.
pub fn can_reparent(
	arena: &PermissionArena,
	node: &Permission,
	candidate_parent: Option<&Permission>,
) -> Result<(), HierarchyViolation> {
	let Some(parent) = candidate_parent else {
		if node.is_root() {
			return Err(HierarchyViolation::AlreadyRoot(node.id));
		}
		return Ok(());
	};

	if parent.id == node.id {
		return Err(HierarchyViolation::SelfParent(node.id));
	}

	if parent.permission_type_id != node.permission_type_id {
		return Err(HierarchyViolation::CrossType {
			node: node.id,
			node_type: node.permission_type_id,
			parent: parent.id,
			parent_type: parent.permission_type_id,
		});
	}

	if would_create_cycle(arena, node.id, parent.id) {
		return Err(HierarchyViolation::WouldCreateCycle {
			node: node.id,
			parent: parent.id,
		});
	}

	if !parent.can_have_children {
		return Err(HierarchyViolation::ParentCannotHaveChildren(parent.id));
	}

	Ok(())
}

/// Decide whether a permission of `permission_type_id` that does not exist
/// yet may be created under `parent`.
pub fn check_new_parent(
	parent: &Permission,
	permission_type_id: PermissionTypeId,
) -> Result<(), HierarchyViolation> {
	if parent.permission_type_id != permission_type_id {
		return Err(HierarchyViolation::ParentTypeMismatch {
			parent: parent.id,
			parent_type: parent.permission_type_id,
			permission_type: permission_type_id,
		});
	}
	if !parent.can_have_children {
		return Err(HierarchyViolation::ParentCannotHaveChildren(parent.id));
	}
	Ok(())
}

/// Trim a proposed name, rejecting blank ones.
pub fn normalize_name(name: &str) -> Result<String, HierarchyViolation> {
	let trimmed = name.trim();
	if trimmed.is_empty() {
		return Err(HierarchyViolation::EmptyName);
	}
	Ok(trimmed.to_string())
}

/// Reject `name` if another permission of the type already uses it.
///
/// Comparison is case-insensitive and ignores surrounding whitespace.
/// `exclude` skips the permission being renamed.
pub fn check_unique_name(
	arena: &PermissionArena,
	permission_type_id: PermissionTypeId,
	name: &str,
	exclude: Option<PermissionId>,
) -> Result<(), HierarchyViolation> {
	let wanted = name.trim();
	let clash = arena.iter().any(|p| {
		p.permission_type_id == permission_type_id
			&& Some(p.id) != exclude
			&& p.name.trim().eq_ignore_ascii_case(wanted)
	});
	if clash {
		return Err(HierarchyViolation::DuplicateName {
			name: wanted.to_string(),
			permission_type_id,
		});
	}
	Ok(())
}

/// Leaf nodes may always be deleted; others only with `cascade`.
pub fn check_can_delete(
	arena: &PermissionArena,
	id: PermissionId,
	cascade: bool,
) -> Result<(), HierarchyViolation> {
	if !cascade && arena.has_children(id) {
		return Err(HierarchyViolation::HasChildren(id));
	}
	Ok(())
}
