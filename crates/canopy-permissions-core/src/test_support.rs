// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Fixtures shared by the unit tests of this crate.

use chrono::Utc;

use crate::arena::PermissionArena;
use crate::path::placement_under;
use crate::types::{Permission, PermissionId, PermissionTypeId};

/// A type-1 permission with the given parent and placeholder placement.
pub fn corrupt(id: i64, parent: Option<i64>) -> Permission {
	let now = Utc::now();
	Permission {
		id: PermissionId::new(id),
		permission_type_id: PermissionTypeId::new(1),
		parent_permission_id: parent.map(PermissionId::new),
		name: format!("p{id}"),
		description: None,
		level: 0,
		hierarchy_path: id.to_string(),
		sort_order: 0,
		can_have_children: true,
		is_active: true,
		is_system_permission: false,
		created_at: now,
		updated_at: now,
	}
}

/// Build a consistent type-1 tree. Parents must precede their children.
///
/// Sort orders follow input order within each sibling set.
pub fn tree(links: &[(i64, Option<i64>)]) -> PermissionArena {
	let mut arena = PermissionArena::new();
	for (id, parent) in links {
		let mut node = corrupt(*id, *parent);
		let parent_node = parent.and_then(|p| arena.get(PermissionId::new(p)).cloned());
		node.sort_order = arena.next_sort_order(node.parent_permission_id, node.permission_type_id);
		node.apply_placement(placement_under(node.id, parent_node.as_ref()));
		arena.insert(node);
	}
	arena
}
