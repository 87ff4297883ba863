// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Copying single permissions and whole subtrees.
//!
//! Copies are never system permissions. Names must stay unique within a
//! type, so every copy without an explicit name is called "<name> (Copy)",
//! then "<name> (Copy 2)" and so on.

use std::collections::HashMap;

use canopy_permissions_core::{
	check_new_parent, check_unique_name, normalize_name, placement_under, NewPermission,
	Permission, PermissionArena, PermissionId, PermissionTypeId,
};
use canopy_server_db::PermissionTx;
use serde::{Deserialize, Serialize};

use crate::error::{HierarchyError, Result};
use crate::service::{load_type_arena, resolve_parent, HierarchyService};

/// Where a copy is placed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case", tag = "to", content = "id")]
pub enum CloneDestination {
	/// Next to the source, under the same parent.
	#[default]
	SourceParent,
	/// As a new root of the source's type.
	Root,
	/// Under the given permission.
	Parent(PermissionId),
}

impl HierarchyService {
	/// Copy one permission (without its children).
	///
	/// The copy is appended after the destination's current last child.
	#[tracing::instrument(skip(self, new_name), fields(permission_id = %source_id))]
	pub async fn clone_permission(
		&self,
		source_id: PermissionId,
		destination: CloneDestination,
		new_name: Option<String>,
	) -> Result<Permission> {
		let permission_type_id = self.type_of(source_id).await?;
		let _guard = self.locks.lock_types([permission_type_id]).await;
		let mut tx = self.store.begin().await?;
		let mut arena = load_type_arena(&mut *tx, permission_type_id).await?;

		let source = arena
			.get(source_id)
			.cloned()
			.ok_or(HierarchyError::PermissionNotFound(source_id))?;
		let parent = destination_parent(&mut *tx, &arena, &source, destination).await?;

		let name = match new_name {
			Some(name) => {
				let name = normalize_name(&name)?;
				check_unique_name(&arena, permission_type_id, &name, None)?;
				name
			}
			None => copy_name(&arena, permission_type_id, &source.name),
		};
		let sort_order = arena.next_sort_order(parent.as_ref().map(|p| p.id), permission_type_id);

		let copy = insert_copy(&mut *tx, &mut arena, &source, parent.as_ref(), name, sort_order).await?;
		tx.commit().await?;

		tracing::info!(source_id = %source_id, permission_id = %copy.id, "permission cloned");
		Ok(copy)
	}

	/// Copy a permission and all its descendants, preserving shape and
	/// sibling order. Returns the copy of `source_id`.
	///
	/// The source subtree is captured before anything is inserted, so
	/// copying a subtree into one of its own descendants terminates.
	#[tracing::instrument(skip(self), fields(permission_id = %source_id))]
	pub async fn clone_subtree(
		&self,
		source_id: PermissionId,
		destination: CloneDestination,
	) -> Result<Permission> {
		let permission_type_id = self.type_of(source_id).await?;
		let _guard = self.locks.lock_types([permission_type_id]).await;
		let mut tx = self.store.begin().await?;
		let mut arena = load_type_arena(&mut *tx, permission_type_id).await?;

		let source = arena
			.get(source_id)
			.cloned()
			.ok_or(HierarchyError::PermissionNotFound(source_id))?;
		let parent = destination_parent(&mut *tx, &arena, &source, destination).await?;

		// Pre-order: every node appears after its parent.
		let snapshot: Vec<Permission> = arena
			.descendants(source_id)
			.into_iter()
			.cloned()
			.collect();

		let root_name = copy_name(&arena, permission_type_id, &source.name);
		let root_sort_order =
			arena.next_sort_order(parent.as_ref().map(|p| p.id), permission_type_id);
		let root_copy = insert_copy(
			&mut *tx,
			&mut arena,
			&source,
			parent.as_ref(),
			root_name,
			root_sort_order,
		)
		.await?;

		let mut copies: HashMap<PermissionId, Permission> = HashMap::new();
		copies.insert(source_id, root_copy.clone());
		for original in &snapshot {
			let Some(copied_parent) = original
				.parent_permission_id
				.and_then(|p| copies.get(&p))
				.cloned()
			else {
				continue;
			};
			let name = copy_name(&arena, permission_type_id, &original.name);
			let copy = insert_copy(
				&mut *tx,
				&mut arena,
				original,
				Some(&copied_parent),
				name,
				original.sort_order,
			)
			.await?;
			copies.insert(original.id, copy);
		}
		tx.commit().await?;

		tracing::info!(
			source_id = %source_id,
			permission_id = %root_copy.id,
			copied = copies.len(),
			"subtree cloned"
		);
		Ok(root_copy)
	}
}

async fn destination_parent(
	tx: &mut dyn PermissionTx,
	arena: &PermissionArena,
	source: &Permission,
	destination: CloneDestination,
) -> Result<Option<Permission>> {
	let parent_id = match destination {
		CloneDestination::SourceParent => source.parent_permission_id,
		CloneDestination::Root => None,
		CloneDestination::Parent(parent_id) => Some(parent_id),
	};
	let Some(parent_id) = parent_id else {
		return Ok(None);
	};
	let parent = resolve_parent(tx, arena, parent_id).await?;
	check_new_parent(&parent, source.permission_type_id)?;
	Ok(Some(parent))
}

/// Two-phase insert of a non-system copy of `source`.
async fn insert_copy(
	tx: &mut dyn PermissionTx,
	arena: &mut PermissionArena,
	source: &Permission,
	parent: Option<&Permission>,
	name: String,
	sort_order: i32,
) -> Result<Permission> {
	let new = NewPermission {
		permission_type_id: source.permission_type_id,
		parent_permission_id: parent.map(|p| p.id),
		name,
		description: source.description.clone(),
		sort_order: Some(sort_order),
		can_have_children: source.can_have_children,
		is_active: source.is_active,
		is_system_permission: false,
	};
	let mut copy = tx.create_permission(&new, sort_order).await?;
	copy.apply_placement(placement_under(copy.id, parent));
	tx.update_permission(&copy).await?;
	arena.insert(copy.clone());
	Ok(copy)
}

/// First free "<name> (Copy)" / "<name> (Copy N)" within the type.
fn copy_name(arena: &PermissionArena, permission_type_id: PermissionTypeId, name: &str) -> String {
	let base = name.trim();
	let mut candidate = format!("{base} (Copy)");
	let mut n = 2;
	while check_unique_name(arena, permission_type_id, &candidate, None).is_err() {
		candidate = format!("{base} (Copy {n})");
		n += 1;
	}
	candidate
}

#[cfg(test)]
mod tests {
	use super::*;
	use chrono::Utc;

	fn named(id: i64, name: &str) -> Permission {
		let now = Utc::now();
		Permission {
			id: PermissionId::new(id),
			permission_type_id: PermissionTypeId::new(1),
			parent_permission_id: None,
			name: name.to_string(),
			description: None,
			level: 0,
			hierarchy_path: id.to_string(),
			sort_order: id as i32,
			can_have_children: true,
			is_active: true,
			is_system_permission: false,
			created_at: now,
			updated_at: now,
		}
	}

	#[test]
	fn copy_names_count_up() {
		let type_id = PermissionTypeId::new(1);
		let mut arena = PermissionArena::from_permissions(vec![named(1, "Read")]);
		assert_eq!(copy_name(&arena, type_id, "Read"), "Read (Copy)");

		arena.insert(named(2, "Read (Copy)"));
		arena.insert(named(3, "read (copy 2)"));
		assert_eq!(copy_name(&arena, type_id, "Read"), "Read (Copy 3)");

		assert_eq!(
			copy_name(&arena, PermissionTypeId::new(2), "Read"),
			"Read (Copy)"
		);
	}

	#[test]
	fn destination_serializes_with_tag() {
		let json = serde_json::to_string(&CloneDestination::Parent(PermissionId::new(7))).unwrap();
		assert_eq!(json, r#"{"to":"parent","id":7}"#);
		let root: CloneDestination = serde_json::from_str(r#"{"to":"root"}"#).unwrap();
		assert_eq!(root, CloneDestination::Root);
	}
}
