// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Single-node structural and non-structural writes.
//!
//! Every operation follows the same shape: take the type lock, open one store
//! transaction, load the type's permissions into an arena, validate against
//! the arena, write the changed rows, commit. An early return drops the
//! transaction and so rolls back everything written so far.

use std::collections::{HashSet, VecDeque};

use canopy_permissions_core::{
	can_reparent, check_can_delete, check_new_parent, check_unique_name, normalize_name,
	placement_under, HierarchyViolation, NewPermission, Permission, PermissionArena,
	PermissionChanges, PermissionId,
};
use canopy_server_db::PermissionTx;
use chrono::{DateTime, Utc};

use crate::error::{HierarchyError, Result};
use crate::service::{load_type_arena, resolve_parent, HierarchyService};

impl HierarchyService {
	/// Create a permission.
	///
	/// Creation is two-phase: the row is inserted to obtain its id, then
	/// level and path are derived from the parent and written back, all in
	/// one transaction.
	#[tracing::instrument(skip(self, new), fields(permission_type_id = %new.permission_type_id, name = %new.name))]
	pub async fn create_permission(&self, new: NewPermission) -> Result<Permission> {
		let new = NewPermission {
			name: normalize_name(&new.name)?,
			..new
		};

		let _guard = self.locks.lock_types([new.permission_type_id]).await;
		let mut tx = self.store.begin().await?;

		if tx
			.get_permission_type_by_id(new.permission_type_id)
			.await?
			.is_none()
		{
			return Err(HierarchyError::PermissionTypeNotFound(
				new.permission_type_id,
			));
		}

		let arena = load_type_arena(&mut *tx, new.permission_type_id).await?;
		let parent = match new.parent_permission_id {
			Some(parent_id) => {
				let parent = resolve_parent(&mut *tx, &arena, parent_id).await?;
				check_new_parent(&parent, new.permission_type_id)?;
				Some(parent)
			}
			None => None,
		};
		check_unique_name(&arena, new.permission_type_id, &new.name, None)?;

		let sort_order = new.sort_order.unwrap_or_else(|| {
			arena.next_sort_order(new.parent_permission_id, new.permission_type_id)
		});
		let mut created = tx.create_permission(&new, sort_order).await?;
		created.apply_placement(placement_under(created.id, parent.as_ref()));
		tx.update_permission(&created).await?;
		tx.commit().await?;

		tracing::info!(
			permission_id = %created.id,
			path = %created.hierarchy_path,
			"permission created"
		);
		Ok(created)
	}

	/// Apply a non-structural edit.
	///
	/// Renames must stay unique within the type. A permission that has
	/// children keeps `can_have_children`. Deactivating a system permission
	/// needs administrative scope.
	#[tracing::instrument(skip(self, changes), fields(permission_id = %id))]
	pub async fn update_permission(
		&self,
		id: PermissionId,
		changes: PermissionChanges,
	) -> Result<Permission> {
		let permission_type_id = self.type_of(id).await?;
		let _guard = self.locks.lock_types([permission_type_id]).await;
		let mut tx = self.store.begin().await?;
		let arena = load_type_arena(&mut *tx, permission_type_id).await?;

		let mut permission = arena
			.get(id)
			.cloned()
			.ok_or(HierarchyError::PermissionNotFound(id))?;

		if let Some(name) = changes.name {
			let name = normalize_name(&name)?;
			check_unique_name(&arena, permission_type_id, &name, Some(id))?;
			permission.name = name;
		}
		if let Some(description) = changes.description {
			permission.description = description;
		}
		if let Some(can_have_children) = changes.can_have_children {
			if !can_have_children && arena.has_children(id) {
				return Err(HierarchyViolation::ChildrenPresent(id).into());
			}
			permission.can_have_children = can_have_children;
		}
		if let Some(is_active) = changes.is_active {
			if !is_active && permission.is_active {
				self.scope.check_structural(&permission)?;
			}
			permission.is_active = is_active;
		}

		permission.updated_at = Utc::now();
		tx.update_permission(&permission).await?;
		tx.commit().await?;

		tracing::info!(permission_id = %id, "permission updated");
		Ok(permission)
	}

	/// Move a permission under `new_parent_id` (or to the root when `None`)
	/// at `new_sort_order`, re-deriving level and path for it and every
	/// descendant.
	///
	/// # Errors
	/// - `Validation` when [`can_reparent`] denies the move
	/// - `SystemProtected` for system permissions outside administrative scope
	#[tracing::instrument(skip(self), fields(permission_id = %id))]
	pub async fn move_permission(
		&self,
		id: PermissionId,
		new_parent_id: Option<PermissionId>,
		new_sort_order: i32,
	) -> Result<Permission> {
		let permission_type_id = self.type_of(id).await?;
		let _guard = self.locks.lock_types([permission_type_id]).await;
		let mut tx = self.store.begin().await?;
		let mut arena = load_type_arena(&mut *tx, permission_type_id).await?;

		let node = arena
			.get(id)
			.cloned()
			.ok_or(HierarchyError::PermissionNotFound(id))?;
		self.scope.check_structural(&node)?;

		let parent = match new_parent_id {
			Some(parent_id) => Some(resolve_parent(&mut *tx, &arena, parent_id).await?),
			None => None,
		};
		can_reparent(&arena, &node, parent.as_ref())?;

		let now = Utc::now();
		let moved = reparent(&mut *tx, &mut arena, node, parent.as_ref(), new_sort_order, now).await?;
		let descendants =
			propagate_placement(&mut *tx, &mut arena, id, now, &mut HashSet::new()).await?;
		tx.commit().await?;

		tracing::info!(
			permission_id = %id,
			parent_id = ?new_parent_id,
			path = %moved.hierarchy_path,
			descendants_rewritten = descendants,
			"permission moved"
		);
		Ok(moved)
	}

	/// Swap sort order with the previous sibling. `false` if already first.
	#[tracing::instrument(skip(self), fields(permission_id = %id))]
	pub async fn move_up(&self, id: PermissionId) -> Result<bool> {
		self.shift(id, Shift::Up).await
	}

	/// Swap sort order with the next sibling. `false` if already last.
	#[tracing::instrument(skip(self), fields(permission_id = %id))]
	pub async fn move_down(&self, id: PermissionId) -> Result<bool> {
		self.shift(id, Shift::Down).await
	}

	async fn shift(&self, id: PermissionId, direction: Shift) -> Result<bool> {
		let permission_type_id = self.type_of(id).await?;
		let _guard = self.locks.lock_types([permission_type_id]).await;
		let mut tx = self.store.begin().await?;
		let arena = load_type_arena(&mut *tx, permission_type_id).await?;

		let node = arena
			.get(id)
			.ok_or(HierarchyError::PermissionNotFound(id))?;
		let mut siblings: Vec<Permission> = arena.siblings(node).into_iter().cloned().collect();
		let Some(position) = siblings.iter().position(|s| s.id == id) else {
			return Ok(false);
		};
		let neighbour = match direction {
			Shift::Up => position.checked_sub(1),
			Shift::Down => Some(position + 1).filter(|n| *n < siblings.len()),
		};
		let Some(neighbour) = neighbour else {
			tracing::debug!(permission_id = %id, "no sibling to swap with");
			return Ok(false);
		};

		// Equal sort orders cannot be swapped meaningfully; renumber the
		// sibling set densely first.
		let originals: Vec<i32> = siblings.iter().map(|s| s.sort_order).collect();
		if siblings[position].sort_order == siblings[neighbour].sort_order {
			for (index, sibling) in siblings.iter_mut().enumerate() {
				sibling.sort_order = index as i32;
			}
		}
		let swapped = siblings[neighbour].sort_order;
		siblings[neighbour].sort_order = siblings[position].sort_order;
		siblings[position].sort_order = swapped;

		let now = Utc::now();
		for (sibling, original) in siblings.iter_mut().zip(originals) {
			if sibling.sort_order != original {
				sibling.updated_at = now;
				tx.update_permission(sibling).await?;
			}
		}
		tx.commit().await?;

		tracing::info!(permission_id = %id, direction = ?direction, "permission reordered");
		Ok(true)
	}

	/// Assign `sort_order = index` following `ordered_child_ids`.
	///
	/// Ids that are not children of `parent_id` are ignored, as are repeats.
	/// Children left out of the list keep their sort order. Returns how many
	/// children were placed.
	#[tracing::instrument(skip(self, ordered_child_ids), fields(permission_id = %parent_id, count = ordered_child_ids.len()))]
	pub async fn reorder_children(
		&self,
		parent_id: PermissionId,
		ordered_child_ids: &[PermissionId],
	) -> Result<usize> {
		let permission_type_id = self.type_of(parent_id).await?;
		let _guard = self.locks.lock_types([permission_type_id]).await;
		let mut tx = self.store.begin().await?;
		let arena = load_type_arena(&mut *tx, permission_type_id).await?;

		if !arena.contains(parent_id) {
			return Err(HierarchyError::PermissionNotFound(parent_id));
		}
		let children: HashSet<PermissionId> =
			arena.children(parent_id).iter().map(|c| c.id).collect();

		let mut seen = HashSet::new();
		let placed: Vec<PermissionId> = ordered_child_ids
			.iter()
			.copied()
			.filter(|id| children.contains(id) && seen.insert(*id))
			.collect();
		let ignored = ordered_child_ids.len() - placed.len();
		if ignored > 0 {
			tracing::warn!(permission_id = %parent_id, ignored, "ignored ids that are not children");
		}

		let now = Utc::now();
		for (index, child_id) in placed.iter().enumerate() {
			let Some(child) = arena.get(*child_id) else {
				continue;
			};
			let sort_order = index as i32;
			if child.sort_order != sort_order {
				let mut child = child.clone();
				child.sort_order = sort_order;
				child.updated_at = now;
				tx.update_permission(&child).await?;
			}
		}
		tx.commit().await?;

		tracing::info!(permission_id = %parent_id, placed = placed.len(), "children reordered");
		Ok(placed.len())
	}

	/// Delete a permission; with `cascade`, its whole subtree.
	///
	/// Rows are removed deepest first. Returns the number of rows removed.
	///
	/// # Errors
	/// - `Validation(HasChildren)` for a branch without `cascade`
	/// - `SystemProtected` if any removed permission is a system permission
	///   and the scope is regular
	#[tracing::instrument(skip(self), fields(permission_id = %id))]
	pub async fn delete_permission(&self, id: PermissionId, cascade: bool) -> Result<usize> {
		let permission_type_id = self.type_of(id).await?;
		let _guard = self.locks.lock_types([permission_type_id]).await;
		let mut tx = self.store.begin().await?;
		let arena = load_type_arena(&mut *tx, permission_type_id).await?;

		let node = arena
			.get(id)
			.ok_or(HierarchyError::PermissionNotFound(id))?;
		check_can_delete(&arena, id, cascade)?;

		let mut doomed: Vec<&Permission> = vec![node];
		if cascade {
			doomed.extend(arena.descendants(id));
		}
		for permission in &doomed {
			self.scope.check_structural(permission)?;
		}

		// Pre-order reversed puts every child before its parent.
		let mut removed = 0;
		for permission in doomed.iter().rev() {
			if tx.delete_permission(permission.id).await? {
				removed += 1;
			}
		}
		tx.commit().await?;

		tracing::info!(permission_id = %id, removed, "permission deleted");
		Ok(removed)
	}
}

#[derive(Debug, Clone, Copy)]
enum Shift {
	Up,
	Down,
}

/// Point `node` at `parent` with `sort_order`, derive its placement and write
/// it. The arena is updated to match.
pub(crate) async fn reparent(
	tx: &mut dyn PermissionTx,
	arena: &mut PermissionArena,
	mut node: Permission,
	parent: Option<&Permission>,
	sort_order: i32,
	now: DateTime<Utc>,
) -> Result<Permission> {
	node.parent_permission_id = parent.map(|p| p.id);
	node.sort_order = sort_order;
	node.apply_placement(placement_under(node.id, parent));
	node.updated_at = now;
	tx.update_permission(&node).await?;
	arena.insert(node.clone());
	Ok(node)
}

/// Breadth-first re-derivation of level and path below `root`, which must
/// itself already be correctly placed.
///
/// Only rows whose placement actually changes are written. Every visited id
/// (including `root`) is added to `reached`; a node already in `reached` is
/// not visited again, so corrupt cycles terminate. Returns the number of
/// rows written.
pub(crate) async fn propagate_placement(
	tx: &mut dyn PermissionTx,
	arena: &mut PermissionArena,
	root: PermissionId,
	now: DateTime<Utc>,
	reached: &mut HashSet<PermissionId>,
) -> Result<usize> {
	let mut written = 0;
	let mut queue = VecDeque::from([root]);
	reached.insert(root);

	while let Some(parent_id) = queue.pop_front() {
		let Some(parent) = arena.get(parent_id).cloned() else {
			continue;
		};
		let child_ids: Vec<PermissionId> =
			arena.children(parent_id).iter().map(|c| c.id).collect();

		for child_id in child_ids {
			if !reached.insert(child_id) {
				continue;
			}
			let Some(mut child) = arena.get(child_id).cloned() else {
				continue;
			};
			if child.apply_placement(placement_under(child.id, Some(&parent))) {
				child.updated_at = now;
				tx.update_permission(&child).await?;
				arena.insert(child);
				written += 1;
			}
			queue.push_back(child_id);
		}
	}

	Ok(written)
}
