// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! The hierarchy service and its read-only projections.
//!
//! Reads go straight to the store without locks; they serve presentation and
//! tolerate racing with in-flight writes. Mutations live in `mutator`, `bulk`,
//! `clone` and `maintenance`, all as further `impl HierarchyService` blocks.

use std::sync::Arc;

use canopy_permissions_core::{
	build_tree, can_reparent, normalize_name, would_create_cycle, NewPermissionType, Permission,
	PermissionArena, PermissionId, PermissionType, PermissionTypeId, ReparentDecision, TreeNode,
};
use canopy_server_config::HierarchyConfig;
use canopy_server_db::{PermissionStore, PermissionTx};

use crate::error::{HierarchyError, Result};
use crate::locks::TypeLocks;
use crate::scope::EditScope;

#[derive(Clone)]
pub struct HierarchyService {
	pub(crate) store: Arc<dyn PermissionStore>,
	pub(crate) locks: Arc<TypeLocks>,
	pub(crate) config: HierarchyConfig,
	pub(crate) scope: EditScope,
}

impl HierarchyService {
	/// A service in regular scope.
	pub fn new(store: Arc<dyn PermissionStore>, config: HierarchyConfig) -> Self {
		Self {
			store,
			locks: Arc::new(TypeLocks::new()),
			config,
			scope: EditScope::Regular,
		}
	}

	/// The same service in administrative scope, sharing store and locks.
	pub fn administrative(&self) -> Self {
		Self {
			scope: EditScope::Administrative,
			..self.clone()
		}
	}

	pub fn scope(&self) -> EditScope {
		self.scope
	}

	pub fn config(&self) -> &HierarchyConfig {
		&self.config
	}

	// =========================================================================
	// Permission types
	// =========================================================================

	#[tracing::instrument(skip(self, new), fields(name = %new.name))]
	pub async fn create_permission_type(&self, new: NewPermissionType) -> Result<PermissionType> {
		let new = NewPermissionType {
			name: normalize_name(&new.name)?,
			..new
		};

		let mut tx = self.store.begin().await?;
		let created = tx.create_permission_type(&new).await?;
		tx.commit().await?;

		tracing::info!(permission_type_id = %created.id, name = %created.name, "permission type created");
		Ok(created)
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_permission_types(&self) -> Result<Vec<PermissionType>> {
		Ok(self.store.list_permission_types().await?)
	}

	// =========================================================================
	// Queries
	// =========================================================================

	/// # Errors
	/// `PermissionNotFound` if the id does not exist.
	#[tracing::instrument(skip(self), fields(permission_id = %id))]
	pub async fn get_permission(&self, id: PermissionId) -> Result<Permission> {
		self.store
			.get_permission_by_id(id)
			.await?
			.ok_or(HierarchyError::PermissionNotFound(id))
	}

	/// Roots of a type in sibling order.
	#[tracing::instrument(skip(self), fields(permission_type_id = %permission_type_id))]
	pub async fn get_root_permissions(
		&self,
		permission_type_id: PermissionTypeId,
	) -> Result<Vec<Permission>> {
		Ok(self.store.list_root_permissions(permission_type_id).await?)
	}

	/// Direct children in sibling order.
	#[tracing::instrument(skip(self), fields(permission_id = %parent_id))]
	pub async fn get_children(&self, parent_id: PermissionId) -> Result<Vec<Permission>> {
		self.get_permission(parent_id).await?;
		Ok(self.store.list_permissions_by_parent(parent_id).await?)
	}

	/// Ancestors in root-to-parent order, excluding the permission itself.
	#[tracing::instrument(skip(self), fields(permission_id = %id))]
	pub async fn get_ancestors(&self, id: PermissionId) -> Result<Vec<Permission>> {
		let arena = self.read_type_arena_of(id).await?;
		Ok(arena.ancestors(id).into_iter().cloned().collect())
	}

	/// Descendants in pre-order, excluding the permission itself.
	#[tracing::instrument(skip(self), fields(permission_id = %id))]
	pub async fn get_descendants(&self, id: PermissionId) -> Result<Vec<Permission>> {
		let arena = self.read_type_arena_of(id).await?;
		Ok(arena.descendants(id).into_iter().cloned().collect())
	}

	/// Nested display tree, one top-level node per permission type.
	#[tracing::instrument(skip(self))]
	pub async fn get_tree_data(
		&self,
		permission_type_id: Option<PermissionTypeId>,
	) -> Result<Vec<TreeNode>> {
		let types = self.store.list_permission_types().await?;
		let permissions = match permission_type_id {
			Some(t) => self.store.list_permissions_by_type(t).await?,
			None => self.store.list_permissions().await?,
		};
		let arena = PermissionArena::from_permissions(permissions);
		Ok(build_tree(&types, &arena, permission_type_id))
	}

	/// Deepest stored level in a type; `None` for an empty type.
	#[tracing::instrument(skip(self), fields(permission_type_id = %permission_type_id))]
	pub async fn get_max_depth(&self, permission_type_id: PermissionTypeId) -> Result<Option<u32>> {
		let arena = self.read_type_arena(permission_type_id).await?;
		Ok(arena.max_depth(permission_type_id))
	}

	/// Permissions whose stored level equals `level`, ordered by path.
	#[tracing::instrument(skip(self))]
	pub async fn get_permissions_by_level(
		&self,
		level: u32,
		permission_type_id: Option<PermissionTypeId>,
	) -> Result<Vec<Permission>> {
		let permissions = match permission_type_id {
			Some(t) => self.store.list_permissions_by_type(t).await?,
			None => self.store.list_permissions().await?,
		};
		let arena = PermissionArena::from_permissions(permissions);
		Ok(arena
			.by_level(level, permission_type_id)
			.into_iter()
			.cloned()
			.collect())
	}

	/// Would placing `candidate_parent_id` above `id` make `id` its own
	/// ancestor?
	#[tracing::instrument(skip(self), fields(permission_id = %id, candidate = %candidate_parent_id))]
	pub async fn would_create_cycle(
		&self,
		id: PermissionId,
		candidate_parent_id: PermissionId,
	) -> Result<bool> {
		let arena = self.read_type_arena_of(id).await?;
		Ok(would_create_cycle(&arena, id, candidate_parent_id))
	}

	/// Explain whether `id` may move under `candidate_parent_id` (or to the
	/// root when `None`), without changing anything.
	#[tracing::instrument(skip(self), fields(permission_id = %id))]
	pub async fn can_reparent(
		&self,
		id: PermissionId,
		candidate_parent_id: Option<PermissionId>,
	) -> Result<ReparentDecision> {
		let arena = self.read_type_arena_of(id).await?;
		let node = arena
			.get(id)
			.ok_or(HierarchyError::PermissionNotFound(id))?;
		let parent = match candidate_parent_id {
			Some(parent_id) => Some(match arena.get(parent_id) {
				Some(parent) => parent.clone(),
				None => self.get_permission(parent_id).await?,
			}),
			None => None,
		};
		Ok(can_reparent(&arena, node, parent.as_ref()).into())
	}

	// =========================================================================
	// Shared helpers
	// =========================================================================

	pub(crate) async fn read_type_arena(
		&self,
		permission_type_id: PermissionTypeId,
	) -> Result<PermissionArena> {
		let permissions = self.store.list_permissions_by_type(permission_type_id).await?;
		Ok(PermissionArena::from_permissions(permissions))
	}

	async fn read_type_arena_of(&self, id: PermissionId) -> Result<PermissionArena> {
		let node = self.get_permission(id).await?;
		self.read_type_arena(node.permission_type_id).await
	}

	/// Type of an existing permission, read before any lock is taken.
	///
	/// A permission's type never changes, so the answer stays valid once the
	/// type lock is held.
	pub(crate) async fn type_of(&self, id: PermissionId) -> Result<PermissionTypeId> {
		Ok(self.get_permission(id).await?.permission_type_id)
	}
}

/// Every permission of one type, read inside `tx`.
pub(crate) async fn load_type_arena(
	tx: &mut dyn PermissionTx,
	permission_type_id: PermissionTypeId,
) -> Result<PermissionArena> {
	let permissions = tx.list_permissions_by_type(permission_type_id).await?;
	Ok(PermissionArena::from_permissions(permissions))
}

/// Resolve a prospective parent: from the arena if it has the right type,
/// otherwise from the store so cross-type parents are reported as such.
pub(crate) async fn resolve_parent(
	tx: &mut dyn PermissionTx,
	arena: &PermissionArena,
	parent_id: PermissionId,
) -> Result<Permission> {
	if let Some(parent) = arena.get(parent_id) {
		return Ok(parent.clone());
	}
	tx.get_permission_by_id(parent_id)
		.await?
		.ok_or(HierarchyError::PermissionNotFound(parent_id))
}
