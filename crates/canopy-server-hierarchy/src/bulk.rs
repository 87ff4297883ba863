// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Batch operations.
//!
//! A batch runs in one transaction under the locks of every type it touches.
//! Per-id problems (missing ids, invariant violations, protected system
//! permissions) are recorded in [`BulkOutcome`] and the batch carries on.
//! Fatal errors abort and roll back the whole batch. Re-running a batch is
//! safe: ids already in the requested state count as successes.

use std::collections::{BTreeSet, HashSet};

use canopy_permissions_core::{
	can_reparent, check_can_delete, Permission, PermissionArena, PermissionId, PermissionTypeId,
};
use canopy_server_db::PermissionTx;
use chrono::Utc;
use serde::Serialize;

use crate::error::{ErrorKind, HierarchyError, Result};
use crate::mutator::{propagate_placement, reparent};
use crate::service::HierarchyService;

/// One id the batch skipped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BulkFailure {
	pub id: PermissionId,
	pub kind: ErrorKind,
	pub reason: String,
}

/// Result of a batch: which ids were applied and which were skipped.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct BulkOutcome {
	pub succeeded: Vec<PermissionId>,
	pub failed: Vec<BulkFailure>,
}

impl BulkOutcome {
	pub fn succeeded_count(&self) -> usize {
		self.succeeded.len()
	}

	pub fn failed_count(&self) -> usize {
		self.failed.len()
	}

	fn skip(&mut self, id: PermissionId, error: HierarchyError) -> Result<()> {
		if error.is_fatal() {
			return Err(error);
		}
		tracing::warn!(permission_id = %id, error = %error, "skipping bulk member");
		self.failed.push(BulkFailure {
			id,
			kind: error.kind(),
			reason: error.to_string(),
		});
		Ok(())
	}
}

/// Ids resolved against the store before locking.
struct Batch {
	ids: Vec<PermissionId>,
	missing: Vec<PermissionId>,
	types: BTreeSet<PermissionTypeId>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Activation {
	Activate,
	Deactivate,
}

impl HierarchyService {
	/// Move every id under `new_parent_id` (or to the root), each appended
	/// after the destination's current last child.
	///
	/// Ids already under the destination are left alone and count as moved.
	///
	/// # Errors
	/// `PermissionNotFound` if the destination does not exist.
	#[tracing::instrument(skip(self, ids), fields(count = ids.len(), parent_id = ?new_parent_id))]
	pub async fn bulk_move(
		&self,
		ids: &[PermissionId],
		new_parent_id: Option<PermissionId>,
	) -> Result<BulkOutcome> {
		let mut batch = self.resolve_batch(ids).await?;
		if let Some(parent_id) = new_parent_id {
			batch.types.insert(self.type_of(parent_id).await?);
		}

		let _guard = self.locks.lock_types(batch.types.iter().copied()).await;
		let mut tx = self.store.begin().await?;
		let mut arena = load_arena(&mut *tx, &batch.types).await?;
		let parent = match new_parent_id {
			Some(parent_id) => Some(
				arena
					.get(parent_id)
					.cloned()
					.ok_or(HierarchyError::PermissionNotFound(parent_id))?,
			),
			None => None,
		};

		let mut outcome = BulkOutcome::default();
		for id in &batch.missing {
			outcome.skip(*id, HierarchyError::PermissionNotFound(*id))?;
		}

		let now = Utc::now();
		for id in batch.ids {
			let Some(node) = arena.get(id).cloned() else {
				outcome.skip(id, HierarchyError::PermissionNotFound(id))?;
				continue;
			};
			if node.parent_permission_id == new_parent_id {
				outcome.succeeded.push(id);
				continue;
			}
			if let Err(e) = self.scope.check_structural(&node) {
				outcome.skip(id, e)?;
				continue;
			}
			if let Err(violation) = can_reparent(&arena, &node, parent.as_ref()) {
				outcome.skip(id, violation.into())?;
				continue;
			}

			let sort_order = arena.next_sort_order(new_parent_id, node.permission_type_id);
			reparent(&mut *tx, &mut arena, node, parent.as_ref(), sort_order, now).await?;
			propagate_placement(&mut *tx, &mut arena, id, now, &mut HashSet::new()).await?;
			outcome.succeeded.push(id);
		}
		tx.commit().await?;

		tracing::info!(
			moved = outcome.succeeded_count(),
			skipped = outcome.failed_count(),
			"bulk move finished"
		);
		Ok(outcome)
	}

	#[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
	pub async fn bulk_activate(
		&self,
		ids: &[PermissionId],
		include_descendants: bool,
	) -> Result<BulkOutcome> {
		self.set_activation(ids, include_descendants, Activation::Activate)
			.await
	}

	/// Deactivating a system permission needs administrative scope.
	#[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
	pub async fn bulk_deactivate(
		&self,
		ids: &[PermissionId],
		include_descendants: bool,
	) -> Result<BulkOutcome> {
		self.set_activation(ids, include_descendants, Activation::Deactivate)
			.await
	}

	async fn set_activation(
		&self,
		ids: &[PermissionId],
		include_descendants: bool,
		activation: Activation,
	) -> Result<BulkOutcome> {
		let batch = self.resolve_batch(ids).await?;
		let _guard = self.locks.lock_types(batch.types.iter().copied()).await;
		let mut tx = self.store.begin().await?;
		let arena = load_arena(&mut *tx, &batch.types).await?;
		let targets = self.expand(&arena, &batch.ids, include_descendants)?;

		let mut outcome = BulkOutcome::default();
		for id in &batch.missing {
			outcome.skip(*id, HierarchyError::PermissionNotFound(*id))?;
		}

		let is_active = activation == Activation::Activate;
		let now = Utc::now();
		for id in targets {
			let Some(node) = arena.get(id) else {
				outcome.skip(id, HierarchyError::PermissionNotFound(id))?;
				continue;
			};
			if node.is_active == is_active {
				outcome.succeeded.push(id);
				continue;
			}
			if activation == Activation::Deactivate {
				if let Err(e) = self.scope.check_structural(node) {
					outcome.skip(id, e)?;
					continue;
				}
			}

			let mut node = node.clone();
			node.is_active = is_active;
			node.updated_at = now;
			tx.update_permission(&node).await?;
			outcome.succeeded.push(id);
		}
		tx.commit().await?;

		tracing::info!(
			activation = ?activation,
			changed = outcome.succeeded_count(),
			skipped = outcome.failed_count(),
			"bulk activation finished"
		);
		Ok(outcome)
	}

	/// Delete every id, deepest first.
	///
	/// With `include_descendants` whole subtrees go; without it, an id that
	/// still has children at its turn is skipped with `HasChildren`.
	#[tracing::instrument(skip(self, ids), fields(count = ids.len()))]
	pub async fn bulk_delete(
		&self,
		ids: &[PermissionId],
		include_descendants: bool,
	) -> Result<BulkOutcome> {
		let batch = self.resolve_batch(ids).await?;
		let _guard = self.locks.lock_types(batch.types.iter().copied()).await;
		let mut tx = self.store.begin().await?;
		let mut arena = load_arena(&mut *tx, &batch.types).await?;
		let mut targets = self.expand(&arena, &batch.ids, include_descendants)?;

		let mut outcome = BulkOutcome::default();
		for id in &batch.missing {
			outcome.skip(*id, HierarchyError::PermissionNotFound(*id))?;
		}

		// Deepest first; depth comes from the live chain, not the stored level.
		let depth = |id: &PermissionId| arena.ancestors(*id).len();
		let mut keyed: Vec<(usize, usize, PermissionId)> = targets
			.iter()
			.enumerate()
			.map(|(index, id)| (depth(id), index, *id))
			.collect();
		keyed.sort_by(|a, b| b.0.cmp(&a.0).then(a.1.cmp(&b.1)));
		targets = keyed.into_iter().map(|(_, _, id)| id).collect();

		for id in targets {
			let Some(node) = arena.get(id) else {
				outcome.skip(id, HierarchyError::PermissionNotFound(id))?;
				continue;
			};
			if let Err(e) = self.scope.check_structural(node) {
				outcome.skip(id, e)?;
				continue;
			}
			if let Err(violation) = check_can_delete(&arena, id, false) {
				outcome.skip(id, violation.into())?;
				continue;
			}

			tx.delete_permission(id).await?;
			arena.remove(id);
			outcome.succeeded.push(id);
		}
		tx.commit().await?;

		tracing::info!(
			deleted = outcome.succeeded_count(),
			skipped = outcome.failed_count(),
			"bulk delete finished"
		);
		Ok(outcome)
	}

	/// De-duplicate `ids` and split them into existing ids (with their
	/// types) and missing ones.
	async fn resolve_batch(&self, ids: &[PermissionId]) -> Result<Batch> {
		self.check_batch_size(ids.len())?;

		let mut seen = HashSet::new();
		let mut batch = Batch {
			ids: Vec::with_capacity(ids.len()),
			missing: Vec::new(),
			types: BTreeSet::new(),
		};
		for id in ids.iter().copied().filter(|id| seen.insert(*id)) {
			match self.store.get_permission_by_id(id).await? {
				Some(permission) => {
					batch.types.insert(permission.permission_type_id);
					batch.ids.push(id);
				}
				None => batch.missing.push(id),
			}
		}
		Ok(batch)
	}

	/// Append each id's descendants (pre-order) after it when requested,
	/// keeping first occurrences only.
	fn expand(
		&self,
		arena: &PermissionArena,
		ids: &[PermissionId],
		include_descendants: bool,
	) -> Result<Vec<PermissionId>> {
		let mut seen = HashSet::new();
		let mut expanded = Vec::with_capacity(ids.len());
		for id in ids {
			if seen.insert(*id) {
				expanded.push(*id);
			}
			if include_descendants {
				for descendant in arena.descendants(*id) {
					if seen.insert(descendant.id) {
						expanded.push(descendant.id);
					}
				}
			}
		}
		self.check_batch_size(expanded.len())?;
		Ok(expanded)
	}

	fn check_batch_size(&self, requested: usize) -> Result<()> {
		let limit = self.config.max_bulk_size;
		if requested > limit {
			return Err(HierarchyError::BatchTooLarge { requested, limit });
		}
		Ok(())
	}
}

/// Every permission of the given types, read inside `tx`.
async fn load_arena(
	tx: &mut dyn PermissionTx,
	types: &BTreeSet<PermissionTypeId>,
) -> Result<PermissionArena> {
	let mut permissions: Vec<Permission> = Vec::new();
	for permission_type_id in types {
		permissions.extend(tx.list_permissions_by_type(*permission_type_id).await?);
	}
	Ok(PermissionArena::from_permissions(permissions))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn skip_records_non_fatal_errors() {
		let mut outcome = BulkOutcome::default();
		let id = PermissionId::new(4);
		outcome
			.skip(id, HierarchyError::SystemProtected(id))
			.unwrap();
		assert_eq!(outcome.failed_count(), 1);
		assert_eq!(outcome.failed[0].kind, ErrorKind::Conflict);
	}

	#[test]
	fn skip_propagates_fatal_errors() {
		let mut outcome = BulkOutcome::default();
		let fatal = HierarchyError::Db(canopy_server_db::DbError::Internal("boom".to_string()));
		assert!(outcome.skip(PermissionId::new(1), fatal).is_err());
		assert!(outcome.failed.is_empty());
	}
}
