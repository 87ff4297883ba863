// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Whole-table audit, repair and export.

use std::collections::HashSet;

use canopy_permissions_core::{
	full_audit, placement_under, AuditReport, Permission, PermissionArena, PermissionId,
	PermissionTypeId,
};
use chrono::Utc;
use serde::Serialize;

use crate::error::Result;
use crate::mutator::propagate_placement;
use crate::service::HierarchyService;

/// What [`HierarchyService::repair_hierarchy_paths`] did.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct RepairReport {
	pub examined: usize,
	/// Rows whose level or path was rewritten.
	pub repaired: usize,
	/// Rows not reachable from any root (orphans and cycle members), left
	/// untouched.
	pub unreachable: Vec<PermissionId>,
}

impl HierarchyService {
	/// Run the full integrity audit over every permission.
	///
	/// Findings are diagnostics, never errors.
	#[tracing::instrument(skip(self))]
	pub async fn validate_hierarchy(&self) -> Result<AuditReport> {
		let permissions = self.store.list_permissions().await?;
		let arena = PermissionArena::from_permissions(permissions);
		let report = full_audit(&arena, self.config.audit_max_depth);

		tracing::info!(
			examined = report.examined,
			issues = report.issues.len(),
			"hierarchy audit finished"
		);
		Ok(report)
	}

	/// Recompute and persist level and path for every permission reachable
	/// from a root, breadth first.
	///
	/// Runs with every writer excluded.
	#[tracing::instrument(skip(self))]
	pub async fn repair_hierarchy_paths(&self) -> Result<RepairReport> {
		let _exclusive = self.locks.lock_all().await;
		let mut tx = self.store.begin().await?;
		let mut arena = PermissionArena::from_permissions(tx.list_permissions().await?);

		let now = Utc::now();
		let mut reached = HashSet::new();
		let mut repaired = 0;
		let root_ids: Vec<PermissionId> = arena.roots(None).iter().map(|r| r.id).collect();
		for root_id in root_ids {
			let Some(mut root) = arena.get(root_id).cloned() else {
				continue;
			};
			if root.apply_placement(placement_under(root.id, None)) {
				root.updated_at = now;
				tx.update_permission(&root).await?;
				arena.insert(root);
				repaired += 1;
			}
			repaired += propagate_placement(&mut *tx, &mut arena, root_id, now, &mut reached).await?;
		}
		tx.commit().await?;

		let unreachable: Vec<PermissionId> = arena
			.ids()
			.into_iter()
			.filter(|id| !reached.contains(id))
			.collect();
		if !unreachable.is_empty() {
			tracing::warn!(
				count = unreachable.len(),
				"permissions unreachable from any root were left untouched"
			);
		}
		tracing::info!(examined = arena.len(), repaired, "hierarchy paths repaired");

		Ok(RepairReport {
			examined: arena.len(),
			repaired,
			unreachable,
		})
	}

	/// Flat JSON list of permissions sorted by type, level, sort order and
	/// name.
	#[tracing::instrument(skip(self))]
	pub async fn export_json(&self, permission_type_id: Option<PermissionTypeId>) -> Result<String> {
		let mut permissions: Vec<Permission> = match permission_type_id {
			Some(t) => self.store.list_permissions_by_type(t).await?,
			None => self.store.list_permissions().await?,
		};
		permissions.sort_by(|a, b| {
			a.permission_type_id
				.cmp(&b.permission_type_id)
				.then(a.level.cmp(&b.level))
				.then(a.sort_order.cmp(&b.sort_order))
				.then_with(|| a.name.cmp(&b.name))
				.then(a.id.cmp(&b.id))
		});

		let json = serde_json::to_string_pretty(&permissions)?;
		tracing::debug!(count = permissions.len(), "permissions exported");
		Ok(json)
	}
}
