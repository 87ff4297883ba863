// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! A store error partway through a structural write leaves every row as it was.

mod support;

use std::sync::Arc;

use async_trait::async_trait;
use canopy_permissions_core::{
	NewPermission, NewPermissionType, Permission, PermissionId, PermissionType, PermissionTypeId,
};
use canopy_server_config::HierarchyConfig;
use canopy_server_db::{DbError, PermissionRepository, PermissionStore, PermissionTx, Result};
use canopy_server_hierarchy::{ErrorKind, HierarchyService};
use support::{fixture, Fixture};

/// Delegates to a real repository, but every transaction it opens fails when
/// asked to write one particular permission.
struct FailingStore {
	inner: PermissionRepository,
	fail_on: PermissionId,
}

struct FailingTx {
	inner: Box<dyn PermissionTx>,
	fail_on: PermissionId,
}

#[async_trait]
impl PermissionStore for FailingStore {
	async fn begin(&self) -> Result<Box<dyn PermissionTx>> {
		Ok(Box::new(FailingTx {
			inner: PermissionStore::begin(&self.inner).await?,
			fail_on: self.fail_on,
		}))
	}

	async fn get_permission_by_id(&self, id: PermissionId) -> Result<Option<Permission>> {
		PermissionStore::get_permission_by_id(&self.inner, id).await
	}

	async fn list_permissions_by_parent(&self, parent_id: PermissionId) -> Result<Vec<Permission>> {
		PermissionStore::list_permissions_by_parent(&self.inner, parent_id).await
	}

	async fn list_root_permissions(
		&self,
		permission_type_id: PermissionTypeId,
	) -> Result<Vec<Permission>> {
		PermissionStore::list_root_permissions(&self.inner, permission_type_id).await
	}

	async fn list_permissions_by_type(
		&self,
		permission_type_id: PermissionTypeId,
	) -> Result<Vec<Permission>> {
		PermissionStore::list_permissions_by_type(&self.inner, permission_type_id).await
	}

	async fn list_permissions(&self) -> Result<Vec<Permission>> {
		PermissionStore::list_permissions(&self.inner).await
	}

	async fn get_permission_type_by_id(
		&self,
		id: PermissionTypeId,
	) -> Result<Option<PermissionType>> {
		PermissionStore::get_permission_type_by_id(&self.inner, id).await
	}

	async fn list_permission_types(&self) -> Result<Vec<PermissionType>> {
		PermissionStore::list_permission_types(&self.inner).await
	}
}

#[async_trait]
impl PermissionTx for FailingTx {
	async fn get_permission_by_id(&mut self, id: PermissionId) -> Result<Option<Permission>> {
		self.inner.get_permission_by_id(id).await
	}

	async fn list_permissions_by_parent(
		&mut self,
		parent_id: PermissionId,
	) -> Result<Vec<Permission>> {
		self.inner.list_permissions_by_parent(parent_id).await
	}

	async fn list_permissions_by_type(
		&mut self,
		permission_type_id: PermissionTypeId,
	) -> Result<Vec<Permission>> {
		self.inner.list_permissions_by_type(permission_type_id).await
	}

	async fn list_permissions(&mut self) -> Result<Vec<Permission>> {
		self.inner.list_permissions().await
	}

	async fn get_permission_type_by_id(
		&mut self,
		id: PermissionTypeId,
	) -> Result<Option<PermissionType>> {
		self.inner.get_permission_type_by_id(id).await
	}

	async fn list_permission_types(&mut self) -> Result<Vec<PermissionType>> {
		self.inner.list_permission_types().await
	}

	async fn create_permission(
		&mut self,
		new: &NewPermission,
		sort_order: i32,
	) -> Result<Permission> {
		self.inner.create_permission(new, sort_order).await
	}

	async fn update_permission(&mut self, permission: &Permission) -> Result<()> {
		if permission.id == self.fail_on {
			return Err(DbError::Internal(format!(
				"write to permission {} refused",
				permission.id
			)));
		}
		self.inner.update_permission(permission).await
	}

	async fn delete_permission(&mut self, id: PermissionId) -> Result<bool> {
		self.inner.delete_permission(id).await
	}

	async fn create_permission_type(&mut self, new: &NewPermissionType) -> Result<PermissionType> {
		self.inner.create_permission_type(new).await
	}

	async fn commit(self: Box<Self>) -> Result<()> {
		let FailingTx { inner, .. } = *self;
		inner.commit().await
	}
}

/// A service over the fixture's database whose writes to `fail_on` error.
fn failing_service(f: &Fixture, fail_on: &Permission) -> HierarchyService {
	let store = FailingStore {
		inner: PermissionRepository::new(f.pool.clone()),
		fail_on: fail_on.id,
	};
	HierarchyService::new(Arc::new(store), HierarchyConfig::default())
}

async fn snapshot(f: &Fixture) -> Vec<Permission> {
	PermissionRepository::new(f.pool.clone())
		.list_permissions()
		.await
		.unwrap()
}

#[tokio::test]
async fn move_failing_during_propagation_changes_nothing() {
	let f = fixture().await;
	let s = f.sample().await;
	let before = snapshot(&f).await;

	// B is rewritten first; the error comes when C, below it, is rewritten.
	let err = failing_service(&f, &s.c)
		.move_permission(s.b.id, Some(s.d.id), 0)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Fatal);
	assert_eq!(snapshot(&f).await, before);
	f.assert_healthy().await;

	let moved = f
		.service
		.move_permission(s.b.id, Some(s.d.id), 0)
		.await
		.unwrap();
	assert_eq!(moved.hierarchy_path, format!("{}/{}/{}", s.a.id, s.d.id, s.b.id));
}

#[tokio::test]
async fn bulk_move_failing_midway_rolls_back_the_batch() {
	let f = fixture().await;
	let s = f.sample().await;
	let before = snapshot(&f).await;

	// D is promoted before B, whose descendant C cannot be rewritten.
	let err = failing_service(&f, &s.c)
		.bulk_move(&[s.d.id, s.b.id], None)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Fatal);
	assert_eq!(snapshot(&f).await, before);
	assert_eq!(f.reload(&s.d).await.parent_permission_id, Some(s.a.id));
	f.assert_healthy().await;
}
