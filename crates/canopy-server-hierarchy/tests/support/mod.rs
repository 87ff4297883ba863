// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

#![allow(dead_code)]

use std::sync::Arc;

use canopy_permissions_core::{
	NewPermission, NewPermissionType, Permission, PermissionId, PermissionTypeId,
};
use canopy_server_config::HierarchyConfig;
use canopy_server_db::testing::create_test_repository;
use canopy_server_hierarchy::HierarchyService;
use sqlx::SqlitePool;

/// A service over a fresh in-memory database with two permission types.
pub struct Fixture {
	pub service: HierarchyService,
	pub pool: SqlitePool,
	pub domain: PermissionTypeId,
	pub zone: PermissionTypeId,
}

/// Domain tree used by most tests:
///
/// ```text
/// A
/// ├── B
/// │   └── C
/// └── D
/// ```
pub struct Sample {
	pub a: Permission,
	pub b: Permission,
	pub c: Permission,
	pub d: Permission,
}

pub async fn fixture() -> Fixture {
	fixture_with(HierarchyConfig::default()).await
}

pub async fn fixture_with(config: HierarchyConfig) -> Fixture {
	let repo = create_test_repository().await;
	let pool = repo.pool().clone();
	let service = HierarchyService::new(Arc::new(repo), config);

	let domain = service
		.create_permission_type(NewPermissionType::new("Domain"))
		.await
		.unwrap()
		.id;
	let zone = service
		.create_permission_type(NewPermissionType::new("Zone"))
		.await
		.unwrap()
		.id;

	Fixture {
		service,
		pool,
		domain,
		zone,
	}
}

impl Fixture {
	pub async fn root(&self, name: &str) -> Permission {
		self.service
			.create_permission(NewPermission::root(self.domain, name))
			.await
			.unwrap()
	}

	pub async fn child(&self, parent: &Permission, name: &str) -> Permission {
		self.service
			.create_permission(NewPermission::child(parent.permission_type_id, parent.id, name))
			.await
			.unwrap()
	}

	pub async fn sample(&self) -> Sample {
		let a = self.root("A").await;
		let b = self.child(&a, "B").await;
		let c = self.child(&b, "C").await;
		let d = self.child(&a, "D").await;
		Sample { a, b, c, d }
	}

	/// Re-read a permission from the store.
	pub async fn reload(&self, permission: &Permission) -> Permission {
		self.service.get_permission(permission.id).await.unwrap()
	}

	pub async fn assert_healthy(&self) {
		let report = self.service.validate_hierarchy().await.unwrap();
		assert!(report.is_healthy(), "unexpected issues: {:?}", report.issues);
	}
}

pub fn ids(permissions: &[Permission]) -> Vec<PermissionId> {
	permissions.iter().map(|p| p.id).collect()
}
