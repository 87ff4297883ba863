// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! In-memory database helpers for tests.
//!
//! Enabled for this crate's own tests and, through the `testing` feature, for
//! the test suites of crates built on top of it.

use sqlx::sqlite::{SqlitePool, SqlitePoolOptions};

use crate::migrations::run_migrations;
use crate::permission::PermissionRepository;

/// A single-connection in-memory pool with no schema.
///
/// One connection keeps every query on the same in-memory database for the
/// lifetime of the pool.
pub async fn create_test_pool() -> SqlitePool {
	SqlitePoolOptions::new()
		.max_connections(1)
		.idle_timeout(None)
		.max_lifetime(None)
		.connect(":memory:")
		.await
		.unwrap()
}

/// An in-memory pool with the permission schema applied.
pub async fn create_permission_test_pool() -> SqlitePool {
	let pool = create_test_pool().await;
	run_migrations(&pool).await.unwrap();
	pool
}

pub async fn create_test_repository() -> PermissionRepository {
	PermissionRepository::new(create_permission_test_pool().await)
}

/// Overwrite a permission's parent pointer directly, bypassing every check.
///
/// Used to simulate corruption from external writers.
pub async fn force_parent(pool: &SqlitePool, id: i64, parent: Option<i64>) {
	sqlx::query("UPDATE permissions SET parent_permission_id = ? WHERE id = ?")
		.bind(parent)
		.bind(id)
		.execute(pool)
		.await
		.unwrap();
}

/// Overwrite a permission's stored level and path directly.
pub async fn force_placement(pool: &SqlitePool, id: i64, level: i64, path: &str) {
	sqlx::query("UPDATE permissions SET level = ?, hierarchy_path = ? WHERE id = ?")
		.bind(level)
		.bind(path)
		.bind(id)
		.execute(pool)
		.await
		.unwrap();
}
