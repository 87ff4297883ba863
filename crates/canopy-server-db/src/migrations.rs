// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use sqlx::sqlite::SqlitePool;

use crate::error::DbError;

const MIGRATIONS: &[(&str, &str)] = &[
	(
		"001_create_permission_types",
		include_str!("../migrations/001_create_permission_types.sql"),
	),
	(
		"002_create_permissions",
		include_str!("../migrations/002_create_permissions.sql"),
	),
];

/// Run all database migrations.
///
/// # Arguments
/// * `pool` - SQLite connection pool
///
/// # Errors
/// Returns `DbError::Sqlx` if a statement fails.
///
/// # Note
/// Migrations are idempotent - safe to run multiple times.
#[tracing::instrument(skip(pool))]
pub async fn run_migrations(pool: &SqlitePool) -> Result<(), DbError> {
	for (name, sql) in MIGRATIONS {
		for stmt in sql.split(';').filter(|s| !is_blank(s)) {
			sqlx::query(stmt).execute(pool).await?;
		}
		tracing::debug!(migration = name, "migration applied");
	}
	Ok(())
}

/// True for chunks holding only whitespace and `--` comments.
fn is_blank(stmt: &str) -> bool {
	stmt.lines()
		.map(str::trim)
		.all(|line| line.is_empty() || line.starts_with("--"))
}

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn comment_only_chunks_are_blank() {
		assert!(is_blank("\n  -- trailing note\n"));
		assert!(!is_blank("-- note\nCREATE TABLE t (id INTEGER)"));
	}

	#[tokio::test]
	async fn migrations_are_idempotent() {
		let pool = crate::testing::create_test_pool().await;
		run_migrations(&pool).await.unwrap();
		run_migrations(&pool).await.unwrap();

		let count: i64 = sqlx::query_scalar(
			"SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('permissions', 'permission_types')",
		)
		.fetch_one(&pool)
		.await
		.unwrap();
		assert_eq!(count, 2);
	}
}
