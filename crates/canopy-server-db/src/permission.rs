// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Permission repository for database operations.
//!
//! This module provides database access for the permission hierarchy:
//! - Permission type CRUD
//! - Permission point lookups, lookups by parent and by type
//! - Transactional insert/update/delete through [`PermissionTx`]
//!
//! Reads outside a transaction go straight to the pool. Every mutation runs
//! inside a [`PermissionTx`] obtained from [`PermissionStore::begin`]; dropping
//! the transaction without calling [`PermissionTx::commit`] rolls it back.
//! Transactions take the database write lock when they begin, so writers from
//! other connections queue behind each other.

use async_trait::async_trait;
use canopy_permissions_core::{
	NewPermission, NewPermissionType, Permission, PermissionId, PermissionType, PermissionTypeId,
};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{Sqlite, SqlitePool, SqliteRow};
use sqlx::{Executor, Row, Transaction};

use crate::error::{DbError, Result};

macro_rules! select_permissions {
	($tail:literal) => {
		concat!(
			"SELECT id, permission_type_id, parent_permission_id, name, description, level, ",
			"hierarchy_path, sort_order, can_have_children, is_active, is_system_permission, ",
			"created_at, updated_at FROM permissions ",
			$tail
		)
	};
}

macro_rules! select_permission_types {
	($tail:literal) => {
		concat!(
			"SELECT id, name, description, icon, color, sort_order FROM permission_types ",
			$tail
		)
	};
}

#[async_trait]
pub trait PermissionStore: Send + Sync {
	async fn begin(&self) -> Result<Box<dyn PermissionTx>>;
	async fn get_permission_by_id(&self, id: PermissionId) -> Result<Option<Permission>>;
	async fn list_permissions_by_parent(&self, parent_id: PermissionId) -> Result<Vec<Permission>>;
	async fn list_root_permissions(
		&self,
		permission_type_id: PermissionTypeId,
	) -> Result<Vec<Permission>>;
	async fn list_permissions_by_type(
		&self,
		permission_type_id: PermissionTypeId,
	) -> Result<Vec<Permission>>;
	async fn list_permissions(&self) -> Result<Vec<Permission>>;
	async fn get_permission_type_by_id(&self, id: PermissionTypeId)
		-> Result<Option<PermissionType>>;
	async fn list_permission_types(&self) -> Result<Vec<PermissionType>>;
}

/// One open store transaction.
#[async_trait]
pub trait PermissionTx: Send {
	async fn get_permission_by_id(&mut self, id: PermissionId) -> Result<Option<Permission>>;
	async fn list_permissions_by_parent(
		&mut self,
		parent_id: PermissionId,
	) -> Result<Vec<Permission>>;
	async fn list_permissions_by_type(
		&mut self,
		permission_type_id: PermissionTypeId,
	) -> Result<Vec<Permission>>;
	async fn list_permissions(&mut self) -> Result<Vec<Permission>>;
	async fn get_permission_type_by_id(
		&mut self,
		id: PermissionTypeId,
	) -> Result<Option<PermissionType>>;
	async fn list_permission_types(&mut self) -> Result<Vec<PermissionType>>;

	/// Insert with a placeholder placement (level 0, empty path).
	///
	/// The id is only known after this call, so the caller derives the real
	/// placement afterwards and writes it back with [`Self::update_permission`].
	async fn create_permission(&mut self, new: &NewPermission, sort_order: i32)
		-> Result<Permission>;
	async fn update_permission(&mut self, permission: &Permission) -> Result<()>;
	async fn delete_permission(&mut self, id: PermissionId) -> Result<bool>;
	async fn create_permission_type(&mut self, new: &NewPermissionType) -> Result<PermissionType>;

	async fn commit(self: Box<Self>) -> Result<()>;
}

/// Repository for permission database operations.
///
/// Ids are SQLite integer keys; timestamps are stored as RFC 3339 text.
#[derive(Clone)]
pub struct PermissionRepository {
	pool: SqlitePool,
}

impl PermissionRepository {
	/// Create a new repository with the given pool.
	///
	/// # Arguments
	/// * `pool` - SQLite connection pool
	pub fn new(pool: SqlitePool) -> Self {
		Self { pool }
	}

	pub fn pool(&self) -> &SqlitePool {
		&self.pool
	}

	/// Begin a new write transaction.
	///
	/// Takes the write lock up front (`BEGIN IMMEDIATE`). Under WAL a deferred
	/// transaction that upgrades from read to write fails with `SQLITE_BUSY`
	/// immediately instead of waiting on the busy timeout.
	#[tracing::instrument(skip(self))]
	pub async fn begin(&self) -> Result<SqlitePermissionTx> {
		let tx = self.pool.begin_with("BEGIN IMMEDIATE").await?;
		tracing::debug!("permission transaction started");
		Ok(SqlitePermissionTx { tx })
	}

	/// Get a permission by ID.
	///
	/// # Returns
	/// `None` if no permission exists with this ID.
	#[tracing::instrument(skip(self), fields(permission_id = %id))]
	pub async fn get_permission_by_id(&self, id: PermissionId) -> Result<Option<Permission>> {
		fetch_permission(&self.pool, id).await
	}

	/// Direct children of a permission in sibling order.
	#[tracing::instrument(skip(self), fields(parent_id = %parent_id))]
	pub async fn list_permissions_by_parent(
		&self,
		parent_id: PermissionId,
	) -> Result<Vec<Permission>> {
		fetch_children(&self.pool, parent_id).await
	}

	/// Roots of one permission type in sibling order.
	#[tracing::instrument(skip(self), fields(permission_type_id = %permission_type_id))]
	pub async fn list_root_permissions(
		&self,
		permission_type_id: PermissionTypeId,
	) -> Result<Vec<Permission>> {
		let rows = sqlx::query(select_permissions!(
			"WHERE parent_permission_id IS NULL AND permission_type_id = ? ORDER BY sort_order, name, id"
		))
		.bind(permission_type_id.get())
		.fetch_all(&self.pool)
		.await?;

		rows.iter().map(row_to_permission).collect()
	}

	/// Every permission of one type, shallowest first.
	#[tracing::instrument(skip(self), fields(permission_type_id = %permission_type_id))]
	pub async fn list_permissions_by_type(
		&self,
		permission_type_id: PermissionTypeId,
	) -> Result<Vec<Permission>> {
		fetch_by_type(&self.pool, permission_type_id).await
	}

	/// Every permission, grouped by type and shallowest first.
	#[tracing::instrument(skip(self))]
	pub async fn list_permissions(&self) -> Result<Vec<Permission>> {
		fetch_all(&self.pool).await
	}

	#[tracing::instrument(skip(self), fields(permission_type_id = %id))]
	pub async fn get_permission_type_by_id(
		&self,
		id: PermissionTypeId,
	) -> Result<Option<PermissionType>> {
		fetch_permission_type(&self.pool, id).await
	}

	#[tracing::instrument(skip(self))]
	pub async fn list_permission_types(&self) -> Result<Vec<PermissionType>> {
		fetch_permission_types(&self.pool).await
	}
}

#[async_trait]
impl PermissionStore for PermissionRepository {
	async fn begin(&self) -> Result<Box<dyn PermissionTx>> {
		Ok(Box::new(PermissionRepository::begin(self).await?))
	}

	async fn get_permission_by_id(&self, id: PermissionId) -> Result<Option<Permission>> {
		PermissionRepository::get_permission_by_id(self, id).await
	}

	async fn list_permissions_by_parent(&self, parent_id: PermissionId) -> Result<Vec<Permission>> {
		PermissionRepository::list_permissions_by_parent(self, parent_id).await
	}

	async fn list_root_permissions(
		&self,
		permission_type_id: PermissionTypeId,
	) -> Result<Vec<Permission>> {
		PermissionRepository::list_root_permissions(self, permission_type_id).await
	}

	async fn list_permissions_by_type(
		&self,
		permission_type_id: PermissionTypeId,
	) -> Result<Vec<Permission>> {
		PermissionRepository::list_permissions_by_type(self, permission_type_id).await
	}

	async fn list_permissions(&self) -> Result<Vec<Permission>> {
		PermissionRepository::list_permissions(self).await
	}

	async fn get_permission_type_by_id(
		&self,
		id: PermissionTypeId,
	) -> Result<Option<PermissionType>> {
		PermissionRepository::get_permission_type_by_id(self, id).await
	}

	async fn list_permission_types(&self) -> Result<Vec<PermissionType>> {
		PermissionRepository::list_permission_types(self).await
	}
}

/// A [`PermissionTx`] over a SQLite transaction.
pub struct SqlitePermissionTx {
	tx: Transaction<'static, Sqlite>,
}

impl SqlitePermissionTx {
	/// Insert a permission with a placeholder placement.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if the name is already used within the type.
	#[tracing::instrument(skip(self, new), fields(permission_type_id = %new.permission_type_id, name = %new.name))]
	pub async fn create_permission(
		&mut self,
		new: &NewPermission,
		sort_order: i32,
	) -> Result<Permission> {
		let now = Utc::now();
		let result = sqlx::query(
			r#"
			INSERT INTO permissions (
				permission_type_id, parent_permission_id, name, description, level, hierarchy_path,
				sort_order, can_have_children, is_active, is_system_permission, created_at, updated_at
			)
			VALUES (?, ?, ?, ?, 0, '', ?, ?, ?, ?, ?, ?)
			"#,
		)
		.bind(new.permission_type_id.get())
		.bind(new.parent_permission_id.map(PermissionId::get))
		.bind(&new.name)
		.bind(&new.description)
		.bind(sort_order)
		.bind(new.can_have_children as i32)
		.bind(new.is_active as i32)
		.bind(new.is_system_permission as i32)
		.bind(now.to_rfc3339())
		.bind(now.to_rfc3339())
		.execute(&mut *self.tx)
		.await
		.map_err(|e| {
			DbError::from_write(e, || format!("Permission name already exists: {}", new.name))
		})?;

		let id = PermissionId::new(result.last_insert_rowid());
		tracing::debug!(permission_id = %id, "permission inserted");

		Ok(Permission {
			id,
			permission_type_id: new.permission_type_id,
			parent_permission_id: new.parent_permission_id,
			name: new.name.clone(),
			description: new.description.clone(),
			level: 0,
			hierarchy_path: String::new(),
			sort_order,
			can_have_children: new.can_have_children,
			is_active: new.is_active,
			is_system_permission: new.is_system_permission,
			created_at: now,
			updated_at: now,
		})
	}

	/// Write back every mutable column of a permission.
	///
	/// # Errors
	/// Returns `DbError::NotFound` if the permission no longer exists.
	#[tracing::instrument(skip(self, permission), fields(permission_id = %permission.id))]
	pub async fn update_permission(&mut self, permission: &Permission) -> Result<()> {
		let result = sqlx::query(
			r#"
			UPDATE permissions
			SET parent_permission_id = ?, name = ?, description = ?, level = ?, hierarchy_path = ?,
				sort_order = ?, can_have_children = ?, is_active = ?, is_system_permission = ?,
				updated_at = ?
			WHERE id = ?
			"#,
		)
		.bind(permission.parent_permission_id.map(PermissionId::get))
		.bind(&permission.name)
		.bind(&permission.description)
		.bind(i64::from(permission.level))
		.bind(&permission.hierarchy_path)
		.bind(permission.sort_order)
		.bind(permission.can_have_children as i32)
		.bind(permission.is_active as i32)
		.bind(permission.is_system_permission as i32)
		.bind(permission.updated_at.to_rfc3339())
		.bind(permission.id.get())
		.execute(&mut *self.tx)
		.await
		.map_err(|e| {
			DbError::from_write(e, || {
				format!("Permission name already exists: {}", permission.name)
			})
		})?;

		if result.rows_affected() == 0 {
			return Err(DbError::NotFound(format!("Permission {}", permission.id)));
		}

		tracing::debug!(permission_id = %permission.id, "permission updated");
		Ok(())
	}

	/// Delete a single row. Children are left in place.
	///
	/// # Returns
	/// `true` if a row was deleted.
	#[tracing::instrument(skip(self), fields(permission_id = %id))]
	pub async fn delete_permission(&mut self, id: PermissionId) -> Result<bool> {
		let result = sqlx::query("DELETE FROM permissions WHERE id = ?")
			.bind(id.get())
			.execute(&mut *self.tx)
			.await?;

		let deleted = result.rows_affected() > 0;
		tracing::debug!(permission_id = %id, deleted, "permission delete");
		Ok(deleted)
	}

	/// Create a permission type.
	///
	/// # Errors
	/// Returns `DbError::Conflict` if a type with the same name exists.
	#[tracing::instrument(skip(self, new), fields(name = %new.name))]
	pub async fn create_permission_type(
		&mut self,
		new: &NewPermissionType,
	) -> Result<PermissionType> {
		let result = sqlx::query(
			r#"
			INSERT INTO permission_types (name, description, icon, color, sort_order)
			VALUES (?, ?, ?, ?, ?)
			"#,
		)
		.bind(&new.name)
		.bind(&new.description)
		.bind(&new.icon)
		.bind(&new.color)
		.bind(new.sort_order)
		.execute(&mut *self.tx)
		.await
		.map_err(|e| {
			DbError::from_write(e, || format!("Permission type already exists: {}", new.name))
		})?;

		let id = PermissionTypeId::new(result.last_insert_rowid());
		tracing::debug!(permission_type_id = %id, "permission type created");

		Ok(PermissionType {
			id,
			name: new.name.clone(),
			description: new.description.clone(),
			icon: new.icon.clone(),
			color: new.color.clone(),
			sort_order: new.sort_order,
		})
	}
}

#[async_trait]
impl PermissionTx for SqlitePermissionTx {
	async fn get_permission_by_id(&mut self, id: PermissionId) -> Result<Option<Permission>> {
		fetch_permission(&mut *self.tx, id).await
	}

	async fn list_permissions_by_parent(
		&mut self,
		parent_id: PermissionId,
	) -> Result<Vec<Permission>> {
		fetch_children(&mut *self.tx, parent_id).await
	}

	async fn list_permissions_by_type(
		&mut self,
		permission_type_id: PermissionTypeId,
	) -> Result<Vec<Permission>> {
		fetch_by_type(&mut *self.tx, permission_type_id).await
	}

	async fn list_permissions(&mut self) -> Result<Vec<Permission>> {
		fetch_all(&mut *self.tx).await
	}

	async fn get_permission_type_by_id(
		&mut self,
		id: PermissionTypeId,
	) -> Result<Option<PermissionType>> {
		fetch_permission_type(&mut *self.tx, id).await
	}

	async fn list_permission_types(&mut self) -> Result<Vec<PermissionType>> {
		fetch_permission_types(&mut *self.tx).await
	}

	async fn create_permission(
		&mut self,
		new: &NewPermission,
		sort_order: i32,
	) -> Result<Permission> {
		SqlitePermissionTx::create_permission(self, new, sort_order).await
	}

	async fn update_permission(&mut self, permission: &Permission) -> Result<()> {
		SqlitePermissionTx::update_permission(self, permission).await
	}

	async fn delete_permission(&mut self, id: PermissionId) -> Result<bool> {
		SqlitePermissionTx::delete_permission(self, id).await
	}

	async fn create_permission_type(&mut self, new: &NewPermissionType) -> Result<PermissionType> {
		SqlitePermissionTx::create_permission_type(self, new).await
	}

	async fn commit(self: Box<Self>) -> Result<()> {
		self.tx.commit().await?;
		tracing::debug!("permission transaction committed");
		Ok(())
	}
}

// =============================================================================
// Queries shared by the pool and transaction paths
// =============================================================================

async fn fetch_permission<'e, E>(executor: E, id: PermissionId) -> Result<Option<Permission>>
where
	E: Executor<'e, Database = Sqlite>,
{
	let row = sqlx::query(select_permissions!("WHERE id = ?"))
		.bind(id.get())
		.fetch_optional(executor)
		.await?;

	row.as_ref().map(row_to_permission).transpose()
}

async fn fetch_children<'e, E>(executor: E, parent_id: PermissionId) -> Result<Vec<Permission>>
where
	E: Executor<'e, Database = Sqlite>,
{
	let rows = sqlx::query(select_permissions!(
		"WHERE parent_permission_id = ? ORDER BY sort_order, name, id"
	))
	.bind(parent_id.get())
	.fetch_all(executor)
	.await?;

	rows.iter().map(row_to_permission).collect()
}

async fn fetch_by_type<'e, E>(
	executor: E,
	permission_type_id: PermissionTypeId,
) -> Result<Vec<Permission>>
where
	E: Executor<'e, Database = Sqlite>,
{
	let rows = sqlx::query(select_permissions!(
		"WHERE permission_type_id = ? ORDER BY level, sort_order, name, id"
	))
	.bind(permission_type_id.get())
	.fetch_all(executor)
	.await?;

	rows.iter().map(row_to_permission).collect()
}

async fn fetch_all<'e, E>(executor: E) -> Result<Vec<Permission>>
where
	E: Executor<'e, Database = Sqlite>,
{
	let rows = sqlx::query(select_permissions!(
		"ORDER BY permission_type_id, level, sort_order, name, id"
	))
	.fetch_all(executor)
	.await?;

	rows.iter().map(row_to_permission).collect()
}

async fn fetch_permission_type<'e, E>(
	executor: E,
	id: PermissionTypeId,
) -> Result<Option<PermissionType>>
where
	E: Executor<'e, Database = Sqlite>,
{
	let row = sqlx::query(select_permission_types!("WHERE id = ?"))
		.bind(id.get())
		.fetch_optional(executor)
		.await?;

	Ok(row.as_ref().map(row_to_permission_type))
}

async fn fetch_permission_types<'e, E>(executor: E) -> Result<Vec<PermissionType>>
where
	E: Executor<'e, Database = Sqlite>,
{
	let rows = sqlx::query(select_permission_types!("ORDER BY sort_order, name, id"))
		.fetch_all(executor)
		.await?;

	Ok(rows.iter().map(row_to_permission_type).collect())
}

fn row_to_permission(row: &SqliteRow) -> Result<Permission> {
	let level: i64 = row.get("level");
	let can_have_children: i32 = row.get("can_have_children");
	let is_active: i32 = row.get("is_active");
	let is_system_permission: i32 = row.get("is_system_permission");
	let parent: Option<i64> = row.get("parent_permission_id");
	let created_at: String = row.get("created_at");
	let updated_at: String = row.get("updated_at");

	Ok(Permission {
		id: PermissionId::new(row.get("id")),
		permission_type_id: PermissionTypeId::new(row.get("permission_type_id")),
		parent_permission_id: parent.map(PermissionId::new),
		name: row.get("name"),
		description: row.get("description"),
		level: u32::try_from(level)
			.map_err(|e| DbError::Internal(format!("Invalid level {level}: {e}")))?,
		hierarchy_path: row.get("hierarchy_path"),
		sort_order: row.get("sort_order"),
		can_have_children: can_have_children != 0,
		is_active: is_active != 0,
		is_system_permission: is_system_permission != 0,
		created_at: parse_timestamp(&created_at, "created_at")?,
		updated_at: parse_timestamp(&updated_at, "updated_at")?,
	})
}

fn row_to_permission_type(row: &SqliteRow) -> PermissionType {
	PermissionType {
		id: PermissionTypeId::new(row.get("id")),
		name: row.get("name"),
		description: row.get("description"),
		icon: row.get("icon"),
		color: row.get("color"),
		sort_order: row.get("sort_order"),
	}
}

fn parse_timestamp(value: &str, column: &str) -> Result<DateTime<Utc>> {
	chrono::DateTime::parse_from_rfc3339(value)
		.map(|d| d.with_timezone(&Utc))
		.map_err(|e| DbError::Internal(format!("Invalid {column}: {e}")))
}
