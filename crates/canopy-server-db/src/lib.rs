// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! # canopy-server-db
//!
//! Persistence layer for the Canopy permission hierarchy using SQLite via sqlx.
//!
//! ## Repository Pattern
//!
//! - **[`PermissionStore`] trait**: pool-level reads plus [`PermissionStore::begin`]
//! - **[`PermissionTx`] trait**: reads and writes inside one transaction
//! - **[`PermissionRepository`] struct**: concrete implementation holding a `SqlitePool`
//!
//! Inherent methods carry the `#[tracing::instrument]` spans; the trait impls
//! delegate to them.
//!
//! ## Error Handling
//!
//! | Variant | When to use |
//! |---------|-------------|
//! | `NotFound` | Update of a row that no longer exists |
//! | `Conflict` | Unique constraint violation (duplicate name within a type) |
//! | `Sqlx` | Unexpected database errors, propagated via `?` |
//! | `Internal` | Invalid stored data (negative level, unparseable timestamp) |
//!
//! Lookups return `Result<Option<T>>`; deletes return `Result<bool>`.
//!
//! ## Testing
//!
//! The [`testing`] module (enabled for this crate's tests and by the `testing`
//! feature) builds single-connection in-memory pools with the schema applied.

mod error;
pub mod migrations;
pub mod permission;
pub mod pool;

#[cfg(any(test, feature = "testing"))]
pub mod testing;

pub use error::{DbError, Result};
pub use migrations::run_migrations;
pub use permission::{PermissionRepository, PermissionStore, PermissionTx, SqlitePermissionTx};
pub use pool::create_pool;
