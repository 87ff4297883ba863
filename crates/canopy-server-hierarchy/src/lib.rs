// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Transactional permission hierarchy engine.
//!
//! [`HierarchyService`] is the entry point. It combines the pure checks of
//! `canopy-permissions-core` with a [`canopy_server_db::PermissionStore`]:
//!
//! - **Queries**: roots, children, ancestors, descendants, display tree,
//!   depth and level projections
//! - **Mutations**: create, update, move, move up/down, reorder, delete
//! - **Bulk**: move, activate, deactivate and delete with per-id outcomes
//! - **Clone**: single permissions and whole subtrees
//! - **Maintenance**: full audit, path repair, JSON export
//!
//! Structural writes for one permission type are serialized by a per-type
//! lock and each runs in a single store transaction.
//!
//! # Usage
//!
//! ```ignore
//! let store = Arc::new(PermissionRepository::new(pool));
//! let service = HierarchyService::new(store, config.hierarchy.clone());
//! let moved = service.move_permission(id, None, 0).await?;
//! ```

pub mod bulk;
pub mod clone;
pub mod error;
pub mod locks;
pub mod maintenance;
pub mod mutator;
pub mod scope;
pub mod service;

pub use bulk::{BulkFailure, BulkOutcome};
pub use clone::CloneDestination;
pub use error::{ErrorKind, HierarchyError, Result};
pub use locks::TypeLocks;
pub use maintenance::RepairReport;
pub use scope::EditScope;
pub use service::HierarchyService;
