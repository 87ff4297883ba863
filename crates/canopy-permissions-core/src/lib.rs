// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Core model and pure algorithms for the Canopy permission hierarchy.
//!
//! This crate provides:
//! - [`Permission`] and [`PermissionType`] records with type-safe ids
//! - The level/path placement rule ([`placement_under`])
//! - [`PermissionArena`] - a flat, id-indexed view of a set of permissions with
//!   children/ancestor/descendant lookups derived on demand
//! - Structural validation ([`can_reparent`], [`would_create_cycle`])
//! - The full-table integrity auditor ([`full_audit`])
//! - Nested tree materialization for presentation ([`build_tree`])
//!
//! Nothing in this crate performs I/O. Persistence lives in `canopy-server-db`
//! and transactional mutation in `canopy-server-hierarchy`.

pub mod arena;
pub mod audit;
pub mod error;
pub mod path;
pub mod tree;
pub mod types;
pub mod validation;

#[cfg(test)]
mod test_support;

pub use arena::PermissionArena;
pub use audit::{full_audit, AuditReport, IntegrityIssue, DEFAULT_AUDIT_MAX_DEPTH};
pub use error::HierarchyViolation;
pub use path::{encode_path, parse_path, placement_under, Placement, PATH_DELIMITER};
pub use tree::{build_tree, NodeDisplay, TreeNode, TreeNodeKind};
pub use types::{
	NewPermission, NewPermissionType, Permission, PermissionChanges, PermissionId, PermissionType,
	PermissionTypeId,
};
pub use validation::{
	can_reparent, check_can_delete, check_new_parent, check_unique_name, normalize_name,
	would_create_cycle, ReparentDecision,
};
