// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Error types for hierarchy operations.

use canopy_permissions_core::{HierarchyViolation, PermissionId, PermissionTypeId};
use canopy_server_db::DbError;
use serde::Serialize;

/// Caller-facing classification of a [`HierarchyError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
	/// The request would break an invariant.
	Validation,
	/// A referenced permission or type does not exist.
	NotFound,
	/// A system permission was edited outside administrative scope, or a
	/// concurrent writer won a unique constraint.
	Conflict,
	/// Store unavailable, transaction aborted or stored data unreadable.
	Fatal,
}

#[derive(Debug, thiserror::Error)]
pub enum HierarchyError {
	#[error("Invalid hierarchy change: {0}")]
	Validation(#[from] HierarchyViolation),

	#[error("Permission not found: {0}")]
	PermissionNotFound(PermissionId),

	#[error("Permission type not found: {0}")]
	PermissionTypeNotFound(PermissionTypeId),

	#[error("Permission {0} is a system permission; administrative scope is required")]
	SystemProtected(PermissionId),

	#[error("Batch of {requested} permissions exceeds the limit of {limit}")]
	BatchTooLarge { requested: usize, limit: usize },

	#[error("Serialization error: {0}")]
	Serialization(#[from] serde_json::Error),

	#[error(transparent)]
	Db(#[from] DbError),
}

impl HierarchyError {
	pub fn kind(&self) -> ErrorKind {
		match self {
			HierarchyError::Validation(_) | HierarchyError::BatchTooLarge { .. } => {
				ErrorKind::Validation
			}
			HierarchyError::PermissionNotFound(_)
			| HierarchyError::PermissionTypeNotFound(_)
			| HierarchyError::Db(DbError::NotFound(_)) => ErrorKind::NotFound,
			HierarchyError::SystemProtected(_) | HierarchyError::Db(DbError::Conflict(_)) => {
				ErrorKind::Conflict
			}
			HierarchyError::Serialization(_) | HierarchyError::Db(_) => ErrorKind::Fatal,
		}
	}

	/// Fatal errors abort a whole batch; everything else is recorded per id.
	pub fn is_fatal(&self) -> bool {
		self.kind() == ErrorKind::Fatal
	}
}

pub type Result<T> = std::result::Result<T, HierarchyError>;

#[cfg(test)]
mod tests {
	use super::*;

	#[test]
	fn kinds_follow_taxonomy() {
		let id = PermissionId::new(1);
		assert_eq!(
			HierarchyError::from(HierarchyViolation::SelfParent(id)).kind(),
			ErrorKind::Validation
		);
		assert_eq!(
			HierarchyError::PermissionNotFound(id).kind(),
			ErrorKind::NotFound
		);
		assert_eq!(
			HierarchyError::SystemProtected(id).kind(),
			ErrorKind::Conflict
		);
		assert_eq!(
			HierarchyError::from(DbError::Conflict("dup".to_string())).kind(),
			ErrorKind::Conflict
		);
		assert!(HierarchyError::from(DbError::Internal("bad row".to_string())).is_fatal());
	}

	#[test]
	fn validation_message_names_the_invariant() {
		let err = HierarchyError::from(HierarchyViolation::WouldCreateCycle {
			node: PermissionId::new(1),
			parent: PermissionId::new(3),
		});
		assert!(err.to_string().contains("cycle"));
	}
}
