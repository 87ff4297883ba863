// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

use canopy_permissions_core::Permission;
use serde::Serialize;

use crate::error::{HierarchyError, Result};

/// Who is editing: ordinary callers may not restructure system permissions.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EditScope {
	#[default]
	Regular,
	Administrative,
}

impl EditScope {
	/// Gate a structural edit (move, delete, deactivation) of `permission`.
	pub fn check_structural(self, permission: &Permission) -> Result<()> {
		if self == EditScope::Regular && permission.is_system_permission {
			return Err(HierarchyError::SystemProtected(permission.id));
		}
		Ok(())
	}
}
