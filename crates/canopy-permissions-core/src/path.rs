// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Level and materialized-path placement.
//!
//! Every mutation re-derives placement with the same parent-relative rule:
//!
//! - root: `level = 0`, `path = "<id>"`
//! - child: `level = parent.level + 1`, `path = parent.path + "/" + "<id>"`

use crate::types::{Permission, PermissionId};

pub const PATH_DELIMITER: char = '/';

/// Derived level and path for one node.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Placement {
	pub level: u32,
	pub hierarchy_path: String,
}

/// Compute the placement of `id` under `parent` (or as a root).
pub fn placement_under(id: PermissionId, parent: Option<&Permission>) -> Placement {
	match parent {
		None => Placement {
			level: 0,
			hierarchy_path: id.to_string(),
		},
		Some(parent) => Placement {
			level: parent.level + 1,
			hierarchy_path: format!("{}{}{}", parent.hierarchy_path, PATH_DELIMITER, id),
		},
	}
}

/// Join ids root-first into a hierarchy path.
pub fn encode_path(ids: &[PermissionId]) -> String {
	ids.iter()
		.map(|id| id.to_string())
		.collect::<Vec<_>>()
		.join(&PATH_DELIMITER.to_string())
}

/// Split a hierarchy path into ids. `None` on an empty or malformed segment.
pub fn parse_path(path: &str) -> Option<Vec<PermissionId>> {
	if path.is_empty() {
		return None;
	}
	path.split(PATH_DELIMITER)
		.map(|segment| segment.parse::<PermissionId>().ok())
		.collect()
}

impl Permission {
	/// Apply a placement, returning true if anything changed.
	pub fn apply_placement(&mut self, placement: Placement) -> bool {
		if self.level == placement.level && self.hierarchy_path == placement.hierarchy_path {
			return false;
		}
		self.level = placement.level;
		self.hierarchy_path = placement.hierarchy_path;
		true
	}

	/// Returns true if the stored placement matches `placement`.
	pub fn has_placement(&self, placement: &Placement) -> bool {
		self.level == placement.level && self.hierarchy_path == placement.hierarchy_path
	}
}
