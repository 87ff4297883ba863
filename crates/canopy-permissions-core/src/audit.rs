// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Full-table integrity audit.
//!
//! The audit is advisory: it reports problems that may already exist in the
//! stored data (orphans, stale level/path, cycles, type or leaf violations)
//! and never mutates anything. Repair is a separate, explicit operation.
//!
//! Cycle detection walks the parent-pointer graph with a three-color scheme.
//! Each node has at most one outgoing edge (its parent), so the walk from a
//! node is a single chain kept on an explicit stack. Reaching a node that is
//! still in progress closes a cycle; the chain length is bounded by the
//! configured maximum depth so corrupt input always terminates.

use std::collections::{HashMap, HashSet};

use serde::Serialize;
use tracing::warn;

use crate::arena::PermissionArena;
use crate::path::encode_path;
use crate::types::{PermissionId, PermissionTypeId};

/// Chains longer than this are reported as suspected cycles.
pub const DEFAULT_AUDIT_MAX_DEPTH: usize = 20;

/// One integrity problem found by [`full_audit`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IntegrityIssue {
	/// The parent id refers to a permission that does not exist.
	Orphan {
		id: PermissionId,
		missing_parent_id: PermissionId,
	},
	/// Stored level/path disagree with the live parent chain.
	StalePlacement {
		id: PermissionId,
		stored_level: u32,
		expected_level: u32,
		stored_path: String,
		expected_path: String,
	},
	/// The parent chain loops back on itself. Members are in walk order.
	Cycle { members: Vec<PermissionId> },
	/// The parent chain starting at `id` exceeded the depth limit.
	ExcessiveDepth { id: PermissionId, depth_limit: usize },
	/// A child's type differs from its parent's.
	TypeMismatch {
		id: PermissionId,
		permission_type_id: PermissionTypeId,
		parent_id: PermissionId,
		parent_type_id: PermissionTypeId,
	},
	/// A child sits under a permission that may not have children.
	ChildOfLeaf {
		id: PermissionId,
		parent_id: PermissionId,
	},
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct AuditReport {
	pub examined: usize,
	pub issues: Vec<IntegrityIssue>,
}

impl AuditReport {
	pub fn is_healthy(&self) -> bool {
		self.issues.is_empty()
	}

	pub fn orphans(&self) -> Vec<PermissionId> {
		self.issues
			.iter()
			.filter_map(|i| match i {
				IntegrityIssue::Orphan { id, .. } => Some(*id),
				_ => None,
			})
			.collect()
	}

	pub fn cycles(&self) -> Vec<&[PermissionId]> {
		self.issues
			.iter()
			.filter_map(|i| match i {
				IntegrityIssue::Cycle { members } => Some(members.as_slice()),
				_ => None,
			})
			.collect()
	}

	pub fn stale_placements(&self) -> Vec<PermissionId> {
		self.issues
			.iter()
			.filter_map(|i| match i {
				IntegrityIssue::StalePlacement { id, .. } => Some(*id),
				_ => None,
			})
			.collect()
	}

	pub fn depth_warnings(&self) -> Vec<PermissionId> {
		self.issues
			.iter()
			.filter_map(|i| match i {
				IntegrityIssue::ExcessiveDepth { id, .. } => Some(*id),
				_ => None,
			})
			.collect()
	}
}

#[derive(Clone, Copy, PartialEq, Eq)]
enum Color {
	InProgress,
	Done,
}

/// Audit every permission in `arena`.
///
/// `max_depth` bounds every parent-chain walk (values below 1 are treated as 1).
pub fn full_audit(arena: &PermissionArena, max_depth: usize) -> AuditReport {
	let max_depth = max_depth.max(1);
	let ids = arena.ids();
	let mut issues = Vec::new();

	for id in &ids {
		let Some(node) = arena.get(*id) else { continue };
		let Some(parent_id) = node.parent_permission_id else {
			continue;
		};
		match arena.get(parent_id) {
			None => issues.push(IntegrityIssue::Orphan {
				id: *id,
				missing_parent_id: parent_id,
			}),
			Some(parent) => {
				if parent.permission_type_id != node.permission_type_id {
					issues.push(IntegrityIssue::TypeMismatch {
						id: *id,
						permission_type_id: node.permission_type_id,
						parent_id,
						parent_type_id: parent.permission_type_id,
					});
				}
				if !parent.can_have_children {
					issues.push(IntegrityIssue::ChildOfLeaf {
						id: *id,
						parent_id,
					});
				}
			}
		}
	}

	let (cyclic, mut too_deep) = detect_cycles(arena, &ids, max_depth, &mut issues);

	for id in &ids {
		if cyclic.contains(id) || too_deep.contains(id) {
			continue;
		}
		let Some(node) = arena.get(*id) else { continue };
		let chain = match live_chain(arena, *id, max_depth) {
			Chain::Complete(chain) => chain,
			Chain::Broken => continue,
			Chain::TooDeep => {
				too_deep.insert(*id);
				issues.push(IntegrityIssue::ExcessiveDepth {
					id: *id,
					depth_limit: max_depth,
				});
				continue;
			}
		};
		let expected_level = (chain.len() - 1) as u32;
		let expected_path = encode_path(&chain);
		if node.level != expected_level || node.hierarchy_path != expected_path {
			issues.push(IntegrityIssue::StalePlacement {
				id: *id,
				stored_level: node.level,
				expected_level,
				stored_path: node.hierarchy_path.clone(),
				expected_path,
			});
		}
	}

	if !issues.is_empty() {
		warn!(
			examined = ids.len(),
			issues = issues.len(),
			"permission hierarchy audit found integrity issues"
		);
	}

	AuditReport {
		examined: ids.len(),
		issues,
	}
}

/// Three-color walk over parent pointers. Returns the ids that sit on a
/// detected cycle and the ids whose walk hit the depth limit.
fn detect_cycles(
	arena: &PermissionArena,
	ids: &[PermissionId],
	max_depth: usize,
	issues: &mut Vec<IntegrityIssue>,
) -> (HashSet<PermissionId>, HashSet<PermissionId>) {
	let mut color: HashMap<PermissionId, Color> = HashMap::with_capacity(ids.len());
	let mut cyclic = HashSet::new();
	let mut too_deep = HashSet::new();

	for start in ids {
		if color.contains_key(start) {
			continue;
		}

		let mut stack: Vec<PermissionId> = Vec::new();
		let mut current = Some(*start);

		while let Some(id) = current {
			let Some(node) = arena.get(id) else { break };
			match color.get(&id) {
				Some(Color::Done) => break,
				Some(Color::InProgress) => {
					let from = stack.iter().position(|s| *s == id).unwrap_or(0);
					let members = stack[from..].to_vec();
					warn!(?members, "cycle detected in permission hierarchy");
					cyclic.extend(members.iter().copied());
					issues.push(IntegrityIssue::Cycle { members });
					break;
				}
				None => {
					if stack.len() >= max_depth {
						warn!(id = %start, depth_limit = max_depth, "excessive permission depth, suspected cycle");
						too_deep.insert(*start);
						issues.push(IntegrityIssue::ExcessiveDepth {
							id: *start,
							depth_limit: max_depth,
						});
						break;
					}
					color.insert(id, Color::InProgress);
					stack.push(id);
					current = node.parent_permission_id;
				}
			}
		}

		for id in stack {
			color.insert(id, Color::Done);
		}
	}

	(cyclic, too_deep)
}

enum Chain {
	Complete(Vec<PermissionId>),
	/// Missing parent or repeated id.
	Broken,
	TooDeep,
}

/// The live ancestor chain of `id`, root first and ending with `id`.
fn live_chain(arena: &PermissionArena, id: PermissionId, max_depth: usize) -> Chain {
	let mut chain = vec![id];
	let mut seen = HashSet::from([id]);
	let mut current = arena.get(id).and_then(|p| p.parent_permission_id);
	while let Some(parent_id) = current {
		if !seen.insert(parent_id) {
			return Chain::Broken;
		}
		if chain.len() >= max_depth {
			return Chain::TooDeep;
		}
		let Some(parent) = arena.get(parent_id) else {
			return Chain::Broken;
		};
		chain.push(parent_id);
		current = parent.parent_permission_id;
	}
	chain.reverse();
	Chain::Complete(chain)
}
