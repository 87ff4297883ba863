// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Nested, read-only tree materialization for display.
//!
//! The top level groups permissions by type; under each type node hang the
//! type's roots, then their children, each level in sibling order (sort
//! order, then name). Display metadata is kept apart from the structural
//! record so presentation never feeds back into the model.

use std::collections::BTreeSet;

use serde::Serialize;

use crate::arena::PermissionArena;
use crate::types::{Permission, PermissionType, PermissionTypeId};

pub const TYPE_ICON: &str = "folder";
pub const BRANCH_ICON: &str = "folder-key";
pub const LEAF_ICON: &str = "key";
pub const SYSTEM_ICON: &str = "shield-lock";
pub const INACTIVE_COLOR: &str = "#9e9e9e";
pub const SYSTEM_COLOR: &str = "#c62828";

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeDisplay {
	pub label: String,
	pub icon: String,
	pub color: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum TreeNodeKind {
	PermissionType {
		id: PermissionTypeId,
	},
	Permission {
		permission: Permission,
		has_children: bool,
	},
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct TreeNode {
	#[serde(flatten)]
	pub kind: TreeNodeKind,
	pub display: NodeDisplay,
	pub children: Vec<TreeNode>,
}

impl TreeNode {
	/// The permission behind this node, if it is not a type group.
	pub fn permission(&self) -> Option<&Permission> {
		match &self.kind {
			TreeNodeKind::Permission { permission, .. } => Some(permission),
			TreeNodeKind::PermissionType { .. } => None,
		}
	}

	/// Number of permission nodes in this subtree, including this one.
	pub fn permission_count(&self) -> usize {
		let mut count = 0;
		let mut stack = vec![self];
		while let Some(node) = stack.pop() {
			count += usize::from(node.permission().is_some());
			stack.extend(node.children.iter());
		}
		count
	}
}

/// Build the display tree.
///
/// `types` supplies labels and colors; permissions whose type is missing from
/// `types` still appear under a synthesized "Type <id>" group. Nodes not
/// reachable from a root (orphans, cycle members) are omitted.
pub fn build_tree(
	types: &[PermissionType],
	arena: &PermissionArena,
	filter: Option<PermissionTypeId>,
) -> Vec<TreeNode> {
	let mut known: Vec<&PermissionType> = types
		.iter()
		.filter(|t| filter.map_or(true, |f| t.id == f))
		.collect();
	known.sort_by(|a, b| {
		a.sort_order
			.cmp(&b.sort_order)
			.then_with(|| a.name.cmp(&b.name))
			.then_with(|| a.id.cmp(&b.id))
	});

	let known_ids: BTreeSet<PermissionTypeId> = types.iter().map(|t| t.id).collect();
	let unknown: BTreeSet<PermissionTypeId> = arena
		.iter()
		.map(|p| p.permission_type_id)
		.filter(|t| !known_ids.contains(t))
		.filter(|t| filter.map_or(true, |f| *t == f))
		.collect();

	let mut out = Vec::with_capacity(known.len() + unknown.len());
	for permission_type in known {
		out.push(type_node(
			arena,
			permission_type.id,
			NodeDisplay {
				label: permission_type.name.clone(),
				icon: permission_type
					.icon
					.clone()
					.unwrap_or_else(|| TYPE_ICON.to_string()),
				color: permission_type.color.clone(),
			},
		));
	}
	for type_id in unknown {
		out.push(type_node(
			arena,
			type_id,
			NodeDisplay {
				label: format!("Type {type_id}"),
				icon: TYPE_ICON.to_string(),
				color: None,
			},
		));
	}
	out
}

fn type_node(arena: &PermissionArena, id: PermissionTypeId, display: NodeDisplay) -> TreeNode {
	let children = arena
		.roots(Some(id))
		.into_iter()
		.map(|root| permission_node(arena, root, display.color.as_deref()))
		.collect();
	TreeNode {
		kind: TreeNodeKind::PermissionType { id },
		display,
		children,
	}
}

/// A permission whose children are still being materialized.
struct Frame<'a> {
	permission: &'a Permission,
	pending: std::vec::IntoIter<&'a Permission>,
	children: Vec<TreeNode>,
}

impl<'a> Frame<'a> {
	fn open(arena: &'a PermissionArena, permission: &'a Permission) -> Self {
		Self {
			permission,
			pending: arena.children(permission.id).into_iter(),
			children: Vec::new(),
		}
	}

	fn close(self, type_color: Option<&str>) -> TreeNode {
		let has_children = !self.children.is_empty();
		TreeNode {
			display: display_for(self.permission, has_children, type_color),
			kind: TreeNodeKind::Permission {
				permission: self.permission.clone(),
				has_children,
			},
			children: self.children,
		}
	}
}

/// Depth-first build with an explicit stack of open frames, so chain depth
/// never touches the call stack.
fn permission_node(
	arena: &PermissionArena,
	root: &Permission,
	type_color: Option<&str>,
) -> TreeNode {
	let mut open: Vec<Frame<'_>> = Vec::new();
	let mut current = Frame::open(arena, root);
	loop {
		if let Some(child) = current.pending.next() {
			open.push(std::mem::replace(&mut current, Frame::open(arena, child)));
			continue;
		}
		let node = current.close(type_color);
		match open.pop() {
			Some(mut parent) => {
				parent.children.push(node);
				current = parent;
			}
			None => return node,
		}
	}
}

fn display_for(permission: &Permission, has_children: bool, type_color: Option<&str>) -> NodeDisplay {
	let icon = if permission.is_system_permission {
		SYSTEM_ICON
	} else if has_children || permission.can_have_children {
		BRANCH_ICON
	} else {
		LEAF_ICON
	};
	let color = if !permission.is_active {
		Some(INACTIVE_COLOR.to_string())
	} else if permission.is_system_permission {
		Some(SYSTEM_COLOR.to_string())
	} else {
		type_color.map(str::to_string)
	};
	NodeDisplay {
		label: permission.name.clone(),
		icon: icon.to_string(),
		color,
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use crate::test_support::{corrupt, tree};
	use crate::types::PermissionId;

	fn domain() -> PermissionType {
		PermissionType {
			id: PermissionTypeId::new(1),
			name: "Domain".to_string(),
			description: None,
			icon: Some("globe".to_string()),
			color: Some("#1565c0".to_string()),
			sort_order: 0,
		}
	}

	fn labels(nodes: &[TreeNode]) -> Vec<String> {
		nodes.iter().map(|n| n.display.label.clone()).collect()
	}

	#[test]
	fn groups_under_type_node() {
		let arena = tree(&[(1, None), (2, Some(1)), (3, Some(1)), (4, None)]);
		let nodes = build_tree(&[domain()], &arena, None);
		assert_eq!(nodes.len(), 1);
		let domain_node = &nodes[0];
		assert_eq!(domain_node.display.label, "Domain");
		assert_eq!(domain_node.display.icon, "globe");
		assert_eq!(labels(&domain_node.children), vec!["p1", "p4"]);
		assert_eq!(labels(&domain_node.children[0].children), vec!["p2", "p3"]);
		assert_eq!(domain_node.permission_count(), 4);
	}

	#[test]
	fn orphans_are_not_materialized() {
		let mut arena = tree(&[(1, None)]);
		arena.insert(corrupt(9, Some(404)));
		arena.insert(corrupt(5, Some(5)));
		let nodes = build_tree(&[domain()], &arena, None);
		assert_eq!(nodes[0].permission_count(), 1);
	}

	#[test]
	fn unknown_types_get_a_synthetic_group() {
		let mut arena = tree(&[(1, None)]);
		let mut other = corrupt(7, None);
		other.permission_type_id = PermissionTypeId::new(3);
		arena.insert(other);
		let nodes = build_tree(&[domain()], &arena, None);
		assert_eq!(labels(&nodes), vec!["Domain", "Type 3"]);

		let filtered = build_tree(&[domain()], &arena, Some(PermissionTypeId::new(3)));
		assert_eq!(labels(&filtered), vec!["Type 3"]);
	}

	#[test]
	fn display_reflects_state() {
		let mut arena = tree(&[(1, None), (2, Some(1))]);
		let mut two = arena.get(PermissionId::new(2)).unwrap().clone();
		two.is_active = false;
		two.can_have_children = false;
		arena.insert(two);
		let nodes = build_tree(&[domain()], &arena, None);
		let root = &nodes[0].children[0];
		assert_eq!(root.display.icon, BRANCH_ICON);
		assert_eq!(root.display.color.as_deref(), Some("#1565c0"));
		let child = &root.children[0];
		assert_eq!(child.display.icon, LEAF_ICON);
		assert_eq!(child.display.color.as_deref(), Some(INACTIVE_COLOR));
	}

	#[test]
	fn long_chains_keep_their_shape() {
		let links: Vec<(i64, Option<i64>)> = (1..=2_000)
			.map(|id| (id, (id > 1).then(|| id - 1)))
			.collect();
		let arena = tree(&links);
		let nodes = build_tree(&[domain()], &arena, None);
		assert_eq!(nodes[0].permission_count(), 2_000);

		let mut node = &nodes[0].children[0];
		let mut depth = 1;
		while let Some(next) = node.children.first() {
			assert_eq!(node.children.len(), 1);
			node = next;
			depth += 1;
		}
		assert_eq!(depth, 2_000);
		assert_eq!(node.display.label, "p2000");
		assert_eq!(node.display.icon, BRANCH_ICON);
	}

	#[test]
	fn serializes_with_kind_tag() {
		let arena = tree(&[(1, None)]);
		let nodes = build_tree(&[domain()], &arena, None);
		let json = serde_json::to_string(&nodes).unwrap();
		assert!(json.contains("\"kind\":\"permission_type\""));
		assert!(json.contains("\"kind\":\"permission\""));
	}
}
