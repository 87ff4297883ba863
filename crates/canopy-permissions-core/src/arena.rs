// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Flat, id-indexed view over a set of permissions.
//!
//! The arena stores each node once, keyed by id, with only the one-way parent
//! pointer on the record. Children, ancestor chains and descendant sets are
//! derived from a parent index on demand. Traversals use explicit stacks and
//! visited sets, so corrupt input (self-parents, cycles) terminates.

use std::collections::{HashMap, HashSet};

use crate::types::{Permission, PermissionId, PermissionTypeId};

#[derive(Debug, Clone, Default)]
pub struct PermissionArena {
	nodes: HashMap<PermissionId, Permission>,
	children: HashMap<PermissionId, Vec<PermissionId>>,
	roots: Vec<PermissionId>,
}

/// Sibling ordering used everywhere: sort order, then name, then id.
fn sibling_order(a: &&Permission, b: &&Permission) -> std::cmp::Ordering {
	a.sort_order
		.cmp(&b.sort_order)
		.then_with(|| a.name.cmp(&b.name))
		.then_with(|| a.id.cmp(&b.id))
}

impl PermissionArena {
	pub fn new() -> Self {
		Self::default()
	}

	pub fn from_permissions(permissions: impl IntoIterator<Item = Permission>) -> Self {
		let mut arena = Self::new();
		for permission in permissions {
			arena.insert(permission);
		}
		arena
	}

	pub fn len(&self) -> usize {
		self.nodes.len()
	}

	pub fn is_empty(&self) -> bool {
		self.nodes.is_empty()
	}

	pub fn contains(&self, id: PermissionId) -> bool {
		self.nodes.contains_key(&id)
	}

	pub fn get(&self, id: PermissionId) -> Option<&Permission> {
		self.nodes.get(&id)
	}

	pub fn iter(&self) -> impl Iterator<Item = &Permission> {
		self.nodes.values()
	}

	/// All ids in ascending order.
	pub fn ids(&self) -> Vec<PermissionId> {
		let mut ids: Vec<_> = self.nodes.keys().copied().collect();
		ids.sort();
		ids
	}

	// =========================================================================
	// Mutation
	// =========================================================================

	/// Insert or replace a node, keeping the parent index in sync.
	pub fn insert(&mut self, permission: Permission) -> Option<Permission> {
		let previous = self.remove(permission.id);
		match permission.parent_permission_id {
			Some(parent) => self.children.entry(parent).or_default().push(permission.id),
			None => self.roots.push(permission.id),
		}
		self.nodes.insert(permission.id, permission);
		previous
	}

	/// Remove a node. Its children stay in the arena and become orphans.
	pub fn remove(&mut self, id: PermissionId) -> Option<Permission> {
		let removed = self.nodes.remove(&id)?;
		match removed.parent_permission_id {
			Some(parent) => {
				if let Some(siblings) = self.children.get_mut(&parent) {
					siblings.retain(|s| *s != id);
				}
			}
			None => self.roots.retain(|r| *r != id),
		}
		Some(removed)
	}

	// =========================================================================
	// Lookups
	// =========================================================================

	/// Root permissions, optionally restricted to one type, in sibling order.
	pub fn roots(&self, permission_type_id: Option<PermissionTypeId>) -> Vec<&Permission> {
		let mut roots: Vec<&Permission> = self
			.roots
			.iter()
			.filter_map(|id| self.nodes.get(id))
			.filter(|p| permission_type_id.map_or(true, |t| p.permission_type_id == t))
			.collect();
		roots.sort_by(sibling_order);
		roots
	}

	/// Direct children of `id` in sibling order.
	pub fn children(&self, id: PermissionId) -> Vec<&Permission> {
		let mut children: Vec<&Permission> = self
			.children
			.get(&id)
			.into_iter()
			.flatten()
			.filter_map(|c| self.nodes.get(c))
			.collect();
		children.sort_by(sibling_order);
		children
	}

	pub fn has_children(&self, id: PermissionId) -> bool {
		self.children.get(&id).is_some_and(|c| !c.is_empty())
	}

	/// The full sibling set of `permission` (same parent; for roots, same type),
	/// including the permission itself, in sibling order.
	pub fn siblings(&self, permission: &Permission) -> Vec<&Permission> {
		match permission.parent_permission_id {
			Some(parent) => self.children(parent),
			None => self.roots(Some(permission.permission_type_id)),
		}
	}

	/// One past the highest sort order among the children of `parent` (or the
	/// roots of `permission_type_id`). 0 when there are none.
	pub fn next_sort_order(
		&self,
		parent: Option<PermissionId>,
		permission_type_id: PermissionTypeId,
	) -> i32 {
		let siblings = match parent {
			Some(parent) => self.children(parent),
			None => self.roots(Some(permission_type_id)),
		};
		siblings
			.iter()
			.map(|s| s.sort_order)
			.max()
			.map_or(0, |max| max.saturating_add(1))
	}

	/// Ancestors of `id` in root-to-parent order, excluding `id` itself.
	///
	/// The walk stops at a missing parent or a repeated id.
	pub fn ancestors(&self, id: PermissionId) -> Vec<&Permission> {
		let mut chain = Vec::new();
		let mut seen = HashSet::from([id]);
		let mut current = self.nodes.get(&id).and_then(|p| p.parent_permission_id);
		while let Some(parent_id) = current {
			if !seen.insert(parent_id) {
				break;
			}
			let Some(parent) = self.nodes.get(&parent_id) else {
				break;
			};
			chain.push(parent);
			current = parent.parent_permission_id;
		}
		chain.reverse();
		chain
	}

	/// Descendants of `id` in pre-order (children in sibling order), excluding
	/// `id` itself.
	pub fn descendants(&self, id: PermissionId) -> Vec<&Permission> {
		let mut out = Vec::new();
		let mut seen = HashSet::from([id]);
		let mut stack: Vec<&Permission> = self.children(id).into_iter().rev().collect();
		while let Some(node) = stack.pop() {
			if !seen.insert(node.id) {
				continue;
			}
			out.push(node);
			stack.extend(self.children(node.id).into_iter().rev());
		}
		out
	}

	pub fn descendant_ids(&self, id: PermissionId) -> HashSet<PermissionId> {
		self.descendants(id).into_iter().map(|p| p.id).collect()
	}

	/// Deepest stored level in a type, or `None` if the type is empty.
	pub fn max_depth(&self, permission_type_id: PermissionTypeId) -> Option<u32> {
		self.nodes
			.values()
			.filter(|p| p.permission_type_id == permission_type_id)
			.map(|p| p.level)
			.max()
	}

	/// Permissions whose stored level equals `level`, ordered by path.
	pub fn by_level(
		&self,
		level: u32,
		permission_type_id: Option<PermissionTypeId>,
	) -> Vec<&Permission> {
		let mut found: Vec<&Permission> = self
			.nodes
			.values()
			.filter(|p| p.level == level)
			.filter(|p| permission_type_id.map_or(true, |t| p.permission_type_id == t))
			.collect();
		found.sort_by(|a, b| {
			a.hierarchy_path
				.cmp(&b.hierarchy_path)
				.then_with(|| a.id.cmp(&b.id))
		});
		found
	}

	/// Case-insensitive name lookup within a type.
	pub fn find_by_name(
		&self,
		permission_type_id: PermissionTypeId,
		name: &str,
	) -> Option<&Permission> {
		let wanted = name.trim();
		self.nodes.values().find(|p| {
			p.permission_type_id == permission_type_id && p.name.trim().eq_ignore_ascii_case(wanted)
		})
	}
}
