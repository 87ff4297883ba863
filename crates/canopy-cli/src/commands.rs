// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Subcommands and their dispatch onto [`HierarchyService`].
//!
//! Every command prints JSON to stdout.

use canopy_permissions_core::{
	NewPermission, NewPermissionType, PermissionChanges, PermissionId, PermissionTypeId,
};
use canopy_server_hierarchy::{CloneDestination, HierarchyService};
use clap::{Args, Subcommand};
use serde::Serialize;
use serde_json::json;

#[derive(Debug, Subcommand)]
pub enum Command {
	/// Apply pending database migrations and exit
	Migrate,

	/// Create a permission type
	TypeCreate(TypeCreateArgs),

	/// List permission types
	Types,

	/// Create a permission
	Create(CreateArgs),

	/// Edit name, description, or flags of a permission
	Update(UpdateArgs),

	/// Show one permission
	Show { id: PermissionId },

	/// List the roots of a permission type
	Roots {
		#[arg(long = "type")]
		permission_type: PermissionTypeId,
	},

	/// List direct children
	Children { id: PermissionId },

	/// List ancestors, root first
	Ancestors { id: PermissionId },

	/// List descendants in tree order
	Descendants { id: PermissionId },

	/// Print the display tree
	Tree {
		#[arg(long = "type")]
		permission_type: Option<PermissionTypeId>,
	},

	/// Deepest level used by a permission type
	Depth {
		#[arg(long = "type")]
		permission_type: PermissionTypeId,
	},

	/// List permissions at one level
	Level {
		level: u32,
		#[arg(long = "type")]
		permission_type: Option<PermissionTypeId>,
	},

	/// Check whether a permission may move, without moving it
	CanMove {
		id: PermissionId,
		/// Candidate parent; omit to check promotion to root
		#[arg(long)]
		parent: Option<PermissionId>,
	},

	/// Move a permission under a new parent, or to the root
	Move {
		id: PermissionId,
		/// New parent; omit to move to the root
		#[arg(long)]
		parent: Option<PermissionId>,
		#[arg(long, default_value_t = 0)]
		sort_order: i32,
	},

	/// Swap a permission with its previous sibling
	MoveUp { id: PermissionId },

	/// Swap a permission with its next sibling
	MoveDown { id: PermissionId },

	/// Set the order of a permission's children
	Reorder {
		parent: PermissionId,
		#[arg(required = true)]
		children: Vec<PermissionId>,
	},

	/// Copy a permission, optionally with its subtree
	Clone(CloneArgs),

	/// Delete a permission
	Delete {
		id: PermissionId,
		/// Also delete every descendant
		#[arg(long)]
		cascade: bool,
	},

	/// Move many permissions under one parent, or to the root
	BulkMove {
		#[arg(required = true)]
		ids: Vec<PermissionId>,
		#[arg(long)]
		parent: Option<PermissionId>,
	},

	/// Activate many permissions
	BulkActivate(BulkArgs),

	/// Deactivate many permissions
	BulkDeactivate(BulkArgs),

	/// Delete many permissions
	BulkDelete(BulkArgs),

	/// Audit the whole hierarchy; exits non-zero when issues are found
	Validate,

	/// Recompute level and path for every reachable permission
	Repair,

	/// Export permissions as JSON
	Export {
		#[arg(long = "type")]
		permission_type: Option<PermissionTypeId>,
	},
}

#[derive(Debug, Args)]
pub struct TypeCreateArgs {
	pub name: String,
	#[arg(long)]
	pub description: Option<String>,
	#[arg(long)]
	pub icon: Option<String>,
	#[arg(long)]
	pub color: Option<String>,
	#[arg(long, default_value_t = 0)]
	pub sort_order: i32,
}

#[derive(Debug, Args)]
pub struct CreateArgs {
	pub name: String,
	#[arg(long = "type")]
	pub permission_type: PermissionTypeId,
	#[arg(long)]
	pub parent: Option<PermissionId>,
	#[arg(long)]
	pub description: Option<String>,
	/// Defaults to after the last sibling
	#[arg(long)]
	pub sort_order: Option<i32>,
	/// The permission may not have children
	#[arg(long)]
	pub leaf: bool,
	#[arg(long)]
	pub inactive: bool,
	#[arg(long)]
	pub system: bool,
}

#[derive(Debug, Args)]
pub struct UpdateArgs {
	pub id: PermissionId,
	#[arg(long)]
	pub name: Option<String>,
	#[arg(long, conflicts_with = "clear_description")]
	pub description: Option<String>,
	#[arg(long)]
	pub clear_description: bool,
	#[arg(long)]
	pub can_have_children: Option<bool>,
	#[arg(long)]
	pub active: Option<bool>,
}

#[derive(Debug, Args)]
pub struct CloneArgs {
	pub id: PermissionId,
	/// Copy every descendant too
	#[arg(long)]
	pub subtree: bool,
	/// Place the copy at the root
	#[arg(long, conflicts_with = "parent")]
	pub root: bool,
	/// Place the copy under this permission
	#[arg(long)]
	pub parent: Option<PermissionId>,
	/// Name for the copy (single permissions only)
	#[arg(long, conflicts_with = "subtree")]
	pub name: Option<String>,
}

impl CloneArgs {
	fn destination(&self) -> CloneDestination {
		match (self.root, self.parent) {
			(true, _) => CloneDestination::Root,
			(false, Some(parent)) => CloneDestination::Parent(parent),
			(false, None) => CloneDestination::SourceParent,
		}
	}
}

#[derive(Debug, Args)]
pub struct BulkArgs {
	#[arg(required = true)]
	pub ids: Vec<PermissionId>,
	/// Include every descendant of the listed permissions
	#[arg(long)]
	pub descendants: bool,
}

impl UpdateArgs {
	fn changes(&self) -> PermissionChanges {
		let description = if self.clear_description {
			Some(None)
		} else {
			self.description.clone().map(Some)
		};
		PermissionChanges {
			name: self.name.clone(),
			description,
			can_have_children: self.can_have_children,
			is_active: self.active,
		}
	}
}

impl CreateArgs {
	fn new_permission(self) -> NewPermission {
		NewPermission {
			permission_type_id: self.permission_type,
			parent_permission_id: self.parent,
			name: self.name,
			description: self.description,
			sort_order: self.sort_order,
			can_have_children: !self.leaf,
			is_active: !self.inactive,
			is_system_permission: self.system,
		}
	}
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> anyhow::Result<()> {
	println!("{}", serde_json::to_string_pretty(value)?);
	Ok(())
}

pub async fn run(service: &HierarchyService, command: Command) -> anyhow::Result<()> {
	match command {
		// Handled before the service exists.
		Command::Migrate => Ok(()),
		Command::TypeCreate(args) => {
			let created = service
				.create_permission_type(NewPermissionType {
					name: args.name,
					description: args.description,
					icon: args.icon,
					color: args.color,
					sort_order: args.sort_order,
				})
				.await?;
			print_json(&created)
		}
		Command::Types => print_json(&service.list_permission_types().await?),
		Command::Create(args) => {
			print_json(&service.create_permission(args.new_permission()).await?)
		}
		Command::Update(args) => {
			let changes = args.changes();
			if changes.is_empty() {
				anyhow::bail!("nothing to update; pass at least one field");
			}
			print_json(&service.update_permission(args.id, changes).await?)
		}
		Command::Show { id } => print_json(&service.get_permission(id).await?),
		Command::Roots { permission_type } => {
			print_json(&service.get_root_permissions(permission_type).await?)
		}
		Command::Children { id } => print_json(&service.get_children(id).await?),
		Command::Ancestors { id } => print_json(&service.get_ancestors(id).await?),
		Command::Descendants { id } => print_json(&service.get_descendants(id).await?),
		Command::Tree { permission_type } => {
			print_json(&service.get_tree_data(permission_type).await?)
		}
		Command::Depth { permission_type } => print_json(&json!({
			"permission_type_id": permission_type,
			"max_depth": service.get_max_depth(permission_type).await?,
		})),
		Command::Level {
			level,
			permission_type,
		} => print_json(&service.get_permissions_by_level(level, permission_type).await?),
		Command::CanMove { id, parent } => {
			let decision = service.can_reparent(id, parent).await?;
			print_json(&json!({
				"allowed": decision.is_allowed(),
				"reason": decision.reason(),
			}))
		}
		Command::Move {
			id,
			parent,
			sort_order,
		} => print_json(&service.move_permission(id, parent, sort_order).await?),
		Command::MoveUp { id } => print_json(&json!({ "moved": service.move_up(id).await? })),
		Command::MoveDown { id } => {
			print_json(&json!({ "moved": service.move_down(id).await? }))
		}
		Command::Reorder { parent, children } => {
			let placed = service.reorder_children(parent, &children).await?;
			print_json(&json!({ "placed": placed }))
		}
		Command::Clone(args) => {
			let destination = args.destination();
			let copy = if args.subtree {
				service.clone_subtree(args.id, destination).await?
			} else {
				service
					.clone_permission(args.id, destination, args.name)
					.await?
			};
			print_json(&copy)
		}
		Command::Delete { id, cascade } => {
			let removed = service.delete_permission(id, cascade).await?;
			print_json(&json!({ "removed": removed }))
		}
		Command::BulkMove { ids, parent } => print_json(&service.bulk_move(&ids, parent).await?),
		Command::BulkActivate(args) => {
			print_json(&service.bulk_activate(&args.ids, args.descendants).await?)
		}
		Command::BulkDeactivate(args) => {
			print_json(&service.bulk_deactivate(&args.ids, args.descendants).await?)
		}
		Command::BulkDelete(args) => {
			print_json(&service.bulk_delete(&args.ids, args.descendants).await?)
		}
		Command::Validate => {
			let report = service.validate_hierarchy().await?;
			print_json(&report)?;
			if !report.is_healthy() {
				anyhow::bail!("hierarchy audit found {} issue(s)", report.issues.len());
			}
			Ok(())
		}
		Command::Repair => print_json(&service.repair_hierarchy_paths().await?),
		Command::Export { permission_type } => {
			println!("{}", service.export_json(permission_type).await?);
			Ok(())
		}
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use clap::Parser;

	#[derive(Debug, Parser)]
	struct Cli {
		#[command(subcommand)]
		command: Command,
	}

	fn parse(args: &[&str]) -> Command {
		let mut argv = vec!["canopy"];
		argv.extend_from_slice(args);
		Cli::try_parse_from(argv).unwrap().command
	}

	#[test]
	fn create_flags_map_onto_new_permission() {
		let Command::Create(args) = parse(&[
			"create", "Billing", "--type", "2", "--parent", "7", "--leaf", "--system",
		]) else {
			panic!("expected create");
		};
		let new = args.new_permission();
		assert_eq!(new.permission_type_id, PermissionTypeId::new(2));
		assert_eq!(new.parent_permission_id, Some(PermissionId::new(7)));
		assert!(!new.can_have_children);
		assert!(new.is_active);
		assert!(new.is_system_permission);
		assert_eq!(new.sort_order, None);
	}

	#[test]
	fn clone_destination_follows_flags() {
		let Command::Clone(args) = parse(&["clone", "3"]) else {
			panic!("expected clone");
		};
		assert_eq!(args.destination(), CloneDestination::SourceParent);

		let Command::Clone(args) = parse(&["clone", "3", "--root", "--subtree"]) else {
			panic!("expected clone");
		};
		assert_eq!(args.destination(), CloneDestination::Root);
		assert!(args.subtree);

		let Command::Clone(args) = parse(&["clone", "3", "--parent", "9"]) else {
			panic!("expected clone");
		};
		assert_eq!(
			args.destination(),
			CloneDestination::Parent(PermissionId::new(9))
		);
	}

	#[test]
	fn clone_rejects_conflicting_placement() {
		let mut argv = vec!["canopy", "clone", "3", "--root", "--parent", "9"];
		assert!(Cli::try_parse_from(argv.clone()).is_err());
		argv = vec!["canopy", "clone", "3", "--subtree", "--name", "X"];
		assert!(Cli::try_parse_from(argv).is_err());
	}

	#[test]
	fn update_can_clear_description() {
		let Command::Update(args) = parse(&["update", "4", "--clear-description"]) else {
			panic!("expected update");
		};
		assert_eq!(args.changes().description, Some(None));

		let Command::Update(args) = parse(&["update", "4", "--active", "false"]) else {
			panic!("expected update");
		};
		let changes = args.changes();
		assert_eq!(changes.is_active, Some(false));
		assert!(changes.description.is_none());

		let Command::Update(args) = parse(&["update", "4"]) else {
			panic!("expected update");
		};
		assert!(args.changes().is_empty());
	}

	#[test]
	fn bulk_commands_take_many_ids() {
		let Command::BulkDelete(args) = parse(&["bulk-delete", "1", "2", "3", "--descendants"])
		else {
			panic!("expected bulk-delete");
		};
		assert_eq!(args.ids.len(), 3);
		assert!(args.descendants);

		let Command::BulkMove { ids, parent } = parse(&["bulk-move", "4", "5"]) else {
			panic!("expected bulk-move");
		};
		assert_eq!(ids, vec![PermissionId::new(4), PermissionId::new(5)]);
		assert_eq!(parent, None);
	}

	#[test]
	fn reorder_requires_children() {
		assert!(Cli::try_parse_from(["canopy", "reorder", "1"]).is_err());
		let Command::Reorder { parent, children } = parse(&["reorder", "1", "3", "2"]) else {
			panic!("expected reorder");
		};
		assert_eq!(parent, PermissionId::new(1));
		assert_eq!(children, vec![PermissionId::new(3), PermissionId::new(2)]);
	}
}
