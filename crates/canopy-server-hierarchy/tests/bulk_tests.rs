// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Batch operations and system-permission protection.

mod support;

use canopy_permissions_core::{NewPermission, PermissionChanges, PermissionId};
use canopy_server_config::HierarchyConfig;
use canopy_server_hierarchy::{EditScope, ErrorKind, HierarchyError};
use support::{fixture, fixture_with, ids};

#[tokio::test]
async fn bulk_move_records_per_id_failures() {
	let f = fixture().await;
	let s = f.sample().await;
	let missing = PermissionId::new(999);

	let outcome = f
		.service
		.bulk_move(&[s.c.id, missing, s.a.id], Some(s.d.id))
		.await
		.unwrap();

	assert_eq!(outcome.succeeded, vec![s.c.id]);
	assert_eq!(outcome.failed_count(), 2);
	let missing_failure = outcome.failed.iter().find(|failure| failure.id == missing).unwrap();
	assert_eq!(missing_failure.kind, ErrorKind::NotFound);
	let cycle_failure = outcome.failed.iter().find(|failure| failure.id == s.a.id).unwrap();
	assert_eq!(cycle_failure.kind, ErrorKind::Validation);

	let c = f.reload(&s.c).await;
	assert_eq!(c.parent_permission_id, Some(s.d.id));
	assert_eq!(c.hierarchy_path, format!("{}/{}/{}", s.a.id, s.d.id, s.c.id));
	f.assert_healthy().await;
}

#[tokio::test]
async fn bulk_move_is_idempotent() {
	let f = fixture().await;
	let s = f.sample().await;

	let first = f.service.bulk_move(&[s.c.id], Some(s.d.id)).await.unwrap();
	let moved = f.reload(&s.c).await;
	let second = f.service.bulk_move(&[s.c.id], Some(s.d.id)).await.unwrap();

	assert_eq!(first.succeeded, second.succeeded);
	assert!(second.failed.is_empty());
	assert_eq!(f.reload(&s.c).await, moved);
}

#[tokio::test]
async fn bulk_move_appends_and_promotes_to_root() {
	let f = fixture().await;
	let s = f.sample().await;
	let e = f.child(&s.a, "E").await;

	let outcome = f
		.service
		.bulk_move(&[s.c.id, e.id, s.a.id], None)
		.await
		.unwrap();
	// A is already a root.
	assert_eq!(outcome.succeeded_count(), 3);

	let roots = f.service.get_root_permissions(f.domain).await.unwrap();
	assert_eq!(ids(&roots), vec![s.a.id, s.c.id, e.id]);
	let orders: Vec<i32> = roots.iter().map(|r| r.sort_order).collect();
	assert_eq!(orders, vec![0, 1, 2]);
	f.assert_healthy().await;
}

#[tokio::test]
async fn bulk_move_to_missing_parent_fails_whole_batch() {
	let f = fixture().await;
	let s = f.sample().await;

	let err = f
		.service
		.bulk_move(&[s.c.id], Some(PermissionId::new(999)))
		.await
		.unwrap_err();
	assert!(matches!(err, HierarchyError::PermissionNotFound(_)));
	assert_eq!(f.reload(&s.c).await, s.c);
}

#[tokio::test]
async fn bulk_deactivate_and_activate_with_descendants() {
	let f = fixture().await;
	let s = f.sample().await;

	let outcome = f
		.service
		.bulk_deactivate(&[s.a.id], true)
		.await
		.unwrap();
	assert_eq!(outcome.succeeded_count(), 4);
	for p in [&s.a, &s.b, &s.c, &s.d] {
		assert!(!f.reload(p).await.is_active);
	}

	let outcome = f.service.bulk_activate(&[s.b.id], false).await.unwrap();
	assert_eq!(outcome.succeeded, vec![s.b.id]);
	assert!(f.reload(&s.b).await.is_active);
	assert!(!f.reload(&s.c).await.is_active);

	// Already active counts as success.
	let again = f.service.bulk_activate(&[s.b.id], false).await.unwrap();
	assert_eq!(again.succeeded, vec![s.b.id]);
}

#[tokio::test]
async fn bulk_delete_goes_deepest_first() {
	let f = fixture().await;
	let s = f.sample().await;

	// B is listed first but only becomes a leaf once C is gone.
	let outcome = f
		.service
		.bulk_delete(&[s.b.id, s.c.id], false)
		.await
		.unwrap();
	assert_eq!(outcome.succeeded, vec![s.c.id, s.b.id]);
	assert!(outcome.failed.is_empty());
	assert_eq!(
		ids(&f.service.get_descendants(s.a.id).await.unwrap()),
		vec![s.d.id]
	);
	f.assert_healthy().await;
}

#[tokio::test]
async fn bulk_delete_without_descendants_skips_branches() {
	let f = fixture().await;
	let s = f.sample().await;

	let outcome = f
		.service
		.bulk_delete(&[s.a.id, s.d.id], false)
		.await
		.unwrap();
	assert_eq!(outcome.succeeded, vec![s.d.id]);
	assert_eq!(outcome.failed.len(), 1);
	assert_eq!(outcome.failed[0].id, s.a.id);
	assert_eq!(outcome.failed[0].kind, ErrorKind::Validation);

	let outcome = f.service.bulk_delete(&[s.a.id], true).await.unwrap();
	assert_eq!(outcome.succeeded_count(), 3);
	assert!(f
		.service
		.get_root_permissions(f.domain)
		.await
		.unwrap()
		.is_empty());
}

#[tokio::test]
async fn batch_size_limit_counts_expanded_descendants() {
	let f = fixture_with(HierarchyConfig {
		max_bulk_size: 2,
		..HierarchyConfig::default()
	})
	.await;
	let s = f.sample().await;

	let err = f
		.service
		.bulk_activate(&[s.a.id, s.b.id, s.c.id], false)
		.await
		.unwrap_err();
	assert!(matches!(
		err,
		HierarchyError::BatchTooLarge {
			requested: 3,
			limit: 2
		}
	));

	let err = f
		.service
		.bulk_deactivate(&[s.a.id], true)
		.await
		.unwrap_err();
	assert_eq!(err.kind(), ErrorKind::Validation);
	assert!(f.reload(&s.a).await.is_active);

	f.service
		.bulk_deactivate(&[s.c.id, s.d.id], false)
		.await
		.unwrap();
}

// =============================================================================
// System permissions
// =============================================================================

#[tokio::test]
async fn system_permissions_need_administrative_scope() {
	let f = fixture().await;
	let s = f.sample().await;
	let system = f
		.service
		.create_permission(NewPermission::child(f.domain, s.b.id, "Root access").system())
		.await
		.unwrap();
	assert_eq!(f.service.scope(), EditScope::Regular);

	let err = f
		.service
		.move_permission(system.id, Some(s.d.id), 0)
		.await
		.unwrap_err();
	assert!(matches!(err, HierarchyError::SystemProtected(_)));
	assert_eq!(err.kind(), ErrorKind::Conflict);

	let err = f
		.service
		.delete_permission(s.b.id, true)
		.await
		.unwrap_err();
	assert!(matches!(err, HierarchyError::SystemProtected(_)));
	assert_eq!(f.service.get_descendants(s.b.id).await.unwrap().len(), 2);

	let err = f
		.service
		.update_permission(
			system.id,
			PermissionChanges {
				is_active: Some(false),
				..Default::default()
			},
		)
		.await
		.unwrap_err();
	assert!(matches!(err, HierarchyError::SystemProtected(_)));

	// Renames are not structural.
	f.service
		.update_permission(
			system.id,
			PermissionChanges {
				name: Some("Superuser".to_string()),
				..Default::default()
			},
		)
		.await
		.unwrap();

	let outcome = f
		.service
		.bulk_delete(&[system.id, s.c.id], false)
		.await
		.unwrap();
	assert_eq!(outcome.succeeded, vec![s.c.id]);
	assert_eq!(outcome.failed[0].id, system.id);
	assert_eq!(outcome.failed[0].kind, ErrorKind::Conflict);

	let admin = f.service.administrative();
	assert_eq!(admin.scope(), EditScope::Administrative);
	let moved = admin
		.move_permission(system.id, Some(s.d.id), 0)
		.await
		.unwrap();
	assert_eq!(moved.parent_permission_id, Some(s.d.id));
	assert_eq!(admin.delete_permission(system.id, false).await.unwrap(), 1);
	f.assert_healthy().await;
}

#[tokio::test]
async fn system_permissions_are_skipped_by_bulk_deactivate() {
	let f = fixture().await;
	let s = f.sample().await;
	let system = f
		.service
		.create_permission(NewPermission::child(f.domain, s.d.id, "Audit log").system())
		.await
		.unwrap();

	let outcome = f
		.service
		.bulk_deactivate(&[s.d.id], true)
		.await
		.unwrap();
	assert_eq!(outcome.succeeded, vec![s.d.id]);
	assert_eq!(outcome.failed.len(), 1);
	assert_eq!(outcome.failed[0].id, system.id);
	assert!(f.reload(&system).await.is_active);

	// Activation is never restricted.
	let outcome = f.service.bulk_activate(&[s.d.id], true).await.unwrap();
	assert_eq!(outcome.succeeded_count(), 2);
}
