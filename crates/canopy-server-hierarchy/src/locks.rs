// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Per-type serialization of structural writes.
//!
//! Structural operations hold a shared read guard on the whole hierarchy plus
//! one mutex per permission type they touch. Type mutexes are always taken in
//! ascending id order so multi-type batches cannot deadlock. Whole-table
//! maintenance takes the write guard and so excludes every writer.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use canopy_permissions_core::PermissionTypeId;
use tokio::sync::{Mutex, OwnedMutexGuard, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
pub struct TypeLocks {
	structure: RwLock<()>,
	per_type: Mutex<HashMap<PermissionTypeId, Arc<Mutex<()>>>>,
}

/// Held for the duration of one structural operation.
#[must_use]
pub struct TypeGuard<'a> {
	_types: Vec<OwnedMutexGuard<()>>,
	_structure: RwLockReadGuard<'a, ()>,
}

impl TypeLocks {
	pub fn new() -> Self {
		Self::default()
	}

	pub async fn lock_types(
		&self,
		types: impl IntoIterator<Item = PermissionTypeId>,
	) -> TypeGuard<'_> {
		let ordered: BTreeSet<PermissionTypeId> = types.into_iter().collect();
		let structure = self.structure.read().await;

		let mut guards = Vec::with_capacity(ordered.len());
		for permission_type_id in ordered {
			let lock = {
				let mut map = self.per_type.lock().await;
				Arc::clone(map.entry(permission_type_id).or_default())
			};
			guards.push(lock.lock_owned().await);
		}

		TypeGuard {
			_types: guards,
			_structure: structure,
		}
	}

	/// Exclusive access to the whole hierarchy.
	pub async fn lock_all(&self) -> RwLockWriteGuard<'_, ()> {
		self.structure.write().await
	}
}

#[cfg(test)]
mod tests {
	use super::*;
	use std::time::Duration;
	use tokio::time::timeout;

	const SHORT: Duration = Duration::from_millis(50);

	#[tokio::test]
	async fn same_type_is_serialized() {
		let locks = TypeLocks::new();
		let _held = locks.lock_types([PermissionTypeId::new(1)]).await;

		assert!(timeout(SHORT, locks.lock_types([PermissionTypeId::new(1)]))
			.await
			.is_err());
		assert!(timeout(SHORT, locks.lock_types([PermissionTypeId::new(2)]))
			.await
			.is_ok());
	}

	#[tokio::test]
	async fn lock_all_waits_for_writers() {
		let locks = TypeLocks::new();
		let held = locks.lock_types([PermissionTypeId::new(3)]).await;
		assert!(timeout(SHORT, locks.lock_all()).await.is_err());
		drop(held);
		assert!(timeout(SHORT, locks.lock_all()).await.is_ok());
	}

	#[tokio::test]
	async fn multi_type_guard_releases_everything() {
		let locks = TypeLocks::new();
		let guard = locks
			.lock_types([PermissionTypeId::new(2), PermissionTypeId::new(1)])
			.await;
		drop(guard);
		assert!(timeout(
			SHORT,
			locks.lock_types([PermissionTypeId::new(1), PermissionTypeId::new(2)])
		)
		.await
		.is_ok());
	}
}
