// Copyright (c) 2025 Geoffrey Huntley <ghuntley@ghuntley.com>. All rights reserved.
// SPDX-License-Identifier: Proprietary

//! Configuration sections.

mod database;
mod hierarchy;
mod logging;

pub use database::{DatabaseConfig, DatabaseConfigLayer};
pub use hierarchy::{HierarchyConfig, HierarchyConfigLayer};
pub use logging::{LoggingConfig, LoggingConfigLayer};
