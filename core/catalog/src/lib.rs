//! Document version catalog for docseal.
//!
//! This module provides:
//! - The persisted version record, including its protection material
//! - The collaborator contracts the download flow consumes
//!   ([`DocumentRepository`], [`PermissionChecker`])
//! - An in-memory catalog implementing both, with JSON snapshots
//!
//! Real deployments back these traits with their own persistence and
//! authorization systems.

pub mod memory;
pub mod model;
pub mod repository;

pub use memory::{DocumentEntry, MemoryCatalog, CATALOG_FILENAME};
pub use model::{DownloadUrl, Protection, ProtectionMaterial, VersionDetails, VersionRecord};
pub use repository::{DocumentRepository, Permission, PermissionChecker};
