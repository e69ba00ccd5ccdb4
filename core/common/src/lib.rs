//! Common utilities and types shared across docseal crates.
//!
//! This module provides the error taxonomy, identifiers and secret wrappers
//! that every other crate builds on.

pub mod error;
pub mod types;

pub use error::{Error, Result};
pub use types::{ContentLocator, DocumentId, Identity, Password, SensitiveBytes, VersionId};
