//! Content store abstraction for docseal.
//!
//! Stored document bytes (plaintext for unprotected versions, ciphertext for
//! protected ones) live behind the [`ContentStore`] trait. The store knows
//! nothing about protection; it moves opaque bytes to and from a
//! [`ContentLocator`](docseal_common::ContentLocator).
//!
//! # Design Principles
//! - Async operations: All I/O operations are async
//! - Streaming support: Large files are read via streams
//! - Unified error semantics: Missing content is always `Error::NotFound`

pub mod local;
pub mod memory;
pub mod provider;
pub mod registry;

pub use local::LocalStore;
pub use memory::MemoryStore;
pub use provider::{ByteStream, ContentStore, Metadata};
pub use registry::{create_default_registry, StoreFactory, StoreRegistry};
