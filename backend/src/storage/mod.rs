//! # Storage Module
//!
//! Persistence adapters used by the domain layer:
//!
//! - **local**: synchronous key-value persistence in the data directory
//! - **remote**: optional document store the sync engine mirrors into
//!
//! Both sit behind the traits in [`traits`] so services can be tested with
//! in-memory implementations.

pub mod local;
pub mod remote;
pub mod traits;

#[cfg(test)]
pub mod test_utils;

pub use local::{keys, FileKeyValueStore, LocalStore, MemoryKeyValueStore};
pub use remote::{DirectoryDocumentStore, MemoryDocumentStore};
pub use traits::{Collection, Document, KeyValueStore, RemoteStore, Snapshot};
