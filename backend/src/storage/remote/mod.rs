//! # Remote Store Adapter
//!
//! Optional document store the sync engine mirrors into. Two implementations:
//!
//! - [`MemoryDocumentStore`]: in-process store, used by tests and demos.
//! - [`DirectoryDocumentStore`]: documents as JSON files under a shared
//!   directory (network drive, synced folder). Subscriptions are fed by local
//!   writes and by a periodic rescan that picks up other devices' changes.
//!
//! Availability is decided once at startup through [`RemoteStore::ping`].

pub mod directory_store;
pub mod memory_store;

pub use directory_store::DirectoryDocumentStore;
pub use memory_store::MemoryDocumentStore;

use crate::storage::traits::{Collection, Document};

/// Order documents the way the collection's query asks for
pub(crate) fn sort_snapshot(collection: Collection, documents: &mut [Document]) {
    match collection.order_field() {
        Some(field) => documents.sort_by(|a, b| {
            let left = a.data.get(field).and_then(|v| v.as_str()).unwrap_or_default();
            let right = b.data.get(field).and_then(|v| v.as_str()).unwrap_or_default();
            left.cmp(right).then_with(|| a.id.cmp(&b.id))
        }),
        None => documents.sort_by(|a, b| a.id.cmp(&b.id)),
    }
}

/// Document ids end up in paths, so they are restricted to a safe alphabet
pub(crate) fn is_valid_document_id(id: &str) -> bool {
    !id.is_empty()
        && id
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-' || c == ':')
}
