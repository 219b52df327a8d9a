//! # Storage Traits
//!
//! This module defines the storage abstraction traits that allow different
//! storage backends to be used interchangeably in the domain layer.
//!
//! - [`KeyValueStore`] is the local, synchronous, always-available store.
//!   Values are whole serialized snapshots; they are overwritten, never patched.
//! - [`RemoteStore`] is the optional document store. Every write is a full
//!   document replace and every collection can be watched for snapshots.

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use shared::Group;
use std::fmt;
use tokio::sync::watch;

/// Trait defining the interface for local key-value persistence
///
/// Operations are synchronous: local persistence never suspends.
pub trait KeyValueStore: Send + Sync {
    /// Read the raw value stored under `key`
    fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing anything stored before
    fn set(&self, key: &str, value: &str) -> Result<()>;

    /// Remove `key`; removing a missing key is not an error
    fn remove(&self, key: &str) -> Result<()>;

    /// List every stored key
    fn keys(&self) -> Result<Vec<String>>;
}

/// A remote collection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum Collection {
    /// `students/<group>/list`, ordered by name
    Students(Group),
    /// `attendance/<year>/records`, documents keyed `<group>_<date>`
    Attendance(i32),
}

impl Collection {
    pub fn path(&self) -> String {
        match self {
            Collection::Students(group) => format!("students/{}/list", group.as_str()),
            Collection::Attendance(year) => format!("attendance/{}/records", year),
        }
    }

    /// Field snapshots of this collection are ordered by
    pub fn order_field(&self) -> Option<&'static str> {
        match self {
            Collection::Students(_) => Some("name"),
            Collection::Attendance(_) => None,
        }
    }
}

impl fmt::Display for Collection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.path())
    }
}

/// A document read back from the remote store
#[derive(Debug, Clone, PartialEq)]
pub struct Document {
    pub id: String,
    pub data: Value,
}

/// Full contents of a collection at one point in time
pub type Snapshot = Vec<Document>;

/// Trait defining the interface for the optional remote document store
#[async_trait]
pub trait RemoteStore: Send + Sync {
    /// Check that the store can be reached; used for availability detection
    async fn ping(&self) -> Result<()>;

    /// Create or fully replace a document (never a partial merge)
    async fn set_document(&self, collection: Collection, id: &str, data: Value) -> Result<()>;

    /// Delete a document; deleting a missing document is not an error
    async fn delete_document(&self, collection: Collection, id: &str) -> Result<()>;

    /// Fetch a single document
    async fn get_document(&self, collection: Collection, id: &str) -> Result<Option<Document>>;

    /// Fetch every document of a collection, in the collection's order
    async fn list_documents(&self, collection: Collection) -> Result<Snapshot>;

    /// Watch a collection. The receiver starts with the current snapshot and
    /// is updated with a full snapshot after every change.
    async fn subscribe(&self, collection: Collection) -> Result<watch::Receiver<Snapshot>>;
}
