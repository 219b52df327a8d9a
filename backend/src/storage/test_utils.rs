//! Test utilities for automatic cleanup and consistent test infrastructure
//!
//! The temporary directory lives as long as the [`TestEnvironment`], so test
//! data is removed even when a test panics.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use serde_json::Value;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tempfile::TempDir;
use tokio::sync::watch;

use super::local::{FileKeyValueStore, LocalStore};
use super::traits::{Collection, Document, RemoteStore, Snapshot};

/// Temporary data directory with a file store rooted in it
pub struct TestEnvironment {
    pub file_store: FileKeyValueStore,
    /// Base directory path for manual inspection if needed
    pub base_path: PathBuf,
    _temp_dir: TempDir, // Keep alive to prevent cleanup
}

impl TestEnvironment {
    pub fn new() -> Result<Self> {
        let temp_dir = TempDir::new()?;
        let file_store = FileKeyValueStore::new(temp_dir.path())?;
        Ok(Self {
            file_store,
            base_path: temp_dir.path().to_path_buf(),
            _temp_dir: temp_dir,
        })
    }

    pub fn base_directory(&self) -> &Path {
        &self.base_path
    }

    /// Typed local store over this environment's file store
    pub fn local_store(&self) -> LocalStore {
        LocalStore::new(Arc::new(self.file_store.clone()))
    }
}

/// How a [`BrokenRemoteStore`] misbehaves
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Breakage {
    /// Not reachable at all: ping fails
    Unreachable,
    /// Answers ping, then fails every other operation
    FailingWrites,
    /// Answers ping, then never completes a write
    Hanging,
}

/// Remote store double used to exercise degraded paths
pub struct BrokenRemoteStore {
    breakage: Breakage,
}

impl BrokenRemoteStore {
    pub fn new(breakage: Breakage) -> Self {
        Self { breakage }
    }

    async fn fail<T>(&self) -> Result<T> {
        if self.breakage == Breakage::Hanging {
            std::future::pending::<()>().await;
        }
        Err(anyhow!("remote store is broken ({:?})", self.breakage))
    }
}

#[async_trait]
impl RemoteStore for BrokenRemoteStore {
    async fn ping(&self) -> Result<()> {
        match self.breakage {
            Breakage::Unreachable => Err(anyhow!("remote store unreachable")),
            _ => Ok(()),
        }
    }

    async fn set_document(&self, _collection: Collection, _id: &str, _data: Value) -> Result<()> {
        self.fail().await
    }

    async fn delete_document(&self, _collection: Collection, _id: &str) -> Result<()> {
        self.fail().await
    }

    async fn get_document(&self, _collection: Collection, _id: &str) -> Result<Option<Document>> {
        Err(anyhow!("remote store is broken ({:?})", self.breakage))
    }

    async fn list_documents(&self, _collection: Collection) -> Result<Snapshot> {
        Err(anyhow!("remote store is broken ({:?})", self.breakage))
    }

    async fn subscribe(&self, _collection: Collection) -> Result<watch::Receiver<Snapshot>> {
        Err(anyhow!("remote store is broken ({:?})", self.breakage))
    }
}
