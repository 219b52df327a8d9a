//! Document store kept in a shared directory.
//!
//! ```text
//! <root>/
//! ├── students/children/list/<id>.json
//! ├── students/teens/list/<id>.json
//! └── attendance/<year>/records/<group>_<date>.json
//! ```
//!
//! Documents are replaced atomically (temp file + rename). Watchers get a new
//! snapshot after every write made through this store, and a background scan
//! every `poll_interval` publishes changes written by other devices.

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use log::{debug, warn};
use serde_json::Value;
use std::collections::HashMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::fs;
use tokio::sync::watch;

use super::{is_valid_document_id, sort_snapshot};
use crate::storage::traits::{Collection, Document, RemoteStore, Snapshot};

const DOCUMENT_EXTENSION: &str = "json";

type Watchers = Arc<Mutex<HashMap<Collection, watch::Sender<Snapshot>>>>;

pub struct DirectoryDocumentStore {
    root: PathBuf,
    poll_interval: Duration,
    watchers: Watchers,
}

impl DirectoryDocumentStore {
    pub fn new<P: AsRef<Path>>(root: P, poll_interval: Duration) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
            poll_interval,
            watchers: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    fn collection_dir(&self, collection: Collection) -> PathBuf {
        self.root.join(collection.path())
    }

    fn document_path(&self, collection: Collection, id: &str) -> Result<PathBuf> {
        if !is_valid_document_id(id) {
            return Err(anyhow!("Invalid document id: {:?}", id));
        }
        Ok(self
            .collection_dir(collection)
            .join(format!("{}.{}", id, DOCUMENT_EXTENSION)))
    }

    fn has_watcher(&self, collection: Collection) -> bool {
        let watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        watchers.contains_key(&collection)
    }

    /// Push the current contents of `collection` to its watchers, if any
    async fn publish(&self, collection: Collection) {
        if !self.has_watcher(collection) {
            return;
        }

        match read_collection(&self.collection_dir(collection), collection).await {
            Ok(snapshot) => {
                let watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
                if let Some(sender) = watchers.get(&collection) {
                    sender.send_replace(snapshot);
                }
            }
            Err(e) => warn!("Failed to rescan {} after a write: {}", collection, e),
        }
    }

    fn spawn_poller(&self, collection: Collection, sender: watch::Sender<Snapshot>) {
        let dir = self.collection_dir(collection);
        let poll_interval = self.poll_interval;

        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(poll_interval);
            // The first tick completes immediately; the initial snapshot is already published
            ticker.tick().await;

            loop {
                ticker.tick().await;
                if sender.is_closed() {
                    debug!("No watchers left for {}, stopping rescans", collection);
                    break;
                }

                match read_collection(&dir, collection).await {
                    Ok(snapshot) => {
                        sender.send_if_modified(|current| {
                            if *current != snapshot {
                                *current = snapshot;
                                true
                            } else {
                                false
                            }
                        });
                    }
                    Err(e) => warn!("Failed to rescan {}: {}", collection, e),
                }
            }
        });
    }
}

/// Read every document file of a collection directory
async fn read_collection(dir: &Path, collection: Collection) -> Result<Snapshot> {
    let mut entries = match fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e).with_context(|| format!("Failed to list {}", dir.display())),
    };

    let mut documents = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|e| e.to_str()) != Some(DOCUMENT_EXTENSION) {
            continue;
        }
        let id = match path.file_stem().and_then(|s| s.to_str()) {
            Some(id) if is_valid_document_id(id) => id.to_string(),
            _ => continue,
        };

        let content = fs::read_to_string(&path).await?;
        match serde_json::from_str::<Value>(&content) {
            Ok(data) => documents.push(Document { id, data }),
            Err(e) => warn!("Skipping unreadable document {}: {}", path.display(), e),
        }
    }

    sort_snapshot(collection, &mut documents);
    Ok(documents)
}

#[async_trait]
impl RemoteStore for DirectoryDocumentStore {
    async fn ping(&self) -> Result<()> {
        let metadata = fs::metadata(&self.root)
            .await
            .with_context(|| format!("Remote directory {} is not reachable", self.root.display()))?;
        if !metadata.is_dir() {
            return Err(anyhow!("Remote path {} is not a directory", self.root.display()));
        }

        // Make sure we can actually write there
        let probe = self.root.join(".ping");
        fs::write(&probe, b"ok").await?;
        fs::remove_file(&probe).await?;
        Ok(())
    }

    async fn set_document(&self, collection: Collection, id: &str, data: Value) -> Result<()> {
        let path = self.document_path(collection, id)?;
        fs::create_dir_all(self.collection_dir(collection)).await?;

        let content = serde_json::to_string_pretty(&data)?;
        let temp_path = self.collection_dir(collection).join(format!(".{}.tmp", id));
        fs::write(&temp_path, content).await?;
        fs::rename(&temp_path, &path).await?;

        debug!("Stored document {}/{}", collection, id);
        self.publish(collection).await;
        Ok(())
    }

    async fn delete_document(&self, collection: Collection, id: &str) -> Result<()> {
        let path = self.document_path(collection, id)?;
        match fs::remove_file(&path).await {
            Ok(()) => {
                debug!("Deleted document {}/{}", collection, id);
                self.publish(collection).await;
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e).with_context(|| format!("Failed to delete {}", path.display())),
        }
    }

    async fn get_document(&self, collection: Collection, id: &str) -> Result<Option<Document>> {
        let path = self.document_path(collection, id)?;
        match fs::read_to_string(&path).await {
            Ok(content) => Ok(Some(Document {
                id: id.to_string(),
                data: serde_json::from_str(&content)?,
            })),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e).with_context(|| format!("Failed to read {}", path.display())),
        }
    }

    async fn list_documents(&self, collection: Collection) -> Result<Snapshot> {
        read_collection(&self.collection_dir(collection), collection).await
    }

    async fn subscribe(&self, collection: Collection) -> Result<watch::Receiver<Snapshot>> {
        let snapshot = read_collection(&self.collection_dir(collection), collection).await?;

        let mut watchers = self.watchers.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(sender) = watchers.get(&collection) {
            if !sender.is_closed() {
                sender.send_replace(snapshot);
                return Ok(sender.subscribe());
            }
        }

        let (sender, receiver) = watch::channel(snapshot);
        watchers.insert(collection, sender.clone());
        drop(watchers);

        self.spawn_poller(collection, sender);
        Ok(receiver)
    }
}
