use anyhow::Context;
use async_trait::async_trait;
use mongodb::bson::{doc, DateTime};
use mongodb::{Client, Collection, Database};
use serde::{Deserialize, Serialize};
use shared_types::{
    MongoOptions, ReadOutcome, RepoDescriptor, RepoKind, WriteOutcome, WriteReceipt,
};
use tokio::sync::Mutex;
use tracing::{debug, info, instrument, warn};

use crate::crypto::hash;
use crate::Backend;

/// Repository stored in a MongoDB database.
///
/// An entry path `dir/sub/file` lands in the collection named after the hash
/// of `dir/sub`, as the document whose `_id` is `file`. Entries at the root
/// share the collection of `/`.
pub struct MongoRepo {
    options: MongoOptions,
    client: Mutex<Option<Client>>,
}

#[derive(Debug, Serialize, Deserialize)]
struct StoredEntry {
    #[serde(rename = "_id")]
    id: String,
    content: String,
    updated_at: DateTime,
}

impl MongoRepo {
    pub fn new(options: MongoOptions) -> Self {
        Self {
            options,
            client: Mutex::new(None),
        }
    }

    /// Drops the pooled connection. The next operation reconnects.
    pub async fn close(&self) {
        if let Some(client) = self.client.lock().await.take() {
            client.shutdown().await;
            info!("Closed document store connection to {}", self.options.db_name);
        }
    }

    async fn database(&self) -> anyhow::Result<Database> {
        let mut slot = self.client.lock().await;
        if let Some(client) = slot.as_ref() {
            return Ok(client.database(&self.options.db_name));
        }

        debug!("Connecting to document store {}", self.options.db_name);
        let connected = Client::with_uri_str(&self.options.db_url)
            .await
            .context("Failed to connect to document store")?;
        let database = connected.database(&self.options.db_name);
        *slot = Some(connected);
        Ok(database)
    }

    async fn collection(&self, folder: &str) -> anyhow::Result<Collection<StoredEntry>> {
        Ok(self.database().await?.collection(&hash(folder)))
    }

    async fn upsert(&self, path: &str, content: String) -> anyhow::Result<()> {
        let (folder, file) = split_path(path);
        let collection = self.collection(folder).await?;
        let entry = StoredEntry {
            id: file.to_string(),
            content,
            updated_at: DateTime::now(),
        };

        collection
            .replace_one(doc! { "_id": file }, &entry)
            .upsert(true)
            .await
            .with_context(|| format!("Failed to store {path}"))?;
        Ok(())
    }

    async fn find(&self, path: &str) -> anyhow::Result<Option<StoredEntry>> {
        let (folder, file) = split_path(path);
        let collection = self.collection(folder).await?;
        collection
            .find_one(doc! { "_id": file })
            .await
            .with_context(|| format!("Failed to load {path}"))
    }
}

/// Splits an entry path into `(folder, file)`; the folder of a root entry is `/`.
fn split_path(path: &str) -> (&str, &str) {
    match path.rsplit_once('/') {
        Some((folder, file)) if !folder.is_empty() => (folder, file),
        Some((_, file)) => ("/", file),
        None => ("/", path),
    }
}

#[async_trait]
impl Backend for MongoRepo {
    fn kind(&self) -> RepoKind {
        RepoKind::Mongo
    }

    #[instrument(skip(self))]
    async fn read_file(&self, path: &str) -> ReadOutcome {
        match self.find(path).await {
            Ok(Some(entry)) => ReadOutcome::Found {
                content: entry.content,
            },
            Ok(None) => ReadOutcome::NotFound,
            Err(e) => {
                warn!("Document store read of {} failed: {:#}", path, e);
                ReadOutcome::failed(format!("{e:#}"))
            }
        }
    }

    #[instrument(skip(self, content))]
    async fn write_file(&self, path: &str, content: String) -> WriteOutcome {
        match self.upsert(path, content).await {
            Ok(()) => WriteOutcome::Written(WriteReceipt::new(path)),
            Err(e) => {
                warn!("Document store write of {} failed: {:#}", path, e);
                WriteOutcome::failed(format!("{e:#}"))
            }
        }
    }

    fn repo_id(&self) -> String {
        format!("{}/{}", hash(&self.options.db_url), self.options.db_name)
    }

    fn descriptor(&self) -> RepoDescriptor {
        RepoDescriptor::Mongo(self.options.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_split_path() {
        assert_eq!(split_path("notes/a.txt"), ("notes", "a.txt"));
        assert_eq!(split_path("a/b/c.txt"), ("a/b", "c.txt"));
        assert_eq!(split_path("c.txt"), ("/", "c.txt"));
        assert_eq!(split_path("/c.txt"), ("/", "c.txt"));
    }

    #[test]
    fn test_repo_id_hashes_url() {
        let repo = MongoRepo::new(MongoOptions {
            db_url: "mongodb://localhost:27017".to_string(),
            db_name: "notes".to_string(),
        });

        let id = repo.repo_id();
        assert_eq!(id, format!("{}/notes", hash("mongodb://localhost:27017")));
        assert!(!id.contains("localhost"));
    }

    #[tokio::test]
    async fn test_close_without_connection_is_noop() {
        let repo = MongoRepo::new(MongoOptions {
            db_url: "mongodb://localhost:27017".to_string(),
            db_name: "notes".to_string(),
        });
        repo.close().await;
        repo.close().await;
    }
}
