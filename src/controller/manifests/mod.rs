//! # Manifest Applier
//!
//! Walks a manifest directory and writes every decoded document to the cluster.
//!
//! - Files: regular `.yaml` files, visited in sorted depth-first order
//! - Documents: decoded per file, applied in stream order
//! - Writes: every object is forced into the target namespace, then upserted
//!   (create when absent, otherwise full replace carrying the live resourceVersion)
//!
//! Files are applied as the walk reaches them. The first failure of any kind
//! (walk, read, decode, store) aborts the whole pass; nothing after the failing
//! document is touched.

mod decode;
mod store;
mod walk;

pub use decode::{decode_documents, DocumentError, ManifestObject, ObjectKey};
pub use store::{KubeResourceStore, ResourceStore, SharedResourceStore, StoreError};
pub use walk::manifest_files;

use crate::constants::TARGET_NAMESPACE;
use crate::observability::metrics;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

#[derive(Debug, Error)]
pub enum ApplyError {
    #[error("failed to walk {}: {source}", .root.display())]
    Walk {
        root: PathBuf,
        #[source]
        source: walkdir::Error,
    },
    #[error("manifest walk task failed: {0}")]
    Task(#[from] tokio::task::JoinError),
    #[error("failed to read {}: {source}", .path.display())]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("failed to decode {}: {source}", .path.display())]
    Decode {
        path: PathBuf,
        #[source]
        source: DocumentError,
    },
    #[error("failed to write {} from {}: {source}", .key, .path.display())]
    Store {
        path: PathBuf,
        key: ObjectKey,
        #[source]
        source: StoreError,
    },
}

/// Result of writing one object
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Created,
    Updated,
}

impl UpsertOutcome {
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            UpsertOutcome::Created => "created",
            UpsertOutcome::Updated => "updated",
        }
    }
}

/// Counts from one successful apply pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ApplySummary {
    pub files: usize,
    pub created: usize,
    pub updated: usize,
}

impl ApplySummary {
    #[must_use]
    pub fn objects(&self) -> usize {
        self.created + self.updated
    }
}

/// Counts from one successful delete pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DeleteSummary {
    pub files: usize,
    pub deleted: usize,
    pub already_absent: usize,
}

#[derive(Clone)]
pub struct ManifestApplier {
    store: SharedResourceStore,
    target_namespace: String,
}

impl ManifestApplier {
    pub fn new(store: SharedResourceStore) -> Self {
        Self {
            store,
            target_namespace: TARGET_NAMESPACE.to_string(),
        }
    }

    #[must_use]
    pub fn target_namespace(&self) -> &str {
        &self.target_namespace
    }

    /// Create or update every manifest object below `root`
    ///
    /// # Errors
    /// Returns the first walk, read, decode, or store failure.
    pub async fn apply_all(&self, root: &Path) -> Result<ApplySummary, ApplyError> {
        self.apply_walk(root, ManifestWalk::start(root)).await
    }

    async fn apply_walk(
        &self,
        root: &Path,
        mut walk: ManifestWalk,
    ) -> Result<ApplySummary, ApplyError> {
        let mut summary = ApplySummary::default();

        while let Some(path) = walk.next().await? {
            summary.files += 1;
            for document in read_documents(&path).await? {
                let object = document.map_err(|source| ApplyError::Decode {
                    path: path.clone(),
                    source,
                })?;
                let key = object.key();
                let outcome = self
                    .upsert(object)
                    .await
                    .map_err(|source| ApplyError::Store {
                        path: path.clone(),
                        key,
                        source,
                    })?;
                metrics::increment_objects_applied(outcome.as_str());
                match outcome {
                    UpsertOutcome::Created => summary.created += 1,
                    UpsertOutcome::Updated => summary.updated += 1,
                }
            }
        }

        info!(
            root = %root.display(),
            files = summary.files,
            created = summary.created,
            updated = summary.updated,
            "Applied manifests"
        );
        Ok(summary)
    }

    /// Delete every manifest object below `root`
    ///
    /// Objects that are already gone count as deleted-before rather than failing the pass.
    ///
    /// # Errors
    /// Returns the first walk, read, decode, or store failure other than not-found.
    pub async fn delete_all(&self, root: &Path) -> Result<DeleteSummary, ApplyError> {
        let mut walk = ManifestWalk::start(root);
        let mut summary = DeleteSummary::default();

        while let Some(path) = walk.next().await? {
            summary.files += 1;
            for document in read_documents(&path).await? {
                let mut object = document.map_err(|source| ApplyError::Decode {
                    path: path.clone(),
                    source,
                })?;
                object.set_namespace(&self.target_namespace);
                let key = object.key();
                match self.store.delete(&key).await {
                    Ok(()) => {
                        debug!(object = %key, "Deleted object");
                        metrics::increment_objects_deleted();
                        summary.deleted += 1;
                    }
                    Err(StoreError::NotFound { .. }) => {
                        warn!(object = %key, "Object already absent");
                        summary.already_absent += 1;
                    }
                    Err(source) => {
                        return Err(ApplyError::Store { path, key, source });
                    }
                }
            }
        }

        info!(
            root = %root.display(),
            files = summary.files,
            deleted = summary.deleted,
            already_absent = summary.already_absent,
            "Deleted manifests"
        );
        Ok(summary)
    }

    /// Write one object: create it when absent, otherwise replace it at the live resourceVersion
    ///
    /// # Errors
    /// Returns the store error from the read or the write.
    pub async fn upsert(&self, mut object: ManifestObject) -> Result<UpsertOutcome, StoreError> {
        object.set_namespace(&self.target_namespace);
        let key = object.key();

        match self.store.get(&key).await? {
            None => {
                self.store.create(&object).await?;
                debug!(object = %key, "Created object");
                Ok(UpsertOutcome::Created)
            }
            Some(existing) => {
                object.set_resource_version(existing.metadata.resource_version);
                self.store.replace(&object).await?;
                debug!(object = %key, "Updated object");
                Ok(UpsertOutcome::Updated)
            }
        }
    }
}

impl std::fmt::Debug for ManifestApplier {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ManifestApplier")
            .field("target_namespace", &self.target_namespace)
            .finish_non_exhaustive()
    }
}

/// Sorted manifest walk running on the blocking pool, handed over one path at a time
struct ManifestWalk {
    paths: mpsc::Receiver<Result<PathBuf, ApplyError>>,
    walker: Option<JoinHandle<()>>,
}

impl ManifestWalk {
    fn start(root: &Path) -> Self {
        let root = root.to_path_buf();
        let entries = manifest_files(root.clone())
            .map(move |entry| entry.map_err(|source| ApplyError::Walk { root: root.clone(), source }));
        Self::from_entries(entries)
    }

    fn from_entries<I>(entries: I) -> Self
    where
        I: IntoIterator<Item = Result<PathBuf, ApplyError>>,
        I::IntoIter: Send + 'static,
    {
        let entries = entries.into_iter();
        // Capacity 1 keeps the walk at most one file ahead of the writes
        let (tx, paths) = mpsc::channel(1);
        let walker = tokio::task::spawn_blocking(move || {
            for entry in entries {
                let failed = entry.is_err();
                if tx.blocking_send(entry).is_err() || failed {
                    break;
                }
            }
        });
        Self {
            paths,
            walker: Some(walker),
        }
    }

    /// Next file, `None` once the walk is exhausted
    async fn next(&mut self) -> Result<Option<PathBuf>, ApplyError> {
        match self.paths.recv().await {
            Some(entry) => entry.map(Some),
            None => {
                if let Some(walker) = self.walker.take() {
                    walker.await?;
                }
                Ok(None)
            }
        }
    }
}

async fn read_documents(path: &Path) -> Result<Vec<Result<ManifestObject, DocumentError>>, ApplyError> {
    let content = tokio::fs::read_to_string(path)
        .await
        .map_err(|source| ApplyError::Read {
            path: path.to_path_buf(),
            source,
        })?;
    Ok(decode_documents(&content))
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use kube::core::DynamicObject;
    use std::sync::{Arc, Mutex};

    #[derive(Default)]
    struct RecordingStore {
        created: Mutex<Vec<String>>,
    }

    #[async_trait]
    impl ResourceStore for RecordingStore {
        async fn get(&self, _key: &ObjectKey) -> Result<Option<DynamicObject>, StoreError> {
            Ok(None)
        }

        async fn create(&self, object: &ManifestObject) -> Result<DynamicObject, StoreError> {
            self.created.lock().unwrap().push(object.key().name);
            Ok(object.as_dynamic().clone())
        }

        async fn replace(&self, object: &ManifestObject) -> Result<DynamicObject, StoreError> {
            Ok(object.as_dynamic().clone())
        }

        async fn delete(&self, _key: &ObjectKey) -> Result<(), StoreError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_files_before_a_walk_failure_are_applied() {
        let dir = tempfile::tempdir().unwrap();
        let first = dir.path().join("a.yaml");
        std::fs::write(
            &first,
            "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: first\n",
        )
        .unwrap();
        let store = Arc::new(RecordingStore::default());
        let applier = ManifestApplier::new(store.clone());
        let walk = ManifestWalk::from_entries(vec![
            Ok(first),
            Err(ApplyError::Read {
                path: dir.path().join("b"),
                source: std::io::Error::from(std::io::ErrorKind::PermissionDenied),
            }),
            Ok(dir.path().join("c.yaml")),
        ]);

        let err = applier.apply_walk(dir.path(), walk).await.unwrap_err();

        assert!(matches!(err, ApplyError::Read { ref path, .. } if path.ends_with("b")));
        assert_eq!(*store.created.lock().unwrap(), vec!["first".to_string()]);
    }

    #[tokio::test]
    async fn test_walk_yields_files_in_order_then_ends() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("b.yaml"), "").unwrap();
        std::fs::write(dir.path().join("a.yaml"), "").unwrap();

        let mut walk = ManifestWalk::start(dir.path());

        assert_eq!(walk.next().await.unwrap(), Some(dir.path().join("a.yaml")));
        assert_eq!(walk.next().await.unwrap(), Some(dir.path().join("b.yaml")));
        assert_eq!(walk.next().await.unwrap(), None);
        assert_eq!(walk.next().await.unwrap(), None);
    }
}
