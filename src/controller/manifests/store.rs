//! # Resource Store
//!
//! Generic get/create/replace/delete of cluster resources keyed by [`ObjectKey`].
//!
//! [`KubeResourceStore`] resolves each apiVersion/kind through API discovery once and
//! caches the result, then talks to the cluster through `Api<DynamicObject>`.
//! Cluster-scoped kinds are addressed without a namespace.

use super::decode::{ManifestObject, ObjectKey};
use async_trait::async_trait;
use kube::api::{Api, ApiResource, DeleteParams, PostParams};
use kube::core::DynamicObject;
use kube::discovery::{pinned_kind, ApiCapabilities, Scope};
use kube::Client;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};
use thiserror::Error;
use tracing::debug;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("{key} not found")]
    NotFound { key: ObjectKey },
    #[error("conflict writing {key}: {message}")]
    Conflict { key: ObjectKey, message: String },
    #[error("failed to resolve {api_version}/{kind}: {source}")]
    Discovery {
        api_version: String,
        kind: String,
        #[source]
        source: kube::Error,
    },
    #[error("request for {key} failed: {source}")]
    Api {
        key: ObjectKey,
        #[source]
        source: kube::Error,
    },
}

/// Cluster resource store consumed by the applier
#[async_trait]
pub trait ResourceStore: Send + Sync {
    /// Current object, or `None` when it does not exist
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>, StoreError>;

    async fn create(&self, object: &ManifestObject) -> Result<DynamicObject, StoreError>;

    /// Full replace; the object must carry the resource version it was read at
    async fn replace(&self, object: &ManifestObject) -> Result<DynamicObject, StoreError>;

    /// Delete; a missing object is `StoreError::NotFound`
    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError>;
}

/// Kubernetes API implementation of [`ResourceStore`]
pub struct KubeResourceStore {
    client: Client,
    resources: Mutex<HashMap<(String, String), (ApiResource, ApiCapabilities)>>,
}

impl KubeResourceStore {
    #[must_use]
    pub fn new(client: Client) -> Self {
        Self {
            client,
            resources: Mutex::new(HashMap::new()),
        }
    }

    async fn resolve(&self, key: &ObjectKey) -> Result<(ApiResource, ApiCapabilities), StoreError> {
        let cache_key = (key.api_version.clone(), key.kind.clone());
        if let Some(found) = self.cached(&cache_key) {
            return Ok(found);
        }

        let resolved = pinned_kind(&self.client, &key.gvk())
            .await
            .map_err(|source| StoreError::Discovery {
                api_version: key.api_version.clone(),
                kind: key.kind.clone(),
                source,
            })?;
        debug!(api_version = %key.api_version, kind = %key.kind, plural = %resolved.0.plural, "Resolved resource kind");

        if let Ok(mut resources) = self.resources.lock() {
            resources.insert(cache_key, resolved.clone());
        }
        Ok(resolved)
    }

    fn cached(&self, cache_key: &(String, String)) -> Option<(ApiResource, ApiCapabilities)> {
        self.resources
            .lock()
            .ok()
            .and_then(|resources| resources.get(cache_key).cloned())
    }

    /// API handle for the key plus whether the kind is namespaced
    async fn api_for(&self, key: &ObjectKey) -> Result<(Api<DynamicObject>, bool), StoreError> {
        let (resource, caps) = self.resolve(key).await?;
        let namespaced = caps.scope == Scope::Namespaced;
        let api = match (&key.namespace, namespaced) {
            (Some(ns), true) => Api::namespaced_with(self.client.clone(), ns, &resource),
            (None, true) => Api::default_namespaced_with(self.client.clone(), &resource),
            (_, false) => Api::all_with(self.client.clone(), &resource),
        };
        Ok((api, namespaced))
    }

    async fn writable(&self, object: &ManifestObject) -> Result<(Api<DynamicObject>, DynamicObject), StoreError> {
        let (api, namespaced) = self.api_for(&object.key()).await?;
        let mut body = object.as_dynamic().clone();
        if !namespaced {
            body.metadata.namespace = None;
        }
        Ok((api, body))
    }
}

fn classify(key: &ObjectKey, source: kube::Error) -> StoreError {
    match source {
        kube::Error::Api(ref status) if status.code == 404 => StoreError::NotFound { key: key.clone() },
        kube::Error::Api(ref status) if status.code == 409 => StoreError::Conflict {
            key: key.clone(),
            message: status.message.clone(),
        },
        source => StoreError::Api {
            key: key.clone(),
            source,
        },
    }
}

#[async_trait]
impl ResourceStore for KubeResourceStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>, StoreError> {
        let (api, _) = self.api_for(key).await?;
        api.get_opt(&key.name).await.map_err(|e| classify(key, e))
    }

    async fn create(&self, object: &ManifestObject) -> Result<DynamicObject, StoreError> {
        let key = object.key();
        let (api, body) = self.writable(object).await?;
        api.create(&PostParams::default(), &body)
            .await
            .map_err(|e| classify(&key, e))
    }

    async fn replace(&self, object: &ManifestObject) -> Result<DynamicObject, StoreError> {
        let key = object.key();
        let (api, body) = self.writable(object).await?;
        api.replace(&key.name, &PostParams::default(), &body)
            .await
            .map_err(|e| classify(&key, e))
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        let (api, _) = self.api_for(key).await?;
        api.delete(&key.name, &DeleteParams::default())
            .await
            .map(|_| ())
            .map_err(|e| classify(key, e))
    }
}

/// Shared handle used by the applier
pub type SharedResourceStore = Arc<dyn ResourceStore>;
