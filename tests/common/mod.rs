//! Common test utilities
//!
//! In-memory stand-ins for the three seams the reconciler talks through: the git
//! client, the cluster resource store, and the GitOpsDeployment record store.

#![allow(dead_code, reason = "each test binary uses a different subset")]

use anyhow::Result;
use async_trait::async_trait;
use gitops_deploy_controller::prelude::*;
use kube::core::DynamicObject;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use tempfile::TempDir;

/// Two documents in one file plus one nested file; `README.md` must be ignored
pub const APP_YAML: &str = "\
apiVersion: v1
kind: ConfigMap
metadata:
  name: app-config
  namespace: other
data:
  key: value
---
apiVersion: v1
kind: Service
metadata:
  name: app
spec:
  ports:
    - port: 80
";

pub const NESTED_YAML: &str = "\
apiVersion: apps/v1
kind: Deployment
metadata:
  name: app
spec:
  replicas: 1
";

pub fn default_repo_files() -> Vec<(PathBuf, String)> {
    vec![
        (PathBuf::from("manifests/app.yaml"), APP_YAML.to_string()),
        (PathBuf::from("manifests/nested/deploy.yaml"), NESTED_YAML.to_string()),
        (PathBuf::from("manifests/README.md"), "# not a manifest".to_string()),
    ]
}

/// Git client that materializes a fixed file set on clone and records every call
#[derive(Debug, Default)]
pub struct FakeGit {
    pub calls: Mutex<Vec<String>>,
    pub files: Mutex<Vec<(PathBuf, String)>>,
    pub branch: Mutex<String>,
    pub fail_clone: AtomicBool,
    pub fail_pull: AtomicBool,
}

impl FakeGit {
    pub fn with_files(files: Vec<(PathBuf, String)>) -> Self {
        let git = Self::default();
        *git.files.lock().unwrap() = files;
        git
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn record(&self, call: String) {
        self.calls.lock().unwrap().push(call);
    }

    fn failure(operation: &'static str) -> GitError {
        GitError::Failed {
            operation,
            status: "exit status: 128".to_string(),
            stderr: "fatal: could not read from remote repository".to_string(),
        }
    }
}

#[async_trait]
impl GitClient for FakeGit {
    async fn clone_branch(&self, url: &str, branch: &str, dest: &Path) -> Result<(), GitError> {
        self.record(format!("clone {url} {branch}"));
        std::fs::create_dir_all(dest).unwrap();
        if self.fail_clone.load(Ordering::SeqCst) {
            return Err(Self::failure("clone"));
        }
        for (relative, content) in self.files.lock().unwrap().iter() {
            let target = dest.join(relative);
            std::fs::create_dir_all(target.parent().unwrap()).unwrap();
            std::fs::write(target, content).unwrap();
        }
        *self.branch.lock().unwrap() = branch.to_string();
        Ok(())
    }

    async fn current_branch(&self, _repo: &Path) -> Result<String, GitError> {
        self.record("current-branch".to_string());
        Ok(self.branch.lock().unwrap().clone())
    }

    async fn switch_branch(&self, _repo: &Path, remote: &str, branch: &str) -> Result<(), GitError> {
        self.record(format!("switch {remote} {branch}"));
        *self.branch.lock().unwrap() = branch.to_string();
        Ok(())
    }

    async fn pull(&self, _repo: &Path, remote: &str) -> Result<(), GitError> {
        self.record(format!("pull {remote}"));
        if self.fail_pull.load(Ordering::SeqCst) {
            return Err(Self::failure("pull"));
        }
        Ok(())
    }
}

/// Resource store backed by a map, with a cluster-wide resourceVersion counter
#[derive(Debug, Default)]
pub struct FakeStore {
    pub objects: Mutex<HashMap<ObjectKey, DynamicObject>>,
    pub calls: Mutex<Vec<String>>,
    /// Name of an object whose create/replace fails with a conflict
    pub fail_on: Mutex<Option<String>>,
    version: AtomicU64,
}

impl FakeStore {
    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    pub fn len(&self) -> usize {
        self.objects.lock().unwrap().len()
    }

    pub fn object(&self, api_version: &str, kind: &str, name: &str) -> Option<DynamicObject> {
        self.objects
            .lock()
            .unwrap()
            .get(&key(api_version, kind, name))
            .cloned()
    }

    pub fn insert(&self, object: DynamicObject, key: ObjectKey) {
        self.objects.lock().unwrap().insert(key, object);
    }

    fn record(&self, verb: &str, key: &ObjectKey) {
        self.calls.lock().unwrap().push(format!("{verb} {key}"));
    }

    fn check_failure(&self, key: &ObjectKey) -> Result<(), StoreError> {
        if self.fail_on.lock().unwrap().as_deref() == Some(key.name.as_str()) {
            return Err(StoreError::Conflict {
                key: key.clone(),
                message: "injected failure".to_string(),
            });
        }
        Ok(())
    }

    fn stamp(&self, object: &ManifestObject) -> DynamicObject {
        let mut stored = object.as_dynamic().clone();
        let version = self.version.fetch_add(1, Ordering::SeqCst) + 1;
        stored.metadata.resource_version = Some(version.to_string());
        stored
    }
}

#[async_trait]
impl ResourceStore for FakeStore {
    async fn get(&self, key: &ObjectKey) -> Result<Option<DynamicObject>, StoreError> {
        self.record("get", key);
        Ok(self.objects.lock().unwrap().get(key).cloned())
    }

    async fn create(&self, object: &ManifestObject) -> Result<DynamicObject, StoreError> {
        let key = object.key();
        self.record("create", &key);
        self.check_failure(&key)?;
        let stored = self.stamp(object);
        self.objects.lock().unwrap().insert(key, stored.clone());
        Ok(stored)
    }

    async fn replace(&self, object: &ManifestObject) -> Result<DynamicObject, StoreError> {
        let key = object.key();
        self.record("replace", &key);
        self.check_failure(&key)?;
        let live = self
            .objects
            .lock()
            .unwrap()
            .get(&key)
            .and_then(|o| o.metadata.resource_version.clone());
        if live.as_deref() != object.resource_version() {
            return Err(StoreError::Conflict {
                key,
                message: "resourceVersion mismatch".to_string(),
            });
        }
        let stored = self.stamp(object);
        self.objects.lock().unwrap().insert(key, stored.clone());
        Ok(stored)
    }

    async fn delete(&self, key: &ObjectKey) -> Result<(), StoreError> {
        self.record("delete", key);
        match self.objects.lock().unwrap().remove(key) {
            Some(_) => Ok(()),
            None => Err(StoreError::NotFound { key: key.clone() }),
        }
    }
}

/// GitOpsDeployment records held in memory
#[derive(Debug, Default)]
pub struct FakeDeployments {
    pub records: Mutex<HashMap<DeploymentIdentity, GitOpsDeployment>>,
    pub status_writes: AtomicU64,
    pub fail_status_writes: AtomicBool,
}

impl FakeDeployments {
    pub fn insert(&self, deployment: GitOpsDeployment) {
        self.records
            .lock()
            .unwrap()
            .insert(DeploymentIdentity::of(&deployment), deployment);
    }

    pub fn record(&self, id: &DeploymentIdentity) -> GitOpsDeployment {
        self.records.lock().unwrap().get(id).cloned().unwrap()
    }

    pub fn status(&self, id: &DeploymentIdentity) -> GitOpsDeploymentStatus {
        self.record(id).status.unwrap_or_default()
    }
}

#[async_trait]
impl DeploymentStore for FakeDeployments {
    async fn get(&self, id: &DeploymentIdentity) -> Result<Option<GitOpsDeployment>> {
        Ok(self.records.lock().unwrap().get(id).cloned())
    }

    async fn write_status(&self, id: &DeploymentIdentity, status: &GitOpsDeploymentStatus) -> Result<()> {
        if self.fail_status_writes.load(Ordering::SeqCst) {
            anyhow::bail!("status subresource unavailable");
        }
        self.status_writes.fetch_add(1, Ordering::SeqCst);
        if let Some(record) = self.records.lock().unwrap().get_mut(id) {
            record.status = Some(status.clone());
        }
        Ok(())
    }

    async fn set_finalizers(&self, id: &DeploymentIdentity, finalizers: Vec<String>) -> Result<()> {
        if let Some(record) = self.records.lock().unwrap().get_mut(id) {
            record.metadata.finalizers = Some(finalizers);
        }
        Ok(())
    }
}

pub fn key(api_version: &str, kind: &str, name: &str) -> ObjectKey {
    ObjectKey {
        api_version: api_version.to_string(),
        kind: kind.to_string(),
        namespace: Some("default".to_string()),
        name: name.to_string(),
    }
}

pub fn deployment(name: &str, interval: &str) -> GitOpsDeployment {
    let mut deployment = GitOpsDeployment::new(
        name,
        GitOpsDeploymentSpec {
            repo_url: "https://git.example.com/team/app.git".to_string(),
            branch: "main".to_string(),
            path: "manifests".to_string(),
            interval: interval.to_string(),
        },
    );
    deployment.metadata.namespace = Some("default".to_string());
    deployment.metadata.generation = Some(1);
    deployment
}

/// A reconciler wired to fakes, mirroring into a temporary directory
pub struct Harness {
    pub git: Arc<FakeGit>,
    pub store: Arc<FakeStore>,
    pub deployments: Arc<FakeDeployments>,
    pub reconciler: Arc<Reconciler>,
    pub root: TempDir,
}

impl Harness {
    pub fn new(finalizer_enabled: bool) -> Self {
        Self::with_git(FakeGit::with_files(default_repo_files()), finalizer_enabled)
    }

    pub fn with_git(git: FakeGit, finalizer_enabled: bool) -> Self {
        let root = TempDir::new().unwrap();
        let git = Arc::new(git);
        let store = Arc::new(FakeStore::default());
        let deployments = Arc::new(FakeDeployments::default());
        let config = ControllerConfig {
            mirror_root: root.path().to_path_buf(),
            finalizer_enabled,
            ..ControllerConfig::default()
        };
        let source = SourceSynchronizer::new(root.path(), "origin", Arc::clone(&git) as Arc<dyn GitClient>);
        let applier = ManifestApplier::new(Arc::clone(&store) as Arc<dyn ResourceStore>);
        let reconciler = Arc::new(Reconciler::new(
            Arc::clone(&deployments) as Arc<dyn DeploymentStore>,
            source,
            applier,
            Arc::new(config),
        ));
        Self {
            git,
            store,
            deployments,
            reconciler,
            root,
        }
    }

    /// Store the record and run one cycle against it
    pub async fn run(&self, deployment: &GitOpsDeployment) -> Result<kube_runtime::controller::Action, ReconcilerError> {
        self.deployments.insert(deployment.clone());
        self.cycle(deployment).await
    }

    /// Run one cycle against whatever record is stored
    pub async fn cycle(&self, deployment: &GitOpsDeployment) -> Result<kube_runtime::controller::Action, ReconcilerError> {
        let trigger = match self.reconciler.admit(deployment, chrono::Utc::now()) {
            Admission::Run(trigger) => trigger,
            Admission::Skip(_) => TriggerSource::TimerBased,
        };
        reconcile(Arc::new(deployment.clone()), Arc::clone(&self.reconciler), trigger).await
    }

    pub fn mirror(&self, name: &str) -> PathBuf {
        self.root.path().join("default").join(name)
    }
}
