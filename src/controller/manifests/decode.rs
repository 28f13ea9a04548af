//! # Manifest Decoding
//!
//! Turns a YAML or JSON stream into schema-less [`ManifestObject`]s.
//!
//! YAML streams may carry any number of `---` separated documents; empty and
//! comment-only documents are skipped. A stream whose first non-blank character is
//! `{` or `[` is decoded as a sequence of JSON values, with top-level arrays expanded
//! into their elements. The first malformed document ends the stream: it is returned as
//! the final, failed entry and nothing after it is decoded.

use kube::core::{DynamicObject, GroupVersionKind, TypeMeta};
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DocumentError {
    #[error("document {index}: invalid YAML: {source}")]
    Yaml {
        index: usize,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("document {index}: invalid JSON: {source}")]
    Json {
        index: usize,
        #[source]
        source: serde_json::Error,
    },
    #[error("document {index}: {reason}")]
    Invalid { index: usize, reason: String },
}

/// Address of one cluster resource
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct ObjectKey {
    pub api_version: String,
    pub kind: String,
    pub namespace: Option<String>,
    pub name: String,
}

impl ObjectKey {
    /// Group/version/kind of the addressed resource
    #[must_use]
    pub fn gvk(&self) -> GroupVersionKind {
        let (group, version) = self
            .api_version
            .split_once('/')
            .unwrap_or(("", self.api_version.as_str()));
        GroupVersionKind::gvk(group, version, &self.kind)
    }
}

impl std::fmt::Display for ObjectKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match &self.namespace {
            Some(ns) => write!(f, "{} {}/{}", self.kind, ns, self.name),
            None => write!(f, "{} {}", self.kind, self.name),
        }
    }
}

/// A decoded manifest document
///
/// Identity fields (apiVersion, kind, namespace, name) are validated on decode;
/// everything else is carried through to the store untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct ManifestObject {
    object: DynamicObject,
}

impl ManifestObject {
    /// Build from a decoded JSON value, requiring `apiVersion`, `kind` and `metadata.name`
    ///
    /// # Errors
    /// Returns a description of the first missing or malformed identity field.
    pub fn from_value(value: serde_json::Value) -> Result<Self, String> {
        if !value.is_object() {
            return Err(format!("expected a mapping, found {}", json_type_name(&value)));
        }
        let object: DynamicObject =
            serde_json::from_value(value).map_err(|e| format!("malformed object: {e}"))?;

        match &object.types {
            Some(TypeMeta { api_version, kind }) if !api_version.is_empty() && !kind.is_empty() => {}
            _ => return Err("missing apiVersion or kind".to_string()),
        }
        if object.metadata.name.as_deref().filter(|n| !n.is_empty()).is_none() {
            return Err("missing metadata.name".to_string());
        }

        Ok(Self { object })
    }

    #[must_use]
    pub fn key(&self) -> ObjectKey {
        let types = self.object.types.clone().unwrap_or_default();
        ObjectKey {
            api_version: types.api_version,
            kind: types.kind,
            namespace: self.object.metadata.namespace.clone(),
            name: self.object.metadata.name.clone().unwrap_or_default(),
        }
    }

    /// Override the document's own namespace
    pub fn set_namespace(&mut self, namespace: &str) {
        self.object.metadata.namespace = Some(namespace.to_string());
    }

    #[must_use]
    pub fn resource_version(&self) -> Option<&str> {
        self.object.metadata.resource_version.as_deref()
    }

    pub fn set_resource_version(&mut self, resource_version: Option<String>) {
        self.object.metadata.resource_version = resource_version;
    }

    #[must_use]
    pub fn as_dynamic(&self) -> &DynamicObject {
        &self.object
    }
}

fn json_type_name(value: &serde_json::Value) -> &'static str {
    match value {
        serde_json::Value::Null => "null",
        serde_json::Value::Bool(_) => "a boolean",
        serde_json::Value::Number(_) => "a number",
        serde_json::Value::String(_) => "a string",
        serde_json::Value::Array(_) => "a sequence",
        serde_json::Value::Object(_) => "a mapping",
    }
}

fn is_json_stream(content: &str) -> bool {
    matches!(content.trim_start().chars().next(), Some('{' | '['))
}

/// Decode every document in `content`, in stream order
///
/// Only the last entry can be an error. Document indices in errors are 1-based
/// positions within the stream.
#[must_use]
pub fn decode_documents(content: &str) -> Vec<Result<ManifestObject, DocumentError>> {
    if is_json_stream(content) {
        decode_json(content).collect()
    } else {
        decode_yaml(content).collect()
    }
}

fn decode_yaml(content: &str) -> impl Iterator<Item = Result<ManifestObject, DocumentError>> + '_ {
    let mut failed = false;
    serde_yaml::Deserializer::from_str(content)
        .enumerate()
        .map_while(move |(i, document)| {
            if failed {
                return None;
            }
            let index = i + 1;
            let item = match serde_json::Value::deserialize(document) {
                Ok(serde_json::Value::Null) => None,
                Ok(value) => Some(
                    ManifestObject::from_value(value)
                        .map_err(|reason| DocumentError::Invalid { index, reason }),
                ),
                Err(source) => Some(Err(DocumentError::Yaml { index, source })),
            };
            failed = matches!(item, Some(Err(_)));
            Some(item)
        })
        .flatten()
}

fn decode_json(content: &str) -> impl Iterator<Item = Result<ManifestObject, DocumentError>> + '_ {
    let mut failed = false;
    let mut index = 0;
    serde_json::Deserializer::from_str(content)
        .into_iter::<serde_json::Value>()
        .map_while(move |value| {
            if failed {
                return None;
            }
            let values = match value {
                Ok(serde_json::Value::Array(items)) => items,
                Ok(value) => vec![value],
                Err(source) => {
                    failed = true;
                    return Some(vec![Err(DocumentError::Json {
                        index: index + 1,
                        source,
                    })]);
                }
            };
            let mut items = Vec::with_capacity(values.len());
            for value in values {
                index += 1;
                let item = ManifestObject::from_value(value)
                    .map_err(|reason| DocumentError::Invalid { index, reason });
                let stop = item.is_err();
                items.push(item);
                if stop {
                    failed = true;
                    break;
                }
            }
            Some(items)
        })
        .flatten()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn decode_all(content: &str) -> Vec<Result<ManifestObject, DocumentError>> {
        decode_documents(content)
    }

    #[test]
    fn test_yaml_multi_document_stream() {
        let content = r#"
apiVersion: v1
kind: ConfigMap
metadata:
  name: first
data:
  key: value
---
apiVersion: apps/v1
kind: Deployment
metadata:
  name: second
  namespace: other
spec:
  replicas: 2
"#;
        let objects: Vec<_> = decode_all(content)
            .into_iter()
            .collect::<Result<_, _>>()
            .unwrap();
        assert_eq!(objects.len(), 2);
        assert_eq!(objects[0].key().name, "first");
        assert_eq!(objects[0].as_dynamic().data["data"]["key"], "value");
        let key = objects[1].key();
        assert_eq!(key.api_version, "apps/v1");
        assert_eq!(key.kind, "Deployment");
        assert_eq!(key.namespace.as_deref(), Some("other"));
        assert_eq!(objects[1].as_dynamic().data["spec"]["replicas"], 2);
    }

    #[test]
    fn test_empty_and_comment_documents_are_skipped() {
        let content = "---\n# only a comment\n---\napiVersion: v1\nkind: Secret\nmetadata:\n  name: s\n---\n";
        let objects = decode_all(content);
        assert_eq!(objects.len(), 1);
        assert!(objects[0].is_ok());
        assert!(decode_all("").is_empty());
    }

    #[test]
    fn test_malformed_document_is_an_error_and_ends_stream() {
        let content = "apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: ok\n---\nkey: [unclosed\n---\napiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: never\n";
        let results = decode_all(content);
        assert_eq!(results.len(), 2);
        assert!(results[0].is_ok());
        assert!(matches!(results[1], Err(DocumentError::Yaml { index: 2, .. })));
    }

    #[test]
    fn test_missing_identity_fields_are_rejected() {
        let results = decode_all("kind: ConfigMap\nmetadata:\n  name: x\n");
        assert!(matches!(results[0], Err(DocumentError::Invalid { index: 1, .. })));

        let results = decode_all("apiVersion: v1\nkind: ConfigMap\nmetadata: {}\n");
        match &results[0] {
            Err(DocumentError::Invalid { reason, .. }) => assert!(reason.contains("metadata.name")),
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn test_scalar_document_is_rejected() {
        let results = decode_all("just a string\n");
        assert!(matches!(results[0], Err(DocumentError::Invalid { .. })));
    }

    #[test]
    fn test_json_stream_and_array() {
        let content = r#"{"apiVersion":"v1","kind":"ConfigMap","metadata":{"name":"a"}}
[{"apiVersion":"v1","kind":"ConfigMap","metadata":{"name":"b"}},
 {"apiVersion":"v1","kind":"ConfigMap","metadata":{"name":"c"}}]"#;
        let names: Vec<String> = decode_all(content)
            .into_iter()
            .map(|r| r.unwrap().key().name)
            .collect();
        assert_eq!(names, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_json_trailing_garbage_is_an_error() {
        let content = r#"{"apiVersion":"v1","kind":"ConfigMap","metadata":{"name":"a"}} {"broken":"#;
        let results = decode_all(content);
        assert_eq!(results.len(), 2);
        assert!(matches!(results[1], Err(DocumentError::Json { index: 2, .. })));
    }

    #[test]
    fn test_object_key_gvk() {
        let core = ObjectKey {
            api_version: "v1".to_string(),
            kind: "Service".to_string(),
            namespace: None,
            name: "svc".to_string(),
        };
        let gvk = core.gvk();
        assert_eq!(gvk.group, "");
        assert_eq!(gvk.version, "v1");

        let apps = ObjectKey {
            api_version: "apps/v1".to_string(),
            ..core
        };
        assert_eq!(apps.gvk().group, "apps");
    }

    #[test]
    fn test_namespace_and_resource_version_setters() {
        let mut object = decode_all("apiVersion: v1\nkind: ConfigMap\nmetadata:\n  name: x\n  namespace: prod\n")
            .remove(0)
            .unwrap();
        object.set_namespace("default");
        object.set_resource_version(Some("42".to_string()));
        assert_eq!(object.key().namespace.as_deref(), Some("default"));
        assert_eq!(object.resource_version(), Some("42"));
    }
}
