//! Object metadata and the label/annotation helpers that operate on it.
//!
//! Label and annotation maps use [`BTreeMap`] so that serialised objects and
//! log output have a stable key order.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::{Namespace, ObjectName, ObjectUid, Timestamp};

/// Identity and bookkeeping common to every stored object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMeta {
    pub name: ObjectName,
    /// `None` for legacy cluster-scoped objects.
    #[serde(default)]
    pub namespace: Option<Namespace>,
    #[serde(default)]
    pub uid: ObjectUid,
    #[serde(default)]
    pub labels: BTreeMap<String, String>,
    #[serde(default)]
    pub annotations: BTreeMap<String, String>,
    #[serde(default)]
    pub created_at: Timestamp,
}

impl ObjectMeta {
    /// Creates metadata for a namespaced object with a fresh UID and creation time.
    pub fn namespaced(name: ObjectName, namespace: Namespace) -> Self {
        Self {
            name,
            namespace: Some(namespace),
            uid: ObjectUid::new_random(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            created_at: Timestamp::now(),
        }
    }

    /// Creates metadata for a legacy cluster-scoped object.
    pub fn cluster_scoped(name: ObjectName) -> Self {
        Self {
            name,
            namespace: None,
            uid: ObjectUid::new_random(),
            labels: BTreeMap::new(),
            annotations: BTreeMap::new(),
            created_at: Timestamp::now(),
        }
    }

    pub fn with_label(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.labels.insert(key.into(), value.into());
        self
    }

    pub fn with_annotation(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.annotations.insert(key.into(), value.into());
        self
    }

    /// Merges `labels` into this object's labels; incoming values win on conflict.
    pub fn add_labels(&mut self, labels: &BTreeMap<String, String>) {
        self.labels = merge_map_override_with_dst(&self.labels, labels);
    }

    /// Merges `annotations` into this object's annotations; incoming values win.
    pub fn add_annotations(&mut self, annotations: &BTreeMap<String, String>) {
        self.annotations = merge_map_override_with_dst(&self.annotations, annotations);
    }

    pub fn remove_labels<S: AsRef<str>>(&mut self, keys: &[S]) {
        for key in keys {
            self.labels.remove(key.as_ref());
        }
    }

    pub fn remove_annotations<S: AsRef<str>>(&mut self, keys: &[S]) {
        for key in keys {
            self.annotations.remove(key.as_ref());
        }
    }
}

/// Merges two maps into a new one. On conflicting keys the value from `dst`
/// is kept.
pub fn merge_map_override_with_dst(
    src: &BTreeMap<String, String>,
    dst: &BTreeMap<String, String>,
) -> BTreeMap<String, String> {
    let mut merged = src.clone();
    merged.extend(dst.iter().map(|(k, v)| (k.clone(), v.clone())));
    merged
}

/// Copies labels and annotations from a parent object onto a child it owns.
/// The parent's values override the child's.
pub fn pass_label_and_annotation(parent: &ObjectMeta, child: &mut ObjectMeta) {
    child.add_labels(&parent.labels);
    child.add_annotations(&parent.annotations);
}
