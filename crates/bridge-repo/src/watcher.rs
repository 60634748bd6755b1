//! Commit notifications.

use std::sync::Mutex;

use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChangeKind {
    EntitySaved,
    EntityDeleted,
    ResourceSaved,
    ResourceDeleted,
}

/// One applied mutation. Resource changes carry `<entity path>/<name>`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Change {
    pub path: String,
    pub kind: ChangeKind,
}

impl Change {
    pub fn new(path: impl Into<String>, kind: ChangeKind) -> Self {
        Self {
            path: path.into(),
            kind,
        }
    }
}

/// Observer told about every successful commit, after the store has been
/// updated. Changes arrive in the order they were applied.
pub trait Watcher: Send + Sync {
    fn notify(&self, changes: &[Change]);
}

pub struct NoOpWatcher;

impl Watcher for NoOpWatcher {
    fn notify(&self, _changes: &[Change]) {}
}

/// Watcher keeping every batch it receives.
#[derive(Debug, Default)]
pub struct RecordingWatcher {
    batches: Mutex<Vec<Vec<Change>>>,
}

impl RecordingWatcher {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn batches(&self) -> Vec<Vec<Change>> {
        self.batches.lock().expect("lock poisoned").clone()
    }

    pub fn last_batch(&self) -> Option<Vec<Change>> {
        self.batches.lock().expect("lock poisoned").last().cloned()
    }

    /// Number of commits observed.
    pub fn len(&self) -> usize {
        self.batches.lock().expect("lock poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

impl Watcher for RecordingWatcher {
    fn notify(&self, changes: &[Change]) {
        self.batches
            .lock()
            .expect("lock poisoned")
            .push(changes.to_vec());
    }
}
