//! Remote directory listing types

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Entry kind as reported by the server
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EntryKind {
    File,
    Directory,
    Unknown,
}

/// One name in a remote directory listing
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteEntry {
    /// Bare file or directory name, no separators
    pub name: String,
    /// Size in bytes
    pub size: i64,
    /// Last modification time, if the server reported one
    pub modified: Option<DateTime<Utc>>,
    pub kind: EntryKind,
}

impl RemoteEntry {
    pub fn new(name: impl Into<String>, size: i64, kind: EntryKind) -> Self {
        Self {
            name: name.into(),
            size,
            modified: None,
            kind,
        }
    }

    pub fn with_modified(mut self, modified: DateTime<Utc>) -> Self {
        self.modified = Some(modified);
        self
    }
}

/// Listing of a single remote directory, in server order
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RemoteListing {
    /// The path the listing was requested for
    pub path: String,
    pub entries: Vec<RemoteEntry>,
}

impl RemoteListing {
    pub fn new(path: impl Into<String>, entries: Vec<RemoteEntry>) -> Self {
        Self {
            path: path.into(),
            entries,
        }
    }

    /// Exact, case-sensitive name lookup
    pub fn find(&self, name: &str) -> Option<&RemoteEntry> {
        self.entries.iter().find(|e| e.name == name)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, RemoteEntry> {
        self.entries.iter()
    }
}

/// Convert a transport-reported unsigned size, refusing values that do not fit.
pub(crate) fn checked_size(name: &str, size: u64) -> Result<i64, super::RemoteError> {
    i64::try_from(size).map_err(|_| {
        super::RemoteError::Protocol(format!("size {} of {:?} out of range", size, name))
    })
}
