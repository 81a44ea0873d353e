//! Display handles for cached blobs
//!
//! A handle is a process-local URL a rendering surface can use to show a
//! blob without going back to the store. Each source owns at most one live
//! handle; minting a new one revokes the previous.

use crate::types::{ImageBlob, Source};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;
use tracing::debug;

pub const DEFAULT_HANDLE_BASE: &str = "blob:background-cache";

#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(transparent)]
pub struct DisplayHandle(String);

impl DisplayHandle {
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for DisplayHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[derive(Debug)]
struct LiveHandle {
    id: u64,
    handle: DisplayHandle,
    /// Timestamp of the entry the blob was read from
    timestamp: i64,
}

/// Ownership-tracking map of live handles
#[derive(Debug)]
pub struct HandleRegistry {
    base: String,
    next_id: u64,
    by_source: HashMap<Source, LiveHandle>,
    blobs: HashMap<u64, Arc<ImageBlob>>,
}

impl HandleRegistry {
    pub fn new(base: impl Into<String>) -> Self {
        Self {
            base: base.into().trim_end_matches('/').to_string(),
            next_id: 1,
            by_source: HashMap::new(),
            blobs: HashMap::new(),
        }
    }

    /// Return the live handle for `source` if it still wraps the entry written
    /// at `timestamp`, otherwise revoke it and mint a new one for `blob`.
    pub fn acquire(&mut self, source: Source, timestamp: i64, blob: &ImageBlob) -> DisplayHandle {
        if let Some(live) = self.by_source.get(&source) {
            if live.timestamp == timestamp {
                return live.handle.clone();
            }
        }

        self.revoke(source);

        let id = self.next_id;
        self.next_id += 1;
        let handle = DisplayHandle(format!("{}/{}", self.base, id));
        self.blobs.insert(id, Arc::new(blob.clone()));
        self.by_source.insert(
            source,
            LiveHandle {
                id,
                handle: handle.clone(),
                timestamp,
            },
        );
        debug!(source = %source, handle = %handle, "Minted display handle");
        handle
    }

    /// Release the live handle for `source`, returning whether one existed
    pub fn revoke(&mut self, source: Source) -> bool {
        match self.by_source.remove(&source) {
            Some(live) => {
                self.blobs.remove(&live.id);
                debug!(source = %source, handle = %live.handle, "Revoked display handle");
                true
            }
            None => false,
        }
    }

    /// Release every live handle, returning how many were released
    pub fn revoke_all(&mut self) -> usize {
        let count = self.by_source.len();
        self.by_source.clear();
        self.blobs.clear();
        count
    }

    pub fn live(&self, source: Source) -> Option<&DisplayHandle> {
        self.by_source.get(&source).map(|live| &live.handle)
    }

    /// Look up the blob behind a live handle
    pub fn resolve(&self, handle: &str) -> Option<Arc<ImageBlob>> {
        let id = handle
            .strip_prefix(self.base.as_str())?
            .strip_prefix('/')?
            .parse::<u64>()
            .ok()?;
        self.blobs.get(&id).cloned()
    }

    pub fn len(&self) -> usize {
        self.by_source.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_source.is_empty()
    }
}

impl Default for HandleRegistry {
    fn default() -> Self {
        Self::new(DEFAULT_HANDLE_BASE)
    }
}
