//! The set of streams taking part in one sync.

use std::collections::HashSet;

use crate::error::{Result, TypingError};

use super::stream::{StreamConfig, StreamId};

/// Ordered, duplicate-free list of stream configurations.
///
/// Constructed once per sync by the driver and shared read-only with the
/// orchestrators.
#[derive(Debug, Clone, Default)]
pub struct ParsedCatalog {
    streams: Vec<StreamConfig>,
}

impl ParsedCatalog {
    /// Build a catalog, rejecting any stream id that appears more than once.
    pub fn new(streams: Vec<StreamConfig>) -> Result<Self> {
        ensure_unique(streams.iter().map(|s| &s.id))?;
        Ok(Self { streams })
    }

    pub fn streams(&self) -> &[StreamConfig] {
        &self.streams
    }

    pub fn len(&self) -> usize {
        self.streams.len()
    }

    pub fn is_empty(&self) -> bool {
        self.streams.is_empty()
    }

    /// Find a stream by its source namespace and name.
    pub fn get_stream(&self, namespace: Option<&str>, name: &str) -> Result<&StreamConfig> {
        self.streams
            .iter()
            .find(|s| s.id.matches_original(namespace, name))
            .ok_or_else(|| TypingError::UnknownStream {
                namespace: namespace.map(str::to_string),
                name: name.to_string(),
            })
    }
}

/// Fail with `DuplicateStream` on the first id seen twice.
pub(crate) fn ensure_unique<'a>(ids: impl IntoIterator<Item = &'a StreamId>) -> Result<()> {
    let mut seen = HashSet::new();
    for id in ids {
        if !seen.insert(id) {
            return Err(TypingError::DuplicateStream(id.to_string()));
        }
    }
    Ok(())
}
