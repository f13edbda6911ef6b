//! Stream identity and static per-stream configuration.

use serde::{Deserialize, Serialize};
use std::fmt;

/// Source-side identity of a stream, as the sync driver names it.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamDescriptor {
    pub namespace: Option<String>,
    pub name: String,
}

impl StreamDescriptor {
    pub fn new(namespace: Option<&str>, name: &str) -> Self {
        Self {
            namespace: namespace.map(str::to_string),
            name: name.to_string(),
        }
    }
}

/// Identifier for one stream: where it came from and where its raw and
/// final tables live.
///
/// Two streams with equal ids are the same stream; a working set must never
/// contain duplicates.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct StreamId {
    pub final_namespace: Option<String>,
    pub final_name: String,
    pub raw_namespace: Option<String>,
    pub raw_name: String,
    pub original_namespace: Option<String>,
    pub original_name: String,
}

impl StreamId {
    /// Qualified raw table reference (`namespace.name`, or `name` alone).
    pub fn raw_table_ref(&self) -> String {
        qualify(self.raw_namespace.as_deref(), &self.raw_name)
    }

    /// Qualified final table reference (`namespace.name`, or `name` alone).
    pub fn final_table_ref(&self) -> String {
        qualify(self.final_namespace.as_deref(), &self.final_name)
    }

    pub fn descriptor(&self) -> StreamDescriptor {
        StreamDescriptor {
            namespace: self.original_namespace.clone(),
            name: self.original_name.clone(),
        }
    }

    /// Whether this stream was declared under the given source namespace/name.
    pub fn matches_original(&self, namespace: Option<&str>, name: &str) -> bool {
        self.original_namespace.as_deref() == namespace && self.original_name == name
    }
}

/// `raw -> final`, keeping an empty namespace visible (`.name`) so ids that
/// differ only in `None` vs `Some("")` render differently.
impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write_exact(f, self.raw_namespace.as_deref(), &self.raw_name)?;
        f.write_str(" -> ")?;
        write_exact(f, self.final_namespace.as_deref(), &self.final_name)
    }
}

fn write_exact(f: &mut fmt::Formatter<'_>, namespace: Option<&str>, name: &str) -> fmt::Result {
    match namespace {
        Some(ns) => write!(f, "{}.{}", ns, name),
        None => f.write_str(name),
    }
}

fn qualify(namespace: Option<&str>, name: &str) -> String {
    match namespace {
        Some(ns) if !ns.is_empty() => format!("{}.{}", ns, name),
        _ => name.to_string(),
    }
}

/// How records land in the final table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DestinationSyncMode {
    /// Append every record.
    #[default]
    Append,

    /// Replace the final table's contents with this sync's records.
    Overwrite,

    /// Append, then deduplicate on primary key using the cursor.
    AppendDedup,
}

/// A typed column of the final table.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ColumnDef {
    pub name: String,
    pub data_type: String,
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, data_type: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            data_type: data_type.into(),
        }
    }
}

/// Static configuration of one stream. Loaded once per sync and never mutated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamConfig {
    pub id: StreamId,

    #[serde(default)]
    pub sync_mode: DestinationSyncMode,

    /// Primary key columns (required for `AppendDedup`).
    #[serde(default)]
    pub primary_key: Vec<String>,

    /// Cursor column used to pick the latest record per key.
    #[serde(default)]
    pub cursor: Option<String>,

    #[serde(default)]
    pub columns: Vec<ColumnDef>,
}

impl StreamConfig {
    pub fn new(id: StreamId, sync_mode: DestinationSyncMode) -> Self {
        Self {
            id,
            sync_mode,
            primary_key: Vec::new(),
            cursor: None,
            columns: Vec::new(),
        }
    }

    pub fn with_primary_key(mut self, columns: &[&str]) -> Self {
        self.primary_key = columns.iter().map(|c| c.to_string()).collect();
        self
    }

    pub fn with_cursor(mut self, cursor: &str) -> Self {
        self.cursor = Some(cursor.to_string());
        self
    }

    pub fn with_column(mut self, column: ColumnDef) -> Self {
        self.columns.push(column);
        self
    }
}
