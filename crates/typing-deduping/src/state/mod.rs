//! Per-stream destination state tracked across a sync.
//!
//! Every stream carries a destination-defined [`DestinationState`] value plus
//! the table-shape flags gathered from the destination at the start of the
//! sync. Together they form a [`DestinationInitialState`], the unit of work
//! the migration orchestrator advances.
//!
//! Values are immutable: each step builds a new `DestinationInitialState`
//! instead of mutating the previous one.

mod commit;

pub use commit::StateCommitter;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

use crate::core::{StreamConfig, StreamId};

/// Capability every destination's state type must provide.
///
/// The soft-reset flag is monotonic during migration: the orchestrator ORs
/// the pre- and post-migration values, so a migration can request a soft
/// reset but never cancel one.
pub trait DestinationState: Clone + Debug + Send + Sync + 'static {
    /// Whether the final table must be rebuilt from the raw table.
    fn needs_soft_reset(&self) -> bool;

    /// Copy of this state with the soft-reset flag set to `needs_soft_reset`.
    fn with_soft_reset(&self, needs_soft_reset: bool) -> Self;
}

/// State for destinations that track nothing beyond the soft-reset flag.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MinimumDestinationState {
    #[serde(default)]
    pub needs_soft_reset: bool,
}

impl DestinationState for MinimumDestinationState {
    fn needs_soft_reset(&self) -> bool {
        self.needs_soft_reset
    }

    fn with_soft_reset(&self, needs_soft_reset: bool) -> Self {
        Self { needs_soft_reset }
    }
}

/// What the destination reported about a stream's raw table.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialRawTableStatus {
    pub raw_table_exists: bool,

    /// Raw records exist that have not been typed into the final table yet.
    pub has_unprocessed_records: bool,

    /// Extraction timestamp of the newest record already typed.
    pub max_processed_timestamp: Option<DateTime<Utc>>,
}

/// One stream's working unit: static config, destination shape, and state.
#[derive(Debug, Clone)]
pub struct DestinationInitialState<S> {
    pub stream_config: StreamConfig,
    pub is_final_table_present: bool,
    pub initial_raw_table_status: InitialRawTableStatus,
    pub is_schema_mismatch: bool,
    pub is_final_table_empty: bool,
    pub destination_state: S,
}

impl<S: DestinationState> DestinationInitialState<S> {
    /// A stream with no tables at the destination yet.
    pub fn new(stream_config: StreamConfig, destination_state: S) -> Self {
        Self {
            stream_config,
            is_final_table_present: false,
            initial_raw_table_status: InitialRawTableStatus::default(),
            is_schema_mismatch: false,
            is_final_table_empty: true,
            destination_state,
        }
    }

    pub fn id(&self) -> &StreamId {
        &self.stream_config.id
    }

    /// Copy of this record carrying `destination_state` instead.
    pub fn with_destination_state(&self, destination_state: S) -> Self {
        Self {
            destination_state,
            ..self.clone()
        }
    }
}
