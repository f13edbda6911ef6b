//! Collaborator traits the engine is written against.
//!
//! - [`DestinationHandler`]: executes SQL and reads/writes per-stream state
//! - [`SqlGenerator`]: produces destination-specific statements
//! - [`Migration`]: one ordered structural upgrade applied to every stream
//!
//! Implementations live with each destination; the engine only orders and
//! parallelizes calls into them.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;

use crate::error::Result;
use crate::state::{DestinationInitialState, DestinationState};

use super::sql::Sql;
use super::stream::{StreamConfig, StreamId};

/// Access to the destination store.
///
/// Shared across concurrent per-stream tasks; implementations are
/// responsible for their own internal synchronization.
#[async_trait]
pub trait DestinationHandler<S: DestinationState>: Send + Sync {
    /// Execute every transaction in `sql`, in order.
    async fn execute(&self, sql: &Sql) -> Result<()>;

    /// Fetch table shape and stored state for the given streams.
    ///
    /// Must return exactly one record per requested stream.
    async fn gather_initial_state(
        &self,
        streams: &[StreamConfig],
    ) -> Result<Vec<DestinationInitialState<S>>>;

    /// Persist the final state of every stream in one call.
    async fn commit_destination_states(&self, states: HashMap<StreamId, S>) -> Result<()>;
}

/// Destination-specific SQL generation.
pub trait SqlGenerator: Send + Sync {
    /// Idempotent "create namespace if not exists".
    fn create_schema(&self, namespace: &str) -> Sql;

    /// Create the final table (plus `suffix`); `force` replaces an existing one.
    fn create_table(&self, stream: &StreamConfig, suffix: &str, force: bool) -> Sql;

    /// Type and deduplicate raw records newer than `min_raw_timestamp` into
    /// the final table (plus `final_suffix`).
    fn update_table(
        &self,
        stream: &StreamConfig,
        final_suffix: &str,
        min_raw_timestamp: Option<DateTime<Utc>>,
        use_expensive_extracted_at: bool,
    ) -> Sql;

    /// Swap the suffixed final table into place over the real one.
    fn overwrite_final_table(&self, stream: &StreamId, final_suffix: &str) -> Sql;
}

/// Outcome of running one migration against one stream.
#[derive(Debug, Clone)]
pub struct MigrationResult<S> {
    pub updated_destination_state: S,

    /// The migration changed the destination in a way that makes the
    /// previously gathered table-shape flags stale.
    pub invalidate_initial_state: bool,
}

impl<S> MigrationResult<S> {
    /// Result for a stream the migration did not touch.
    pub fn unchanged(state: S) -> Self {
        Self {
            updated_destination_state: state,
            invalidate_initial_state: false,
        }
    }
}

/// A structural upgrade applied to every stream before typing.
#[async_trait]
pub trait Migration<S: DestinationState>: Send + Sync {
    /// Name used in logs and errors.
    fn name(&self) -> &str;

    /// Whether `state` still needs this migration.
    fn require_migration(&self, state: &S) -> bool;

    /// Perform the migration. Called only when [`require_migration`](Self::require_migration)
    /// returned `true`.
    async fn migrate_if_necessary(
        &self,
        handler: &dyn DestinationHandler<S>,
        stream: &StreamConfig,
        initial_state: &DestinationInitialState<S>,
    ) -> Result<MigrationResult<S>>;
}
