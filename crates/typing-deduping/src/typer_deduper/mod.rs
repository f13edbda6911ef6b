//! Sync-lifecycle entry points for typing and deduplication.
//!
//! The driver calls a [`TyperDeduper`] in a fixed sequence each sync:
//!
//! 1. [`prepare_schemas_and_raw_tables`](TyperDeduper::prepare_schemas_and_raw_tables)
//! 2. [`prepare_final_tables`](TyperDeduper::prepare_final_tables)
//! 3. while loading: [`raw_table_insert_lock`](TyperDeduper::raw_table_insert_lock)
//!    around raw inserts, and optionally [`type_and_dedupe`](TyperDeduper::type_and_dedupe)
//! 4. [`type_and_dedupe_all`](TyperDeduper::type_and_dedupe_all) with the sync summaries
//! 5. [`commit_final_tables`](TyperDeduper::commit_final_tables)
//! 6. [`cleanup`](TyperDeduper::cleanup), always
//!
//! Two implementations exist: [`DefaultTyperDeduper`] maintains typed final
//! tables, [`NoOpTyperDeduper`] only keeps raw tables migrated. Use
//! [`build_typer_deduper`] to pick one from configuration.

mod default;
mod noop;

pub use default::{DefaultTyperDeduper, OVERWRITE_SUFFIX, SOFT_RESET_SUFFIX};
pub use noop::NoOpTyperDeduper;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::OwnedRwLockReadGuard;

use crate::config::TypingConfig;
use crate::core::{
    DestinationHandler, Migration, ParsedCatalog, SqlGenerator, StreamDescriptor,
};
use crate::error::Result;
use crate::orchestrator::{MigrationOrchestrator, WorkerPool};
use crate::schema::prepare_schemas;
use crate::state::{DestinationInitialState, DestinationState, StateCommitter};

/// What the driver observed for one stream during the sync.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreamSyncSummary {
    /// Records written to the raw table, if the driver counted them.
    pub records_written: Option<u64>,
}

impl StreamSyncSummary {
    pub fn new(records_written: u64) -> Self {
        Self {
            records_written: Some(records_written),
        }
    }

    /// Unknown counts are treated as "maybe wrote records".
    pub fn may_have_written_records(&self) -> bool {
        self.records_written.map_or(true, |n| n > 0)
    }
}

/// Held by the driver while inserting into a stream's raw table.
///
/// Dropping the lock releases it.
#[must_use = "the lock is released as soon as it is dropped"]
#[derive(Debug)]
pub enum RawTableLock {
    /// Nothing to exclude; type+dedup never runs.
    NoOp,
    /// Shared side of the stream's lock; type+dedup takes the exclusive side.
    Shared(OwnedRwLockReadGuard<()>),
}

impl RawTableLock {
    pub fn is_noop(&self) -> bool {
        matches!(self, RawTableLock::NoOp)
    }
}

/// Mode-agnostic typing/deduping lifecycle.
#[async_trait]
pub trait TyperDeduper: Send + Sync {
    /// Ensure namespaces, run raw-table migrations, and commit updated state.
    async fn prepare_schemas_and_raw_tables(&self) -> Result<()>;

    /// Create or repair final tables before loading starts.
    async fn prepare_final_tables(&self) -> Result<()>;

    /// Type and dedupe one stream mid-sync. With `must_run == false` the call
    /// is skipped when the stream is busy.
    async fn type_and_dedupe(
        &self,
        original_namespace: Option<&str>,
        original_name: &str,
        must_run: bool,
    ) -> Result<()>;

    /// Lock to hold while inserting into a stream's raw table.
    async fn raw_table_insert_lock(
        &self,
        original_namespace: Option<&str>,
        original_name: &str,
    ) -> Result<RawTableLock>;

    /// End-of-sync type and dedupe for every stream that needs it.
    async fn type_and_dedupe_all(
        &self,
        summaries: &HashMap<StreamDescriptor, StreamSyncSummary>,
    ) -> Result<()>;

    /// Publish final tables that were built under a temporary name.
    async fn commit_final_tables(&self) -> Result<()>;

    /// Release the worker pool. Safe to call more than once.
    async fn cleanup(&self);
}

/// Pick the implementation requested by `config`.
pub fn build_typer_deduper<S: DestinationState>(
    config: &TypingConfig,
    sql_generator: Arc<dyn SqlGenerator>,
    handler: Arc<dyn DestinationHandler<S>>,
    catalog: Arc<ParsedCatalog>,
    migrations: Vec<Arc<dyn Migration<S>>>,
) -> Box<dyn TyperDeduper> {
    let pool = Arc::new(WorkerPool::new(
        config.pool_name.clone(),
        config.get_type_and_dedupe_threads(),
    ));

    if config.disable_type_dedupe {
        Box::new(NoOpTyperDeduper::new(
            sql_generator,
            handler,
            catalog,
            migrations,
            pool,
        ))
    } else {
        Box::new(DefaultTyperDeduper::new(
            sql_generator,
            handler,
            catalog,
            migrations,
            pool,
        ))
    }
}

/// Shared first phase of both implementations: namespaces, initial state,
/// migrations, and one state commit.
pub(crate) async fn prepare_and_migrate<S: DestinationState>(
    sql_generator: &dyn SqlGenerator,
    handler: &Arc<dyn DestinationHandler<S>>,
    catalog: &ParsedCatalog,
    migrations: &[Arc<dyn Migration<S>>],
    pool: &Arc<WorkerPool>,
) -> Result<Vec<DestinationInitialState<S>>> {
    prepare_schemas(sql_generator, handler.as_ref(), catalog.streams()).await?;

    let initial_states = handler.gather_initial_state(catalog.streams()).await?;

    let states = MigrationOrchestrator::new(handler.clone(), pool.clone())
        .execute_migrations(migrations, initial_states)
        .await?;

    StateCommitter::new(handler.clone()).commit(&states).await?;
    Ok(states)
}
