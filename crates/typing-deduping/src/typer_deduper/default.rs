//! Full typing/deduping over typed final tables.
//!
//! Each stream gets a reader/writer lock: raw-table inserts take the shared
//! side, type+dedup and the final-table swap take the exclusive side, so the
//! two never interleave on one stream.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::{Mutex, RwLock};
use tracing::{debug, info, info_span, Instrument};

use crate::core::{
    DestinationHandler, DestinationSyncMode, Migration, ParsedCatalog, Sql, SqlGenerator,
    StreamConfig, StreamDescriptor, StreamId,
};
use crate::error::{Result, TypingError};
use crate::orchestrator::{collect_outcomes, WorkerPool};
use crate::state::{DestinationInitialState, DestinationState, StateCommitter};

use super::{prepare_and_migrate, RawTableLock, StreamSyncSummary, TyperDeduper};

/// Suffix of the table a soft reset rebuilds into before swapping it in.
pub const SOFT_RESET_SUFFIX: &str = "_ab_soft_reset";

/// Suffix of the table an overwrite sync writes into until commit.
pub const OVERWRITE_SUFFIX: &str = "_airbyte_tmp";

/// Where type+dedup writes for one stream during this sync.
#[derive(Debug, Clone)]
struct FinalTableTarget {
    suffix: &'static str,
    /// Raw records at or before this were already typed by an earlier sync.
    min_raw_timestamp: Option<DateTime<Utc>>,
}

struct Inner<S: DestinationState> {
    sql_generator: Arc<dyn SqlGenerator>,
    handler: Arc<dyn DestinationHandler<S>>,
    catalog: Arc<ParsedCatalog>,
    migrations: Vec<Arc<dyn Migration<S>>>,
    locks: HashMap<StreamId, Arc<RwLock<()>>>,
    states: Mutex<Option<Vec<DestinationInitialState<S>>>>,
    targets: Mutex<HashMap<StreamId, FinalTableTarget>>,
}

pub struct DefaultTyperDeduper<S: DestinationState> {
    inner: Arc<Inner<S>>,
    pool: Arc<WorkerPool>,
}

impl<S: DestinationState> DefaultTyperDeduper<S> {
    pub fn new(
        sql_generator: Arc<dyn SqlGenerator>,
        handler: Arc<dyn DestinationHandler<S>>,
        catalog: Arc<ParsedCatalog>,
        migrations: Vec<Arc<dyn Migration<S>>>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        let locks = catalog
            .streams()
            .iter()
            .map(|s| (s.id.clone(), Arc::new(RwLock::new(()))))
            .collect();

        Self {
            inner: Arc::new(Inner {
                sql_generator,
                handler,
                catalog,
                migrations,
                locks,
                states: Mutex::new(None),
                targets: Mutex::new(HashMap::new()),
            }),
            pool,
        }
    }

    async fn prepared_states(&self, operation: &str) -> Result<Vec<DestinationInitialState<S>>> {
        self.inner.states.lock().await.clone().ok_or_else(|| {
            TypingError::InvalidState(format!(
                "{} called before prepare_schemas_and_raw_tables",
                operation
            ))
        })
    }
}

impl<S: DestinationState> Inner<S> {
    fn lock_for(&self, id: &StreamId) -> Result<Arc<RwLock<()>>> {
        self.locks
            .get(id)
            .cloned()
            .ok_or_else(|| TypingError::UnknownStream {
                namespace: id.original_namespace.clone(),
                name: id.original_name.clone(),
            })
    }

    /// Bring one final table into a loadable shape. Returns the record to
    /// commit (soft-reset flag cleared once a rebuild actually ran) and the
    /// table type+dedup should target.
    async fn prepare_final_table(
        &self,
        state: DestinationInitialState<S>,
    ) -> Result<(DestinationInitialState<S>, FinalTableTarget)> {
        let config = &state.stream_config;
        let final_table = config.id.final_table_ref();
        let incremental_from = state.initial_raw_table_status.max_processed_timestamp;

        if !state.is_final_table_present {
            info!("Final table {} does not exist, creating it", final_table);
            self.handler
                .execute(&self.sql_generator.create_table(config, "", false))
                .await?;
            return Ok((
                cleared(&state),
                FinalTableTarget {
                    suffix: "",
                    min_raw_timestamp: None,
                },
            ));
        }

        if config.sync_mode == DestinationSyncMode::Overwrite && !state.is_final_table_empty {
            info!(
                "Final table {} is not empty, writing to {}{} until commit",
                final_table, final_table, OVERWRITE_SUFFIX
            );
            self.handler
                .execute(&self.sql_generator.create_table(config, OVERWRITE_SUFFIX, true))
                .await?;
            return Ok((
                cleared(&state),
                FinalTableTarget {
                    suffix: OVERWRITE_SUFFIX,
                    min_raw_timestamp: None,
                },
            ));
        }

        if state.is_schema_mismatch || state.destination_state.needs_soft_reset() {
            info!(
                "Soft resetting final table {} (schema mismatch: {}, requested: {})",
                final_table,
                state.is_schema_mismatch,
                state.destination_state.needs_soft_reset()
            );
            let soft_reset = Sql::concat([
                self.sql_generator.create_table(config, SOFT_RESET_SUFFIX, true),
                self.sql_generator
                    .update_table(config, SOFT_RESET_SUFFIX, None, true),
                self.sql_generator
                    .overwrite_final_table(&config.id, SOFT_RESET_SUFFIX),
            ]);
            self.handler.execute(&soft_reset).await?;
            return Ok((
                cleared(&state),
                FinalTableTarget {
                    suffix: "",
                    min_raw_timestamp: incremental_from,
                },
            ));
        }

        debug!("Final table {} is ready", final_table);
        let target = FinalTableTarget {
            suffix: "",
            min_raw_timestamp: incremental_from,
        };
        Ok((state, target))
    }

    async fn type_and_dedupe_stream(&self, config: &StreamConfig, must_run: bool) -> Result<()> {
        let target = self
            .targets
            .lock()
            .await
            .get(&config.id)
            .cloned()
            .ok_or_else(|| {
                TypingError::InvalidState(format!(
                    "final table for {} was not prepared",
                    config.id.final_table_ref()
                ))
            })?;

        let lock = self.lock_for(&config.id)?;
        let _guard = if must_run {
            lock.write_owned().await
        } else {
            match lock.try_write_owned() {
                Ok(guard) => guard,
                Err(_) => {
                    debug!("Skipping type and dedupe for {}, raw table is busy", config.id);
                    return Ok(());
                }
            }
        };

        info!(
            "Typing and deduping {} into {}{}",
            config.id.raw_table_ref(),
            config.id.final_table_ref(),
            target.suffix
        );
        let sql = self.sql_generator.update_table(
            config,
            target.suffix,
            target.min_raw_timestamp,
            false,
        );
        self.handler.execute(&sql).await
    }

    async fn commit_final_table(&self, id: &StreamId, suffix: &str) -> Result<()> {
        let lock = self.lock_for(id)?;
        let _guard = lock.write_owned().await;
        let final_table = id.final_table_ref();
        info!("Overwriting final table {} with {}{}", final_table, final_table, suffix);
        self.handler
            .execute(&self.sql_generator.overwrite_final_table(id, suffix))
            .await
    }
}

fn cleared<S: DestinationState>(state: &DestinationInitialState<S>) -> DestinationInitialState<S> {
    state.with_destination_state(state.destination_state.with_soft_reset(false))
}

#[async_trait]
impl<S: DestinationState> TyperDeduper for DefaultTyperDeduper<S> {
    async fn prepare_schemas_and_raw_tables(&self) -> Result<()> {
        let states = prepare_and_migrate(
            self.inner.sql_generator.as_ref(),
            &self.inner.handler,
            &self.inner.catalog,
            &self.inner.migrations,
            &self.pool,
        )
        .await?;
        *self.inner.states.lock().await = Some(states);
        Ok(())
    }

    async fn prepare_final_tables(&self) -> Result<()> {
        let states = self.prepared_states("prepare_final_tables").await?;

        let jobs: Vec<_> = states
            .into_iter()
            .map(|state| {
                let inner = self.inner.clone();
                let id = state.id().clone();
                let span = info_span!("final_table", stream = %id);
                let job = async move { inner.prepare_final_table(state).await }.instrument(span);
                (id, job)
            })
            .collect();
        let prepared = collect_outcomes("Prepare final tables", self.pool.run_all(jobs).await)?;

        let mut targets = HashMap::with_capacity(prepared.len());
        let mut updated = Vec::with_capacity(prepared.len());
        for (id, (state, target)) in prepared {
            targets.insert(id, target);
            updated.push(state);
        }

        StateCommitter::new(self.inner.handler.clone())
            .commit(&updated)
            .await?;

        *self.inner.targets.lock().await = targets;
        *self.inner.states.lock().await = Some(updated);
        Ok(())
    }

    async fn type_and_dedupe(
        &self,
        original_namespace: Option<&str>,
        original_name: &str,
        must_run: bool,
    ) -> Result<()> {
        let config = self
            .inner
            .catalog
            .get_stream(original_namespace, original_name)?;
        let span = info_span!("type_and_dedupe", stream = %config.id);
        self.inner
            .type_and_dedupe_stream(config, must_run)
            .instrument(span)
            .await
    }

    async fn raw_table_insert_lock(
        &self,
        original_namespace: Option<&str>,
        original_name: &str,
    ) -> Result<RawTableLock> {
        let config = self
            .inner
            .catalog
            .get_stream(original_namespace, original_name)?;
        let lock = self.inner.lock_for(&config.id)?;
        Ok(RawTableLock::Shared(lock.read_owned().await))
    }

    async fn type_and_dedupe_all(
        &self,
        summaries: &HashMap<StreamDescriptor, StreamSyncSummary>,
    ) -> Result<()> {
        let states = self.prepared_states("type_and_dedupe_all").await?;

        let jobs: Vec<_> = states
            .into_iter()
            .filter(|state| {
                // unreported streams count as "may have written"
                let wrote = summaries
                    .get(&state.id().descriptor())
                    .copied()
                    .unwrap_or_default()
                    .may_have_written_records();
                let unprocessed = state.initial_raw_table_status.has_unprocessed_records;
                if !wrote && !unprocessed {
                    info!("Skipping type and dedupe for {}, no new records", state.id());
                }
                wrote || unprocessed
            })
            .map(|state| {
                let inner = self.inner.clone();
                let config = state.stream_config;
                let id = config.id.clone();
                let span = info_span!("type_and_dedupe", stream = %id);
                let job =
                    async move { inner.type_and_dedupe_stream(&config, true).await }.instrument(span);
                (id, job)
            })
            .collect();

        collect_outcomes("Type and dedupe", self.pool.run_all(jobs).await)?;
        Ok(())
    }

    async fn commit_final_tables(&self) -> Result<()> {
        let mut pending: Vec<(StreamId, &'static str)> = self
            .inner
            .targets
            .lock()
            .await
            .iter()
            .filter(|(_, target)| !target.suffix.is_empty())
            .map(|(id, target)| (id.clone(), target.suffix))
            .collect();
        pending.sort();

        let jobs: Vec<_> = pending
            .into_iter()
            .map(|(id, suffix)| {
                let inner = self.inner.clone();
                let span = info_span!("commit_final_table", stream = %id);
                let key = id.clone();
                let job = async move { inner.commit_final_table(&id, suffix).await }.instrument(span);
                (key, job)
            })
            .collect();
        let committed = collect_outcomes("Commit final tables", self.pool.run_all(jobs).await)?;

        let mut targets = self.inner.targets.lock().await;
        for (id, ()) in committed {
            if let Some(target) = targets.get_mut(&id) {
                target.suffix = "";
            }
        }
        Ok(())
    }

    async fn cleanup(&self) {
        info!("Cleaning up {} worker pool", self.pool.name());
        self.pool.shutdown();
    }
}
