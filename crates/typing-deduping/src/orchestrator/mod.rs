//! Migration orchestrator - applies ordered migrations across every stream.
//!
//! Migrations run strictly one after another. Within a migration, one task
//! per stream runs on the shared [`WorkerPool`]; the orchestrator waits for
//! all of them before deciding whether to continue. Any failure aborts the
//! run with a single aggregated error, so no stream advances past a
//! migration another stream failed.

mod pool;
mod refetch;
mod task;

pub use pool::WorkerPool;
pub(crate) use pool::collect_outcomes;

use std::sync::Arc;
use tracing::{info, info_span, Instrument};

use crate::core::{catalog::ensure_unique, DestinationHandler, Migration};
use crate::error::Result;
use crate::state::{DestinationInitialState, DestinationState};

/// Drives the ordered migration list over the working set of streams.
pub struct MigrationOrchestrator<S: DestinationState> {
    handler: Arc<dyn DestinationHandler<S>>,
    pool: Arc<WorkerPool>,
}

impl<S: DestinationState> MigrationOrchestrator<S> {
    pub fn new(handler: Arc<dyn DestinationHandler<S>>, pool: Arc<WorkerPool>) -> Self {
        Self { handler, pool }
    }

    /// Apply `migrations` in order and return the advanced working list.
    ///
    /// The returned list holds the same streams in the same order. Duplicate
    /// stream ids in `initial_states` are rejected before anything runs.
    pub async fn execute_migrations(
        &self,
        migrations: &[Arc<dyn Migration<S>>],
        initial_states: Vec<DestinationInitialState<S>>,
    ) -> Result<Vec<DestinationInitialState<S>>> {
        ensure_unique(initial_states.iter().map(|s| s.id()))?;

        let mut current = initial_states;
        if current.is_empty() {
            return Ok(current);
        }

        for (step, migration) in migrations.iter().enumerate() {
            info!(
                "Running migration {} ({}/{}) across {} streams on {} workers",
                migration.name(),
                step + 1,
                migrations.len(),
                current.len(),
                self.pool.size()
            );

            let jobs: Vec<_> = current
                .iter()
                .map(|state| {
                    let span = info_span!(
                        "migration",
                        migration = migration.name(),
                        stream = %state.id()
                    );
                    let job = task::migrate_stream(
                        self.handler.clone(),
                        migration.clone(),
                        state.clone(),
                    )
                    .instrument(span);
                    (state.id().clone(), job)
                })
                .collect();

            let outcomes = self.pool.run_all(jobs).await;
            let results = collect_outcomes(&format!("Migration {}", migration.name()), outcomes)?
                .into_iter()
                .map(|(_, result)| result)
                .collect();

            current = refetch::rebuild_states(self.handler.as_ref(), current, results).await?;
        }

        info!("Completed {} migration(s)", migrations.len());
        Ok(current)
    }
}
