//! Raw-tables-only implementation.
//!
//! Keeps raw tables and per-stream state migrated, but never creates,
//! types, or deduplicates final tables. Every final-table entry point logs
//! and returns, so drivers do not need to know which mode is active.

use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::core::{DestinationHandler, Migration, ParsedCatalog, SqlGenerator, StreamDescriptor};
use crate::error::Result;
use crate::orchestrator::WorkerPool;
use crate::state::DestinationState;

use super::{prepare_and_migrate, RawTableLock, StreamSyncSummary, TyperDeduper};

pub struct NoOpTyperDeduper<S: DestinationState> {
    sql_generator: Arc<dyn SqlGenerator>,
    handler: Arc<dyn DestinationHandler<S>>,
    catalog: Arc<ParsedCatalog>,
    migrations: Vec<Arc<dyn Migration<S>>>,
    pool: Arc<WorkerPool>,
}

impl<S: DestinationState> NoOpTyperDeduper<S> {
    pub fn new(
        sql_generator: Arc<dyn SqlGenerator>,
        handler: Arc<dyn DestinationHandler<S>>,
        catalog: Arc<ParsedCatalog>,
        migrations: Vec<Arc<dyn Migration<S>>>,
        pool: Arc<WorkerPool>,
    ) -> Self {
        Self {
            sql_generator,
            handler,
            catalog,
            migrations,
            pool,
        }
    }
}

#[async_trait]
impl<S: DestinationState> TyperDeduper for NoOpTyperDeduper<S> {
    async fn prepare_schemas_and_raw_tables(&self) -> Result<()> {
        // No final tables, so nothing here ever triggers a soft reset.
        prepare_and_migrate(
            self.sql_generator.as_ref(),
            &self.handler,
            &self.catalog,
            &self.migrations,
            &self.pool,
        )
        .await?;
        Ok(())
    }

    async fn prepare_final_tables(&self) -> Result<()> {
        info!("Skipping prepare_final_tables");
        Ok(())
    }

    async fn type_and_dedupe(
        &self,
        _original_namespace: Option<&str>,
        _original_name: &str,
        _must_run: bool,
    ) -> Result<()> {
        info!("Skipping type_and_dedupe");
        Ok(())
    }

    async fn raw_table_insert_lock(
        &self,
        _original_namespace: Option<&str>,
        _original_name: &str,
    ) -> Result<RawTableLock> {
        Ok(RawTableLock::NoOp)
    }

    async fn type_and_dedupe_all(
        &self,
        _summaries: &HashMap<StreamDescriptor, StreamSyncSummary>,
    ) -> Result<()> {
        info!("Skipping type_and_dedupe_all");
        Ok(())
    }

    async fn commit_final_tables(&self) -> Result<()> {
        info!("Skipping commit_final_tables");
        Ok(())
    }

    async fn cleanup(&self) {
        info!("Cleaning up {} worker pool", self.pool.name());
        self.pool.shutdown();
    }
}
