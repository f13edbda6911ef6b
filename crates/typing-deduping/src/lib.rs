//! # typing-deduping
//!
//! Migration orchestration for destinations that keep raw tables and typed,
//! deduplicated final tables.
//!
//! This library provides:
//!
//! - **Schema preparation** for every raw and final namespace in one batch
//! - **Ordered state migrations** fanned out per stream on a bounded worker pool
//! - **Batched refetch** of destination state after invalidating migrations
//! - **Single state commit** once every migration has succeeded
//! - **Raw-tables-only mode** that skips final tables entirely
//!
//! ## Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use typing_deduping::{build_typer_deduper, ParsedCatalog, TypingConfig};
//!
//! let config = TypingConfig::load("typing.yaml")?.with_auto_tuning();
//! let catalog = Arc::new(ParsedCatalog::new(streams)?);
//! let td = build_typer_deduper(&config, sql_generator, handler, catalog, migrations);
//!
//! td.prepare_schemas_and_raw_tables().await?;
//! td.prepare_final_tables().await?;
//! // ... load raw tables ...
//! td.type_and_dedupe_all(&summaries).await?;
//! td.commit_final_tables().await?;
//! td.cleanup().await;
//! ```

pub mod config;
pub mod core;
pub mod error;
pub mod logging;
pub mod orchestrator;
pub mod schema;
pub mod state;
pub mod typer_deduper;

#[cfg(test)]
mod testing;

// Re-exports for convenient access
pub use config::{SystemResources, TypingConfig};
pub use crate::core::{
    ColumnDef, DestinationHandler, DestinationSyncMode, Migration, MigrationResult, ParsedCatalog,
    Sql, SqlGenerator, StreamConfig, StreamDescriptor, StreamId,
};
pub use error::{Result, StreamFailure, TypingError};
pub use logging::{init_logging, LogFormat};
pub use orchestrator::{MigrationOrchestrator, WorkerPool};
pub use schema::prepare_schemas;
pub use state::{
    DestinationInitialState, DestinationState, InitialRawTableStatus, MinimumDestinationState,
    StateCommitter,
};
pub use typer_deduper::{
    build_typer_deduper, DefaultTyperDeduper, NoOpTyperDeduper, RawTableLock, StreamSyncSummary,
    TyperDeduper,
};
