//! Core abstractions shared by every orchestration component.
//!
//! - [`stream`]: stream identity and static per-stream configuration
//! - [`catalog`]: the duplicate-free set of streams in one sync
//! - [`sql`]: executable SQL units
//! - [`traits`]: destination, SQL generator, and migration contracts
//!
//! Destinations implement the traits; the orchestrator modules only depend
//! on this module, never on a concrete destination.

pub mod catalog;
pub mod sql;
pub mod stream;
pub mod traits;

pub use catalog::ParsedCatalog;
pub use sql::Sql;
pub use stream::{ColumnDef, DestinationSyncMode, StreamConfig, StreamDescriptor, StreamId};
pub use traits::{DestinationHandler, Migration, MigrationResult, SqlGenerator};
