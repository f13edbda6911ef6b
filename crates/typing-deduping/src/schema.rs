//! Namespace preparation for raw and final tables.

use std::collections::BTreeSet;
use tracing::{debug, info};

use crate::core::{DestinationHandler, Sql, SqlGenerator, StreamConfig};
use crate::error::Result;
use crate::state::DestinationState;

/// Ensure every raw and final namespace used by `streams` exists.
///
/// Issues one combined statement for the distinct, non-empty namespaces.
/// Safe to call on every sync.
pub async fn prepare_schemas<S: DestinationState>(
    sql_generator: &dyn SqlGenerator,
    handler: &dyn DestinationHandler<S>,
    streams: &[StreamConfig],
) -> Result<()> {
    let namespaces = distinct_namespaces(streams);
    if namespaces.is_empty() {
        debug!("No namespaces to prepare");
        return Ok(());
    }

    info!("Ensuring {} namespace(s) exist", namespaces.len());
    let sql = Sql::concat(namespaces.iter().map(|ns| sql_generator.create_schema(ns)));
    handler.execute(&sql).await
}

fn distinct_namespaces(streams: &[StreamConfig]) -> BTreeSet<String> {
    streams
        .iter()
        .flat_map(|s| [s.id.raw_namespace.as_deref(), s.id.final_namespace.as_deref()])
        .flatten()
        .filter(|ns| !ns.is_empty())
        .map(str::to_string)
        .collect()
}
