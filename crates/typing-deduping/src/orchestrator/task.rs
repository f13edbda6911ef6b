//! One migration applied to one stream.

use std::sync::Arc;
use tracing::{debug, info};

use crate::core::{DestinationHandler, Migration, MigrationResult};
use crate::error::Result;
use crate::state::{DestinationInitialState, DestinationState};

/// Run `migration` against a single stream.
///
/// Streams that no longer need the migration are returned untouched without
/// calling the destination. The soft-reset flag of the result is the OR of
/// the flag before and after the migration.
pub(crate) async fn migrate_stream<S: DestinationState>(
    handler: Arc<dyn DestinationHandler<S>>,
    migration: Arc<dyn Migration<S>>,
    initial_state: DestinationInitialState<S>,
) -> Result<MigrationResult<S>> {
    if !migration.require_migration(&initial_state.destination_state) {
        debug!("Migration not required");
        return Ok(MigrationResult::unchanged(initial_state.destination_state));
    }

    info!("Running migration");
    let needed_soft_reset = initial_state.destination_state.needs_soft_reset();
    let result = migration
        .migrate_if_necessary(handler.as_ref(), &initial_state.stream_config, &initial_state)
        .await?;

    let needs_soft_reset = needed_soft_reset || result.updated_destination_state.needs_soft_reset();
    if needs_soft_reset && !needed_soft_reset {
        info!("Migration requested a soft reset");
    }

    Ok(MigrationResult {
        updated_destination_state: result
            .updated_destination_state
            .with_soft_reset(needs_soft_reset),
        invalidate_initial_state: result.invalidate_initial_state,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{initial, RecordingHandler, VersionMigration, VersionedState};

    fn handler() -> Arc<dyn DestinationHandler<VersionedState>> {
        Arc::new(RecordingHandler::<VersionedState>::default())
    }

    #[tokio::test]
    async fn test_not_required_returns_state_unchanged() {
        let migration = Arc::new(VersionMigration::new("v2", 2));
        let state = VersionedState {
            version: 2,
            needs_soft_reset: true,
        };

        let result =
            migrate_stream::<VersionedState>(handler(), migration.clone(), initial("a", state.clone()))
                .await
                .unwrap();

        assert_eq!(result.updated_destination_state, state);
        assert!(!result.invalidate_initial_state);
        assert!(migration.observed().is_empty());
    }

    #[tokio::test]
    async fn test_migration_cannot_clear_soft_reset() {
        // the migration itself reports needs_soft_reset = false
        let migration = Arc::new(VersionMigration::new("v2", 2));
        let state = VersionedState {
            version: 1,
            needs_soft_reset: true,
        };

        let result = migrate_stream::<VersionedState>(handler(), migration, initial("a", state))
            .await
            .unwrap();

        assert_eq!(result.updated_destination_state.version, 2);
        assert!(result.updated_destination_state.needs_soft_reset);
    }

    #[tokio::test]
    async fn test_migration_can_request_soft_reset() {
        let migration = Arc::new(
            VersionMigration::new("v2", 2)
                .requesting_soft_reset()
                .invalidating(&["a"]),
        );

        let result =
            migrate_stream::<VersionedState>(handler(), migration, initial("a", VersionedState::default()))
                .await
                .unwrap();

        assert!(result.updated_destination_state.needs_soft_reset);
        assert!(result.invalidate_initial_state);
    }

    #[tokio::test]
    async fn test_migration_error_propagates() {
        let migration = Arc::new(VersionMigration::new("v2", 2).failing(&["a"]));

        let state = initial("a", VersionedState::default());
        let result = migrate_stream::<VersionedState>(handler(), migration, state).await;

        assert!(result.is_err());
    }
}
