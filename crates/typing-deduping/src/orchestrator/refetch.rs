//! Folding one migration's per-stream results back into the working list.

use std::collections::HashMap;
use tracing::{debug, info};

use crate::core::{catalog::ensure_unique, DestinationHandler, MigrationResult, StreamConfig, StreamId};
use crate::error::{Result, TypingError};
use crate::state::{DestinationInitialState, DestinationState};

/// Build the working list for the next migration.
///
/// `results` must be aligned with `current`. Streams whose migration
/// invalidated the initial state are refetched in a single
/// `gather_initial_state` call; the refetched record is kept for its table
/// flags, but its state is replaced by the migration's own result. Other
/// streams keep their record with the new state swapped in. Stream order is
/// preserved.
pub(crate) async fn rebuild_states<S: DestinationState>(
    handler: &dyn DestinationHandler<S>,
    current: Vec<DestinationInitialState<S>>,
    results: Vec<MigrationResult<S>>,
) -> Result<Vec<DestinationInitialState<S>>> {
    let invalidated: Vec<StreamConfig> = current
        .iter()
        .zip(&results)
        .filter(|(_, result)| result.invalidate_initial_state)
        .map(|(state, _)| state.stream_config.clone())
        .collect();

    let mut refetched = if invalidated.is_empty() {
        debug!("No streams invalidated, skipping refetch");
        HashMap::new()
    } else {
        info!(
            "Refetching initial state for {} invalidated stream(s)",
            invalidated.len()
        );
        let states = handler.gather_initial_state(&invalidated).await?;
        index_refetched(&invalidated, states)?
    };

    current
        .into_iter()
        .zip(results)
        .map(|(state, result)| {
            if result.invalidate_initial_state {
                let fresh = refetched.remove(state.id()).ok_or_else(|| {
                    TypingError::Refetch(format!("missing stream {}", state.id()))
                })?;
                Ok(fresh.with_destination_state(result.updated_destination_state))
            } else {
                Ok(state.with_destination_state(result.updated_destination_state))
            }
        })
        .collect()
}

/// Key refetched records by stream, checking they match what was requested.
fn index_refetched<S: DestinationState>(
    requested: &[StreamConfig],
    states: Vec<DestinationInitialState<S>>,
) -> Result<HashMap<StreamId, DestinationInitialState<S>>> {
    ensure_unique(states.iter().map(|s| s.id()))
        .map_err(|e| TypingError::Refetch(e.to_string()))?;

    let mut by_id: HashMap<StreamId, DestinationInitialState<S>> = states
        .into_iter()
        .map(|s| (s.id().clone(), s))
        .collect();

    let mut indexed = HashMap::with_capacity(requested.len());
    for config in requested {
        let state = by_id
            .remove(&config.id)
            .ok_or_else(|| TypingError::Refetch(format!("missing stream {}", config.id)))?;
        indexed.insert(config.id.clone(), state);
    }

    if let Some(extra) = by_id.keys().next() {
        return Err(TypingError::Refetch(format!("unrequested stream {}", extra)));
    }

    Ok(indexed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{initial, stream, RecordingHandler, VersionedState};

    fn v(version: u32, needs_soft_reset: bool) -> VersionedState {
        VersionedState {
            version,
            needs_soft_reset,
        }
    }

    fn result(state: VersionedState, invalidate: bool) -> MigrationResult<VersionedState> {
        MigrationResult {
            updated_destination_state: state,
            invalidate_initial_state: invalidate,
        }
    }

    #[tokio::test]
    async fn test_no_invalidation_never_refetches() {
        let handler = RecordingHandler::<VersionedState>::default();
        let current = vec![initial("a", v(1, false)), initial("b", v(1, false))];

        let rebuilt = rebuild_states::<VersionedState>(
            &handler,
            current,
            vec![result(v(2, false), false), result(v(2, true), false)],
        )
        .await
        .unwrap();

        assert!(handler.gather_calls().is_empty());
        assert_eq!(rebuilt[0].destination_state, v(2, false));
        assert_eq!(rebuilt[1].destination_state, v(2, true));
        assert!(!rebuilt[0].is_final_table_present);
    }

    #[tokio::test]
    async fn test_single_refetch_for_invalidated_streams() {
        let handler = RecordingHandler::<VersionedState>::default();
        let current = vec![
            initial("a", v(1, false)),
            initial("b", v(1, false)),
            initial("c", v(1, false)),
        ];

        let rebuilt = rebuild_states::<VersionedState>(
            &handler,
            current,
            vec![
                result(v(2, true), true),
                result(v(2, false), false),
                result(v(2, false), true),
            ],
        )
        .await
        .unwrap();

        let calls = handler.gather_calls();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0], vec![stream("a").id, stream("c").id]);

        // refetched metadata, migration-computed state
        assert!(rebuilt[0].is_final_table_present);
        assert_eq!(rebuilt[0].destination_state, v(2, true));
        assert!(!rebuilt[1].is_final_table_present);
        assert!(rebuilt[2].is_final_table_present);
        assert_eq!(rebuilt[2].destination_state, v(2, false));

        let order: Vec<_> = rebuilt.iter().map(|s| s.id().raw_name.clone()).collect();
        assert_eq!(order, ["raw_a", "raw_b", "raw_c"]);
    }

    #[tokio::test]
    async fn test_refetch_failure_propagates() {
        let handler = RecordingHandler::<VersionedState> {
            fail_gather: true,
            ..Default::default()
        };

        let err = rebuild_states::<VersionedState>(
            &handler,
            vec![initial("a", v(1, false))],
            vec![result(v(2, false), true)],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TypingError::Destination(_)));
    }

    #[tokio::test]
    async fn test_refetch_missing_stream_is_rejected() {
        let handler = RecordingHandler::<VersionedState> {
            gather_omit: [stream("a").id].into_iter().collect(),
            ..Default::default()
        };

        let err = rebuild_states::<VersionedState>(
            &handler,
            vec![initial("a", v(1, false))],
            vec![result(v(2, false), true)],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TypingError::Refetch(ref m) if m.contains("missing stream raw.raw_a -> final.a")));
    }

    #[tokio::test]
    async fn test_refetch_unrequested_stream_is_rejected() {
        let handler = RecordingHandler::<VersionedState> {
            gather_extra: Some(stream("zzz")),
            ..Default::default()
        };

        let err = rebuild_states::<VersionedState>(
            &handler,
            vec![initial("a", v(1, false))],
            vec![result(v(2, false), true)],
        )
        .await
        .unwrap_err();

        assert!(matches!(err, TypingError::Refetch(ref m) if m.contains("unrequested")));
    }
}
