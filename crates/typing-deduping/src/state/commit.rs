//! Single commit of per-stream state after a successful orchestration.

use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

use crate::core::{catalog::ensure_unique, DestinationHandler};
use crate::error::Result;

use super::{DestinationInitialState, DestinationState};

/// Persists the final state of every stream in one destination call.
///
/// `commit` consumes the committer, so one committer commits at most once.
pub struct StateCommitter<S: DestinationState> {
    handler: Arc<dyn DestinationHandler<S>>,
}

impl<S: DestinationState> StateCommitter<S> {
    pub fn new(handler: Arc<dyn DestinationHandler<S>>) -> Self {
        Self { handler }
    }

    pub async fn commit(self, states: &[DestinationInitialState<S>]) -> Result<()> {
        ensure_unique(states.iter().map(|s| s.id()))?;

        let by_stream: HashMap<_, _> = states
            .iter()
            .map(|s| (s.id().clone(), s.destination_state.clone()))
            .collect();

        info!("Committing destination state for {} stream(s)", by_stream.len());
        self.handler.commit_destination_states(by_stream).await
    }
}
