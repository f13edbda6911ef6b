//! In-memory collaborators shared by the unit tests.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::{HashMap, HashSet};
use std::sync::Mutex;

use crate::core::{
    DestinationHandler, DestinationSyncMode, Migration, MigrationResult, Sql, SqlGenerator,
    StreamConfig, StreamId,
};
use crate::error::{Result, TypingError};
use crate::state::{DestinationInitialState, DestinationState};

/// State with a schema version, so tests can see which migrations ran.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct VersionedState {
    pub version: u32,
    pub needs_soft_reset: bool,
}

impl DestinationState for VersionedState {
    fn needs_soft_reset(&self) -> bool {
        self.needs_soft_reset
    }

    fn with_soft_reset(&self, needs_soft_reset: bool) -> Self {
        Self {
            needs_soft_reset,
            ..self.clone()
        }
    }
}

pub fn stream_id(raw_ns: Option<&str>, final_ns: Option<&str>, name: &str) -> StreamId {
    StreamId {
        final_namespace: final_ns.map(str::to_string),
        final_name: name.to_string(),
        raw_namespace: raw_ns.map(str::to_string),
        raw_name: format!("raw_{}", name),
        original_namespace: Some("src".to_string()),
        original_name: name.to_string(),
    }
}

pub fn stream(name: &str) -> StreamConfig {
    StreamConfig::new(
        stream_id(Some("raw"), Some("final"), name),
        DestinationSyncMode::Append,
    )
}

pub fn initial<S: DestinationState>(name: &str, state: S) -> DestinationInitialState<S> {
    DestinationInitialState::new(stream(name), state)
}

/// Destination that records every call.
///
/// Streams without a preset come back with `is_final_table_present` and
/// `raw_table_exists` set, so tests can tell refetched records from the
/// originals.
#[derive(Default)]
pub struct RecordingHandler<S> {
    pub executed: Mutex<Vec<Sql>>,
    pub gather_calls: Mutex<Vec<Vec<StreamId>>>,
    pub commits: Mutex<Vec<HashMap<StreamId, S>>>,
    pub fail_gather: bool,
    pub fail_commit: bool,
    /// Statements containing this text fail.
    pub fail_statement: Option<String>,
    /// Extra stream appended to every gather response.
    pub gather_extra: Option<StreamConfig>,
    /// Streams left out of every gather response.
    pub gather_omit: HashSet<StreamId>,
    /// Fixed gather responses per stream.
    pub presets: HashMap<StreamId, DestinationInitialState<S>>,
}

impl<S> RecordingHandler<S> {
    pub fn executed_statements(&self) -> Vec<String> {
        self.executed
            .lock()
            .unwrap()
            .iter()
            .flat_map(|sql| sql.statements().map(str::to_string).collect::<Vec<_>>())
            .collect()
    }

    pub fn gather_calls(&self) -> Vec<Vec<StreamId>> {
        self.gather_calls.lock().unwrap().clone()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.lock().unwrap().len()
    }
}

#[async_trait]
impl<S: DestinationState + Default> DestinationHandler<S> for RecordingHandler<S> {
    async fn execute(&self, sql: &Sql) -> Result<()> {
        if let Some(ref needle) = self.fail_statement {
            if sql.statements().any(|s| s.contains(needle.as_str())) {
                return Err(TypingError::destination(format!("statement rejected: {}", needle)));
            }
        }
        self.executed.lock().unwrap().push(sql.clone());
        Ok(())
    }

    async fn gather_initial_state(
        &self,
        streams: &[StreamConfig],
    ) -> Result<Vec<DestinationInitialState<S>>> {
        self.gather_calls
            .lock()
            .unwrap()
            .push(streams.iter().map(|s| s.id.clone()).collect());
        if self.fail_gather {
            return Err(TypingError::destination("metadata query failed"));
        }
        let mut states: Vec<_> = streams
            .iter()
            .filter(|s| !self.gather_omit.contains(&s.id))
            .map(|s| {
                self.presets.get(&s.id).cloned().unwrap_or_else(|| {
                    let mut state = DestinationInitialState::new(s.clone(), S::default());
                    state.is_final_table_present = true;
                    state.initial_raw_table_status.raw_table_exists = true;
                    state
                })
            })
            .collect();
        if let Some(ref extra) = self.gather_extra {
            states.push(DestinationInitialState::new(extra.clone(), S::default()));
        }
        Ok(states)
    }

    async fn commit_destination_states(&self, states: HashMap<StreamId, S>) -> Result<()> {
        if self.fail_commit {
            return Err(TypingError::destination("state table unavailable"));
        }
        self.commits.lock().unwrap().push(states);
        Ok(())
    }
}

/// Emits readable pseudo-statements.
pub struct RecordingSqlGenerator;

impl SqlGenerator for RecordingSqlGenerator {
    fn create_schema(&self, namespace: &str) -> Sql {
        Sql::of(format!("CREATE SCHEMA IF NOT EXISTS {}", namespace))
    }

    fn create_table(&self, stream: &StreamConfig, suffix: &str, force: bool) -> Sql {
        Sql::of(format!(
            "CREATE{} TABLE {}{}",
            if force { " OR REPLACE" } else { "" },
            stream.id.final_table_ref(),
            suffix
        ))
    }

    fn update_table(
        &self,
        stream: &StreamConfig,
        final_suffix: &str,
        min_raw_timestamp: Option<DateTime<Utc>>,
        _use_expensive_extracted_at: bool,
    ) -> Sql {
        Sql::of(format!(
            "UPDATE {}{} FROM {}{}",
            stream.id.final_table_ref(),
            final_suffix,
            stream.id.raw_table_ref(),
            min_raw_timestamp
                .map(|ts| format!(" SINCE {}", ts.to_rfc3339()))
                .unwrap_or_default()
        ))
    }

    fn overwrite_final_table(&self, stream: &StreamId, final_suffix: &str) -> Sql {
        Sql::of(format!(
            "SWAP {}{} INTO {}",
            stream.final_table_ref(),
            final_suffix,
            stream.final_table_ref()
        ))
    }
}

/// Upgrades `VersionedState` to `target`, recording the version it saw.
pub struct VersionMigration {
    pub name: String,
    pub target: u32,
    /// Raw names (`raw_<name>`) whose migration invalidates the initial state.
    pub invalidate: HashSet<String>,
    /// Raw names whose migration fails.
    pub fail: HashSet<String>,
    /// Soft-reset flag the migration reports, regardless of input.
    pub soft_reset: bool,
    pub observed: Mutex<Vec<(String, u32)>>,
}

impl VersionMigration {
    pub fn new(name: &str, target: u32) -> Self {
        Self {
            name: name.to_string(),
            target,
            invalidate: HashSet::new(),
            fail: HashSet::new(),
            soft_reset: false,
            observed: Mutex::new(Vec::new()),
        }
    }

    pub fn invalidating(mut self, names: &[&str]) -> Self {
        self.invalidate = names.iter().map(|n| format!("raw_{}", n)).collect();
        self
    }

    pub fn failing(mut self, names: &[&str]) -> Self {
        self.fail = names.iter().map(|n| format!("raw_{}", n)).collect();
        self
    }

    pub fn requesting_soft_reset(mut self) -> Self {
        self.soft_reset = true;
        self
    }

    pub fn observed(&self) -> Vec<(String, u32)> {
        let mut observed = self.observed.lock().unwrap().clone();
        observed.sort();
        observed
    }
}

#[async_trait]
impl Migration<VersionedState> for VersionMigration {
    fn name(&self) -> &str {
        &self.name
    }

    fn require_migration(&self, state: &VersionedState) -> bool {
        state.version < self.target
    }

    async fn migrate_if_necessary(
        &self,
        _handler: &dyn DestinationHandler<VersionedState>,
        stream: &StreamConfig,
        initial_state: &DestinationInitialState<VersionedState>,
    ) -> Result<MigrationResult<VersionedState>> {
        let raw_name = stream.id.raw_name.clone();
        self.observed
            .lock()
            .unwrap()
            .push((raw_name.clone(), initial_state.destination_state.version));
        if self.fail.contains(&raw_name) {
            return Err(TypingError::destination(format!("cannot migrate {}", raw_name)));
        }
        Ok(MigrationResult {
            updated_destination_state: VersionedState {
                version: self.target,
                needs_soft_reset: self.soft_reset,
            },
            invalidate_initial_state: self.invalidate.contains(&raw_name),
        })
    }
}
