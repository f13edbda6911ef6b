//! Configuration type definitions with auto-tuning based on system resources.

use serde::{Deserialize, Serialize};
use sysinfo::System;
use tracing::info;

/// Fallback pool size when neither config nor auto-tuning provided one.
pub const DEFAULT_TYPE_AND_DEDUPE_THREADS: usize = 8;

/// System resource information for auto-tuning.
#[derive(Debug, Clone)]
pub struct SystemResources {
    /// Total RAM in GB.
    pub total_memory_gb: f64,
    /// Number of CPU cores.
    pub cpu_cores: usize,
}

impl SystemResources {
    /// Detect system resources.
    pub fn detect() -> Self {
        let mut sys = System::new_all();
        sys.refresh_all();

        Self {
            total_memory_gb: sys.total_memory() as f64 / (1024.0 * 1024.0 * 1024.0),
            cpu_cores: sys.cpus().len(),
        }
    }

    /// Log detected system resources.
    pub fn log(&self) {
        info!(
            "System resources: {:.1} GB RAM, {} CPU cores",
            self.total_memory_gb, self.cpu_cores
        );
    }
}

/// Typing/deduping engine configuration.
///
/// Performance fields use `Option<T>` to distinguish "not set" (auto-tuned)
/// from "explicitly set".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TypingConfig {
    /// Worker pool size for per-stream tasks. Auto-tuned from CPU cores if not set.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub type_and_dedupe_threads: Option<usize>,

    /// Upper bound on concurrent destination connections. The pool never
    /// exceeds it.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_destination_connections: Option<usize>,

    /// Skip final tables entirely, only keeping raw tables migrated.
    #[serde(default)]
    pub disable_type_dedupe: bool,

    /// Name given to the worker pool in logs.
    #[serde(default = "default_pool_name")]
    pub pool_name: String,
}

impl Default for TypingConfig {
    fn default() -> Self {
        Self {
            type_and_dedupe_threads: None,
            max_destination_connections: None,
            disable_type_dedupe: false,
            pool_name: default_pool_name(),
        }
    }
}

impl TypingConfig {
    /// Apply auto-tuned defaults based on detected system resources.
    pub fn with_auto_tuning(self) -> Self {
        let resources = SystemResources::detect();
        resources.log();
        self.with_auto_tuning_for(&resources)
    }

    /// Apply auto-tuned defaults for the given resources.
    /// Only fills in values that are None (not explicitly set).
    pub fn with_auto_tuning_for(mut self, resources: &SystemResources) -> Self {
        // Threads: one per core, at least 2 and at most the default
        if self.type_and_dedupe_threads.is_none() {
            let mut threads = resources
                .cpu_cores
                .clamp(2, DEFAULT_TYPE_AND_DEDUPE_THREADS);
            if let Some(max_conns) = self.max_destination_connections {
                threads = threads.min(max_conns.max(1));
            }
            self.type_and_dedupe_threads = Some(threads);
        }

        info!(
            "Auto-tuned config: type_and_dedupe_threads={}, max_destination_connections={:?}",
            self.get_type_and_dedupe_threads(),
            self.max_destination_connections
        );

        self
    }

    /// Effective pool size, never above `max_destination_connections`.
    pub fn get_type_and_dedupe_threads(&self) -> usize {
        let threads = self
            .type_and_dedupe_threads
            .unwrap_or(DEFAULT_TYPE_AND_DEDUPE_THREADS);
        let bounded = match self.max_destination_connections {
            Some(max_conns) => threads.min(max_conns),
            None => threads,
        };
        bounded.max(1)
    }
}

fn default_pool_name() -> String {
    "type-and-dedupe".to_string()
}
