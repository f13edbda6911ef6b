//! Error types for the typing/deduping engine.

use thiserror::Error;

/// A single stream's failure inside a concurrent step.
#[derive(Debug, Clone)]
pub struct StreamFailure {
    /// Qualified raw table of the failing stream.
    pub stream: String,

    /// Rendered error message.
    pub message: String,
}

impl std::fmt::Display for StreamFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.stream, self.message)
    }
}

/// Main error type for typing/deduping operations.
#[derive(Error, Debug)]
pub enum TypingError {
    /// Configuration error (invalid YAML, out-of-range values, etc.)
    #[error("Configuration error: {0}")]
    Config(String),

    /// The same stream appeared twice in one working set
    #[error("Duplicate stream in working set: {0}")]
    DuplicateStream(String),

    /// No stream in the catalog matches the given descriptor
    #[error("Unknown stream {}.{name}", .namespace.as_deref().unwrap_or(""))]
    UnknownStream {
        namespace: Option<String>,
        name: String,
    },

    /// Destination collaborator failure (execute, gather, commit)
    #[error("Destination error: {0}")]
    Destination(String),

    /// One or more per-stream tasks failed during a concurrent step
    #[error("{operation} failed for {} stream(s): {}", .failures.len(), join_failures(.failures))]
    StreamFailures {
        operation: String,
        failures: Vec<StreamFailure>,
    },

    /// The batched refetch returned a set of streams that does not match the request
    #[error("Refetch of destination state returned inconsistent streams: {0}")]
    Refetch(String),

    /// A spawned task panicked or was aborted
    #[error("Task panicked: {0}")]
    TaskPanicked(String),

    /// The worker pool was released before the task was submitted
    #[error("Worker pool {0} is closed")]
    PoolClosed(String),

    /// A lifecycle method was called out of order
    #[error("Invalid state: {0}")]
    InvalidState(String),

    /// IO error (file operations)
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// YAML serialization/deserialization error
    #[error("YAML error: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

fn join_failures(failures: &[StreamFailure]) -> String {
    failures
        .iter()
        .map(|f| f.to_string())
        .collect::<Vec<_>>()
        .join("; ")
}

impl TypingError {
    /// Create a Destination error
    pub fn destination(message: impl Into<String>) -> Self {
        TypingError::Destination(message.into())
    }

    /// Create an aggregated StreamFailures error
    pub fn stream_failures(operation: impl Into<String>, failures: Vec<StreamFailure>) -> Self {
        TypingError::StreamFailures {
            operation: operation.into(),
            failures,
        }
    }

    /// Format error with full details including error chain
    pub fn format_detailed(&self) -> String {
        let mut output = format!("Error: {}\n", self);

        if let TypingError::StreamFailures { failures, .. } = self {
            for failure in failures {
                output.push_str(&format!("\n  - {}", failure));
            }
        }

        let mut source = std::error::Error::source(self);
        let mut depth = 1;
        while let Some(err) = source {
            output.push_str(&format!("\nCaused by:\n  {}: {}", depth, err));
            source = err.source();
            depth += 1;
        }

        output
    }
}

/// Result type alias for typing/deduping operations.
pub type Result<T> = std::result::Result<T, TypingError>;
