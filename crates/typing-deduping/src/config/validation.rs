//! Configuration validation.

use super::TypingConfig;
use crate::error::{Result, TypingError};

/// Validate the configuration.
pub fn validate(config: &TypingConfig) -> Result<()> {
    if config.type_and_dedupe_threads == Some(0) {
        return Err(TypingError::Config(
            "type_and_dedupe_threads must be at least 1".into(),
        ));
    }

    if config.max_destination_connections == Some(0) {
        return Err(TypingError::Config(
            "max_destination_connections must be at least 1".into(),
        ));
    }

    if let (Some(threads), Some(max_conns)) = (
        config.type_and_dedupe_threads,
        config.max_destination_connections,
    ) {
        if threads > max_conns {
            return Err(TypingError::Config(format!(
                "type_and_dedupe_threads ({}) cannot exceed max_destination_connections ({})",
                threads, max_conns
            )));
        }
    }

    if config.pool_name.trim().is_empty() {
        return Err(TypingError::Config("pool_name cannot be empty".into()));
    }

    Ok(())
}
