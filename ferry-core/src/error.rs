//! Error taxonomy shared across Ferry crates

use std::time::Duration;
use thiserror::Error;

/// Result type alias for Ferry operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors surfaced by resolution, reconciliation, compilation and deployment
#[derive(Debug, Error)]
pub enum Error {
    /// A required value is still absent after the full resolution chain
    #[error("Configuration error: {0}")]
    Configuration(String),

    /// A remote lookup returned an empty or inconsistent candidate set
    #[error("Discovery failed: {0}")]
    Discovery(String),

    /// A task reference matches neither accepted grammar
    #[error("Invalid task target '{input}': {reason}")]
    TargetFormat {
        /// The text that failed to parse
        input: String,
        /// Why it was rejected
        reason: String,
    },

    /// A structured document failed validation before submission
    #[error("Invalid execution graph definition: {0}")]
    DefinitionFormat(String),

    /// The remote system reported a terminal failure for an issued operation
    #[error("'{name}' ended in status {status}: {reason}")]
    RemoteState {
        /// Stack or graph name
        name: String,
        /// Last status observed
        status: String,
        /// Status reason reported by the remote system
        reason: String,
    },

    /// The polling budget ran out before the remote operation converged
    #[error("Timed out after {waited:?} waiting for '{name}' (last status: {last_status})")]
    ConvergenceTimeout {
        /// Stack or graph name
        name: String,
        /// How long we polled
        waited: Duration,
        /// Last status observed
        last_status: String,
    },

    /// An action assumed the wrong existence state (e.g. update-on-absent after a race)
    #[error("'{name}' {message}")]
    IdentityMismatch {
        /// Stack or graph name
        name: String,
        /// What was assumed versus what the remote reported
        message: String,
    },

    /// A collaborator call failed; not retried or reinterpreted here
    #[error("Remote call {operation} failed")]
    Remote {
        /// The remote operation that failed
        operation: String,
        /// Underlying failure
        #[source]
        source: Box<dyn std::error::Error + Send + Sync>,
    },

    /// Local I/O failure (e.g. writing a compiled definition)
    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Create a configuration error
    pub fn configuration(message: impl Into<String>) -> Self {
        Self::Configuration(message.into())
    }

    /// Create a discovery error
    pub fn discovery(message: impl Into<String>) -> Self {
        Self::Discovery(message.into())
    }

    /// Create a target format error
    pub fn target_format(input: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::TargetFormat {
            input: input.into(),
            reason: reason.into(),
        }
    }

    /// Create a definition format error
    pub fn definition_format(message: impl Into<String>) -> Self {
        Self::DefinitionFormat(message.into())
    }

    /// Create an identity mismatch error
    pub fn identity_mismatch(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self::IdentityMismatch {
            name: name.into(),
            message: message.into(),
        }
    }

    /// Wrap a collaborator failure
    pub fn remote(
        operation: impl Into<String>,
        source: impl std::error::Error + Send + Sync + 'static,
    ) -> Self {
        Self::Remote {
            operation: operation.into(),
            source: Box::new(source),
        }
    }

    /// Check if this error stems from caller input rather than remote state
    ///
    /// Caller errors are never retried; they are surfaced immediately.
    pub fn is_caller_error(&self) -> bool {
        matches!(
            self,
            Self::Configuration(_)
                | Self::Discovery(_)
                | Self::TargetFormat { .. }
                | Self::DefinitionFormat(_)
        )
    }
}
