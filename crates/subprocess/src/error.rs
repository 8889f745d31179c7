//! Error types for the subprocess crate

use thiserror::Error;

use crate::exit_code;

/// Errors raised while bootstrapping a subprocess
#[derive(Debug, Error)]
pub enum SubprocessError {
    /// A switch the launch requires was not supplied
    #[error("Missing required argument {0}")]
    MissingArgument(&'static str),

    /// The host process id was not a valid process id
    #[error("Invalid host process id {value:?}: {source}")]
    InvalidProcessId {
        value: String,
        #[source]
        source: std::num::ParseIntError,
    },

    /// A custom scheme registration had an unreadable options field
    #[error("Invalid options {options:?} for custom scheme {scheme:?}")]
    InvalidSchemeOptions { scheme: String, options: String },

    /// Another engine handle is still alive in this process
    #[error("An engine handle is already active in this process")]
    EngineAlreadyActive,

    /// The engine handle was used after being destroyed
    #[error("Engine handle has been destroyed")]
    EngineDestroyed,

    /// The engine itself failed
    #[error(transparent)]
    Engine(#[from] EngineError),

    /// The watchdog thread could not be started
    #[error("Failed to spawn parent watchdog: {0}")]
    WatchdogSpawn(#[source] std::io::Error),
}

impl SubprocessError {
    /// Whether this error comes from a malformed launch
    pub fn is_configuration(&self) -> bool {
        matches!(
            self,
            Self::MissingArgument(_)
                | Self::InvalidProcessId { .. }
                | Self::InvalidSchemeOptions { .. }
        )
    }

    /// Process exit code to report for this error
    pub fn exit_code(&self) -> i32 {
        match self {
            Self::Engine(err) => err.exit_code().unwrap_or(exit_code::ENGINE_FAILURE),
            err if err.is_configuration() => exit_code::CONFIGURATION_ERROR,
            _ => exit_code::ENGINE_FAILURE,
        }
    }
}

/// Errors reported by an [`Engine`](crate::engine::Engine) implementation
#[derive(Debug, Error)]
pub enum EngineError {
    /// The engine stopped with a code of its own
    #[error("Engine exited with code {0}")]
    Exited(i32),

    /// The engine failed without producing an exit code
    #[error("Engine failed: {0}")]
    Failed(String),

    /// Releasing native resources failed
    #[error("Engine shutdown failed: {0}")]
    Shutdown(String),
}

impl EngineError {
    /// The engine's own exit code, when it produced one
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::Exited(code) => Some(*code),
            Self::Failed(_) | Self::Shutdown(_) => None,
        }
    }
}

/// Errors from looking up or waiting on the parent process
#[derive(Debug, Error)]
pub enum WatchError {
    #[error("Parent process {pid} lookup failed: {source}")]
    Lookup {
        pid: u32,
        #[source]
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_configuration_errors_use_reserved_code() {
        let err = SubprocessError::MissingArgument(crate::args::HOST_PROCESS_ID);
        assert!(err.is_configuration());
        assert_eq!(err.exit_code(), exit_code::CONFIGURATION_ERROR);

        let parse = "abc".parse::<u32>().unwrap_err();
        let err = SubprocessError::InvalidProcessId {
            value: "abc".into(),
            source: parse,
        };
        assert_eq!(err.exit_code(), exit_code::CONFIGURATION_ERROR);
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_engine_error_code_passes_through() {
        let err = SubprocessError::from(EngineError::Exited(3));
        assert!(!err.is_configuration());
        assert_eq!(err.exit_code(), 3);
    }

    #[test]
    fn test_engine_failure_without_code() {
        let err = SubprocessError::from(EngineError::Failed("boom".into()));
        assert_eq!(err.exit_code(), exit_code::ENGINE_FAILURE);
        assert_eq!(SubprocessError::EngineDestroyed.exit_code(), exit_code::ENGINE_FAILURE);
    }
}
