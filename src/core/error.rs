// src/core/error.rs

use thiserror::Error;

/// Everything that can end a job early.
///
/// Each variant is caught at the job boundary and turned into a single error
/// event for the originating session; none of them ever reaches the server loop.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum JobError {
    #[error("{0}")]
    InvalidTarget(String),

    #[error("{0} is not installed or not on PATH")]
    ToolNotFound(String),

    #[error("{0}")]
    ExternalToolFailure(String),

    #[error("{program} timed out after {seconds} seconds")]
    ExternalToolTimeout { program: String, seconds: u64 },

    #[error("Network error: {0}")]
    NetworkFailure(String),

    #[error("WHOIS lookup failed: {0}")]
    ProtocolFailure(String),

    #[error("Failed to store result: {0}")]
    StoreFailure(String),
}

impl JobError {
    /// Classifies a spawn error, keeping "not found" apart from other failures.
    pub fn from_spawn(program: &str, err: std::io::Error) -> Self {
        if err.kind() == std::io::ErrorKind::NotFound {
            JobError::ToolNotFound(program.to_string())
        } else {
            JobError::ExternalToolFailure(format!("{program} command failed: {err}"))
        }
    }
}

impl From<reqwest::Error> for JobError {
    fn from(err: reqwest::Error) -> Self {
        JobError::NetworkFailure(err.to_string())
    }
}

impl From<rusqlite::Error> for JobError {
    fn from(err: rusqlite::Error) -> Self {
        JobError::StoreFailure(err.to_string())
    }
}
