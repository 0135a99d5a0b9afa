//! WolfVote Error Types

use thiserror::Error;

use crate::election::{Address, ProposalId, WorkflowStatus};

/// Result type alias for WolfVote operations
pub type Result<T> = std::result::Result<T, Error>;

/// WolfVote error types
#[derive(Error, Debug)]
pub enum Error {
    // Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid configuration file: {0}")]
    ConfigParse(#[from] toml::de::Error),

    // Election rejections
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    #[error("{reason} (current phase: {current})")]
    WrongPhase {
        reason: &'static str,
        current: WorkflowStatus,
    },

    #[error("Already registered: {0}")]
    AlreadyRegistered(Address),

    #[error("You have already voted: {0}")]
    AlreadyVoted(Address),

    #[error("Proposal not found: {0}")]
    ProposalNotFound(ProposalId),

    #[error("Validation failed: {0}")]
    Validation(String),

    // Serialization errors
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Network errors
    #[error("Network error: {0}")]
    Network(String),

    // I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    // Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Check if this error is a rejected election command (state left untouched)
    pub fn is_rejection(&self) -> bool {
        matches!(
            self,
            Error::Unauthorized(_)
                | Error::WrongPhase { .. }
                | Error::AlreadyRegistered(_)
                | Error::AlreadyVoted(_)
                | Error::ProposalNotFound(_)
                | Error::Validation(_)
        )
    }

    /// Stable machine-readable code for API responses
    pub fn code(&self) -> &'static str {
        match self {
            Error::Config(_) | Error::ConfigParse(_) => "CONFIG_ERROR",
            Error::Unauthorized(_) => "UNAUTHORIZED",
            Error::WrongPhase { .. } => "WRONG_PHASE",
            Error::AlreadyRegistered(_) => "ALREADY_REGISTERED",
            Error::AlreadyVoted(_) => "ALREADY_VOTED",
            Error::ProposalNotFound(_) => "PROPOSAL_NOT_FOUND",
            Error::Validation(_) => "VALIDATION_FAILED",
            Error::Serialization(_) => "SERIALIZATION_ERROR",
            Error::Network(_) => "NETWORK_ERROR",
            Error::Io(_) => "IO_ERROR",
            Error::Internal(_) => "INTERNAL_ERROR",
        }
    }
}
