//! WolfVote - Single-Session Voting Workflow Service
//!
//! A Rust service that runs one election end to end: an administrator
//! whitelists voters and unlocks each phase in turn, registered voters
//! submit proposals and cast a single ballot, and a deterministic tally
//! picks the winning proposal.
//!
//! # Architecture
//!
//! The [`election::Election`] aggregate is a plain state machine. The
//! [`election::ElectionService`] wraps it in one lock so every command is
//! applied atomically and in a total order, and publishes a notification
//! for each accepted command. The HTTP API exposes both to clients.
//!
//! # Workflow
//!
//! `RegisteringVoters → ProposalsRegistrationStarted → ProposalsRegistrationEnded
//! → VotingSessionStarted → VotingSessionEnded → VotesTallied`
//!
//! # Features
//!
//! - Phase-gated, admin-only workflow transitions
//! - One ballot per registered voter
//! - Tally with first-proposal-wins tie breaking
//! - Ordered notification history and live Server-Sent Events feed
//! - HTTP API and `votectl` command line client

pub mod config;
pub mod error;
pub mod election;
pub mod api;

pub use config::WolfVoteConfig;
pub use error::{Error, Result};

/// Re-export commonly used types
pub mod prelude {
    pub use crate::config::WolfVoteConfig;
    pub use crate::error::{Error, Result};
    pub use crate::election::{
        Address, Election, ElectionEvent, ElectionService, ProposalId, WorkflowStatus,
    };
    pub use crate::api::HttpServer;
}
