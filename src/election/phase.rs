//! Workflow phases

use serde::{Deserialize, Serialize};

/// Election workflow phase.
///
/// Phases form a total order and only ever advance one step at a time.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub enum WorkflowStatus {
    /// Administrator is whitelisting voters
    #[default]
    RegisteringVoters,
    /// Registered voters may submit proposals
    ProposalsRegistrationStarted,
    /// Proposal list is frozen, voting not yet open
    ProposalsRegistrationEnded,
    /// Registered voters may cast their ballot
    VotingSessionStarted,
    /// Ballots are closed, awaiting tally
    VotingSessionEnded,
    /// Winner computed (terminal)
    VotesTallied,
}

impl WorkflowStatus {
    /// The phase that follows this one, if any
    pub fn next(self) -> Option<WorkflowStatus> {
        use WorkflowStatus::*;
        match self {
            RegisteringVoters => Some(ProposalsRegistrationStarted),
            ProposalsRegistrationStarted => Some(ProposalsRegistrationEnded),
            ProposalsRegistrationEnded => Some(VotingSessionStarted),
            VotingSessionStarted => Some(VotingSessionEnded),
            VotingSessionEnded => Some(VotesTallied),
            VotesTallied => None,
        }
    }

    /// Numeric position in the workflow (0-based)
    pub fn index(self) -> u8 {
        self as u8
    }
}

impl std::fmt::Display for WorkflowStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            WorkflowStatus::RegisteringVoters => write!(f, "RegisteringVoters"),
            WorkflowStatus::ProposalsRegistrationStarted => {
                write!(f, "ProposalsRegistrationStarted")
            }
            WorkflowStatus::ProposalsRegistrationEnded => write!(f, "ProposalsRegistrationEnded"),
            WorkflowStatus::VotingSessionStarted => write!(f, "VotingSessionStarted"),
            WorkflowStatus::VotingSessionEnded => write!(f, "VotingSessionEnded"),
            WorkflowStatus::VotesTallied => write!(f, "VotesTallied"),
        }
    }
}
