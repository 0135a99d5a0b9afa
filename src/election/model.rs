//! Election entities
//!
//! Voters, proposals and the identities that key them.

use serde::{Deserialize, Serialize};

/// Index of a proposal in registration order
pub type ProposalId = u64;

/// Opaque participant identity, compared by exact match
#[derive(Debug, Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Address(String);

impl Address {
    /// Create a new address
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    /// Borrow the raw identity
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Blank identities cannot be registered or act as administrator
    pub fn is_blank(&self) -> bool {
        self.0.trim().is_empty()
    }
}

impl From<&str> for Address {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}

impl From<String> for Address {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl std::fmt::Display for Address {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

/// A whitelisted voter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Voter {
    /// Set once by the administrator, never reset
    pub is_registered: bool,
    /// Set once the ballot is cast, never reset
    pub has_voted: bool,
    /// Proposal this voter chose; `None` until `has_voted`
    pub voted_proposal_id: Option<ProposalId>,
}

impl Voter {
    /// A freshly registered voter that has not voted yet
    pub fn registered() -> Self {
        Self {
            is_registered: true,
            has_voted: false,
            voted_proposal_id: None,
        }
    }

    /// Record the ballot
    pub(crate) fn cast(&mut self, proposal_id: ProposalId) {
        self.has_voted = true;
        self.voted_proposal_id = Some(proposal_id);
    }
}

/// A candidate option submitted by a voter
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proposal {
    /// Free text, never empty
    pub description: String,
    /// Ballots received
    pub vote_count: u64,
}

impl Proposal {
    /// Create a proposal with no votes
    pub fn new(description: String) -> Self {
        Self {
            description,
            vote_count: 0,
        }
    }
}

/// One row of the standings table
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Standing {
    pub proposal_id: ProposalId,
    pub description: String,
    pub vote_count: u64,
}

/// Standings plus the winner once tallied
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElectionResults {
    pub standings: Vec<Standing>,
    pub winning_proposal_id: Option<ProposalId>,
    pub votes_cast: u64,
}
