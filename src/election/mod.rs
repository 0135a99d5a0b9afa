//! Election Module
//!
//! The voting workflow: phases, voters, proposals, tally and the
//! notifications emitted along the way.

mod phase;
mod model;
mod machine;
pub mod events;
mod service;

pub use phase::WorkflowStatus;
pub use model::{Address, ElectionResults, Proposal, ProposalId, Standing, Voter};
pub use machine::{Election, DEFAULT_MAX_DESCRIPTION_LEN};
pub use events::{ElectionEvent, EventBus, EventRecord};
pub use service::{ElectionService, ElectionSummary};
