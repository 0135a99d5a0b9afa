//! Election Service
//!
//! Shares one [`Election`] between concurrent callers. A single
//! `RwLock` serializes every command, and the resulting event is
//! published before the write lock is released, so observers see
//! notifications in exactly the order the mutations were applied.

use tokio::sync::{broadcast, RwLock};

use crate::config::ElectionSettings;
use crate::error::Result;

use super::events::{ElectionEvent, EventBus, EventRecord};
use super::machine::Election;
use super::model::{Address, ElectionResults, Proposal, ProposalId, Voter};
use super::phase::WorkflowStatus;

struct Inner {
    election: Election,
    events: EventBus,
}

/// Snapshot of the election for status displays
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct ElectionSummary {
    pub name: String,
    pub admin: Address,
    pub phase: WorkflowStatus,
    pub voter_count: usize,
    pub proposal_count: usize,
    pub votes_cast: u64,
    pub winning_proposal_id: Option<ProposalId>,
    pub last_event: u64,
}

/// Lock-guarded election plus its event bus
pub struct ElectionService {
    name: String,
    inner: RwLock<Inner>,
}

impl ElectionService {
    /// Create a new service from election settings
    pub fn new(settings: &ElectionSettings) -> Result<Self> {
        let election = Election::new(Address::new(settings.admin.clone()))?
            .with_max_description_len(settings.max_description_len);
        let events = EventBus::new(settings.event_history, settings.event_channel_capacity);

        Ok(Self {
            name: settings.name.clone(),
            inner: RwLock::new(Inner { election, events }),
        })
    }

    /// Election display name
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Apply a command under the write lock and publish its event
    async fn apply<F>(&self, command: &'static str, caller: &Address, f: F) -> Result<EventRecord>
    where
        F: FnOnce(&mut Election) -> Result<ElectionEvent>,
    {
        let mut inner = self.inner.write().await;
        match f(&mut inner.election) {
            Ok(event) => {
                let record = inner.events.publish(event);
                tracing::info!(
                    "{} by {} accepted (event #{} {})",
                    command,
                    caller,
                    record.sequence,
                    record.event.name()
                );
                Ok(record)
            }
            Err(e) if e.is_rejection() => {
                tracing::warn!("{} by {} rejected: {}", command, caller, e);
                Err(e)
            }
            Err(e) => {
                tracing::error!("{} by {} failed: {}", command, caller, e);
                Err(e)
            }
        }
    }

    // ============ Commands ============

    pub async fn add_voter(&self, caller: &Address, voter: Address) -> Result<EventRecord> {
        self.apply("addVoter", caller, |e| e.add_voter(caller, voter)).await
    }

    pub async fn add_proposal(&self, caller: &Address, description: String) -> Result<EventRecord> {
        self.apply("addProposal", caller, |e| e.add_proposal(caller, description)).await
    }

    pub async fn set_vote(&self, caller: &Address, proposal_id: ProposalId) -> Result<EventRecord> {
        self.apply("setVote", caller, |e| e.set_vote(caller, proposal_id)).await
    }

    pub async fn start_proposals_registering(&self, caller: &Address) -> Result<EventRecord> {
        self.apply("startProposalsRegistering", caller, |e| {
            e.start_proposals_registering(caller)
        })
        .await
    }

    pub async fn end_proposals_registering(&self, caller: &Address) -> Result<EventRecord> {
        self.apply("endProposalsRegistering", caller, |e| {
            e.end_proposals_registering(caller)
        })
        .await
    }

    pub async fn start_voting_session(&self, caller: &Address) -> Result<EventRecord> {
        self.apply("startVotingSession", caller, |e| e.start_voting_session(caller)).await
    }

    pub async fn end_voting_session(&self, caller: &Address) -> Result<EventRecord> {
        self.apply("endVotingSession", caller, |e| e.end_voting_session(caller)).await
    }

    pub async fn tally_votes(&self, caller: &Address) -> Result<EventRecord> {
        let record = self.apply("tallyVotes", caller, |e| e.tally_votes(caller)).await?;
        if let Some(winner) = self.winning_proposal_id().await {
            tracing::info!("Votes tallied, winning proposal is #{}", winner);
        }
        Ok(record)
    }

    // ============ Queries ============

    pub async fn current_phase(&self) -> WorkflowStatus {
        self.inner.read().await.election.current_phase()
    }

    pub async fn voter(&self, address: &Address) -> Option<Voter> {
        self.inner.read().await.election.voter(address).cloned()
    }

    pub async fn proposal(&self, id: ProposalId) -> Result<Proposal> {
        self.inner.read().await.election.proposal(id).cloned()
    }

    pub async fn proposals(&self) -> Vec<Proposal> {
        self.inner.read().await.election.proposals().to_vec()
    }

    pub async fn winning_proposal_id(&self) -> Option<ProposalId> {
        self.inner.read().await.election.winning_proposal_id()
    }

    pub async fn results(&self) -> ElectionResults {
        self.inner.read().await.election.results()
    }

    pub async fn summary(&self) -> ElectionSummary {
        let inner = self.inner.read().await;
        let election = &inner.election;
        ElectionSummary {
            name: self.name.clone(),
            admin: election.admin().clone(),
            phase: election.current_phase(),
            voter_count: election.voter_count(),
            proposal_count: election.proposal_count(),
            votes_cast: election.votes_cast(),
            winning_proposal_id: election.winning_proposal_id(),
            last_event: inner.events.last_sequence(),
        }
    }

    // ============ Notifications ============

    /// Live notifications from now on
    pub async fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.inner.read().await.events.subscribe()
    }

    /// Retained notifications newer than `since`
    pub async fn events_since(&self, since: u64) -> Vec<EventRecord> {
        self.inner.read().await.events.history_since(since)
    }
}
