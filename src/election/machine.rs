//! Election State Machine
//!
//! Owns the phase, the voter registry, the proposal list and the tally.
//! Every command validates all of its guards before touching any field,
//! so a rejected call leaves the election exactly as it was.
//!
//! Guard order is phase, then caller role, then arguments.

use std::collections::HashMap;

use crate::error::{Error, Result};

use super::events::ElectionEvent;
use super::model::{Address, ElectionResults, Proposal, ProposalId, Standing, Voter};
use super::phase::WorkflowStatus;

/// Default upper bound on proposal description length (characters)
pub const DEFAULT_MAX_DESCRIPTION_LEN: usize = 1024;

/// A single election instance
#[derive(Debug, Clone)]
pub struct Election {
    /// Fixed at construction
    admin: Address,
    phase: WorkflowStatus,
    voters: HashMap<Address, Voter>,
    proposals: Vec<Proposal>,
    winning_proposal_id: Option<ProposalId>,
    max_description_len: usize,
}

impl Election {
    /// Create an election administered by `admin`
    pub fn new(admin: Address) -> Result<Self> {
        if admin.is_blank() {
            return Err(Error::Validation("administrator identity cannot be empty".into()));
        }

        Ok(Self {
            admin,
            phase: WorkflowStatus::RegisteringVoters,
            voters: HashMap::new(),
            proposals: Vec::new(),
            winning_proposal_id: None,
            max_description_len: DEFAULT_MAX_DESCRIPTION_LEN,
        })
    }

    /// Override the description length limit
    pub fn with_max_description_len(mut self, max: usize) -> Self {
        self.max_description_len = max;
        self
    }

    // ============ Queries ============

    pub fn admin(&self) -> &Address {
        &self.admin
    }

    pub fn current_phase(&self) -> WorkflowStatus {
        self.phase
    }

    pub fn voter(&self, address: &Address) -> Option<&Voter> {
        self.voters.get(address)
    }

    pub fn proposal(&self, id: ProposalId) -> Result<&Proposal> {
        usize::try_from(id)
            .ok()
            .and_then(|idx| self.proposals.get(idx))
            .ok_or(Error::ProposalNotFound(id))
    }

    pub fn proposals(&self) -> &[Proposal] {
        &self.proposals
    }

    /// `None` until votes have been tallied
    pub fn winning_proposal_id(&self) -> Option<ProposalId> {
        self.winning_proposal_id
    }

    pub fn voter_count(&self) -> usize {
        self.voters.len()
    }

    pub fn proposal_count(&self) -> usize {
        self.proposals.len()
    }

    pub fn votes_cast(&self) -> u64 {
        self.proposals.iter().map(|p| p.vote_count).sum()
    }

    /// Current standings, in proposal order
    pub fn results(&self) -> ElectionResults {
        let standings = self
            .proposals
            .iter()
            .enumerate()
            .map(|(idx, p)| Standing {
                proposal_id: idx as ProposalId,
                description: p.description.clone(),
                vote_count: p.vote_count,
            })
            .collect();

        ElectionResults {
            standings,
            winning_proposal_id: self.winning_proposal_id,
            votes_cast: self.votes_cast(),
        }
    }

    // ============ Guards ============

    fn require_phase(&self, required: WorkflowStatus, reason: &'static str) -> Result<()> {
        if self.phase != required {
            return Err(Error::WrongPhase {
                reason,
                current: self.phase,
            });
        }
        Ok(())
    }

    fn require_admin(&self, caller: &Address) -> Result<()> {
        if caller != &self.admin {
            return Err(Error::Unauthorized(format!(
                "{} is not the administrator",
                caller
            )));
        }
        Ok(())
    }

    fn require_voter(&self, caller: &Address) -> Result<&Voter> {
        match self.voters.get(caller) {
            Some(voter) if voter.is_registered => Ok(voter),
            _ => Err(Error::Unauthorized(format!(
                "{} is not a registered voter",
                caller
            ))),
        }
    }

    // ============ Participant commands ============

    /// Whitelist a voter (admin, RegisteringVoters)
    pub fn add_voter(&mut self, caller: &Address, voter: Address) -> Result<ElectionEvent> {
        self.require_phase(
            WorkflowStatus::RegisteringVoters,
            "Voters registration is not open yet",
        )?;
        self.require_admin(caller)?;

        if voter.is_blank() {
            return Err(Error::Validation("voter address cannot be empty".into()));
        }
        if self.voters.contains_key(&voter) {
            return Err(Error::AlreadyRegistered(voter));
        }

        self.voters.insert(voter.clone(), Voter::registered());
        Ok(ElectionEvent::VoterRegistered { voter })
    }

    /// Submit a proposal (registered voter, ProposalsRegistrationStarted)
    pub fn add_proposal(&mut self, caller: &Address, description: String) -> Result<ElectionEvent> {
        self.require_phase(
            WorkflowStatus::ProposalsRegistrationStarted,
            "Proposals are not allowed yet",
        )?;
        self.require_voter(caller)?;

        if description.trim().is_empty() {
            return Err(Error::Validation("proposal description cannot be empty".into()));
        }
        let len = description.chars().count();
        if len > self.max_description_len {
            return Err(Error::Validation(format!(
                "proposal description is {} characters, limit is {}",
                len, self.max_description_len
            )));
        }

        let proposal_id = self.proposals.len() as ProposalId;
        self.proposals.push(Proposal::new(description));
        Ok(ElectionEvent::ProposalRegistered { proposal_id })
    }

    /// Cast a ballot (registered voter, VotingSessionStarted)
    pub fn set_vote(&mut self, caller: &Address, proposal_id: ProposalId) -> Result<ElectionEvent> {
        self.require_phase(
            WorkflowStatus::VotingSessionStarted,
            "Voting session is not open",
        )?;
        if self.require_voter(caller)?.has_voted {
            return Err(Error::AlreadyVoted(caller.clone()));
        }

        let idx = usize::try_from(proposal_id)
            .ok()
            .filter(|idx| *idx < self.proposals.len())
            .ok_or(Error::ProposalNotFound(proposal_id))?;
        let voter = self
            .voters
            .get_mut(caller)
            .ok_or_else(|| Error::Internal(format!("voter {} vanished mid-vote", caller)))?;

        voter.cast(proposal_id);
        self.proposals[idx].vote_count += 1;

        Ok(ElectionEvent::Voted {
            voter: caller.clone(),
            proposal_id,
        })
    }

    // ============ Phase transitions ============

    pub fn start_proposals_registering(&mut self, caller: &Address) -> Result<ElectionEvent> {
        self.advance(
            caller,
            WorkflowStatus::RegisteringVoters,
            "Registering proposals cannot be started now",
        )
    }

    pub fn end_proposals_registering(&mut self, caller: &Address) -> Result<ElectionEvent> {
        self.advance(
            caller,
            WorkflowStatus::ProposalsRegistrationStarted,
            "Registering proposals has not started yet",
        )
    }

    pub fn start_voting_session(&mut self, caller: &Address) -> Result<ElectionEvent> {
        self.advance(
            caller,
            WorkflowStatus::ProposalsRegistrationEnded,
            "Registering proposals phase is not finished",
        )
    }

    pub fn end_voting_session(&mut self, caller: &Address) -> Result<ElectionEvent> {
        self.advance(
            caller,
            WorkflowStatus::VotingSessionStarted,
            "Voting session has not started yet",
        )
    }

    /// Pick the winner and close the election
    pub fn tally_votes(&mut self, caller: &Address) -> Result<ElectionEvent> {
        self.require_phase(
            WorkflowStatus::VotingSessionEnded,
            "Current status is not voting session ended",
        )?;
        self.require_admin(caller)?;

        let winner = leading_proposal(&self.proposals)
            .ok_or_else(|| Error::Validation("no proposals to tally".into()))?;

        let event = self.step()?;
        self.winning_proposal_id = Some(winner);
        Ok(event)
    }

    fn advance(
        &mut self,
        caller: &Address,
        from: WorkflowStatus,
        reason: &'static str,
    ) -> Result<ElectionEvent> {
        self.require_phase(from, reason)?;
        self.require_admin(caller)?;
        self.step()
    }

    fn step(&mut self) -> Result<ElectionEvent> {
        let previous = self.phase;
        let current = previous
            .next()
            .ok_or_else(|| Error::Internal(format!("{} has no successor", previous)))?;
        self.phase = current;
        Ok(ElectionEvent::WorkflowStatusChange { previous, current })
    }
}

/// Single pass, first index reaching the maximum wins ties
fn leading_proposal(proposals: &[Proposal]) -> Option<ProposalId> {
    let mut leader: Option<(usize, u64)> = None;
    for (idx, proposal) in proposals.iter().enumerate() {
        match leader {
            Some((_, best)) if proposal.vote_count <= best => {}
            _ => leader = Some((idx, proposal.vote_count)),
        }
    }
    leader.map(|(idx, _)| idx as ProposalId)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn addr(id: &str) -> Address {
        Address::from(id)
    }

    fn election() -> Election {
        Election::new(addr("admin")).unwrap()
    }

    /// Election with `voters` registered, sitting in `VotingSessionStarted`
    /// with one proposal per entry in `descriptions`
    fn voting_election(voters: &[&str], descriptions: &[&str]) -> Election {
        let admin = addr("admin");
        let mut e = election();
        for v in voters {
            e.add_voter(&admin, addr(v)).unwrap();
        }
        e.start_proposals_registering(&admin).unwrap();
        for d in descriptions {
            e.add_proposal(&addr(voters[0]), d.to_string()).unwrap();
        }
        e.end_proposals_registering(&admin).unwrap();
        e.start_voting_session(&admin).unwrap();
        e
    }

    fn with_counts(counts: &[u64]) -> Vec<Proposal> {
        counts
            .iter()
            .map(|c| Proposal {
                description: format!("p{}", c),
                vote_count: *c,
            })
            .collect()
    }

    #[test]
    fn test_initial_state() {
        let e = election();
        assert_eq!(e.current_phase(), WorkflowStatus::RegisteringVoters);
        assert_eq!(e.voter_count(), 0);
        assert_eq!(e.proposal_count(), 0);
        assert_eq!(e.winning_proposal_id(), None);
        assert!(Election::new(addr(" ")).is_err());
    }

    #[test]
    fn test_add_voter() {
        let admin = addr("admin");
        let mut e = election();

        let event = e.add_voter(&admin, addr("v1")).unwrap();
        assert_eq!(event, ElectionEvent::VoterRegistered { voter: addr("v1") });

        let voter = e.voter(&addr("v1")).unwrap();
        assert!(voter.is_registered);
        assert!(!voter.has_voted);
        assert_eq!(voter.voted_proposal_id, None);
        assert!(e.voter(&addr("v2")).is_none());
    }

    #[test]
    fn test_duplicate_voter_rejected() {
        let admin = addr("admin");
        let mut e = election();
        e.add_voter(&admin, addr("v1")).unwrap();

        let err = e.add_voter(&admin, addr("v1")).unwrap_err();
        assert!(matches!(err, Error::AlreadyRegistered(ref a) if a.as_str() == "v1"));
        assert_eq!(e.voter_count(), 1);
    }

    #[test]
    fn test_only_admin_registers_voters() {
        let mut e = election();
        let err = e.add_voter(&addr("mallory"), addr("v1")).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));

        let err = e.add_voter(&addr("admin"), addr("")).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(e.voter_count(), 0);
    }

    #[test]
    fn test_add_voter_after_registration_closed() {
        let admin = addr("admin");
        let mut e = election();
        e.start_proposals_registering(&admin).unwrap();

        let err = e.add_voter(&admin, addr("v3")).unwrap_err();
        assert!(matches!(err, Error::WrongPhase { .. }));
        assert!(err.to_string().starts_with("Voters registration is not open yet"));
    }

    #[test]
    fn test_proposal_outside_registration_phase() {
        let admin = addr("admin");
        let mut e = election();
        e.add_voter(&admin, addr("v1")).unwrap();

        // Any caller, any description
        for caller in ["v1", "admin", "stranger"] {
            for desc in ["_desc", ""] {
                let err = e.add_proposal(&addr(caller), desc.to_string()).unwrap_err();
                assert!(matches!(err, Error::WrongPhase { .. }), "{} / {:?}", caller, desc);
            }
        }

        let mut e = voting_election(&["v1"], &["a"]);
        let err = e.add_proposal(&addr("v1"), "late".into()).unwrap_err();
        assert!(matches!(err, Error::WrongPhase { .. }));
        assert_eq!(e.proposal_count(), 1);
    }

    #[test]
    fn test_add_proposal() {
        let admin = addr("admin");
        let mut e = election();
        e.add_voter(&admin, addr("v1")).unwrap();
        e.start_proposals_registering(&admin).unwrap();

        let event = e.add_proposal(&addr("v1"), "X".into()).unwrap();
        assert_eq!(event, ElectionEvent::ProposalRegistered { proposal_id: 0 });
        assert_eq!(e.proposal(0).unwrap().description, "X");
        assert_eq!(e.proposal(0).unwrap().vote_count, 0);

        let event = e.add_proposal(&addr("v1"), "Y".into()).unwrap();
        assert_eq!(event, ElectionEvent::ProposalRegistered { proposal_id: 1 });
    }

    #[test]
    fn test_add_proposal_rejections() {
        let admin = addr("admin");
        let mut e = election().with_max_description_len(5);
        e.add_voter(&admin, addr("v1")).unwrap();
        e.start_proposals_registering(&admin).unwrap();

        assert!(matches!(
            e.add_proposal(&addr("admin"), "x".into()),
            Err(Error::Unauthorized(_))
        ));
        assert!(matches!(
            e.add_proposal(&addr("v1"), "".into()),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            e.add_proposal(&addr("v1"), "   ".into()),
            Err(Error::Validation(_))
        ));
        assert!(matches!(
            e.add_proposal(&addr("v1"), "too long".into()),
            Err(Error::Validation(_))
        ));
        assert_eq!(e.proposal_count(), 0);
    }

    #[test]
    fn test_transitions_only_from_predecessor() {
        type Transition = fn(&mut Election, &Address) -> Result<ElectionEvent>;
        let transitions: [(WorkflowStatus, Transition); 5] = [
            (WorkflowStatus::RegisteringVoters, Election::start_proposals_registering),
            (WorkflowStatus::ProposalsRegistrationStarted, Election::end_proposals_registering),
            (WorkflowStatus::ProposalsRegistrationEnded, Election::start_voting_session),
            (WorkflowStatus::VotingSessionStarted, Election::end_voting_session),
            (WorkflowStatus::VotingSessionEnded, Election::tally_votes),
        ];

        let admin = addr("admin");
        let mut e = election();
        e.add_voter(&admin, addr("v1")).unwrap();

        for (from, transition) in transitions {
            assert_eq!(e.current_phase(), from);

            // Every other transition is rejected here
            for (other_from, other) in transitions {
                if other_from != from {
                    let before = e.current_phase();
                    let err = other(&mut e, &admin).unwrap_err();
                    assert!(matches!(err, Error::WrongPhase { .. }));
                    assert_eq!(e.current_phase(), before);
                }
            }

            if from == WorkflowStatus::ProposalsRegistrationStarted {
                e.add_proposal(&addr("v1"), "only".into()).unwrap();
            }

            let event = transition(&mut e, &admin).unwrap();
            assert_eq!(
                event,
                ElectionEvent::WorkflowStatusChange {
                    previous: from,
                    current: from.next().unwrap(),
                }
            );
        }

        assert_eq!(e.current_phase(), WorkflowStatus::VotesTallied);
        for (_, transition) in transitions {
            assert!(matches!(transition(&mut e, &admin), Err(Error::WrongPhase { .. })));
        }
    }

    #[test]
    fn test_commands_rejected_outside_their_phase() {
        let admin = addr("admin");
        let mut e = election();
        e.add_voter(&admin, addr("v1")).unwrap();
        e.add_voter(&admin, addr("v2")).unwrap();

        let mut phase = e.current_phase();
        loop {
            let counts = |e: &Election| (e.votes_cast(), e.voter_count(), e.proposal_count());
            let before = counts(&e);

            if phase != WorkflowStatus::RegisteringVoters {
                let err = e.add_voter(&admin, addr("late")).unwrap_err();
                assert!(matches!(err, Error::WrongPhase { current, .. } if current == phase));
                assert!(e.voter(&addr("late")).is_none());
            }
            if phase != WorkflowStatus::ProposalsRegistrationStarted {
                let err = e.add_proposal(&addr("v1"), "late".into()).unwrap_err();
                assert!(matches!(err, Error::WrongPhase { current, .. } if current == phase));
            }
            if phase != WorkflowStatus::VotingSessionStarted {
                // v2 never votes, so only the phase can reject it
                let err = e.set_vote(&addr("v2"), 0).unwrap_err();
                assert!(matches!(err, Error::WrongPhase { current, .. } if current == phase));
                assert!(err.to_string().starts_with("Voting session is not open"));
                assert!(!e.voter(&addr("v2")).unwrap().has_voted);
            }
            assert_eq!(counts(&e), before, "state changed in {}", phase);

            match phase {
                WorkflowStatus::RegisteringVoters => {
                    e.start_proposals_registering(&admin).unwrap();
                }
                WorkflowStatus::ProposalsRegistrationStarted => {
                    e.add_proposal(&addr("v1"), "only".into()).unwrap();
                    e.end_proposals_registering(&admin).unwrap();
                }
                WorkflowStatus::ProposalsRegistrationEnded => {
                    e.start_voting_session(&admin).unwrap();
                }
                WorkflowStatus::VotingSessionStarted => {
                    e.set_vote(&addr("v1"), 0).unwrap();
                    e.end_voting_session(&admin).unwrap();
                }
                WorkflowStatus::VotingSessionEnded => {
                    e.tally_votes(&admin).unwrap();
                }
                WorkflowStatus::VotesTallied => break,
            }
            assert_eq!(Some(e.current_phase()), phase.next());
            phase = e.current_phase();
        }

        assert_eq!(e.votes_cast(), 1);
        assert_eq!(e.voter_count(), 2);
        assert_eq!(e.proposal_count(), 1);
        assert_eq!(e.proposal(0).unwrap().vote_count, 1);
    }

    #[test]
    fn test_start_voting_before_end_proposals() {
        let admin = addr("admin");
        let mut e = election();
        e.start_proposals_registering(&admin).unwrap();

        let err = e.start_voting_session(&admin).unwrap_err();
        assert!(matches!(
            err,
            Error::WrongPhase {
                current: WorkflowStatus::ProposalsRegistrationStarted,
                ..
            }
        ));
    }

    #[test]
    fn test_only_admin_transitions() {
        let mut e = election();
        let err = e.start_proposals_registering(&addr("v1")).unwrap_err();
        assert!(matches!(err, Error::Unauthorized(_)));
        assert_eq!(e.current_phase(), WorkflowStatus::RegisteringVoters);
    }

    #[test]
    fn test_set_vote() {
        let mut e = voting_election(&["v1", "v2"], &["a", "b"]);

        let event = e.set_vote(&addr("v1"), 1).unwrap();
        assert_eq!(
            event,
            ElectionEvent::Voted {
                voter: addr("v1"),
                proposal_id: 1
            }
        );
        assert_eq!(e.proposal(1).unwrap().vote_count, 1);
        let voter = e.voter(&addr("v1")).unwrap();
        assert!(voter.has_voted);
        assert_eq!(voter.voted_proposal_id, Some(1));
        assert_eq!(e.votes_cast(), 1);
    }

    #[test]
    fn test_double_vote_rejected_regardless_of_target() {
        let mut e = voting_election(&["v1"], &["a", "b"]);
        e.set_vote(&addr("v1"), 0).unwrap();

        for id in [0, 1, 99] {
            let err = e.set_vote(&addr("v1"), id).unwrap_err();
            assert!(matches!(err, Error::AlreadyVoted(_)));
        }
        assert_eq!(e.proposal(0).unwrap().vote_count, 1);
        assert_eq!(e.proposal(1).unwrap().vote_count, 0);
    }

    #[test]
    fn test_vote_for_unknown_proposal() {
        let mut e = voting_election(&["v1"], &["a", "b"]);

        let err = e.set_vote(&addr("v1"), 2).unwrap_err();
        assert!(matches!(err, Error::ProposalNotFound(2)));
        assert_eq!(e.votes_cast(), 0);
        assert!(!e.voter(&addr("v1")).unwrap().has_voted);

        // Still allowed to vote afterwards
        e.set_vote(&addr("v1"), 1).unwrap();
    }

    #[test]
    fn test_unregistered_cannot_vote() {
        let mut e = voting_election(&["v1"], &["a"]);
        assert!(matches!(
            e.set_vote(&addr("admin"), 0),
            Err(Error::Unauthorized(_))
        ));
    }

    #[test]
    fn test_get_proposal_out_of_range() {
        let e = voting_election(&["v1"], &["a"]);
        assert!(e.proposal(0).is_ok());
        assert!(matches!(e.proposal(1), Err(Error::ProposalNotFound(1))));
        assert!(matches!(e.proposal(u64::MAX), Err(Error::ProposalNotFound(_))));
    }

    #[test]
    fn test_leading_proposal_first_max_wins() {
        assert_eq!(leading_proposal(&with_counts(&[3, 5, 5, 1])), Some(1));
        assert_eq!(leading_proposal(&with_counts(&[0, 0, 0])), Some(0));
        assert_eq!(leading_proposal(&with_counts(&[1, 2, 3])), Some(2));
        assert_eq!(leading_proposal(&[]), None);
    }

    #[test]
    fn test_tally_with_votes() {
        let voters = ["v1", "v2", "v3", "v4", "v5"];
        let mut e = voting_election(&voters, &["a", "b", "c"]);
        // Counts [1, 2, 2]: tie between 1 and 2 goes to 1
        for (voter, id) in voters.iter().zip([1, 2, 0, 2, 1]) {
            e.set_vote(&addr(voter), id).unwrap();
        }

        let admin = addr("admin");
        assert_eq!(e.winning_proposal_id(), None);
        e.end_voting_session(&admin).unwrap();
        e.tally_votes(&admin).unwrap();

        assert_eq!(e.current_phase(), WorkflowStatus::VotesTallied);
        assert_eq!(e.winning_proposal_id(), Some(1));
        let results = e.results();
        assert_eq!(results.votes_cast, 5);
        assert_eq!(results.winning_proposal_id, Some(1));
        assert_eq!(results.standings[2].vote_count, 2);
    }

    #[test]
    fn test_tally_without_proposals() {
        let admin = addr("admin");
        let mut e = election();
        e.start_proposals_registering(&admin).unwrap();
        e.end_proposals_registering(&admin).unwrap();
        e.start_voting_session(&admin).unwrap();
        e.end_voting_session(&admin).unwrap();

        let err = e.tally_votes(&admin).unwrap_err();
        assert!(matches!(err, Error::Validation(_)));
        assert_eq!(e.current_phase(), WorkflowStatus::VotingSessionEnded);
        assert_eq!(e.winning_proposal_id(), None);
    }

    #[test]
    fn test_end_to_end() {
        let admin = addr("A");
        let v1 = addr("V1");
        let mut e = Election::new(admin.clone()).unwrap();

        e.add_voter(&admin, v1.clone()).unwrap();
        e.start_proposals_registering(&admin).unwrap();
        assert_eq!(
            e.add_proposal(&v1, "desc".into()).unwrap(),
            ElectionEvent::ProposalRegistered { proposal_id: 0 }
        );
        e.end_proposals_registering(&admin).unwrap();
        e.start_voting_session(&admin).unwrap();
        e.set_vote(&v1, 0).unwrap();
        assert_eq!(e.proposal(0).unwrap().vote_count, 1);
        e.end_voting_session(&admin).unwrap();
        e.tally_votes(&admin).unwrap();

        assert_eq!(e.winning_proposal_id(), Some(0));
    }

    #[test]
    fn test_queries_do_not_mutate() {
        let e = voting_election(&["v1"], &["a"]);
        let snapshot = |e: &Election| {
            (
                e.current_phase(),
                e.voter(&addr("v1")).cloned(),
                e.proposal(0).cloned().unwrap(),
            )
        };
        let first = snapshot(&e);
        for _ in 0..3 {
            assert_eq!(first, snapshot(&e));
        }
    }
}
