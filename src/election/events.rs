//! Election notifications
//!
//! Every accepted command produces exactly one [`ElectionEvent`]. The
//! [`EventBus`] numbers them, keeps a bounded history for late readers
//! (indexers polling `/events`) and fans them out to live subscribers.

use std::collections::VecDeque;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

use super::model::{Address, ProposalId};
use super::phase::WorkflowStatus;

/// Notification emitted after a successful mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ElectionEvent {
    VoterRegistered {
        voter: Address,
    },
    WorkflowStatusChange {
        previous: WorkflowStatus,
        current: WorkflowStatus,
    },
    ProposalRegistered {
        proposal_id: ProposalId,
    },
    Voted {
        voter: Address,
        proposal_id: ProposalId,
    },
}

impl ElectionEvent {
    /// Short event name (used as the SSE event type)
    pub fn name(&self) -> &'static str {
        match self {
            ElectionEvent::VoterRegistered { .. } => "VoterRegistered",
            ElectionEvent::WorkflowStatusChange { .. } => "WorkflowStatusChange",
            ElectionEvent::ProposalRegistered { .. } => "ProposalRegistered",
            ElectionEvent::Voted { .. } => "Voted",
        }
    }
}

/// A published event with its position in the election's history
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventRecord {
    /// Starts at 1, strictly increasing
    pub sequence: u64,
    pub emitted_at: DateTime<Utc>,
    pub event: ElectionEvent,
}

/// Bounded event history plus a broadcast channel
pub struct EventBus {
    history: VecDeque<EventRecord>,
    history_limit: usize,
    next_sequence: u64,
    sender: broadcast::Sender<EventRecord>,
}

impl EventBus {
    /// Create a bus retaining at most `history_limit` records
    pub fn new(history_limit: usize, channel_capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(channel_capacity.max(1));
        Self {
            history: VecDeque::with_capacity(history_limit.min(1024)),
            history_limit: history_limit.max(1),
            next_sequence: 1,
            sender,
        }
    }

    /// Number and record an event, then hand it to live subscribers
    pub fn publish(&mut self, event: ElectionEvent) -> EventRecord {
        let record = EventRecord {
            sequence: self.next_sequence,
            emitted_at: Utc::now(),
            event,
        };
        self.next_sequence += 1;

        if self.history.len() == self.history_limit {
            self.history.pop_front();
        }
        self.history.push_back(record.clone());

        // No subscribers is fine, history still has it
        if self.sender.send(record.clone()).is_err() {
            tracing::trace!("No live subscribers for event #{}", record.sequence);
        }

        record
    }

    /// Subscribe to events published from now on
    pub fn subscribe(&self) -> broadcast::Receiver<EventRecord> {
        self.sender.subscribe()
    }

    /// Retained records with a sequence greater than `since`
    pub fn history_since(&self, since: u64) -> Vec<EventRecord> {
        self.history
            .iter()
            .filter(|r| r.sequence > since)
            .cloned()
            .collect()
    }

    /// Sequence number of the most recent event (0 if none)
    pub fn last_sequence(&self) -> u64 {
        self.next_sequence - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn registered(id: &str) -> ElectionEvent {
        ElectionEvent::VoterRegistered {
            voter: Address::from(id),
        }
    }

    #[test]
    fn test_history_is_bounded() {
        let mut bus = EventBus::new(2, 8);
        bus.publish(registered("a"));
        bus.publish(registered("b"));
        bus.publish(registered("c"));

        let all = bus.history_since(0);
        assert_eq!(all.len(), 2);
        assert_eq!(all[0].sequence, 2);
        assert_eq!(all[1].event, registered("c"));
        assert_eq!(bus.last_sequence(), 3);
        assert_eq!(bus.history_since(2).len(), 1);
    }

    #[tokio::test]
    async fn test_subscribers_receive_in_order() {
        let mut bus = EventBus::new(16, 8);
        let mut rx = bus.subscribe();

        bus.publish(registered("a"));
        bus.publish(ElectionEvent::WorkflowStatusChange {
            previous: WorkflowStatus::RegisteringVoters,
            current: WorkflowStatus::ProposalsRegistrationStarted,
        });

        assert_eq!(rx.recv().await.unwrap().sequence, 1);
        let second = rx.recv().await.unwrap();
        assert_eq!(second.sequence, 2);
        assert_eq!(second.event.name(), "WorkflowStatusChange");
    }

    #[test]
    fn test_event_wire_format() {
        let json = serde_json::to_value(ElectionEvent::Voted {
            voter: Address::from("v1"),
            proposal_id: 0,
        })
        .unwrap();
        assert_eq!(json["type"], "voted");
        assert_eq!(json["voter"], "v1");
        assert_eq!(json["proposal_id"], 0);
    }
}
