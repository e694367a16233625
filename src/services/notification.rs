//! Notification boundary
//!
//! The engine does not deliver anything itself. Facts produced by a
//! committed operation are pushed onto an unbounded channel and the
//! messaging collaborator consumes them at its own pace, so delivery
//! latency never extends a booking transaction.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::models::NotificationFact;
use crate::utils::logging::log_notification_fact;

pub type NotificationReceiver = mpsc::UnboundedReceiver<NotificationFact>;

/// Notification statistics
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationStats {
    pub total_published: u64,
    pub total_dropped: u64,
    pub published_by_kind: HashMap<String, u64>,
}

/// Sending half of the notification channel; cheap to clone.
#[derive(Debug, Clone)]
pub struct NotificationEmitter {
    sender: mpsc::UnboundedSender<NotificationFact>,
    stats: Arc<Mutex<NotificationStats>>,
}

impl NotificationEmitter {
    /// Create an emitter and the receiver the collaborator reads from
    pub fn channel() -> (Self, NotificationReceiver) {
        let (sender, receiver) = mpsc::unbounded_channel();
        let emitter = Self {
            sender,
            stats: Arc::new(Mutex::new(NotificationStats::default())),
        };
        (emitter, receiver)
    }

    /// Publish one fact. A closed receiver drops the fact and is only
    /// logged; it never fails the operation that produced it.
    pub fn publish(&self, fact: NotificationFact) -> bool {
        let kind = fact.kind();
        let event_id = fact.event_id();

        match self.sender.send(fact) {
            Ok(()) => {
                debug!(kind, event_id, "Notification fact published");
                self.update_stats(|stats| {
                    stats.total_published += 1;
                    *stats.published_by_kind.entry(kind.to_string()).or_insert(0) += 1;
                });
                true
            }
            Err(_) => {
                warn!(kind, event_id, "Notification receiver closed, fact dropped");
                self.update_stats(|stats| stats.total_dropped += 1);
                false
            }
        }
    }

    /// Publish facts in order, returning how many were accepted
    pub fn publish_all(&self, facts: &[NotificationFact]) -> usize {
        facts.iter().filter(|fact| self.publish((*fact).clone())).count()
    }

    pub fn stats(&self) -> NotificationStats {
        self.stats.lock().map(|s| s.clone()).unwrap_or_default()
    }

    pub fn reset_stats(&self) {
        self.update_stats(|stats| *stats = NotificationStats::default());
    }

    pub fn is_closed(&self) -> bool {
        self.sender.is_closed()
    }

    fn update_stats(&self, f: impl FnOnce(&mut NotificationStats)) {
        if let Ok(mut stats) = self.stats.lock() {
            f(&mut stats);
        }
    }
}

/// Stand-in consumer for deployments without a messaging collaborator:
/// logs every fact until all emitters are dropped.
pub async fn log_notifications(mut receiver: NotificationReceiver) -> u64 {
    let mut consumed = 0u64;
    while let Some(fact) = receiver.recv().await {
        log_notification_fact(&fact);
        consumed += 1;
    }
    info!(consumed, "Notification channel closed");
    consumed
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_published_facts_arrive_in_order() {
        let (emitter, mut receiver) = NotificationEmitter::channel();
        let facts = vec![
            NotificationFact::WaitlistPromoted { event_id: 1, user_id: 7 },
            NotificationFact::SlotsLow { event_id: 1, free_slots: 1, total_slots: 5 },
        ];

        assert_eq!(emitter.publish_all(&facts), 2);
        assert_eq!(receiver.recv().await, Some(facts[0].clone()));
        assert_eq!(receiver.recv().await, Some(facts[1].clone()));
    }

    #[tokio::test]
    async fn test_stats_by_kind() {
        let (emitter, _receiver) = NotificationEmitter::channel();
        emitter.publish(NotificationFact::WaitlistPromoted { event_id: 1, user_id: 7 });
        emitter.publish(NotificationFact::WaitlistPromoted { event_id: 2, user_id: 8 });
        emitter.publish(NotificationFact::SlotsLow { event_id: 1, free_slots: 0, total_slots: 3 });

        let stats = emitter.stats();
        assert_eq!(stats.total_published, 3);
        assert_eq!(stats.published_by_kind.get("WAITLIST_PROMOTED"), Some(&2));
        assert_eq!(stats.published_by_kind.get("SLOTS_LOW"), Some(&1));

        emitter.reset_stats();
        assert_eq!(emitter.stats(), NotificationStats::default());
    }

    #[tokio::test]
    async fn test_closed_receiver_drops_without_error() {
        let (emitter, receiver) = NotificationEmitter::channel();
        drop(receiver);

        assert!(emitter.is_closed());
        assert!(!emitter.publish(NotificationFact::WaitlistPromoted { event_id: 1, user_id: 7 }));
        assert_eq!(emitter.stats().total_dropped, 1);
    }

    #[tokio::test]
    async fn test_log_consumer_stops_when_emitters_dropped() {
        let (emitter, receiver) = NotificationEmitter::channel();
        let consumer = tokio::spawn(log_notifications(receiver));

        emitter.publish(NotificationFact::SlotsLow { event_id: 3, free_slots: 1, total_slots: 4 });
        drop(emitter);

        assert_eq!(consumer.await.unwrap(), 1);
    }
}
