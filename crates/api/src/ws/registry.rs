use dashmap::DashMap;
use tokio::sync::mpsc::UnboundedSender;
use tracing::debug;
use uuid::Uuid;

/// Outbound queue handle for one subscriber connection. The receiving
/// end lives in that connection's task; a closed channel means the
/// connection is gone.
pub type SubscriberSender = UnboundedSender<String>;

/// Tracks all live subscriber connections.
///
/// Registration and broadcasts may interleave freely across tasks; the
/// map guards each entry, so a half-registered subscriber is never
/// visible to a broadcast.
#[derive(Default)]
pub struct SubscriberSet {
    senders: DashMap<Uuid, SubscriberSender>,
}

impl SubscriberSet {
    pub fn new() -> Self {
        Self {
            senders: DashMap::new(),
        }
    }

    /// Registers a subscriber. Re-adding an id replaces its queue.
    pub fn add(&self, id: Uuid, sender: SubscriberSender) {
        self.senders.insert(id, sender);
    }

    /// Removes a subscriber. Removing an unknown id is a no-op.
    pub fn remove(&self, id: &Uuid) {
        self.senders.remove(id);
    }

    pub fn len(&self) -> usize {
        self.senders.len()
    }

    pub fn is_empty(&self) -> bool {
        self.senders.is_empty()
    }

    /// Queues an already-serialized event to every subscriber.
    ///
    /// Sends are independent: a subscriber whose connection has gone
    /// away is pruned without affecting delivery to the rest, and
    /// nothing here waits on network I/O.
    pub fn broadcast(&self, payload: &str) {
        let mut dead = Vec::new();
        for entry in self.senders.iter() {
            if entry.value().send(payload.to_owned()).is_err() {
                dead.push(*entry.key());
            }
        }
        for id in dead {
            self.senders.remove(&id);
            debug!(%id, "pruned disconnected subscriber");
        }
    }

    /// Drops every outbound queue, closing all subscriber connections.
    pub fn clear(&self) {
        self.senders.clear();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::mpsc;

    #[test]
    fn broadcast_delivers_to_every_live_subscriber() {
        let set = SubscriberSet::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, mut rx2) = mpsc::unbounded_channel();
        set.add(Uuid::new_v4(), tx1);
        set.add(Uuid::new_v4(), tx2);

        set.broadcast("payload");
        assert_eq!(rx1.try_recv().unwrap(), "payload");
        assert_eq!(rx2.try_recv().unwrap(), "payload");
    }

    #[test]
    fn broadcast_prunes_dead_subscriber_in_one_call() {
        let set = SubscriberSet::new();
        let (tx1, mut rx1) = mpsc::unbounded_channel();
        let (tx2, rx2) = mpsc::unbounded_channel();
        let (tx3, mut rx3) = mpsc::unbounded_channel();
        set.add(Uuid::new_v4(), tx1);
        let dead_id = Uuid::new_v4();
        set.add(dead_id, tx2);
        set.add(Uuid::new_v4(), tx3);
        drop(rx2);

        set.broadcast("payload");

        assert_eq!(rx1.try_recv().unwrap(), "payload");
        assert_eq!(rx3.try_recv().unwrap(), "payload");
        assert_eq!(set.len(), 2);

        // A second broadcast reaches the survivors only.
        set.broadcast("again");
        assert_eq!(rx1.try_recv().unwrap(), "again");
        assert_eq!(rx3.try_recv().unwrap(), "again");
    }

    #[test]
    fn add_and_remove_are_idempotent() {
        let set = SubscriberSet::new();
        let id = Uuid::new_v4();
        let (tx, _rx) = mpsc::unbounded_channel();
        let (tx2, _rx2) = mpsc::unbounded_channel();
        set.add(id, tx);
        set.add(id, tx2);
        assert_eq!(set.len(), 1);
        set.remove(&id);
        set.remove(&id);
        assert!(set.is_empty());
    }

    #[test]
    fn clear_closes_every_queue() {
        let set = SubscriberSet::new();
        let (tx, mut rx) = mpsc::unbounded_channel();
        set.add(Uuid::new_v4(), tx);
        set.clear();
        assert!(set.is_empty());
        assert!(rx.try_recv().is_err());
    }
}
