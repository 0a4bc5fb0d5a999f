use crate::scene::{SceneId, WorldId};
use std::fmt;
use std::sync::mpsc::{channel, Receiver, Sender};

/// Lifecycle notifications for the editable world. Observers hold a
/// `WorldSubscription` and drain it on their own tick; publishing never calls
/// back into subscribers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WorldEvent {
    Created { world: WorldId, scene: SceneId },
    Destroyed { world: WorldId },
}

impl fmt::Display for WorldEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WorldEvent::Created { world, scene } => write!(f, "Created {world} {scene}"),
            WorldEvent::Destroyed { world } => write!(f, "Destroyed {world}"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Receiving end of a subscription. Keep it alive for as long as events are
/// wanted; pass its id to `unsubscribe` when done.
pub struct WorldSubscription {
    id: SubscriptionId,
    rx: Receiver<WorldEvent>,
}

impl WorldSubscription {
    pub fn id(&self) -> SubscriptionId {
        self.id
    }

    /// All events published since the last drain, in publish order.
    pub fn drain(&self) -> Vec<WorldEvent> {
        self.rx.try_iter().collect()
    }
}

#[derive(Default)]
pub struct WorldEvents {
    next_id: u64,
    subscribers: Vec<(SubscriptionId, Sender<WorldEvent>)>,
}

impl WorldEvents {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn subscribe(&mut self) -> WorldSubscription {
        let id = SubscriptionId(self.next_id);
        self.next_id += 1;
        let (tx, rx) = channel();
        self.subscribers.push((id, tx));
        WorldSubscription { id, rx }
    }

    /// Removes a subscriber. Returns false if the id was already gone.
    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.subscribers.len();
        self.subscribers.retain(|(sub_id, _)| *sub_id != id);
        self.subscribers.len() != before
    }

    /// Fans the event out to every live subscriber, pruning any whose
    /// receiving end has been dropped.
    pub fn publish(&mut self, event: WorldEvent) {
        self.subscribers.retain(|(_, tx)| tx.send(event).is_ok());
    }

    pub fn subscriber_count(&self) -> usize {
        self.subscribers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn subscribers_receive_events_in_publish_order() {
        let mut events = WorldEvents::new();
        let sub = events.subscribe();
        events.publish(WorldEvent::Created { world: WorldId(1), scene: SceneId(1) });
        events.publish(WorldEvent::Destroyed { world: WorldId(1) });
        let drained = sub.drain();
        assert_eq!(
            drained,
            vec![
                WorldEvent::Created { world: WorldId(1), scene: SceneId(1) },
                WorldEvent::Destroyed { world: WorldId(1) },
            ]
        );
        assert!(sub.drain().is_empty(), "drain consumes");
    }

    #[test]
    fn unsubscribe_stops_delivery() {
        let mut events = WorldEvents::new();
        let sub = events.subscribe();
        assert!(events.unsubscribe(sub.id()));
        assert!(!events.unsubscribe(sub.id()));
        events.publish(WorldEvent::Destroyed { world: WorldId(7) });
        assert!(sub.drain().is_empty());
    }

    #[test]
    fn dropped_subscriptions_are_pruned_on_publish() {
        let mut events = WorldEvents::new();
        let keep = events.subscribe();
        {
            let _dropped = events.subscribe();
        }
        assert_eq!(events.subscriber_count(), 2);
        events.publish(WorldEvent::Destroyed { world: WorldId(2) });
        assert_eq!(events.subscriber_count(), 1);
        assert_eq!(keep.drain().len(), 1);
    }

    #[test]
    fn subscription_ids_are_unique() {
        let mut events = WorldEvents::new();
        let a = events.subscribe();
        let b = events.subscribe();
        assert_ne!(a.id(), b.id());
    }
}
