//! Broadcast bus for `WorkflowDataEvent`.
//!
//! Built on `tokio::sync::broadcast`. Publishing with no subscribers is a
//! no-op; slow subscribers observe `RecvError::Lagged` rather than blocking
//! the engine.

use tokio::sync::broadcast;
use worklet_types::event::WorkflowDataEvent;

pub struct EventBus {
    sender: broadcast::Sender<WorkflowDataEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (sender, _) = broadcast::channel(capacity.max(1));
        Self { sender }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowDataEvent> {
        self.sender.subscribe()
    }

    pub fn publish(&self, event: WorkflowDataEvent) {
        let _ = self.sender.send(event);
    }

    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Clone for EventBus {
    fn clone(&self) -> Self {
        Self {
            sender: self.sender.clone(),
        }
    }
}

impl std::fmt::Debug for EventBus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBus")
            .field("receiver_count", &self.sender.receiver_count())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::sync::broadcast::error::RecvError;
    use worklet_types::event::WorkflowDataEventKind;
    use worklet_types::program_counter::ProgramCounter;
    use worklet_types::workflow::WorkflowState;

    fn sample(kind: WorkflowDataEventKind) -> WorkflowDataEvent {
        WorkflowDataEvent::new(kind, "lab:of:wf", WorkflowState::Running, ProgramCounter::init())
    }

    #[tokio::test]
    async fn every_subscriber_receives_the_event() {
        let bus = EventBus::new(16);
        let mut rx1 = bus.subscribe();
        let mut rx2 = bus.subscribe();
        assert_eq!(bus.subscriber_count(), 2);

        bus.publish(sample(WorkflowDataEventKind::Insert));

        assert_eq!(rx1.recv().await.unwrap().kind, WorkflowDataEventKind::Insert);
        assert_eq!(rx2.recv().await.unwrap().context_name, "lab:of:wf");
    }

    #[tokio::test]
    async fn publish_without_subscribers_is_a_no_op() {
        let bus = EventBus::new(4);
        bus.publish(sample(WorkflowDataEventKind::Remove));
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[tokio::test]
    async fn lagging_subscriber_skips_ahead() {
        let bus = EventBus::new(2);
        let mut rx = bus.subscribe();
        for _ in 0..5 {
            bus.publish(sample(WorkflowDataEventKind::Update));
        }
        assert!(matches!(rx.recv().await, Err(RecvError::Lagged(_))));
        assert!(rx.recv().await.is_ok());
    }
}
