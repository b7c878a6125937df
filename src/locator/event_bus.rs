use serde::Serialize;
use tokio::sync::broadcast;

use crate::locator::state::WorkflowState;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum NoticeLevel {
    Info,
    Warning,
    Error,
}

/// What a UI shell observes from a workflow.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum WorkflowEvent {
    StateChanged { generation: u64, state: WorkflowState },
    /// User-visible message (rejected upload, failed capture, ...).
    Notice { level: NoticeLevel, message: String },
}

pub struct EventBus {
    tx: broadcast::Sender<WorkflowEvent>,
}

impl EventBus {
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn subscribe(&self) -> broadcast::Receiver<WorkflowEvent> {
        self.tx.subscribe()
    }

    /// Publishing with nobody listening is fine.
    pub fn publish(&self, event: WorkflowEvent) {
        if self.tx.send(event).is_err() {
            tracing::trace!("no event subscribers");
        }
    }

    pub fn notice(&self, level: NoticeLevel, message: impl Into<String>) {
        self.publish(WorkflowEvent::Notice {
            level,
            message: message.into(),
        });
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new(64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_subscribers_receive_events() {
        let bus = EventBus::default();
        let mut rx = bus.subscribe();
        bus.notice(NoticeLevel::Error, "You can only upload image files!");
        match rx.recv().await.unwrap() {
            WorkflowEvent::Notice { level, message } => {
                assert_eq!(level, NoticeLevel::Error);
                assert_eq!(message, "You can only upload image files!");
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_publish_without_subscribers_is_silent() {
        let bus = EventBus::new(0);
        bus.publish(WorkflowEvent::StateChanged {
            generation: 1,
            state: WorkflowState::Idle,
        });
    }

    #[test]
    fn test_event_serialization_is_tagged() {
        let ev = WorkflowEvent::StateChanged {
            generation: 3,
            state: WorkflowState::AwaitingScreenshot,
        };
        let v = serde_json::to_value(&ev).unwrap();
        assert_eq!(v["type"], "state_changed");
        assert_eq!(v["generation"], 3);
        assert_eq!(v["state"]["state"], "awaiting_screenshot");
    }
}
