use serde::Serialize;
use tokio::sync::mpsc;
use tracing::warn;

/// What happened to an entity. Consumers (webhooks, broadcast) only ever see
/// these three transitions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum EventAction {
    Created,
    Updated,
    Deleted,
}

#[derive(Debug, Clone, Serialize)]
pub struct DomainEvent {
    pub action: EventAction,
    pub entity: String,
    pub payload: serde_json::Value,
}

/// Best-effort outbound event queue. Delivery is fire-and-forget: a full or
/// closed channel drops the event with a warning and never fails the
/// mutation that produced it. No ordering guarantee across concurrent
/// mutations.
#[derive(Debug, Clone)]
pub struct EventSink {
    sender: Option<mpsc::Sender<DomainEvent>>,
}

impl EventSink {
    pub fn new(capacity: usize) -> (Self, mpsc::Receiver<DomainEvent>) {
        let (sender, receiver) = mpsc::channel(capacity);
        (
            Self {
                sender: Some(sender),
            },
            receiver,
        )
    }

    /// A sink that discards everything. Handy where no delivery pipeline is
    /// wired up, including most tests.
    pub fn disabled() -> Self {
        Self { sender: None }
    }

    pub fn emit(&self, action: EventAction, entity: &str, payload: serde_json::Value) {
        let Some(sender) = &self.sender else {
            return;
        };

        let event = DomainEvent {
            action,
            entity: entity.to_string(),
            payload,
        };

        if let Err(err) = sender.try_send(event) {
            warn!(entity = %entity, error = %err, "Dropping domain event");
        }
    }
}
