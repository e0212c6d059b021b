use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Debug, Clone)]
pub struct EventSender {
    sender: mpsc::Sender<Event>,
}

impl EventSender {
    /// Creates a new EventSender
    pub fn new(sender: mpsc::Sender<Event>) -> Self {
        Self { sender }
    }

    /// Sends an event asynchronously
    pub async fn send(&self, event: Event) -> Result<(), String> {
        self.sender
            .send(event)
            .await
            .map_err(|e| format!("Failed to send event: {}", e))
    }

    /// Sends an event; a closed channel is logged instead of failing the caller.
    pub async fn send_or_log(&self, event: Event) {
        if let Err(err) = self.send(event).await {
            warn!("{}", err);
        }
    }
}

/// Domain events published after a write has been committed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum Event {
    MasterDataCreated { kind: String, id: Uuid },
    MasterDataUpdated { kind: String, id: Uuid },
    MasterDataDeleted { kind: String, id: Uuid },

    ProductRegistered(Uuid),
    ProductUpdated(Uuid),
    ProductRetired(Uuid),
    ProductDeactivated(Uuid),

    StickerGenerated {
        product_id: Uuid,
        sticker_id: Uuid,
        code: String,
    },
    StickerPrinted(Uuid),
    StickerDeactivated(Uuid),

    AssignmentOpened {
        event_id: Uuid,
        product_id: Uuid,
        employee_id: Option<Uuid>,
    },
    AssignmentClosed {
        event_id: Uuid,
        product_id: Uuid,
    },
    AssignmentAcknowledged(Uuid),
    AssignmentVoided(Uuid),
    RepairStarted {
        event_id: Uuid,
        product_id: Uuid,
    },
    RepairCompleted {
        event_id: Uuid,
        product_id: Uuid,
    },

    ReportGenerated {
        report: String,
        format: String,
        rows: usize,
    },

    Generic {
        message: String,
        timestamp: DateTime<Utc>,
    },
}

impl Event {
    pub fn with_data(data: String) -> Self {
        Event::Generic {
            message: data,
            timestamp: Utc::now(),
        }
    }

    /// Stable name used in logs
    pub fn name(&self) -> &'static str {
        match self {
            Event::MasterDataCreated { .. } => "master_data.created",
            Event::MasterDataUpdated { .. } => "master_data.updated",
            Event::MasterDataDeleted { .. } => "master_data.deleted",
            Event::ProductRegistered(_) => "product.registered",
            Event::ProductUpdated(_) => "product.updated",
            Event::ProductRetired(_) => "product.retired",
            Event::ProductDeactivated(_) => "product.deactivated",
            Event::StickerGenerated { .. } => "sticker.generated",
            Event::StickerPrinted(_) => "sticker.printed",
            Event::StickerDeactivated(_) => "sticker.deactivated",
            Event::AssignmentOpened { .. } => "assignment.opened",
            Event::AssignmentClosed { .. } => "assignment.closed",
            Event::AssignmentAcknowledged(_) => "assignment.acknowledged",
            Event::AssignmentVoided(_) => "assignment.voided",
            Event::RepairStarted { .. } => "repair.started",
            Event::RepairCompleted { .. } => "repair.completed",
            Event::ReportGenerated { .. } => "report.generated",
            Event::Generic { .. } => "generic",
        }
    }
}

/// Drains the event channel until every sender is dropped.
pub async fn process_events(mut rx: mpsc::Receiver<Event>) {
    info!("Starting event processing loop");

    while let Some(event) = rx.recv().await {
        match serde_json::to_string(&event) {
            Ok(payload) => info!(event = event.name(), %payload, "domain event"),
            Err(err) => warn!(event = event.name(), error = %err, "unserializable domain event"),
        }
    }

    info!("Event channel closed; stopping event processing loop");
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn send_delivers_to_receiver() {
        let (tx, mut rx) = mpsc::channel(4);
        let sender = EventSender::new(tx);
        let id = Uuid::new_v4();

        sender.send(Event::ProductRegistered(id)).await.unwrap();
        assert_eq!(rx.recv().await, Some(Event::ProductRegistered(id)));
    }

    #[tokio::test]
    async fn send_or_log_tolerates_closed_channel() {
        let (tx, rx) = mpsc::channel(1);
        drop(rx);
        let sender = EventSender::new(tx);

        assert!(sender.send(Event::with_data("x".into())).await.is_err());
        sender.send_or_log(Event::with_data("x".into())).await;
    }
}
