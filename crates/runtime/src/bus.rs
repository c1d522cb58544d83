//! In-process event bus with a single subscriber task.
//!
//! Events are handled one at a time in publish order.  Only
//! [`CONTENT_CREATED`] reaches the handler; every other topic is dropped
//! before any step runs.  Delivery is at-most-once: events still queued when
//! the bus shuts down are lost.

use std::sync::Arc;

use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::events::{CONTENT_CREATED, Event};
use crate::handler::{AgentEventHandler, HandleReport};

pub const DEFAULT_BUS_CAPACITY: usize = 64;

#[derive(Debug, Error)]
#[error("event bus closed")]
pub struct BusClosed;

#[derive(Clone)]
pub struct EventBus {
    tx: mpsc::Sender<Event>,
}

/// Handle on the running subscriber.
pub struct Subscription {
    /// One report per handled event, in order.
    pub reports: mpsc::UnboundedReceiver<HandleReport>,
    /// Resolves to the number of events handled once every [`EventBus`]
    /// clone has been dropped.
    pub task: JoinHandle<usize>,
}

impl EventBus {
    /// Spawn the subscriber task on the current tokio runtime.
    pub fn spawn(handler: Arc<AgentEventHandler>, capacity: usize) -> (Self, Subscription) {
        let (tx, mut rx) = mpsc::channel::<Event>(capacity.max(1));
        let (report_tx, reports) = mpsc::unbounded_channel();

        let task = tokio::spawn(async move {
            let mut handled = 0usize;
            while let Some(event) = rx.recv().await {
                if event.topic != CONTENT_CREATED {
                    debug!(topic = %event.topic, "ignoring event");
                    continue;
                }
                let report = handler.handle(&event).await;
                handled += 1;
                // Nobody listening for reports is fine.
                let _ = report_tx.send(report);
            }
            info!(handled, "event bus subscriber stopped");
            handled
        });

        (Self { tx }, Subscription { reports, task })
    }

    pub async fn publish(&self, event: Event) -> Result<(), BusClosed> {
        self.tx.send(event).await.map_err(|_| BusClosed)
    }
}
