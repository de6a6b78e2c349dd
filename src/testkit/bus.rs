//! Event bus doubles for asserting on post-commit delivery.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::error::{Error, Result};
use crate::port::outbound::bus::{Event, EventBus, EventKind};

/// Remote bus that records every published event.
#[derive(Clone, Default)]
pub struct RecordingEventBus {
    events: Arc<Mutex<Vec<Event>>>,
}

impl RecordingEventBus {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of events delivered so far.
    #[must_use]
    pub fn len(&self) -> usize {
        self.events.lock().len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Snapshot of everything delivered, in delivery order.
    #[must_use]
    pub fn events(&self) -> Vec<Event> {
        self.events.lock().clone()
    }

    /// Delivered events of one kind, in delivery order.
    #[must_use]
    pub fn by_kind(&self, kind: EventKind) -> Vec<Event> {
        self.events
            .lock()
            .iter()
            .filter(|e| e.kind() == kind)
            .cloned()
            .collect()
    }
}

#[async_trait]
impl EventBus for RecordingEventBus {
    async fn publish(&self, event: Event) -> Result<()> {
        self.events.lock().push(event);
        Ok(())
    }
}

/// Remote bus whose deliveries always fail.
pub struct FailingEventBus;

#[async_trait]
impl EventBus for FailingEventBus {
    async fn publish(&self, _event: Event) -> Result<()> {
        Err(Error::Connection("remote bus unavailable".to_string()))
    }
}
