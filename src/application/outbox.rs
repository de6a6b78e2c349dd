//! Transactional event outbox.
//!
//! Events published during a transaction accumulate here and are only
//! delivered after the transaction commits. If the transaction rolls
//! back, the buffer is discarded and nothing observable happened.

use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::error::Result;
use crate::port::outbound::bus::{Event, EventBus, LocalHandlerRegistry};

/// Buffering publisher bound to one unit of work.
///
/// Implements [`EventBus`] so services publish through the same port
/// whether or not a transaction is in flight. Delivery on flush is
/// at-least-once: local handlers run first, synchronously and in
/// registration order, then each event goes to the remote bus. Failures
/// on either leg are logged and skipped because the transaction that
/// produced the events has already committed.
pub struct EventOutbox {
    /// Correlation id of the owning transaction, carried into flush logs.
    tx_id: Uuid,
    pending: Mutex<Vec<Event>>,
    handlers: Arc<LocalHandlerRegistry>,
    remote: Arc<dyn EventBus>,
}

impl EventOutbox {
    /// Create an empty outbox for one transaction.
    #[must_use]
    pub fn new(tx_id: Uuid, handlers: Arc<LocalHandlerRegistry>, remote: Arc<dyn EventBus>) -> Self {
        Self {
            tx_id,
            pending: Mutex::new(Vec::new()),
            handlers,
            remote,
        }
    }

    /// Number of events waiting for commit.
    #[must_use]
    pub fn pending_count(&self) -> usize {
        self.pending.lock().len()
    }

    /// Drop all buffered events. Returns how many were discarded.
    pub fn discard(&self) -> usize {
        let mut pending = self.pending.lock();
        let discarded = pending.len();
        pending.clear();
        discarded
    }

    /// Deliver all buffered events in publish order.
    ///
    /// Called by the unit of work after a successful commit. Never
    /// returns an error: post-commit delivery failures must not unwind
    /// state that is already durable.
    pub async fn flush(&self) {
        let events = std::mem::take(&mut *self.pending.lock());
        if events.is_empty() {
            return;
        }
        debug!(tx_id = %self.tx_id, count = events.len(), "Flushing buffered events");

        for event in events {
            let kind = event.kind();
            let failures = self.handlers.dispatch(&event);
            if failures > 0 {
                warn!(
                    tx_id = %self.tx_id,
                    kind = %kind,
                    failures,
                    "Local handlers failed during flush"
                );
            }
            if let Err(e) = self.remote.publish(event).await {
                warn!(
                    tx_id = %self.tx_id,
                    kind = %kind,
                    error = %e,
                    "Remote event publish failed"
                );
            }
        }
    }
}

#[async_trait]
impl EventBus for EventOutbox {
    /// Buffer the event until the owning transaction commits.
    async fn publish(&self, event: Event) -> Result<()> {
        self.pending.lock().push(event);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{GuildId, TransactionType, UserId};
    use crate::port::outbound::bus::{BalanceChangedEvent, EventKind};
    use crate::testkit::{FailingEventBus, RecordingEventBus};

    fn event(change: i64) -> Event {
        Event::BalanceChanged(BalanceChangedEvent {
            guild_id: GuildId::new(1),
            user_id: UserId::new(2),
            balance_before: 100,
            balance_after: 100 + change,
            change_amount: change,
            transaction_type: TransactionType::Adjustment,
        })
    }

    fn outbox_with(remote: Arc<dyn EventBus>, handlers: LocalHandlerRegistry) -> EventOutbox {
        EventOutbox::new(Uuid::new_v4(), Arc::new(handlers), remote)
    }

    #[tokio::test]
    async fn publish_buffers_without_delivering() {
        let remote = Arc::new(RecordingEventBus::new());
        let outbox = outbox_with(remote.clone(), LocalHandlerRegistry::new());

        outbox.publish(event(5)).await.unwrap();
        outbox.publish(event(-3)).await.unwrap();

        assert_eq!(outbox.pending_count(), 2);
        assert_eq!(remote.len(), 0);
    }

    #[tokio::test]
    async fn flush_delivers_in_publish_order_and_empties_the_buffer() {
        let remote = Arc::new(RecordingEventBus::new());
        let outbox = outbox_with(remote.clone(), LocalHandlerRegistry::new());

        outbox.publish(event(1)).await.unwrap();
        outbox.publish(event(2)).await.unwrap();
        outbox.flush().await;

        let delivered = remote.events();
        assert_eq!(delivered.len(), 2);
        assert!(matches!(
            &delivered[0],
            Event::BalanceChanged(e) if e.change_amount == 1
        ));
        assert!(matches!(
            &delivered[1],
            Event::BalanceChanged(e) if e.change_amount == 2
        ));
        assert_eq!(outbox.pending_count(), 0);
    }

    #[tokio::test]
    async fn local_handlers_run_before_the_remote_bus() {
        let order = Arc::new(Mutex::new(Vec::new()));

        struct TracingBus {
            order: Arc<Mutex<Vec<&'static str>>>,
        }

        #[async_trait]
        impl EventBus for TracingBus {
            async fn publish(&self, _event: Event) -> Result<()> {
                self.order.lock().push("remote");
                Ok(())
            }
        }

        let mut handlers = LocalHandlerRegistry::new();
        let handler_order = order.clone();
        handlers.register(EventKind::BalanceChanged, move |_| {
            handler_order.lock().push("local");
            Ok(())
        });

        let outbox = outbox_with(
            Arc::new(TracingBus {
                order: order.clone(),
            }),
            handlers,
        );
        outbox.publish(event(1)).await.unwrap();
        outbox.flush().await;

        assert_eq!(*order.lock(), vec!["local", "remote"]);
    }

    #[tokio::test]
    async fn remote_failures_do_not_abort_the_flush() {
        let outbox = outbox_with(Arc::new(FailingEventBus), LocalHandlerRegistry::new());

        outbox.publish(event(1)).await.unwrap();
        outbox.publish(event(2)).await.unwrap();
        // flush never returns an error and drains the buffer anyway
        outbox.flush().await;

        assert_eq!(outbox.pending_count(), 0);
    }

    #[tokio::test]
    async fn failing_local_handler_still_reaches_the_remote_bus() {
        let remote = Arc::new(RecordingEventBus::new());
        let mut handlers = LocalHandlerRegistry::new();
        handlers.register(EventKind::BalanceChanged, |_| {
            Err(anyhow::anyhow!("render failed"))
        });

        let outbox = outbox_with(remote.clone(), handlers);
        outbox.publish(event(1)).await.unwrap();
        outbox.flush().await;

        assert_eq!(remote.len(), 1);
    }

    #[tokio::test]
    async fn discard_drops_everything() {
        let remote = Arc::new(RecordingEventBus::new());
        let outbox = outbox_with(remote.clone(), LocalHandlerRegistry::new());

        outbox.publish(event(1)).await.unwrap();
        outbox.publish(event(2)).await.unwrap();

        assert_eq!(outbox.discard(), 2);
        assert_eq!(outbox.pending_count(), 0);

        outbox.flush().await;
        assert_eq!(remote.len(), 0);
    }

    #[tokio::test]
    async fn flush_on_an_empty_outbox_is_a_no_op() {
        let remote = Arc::new(RecordingEventBus::new());
        let outbox = outbox_with(remote.clone(), LocalHandlerRegistry::new());
        outbox.flush().await;
        assert_eq!(remote.len(), 0);
    }
}
