//! Builders for wager requests used across tests.
//!
//! Message ids are unique per database, so every builder call draws a
//! fresh one from a process-wide counter.

use std::sync::atomic::{AtomicI64, Ordering};

use crate::domain::{ChannelId, ExternalReference, MessageId, NewGroupWager, UserId, WagerType};

static NEXT_MESSAGE_ID: AtomicI64 = AtomicI64::new(9_000);

/// Next unique Discord-style message id.
pub fn next_message_id() -> MessageId {
    MessageId::new(NEXT_MESSAGE_ID.fetch_add(1, Ordering::Relaxed))
}

/// Pool wager request with one zeroed initial odds slot per option.
#[must_use]
pub fn pool_wager_request(options: &[&str]) -> NewGroupWager {
    wager_request(options, WagerType::Pool)
}

/// House wager request with flat 2.0 initial odds per option.
#[must_use]
pub fn house_wager_request(options: &[&str]) -> NewGroupWager {
    let mut req = wager_request(options, WagerType::House);
    req.initial_odds = vec![2.0; options.len()];
    req
}

/// House wager request tied to an external match or fixture.
#[must_use]
pub fn external_wager_request(options: &[&str], system: &str, id: &str) -> NewGroupWager {
    let mut req = wager_request(options, WagerType::House);
    req.external_ref = Some(ExternalReference::new(system, id));
    req
}

fn wager_request(options: &[&str], wager_type: WagerType) -> NewGroupWager {
    NewGroupWager {
        creator_id: Some(UserId::new(42)),
        condition: "Who wins the grand final?".to_string(),
        options: options.iter().map(|s| s.to_string()).collect(),
        initial_odds: vec![0.0; options.len()],
        wager_type,
        voting_period_minutes: 60,
        message_id: next_message_id(),
        channel_id: ChannelId::new(4242),
        external_ref: None,
    }
}
