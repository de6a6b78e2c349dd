//! Guild-agnostic wagering domain logic.

pub mod error;

mod detail;
mod id;
mod ledger;
mod participant;
mod wager;

// Identifier newtypes
pub use id::{
    BalanceHistoryId, ChannelId, GuildId, MessageId, OptionId, ParticipantId, UserId, WagerId,
};

// Wager aggregate
pub use detail::{pari_mutuel_payout, WagerDetail, WagerResult};
pub use participant::Participant;
pub use wager::{
    ExternalReference, GroupWager, NewGroupWager, NewWagerOption, WagerOption, WagerState,
    WagerType, MAX_VOTING_PERIOD_MINUTES, MAX_WAGER_OPTIONS, MIN_VOTING_PERIOD_MINUTES,
    MIN_WAGER_OPTIONS,
};

// Balance ledger
pub use ledger::{BalanceAdjustment, BalanceHistory, RelatedRef, RelatedType, TransactionType};
