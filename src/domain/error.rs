//! Domain validation errors for core domain types.
//!
//! This module defines errors that occur when domain invariants are violated.
//! These errors are returned by entity state transitions and by parsers for
//! persisted enum representations.
//!
//! # Examples
//!
//! Handling an invalid transition:
//!
//! ```
//! use tote::domain::error::DomainError;
//! use tote::domain::WagerState;
//!
//! let result = WagerState::Resolved.transition_to(WagerState::Active);
//! assert!(matches!(result, Err(DomainError::InvalidTransition { .. })));
//! ```

use thiserror::Error;

use super::wager::WagerState;

/// Errors that occur when domain invariants are violated.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DomainError {
    /// The requested state change is not allowed by the wager lifecycle.
    #[error("invalid state transition from {from} to {to}")]
    InvalidTransition {
        /// The state the wager is currently in.
        from: WagerState,
        /// The state the caller asked for.
        to: WagerState,
    },

    /// A persisted wager state string did not match any known state.
    #[error("unknown wager state: {0}")]
    UnknownState(String),

    /// A persisted wager type string did not match any known type.
    #[error("unknown wager type: {0}")]
    UnknownWagerType(String),

    /// A persisted transaction type string did not match any known type.
    #[error("unknown transaction type: {0}")]
    UnknownTransactionType(String),

    /// A persisted related-entity type string did not match any known type.
    #[error("unknown related entity type: {0}")]
    UnknownRelatedType(String),

    /// Option or stake totals do not add up to the wager's total pot.
    #[error(
        "pool imbalance: pot {total_pot}, option totals sum to {option_sum}, stakes sum to {stake_sum}"
    )]
    PoolImbalance {
        /// The wager's recorded total pot.
        total_pot: i64,
        /// Sum of the per-option stake totals.
        option_sum: i64,
        /// Sum of all participant stakes.
        stake_sum: i64,
    },
}
