//! Outbound ports (driven side): interfaces implemented by outbound adapters.
//!
//! These contracts describe infrastructure dependencies: wager and balance
//! storage, transactional scoping, and event delivery.

pub mod bus;
pub mod repository;
pub mod uow;
