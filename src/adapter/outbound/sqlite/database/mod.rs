//! SQLite database modules.
//!
//! Connection pooling, the Diesel schema for the wagering tables, and
//! the row types mapped over them.

pub mod connection;
pub mod model;
pub mod schema;
