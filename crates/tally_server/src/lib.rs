//! tally_server: REST surface over the scoring ledger.

pub mod config;
pub mod error;
pub mod handlers;
pub mod router;
pub mod session;
