//! Core of the unit tally: scoring, authorization policy and the record
//! lifecycle, written against storage port traits only.

pub mod audit;
pub mod derivation;
pub mod edit;
pub mod error;
pub mod memory;
pub mod policy;
pub mod ports;
pub mod principal;
pub mod service;
pub mod settings;
pub mod stats;
pub mod types;

pub use error::TallyError;
pub use principal::Principal;
pub use service::{LedgerService, LedgerServiceImpl};
