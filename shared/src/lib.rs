//! Shared types and rules for the warehouse transfer engine
//!
//! This crate holds the storage-independent part of the engine: the transfer
//! state machine, receipt classification, availability arithmetic and input
//! validation. The backend wraps these with persistence and HTTP.

pub mod availability;
pub mod models;
pub mod receipt;
pub mod types;
pub mod validation;

pub use models::*;
pub use types::*;
pub use validation::*;
