//! Business logic services for the warehouse transfer engine

pub mod audit;
pub mod availability;
pub mod ledger;
pub mod reconciler;
pub mod transfer;

pub use availability::AvailabilityService;
pub use transfer::TransferService;
