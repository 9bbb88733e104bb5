//! Domain models for the warehouse transfer engine

mod audit;
mod inventory;
mod transfer;

pub use audit::*;
pub use inventory::*;
pub use transfer::*;
