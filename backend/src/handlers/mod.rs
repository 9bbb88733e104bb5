//! HTTP handlers

pub mod health;
pub mod transfer;
pub mod warehouse;

pub use health::health_check;
pub use transfer::{
    cancel_transfer, dispatch_transfer, get_transfer_detail, initiate_return, initiate_transfer,
    list_transfers, receive_transfer,
};
pub use warehouse::{get_available_batches, get_warehouse_inventory};
