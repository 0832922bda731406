//! Command Handlers module
//!
//! Orchestrators for every balance-affecting operation. Each one opens a
//! unit of work, applies its checks and mutations inside it, and commits
//! once at the end.

mod account_handler;
mod bill_handler;
mod commands;
mod position_handler;
mod transfer_handler;


pub use account_handler::AccountOperations;
pub use bill_handler::BillSettlement;
pub use commands::*;
pub use position_handler::PositionTracker;
pub use transfer_handler::TransferCoordinator;
