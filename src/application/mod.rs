//! Application layer orchestrating split expenses.
//!
//! `SplitLedger` is the entry point. It works against the ports in
//! `domain::ports`, serializes writes per split through `SplitLocks`, and
//! reports best-effort side effects through the types in `outcome`.

pub mod ledger;
pub mod locks;
pub mod outcome;
pub mod registry;
pub mod views;
