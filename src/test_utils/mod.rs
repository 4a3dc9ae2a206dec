//! Test utilities shared by use-case and route tests.
//!
//! This module provides:
//! - Test data factories with override closures
//! - `InMemoryLedger`, one lock over plans, subscriptions, payments and members
//! - Doubles for the clock, audit log and proof storage ports
//! - `TestAppStateBuilder` for HTTP-level tests

mod app_state_builder;
mod factories;
mod ledger_mocks;
mod port_mocks;

pub use app_state_builder::*;
pub use factories::*;
pub use ledger_mocks::*;
pub use port_mocks::*;
