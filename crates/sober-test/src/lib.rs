//! SoberSense Test Harness - End-to-end interlock validation
//!
//! This crate provides:
//! - Scripted camera, comparator and notifier fakes
//! - An in-process interlock harness driven over an in-memory link
//! - Log capture for asserting on what the interlock reported
//! - Scenario tests for the lock / recheck / expiry flows

pub mod fakes;
pub mod harness;
pub mod logs;

#[cfg(test)]
mod scenarios;

pub use fakes::*;
pub use harness::*;
pub use logs::*;
