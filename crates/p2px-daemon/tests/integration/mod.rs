//! Integration tests for p2px-daemon.
//!
//! These tests drive complete trades through the state machine and the
//! background jobs:
//! - Sell and buy listings from publication to release
//! - Payment-window expiry and republish
//! - Cooperative cancel, refunds and admin dispute resolution

pub mod common;
