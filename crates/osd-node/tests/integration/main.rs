//! Integration test entry point for osd-node.
//!
//! Run with: cargo test --test integration

mod harness;
mod delivery;
