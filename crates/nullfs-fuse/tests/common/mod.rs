//! Shared helpers for FUSE integration tests.

pub mod harness;
