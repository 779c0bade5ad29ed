//! Integration tests entry point
//!
//! This file serves as the entry point for all integration tests.
//! It includes the integration_tests module which contains:
//! - Failover tests against mock backends
//! - Fan-out and join property tests
//! - End-to-end relay server tests

mod common;
mod integration_tests;
