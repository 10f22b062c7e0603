//! Common utilities for integration tests.
//!
//! This module provides shared test infrastructure for LocalStack-based
//! integration testing.

pub mod localstack;

pub use localstack::{CollectingSink, LocalStackTestContext};
