//! Shared test utilities for urban-scout integration tests.
//!
//! This module provides:
//! - `TestHarness` wiring a `ScanOrchestrator` to a temp bucket and an
//!   in-memory database
//! - Scripted fakes for the imagery source, detectors and language model

pub mod fakes;
pub mod harness;

pub use fakes::*;
pub use harness::TestHarness;
