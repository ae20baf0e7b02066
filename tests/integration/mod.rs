//! Integration test suite for verdict.
//!
//! These tests drive the orchestrator end to end through the agent
//! registry, with counting test doubles where a capability's behavior has
//! to be controlled.
//!
//! # Test Categories
//!
//! - `scheduling`: Round ordering, readiness and structural errors
//! - `propagation`: Failure, timeout and cancellation handling
//! - `pipeline_e2e`: The default plan over realistic record batches
//! - `supply`: Supplier risk scoring and ESG compliance from files

mod fixtures;

mod pipeline_e2e;
mod propagation;
mod scheduling;
mod supply;
