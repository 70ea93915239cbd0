//! Domain layer - pure admission logic with no I/O.
//!
//! This layer contains the core concepts and invariants of admission control:
//! - Counter keys (resource class + caller identifier)
//! - Quota policies and the policy table
//! - Per-key counter state
//! - Admission algorithms (fixed window)
//! - Failure modes for store outages
//!
//! All types in this layer are pure and easily testable.

pub mod counter;
pub mod evaluator;
pub mod failure;
pub mod key;
pub mod policy;
pub mod result;
pub mod time;
