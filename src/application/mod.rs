//! Application layer - orchestration of domain logic.
//!
//! This layer coordinates the domain logic and manages the runtime behavior:
//! - Counter registry (store access timestamped by one clock)
//! - Admission service (decision making and failure handling)
//! - Scavenger (removal of expired counters)
//!
//! ## Ports
//!
//! The application layer defines ports (traits) that infrastructure
//! adapters must implement. This keeps the application layer independent
//! from infrastructure details.

pub mod circuit_breaker;
pub mod metrics;
pub mod ports;
pub mod registry;
pub mod scavenger;
pub mod service;
