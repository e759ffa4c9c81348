//! Resilience subsystem.
//!
//! # Data Flow
//! ```text
//! Call to a chain data source:
//!     → timeouts.rs (enforce per-call deadline)
//!     → On lookup miss: retries.rs (fixed-delay retry, cancellable)
//!     → backoff.rs (jittered delay for background pollers)
//! ```
//!
//! # Design Decisions
//! - Timeouts are non-negotiable; every external call has a deadline
//! - Retries only for lookups (transactions, confirmations), never broadcasts
//! - Every wait observes the owning coordinator's shutdown token

pub mod backoff;
pub mod retries;
pub mod timeouts;

pub use retries::{retry_fixed, RetryPolicy};
pub use timeouts::with_timeout;
