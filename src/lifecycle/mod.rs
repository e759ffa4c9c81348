//! Lifecycle management subsystem.
//!
//! # Data Flow
//! ```text
//! Shutdown (shutdown.rs):
//!     trigger() → every subscribed task and retry loop stops
//!
//! Signals (signals.rs):
//!     SIGTERM/SIGINT → Trigger graceful shutdown
//! ```
//!
//! # Design Decisions
//! - One token per coordinator; clones share the signal
//! - Shutdown has timeout: wallet disconnects are bounded

pub mod shutdown;
pub mod signals;

pub use shutdown::Shutdown;
