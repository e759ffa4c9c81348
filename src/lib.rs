//! Trust-minimized atomic swap client core.

pub mod chain;
pub mod config;
pub mod counterparty;
pub mod crypto;
pub mod lifecycle;
pub mod observability;
pub mod onchain;
pub mod resilience;
pub mod swap;

pub use config::schema::ClientConfig;
pub use lifecycle::Shutdown;
pub use onchain::Onchain;
pub use swap::SwapOrchestrator;
