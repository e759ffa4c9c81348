//! Chain data layer.
//!
//! # Data Flow
//! ```text
//! EsploraSource ─┐
//! EsploraSource ─┼─▶ MultiSourceAggregator ─▶ CurrencyCoordinator
//! Counterparty  ─┘   (fallback, last resort)
//! ```

pub mod aggregator;
pub mod counterparty;
pub mod esplora;
pub mod source;
pub mod types;

pub use aggregator::MultiSourceAggregator;
pub use source::{ChainDataSource, NamedSource};
pub use types::{BlockEpoch, ChainError, ChainResult, Currency, Network, Output, Pair};
