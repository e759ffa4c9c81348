//! Onchain coordination: per-currency coordinators, transactions, wallets.
//!
//! # Data Flow
//! ```text
//! SwapOrchestrator ─▶ Onchain ─┬─▶ CurrencyCoordinator(BTC)    ─▶ MultiSourceAggregator
//!                              ├─▶ CurrencyCoordinator(L-BTC)  ─▶ MultiSourceAggregator
//!                              └─▶ wallet registry (ArcSwap)
//! ```

pub mod coordinator;
pub mod manager;
pub mod setup;
pub mod transaction;
pub mod types;
pub mod wallet;

pub use coordinator::CurrencyCoordinator;
pub use manager::Onchain;
pub use setup::{build_coordinator, build_onchain};
pub use transaction::ChainTransaction;
pub use types::{OnchainError, OnchainResult, OutputArgs, OutputResult};
pub use wallet::{Balance, Wallet, WalletChecker, WalletInfo, WalletSendArgs};
