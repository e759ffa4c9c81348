//! Swap creation and verification.
//!
//! # Data Flow
//! ```text
//! request ─▶ SwapOrchestrator ─┬─▶ KeyIssuer (mnemonic, index)
//!                              ├─▶ CounterpartyApi (quote, create)
//!                              ├─▶ SwapTree / fees (verify)
//!                              ├─▶ SwapStore (persist) ─▶ LifecycleManager
//!                              └─▶ Onchain wallet (optional funding)
//! ```

pub mod fees;
pub mod invoice;
pub mod keys;
pub mod lifecycle;
pub mod orchestrator;
pub mod store;
pub mod tree;
pub mod types;

pub use keys::{KeyError, KeyIssuer};
pub use lifecycle::{LifecycleError, LifecycleManager};
pub use orchestrator::{SwapError, SwapOrchestrator, SwapResult};
pub use store::{JsonSwapStore, StoreError, SwapStore};
pub use tree::SwapTree;
pub use types::{ChainSwap, ReverseSwap, SubmarineSwap, SwapState, SwapType};
