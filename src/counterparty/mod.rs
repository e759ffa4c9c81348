//! Counterparty service: trait, HTTP client and wire types.

pub mod api;
pub mod client;
pub mod types;

pub use api::CounterpartyApi;
pub use client::HttpCounterparty;
pub use types::{CounterpartyError, CounterpartyResult};
