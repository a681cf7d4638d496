//! Relay node - transfer execution core of a multi-chain token relay
//!
//! Per-chain blockchain clients submit transfers through a fee-escalating
//! submission engine, schedule dependent transactions on a block delay and
//! report RPC endpoint health to a durable store.

pub mod api;
pub mod chain;
pub mod config;
pub mod coordination;
pub mod error;
pub mod health;
pub mod jobs;
pub mod metrics;
pub mod protocol;
pub mod state;
pub mod tx;

pub use chain::{Blockchain, BlockchainClient, ClientRegistry};
pub use config::Settings;
pub use error::{ClientError, ClientResult};
pub use health::NodeHealthMonitor;
