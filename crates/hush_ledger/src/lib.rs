//! Hush Ledger: token transactions on the Hedera network.
//!
//! Each run performs one operation (create, mint, burn, delete, or a
//! read-only token query) through the [`TransactionRunner`]:
//!
//! - **Configuration**: [`RunnerConfig`] validates credentials, ids and
//!   authority keys from a [`ConfigSource`] before any client exists.
//! - **Ledger seam**: [`Ledger`] is implemented by [`HederaLedger`] (the SDK)
//!   and [`InMemoryLedger`] (tests and dry runs).
//! - **History**: [`MirrorNodeClient`] answers "highest live NFT serial"
//!   from the mirror node REST API.
//!
//! ```rust,no_run
//! use hush_ledger::{ConfigSource, HederaLedger, Request, execute};
//!
//! # async fn example() -> Result<(), hush_ledger::RunError> {
//! let source = ConfigSource::from_env();
//! let outcome = execute(Request::TokenInfo, &source, |config| {
//!     HederaLedger::connect(config.network, &config.operator)
//! })
//! .await?;
//! println!("{outcome}");
//! # Ok(())
//! # }
//! ```

pub mod config;
pub mod descriptor;
pub mod error;
pub mod ids;
pub mod keys;
pub mod ledger;
pub mod memory;
pub mod mirror;
pub mod network;
pub mod request;
pub mod runner;
pub mod sdk;
pub mod serials;

// ── Re-exports for convenience ──────────────────────────────────────────

pub use config::{ConfigError, ConfigSource, Operator, RunnerConfig};
pub use descriptor::{DescriptorOverrides, SupplyPolicy, TokenDescriptor, TokenKind};
pub use error::RunError;
pub use sdk::HederaLedger;
pub use ids::EntityId;
pub use keys::{AuthoritySpec, KeyRef, Role, SigningKey};
pub use ledger::{Ledger, LedgerError, Receipt, SerialHistory, TokenSummary};
pub use memory::InMemoryLedger;
pub use mirror::MirrorNodeClient;
pub use network::Network;
pub use request::{Request, execute};
pub use runner::{Operation, OperationKind, Outcome, TransactionRunner};
pub use serials::{LatestStrategy, SerialSelector, parse_serials};
