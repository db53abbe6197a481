//! The seam between the runner and a ledger.
//!
//! [`Ledger`] is implemented by the SDK-backed client in [`crate::sdk`]
//! and by [`crate::memory::InMemoryLedger`].

use async_trait::async_trait;
use hedera::Hbar;
use serde::Serialize;

use crate::descriptor::{SupplyPolicy, TokenDescriptor, TokenKind};
use crate::ids::EntityId;
use crate::keys::{KeyRef, Role, SigningKey};
use crate::network::Network;

// ---------------------------------------------------------------------------
// Error type
// ---------------------------------------------------------------------------

/// Errors a ledger client may return.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LedgerError {
    #[error("network error: {0}")]
    Network(String),

    #[error("timed out: {0}")]
    TimedOut(String),

    /// Pre-check or receipt status other than success.
    #[error("rejected with status {status}")]
    Rejected {
        status: String,
        transaction_id: Option<String>,
    },

    #[error("SDK error: {0}")]
    Sdk(String),
}

impl LedgerError {
    pub fn rejected(status: impl Into<String>) -> Self {
        LedgerError::Rejected {
            status: status.into(),
            transaction_id: None,
        }
    }

    /// Transport-level failures, as opposed to the ledger saying no.
    pub fn is_network(&self) -> bool {
        matches!(self, LedgerError::Network(_) | LedgerError::TimedOut(_))
    }
}

// ---------------------------------------------------------------------------
// Requests
// ---------------------------------------------------------------------------

/// Control keys installed on a new token.
#[derive(Debug, Clone, Default)]
pub struct TokenKeys {
    pub admin: Option<KeyRef>,
    pub supply: Option<KeyRef>,
    pub pause: Option<KeyRef>,
    pub freeze: Option<KeyRef>,
    pub wipe: Option<KeyRef>,
    pub kyc: Option<KeyRef>,
}

impl TokenKeys {
    pub fn get(&self, role: Role) -> Option<&KeyRef> {
        match role {
            Role::Admin => self.admin.as_ref(),
            Role::Supply => self.supply.as_ref(),
            Role::Pause => self.pause.as_ref(),
            Role::Freeze => self.freeze.as_ref(),
            Role::Wipe => self.wipe.as_ref(),
            Role::Kyc => self.kyc.as_ref(),
        }
    }

    pub fn set(&mut self, role: Role, key: Option<KeyRef>) {
        let slot = match role {
            Role::Admin => &mut self.admin,
            Role::Supply => &mut self.supply,
            Role::Pause => &mut self.pause,
            Role::Freeze => &mut self.freeze,
            Role::Wipe => &mut self.wipe,
            Role::Kyc => &mut self.kyc,
        };
        *slot = key;
    }
}

#[derive(Debug, Clone)]
pub struct TokenCreation {
    pub descriptor: TokenDescriptor,
    pub treasury: EntityId,
    pub keys: TokenKeys,
    pub auto_renew_account: Option<EntityId>,
    pub auto_renew_period_secs: Option<u64>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MintPayload {
    /// One NFT per metadata entry.
    Metadata(Vec<Vec<u8>>),
    /// Fungible units, in the token's smallest denomination.
    Amount(u64),
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BurnPayload {
    Serials(Vec<i64>),
    Amount(u64),
}

/// The one state-changing transaction of a run.
#[derive(Debug, Clone)]
pub enum LedgerTransaction {
    CreateToken(TokenCreation),
    Mint { token: EntityId, payload: MintPayload },
    Burn { token: EntityId, payload: BurnPayload },
    Delete { token: EntityId },
}

impl LedgerTransaction {
    pub fn label(&self) -> &'static str {
        match self {
            LedgerTransaction::CreateToken(_) => "token create",
            LedgerTransaction::Mint { .. } => "token mint",
            LedgerTransaction::Burn { .. } => "token burn",
            LedgerTransaction::Delete { .. } => "token delete",
        }
    }
}

/// A transaction plus the keys that sign it besides the client operator.
#[derive(Debug, Clone)]
pub struct SignedRequest {
    pub transaction: LedgerTransaction,
    pub signers: Vec<SigningKey>,
    pub max_fee: Option<Hbar>,
}

// ---------------------------------------------------------------------------
// Responses
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Receipt {
    pub status: String,
    pub transaction_id: String,
    pub token_id: Option<EntityId>,
    pub serials: Vec<i64>,
    pub total_supply: u64,
}

/// What a token info query reports.
#[derive(Debug, Clone, Serialize)]
pub struct TokenSummary {
    pub token_id: EntityId,
    pub name: String,
    pub symbol: String,
    pub kind: TokenKind,
    pub decimals: u32,
    pub total_supply: u64,
    pub supply: SupplyPolicy,
    pub treasury: EntityId,
    pub admin_key: Option<KeyRef>,
    pub supply_key: Option<KeyRef>,
}

impl TokenSummary {
    pub fn key(&self, role: Role) -> Option<&KeyRef> {
        match role {
            Role::Admin => self.admin_key.as_ref(),
            Role::Supply => self.supply_key.as_ref(),
            _ => None,
        }
    }
}

// ---------------------------------------------------------------------------
// Traits
// ---------------------------------------------------------------------------

/// An authenticated client session against one network.
#[async_trait]
pub trait Ledger: Send + Sync {
    fn network(&self) -> Network;

    /// Read-only token query.
    async fn token_info(&self, token: EntityId) -> Result<TokenSummary, LedgerError>;

    /// Freeze, sign, submit and wait for the receipt. Never retried here.
    async fn submit(&self, request: SignedRequest) -> Result<Receipt, LedgerError>;
}

/// Historical NFT data, used to find the highest live serial.
#[async_trait]
pub trait SerialHistory: Send + Sync {
    async fn latest_serial(&self, token: EntityId) -> Result<Option<i64>, LedgerError>;
}
