//! The transaction runner.
//!
//! A run executes exactly one [`Operation`]: inputs are validated and the
//! signing keys resolved from configuration before the ledger is touched,
//! then at most one read-only token query precedes the single submission.
//! Nothing is retried.

use std::fmt;

use serde::Serialize;
use tracing::{info, warn};

use crate::config::RunnerConfig;
use crate::descriptor::{MAX_TEXT_BYTES, SupplyPolicy, TokenDescriptor, TokenKind};
use crate::error::RunError;
use crate::ids::EntityId;
use crate::keys::{KeyRef, Role, SigningKey};
use crate::ledger::{
    BurnPayload, Ledger, LedgerError, LedgerTransaction, MintPayload, Receipt, SerialHistory,
    SignedRequest, TokenCreation, TokenKeys, TokenSummary,
};
use crate::network::Network;
use crate::serials::{LatestStrategy, SerialSelector};

/// One unit of work for the runner.
#[derive(Debug, Clone)]
pub enum Operation {
    /// Fungible token or NFT collection, depending on the descriptor kind.
    CreateToken(TokenDescriptor),
    MintNft {
        token: EntityId,
        metadata: Vec<String>,
    },
    MintFungible {
        token: EntityId,
        amount: u64,
    },
    BurnNft {
        token: EntityId,
        serials: SerialSelector,
        latest: LatestStrategy,
    },
    BurnFungible {
        token: EntityId,
        amount: u64,
    },
    DeleteToken {
        token: EntityId,
    },
    TokenInfo {
        token: EntityId,
    },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum OperationKind {
    CreateFungibleToken,
    CreateNftCollection,
    MintNft,
    MintFungible,
    BurnNft,
    BurnFungible,
    DeleteToken,
    TokenInfo,
}

impl OperationKind {
    /// Command-line tag of the operation.
    pub fn tag(&self) -> &'static str {
        match self {
            OperationKind::CreateFungibleToken => "create-fungible-token",
            OperationKind::CreateNftCollection => "create-nft-collection",
            OperationKind::MintNft => "mint-nft",
            OperationKind::MintFungible => "mint-fungible",
            OperationKind::BurnNft => "burn-nft",
            OperationKind::BurnFungible => "burn-fungible",
            OperationKind::DeleteToken => "delete-token",
            OperationKind::TokenInfo => "token-info",
        }
    }

    pub fn mutates(&self) -> bool {
        !matches!(self, OperationKind::TokenInfo)
    }
}

impl fmt::Display for OperationKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.tag())
    }
}

impl Operation {
    pub fn kind(&self) -> OperationKind {
        match self {
            Operation::CreateToken(d) => match d.kind {
                TokenKind::Fungible => OperationKind::CreateFungibleToken,
                TokenKind::NonFungible => OperationKind::CreateNftCollection,
            },
            Operation::MintNft { .. } => OperationKind::MintNft,
            Operation::MintFungible { .. } => OperationKind::MintFungible,
            Operation::BurnNft { .. } => OperationKind::BurnNft,
            Operation::BurnFungible { .. } => OperationKind::BurnFungible,
            Operation::DeleteToken { .. } => OperationKind::DeleteToken,
            Operation::TokenInfo { .. } => OperationKind::TokenInfo,
        }
    }

    /// The existing token this operation targets.
    pub fn token(&self) -> Option<EntityId> {
        match self {
            Operation::CreateToken(_) => None,
            Operation::MintNft { token, .. }
            | Operation::MintFungible { token, .. }
            | Operation::BurnNft { token, .. }
            | Operation::BurnFungible { token, .. }
            | Operation::DeleteToken { token }
            | Operation::TokenInfo { token } => Some(*token),
        }
    }

    /// Whether resolving the operation consults NFT history.
    pub fn needs_serial_history(&self) -> bool {
        matches!(
            self,
            Operation::BurnNft {
                serials: SerialSelector::Latest,
                latest: LatestStrategy::MirrorNode,
                ..
            }
        )
    }
}

/// Result of a successful run.
#[derive(Debug, Clone, Serialize)]
pub struct Outcome {
    pub operation: OperationKind,
    pub network: Network,
    pub token_id: EntityId,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub receipt: Option<Receipt>,
    /// Fungible units minted or burned.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub amount: Option<u64>,
    pub explorer_url: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub solidity_address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub token: Option<TokenSummary>,
}

impl Outcome {
    fn new(operation: OperationKind, network: Network, token_id: EntityId) -> Self {
        Self {
            operation,
            network,
            token_id,
            receipt: None,
            amount: None,
            explorer_url: network.explorer_token_url(&token_id),
            solidity_address: None,
            token: None,
        }
    }

    fn with_receipt(mut self, receipt: Receipt) -> Self {
        self.receipt = Some(receipt);
        self
    }

    /// Serials the receipt reports, or those burned for a burn.
    pub fn serials(&self) -> &[i64] {
        self.receipt.as_ref().map(|r| r.serials.as_slice()).unwrap_or_default()
    }
}

fn join_serials(serials: &[i64]) -> String {
    serials
        .iter()
        .map(i64::to_string)
        .collect::<Vec<_>>()
        .join(", ")
}

impl fmt::Display for Outcome {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let token = self.token_id;
        match self.operation {
            OperationKind::CreateFungibleToken => writeln!(f, "Created fungible token {token}")?,
            OperationKind::CreateNftCollection => writeln!(f, "Created NFT collection {token}")?,
            OperationKind::MintNft => {
                writeln!(f, "Minted serial(s) {} on {token}", join_serials(self.serials()))?
            }
            OperationKind::BurnNft => {
                writeln!(f, "Burned serial(s) {} of {token}", join_serials(self.serials()))?
            }
            OperationKind::MintFungible => {
                writeln!(f, "Minted {} units of {token}", self.amount.unwrap_or_default())?
            }
            OperationKind::BurnFungible => {
                writeln!(f, "Burned {} units of {token}", self.amount.unwrap_or_default())?
            }
            OperationKind::DeleteToken => writeln!(f, "Deleted token {token}")?,
            OperationKind::TokenInfo => writeln!(f, "Token {token}")?,
        }

        if let Some(address) = &self.solidity_address {
            writeln!(f, "  evm address:    0x{address}")?;
        }
        if let Some(info) = &self.token {
            writeln!(f, "  name:           {} ({})", info.name, info.symbol)?;
            writeln!(f, "  type:           {}", info.kind.label())?;
            writeln!(f, "  decimals:       {}", info.decimals)?;
            writeln!(f, "  total supply:   {}", info.total_supply)?;
            match info.supply {
                SupplyPolicy::Infinite => writeln!(f, "  max supply:     infinite")?,
                SupplyPolicy::Finite { max_supply } => {
                    writeln!(f, "  max supply:     {max_supply}")?
                }
            }
            writeln!(f, "  treasury:       {}", info.treasury)?;
            let show = |key: &Option<KeyRef>| match key {
                Some(key) => key.to_string(),
                None => "none".to_string(),
            };
            writeln!(f, "  admin key:      {}", show(&info.admin_key))?;
            writeln!(f, "  supply key:     {}", show(&info.supply_key))?;
        }
        if let Some(receipt) = &self.receipt {
            writeln!(f, "  status:         {}", receipt.status)?;
            writeln!(f, "  transaction:    {}", receipt.transaction_id)?;
            if matches!(
                self.operation,
                OperationKind::MintNft
                    | OperationKind::BurnNft
                    | OperationKind::MintFungible
                    | OperationKind::BurnFungible
            ) {
                writeln!(f, "  total supply:   {}", receipt.total_supply)?;
            }
        }
        write!(f, "  explorer:       {}", self.explorer_url)
    }
}

/// Runs operations against one ledger session.
pub struct TransactionRunner<L> {
    ledger: L,
    config: RunnerConfig,
    history: Option<Box<dyn SerialHistory>>,
}

impl<L: Ledger> TransactionRunner<L> {
    pub fn new(ledger: L, config: RunnerConfig) -> Self {
        Self {
            ledger,
            config,
            history: None,
        }
    }

    /// Source for [`LatestStrategy::MirrorNode`].
    pub fn with_serial_history(mut self, history: Box<dyn SerialHistory>) -> Self {
        self.history = Some(history);
        self
    }

    pub fn ledger(&self) -> &L {
        &self.ledger
    }

    pub fn config(&self) -> &RunnerConfig {
        &self.config
    }

    pub async fn run(&self, operation: Operation) -> Result<Outcome, RunError> {
        let kind = operation.kind();
        info!(
            operation = %kind,
            network = %self.ledger.network(),
            token = ?operation.token().map(|t| t.to_string()),
            "run started"
        );

        let outcome = match operation {
            Operation::CreateToken(descriptor) => self.create(descriptor).await,
            Operation::MintNft { token, metadata } => self.mint_nft(token, metadata).await,
            Operation::MintFungible { token, amount } => self.mint_fungible(token, amount).await,
            Operation::BurnNft {
                token,
                serials,
                latest,
            } => self.burn_nft(token, serials, latest).await,
            Operation::BurnFungible { token, amount } => self.burn_fungible(token, amount).await,
            Operation::DeleteToken { token } => self.delete(token).await,
            Operation::TokenInfo { token } => self.token_info(token).await,
        };

        match &outcome {
            Ok(outcome) => info!(
                operation = %kind,
                token = %outcome.token_id,
                status = outcome.receipt.as_ref().map(|r| r.status.as_str()).unwrap_or("n/a"),
                "run finished"
            ),
            Err(err) => warn!(operation = %kind, category = %err.category(), error = %err, "run failed"),
        }
        outcome
    }

    async fn create(&self, mut descriptor: TokenDescriptor) -> Result<Outcome, RunError> {
        if descriptor.metadata.is_none() {
            descriptor.metadata = self.config.token_metadata.clone();
        }
        descriptor
            .validate()
            .map_err(|e| RunError::Config(e.into()))?;

        let operator = &self.config.operator;
        let kind = descriptor.kind;
        let mut keys = TokenKeys::default();
        for role in Role::ALL {
            keys.set(
                role,
                self.config.creation_authority(kind, role).resolve(&operator.key),
            );
        }

        // An admin key, when set, has to sign the creation.
        let mut signers = Vec::new();
        if keys.admin.is_some() {
            let admin = self.config.creation_authority(kind, Role::Admin);
            let signer = admin
                .signer(Role::Admin, &operator.key)
                .map_err(|e| RunError::Config(e.into()))?;
            signers = self.extra_signers(signer);
        }

        let request = SignedRequest {
            transaction: LedgerTransaction::CreateToken(TokenCreation {
                descriptor,
                treasury: operator.account_id,
                keys,
                auto_renew_account: Some(operator.account_id),
                auto_renew_period_secs: Some(self.config.create_auto_renew_secs()),
            }),
            signers,
            max_fee: Some(self.config.create_fee()),
        };
        let receipt = self.submit(request).await?;
        let token_id = receipt
            .token_id
            .ok_or_else(|| RunError::Internal("receipt carries no token id".into()))?;
        info!(token = %token_id, kind = kind.label(), "token created");

        let kind = match kind {
            TokenKind::Fungible => OperationKind::CreateFungibleToken,
            TokenKind::NonFungible => OperationKind::CreateNftCollection,
        };
        let mut outcome = Outcome::new(kind, self.ledger.network(), token_id).with_receipt(receipt);
        outcome.solidity_address = token_id.to_solidity_address().ok();
        Ok(outcome)
    }

    async fn mint_nft(&self, token: EntityId, metadata: Vec<String>) -> Result<Outcome, RunError> {
        if metadata.is_empty() {
            return Err(RunError::Validation("no NFT metadata given".into()));
        }
        if let Some(too_long) = metadata.iter().find(|m| m.len() > MAX_TEXT_BYTES) {
            return Err(RunError::Validation(format!(
                "NFT metadata is {} bytes, the limit is {MAX_TEXT_BYTES}",
                too_long.len()
            )));
        }

        let signers = self
            .supply_target(token, "mint", TokenKind::NonFungible)
            .await?
            .1;
        let request = SignedRequest {
            transaction: LedgerTransaction::Mint {
                token,
                payload: MintPayload::Metadata(metadata.into_iter().map(String::into_bytes).collect()),
            },
            signers,
            max_fee: self.config.max_fee,
        };
        let receipt = self.submit(request).await?;
        info!(token = %token, serials = ?receipt.serials, "NFTs minted");

        Ok(Outcome::new(OperationKind::MintNft, self.ledger.network(), token).with_receipt(receipt))
    }

    async fn mint_fungible(&self, token: EntityId, amount: u64) -> Result<Outcome, RunError> {
        if amount == 0 {
            return Err(RunError::Validation("mint amount must be positive".into()));
        }
        let signers = self.supply_target(token, "mint", TokenKind::Fungible).await?.1;
        let request = SignedRequest {
            transaction: LedgerTransaction::Mint {
                token,
                payload: MintPayload::Amount(amount),
            },
            signers,
            max_fee: self.config.max_fee,
        };
        let receipt = self.submit(request).await?;

        let mut outcome =
            Outcome::new(OperationKind::MintFungible, self.ledger.network(), token).with_receipt(receipt);
        outcome.amount = Some(amount);
        Ok(outcome)
    }

    async fn burn_nft(
        &self,
        token: EntityId,
        selector: SerialSelector,
        latest: LatestStrategy,
    ) -> Result<Outcome, RunError> {
        if latest == LatestStrategy::MirrorNode
            && selector == SerialSelector::Latest
            && self.history.is_none()
        {
            return Err(RunError::Internal("no NFT history source configured".into()));
        }

        let (info, signers) = self.supply_target(token, "burn", TokenKind::NonFungible).await?;
        let serials = match selector {
            SerialSelector::Explicit(serials) => serials,
            SerialSelector::Latest => vec![self.latest_serial(&info, latest).await?],
        };

        let request = SignedRequest {
            transaction: LedgerTransaction::Burn {
                token,
                payload: BurnPayload::Serials(serials.clone()),
            },
            signers,
            max_fee: self.config.max_fee,
        };
        let mut receipt = self.submit(request).await?;
        info!(token = %token, serials = ?serials, "NFTs burned");

        // Burn receipts carry no serials; report what was burned.
        receipt.serials = serials;
        Ok(Outcome::new(OperationKind::BurnNft, self.ledger.network(), token).with_receipt(receipt))
    }

    async fn latest_serial(
        &self,
        info: &TokenSummary,
        strategy: LatestStrategy,
    ) -> Result<i64, RunError> {
        let token = info.token_id;
        let nothing_minted = || RunError::Precondition(format!("no NFTs minted for token {token}"));

        let serial = match strategy {
            LatestStrategy::TotalSupply => {
                if info.total_supply == 0 {
                    return Err(nothing_minted());
                }
                let serial = i64::try_from(info.total_supply)
                    .map_err(|_| RunError::Internal("total supply exceeds the serial range".into()))?;
                info!(
                    token = %token,
                    serial,
                    "latest serial taken from total supply; wrong once NFTs of this collection were burned"
                );
                serial
            }
            LatestStrategy::MirrorNode => {
                let history = self
                    .history
                    .as_ref()
                    .ok_or_else(|| RunError::Internal("no NFT history source configured".into()))?;
                let serial = history
                    .latest_serial(token)
                    .await
                    .map_err(|e| RunError::ledger("mirror node query", e))?
                    .ok_or_else(nothing_minted)?;
                info!(token = %token, serial, "latest serial taken from mirror node");
                serial
            }
        };
        Ok(serial)
    }

    async fn burn_fungible(&self, token: EntityId, amount: u64) -> Result<Outcome, RunError> {
        if amount == 0 {
            return Err(RunError::Validation("burn amount must be positive".into()));
        }
        let signers = self.supply_target(token, "burn", TokenKind::Fungible).await?.1;
        let request = SignedRequest {
            transaction: LedgerTransaction::Burn {
                token,
                payload: BurnPayload::Amount(amount),
            },
            signers,
            max_fee: self.config.max_fee,
        };
        let receipt = self.submit(request).await?;

        let mut outcome =
            Outcome::new(OperationKind::BurnFungible, self.ledger.network(), token).with_receipt(receipt);
        outcome.amount = Some(amount);
        Ok(outcome)
    }

    async fn delete(&self, token: EntityId) -> Result<Outcome, RunError> {
        let signer = self.config.signer(Role::Admin)?;
        let info = self.query(token).await?;
        self.check_authority(&info, Role::Admin, signer, "delete")?;

        let request = SignedRequest {
            transaction: LedgerTransaction::Delete { token },
            signers: self.extra_signers(signer),
            max_fee: self.config.max_fee,
        };
        let receipt = self.submit(request).await?;
        info!(token = %token, "token deleted");

        Ok(Outcome::new(OperationKind::DeleteToken, self.ledger.network(), token).with_receipt(receipt))
    }

    async fn token_info(&self, token: EntityId) -> Result<Outcome, RunError> {
        let info = self.query(token).await?;
        let mut outcome = Outcome::new(OperationKind::TokenInfo, self.ledger.network(), token);
        outcome.solidity_address = token.to_solidity_address().ok();
        outcome.token = Some(info);
        Ok(outcome)
    }

    /// Resolves the supply signer, then checks the token can be minted or
    /// burned with it.
    async fn supply_target(
        &self,
        token: EntityId,
        action: &'static str,
        expected: TokenKind,
    ) -> Result<(TokenSummary, Vec<SigningKey>), RunError> {
        let signer = self.config.signer(Role::Supply)?;
        let info = self.query(token).await?;
        self.check_authority(&info, Role::Supply, signer, action)?;

        if info.kind != expected {
            return Err(RunError::Precondition(format!(
                "token {token} is a {}; this {action} needs a {}",
                info.kind.label(),
                expected.label()
            )));
        }
        let signers = self.extra_signers(signer);
        Ok((info, signers))
    }

    fn check_authority(
        &self,
        info: &TokenSummary,
        role: Role,
        signer: &SigningKey,
        action: &'static str,
    ) -> Result<(), RunError> {
        let token = info.token_id;
        match info.key(role) {
            None => Err(RunError::ImmutableToken {
                token,
                role,
                action,
            }),
            Some(KeyRef::Contract(contract)) => Err(RunError::Precondition(format!(
                "{role} key of token {token} is contract {contract}; {action} through the contract instead"
            ))),
            Some(key) if key.is_satisfied_by(signer) => Ok(()),
            Some(key) => {
                warn!(
                    token = %token,
                    role = %role,
                    ledger_key = %key,
                    signer = %signer.public_key(),
                    "token key differs from the configured signer; submitting anyway"
                );
                Ok(())
            }
        }
    }

    /// The operator always signs; only other keys are listed.
    fn extra_signers(&self, signer: &SigningKey) -> Vec<SigningKey> {
        if signer.same_key(&self.config.operator.key) {
            Vec::new()
        } else {
            vec![signer.clone()]
        }
    }

    async fn query(&self, token: EntityId) -> Result<TokenSummary, RunError> {
        self.ledger
            .token_info(token)
            .await
            .map_err(|e| RunError::ledger("token info query", e))
    }

    async fn submit(&self, request: SignedRequest) -> Result<Receipt, RunError> {
        let action = request.transaction.label();
        let receipt = self
            .ledger
            .submit(request)
            .await
            .map_err(|e| RunError::ledger(action, e))?;

        if receipt.status != "SUCCESS" {
            return Err(RunError::ledger(
                action,
                LedgerError::Rejected {
                    status: receipt.status,
                    transaction_id: Some(receipt.transaction_id),
                },
            ));
        }
        Ok(receipt)
    }
}
