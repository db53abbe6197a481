//! [`Ledger`] backed by the Hedera SDK.

use std::fmt::Display;
use std::str::FromStr;

use async_trait::async_trait;
use hedera::{
    AccountId, Client, ContractId, Key, TokenBurnTransaction, TokenCreateTransaction,
    TokenDeleteTransaction, TokenId, TokenInfoQuery, TokenMintTransaction, TokenSupplyType,
    TokenType, TransactionResponse,
};
use tracing::{debug, info};

use crate::config::Operator;
use crate::descriptor::{SupplyPolicy, TokenKind};
use crate::ids::EntityId;
use crate::keys::{KeyRef, SigningKey};
use crate::ledger::{
    BurnPayload, Ledger, LedgerError, LedgerTransaction, MintPayload, Receipt, SignedRequest,
    TokenCreation, TokenSummary,
};
use crate::network::Network;

/// Authenticated SDK client for one network.
pub struct HederaLedger {
    client: Client,
    network: Network,
    operator: SigningKey,
}

impl HederaLedger {
    /// Builds a client for `network` with `operator` as payer. Nodes are
    /// contacted lazily, on the first query or submission.
    pub fn connect(network: Network, operator: &Operator) -> Result<Self, LedgerError> {
        let client = match network {
            Network::Mainnet => Client::for_mainnet(),
            Network::Testnet => Client::for_testnet(),
            Network::Previewnet => Client::for_previewnet(),
        };
        client.set_operator(
            sdk_id::<AccountId>(&operator.account_id)?,
            operator.key.private_key().clone(),
        );
        info!(network = %network, operator = %operator.account_id, "ledger client ready");

        Ok(Self {
            client,
            network,
            operator: operator.key.clone(),
        })
    }

    async fn await_receipt(&self, response: TransactionResponse) -> Result<Receipt, LedgerError> {
        let transaction_id = response.transaction_id.to_string();
        debug!(transaction_id = %transaction_id, "waiting for receipt");

        let receipt = response
            .get_receipt(&self.client)
            .await
            .map_err(|e| match LedgerError::from(e) {
                LedgerError::Rejected { status, .. } => LedgerError::Rejected {
                    status,
                    transaction_id: Some(transaction_id.clone()),
                },
                other => other,
            })?;

        Ok(Receipt {
            status: receipt.status.as_str_name().to_string(),
            transaction_id,
            token_id: receipt.token_id.as_ref().map(entity_id).transpose()?,
            serials: receipt.serials.clone(),
            total_supply: receipt.total_supply,
        })
    }

    fn create_transaction(
        &self,
        creation: &TokenCreation,
    ) -> Result<TokenCreateTransaction, LedgerError> {
        let d = &creation.descriptor;
        let mut tx = TokenCreateTransaction::new();
        tx.name(d.name.clone())
            .symbol(d.symbol.clone())
            .token_type(match d.kind {
                TokenKind::Fungible => TokenType::FungibleCommon,
                TokenKind::NonFungible => TokenType::NonFungibleUnique,
            })
            .decimals(d.decimals)
            .initial_supply(d.initial_supply)
            .treasury_account_id(sdk_id::<AccountId>(&creation.treasury)?)
            .freeze_default(d.freeze_default);

        match d.supply {
            SupplyPolicy::Infinite => {
                tx.token_supply_type(TokenSupplyType::Infinite);
            }
            SupplyPolicy::Finite { max_supply } => {
                tx.token_supply_type(TokenSupplyType::Finite)
                    .max_supply(max_supply);
            }
        }

        if let Some(metadata) = &d.metadata {
            tx.metadata(metadata.as_bytes().to_vec());
        }
        if let Some(memo) = &d.memo {
            tx.token_memo(memo.clone());
        }

        let keys = &creation.keys;
        if let Some(key) = &keys.admin {
            tx.admin_key(sdk_key(key)?);
        }
        if let Some(key) = &keys.supply {
            tx.supply_key(sdk_key(key)?);
        }
        if let Some(key) = &keys.pause {
            tx.pause_key(sdk_key(key)?);
        }
        if let Some(key) = &keys.freeze {
            tx.freeze_key(sdk_key(key)?);
        }
        if let Some(key) = &keys.wipe {
            tx.wipe_key(sdk_key(key)?);
        }
        if let Some(key) = &keys.kyc {
            tx.kyc_key(sdk_key(key)?);
        }

        if let Some(account) = &creation.auto_renew_account {
            tx.auto_renew_account_id(sdk_id::<AccountId>(account)?);
        }
        if let Some(secs) = creation.auto_renew_period_secs {
            let secs = i64::try_from(secs)
                .map_err(|_| LedgerError::Sdk(format!("auto-renew period {secs}s is out of range")))?;
            tx.auto_renew_period(time::Duration::seconds(secs));
        }
        Ok(tx)
    }
}

/// Applies the fee cap, freezes against the client, adds every signer that
/// is not already the operator, submits and awaits the receipt.
macro_rules! freeze_sign_execute {
    ($ledger:expr, $tx:expr, $request:expr) => {{
        let tx = &mut $tx;
        if let Some(fee) = $request.max_fee {
            tx.max_transaction_fee(fee);
        }
        tx.freeze_with(&$ledger.client)?;
        for signer in &$request.signers {
            if !signer.same_key(&$ledger.operator) {
                tx.sign(signer.private_key().clone());
            }
        }
        let response = tx.execute(&$ledger.client).await?;
        $ledger.await_receipt(response).await
    }};
}

#[async_trait]
impl Ledger for HederaLedger {
    fn network(&self) -> Network {
        self.network
    }

    async fn token_info(&self, token: EntityId) -> Result<TokenSummary, LedgerError> {
        debug!(token = %token, "querying token info");
        let info = TokenInfoQuery::new()
            .token_id(sdk_id::<TokenId>(&token)?)
            .execute(&self.client)
            .await?;

        let kind = if matches!(info.token_type, TokenType::NonFungibleUnique) {
            TokenKind::NonFungible
        } else {
            TokenKind::Fungible
        };
        let supply = if matches!(info.supply_type, TokenSupplyType::Finite) {
            SupplyPolicy::Finite {
                max_supply: info.max_supply,
            }
        } else {
            SupplyPolicy::Infinite
        };

        Ok(TokenSummary {
            token_id: token,
            name: info.name.clone(),
            symbol: info.symbol.clone(),
            kind,
            decimals: info.decimals,
            total_supply: info.total_supply,
            supply,
            treasury: entity_id(&info.treasury_account_id)?,
            admin_key: info.admin_key.as_ref().map(key_ref),
            supply_key: info.supply_key.as_ref().map(key_ref),
        })
    }

    async fn submit(&self, request: SignedRequest) -> Result<Receipt, LedgerError> {
        info!(
            transaction = request.transaction.label(),
            signers = request.signers.len(),
            "submitting transaction"
        );

        match &request.transaction {
            LedgerTransaction::CreateToken(creation) => {
                let mut tx = self.create_transaction(creation)?;
                freeze_sign_execute!(self, tx, request)
            }
            LedgerTransaction::Mint { token, payload } => {
                let mut tx = TokenMintTransaction::new();
                tx.token_id(sdk_id::<TokenId>(token)?);
                match payload {
                    MintPayload::Metadata(metadata) => {
                        tx.metadata(metadata.clone());
                    }
                    MintPayload::Amount(amount) => {
                        tx.amount(*amount);
                    }
                }
                freeze_sign_execute!(self, tx, request)
            }
            LedgerTransaction::Burn { token, payload } => {
                let mut tx = TokenBurnTransaction::new();
                tx.token_id(sdk_id::<TokenId>(token)?);
                match payload {
                    BurnPayload::Serials(serials) => {
                        tx.serials(serials.clone());
                    }
                    BurnPayload::Amount(amount) => {
                        tx.amount(*amount);
                    }
                }
                freeze_sign_execute!(self, tx, request)
            }
            LedgerTransaction::Delete { token } => {
                let mut tx = TokenDeleteTransaction::new();
                tx.token_id(sdk_id::<TokenId>(token)?);
                freeze_sign_execute!(self, tx, request)
            }
        }
    }
}

impl From<hedera::Error> for LedgerError {
    fn from(err: hedera::Error) -> Self {
        match err {
            hedera::Error::TimedOut(inner) => LedgerError::TimedOut(inner.to_string()),
            hedera::Error::GrpcStatus(status) => LedgerError::Network(status.to_string()),
            hedera::Error::TransactionPreCheckStatus { status, .. }
            | hedera::Error::QueryPreCheckStatus { status, .. }
            | hedera::Error::QueryPaymentPreCheckStatus { status, .. }
            | hedera::Error::QueryNoPaymentPreCheckStatus { status, .. }
            | hedera::Error::ReceiptStatus { status, .. } => {
                LedgerError::rejected(status.as_str_name())
            }
            // The client refuses to pay what the network quotes for a query.
            hedera::Error::MaxQueryPaymentExceeded { .. } => {
                LedgerError::rejected("MAX_QUERY_PAYMENT_EXCEEDED")
            }
            other => LedgerError::Sdk(other.to_string()),
        }
    }
}

fn sdk_id<T>(id: &EntityId) -> Result<T, LedgerError>
where
    T: FromStr,
    T::Err: Display,
{
    T::from_str(&id.to_string()).map_err(|e| LedgerError::Sdk(format!("id {id}: {e}")))
}

fn entity_id(id: &impl Display) -> Result<EntityId, LedgerError> {
    let text = id.to_string();
    text.parse()
        .map_err(|e| LedgerError::Sdk(format!("unexpected id {text:?} from ledger: {e}")))
}

fn sdk_key(key: &KeyRef) -> Result<Key, LedgerError> {
    match key {
        KeyRef::Public(public) => Ok(Key::Single(public.clone())),
        KeyRef::Contract(id) => Ok(Key::ContractId(sdk_id::<ContractId>(id)?)),
        KeyRef::Other(desc) => Err(LedgerError::Sdk(format!("cannot install key {desc}"))),
    }
}

fn key_ref(key: &Key) -> KeyRef {
    match key {
        Key::Single(public) => KeyRef::Public(public.clone()),
        Key::ContractId(id) => match id.to_string().parse() {
            Ok(id) => KeyRef::Contract(id),
            Err(_) => KeyRef::Other(format!("contract {id}")),
        },
        other => KeyRef::Other(format!("{other:?}")),
    }
}
