//! A [`Ledger`] that keeps tokens in process memory.
//!
//! Enforces the token rules the runner depends on (key signatures, serial
//! bookkeeping, deleted and immutable tokens) so runs can be exercised end
//! to end without a network. Statuses use the ledger's response code names.

use std::collections::{BTreeSet, HashMap};

use async_trait::async_trait;
use parking_lot::Mutex;

use crate::config::Operator;
use crate::descriptor::{SupplyPolicy, TokenKind};
use crate::ids::EntityId;
use crate::keys::{KeyRef, SigningKey};
use crate::ledger::{
    BurnPayload, Ledger, LedgerError, LedgerTransaction, MintPayload, Receipt, SerialHistory,
    SignedRequest, TokenCreation, TokenKeys, TokenSummary,
};
use crate::network::Network;

const FIRST_ENTITY_NUM: u64 = 5_000;

struct TokenState {
    summary: TokenSummary,
    keys: TokenKeys,
    live_serials: BTreeSet<i64>,
    next_serial: i64,
    deleted: bool,
}

#[derive(Default)]
struct State {
    tokens: HashMap<EntityId, TokenState>,
    next_entity: u64,
    transactions: u64,
    queries: usize,
    submissions: usize,
    fail_next_query: Option<LedgerError>,
    fail_next_submission: Option<LedgerError>,
}

pub struct InMemoryLedger {
    network: Network,
    operator_account: EntityId,
    operator_key: SigningKey,
    state: Mutex<State>,
}

impl InMemoryLedger {
    /// The operator signs every submission implicitly, as the payer does on
    /// the real network.
    pub fn new(network: Network, operator: &Operator) -> Self {
        Self {
            network,
            operator_account: operator.account_id,
            operator_key: operator.key.clone(),
            state: Mutex::new(State {
                next_entity: FIRST_ENTITY_NUM,
                ..State::default()
            }),
        }
    }

    /// Token info queries seen so far, including failed ones.
    pub fn query_count(&self) -> usize {
        self.state.lock().queries
    }

    /// Submissions seen so far, including failed ones.
    pub fn submission_count(&self) -> usize {
        self.state.lock().submissions
    }

    /// Total calls that would have touched the network.
    pub fn network_calls(&self) -> usize {
        let state = self.state.lock();
        state.queries + state.submissions
    }

    pub fn fail_next_query(&self, err: LedgerError) {
        self.state.lock().fail_next_query = Some(err);
    }

    pub fn fail_next_submission(&self, err: LedgerError) {
        self.state.lock().fail_next_submission = Some(err);
    }

    /// Current state of `token`, bypassing the query counter.
    pub fn token(&self, token: EntityId) -> Option<TokenSummary> {
        self.state.lock().tokens.get(&token).map(|t| t.summary.clone())
    }

    pub fn live_serials(&self, token: EntityId) -> Vec<i64> {
        self.state
            .lock()
            .tokens
            .get(&token)
            .map(|t| t.live_serials.iter().copied().collect())
            .unwrap_or_default()
    }

    pub fn is_deleted(&self, token: EntityId) -> bool {
        self.state
            .lock()
            .tokens
            .get(&token)
            .is_some_and(|t| t.deleted)
    }

    fn signed_by(&self, key: &KeyRef, signers: &[SigningKey]) -> bool {
        key.is_satisfied_by(&self.operator_key) || signers.iter().any(|s| key.is_satisfied_by(s))
    }

    fn next_transaction_id(&self, state: &mut State) -> String {
        state.transactions += 1;
        format!(
            "{}@{}.{:09}",
            self.operator_account,
            1_700_000_000 + state.transactions,
            0
        )
    }

    fn create(
        &self,
        state: &mut State,
        creation: &TokenCreation,
        signers: &[SigningKey],
    ) -> Result<(EntityId, u64), &'static str> {
        let d = &creation.descriptor;
        if d.validate().is_err() {
            return Err("INVALID_TOKEN_INITIAL_SUPPLY");
        }
        if let Some(admin) = &creation.keys.admin {
            if !self.signed_by(admin, signers) {
                return Err("INVALID_SIGNATURE");
            }
        }

        let token_id = EntityId::new(0, 0, state.next_entity);
        state.next_entity += 1;

        let summary = TokenSummary {
            token_id,
            name: d.name.clone(),
            symbol: d.symbol.clone(),
            kind: d.kind,
            decimals: d.decimals,
            total_supply: d.initial_supply,
            supply: d.supply,
            treasury: creation.treasury,
            admin_key: creation.keys.admin.clone(),
            supply_key: creation.keys.supply.clone(),
        };
        state.tokens.insert(
            token_id,
            TokenState {
                summary,
                keys: creation.keys.clone(),
                live_serials: BTreeSet::new(),
                next_serial: 1,
                deleted: false,
            },
        );
        Ok((token_id, d.initial_supply))
    }

    fn live_token<'a>(
        state: &'a mut State,
        token: &EntityId,
    ) -> Result<&'a mut TokenState, &'static str> {
        let entry = state.tokens.get_mut(token).ok_or("INVALID_TOKEN_ID")?;
        if entry.deleted {
            return Err("TOKEN_WAS_DELETED");
        }
        Ok(entry)
    }

    fn supply_authorized(&self, entry: &TokenState, signers: &[SigningKey]) -> Result<(), &'static str> {
        match &entry.keys.supply {
            None => Err("TOKEN_HAS_NO_SUPPLY_KEY"),
            Some(key) if self.signed_by(key, signers) => Ok(()),
            Some(_) => Err("INVALID_SIGNATURE"),
        }
    }

    fn mint(
        &self,
        entry: &mut TokenState,
        payload: &MintPayload,
        signers: &[SigningKey],
    ) -> Result<Vec<i64>, &'static str> {
        self.supply_authorized(entry, signers)?;

        let (count, serials) = match (entry.summary.kind, payload) {
            (TokenKind::NonFungible, MintPayload::Metadata(metadata)) => {
                if metadata.is_empty() || metadata.iter().any(|m| m.len() > 100) {
                    return Err("INVALID_TOKEN_MINT_METADATA");
                }
                let first = entry.next_serial;
                let serials: Vec<i64> = (first..first + metadata.len() as i64).collect();
                (metadata.len() as u64, serials)
            }
            (TokenKind::Fungible, MintPayload::Amount(amount)) if *amount > 0 => (*amount, Vec::new()),
            (TokenKind::Fungible, MintPayload::Amount(_)) => return Err("INVALID_TOKEN_MINT_AMOUNT"),
            (TokenKind::NonFungible, MintPayload::Amount(_)) => return Err("INVALID_TOKEN_MINT_METADATA"),
            (TokenKind::Fungible, MintPayload::Metadata(_)) => return Err("INVALID_TOKEN_MINT_AMOUNT"),
        };

        let new_supply = entry
            .summary
            .total_supply
            .checked_add(count)
            .ok_or("TOKEN_MAX_SUPPLY_REACHED")?;
        if let SupplyPolicy::Finite { max_supply } = entry.summary.supply {
            if new_supply > max_supply {
                return Err("TOKEN_MAX_SUPPLY_REACHED");
            }
        }

        entry.summary.total_supply = new_supply;
        if let Some(last) = serials.last() {
            entry.next_serial = last + 1;
        }
        entry.live_serials.extend(serials.iter().copied());
        Ok(serials)
    }

    fn burn(
        &self,
        entry: &mut TokenState,
        payload: &BurnPayload,
        signers: &[SigningKey],
    ) -> Result<(), &'static str> {
        self.supply_authorized(entry, signers)?;

        match (entry.summary.kind, payload) {
            (TokenKind::NonFungible, BurnPayload::Serials(serials)) => {
                if serials.is_empty() || serials.iter().any(|s| !entry.live_serials.contains(s)) {
                    return Err("INVALID_NFT_ID");
                }
                for serial in serials {
                    entry.live_serials.remove(serial);
                }
                entry.summary.total_supply -= serials.len() as u64;
            }
            (TokenKind::Fungible, BurnPayload::Amount(amount)) => {
                if *amount == 0 || *amount > entry.summary.total_supply {
                    return Err("INVALID_TOKEN_BURN_AMOUNT");
                }
                entry.summary.total_supply -= amount;
            }
            _ => return Err("INVALID_TOKEN_BURN_METADATA"),
        }
        Ok(())
    }

    fn delete(&self, entry: &mut TokenState, signers: &[SigningKey]) -> Result<(), &'static str> {
        match &entry.keys.admin {
            None => Err("TOKEN_IS_IMMUTABLE"),
            Some(key) if self.signed_by(key, signers) => {
                entry.deleted = true;
                Ok(())
            }
            Some(_) => Err("INVALID_SIGNATURE"),
        }
    }
}

#[async_trait]
impl Ledger for InMemoryLedger {
    fn network(&self) -> Network {
        self.network
    }

    async fn token_info(&self, token: EntityId) -> Result<TokenSummary, LedgerError> {
        let mut state = self.state.lock();
        state.queries += 1;
        if let Some(err) = state.fail_next_query.take() {
            return Err(err);
        }
        state
            .tokens
            .get(&token)
            .map(|t| t.summary.clone())
            .ok_or_else(|| LedgerError::rejected("INVALID_TOKEN_ID"))
    }

    async fn submit(&self, request: SignedRequest) -> Result<Receipt, LedgerError> {
        let mut state = self.state.lock();
        state.submissions += 1;
        if let Some(err) = state.fail_next_submission.take() {
            return Err(err);
        }

        let transaction_id = self.next_transaction_id(&mut state);
        let signers = &request.signers;

        let outcome = match &request.transaction {
            LedgerTransaction::CreateToken(creation) => self
                .create(&mut state, creation, signers)
                .map(|(token, supply)| (Some(token), Vec::new(), supply)),
            LedgerTransaction::Mint { token, payload } => {
                Self::live_token(&mut state, token).and_then(|entry| {
                    let serials = self.mint(entry, payload, signers)?;
                    Ok((None, serials, entry.summary.total_supply))
                })
            }
            LedgerTransaction::Burn { token, payload } => {
                Self::live_token(&mut state, token).and_then(|entry| {
                    self.burn(entry, payload, signers)?;
                    Ok((None, Vec::new(), entry.summary.total_supply))
                })
            }
            LedgerTransaction::Delete { token } => Self::live_token(&mut state, token)
                .and_then(|entry| self.delete(entry, signers).map(|()| (None, Vec::new(), 0))),
        };

        match outcome {
            Ok((token_id, serials, total_supply)) => Ok(Receipt {
                status: "SUCCESS".into(),
                transaction_id,
                token_id,
                serials,
                total_supply,
            }),
            Err(status) => Err(LedgerError::Rejected {
                status: status.into(),
                transaction_id: Some(transaction_id),
            }),
        }
    }
}

/// The authoritative answer a mirror node approximates.
#[async_trait]
impl SerialHistory for InMemoryLedger {
    async fn latest_serial(&self, token: EntityId) -> Result<Option<i64>, LedgerError> {
        let state = self.state.lock();
        let entry = state
            .tokens
            .get(&token)
            .ok_or_else(|| LedgerError::rejected("INVALID_TOKEN_ID"))?;
        Ok(entry.live_serials.last().copied())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::descriptor::TokenDescriptor;

    fn setup() -> (InMemoryLedger, Operator) {
        let operator = Operator {
            account_id: EntityId::new(0, 0, 1001),
            key: SigningKey::generate(),
        };
        (InMemoryLedger::new(Network::Testnet, &operator), operator)
    }

    fn collection(operator: &Operator, supply: Option<KeyRef>) -> SignedRequest {
        let mut keys = TokenKeys::default();
        keys.admin = Some(KeyRef::Public(operator.key.public_key()));
        keys.supply = supply;
        SignedRequest {
            transaction: LedgerTransaction::CreateToken(TokenCreation {
                descriptor: TokenDescriptor::nft_collection_default(),
                treasury: operator.account_id,
                keys,
                auto_renew_account: None,
                auto_renew_period_secs: None,
            }),
            signers: vec![],
            max_fee: None,
        }
    }

    fn mint(token: EntityId, count: usize, signers: Vec<SigningKey>) -> SignedRequest {
        SignedRequest {
            transaction: LedgerTransaction::Mint {
                token,
                payload: MintPayload::Metadata(vec![b"cid".to_vec(); count]),
            },
            signers,
            max_fee: None,
        }
    }

    fn burn(token: EntityId, serials: Vec<i64>) -> SignedRequest {
        SignedRequest {
            transaction: LedgerTransaction::Burn {
                token,
                payload: BurnPayload::Serials(serials),
            },
            signers: vec![],
            max_fee: None,
        }
    }

    #[tokio::test]
    async fn serials_are_never_reused_after_burn() {
        let (ledger, operator) = setup();
        let supply = Some(KeyRef::Public(operator.key.public_key()));
        let token = ledger.submit(collection(&operator, supply)).await.unwrap().token_id.unwrap();

        let minted = ledger.submit(mint(token, 3, vec![])).await.unwrap();
        assert_eq!(minted.serials, vec![1, 2, 3]);

        ledger.submit(burn(token, vec![3])).await.unwrap();
        let minted = ledger.submit(mint(token, 1, vec![])).await.unwrap();
        assert_eq!(minted.serials, vec![4]);
        assert_eq!(ledger.live_serials(token), vec![1, 2, 4]);
        assert_eq!(ledger.latest_serial(token).await.unwrap(), Some(4));
    }

    #[tokio::test]
    async fn burning_a_missing_serial_is_rejected_whole() {
        let (ledger, operator) = setup();
        let supply = Some(KeyRef::Public(operator.key.public_key()));
        let token = ledger.submit(collection(&operator, supply)).await.unwrap().token_id.unwrap();
        ledger.submit(mint(token, 2, vec![])).await.unwrap();

        let err = ledger.submit(burn(token, vec![1, 9])).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { ref status, .. } if status == "INVALID_NFT_ID"));
        assert_eq!(ledger.live_serials(token), vec![1, 2]);
    }

    #[tokio::test]
    async fn separate_supply_key_must_sign() {
        let (ledger, operator) = setup();
        let supply_key = SigningKey::generate();
        let token = ledger
            .submit(collection(&operator, Some(KeyRef::Public(supply_key.public_key()))))
            .await
            .unwrap()
            .token_id
            .unwrap();

        let err = ledger.submit(mint(token, 1, vec![])).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { ref status, .. } if status == "INVALID_SIGNATURE"));

        ledger.submit(mint(token, 1, vec![supply_key])).await.unwrap();
    }

    #[tokio::test]
    async fn token_without_supply_key_cannot_mint() {
        let (ledger, operator) = setup();
        let token = ledger.submit(collection(&operator, None)).await.unwrap().token_id.unwrap();
        let err = ledger.submit(mint(token, 1, vec![])).await.unwrap_err();
        assert_eq!(
            err,
            LedgerError::Rejected {
                status: "TOKEN_HAS_NO_SUPPLY_KEY".into(),
                transaction_id: Some("0.0.1001@1700000002.000000000".into()),
            }
        );
    }

    #[tokio::test]
    async fn deleted_tokens_reject_further_transactions() {
        let (ledger, operator) = setup();
        let supply = Some(KeyRef::Public(operator.key.public_key()));
        let token = ledger.submit(collection(&operator, supply)).await.unwrap().token_id.unwrap();

        let delete = SignedRequest {
            transaction: LedgerTransaction::Delete { token },
            signers: vec![],
            max_fee: None,
        };
        ledger.submit(delete).await.unwrap();
        assert!(ledger.is_deleted(token));

        let err = ledger.submit(mint(token, 1, vec![])).await.unwrap_err();
        assert!(matches!(err, LedgerError::Rejected { ref status, .. } if status == "TOKEN_WAS_DELETED"));
    }

    #[tokio::test]
    async fn injected_failures_fire_once_and_are_counted() {
        let (ledger, _) = setup();
        ledger.fail_next_query(LedgerError::Network("unreachable".into()));
        assert!(ledger.token_info(EntityId::new(0, 0, 1)).await.unwrap_err().is_network());
        assert_eq!(
            ledger.token_info(EntityId::new(0, 0, 1)).await.unwrap_err(),
            LedgerError::rejected("INVALID_TOKEN_ID")
        );
        assert_eq!(ledger.query_count(), 2);
        assert_eq!(ledger.submission_count(), 0);
    }
}
