//! From command-line request to finished run.

use std::path::PathBuf;

use tracing::debug;

use crate::config::{ConfigError, ConfigSource, ENV_NFT_METADATA, RunnerConfig};
use crate::descriptor::{DescriptorOverrides, TokenKind};
use crate::error::RunError;
use crate::ledger::{Ledger, LedgerError};
use crate::mirror::MirrorNodeClient;
use crate::runner::{Operation, OperationKind, Outcome, TransactionRunner};
use crate::serials::{LatestStrategy, parse_serials};

/// What was asked for, before configuration is applied.
#[derive(Debug, Clone)]
pub enum Request {
    CreateToken {
        kind: TokenKind,
        descriptor_file: Option<PathBuf>,
        /// Command-line values; these win over the file.
        overrides: DescriptorOverrides,
    },
    MintNft {
        metadata: Vec<String>,
    },
    MintFungible {
        amount: u64,
    },
    BurnNft {
        serials: String,
        latest: LatestStrategy,
    },
    BurnFungible {
        amount: u64,
    },
    DeleteToken,
    TokenInfo,
}

impl Request {
    pub fn kind(&self) -> OperationKind {
        match self {
            Request::CreateToken {
                kind: TokenKind::Fungible,
                ..
            } => OperationKind::CreateFungibleToken,
            Request::CreateToken {
                kind: TokenKind::NonFungible,
                ..
            } => OperationKind::CreateNftCollection,
            Request::MintNft { .. } => OperationKind::MintNft,
            Request::MintFungible { .. } => OperationKind::MintFungible,
            Request::BurnNft { .. } => OperationKind::BurnNft,
            Request::BurnFungible { .. } => OperationKind::BurnFungible,
            Request::DeleteToken => OperationKind::DeleteToken,
            Request::TokenInfo => OperationKind::TokenInfo,
        }
    }

    /// Validates the request against `config`. Never touches the network.
    pub fn resolve(self, config: &RunnerConfig) -> Result<Operation, RunError> {
        let operation = match self {
            Request::CreateToken {
                kind,
                descriptor_file,
                overrides,
            } => {
                let layered = match descriptor_file {
                    Some(path) => overrides.layered_over(
                        DescriptorOverrides::from_toml_file(&path).map_err(ConfigError::from)?,
                    ),
                    None => overrides,
                };
                Operation::CreateToken(layered.build(kind).map_err(ConfigError::from)?)
            }
            Request::MintNft { metadata } => {
                let metadata = if metadata.is_empty() {
                    let fallback = config.nft_metadata.clone().ok_or_else(|| ConfigError::Missing {
                        what: "NFT metadata",
                        keys: format!("{ENV_NFT_METADATA} or pass METADATA"),
                    })?;
                    vec![fallback]
                } else {
                    metadata
                };
                Operation::MintNft {
                    token: config.require_token()?,
                    metadata,
                }
            }
            Request::MintFungible { amount } => Operation::MintFungible {
                token: config.require_token()?,
                amount,
            },
            Request::BurnNft { serials, latest } => {
                let serials = parse_serials(&serials)?;
                Operation::BurnNft {
                    token: config.require_token()?,
                    serials,
                    latest,
                }
            }
            Request::BurnFungible { amount } => Operation::BurnFungible {
                token: config.require_token()?,
                amount,
            },
            Request::DeleteToken => Operation::DeleteToken {
                token: config.require_token()?,
            },
            Request::TokenInfo => Operation::TokenInfo {
                token: config.require_token()?,
            },
        };
        debug!(operation = %operation.kind(), "request resolved");
        Ok(operation)
    }
}

/// Loads configuration, resolves the request, connects and runs it.
///
/// Configuration and input errors are returned before `connect` is called.
pub async fn execute<L, C>(
    request: Request,
    source: &ConfigSource,
    connect: C,
) -> Result<Outcome, RunError>
where
    L: Ledger,
    C: FnOnce(&RunnerConfig) -> Result<L, LedgerError>,
{
    let config = RunnerConfig::load(source)?;
    let operation = request.resolve(&config)?;

    let history = operation
        .needs_serial_history()
        .then(|| MirrorNodeClient::with_base_url(&config.mirror_node_url));
    let ledger = connect(&config).map_err(|e| RunError::ledger("client setup", e))?;

    let mut runner = TransactionRunner::new(ledger, config);
    if let Some(history) = history {
        runner = runner.with_serial_history(Box::new(history));
    }
    runner.run(operation).await
}
