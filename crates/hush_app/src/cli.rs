use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};
use hush_ledger::config::{
    ENV_AUTO_RENEW_PERIOD, ENV_LOG_DIR, ENV_MAX_FEE, ENV_MIRROR_NODE_URL, ENV_NETWORK,
    ENV_OPERATOR_ID, ENV_OPERATOR_KEY, ENV_SUPPLY_CONTRACT, ENV_TOKEN_ID,
};
use hush_ledger::{ConfigSource, DescriptorOverrides, LatestStrategy, Request, Role, TokenKind};

#[derive(Parser, Debug)]
#[command(
    name = "hush",
    version,
    about = "Create, mint, burn and delete HushSense tokens on the Hedera network"
)]
pub struct Cli {
    #[command(flatten)]
    pub global: GlobalArgs,

    #[command(subcommand)]
    pub command: Commands,
}

/// Overrides for the environment. Every flag wins over its variable.
#[derive(Args, Debug, Default)]
pub struct GlobalArgs {
    /// mainnet, testnet or previewnet [env: HEDERA_NETWORK]
    #[arg(long, global = true)]
    pub network: Option<String>,

    /// Operator account id [env: OPERATOR_ID, MY_ACCOUNT_ID]
    #[arg(long, global = true)]
    pub operator_id: Option<String>,

    /// Operator private key; prefer the environment, command lines are
    /// visible to other processes [env: OPERATOR_KEY, MY_PRIVATE_KEY]
    #[arg(long, global = true)]
    pub operator_key: Option<String>,

    /// Token to operate on [env: TOKEN_ID, HUSHSENSE_NFT_ID]
    #[arg(long, global = true)]
    pub token_id: Option<String>,

    /// Contract that holds supply and pause of a new fungible token
    /// [env: SUPPLY_CONTRACT_ID, HUSHSENSE_MANAGER_CONTRACT_ID]
    #[arg(long, global = true)]
    pub supply_contract: Option<String>,

    /// Admin authority: operator, none, contract:<id>, public:<key> or a
    /// private key [env: ADMIN_KEY]
    #[arg(long, global = true)]
    pub admin_key: Option<String>,

    /// Supply authority, same forms as --admin-key [env: SUPPLY_KEY]
    #[arg(long, global = true)]
    pub supply_key: Option<String>,

    #[arg(long, global = true)]
    pub pause_key: Option<String>,

    #[arg(long, global = true)]
    pub freeze_key: Option<String>,

    #[arg(long, global = true)]
    pub wipe_key: Option<String>,

    #[arg(long, global = true)]
    pub kyc_key: Option<String>,

    /// Fee cap in hbar, e.g. 20, 2.5 or "500000 tℏ"; creates default to 30
    /// [env: MAX_TRANSACTION_FEE]
    #[arg(long, global = true)]
    pub max_fee: Option<String>,

    /// Auto-renew period of created tokens, in seconds; defaults to 7890000
    /// [env: AUTO_RENEW_PERIOD]
    #[arg(long, global = true)]
    pub auto_renew_period: Option<u64>,

    /// Mirror node REST base URL [env: MIRROR_NODE_URL]
    #[arg(long, global = true)]
    pub mirror_node_url: Option<String>,

    /// Also write daily log files here [env: HUSH_LOG_DIR]
    #[arg(long, global = true)]
    pub log_dir: Option<PathBuf>,

    /// Print the result as JSON
    #[arg(long, global = true)]
    pub json: bool,
}

impl GlobalArgs {
    /// Layers the flags that were given over `source`.
    pub fn apply(&self, source: &mut ConfigSource) {
        source.override_with(ENV_NETWORK, self.network.as_deref());
        source.override_with(ENV_OPERATOR_ID[0], self.operator_id.as_deref());
        source.override_with(ENV_OPERATOR_KEY[0], self.operator_key.as_deref());
        source.override_with(ENV_TOKEN_ID[0], self.token_id.as_deref());
        source.override_with(ENV_SUPPLY_CONTRACT[0], self.supply_contract.as_deref());
        source.override_with(ENV_MAX_FEE, self.max_fee.as_deref());
        source.override_with(ENV_AUTO_RENEW_PERIOD, self.auto_renew_period);
        source.override_with(ENV_MIRROR_NODE_URL, self.mirror_node_url.as_deref());
        source.override_with(ENV_LOG_DIR, self.log_dir.as_ref().map(|p| p.display()));

        let authorities = [
            (Role::Admin, &self.admin_key),
            (Role::Supply, &self.supply_key),
            (Role::Pause, &self.pause_key),
            (Role::Freeze, &self.freeze_key),
            (Role::Wipe, &self.wipe_key),
            (Role::Kyc, &self.kyc_key),
        ];
        for (role, value) in authorities {
            source.override_with(role.env_key(), value.as_deref());
        }
    }
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Create the fungible token (defaults: HushSense / HUSH, 10M minted, 50B cap)
    CreateFungibleToken(CreateArgs),

    /// Create an NFT collection (defaults: HushSense Collection / HSNFT, unlimited)
    CreateNftCollection(CreateArgs),

    /// Mint one NFT per METADATA value
    MintNft {
        /// Metadata per NFT, usually an IPFS CID [default: NFT_METADATA_CID]
        metadata: Vec<String>,
    },

    /// Mint units of a fungible token
    MintFungible {
        /// Amount in the token's smallest unit
        amount: u64,
    },

    /// Burn NFTs by serial: 5, 1,3,7 or latest
    BurnNft {
        serials: Option<String>,

        /// How `latest` is resolved: supply (total supply, fast but wrong
        /// after earlier burns) or mirror (mirror node history)
        #[arg(long, default_value_t = LatestStrategy::TotalSupply)]
        latest: LatestStrategy,
    },

    /// Burn units of a fungible token held by the treasury
    BurnFungible {
        amount: u64,
    },

    /// Delete the token (needs the admin key)
    DeleteToken,

    /// Show the token's current state
    TokenInfo,
}

impl Commands {
    /// `None` when the command was given without its required argument and
    /// only usage should be shown.
    pub fn into_request(self) -> Option<Request> {
        let request = match self {
            Commands::CreateFungibleToken(args) => args.into_request(TokenKind::Fungible),
            Commands::CreateNftCollection(args) => args.into_request(TokenKind::NonFungible),
            Commands::MintNft { metadata } => Request::MintNft { metadata },
            Commands::MintFungible { amount } => Request::MintFungible { amount },
            Commands::BurnNft { serials, latest } => Request::BurnNft {
                serials: serials?,
                latest,
            },
            Commands::BurnFungible { amount } => Request::BurnFungible { amount },
            Commands::DeleteToken => Request::DeleteToken,
            Commands::TokenInfo => Request::TokenInfo,
        };
        Some(request)
    }
}

#[derive(Args, Debug, Default)]
pub struct CreateArgs {
    /// TOML file with descriptor fields; flags override it
    #[arg(long)]
    pub descriptor: Option<PathBuf>,

    #[arg(long)]
    pub name: Option<String>,

    #[arg(long)]
    pub symbol: Option<String>,

    #[arg(long)]
    pub decimals: Option<u32>,

    #[arg(long)]
    pub initial_supply: Option<u64>,

    /// Cap the supply; makes the supply finite
    #[arg(long, conflicts_with = "infinite")]
    pub max_supply: Option<u64>,

    /// Remove any supply cap
    #[arg(long)]
    pub infinite: bool,

    /// Token metadata, usually an IPFS CID [default: TOKEN_METADATA_CID]
    #[arg(long)]
    pub metadata: Option<String>,

    #[arg(long)]
    pub memo: Option<String>,

    /// Freeze new accounts by default
    #[arg(long)]
    pub freeze_default: bool,
}

impl CreateArgs {
    fn into_request(self, kind: TokenKind) -> Request {
        let overrides = DescriptorOverrides {
            name: self.name,
            symbol: self.symbol,
            decimals: self.decimals,
            initial_supply: self.initial_supply,
            max_supply: self.max_supply,
            infinite_supply: self.infinite.then_some(true),
            metadata: self.metadata,
            memo: self.memo,
            freeze_default: self.freeze_default.then_some(true),
        };
        Request::CreateToken {
            kind,
            descriptor_file: self.descriptor,
            overrides,
        }
    }
}
