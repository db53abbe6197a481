//! Validated runner configuration.
//!
//! All settings come from one [`ConfigSource`]: a snapshot of the process
//! environment with command-line values layered on top. [`RunnerConfig::load`]
//! validates every field in one pass, before any client is built.

use std::collections::HashMap;
use std::fmt;
use std::path::PathBuf;
use std::str::FromStr;

use hedera::Hbar;
use tracing::debug;

use crate::descriptor::{DescriptorError, TokenKind};
use crate::ids::EntityId;
use crate::keys::{AuthoritySpec, Role, SigningKey, UnsignableAuthority};
use crate::network::Network;

pub const ENV_OPERATOR_ID: [&str; 2] = ["OPERATOR_ID", "MY_ACCOUNT_ID"];
pub const ENV_OPERATOR_KEY: [&str; 2] = ["OPERATOR_KEY", "MY_PRIVATE_KEY"];
pub const ENV_NETWORK: &str = "HEDERA_NETWORK";
pub const ENV_TOKEN_ID: [&str; 2] = ["TOKEN_ID", "HUSHSENSE_NFT_ID"];
pub const ENV_TOKEN_METADATA: &str = "TOKEN_METADATA_CID";
pub const ENV_NFT_METADATA: &str = "NFT_METADATA_CID";
pub const ENV_SUPPLY_CONTRACT: [&str; 2] = ["SUPPLY_CONTRACT_ID", "HUSHSENSE_MANAGER_CONTRACT_ID"];
pub const ENV_MAX_FEE: &str = "MAX_TRANSACTION_FEE";
pub const ENV_AUTO_RENEW_PERIOD: &str = "AUTO_RENEW_PERIOD";
pub const ENV_MIRROR_NODE_URL: &str = "MIRROR_NODE_URL";
pub const ENV_LOG_DIR: &str = "HUSH_LOG_DIR";

/// Bounds the ledger enforces on a token's auto-renew period, in seconds.
pub const MIN_AUTO_RENEW_SECS: u64 = 2_592_000;
pub const MAX_AUTO_RENEW_SECS: u64 = 8_000_001;

/// Auto-renew period given to new tokens when none is configured (~91 days).
pub const DEFAULT_AUTO_RENEW_SECS: u64 = 7_890_000;

/// Fee cap on token creation when none is configured, in hbar.
pub const DEFAULT_CREATE_FEE_HBAR: i64 = 30;

/// Raw key/value settings. Blank values count as unset.
#[derive(Clone, Default)]
pub struct ConfigSource {
    values: HashMap<String, String>,
}

impl ConfigSource {
    /// Snapshot of the current process environment.
    pub fn from_env() -> Self {
        Self {
            values: std::env::vars().collect(),
        }
    }

    pub fn from_pairs<K, V>(pairs: impl IntoIterator<Item = (K, V)>) -> Self
    where
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            values: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    /// Layers a command-line value over the environment when present.
    pub fn override_with(&mut self, key: &str, value: Option<impl fmt::Display>) {
        if let Some(value) = value {
            self.set(key, value.to_string());
        }
    }

    /// First non-blank value among `keys`, in order.
    pub fn get_any(&self, keys: &[&str]) -> Option<&str> {
        self.get_keyed(keys).map(|(_, value)| value)
    }

    /// Like [`get_any`](Self::get_any), also returning the key that held
    /// the value.
    pub fn get_keyed<'k>(&self, keys: &[&'k str]) -> Option<(&'k str, &str)> {
        keys.iter().find_map(|key| {
            self.values
                .get(*key)
                .map(|v| v.trim())
                .filter(|v| !v.is_empty())
                .map(|v| (*key, v))
        })
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.get_any(&[key])
    }

    /// Log directory, readable before the rest of the configuration is
    /// validated so logging can start first.
    pub fn log_dir(&self) -> Option<PathBuf> {
        self.get(ENV_LOG_DIR).map(PathBuf::from)
    }
}

impl fmt::Debug for ConfigSource {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut keys: Vec<&String> = self.values.keys().collect();
        keys.sort();
        f.debug_struct("ConfigSource").field("keys", &keys).finish()
    }
}

#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("missing {what} (set {keys})")]
    Missing { what: &'static str, keys: String },

    #[error("invalid {key}: {reason}")]
    Invalid { key: String, reason: String },

    #[error(transparent)]
    Descriptor(#[from] DescriptorError),

    #[error(transparent)]
    Unsignable(#[from] UnsignableAuthority),
}

impl ConfigError {
    fn missing(what: &'static str, keys: &[&str]) -> Self {
        ConfigError::Missing {
            what,
            keys: keys.join(" or "),
        }
    }

    fn invalid(key: &str, reason: impl fmt::Display) -> Self {
        ConfigError::Invalid {
            key: key.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// The paying, authenticating account.
#[derive(Debug, Clone)]
pub struct Operator {
    pub account_id: EntityId,
    pub key: SigningKey,
}

/// Parses `MAX_TRANSACTION_FEE`: an hbar amount such as `5`, `2.5` or
/// `150000000 tℏ`. Zero and negative caps are refused.
pub fn parse_max_fee(input: &str) -> Result<Hbar, String> {
    let fee = Hbar::from_str(input.trim()).map_err(|e| format!("{input:?}: {e}"))?;
    if fee.to_tinybars() <= 0 {
        return Err("fee cap must be positive".into());
    }
    Ok(fee)
}

/// Every recognized setting, validated.
#[derive(Debug, Clone)]
pub struct RunnerConfig {
    pub network: Network,
    pub operator: Operator,
    pub token_id: Option<EntityId>,
    pub token_metadata: Option<String>,
    pub nft_metadata: Option<String>,
    pub supply_contract: Option<EntityId>,
    authorities: HashMap<Role, AuthoritySpec>,
    pub max_fee: Option<Hbar>,
    pub auto_renew_period_secs: Option<u64>,
    pub mirror_node_url: String,
    pub log_dir: Option<PathBuf>,
}

impl RunnerConfig {
    pub fn load(source: &ConfigSource) -> Result<Self, ConfigError> {
        let network = match source.get(ENV_NETWORK) {
            Some(name) => name
                .parse::<Network>()
                .map_err(|e| ConfigError::invalid(ENV_NETWORK, e))?,
            None => Network::default(),
        };

        let account_id = parse_entity(source, &ENV_OPERATOR_ID)?
            .ok_or_else(|| ConfigError::missing("operator account id", &ENV_OPERATOR_ID))?;

        let (key_name, key) = source
            .get_keyed(&ENV_OPERATOR_KEY)
            .ok_or_else(|| ConfigError::missing("operator private key", &ENV_OPERATOR_KEY))?;
        let key = key
            .parse::<SigningKey>()
            .map_err(|e| ConfigError::invalid(key_name, e))?;

        let token_id = parse_entity(source, &ENV_TOKEN_ID)?;
        let supply_contract = parse_entity(source, &ENV_SUPPLY_CONTRACT)?;

        let mut authorities = HashMap::new();
        for role in Role::ALL {
            if let Some(value) = source.get(role.env_key()) {
                let spec = value
                    .parse::<AuthoritySpec>()
                    .map_err(|e| ConfigError::invalid(role.env_key(), e))?;
                authorities.insert(role, spec);
            }
        }

        let max_fee = source
            .get(ENV_MAX_FEE)
            .map(|v| parse_max_fee(v).map_err(|e| ConfigError::invalid(ENV_MAX_FEE, e)))
            .transpose()?;

        let auto_renew_period_secs = source
            .get(ENV_AUTO_RENEW_PERIOD)
            .map(parse_auto_renew)
            .transpose()?;

        let mirror_node_url = match source.get(ENV_MIRROR_NODE_URL) {
            Some(url) if validate_url(url) => url.trim_end_matches('/').to_string(),
            Some(url) => {
                return Err(ConfigError::invalid(
                    ENV_MIRROR_NODE_URL,
                    format!("{url:?} is not an http(s) URL"),
                ));
            }
            None => network.mirror_node_url().to_string(),
        };

        let config = Self {
            network,
            operator: Operator { account_id, key },
            token_id,
            token_metadata: source.get(ENV_TOKEN_METADATA).map(str::to_string),
            nft_metadata: source.get(ENV_NFT_METADATA).map(str::to_string),
            supply_contract,
            authorities,
            max_fee,
            auto_renew_period_secs,
            mirror_node_url,
            log_dir: source.log_dir(),
        };
        debug!(
            network = %config.network,
            operator = %config.operator.account_id,
            token = ?config.token_id.map(|t| t.to_string()),
            "configuration loaded"
        );
        Ok(config)
    }

    /// The token id, required by every operation on an existing token.
    pub fn require_token(&self) -> Result<EntityId, ConfigError> {
        self.token_id
            .ok_or_else(|| ConfigError::missing("token id", &ENV_TOKEN_ID))
    }

    /// Fee cap for a token creation: the configured cap, else
    /// [`DEFAULT_CREATE_FEE_HBAR`].
    pub fn create_fee(&self) -> Hbar {
        self.max_fee
            .unwrap_or_else(|| Hbar::new(DEFAULT_CREATE_FEE_HBAR))
    }

    /// Auto-renew period for a new token, in seconds.
    pub fn create_auto_renew_secs(&self) -> u64 {
        self.auto_renew_period_secs.unwrap_or(DEFAULT_AUTO_RENEW_SECS)
    }

    /// Explicitly configured authority for `role`, if any.
    pub fn authority(&self, role: Role) -> Option<&AuthoritySpec> {
        self.authorities.get(&role)
    }

    pub fn set_authority(&mut self, role: Role, spec: AuthoritySpec) {
        self.authorities.insert(role, spec);
    }

    /// Authority for `role` on a token created as `kind`, falling back to
    /// the defaults the token scripts have always used.
    pub fn creation_authority(&self, kind: TokenKind, role: Role) -> AuthoritySpec {
        if let Some(spec) = self.authority(role) {
            return spec.clone();
        }
        match (kind, role) {
            (TokenKind::Fungible, Role::Supply | Role::Pause) => match self.supply_contract {
                Some(contract) => AuthoritySpec::Contract(contract),
                None => AuthoritySpec::Operator,
            },
            (TokenKind::Fungible, Role::Freeze | Role::Wipe) => {
                if self.supply_contract.is_some() {
                    AuthoritySpec::None
                } else {
                    AuthoritySpec::Operator
                }
            }
            (_, Role::Admin) => AuthoritySpec::Operator,
            (TokenKind::NonFungible, Role::Supply | Role::Wipe) => AuthoritySpec::Operator,
            (_, Role::Kyc) | (TokenKind::NonFungible, Role::Pause | Role::Freeze) => {
                AuthoritySpec::None
            }
        }
    }

    /// Key that signs for `role` on an existing token. Defaults to the operator.
    pub fn signer(&self, role: Role) -> Result<&SigningKey, ConfigError> {
        match self.authority(role) {
            Some(spec) => Ok(spec.signer(role, &self.operator.key)?),
            None => Ok(&self.operator.key),
        }
    }
}

fn parse_entity(source: &ConfigSource, keys: &[&str]) -> Result<Option<EntityId>, ConfigError> {
    source
        .get_keyed(keys)
        .map(|(key, v)| v.parse::<EntityId>().map_err(|e| ConfigError::invalid(key, e)))
        .transpose()
}

fn parse_auto_renew(value: &str) -> Result<u64, ConfigError> {
    let secs: u64 = value
        .parse()
        .map_err(|_| ConfigError::invalid(ENV_AUTO_RENEW_PERIOD, "expected a number of seconds"))?;
    if !(MIN_AUTO_RENEW_SECS..=MAX_AUTO_RENEW_SECS).contains(&secs) {
        return Err(ConfigError::invalid(
            ENV_AUTO_RENEW_PERIOD,
            format!("{secs}s is outside {MIN_AUTO_RENEW_SECS}..={MAX_AUTO_RENEW_SECS}"),
        ));
    }
    Ok(secs)
}

/// Validate that a URL is well-formed and uses HTTP or HTTPS.
pub fn validate_url(url: &str) -> bool {
    match url::Url::parse(url) {
        Ok(parsed) => {
            let scheme = parsed.scheme();
            (scheme == "http" || scheme == "https") && parsed.host().is_some()
        }
        Err(_) => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn base_source() -> (ConfigSource, SigningKey) {
        let key = SigningKey::generate();
        let source = ConfigSource::from_pairs([
            ("MY_ACCOUNT_ID", "0.0.1001".to_string()),
            ("MY_PRIVATE_KEY", key.private_key().to_string()),
        ]);
        (source, key)
    }

    #[test]
    fn loads_minimal_config_with_defaults() {
        let (source, key) = base_source();
        let config = RunnerConfig::load(&source).unwrap();
        assert_eq!(config.network, Network::Testnet);
        assert_eq!(config.operator.account_id, EntityId::new(0, 0, 1001));
        assert!(config.operator.key.same_key(&key));
        assert!(config.token_id.is_none());
        assert_eq!(config.mirror_node_url, Network::Testnet.mirror_node_url());
    }

    #[test]
    fn operator_aliases_take_precedence() {
        let (mut source, _) = base_source();
        source.set("OPERATOR_ID", "0.0.2002");
        let config = RunnerConfig::load(&source).unwrap();
        assert_eq!(config.operator.account_id, EntityId::new(0, 0, 2002));
    }

    #[test]
    fn missing_credentials_are_reported_with_their_keys() {
        let err = RunnerConfig::load(&ConfigSource::default()).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { what: "operator account id", .. }));
        assert!(err.to_string().contains("OPERATOR_ID or MY_ACCOUNT_ID"));

        let source = ConfigSource::from_pairs([("MY_ACCOUNT_ID", "0.0.5")]);
        let err = RunnerConfig::load(&source).unwrap_err();
        assert!(matches!(err, ConfigError::Missing { what: "operator private key", .. }));
    }

    #[test]
    fn blank_credentials_count_as_missing() {
        let source = ConfigSource::from_pairs([("MY_ACCOUNT_ID", "  "), ("MY_PRIVATE_KEY", "")]);
        assert!(matches!(
            RunnerConfig::load(&source),
            Err(ConfigError::Missing { .. })
        ));
    }

    #[test]
    fn malformed_credentials_are_invalid() {
        let (mut source, _) = base_source();
        source.set("MY_PRIVATE_KEY", "zz-not-hex");
        assert!(matches!(
            RunnerConfig::load(&source),
            Err(ConfigError::Invalid { key, .. }) if key == "MY_PRIVATE_KEY"
        ));

        let (mut source, _) = base_source();
        source.set("MY_ACCOUNT_ID", "1001");
        assert!(matches!(
            RunnerConfig::load(&source),
            Err(ConfigError::Invalid { key, .. }) if key == "MY_ACCOUNT_ID"
        ));
    }

    #[test]
    fn invalid_alias_is_reported_under_its_own_name() {
        let (mut source, _) = base_source();
        source.set("HUSHSENSE_NFT_ID", "nft-7");
        let err = RunnerConfig::load(&source).unwrap_err();
        assert!(matches!(&err, ConfigError::Invalid { key, .. } if key == "HUSHSENSE_NFT_ID"));
        assert!(err.to_string().starts_with("invalid HUSHSENSE_NFT_ID"));

        let (mut source, _) = base_source();
        source.set("HUSHSENSE_MANAGER_CONTRACT_ID", "0.0");
        assert!(matches!(
            RunnerConfig::load(&source),
            Err(ConfigError::Invalid { key, .. }) if key == "HUSHSENSE_MANAGER_CONTRACT_ID"
        ));

        let (mut source, _) = base_source();
        source.set("TOKEN_ID", "bogus");
        source.set("HUSHSENSE_NFT_ID", "0.0.5");
        assert!(matches!(
            RunnerConfig::load(&source),
            Err(ConfigError::Invalid { key, .. }) if key == "TOKEN_ID"
        ));
    }

    #[test]
    fn unknown_network_is_rejected() {
        let (mut source, _) = base_source();
        source.set("HEDERA_NETWORK", "localnet");
        assert!(matches!(
            RunnerConfig::load(&source),
            Err(ConfigError::Invalid { key, .. }) if key == "HEDERA_NETWORK"
        ));
    }

    #[test]
    fn override_wins_over_environment() {
        let (mut source, _) = base_source();
        source.set("HEDERA_NETWORK", "testnet");
        source.override_with("HEDERA_NETWORK", Some(Network::Mainnet));
        source.override_with("TOKEN_ID", None::<String>);
        let config = RunnerConfig::load(&source).unwrap();
        assert_eq!(config.network, Network::Mainnet);
        assert_eq!(config.mirror_node_url, Network::Mainnet.mirror_node_url());
    }

    #[test]
    fn token_id_is_required_on_demand() {
        let (source, _) = base_source();
        let config = RunnerConfig::load(&source).unwrap();
        let err = config.require_token().unwrap_err();
        assert!(err.to_string().contains("TOKEN_ID or HUSHSENSE_NFT_ID"));

        let (mut source, _) = base_source();
        source.set("HUSHSENSE_NFT_ID", "0.0.777");
        let config = RunnerConfig::load(&source).unwrap();
        assert_eq!(config.require_token().unwrap(), EntityId::new(0, 0, 777));
    }

    #[test]
    fn parses_fee_caps() {
        assert_eq!(parse_max_fee("5").unwrap(), Hbar::new(5));
        assert_eq!(parse_max_fee(" 2.5 ").unwrap(), Hbar::from_tinybars(250_000_000));
        assert!(parse_max_fee("0").is_err());
        assert!(parse_max_fee("-1").is_err());
        assert!(parse_max_fee("ten").is_err());
        assert!(parse_max_fee("").is_err());
    }

    #[test]
    fn configured_fee_cap_is_loaded() {
        let (mut source, _) = base_source();
        source.set("MAX_TRANSACTION_FEE", "12");
        let config = RunnerConfig::load(&source).unwrap();
        assert_eq!(config.max_fee, Some(Hbar::new(12)));
        assert_eq!(config.create_fee(), Hbar::new(12));

        source.set("MAX_TRANSACTION_FEE", "0");
        assert!(matches!(
            RunnerConfig::load(&source),
            Err(ConfigError::Invalid { key, .. }) if key == "MAX_TRANSACTION_FEE"
        ));
    }

    #[test]
    fn creation_defaults_apply_when_unset() {
        let (mut source, _) = base_source();
        let config = RunnerConfig::load(&source).unwrap();
        assert!(config.max_fee.is_none());
        assert_eq!(config.create_fee(), Hbar::new(DEFAULT_CREATE_FEE_HBAR));
        assert_eq!(config.create_auto_renew_secs(), DEFAULT_AUTO_RENEW_SECS);

        source.set("AUTO_RENEW_PERIOD", "5000000");
        let config = RunnerConfig::load(&source).unwrap();
        assert_eq!(config.create_auto_renew_secs(), 5_000_000);
    }

    #[test]
    fn auto_renew_period_bounds() {
        let (mut source, _) = base_source();
        source.set("AUTO_RENEW_PERIOD", "7890000");
        let config = RunnerConfig::load(&source).unwrap();
        assert_eq!(config.auto_renew_period_secs, Some(7_890_000));

        source.set("AUTO_RENEW_PERIOD", "60");
        assert!(RunnerConfig::load(&source).is_err());
    }

    #[test]
    fn mirror_url_must_be_http() {
        let (mut source, _) = base_source();
        source.set("MIRROR_NODE_URL", "ftp://mirror.example.com");
        assert!(RunnerConfig::load(&source).is_err());

        source.set("MIRROR_NODE_URL", "http://localhost:5551/");
        let config = RunnerConfig::load(&source).unwrap();
        assert_eq!(config.mirror_node_url, "http://localhost:5551");
    }

    #[test]
    fn fungible_defaults_follow_supply_contract() {
        let (mut source, _) = base_source();
        let config = RunnerConfig::load(&source).unwrap();
        assert!(matches!(
            config.creation_authority(TokenKind::Fungible, Role::Supply),
            AuthoritySpec::Operator
        ));
        assert!(matches!(
            config.creation_authority(TokenKind::Fungible, Role::Kyc),
            AuthoritySpec::None
        ));

        source.set("HUSHSENSE_MANAGER_CONTRACT_ID", "0.0.4242");
        let config = RunnerConfig::load(&source).unwrap();
        for role in [Role::Supply, Role::Pause] {
            assert!(matches!(
                config.creation_authority(TokenKind::Fungible, role),
                AuthoritySpec::Contract(id) if id == EntityId::new(0, 0, 4242)
            ));
        }
        for role in [Role::Freeze, Role::Wipe, Role::Kyc] {
            assert!(matches!(
                config.creation_authority(TokenKind::Fungible, role),
                AuthoritySpec::None
            ));
        }
        assert!(matches!(
            config.creation_authority(TokenKind::Fungible, Role::Admin),
            AuthoritySpec::Operator
        ));
    }

    #[test]
    fn nft_collection_defaults() {
        let (source, _) = base_source();
        let config = RunnerConfig::load(&source).unwrap();
        for role in [Role::Admin, Role::Supply, Role::Wipe] {
            assert!(matches!(
                config.creation_authority(TokenKind::NonFungible, role),
                AuthoritySpec::Operator
            ));
        }
        for role in [Role::Pause, Role::Freeze, Role::Kyc] {
            assert!(matches!(
                config.creation_authority(TokenKind::NonFungible, role),
                AuthoritySpec::None
            ));
        }
    }

    #[test]
    fn explicit_authority_overrides_defaults_and_signs() {
        let (mut source, operator) = base_source();
        let supply = SigningKey::generate();
        source.set("SUPPLY_KEY", supply.private_key().to_string());
        source.set("ADMIN_KEY", "contract:0.0.99");
        let config = RunnerConfig::load(&source).unwrap();

        assert!(config.signer(Role::Supply).unwrap().same_key(&supply));
        assert!(!config.signer(Role::Supply).unwrap().same_key(&operator));
        assert!(matches!(
            config.signer(Role::Admin),
            Err(ConfigError::Unsignable(_))
        ));
        assert!(config.signer(Role::Wipe).unwrap().same_key(&operator));
    }

    #[test]
    fn malformed_authority_is_invalid() {
        let (mut source, _) = base_source();
        source.set("PAUSE_KEY", "public:nothex");
        assert!(matches!(
            RunnerConfig::load(&source),
            Err(ConfigError::Invalid { key, .. }) if key == "PAUSE_KEY"
        ));
    }

    #[test]
    fn debug_output_never_contains_secrets() {
        let (source, key) = base_source();
        let secret = key.private_key().to_string();
        assert!(!format!("{source:?}").contains(&secret));
        let config = RunnerConfig::load(&source).unwrap();
        assert!(!format!("{config:?}").contains(&secret));
    }

    #[test]
    fn validate_url_accepts_http_and_https_only() {
        assert!(validate_url("https://mainnet-public.mirrornode.hedera.com"));
        assert!(validate_url("http://localhost:5551"));
        assert!(!validate_url("not a url"));
        assert!(!validate_url("file:///etc/passwd"));
    }
}
