use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Ledger limit for names, symbols, memos and token metadata, in bytes.
pub const MAX_TEXT_BYTES: usize = 100;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    Fungible,
    NonFungible,
}

impl TokenKind {
    pub fn label(&self) -> &'static str {
        match self {
            TokenKind::Fungible => "fungible token",
            TokenKind::NonFungible => "NFT collection",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SupplyPolicy {
    Infinite,
    Finite { max_supply: u64 },
}

/// Everything needed to create a token, apart from its control keys.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenDescriptor {
    pub kind: TokenKind,
    pub name: String,
    pub symbol: String,
    pub decimals: u32,
    pub initial_supply: u64,
    pub supply: SupplyPolicy,
    /// Metadata reference, typically an IPFS content id.
    pub metadata: Option<String>,
    pub memo: Option<String>,
    pub freeze_default: bool,
}

impl TokenDescriptor {
    /// HUSH: 10 million minted up front, capped at 50 billion, no decimals.
    pub fn fungible_default() -> Self {
        Self {
            kind: TokenKind::Fungible,
            name: "HushSense".into(),
            symbol: "HUSH".into(),
            decimals: 0,
            initial_supply: 10_000_000,
            supply: SupplyPolicy::Finite {
                max_supply: 50_000_000_000,
            },
            metadata: None,
            memo: None,
            freeze_default: false,
        }
    }

    /// Unlimited NFT collection.
    pub fn nft_collection_default() -> Self {
        Self {
            kind: TokenKind::NonFungible,
            name: "HushSense Collection".into(),
            symbol: "HSNFT".into(),
            decimals: 0,
            initial_supply: 0,
            supply: SupplyPolicy::Infinite,
            metadata: None,
            memo: None,
            freeze_default: false,
        }
    }

    pub fn default_for(kind: TokenKind) -> Self {
        match kind {
            TokenKind::Fungible => Self::fungible_default(),
            TokenKind::NonFungible => Self::nft_collection_default(),
        }
    }

    /// Checks the descriptor against the ledger's token rules.
    pub fn validate(&self) -> Result<(), DescriptorError> {
        check_text("name", &self.name, true)?;
        check_text("symbol", &self.symbol, true)?;
        if let Some(memo) = &self.memo {
            check_text("memo", memo, false)?;
        }
        if let Some(metadata) = &self.metadata {
            check_text("metadata", metadata, false)?;
        }

        if self.kind == TokenKind::NonFungible {
            if self.decimals != 0 {
                return Err(DescriptorError::Invalid(
                    "an NFT collection must have 0 decimals".into(),
                ));
            }
            if self.initial_supply != 0 {
                return Err(DescriptorError::Invalid(
                    "an NFT collection must have an initial supply of 0".into(),
                ));
            }
        }

        if let SupplyPolicy::Finite { max_supply } = self.supply {
            if max_supply == 0 {
                return Err(DescriptorError::Invalid(
                    "max supply of a finite token must be positive".into(),
                ));
            }
            if self.initial_supply > max_supply {
                return Err(DescriptorError::Invalid(format!(
                    "initial supply {} exceeds max supply {max_supply}",
                    self.initial_supply
                )));
            }
        }
        if i64::try_from(self.initial_supply).is_err() {
            return Err(DescriptorError::Invalid("initial supply is out of range".into()));
        }
        Ok(())
    }
}

fn check_text(field: &str, value: &str, required: bool) -> Result<(), DescriptorError> {
    if required && value.trim().is_empty() {
        return Err(DescriptorError::Invalid(format!("{field} must not be empty")));
    }
    if value.len() > MAX_TEXT_BYTES {
        return Err(DescriptorError::Invalid(format!(
            "{field} is {} bytes, the limit is {MAX_TEXT_BYTES}",
            value.len()
        )));
    }
    Ok(())
}

#[derive(Debug, thiserror::Error)]
pub enum DescriptorError {
    #[error("invalid token descriptor: {0}")]
    Invalid(String),

    #[error("failed to read descriptor file {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    #[error("failed to parse descriptor file {path}: {source}")]
    Parse {
        path: PathBuf,
        source: toml::de::Error,
    },
}

/// Partial descriptor, as read from a TOML file or from command-line flags.
///
/// ```toml
/// name = "HushSense"
/// symbol = "HUSH"
/// decimals = 0
/// initial_supply = 10000000
/// max_supply = 50000000000
/// metadata = "bafybeigdyrzt5sfp7udm7hu76uh7y26nf3efuylqabf3oclgtqy55fbzdi"
/// ```
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct DescriptorOverrides {
    pub name: Option<String>,
    pub symbol: Option<String>,
    pub decimals: Option<u32>,
    pub initial_supply: Option<u64>,
    /// Setting a max supply makes the supply finite.
    pub max_supply: Option<u64>,
    /// `true` removes any max supply.
    pub infinite_supply: Option<bool>,
    pub metadata: Option<String>,
    pub memo: Option<String>,
    pub freeze_default: Option<bool>,
}

impl DescriptorOverrides {
    pub fn from_toml_file(path: &Path) -> Result<Self, DescriptorError> {
        let text = std::fs::read_to_string(path).map_err(|source| DescriptorError::Read {
            path: path.to_path_buf(),
            source,
        })?;
        toml::from_str(&text).map_err(|source| DescriptorError::Parse {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Values in `self` win over values in `base`.
    pub fn layered_over(self, mut base: DescriptorOverrides) -> DescriptorOverrides {
        // A supply choice on top replaces the one below, whichever form it takes.
        if self.infinite_supply == Some(true) {
            base.max_supply = None;
        }
        if self.max_supply.is_some() {
            base.infinite_supply = None;
        }
        DescriptorOverrides {
            name: self.name.or(base.name),
            symbol: self.symbol.or(base.symbol),
            decimals: self.decimals.or(base.decimals),
            initial_supply: self.initial_supply.or(base.initial_supply),
            max_supply: self.max_supply.or(base.max_supply),
            infinite_supply: self.infinite_supply.or(base.infinite_supply),
            metadata: self.metadata.or(base.metadata),
            memo: self.memo.or(base.memo),
            freeze_default: self.freeze_default.or(base.freeze_default),
        }
    }

    pub fn apply_to(self, descriptor: &mut TokenDescriptor) -> Result<(), DescriptorError> {
        if self.infinite_supply == Some(true) && self.max_supply.is_some() {
            return Err(DescriptorError::Invalid(
                "max_supply and infinite_supply are mutually exclusive".into(),
            ));
        }

        if let Some(name) = self.name {
            descriptor.name = name;
        }
        if let Some(symbol) = self.symbol {
            descriptor.symbol = symbol;
        }
        if let Some(decimals) = self.decimals {
            descriptor.decimals = decimals;
        }
        if let Some(initial_supply) = self.initial_supply {
            descriptor.initial_supply = initial_supply;
        }
        if let Some(max_supply) = self.max_supply {
            descriptor.supply = SupplyPolicy::Finite { max_supply };
        }
        if self.infinite_supply == Some(true) {
            descriptor.supply = SupplyPolicy::Infinite;
        }
        if self.metadata.is_some() {
            descriptor.metadata = self.metadata;
        }
        if self.memo.is_some() {
            descriptor.memo = self.memo;
        }
        if let Some(freeze_default) = self.freeze_default {
            descriptor.freeze_default = freeze_default;
        }
        Ok(())
    }

    /// Builds a validated descriptor: built-in defaults for `kind`, then
    /// `self` on top.
    pub fn build(self, kind: TokenKind) -> Result<TokenDescriptor, DescriptorError> {
        let mut descriptor = TokenDescriptor::default_for(kind);
        self.apply_to(&mut descriptor)?;
        descriptor.validate()?;
        Ok(descriptor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_are_valid() {
        TokenDescriptor::fungible_default().validate().unwrap();
        TokenDescriptor::nft_collection_default().validate().unwrap();
    }

    #[test]
    fn nft_collection_rejects_decimals_and_initial_supply() {
        let mut d = TokenDescriptor::nft_collection_default();
        d.decimals = 2;
        assert!(d.validate().is_err());

        let mut d = TokenDescriptor::nft_collection_default();
        d.initial_supply = 1;
        assert!(d.validate().is_err());
    }

    #[test]
    fn initial_supply_cannot_exceed_max() {
        let overrides = DescriptorOverrides {
            initial_supply: Some(11),
            max_supply: Some(10),
            ..Default::default()
        };
        let err = overrides.build(TokenKind::Fungible).unwrap_err();
        assert!(err.to_string().contains("exceeds max supply"));
    }

    #[test]
    fn empty_and_oversized_text_is_rejected() {
        let mut d = TokenDescriptor::fungible_default();
        d.symbol = "  ".into();
        assert!(d.validate().is_err());

        let mut d = TokenDescriptor::fungible_default();
        d.memo = Some("m".repeat(MAX_TEXT_BYTES + 1));
        assert!(d.validate().is_err());
    }

    #[test]
    fn infinite_supply_override_clears_cap() {
        let overrides = DescriptorOverrides {
            infinite_supply: Some(true),
            ..Default::default()
        };
        let d = overrides.build(TokenKind::Fungible).unwrap();
        assert_eq!(d.supply, SupplyPolicy::Infinite);
    }

    #[test]
    fn max_and_infinite_together_are_rejected() {
        let overrides = DescriptorOverrides {
            max_supply: Some(5),
            infinite_supply: Some(true),
            ..Default::default()
        };
        assert!(overrides.build(TokenKind::NonFungible).is_err());
    }

    #[test]
    fn flags_win_over_file_values() {
        let file = DescriptorOverrides {
            name: Some("From File".into()),
            symbol: Some("FILE".into()),
            ..Default::default()
        };
        let flags = DescriptorOverrides {
            name: Some("From Flags".into()),
            ..Default::default()
        };
        let d = flags.layered_over(file).build(TokenKind::Fungible).unwrap();
        assert_eq!(d.name, "From Flags");
        assert_eq!(d.symbol, "FILE");
    }

    #[test]
    fn supply_flag_replaces_file_supply() {
        let file = DescriptorOverrides {
            max_supply: Some(1_000),
            ..Default::default()
        };
        let flags = DescriptorOverrides {
            infinite_supply: Some(true),
            ..Default::default()
        };
        let d = flags.layered_over(file).build(TokenKind::NonFungible).unwrap();
        assert_eq!(d.supply, SupplyPolicy::Infinite);
    }

    #[test]
    fn loads_toml_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.toml");
        std::fs::write(
            &path,
            "name = \"Sense\"\nsymbol = \"SNS\"\nmax_supply = 500\ninitial_supply = 100\nmetadata = \"bafycid\"\n",
        )
        .unwrap();

        let d = DescriptorOverrides::from_toml_file(&path)
            .unwrap()
            .build(TokenKind::Fungible)
            .unwrap();
        assert_eq!(d.name, "Sense");
        assert_eq!(d.supply, SupplyPolicy::Finite { max_supply: 500 });
        assert_eq!(d.initial_supply, 100);
        assert_eq!(d.metadata.as_deref(), Some("bafycid"));
    }

    #[test]
    fn toml_rejects_unknown_fields() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("token.toml");
        std::fs::write(&path, "nmae = \"typo\"\n").unwrap();
        assert!(matches!(
            DescriptorOverrides::from_toml_file(&path),
            Err(DescriptorError::Parse { .. })
        ));
    }

    #[test]
    fn missing_file_is_a_read_error() {
        let path = std::env::temp_dir().join("hush-missing-descriptor.toml");
        assert!(matches!(
            DescriptorOverrides::from_toml_file(&path),
            Err(DescriptorError::Read { .. })
        ));
    }
}
