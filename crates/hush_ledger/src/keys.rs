//! Key material and token authorities.
//!
//! A token carries up to six control keys (admin, supply, pause, freeze,
//! wipe, KYC). Each one is configured independently as an [`AuthoritySpec`];
//! only authorities backed by a private key we hold can sign.

use std::fmt;
use std::str::FromStr;

use hedera::{PrivateKey, PublicKey};
use serde::{Serialize, Serializer};

use crate::ids::EntityId;

/// A private key the runner signs with. `Debug` never prints key material.
#[derive(Clone)]
pub struct SigningKey(PrivateKey);

impl SigningKey {
    pub fn new(key: PrivateKey) -> Self {
        Self(key)
    }

    /// Fresh Ed25519 key, for tests and local tooling.
    pub fn generate() -> Self {
        Self(PrivateKey::generate_ed25519())
    }

    pub fn public_key(&self) -> PublicKey {
        self.0.public_key()
    }

    pub fn private_key(&self) -> &PrivateKey {
        &self.0
    }

    /// Whether this key's public half is `public`.
    pub fn matches(&self, public: &PublicKey) -> bool {
        self.public_key().to_string() == public.to_string()
    }

    pub fn same_key(&self, other: &SigningKey) -> bool {
        self.matches(&other.public_key())
    }
}

impl fmt::Debug for SigningKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("SigningKey").field(&self.public_key().to_string()).finish()
    }
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum KeyError {
    #[error("not a valid private key ({0})")]
    Private(String),

    #[error("not a valid public key ({0})")]
    Public(String),

    #[error("not a valid contract id ({0})")]
    Contract(String),
}

impl FromStr for SigningKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        let trimmed = trimmed.strip_prefix("0x").unwrap_or(trimmed);
        if trimmed.is_empty() {
            return Err(KeyError::Private("empty".into()));
        }
        PrivateKey::from_str(trimmed)
            .map(Self)
            .map_err(|e| KeyError::Private(e.to_string()))
    }
}

/// A control key as set on, or reported by, the ledger.
#[derive(Debug, Clone)]
pub enum KeyRef {
    Public(PublicKey),
    Contract(EntityId),
    /// Key lists, thresholds and other structures we only display.
    Other(String),
}

impl KeyRef {
    pub fn same_as(&self, other: &KeyRef) -> bool {
        match (self, other) {
            (KeyRef::Public(a), KeyRef::Public(b)) => a.to_string() == b.to_string(),
            (KeyRef::Contract(a), KeyRef::Contract(b)) => a == b,
            (KeyRef::Other(a), KeyRef::Other(b)) => a == b,
            _ => false,
        }
    }

    /// Whether `key` produces a signature satisfying this authority on its own.
    pub fn is_satisfied_by(&self, key: &SigningKey) -> bool {
        matches!(self, KeyRef::Public(public) if key.matches(public))
    }
}

impl fmt::Display for KeyRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            KeyRef::Public(key) => write!(f, "{key}"),
            KeyRef::Contract(id) => write!(f, "contract {id}"),
            KeyRef::Other(desc) => f.write_str(desc),
        }
    }
}

impl Serialize for KeyRef {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(self)
    }
}

/// How one token authority is provided.
///
/// Parsed from `operator`, `none`, `contract:<id>`, `public:<key>`, or a bare
/// private key.
#[derive(Debug, Clone)]
pub enum AuthoritySpec {
    Operator,
    None,
    Key(SigningKey),
    Public(PublicKey),
    Contract(EntityId),
}

/// The authority cannot produce a signature from this process.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{role} authority is {held_by}; no private key is available to sign with it")]
pub struct UnsignableAuthority {
    pub role: Role,
    pub held_by: String,
}

impl AuthoritySpec {
    /// The key to install on a new token, if any.
    pub fn resolve(&self, operator: &SigningKey) -> Option<KeyRef> {
        match self {
            AuthoritySpec::Operator => Some(KeyRef::Public(operator.public_key())),
            AuthoritySpec::None => None,
            AuthoritySpec::Key(key) => Some(KeyRef::Public(key.public_key())),
            AuthoritySpec::Public(key) => Some(KeyRef::Public(key.clone())),
            AuthoritySpec::Contract(id) => Some(KeyRef::Contract(*id)),
        }
    }

    /// The key that signs on behalf of this authority.
    pub fn signer<'a>(
        &'a self,
        role: Role,
        operator: &'a SigningKey,
    ) -> Result<&'a SigningKey, UnsignableAuthority> {
        let held_by = match self {
            AuthoritySpec::Operator => return Ok(operator),
            AuthoritySpec::Key(key) => return Ok(key),
            AuthoritySpec::None => "unset".to_string(),
            AuthoritySpec::Public(key) => format!("public key {key}"),
            AuthoritySpec::Contract(id) => format!("contract {id}"),
        };
        Err(UnsignableAuthority { role, held_by })
    }
}

impl FromStr for AuthoritySpec {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let trimmed = s.trim();
        match trimmed.to_ascii_lowercase().as_str() {
            "operator" => return Ok(AuthoritySpec::Operator),
            "none" => return Ok(AuthoritySpec::None),
            _ => {}
        }
        if let Some(id) = trimmed.strip_prefix("contract:") {
            return id
                .parse::<EntityId>()
                .map(AuthoritySpec::Contract)
                .map_err(|e| KeyError::Contract(e.to_string()));
        }
        if let Some(key) = trimmed.strip_prefix("public:") {
            return PublicKey::from_str(key.trim())
                .map(AuthoritySpec::Public)
                .map_err(|e| KeyError::Public(e.to_string()));
        }
        trimmed.parse::<SigningKey>().map(AuthoritySpec::Key)
    }
}

/// The six token control keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Role {
    Admin,
    Supply,
    Pause,
    Freeze,
    Wipe,
    Kyc,
}

impl Role {
    pub const ALL: [Role; 6] = [
        Role::Admin,
        Role::Supply,
        Role::Pause,
        Role::Freeze,
        Role::Wipe,
        Role::Kyc,
    ];

    /// Environment variable naming this authority.
    pub fn env_key(&self) -> &'static str {
        match self {
            Role::Admin => "ADMIN_KEY",
            Role::Supply => "SUPPLY_KEY",
            Role::Pause => "PAUSE_KEY",
            Role::Freeze => "FREEZE_KEY",
            Role::Wipe => "WIPE_KEY",
            Role::Kyc => "KYC_KEY",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Role::Admin => "admin",
            Role::Supply => "supply",
            Role::Pause => "pause",
            Role::Freeze => "freeze",
            Role::Wipe => "wipe",
            Role::Kyc => "KYC",
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signing_key_debug_hides_private_material() {
        let key = SigningKey::generate();
        let debug = format!("{key:?}");
        assert!(!debug.contains(&key.private_key().to_string()));
        assert!(debug.contains(&key.public_key().to_string()));
    }

    #[test]
    fn signing_key_round_trips_through_string() {
        let key = SigningKey::generate();
        let parsed: SigningKey = key.private_key().to_string().parse().unwrap();
        assert!(parsed.same_key(&key));
    }

    #[test]
    fn signing_key_rejects_garbage() {
        assert!("".parse::<SigningKey>().is_err());
        assert!("not-a-key".parse::<SigningKey>().is_err());
    }

    #[test]
    fn authority_keywords() {
        assert!(matches!("operator".parse(), Ok(AuthoritySpec::Operator)));
        assert!(matches!(" NONE ".parse(), Ok(AuthoritySpec::None)));
    }

    #[test]
    fn authority_contract_and_public_forms() {
        let spec: AuthoritySpec = "contract:0.0.5005".parse().unwrap();
        assert!(matches!(spec, AuthoritySpec::Contract(id) if id == EntityId::new(0, 0, 5005)));

        let public = SigningKey::generate().public_key();
        let spec: AuthoritySpec = format!("public:{public}").parse().unwrap();
        assert!(matches!(spec, AuthoritySpec::Public(_)));

        assert!(matches!(
            "contract:nope".parse::<AuthoritySpec>(),
            Err(KeyError::Contract(_))
        ));
    }

    #[test]
    fn authority_private_key_can_sign() {
        let operator = SigningKey::generate();
        let supply = SigningKey::generate();
        let spec: AuthoritySpec = supply.private_key().to_string().parse().unwrap();

        let signer = spec.signer(Role::Supply, &operator).unwrap();
        assert!(signer.same_key(&supply));
        assert!(!signer.same_key(&operator));
    }

    #[test]
    fn contract_and_public_authorities_cannot_sign() {
        let operator = SigningKey::generate();
        let contract = AuthoritySpec::Contract(EntityId::new(0, 0, 9));
        let err = contract.signer(Role::Supply, &operator).unwrap_err();
        assert_eq!(err.role, Role::Supply);
        assert!(err.to_string().contains("contract 0.0.9"));

        let public = AuthoritySpec::Public(SigningKey::generate().public_key());
        assert!(public.signer(Role::Admin, &operator).is_err());
        assert!(AuthoritySpec::None.signer(Role::Admin, &operator).is_err());
    }

    #[test]
    fn resolve_maps_operator_to_its_public_key() {
        let operator = SigningKey::generate();
        let resolved = AuthoritySpec::Operator.resolve(&operator).unwrap();
        assert!(resolved.is_satisfied_by(&operator));
        assert!(AuthoritySpec::None.resolve(&operator).is_none());
    }

    #[test]
    fn contract_key_is_never_satisfied_by_a_private_key() {
        let key = SigningKey::generate();
        assert!(!KeyRef::Contract(EntityId::new(0, 0, 1)).is_satisfied_by(&key));
    }
}
