use hush_core::{ErrorCategory, ExitStatus};

use crate::config::ConfigError;
use crate::ids::EntityId;
use crate::keys::Role;
use crate::ledger::LedgerError;
use crate::serials::SerialError;

/// Why a run failed. Every variant maps to one [`ErrorCategory`].
#[derive(Debug, thiserror::Error)]
pub enum RunError {
    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("{0}")]
    Validation(String),

    /// The token has no key for `role`, so the action can never succeed.
    #[error("token {token} has no {role} key (immutable); cannot {action}")]
    ImmutableToken {
        token: EntityId,
        role: Role,
        action: &'static str,
    },

    #[error("{0}")]
    Precondition(String),

    #[error("{action} failed: {source}")]
    Ledger {
        action: &'static str,
        #[source]
        source: LedgerError,
    },

    #[error("{0}")]
    Internal(String),
}

impl RunError {
    pub fn ledger(action: &'static str, source: LedgerError) -> Self {
        RunError::Ledger { action, source }
    }

    pub fn category(&self) -> ErrorCategory {
        match self {
            RunError::Config(_) => ErrorCategory::Config,
            RunError::Validation(_) => ErrorCategory::Validation,
            RunError::ImmutableToken { .. } | RunError::Precondition(_) => {
                ErrorCategory::Precondition
            }
            RunError::Ledger { source, .. } => match source {
                LedgerError::Network(_) | LedgerError::TimedOut(_) => ErrorCategory::Network,
                LedgerError::Rejected { .. } => ErrorCategory::Rejected,
                LedgerError::Sdk(_) => ErrorCategory::Internal,
            },
            RunError::Internal(_) => ErrorCategory::Internal,
        }
    }

    pub fn exit_status(&self) -> ExitStatus {
        self.category().exit_status()
    }

    /// Transaction id the ledger assigned, when the failure happened after
    /// submission.
    pub fn transaction_id(&self) -> Option<&str> {
        match self {
            RunError::Ledger {
                source: LedgerError::Rejected { transaction_id, .. },
                ..
            } => transaction_id.as_deref(),
            _ => None,
        }
    }
}

impl From<SerialError> for RunError {
    fn from(err: SerialError) -> Self {
        RunError::Validation(err.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn categories_follow_the_failure_source() {
        let config = RunError::from(ConfigError::Missing {
            what: "token id",
            keys: "TOKEN_ID".into(),
        });
        assert_eq!(config.category(), ErrorCategory::Config);

        assert_eq!(RunError::from(SerialError::Empty).category(), ErrorCategory::Validation);

        let immutable = RunError::ImmutableToken {
            token: EntityId::new(0, 0, 7),
            role: Role::Supply,
            action: "mint",
        };
        assert_eq!(immutable.category(), ErrorCategory::Precondition);
        assert!(immutable.to_string().contains("no supply key"));

        let timeout = RunError::ledger("token mint", LedgerError::TimedOut("receipt".into()));
        assert_eq!(timeout.category(), ErrorCategory::Network);
        assert!(timeout.category().is_transient());

        let rejected = RunError::ledger(
            "token burn",
            LedgerError::Rejected {
                status: "INVALID_NFT_ID".into(),
                transaction_id: Some("0.0.2@1.0".into()),
            },
        );
        assert_eq!(rejected.category(), ErrorCategory::Rejected);
        assert_eq!(rejected.transaction_id(), Some("0.0.2@1.0"));
        assert_eq!(
            rejected.to_string(),
            "token burn failed: rejected with status INVALID_NFT_ID"
        );
    }

    #[test]
    fn precondition_and_transient_failures_exit_differently() {
        let precondition = RunError::Precondition("no NFTs minted".into());
        let network = RunError::ledger("token info query", LedgerError::Network("reset".into()));
        assert_ne!(precondition.exit_status(), network.exit_status());
    }
}
