use serde::{Deserialize, Serialize};

/// Classification of run failures for logging, display and exit status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCategory {
    /// Missing or malformed configuration (credentials, ids, keys, files).
    Config,
    /// A command-line argument failed validation.
    Validation,
    /// The ledger state rules the operation out (e.g. an immutable token).
    Precondition,
    /// The network accepted the request but rejected the transaction.
    Rejected,
    /// Transport failure or timeout talking to the network.
    Network,
    /// Anything else.
    Internal,
}

impl ErrorCategory {
    /// Short label used as a prefix in diagnostics.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Config => "configuration error",
            Self::Validation => "invalid input",
            Self::Precondition => "precondition failed",
            Self::Rejected => "transaction failed",
            Self::Network => "network failure",
            Self::Internal => "unexpected error",
        }
    }

    /// Process exit status for a failure of this category.
    pub fn exit_status(&self) -> ExitStatus {
        match self {
            Self::Internal => ExitStatus(1),
            Self::Config => ExitStatus(2),
            Self::Validation => ExitStatus(3),
            Self::Precondition => ExitStatus(4),
            Self::Rejected => ExitStatus(5),
            Self::Network => ExitStatus(6),
        }
    }

    /// Whether a later identical invocation could plausibly succeed without
    /// any change on the caller's side.
    pub fn is_transient(&self) -> bool {
        matches!(self, Self::Network)
    }
}

impl std::fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.label())
    }
}

/// Non-zero process exit status carried by a failed run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ExitStatus(pub u8);

impl ExitStatus {
    pub fn code(&self) -> u8 {
        self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL: [ErrorCategory; 6] = [
        ErrorCategory::Config,
        ErrorCategory::Validation,
        ErrorCategory::Precondition,
        ErrorCategory::Rejected,
        ErrorCategory::Network,
        ErrorCategory::Internal,
    ];

    #[test]
    fn exit_statuses_are_non_zero_and_distinct() {
        let mut seen = std::collections::HashSet::new();
        for category in ALL {
            let code = category.exit_status().code();
            assert_ne!(code, 0, "{category:?} must fail the process");
            assert!(seen.insert(code), "{category:?} shares exit code {code}");
        }
    }

    #[test]
    fn only_network_failures_are_transient() {
        for category in ALL {
            assert_eq!(category.is_transient(), category == ErrorCategory::Network);
        }
    }

    #[test]
    fn display_uses_label() {
        assert_eq!(ErrorCategory::Config.to_string(), "configuration error");
        assert_eq!(ErrorCategory::Network.to_string(), "network failure");
    }

    #[test]
    fn category_serializes_snake_case() {
        let json = serde_json::to_string(&ErrorCategory::Precondition).unwrap();
        assert_eq!(json, "\"precondition\"");
    }
}
