//! Parsing of the `burn-nft` serial argument.

use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

/// Which NFTs a burn targets.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SerialSelector {
    /// Explicit serials in the order given, duplicates removed.
    Explicit(Vec<i64>),
    /// The highest existing serial, resolved against the ledger at run time.
    Latest,
}

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum SerialError {
    #[error("no serial numbers given")]
    Empty,

    #[error("invalid serial number: {0:?} (expected a positive integer)")]
    Invalid(String),
}

/// Strategy for resolving [`SerialSelector::Latest`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LatestStrategy {
    /// Treat the token's total supply as the latest serial. Only correct
    /// while no NFT of the collection has ever been burned.
    #[default]
    TotalSupply,
    /// Ask the mirror node for the highest serial that is not deleted.
    MirrorNode,
}

impl FromStr for LatestStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "supply" | "total-supply" => Ok(LatestStrategy::TotalSupply),
            "mirror" | "mirror-node" => Ok(LatestStrategy::MirrorNode),
            other => Err(format!("unknown latest-serial strategy {other:?} (expected supply or mirror)")),
        }
    }
}

impl fmt::Display for LatestStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            LatestStrategy::TotalSupply => "supply",
            LatestStrategy::MirrorNode => "mirror",
        })
    }
}

/// Parses `"5"`, `"1,3,7"` or `"latest"` (any case).
///
/// Blank entries between commas are skipped; if nothing is left the input
/// is rejected. Every serial must be a positive integer that fits the
/// ledger's signed 64-bit serial field.
pub fn parse_serials(input: &str) -> Result<SerialSelector, SerialError> {
    let trimmed = input.trim();
    if trimmed.eq_ignore_ascii_case("latest") {
        return Ok(SerialSelector::Latest);
    }

    let mut seen = HashSet::new();
    let mut serials = Vec::new();
    for part in trimmed.split(',').map(str::trim).filter(|p| !p.is_empty()) {
        let serial = parse_one(part)?;
        if seen.insert(serial) {
            serials.push(serial);
        }
    }

    if serials.is_empty() {
        return Err(SerialError::Empty);
    }
    Ok(SerialSelector::Explicit(serials))
}

fn parse_one(part: &str) -> Result<i64, SerialError> {
    if !part.bytes().all(|b| b.is_ascii_digit()) {
        return Err(SerialError::Invalid(part.to_string()));
    }
    match part.parse::<i64>() {
        Ok(serial) if serial > 0 => Ok(serial),
        _ => Err(SerialError::Invalid(part.to_string())),
    }
}

impl FromStr for SerialSelector {
    type Err = SerialError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        parse_serials(s)
    }
}
