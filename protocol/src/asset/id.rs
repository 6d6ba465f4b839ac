//! Account and asset identifiers.
//!
//! Both serialize as plain strings so that JSON clients can write
//! `"asset": "native"` or `"asset": "0xa0b8…"` without a nested object.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::config::NATIVE_ASSET_SYMBOL;

// ---------------------------------------------------------------------------
// AccountId
// ---------------------------------------------------------------------------

/// An opaque account identifier (wallet address, user handle, whatever the
/// transport uses). Compared byte-for-byte; no normalization.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct AccountId(String);

impl AccountId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl fmt::Debug for AccountId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "AccountId({})", self.0)
    }
}

impl From<&str> for AccountId {
    fn from(s: &str) -> Self {
        Self(s.to_string())
    }
}

impl From<String> for AccountId {
    fn from(s: String) -> Self {
        Self(s)
    }
}

// ---------------------------------------------------------------------------
// AssetId
// ---------------------------------------------------------------------------

/// The fungible asset a transfer moves.
///
/// `Native` is the sentinel for the chain-native coin. Everything else is a
/// token, named by its contract address (or any other stable identifier the
/// mover understands).
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "String", from = "String")]
pub enum AssetId {
    /// The chain-native asset.
    Native,
    /// A token identified by address.
    Token(String),
}

impl AssetId {
    pub fn token(address: impl Into<String>) -> Self {
        Self::Token(address.into())
    }

    pub fn is_native(&self) -> bool {
        matches!(self, AssetId::Native)
    }

    /// Canonical string form: `"native"` or the token address.
    pub fn as_str(&self) -> &str {
        match self {
            AssetId::Native => NATIVE_ASSET_SYMBOL,
            AssetId::Token(addr) => addr,
        }
    }
}

impl fmt::Display for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl fmt::Debug for AssetId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AssetId::Native => write!(f, "Native"),
            AssetId::Token(addr) => write!(f, "Token({})", addr),
        }
    }
}

impl From<String> for AssetId {
    fn from(s: String) -> Self {
        if s.eq_ignore_ascii_case(NATIVE_ASSET_SYMBOL) {
            AssetId::Native
        } else {
            AssetId::Token(s)
        }
    }
}

impl From<AssetId> for String {
    fn from(asset: AssetId) -> Self {
        match asset {
            AssetId::Native => NATIVE_ASSET_SYMBOL.to_string(),
            AssetId::Token(addr) => addr,
        }
    }
}

impl FromStr for AssetId {
    type Err = std::convert::Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(AssetId::from(s.to_string()))
    }
}
