//! The shipping token: an opaque bearer string.

use rand::RngCore;
use serde::{Deserialize, Serialize};

use crate::error::{CapabilityError, CapabilityResult};

/// Prefix distinguishing shipping tokens from other permission kinds.
pub const TOKEN_PREFIX: &str = "ship_";

/// Random bytes in a freshly issued token.
const TOKEN_BYTES: usize = 32;

/// Longest accepted token body after the prefix.
const MAX_BODY_LEN: usize = 128;

/// A syntactically valid shipping token.
///
/// `Debug` and `Display` show only a short hint; the full value is reachable
/// through [`ShippingToken::expose`] for storage and for handing to the owner
/// at issuance.
#[derive(Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct ShippingToken(String);

impl ShippingToken {
    /// Mint a new random token: the prefix plus 32 random bytes, hex encoded.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; TOKEN_BYTES];
        rand::thread_rng().fill_bytes(&mut bytes);
        Self(format!("{TOKEN_PREFIX}{}", hex::encode(bytes)))
    }

    /// Check the format of a presented token.
    ///
    /// The body after `ship_` must be non-empty, at most 128 characters and
    /// made of visible ASCII.
    ///
    /// # Errors
    ///
    /// Returns [`CapabilityError::InvalidTokenFormat`] otherwise.
    pub fn parse(raw: &str) -> CapabilityResult<Self> {
        let body = raw
            .strip_prefix(TOKEN_PREFIX)
            .ok_or(CapabilityError::InvalidTokenFormat)?;
        if body.is_empty()
            || body.len() > MAX_BODY_LEN
            || !body.bytes().all(|b| b.is_ascii_graphic())
        {
            return Err(CapabilityError::InvalidTokenFormat);
        }
        Ok(Self(raw.to_owned()))
    }

    /// The full token value. Treat as a secret.
    #[must_use]
    pub fn expose(&self) -> &str {
        &self.0
    }

    /// A loggable hint: the prefix plus the first four body characters.
    #[must_use]
    pub fn hint(&self) -> String {
        let end = TOKEN_PREFIX.len().saturating_add(4).min(self.0.len());
        format!("{}…", &self.0[..end])
    }
}

impl std::fmt::Debug for ShippingToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_tuple("ShippingToken").field(&self.hint()).finish()
    }
}

impl std::fmt::Display for ShippingToken {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.hint())
    }
}

impl TryFrom<String> for ShippingToken {
    type Error = CapabilityError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::parse(&value)
    }
}

impl From<ShippingToken> for String {
    fn from(token: ShippingToken) -> Self {
        token.0
    }
}
