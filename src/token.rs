//! Token - Opaque Counter Identifiers
//!
//! TigerStyle: 128 bits from the OS CSPRNG, rendered as lowercase hex.

use std::fmt::{self, Write as _};

use rand::rngs::OsRng;
use rand::RngCore;

use crate::constants::{TOKEN_ENTROPY_BYTES, TOKEN_HEX_LENGTH};

/// An opaque, globally unique counter identifier.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Token(String);

impl Token {
    /// Generate a fresh token.
    ///
    /// # Errors
    /// Returns error if the operating system RNG is unavailable.
    pub fn generate() -> Result<Self, TokenError> {
        let mut bytes = [0u8; TOKEN_ENTROPY_BYTES];
        OsRng
            .try_fill_bytes(&mut bytes)
            .map_err(|e| TokenError::Entropy(e.to_string()))?;

        let mut hex = String::with_capacity(TOKEN_HEX_LENGTH);
        for byte in bytes {
            // Writing to a String cannot fail
            let _ = write!(hex, "{byte:02x}");
        }

        // Postcondition
        assert_eq!(hex.len(), TOKEN_HEX_LENGTH, "token must be fixed length");

        Ok(Self(hex))
    }

    /// Whether `s` has the shape of a generated token.
    ///
    /// Accepts mixed case so that clients echoing a token back in another
    /// case reach the store and get a clean `InvalidToken`.
    #[must_use]
    pub fn is_well_formed(s: &str) -> bool {
        s.len() == TOKEN_HEX_LENGTH && s.bytes().all(|b| b.is_ascii_alphanumeric())
    }

    /// Borrow the token string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Consume into the token string.
    #[must_use]
    pub fn into_string(self) -> String {
        self.0
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl AsRef<str> for Token {
    fn as_ref(&self) -> &str {
        &self.0
    }
}

/// Token generation errors
#[derive(Debug, thiserror::Error)]
pub enum TokenError {
    /// OS random source failed
    #[error("entropy source unavailable: {0}")]
    Entropy(String),
}
