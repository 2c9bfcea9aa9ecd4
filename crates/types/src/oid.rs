//! Object identifiers for the content-addressed store.

use std::{fmt, str::FromStr};

/// Size of an object identifier in bytes.
pub const OID_SIZE: usize = 32;

/// A fixed-width, opaque object identifier.
///
/// Identifiers support equality, hashing, and a printable hex encoding.
/// They carry no ordering: block order is established by discovery, not by
/// comparing identifiers.
#[derive(Clone, Copy, PartialEq, Eq, Hash)]
pub struct Oid([u8; OID_SIZE]);

impl Oid {
    /// Create an identifier from raw bytes.
    pub const fn new(bytes: [u8; OID_SIZE]) -> Self {
        Self(bytes)
    }

    /// Borrow the raw bytes.
    pub const fn as_bytes(&self) -> &[u8; OID_SIZE] {
        &self.0
    }

    /// Create an identifier from a byte slice.
    ///
    /// # Errors
    ///
    /// Returns [`OidError::InvalidLength`] if the slice is not exactly
    /// [`OID_SIZE`] bytes long.
    pub fn from_slice(bytes: &[u8]) -> Result<Self, OidError> {
        let bytes: [u8; OID_SIZE] =
            bytes.try_into().map_err(|_| OidError::InvalidLength(bytes.len()))?;
        Ok(Self(bytes))
    }
}

impl fmt::Display for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&hex::encode(self.0))
    }
}

impl fmt::Debug for Oid {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Oid({self})")
    }
}

impl FromStr for Oid {
    type Err = OidError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut bytes = [0u8; OID_SIZE];
        hex::decode_to_slice(s, &mut bytes)?;
        Ok(Self(bytes))
    }
}

impl From<[u8; OID_SIZE]> for Oid {
    fn from(bytes: [u8; OID_SIZE]) -> Self {
        Self(bytes)
    }
}

/// Error parsing an object identifier.
#[derive(Debug, thiserror::Error)]
pub enum OidError {
    /// The input was not exactly [`OID_SIZE`] bytes.
    #[error("invalid identifier length: expected {OID_SIZE} bytes, got {0}")]
    InvalidLength(usize),

    /// The input was not valid hex.
    #[error("invalid identifier encoding: {0}")]
    InvalidHex(#[from] hex::FromHexError),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn hex_round_trip() {
        let id = Oid::new([0xab; OID_SIZE]);
        let encoded = id.to_string();
        assert_eq!(encoded.len(), OID_SIZE * 2);
        assert_eq!(encoded.parse::<Oid>().unwrap(), id);
    }

    #[test]
    fn from_slice_checks_length() {
        assert!(Oid::from_slice(&[0u8; OID_SIZE]).is_ok());
        assert!(matches!(Oid::from_slice(&[0u8; 31]), Err(OidError::InvalidLength(31))));
        assert!(matches!(Oid::from_slice(&[0u8; 33]), Err(OidError::InvalidLength(33))));
    }

    #[test]
    fn rejects_bad_hex() {
        assert!("zz".repeat(32).parse::<Oid>().is_err());
        assert!("abcd".parse::<Oid>().is_err());
    }
}
