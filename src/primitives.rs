//! Fixed-size hex primitives and price units shared by the relay and proxy.

use crate::error::{Error, Result};
use serde::{de, Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Price units charged for a mutation or an upstream call.
pub type Cost = u128;

/// Parse a `0x`-prefixed hex string into exactly `N` bytes.
fn parse_fixed_hex<const N: usize>(value: &str, what: &str) -> Result<[u8; N]> {
    let hex_part = value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
        .ok_or_else(|| Error::Decode(format!("{what} must start with '0x', got: {value}")))?;

    if hex_part.len() != N * 2 {
        return Err(Error::Decode(format!(
            "invalid {what} length: expected {} hex characters, got {}",
            N * 2,
            hex_part.len()
        )));
    }

    let mut bytes = [0u8; N];
    hex::decode_to_slice(hex_part, &mut bytes)
        .map_err(|e| Error::Decode(format!("invalid {what} {value}: {e}")))?;
    Ok(bytes)
}

macro_rules! hex_newtype {
    ($(#[$meta:meta])* $name:ident, $len:expr, $what:expr) => {
        $(#[$meta])*
        #[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(pub [u8; $len]);

        impl $name {
            /// Length in bytes.
            pub const LEN: usize = $len;

            /// Raw bytes.
            #[must_use]
            pub const fn as_bytes(&self) -> &[u8; $len] {
                &self.0
            }
        }

        impl From<[u8; $len]> for $name {
            fn from(bytes: [u8; $len]) -> Self {
                Self(bytes)
            }
        }

        impl FromStr for $name {
            type Err = Error;

            fn from_str(s: &str) -> Result<Self> {
                parse_fixed_hex::<$len>(s, $what).map(Self)
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "0x{}", hex::encode(self.0))
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({self})", stringify!($name))
            }
        }

        impl Serialize for $name {
            fn serialize<S: Serializer>(&self, serializer: S) -> std::result::Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> Deserialize<'de> for $name {
            fn deserialize<D: Deserializer<'de>>(deserializer: D) -> std::result::Result<Self, D::Error> {
                let s = String::deserialize(deserializer)?;
                s.parse().map_err(de::Error::custom)
            }
        }
    };
}

hex_newtype!(
    /// A 20-byte account address.
    Address,
    20,
    "address"
);

hex_newtype!(
    /// A 32-byte hash (voucher hash, transaction hash, block hash, channel id).
    Hash,
    32,
    "hash"
);

hex_newtype!(
    /// A 65-byte recoverable ECDSA signature laid out as `r || s || v`.
    Signature,
    65,
    "signature"
);

/// Serde helpers for [`Cost`] values written either as integers or decimal strings.
pub mod cost_serde {
    use super::Cost;
    use serde::{de, Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Raw {
        Int(u64),
        Text(String),
    }

    /// Parse a decimal cost.
    pub(crate) fn parse(text: &str) -> Result<Cost, String> {
        text.trim()
            .parse::<Cost>()
            .map_err(|e| format!("invalid cost '{text}': {e}"))
    }

    /// Deserialize a cost from an integer or a decimal string.
    ///
    /// # Errors
    ///
    /// Fails when the value is negative, fractional or not a number.
    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Cost, D::Error> {
        match Raw::deserialize(deserializer)? {
            Raw::Int(n) => Ok(Cost::from(n)),
            Raw::Text(s) => parse(&s).map_err(de::Error::custom),
        }
    }

    /// Serialize a cost as a decimal string.
    ///
    /// # Errors
    ///
    /// Propagates serializer errors.
    #[allow(clippy::trivially_copy_pass_by_ref)]
    pub fn serialize<S: Serializer>(cost: &Cost, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.collect_str(cost)
    }
}
