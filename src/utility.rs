//! Utility functions useful throughout the codebase.

use std::{
    cmp::Ordering,
    fmt::{Debug, Display, Formatter},
    str::FromStr,
};

use ethnum::U256;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::constant::{ADDRESS_WIDTH_BYTES, WORD_SIZE_BYTES};

/// A type alias to make [`U256Wrapper`] easier to type internally.
pub type U256W = U256Wrapper;

/// The `U256Wrapper` is responsible for allowing the serialisation of the
/// [`U256`] type to JSON as a `0x`-prefixed, zero-padded hex string.
///
/// It provides reasonable conversions from a number of common types used within
/// the library.
#[derive(Clone, Copy, Default, Eq, Hash, PartialEq)]
#[repr(transparent)]
pub struct U256Wrapper(pub U256);

impl U256Wrapper {
    /// Gets the big-endian byte representation of the wrapped word, as it is
    /// laid out in EVM memory and fed to the hash function.
    #[must_use]
    pub fn to_be_bytes(self) -> [u8; WORD_SIZE_BYTES] {
        self.0.to_be_bytes()
    }

    /// Constructs a word from its big-endian byte representation.
    #[must_use]
    pub fn from_be_bytes(bytes: [u8; WORD_SIZE_BYTES]) -> Self {
        Self(U256::from_be_bytes(bytes))
    }

    /// Renders the word as a `0x`-prefixed hex string of 64 digits.
    #[must_use]
    pub fn to_hex(self) -> String {
        let mut value = String::from("0x");
        value.push_str(&hex::encode(self.to_be_bytes()));
        value
    }
}

impl Debug for U256Wrapper {
    /// The wrapper has absolutely no semantic meaning, so we print the
    /// underlying value for the debug representation.
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Small slot indices read best in decimal, while hashed ones only make sense
/// in hex.
impl Display for U256Wrapper {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        if self.0 <= U256::from(u64::MAX) {
            write!(f, "{}", self.0)
        } else {
            write!(f, "{}", self.to_hex())
        }
    }
}

impl PartialOrd for U256Wrapper {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for U256Wrapper {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.cmp(&other.0)
    }
}

impl From<U256> for U256Wrapper {
    fn from(value: U256) -> Self {
        Self(value)
    }
}

impl From<U256Wrapper> for U256 {
    fn from(U256Wrapper(value): U256Wrapper) -> Self {
        value
    }
}

impl From<usize> for U256Wrapper {
    fn from(value: usize) -> Self {
        Self(U256::from(value as u128))
    }
}

impl From<u64> for U256Wrapper {
    fn from(value: u64) -> Self {
        Self(U256::from(value))
    }
}

impl From<u32> for U256Wrapper {
    fn from(value: u32) -> Self {
        Self(U256::from(value))
    }
}

/// Parses either a `0x`-prefixed hex string or a plain decimal string.
impl FromStr for U256Wrapper {
    type Err = std::num::ParseIntError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let value = if s.starts_with("0x") {
            U256::from_str_hex(s)?
        } else {
            U256::from_str_radix(s, 10)?
        };
        Ok(Self(value))
    }
}

impl Serialize for U256Wrapper {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for U256Wrapper {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}

/// A 20-byte account address.
///
/// Addresses are stored right-aligned in a word, and serialize as `0x`-prefixed
/// hex.
#[derive(Clone, Copy, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
pub struct Address(pub [u8; ADDRESS_WIDTH_BYTES]);

impl Address {
    /// The zero address.
    pub const ZERO: Self = Self([0; ADDRESS_WIDTH_BYTES]);

    /// Checks whether this is the zero address.
    #[must_use]
    pub fn is_zero(&self) -> bool {
        self == &Self::ZERO
    }

    /// Left-pads the address into a full word, as the EVM stores it.
    #[must_use]
    pub fn to_word(self) -> U256 {
        let mut bytes = [0u8; WORD_SIZE_BYTES];
        bytes[WORD_SIZE_BYTES - ADDRESS_WIDTH_BYTES..].copy_from_slice(&self.0);
        U256::from_be_bytes(bytes)
    }

    /// Takes the low-order 20 bytes of `word` as an address, discarding the
    /// rest.
    #[must_use]
    pub fn from_word(word: U256) -> Self {
        let bytes = word.to_be_bytes();
        let mut address = [0u8; ADDRESS_WIDTH_BYTES];
        address.copy_from_slice(&bytes[WORD_SIZE_BYTES - ADDRESS_WIDTH_BYTES..]);
        Self(address)
    }
}

impl Debug for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{self}")
    }
}

impl Display for Address {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "0x{}", hex::encode(self.0))
    }
}

impl From<[u8; ADDRESS_WIDTH_BYTES]> for Address {
    fn from(value: [u8; ADDRESS_WIDTH_BYTES]) -> Self {
        Self(value)
    }
}

/// Parses a hex-encoded address, with or without the `0x` prefix.
impl FromStr for Address {
    type Err = hex::FromHexError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let digits = s.strip_prefix("0x").unwrap_or(s);
        let mut address = [0u8; ADDRESS_WIDTH_BYTES];
        hex::decode_to_slice(digits, &mut address)?;
        Ok(Self(address))
    }
}

impl Serialize for Address {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_string())
    }
}

impl<'de> Deserialize<'de> for Address {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        let s: String = Deserialize::deserialize(deserializer)?;
        s.parse().map_err(serde::de::Error::custom)
    }
}
