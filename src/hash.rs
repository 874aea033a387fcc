//! This module contains the hash capability used to derive storage slots.
//!
//! Slot derivation for dynamic arrays, mappings and the fixed proxy slots all
//! go through a 256-bit one-way function. On the EVM this is always
//! `keccak256`, but the library treats it as an injected [`SlotHasher`] so that
//! tests can substitute a transparent stub and reason about derived slots by
//! hand.

use std::{fmt::Debug, sync::Arc};

use ethnum::U256;
use sha3::{Digest, Keccak256};

/// A dynamically dispatched [`SlotHasher`] instance.
///
/// It is shared rather than owned so that one hasher can back any number of
/// calculators and proxy models across threads.
pub type DynHasher = Arc<dyn SlotHasher>;

/// The interface to a collision-resistant 256-bit hash function over arbitrary
/// byte strings.
///
/// Implementations must be deterministic: the same input must always produce
/// the same output, as layouts are compared across separate runs.
pub trait SlotHasher
where
    Self: Debug + Send + Sync,
{
    /// Hashes `data`, interpreting the 32-byte digest as a big-endian word.
    #[must_use]
    fn hash(&self, data: &[u8]) -> U256;
}

/// The `keccak256` hash function used by the EVM's `SHA3` opcode.
#[derive(Copy, Clone, Debug, Default, Eq, PartialEq)]
pub struct KeccakHasher;

impl KeccakHasher {
    /// Wraps `self` into an [`Arc`].
    #[must_use]
    pub fn in_arc(self) -> DynHasher {
        Arc::new(self)
    }
}

impl SlotHasher for KeccakHasher {
    fn hash(&self, data: &[u8]) -> U256 {
        let mut digest = [0u8; 32];
        digest.copy_from_slice(&Keccak256::digest(data));
        U256::from_be_bytes(digest)
    }
}

/// Gets the hasher used on the EVM.
#[must_use]
pub fn keccak() -> DynHasher {
    KeccakHasher.in_arc()
}

#[cfg(test)]
mod test {
    use ethnum::U256;

    use crate::hash::{KeccakHasher, SlotHasher};

    #[test]
    fn hashes_the_empty_string() -> anyhow::Result<()> {
        let expected = U256::from_str_hex(
            "0xc5d2460186f7233c927e7db2dcc703c0e500b653ca82273b7bfad8045d85a470",
        )?;
        assert_eq!(KeccakHasher.hash(&[]), expected);

        Ok(())
    }

    #[test]
    fn hashes_the_zero_word() -> anyhow::Result<()> {
        let expected = U256::from_str_hex(
            "0x290decd9548b62a8d60345a988386fc84ba6bc95484008f6362f93160ef3e563",
        )?;
        assert_eq!(KeccakHasher.hash(&[0u8; 32]), expected);

        Ok(())
    }
}
