//! This module contains the pure slot arithmetic that determines where a piece
//! of Solidity state lives in storage.
//!
//! Everything here is total. Slot arithmetic wraps modulo `2^256` exactly as it
//! does on the EVM, and the only non-trivial ingredient is the injected
//! [`SlotHasher`].

use ethnum::{I256, U256};

use crate::{
    constant::WORD_SIZE_BYTES,
    hash::{keccak, DynHasher, SlotHasher},
    utility::{Address, U256W},
};

/// The kind of array whose element is being located.
#[derive(Copy, Clone, Debug, Eq, Hash, PartialEq)]
pub enum ArrayKind {
    /// A fixed-size array, whose elements start directly at its base slot.
    Fixed,

    /// A dynamically-sized array, whose base slot holds the length and whose
    /// elements start at `hash(base)`.
    Dynamic,
}

/// A key used to index into a mapping, carrying enough type information to be
/// encoded the way Solidity encodes it before hashing.
#[derive(Clone, Debug, Eq, Hash, PartialEq)]
pub enum MappingKey {
    /// Any unsigned integer type, left-padded to a word.
    Uint(U256),

    /// Any signed integer type, sign-extended to a word.
    Int(I256),

    /// An address, left-padded to a word.
    Address(Address),

    /// A boolean, encoded as the word `0` or `1`.
    Bool(bool),

    /// A `bytesN` value. These are left-aligned in the word and right-padded
    /// with zeroes.
    FixedBytes([u8; WORD_SIZE_BYTES]),

    /// A `bytes` or `string` value, hashed as-is without any padding.
    Bytes(Vec<u8>),
}

impl MappingKey {
    /// Creates a `bytesN` key from `bytes`.
    ///
    /// At most [`WORD_SIZE_BYTES`] bytes are taken, as no `bytesN` type is
    /// wider than a word.
    #[must_use]
    pub fn fixed_bytes(bytes: &[u8]) -> Self {
        let mut word = [0u8; WORD_SIZE_BYTES];
        let len = bytes.len().min(WORD_SIZE_BYTES);
        word[..len].copy_from_slice(&bytes[..len]);
        Self::FixedBytes(word)
    }

    /// Creates a `string` key from `value`.
    #[must_use]
    pub fn string(value: impl Into<String>) -> Self {
        Self::Bytes(value.into().into_bytes())
    }

    /// Encodes the key as the bytes that precede the slot in the hash
    /// pre-image.
    #[must_use]
    pub fn encode(&self) -> Vec<u8> {
        match self {
            Self::Uint(value) => value.to_be_bytes().to_vec(),
            Self::Int(value) => value.to_be_bytes().to_vec(),
            Self::Address(address) => address.to_word().to_be_bytes().to_vec(),
            Self::Bool(value) => U256::from(u8::from(*value)).to_be_bytes().to_vec(),
            Self::FixedBytes(word) => word.to_vec(),
            Self::Bytes(bytes) => bytes.clone(),
        }
    }
}

impl From<U256> for MappingKey {
    fn from(value: U256) -> Self {
        Self::Uint(value)
    }
}

impl From<u64> for MappingKey {
    fn from(value: u64) -> Self {
        Self::Uint(U256::from(value))
    }
}

impl From<Address> for MappingKey {
    fn from(value: Address) -> Self {
        Self::Address(value)
    }
}

impl From<bool> for MappingKey {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// Computes storage slots for the different kinds of Solidity state variable.
///
/// The calculator is cheap to clone, and holds nothing but the hasher that it
/// uses to derive slots for dynamic data.
#[derive(Clone, Debug)]
pub struct SlotCalculator {
    hasher: DynHasher,
}

impl SlotCalculator {
    /// Creates a calculator that derives slots using `hasher`.
    #[must_use]
    pub fn new(hasher: DynHasher) -> Self {
        Self { hasher }
    }

    /// Gets the hasher used by this calculator.
    #[must_use]
    pub fn hasher(&self) -> &DynHasher {
        &self.hasher
    }

    /// Gets the slot of the top-level declaration at `declaration_index`,
    /// without accounting for any packing.
    #[must_use]
    pub fn base_slot_of(declaration_index: impl Into<U256W>) -> U256 {
        declaration_index.into().0
    }

    /// Gets the slot holding element `index` of the array at `base`.
    ///
    /// Every element is treated as occupying at least one whole slot. Use
    /// [`Self::packed_array_element_position`] for fixed arrays of small value
    /// types.
    #[must_use]
    pub fn array_element_slot(
        &self,
        base: impl Into<U256W>,
        index: impl Into<U256W>,
        kind: ArrayKind,
    ) -> U256 {
        let base = base.into().0;
        let index = index.into().0;
        match kind {
            ArrayKind::Fixed => base.wrapping_add(index),
            ArrayKind::Dynamic => self.dynamic_array_data_slot(base).wrapping_add(index),
        }
    }

    /// Gets the slot at which the elements of the dynamic array whose length
    /// lives at `base` begin.
    #[must_use]
    pub fn dynamic_array_data_slot(&self, base: impl Into<U256W>) -> U256 {
        self.hasher.hash(&base.into().to_be_bytes())
    }

    /// Gets the slot and byte offset of element `index` in a fixed array at
    /// `base` whose elements are `element_width` bytes wide.
    ///
    /// Elements are packed `32 / element_width` to a slot and never straddle a
    /// slot boundary. Widths outside `1..=32` are clamped into that range.
    #[must_use]
    pub fn packed_array_element_position(
        base: impl Into<U256W>,
        element_width: usize,
        index: impl Into<U256W>,
    ) -> (U256, usize) {
        let width = element_width.clamp(1, WORD_SIZE_BYTES);
        let per_slot = U256::from((WORD_SIZE_BYTES / width) as u64);
        let index = index.into().0;

        let slot = base.into().0.wrapping_add(index / per_slot);
        let within = (index % per_slot).as_usize();

        (slot, within * width)
    }

    /// Gets the slot holding the value for `key` in the mapping at `base`.
    ///
    /// The pre-image is the encoded key followed by the base slot, in that
    /// order.
    #[must_use]
    pub fn mapping_value_slot(&self, base: impl Into<U256W>, key: &MappingKey) -> U256 {
        let mut preimage = key.encode();
        preimage.extend_from_slice(&base.into().to_be_bytes());
        self.hasher.hash(&preimage)
    }

    /// Gets the slot reached by indexing the nested mappings rooted at `base`
    /// with each of `keys` in turn.
    ///
    /// With no keys this is just `base`.
    #[must_use]
    pub fn nested_mapping_slot(&self, base: impl Into<U256W>, keys: &[MappingKey]) -> U256 {
        keys.iter()
            .fold(base.into().0, |slot, key| self.mapping_value_slot(slot, key))
    }

    /// Gets the slot of the member at `field_index` of a struct rooted at
    /// `base`.
    ///
    /// For structs stored under a mapping or dynamic array, `base` is the slot
    /// derived for that entry.
    #[must_use]
    pub fn struct_field_slot(base: impl Into<U256W>, field_index: impl Into<U256W>) -> U256 {
        base.into().0.wrapping_add(field_index.into().0)
    }

    /// Gets the slot one below the hash of `label`, as used for the fixed
    /// slots of an [EIP-1967](https://eips.ethereum.org/EIPS/eip-1967) proxy.
    #[must_use]
    pub fn eip1967_slot(&self, label: &str) -> U256 {
        self.hasher.hash(label.as_bytes()).wrapping_sub(U256::ONE)
    }

    /// Gets the root slot of the [ERC-7201](https://eips.ethereum.org/EIPS/eip-7201)
    /// namespace `namespace`.
    ///
    /// This is `hash(hash(namespace) - 1)` with the low byte cleared, leaving
    /// room for 256 consecutive slots of namespaced state.
    #[must_use]
    pub fn erc7201_slot(&self, namespace: &str) -> U256 {
        let inner = self.hasher.hash(namespace.as_bytes()).wrapping_sub(U256::ONE);
        self.hasher.hash(&inner.to_be_bytes()) & !U256::from(0xffu8)
    }
}

/// The default calculator uses `keccak256`, matching the EVM.
impl Default for SlotCalculator {
    fn default() -> Self {
        Self::new(keccak())
    }
}

#[cfg(test)]
mod test {
    use std::sync::Arc;

    use ethnum::{I256, U256};
    use rand::random;

    use crate::{
        constant::{EIP1967_IMPLEMENTATION_LABEL, EIP1967_IMPLEMENTATION_SLOT_HEX},
        hash::SlotHasher,
        slot::{ArrayKind, MappingKey, SlotCalculator},
        utility::Address,
    };

    /// A transparent hasher that sums its input bytes into the high byte of the
    /// word, and tags the low bytes with the input length.
    ///
    /// It is useless for anything but making derived slots predictable.
    #[derive(Debug)]
    struct StubHasher;

    impl SlotHasher for StubHasher {
        fn hash(&self, data: &[u8]) -> U256 {
            let sum: u64 = data.iter().map(|b| u64::from(*b)).sum();
            (U256::from(sum) << 128u32) | U256::from(data.len() as u64)
        }
    }

    fn stub() -> SlotCalculator {
        SlotCalculator::new(Arc::new(StubHasher))
    }

    #[test]
    fn base_slots_are_sequential() {
        assert_eq!(SlotCalculator::base_slot_of(0usize), U256::ZERO);
        assert_eq!(SlotCalculator::base_slot_of(7usize), U256::from(7u8));
    }

    #[test]
    fn fixed_array_elements_follow_the_base() {
        let calc = stub();
        assert_eq!(
            calc.array_element_slot(5usize, 3usize, ArrayKind::Fixed),
            U256::from(8u8)
        );
    }

    #[test]
    fn dynamic_array_elements_start_at_the_hashed_base() {
        let calc = stub();
        let data = calc.dynamic_array_data_slot(2usize);
        assert_eq!(data, (U256::from(2u8) << 128u32) | U256::from(32u8));
        assert_eq!(
            calc.array_element_slot(2usize, 4usize, ArrayKind::Dynamic),
            data + U256::from(4u8)
        );
    }

    #[test]
    fn mapping_preimage_puts_the_key_first() {
        let calc = SlotCalculator::default();
        let hasher = calc.hasher().clone();

        let key = MappingKey::from(1u64);
        let mut expected_preimage = [0u8; 64];
        expected_preimage[31] = 1;
        expected_preimage[63] = 9;

        assert_eq!(
            calc.mapping_value_slot(9usize, &key),
            hasher.hash(&expected_preimage)
        );
    }

    #[test]
    fn mapping_slot_of_zero_key_at_zero_base() -> anyhow::Result<()> {
        let calc = SlotCalculator::default();
        let expected = U256::from_str_hex(
            "0xad3228b676f7d3cd4284a5443f17f1962b36e491b30a40b2405849e597ba5fb5",
        )?;
        assert_eq!(
            calc.mapping_value_slot(0usize, &MappingKey::from(0u64)),
            expected
        );

        Ok(())
    }

    #[test]
    fn encodes_keys_like_solidity() {
        let negative = MappingKey::Int(I256::from(-1i8)).encode();
        assert_eq!(negative, vec![0xff; 32]);

        let address = MappingKey::from(Address([0x11; 20])).encode();
        assert_eq!(&address[..12], &[0u8; 12]);
        assert_eq!(&address[12..], &[0x11; 20]);

        let fixed = MappingKey::fixed_bytes(&[0xab, 0xcd]).encode();
        assert_eq!(fixed.len(), 32);
        assert_eq!(&fixed[..2], &[0xab, 0xcd]);
        assert!(fixed[2..].iter().all(|b| *b == 0));

        let string = MappingKey::string("abc").encode();
        assert_eq!(string, b"abc".to_vec());

        assert_eq!(MappingKey::from(true).encode()[31], 1);
    }

    #[test]
    fn nested_mappings_fold_over_keys() {
        let calc = SlotCalculator::default();
        let keys = [MappingKey::from(1u64), MappingKey::from(2u64)];

        let inner = calc.mapping_value_slot(3usize, &keys[0]);
        let outer = calc.mapping_value_slot(inner, &keys[1]);

        assert_eq!(calc.nested_mapping_slot(3usize, &keys), outer);
        assert_eq!(calc.nested_mapping_slot(3usize, &[]), U256::from(3u8));
    }

    #[test]
    fn struct_fields_add_linearly() {
        assert_eq!(
            SlotCalculator::struct_field_slot(10usize, 2usize),
            U256::from(12u8)
        );
        assert_eq!(SlotCalculator::struct_field_slot(U256::MAX, 1usize), U256::ZERO);
    }

    #[test]
    fn packs_small_fixed_array_elements() {
        assert_eq!(
            SlotCalculator::packed_array_element_position(4usize, 1, 33usize),
            (U256::from(5u8), 1)
        );
        assert_eq!(
            SlotCalculator::packed_array_element_position(0usize, 16, 3usize),
            (U256::ONE, 16)
        );
        // Three twelve-byte elements do not fit a slot, so the third moves on.
        assert_eq!(
            SlotCalculator::packed_array_element_position(0usize, 12, 2usize),
            (U256::ONE, 0)
        );
    }

    #[test]
    fn computes_the_published_eip1967_implementation_slot() -> anyhow::Result<()> {
        let calc = SlotCalculator::default();
        assert_eq!(
            calc.eip1967_slot(EIP1967_IMPLEMENTATION_LABEL),
            U256::from_str_hex(EIP1967_IMPLEMENTATION_SLOT_HEX)?
        );

        Ok(())
    }

    #[test]
    fn eip1967_slot_wraps_below_zero() {
        #[derive(Debug)]
        struct ZeroHasher;
        impl SlotHasher for ZeroHasher {
            fn hash(&self, _: &[u8]) -> U256 {
                U256::ZERO
            }
        }

        let calc = SlotCalculator::new(Arc::new(ZeroHasher));
        assert_eq!(calc.eip1967_slot("anything"), U256::MAX);
    }

    #[test]
    fn computes_erc7201_namespaces() -> anyhow::Result<()> {
        let calc = SlotCalculator::default();
        assert_eq!(
            calc.erc7201_slot("openzeppelin.storage.Initializable"),
            U256::from_str_hex(
                "0xf0c57e16840df040f15088dc2f81fe391c3923bec73e23a9662efc9c229c6a00"
            )?
        );
        assert_eq!(
            calc.erc7201_slot("openzeppelin.storage.Ownable"),
            U256::from_str_hex(
                "0x9016d09d72d40fdae2fd8ceac6b6234c7706214fd39c1cd1e609a0528c199300"
            )?
        );

        Ok(())
    }

    #[test]
    fn distinct_keys_map_to_distinct_slots() {
        let calc = SlotCalculator::default();
        let base = U256::from(random::<u64>());

        for _ in 0..10_000 {
            let k1: [u8; 32] = random();
            let k2: [u8; 32] = random();
            if k1 == k2 {
                continue;
            }

            let s1 = calc.mapping_value_slot(base, &MappingKey::Uint(U256::from_be_bytes(k1)));
            let s2 = calc.mapping_value_slot(base, &MappingKey::Uint(U256::from_be_bytes(k2)));
            assert_ne!(s1, s2);
        }
    }
}
