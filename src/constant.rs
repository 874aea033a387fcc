//! This module contains constants that are needed throughout the codebase.

/// The width of word on the EVM in bits.
pub const WORD_SIZE_BITS: usize = 256;

/// The width of a byte on the EVM (and most other places) in bits.
pub const BYTE_SIZE_BITS: usize = 8;

/// The width of a word on the EVM in bytes, and hence the width of a single
/// storage slot.
pub const WORD_SIZE_BYTES: usize = WORD_SIZE_BITS / BYTE_SIZE_BITS;

/// The byte-width of a bool type.
pub const BOOL_WIDTH_BYTES: usize = 1;

/// The byte-width of an address type.
pub const ADDRESS_WIDTH_BYTES: usize = 20;

/// The byte-width of a function type, consisting of an address followed by a
/// four-byte selector.
pub const FUNCTION_WIDTH_BYTES: usize = ADDRESS_WIDTH_BYTES + 4;

/// The pre-image of the slot holding the implementation address of an
/// [EIP-1967](https://eips.ethereum.org/EIPS/eip-1967) proxy.
pub const EIP1967_IMPLEMENTATION_LABEL: &str = "eip1967.proxy.implementation";

/// The pre-image of the slot holding the admin address of an EIP-1967 proxy.
pub const EIP1967_ADMIN_LABEL: &str = "eip1967.proxy.admin";

/// The pre-image of the slot holding the beacon address of an EIP-1967 proxy.
pub const EIP1967_BEACON_LABEL: &str = "eip1967.proxy.beacon";

/// The published value of the EIP-1967 implementation slot.
pub const EIP1967_IMPLEMENTATION_SLOT_HEX: &str =
    "0x360894a13ba1a3210667c828492db98dca3e2076cc3735a920a3ca505d382bbc";

/// The published value of the EIP-1967 admin slot.
pub const EIP1967_ADMIN_SLOT_HEX: &str =
    "0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103";

/// The published value of the EIP-1967 beacon slot.
pub const EIP1967_BEACON_SLOT_HEX: &str =
    "0xa3f0ad74e5423aebfd80d3ef4346578335a9a72aeaee59ff6cb3582b35133d50";

/// The initializer version that a plain `initializer` moves a contract to.
pub const INITIAL_VERSION: u64 = 1;

/// The default value for whether the planner expands fixed-size arrays into
/// one leaf per element.
pub const DEFAULT_EXPAND_FIXED_ARRAYS: bool = true;

/// The default number of slots above which a fixed-size array is kept as a
/// single leaf even when arrays are expanded.
pub const DEFAULT_EXPANSION_SLOT_LIMIT: usize = 1024;

/// The characters that separate the components of a leaf's path, and that
/// hence cannot appear in a field name.
pub const PATH_SEPARATORS: [char; 3] = ['.', '[', ']'];
