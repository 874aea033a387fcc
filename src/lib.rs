//! This library computes where the state of a Solidity contract lives in
//! [EVM](https://ethereum.org/en/developers/docs/evm/) storage, and models the
//! storage of the upgradeable proxies that such contracts usually sit behind.
//!
//! It is intended for tooling such as storage-layout linters and upgrade-safety
//! checkers. It does not execute bytecode, and it does not parse Solidity: the
//! declarations it works on are provided by the caller.
//!
//! # How it Works
//!
//! The library is made up of four parts, each building on the ones before it.
//!
//! 1. The [`slot::SlotCalculator`] derives the slots of dynamic data (array
//!    elements, mapping values, namespaced and proxy slots) from a base slot,
//!    using an injected [`hash::SlotHasher`].
//! 2. The [`layout::Planner`] walks an ordered list of
//!    [`layout::FieldDeclaration`]s, packing value types greedily into 32-byte
//!    slots, and produces a [`StorageLayout`] with one
//!    [`layout::SlotAssignment`] per leaf.
//! 3. The [`ProxyStorage`] models the fixed EIP-1967 slots of a proxy and the
//!    run-once initializer guard of the implementation behind it.
//! 4. The [`upgrade::Validator`] compares the layouts from before and after an
//!    upgrade, and reports the leaves that would read the wrong data.
//!
//! # Basic Usage
//!
//! ```
//! use storage_layout_planner::{
//!     diff,
//!     layout::{FieldDeclaration, TypeDescriptor},
//!     plan,
//!     upgrade::DiffKind,
//! };
//!
//! let before = plan(&FieldDeclaration::ordered([
//!     ("a", TypeDescriptor::uint(256)),
//!     ("b", TypeDescriptor::uint(256)),
//! ]))
//! .unwrap();
//! let after = plan(&FieldDeclaration::ordered([
//!     ("a", TypeDescriptor::uint(256)),
//!     ("NEW", TypeDescriptor::uint(256)),
//!     ("b", TypeDescriptor::uint(256)),
//! ]))
//! .unwrap();
//!
//! let changes = diff(&before, &after);
//! assert!(!changes.is_compatible());
//! assert_eq!(changes.get("b").unwrap().kind, DiffKind::SlotShifted);
//! ```

#![warn(clippy::all, clippy::cargo, clippy::pedantic)]
#![allow(clippy::module_name_repetitions)] // Allows for better API naming

pub mod constant;
pub mod error;
pub mod hash;
pub mod layout;
pub mod proxy;
pub mod slot;
pub mod upgrade;
pub mod utility;

// Re-exports to provide the library interface.
pub use layout::{plan, StorageLayout};
pub use proxy::ProxyStorage;
pub use slot::SlotCalculator;
pub use upgrade::diff;
