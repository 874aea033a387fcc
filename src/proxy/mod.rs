//! This module contains a model of the storage of an EIP-1967 proxy.
//!
//! A proxy keeps the address of its logic (and optionally its admin and
//! beacon) at fixed slots derived from well-known labels. Those slots are
//! pseudo-random and far from the low slots used by sequential layouts, so the
//! implementation's own state variables never collide with them.

pub mod initializer;

use std::{
    collections::BTreeMap,
    fmt::{Display, Formatter},
};

use ethnum::U256;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

pub use initializer::{Initializer, InitializerState};

use crate::{
    constant::{EIP1967_ADMIN_LABEL, EIP1967_BEACON_LABEL, EIP1967_IMPLEMENTATION_LABEL},
    error::proxy::{Error, Result},
    layout::StorageLayout,
    slot::SlotCalculator,
    utility::{Address, U256Wrapper},
};

/// The fixed slots that a proxy reserves.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, Ord, PartialEq, PartialOrd, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FixedSlot {
    /// The slot holding the address of the logic contract.
    Implementation,

    /// The slot holding the address allowed to upgrade the proxy.
    Admin,

    /// The slot holding the address of the beacon that supplies the logic.
    Beacon,
}

impl FixedSlot {
    /// Gets the label from which the slot is derived.
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            Self::Implementation => EIP1967_IMPLEMENTATION_LABEL,
            Self::Admin => EIP1967_ADMIN_LABEL,
            Self::Beacon => EIP1967_BEACON_LABEL,
        }
    }

    /// Gets every fixed slot.
    #[must_use]
    pub fn all() -> [Self; 3] {
        [Self::Implementation, Self::Admin, Self::Beacon]
    }
}

impl Display for FixedSlot {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.label())
    }
}

/// A leaf of an implementation's layout that lands on one of the proxy's fixed
/// slots.
#[derive(Clone, Debug, Deserialize, Eq, PartialEq, Serialize)]
pub struct SlotCollision {
    /// The path of the colliding leaf.
    pub path: String,

    /// The fixed slot that the leaf overlaps.
    pub slot: U256Wrapper,

    /// Which of the proxy's slots it is.
    pub fixed: FixedSlot,
}

/// The storage of a single proxy contract.
///
/// The fixed slots are computed once on construction and never change. Values
/// live in a sparse map of storage cells, where an absent cell reads as zero,
/// exactly as on chain. The initializer guard of the implementation running
/// behind the proxy is tracked alongside.
///
/// The model holds no interior mutability, so sharing it between threads is a
/// matter of wrapping it in the usual `Arc<Mutex<_>>`.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct ProxyStorage {
    implementation_slot: U256,
    admin_slot:          U256,
    beacon_slot:         U256,
    cells:               BTreeMap<U256, U256>,
    initializer:         Initializer,
}

impl ProxyStorage {
    /// Creates the storage of a freshly-deployed proxy, deriving its fixed
    /// slots with keccak256.
    #[must_use]
    pub fn new() -> Self {
        Self::with_calculator(&SlotCalculator::default())
    }

    /// Creates the storage of a freshly-deployed proxy, deriving its fixed
    /// slots with the hasher of `calculator`.
    #[must_use]
    pub fn with_calculator(calculator: &SlotCalculator) -> Self {
        let implementation_slot = calculator.eip1967_slot(EIP1967_IMPLEMENTATION_LABEL);
        let admin_slot = calculator.eip1967_slot(EIP1967_ADMIN_LABEL);
        let beacon_slot = calculator.eip1967_slot(EIP1967_BEACON_LABEL);
        Self {
            implementation_slot,
            admin_slot,
            beacon_slot,
            cells: BTreeMap::new(),
            initializer: Initializer::new(),
        }
    }

    /// Gets the slot holding the implementation address.
    #[must_use]
    pub fn implementation_slot(&self) -> U256 {
        self.implementation_slot
    }

    /// Gets the slot holding the admin address.
    #[must_use]
    pub fn admin_slot(&self) -> U256 {
        self.admin_slot
    }

    /// Gets the slot holding the beacon address.
    #[must_use]
    pub fn beacon_slot(&self) -> U256 {
        self.beacon_slot
    }

    /// Gets the slot reserved for `fixed`.
    #[must_use]
    pub fn fixed_slot(&self, fixed: FixedSlot) -> U256 {
        match fixed {
            FixedSlot::Implementation => self.implementation_slot,
            FixedSlot::Admin => self.admin_slot,
            FixedSlot::Beacon => self.beacon_slot,
        }
    }

    /// Reads the word in `slot`, which is zero if it was never written.
    #[must_use]
    pub fn load(&self, slot: impl Into<U256Wrapper>) -> U256 {
        let slot = slot.into().0;
        self.cells.get(&slot).copied().unwrap_or(U256::ZERO)
    }

    /// Writes `value` to `slot`, returning the word that was there before.
    pub fn store(&mut self, slot: impl Into<U256Wrapper>, value: impl Into<U256Wrapper>) -> U256 {
        let slot = slot.into().0;
        let value = value.into().0;
        let previous = if value == U256::ZERO {
            self.cells.remove(&slot)
        } else {
            self.cells.insert(slot, value)
        };

        previous.unwrap_or(U256::ZERO)
    }

    /// Iterates over the slots holding a non-zero word.
    pub fn occupied_slots(&self) -> impl Iterator<Item = (U256, U256)> + '_ {
        self.cells.iter().map(|(slot, value)| (*slot, *value))
    }

    /// Gets the current implementation, if one has been set.
    #[must_use]
    pub fn implementation(&self) -> Option<Address> {
        self.address_at(self.implementation_slot)
    }

    /// Sets the implementation that the proxy delegates to.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidImplementation`] if `implementation` is the zero
    /// address.
    pub fn set_implementation(&mut self, implementation: Address) -> Result<()> {
        self.upgrade_to(implementation).map(|_| ())
    }

    /// Points the proxy at a new `implementation`, returning the one it was
    /// using before.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidImplementation`] if `implementation` is the zero
    /// address.
    pub fn upgrade_to(&mut self, implementation: Address) -> Result<Option<Address>> {
        if implementation.is_zero() {
            return Err(Error::InvalidImplementation);
        }

        let previous = self.implementation();
        self.store(self.implementation_slot, implementation.to_word());
        debug!(%implementation, "upgraded proxy implementation");

        Ok(previous)
    }

    /// Gets the current admin, if one has been set.
    #[must_use]
    pub fn admin(&self) -> Option<Address> {
        self.address_at(self.admin_slot)
    }

    /// Changes the admin of the proxy.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidAdmin`] if `admin` is the zero address.
    pub fn set_admin(&mut self, admin: Address) -> Result<()> {
        if admin.is_zero() {
            return Err(Error::InvalidAdmin);
        }

        self.store(self.admin_slot, admin.to_word());
        debug!(%admin, "changed proxy admin");

        Ok(())
    }

    /// Gets the current beacon, if one has been set.
    #[must_use]
    pub fn beacon(&self) -> Option<Address> {
        self.address_at(self.beacon_slot)
    }

    /// Points the proxy at a new `beacon`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidBeacon`] if `beacon` is the zero address.
    pub fn set_beacon(&mut self, beacon: Address) -> Result<()> {
        if beacon.is_zero() {
            return Err(Error::InvalidBeacon);
        }

        self.store(self.beacon_slot, beacon.to_word());
        debug!(%beacon, "upgraded proxy beacon");

        Ok(())
    }

    /// Gets the initializer guard of the implementation behind the proxy.
    #[must_use]
    pub fn initializer(&self) -> &Initializer {
        &self.initializer
    }

    /// Gets the version that the implementation has been initialized to.
    #[must_use]
    pub fn initialized(&self) -> u64 {
        self.initializer.version()
    }

    /// Checks whether an initializer is currently running.
    #[must_use]
    pub fn initializing(&self) -> bool {
        self.initializer.is_initializing()
    }

    /// See [`Initializer::begin_initialize`].
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the contract cannot be initialized from its current
    /// state.
    pub fn begin_initialize(&mut self) -> Result<()> {
        self.initializer.begin_initialize()
    }

    /// See [`Initializer::begin_nested_initialize`].
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if no initialization to `version` is running.
    pub fn begin_nested_initialize(&mut self, version: u64) -> Result<()> {
        self.initializer.begin_nested_initialize(version)
    }

    /// See [`Initializer::begin_reinitialize`].
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the contract cannot be re-initialized to `version`.
    pub fn begin_reinitialize(&mut self, version: u64) -> Result<()> {
        self.initializer.begin_reinitialize(version)
    }

    /// See [`Initializer::finish_initialize`].
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if no initialization is running.
    pub fn finish_initialize(&mut self) -> Result<InitializerState> {
        self.initializer.finish_initialize()
    }

    /// See [`Initializer::disable_initializers`].
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if the initializers cannot be disabled.
    pub fn disable_initializers(&mut self, deployment_context: bool) -> Result<()> {
        self.initializer.disable_initializers(deployment_context)
    }

    /// Finds every leaf of `layout` that would overwrite one of the proxy's
    /// fixed slots if the implementation ran against this storage.
    ///
    /// Leaves spanning several slots collide if any slot they span is fixed.
    #[must_use]
    pub fn check_layout(&self, layout: &StorageLayout) -> Vec<SlotCollision> {
        let mut collisions = Vec::new();
        for assignment in layout {
            for fixed in FixedSlot::all() {
                let slot = self.fixed_slot(fixed);
                if assignment.covers(slot) {
                    warn!(path = %assignment.path, %fixed, "layout collides with a proxy slot");
                    collisions.push(SlotCollision {
                        path: assignment.path.clone(),
                        slot: slot.into(),
                        fixed,
                    });
                }
            }
        }

        collisions
    }

    fn address_at(&self, slot: U256) -> Option<Address> {
        let address = Address::from_word(self.load(slot));
        (!address.is_zero()).then_some(address)
    }
}

impl Default for ProxyStorage {
    fn default() -> Self {
        Self::new()
    }
}
