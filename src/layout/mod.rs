//! This module contains the definitions for the layout representation types,
//! and the planner that produces them.

pub mod declaration;
pub mod planner;

use std::fmt::{Display, Formatter};

use ethnum::U256;
use serde::{Deserialize, Serialize};

pub use declaration::{FieldDeclaration, TypeDescriptor};
pub use planner::{plan, Config, Planner};

use crate::{constant::WORD_SIZE_BYTES, utility::U256Wrapper};

/// The concrete storage layout planned for a set of declarations.
///
/// Each leaf of the declarations (struct members flattened, fixed-array
/// elements expanded where configured) has exactly one assignment, keyed by its
/// path. Layouts are immutable once planned.
#[derive(Clone, Debug, Default, Deserialize, Eq, PartialEq, Serialize)]
pub struct StorageLayout {
    assignments: Vec<SlotAssignment>,

    /// The number of consecutive slots from slot zero that the layout spans.
    slots_used: U256Wrapper,
}

impl StorageLayout {
    /// Constructs a layout from `assignments`, spanning `slots_used` slots.
    ///
    /// The assignments are kept in the order provided, which for planned
    /// layouts is declaration order.
    #[must_use]
    pub fn new(assignments: Vec<SlotAssignment>, slots_used: impl Into<U256Wrapper>) -> Self {
        let slots_used = slots_used.into();
        Self {
            assignments,
            slots_used,
        }
    }

    /// Gets the assignments that make up this layout, in declaration order.
    #[must_use]
    pub fn assignments(&self) -> &[SlotAssignment] {
        &self.assignments
    }

    /// Gets the assignment for the leaf at `path`, if there is one.
    #[must_use]
    pub fn get(&self, path: &str) -> Option<&SlotAssignment> {
        self.assignments.iter().find(|a| a.path == path)
    }

    /// Iterates over the paths of all leaves in the layout.
    pub fn paths(&self) -> impl Iterator<Item = &str> {
        self.assignments.iter().map(|a| a.path.as_str())
    }

    /// Gets the number of consecutive slots that the layout occupies.
    #[must_use]
    pub fn slots_used(&self) -> U256 {
        self.slots_used.0
    }

    /// Gets the number of leaves in the layout.
    #[must_use]
    pub fn len(&self) -> usize {
        self.assignments.len()
    }

    /// Checks if the layout has no leaves.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.assignments.is_empty()
    }

    /// Serializes the layout as pretty-printed JSON.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] if serialization fails.
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string_pretty(self)
    }
}

/// Additional utility functions to enable cleaner testing with the storage
/// layout.
impl StorageLayout {
    /// Checks if the layout places the leaf at `path` at exactly the specified
    /// `slot`, `offset` and `width`.
    #[must_use]
    pub fn has_assignment(
        &self,
        path: &str,
        slot: impl Into<U256Wrapper>,
        offset: usize,
        width: usize,
    ) -> bool {
        let slot = slot.into();
        self.get(path)
            .map_or(false, |a| a.base_slot == slot && a.byte_offset == offset && a.width_bytes == width)
    }

    /// Checks that no leaf in the layout lives in the slot `index`.
    #[must_use]
    pub fn has_no_assignment_at(&self, index: impl Into<U256Wrapper>) -> bool {
        let index = index.into();
        !self.assignments.iter().any(|a| a.base_slot == index)
    }
}

impl<'a> IntoIterator for &'a StorageLayout {
    type IntoIter = std::slice::Iter<'a, SlotAssignment>;
    type Item = &'a SlotAssignment;

    fn into_iter(self) -> Self::IntoIter {
        self.assignments.iter()
    }
}

/// Renders the layout as a table with one leaf per line.
impl Display for StorageLayout {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "{:<32} {:>8} {:>6} {:>5}", "path", "slot", "offset", "width")?;
        for a in &self.assignments {
            writeln!(
                f,
                "{:<32} {:>8} {:>6} {:>5}",
                a.path,
                a.base_slot.to_string(),
                a.byte_offset,
                a.width_bytes
            )?;
        }

        Ok(())
    }
}

/// The position of a single leaf of the declarations in storage.
///
/// # Invariants
///
/// `byte_offset + width_bytes <= 32`, counting the offset from the low-order
/// end of the slot.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct SlotAssignment {
    /// The dot-separated path of the leaf, with fixed-array elements written
    /// as `[i]`.
    pub path: String,

    /// The declaration of the leaf itself.
    pub field: FieldDeclaration,

    /// The slot in which the leaf starts.
    #[serde(rename = "slot")]
    pub base_slot: U256Wrapper,

    /// The byte offset within the slot at which the leaf starts.
    #[serde(rename = "offset")]
    pub byte_offset: usize,

    /// The number of bytes the leaf occupies in its slot.
    #[serde(rename = "width")]
    pub width_bytes: usize,
}

impl SlotAssignment {
    /// Constructs a new assignment of `field` at `path` to `width_bytes` bytes
    /// starting at `byte_offset` in `base_slot`.
    #[must_use]
    pub fn new(
        path: impl Into<String>,
        field: FieldDeclaration,
        base_slot: impl Into<U256Wrapper>,
        byte_offset: usize,
        width_bytes: usize,
    ) -> Self {
        let path = path.into();
        let base_slot = base_slot.into();
        Self {
            path,
            field,
            base_slot,
            byte_offset,
            width_bytes,
        }
    }

    /// Gets the slot in which the leaf starts.
    #[must_use]
    pub fn slot(&self) -> U256 {
        self.base_slot.0
    }

    /// Gets the position (slot, byte offset) of the first byte of the leaf.
    #[must_use]
    pub fn start(&self) -> (U256Wrapper, usize) {
        (self.base_slot, self.byte_offset)
    }

    /// Gets the position (slot, byte offset) just past the last byte of the
    /// leaf, moving on to the next slot when the leaf fills its own.
    #[must_use]
    pub fn end(&self) -> (U256Wrapper, usize) {
        let end = self.byte_offset + self.width_bytes;
        if end >= WORD_SIZE_BYTES {
            (U256Wrapper(self.base_slot.0.wrapping_add(U256::ONE)), 0)
        } else {
            (self.base_slot, end)
        }
    }

    /// Gets the number of consecutive slots that the leaf spans, starting at
    /// its base slot.
    ///
    /// This is one for everything but a fixed-size array kept as a single
    /// leaf.
    #[must_use]
    pub fn slot_span(&self) -> U256 {
        self.field.ty.storage_slots()
    }

    /// Checks whether `slot` falls within the slots spanned by the leaf.
    #[must_use]
    pub fn covers(&self, slot: impl Into<U256Wrapper>) -> bool {
        slot.into().0.wrapping_sub(self.base_slot.0) < self.slot_span()
    }

    /// Checks whether the leaf starts at the same slot and byte offset as
    /// `other`.
    #[must_use]
    pub fn same_position(&self, other: &Self) -> bool {
        self.start() == other.start()
    }
}
