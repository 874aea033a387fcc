//! This module contains the [`Planner`] that turns an ordered set of field
//! declarations into a concrete [`StorageLayout`].

use std::collections::HashSet;

use derivative::Derivative;
use ethnum::U256;
use tracing::{debug, trace};

use crate::{
    constant::{
        DEFAULT_EXPANSION_SLOT_LIMIT,
        DEFAULT_EXPAND_FIXED_ARRAYS,
        PATH_SEPARATORS,
        WORD_SIZE_BYTES,
    },
    error::layout::{Error, Errors, Result},
    layout::{
        declaration::{sorted_by_order, FieldDeclaration, TypeDescriptor},
        SlotAssignment,
        StorageLayout,
    },
};

/// The position at which the next field will be placed, as a slot and the
/// number of bytes already used in that slot.
///
/// The cursor is always owned by the caller that threads it through placement,
/// so nested scopes (struct members, array elements) run on their own cursors
/// and hand the final position back to their parent.
#[derive(Copy, Clone, Debug, Eq, PartialEq)]
pub(crate) struct Cursor {
    slot: U256,
    used: usize,
}

impl Cursor {
    /// Creates a cursor at the start of `slot`.
    pub(crate) fn at(slot: U256) -> Self {
        Self { slot, used: 0 }
    }

    /// Gets the slot the cursor is currently in.
    pub(crate) fn slot(&self) -> U256 {
        self.slot
    }

    /// Moves to the start of a fresh slot unless the cursor is already at one.
    pub(crate) fn align(&mut self) {
        if self.used != 0 {
            self.slot = self.slot.wrapping_add(U256::ONE);
            self.used = 0;
        }
    }

    /// Claims `width` bytes, moving to a fresh slot first if they do not fit in
    /// the current one, and returns the position at which they start.
    pub(crate) fn reserve(&mut self, width: usize) -> (U256, usize) {
        if self.used + width > WORD_SIZE_BYTES {
            self.align();
        }
        let position = (self.slot, self.used);
        self.used += width;
        position
    }

    /// Moves past `ty` without recording where any part of it went.
    pub(crate) fn skip_over(&mut self, ty: &TypeDescriptor) {
        if ty.is_packable() {
            self.reserve(ty.width());
        } else {
            self.align();
            self.slot = self.slot.wrapping_add(ty.storage_slots());
        }
    }
}

/// The configuration for the [`Planner`].
#[derive(Clone, Debug, Derivative, Eq, PartialEq)]
#[derivative(Default)]
pub struct Config {
    /// Whether each element of a fixed-size array becomes its own leaf in the
    /// layout. When disabled, a fixed-size array is a single leaf spanning its
    /// first slot.
    ///
    /// Expansion produces one assignment per element, so the size of the
    /// layout grows with the product of the lengths of nested arrays. See
    /// [`Self::expansion_slot_limit`] for the bound on that growth.
    ///
    /// Defaults to [`DEFAULT_EXPAND_FIXED_ARRAYS`].
    #[derivative(Default(value = "DEFAULT_EXPAND_FIXED_ARRAYS"))]
    pub expand_fixed_arrays: bool,

    /// The largest number of slots that a fixed-size array may span and still
    /// be expanded. Larger arrays are kept as a single leaf.
    ///
    /// Defaults to [`DEFAULT_EXPANSION_SLOT_LIMIT`].
    #[derivative(Default(value = "DEFAULT_EXPANSION_SLOT_LIMIT"))]
    pub expansion_slot_limit: usize,
}

impl Config {
    /// Sets the `expand_fixed_arrays` config parameter to `value`.
    #[must_use]
    pub fn with_expand_fixed_arrays(mut self, value: bool) -> Self {
        self.expand_fixed_arrays = value;
        self
    }

    /// Sets the `expansion_slot_limit` config parameter to `value`.
    #[must_use]
    pub fn with_expansion_slot_limit(mut self, value: usize) -> Self {
        self.expansion_slot_limit = value;
        self
    }

    /// Checks whether the fixed-size array `ty` is expanded into one leaf per
    /// element under this configuration.
    #[must_use]
    pub fn expands(&self, ty: &TypeDescriptor) -> bool {
        self.expand_fixed_arrays
            && ty.storage_slots() <= U256::from(self.expansion_slot_limit as u64)
    }
}

/// Plans storage layouts by greedily packing declarations from left to right.
///
/// The planner does not reorder fields. Value types narrower than a word share
/// a slot with their predecessors whenever they fit. Every other type starts a
/// fresh slot and the field after it does too.
#[derive(Clone, Debug, Default)]
pub struct Planner {
    config: Config,
}

impl Planner {
    /// Constructs a planner configured by `config`.
    #[must_use]
    pub fn new(config: Config) -> Self {
        Self { config }
    }

    /// Gets the configuration of the planner.
    #[must_use]
    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Plans the storage layout for the top-level `declarations`.
    ///
    /// # Errors
    ///
    /// Returns [`Err`] containing every malformed declaration if any are
    /// found. No slots are assigned in that case.
    pub fn plan(&self, declarations: &[FieldDeclaration]) -> Result<StorageLayout> {
        let mut errors = Errors::new();
        validate_scope("", declarations, &mut errors);
        if !errors.is_empty() {
            debug!(errors = errors.len(), "rejected malformed declarations");
            return Err(errors);
        }

        let mut cursor = Cursor::at(U256::ZERO);
        let mut assignments = Vec::new();
        for field in sorted_by_order(declarations) {
            self.place(&field.name, field, &field.ty, &mut cursor, &mut assignments);
        }
        cursor.align();

        let layout = StorageLayout::new(assignments, cursor.slot());
        debug!(
            fields = declarations.len(),
            leaves = layout.len(),
            slots = %layout.slots_used(),
            "planned storage layout"
        );

        Ok(layout)
    }

    /// Places the field described by `field` of type `ty` at `path`, pushing
    /// one assignment per leaf into `out`.
    fn place(
        &self,
        path: &str,
        field: &FieldDeclaration,
        ty: &TypeDescriptor,
        cursor: &mut Cursor,
        out: &mut Vec<SlotAssignment>,
    ) {
        match ty {
            TypeDescriptor::Value { .. } => {
                let width = ty.width();
                let (slot, offset) = cursor.reserve(width);
                push_leaf(out, path, field, slot, offset, width);
            }
            TypeDescriptor::DynamicArray { .. }
            | TypeDescriptor::Bytes
            | TypeDescriptor::Mapping { .. } => {
                cursor.align();
                let (slot, offset) = cursor.reserve(ty.width());
                push_leaf(out, path, field, slot, offset, ty.width());
                cursor.align();
            }
            TypeDescriptor::Struct { fields } => {
                cursor.align();
                let mut inner = Cursor::at(cursor.slot());
                for member in sorted_by_order(fields) {
                    let member_path = format!("{path}.{}", member.name);
                    self.place(&member_path, member, &member.ty, &mut inner, out);
                }
                inner.align();
                *cursor = inner;
            }
            TypeDescriptor::FixedArray { element, length } => {
                cursor.align();
                if self.config.expands(ty) {
                    let mut inner = Cursor::at(cursor.slot());
                    for index in 0..*length {
                        let element_path = format!("{path}[{index}]");
                        let element_field = FieldDeclaration::new(
                            format!("{}[{index}]", field.name),
                            element.as_ref().clone(),
                            index,
                        );
                        self.place(&element_path, &element_field, element, &mut inner, out);
                    }
                    inner.align();
                    *cursor = inner;
                } else {
                    push_leaf(out, path, field, cursor.slot(), 0, ty.width());
                    cursor.skip_over(ty);
                }
            }
        }
    }
}

/// Plans the layout for `declarations` using the default planner
/// configuration.
///
/// # Errors
///
/// Returns [`Err`] if any of the declarations are malformed.
pub fn plan(declarations: &[FieldDeclaration]) -> Result<StorageLayout> {
    Planner::default().plan(declarations)
}

fn push_leaf(
    out: &mut Vec<SlotAssignment>,
    path: &str,
    field: &FieldDeclaration,
    slot: U256,
    offset: usize,
    width: usize,
) {
    trace!(path, kind = field.ty.kind_name(), slot = %slot, offset, width, "assigned slot");
    out.push(SlotAssignment::new(path, field.clone(), slot, offset, width));
}

/// Joins a member `name` onto the `prefix` path of its scope.
fn join_path(prefix: &str, name: &str) -> String {
    if prefix.is_empty() {
        name.to_string()
    } else {
        format!("{prefix}.{name}")
    }
}

/// Checks the sibling declarations in `fields` for clashes, and then each of
/// their types, recording any problems into `errors`.
fn validate_scope(prefix: &str, fields: &[FieldDeclaration], errors: &mut Errors) {
    let mut names = HashSet::new();
    let mut orders = HashSet::new();

    for field in fields {
        let path = join_path(prefix, &field.name);
        if field.name.is_empty() {
            errors.add_located(&path, Error::EmptyName);
        } else if field.name.contains(PATH_SEPARATORS) {
            errors.add_located(&path, Error::InvalidName(field.name.clone()));
        } else if !names.insert(field.name.as_str()) {
            errors.add_located(&path, Error::DuplicateName(field.name.clone()));
        }
        if !orders.insert(field.declaration_order) {
            errors.add_located(&path, Error::DuplicateOrder(field.declaration_order));
        }

        validate_type(&path, &field.ty, errors);
    }
}

/// Checks that `ty` and everything nested within it satisfy their structural
/// invariants.
fn validate_type(path: &str, ty: &TypeDescriptor, errors: &mut Errors) {
    match ty {
        TypeDescriptor::Value { width } => {
            if !(1..=WORD_SIZE_BYTES).contains(width) {
                errors.add_located(path, Error::InvalidValueWidth(*width));
            }
        }
        TypeDescriptor::FixedArray { element, length } => {
            if *length == 0 {
                errors.add_located(path, Error::ZeroLengthArray);
            }
            validate_type(&format!("{path}[]"), element, errors);
        }
        TypeDescriptor::DynamicArray { element } => {
            validate_type(&format!("{path}[]"), element, errors);
        }
        TypeDescriptor::Bytes => (),
        TypeDescriptor::Mapping { key, value } => {
            match key.as_ref() {
                TypeDescriptor::Value { .. } | TypeDescriptor::Bytes => {
                    validate_type(path, key, errors);
                }
                other => errors.add_located(path, Error::InvalidMappingKey(other.to_string())),
            }
            validate_type(&format!("{path}[]"), value, errors);
        }
        TypeDescriptor::Struct { fields } => {
            if fields.is_empty() {
                errors.add_located(path, Error::EmptyStruct);
            }
            validate_scope(path, fields, errors);
        }
    }
}
