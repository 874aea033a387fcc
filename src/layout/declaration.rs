//! This module contains the definitions of the declarations that a storage
//! layout is planned from.

use std::fmt::{Display, Formatter};

use ethnum::U256;
use itertools::Itertools;
use serde::{Deserialize, Serialize};

use crate::{
    constant::{
        ADDRESS_WIDTH_BYTES,
        BOOL_WIDTH_BYTES,
        BYTE_SIZE_BITS,
        FUNCTION_WIDTH_BYTES,
        WORD_SIZE_BYTES,
    },
    layout::planner::Cursor,
};

/// A single named state variable (or struct member) with its type and its
/// position in the declaring scope.
///
/// Declarations are produced by whatever front-end parsed the contract, and
/// are never mutated by the library.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
pub struct FieldDeclaration {
    /// The name of the field within its scope.
    pub name: String,

    /// The type of the field.
    #[serde(rename = "type")]
    pub ty: TypeDescriptor,

    /// The position of the field among its siblings. Fields are laid out in
    /// ascending order of this value.
    #[serde(rename = "order")]
    pub declaration_order: usize,
}

impl FieldDeclaration {
    /// Constructs a new declaration for `name` of type `ty` at position
    /// `declaration_order` in its scope.
    #[must_use]
    pub fn new(name: impl Into<String>, ty: TypeDescriptor, declaration_order: usize) -> Self {
        let name = name.into();
        Self {
            name,
            ty,
            declaration_order,
        }
    }

    /// Constructs declarations for `fields`, numbering them in the order in
    /// which they are provided.
    #[must_use]
    pub fn ordered<S: Into<String>>(
        fields: impl IntoIterator<Item = (S, TypeDescriptor)>,
    ) -> Vec<Self> {
        fields
            .into_iter()
            .enumerate()
            .map(|(order, (name, ty))| Self::new(name, ty, order))
            .collect()
    }
}

/// The storage-relevant shape of a Solidity type.
///
/// # Invariants
///
/// - The `width` of a [`Self::Value`] is in `1..=32`.
/// - The `length` of a [`Self::FixedArray`] is greater than zero.
/// - A [`Self::Struct`] has at least one member.
///
/// These are checked by the [`crate::layout::Planner`] before it lays anything
/// out.
#[derive(Clone, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum TypeDescriptor {
    /// Any value type that is `width` bytes wide when stored.
    Value { width: usize },

    /// An array of `length` elements of type `element`.
    FixedArray {
        #[serde(rename = "type")]
        element: Box<TypeDescriptor>,
        length:  usize,
    },

    /// A dynamically-sized array of elements of type `element`.
    DynamicArray {
        #[serde(rename = "type")]
        element: Box<TypeDescriptor>,
    },

    /// A dynamically-sized `bytes` or `string`.
    Bytes,

    /// A mapping from `key` to `value`.
    Mapping {
        key:   Box<TypeDescriptor>,
        value: Box<TypeDescriptor>,
    },

    /// A struct with the provided `fields`.
    Struct { fields: Vec<FieldDeclaration> },
}

impl TypeDescriptor {
    /// Creates a value type of `width` bytes.
    #[must_use]
    pub fn value(width: usize) -> Self {
        Self::Value { width }
    }

    /// Creates an unsigned (or signed) integer type of `bits` bits.
    #[must_use]
    pub fn uint(bits: usize) -> Self {
        Self::value(bits / BYTE_SIZE_BITS)
    }

    /// Creates the `address` type.
    #[must_use]
    pub fn address() -> Self {
        Self::value(ADDRESS_WIDTH_BYTES)
    }

    /// Creates the `bool` type.
    #[must_use]
    pub fn bool() -> Self {
        Self::value(BOOL_WIDTH_BYTES)
    }

    /// Creates an external `function` type.
    #[must_use]
    pub fn function() -> Self {
        Self::value(FUNCTION_WIDTH_BYTES)
    }

    /// Creates the `bytesN` type for `length` bytes.
    #[must_use]
    pub fn bytes_n(length: usize) -> Self {
        Self::value(length)
    }

    /// Creates the dynamic `bytes` (or `string`) type.
    #[must_use]
    pub fn bytes() -> Self {
        Self::Bytes
    }

    /// Creates a fixed-size array of `length` elements of type `element`.
    #[must_use]
    pub fn fixed_array(element: TypeDescriptor, length: usize) -> Self {
        let element = Box::new(element);
        Self::FixedArray { element, length }
    }

    /// Creates a dynamic array of elements of type `element`.
    #[must_use]
    pub fn dynamic_array(element: TypeDescriptor) -> Self {
        let element = Box::new(element);
        Self::DynamicArray { element }
    }

    /// Creates a mapping from `key` to `value`.
    #[must_use]
    pub fn mapping(key: TypeDescriptor, value: TypeDescriptor) -> Self {
        let key = Box::new(key);
        let value = Box::new(value);
        Self::Mapping { key, value }
    }

    /// Creates a struct whose members are `fields`, in the order provided.
    #[must_use]
    pub fn structure<S: Into<String>>(fields: impl IntoIterator<Item = (S, TypeDescriptor)>) -> Self {
        let fields = FieldDeclaration::ordered(fields);
        Self::Struct { fields }
    }

    /// Checks whether the type can share a slot with its neighbours.
    #[must_use]
    pub fn is_packable(&self) -> bool {
        matches!(self, Self::Value { width } if *width < WORD_SIZE_BYTES)
    }

    /// Gets the number of bytes that the type occupies at its own position in
    /// storage.
    ///
    /// Everything but a value type claims the whole of its first slot.
    #[must_use]
    pub fn width(&self) -> usize {
        match self {
            Self::Value { width } => *width,
            _ => WORD_SIZE_BYTES,
        }
    }

    /// Gets the number of consecutive slots that the type consumes starting at
    /// its base slot.
    ///
    /// Dynamic data stored at hashed locations is not counted, as it does not
    /// occupy the consecutive region.
    #[must_use]
    pub fn storage_slots(&self) -> U256 {
        match self {
            Self::Value { .. } | Self::DynamicArray { .. } | Self::Bytes | Self::Mapping { .. } => {
                U256::ONE
            }
            Self::FixedArray { element, length } => {
                let length = U256::from(*length as u64);
                match element.as_ref() {
                    Self::Value { width } => {
                        let per_slot =
                            U256::from((WORD_SIZE_BYTES / (*width).clamp(1, WORD_SIZE_BYTES)) as u64);
                        (length + per_slot - U256::ONE) / per_slot
                    }
                    other => other.storage_slots().wrapping_mul(length),
                }
            }
            Self::Struct { fields } => {
                let mut cursor = Cursor::at(U256::ZERO);
                for field in sorted_by_order(fields) {
                    cursor.skip_over(&field.ty);
                }
                cursor.align();
                cursor.slot()
            }
        }
    }

    /// Gets a short name for the kind of type, without any of its parameters.
    #[must_use]
    pub fn kind_name(&self) -> &'static str {
        match self {
            Self::Value { .. } => "value",
            Self::FixedArray { .. } => "fixed_array",
            Self::DynamicArray { .. } => "dynamic_array",
            Self::Bytes => "bytes",
            Self::Mapping { .. } => "mapping",
            Self::Struct { .. } => "struct",
        }
    }
}

/// Renders the type in a Solidity-like syntax.
impl Display for TypeDescriptor {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Value { width } => write!(f, "value{width}"),
            Self::FixedArray { element, length } => write!(f, "{element}[{length}]"),
            Self::DynamicArray { element } => write!(f, "{element}[]"),
            Self::Bytes => write!(f, "bytes"),
            Self::Mapping { key, value } => write!(f, "mapping({key} => {value})"),
            Self::Struct { fields } => {
                let members = sorted_by_order(fields)
                    .map(|field| format!("{} {}", field.ty, field.name))
                    .join("; ");
                write!(f, "struct {{ {members} }}")
            }
        }
    }
}

/// Iterates over `fields` in their declaration order, keeping the provided
/// order for ties.
pub(crate) fn sorted_by_order(
    fields: &[FieldDeclaration],
) -> impl Iterator<Item = &FieldDeclaration> {
    fields.iter().sorted_by_key(|field| field.declaration_order)
}
