//! This module contains the error type that pertains to planning a storage
//! layout from a set of field declarations.

use thiserror::Error;

use crate::error::container;

/// Errors that occur when a declaration handed to the
/// [`crate::layout::Planner`] violates the structural invariants of its type.
///
/// Every variant is a kind of malformed declaration. They are raised before any
/// slot is assigned, and the planner never returns a partial layout alongside
/// them.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("Value width of {_0} bytes is outside the permitted range of 1 to 32 bytes")]
    InvalidValueWidth(usize),

    #[error("Fixed-size arrays must have a length greater than zero")]
    ZeroLengthArray,

    #[error("Structs must declare at least one member")]
    EmptyStruct,

    #[error("The name `{_0}` is declared more than once in the same scope")]
    DuplicateName(String),

    #[error("The declaration order {_0} is used by more than one field in the same scope")]
    DuplicateOrder(usize),

    #[error("Field names cannot be empty")]
    EmptyName,

    #[error("The name `{_0}` contains a path separator (`.`, `[` or `]`)")]
    InvalidName(String),

    #[error("Mapping keys must be value types or dynamic bytes, found {_0}")]
    InvalidMappingKey(String),
}

/// A layout error with an associated field path.
pub type LocatedError = container::Located<Error>;

/// A container of layout errors, allowing the planner to report every
/// malformed declaration from a single run.
pub type Errors = container::Errors<LocatedError>;

/// The result type for methods that may have layout errors.
pub type Result<T> = std::result::Result<T, Errors>;
