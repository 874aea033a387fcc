//! This module contains the primary error type for the library's interface.
//! It also re-exports the more specific error types that are
//! subsystem-specific.

pub mod container;
pub mod layout;
pub mod proxy;

use thiserror::Error;

/// The interface result type for the library.
///
/// # Usage
///
/// Any function considered to be part of the public interface of the library
/// that spans subsystems should return this result type. Subsystems should
/// return the more-specific child error types as appropriate.
pub type Result<T> = std::result::Result<T, Error>;

/// The interface error type for the library.
///
/// All errors returned from the library interface (and hence encountered by the
/// clients of the library) should be members of this enum.
#[derive(Clone, Debug, Error)]
pub enum Error {
    /// Errors that come from planning a layout from malformed declarations.
    #[error(transparent)]
    Layout(#[from] layout::Errors),

    /// Errors from the proxy storage model.
    #[error(transparent)]
    Proxy(#[from] proxy::Error),
}

/// Allow a single located layout error to be lifted straight into the
/// interface error.
impl From<layout::LocatedError> for Error {
    fn from(value: layout::LocatedError) -> Self {
        Self::Layout(value.into())
    }
}

#[cfg(test)]
mod test {
    use crate::{
        error::{layout, Error},
        layout::{plan, FieldDeclaration, TypeDescriptor},
    };

    #[test]
    fn planner_failures_lift_into_the_interface_error() {
        let result: crate::error::Result<_> =
            plan(&FieldDeclaration::ordered([("x", TypeDescriptor::value(0))])).map_err(Error::from);

        let Err(Error::Layout(errors)) = result else {
            panic!("expected a layout error");
        };
        assert!(errors.has_error_at("x"));
        assert!(errors.to_string().starts_with("Encountered 1 errors:"));
    }

    #[test]
    fn single_located_errors_lift_too() {
        let located = layout::LocatedError {
            location: "a.b".into(),
            payload:  layout::Error::EmptyStruct,
        };
        let error = Error::from(located);
        assert_eq!(
            error.to_string(),
            "Encountered 1 errors:\n[a.b]: Structs must declare at least one member\n"
        );
    }
}
