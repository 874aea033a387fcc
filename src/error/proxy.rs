//! This module contains the errors raised by the proxy storage model and its
//! initializer state machine.

use thiserror::Error;

use crate::proxy::InitializerState;

/// Errors that occur when a transition on the [`crate::proxy::ProxyStorage`]
/// is not permitted from its current state.
///
/// The model validates before it mutates, so a returned error always means
/// that the proxy state is exactly as it was before the call.
#[derive(Clone, Debug, Eq, Error, PartialEq)]
pub enum Error {
    #[error("Contract is {state}, cannot initialize to version {requested}")]
    AlreadyInitialized { state: InitializerState, requested: u64 },

    #[error("Initialization to version {active} is in progress, cannot begin initializing version {requested}")]
    ReentrantInitialization { active: u64, requested: u64 },

    #[error("No initialization is in progress")]
    NotInitializing,

    #[error("Initializers can only be disabled from the implementation's own deployment context")]
    InvalidDisableContext,

    #[error("The zero address is not a valid implementation")]
    InvalidImplementation,

    #[error("The zero address is not a valid admin")]
    InvalidAdmin,

    #[error("The zero address is not a valid beacon")]
    InvalidBeacon,
}

/// The result type for methods that may have proxy errors.
pub type Result<T> = std::result::Result<T, Error>;
