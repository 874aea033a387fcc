//! This module contains the initializer guard that stands in for a constructor
//! when a contract's logic runs through a proxy.
//!
//! Code executed via `DELEGATECALL` never runs the implementation's
//! constructor against the proxy's storage, so upgradeable contracts use a
//! versioned, run-once initializer instead. The [`Initializer`] models that
//! guard as an explicit state machine.

use std::fmt::{Display, Formatter};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::{
    constant::INITIAL_VERSION,
    error::proxy::{Error, Result},
};

/// The states of the initializer guard.
#[derive(Clone, Copy, Debug, Deserialize, Eq, Hash, PartialEq, Serialize)]
#[serde(rename_all = "snake_case", tag = "state")]
pub enum InitializerState {
    /// No initializer has ever run, so the version is zero.
    Uninitialized,

    /// An initializer targeting `version` is currently running.
    Initializing { version: u64 },

    /// The initializer for `version` completed.
    Initialized { version: u64 },

    /// Initializers were disabled outright. This state is terminal.
    Locked,
}

impl InitializerState {
    /// Gets the version associated with the state.
    ///
    /// A locked guard reports the largest possible version, as no initializer
    /// can ever run against it.
    #[must_use]
    pub fn version(&self) -> u64 {
        match self {
            Self::Uninitialized => 0,
            Self::Initializing { version } | Self::Initialized { version } => *version,
            Self::Locked => u64::MAX,
        }
    }
}

impl Display for InitializerState {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Uninitialized => write!(f, "uninitialized"),
            Self::Initializing { version } => write!(f, "initializing to version {version}"),
            Self::Initialized { version } => write!(f, "initialized at version {version}"),
            Self::Locked => write!(f, "locked"),
        }
    }
}

/// The run-once initializer guard of a single contract.
///
/// Every transition validates against the current state before touching it,
/// so a failed call leaves the guard unchanged.
///
/// # Chained Initializers
///
/// A parent initializer may call into the initializers of the contracts it
/// builds upon. These nested calls are modelled explicitly with
/// [`Self::begin_nested_initialize`], which is only permitted while an
/// initialization to the _same_ version is running. Each nested call must be
/// closed with its own [`Self::finish_initialize`], and the guard only leaves
/// the initializing state when the outermost call finishes.
#[derive(Clone, Debug, Eq, PartialEq)]
pub struct Initializer {
    state: InitializerState,

    /// The number of initializer calls currently open.
    depth: usize,
}

impl Initializer {
    /// Creates a new guard that has never been initialized.
    #[must_use]
    pub fn new() -> Self {
        let state = InitializerState::Uninitialized;
        Self { state, depth: 0 }
    }

    /// Gets the current state of the guard.
    #[must_use]
    pub fn state(&self) -> InitializerState {
        self.state
    }

    /// Gets the highest version that has been (or is being) initialized.
    #[must_use]
    pub fn version(&self) -> u64 {
        self.state.version()
    }

    /// Checks whether an initializer is currently running.
    #[must_use]
    pub fn is_initializing(&self) -> bool {
        matches!(self.state, InitializerState::Initializing { .. })
    }

    /// Gets the number of initializer calls currently open.
    #[must_use]
    pub fn depth(&self) -> usize {
        self.depth
    }

    /// Begins the one-time initialization to version `1`.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReentrantInitialization`] if an initialization is
    /// already running, and [`Error::AlreadyInitialized`] if the contract has
    /// been initialized or locked.
    pub fn begin_initialize(&mut self) -> Result<()> {
        let requested = INITIAL_VERSION;
        let next = match self.state {
            InitializerState::Uninitialized => InitializerState::Initializing { version: requested },
            InitializerState::Initializing { version } => {
                return Err(Error::ReentrantInitialization {
                    active: version,
                    requested,
                })
            }
            state @ (InitializerState::Initialized { .. } | InitializerState::Locked) => {
                return Err(Error::AlreadyInitialized { state, requested })
            }
        };

        self.transition(next, 1);
        Ok(())
    }

    /// Begins an initializer called from within the running initializer for
    /// `version`, as a parent initializer does when it initializes the
    /// contracts it builds upon.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitializing`] if no initialization is running, and
    /// [`Error::ReentrantInitialization`] if the running initialization
    /// targets a different version.
    pub fn begin_nested_initialize(&mut self, version: u64) -> Result<()> {
        match self.state {
            InitializerState::Initializing { version: active } if active == version => {
                self.depth += 1;
                debug!(version, depth = self.depth, "entered chained initializer");
                Ok(())
            }
            InitializerState::Initializing { version: active } => {
                Err(Error::ReentrantInitialization {
                    active,
                    requested: version,
                })
            }
            _ => Err(Error::NotInitializing),
        }
    }

    /// Begins a re-initialization to `version`, as performed after an upgrade
    /// that introduces new state needing setup.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ReentrantInitialization`] if an initialization is
    /// already running, and [`Error::AlreadyInitialized`] if `version` is not
    /// greater than the current version or the contract is locked.
    pub fn begin_reinitialize(&mut self, version: u64) -> Result<()> {
        let next = match self.state {
            InitializerState::Initializing { version: active } => {
                return Err(Error::ReentrantInitialization {
                    active,
                    requested: version,
                })
            }
            InitializerState::Locked => {
                return Err(Error::AlreadyInitialized {
                    state:     self.state,
                    requested: version,
                })
            }
            state if version <= state.version() => {
                return Err(Error::AlreadyInitialized {
                    state,
                    requested: version,
                })
            }
            _ => InitializerState::Initializing { version },
        };

        self.transition(next, 1);
        Ok(())
    }

    /// Closes the innermost open initializer call, completing the
    /// initialization when it was the outermost one.
    ///
    /// Returns the state of the guard after the call.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NotInitializing`] if no initialization is running.
    pub fn finish_initialize(&mut self) -> Result<InitializerState> {
        let InitializerState::Initializing { version } = self.state else {
            return Err(Error::NotInitializing);
        };

        if self.depth > 1 {
            self.depth -= 1;
            debug!(version, depth = self.depth, "left chained initializer");
        } else {
            self.transition(InitializerState::Initialized { version }, 0);
        }

        Ok(self.state)
    }

    /// Locks the guard so that no initializer can ever run.
    ///
    /// This is how an implementation contract protects its own storage from
    /// being initialized directly. The `deployment_context` flag must say
    /// whether the caller is the implementation's own deployment, rather than
    /// a call arriving through a proxy. Locking an already-locked guard is a
    /// no-op.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidDisableContext`] outside of the deployment
    /// context, [`Error::ReentrantInitialization`] while an initializer is
    /// running, and [`Error::AlreadyInitialized`] once an initializer has
    /// completed.
    pub fn disable_initializers(&mut self, deployment_context: bool) -> Result<()> {
        if !deployment_context {
            return Err(Error::InvalidDisableContext);
        }

        match self.state {
            InitializerState::Uninitialized => {
                self.transition(InitializerState::Locked, 0);
                Ok(())
            }
            InitializerState::Locked => Ok(()),
            InitializerState::Initializing { version } => Err(Error::ReentrantInitialization {
                active:    version,
                requested: u64::MAX,
            }),
            state @ InitializerState::Initialized { .. } => Err(Error::AlreadyInitialized {
                state,
                requested: u64::MAX,
            }),
        }
    }

    fn transition(&mut self, next: InitializerState, depth: usize) {
        debug!(from = %self.state, to = %next, "initializer transition");
        self.state = next;
        self.depth = depth;
    }
}

impl Default for Initializer {
    fn default() -> Self {
        Self::new()
    }
}
