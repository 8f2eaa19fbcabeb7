//! Connector lifecycle state.
//!
//! ```text
//! +---------------+   initialize   +------------+   ok    +-----------+
//! | Uninitialized | -------------> | Connecting | ------> | Connected |
//! +---------------+                +------------+         +-----------+
//!        |                            |      ^
//!        | test mode                  | err  | retry
//!        v                            v      |
//!   +---------+                     +--------+
//!   | Skipped |                     | Failed |
//!   +---------+                     +--------+
//! ```
//!
//! `Connected` is final for the connector. Link drops after that are handled
//! inside the handle and do not change this state.

use std::sync::atomic::{AtomicU8, Ordering};

/// Lifecycle state of a connector.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ConnectorState {
    /// `initialize` has not been called.
    Uninitialized = 0,
    /// Test mode; no connection was attempted.
    Skipped = 1,
    /// A connection attempt is in flight.
    Connecting = 2,
    /// A handle has been published.
    Connected = 3,
    /// The last attempt failed.
    Failed = 4,
}

impl ConnectorState {
    const fn from_u8(value: u8) -> Self {
        match value {
            1 => Self::Skipped,
            2 => Self::Connecting,
            3 => Self::Connected,
            4 => Self::Failed,
            _ => Self::Uninitialized,
        }
    }

    /// Returns the state name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uninitialized => "uninitialized",
            Self::Skipped => "skipped",
            Self::Connecting => "connecting",
            Self::Connected => "connected",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ConnectorState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Atomic cell holding a [`ConnectorState`].
#[derive(Debug)]
pub(crate) struct StateCell(AtomicU8);

impl StateCell {
    pub(crate) const fn new() -> Self {
        Self(AtomicU8::new(ConnectorState::Uninitialized as u8))
    }

    pub(crate) fn get(&self) -> ConnectorState {
        ConnectorState::from_u8(self.0.load(Ordering::Acquire))
    }

    pub(crate) fn set(&self, state: ConnectorState) {
        self.0.store(state as u8, Ordering::Release);
    }

    /// Moves to `Connecting` unless a handle is already published or another
    /// attempt is in flight. Returns the state that blocked the transition.
    pub(crate) fn begin_connecting(&self) -> Result<(), ConnectorState> {
        let mut current = self.0.load(Ordering::Acquire);
        loop {
            let state = ConnectorState::from_u8(current);
            if matches!(state, ConnectorState::Connecting | ConnectorState::Connected) {
                return Err(state);
            }
            match self.0.compare_exchange_weak(
                current,
                ConnectorState::Connecting as u8,
                Ordering::AcqRel,
                Ordering::Acquire,
            ) {
                Ok(_) => return Ok(()),
                Err(actual) => current = actual,
            }
        }
    }
}
