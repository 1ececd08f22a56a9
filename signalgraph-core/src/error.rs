//! Error Types
//!
//! Every failure in the signal graph is reported synchronously to the call
//! site that triggered it. Nothing is retried by the engine and there is no
//! global error channel.

use std::error::Error as StdError;

use crate::reactive::SignalId;

/// Errors raised by reads, writes and recomputation in the signal graph.
#[derive(Debug, thiserror::Error)]
pub enum ReactiveError {
    /// A signal was read while the tracker had reads locked.
    #[error("signal {signal} was read while reads are locked")]
    TrackingViolation {
        /// The signal whose read was rejected.
        signal: SignalId,
    },

    /// A formula was invalidated by its own recomputation.
    #[error("formula {formula} was invalidated while recomputing")]
    ReentrantInvalidation {
        /// The formula that was computing.
        formula: SignalId,
    },

    /// A formula was read from inside its own recomputation.
    #[error("formula {formula} was read while recomputing")]
    CyclicRead {
        /// The formula that was computing.
        formula: SignalId,
    },

    /// A value was written while a `with` or `update` closure still held a
    /// borrow of it.
    #[error("value {signal} was written while borrowed")]
    WriteWhileBorrowed {
        /// The value whose write was rejected.
        signal: SignalId,
    },

    /// The user compute function failed.
    #[error("compute function failed: {0}")]
    Compute(#[source] Box<dyn StdError + 'static>),
}

impl ReactiveError {
    /// Wrap an arbitrary error raised by a compute function.
    pub fn compute<E>(err: E) -> Self
    where
        E: Into<Box<dyn StdError + 'static>>,
    {
        Self::Compute(err.into())
    }

    /// The signal implicated in this error, if any.
    pub fn signal(&self) -> Option<SignalId> {
        match self {
            Self::TrackingViolation { signal } | Self::WriteWhileBorrowed { signal } => {
                Some(*signal)
            }
            Self::ReentrantInvalidation { formula } | Self::CyclicRead { formula } => {
                Some(*formula)
            }
            Self::Compute(_) => None,
        }
    }
}

/// Errors raised while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The document was not valid JSON or did not match the schema.
    #[error("invalid scheduler configuration: {0}")]
    Parse(#[from] serde_json::Error),

    /// The timeslice must be positive.
    #[error("max_timeslice_millis must be greater than zero")]
    ZeroTimeslice,
}
