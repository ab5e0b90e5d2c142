//! Error types for effects, channels, and transforms.

use caspar_protocol::{ChannelId, ExecutorError};
use thiserror::Error;
use uuid::Uuid;

/// Degenerate transform input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum GeometryError {
    /// The crop rectangle has no width or no height.
    #[error("crop rectangle has zero {axis}")]
    ZeroExtent {
        /// Which extent collapsed: `width` or `height`.
        axis: &'static str,
    },

    /// A coordinate or a derived mixer parameter is not a finite number.
    #[error("transform {parameter} is not finite")]
    NonFinite {
        /// Offending coordinate or parameter.
        parameter: &'static str,
    },
}

/// An effect was asked to change state in a way its lifecycle forbids.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum LifecycleError {
    /// The effect was disposed and can no longer be used.
    #[error("effect {id} has been disposed")]
    Disposed {
        /// Effect identifier.
        id: Uuid,
    },

    /// The effect is already active.
    #[error("effect {id} is already active")]
    AlreadyActive {
        /// Effect identifier.
        id: Uuid,
    },

    /// The effect is not active.
    #[error("effect {id} is not active")]
    NotActive {
        /// Effect identifier.
        id: Uuid,
    },

    /// The effect's group or channel no longer exists.
    #[error("effect {id} is detached from its channel")]
    Detached {
        /// Effect identifier.
        id: Uuid,
    },
}

/// The channel has no free layers left.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
#[error("channel {channel} cannot provide {requested} layers ({available} free)")]
pub struct LayerPoolError {
    /// Channel whose pool ran dry.
    pub channel: ChannelId,
    /// Number of layers requested.
    pub requested: usize,
    /// Number of layers still free.
    pub available: usize,
}

/// Errors raised by effect operations.
#[derive(Debug, Clone, Error)]
pub enum EffectError {
    /// The lifecycle forbids the operation.
    #[error(transparent)]
    Lifecycle(#[from] LifecycleError),

    /// The transform is degenerate.
    #[error("invalid transform: {0}")]
    Geometry(#[from] GeometryError),

    /// Layer allocation failed.
    #[error(transparent)]
    LayerPool(#[from] LayerPoolError),

    /// The server refused or never answered a command.
    #[error(transparent)]
    Executor(#[from] ExecutorError),
}
