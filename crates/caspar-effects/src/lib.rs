//! Effects, channels, and layer geometry for the playout client.
//!
//! A [`ChannelSet`] tracks the server's channels. Each [`Channel`] hands out
//! layers from its own pool and keeps named [`EffectGroup`]s, and every
//! [`Effect`] in a group owns some of those layers. A [`Transform`] maps a
//! crop window onto a destination rectangle and becomes `MIXER` commands for
//! each owned layer.

mod channel;
mod effect;
mod error;
mod group;
mod mixer;
mod registry;
mod transform;

pub use channel::{Channel, ChannelSet, ChannelSnapshot, GroupSnapshot, Layer, MAX_LAYER};
pub use effect::{Effect, EffectSnapshot, Lifecycle};
pub use error::{EffectError, GeometryError, LayerPoolError, LifecycleError};
pub use group::EffectGroup;
pub use mixer::{ClipParams, FillParams, MixerCommand, Tween};
pub use registry::{EffectFactory, EffectRegistry};
pub use transform::{Point, Rect, Transform};
