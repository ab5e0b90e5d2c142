//! Effect lifecycle and layer ownership.
//!
//! An [`Effect`] lives in an [`EffectGroup`] on one channel. It moves from
//! `Constructed` through `Active` and `Inactive` until it is `Disposed`, a
//! terminal state in which every operation except [`Effect::dispose`] fails.
//! Activation first flushes pending layer clears on every channel, so the
//! server never shows a released layer next to a freshly activated effect.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::channel::{Channel, Layer};
use crate::error::{EffectError, LifecycleError};
use crate::group::EffectGroup;
use crate::transform::Transform;

const EFFECT_TARGET: &str = "caspar_effects::effect";

/// Lifecycle state of an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, strum::Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum Lifecycle {
    /// Created but never activated.
    Constructed,
    /// Showing on the server.
    Active,
    /// Deactivated; may be activated again.
    Inactive,
    /// Torn down; terminal.
    Disposed,
}

/// Serialisable view of an effect.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectSnapshot {
    /// Effect identifier.
    pub id: Uuid,
    /// Factory name the effect was created from.
    pub kind: String,
    /// Whether the effect is active.
    pub active: bool,
    /// Lifecycle state.
    pub lifecycle: Lifecycle,
    /// Caller-supplied metadata.
    pub metadata: Value,
    /// Layers the effect owns.
    pub layers: Vec<Layer>,
}

#[derive(Debug)]
struct EffectState {
    lifecycle: Lifecycle,
    group: Option<Weak<EffectGroup>>,
    layers: Vec<Layer>,
    transform: Option<Transform>,
}

impl EffectState {
    fn group(&self) -> Option<Arc<EffectGroup>> {
        self.group.as_ref().and_then(Weak::upgrade)
    }

    fn channel(&self) -> Option<Arc<Channel>> {
        self.group().and_then(|group| group.channel())
    }
}

/// A visual element that owns layers on one channel.
#[derive(Debug)]
pub struct Effect {
    id: Uuid,
    kind: String,
    metadata: Value,
    state: Mutex<EffectState>,
}

impl Effect {
    /// Creates an effect and appends it to `group`.
    #[must_use]
    pub fn create(group: &Arc<EffectGroup>, kind: impl Into<String>, metadata: Value) -> Arc<Self> {
        let effect = Arc::new(Self {
            id: Uuid::new_v4(),
            kind: kind.into(),
            metadata,
            state: Mutex::new(EffectState {
                lifecycle: Lifecycle::Constructed,
                group: Some(Arc::downgrade(group)),
                layers: Vec::new(),
                transform: None,
            }),
        });
        group.add_effect(Arc::clone(&effect));
        debug!(
            target: EFFECT_TARGET,
            id = %effect.id,
            kind = %effect.kind,
            group = group.name(),
            "effect created"
        );
        effect
    }

    /// Effect identifier.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Factory name.
    #[must_use]
    pub fn kind(&self) -> &str {
        &self.kind
    }

    /// Caller-supplied metadata.
    #[must_use]
    pub const fn metadata(&self) -> &Value {
        &self.metadata
    }

    /// Current lifecycle state.
    #[must_use]
    pub fn lifecycle(&self) -> Lifecycle {
        self.lock_state().lifecycle
    }

    /// Returns `true` while the effect is active.
    #[must_use]
    pub fn is_active(&self) -> bool {
        self.lifecycle() == Lifecycle::Active
    }

    /// Returns `true` once the effect has been disposed.
    #[must_use]
    pub fn is_disposed(&self) -> bool {
        self.lifecycle() == Lifecycle::Disposed
    }

    /// Owning group; `None` after disposal.
    #[must_use]
    pub fn group(&self) -> Option<Arc<EffectGroup>> {
        self.lock_state().group()
    }

    /// Layers the effect owns, in allocation order.
    #[must_use]
    pub fn layers(&self) -> Vec<Layer> {
        self.lock_state().layers.clone()
    }

    /// Current transform.
    #[must_use]
    pub fn transform(&self) -> Option<Transform> {
        self.lock_state().transform.clone()
    }

    /// Shows the effect.
    ///
    /// Pending layer clears are flushed on every channel first; then the
    /// current transform, if any, is pushed to each owned layer.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::Disposed`], [`LifecycleError::AlreadyActive`],
    /// or [`LifecycleError::Detached`] when the channel is gone.
    pub fn activate(&self) -> Result<(), LifecycleError> {
        let mut state = self.lock_state();
        match state.lifecycle {
            Lifecycle::Disposed => return Err(LifecycleError::Disposed { id: self.id }),
            Lifecycle::Active => return Err(LifecycleError::AlreadyActive { id: self.id }),
            Lifecycle::Constructed | Lifecycle::Inactive => {}
        }
        let channel = state
            .channel()
            .ok_or(LifecycleError::Detached { id: self.id })?;

        state.lifecycle = Lifecycle::Active;
        channel.execute_all_allocations();
        if let Some(transform) = &state.transform {
            push_transform(&channel, transform, &state.layers);
        }
        info!(target: EFFECT_TARGET, id = %self.id, kind = %self.kind, "effect activated");
        Ok(())
    }

    /// Marks the effect inactive.
    ///
    /// # Errors
    ///
    /// Returns [`LifecycleError::NotActive`] unless the effect is active.
    pub fn deactivate(&self) -> Result<(), LifecycleError> {
        let mut state = self.lock_state();
        if state.lifecycle != Lifecycle::Active {
            return Err(LifecycleError::NotActive { id: self.id });
        }
        state.lifecycle = Lifecycle::Inactive;
        info!(target: EFFECT_TARGET, id = %self.id, "effect deactivated");
        Ok(())
    }

    /// Tears the effect down. Calling it again does nothing.
    ///
    /// Owned layers go back to the channel and are cleared straight away,
    /// then the effect leaves its group.
    pub fn dispose(&self) {
        let group = {
            let mut state = self.lock_state();
            if state.lifecycle == Lifecycle::Disposed {
                return;
            }
            let was_active = state.lifecycle == Lifecycle::Active;
            state.lifecycle = Lifecycle::Disposed;
            let layers = std::mem::take(&mut state.layers);
            match state.channel() {
                Some(channel) => {
                    channel.deallocate_layers(&layers);
                    channel.execute_all_allocations();
                }
                None if !layers.is_empty() => {
                    warn!(target: EFFECT_TARGET, id = %self.id, ?layers, "channel gone; layers not released");
                }
                None => {}
            }
            state.transform = None;
            debug!(target: EFFECT_TARGET, id = %self.id, was_active, "effect state released");
            state.group.take()
        };

        if let Some(owner) = group.as_ref().and_then(Weak::upgrade) {
            owner.remove_effect(self.id);
        }
        info!(target: EFFECT_TARGET, id = %self.id, kind = %self.kind, "effect disposed");
    }

    /// Replaces the transform, pushing it to the server when active.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::Geometry`] for degenerate geometry, leaving the
    /// previous transform in place, and [`EffectError::Lifecycle`] when the
    /// effect is disposed or detached.
    pub fn set_transform(&self, transform: Transform) -> Result<(), EffectError> {
        transform.validate()?;
        let mut state = self.lock_state();
        if state.lifecycle == Lifecycle::Disposed {
            return Err(LifecycleError::Disposed { id: self.id }.into());
        }
        if state.lifecycle == Lifecycle::Active {
            let channel = state
                .channel()
                .ok_or(LifecycleError::Detached { id: self.id })?;
            push_transform(&channel, &transform, &state.layers);
        }
        state.transform = Some(transform);
        Ok(())
    }

    /// Reserves `count` more layers on the effect's channel.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::Lifecycle`] when disposed or detached and
    /// [`EffectError::LayerPool`] when the channel has too few free layers.
    pub fn allocate_layers(&self, count: usize) -> Result<Vec<Layer>, EffectError> {
        let mut state = self.lock_state();
        if state.lifecycle == Lifecycle::Disposed {
            return Err(LifecycleError::Disposed { id: self.id }.into());
        }
        let group = state
            .group()
            .ok_or(LifecycleError::Detached { id: self.id })?;
        let channel = group
            .channel()
            .ok_or(LifecycleError::Detached { id: self.id })?;
        let index = group.effect_index(self.id).unwrap_or_else(|| group.len());

        let layers = channel.allocate_layers(count, index)?;
        state.layers.extend(layers.iter().copied());
        Ok(layers)
    }

    /// Returns owned layers to the channel. Layers the effect does not own
    /// are ignored.
    ///
    /// # Errors
    ///
    /// Returns [`EffectError::Lifecycle`] when disposed or detached.
    pub fn deallocate_layers(&self, layers: &[Layer]) -> Result<(), EffectError> {
        let mut state = self.lock_state();
        if state.lifecycle == Lifecycle::Disposed {
            return Err(LifecycleError::Disposed { id: self.id }.into());
        }
        let channel = state
            .channel()
            .ok_or(LifecycleError::Detached { id: self.id })?;

        let owned: Vec<Layer> = layers
            .iter()
            .copied()
            .filter(|layer| state.layers.contains(layer))
            .collect();
        state.layers.retain(|layer| !owned.contains(layer));
        channel.deallocate_layers(&owned);
        Ok(())
    }

    /// Serialisable view of the effect.
    #[must_use]
    pub fn snapshot(&self) -> EffectSnapshot {
        let state = self.lock_state();
        EffectSnapshot {
            id: self.id,
            kind: self.kind.clone(),
            active: state.lifecycle == Lifecycle::Active,
            lifecycle: state.lifecycle,
            metadata: self.metadata.clone(),
            layers: state.layers.clone(),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, EffectState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

fn push_transform(channel: &Channel, transform: &Transform, layers: &[Layer]) {
    let command = match transform.command() {
        Ok(command) => command,
        Err(error) => {
            warn!(target: EFFECT_TARGET, %error, "transform not applied");
            return;
        }
    };
    for layer in layers {
        channel
            .executor()
            .execute_detached(&command.clone().allocated(layer.allocation()));
    }
}

#[cfg(test)]
mod tests;
