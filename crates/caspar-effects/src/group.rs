//! Named, ordered collections of effects on one channel.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use uuid::Uuid;

use crate::channel::Channel;
use crate::effect::Effect;

/// An ordered set of effects sharing a channel.
///
/// The group's position among its channel's groups is fixed at creation;
/// an effect's position within the group steers which layers it is offered.
#[derive(Debug)]
pub struct EffectGroup {
    name: String,
    index: usize,
    channel: Weak<Channel>,
    effects: Mutex<Vec<Arc<Effect>>>,
}

impl EffectGroup {
    pub(crate) fn new(name: &str, index: usize, channel: Weak<Channel>) -> Self {
        Self {
            name: name.to_owned(),
            index,
            channel,
            effects: Mutex::new(Vec::new()),
        }
    }

    /// Group name, unique within its channel.
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Position among the channel's groups.
    #[must_use]
    pub const fn index(&self) -> usize {
        self.index
    }

    /// Owning channel, if it still exists.
    #[must_use]
    pub fn channel(&self) -> Option<Arc<Channel>> {
        self.channel.upgrade()
    }

    /// Effects in insertion order.
    #[must_use]
    pub fn effects(&self) -> Vec<Arc<Effect>> {
        self.lock_effects().clone()
    }

    /// Position of the effect with `id`.
    #[must_use]
    pub fn effect_index(&self, id: Uuid) -> Option<usize> {
        self.lock_effects().iter().position(|effect| effect.id() == id)
    }

    /// Number of live effects.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock_effects().len()
    }

    /// Returns `true` when the group holds no effects.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.lock_effects().is_empty()
    }

    pub(crate) fn add_effect(&self, effect: Arc<Effect>) {
        self.lock_effects().push(effect);
    }

    pub(crate) fn remove_effect(&self, id: Uuid) -> bool {
        let mut effects = self.lock_effects();
        let before = effects.len();
        effects.retain(|effect| effect.id() != id);
        effects.len() != before
    }

    fn lock_effects(&self) -> MutexGuard<'_, Vec<Arc<Effect>>> {
        self.effects.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
