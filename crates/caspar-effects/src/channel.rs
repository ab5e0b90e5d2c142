//! Channels, their layer pools, and the set of channels on one server.
//!
//! Each [`Channel`] owns a pool of layer ids. Allocation and release go
//! through a single mutex per channel so two effects can never hold the same
//! layer. Released layers are not cleared on the server straight away; they
//! are queued and cleared by [`Channel::execute_allocation`], and a layer
//! handed out again before that flush is dropped from the queue.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::num::NonZeroU32;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, Weak};

use caspar_config::{Config, DEFAULT_BASE_LAYER};
use caspar_protocol::{Allocation, ChannelId, Command, CommandExecutor, LayerId, verbs};
use serde::Serialize;
use tracing::{debug, warn};
use uuid::Uuid;

use crate::effect::{Effect, EffectSnapshot};
use crate::error::LayerPoolError;
use crate::group::EffectGroup;

const CHANNEL_TARGET: &str = "caspar_effects::channel";

/// Highest layer id handed out by a pool.
pub const MAX_LAYER: u32 = 9999;

const DEFAULT_BASE: LayerId = match NonZeroU32::new(DEFAULT_BASE_LAYER) {
    Some(layer) => layer,
    None => NonZeroU32::MIN,
};

/// A layer owned by an effect.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
pub struct Layer {
    channel: ChannelId,
    layer: LayerId,
}

impl Layer {
    /// Layer `layer` on `channel`.
    #[must_use]
    pub const fn new(channel: ChannelId, layer: LayerId) -> Self {
        Self { channel, layer }
    }

    /// Channel the layer belongs to.
    #[must_use]
    pub const fn channel_id(&self) -> ChannelId {
        self.channel
    }

    /// Layer id within the channel.
    #[must_use]
    pub const fn layer_id(&self) -> LayerId {
        self.layer
    }

    /// Allocation addressing this layer.
    #[must_use]
    pub const fn allocation(&self) -> Allocation {
        Allocation::from_ids(self.channel, Some(self.layer))
    }
}

impl fmt::Display for Layer {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.allocation().fmt(formatter)
    }
}

/// Serialisable view of a group and its effects.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GroupSnapshot {
    /// Group name.
    pub name: String,
    /// Position among the channel's groups.
    pub index: usize,
    /// Effects in group order.
    pub effects: Vec<EffectSnapshot>,
}

/// Serialisable view of a channel: its layer pool and its groups.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChannelSnapshot {
    /// Channel id.
    pub id: ChannelId,
    /// Layers currently reserved, lowest first.
    pub layers_in_use: Vec<Layer>,
    /// Layers released but not yet cleared.
    pub pending_clears: Vec<Layer>,
    /// Groups in creation order.
    pub groups: Vec<GroupSnapshot>,
}

#[derive(Debug)]
struct LayerPool {
    channel: ChannelId,
    base: u32,
    in_use: BTreeSet<u32>,
    pending_clear: BTreeSet<u32>,
}

impl LayerPool {
    const fn new(channel: ChannelId, base: LayerId) -> Self {
        Self {
            channel,
            base: base.get(),
            in_use: BTreeSet::new(),
            pending_clear: BTreeSet::new(),
        }
    }

    /// Hands out `count` free ids, preferring ids at or above `base + index`
    /// so effects later in a group sit above earlier ones.
    fn allocate(&mut self, count: usize, index: usize) -> Result<Vec<LayerId>, LayerPoolError> {
        let offset = u32::try_from(index).unwrap_or(u32::MAX);
        let start = self.base.saturating_add(offset).min(MAX_LAYER);
        let chosen: Vec<u32> = (start..=MAX_LAYER)
            .chain(self.base..start)
            .filter(|id| !self.in_use.contains(id))
            .take(count)
            .collect();
        if chosen.len() < count {
            return Err(LayerPoolError {
                channel: self.channel,
                requested: count,
                available: chosen.len(),
            });
        }
        for id in &chosen {
            self.in_use.insert(*id);
            self.pending_clear.remove(id);
        }
        Ok(chosen.into_iter().filter_map(NonZeroU32::new).collect())
    }

    fn release(&mut self, layer: LayerId) -> bool {
        let id = layer.get();
        let released = self.in_use.remove(&id);
        if released {
            self.pending_clear.insert(id);
        }
        released
    }

    fn take_pending_clear(&mut self) -> Vec<LayerId> {
        std::mem::take(&mut self.pending_clear)
            .into_iter()
            .filter_map(NonZeroU32::new)
            .collect()
    }
}

/// One server channel with its layer pool and effect groups.
pub struct Channel {
    id: ChannelId,
    executor: CommandExecutor,
    set: Weak<ChannelSet>,
    pool: Mutex<LayerPool>,
    groups: Mutex<Vec<Arc<EffectGroup>>>,
}

impl Channel {
    /// Standalone channel that is not part of a [`ChannelSet`].
    #[must_use]
    pub fn new(id: ChannelId, executor: CommandExecutor, base_layer: LayerId) -> Arc<Self> {
        Self::build(id, executor, base_layer, Weak::new())
    }

    fn build(
        id: ChannelId,
        executor: CommandExecutor,
        base_layer: LayerId,
        set: Weak<ChannelSet>,
    ) -> Arc<Self> {
        Arc::new(Self {
            id,
            executor,
            set,
            pool: Mutex::new(LayerPool::new(id, base_layer)),
            groups: Mutex::new(Vec::new()),
        })
    }

    /// Channel id.
    #[must_use]
    pub const fn id(&self) -> ChannelId {
        self.id
    }

    /// Executor used for this channel's commands.
    #[must_use]
    pub const fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    /// Allocation addressing the whole channel.
    #[must_use]
    pub const fn allocation(&self) -> Allocation {
        Allocation::from_ids(self.id, None)
    }

    /// Returns the group called `name`, creating it on first use.
    ///
    /// Groups are numbered in creation order.
    #[must_use]
    pub fn group(self: &Arc<Self>, name: &str) -> Arc<EffectGroup> {
        let mut groups = lock(&self.groups);
        if let Some(existing) = groups.iter().find(|group| group.name() == name) {
            return Arc::clone(existing);
        }
        let group = Arc::new(EffectGroup::new(name, groups.len(), Arc::downgrade(self)));
        groups.push(Arc::clone(&group));
        group
    }

    /// Groups in creation order.
    #[must_use]
    pub fn groups(&self) -> Vec<Arc<EffectGroup>> {
        lock(&self.groups).clone()
    }

    /// Effects of every group, in group order.
    #[must_use]
    pub fn effects(&self) -> Vec<Arc<Effect>> {
        self.groups()
            .iter()
            .flat_map(|group| group.effects())
            .collect()
    }

    /// Looks up an effect by id across the channel's groups.
    #[must_use]
    pub fn effect(&self, id: Uuid) -> Option<Arc<Effect>> {
        self.groups()
            .iter()
            .find_map(|group| group.effects().into_iter().find(|effect| effect.id() == id))
    }

    /// Captures the pool and every group.
    #[must_use]
    pub fn snapshot(&self) -> ChannelSnapshot {
        let groups = self
            .groups()
            .iter()
            .map(|group| GroupSnapshot {
                name: group.name().to_owned(),
                index: group.index(),
                effects: group.effects().iter().map(|effect| effect.snapshot()).collect(),
            })
            .collect();
        ChannelSnapshot {
            id: self.id,
            layers_in_use: self.layers_in_use(),
            pending_clears: self.pending_clears(),
            groups,
        }
    }

    /// Reserves `count` layers, preferring ids that follow the group order
    /// given by `index`.
    ///
    /// # Errors
    ///
    /// Returns [`LayerPoolError`] when too few layers are free; nothing is
    /// reserved in that case.
    pub fn allocate_layers(&self, count: usize, index: usize) -> Result<Vec<Layer>, LayerPoolError> {
        let ids = lock(&self.pool).allocate(count, index)?;
        let layers: Vec<Layer> = ids.into_iter().map(|id| Layer::new(self.id, id)).collect();
        debug!(target: CHANNEL_TARGET, channel = self.id, ?layers, "layers allocated");
        Ok(layers)
    }

    /// Returns `layers` to the pool and queues them for clearing.
    ///
    /// Layers of other channels and layers that are not allocated are
    /// ignored.
    pub fn deallocate_layers(&self, layers: &[Layer]) {
        let mut pool = lock(&self.pool);
        for layer in layers {
            if layer.channel_id() != self.id {
                warn!(target: CHANNEL_TARGET, channel = self.id, %layer, "layer belongs to another channel");
                continue;
            }
            if !pool.release(layer.layer_id()) {
                debug!(target: CHANNEL_TARGET, %layer, "layer was not allocated");
            }
        }
    }

    /// Layers currently reserved, lowest first.
    #[must_use]
    pub fn layers_in_use(&self) -> Vec<Layer> {
        lock(&self.pool)
            .in_use
            .iter()
            .filter_map(|id| NonZeroU32::new(*id))
            .map(|id| Layer::new(self.id, id))
            .collect()
    }

    /// Layers released but not yet cleared on the server.
    #[must_use]
    pub fn pending_clears(&self) -> Vec<Layer> {
        lock(&self.pool)
            .pending_clear
            .iter()
            .filter_map(|id| NonZeroU32::new(*id))
            .map(|id| Layer::new(self.id, id))
            .collect()
    }

    /// Clears every released layer on the server.
    pub fn execute_allocation(&self) {
        let released = lock(&self.pool).take_pending_clear();
        if released.is_empty() {
            return;
        }
        let clears = released.into_iter().map(|id| {
            Command::simple(verbs::CLEAR).allocated(Allocation::from_ids(self.id, Some(id)))
        });
        self.executor.execute_detached(&Command::group(clears));
    }

    /// Flushes allocations on every channel of the owning set, or only this
    /// channel when it stands alone.
    pub fn execute_all_allocations(&self) {
        match self.set.upgrade() {
            Some(set) => set.execute_allocations(),
            None => self.execute_allocation(),
        }
    }
}

impl fmt::Debug for Channel {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Channel")
            .field("id", &self.id)
            .field("pool", &*lock(&self.pool))
            .finish_non_exhaustive()
    }
}

/// Every channel allocated on one server connection.
#[derive(Debug)]
pub struct ChannelSet {
    executor: CommandExecutor,
    base_layer: LayerId,
    channels: Mutex<BTreeMap<ChannelId, Arc<Channel>>>,
}

impl ChannelSet {
    /// Empty set whose channels hand out layers from `base_layer` upward.
    #[must_use]
    pub fn new(executor: CommandExecutor, base_layer: LayerId) -> Arc<Self> {
        Arc::new(Self {
            executor,
            base_layer,
            channels: Mutex::new(BTreeMap::new()),
        })
    }

    /// Empty set using the configured base layer.
    #[must_use]
    pub fn from_config(executor: CommandExecutor, config: &Config) -> Arc<Self> {
        Self::new(
            executor,
            NonZeroU32::new(config.base_layer).unwrap_or(DEFAULT_BASE),
        )
    }

    /// Executor shared by the channels.
    #[must_use]
    pub const fn executor(&self) -> &CommandExecutor {
        &self.executor
    }

    /// Creates channel `id`, replacing any previous channel with that id.
    #[must_use]
    pub fn allocate_channel(self: &Arc<Self>, id: ChannelId) -> Arc<Channel> {
        let channel = Channel::build(
            id,
            self.executor.clone(),
            self.base_layer,
            Arc::downgrade(self),
        );
        if lock(&self.channels).insert(id, Arc::clone(&channel)).is_some() {
            debug!(target: CHANNEL_TARGET, channel = id, "channel replaced");
        }
        channel
    }

    /// Looks up a channel.
    #[must_use]
    pub fn channel(&self, id: ChannelId) -> Option<Arc<Channel>> {
        lock(&self.channels).get(&id).cloned()
    }

    /// Channels ordered by id.
    #[must_use]
    pub fn channels(&self) -> Vec<Arc<Channel>> {
        lock(&self.channels).values().cloned().collect()
    }

    /// Effects of every channel, ordered by channel id and then group.
    #[must_use]
    pub fn effects(&self) -> Vec<Arc<Effect>> {
        self.channels()
            .iter()
            .flat_map(|channel| channel.effects())
            .collect()
    }

    /// Looks up an effect by id on any channel.
    #[must_use]
    pub fn effect(&self, id: Uuid) -> Option<Arc<Effect>> {
        self.channels().iter().find_map(|channel| channel.effect(id))
    }

    /// Captures every channel, ordered by id.
    #[must_use]
    pub fn snapshot(&self) -> Vec<ChannelSnapshot> {
        self.channels().iter().map(|channel| channel.snapshot()).collect()
    }

    /// Flushes pending allocations on every channel.
    pub fn execute_allocations(&self) {
        for channel in self.channels() {
            channel.execute_allocation();
        }
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}
