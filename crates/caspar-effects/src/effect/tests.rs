//! Tests for the effect lifecycle.

use std::num::NonZeroU32;
use std::sync::Arc;

use caspar_protocol::test_support::RecordingTransport;
use caspar_protocol::{CommandExecutor, ExecutorSettings};
use serde_json::json;

use super::*;
use crate::channel::ChannelSet;
use crate::error::GeometryError;
use crate::transform::Rect;

struct Stage {
    transport: Arc<RecordingTransport>,
    set: Arc<ChannelSet>,
    channel: Arc<Channel>,
    group: Arc<EffectGroup>,
}

fn id(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).expect("non-zero id")
}

fn stage() -> Stage {
    let transport = Arc::new(RecordingTransport::new());
    let executor = CommandExecutor::new(Arc::clone(&transport), ExecutorSettings::default())
        .expect("runtime available");
    let set = ChannelSet::new(executor, id(10));
    let channel = set.allocate_channel(id(1));
    let group = channel.group("graphics");
    Stage {
        transport,
        set,
        channel,
        group,
    }
}

fn half_width() -> Transform {
    Transform::new(Rect::unit(), Rect::new(0.0, 0.0, 0.5, 1.0))
}

#[tokio::test]
async fn new_effect_joins_its_group() {
    let stage = stage();

    let effect = Effect::create(&stage.group, "video", json!({"clip": "AMB"}));

    assert_eq!(effect.lifecycle(), Lifecycle::Constructed);
    assert_eq!(stage.group.effect_index(effect.id()), Some(0));
    assert!(Arc::ptr_eq(&effect.group().expect("group"), &stage.group));
}

#[tokio::test]
async fn activation_cycle() {
    let stage = stage();
    let effect = Effect::create(&stage.group, "video", Value::Null);

    effect.activate().expect("first activation");
    assert!(effect.is_active());
    assert_eq!(
        effect.activate(),
        Err(LifecycleError::AlreadyActive { id: effect.id() })
    );

    effect.deactivate().expect("deactivation");
    assert_eq!(effect.lifecycle(), Lifecycle::Inactive);
    assert_eq!(
        effect.deactivate(),
        Err(LifecycleError::NotActive { id: effect.id() })
    );

    effect.activate().expect("reactivation");
    assert!(effect.is_active());
}

#[tokio::test]
async fn dispose_is_idempotent_and_final() {
    let stage = stage();
    let effect = Effect::create(&stage.group, "video", Value::Null);
    effect.allocate_layers(1).expect("free layer");
    effect.activate().expect("activation");

    effect.dispose();
    effect.dispose();

    assert!(effect.is_disposed());
    assert!(effect.group().is_none());
    assert!(effect.layers().is_empty());
    assert!(stage.group.is_empty());
    assert_eq!(stage.transport.sent(), ["CLEAR 1-10\r\n"]);
    assert_eq!(
        effect.activate(),
        Err(LifecycleError::Disposed { id: effect.id() })
    );
    assert!(matches!(
        effect.set_transform(half_width()),
        Err(EffectError::Lifecycle(LifecycleError::Disposed { .. }))
    ));
    assert!(matches!(
        effect.allocate_layers(1),
        Err(EffectError::Lifecycle(LifecycleError::Disposed { .. }))
    ));
}

#[tokio::test]
async fn effects_never_share_layers() {
    let stage = stage();
    let first = Effect::create(&stage.group, "video", Value::Null);
    let second = Effect::create(&stage.group, "video", Value::Null);

    let first_layers = first.allocate_layers(2).expect("free layers");
    let second_layers = second.allocate_layers(2).expect("free layers");

    assert!(first_layers.iter().all(|layer| !second_layers.contains(layer)));
    assert_eq!(stage.channel.layers_in_use().len(), 4);
}

#[tokio::test]
async fn released_layers_are_cleared_on_next_activation() {
    let stage = stage();
    let outgoing = Effect::create(&stage.group, "video", Value::Null);
    let incoming = Effect::create(&stage.group, "video", Value::Null);
    let layers = outgoing.allocate_layers(1).expect("free layer");

    outgoing.deallocate_layers(&layers).expect("owned layers");
    assert!(outgoing.layers().is_empty());
    assert!(stage.transport.sent().is_empty());

    incoming.activate().expect("activation");

    assert_eq!(stage.transport.sent(), ["CLEAR 1-10\r\n"]);
}

#[tokio::test]
async fn activation_flushes_every_channel_in_the_set() {
    let stage = stage();
    let other = stage.set.allocate_channel(id(2));
    let parked = Effect::create(&other.group("parked"), "still", Value::Null);
    let layers = parked.allocate_layers(1).expect("free layer");
    parked.deallocate_layers(&layers).expect("owned layers");

    Effect::create(&stage.group, "video", Value::Null)
        .activate()
        .expect("activation");

    assert_eq!(stage.transport.sent(), ["CLEAR 2-10\r\n"]);
}

#[tokio::test]
async fn foreign_layers_are_not_released() {
    let stage = stage();
    let owner = Effect::create(&stage.group, "video", Value::Null);
    let other = Effect::create(&stage.group, "video", Value::Null);
    let layers = owner.allocate_layers(1).expect("free layer");

    other.deallocate_layers(&layers).expect("nothing to release");

    assert_eq!(owner.layers(), layers);
    assert_eq!(stage.channel.layers_in_use(), layers);
}

#[tokio::test]
async fn transform_is_pushed_on_activation() {
    let stage = stage();
    let effect = Effect::create(&stage.group, "video", Value::Null);
    effect.allocate_layers(1).expect("free layer");
    effect.set_transform(half_width()).expect("valid transform");
    assert!(stage.transport.sent().is_empty());

    effect.activate().expect("activation");

    assert_eq!(stage.transport.sent(), ["MIXER 1-10 FILL 0 0 0.5 1\r\n"]);
}

#[tokio::test]
async fn transform_is_pushed_immediately_while_active() {
    let stage = stage();
    let effect = Effect::create(&stage.group, "video", Value::Null);
    effect.allocate_layers(2).expect("free layers");
    effect.activate().expect("activation");

    effect.set_transform(half_width()).expect("valid transform");

    assert_eq!(
        stage.transport.sent(),
        [
            "MIXER 1-10 FILL 0 0 0.5 1\r\n",
            "MIXER 1-11 FILL 0 0 0.5 1\r\n"
        ]
    );
    assert_eq!(effect.transform(), Some(half_width()));
}

#[tokio::test]
async fn degenerate_transform_is_rejected_before_storing() {
    let stage = stage();
    let effect = Effect::create(&stage.group, "video", Value::Null);
    effect.set_transform(half_width()).expect("valid transform");

    let result = effect.set_transform(Transform::new(
        Rect::new(0.5, 0.0, 0.5, 1.0),
        Rect::unit(),
    ));

    assert!(matches!(
        result,
        Err(EffectError::Geometry(GeometryError::ZeroExtent { axis: "width" }))
    ));
    assert_eq!(effect.transform(), Some(half_width()));
}

#[tokio::test]
async fn exhausted_pool_is_reported() {
    let stage = stage();
    let effect = Effect::create(&stage.group, "wall", Value::Null);

    let result = effect.allocate_layers(usize::MAX);

    assert!(matches!(result, Err(EffectError::LayerPool(_))));
    assert!(effect.layers().is_empty());
}

#[tokio::test]
async fn dropped_channel_detaches_the_effect() {
    let transport = Arc::new(RecordingTransport::new());
    let executor = CommandExecutor::new(Arc::clone(&transport), ExecutorSettings::default())
        .expect("runtime available");
    let channel = Channel::new(id(1), executor, id(10));
    let group = channel.group("graphics");
    let effect = Effect::create(&group, "video", Value::Null);
    drop(channel);

    assert_eq!(
        effect.activate(),
        Err(LifecycleError::Detached { id: effect.id() })
    );
    effect.dispose();
    assert!(effect.is_disposed());
}

#[tokio::test]
async fn snapshot_serialises_state() {
    let stage = stage();
    let effect = Effect::create(&stage.group, "lower-third", json!({"text": "News"}));
    effect.allocate_layers(1).expect("free layer");
    effect.activate().expect("activation");

    let value = serde_json::to_value(effect.snapshot()).expect("serialisable snapshot");

    assert_eq!(value["id"], json!(effect.id().to_string()));
    assert_eq!(value["kind"], json!("lower-third"));
    assert_eq!(value["active"], json!(true));
    assert_eq!(value["lifecycle"], json!("active"));
    assert_eq!(value["metadata"], json!({"text": "News"}));
    assert_eq!(value["layers"], json!([{"channel": 1, "layer": 10}]));
    assert_eq!(Lifecycle::Disposed.to_string(), "disposed");
}
