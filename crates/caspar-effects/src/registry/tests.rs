//! Tests for the effect registry.

use std::num::NonZeroU32;
use std::sync::Arc;

use caspar_protocol::test_support::RecordingTransport;
use caspar_protocol::{CommandExecutor, ExecutorSettings};
use rstest::{fixture, rstest};
use serde_json::json;

use super::*;
use crate::channel::Channel;

fn id(value: u32) -> NonZeroU32 {
    NonZeroU32::new(value).expect("non-zero id")
}

fn video(group: &Arc<EffectGroup>, options: &Value) -> Result<Arc<Effect>, EffectError> {
    let effect = Effect::create(group, "video", options.clone());
    effect.allocate_layers(1)?;
    Ok(effect)
}

#[fixture]
fn registry() -> EffectRegistry {
    let mut registry = EffectRegistry::new();
    registry.register("video", video);
    registry
}

#[rstest]
fn register_and_lookup(registry: EffectRegistry) {
    assert!(registry.contains("video"));
    assert!(registry.get("video").is_some());
    assert!(registry.get("audio").is_none());
    assert_eq!(registry.names(), ["video"]);
    assert_eq!(registry.len(), 1);
}

#[rstest]
fn registering_again_replaces(mut registry: EffectRegistry) {
    let replaced = registry.register("video", |group, options| {
        Ok(Effect::create(group, "replacement", options.clone()))
    });

    assert!(replaced);
    assert_eq!(registry.len(), 1);
}

#[rstest]
fn unregister_removes_factory(mut registry: EffectRegistry) {
    assert!(registry.unregister("video"));
    assert!(!registry.unregister("video"));
    assert!(registry.is_empty());
}

#[rstest]
#[tokio::test]
async fn create_builds_effect_in_group(registry: EffectRegistry) {
    let transport = Arc::new(RecordingTransport::new());
    let executor = CommandExecutor::new(transport, ExecutorSettings::default())
        .expect("runtime available");
    let channel = Channel::new(id(1), executor, id(10));
    let group = channel.group("main");

    let effect = registry
        .create("video", &group, &json!({"clip": "AMB"}))
        .expect("factory succeeds")
        .expect("factory registered");

    assert_eq!(effect.kind(), "video");
    assert_eq!(effect.metadata(), &json!({"clip": "AMB"}));
    assert_eq!(effect.layers().len(), 1);
    assert_eq!(group.len(), 1);

    let unknown = registry
        .create("audio", &group, &Value::Null)
        .expect("unknown names are not an error");
    assert!(unknown.is_none());
}

#[rstest]
fn debug_lists_names(registry: EffectRegistry) {
    assert_eq!(
        format!("{registry:?}"),
        r#"EffectRegistry { factories: ["video"] }"#
    );
}
