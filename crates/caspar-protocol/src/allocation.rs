//! Channel and layer destinations addressed by commands.
//!
//! An [`Allocation`] is written on the wire as `<channel>` or
//! `<channel>-<layer>`. Identifiers are 1-based, so zero is rejected when the
//! value is built; after construction an allocation never changes.

use std::fmt;
use std::num::NonZeroU32;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::SyntaxError;

const CHANNEL_FROM_ONE: &str = "channels are numbered from 1";
const LAYER_FROM_ONE: &str = "layers are numbered from 1";

/// Server channel number.
pub type ChannelId = NonZeroU32;

/// Layer number within a channel.
pub type LayerId = NonZeroU32;

/// Destination of a command: a channel, optionally narrowed to one layer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Allocation {
    channel: ChannelId,
    layer: Option<LayerId>,
}

impl Allocation {
    /// Builds an allocation from already validated identifiers.
    #[must_use]
    pub const fn from_ids(channel: ChannelId, layer: Option<LayerId>) -> Self {
        Self { channel, layer }
    }

    /// Addresses a whole channel.
    ///
    /// # Errors
    ///
    /// Returns [`SyntaxError::InvalidAllocation`] when `channel` is zero.
    pub fn channel(channel: u32) -> Result<Self, SyntaxError> {
        Ok(Self::from_ids(non_zero(channel, CHANNEL_FROM_ONE)?, None))
    }

    /// Addresses one layer of a channel.
    ///
    /// # Errors
    ///
    /// Returns [`SyntaxError::InvalidAllocation`] when either id is zero.
    pub fn layer(channel: u32, layer: u32) -> Result<Self, SyntaxError> {
        Ok(Self::from_ids(
            non_zero(channel, CHANNEL_FROM_ONE)?,
            Some(non_zero(layer, LAYER_FROM_ONE)?),
        ))
    }

    /// Channel id.
    #[must_use]
    pub const fn channel_id(&self) -> ChannelId {
        self.channel
    }

    /// Layer id, when the allocation targets a single layer.
    #[must_use]
    pub const fn layer_id(&self) -> Option<LayerId> {
        self.layer
    }

    /// Returns the same channel narrowed to `layer`.
    #[must_use]
    pub const fn with_layer(self, layer: LayerId) -> Self {
        Self::from_ids(self.channel, Some(layer))
    }

    /// Returns the channel this allocation belongs to, without any layer.
    #[must_use]
    pub const fn channel_only(self) -> Self {
        Self::from_ids(self.channel, None)
    }
}

fn non_zero(value: u32, reason: &'static str) -> Result<NonZeroU32, SyntaxError> {
    NonZeroU32::new(value).ok_or_else(|| SyntaxError::InvalidAllocation {
        input: value.to_string(),
        reason,
    })
}

impl fmt::Display for Allocation {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.layer {
            Some(layer) => write!(formatter, "{}-{layer}", self.channel),
            None => write!(formatter, "{}", self.channel),
        }
    }
}

impl FromStr for Allocation {
    type Err = SyntaxError;

    fn from_str(input: &str) -> Result<Self, Self::Err> {
        let invalid = |reason| SyntaxError::InvalidAllocation {
            input: input.to_owned(),
            reason,
        };
        let (channel_text, layer_text) = match input.split_once('-') {
            Some((channel, layer)) => (channel, Some(layer)),
            None => (input, None),
        };
        if channel_text.is_empty() {
            return Err(invalid("missing channel"));
        }
        let channel = channel_text
            .parse::<NonZeroU32>()
            .map_err(|_| invalid("channel must be a positive integer"))?;
        let layer = layer_text
            .map(|text| {
                text.parse::<NonZeroU32>()
                    .map_err(|_| invalid("layer must be a positive integer"))
            })
            .transpose()?;
        Ok(Self::from_ids(channel, layer))
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn renders_channel_and_layer() {
        let channel = Allocation::channel(1).expect("valid channel");
        let layer = Allocation::layer(2, 10).expect("valid layer");
        assert_eq!(channel.to_string(), "1");
        assert_eq!(layer.to_string(), "2-10");
    }

    #[rstest]
    #[case("1", 1, None)]
    #[case("3-20", 3, Some(20))]
    fn parses_wire_form(#[case] input: &str, #[case] channel: u32, #[case] layer: Option<u32>) {
        let allocation: Allocation = input.parse().expect("valid allocation");
        assert_eq!(allocation.channel_id().get(), channel);
        assert_eq!(allocation.layer_id().map(NonZeroU32::get), layer);
    }

    #[rstest]
    #[case("")]
    #[case("-10")]
    #[case("0")]
    #[case("1-0")]
    #[case("one-2")]
    #[case("1-")]
    fn rejects_malformed_input(#[case] input: &str) {
        let error = input.parse::<Allocation>().expect_err("input should be rejected");
        assert!(matches!(error, SyntaxError::InvalidAllocation { .. }));
    }

    #[test]
    fn zero_ids_are_rejected_at_construction() {
        assert!(Allocation::channel(0).is_err());
        assert!(Allocation::layer(1, 0).is_err());
    }

    #[test]
    fn narrowing_and_widening_keep_channel() {
        let layer = Allocation::channel(4)
            .expect("valid channel")
            .with_layer(NonZeroU32::MIN.saturating_add(9));
        assert_eq!(layer.to_string(), "4-10");
        assert_eq!(layer.channel_only().to_string(), "4");
    }
}
