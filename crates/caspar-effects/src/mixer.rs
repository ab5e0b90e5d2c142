//! `MIXER` command builder.
//!
//! Mixer commands change a layer's geometry. Each property may carry a
//! [`Tween`] so the server animates the change rather than cutting to it:
//!
//! ```text
//! MIXER 1-10 FILL 0.25 0.25 0.5 0.5 25 easeinsine
//! MIXER 1-10 CLIP 0.25 0.25 0.5 0.5 25 easeinsine
//! ```

use std::fmt;

use caspar_protocol::{Command, verbs};
use serde::{Deserialize, Serialize};

const FILL: &str = "FILL";
const CLIP: &str = "CLIP";

/// Animation applied to a mixer change.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Tween {
    /// Length of the animation in frames.
    pub duration: u32,
    /// Easing curve name understood by the server, such as `linear` or
    /// `easeinsine`.
    pub curve: String,
}

impl Tween {
    /// Tween with the given curve.
    #[must_use]
    pub fn new(duration: u32, curve: impl Into<String>) -> Self {
        Self {
            duration,
            curve: curve.into(),
        }
    }

    /// Linear tween.
    #[must_use]
    pub fn linear(duration: u32) -> Self {
        Self::new(duration, "linear")
    }

    fn push_arguments(&self, args: &mut Vec<String>) {
        args.push(self.duration.to_string());
        args.push(self.curve.clone());
    }
}

impl fmt::Display for Tween {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(formatter, "{} {}", self.duration, self.curve)
    }
}

/// Offset and per-axis scale of the layer's picture.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FillParams {
    /// Horizontal offset.
    pub x: f64,
    /// Vertical offset.
    pub y: f64,
    /// Horizontal scale.
    pub x_scale: f64,
    /// Vertical scale.
    pub y_scale: f64,
}

/// Visible window of the layer, in output coordinates.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ClipParams {
    /// Left edge.
    pub x: f64,
    /// Top edge.
    pub y: f64,
    /// Window width.
    pub width: f64,
    /// Window height.
    pub height: f64,
}

/// Collects `MIXER` property changes into one grouped command.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MixerCommand {
    fill: Option<(FillParams, Option<Tween>)>,
    clip: Option<(ClipParams, Option<Tween>)>,
}

impl MixerCommand {
    /// Empty builder.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the fill.
    #[must_use]
    pub fn fill(mut self, params: FillParams, tween: Option<Tween>) -> Self {
        self.fill = Some((params, tween));
        self
    }

    /// Sets the clip.
    #[must_use]
    pub fn clip(mut self, params: ClipParams, tween: Option<Tween>) -> Self {
        self.clip = Some((params, tween));
        self
    }

    /// Returns `true` when a clip is part of the command.
    #[must_use]
    pub const fn has_clip(&self) -> bool {
        self.clip.is_some()
    }

    /// Builds the unallocated command group.
    #[must_use]
    pub fn build(&self) -> Command {
        let mut members = Vec::new();
        if let Some((fill, tween)) = &self.fill {
            members.push(property(
                FILL,
                [fill.x, fill.y, fill.x_scale, fill.y_scale],
                tween.as_ref(),
            ));
        }
        if let Some((clip, tween)) = &self.clip {
            members.push(property(
                CLIP,
                [clip.x, clip.y, clip.width, clip.height],
                tween.as_ref(),
            ));
        }
        Command::Group(members)
    }
}

fn property(name: &str, values: [f64; 4], tween: Option<&Tween>) -> Command {
    let mut args = Vec::with_capacity(7);
    args.push(name.to_owned());
    args.extend(values.iter().map(ToString::to_string));
    if let Some(animation) = tween {
        animation.push_arguments(&mut args);
    }
    Command::simple_with_args(verbs::MIXER, args)
}
