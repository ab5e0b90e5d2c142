//! Rectangle pairs mapped onto mixer fill and clip parameters.
//!
//! Both rectangles live in the normalised output plane, `0..1` on each axis.
//! The source rectangle is the crop window into the layer's picture; the
//! destination rectangle is where that window should appear. Filling scales
//! the whole picture so that the crop window lands exactly on the
//! destination, and clipping hides everything outside the destination.

use serde::{Deserialize, Serialize};

use crate::error::GeometryError;
use crate::mixer::{ClipParams, FillParams, MixerCommand, Tween};
use caspar_protocol::Command;

/// A point in the normalised plane.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    /// Horizontal coordinate.
    pub x: f64,
    /// Vertical coordinate.
    pub y: f64,
}

/// An axis-aligned rectangle given by two corners.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Rect {
    /// Top-left corner.
    pub start: Point,
    /// Bottom-right corner.
    pub end: Point,
}

impl Rect {
    /// Rectangle from corner coordinates.
    #[must_use]
    pub const fn new(start_x: f64, start_y: f64, end_x: f64, end_y: f64) -> Self {
        Self {
            start: Point {
                x: start_x,
                y: start_y,
            },
            end: Point { x: end_x, y: end_y },
        }
    }

    /// The full plane.
    #[must_use]
    pub const fn unit() -> Self {
        Self::new(0.0, 0.0, 1.0, 1.0)
    }

    /// Horizontal extent.
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "geometry is computed in floating point")]
    pub fn width(&self) -> f64 {
        self.end.x - self.start.x
    }

    /// Vertical extent.
    #[must_use]
    #[expect(clippy::float_arithmetic, reason = "geometry is computed in floating point")]
    pub fn height(&self) -> f64 {
        self.end.y - self.start.y
    }

    /// Returns `true` when the rectangle covers exactly the full plane.
    #[must_use]
    pub fn is_unit(&self) -> bool {
        *self == Self::unit()
    }

    fn check_finite(&self, parameter: &'static str) -> Result<(), GeometryError> {
        let coordinates = [self.start.x, self.start.y, self.end.x, self.end.y];
        if coordinates.iter().all(|value| value.is_finite()) {
            Ok(())
        } else {
            Err(GeometryError::NonFinite { parameter })
        }
    }
}

/// Placement of a cropped picture, with optional animation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transform {
    /// Crop window into the picture.
    pub source: Rect,
    /// Where the crop window is shown.
    pub destination: Rect,
    /// Animation applied to the fill.
    pub fill_tween: Option<Tween>,
    /// Animation applied to the clip.
    pub crop_tween: Option<Tween>,
}

impl Transform {
    /// Transform without animation.
    #[must_use]
    pub const fn new(source: Rect, destination: Rect) -> Self {
        Self {
            source,
            destination,
            fill_tween: None,
            crop_tween: None,
        }
    }

    /// Transform from `[source start x, y, source end x, y, destination start
    /// x, y, destination end x, y]`.
    #[must_use]
    pub const fn from_array(values: [f64; 8]) -> Self {
        let [sx, sy, ex, ey, dsx, dsy, dex, dey] = values;
        Self::new(Rect::new(sx, sy, ex, ey), Rect::new(dsx, dsy, dex, dey))
    }

    /// Uses `tween` for both fill and clip.
    pub fn set_tween(&mut self, tween: Option<Tween>) {
        self.crop_tween.clone_from(&tween);
        self.fill_tween = tween;
    }

    /// Uses separate animations for fill and clip.
    pub fn set_tweens(&mut self, fill: Option<Tween>, crop: Option<Tween>) {
        self.fill_tween = fill;
        self.crop_tween = crop;
    }

    /// Returns the transform with `tween` applied to fill and clip.
    #[must_use]
    pub fn with_tween(mut self, tween: Tween) -> Self {
        self.set_tween(Some(tween));
        self
    }

    /// Checks that every parameter can be computed.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] for non-finite coordinates or a crop
    /// rectangle without width or height.
    pub fn validate(&self) -> Result<(), GeometryError> {
        self.fill().map(|_| ())
    }

    /// Offset and scale mapping the crop window onto the destination.
    ///
    /// Per axis, `scale = destination extent / source extent` and
    /// `offset = destination start - source start * scale`.
    ///
    /// # Errors
    ///
    /// Returns [`GeometryError`] for non-finite input or a zero-extent crop
    /// rectangle.
    #[expect(
        clippy::float_arithmetic,
        clippy::float_cmp,
        reason = "geometry is computed in floating point; only an exact zero extent is degenerate"
    )]
    pub fn fill(&self) -> Result<FillParams, GeometryError> {
        self.source.check_finite("source")?;
        self.destination.check_finite("destination")?;

        let source_width = self.source.width();
        let source_height = self.source.height();
        if source_width == 0.0 {
            return Err(GeometryError::ZeroExtent { axis: "width" });
        }
        if source_height == 0.0 {
            return Err(GeometryError::ZeroExtent { axis: "height" });
        }

        let x_scale = self.destination.width() / source_width;
        let y_scale = self.destination.height() / source_height;
        let params = FillParams {
            x: self.source.start.x.mul_add(-x_scale, self.destination.start.x),
            y: self.source.start.y.mul_add(-y_scale, self.destination.start.y),
            x_scale,
            y_scale,
        };
        let values = [params.x, params.y, params.x_scale, params.y_scale];
        if values.iter().all(|value| value.is_finite()) {
            Ok(params)
        } else {
            Err(GeometryError::NonFinite { parameter: "fill" })
        }
    }

    /// Destination window, present only when the source crops the picture.
    #[must_use]
    pub fn clip(&self) -> Option<ClipParams> {
        (!self.source.is_unit()).then(|| ClipParams {
            x: self.destination.start.x,
            y: self.destination.start.y,
            width: self.destination.width(),
            height: self.destination.height(),
        })
    }

    /// Mixer changes for this transform.
    ///
    /// # Errors
    ///
    /// Returns the [`GeometryError`] raised by [`Transform::fill`].
    pub fn mixer(&self) -> Result<MixerCommand, GeometryError> {
        let mixer = MixerCommand::new().fill(self.fill()?, self.fill_tween.clone());
        Ok(match self.clip() {
            Some(clip) => mixer.clip(clip, self.crop_tween.clone()),
            None => mixer,
        })
    }

    /// Unallocated command group applying this transform.
    ///
    /// # Errors
    ///
    /// Returns the [`GeometryError`] raised by [`Transform::fill`].
    pub fn command(&self) -> Result<Command, GeometryError> {
        self.mixer().map(|mixer| mixer.build())
    }
}

impl Default for Transform {
    fn default() -> Self {
        Self::new(Rect::unit(), Rect::unit())
    }
}
