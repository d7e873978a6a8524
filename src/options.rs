//! Compression and decompression options for both engine generations.

use std::os::raw::c_int;

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::codec::Generation;
use crate::error::SwiError;
use crate::sys::{SiBox, SiCmpOption, SiDecmpOption, WiBox, WiCmpOptions, WiDecmpOptions};

/// Default quality of the current generation.
pub const CURRENT_DEFAULT_QUALITY: f32 = 0.50;

/// Default quality of the legacy generation.
pub const LEGACY_DEFAULT_QUALITY: f32 = 0.27;

/// Wavelet encoder variant.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum Encoder {
    Slow = 0,
    /// Fast and gives high quality.
    Normal = 1,
    Fast = 2,
    Fastest = 3,
}

/// Encoder path.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum EncodePath {
    Path1 = 0,
    Path2 = 1,
    /// Usually good for high compression.
    Path3 = 2,
}

/// How the engine decides how hard to compress.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum RatioControl {
    /// Driven by [`CompressionOptions::quality`].
    Quality = 0,
    /// Closest achievable ratio to [`CompressionOptions::compression_ratio`].
    ClosestRatio = 1,
    /// Ratio never below [`CompressionOptions::compression_ratio`].
    Floor = 2,
}

/// Progressive decompression mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum Progressive {
    None = 0,
    Normal = 1,
    Fast = 2,
}

/// Region of interest, in pixels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct FocusBox {
    pub left: i32,
    pub top: i32,
    pub right: i32,
    pub bottom: i32,
}

impl From<FocusBox> for WiBox {
    fn from(b: FocusBox) -> Self {
        WiBox {
            left: b.left,
            top: b.top,
            right: b.right,
            bottom: b.bottom,
        }
    }
}

impl From<FocusBox> for SiBox {
    fn from(b: FocusBox) -> Self {
        SiBox {
            left: b.left,
            top: b.top,
            right: b.right,
            bottom: b.bottom,
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompressionOptions {
    /// Target quality in `[0, 1]`.
    pub quality: f32,
    pub compression_ratio: f32,
    pub control: RatioControl,
    pub encoder: Encoder,
    pub encode_path: EncodePath,
    pub progressive: Progressive,
    pub magnification: bool,
    pub edge_enhancement: bool,
    pub contrast_enhancement: bool,
    pub focus_weight: i32,
    /// Region-of-interest boxes. Empty disables focusing.
    pub focus_boxes: Vec<FocusBox>,
    /// Current generation only.
    pub high_color_quality: i32,
    /// Current generation only.
    pub block_size: i32,
}

impl CompressionOptions {
    /// Defaults of the current `Wi*` generation.
    pub fn current() -> Self {
        Self {
            quality: CURRENT_DEFAULT_QUALITY,
            compression_ratio: 0.0,
            control: RatioControl::Quality,
            encoder: Encoder::Normal,
            encode_path: EncodePath::Path3,
            progressive: Progressive::None,
            magnification: false,
            edge_enhancement: false,
            contrast_enhancement: false,
            focus_weight: 0,
            focus_boxes: Vec::new(),
            high_color_quality: 0,
            block_size: 0,
        }
    }

    /// Defaults of the legacy `Si*` generation.
    pub fn legacy() -> Self {
        Self {
            quality: LEGACY_DEFAULT_QUALITY,
            ..Self::current()
        }
    }

    pub fn with_quality(mut self, quality: f32) -> Self {
        self.quality = quality;
        self
    }

    pub fn with_encoder(mut self, encoder: Encoder) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_encode_path(mut self, encode_path: EncodePath) -> Self {
        self.encode_path = encode_path;
        self
    }

    pub fn with_focus_boxes(mut self, boxes: Vec<FocusBox>) -> Self {
        self.focus_boxes = boxes;
        self
    }

    pub fn validate(&self) -> Result<(), SwiError> {
        if !(0.0..=1.0).contains(&self.quality) {
            return Err(SwiError::InvalidOptions("quality must be within [0, 1]"));
        }
        if !self.compression_ratio.is_finite() || self.compression_ratio < 0.0 {
            return Err(SwiError::InvalidOptions(
                "compression ratio must be a finite, non-negative number",
            ));
        }
        if c_int::try_from(self.focus_boxes.len()).is_err() {
            return Err(SwiError::InvalidOptions("too many focus boxes"));
        }
        Ok(())
    }

    /// [`CompressionOptions::validate`] plus the limits of `generation`'s
    /// schema. The legacy schema only knows "auto ratio" on or off, so
    /// [`RatioControl::Floor`] is rejected there.
    pub fn validate_for(&self, generation: Generation) -> Result<(), SwiError> {
        self.validate()?;
        if generation == Generation::Legacy && self.control == RatioControl::Floor {
            return Err(SwiError::InvalidOptions(
                "the legacy engine has no floor ratio control",
            ));
        }
        Ok(())
    }

    /// Fill a current-generation options structure. `focus_boxes` must stay
    /// alive until the engine call that reads `target` has returned.
    pub(crate) fn write_current(&self, target: &mut WiCmpOptions, focus_boxes: &mut [WiBox]) {
        target.quality = self.quality;
        target.cmp_ratio = self.compression_ratio;
        target.cmp_control = self.control.into();
        target.encoder = self.encoder.into();
        target.encode_path = self.encode_path.into();
        target.progressive = self.progressive.into();
        target.magnification = self.magnification as c_int;
        target.edge_enhancement = self.edge_enhancement as c_int;
        target.contrast_enhancement = self.contrast_enhancement as c_int;
        target.focus_weight = self.focus_weight;
        target.high_color_quality = self.high_color_quality;
        target.block_size = self.block_size;
        target.write_next_byte = None;
        target.read_scanline = None;
        if focus_boxes.is_empty() {
            target.focus_boxes = std::ptr::null_mut();
            target.n_boxes = 0;
        } else {
            target.focus_boxes = focus_boxes.as_mut_ptr();
            target.n_boxes = focus_boxes.len() as c_int;
        }
    }

    /// Fill a legacy options structure. Call only after
    /// [`CompressionOptions::validate_for`] accepted the legacy generation.
    pub(crate) fn write_legacy(&self, target: &mut SiCmpOption, focus_boxes: &mut [SiBox]) {
        target.auto_ratio = match self.control {
            RatioControl::Quality => 0,
            RatioControl::ClosestRatio | RatioControl::Floor => 1,
        };
        target.quality = self.quality;
        target.cmp_ratio = self.compression_ratio;
        target.encoder = self.encoder.into();
        target.encode_path = self.encode_path.into();
        target.progressive = self.progressive.into();
        target.magnification = self.magnification as c_int;
        target.edge_enhancement = self.edge_enhancement as c_int;
        target.contrast_enhancement = self.contrast_enhancement as c_int;
        target.focus_weight = self.focus_weight;
        target.write_next_byte = None;
        if focus_boxes.is_empty() {
            target.focus_boxes = std::ptr::null_mut();
            target.n_boxes = 0;
        } else {
            target.focus_boxes = focus_boxes.as_mut_ptr();
            target.n_boxes = focus_boxes.len() as c_int;
        }
    }
}

impl Default for CompressionOptions {
    fn default() -> Self {
        Self::current()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecompressionOptions {
    pub smoothing: bool,
    pub fast: bool,
    pub sharpening: bool,
    /// Current generation only.
    pub magnification: i32,
}

impl DecompressionOptions {
    pub(crate) fn write_current(&self, target: &mut WiDecmpOptions) {
        target.smoothing = self.smoothing as c_int;
        target.fast = self.fast as c_int;
        target.sharpening = self.sharpening as c_int;
        target.magnification = self.magnification;
        target.read_next_byte = None;
        target.read_param = std::ptr::null_mut();
        target.write_scanline = None;
        target.write_app_extension = None;
    }

    pub(crate) fn write_legacy(&self, target: &mut SiDecmpOption) {
        target.smoothing = self.smoothing as c_int;
        target.fast = self.fast as c_int;
        target.sharpening = self.sharpening as c_int;
        target.read_next_byte = None;
        target.read_param = std::ptr::null_mut();
        target.write_scanline = None;
    }
}

impl Default for DecompressionOptions {
    fn default() -> Self {
        Self {
            smoothing: false,
            fast: false,
            sharpening: true,
            magnification: 0,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::sys;

    #[test]
    fn generation_defaults() {
        let current = CompressionOptions::current();
        assert_eq!(current.quality, 0.50);
        assert_eq!(current.encoder, Encoder::Normal);
        assert_eq!(current.encode_path, EncodePath::Path3);
        assert_eq!(current.control, RatioControl::Quality);
        assert!(current.focus_boxes.is_empty());

        let legacy = CompressionOptions::legacy();
        assert_eq!(legacy.quality, 0.27);
        assert_eq!(legacy.encoder, Encoder::Normal);
    }

    #[test]
    fn decompression_defaults_sharpen_only() {
        let options = DecompressionOptions::default();
        assert!(options.sharpening);
        assert!(!options.smoothing);
        assert!(!options.fast);
    }

    #[test]
    fn quality_out_of_range_rejected() {
        assert!(CompressionOptions::current().with_quality(1.5).validate().is_err());
        assert!(CompressionOptions::current().with_quality(f32::NAN).validate().is_err());
        assert!(CompressionOptions::current().with_quality(1.0).validate().is_ok());
    }

    #[test]
    fn current_schema_fields() {
        let options = CompressionOptions::current()
            .with_encoder(Encoder::Fastest)
            .with_focus_boxes(vec![FocusBox {
                left: 1,
                top: 2,
                right: 3,
                bottom: 4,
            }]);
        let mut boxes: Vec<WiBox> = options.focus_boxes.iter().copied().map(Into::into).collect();
        let mut native = WiCmpOptions::default();
        options.write_current(&mut native, &mut boxes);
        assert_eq!(native.encoder, sys::E_FASTEST);
        assert_eq!(native.encode_path, sys::P_PATH3);
        assert_eq!(native.n_boxes, 1);
        assert_eq!(native.focus_boxes, boxes.as_mut_ptr());
    }

    #[test]
    fn legacy_schema_has_no_floor() {
        let mut options = CompressionOptions::legacy();
        options.control = RatioControl::Floor;
        assert!(matches!(
            options.validate_for(Generation::Legacy),
            Err(SwiError::InvalidOptions(_))
        ));
        assert!(options.validate_for(Generation::Current).is_ok());

        options.control = RatioControl::ClosestRatio;
        options.validate_for(Generation::Legacy).unwrap();
        let mut native = SiCmpOption::default();
        options.write_legacy(&mut native, &mut []);
        assert_eq!(native.auto_ratio, 1);
        assert!(native.focus_boxes.is_null());
    }

    #[test]
    fn discriminants_match_abi_constants() {
        assert_eq!(i32::from(Encoder::Slow), sys::E_SLOW);
        assert_eq!(i32::from(Encoder::Fastest), sys::E_FASTEST);
        assert_eq!(i32::from(EncodePath::Path2), sys::P_PATH2);
        assert_eq!(i32::from(RatioControl::Floor), sys::CR_FLOOR);
        assert_eq!(i32::from(Progressive::Fast), sys::PR_FAST);
    }

    #[test]
    fn encoder_round_trips_through_abi_value() {
        assert_eq!(Encoder::try_from(sys::E_FAST).unwrap(), Encoder::Fast);
        assert!(Encoder::try_from(9).is_err());
    }
}
