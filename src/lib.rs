//! Safe façade over the swi32 wavelet image (WI) compression engine.
//!
//! The engine is a closed-source native library reached through a fixed C
//! ABI. This crate drives it through its struct-based protocol and guarantees
//! that every structure and buffer allocated for a call is released exactly
//! once, by the party that owns it.
//!
//! Two protocol generations are supported behind one [`WaveletCodec`]
//! contract:
//!
//! | Generation | Encode | Decode | Default quality |
//! |------------|--------|--------|-----------------|
//! | [`Generation::Current`] | `WiCompress` | begin / header / sub-image / end | 0.50 |
//! | [`Generation::Legacy`]  | `SiCompress` | `SiDecompress` | 0.27 |
//!
//! Only 8 bpp grayscale and 24 bpp RGB images are supported.
//!
//! Native structures and the buffers attached to them stay inside the crate.
//! Callers only see managed images, options and errors:
//!
//! ```compile_fail,E0603
//! use swi_rs::handle::Handle;
//! ```

pub mod codec;
pub mod error;
pub mod formats;
mod handle;
mod marshal;
#[cfg(any(test, feature = "mock"))]
pub mod mock;
pub mod options;
pub mod pipeline;
pub mod sys;

pub use codec::{Codec, CurrentCodec, Generation, LegacyCodec, WaveletCodec};
pub use error::{Stage, SwiError};
pub use options::{
    CompressionOptions, DecompressionOptions, EncodePath, Encoder, FocusBox, Progressive,
    RatioControl,
};

#[cfg(feature = "swi32")]
pub use sys::Swi32;

use num_enum::{IntoPrimitive, TryFromPrimitive};

/// Supported pixel layouts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u32)]
pub enum BitDepth {
    /// One 8-bit luminance sample per pixel.
    Gray8 = 8,
    /// Three 8-bit samples per pixel, R G B.
    Rgb24 = 24,
}

impl BitDepth {
    pub fn bytes_per_pixel(self) -> usize {
        match self {
            BitDepth::Gray8 => 1,
            BitDepth::Rgb24 => 3,
        }
    }

    pub fn color_mode(self) -> ColorMode {
        match self {
            BitDepth::Gray8 => ColorMode::Grayscale,
            BitDepth::Rgb24 => ColorMode::Color,
        }
    }

    /// The engine reports color and depth separately; only the two matching
    /// combinations are accepted.
    pub fn from_engine(color: i32, bits_per_pixel: i32) -> Result<Self, SwiError> {
        match (color, bits_per_pixel) {
            (0, 8) => Ok(BitDepth::Gray8),
            (1, 24) => Ok(BitDepth::Rgb24),
            _ => Err(SwiError::UnsupportedFormat {
                color,
                bits_per_pixel,
            }),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i32)]
pub enum ColorMode {
    Grayscale = 0,
    Color = 1,
}

/// Uncompressed pixels plus geometry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RawImage {
    pub pixels: Vec<u8>,
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
}

impl RawImage {
    /// Build an image without validating it; [`WaveletCodec::encode`]
    /// rejects unsupported geometry before touching the engine.
    pub fn new(pixels: Vec<u8>, width: u32, height: u32, bits_per_pixel: u32) -> Self {
        Self {
            pixels,
            width,
            height,
            bits_per_pixel,
        }
    }

    pub fn bit_depth(&self) -> Result<BitDepth, SwiError> {
        BitDepth::try_from(self.bits_per_pixel).map_err(|_| SwiError::UnsupportedBitDepth {
            bits_per_pixel: self.bits_per_pixel,
        })
    }

    /// 0 for grayscale, 1 for color, derived from the bit depth.
    pub fn color_mode(&self) -> ColorMode {
        if self.bits_per_pixel == 8 {
            ColorMode::Grayscale
        } else {
            ColorMode::Color
        }
    }

    /// `width × height × bytes per pixel`, or `None` on overflow or an
    /// unsupported depth.
    pub fn expected_len(&self) -> Option<usize> {
        let depth = self.bit_depth().ok()?;
        pixel_buffer_len(self.width, self.height, depth)
    }
}

pub(crate) fn pixel_buffer_len(width: u32, height: u32, depth: BitDepth) -> Option<usize> {
    (width as usize)
        .checked_mul(height as usize)?
        .checked_mul(depth.bytes_per_pixel())
}

/// Opaque compressed WI stream.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct CompressedImage {
    pub data: Vec<u8>,
}

impl CompressedImage {
    pub fn new(data: Vec<u8>) -> Self {
        Self { data }
    }

    pub fn len(&self) -> usize {
        self.data.len()
    }

    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.data
    }
}

impl From<Vec<u8>> for CompressedImage {
    fn from(data: Vec<u8>) -> Self {
        Self { data }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn color_mode_derives_from_depth() {
        assert_eq!(RawImage::new(vec![], 0, 0, 8).color_mode(), ColorMode::Grayscale);
        assert_eq!(RawImage::new(vec![], 0, 0, 24).color_mode(), ColorMode::Color);
    }

    #[test]
    fn expected_len_per_depth() {
        assert_eq!(RawImage::new(vec![], 4, 4, 8).expected_len(), Some(16));
        assert_eq!(RawImage::new(vec![], 2, 2, 24).expected_len(), Some(12));
        assert_eq!(RawImage::new(vec![], 2, 2, 16).expected_len(), None);
    }

    #[test]
    fn engine_format_pairs() {
        assert_eq!(BitDepth::from_engine(0, 8).unwrap(), BitDepth::Gray8);
        assert_eq!(BitDepth::from_engine(1, 24).unwrap(), BitDepth::Rgb24);
        assert!(matches!(
            BitDepth::from_engine(1, 8),
            Err(SwiError::UnsupportedFormat { color: 1, bits_per_pixel: 8 })
        ));
        assert!(BitDepth::from_engine(0, 24).is_err());
    }

    #[test]
    fn unsupported_depth() {
        let err = RawImage::new(vec![], 1, 1, 16).bit_depth().unwrap_err();
        assert!(matches!(err, SwiError::UnsupportedBitDepth { bits_per_pixel: 16 }));
    }
}
