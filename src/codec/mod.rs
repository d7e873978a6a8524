//! Encode/decode dispatch over the two engine generations.
//!
//! Both generations implement [`WaveletCodec`]. The generation is always
//! chosen by the caller; the compressed stream is never sniffed.
//!
//! Every call is self-contained: it creates its own native structures and
//! buffers and releases them before returning, on success and on failure.

pub mod current;
pub mod legacy;

use std::os::raw::c_int;

use log::warn;

use crate::error::SwiError;
use crate::options::{CompressionOptions, DecompressionOptions};
use crate::sys::SwiApi;
use crate::{BitDepth, CompressedImage, RawImage, pixel_buffer_len};

pub use current::{decode as decode_current, encode as encode_current};
pub use legacy::{decode as decode_legacy, encode as encode_legacy};

/// Engine protocol generation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Generation {
    /// `Wi*` entry points with staged decompression.
    #[default]
    Current,
    /// Obsolete `Si*` entry points.
    Legacy,
}

impl Generation {
    pub fn default_compression(self) -> CompressionOptions {
        match self {
            Generation::Current => CompressionOptions::current(),
            Generation::Legacy => CompressionOptions::legacy(),
        }
    }
}

/// One logical encode/decode contract for both generations.
pub trait WaveletCodec {
    fn generation(&self) -> Generation;

    fn encode(
        &self,
        image: &RawImage,
        options: &CompressionOptions,
    ) -> Result<CompressedImage, SwiError>;

    fn decode(
        &self,
        compressed: &CompressedImage,
        options: &DecompressionOptions,
    ) -> Result<RawImage, SwiError>;

    /// Encode with this generation's default options.
    fn encode_default(&self, image: &RawImage) -> Result<CompressedImage, SwiError> {
        self.encode(image, &self.generation().default_compression())
    }

    fn decode_default(&self, compressed: &CompressedImage) -> Result<RawImage, SwiError> {
        self.decode(compressed, &DecompressionOptions::default())
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct CurrentCodec<A> {
    engine: A,
}

impl<A: SwiApi> CurrentCodec<A> {
    pub fn new(engine: A) -> Self {
        Self { engine }
    }
}

impl<A: SwiApi> WaveletCodec for CurrentCodec<A> {
    fn generation(&self) -> Generation {
        Generation::Current
    }

    fn encode(
        &self,
        image: &RawImage,
        options: &CompressionOptions,
    ) -> Result<CompressedImage, SwiError> {
        current::encode(&self.engine, image, options)
    }

    fn decode(
        &self,
        compressed: &CompressedImage,
        options: &DecompressionOptions,
    ) -> Result<RawImage, SwiError> {
        current::decode(&self.engine, compressed, options)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct LegacyCodec<A> {
    engine: A,
}

impl<A: SwiApi> LegacyCodec<A> {
    pub fn new(engine: A) -> Self {
        Self { engine }
    }
}

impl<A: SwiApi> WaveletCodec for LegacyCodec<A> {
    fn generation(&self) -> Generation {
        Generation::Legacy
    }

    fn encode(
        &self,
        image: &RawImage,
        options: &CompressionOptions,
    ) -> Result<CompressedImage, SwiError> {
        legacy::encode(&self.engine, image, options)
    }

    fn decode(
        &self,
        compressed: &CompressedImage,
        options: &DecompressionOptions,
    ) -> Result<RawImage, SwiError> {
        legacy::decode(&self.engine, compressed, options)
    }
}

/// Codec selected by a caller-supplied [`Generation`].
#[derive(Debug, Clone, Copy)]
pub enum Codec<A> {
    Current(CurrentCodec<A>),
    Legacy(LegacyCodec<A>),
}

impl<A: SwiApi> Codec<A> {
    pub fn new(engine: A, generation: Generation) -> Self {
        match generation {
            Generation::Current => Codec::Current(CurrentCodec::new(engine)),
            Generation::Legacy => Codec::Legacy(LegacyCodec::new(engine)),
        }
    }
}

impl<A: SwiApi> WaveletCodec for Codec<A> {
    fn generation(&self) -> Generation {
        match self {
            Codec::Current(codec) => codec.generation(),
            Codec::Legacy(codec) => codec.generation(),
        }
    }

    fn encode(
        &self,
        image: &RawImage,
        options: &CompressionOptions,
    ) -> Result<CompressedImage, SwiError> {
        match self {
            Codec::Current(codec) => codec.encode(image, options),
            Codec::Legacy(codec) => codec.encode(image, options),
        }
    }

    fn decode(
        &self,
        compressed: &CompressedImage,
        options: &DecompressionOptions,
    ) -> Result<RawImage, SwiError> {
        match self {
            Codec::Current(codec) => codec.decode(compressed, options),
            Codec::Legacy(codec) => codec.decode(compressed, options),
        }
    }
}

/// Geometry in the engine's integer types, checked before any native call.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EncodeGeometry {
    pub width: c_int,
    pub height: c_int,
    pub depth: BitDepth,
}

impl EncodeGeometry {
    pub fn color(&self) -> c_int {
        self.depth.color_mode().into()
    }

    pub fn bits_per_pixel(&self) -> c_int {
        u32::from(self.depth) as c_int
    }
}

/// Everything checked before a structure is created. Empty images pass; the
/// engine decides what to make of them.
pub(crate) fn preflight(
    image: &RawImage,
    options: &CompressionOptions,
    generation: Generation,
) -> Result<EncodeGeometry, SwiError> {
    let depth = image.bit_depth()?;
    let width = c_int::try_from(image.width)
        .map_err(|_| SwiError::InvalidGeometry(format!("width {} too large", image.width)))?;
    let height = c_int::try_from(image.height)
        .map_err(|_| SwiError::InvalidGeometry(format!("height {} too large", image.height)))?;
    let expected = pixel_buffer_len(image.width, image.height, depth).ok_or_else(|| {
        SwiError::InvalidGeometry(format!("{}x{} image is too large", image.width, image.height))
    })?;
    if image.pixels.len() != expected {
        return Err(SwiError::InvalidGeometry(format!(
            "{}x{} at {} bpp needs {} bytes, buffer holds {}",
            image.width,
            image.height,
            image.bits_per_pixel,
            expected,
            image.pixels.len()
        )));
    }
    options.validate_for(generation)?;
    Ok(EncodeGeometry {
        width,
        height,
        depth,
    })
}

/// Geometry reported by the engine after decoding.
pub(crate) fn decoded_geometry(
    width: c_int,
    height: c_int,
    color: c_int,
    bits_per_pixel: c_int,
) -> Result<(u32, u32, BitDepth, usize), SwiError> {
    let depth = BitDepth::from_engine(color, bits_per_pixel).inspect_err(|err| warn!("{err}"))?;
    let (Ok(w), Ok(h)) = (u32::try_from(width), u32::try_from(height)) else {
        return Err(SwiError::InvalidGeometry(format!(
            "engine reported {width}x{height}"
        )));
    };
    let len = pixel_buffer_len(w, h, depth)
        .ok_or_else(|| SwiError::InvalidGeometry(format!("engine reported {w}x{h}")))?;
    Ok((w, h, depth, len))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockEngine;
    use crate::options::RatioControl;

    #[test]
    fn preflight_rejects_length_mismatch() {
        let image = RawImage::new(vec![0; 15], 4, 4, 8);
        let err = preflight(&image, &CompressionOptions::current(), Generation::Current).unwrap_err();
        assert!(matches!(err, SwiError::InvalidGeometry(_)));
    }

    #[test]
    fn preflight_passes_empty_image() {
        let image = RawImage::new(vec![], 0, 4, 8);
        let geometry = preflight(&image, &CompressionOptions::current(), Generation::Current).unwrap();
        assert_eq!((geometry.width, geometry.height), (0, 4));
    }

    #[test]
    fn preflight_rejects_legacy_floor() {
        let image = RawImage::new(vec![0; 16], 4, 4, 8);
        let mut options = CompressionOptions::legacy();
        options.control = RatioControl::Floor;
        assert!(matches!(
            preflight(&image, &options, Generation::Legacy),
            Err(SwiError::InvalidOptions(_))
        ));
        assert!(preflight(&image, &options, Generation::Current).is_ok());
    }

    #[test]
    fn preflight_rejects_oversized_width() {
        let image = RawImage::new(vec![], u32::MAX, 1, 8);
        assert!(preflight(&image, &CompressionOptions::current(), Generation::Current).is_err());
    }

    #[test]
    fn preflight_reports_abi_values() {
        let image = RawImage::new(vec![0; 12], 2, 2, 24);
        let geometry = preflight(&image, &CompressionOptions::current(), Generation::Current).unwrap();
        assert_eq!(geometry.color(), 1);
        assert_eq!(geometry.bits_per_pixel(), 24);
    }

    #[test]
    fn decoded_geometry_rejects_negative_size() {
        assert!(decoded_geometry(-1, 4, 0, 8).is_err());
        assert_eq!(decoded_geometry(4, 4, 0, 8).unwrap().3, 16);
    }

    #[test]
    fn dispatcher_follows_generation() {
        let engine = MockEngine::new();
        assert_eq!(Codec::new(&engine, Generation::Legacy).generation(), Generation::Legacy);
        assert_eq!(Codec::new(&engine, Generation::Current).generation(), Generation::Current);
    }

    #[test]
    fn default_options_per_generation() {
        assert_eq!(Generation::Current.default_compression().quality, 0.50);
        assert_eq!(Generation::Legacy.default_compression().quality, 0.27);
    }
}
