//! File-to-file conversion between conventional images and WI streams.
//!
//! Output files are written only once every step before them succeeded, so
//! a failed conversion never leaves a partial file behind.

use std::fs;
use std::path::{Path, PathBuf};

use log::{debug, info};

use crate::codec::WaveletCodec;
use crate::error::SwiError;
use crate::formats::{FormatRegistry, encode_from_pixels};
use crate::options::{CompressionOptions, DecompressionOptions};
use crate::{BitDepth, CompressedImage, RawImage};

pub const WI_EXTENSION: &str = "wi";

/// `image_path` with its extension replaced by `.wi`, in the same directory.
pub fn default_wi_path(image_path: &Path) -> PathBuf {
    image_path.with_extension(WI_EXTENSION)
}

/// Read a conventional image, compress it and write the WI stream to
/// `wi_path` (or [`default_wi_path`]). Returns the path written.
pub fn encode_file<C: WaveletCodec + ?Sized>(
    codec: &C,
    registry: &FormatRegistry,
    image_path: &Path,
    wi_path: Option<&Path>,
    options: &CompressionOptions,
) -> Result<PathBuf, SwiError> {
    let bytes = fs::read(image_path)?;
    let summary = registry.identify(&bytes)?;
    let depth = BitDepth::try_from(summary.bits_per_pixel).map_err(|_| {
        SwiError::UnsupportedBitDepth {
            bits_per_pixel: summary.bits_per_pixel,
        }
    })?;
    let pixels = registry.decode_to_pixels(&bytes, depth)?;
    let image = RawImage::new(pixels, summary.width, summary.height, depth.into());

    let compressed = codec.encode(&image, options)?;

    let out = wi_path
        .map(Path::to_path_buf)
        .unwrap_or_else(|| default_wi_path(image_path));
    fs::write(&out, compressed.as_bytes())?;
    info!(
        "encoded {} ({:?}) into {} bytes",
        image_path.display(),
        summary.format,
        compressed.len()
    );
    Ok(out)
}

/// Decompress a WI file and write it as the format selected by the extension
/// of `image_path`, creating the output directory when missing.
pub fn decode_file<C: WaveletCodec + ?Sized>(
    codec: &C,
    registry: &FormatRegistry,
    wi_path: &Path,
    image_path: &Path,
    options: &DecompressionOptions,
) -> Result<PathBuf, SwiError> {
    let profile = registry.for_path(image_path)?;
    let compressed = CompressedImage::new(fs::read(wi_path)?);

    let image = codec.decode(&compressed, options)?;
    let depth = image.bit_depth()?;
    let encoded = encode_from_pixels(&image.pixels, image.width, image.height, depth, profile)?;

    if let Some(dir) = image_path.parent().filter(|dir| !dir.as_os_str().is_empty()) {
        if !dir.exists() {
            debug!("creating {}", dir.display());
            fs::create_dir_all(dir)?;
        }
    }
    fs::write(image_path, encoded)?;
    info!(
        "decoded {} as {} {}x{}",
        wi_path.display(),
        profile.name,
        image.width,
        image.height
    );
    Ok(image_path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::codec::{Codec, CurrentCodec, Generation, LegacyCodec};
    use crate::error::Stage;
    use crate::mock::MockEngine;
    use image::ImageEncoder;
    use tempfile::tempdir;

    fn write_png(path: &Path, pixels: &[u8], width: u32, height: u32, depth: BitDepth) {
        let registry = FormatRegistry::standard();
        let profile = registry.by_extension("png").unwrap();
        fs::write(path, encode_from_pixels(pixels, width, height, depth, profile).unwrap()).unwrap();
    }

    #[test]
    fn default_path_swaps_extension() {
        assert_eq!(default_wi_path(Path::new("scans/chest.png")), Path::new("scans/chest.wi"));
        assert_eq!(default_wi_path(Path::new("plain")), Path::new("plain.wi"));
    }

    #[test]
    fn png_to_wi_and_back() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("gray.png");
        let pixels: Vec<u8> = (0..64).collect();
        write_png(&source, &pixels, 8, 8, BitDepth::Gray8);

        let engine = MockEngine::new();
        let codec = CurrentCodec::new(&engine);
        let registry = FormatRegistry::standard();
        let wi = encode_file(&codec, &registry, &source, None, &CompressionOptions::current()).unwrap();
        assert_eq!(wi, dir.path().join("gray.wi"));

        let target = dir.path().join("nested/out/gray.pgm");
        decode_file(&codec, &registry, &wi, &target, &DecompressionOptions::default()).unwrap();
        let summary = registry.identify(&fs::read(&target).unwrap()).unwrap();
        assert_eq!((summary.width, summary.height, summary.bits_per_pixel), (8, 8, 8));
        assert_eq!(engine.live_structures(), 0);
    }

    #[test]
    fn explicit_wi_path_is_used() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("rgb.png");
        write_png(&source, &[200; 12], 2, 2, BitDepth::Rgb24);
        let engine = MockEngine::new();
        let codec = LegacyCodec::new(&engine);
        let target = dir.path().join("custom.swi");
        let written = encode_file(
            &codec,
            &FormatRegistry::standard(),
            &source,
            Some(&target),
            &CompressionOptions::legacy(),
        )
        .unwrap();
        assert_eq!(written, target);
        assert!(target.exists());
        assert!(!dir.path().join("rgb.wi").exists());
    }

    #[test]
    fn engine_failure_writes_nothing() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("gray.png");
        write_png(&source, &[1; 16], 4, 4, BitDepth::Gray8);
        let engine = MockEngine::new();
        engine.fail_stage(Stage::Compress, 9);
        let codec = Codec::new(&engine, Generation::Current);
        let err = encode_file(
            &codec,
            &FormatRegistry::standard(),
            &source,
            None,
            &CompressionOptions::current(),
        )
        .unwrap_err();
        assert_eq!(err.to_string(), "WI compress failed: Error=9");
        assert!(!dir.path().join("gray.wi").exists());
    }

    #[test]
    fn unknown_output_extension_skips_engine() {
        let dir = tempdir().unwrap();
        let wi = dir.path().join("in.wi");
        fs::write(&wi, b"anything").unwrap();
        let engine = MockEngine::new();
        let err = decode_file(
            &CurrentCodec::new(&engine),
            &FormatRegistry::standard(),
            &wi,
            &dir.path().join("out.tga"),
            &DecompressionOptions::default(),
        )
        .unwrap_err();
        assert!(matches!(err, SwiError::UnsupportedOutputFormat { .. }));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn rgba_input_is_rejected_before_engine() {
        let dir = tempdir().unwrap();
        let source = dir.path().join("alpha.png");
        let mut bytes = Vec::new();
        image::codecs::png::PngEncoder::new(&mut bytes)
            .write_image(&[0; 16], 2, 2, image::ExtendedColorType::Rgba8)
            .unwrap();
        fs::write(&source, bytes).unwrap();
        let engine = MockEngine::new();
        let err = encode_file(
            &CurrentCodec::new(&engine),
            &FormatRegistry::standard(),
            &source,
            None,
            &CompressionOptions::current(),
        )
        .unwrap_err();
        assert!(matches!(err, SwiError::UnsupportedBitDepth { bits_per_pixel: 32 }));
        assert!(engine.calls().is_empty());
    }
}
