//! Conventional image formats on either side of a WI stream.
//!
//! The registry is an explicit value built by the caller; each profile knows
//! how to write 8 bpp grayscale and 24 bpp RGB pixels in its format.

use std::io::Cursor;
use std::path::Path;

use image::codecs::bmp::BmpEncoder;
use image::codecs::jpeg::JpegEncoder;
use image::codecs::png::PngEncoder;
use image::codecs::pnm::{PnmEncoder, PnmSubtype, SampleEncoding};
use image::{ExtendedColorType, ImageDecoder, ImageEncoder, ImageFormat, ImageReader};
use log::debug;

use crate::BitDepth;
use crate::error::SwiError;

/// A supported file format and the extensions that select it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FormatProfile {
    pub name: &'static str,
    pub format: ImageFormat,
    pub extensions: &'static [&'static str],
}

impl FormatProfile {
    pub fn matches_extension(&self, extension: &str) -> bool {
        self.extensions
            .iter()
            .any(|ext| ext.eq_ignore_ascii_case(extension))
    }
}

/// Dimensions and pixel size of an encoded image, read without decoding it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ImageSummary {
    pub width: u32,
    pub height: u32,
    pub bits_per_pixel: u32,
    pub format: ImageFormat,
}

#[derive(Debug, Clone)]
pub struct FormatRegistry {
    profiles: Vec<FormatProfile>,
}

impl FormatRegistry {
    /// JPEG, PNG, BMP and the PNM family.
    pub fn standard() -> Self {
        Self {
            profiles: vec![
                FormatProfile {
                    name: "JPEG",
                    format: ImageFormat::Jpeg,
                    extensions: &["jpg", "jpeg", "jfif"],
                },
                FormatProfile {
                    name: "PNG",
                    format: ImageFormat::Png,
                    extensions: &["png"],
                },
                FormatProfile {
                    name: "BMP",
                    format: ImageFormat::Bmp,
                    extensions: &["bmp", "dib"],
                },
                FormatProfile {
                    name: "PNM",
                    format: ImageFormat::Pnm,
                    extensions: &["pbm", "pgm", "ppm", "pnm"],
                },
            ],
        }
    }

    pub fn profiles(&self) -> &[FormatProfile] {
        &self.profiles
    }

    /// Every accepted extension, with a leading dot.
    pub fn extension_list(&self) -> String {
        self.profiles
            .iter()
            .flat_map(|p| p.extensions.iter())
            .map(|ext| format!(".{ext}"))
            .collect::<Vec<_>>()
            .join(", ")
    }

    pub fn accepts(&self, format: ImageFormat) -> bool {
        self.profiles.iter().any(|p| p.format == format)
    }

    pub fn by_extension(&self, extension: &str) -> Option<&FormatProfile> {
        self.profiles.iter().find(|p| p.matches_extension(extension))
    }

    /// Profile selected by the extension of `path`.
    pub fn for_path(&self, path: &Path) -> Result<&FormatProfile, SwiError> {
        let extension = path
            .extension()
            .and_then(|ext| ext.to_str())
            .unwrap_or_default();
        self.by_extension(extension)
            .ok_or_else(|| SwiError::UnsupportedOutputFormat {
                extension: extension.to_owned(),
            })
    }

    pub fn identify(&self, bytes: &[u8]) -> Result<ImageSummary, SwiError> {
        let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        let format = reader
            .format()
            .filter(|format| self.accepts(*format))
            .ok_or(SwiError::UnsupportedInputFormat)?;
        let decoder = reader.into_decoder()?;
        let (width, height) = decoder.dimensions();
        let bits_per_pixel = u32::from(decoder.color_type().bits_per_pixel());
        debug!("identified {format:?} {width}x{height} at {bits_per_pixel} bpp");
        Ok(ImageSummary {
            width,
            height,
            bits_per_pixel,
            format,
        })
    }

    /// Decode `bytes` into tightly packed luma or RGB samples.
    pub fn decode_to_pixels(&self, bytes: &[u8], depth: BitDepth) -> Result<Vec<u8>, SwiError> {
        let reader = ImageReader::new(Cursor::new(bytes)).with_guessed_format()?;
        if !reader.format().is_some_and(|format| self.accepts(format)) {
            return Err(SwiError::UnsupportedInputFormat);
        }
        let image = reader.decode()?;
        Ok(match depth {
            BitDepth::Gray8 => image.into_luma8().into_raw(),
            BitDepth::Rgb24 => image.into_rgb8().into_raw(),
        })
    }
}

/// Write packed pixels in the format of `profile`.
pub fn encode_from_pixels(
    pixels: &[u8],
    width: u32,
    height: u32,
    depth: BitDepth,
    profile: &FormatProfile,
) -> Result<Vec<u8>, SwiError> {
    let color = match depth {
        BitDepth::Gray8 => ExtendedColorType::L8,
        BitDepth::Rgb24 => ExtendedColorType::Rgb8,
    };
    let mut out = Vec::new();
    match profile.format {
        ImageFormat::Jpeg => JpegEncoder::new(&mut out).write_image(pixels, width, height, color)?,
        ImageFormat::Png => PngEncoder::new(&mut out).write_image(pixels, width, height, color)?,
        ImageFormat::Bmp => BmpEncoder::new(&mut out).write_image(pixels, width, height, color)?,
        ImageFormat::Pnm => {
            let subtype = match depth {
                BitDepth::Gray8 => PnmSubtype::Graymap(SampleEncoding::Binary),
                BitDepth::Rgb24 => PnmSubtype::Pixmap(SampleEncoding::Binary),
            };
            PnmEncoder::new(&mut out)
                .with_subtype(subtype)
                .write_image(pixels, width, height, color)?
        }
        _ => {
            return Err(SwiError::UnsupportedOutputFormat {
                extension: profile.name.to_lowercase(),
            });
        }
    }
    Ok(out)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn gradient(len: usize) -> Vec<u8> {
        (0..len).map(|i| (i * 7 % 256) as u8).collect()
    }

    #[test]
    fn extension_lookup_is_case_insensitive() {
        let registry = FormatRegistry::standard();
        assert_eq!(registry.by_extension("JPG").unwrap().format, ImageFormat::Jpeg);
        assert_eq!(registry.by_extension("pgm").unwrap().format, ImageFormat::Pnm);
        assert!(registry.by_extension("tiff").is_none());
    }

    #[test]
    fn unknown_output_extension() {
        let registry = FormatRegistry::standard();
        let err = registry.for_path(Path::new("out/picture.webp")).unwrap_err();
        assert!(matches!(err, SwiError::UnsupportedOutputFormat { extension } if extension == "webp"));
        assert!(registry.for_path(Path::new("noext")).is_err());
    }

    #[test]
    fn gray_png_identifies_as_8_bpp() {
        let registry = FormatRegistry::standard();
        let profile = registry.by_extension("png").unwrap();
        let bytes = encode_from_pixels(&gradient(16), 4, 4, BitDepth::Gray8, profile).unwrap();
        let summary = registry.identify(&bytes).unwrap();
        assert_eq!((summary.width, summary.height, summary.bits_per_pixel), (4, 4, 8));
        assert_eq!(registry.decode_to_pixels(&bytes, BitDepth::Gray8).unwrap(), gradient(16));
    }

    #[test]
    fn rgb_ppm_is_lossless() {
        let registry = FormatRegistry::standard();
        let profile = registry.by_extension("ppm").unwrap();
        let bytes = encode_from_pixels(&gradient(12), 2, 2, BitDepth::Rgb24, profile).unwrap();
        assert!(bytes.starts_with(b"P6"));
        assert_eq!(registry.identify(&bytes).unwrap().bits_per_pixel, 24);
        assert_eq!(registry.decode_to_pixels(&bytes, BitDepth::Rgb24).unwrap(), gradient(12));
    }

    #[test]
    fn gray_pnm_uses_graymap() {
        let registry = FormatRegistry::standard();
        let profile = registry.by_extension("pbm").unwrap();
        let bytes = encode_from_pixels(&gradient(4), 2, 2, BitDepth::Gray8, profile).unwrap();
        assert!(bytes.starts_with(b"P5"));
    }

    #[test]
    fn jpeg_and_bmp_encode() {
        let registry = FormatRegistry::standard();
        for ext in ["jpg", "bmp"] {
            let profile = registry.by_extension(ext).unwrap();
            let bytes = encode_from_pixels(&gradient(8 * 8 * 3), 8, 8, BitDepth::Rgb24, profile).unwrap();
            let summary = registry.identify(&bytes).unwrap();
            assert_eq!((summary.width, summary.height), (8, 8));
            assert_eq!(summary.format, profile.format);
        }
    }

    #[test]
    fn foreign_formats_are_rejected() {
        let registry = FormatRegistry::standard();
        let err = registry.identify(b"GIF89a\x01\x00\x01\x00\x00\x00\x00").unwrap_err();
        assert!(matches!(err, SwiError::UnsupportedInputFormat));
        assert!(matches!(
            registry.identify(b"not an image"),
            Err(SwiError::UnsupportedInputFormat)
        ));
    }

    #[test]
    fn extension_list_has_dots() {
        let list = FormatRegistry::standard().extension_list();
        assert!(list.starts_with(".jpg, .jpeg"));
        assert!(list.ends_with(".pnm"));
    }
}
