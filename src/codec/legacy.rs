//! Legacy `Si*` generation.
//!
//! The legacy entry points take caller-declared structures and compress or
//! decompress in a single call. Engine-allocated data is released with
//! `SiFreeCmpDataInfo` and `SiFreeImageInfo`.

use log::debug;

use crate::codec::{Generation, decoded_geometry, preflight};
use crate::error::{Stage, SwiError, check};
use crate::handle::{Handle, NativeStruct};
use crate::marshal::{from_foreign, to_foreign};
use crate::options::{CompressionOptions, DecompressionOptions};
use crate::sys::{SiBox, SiCmpDataInfo, SiCmpOption, SiDecmpOption, SiImageInfo, SwiApi};
use crate::{CompressedImage, RawImage};

struct Call<'a, A: SwiApi + ?Sized, O: NativeStruct> {
    info: Handle<'a, A, SiImageInfo>,
    cmp: Handle<'a, A, SiCmpDataInfo>,
    options: Handle<'a, A, O>,
}

impl<'a, A: SwiApi + ?Sized, O: NativeStruct> Call<'a, A, O> {
    fn acquire(engine: &'a A) -> Result<Self, SwiError> {
        Ok(Self {
            info: Handle::acquire(engine)?,
            cmp: Handle::acquire(engine)?,
            options: Handle::acquire(engine)?,
        })
    }
}

impl<A: SwiApi + ?Sized, O: NativeStruct> Drop for Call<'_, A, O> {
    fn drop(&mut self) {
        if self.info.holds_engine_data() {
            self.info.release_data();
        }
        self.cmp.release_data();
        self.info.release_data();
    }
}

/// Compress `image` with `SiCompress`.
pub fn encode<A: SwiApi + ?Sized>(
    engine: &A,
    image: &RawImage,
    options: &CompressionOptions,
) -> Result<CompressedImage, SwiError> {
    let geometry = preflight(image, options, Generation::Legacy)?;
    let mut focus_boxes: Vec<SiBox> = options.focus_boxes.iter().copied().map(Into::into).collect();

    let mut call = Call::<A, SiCmpOption>::acquire(engine)?;
    options.write_legacy(call.options.get_mut(), &mut focus_boxes);
    call.info.attach_caller(to_foreign(&image.pixels));
    {
        let info = call.info.get_mut();
        info.width = geometry.width;
        info.height = geometry.height;
        info.bits_per_pixel = geometry.bits_per_pixel();
        info.color = geometry.color();
    }

    debug!(
        "SiCompress {}x{} at {} bpp, quality {:.2}",
        image.width, image.height, image.bits_per_pixel, options.quality
    );
    let code = unsafe {
        engine.legacy_compress(call.info.as_ptr(), call.options.as_ptr(), call.cmp.as_ptr())
    };
    call.cmp.mark_engine_owned();
    check(code, Stage::LegacyCompress)?;

    let missing = SwiError::MissingPayload {
        stage: Stage::LegacyCompress,
    };
    let Ok(len) = usize::try_from(call.cmp.get().size) else {
        return Err(missing);
    };
    let data = call.cmp.engine_data(len).map(from_foreign).ok_or(missing)?;
    debug!("SiCompress produced {} bytes", data.len());
    Ok(CompressedImage::new(data))
}

/// Decompress `compressed` with `SiDecompress`.
pub fn decode<A: SwiApi + ?Sized>(
    engine: &A,
    compressed: &CompressedImage,
    options: &DecompressionOptions,
) -> Result<RawImage, SwiError> {
    let size = i32::try_from(compressed.len()).map_err(|_| {
        SwiError::InvalidGeometry(format!("{} byte stream is too large", compressed.len()))
    })?;

    let mut call = Call::<A, SiDecmpOption>::acquire(engine)?;
    call.cmp.attach_caller(to_foreign(compressed.as_bytes()));
    call.cmp.get_mut().size = size;
    options.write_legacy(call.options.get_mut());

    debug!("SiDecompress {} bytes", compressed.len());
    let code = unsafe {
        engine.legacy_decompress(call.cmp.as_ptr(), call.options.as_ptr(), call.info.as_ptr())
    };
    call.info.mark_engine_owned();
    check(code, Stage::LegacyDecompress)?;

    let (width, height, color, bits_per_pixel) = {
        let info = call.info.get();
        (info.width, info.height, info.color, info.bits_per_pixel)
    };
    let (width, height, depth, len) = decoded_geometry(width, height, color, bits_per_pixel)?;
    let pixels = call
        .info
        .engine_data(len)
        .map(from_foreign)
        .ok_or(SwiError::MissingPayload {
            stage: Stage::LegacyDecompress,
        })?;
    Ok(RawImage::new(pixels, width, height, depth.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call as Recorded, MockEngine};
    use crate::options::RatioControl;

    #[test]
    fn legacy_round_trip_uses_si_entry_points() {
        let engine = MockEngine::new();
        let image = RawImage::new(vec![7; 12], 2, 2, 24);
        let compressed = encode(&engine, &image, &CompressionOptions::legacy()).unwrap();
        let decoded = decode(&engine, &compressed, &DecompressionOptions::default()).unwrap();
        assert_eq!(decoded, image);

        let calls = engine.calls();
        assert!(calls.contains(&Recorded::LegacyCompress));
        assert!(calls.contains(&Recorded::LegacyDecompress));
        assert!(!calls.contains(&Recorded::Compress));
        assert_eq!(engine.live_engine_buffers(), 0);
    }

    #[test]
    fn floor_control_fails_before_engine_call() {
        let engine = MockEngine::new();
        let image = RawImage::new(vec![0; 4], 2, 2, 8);
        let mut options = CompressionOptions::legacy();
        options.control = RatioControl::Floor;
        let err = encode(&engine, &image, &options).unwrap_err();
        assert!(matches!(err, SwiError::InvalidOptions(_)));
        assert!(engine.calls().is_empty());
    }

    #[test]
    fn failed_decompress_still_frees_image_info() {
        let engine = MockEngine::new();
        engine.fail_stage(Stage::LegacyDecompress, 12);
        let err = decode(&engine, &CompressedImage::new(vec![1, 2, 3]), &DecompressionOptions::default())
            .unwrap_err();
        assert_eq!(err.to_string(), "WI legacyDecompress failed: Error=12");
        let calls = engine.calls();
        assert_eq!(calls.last(), Some(&Recorded::FreeImageInfo));
        assert_eq!(engine.stats().engine_frees, 1);
    }
}
