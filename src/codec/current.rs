//! Current `Wi*` generation: factory-created structures, single-call
//! compression and four-stage decompression.

use std::os::raw::c_int;

use log::debug;

use crate::codec::{Generation, decoded_geometry, preflight};
use crate::error::{Stage, SwiError, check};
use crate::handle::{Handle, NativeStruct};
use crate::marshal::{from_foreign, to_foreign};
use crate::options::{CompressionOptions, DecompressionOptions};
use crate::sys::{SwiApi, WiBox, WiCmpImage, WiCmpOptions, WiDecmpOptions, WiRawImage};
use crate::{CompressedImage, RawImage};

/// Structures of one compress or decompress call.
///
/// Release order is fixed: engine-owned data first, then caller-owned data,
/// then the structures in declaration order.
struct Call<'a, A: SwiApi + ?Sized, O: NativeStruct> {
    raw: Handle<'a, A, WiRawImage>,
    cmp: Handle<'a, A, WiCmpImage>,
    options: Handle<'a, A, O>,
}

impl<'a, A: SwiApi + ?Sized, O: NativeStruct> Call<'a, A, O> {
    fn acquire(engine: &'a A) -> Result<Self, SwiError> {
        Ok(Self {
            raw: Handle::acquire(engine)?,
            cmp: Handle::acquire(engine)?,
            options: Handle::acquire(engine)?,
        })
    }
}

impl<A: SwiApi + ?Sized, O: NativeStruct> Drop for Call<'_, A, O> {
    fn drop(&mut self) {
        if self.raw.holds_engine_data() {
            self.raw.release_data();
        }
        self.cmp.release_data();
        self.raw.release_data();
    }
}

/// Compress `image` with `WiCompress`.
///
/// Geometry and options are validated before any structure is created.
pub fn encode<A: SwiApi + ?Sized>(
    engine: &A,
    image: &RawImage,
    options: &CompressionOptions,
) -> Result<CompressedImage, SwiError> {
    let geometry = preflight(image, options, Generation::Current)?;
    let mut focus_boxes: Vec<WiBox> = options.focus_boxes.iter().copied().map(Into::into).collect();

    let mut call = Call::<A, WiCmpOptions>::acquire(engine)?;
    call.raw.attach_caller(to_foreign(&image.pixels));
    {
        let raw = call.raw.get_mut();
        raw.width = geometry.width;
        raw.height = geometry.height;
        raw.bits_per_pixel = geometry.bits_per_pixel();
        raw.color = geometry.color();
    }
    options.write_current(call.options.get_mut(), &mut focus_boxes);

    debug!(
        "WiCompress {}x{} at {} bpp, quality {:.2}, encoder {:?}, {:?}",
        image.width, image.height, image.bits_per_pixel, options.quality, options.encoder,
        options.encode_path
    );
    let code = unsafe { engine.compress(call.options.as_ptr(), call.raw.as_ptr(), call.cmp.as_ptr()) };
    call.cmp.mark_engine_owned();
    check(code, Stage::Compress)?;

    let size = call.cmp.get().size;
    let len = usize::try_from(size).map_err(|_| SwiError::MissingPayload {
        stage: Stage::Compress,
    })?;
    let data = call
        .cmp
        .engine_data(len)
        .map(from_foreign)
        .ok_or(SwiError::MissingPayload {
            stage: Stage::Compress,
        })?;
    debug!("WiCompress produced {} bytes", data.len());
    Ok(CompressedImage::new(data))
}

/// Closes a decompression session when dropped.
struct Session<'c, 'a, A: SwiApi + ?Sized> {
    engine: &'a A,
    call: &'c Call<'a, A, WiDecmpOptions>,
}

impl<A: SwiApi + ?Sized> Session<'_, '_, A> {
    fn run(
        &self,
        stage: Stage,
        step: unsafe fn(&A, *mut WiDecmpOptions, *mut WiRawImage, *mut WiCmpImage) -> c_int,
    ) -> Result<(), SwiError> {
        debug!("WI {stage}");
        let code = unsafe {
            step(
                self.engine,
                self.call.options.as_ptr(),
                self.call.raw.as_ptr(),
                self.call.cmp.as_ptr(),
            )
        };
        check(code, stage)
    }
}

impl<A: SwiApi + ?Sized> Drop for Session<'_, '_, A> {
    fn drop(&mut self) {
        debug!("WI decompressEnd");
        unsafe {
            self.engine.end_decompress(
                self.call.options.as_ptr(),
                self.call.raw.as_ptr(),
                self.call.cmp.as_ptr(),
            )
        };
    }
}

/// Decompress `compressed` through begin, header and sub-image stages.
///
/// The session is always closed, whether or not a stage failed, and the
/// first failing stage's code is the one reported.
pub fn decode<A: SwiApi + ?Sized>(
    engine: &A,
    compressed: &CompressedImage,
    options: &DecompressionOptions,
) -> Result<RawImage, SwiError> {
    let size = i32::try_from(compressed.len()).map_err(|_| {
        SwiError::InvalidGeometry(format!("{} byte stream is too large", compressed.len()))
    })?;

    let mut call = Call::<A, WiDecmpOptions>::acquire(engine)?;
    call.cmp.attach_caller(to_foreign(compressed.as_bytes()));
    call.cmp.get_mut().size = size;
    options.write_current(call.options.get_mut());
    // From here on the engine may allocate pixel data.
    call.raw.mark_engine_owned();

    {
        let session = Session {
            engine,
            call: &call,
        };
        session.run(Stage::DecompressBegin, A::begin_decompress)?;
        session.run(Stage::DecompressHeader, A::decompress_sub_header)?;
        session.run(Stage::DecompressSubImage, A::decompress_sub_image)?;
    }

    let (width, height, color, bits_per_pixel) = {
        let raw = call.raw.get();
        (raw.width, raw.height, raw.color, raw.bits_per_pixel)
    };
    let (width, height, depth, len) = decoded_geometry(width, height, color, bits_per_pixel)?;
    let pixels = call
        .raw
        .engine_data(len)
        .map(from_foreign)
        .ok_or(SwiError::MissingPayload {
            stage: Stage::DecompressSubImage,
        })?;
    debug!("WI decoded {width}x{height} at {} bpp", u32::from(depth));
    Ok(RawImage::new(pixels, width, height, depth.into()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::{Call as Recorded, MockEngine};

    fn gray() -> RawImage {
        RawImage::new((0..16).collect(), 4, 4, 8)
    }

    #[test]
    fn encode_releases_in_order() {
        let engine = MockEngine::new();
        encode(&engine, &gray(), &CompressionOptions::current()).unwrap();
        let calls = engine.calls();
        let tail: Vec<_> = calls.iter().skip_while(|c| **c != Recorded::Compress).skip(1).collect();
        assert_eq!(
            tail,
            [
                &Recorded::FreeCmpImageData,
                &Recorded::DestroyRawImage,
                &Recorded::DestroyCmpImage,
                &Recorded::DestroyCmpOptions,
            ]
        );
    }

    #[test]
    fn caller_pixels_reach_engine() {
        let engine = MockEngine::new();
        encode(&engine, &gray(), &CompressionOptions::current()).unwrap();
        assert_eq!(engine.last_input_pixels(), Some((0..16).collect()));
    }

    #[test]
    fn decode_closes_session_after_header_failure() {
        let engine = MockEngine::new();
        let compressed = encode(&engine, &gray(), &CompressionOptions::current()).unwrap();
        engine.fail_stage(Stage::DecompressHeader, -3);
        let err = decode(&engine, &compressed, &DecompressionOptions::default()).unwrap_err();
        assert_eq!(err.stage(), Some(Stage::DecompressHeader));
        assert_eq!(err.code(), Some(-3));
        let calls = engine.calls();
        assert_eq!(calls.iter().filter(|c| **c == Recorded::EndDecompress).count(), 1);
        assert!(!calls.contains(&Recorded::DecompressSubImage));
    }

    #[test]
    fn decode_rejects_unexpected_format() {
        let engine = MockEngine::new();
        let compressed = encode(&engine, &gray(), &CompressionOptions::current()).unwrap();
        engine.report_format(1, 8);
        let err = decode(&engine, &compressed, &DecompressionOptions::default()).unwrap_err();
        assert!(matches!(err, SwiError::UnsupportedFormat { color: 1, bits_per_pixel: 8 }));
        assert_eq!(engine.live_structures(), 0);
        assert_eq!(engine.live_engine_buffers(), 0);
    }
}
