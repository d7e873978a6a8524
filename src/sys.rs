//! Native ABI of the swi32 wavelet engine.
//!
//! This module declares the C-compatible structure layouts and entry points
//! exposed by `swi32`. Two API generations live side by side in the same
//! library: the current `Wi*` family (factory-created structures, staged
//! decompression) and the legacy `Si*` family (caller-declared structures,
//! single-call compress/decompress).
//!
//! Nothing in here is safe to use directly. The rest of the crate reaches the
//! engine only through the [`SwiApi`] trait, which is implemented by the
//! linked `Swi32` engine (feature `swi32`) and by the recording `MockEngine`
//! (feature `mock`).

use std::os::raw::{c_float, c_int, c_uchar, c_void};
use std::ptr;

// Progressive
pub const PR_NONE: c_int = 0;
pub const PR_NORMAL: c_int = 1;
pub const PR_FAST: c_int = 2;

// Encoders
pub const E_SLOW: c_int = 0;
pub const E_NORMAL: c_int = 1;
pub const E_FAST: c_int = 2;
pub const E_FASTEST: c_int = 3;

// Encode paths
pub const P_PATH1: c_int = 0;
pub const P_PATH2: c_int = 1;
pub const P_PATH3: c_int = 2;

// Compression ratio specifications
pub const CR_QUALITY: c_int = 0;
pub const CR_CLOSEST: c_int = 1;
pub const CR_FLOOR: c_int = 2;

/// Result code every engine call returns on success.
pub const SWI_OK: c_int = 0;

/// Custom bitstream reader/writer callback.
pub type ByteIOFunc = Option<unsafe extern "system" fn(*mut c_void, *mut c_int) -> c_int>;

/// Scanline streaming callback.
pub type ScanlineIOFunc =
    Option<unsafe extern "system" fn(*mut c_void, *mut WiImageBlock, c_int, *mut *mut c_uchar) -> c_int>;

/// Application extension callback.
pub type ExtensionIOFunc =
    Option<unsafe extern "system" fn(*mut c_void, c_int, *mut *mut c_uchar, *mut c_int) -> c_int>;

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WiBox {
    pub left: c_int,
    pub top: c_int,
    pub right: c_int,
    pub bottom: c_int,
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct WiImageBlock {
    pub page: c_int,
    pub page_left: c_int,
    pub page_top: c_int,
    pub page_width: c_int,
    pub page_height: c_int,
    pub block: c_int,
    pub block_left: c_int,
    pub block_top: c_int,
    pub block_width: c_int,
    pub block_height: c_int,
}

/// Uncompressed image descriptor (current generation).
///
/// `raw` is caller-owned while compressing and engine-owned after a
/// decompression stage has run.
#[repr(C)]
#[derive(Debug)]
pub struct WiRawImage {
    pub raw: *mut c_uchar,
    pub height: c_int,
    pub width: c_int,
    pub bits_per_pixel: c_int,
    pub color: c_int,
    pub level_height: c_int,
    pub level_width: c_int,
    pub app_data: *mut c_void,
    pub comment: *mut c_uchar,
    pub comment_length: c_int,
    pub app_extension: *mut c_uchar,
    pub app_extension_length: c_int,
}

impl Default for WiRawImage {
    fn default() -> Self {
        Self {
            raw: ptr::null_mut(),
            height: 0,
            width: 0,
            bits_per_pixel: 0,
            color: 0,
            level_height: 0,
            level_width: 0,
            app_data: ptr::null_mut(),
            comment: ptr::null_mut(),
            comment_length: 0,
            app_extension: ptr::null_mut(),
            app_extension_length: 0,
        }
    }
}

/// Compressed image descriptor (current generation).
#[repr(C)]
#[derive(Debug)]
pub struct WiCmpImage {
    pub cmp_data: *mut c_uchar,
    pub size: c_int,
}

impl Default for WiCmpImage {
    fn default() -> Self {
        Self {
            cmp_data: ptr::null_mut(),
            size: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct WiCmpOptions {
    pub quality: c_float,
    pub cmp_ratio: c_float,
    pub cmp_control: c_int,
    pub encoder: c_int,
    pub encode_path: c_int,
    pub progressive: c_int,
    pub write_next_byte: ByteIOFunc,
    pub write_param: *mut c_void,
    pub magnification: c_int,
    pub edge_enhancement: c_int,
    pub contrast_enhancement: c_int,
    pub focus_weight: c_int,
    pub focus_boxes: *mut WiBox,
    pub n_boxes: c_int,
    pub high_color_quality: c_int,
    pub read_scanline: ScanlineIOFunc,
    pub read_scanline_param: *mut c_void,
    pub block_size: c_int,
    pub blocks: *mut WiBox,
    pub n_blocks: c_int,
}

impl Default for WiCmpOptions {
    fn default() -> Self {
        Self {
            quality: 0.0,
            cmp_ratio: 0.0,
            cmp_control: CR_QUALITY,
            encoder: E_SLOW,
            encode_path: P_PATH1,
            progressive: PR_NONE,
            write_next_byte: None,
            write_param: ptr::null_mut(),
            magnification: 0,
            edge_enhancement: 0,
            contrast_enhancement: 0,
            focus_weight: 0,
            focus_boxes: ptr::null_mut(),
            n_boxes: 0,
            high_color_quality: 0,
            read_scanline: None,
            read_scanline_param: ptr::null_mut(),
            block_size: 0,
            blocks: ptr::null_mut(),
            n_blocks: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct WiDecmpOptions {
    pub smoothing: c_int,
    pub fast: c_int,
    pub read_next_byte: ByteIOFunc,
    pub read_param: *mut c_void,
    pub sharpening: c_int,
    pub write_scanline: ScanlineIOFunc,
    pub write_scanline_param: *mut c_void,
    pub sub_image: WiImageBlock,
    pub magnification: c_int,
    pub write_app_extension: ExtensionIOFunc,
    pub write_app_extension_param: *mut c_void,
}

impl Default for WiDecmpOptions {
    fn default() -> Self {
        Self {
            smoothing: 0,
            fast: 0,
            read_next_byte: None,
            read_param: ptr::null_mut(),
            sharpening: 0,
            write_scanline: None,
            write_scanline_param: ptr::null_mut(),
            sub_image: WiImageBlock::default(),
            magnification: 0,
            write_app_extension: None,
            write_app_extension_param: ptr::null_mut(),
        }
    }
}

#[repr(C)]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SiBox {
    pub left: c_int,
    pub top: c_int,
    pub right: c_int,
    pub bottom: c_int,
}

impl From<SiBox> for WiBox {
    fn from(b: SiBox) -> Self {
        WiBox {
            left: b.left,
            top: b.top,
            right: b.right,
            bottom: b.bottom,
        }
    }
}

/// Uncompressed image descriptor (legacy generation).
#[repr(C)]
#[derive(Debug)]
pub struct SiImageInfo {
    pub raw: *mut c_uchar,
    pub height: c_int,
    pub width: c_int,
    pub bits_per_pixel: c_int,
    pub color: c_int,
    pub level_height: c_int,
    pub level_width: c_int,
    pub app_data: *mut c_void,
}

impl Default for SiImageInfo {
    fn default() -> Self {
        Self {
            raw: ptr::null_mut(),
            height: 0,
            width: 0,
            bits_per_pixel: 0,
            color: 0,
            level_height: 0,
            level_width: 0,
            app_data: ptr::null_mut(),
        }
    }
}

/// Compressed image descriptor (legacy generation).
#[repr(C)]
#[derive(Debug)]
pub struct SiCmpDataInfo {
    pub cmp_data: *mut c_uchar,
    pub size: c_int,
}

impl Default for SiCmpDataInfo {
    fn default() -> Self {
        Self {
            cmp_data: ptr::null_mut(),
            size: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct SiCmpOption {
    pub quality: c_float,
    pub cmp_ratio: c_float,
    pub auto_ratio: c_int,
    pub encoder: c_int,
    pub encode_path: c_int,
    pub progressive: c_int,
    pub write_next_byte: ByteIOFunc,
    pub write_param: *mut c_void,
    pub magnification: c_int,
    pub edge_enhancement: c_int,
    pub contrast_enhancement: c_int,
    pub focus_weight: c_int,
    pub focus_boxes: *mut SiBox,
    pub n_boxes: c_int,
}

impl Default for SiCmpOption {
    fn default() -> Self {
        Self {
            quality: 0.0,
            cmp_ratio: 0.0,
            auto_ratio: 0,
            encoder: E_SLOW,
            encode_path: P_PATH1,
            progressive: PR_NONE,
            write_next_byte: None,
            write_param: ptr::null_mut(),
            magnification: 0,
            edge_enhancement: 0,
            contrast_enhancement: 0,
            focus_weight: 0,
            focus_boxes: ptr::null_mut(),
            n_boxes: 0,
        }
    }
}

#[repr(C)]
#[derive(Debug)]
pub struct SiDecmpOption {
    pub smoothing: c_int,
    pub fast: c_int,
    pub read_next_byte: ByteIOFunc,
    pub read_param: *mut c_void,
    pub sharpening: c_int,
    pub write_scanline: ScanlineIOFunc,
    pub write_scanline_param: *mut c_void,
}

impl Default for SiDecmpOption {
    fn default() -> Self {
        Self {
            smoothing: 0,
            fast: 0,
            read_next_byte: None,
            read_param: ptr::null_mut(),
            sharpening: 0,
            write_scanline: None,
            write_scanline_param: ptr::null_mut(),
        }
    }
}

/// Every engine entry point the safe layer consumes.
///
/// Each method is `unsafe` to call: every pointer argument must come from the
/// matching factory (current generation) or point to a live caller-owned
/// structure (legacy generation), and must not have been destroyed.
///
/// # Safety
///
/// The codecs dereference what an implementation hands back without further
/// checks, so an implementor must behave like the native engine:
///
/// - `create_*` returns null or a fresh, aligned, initialized structure that
///   stays live until the matching `destroy_*`.
/// - `free_*_data`, `SiFreeImageInfo` and `SiFreeCmpDataInfo` release only
///   memory the engine allocated, never a caller-attached buffer, and are
///   no-ops on a null data field.
/// - Any data pointer and size written into a structure describe a readable
///   engine allocation that stays valid until the matching free routine.
/// - `destroy_*` releases only the structure, not its data.
///
/// ```compile_fail,E0200
/// use swi_rs::sys::SwiApi;
///
/// struct Unchecked;
/// impl SwiApi for Unchecked {}
/// ```
pub unsafe trait SwiApi {
    unsafe fn create_raw_image(&self) -> *mut WiRawImage;
    unsafe fn free_raw_image_data(&self, raw_image: *mut WiRawImage);
    unsafe fn destroy_raw_image(&self, raw_image: *mut WiRawImage);

    unsafe fn create_cmp_image(&self) -> *mut WiCmpImage;
    unsafe fn free_cmp_image_data(&self, cmp_image: *mut WiCmpImage);
    unsafe fn destroy_cmp_image(&self, cmp_image: *mut WiCmpImage);

    unsafe fn create_cmp_options(&self) -> *mut WiCmpOptions;
    unsafe fn destroy_cmp_options(&self, cmp_options: *mut WiCmpOptions);

    unsafe fn create_decmp_options(&self) -> *mut WiDecmpOptions;
    unsafe fn destroy_decmp_options(&self, decmp_options: *mut WiDecmpOptions);

    unsafe fn compress(
        &self,
        cmp_options: *mut WiCmpOptions,
        raw_image: *mut WiRawImage,
        cmp_image: *mut WiCmpImage,
    ) -> c_int;

    unsafe fn begin_decompress(
        &self,
        decmp_options: *mut WiDecmpOptions,
        raw_image: *mut WiRawImage,
        cmp_image: *mut WiCmpImage,
    ) -> c_int;

    unsafe fn decompress_sub_header(
        &self,
        decmp_options: *mut WiDecmpOptions,
        raw_image: *mut WiRawImage,
        cmp_image: *mut WiCmpImage,
    ) -> c_int;

    unsafe fn decompress_sub_image(
        &self,
        decmp_options: *mut WiDecmpOptions,
        raw_image: *mut WiRawImage,
        cmp_image: *mut WiCmpImage,
    ) -> c_int;

    unsafe fn end_decompress(
        &self,
        decmp_options: *mut WiDecmpOptions,
        raw_image: *mut WiRawImage,
        cmp_image: *mut WiCmpImage,
    );

    unsafe fn legacy_compress(
        &self,
        image_info: *mut SiImageInfo,
        cmp_option: *mut SiCmpOption,
        cmp_data_info: *mut SiCmpDataInfo,
    ) -> c_int;

    unsafe fn legacy_decompress(
        &self,
        cmp_data_info: *mut SiCmpDataInfo,
        decmp_option: *mut SiDecmpOption,
        image_info: *mut SiImageInfo,
    ) -> c_int;

    unsafe fn legacy_free_image_info(&self, image_info: *mut SiImageInfo);
    unsafe fn legacy_free_cmp_data_info(&self, cmp_data_info: *mut SiCmpDataInfo);
}

// SAFETY: forwards to `T`, which upholds the contract.
unsafe impl<T: SwiApi + ?Sized> SwiApi for &T {
    unsafe fn create_raw_image(&self) -> *mut WiRawImage {
        unsafe { (**self).create_raw_image() }
    }
    unsafe fn free_raw_image_data(&self, raw_image: *mut WiRawImage) {
        unsafe { (**self).free_raw_image_data(raw_image) }
    }
    unsafe fn destroy_raw_image(&self, raw_image: *mut WiRawImage) {
        unsafe { (**self).destroy_raw_image(raw_image) }
    }
    unsafe fn create_cmp_image(&self) -> *mut WiCmpImage {
        unsafe { (**self).create_cmp_image() }
    }
    unsafe fn free_cmp_image_data(&self, cmp_image: *mut WiCmpImage) {
        unsafe { (**self).free_cmp_image_data(cmp_image) }
    }
    unsafe fn destroy_cmp_image(&self, cmp_image: *mut WiCmpImage) {
        unsafe { (**self).destroy_cmp_image(cmp_image) }
    }
    unsafe fn create_cmp_options(&self) -> *mut WiCmpOptions {
        unsafe { (**self).create_cmp_options() }
    }
    unsafe fn destroy_cmp_options(&self, cmp_options: *mut WiCmpOptions) {
        unsafe { (**self).destroy_cmp_options(cmp_options) }
    }
    unsafe fn create_decmp_options(&self) -> *mut WiDecmpOptions {
        unsafe { (**self).create_decmp_options() }
    }
    unsafe fn destroy_decmp_options(&self, decmp_options: *mut WiDecmpOptions) {
        unsafe { (**self).destroy_decmp_options(decmp_options) }
    }
    unsafe fn compress(
        &self,
        cmp_options: *mut WiCmpOptions,
        raw_image: *mut WiRawImage,
        cmp_image: *mut WiCmpImage,
    ) -> c_int {
        unsafe { (**self).compress(cmp_options, raw_image, cmp_image) }
    }
    unsafe fn begin_decompress(
        &self,
        decmp_options: *mut WiDecmpOptions,
        raw_image: *mut WiRawImage,
        cmp_image: *mut WiCmpImage,
    ) -> c_int {
        unsafe { (**self).begin_decompress(decmp_options, raw_image, cmp_image) }
    }
    unsafe fn decompress_sub_header(
        &self,
        decmp_options: *mut WiDecmpOptions,
        raw_image: *mut WiRawImage,
        cmp_image: *mut WiCmpImage,
    ) -> c_int {
        unsafe { (**self).decompress_sub_header(decmp_options, raw_image, cmp_image) }
    }
    unsafe fn decompress_sub_image(
        &self,
        decmp_options: *mut WiDecmpOptions,
        raw_image: *mut WiRawImage,
        cmp_image: *mut WiCmpImage,
    ) -> c_int {
        unsafe { (**self).decompress_sub_image(decmp_options, raw_image, cmp_image) }
    }
    unsafe fn end_decompress(
        &self,
        decmp_options: *mut WiDecmpOptions,
        raw_image: *mut WiRawImage,
        cmp_image: *mut WiCmpImage,
    ) {
        unsafe { (**self).end_decompress(decmp_options, raw_image, cmp_image) }
    }
    unsafe fn legacy_compress(
        &self,
        image_info: *mut SiImageInfo,
        cmp_option: *mut SiCmpOption,
        cmp_data_info: *mut SiCmpDataInfo,
    ) -> c_int {
        unsafe { (**self).legacy_compress(image_info, cmp_option, cmp_data_info) }
    }
    unsafe fn legacy_decompress(
        &self,
        cmp_data_info: *mut SiCmpDataInfo,
        decmp_option: *mut SiDecmpOption,
        image_info: *mut SiImageInfo,
    ) -> c_int {
        unsafe { (**self).legacy_decompress(cmp_data_info, decmp_option, image_info) }
    }
    unsafe fn legacy_free_image_info(&self, image_info: *mut SiImageInfo) {
        unsafe { (**self).legacy_free_image_info(image_info) }
    }
    unsafe fn legacy_free_cmp_data_info(&self, cmp_data_info: *mut SiCmpDataInfo) {
        unsafe { (**self).legacy_free_cmp_data_info(cmp_data_info) }
    }
}

#[cfg(feature = "swi32")]
pub use linked::Swi32;

#[cfg(feature = "swi32")]
mod linked {
    use super::*;

    #[link(name = "swi32")]
    unsafe extern "system" {
        fn WiCreateRawImage() -> *mut WiRawImage;
        fn WiFreeRawImageData(raw_image: *mut WiRawImage);
        fn WiDestroyRawImage(raw_image: *mut WiRawImage);

        fn WiCreateCmpImage() -> *mut WiCmpImage;
        fn WiFreeCmpImageData(cmp_image: *mut WiCmpImage);
        fn WiDestroyCmpImage(cmp_image: *mut WiCmpImage);

        fn WiCreateCmpOptions() -> *mut WiCmpOptions;
        fn WiDestroyCmpOptions(cmp_options: *mut WiCmpOptions);

        fn WiCreateDecmpOptions() -> *mut WiDecmpOptions;
        fn WiDestroyDecmpOptions(decmp_options: *mut WiDecmpOptions);

        fn WiCompress(
            cmp_options: *mut WiCmpOptions,
            raw_image: *mut WiRawImage,
            cmp_image: *mut WiCmpImage,
        ) -> c_int;

        fn WiBeginDecompress(
            decmp_options: *mut WiDecmpOptions,
            raw_image: *mut WiRawImage,
            cmp_image: *mut WiCmpImage,
        ) -> c_int;
        fn WiDecompressSubHeader(
            decmp_options: *mut WiDecmpOptions,
            raw_image: *mut WiRawImage,
            cmp_image: *mut WiCmpImage,
        ) -> c_int;
        fn WiDecompressSubImage(
            decmp_options: *mut WiDecmpOptions,
            raw_image: *mut WiRawImage,
            cmp_image: *mut WiCmpImage,
        ) -> c_int;
        fn WiEndDecompress(
            decmp_options: *mut WiDecmpOptions,
            raw_image: *mut WiRawImage,
            cmp_image: *mut WiCmpImage,
        );

        fn SiCompress(
            image_info: *mut SiImageInfo,
            cmp_option: *mut SiCmpOption,
            cmp_data_info: *mut SiCmpDataInfo,
        ) -> c_int;
        fn SiDecompress(
            cmp_data_info: *mut SiCmpDataInfo,
            decmp_option: *mut SiDecmpOption,
            image_info: *mut SiImageInfo,
        ) -> c_int;
        fn SiFreeImageInfo(image_info: *mut SiImageInfo);
        fn SiFreeCmpDataInfo(cmp_data_info: *mut SiCmpDataInfo);
    }

    /// The linked `swi32` engine.
    ///
    /// Caller-owned buffers are detached from every structure before it is
    /// destroyed, so the engine never sees a dangling caller pointer.
    ///
    /// The engine's behavior under concurrent calls is undocumented. Each
    /// codec call owns all of its structures, but the library itself may keep
    /// hidden global state; serialize calls if that turns out to matter.
    #[derive(Debug, Clone, Copy, Default)]
    pub struct Swi32;

    // SAFETY: these are the engine's own entry points.
    unsafe impl SwiApi for Swi32 {
        unsafe fn create_raw_image(&self) -> *mut WiRawImage {
            unsafe { WiCreateRawImage() }
        }
        unsafe fn free_raw_image_data(&self, raw_image: *mut WiRawImage) {
            unsafe { WiFreeRawImageData(raw_image) }
        }
        unsafe fn destroy_raw_image(&self, raw_image: *mut WiRawImage) {
            unsafe { WiDestroyRawImage(raw_image) }
        }
        unsafe fn create_cmp_image(&self) -> *mut WiCmpImage {
            unsafe { WiCreateCmpImage() }
        }
        unsafe fn free_cmp_image_data(&self, cmp_image: *mut WiCmpImage) {
            unsafe { WiFreeCmpImageData(cmp_image) }
        }
        unsafe fn destroy_cmp_image(&self, cmp_image: *mut WiCmpImage) {
            unsafe { WiDestroyCmpImage(cmp_image) }
        }
        unsafe fn create_cmp_options(&self) -> *mut WiCmpOptions {
            unsafe { WiCreateCmpOptions() }
        }
        unsafe fn destroy_cmp_options(&self, cmp_options: *mut WiCmpOptions) {
            unsafe { WiDestroyCmpOptions(cmp_options) }
        }
        unsafe fn create_decmp_options(&self) -> *mut WiDecmpOptions {
            unsafe { WiCreateDecmpOptions() }
        }
        unsafe fn destroy_decmp_options(&self, decmp_options: *mut WiDecmpOptions) {
            unsafe { WiDestroyDecmpOptions(decmp_options) }
        }
        unsafe fn compress(
            &self,
            cmp_options: *mut WiCmpOptions,
            raw_image: *mut WiRawImage,
            cmp_image: *mut WiCmpImage,
        ) -> c_int {
            unsafe { WiCompress(cmp_options, raw_image, cmp_image) }
        }
        unsafe fn begin_decompress(
            &self,
            decmp_options: *mut WiDecmpOptions,
            raw_image: *mut WiRawImage,
            cmp_image: *mut WiCmpImage,
        ) -> c_int {
            unsafe { WiBeginDecompress(decmp_options, raw_image, cmp_image) }
        }
        unsafe fn decompress_sub_header(
            &self,
            decmp_options: *mut WiDecmpOptions,
            raw_image: *mut WiRawImage,
            cmp_image: *mut WiCmpImage,
        ) -> c_int {
            unsafe { WiDecompressSubHeader(decmp_options, raw_image, cmp_image) }
        }
        unsafe fn decompress_sub_image(
            &self,
            decmp_options: *mut WiDecmpOptions,
            raw_image: *mut WiRawImage,
            cmp_image: *mut WiCmpImage,
        ) -> c_int {
            unsafe { WiDecompressSubImage(decmp_options, raw_image, cmp_image) }
        }
        unsafe fn end_decompress(
            &self,
            decmp_options: *mut WiDecmpOptions,
            raw_image: *mut WiRawImage,
            cmp_image: *mut WiCmpImage,
        ) {
            unsafe { WiEndDecompress(decmp_options, raw_image, cmp_image) }
        }
        unsafe fn legacy_compress(
            &self,
            image_info: *mut SiImageInfo,
            cmp_option: *mut SiCmpOption,
            cmp_data_info: *mut SiCmpDataInfo,
        ) -> c_int {
            unsafe { SiCompress(image_info, cmp_option, cmp_data_info) }
        }
        unsafe fn legacy_decompress(
            &self,
            cmp_data_info: *mut SiCmpDataInfo,
            decmp_option: *mut SiDecmpOption,
            image_info: *mut SiImageInfo,
        ) -> c_int {
            unsafe { SiDecompress(cmp_data_info, decmp_option, image_info) }
        }
        unsafe fn legacy_free_image_info(&self, image_info: *mut SiImageInfo) {
            unsafe { SiFreeImageInfo(image_info) }
        }
        unsafe fn legacy_free_cmp_data_info(&self, cmp_data_info: *mut SiCmpDataInfo) {
            unsafe { SiFreeCmpDataInfo(cmp_data_info) }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::mem::{offset_of, size_of};

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn raw_image_layout_matches_engine_header() {
        assert_eq!(offset_of!(WiRawImage, raw), 0);
        assert_eq!(offset_of!(WiRawImage, height), 8);
        assert_eq!(offset_of!(WiRawImage, width), 12);
        assert_eq!(offset_of!(WiRawImage, bits_per_pixel), 16);
        assert_eq!(offset_of!(WiRawImage, color), 20);
        assert_eq!(offset_of!(WiRawImage, app_data), 32);
        assert_eq!(offset_of!(WiRawImage, comment_length), 48);
        assert_eq!(size_of::<WiRawImage>(), 72);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn cmp_image_layout_matches_engine_header() {
        assert_eq!(offset_of!(WiCmpImage, size), 8);
        assert_eq!(size_of::<WiCmpImage>(), 16);
        assert_eq!(size_of::<SiCmpDataInfo>(), 16);
    }

    #[test]
    #[cfg(target_pointer_width = "64")]
    fn options_layout_matches_engine_header() {
        assert_eq!(offset_of!(WiCmpOptions, write_next_byte), 24);
        assert_eq!(offset_of!(WiCmpOptions, magnification), 40);
        assert_eq!(offset_of!(WiCmpOptions, focus_boxes), 56);
        assert_eq!(offset_of!(WiCmpOptions, n_boxes), 64);
        assert_eq!(offset_of!(SiCmpOption, focus_boxes), 56);
        assert_eq!(offset_of!(WiDecmpOptions, sub_image), 48);
        assert_eq!(offset_of!(WiDecmpOptions, magnification), 88);
    }

    #[test]
    fn image_block_is_ten_ints() {
        assert_eq!(size_of::<WiImageBlock>(), 10 * size_of::<c_int>());
        assert_eq!(size_of::<WiBox>(), size_of::<SiBox>());
    }
}
