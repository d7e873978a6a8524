//! In-process stand-in for the native engine.
//!
//! [`MockEngine`] implements [`SwiApi`] with the same ownership rules as
//! `swi32`: factories hand out heap structures, compression and
//! decompression allocate payloads that only the engine's free routines
//! release, and caller-owned buffers are never freed. Every entry point is
//! recorded so tests can assert on call order, and every allocation is
//! tracked so leaks and double releases show up in [`MockStats`].
//!
//! The "compressed" stream is a small header followed by the raw pixels, so
//! round trips are lossless.
//!
//! Built for unit tests and with the `mock` feature.

use std::collections::{HashMap, HashSet};
use std::os::raw::{c_int, c_uchar};
use std::ptr;
use std::sync::{Mutex, MutexGuard, PoisonError};

use crate::error::Stage;
use crate::handle::NativeStruct;
use crate::sys::{
    SWI_OK, SiCmpDataInfo, SiCmpOption, SiDecmpOption, SiImageInfo, SwiApi, WiBox,
    WiCmpImage, WiCmpOptions, WiDecmpOptions, WiRawImage,
};

/// A null or inconsistent argument.
pub const ERR_ARGUMENT: c_int = 1;
/// The compressed stream is not one this engine (or generation) produced.
pub const ERR_CORRUPT_STREAM: c_int = 2;
/// A decompression stage was issued out of order.
pub const ERR_NO_SESSION: c_int = 3;

const MAGIC: &[u8; 4] = b"WImk";
const HEADER_LEN: usize = 19;
const CURRENT: u8 = 0;
const LEGACY: u8 = 1;

/// One recorded engine entry point.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Call {
    CreateRawImage,
    FreeRawImageData,
    DestroyRawImage,
    CreateCmpImage,
    FreeCmpImageData,
    DestroyCmpImage,
    CreateCmpOptions,
    DestroyCmpOptions,
    CreateDecmpOptions,
    DestroyDecmpOptions,
    Compress,
    BeginDecompress,
    DecompressSubHeader,
    DecompressSubImage,
    EndDecompress,
    LegacyCompress,
    LegacyDecompress,
    FreeImageInfo,
    FreeCmpDataInfo,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MockStats {
    /// Structures handed out by a factory.
    pub creates: usize,
    /// Structures released by a destroy routine.
    pub destroys: usize,
    /// Payloads allocated by the engine.
    pub engine_allocations: usize,
    /// Calls to any payload free routine.
    pub engine_frees: usize,
    /// Free routine called on memory the engine did not allocate.
    pub foreign_frees: usize,
    /// Destroy called on something not live.
    pub invalid_destroys: usize,
    /// Structure destroyed with a caller pointer still attached.
    pub attached_at_destroy: usize,
}

/// Compression parameters as the engine last saw them.
#[derive(Debug, Clone, PartialEq)]
pub struct CompressionRecord {
    pub quality: f32,
    pub cmp_ratio: f32,
    /// `cmp_control` for the current generation, `auto_ratio` for legacy.
    pub control: c_int,
    pub encoder: c_int,
    pub encode_path: c_int,
    pub progressive: c_int,
    pub focus_boxes: Vec<WiBox>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DecompressionRecord {
    pub smoothing: c_int,
    pub fast: c_int,
    pub sharpening: c_int,
}

#[derive(Debug, Clone, Copy)]
struct StreamHeader {
    generation: u8,
    width: c_int,
    height: c_int,
    bits_per_pixel: c_int,
    color: c_int,
}

impl StreamHeader {
    fn pixel_len(&self) -> Option<usize> {
        if self.width < 0 || self.height < 0 || !matches!(self.bits_per_pixel, 8 | 24) {
            return None;
        }
        (self.width as usize)
            .checked_mul(self.height as usize)?
            .checked_mul(self.bits_per_pixel as usize / 8)
    }

    fn write(&self, quality: f32, pixels: &[u8]) -> Vec<u8> {
        let mut out = Vec::with_capacity(HEADER_LEN + pixels.len());
        out.extend_from_slice(MAGIC);
        out.push(self.generation);
        out.extend_from_slice(&(self.width as u32).to_le_bytes());
        out.extend_from_slice(&(self.height as u32).to_le_bytes());
        out.push(self.bits_per_pixel as u8);
        out.push(self.color as u8);
        out.extend_from_slice(&quality.to_le_bytes());
        out.extend_from_slice(pixels);
        out
    }

    fn parse(stream: &[u8], generation: u8) -> Option<(Self, Vec<u8>)> {
        if stream.len() < HEADER_LEN || &stream[..4] != MAGIC || stream[4] != generation {
            return None;
        }
        let word = |at: usize| {
            u32::from_le_bytes([stream[at], stream[at + 1], stream[at + 2], stream[at + 3]])
        };
        let header = StreamHeader {
            generation,
            width: c_int::try_from(word(5)).ok()?,
            height: c_int::try_from(word(9)).ok()?,
            bits_per_pixel: stream[13] as c_int,
            color: stream[14] as c_int,
        };
        let pixels = &stream[HEADER_LEN..];
        (header.pixel_len()? == pixels.len()).then(|| (header, pixels.to_vec()))
    }
}

struct Session {
    header: StreamHeader,
    pixels: Vec<u8>,
    header_read: bool,
}

#[derive(Default)]
struct State {
    calls: Vec<Call>,
    stats: MockStats,
    live: HashSet<usize>,
    buffers: HashMap<usize, Box<[u8]>>,
    sessions: HashMap<usize, Session>,
    fail_allocation: HashSet<String>,
    fail_stages: HashMap<Stage, c_int>,
    reported_format: Option<(c_int, c_int)>,
    last_input: Option<Vec<u8>>,
    last_compression: Option<CompressionRecord>,
    last_decompression: Option<DecompressionRecord>,
}

impl State {
    fn injected(&self, stage: Stage) -> Option<c_int> {
        self.fail_stages.get(&stage).copied()
    }

    fn create<T: NativeStruct + Default>(&mut self, call: Call) -> *mut T {
        self.calls.push(call);
        if self.fail_allocation.contains(T::KIND) {
            return ptr::null_mut();
        }
        let ptr = Box::into_raw(Box::<T>::default());
        self.live.insert(ptr as usize);
        self.stats.creates += 1;
        ptr
    }

    /// # Safety
    /// `ptr` must be null or come from [`State::create`] for the same `T`.
    unsafe fn destroy<T>(&mut self, call: Call, ptr: *mut T, data: fn(&T) -> *mut c_uchar) {
        self.calls.push(call);
        if !self.live.remove(&(ptr as usize)) {
            self.stats.invalid_destroys += 1;
            return;
        }
        let boxed = unsafe { Box::from_raw(ptr) };
        let attached = data(&boxed);
        if !attached.is_null() && !self.buffers.contains_key(&(attached as usize)) {
            self.stats.attached_at_destroy += 1;
        }
        self.stats.destroys += 1;
    }

    fn allocate(&mut self, bytes: Vec<u8>) -> *mut c_uchar {
        // Zero-length boxes share a dangling address; keep every key unique.
        let mut data = if bytes.is_empty() { vec![0u8] } else { bytes }.into_boxed_slice();
        let ptr = data.as_mut_ptr();
        self.buffers.insert(ptr as usize, data);
        self.stats.engine_allocations += 1;
        ptr
    }

    fn release(&mut self, call: Call, data: &mut *mut c_uchar) {
        self.calls.push(call);
        self.stats.engine_frees += 1;
        if data.is_null() {
            return;
        }
        if self.buffers.remove(&(*data as usize)).is_some() {
            *data = ptr::null_mut();
        } else {
            self.stats.foreign_frees += 1;
        }
    }

    fn reported(&self, header: &StreamHeader) -> (c_int, c_int) {
        self.reported_format
            .unwrap_or((header.color, header.bits_per_pixel))
    }
}

/// Recording engine double. `Sync`, so one instance can serve concurrent
/// codec calls.
#[derive(Default)]
pub struct MockEngine {
    state: Mutex<State>,
}

impl MockEngine {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Make the factory for structures of `kind` return null.
    pub fn fail_allocation_of(&self, kind: &str) {
        self.lock().fail_allocation.insert(kind.to_owned());
    }

    /// Make `stage` return `code` from now on.
    pub fn fail_stage(&self, stage: Stage, code: c_int) {
        self.lock().fail_stages.insert(stage, code);
    }

    pub fn clear_failures(&self) {
        let mut state = self.lock();
        state.fail_allocation.clear();
        state.fail_stages.clear();
    }

    /// Report this color mode and depth from the header stage instead of the
    /// stream's own.
    pub fn report_format(&self, color: c_int, bits_per_pixel: c_int) {
        self.lock().reported_format = Some((color, bits_per_pixel));
    }

    pub fn calls(&self) -> Vec<Call> {
        self.lock().calls.clone()
    }

    pub fn stats(&self) -> MockStats {
        self.lock().stats
    }

    /// Structures created and not yet destroyed.
    pub fn live_structures(&self) -> usize {
        self.lock().live.len()
    }

    /// Engine payloads allocated and not yet freed.
    pub fn live_engine_buffers(&self) -> usize {
        self.lock().buffers.len()
    }

    /// Pixels the engine read during the last compression.
    pub fn last_input_pixels(&self) -> Option<Vec<u8>> {
        self.lock().last_input.clone()
    }

    pub fn last_compression(&self) -> Option<CompressionRecord> {
        self.lock().last_compression.clone()
    }

    pub fn last_decompression(&self) -> Option<DecompressionRecord> {
        self.lock().last_decompression
    }
}

/// # Safety
/// When `len` is non-zero, `data` must point to `len` readable bytes.
unsafe fn read_pixels(data: *const c_uchar, header: &StreamHeader) -> Option<Vec<u8>> {
    let len = header.pixel_len()?;
    if len == 0 {
        return Some(Vec::new());
    }
    if data.is_null() {
        return None;
    }
    Some(unsafe { std::slice::from_raw_parts(data, len) }.to_vec())
}

/// # Safety
/// `boxes` must point to `n` readable boxes when `n` is positive.
unsafe fn read_boxes<B: Copy + Into<WiBox>>(boxes: *const B, n: c_int) -> Option<Vec<WiBox>> {
    if n <= 0 {
        return Some(Vec::new());
    }
    if boxes.is_null() {
        return None;
    }
    let boxes = unsafe { std::slice::from_raw_parts(boxes, n as usize) };
    Some(boxes.iter().copied().map(Into::into).collect())
}

// SAFETY: factories hand out live boxes, payloads come from `State::allocate`
// and are only released through `State::release`, which never frees memory it
// did not allocate.
unsafe impl SwiApi for MockEngine {
    unsafe fn create_raw_image(&self) -> *mut WiRawImage {
        self.lock().create(Call::CreateRawImage)
    }

    unsafe fn free_raw_image_data(&self, raw_image: *mut WiRawImage) {
        let mut state = self.lock();
        match unsafe { raw_image.as_mut() } {
            Some(raw) => state.release(Call::FreeRawImageData, &mut raw.raw),
            None => state.release(Call::FreeRawImageData, &mut ptr::null_mut()),
        }
    }

    unsafe fn destroy_raw_image(&self, raw_image: *mut WiRawImage) {
        unsafe { self.lock().destroy(Call::DestroyRawImage, raw_image, |r| r.raw) }
    }

    unsafe fn create_cmp_image(&self) -> *mut WiCmpImage {
        self.lock().create(Call::CreateCmpImage)
    }

    unsafe fn free_cmp_image_data(&self, cmp_image: *mut WiCmpImage) {
        let mut state = self.lock();
        match unsafe { cmp_image.as_mut() } {
            Some(cmp) => state.release(Call::FreeCmpImageData, &mut cmp.cmp_data),
            None => state.release(Call::FreeCmpImageData, &mut ptr::null_mut()),
        }
    }

    unsafe fn destroy_cmp_image(&self, cmp_image: *mut WiCmpImage) {
        unsafe { self.lock().destroy(Call::DestroyCmpImage, cmp_image, |c| c.cmp_data) }
    }

    unsafe fn create_cmp_options(&self) -> *mut WiCmpOptions {
        self.lock().create(Call::CreateCmpOptions)
    }

    unsafe fn destroy_cmp_options(&self, cmp_options: *mut WiCmpOptions) {
        unsafe {
            self.lock()
                .destroy(Call::DestroyCmpOptions, cmp_options, |_| ptr::null_mut())
        }
    }

    unsafe fn create_decmp_options(&self) -> *mut WiDecmpOptions {
        self.lock().create(Call::CreateDecmpOptions)
    }

    unsafe fn destroy_decmp_options(&self, decmp_options: *mut WiDecmpOptions) {
        unsafe {
            self.lock()
                .destroy(Call::DestroyDecmpOptions, decmp_options, |_| ptr::null_mut())
        }
    }

    unsafe fn compress(
        &self,
        cmp_options: *mut WiCmpOptions,
        raw_image: *mut WiRawImage,
        cmp_image: *mut WiCmpImage,
    ) -> c_int {
        let mut state = self.lock();
        state.calls.push(Call::Compress);
        if let Some(code) = state.injected(Stage::Compress) {
            return code;
        }
        let (Some(options), Some(raw), Some(cmp)) =
            (unsafe { (cmp_options.as_ref(), raw_image.as_ref(), cmp_image.as_mut()) })
        else {
            return ERR_ARGUMENT;
        };
        let Some(focus_boxes) = (unsafe { read_boxes(options.focus_boxes, options.n_boxes) }) else {
            return ERR_ARGUMENT;
        };
        state.last_compression = Some(CompressionRecord {
            quality: options.quality,
            cmp_ratio: options.cmp_ratio,
            control: options.cmp_control,
            encoder: options.encoder,
            encode_path: options.encode_path,
            progressive: options.progressive,
            focus_boxes,
        });
        let header = StreamHeader {
            generation: CURRENT,
            width: raw.width,
            height: raw.height,
            bits_per_pixel: raw.bits_per_pixel,
            color: raw.color,
        };
        let Some(pixels) = (unsafe { read_pixels(raw.raw, &header) }) else {
            return ERR_ARGUMENT;
        };
        let stream = header.write(options.quality, &pixels);
        state.last_input = Some(pixels);
        cmp.size = stream.len() as c_int;
        cmp.cmp_data = state.allocate(stream);
        SWI_OK
    }

    unsafe fn begin_decompress(
        &self,
        decmp_options: *mut WiDecmpOptions,
        raw_image: *mut WiRawImage,
        cmp_image: *mut WiCmpImage,
    ) -> c_int {
        let mut state = self.lock();
        state.calls.push(Call::BeginDecompress);
        if let Some(code) = state.injected(Stage::DecompressBegin) {
            return code;
        }
        let (Some(options), Some(raw), Some(cmp)) =
            (unsafe { (decmp_options.as_ref(), raw_image.as_mut(), cmp_image.as_ref()) })
        else {
            return ERR_ARGUMENT;
        };
        state.last_decompression = Some(DecompressionRecord {
            smoothing: options.smoothing,
            fast: options.fast,
            sharpening: options.sharpening,
        });
        let Ok(size) = usize::try_from(cmp.size) else {
            return ERR_ARGUMENT;
        };
        if cmp.cmp_data.is_null() && size != 0 {
            return ERR_ARGUMENT;
        }
        let stream = if size == 0 {
            &[][..]
        } else {
            unsafe { std::slice::from_raw_parts(cmp.cmp_data, size) }
        };
        let Some((header, pixels)) = StreamHeader::parse(stream, CURRENT) else {
            return ERR_CORRUPT_STREAM;
        };
        // The output buffer is allocated up front and filled by the sub-image
        // stage.
        raw.raw = state.allocate(vec![0; pixels.len()]);
        state.sessions.insert(
            raw_image as usize,
            Session {
                header,
                pixels,
                header_read: false,
            },
        );
        SWI_OK
    }

    unsafe fn decompress_sub_header(
        &self,
        _decmp_options: *mut WiDecmpOptions,
        raw_image: *mut WiRawImage,
        _cmp_image: *mut WiCmpImage,
    ) -> c_int {
        let mut state = self.lock();
        state.calls.push(Call::DecompressSubHeader);
        if let Some(code) = state.injected(Stage::DecompressHeader) {
            return code;
        }
        let Some(raw) = (unsafe { raw_image.as_mut() }) else {
            return ERR_ARGUMENT;
        };
        let Some(header) = state.sessions.get(&(raw_image as usize)).map(|s| s.header) else {
            return ERR_NO_SESSION;
        };
        let (color, bits_per_pixel) = state.reported(&header);
        raw.width = header.width;
        raw.height = header.height;
        raw.color = color;
        raw.bits_per_pixel = bits_per_pixel;
        if let Some(session) = state.sessions.get_mut(&(raw_image as usize)) {
            session.header_read = true;
        }
        SWI_OK
    }

    unsafe fn decompress_sub_image(
        &self,
        _decmp_options: *mut WiDecmpOptions,
        raw_image: *mut WiRawImage,
        _cmp_image: *mut WiCmpImage,
    ) -> c_int {
        let mut state = self.lock();
        state.calls.push(Call::DecompressSubImage);
        if let Some(code) = state.injected(Stage::DecompressSubImage) {
            return code;
        }
        let Some(raw) = (unsafe { raw_image.as_ref() }) else {
            return ERR_ARGUMENT;
        };
        let State {
            sessions, buffers, ..
        } = &mut *state;
        let Some(session) = sessions.get(&(raw_image as usize)).filter(|s| s.header_read) else {
            return ERR_NO_SESSION;
        };
        let Some(target) = buffers.get_mut(&(raw.raw as usize)) else {
            return ERR_ARGUMENT;
        };
        target[..session.pixels.len()].copy_from_slice(&session.pixels);
        SWI_OK
    }

    unsafe fn end_decompress(
        &self,
        _decmp_options: *mut WiDecmpOptions,
        raw_image: *mut WiRawImage,
        _cmp_image: *mut WiCmpImage,
    ) {
        let mut state = self.lock();
        state.calls.push(Call::EndDecompress);
        state.sessions.remove(&(raw_image as usize));
    }

    unsafe fn legacy_compress(
        &self,
        image_info: *mut SiImageInfo,
        cmp_option: *mut SiCmpOption,
        cmp_data_info: *mut SiCmpDataInfo,
    ) -> c_int {
        let mut state = self.lock();
        state.calls.push(Call::LegacyCompress);
        if let Some(code) = state.injected(Stage::LegacyCompress) {
            return code;
        }
        let (Some(info), Some(options), Some(cmp)) =
            (unsafe { (image_info.as_ref(), cmp_option.as_ref(), cmp_data_info.as_mut()) })
        else {
            return ERR_ARGUMENT;
        };
        let Some(focus_boxes) = (unsafe { read_boxes(options.focus_boxes, options.n_boxes) }) else {
            return ERR_ARGUMENT;
        };
        state.last_compression = Some(CompressionRecord {
            quality: options.quality,
            cmp_ratio: options.cmp_ratio,
            control: options.auto_ratio,
            encoder: options.encoder,
            encode_path: options.encode_path,
            progressive: options.progressive,
            focus_boxes,
        });
        let header = StreamHeader {
            generation: LEGACY,
            width: info.width,
            height: info.height,
            bits_per_pixel: info.bits_per_pixel,
            color: info.color,
        };
        let Some(pixels) = (unsafe { read_pixels(info.raw, &header) }) else {
            return ERR_ARGUMENT;
        };
        let stream = header.write(options.quality, &pixels);
        state.last_input = Some(pixels);
        cmp.size = stream.len() as c_int;
        cmp.cmp_data = state.allocate(stream);
        SWI_OK
    }

    unsafe fn legacy_decompress(
        &self,
        cmp_data_info: *mut SiCmpDataInfo,
        decmp_option: *mut SiDecmpOption,
        image_info: *mut SiImageInfo,
    ) -> c_int {
        let mut state = self.lock();
        state.calls.push(Call::LegacyDecompress);
        if let Some(code) = state.injected(Stage::LegacyDecompress) {
            return code;
        }
        let (Some(cmp), Some(options), Some(info)) =
            (unsafe { (cmp_data_info.as_ref(), decmp_option.as_ref(), image_info.as_mut()) })
        else {
            return ERR_ARGUMENT;
        };
        state.last_decompression = Some(DecompressionRecord {
            smoothing: options.smoothing,
            fast: options.fast,
            sharpening: options.sharpening,
        });
        let Ok(size) = usize::try_from(cmp.size) else {
            return ERR_ARGUMENT;
        };
        if cmp.cmp_data.is_null() && size != 0 {
            return ERR_ARGUMENT;
        }
        let stream = if size == 0 {
            &[][..]
        } else {
            unsafe { std::slice::from_raw_parts(cmp.cmp_data, size) }
        };
        let Some((header, pixels)) = StreamHeader::parse(stream, LEGACY) else {
            return ERR_CORRUPT_STREAM;
        };
        let (color, bits_per_pixel) = state.reported(&header);
        info.width = header.width;
        info.height = header.height;
        info.color = color;
        info.bits_per_pixel = bits_per_pixel;
        info.raw = state.allocate(pixels);
        SWI_OK
    }

    unsafe fn legacy_free_image_info(&self, image_info: *mut SiImageInfo) {
        let mut state = self.lock();
        match unsafe { image_info.as_mut() } {
            Some(info) => state.release(Call::FreeImageInfo, &mut info.raw),
            None => state.release(Call::FreeImageInfo, &mut ptr::null_mut()),
        }
    }

    unsafe fn legacy_free_cmp_data_info(&self, cmp_data_info: *mut SiCmpDataInfo) {
        let mut state = self.lock();
        match unsafe { cmp_data_info.as_mut() } {
            Some(cmp) => state.release(Call::FreeCmpDataInfo, &mut cmp.cmp_data),
            None => state.release(Call::FreeCmpDataInfo, &mut ptr::null_mut()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_header_rejects_other_generation() {
        let header = StreamHeader {
            generation: CURRENT,
            width: 1,
            height: 1,
            bits_per_pixel: 8,
            color: 0,
        };
        let stream = header.write(0.5, &[42]);
        assert_eq!(stream.len(), HEADER_LEN + 1);
        assert!(StreamHeader::parse(&stream, LEGACY).is_none());
        let (parsed, pixels) = StreamHeader::parse(&stream, CURRENT).unwrap();
        assert_eq!(parsed.width, 1);
        assert_eq!(pixels, [42]);
    }

    #[test]
    fn truncated_stream_is_corrupt() {
        assert!(StreamHeader::parse(b"WImk", CURRENT).is_none());
        assert!(StreamHeader::parse(&[], CURRENT).is_none());
    }

    #[test]
    fn freeing_unknown_memory_is_counted() {
        let engine = MockEngine::new();
        let mut caller = [0u8; 4];
        let mut cmp = WiCmpImage {
            cmp_data: caller.as_mut_ptr(),
            size: 4,
        };
        unsafe { engine.free_cmp_image_data(&mut cmp) };
        assert_eq!(engine.stats().foreign_frees, 1);
        assert!(!cmp.cmp_data.is_null());
    }

    #[test]
    fn double_destroy_is_counted_not_freed() {
        let engine = MockEngine::new();
        let raw = unsafe { engine.create_raw_image() };
        unsafe { engine.destroy_raw_image(raw) };
        unsafe { engine.destroy_raw_image(raw) };
        assert_eq!(engine.stats().invalid_destroys, 1);
        assert_eq!(engine.live_structures(), 0);
    }

    #[test]
    fn sub_image_requires_header() {
        let engine = MockEngine::new();
        let raw = unsafe { engine.create_raw_image() };
        let code = unsafe { engine.decompress_sub_image(ptr::null_mut(), raw, ptr::null_mut()) };
        assert_eq!(code, ERR_NO_SESSION);
        unsafe { engine.destroy_raw_image(raw) };
    }
}
