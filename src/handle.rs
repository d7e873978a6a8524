//! Scoped ownership of native structures.
//!
//! A [`Handle`] owns one engine structure from its factory call to its
//! destroy call. The structure's data field is a separate ownership unit,
//! tracked by the handle as either caller-owned (a [`CallerBuffer`] released
//! by Rust) or engine-owned (released by the engine's free routine). The
//! payload is always released before the structure is destroyed.

use std::os::raw::c_uchar;
use std::ptr::{self, NonNull};

use log::trace;

use crate::error::SwiError;
use crate::marshal::{CallerBuffer, EngineBuffer};
use crate::sys::{
    SiCmpDataInfo, SiCmpOption, SiDecmpOption, SiImageInfo, SwiApi, WiCmpImage, WiCmpOptions,
    WiDecmpOptions, WiRawImage,
};

/// A structure with a matching create/destroy pair.
pub(crate) trait NativeStruct: Sized {
    const KIND: &'static str;

    /// # Safety
    /// The returned pointer, if non-null, must be released exactly once with
    /// [`NativeStruct::destroy`] on the same engine.
    unsafe fn create<A: SwiApi + ?Sized>(api: &A) -> *mut Self;

    /// # Safety
    /// `ptr` must come from [`NativeStruct::create`] and not be used again.
    unsafe fn destroy<A: SwiApi + ?Sized>(api: &A, ptr: *mut Self);
}

/// A structure carrying a data buffer that may belong to either side.
pub(crate) trait Payload: NativeStruct {
    fn data_ptr(&mut self) -> &mut *mut c_uchar;

    /// Release engine-allocated data through the engine's own routine.
    ///
    /// # Safety
    /// `ptr` must be live and its data field must hold engine memory or null.
    unsafe fn free_engine_data<A: SwiApi + ?Sized>(api: &A, ptr: *mut Self);
}

enum Ownership<A: ?Sized, T> {
    Empty,
    Caller {
        buffer: CallerBuffer,
        detach: fn(&mut T),
    },
    Engine {
        free: unsafe fn(&A, *mut T),
    },
}

/// Owns one native structure for the duration of a call.
pub(crate) struct Handle<'a, A: SwiApi + ?Sized, T: NativeStruct> {
    api: &'a A,
    ptr: NonNull<T>,
    payload: Ownership<A, T>,
}

impl<'a, A: SwiApi + ?Sized, T: NativeStruct> Handle<'a, A, T> {
    /// Create the structure through its factory. A null result aborts the
    /// call with [`SwiError::ResourceAllocation`].
    pub(crate) fn acquire(api: &'a A) -> Result<Self, SwiError> {
        let raw = unsafe { T::create(api) };
        let ptr = NonNull::new(raw).ok_or(SwiError::ResourceAllocation { resource: T::KIND })?;
        trace!("created {} at {:p}", T::KIND, ptr);
        Ok(Self {
            api,
            ptr,
            payload: Ownership::Empty,
        })
    }

    pub(crate) fn as_ptr(&self) -> *mut T {
        self.ptr.as_ptr()
    }

    pub(crate) fn get(&self) -> &T {
        // SAFETY: the handle is the only owner and the pointer is live until drop.
        unsafe { self.ptr.as_ref() }
    }

    pub(crate) fn get_mut(&mut self) -> &mut T {
        // SAFETY: see `get`.
        unsafe { self.ptr.as_mut() }
    }

    pub(crate) fn holds_engine_data(&self) -> bool {
        matches!(self.payload, Ownership::Engine { .. })
    }

    /// Release the data buffer, if any, through the routine that matches its
    /// owner. Calling this twice is a no-op.
    pub(crate) fn release_data(&mut self) {
        match std::mem::replace(&mut self.payload, Ownership::Empty) {
            Ownership::Empty => {}
            Ownership::Caller { buffer, detach } => {
                detach(self.get_mut());
                trace!("released caller data of {} ({} bytes)", T::KIND, buffer.len());
                drop(buffer);
            }
            Ownership::Engine { free } => {
                trace!("freeing engine data of {}", T::KIND);
                unsafe { free(self.api, self.ptr.as_ptr()) };
            }
        }
    }
}

impl<'a, A: SwiApi + ?Sized, T: Payload> Handle<'a, A, T> {
    /// Point the structure's data field at a caller-owned buffer. The buffer
    /// lives in the handle until [`Handle::release_data`] or drop.
    pub(crate) fn attach_caller(&mut self, mut buffer: CallerBuffer) {
        self.release_data();
        *self.get_mut().data_ptr() = buffer.as_mut_ptr();
        self.payload = Ownership::Caller {
            buffer,
            detach: |native: &mut T| *native.data_ptr() = ptr::null_mut(),
        };
    }

    /// Record that an engine call may have populated the data field. The
    /// engine's free routine will be issued exactly once.
    pub(crate) fn mark_engine_owned(&mut self) {
        if self.holds_engine_data() {
            return;
        }
        self.release_data();
        self.payload = Ownership::Engine {
            free: T::free_engine_data::<A>,
        };
    }

    /// Borrow `len` bytes of engine-owned data. `None` if the engine left the
    /// field null with a non-zero length expected, or if the data is not
    /// engine-owned.
    pub(crate) fn engine_data(&mut self, len: usize) -> Option<EngineBuffer<'_>> {
        if !self.holds_engine_data() {
            return None;
        }
        let data = *self.get_mut().data_ptr();
        // SAFETY: the engine reported `len` bytes at `data`; they stay valid
        // until the engine free routine runs, which needs `&mut self`.
        unsafe { EngineBuffer::new(data, len) }
    }
}

impl<A: SwiApi + ?Sized, T: NativeStruct> Drop for Handle<'_, A, T> {
    fn drop(&mut self) {
        self.release_data();
        trace!("destroying {} at {:p}", T::KIND, self.ptr);
        unsafe { T::destroy(self.api, self.ptr.as_ptr()) };
    }
}

impl NativeStruct for WiRawImage {
    const KIND: &'static str = "raw image";

    unsafe fn create<A: SwiApi + ?Sized>(api: &A) -> *mut Self {
        unsafe { api.create_raw_image() }
    }

    unsafe fn destroy<A: SwiApi + ?Sized>(api: &A, ptr: *mut Self) {
        unsafe { api.destroy_raw_image(ptr) }
    }
}

impl Payload for WiRawImage {
    fn data_ptr(&mut self) -> &mut *mut c_uchar {
        &mut self.raw
    }

    unsafe fn free_engine_data<A: SwiApi + ?Sized>(api: &A, ptr: *mut Self) {
        unsafe { api.free_raw_image_data(ptr) }
    }
}

impl NativeStruct for WiCmpImage {
    const KIND: &'static str = "compressed image";

    unsafe fn create<A: SwiApi + ?Sized>(api: &A) -> *mut Self {
        unsafe { api.create_cmp_image() }
    }

    unsafe fn destroy<A: SwiApi + ?Sized>(api: &A, ptr: *mut Self) {
        unsafe { api.destroy_cmp_image(ptr) }
    }
}

impl Payload for WiCmpImage {
    fn data_ptr(&mut self) -> &mut *mut c_uchar {
        &mut self.cmp_data
    }

    unsafe fn free_engine_data<A: SwiApi + ?Sized>(api: &A, ptr: *mut Self) {
        unsafe { api.free_cmp_image_data(ptr) }
    }
}

impl NativeStruct for WiCmpOptions {
    const KIND: &'static str = "compression options";

    unsafe fn create<A: SwiApi + ?Sized>(api: &A) -> *mut Self {
        unsafe { api.create_cmp_options() }
    }

    unsafe fn destroy<A: SwiApi + ?Sized>(api: &A, ptr: *mut Self) {
        unsafe { api.destroy_cmp_options(ptr) }
    }
}

impl NativeStruct for WiDecmpOptions {
    const KIND: &'static str = "decompression options";

    unsafe fn create<A: SwiApi + ?Sized>(api: &A) -> *mut Self {
        unsafe { api.create_decmp_options() }
    }

    unsafe fn destroy<A: SwiApi + ?Sized>(api: &A, ptr: *mut Self) {
        unsafe { api.destroy_decmp_options(ptr) }
    }
}

// The legacy generation has no factories: its structures are declared by the
// caller, so they live in Rust-owned boxes.
macro_rules! caller_declared {
    ($ty:ty, $kind:literal) => {
        impl NativeStruct for $ty {
            const KIND: &'static str = $kind;

            unsafe fn create<A: SwiApi + ?Sized>(_api: &A) -> *mut Self {
                Box::into_raw(Box::<$ty>::default())
            }

            unsafe fn destroy<A: SwiApi + ?Sized>(_api: &A, ptr: *mut Self) {
                drop(unsafe { Box::from_raw(ptr) });
            }
        }
    };
}

caller_declared!(SiImageInfo, "legacy image info");
caller_declared!(SiCmpDataInfo, "legacy compressed data info");
caller_declared!(SiCmpOption, "legacy compression options");
caller_declared!(SiDecmpOption, "legacy decompression options");

impl Payload for SiImageInfo {
    fn data_ptr(&mut self) -> &mut *mut c_uchar {
        &mut self.raw
    }

    unsafe fn free_engine_data<A: SwiApi + ?Sized>(api: &A, ptr: *mut Self) {
        unsafe { api.legacy_free_image_info(ptr) }
    }
}

impl Payload for SiCmpDataInfo {
    fn data_ptr(&mut self) -> &mut *mut c_uchar {
        &mut self.cmp_data
    }

    unsafe fn free_engine_data<A: SwiApi + ?Sized>(api: &A, ptr: *mut Self) {
        unsafe { api.legacy_free_cmp_data_info(ptr) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::marshal::to_foreign;
    use crate::mock::{Call, MockEngine};

    #[test]
    fn acquire_and_drop_pairs_create_with_destroy() {
        let engine = MockEngine::new();
        {
            let _raw = Handle::<_, WiRawImage>::acquire(&engine).unwrap();
            let _cmp = Handle::<_, WiCmpImage>::acquire(&engine).unwrap();
            assert_eq!(engine.live_structures(), 2);
        }
        assert_eq!(engine.live_structures(), 0);
        assert_eq!(engine.stats().creates, 2);
        assert_eq!(engine.stats().destroys, 2);
    }

    #[test]
    fn factory_failure_is_resource_allocation() {
        let engine = MockEngine::new();
        engine.fail_allocation_of(WiCmpOptions::KIND);
        let err = Handle::<_, WiCmpOptions>::acquire(&engine).err().unwrap();
        assert!(matches!(
            err,
            SwiError::ResourceAllocation {
                resource: "compression options"
            }
        ));
    }

    #[test]
    fn caller_data_is_detached_and_never_engine_freed() {
        let engine = MockEngine::new();
        {
            let mut raw = Handle::<_, WiRawImage>::acquire(&engine).unwrap();
            raw.attach_caller(to_foreign(&[1, 2, 3]));
            assert!(!raw.get().raw.is_null());
            raw.release_data();
            assert!(raw.get().raw.is_null());
        }
        assert_eq!(engine.stats().engine_frees, 0);
        assert!(!engine.calls().contains(&Call::FreeRawImageData));
    }

    #[test]
    fn engine_data_freed_once_before_destroy() {
        let engine = MockEngine::new();
        {
            let mut cmp = Handle::<_, WiCmpImage>::acquire(&engine).unwrap();
            cmp.mark_engine_owned();
            cmp.mark_engine_owned();
        }
        let calls = engine.calls();
        let free = calls.iter().position(|c| *c == Call::FreeCmpImageData).unwrap();
        let destroy = calls.iter().position(|c| *c == Call::DestroyCmpImage).unwrap();
        assert!(free < destroy);
        assert_eq!(engine.stats().engine_frees, 1);
    }

    #[test]
    fn legacy_structures_need_no_engine_factory() {
        let engine = MockEngine::new();
        {
            let info = Handle::<_, SiImageInfo>::acquire(&engine).unwrap();
            assert!(info.get().raw.is_null());
        }
        assert!(engine.calls().is_empty());
    }
}
