//! Byte buffers crossing the engine boundary.
//!
//! Two ownership domains exist and each has its own type:
//!
//! - [`CallerBuffer`] is memory this crate allocates and hands to the engine.
//!   The engine may read or mutate it but never frees it; it is released by
//!   Rust's allocator when the buffer is dropped.
//! - [`EngineBuffer`] is a borrowed view of memory the engine allocated. It
//!   never frees anything; the owning [`Handle`](crate::handle::Handle)
//!   releases the memory through the engine's own free routine.

use std::marker::PhantomData;
use std::os::raw::c_uchar;
use std::slice;

/// Caller-owned copy of a managed buffer, placed where the engine can see it.
#[derive(Debug)]
pub(crate) struct CallerBuffer {
    data: Box<[u8]>,
}

impl CallerBuffer {
    pub(crate) fn len(&self) -> usize {
        self.data.len()
    }

    #[cfg(test)]
    fn as_slice(&self) -> &[u8] {
        &self.data
    }

    /// Pointer handed to the engine. Stays valid until `self` is dropped.
    pub(crate) fn as_mut_ptr(&mut self) -> *mut c_uchar {
        self.data.as_mut_ptr()
    }
}

/// Copy `bytes` into a freshly allocated caller-owned buffer.
///
/// An empty input yields an empty allocation.
pub(crate) fn to_foreign(bytes: &[u8]) -> CallerBuffer {
    CallerBuffer {
        data: Box::from(bytes),
    }
}

/// Read-only view of engine-owned memory.
///
/// The lifetime ties the view to the structure that owns the memory, so the
/// view cannot outlive the engine free routine.
#[derive(Debug, Clone, Copy)]
pub(crate) struct EngineBuffer<'h> {
    ptr: *const c_uchar,
    len: usize,
    _owner: PhantomData<&'h ()>,
}

impl<'h> EngineBuffer<'h> {
    /// Wrap `len` bytes at `ptr`. Returns `None` for a null pointer with a
    /// non-zero length.
    ///
    /// # Safety
    /// When non-null, `ptr` must point to at least `len` readable bytes that
    /// stay valid and unmodified for `'h`.
    pub(crate) unsafe fn new(ptr: *const c_uchar, len: usize) -> Option<Self> {
        if ptr.is_null() && len != 0 {
            return None;
        }
        Some(Self {
            ptr,
            len,
            _owner: PhantomData,
        })
    }

    pub(crate) fn as_slice(&self) -> &'h [u8] {
        if self.len == 0 {
            return &[];
        }
        // SAFETY: guaranteed by the contract of `EngineBuffer::new`.
        unsafe { slice::from_raw_parts(self.ptr, self.len) }
    }
}

/// Copy engine-owned memory into a managed buffer without taking ownership
/// of the source.
pub(crate) fn from_foreign(buffer: EngineBuffer<'_>) -> Vec<u8> {
    buffer.as_slice().to_vec()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::ptr;

    #[test]
    fn to_foreign_copies_bytes() {
        let source = vec![1u8, 2, 3, 4];
        let mut buffer = to_foreign(&source);
        assert_eq!(buffer.as_slice(), &source[..]);
        assert_ne!(buffer.as_mut_ptr() as *const u8, source.as_ptr());
    }

    #[test]
    fn empty_input_passes_through() {
        let buffer = to_foreign(&[]);
        assert_eq!(buffer.len(), 0);
    }

    #[test]
    fn from_foreign_copies_without_owning() {
        let engine_side = vec![9u8, 8, 7];
        let view = unsafe { EngineBuffer::new(engine_side.as_ptr(), engine_side.len()) }.unwrap();
        let copy = from_foreign(view);
        assert_eq!(copy, engine_side);
        drop(copy);
        assert_eq!(engine_side, [9, 8, 7]);
    }

    #[test]
    fn null_engine_pointer() {
        assert!(unsafe { EngineBuffer::new(ptr::null(), 4) }.is_none());
        let empty = unsafe { EngineBuffer::new(ptr::null(), 0) }.unwrap();
        assert!(from_foreign(empty).is_empty());
    }
}
