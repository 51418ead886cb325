//! ABI out-array allocator.
//!
//! Introspection calls hand back arrays the caller must free without
//! knowing the allocation size, so the size is stashed in a header ahead of
//! the payload:
//!
//! ┌───────────────┬─────────────────────────┐
//! │ size (usize)  │  payload (size bytes)   │
//! └───────────────┴─────────────────────────┘
//!         ^ HEADER bytes, payload 16-aligned

use std::alloc::{alloc_zeroed, dealloc, Layout};
use std::ffi::c_void;

/// Header ahead of every allocation; keeps the payload 16-aligned.
const HEADER: usize = 16;

fn layout_for(size: usize) -> Layout {
    Layout::from_size_align(HEADER + size, HEADER).expect("abi allocation layout overflow")
}

/// Allocate `size` zeroed bytes. Returns null for a zero-size request.
pub fn abi_alloc(size: usize) -> *mut c_void {
    if size == 0 {
        return std::ptr::null_mut();
    }
    unsafe {
        let raw = alloc_zeroed(layout_for(size));
        if raw.is_null() {
            std::alloc::handle_alloc_error(layout_for(size));
        }
        *(raw as *mut usize) = size;
        raw.add(HEADER) as *mut c_void
    }
}

/// Free a pointer produced by [`abi_alloc`]. Null is a no-op.
///
/// # Safety
/// `ptr` must be null or a payload pointer previously returned by
/// [`abi_alloc`] that has not been freed.
pub unsafe fn abi_free(ptr: *mut c_void) {
    if ptr.is_null() {
        return;
    }
    let raw = (ptr as *mut u8).sub(HEADER);
    let size = *(raw as *const usize);
    dealloc(raw, layout_for(size));
}

/// Allocate a zeroed array of `len` elements of `T`.
pub fn abi_alloc_array<T: Copy>(len: usize) -> *mut T {
    abi_alloc(len * std::mem::size_of::<T>()) as *mut T
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_zero_size_is_null() {
        assert!(abi_alloc(0).is_null());
        unsafe { abi_free(std::ptr::null_mut()) }; // no-op
    }

    #[test]
    fn test_alloc_zeroed_and_writable() {
        let ptr = abi_alloc(64) as *mut u8;
        unsafe {
            for i in 0..64 {
                assert_eq!(*ptr.add(i), 0);
            }
            std::ptr::write_bytes(ptr, 0xAB, 64);
            abi_free(ptr as *mut c_void);
        }
    }

    #[test]
    fn test_array_alignment() {
        let ptr = abi_alloc_array::<u64>(5);
        assert_eq!(ptr as usize % std::mem::align_of::<u64>(), 0);
        unsafe {
            for i in 0..5 {
                *ptr.add(i) = i as u64;
            }
            abi_free(ptr as *mut c_void);
        }
    }
}
