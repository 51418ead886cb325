//! ABI string buffer.
//!
//! Buffer layout:
//! ┌─────────────────────────────────────────┐
//! │   refs (4 bytes)                        │  <- AtomicU32, starts at 1
//! ├─────────────────────────────────────────┤
//! │   len (4 bytes)                         │  <- UTF-16 code units
//! ├─────────────────────────────────────────┤
//! │   payload: len x u16 + NUL terminator   │
//! └─────────────────────────────────────────┘
//!
//! Strings are immutable once created; duplication bumps the shared count
//! instead of copying. A null handle denotes the empty string, so creation
//! of an empty string performs no allocation and `hstr_release(null)` is a
//! no-op.

use std::alloc::{alloc, dealloc, Layout};
use std::slice;
use std::sync::atomic::{AtomicU32, Ordering};

/// Header preceding the inline UTF-16 payload
#[repr(C)]
pub struct HStrHeader {
    refs: AtomicU32,
    len: u32,
}

static_assertions::const_assert_eq!(std::mem::size_of::<HStrHeader>(), 8);

/// Opaque string handle crossing the ABI; null is the empty string.
pub type HStr = *const HStrHeader;

fn layout_for(len: u32) -> Layout {
    // Payload plus NUL terminator, aligned for the header.
    let size = std::mem::size_of::<HStrHeader>() + (len as usize + 1) * 2;
    Layout::from_size_align(size, std::mem::align_of::<HStrHeader>())
        .expect("string buffer layout overflow")
}

unsafe fn payload_ptr(header: *const HStrHeader) -> *const u16 {
    (header as *const u8).add(std::mem::size_of::<HStrHeader>()) as *const u16
}

/// Allocate a new string buffer holding `units`. Returns null for an empty
/// input.
pub fn hstr_create(units: &[u16]) -> HStr {
    if units.is_empty() {
        return std::ptr::null();
    }
    let len = u32::try_from(units.len()).expect("string length exceeds u32");
    unsafe {
        let raw = alloc(layout_for(len)) as *mut HStrHeader;
        if raw.is_null() {
            std::alloc::handle_alloc_error(layout_for(len));
        }
        raw.write(HStrHeader {
            refs: AtomicU32::new(1),
            len,
        });
        let payload = payload_ptr(raw) as *mut u16;
        std::ptr::copy_nonoverlapping(units.as_ptr(), payload, units.len());
        *payload.add(units.len()) = 0;
        raw
    }
}

/// Allocate a string buffer from UTF-8 text
pub fn hstr_from_str(text: &str) -> HStr {
    let units: Vec<u16> = text.encode_utf16().collect();
    hstr_create(&units)
}

/// Share the buffer by bumping its count.
///
/// # Safety
/// `s` must be null or a handle previously returned by this module whose
/// count has not reached zero.
pub unsafe fn hstr_duplicate(s: HStr) -> HStr {
    if let Some(header) = s.as_ref() {
        header.refs.fetch_add(1, Ordering::Relaxed);
    }
    s
}

/// Drop one reference, freeing the buffer when the count reaches zero.
///
/// # Safety
/// `s` must be null or a live handle; each handle value must be released
/// exactly as many times as it was created/duplicated.
pub unsafe fn hstr_release(s: HStr) {
    let Some(header) = s.as_ref() else {
        return;
    };
    if header.refs.fetch_sub(1, Ordering::AcqRel) == 1 {
        let len = header.len;
        dealloc(s as *mut u8, layout_for(len));
    }
}

/// Length in UTF-16 code units.
///
/// # Safety
/// `s` must be null or a live handle.
#[inline]
pub unsafe fn hstr_len(s: HStr) -> u32 {
    s.as_ref().map_or(0, |header| header.len)
}

/// Borrow the code units. The empty slice is returned for null.
///
/// # Safety
/// `s` must be null or a live handle, and the returned slice must not
/// outlive the handle's reference.
pub unsafe fn hstr_units<'a>(s: HStr) -> &'a [u16] {
    match s.as_ref() {
        None => &[],
        Some(header) => slice::from_raw_parts(payload_ptr(s), header.len as usize),
    }
}

/// Current share count, for diagnostics and tests.
///
/// # Safety
/// `s` must be null or a live handle.
pub unsafe fn hstr_ref_count(s: HStr) -> u32 {
    s.as_ref().map_or(0, |header| header.refs.load(Ordering::Acquire))
}
