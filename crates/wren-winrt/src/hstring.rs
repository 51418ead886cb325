//! Owned WinRT string.
//!
//! [`HString`] owns one reference to an immutable, shared UTF-16 buffer;
//! null is the canonical empty string. Cloning bumps the shared count
//! rather than copying the payload.

use std::fmt;

use wren_abi::hstr::{
    hstr_duplicate, hstr_from_str, hstr_len, hstr_release, hstr_units,
};
use wren_abi::HStr;
use wren_com::{Projection, ProjectionKind};

/// Owned, immutable, reference-counted UTF-16 string.
pub struct HString {
    raw: HStr,
}

// The buffer is immutable and its count atomic.
unsafe impl Send for HString {}
unsafe impl Sync for HString {}

impl HString {
    /// The empty string (no allocation).
    pub const fn new() -> HString {
        HString {
            raw: std::ptr::null(),
        }
    }

    /// Take ownership of a raw handle's reference.
    ///
    /// # Safety
    /// `raw` must be null or a live handle whose reference transfers to the
    /// new value.
    pub unsafe fn from_raw(raw: HStr) -> HString {
        HString { raw }
    }

    /// Hand the reference back as a raw handle.
    pub fn into_raw(self) -> HStr {
        let raw = self.raw;
        std::mem::forget(self);
        raw
    }

    /// The borrowed raw handle.
    pub fn as_raw(&self) -> HStr {
        self.raw
    }

    pub fn len(&self) -> usize {
        unsafe { hstr_len(self.raw) as usize }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// The UTF-16 code units.
    pub fn units(&self) -> &[u16] {
        unsafe { hstr_units(self.raw) }
    }
}

impl Default for HString {
    fn default() -> Self {
        Self::new()
    }
}

impl From<&str> for HString {
    fn from(text: &str) -> Self {
        HString {
            raw: hstr_from_str(text),
        }
    }
}

impl Clone for HString {
    fn clone(&self) -> Self {
        HString {
            raw: unsafe { hstr_duplicate(self.raw) },
        }
    }
}

impl Drop for HString {
    fn drop(&mut self) {
        unsafe { hstr_release(self.raw) }
    }
}

impl PartialEq for HString {
    fn eq(&self, other: &Self) -> bool {
        self.units() == other.units()
    }
}

impl Eq for HString {}

impl PartialEq<str> for HString {
    fn eq(&self, other: &str) -> bool {
        self.units().iter().copied().eq(other.encode_utf16())
    }
}

impl fmt::Display for HString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", String::from_utf16_lossy(self.units()))
    }
}

impl fmt::Debug for HString {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "HString({:?})", String::from_utf16_lossy(self.units()))
    }
}

/// Strings are owned at the boundary: each direction carries a reference
/// the receiver must release.
pub enum HStringProjection {}

impl Projection for HStringProjection {
    type Host = HString;
    type Abi = HStr;
    const KIND: ProjectionKind = ProjectionKind::Owned;

    fn abi_default() -> HStr {
        std::ptr::null()
    }

    fn to_abi(host: &HString) -> HStr {
        unsafe { hstr_duplicate(host.as_raw()) }
    }

    fn from_abi(abi: HStr) -> HString {
        unsafe { HString::from_raw(abi) }
    }

    fn release_abi(abi: &mut HStr) {
        unsafe { hstr_release(*abi) };
        *abi = std::ptr::null();
    }
}
