//! Introspection interface layout.
//!
//! WinRT-flavored interfaces extend the identity slots with three
//! introspection slots: enumerate implemented interface identifiers, get the
//! runtime class name, and get a trust level. Declared methods follow.

use std::ffi::c_void;

use crate::guid::Guid;
use crate::hresult::HResult;
use crate::hstr::HStr;
use crate::iunknown::IUnknownVtbl;

/// Trust level reported by the introspection interface
#[repr(i32)]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TrustLevel {
    #[default]
    Base = 0,
    Partial = 1,
    Full = 2,
}

impl TrustLevel {
    /// Decode a raw ABI value; unknown values degrade to `Base`.
    pub fn from_raw(value: i32) -> TrustLevel {
        match value {
            1 => TrustLevel::Partial,
            2 => TrustLevel::Full,
            _ => TrustLevel::Base,
        }
    }
}

/// Identity slots plus the three introspection slots.
///
/// `get_iids` returns an array allocated with [`crate::mem::abi_alloc`];
/// the caller frees it with [`crate::mem::abi_free`].
#[repr(C)]
pub struct IInspectableVtbl {
    pub unknown: IUnknownVtbl,
    pub get_iids: unsafe extern "system" fn(
        this: *mut c_void,
        count: *mut u32,
        iids: *mut *mut Guid,
    ) -> HResult,
    pub get_runtime_class_name:
        unsafe extern "system" fn(this: *mut c_void, name: *mut HStr) -> HResult,
    pub get_trust_level:
        unsafe extern "system" fn(this: *mut c_void, level: *mut i32) -> HResult,
}

static_assertions::const_assert_eq!(
    std::mem::size_of::<IInspectableVtbl>(),
    6 * std::mem::size_of::<usize>()
);

/// A foreign object viewed through its introspection interface.
#[repr(C)]
pub struct IInspectable {
    pub vtbl: *const IInspectableVtbl,
}
