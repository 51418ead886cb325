//! Identity interface layout.
//!
//! Every interface's vtable begins with these three slots; every interface
//! pointer points at a struct whose first (and only) field is the vtable
//! pointer. Host logic never dereferences the object body behind it.

use std::ffi::c_void;

use crate::guid::Guid;
use crate::hresult::HResult;

/// The three identity slots every vtable begins with.
#[repr(C)]
pub struct IUnknownVtbl {
    pub query_interface:
        unsafe extern "system" fn(this: *mut c_void, iid: *const Guid, out: *mut *mut c_void) -> HResult,
    pub add_ref: unsafe extern "system" fn(this: *mut c_void) -> u32,
    pub release: unsafe extern "system" fn(this: *mut c_void) -> u32,
}

static_assertions::const_assert_eq!(
    std::mem::size_of::<IUnknownVtbl>(),
    3 * std::mem::size_of::<usize>()
);

/// A foreign object viewed through its identity interface.
#[repr(C)]
pub struct IUnknown {
    pub vtbl: *const IUnknownVtbl,
}

static_assertions::const_assert_eq!(
    std::mem::size_of::<IUnknown>(),
    std::mem::size_of::<usize>()
);

impl IUnknown {
    /// Read the vtable of a live object.
    ///
    /// # Safety
    /// `self` must point into a live foreign object whose first field is a
    /// valid vtable pointer.
    #[inline]
    pub unsafe fn vtbl(&self) -> &IUnknownVtbl {
        &*self.vtbl
    }
}
