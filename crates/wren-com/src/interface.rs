//! Interface typing contract.
//!
//! Every interface the runtime can dispatch is a `#[repr(C)]` struct whose
//! sole field is a pointer to its vtable struct, and every vtable begins
//! with the three identity slots. [`ComInterface`] ties the struct to its
//! vtable type and identifier; the raw helpers below dispatch the identity
//! slots for any such interface.

use std::ffi::c_void;

use wren_abi::{Guid, HResult, IInspectable, IInspectableVtbl, IUnknown, IUnknownVtbl};

/// Identity interface identifier (`00000000-0000-0000-c000-000000000046`)
pub const IID_IUNKNOWN: Guid = Guid::new(0x00000000, 0x0000, 0x0000, 0xC000, 0x000000000046);

/// Introspection interface identifier
pub const IID_IINSPECTABLE: Guid = Guid::new(0xAF86E2E0, 0xB12D, 0x4C6A, 0x9C5A, 0xD7AA65101E90);

/// A dispatchable interface shape.
///
/// # Safety
///
/// Implementors must be `#[repr(C)]` structs whose only field is a pointer
/// to `Self::Vtbl`, and `Self::Vtbl` must begin with the three identity
/// slots of [`IUnknownVtbl`] (WinRT-flavored vtables begin with the full
/// six-slot [`wren_abi::IInspectableVtbl`] prefix). `IID` must be the
/// interface's declared identifier, bit-for-bit.
pub unsafe trait ComInterface: Sized + 'static {
    /// The interface's vtable struct
    type Vtbl: 'static;

    /// Declared 128-bit identifier
    const IID: Guid;
}

unsafe impl ComInterface for IUnknown {
    type Vtbl = IUnknownVtbl;
    const IID: Guid = IID_IUNKNOWN;
}

unsafe impl ComInterface for IInspectable {
    type Vtbl = IInspectableVtbl;
    const IID: Guid = IID_IINSPECTABLE;
}

/// Dispatch the identity `AddRef` slot of any interface pointer.
///
/// # Safety
/// `ptr` must point to a live object honoring the [`ComInterface`] layout
/// contract.
#[inline]
pub unsafe fn add_ref_raw(ptr: *mut c_void) -> u32 {
    let unknown = ptr as *mut IUnknown;
    ((*(*unknown).vtbl).add_ref)(ptr)
}

/// Dispatch the identity `Release` slot of any interface pointer.
///
/// Releasing is infallible by contract; the returned count is advisory.
///
/// # Safety
/// `ptr` must point to a live object honoring the layout contract, and this
/// must balance a previously acquired reference.
#[inline]
pub unsafe fn release_raw(ptr: *mut c_void) -> u32 {
    let unknown = ptr as *mut IUnknown;
    ((*(*unknown).vtbl).release)(ptr)
}

/// Dispatch the identity `QueryInterface` slot of any interface pointer.
///
/// # Safety
/// `ptr` must point to a live object honoring the layout contract; `iid`
/// and `out` must be valid for reads/writes.
#[inline]
pub unsafe fn query_interface_raw(
    ptr: *mut c_void,
    iid: *const Guid,
    out: *mut *mut c_void,
) -> HResult {
    let unknown = ptr as *mut IUnknown;
    ((*(*unknown).vtbl).query_interface)(ptr, iid, out)
}
