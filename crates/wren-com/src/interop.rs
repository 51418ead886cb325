//! Vtable dispatch for imported objects.
//!
//! [`ComInterop`] is a borrowed, copyable view of a live interface pointer.
//! It issues the identity-slot calls; generated code reaches the remaining
//! slots directly through [`ComInterop::vtbl`], marshaling arguments with
//! the guards in [`crate::marshal`] and interpreting status codes through
//! [`crate::error`].

use std::ffi::c_void;
use std::ptr::NonNull;

use wren_abi::{Guid, HResult, IUnknown};

use crate::error::{ComError, Result};
use crate::interface::{self, ComInterface};
use crate::reference::ComRef;

/// Borrowed dispatch view of a foreign object. Does not own a reference;
/// obtained from a live [`ComRef`] (or unsafely from a raw pointer known to
/// be live).
pub struct ComInterop<I: ComInterface> {
    ptr: NonNull<I>,
}

impl<I: ComInterface> Clone for ComInterop<I> {
    fn clone(&self) -> Self {
        *self
    }
}

impl<I: ComInterface> Copy for ComInterop<I> {}

impl<I: ComInterface> ComInterop<I> {
    /// Wrap a pointer without touching the reference count.
    ///
    /// # Safety
    /// `ptr` must point to a live object honoring the [`ComInterface`]
    /// layout contract for as long as this view is used.
    #[inline]
    pub unsafe fn from_raw(ptr: NonNull<I>) -> Self {
        ComInterop { ptr }
    }

    #[inline]
    pub fn as_ptr(&self) -> *mut I {
        self.ptr.as_ptr()
    }

    /// The interface's vtable, for direct slot dispatch.
    #[inline]
    pub fn vtbl(&self) -> &I::Vtbl {
        unsafe { &**(self.ptr.as_ptr() as *const *const I::Vtbl) }
    }

    /// Query for an interface by identifier.
    ///
    /// A miss surfaces as [`ComError::NoSuchInterface`] and leaves the
    /// object's reference count untouched; a hit returns a new
    /// independently-owned handle.
    pub fn query_interface(&self, iid: &Guid) -> Result<ComRef<IUnknown>> {
        let mut out: *mut c_void = std::ptr::null_mut();
        let hr = unsafe {
            interface::query_interface_raw(self.ptr.as_ptr() as *mut c_void, iid, &mut out)
        };
        if hr.is_success() {
            match NonNull::new(out as *mut IUnknown) {
                // The callee handed us an acquired reference; own it.
                Some(ptr) => Ok(unsafe { ComRef::from_raw(ptr) }),
                None => {
                    debug_assert!(false, "QueryInterface succeeded with a null out pointer");
                    Err(ComError::from_hresult(HResult::E_POINTER))
                }
            }
        } else if hr == HResult::E_NOINTERFACE {
            Err(ComError::NoSuchInterface { iid: *iid })
        } else {
            Err(ComError::from_hresult(hr))
        }
    }

    /// Typed interface query.
    pub fn cast<J: ComInterface>(&self) -> Result<ComRef<J>> {
        let unknown = self.query_interface(&J::IID)?;
        // The query established that the object implements J.
        Ok(unsafe { unknown.reinterpret() })
    }

    /// Acquire an additional reference through the identity slot.
    pub fn add_ref(&self) -> u32 {
        unsafe { interface::add_ref_raw(self.ptr.as_ptr() as *mut c_void) }
    }

    /// Release one reference through the identity slot.
    ///
    /// # Safety
    /// Must balance a reference this caller owns; releasing a reference
    /// owned by a live [`ComRef`] double-releases it.
    pub unsafe fn release(&self) -> u32 {
        interface::release_raw(self.ptr.as_ptr() as *mut c_void)
    }
}
