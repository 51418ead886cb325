//! Reference-counted handle to a foreign object.
//!
//! A [`ComRef`] owns exactly one outstanding reference: however the handle
//! is destroyed (scope exit, early return, propagated error) the release
//! runs exactly once. Handles are not implicitly shareable; duplication
//! goes through [`ComRef::clone_ref`], which acquires its own reference.

use std::ffi::c_void;
use std::fmt;
use std::ptr::NonNull;

use crate::error::Result;
use crate::interface::{self, ComInterface};
use crate::interop::ComInterop;

/// Owns one foreign reference to a vtable-dispatched object.
pub struct ComRef<I: ComInterface> {
    ptr: NonNull<I>,
}

impl<I: ComInterface> ComRef<I> {
    /// Take ownership of an already-acquired reference (no extra acquire).
    ///
    /// # Safety
    /// `ptr` must point to a live object honoring the [`ComInterface`]
    /// layout contract, and the caller must transfer exactly one
    /// outstanding reference to the new handle.
    #[inline]
    pub unsafe fn from_raw(ptr: NonNull<I>) -> Self {
        ComRef { ptr }
    }

    /// Acquire a new reference to a borrowed pointer and own it.
    ///
    /// # Safety
    /// `ptr` must point to a live object honoring the layout contract; the
    /// caller's own reference (if any) is unaffected.
    #[inline]
    pub unsafe fn from_borrowed(ptr: NonNull<I>) -> Self {
        interface::add_ref_raw(ptr.as_ptr() as *mut c_void);
        ComRef { ptr }
    }

    /// The borrowed pointer. One borrowed pointer exists per live handle;
    /// storing it beyond the handle's lifetime requires [`Self::clone_ref`]
    /// or [`Self::detach`].
    #[inline]
    pub fn as_ptr(&self) -> *mut I {
        self.ptr.as_ptr()
    }

    /// The interface's vtable.
    #[inline]
    pub fn vtbl(&self) -> &I::Vtbl {
        // A live handle guarantees the pointed-to object and its leading
        // vtable pointer stay valid.
        unsafe { &**(self.ptr.as_ptr() as *const *const I::Vtbl) }
    }

    /// Read-only dispatch view for making calls.
    #[inline]
    pub fn as_interop(&self) -> ComInterop<I> {
        // The handle keeps the object live for the borrow.
        unsafe { ComInterop::from_raw(self.ptr) }
    }

    /// Explicit duplication: acquires an additional reference. Each clone is
    /// released independently.
    pub fn clone_ref(&self) -> ComRef<I> {
        unsafe { ComRef::from_borrowed(self.ptr) }
    }

    /// Hand back the raw pointer and cancel this handle's release. Used
    /// when ownership of the reference moves elsewhere (out-parameters,
    /// foreign callees that consume references).
    pub fn detach(self) -> NonNull<I> {
        let ptr = self.ptr;
        std::mem::forget(self);
        ptr
    }

    /// Reinterpret the same pointer under a different interface type
    /// without touching the reference count.
    ///
    /// # Safety
    /// The object must actually implement `J`, normally established by a
    /// prior interface query. Identity interfaces of the same object are
    /// always valid targets.
    pub unsafe fn reinterpret<J: ComInterface>(self) -> ComRef<J> {
        ComRef {
            ptr: self.detach().cast(),
        }
    }

    /// Query for interface `J`, yielding a new independently-owned handle.
    pub fn cast<J: ComInterface>(&self) -> Result<ComRef<J>> {
        self.as_interop().cast()
    }
}

impl<I: ComInterface> Drop for ComRef<I> {
    fn drop(&mut self) {
        // The one release this handle owes; releasing never fails.
        unsafe {
            interface::release_raw(self.ptr.as_ptr() as *mut c_void);
        }
    }
}

impl<I: ComInterface> fmt::Debug for ComRef<I> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ComRef({:p}, iid: {})", self.ptr.as_ptr(), I::IID)
    }
}
