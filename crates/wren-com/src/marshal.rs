//! Per-type conversion rules and boundary cleanup guards.
//!
//! A [`Projection`] describes how one type shape crosses the boundary:
//!
//! - **Identity**: host and foreign representations are bit-identical.
//! - **Inert**: conversion in both directions, no cleanup.
//! - **Owned**: conversion plus a release step on the foreign
//!   representation.
//!
//! The guards encode the call protocol. An owned "in" conversion is
//! released after the call whether it succeeded or failed ([`InGuard`]).
//! An "out" slot starts at the ABI default and is either consumed into a
//! host value - which takes ownership and neutralizes the cleanup - or
//! released when the slot is dropped on a failure path ([`OutSlot`]).
//! Arrays cross as a `u32` length followed by a pointer to contiguous
//! elements ([`AbiArray`]).

use std::ffi::c_void;
use std::marker::PhantomData;
use std::ptr::NonNull;

use wren_abi::Guid;

use crate::interface::{self, ComInterface};
use crate::reference::ComRef;

/// How a type shape crosses the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    /// Bit-identical on both sides
    Identity,
    /// Converted, no cleanup
    Inert,
    /// Converted, foreign side must be released
    Owned,
}

/// Conversion rules for one type shape.
///
/// Implementations are stateless markers; the rule is fixed at compile
/// time. For `Owned` projections, `release_abi` must tolerate the default
/// value (that is how a consumed out-slot neutralizes its cleanup).
pub trait Projection {
    /// Host-side representation
    type Host;
    /// Foreign-side representation
    type Abi: Copy;

    const KIND: ProjectionKind;

    /// The zero/default foreign value used to seed out-parameter slots
    fn abi_default() -> Self::Abi;

    /// Convert host to foreign. For `Owned` rules the produced value
    /// carries a resource the caller must release.
    fn to_abi(host: &Self::Host) -> Self::Abi;

    /// Convert foreign to host, consuming: for `Owned` rules the host value
    /// takes ownership of the foreign resource.
    fn from_abi(abi: Self::Abi) -> Self::Host;

    /// Release the foreign resource. No-op for non-owned rules.
    fn release_abi(_abi: &mut Self::Abi) {}
}

macro_rules! identity_projection {
    ($($(#[$meta:meta])* $name:ident => $ty:ty),* $(,)?) => {$(
        $(#[$meta])*
        pub enum $name {}

        impl Projection for $name {
            type Host = $ty;
            type Abi = $ty;
            const KIND: ProjectionKind = ProjectionKind::Identity;

            fn abi_default() -> $ty {
                <$ty>::default()
            }

            fn to_abi(host: &$ty) -> $ty {
                *host
            }

            fn from_abi(abi: $ty) -> $ty {
                abi
            }
        }
    )*};
}

identity_projection! {
    Int8Projection => i8,
    UInt8Projection => u8,
    Int16Projection => i16,
    UInt16Projection => u16,
    Int32Projection => i32,
    UInt32Projection => u32,
    Int64Projection => i64,
    UInt64Projection => u64,
    Float32Projection => f32,
    Float64Projection => f64,
    /// UTF-16 code unit
    Char16Projection => u16,
    GuidProjection => Guid,
}

/// Booleans are a byte at the ABI.
pub enum BoolProjection {}

impl Projection for BoolProjection {
    type Host = bool;
    type Abi = u8;
    const KIND: ProjectionKind = ProjectionKind::Inert;

    fn abi_default() -> u8 {
        0
    }

    fn to_abi(host: &bool) -> u8 {
        *host as u8
    }

    fn from_abi(abi: u8) -> bool {
        abi != 0
    }
}

/// Interface references: null maps to `None`, non-null carries one
/// acquired reference in each direction.
pub struct InterfaceProjection<I: ComInterface>(PhantomData<I>);

impl<I: ComInterface> Projection for InterfaceProjection<I> {
    type Host = Option<ComRef<I>>;
    type Abi = *mut I;
    const KIND: ProjectionKind = ProjectionKind::Owned;

    fn abi_default() -> *mut I {
        std::ptr::null_mut()
    }

    fn to_abi(host: &Option<ComRef<I>>) -> *mut I {
        match host {
            Some(reference) => reference.clone_ref().detach().as_ptr(),
            None => std::ptr::null_mut(),
        }
    }

    fn from_abi(abi: *mut I) -> Option<ComRef<I>> {
        // The marshaling contract hands us ownership of one reference.
        NonNull::new(abi).map(|ptr| unsafe { ComRef::from_raw(ptr) })
    }

    fn release_abi(abi: &mut *mut I) {
        if let Some(ptr) = NonNull::new(*abi) {
            unsafe {
                interface::release_raw(ptr.as_ptr() as *mut c_void);
            }
            *abi = std::ptr::null_mut();
        }
    }
}

/// Owned "in" parameter guard: converts on construction and schedules the
/// release for after the call, success or failure alike.
pub struct InGuard<P: Projection> {
    value: P::Abi,
}

impl<P: Projection> InGuard<P> {
    pub fn new(host: &P::Host) -> Self {
        InGuard {
            value: P::to_abi(host),
        }
    }

    /// The foreign value to pass to the call
    #[inline]
    pub fn abi(&self) -> P::Abi {
        self.value
    }
}

impl<P: Projection> Drop for InGuard<P> {
    fn drop(&mut self) {
        if matches!(P::KIND, ProjectionKind::Owned) {
            P::release_abi(&mut self.value);
        }
    }
}

/// Out-parameter slot: seeded with the ABI default, passed by address, then
/// consumed into a host value. If the call fails and the slot is dropped
/// unconsumed, whatever the callee wrote is still released.
pub struct OutSlot<P: Projection> {
    value: P::Abi,
}

impl<P: Projection> OutSlot<P> {
    pub fn new() -> Self {
        OutSlot {
            value: P::abi_default(),
        }
    }

    /// Address to pass as the out-parameter
    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut P::Abi {
        &mut self.value
    }

    /// Take ownership of the received value, neutralizing the scheduled
    /// cleanup (the slot is reset to the default before conversion).
    pub fn consume(mut self) -> P::Host {
        let abi = std::mem::replace(&mut self.value, P::abi_default());
        P::from_abi(abi)
    }
}

impl<P: Projection> Default for OutSlot<P> {
    fn default() -> Self {
        Self::new()
    }
}

impl<P: Projection> Drop for OutSlot<P> {
    fn drop(&mut self) {
        if matches!(P::KIND, ProjectionKind::Owned) {
            P::release_abi(&mut self.value);
        }
    }
}

/// Host-allocated array crossing as `(u32 length, pointer)`. Elements are
/// converted through `P` on construction and released (for owned rules)
/// when the array is dropped after the call.
pub struct AbiArray<P: Projection> {
    buffer: Vec<P::Abi>,
}

impl<P: Projection> AbiArray<P> {
    pub fn from_hosts(hosts: &[P::Host]) -> Self {
        assert!(
            hosts.len() <= u32::MAX as usize,
            "array length exceeds the 32-bit ABI length"
        );
        AbiArray {
            buffer: hosts.iter().map(P::to_abi).collect(),
        }
    }

    /// The length parameter: always a plain integer, even when the array is
    /// passed by reference.
    #[inline]
    pub fn len(&self) -> u32 {
        self.buffer.len() as u32
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.buffer.is_empty()
    }

    #[inline]
    pub fn as_ptr(&self) -> *const P::Abi {
        self.buffer.as_ptr()
    }

    #[inline]
    pub fn as_mut_ptr(&mut self) -> *mut P::Abi {
        self.buffer.as_mut_ptr()
    }
}

impl<P: Projection> Drop for AbiArray<P> {
    fn drop(&mut self) {
        if matches!(P::KIND, ProjectionKind::Owned) {
            for abi in &mut self.buffer {
                P::release_abi(abi);
            }
        }
    }
}

/// Consume a foreign-allocated out-array: convert every element (taking
/// ownership for owned rules) and free the buffer with the ABI allocator.
///
/// # Safety
/// `data` must be null or a pointer to `len` elements allocated with
/// [`wren_abi::mem::abi_alloc`], ownership of which transfers to this call.
pub unsafe fn consume_out_array<P: Projection>(len: u32, data: *mut P::Abi) -> Vec<P::Host> {
    if data.is_null() {
        return Vec::new();
    }
    let elements = std::slice::from_raw_parts(data, len as usize);
    let hosts = elements.iter().map(|abi| P::from_abi(*abi)).collect();
    wren_abi::mem::abi_free(data as *mut c_void);
    hosts
}
