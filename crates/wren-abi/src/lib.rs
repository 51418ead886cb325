//! # wren-abi - Binary Contract for COM/WinRT Interop
//!
//! This crate pins down the fixed binary contract shared by imported foreign
//! objects, exported host objects, and generated binding code:
//!
//! - [`Guid`]: 128-bit interface identifiers with bitwise identity
//! - [`HResult`]: the 32-bit signed status code returned by every call
//! - [`IUnknownVtbl`]/[`IInspectableVtbl`]: the identity and introspection
//!   slots every interface's vtable begins with
//! - [`hstr`]: the reference-counted immutable UTF-16 string buffer
//! - [`mem`]: the allocator for caller-freed out-arrays
//!
//! Everything here is `#[repr(C)]` or `#[repr(transparent)]`, and every
//! layout that foreign code depends on is compile-time asserted.
//!
//! ## Vtable layout
//!
//! ```text
//! Interface pointer layout:
//! ┌──────────────────────┐
//! │  *const Vtbl         │  <- the interface pointer points here
//! └──────────────────────┘
//!
//! Vtable slot order:
//! ┌──────────────────────┐
//! │ QueryInterface       │  slot 0 ┐
//! │ AddRef               │  slot 1 │ identity slots (all interfaces)
//! │ Release              │  slot 2 ┘
//! ├──────────────────────┤
//! │ GetIids              │  slot 3 ┐
//! │ GetRuntimeClassName  │  slot 4 │ introspection slots (WinRT flavor)
//! │ GetTrustLevel        │  slot 5 ┘
//! ├──────────────────────┤
//! │ declared methods...  │  declaration order
//! └──────────────────────┘
//! ```
//!
//! This crate has no runtime logic of its own beyond the string buffer and
//! the out-array allocator; ownership discipline lives in `wren-com`.

pub mod guid;
pub mod hresult;
pub mod hstr;
pub mod inspectable;
pub mod iunknown;
pub mod mem;

pub use guid::Guid;
pub use hresult::HResult;
pub use hstr::HStr;
pub use inspectable::{IInspectable, IInspectableVtbl, TrustLevel};
pub use iunknown::{IUnknown, IUnknownVtbl};

/// ABI version string from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
