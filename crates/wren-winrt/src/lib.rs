//! # wren-winrt - WinRT Layer over the COM Core
//!
//! The WinRT-flavored surface generated bindings build on:
//!
//! - [`inspectable`]: introspection calls (implemented interface
//!   identifiers, runtime class name, trust level)
//! - [`hstring`]: the owned reference-counted UTF-16 string and its
//!   projection
//! - [`activation`]: activation factories, the process-global activatable
//!   class registry, and memoized per-type factory slots
//! - [`error`]: capture-aware status interpretation and error origination
//!
//! Foreign WinRT objects are plain COM objects whose vtables carry the
//! three introspection slots after the identity slots; everything here
//! defers ownership and dispatch discipline to `wren-com`.

pub mod activation;
pub mod error;
pub mod hstring;
pub mod inspectable;

pub use activation::{
    get_activation_factory, register_activatable_class, FactoryCache, IActivationFactory,
    IActivationFactoryVtbl, IID_IACTIVATION_FACTORY,
};
pub use error::{originate, throw_if_failed};
pub use hstring::{HString, HStringProjection};
pub use inspectable::InspectableInterop;

pub use wren_abi::{Guid, HResult, TrustLevel};
pub use wren_com::{ComError, ComRef, Result};
