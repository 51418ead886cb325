//! # wren-com - COM Interop Runtime Core
//!
//! The runtime that lets memory-managed host code hold, call, and implement
//! reference-counted vtable-dispatched foreign objects. Generated binding
//! code is written against this crate; nothing here depends on metadata.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────┐
//! │                 Generated binding code                  │
//! └───────────┬─────────────────────────────┬───────────────┘
//!             │ imports                     │ exports
//!             ▼                             ▼
//! ┌───────────────────────┐    ┌───────────────────────────┐
//! │ ComRef / ComInterop   │    │ ComExport / ComClass      │
//! │  - one ref per handle │    │  - embedded vtable headers│
//! │  - dispatch via vtbl  │    │  - atomic host refcount   │
//! └───────────┬───────────┘    │  - interface query table  │
//!             │                └─────────────┬─────────────┘
//!             ▼                              ▼
//! ┌───────────────────────┐    ┌───────────────────────────┐
//! │ marshal (Projection)  │    │ with_this thunk wrapper   │
//! │  identity/inert/owned │    │  host error -> HResult    │
//! └───────────┬───────────┘    └─────────────┬─────────────┘
//!             └──────────────┬───────────────┘
//!                            ▼
//!              ┌───────────────────────────┐
//!              │ error channel             │
//!              │  HResult / ComError       │
//!              │  restricted error info    │
//!              │  language exceptions      │
//!              └───────────────────────────┘
//! ```
//!
//! ## Reference discipline
//!
//! A [`ComRef`] owns exactly one outstanding foreign reference and releases
//! it exactly once, on every destruction path. Duplication is explicit
//! ([`ComRef::clone_ref`]); handing the reference elsewhere is explicit
//! ([`ComRef::detach`]). Exported objects count references with an atomic
//! shared by all of their interface embeddings, so the identity rule
//! (querying the identity interface from any implemented interface yields
//! pointer-equal results) holds by construction.
//!
//! ## Modules
//!
//! - [`error`]: status interpretation and the boundary failure taxonomy
//! - [`error_info`]: thread-local rich error side channel and round-tripping
//! - [`export`]: two-way export of host objects behind synthesized vtables
//! - [`interface`]: the interface/vtable typing contract
//! - [`interop`]: vtable dispatch for imported objects
//! - [`marshal`]: per-type conversion rules and cleanup guards
//! - [`reference`]: the reference-counted handle

pub mod error;
pub mod error_info;
pub mod export;
pub mod interface;
pub mod interop;
pub mod marshal;
pub mod reference;

pub use error::{check, check_captured, ComError, Result};
pub use error_info::{ErrorDetails, ErrorInfo};
pub use export::{ComClass, ComEmbedding, ComExport, InterfaceEntry, VtblPtr};
pub use interface::{ComInterface, IID_IINSPECTABLE, IID_IUNKNOWN};
pub use interop::ComInterop;
pub use marshal::{AbiArray, InGuard, OutSlot, Projection, ProjectionKind};
pub use reference::ComRef;

pub use wren_abi::{Guid, HResult, TrustLevel};
