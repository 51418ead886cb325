//! # wren-meta - Generation-Time Identity and Projection Core
//!
//! Consumes type and interface *descriptions* (produced by an external
//! metadata reader) and answers the questions the bindings generator and
//! the runtime contract depend on:
//!
//! - [`registry::InterfaceRegistry`]: canonical 128-bit identifiers
//!   (declared and derived-per-instantiation), mangled ABI names,
//!   base-interface chains, and vtable slot layouts
//! - [`projection::ProjectionTable`]: the identity/inert/owned
//!   classification of every projectable type shape
//! - [`signature`]: the type signature grammar and the hash derivation
//!   behind parameterized identifiers
//!
//! Failures here are generation-time failures: an interface without a
//! declared identifier or a shape outside the projectable set fails the
//! affected type's generation rather than producing invalid bindings.

pub mod error;
pub mod projection;
pub mod registry;
pub mod signature;
pub mod types;

pub use error::{MetaError, Result};
pub use projection::{CType, ProjectionKind, ProjectionRule, ProjectionTable};
pub use registry::{BoundInterface, InterfaceRegistry, MethodSlot, SlotKind, VtableLayout};
pub use types::{
    BaseInterface, BaseTag, DefId, EnumDef, FieldDef, InterfaceDef, InterfaceFlavor, MethodDef,
    ParamDef, PropertyDef, ShapeKind, StructDef, TypeDef, TypeName, TypeSig, Visibility,
};
