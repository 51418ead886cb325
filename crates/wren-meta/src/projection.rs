//! Type projection table.
//!
//! Classifies every projectable type shape once into identity, inert, or
//! owned, together with its C ABI type and default value expression, and
//! caches the classification. Generic and array shapes recursively consult
//! the table for their element/argument types. Shapes outside the
//! projectable set fail generation with `UnsupportedType`; nothing is
//! deferred to runtime.

use std::sync::Arc;

use parking_lot::Mutex;
use rustc_hash::FxHashMap;

use crate::error::{MetaError, Result};
use crate::registry::InterfaceRegistry;
use crate::types::{TypeDef, TypeSig};

/// How a shape crosses the boundary
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ProjectionKind {
    /// Host and foreign representations are bit-identical
    Identity,
    /// Converted in both directions, no cleanup
    Inert,
    /// Converted, with a release step on the foreign side
    Owned,
}

/// A C-side type reference
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CType {
    pub name: String,
    pub indirections: u8,
}

impl CType {
    pub fn value(name: &str) -> CType {
        CType {
            name: name.to_string(),
            indirections: 0,
        }
    }

    pub fn pointer(name: &str) -> CType {
        CType {
            name: name.to_string(),
            indirections: 1,
        }
    }

    pub fn with_indirection(&self) -> CType {
        CType {
            name: self.name.clone(),
            indirections: self.indirections + 1,
        }
    }
}

impl std::fmt::Display for CType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name)?;
        for _ in 0..self.indirections {
            write!(f, "*")?;
        }
        Ok(())
    }
}

/// Cached classification of one type shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProjectionRule {
    pub kind: ProjectionKind,
    pub abi_type: CType,
    /// C expression seeding a default/zero value of the ABI type
    pub default_expr: String,
}

impl ProjectionRule {
    fn new(kind: ProjectionKind, abi_type: CType, default_expr: &str) -> ProjectionRule {
        ProjectionRule {
            kind,
            abi_type,
            default_expr: default_expr.to_string(),
        }
    }
}

/// Memoizing classifier over the registry's definitions.
pub struct ProjectionTable<'a> {
    registry: &'a InterfaceRegistry,
    cache: Mutex<FxHashMap<TypeSig, Arc<ProjectionRule>>>,
}

impl<'a> ProjectionTable<'a> {
    pub fn new(registry: &'a InterfaceRegistry) -> ProjectionTable<'a> {
        ProjectionTable {
            registry,
            cache: Mutex::new(FxHashMap::default()),
        }
    }

    /// Classify a shape, computing at most once per shape.
    pub fn classify(&self, sig: &TypeSig) -> Result<Arc<ProjectionRule>> {
        if let Some(rule) = self.cache.lock().get(sig) {
            return Ok(Arc::clone(rule));
        }
        let rule = Arc::new(self.compute(sig)?);
        // A racing classification computed the same read-only rule; either
        // insertion order leaves the cache consistent.
        self.cache
            .lock()
            .entry(sig.clone())
            .or_insert_with(|| Arc::clone(&rule));
        Ok(rule)
    }

    fn compute(&self, sig: &TypeSig) -> Result<ProjectionRule> {
        use ProjectionKind::{Identity, Inert, Owned};
        Ok(match sig {
            TypeSig::Bool => ProjectionRule::new(Inert, CType::value("WREN_Boolean"), "0"),
            TypeSig::Char16 => ProjectionRule::new(Identity, CType::value("WREN_Char16"), "0"),
            TypeSig::Int8 => ProjectionRule::new(Identity, CType::value("int8_t"), "0"),
            TypeSig::UInt8 => ProjectionRule::new(Identity, CType::value("uint8_t"), "0"),
            TypeSig::Int16 => ProjectionRule::new(Identity, CType::value("int16_t"), "0"),
            TypeSig::UInt16 => ProjectionRule::new(Identity, CType::value("uint16_t"), "0"),
            TypeSig::Int32 => ProjectionRule::new(Identity, CType::value("int32_t"), "0"),
            TypeSig::UInt32 => ProjectionRule::new(Identity, CType::value("uint32_t"), "0"),
            TypeSig::Int64 => ProjectionRule::new(Identity, CType::value("int64_t"), "0"),
            TypeSig::UInt64 => ProjectionRule::new(Identity, CType::value("uint64_t"), "0"),
            TypeSig::Float32 => ProjectionRule::new(Identity, CType::value("float"), "0"),
            TypeSig::Float64 => ProjectionRule::new(Identity, CType::value("double"), "0"),
            TypeSig::Guid => ProjectionRule::new(Identity, CType::value("WREN_Guid"), "{0}"),
            TypeSig::String => ProjectionRule::new(Owned, CType::value("WREN_HString"), "NULL"),
            TypeSig::Object => {
                ProjectionRule::new(Owned, CType::pointer("WREN_IInspectable"), "NULL")
            }
            TypeSig::GenericParam(position) => {
                return Err(MetaError::UnsupportedType {
                    reason: format!("unbound generic parameter {position}"),
                })
            }
            TypeSig::Array(element) => {
                // Arrays own their buffer and, transitively, their elements;
                // the ABI type is the element pointer half of the
                // (length, pointer) pair.
                let element_rule = self.classify(element)?;
                ProjectionRule {
                    kind: Owned,
                    abi_type: element_rule.abi_type.with_indirection(),
                    default_expr: "NULL".to_string(),
                }
            }
            TypeSig::Bound { def, args } => match self.registry.get(*def)? {
                TypeDef::Enum(_) => {
                    ProjectionRule::new(Inert, CType::value(&self.registry.mangled_name(*def, &[])?), "0")
                }
                TypeDef::Struct(struct_def) => {
                    let mut kind = Inert;
                    for field in &struct_def.fields {
                        if self.classify(&field.sig)?.kind == Owned {
                            kind = Owned;
                            break;
                        }
                    }
                    ProjectionRule::new(
                        kind,
                        CType::value(&self.registry.mangled_name(*def, &[])?),
                        "{0}",
                    )
                }
                TypeDef::Interface(_) => ProjectionRule::new(
                    Owned,
                    CType::pointer(&self.registry.mangled_name(*def, args)?),
                    "NULL",
                ),
            },
        })
    }
}
