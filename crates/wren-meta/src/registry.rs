//! Interface identity registry.
//!
//! Maps each interface/delegate shape (possibly generic, with bound type
//! arguments) to its canonical identifier and mangled ABI name, enumerates
//! base-interface chains, and derives vtable slot layouts. All answers are
//! deterministic and consistent across the whole run; derived identifiers
//! and layouts are cached per (definition, bound arguments) pair.

use std::sync::Arc;

use dashmap::DashMap;
use indexmap::IndexSet;
use log::debug;
use wren_abi::Guid;

use crate::error::{MetaError, Result};
use crate::signature::parameterized_guid;
use crate::types::{
    DefId, InterfaceDef, InterfaceFlavor, MethodDef, PropertyDef, ShapeKind, TypeDef, TypeSig,
};

/// A resolved (definition, bound generic arguments) pair
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct BoundInterface {
    pub def: DefId,
    pub args: Vec<TypeSig>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    Identity,
    Introspection,
    Method,
}

/// One vtable slot: fixed index plus the method name dispatched through it
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MethodSlot {
    pub index: usize,
    pub name: String,
    pub kind: SlotKind,
}

/// The fixed slot order of one interface shape
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VtableLayout {
    pub slots: Vec<MethodSlot>,
}

impl VtableLayout {
    /// Slot index of a dispatchable method, by name
    pub fn slot_of(&self, name: &str) -> Option<usize> {
        self.slots
            .iter()
            .find(|slot| slot.name == name)
            .map(|slot| slot.index)
    }
}

/// Arena of type definitions plus the derived-identity and layout caches.
///
/// Definitions are added up front (single-threaded loading); queries take
/// `&self` and may run concurrently, so the caches are concurrent maps.
pub struct InterfaceRegistry {
    defs: Vec<TypeDef>,
    iid_cache: DashMap<BoundInterface, Guid>,
    layout_cache: DashMap<BoundInterface, Arc<VtableLayout>>,
}

impl InterfaceRegistry {
    pub fn new() -> InterfaceRegistry {
        InterfaceRegistry {
            defs: Vec::new(),
            iid_cache: DashMap::new(),
            layout_cache: DashMap::new(),
        }
    }

    /// Store a definition and return its id.
    pub fn add(&mut self, def: TypeDef) -> DefId {
        let id = DefId(self.defs.len() as u32);
        self.defs.push(def);
        id
    }

    pub fn get(&self, def: DefId) -> Result<&TypeDef> {
        self.defs
            .get(def.index())
            .ok_or(MetaError::MissingDefinition(def))
    }

    /// Resolve an interface or delegate definition.
    pub fn interface(&self, def: DefId) -> Result<&InterfaceDef> {
        match self.get(def)? {
            TypeDef::Interface(interface) => Ok(interface),
            other => Err(MetaError::NotAnInterface {
                name: other.name().full_name(),
            }),
        }
    }

    fn check_arity(&self, interface: &InterfaceDef, args: &[TypeSig]) -> Result<()> {
        if interface.generic_params.len() != args.len() {
            return Err(MetaError::ArityMismatch {
                name: interface.name.full_name(),
                expected: interface.generic_params.len(),
                actual: args.len(),
            });
        }
        Ok(())
    }

    fn declared_guid(&self, interface: &InterfaceDef) -> Result<Guid> {
        interface.guid.ok_or_else(|| MetaError::UnresolvedIdentity {
            name: interface.name.full_name(),
        })
    }

    /// The canonical identifier of an interface/delegate shape. Generic
    /// instantiations derive theirs from the signature grammar; the result
    /// is cached and stable across the run.
    pub fn interface_id(&self, def: DefId, args: &[TypeSig]) -> Result<Guid> {
        let interface = self.interface(def)?;
        self.check_arity(interface, args)?;
        if args.is_empty() {
            return self.declared_guid(interface);
        }

        let key = BoundInterface {
            def,
            args: args.to_vec(),
        };
        if let Some(cached) = self.iid_cache.get(&key) {
            return Ok(*cached);
        }
        let signature = self.signature(&TypeSig::Bound {
            def,
            args: args.to_vec(),
        })?;
        let guid = parameterized_guid(&signature);
        debug!("derived {guid} for {signature}");
        self.iid_cache.insert(key, guid);
        Ok(guid)
    }

    /// The signature-grammar rendering of a type shape, used for
    /// parameterized identifier derivation.
    pub fn signature(&self, sig: &TypeSig) -> Result<String> {
        match sig {
            TypeSig::Bool => Ok("b1".into()),
            TypeSig::Char16 => Ok("c2".into()),
            TypeSig::Int8 => Ok("i1".into()),
            TypeSig::UInt8 => Ok("u1".into()),
            TypeSig::Int16 => Ok("i2".into()),
            TypeSig::UInt16 => Ok("u2".into()),
            TypeSig::Int32 => Ok("i4".into()),
            TypeSig::UInt32 => Ok("u4".into()),
            TypeSig::Int64 => Ok("i8".into()),
            TypeSig::UInt64 => Ok("u8".into()),
            TypeSig::Float32 => Ok("f4".into()),
            TypeSig::Float64 => Ok("f8".into()),
            TypeSig::String => Ok("string".into()),
            TypeSig::Guid => Ok("g16".into()),
            TypeSig::Object => Ok("cinterface(IInspectable)".into()),
            TypeSig::GenericParam(position) => Err(MetaError::UnsupportedType {
                reason: format!("unbound generic parameter {position} in a type signature"),
            }),
            TypeSig::Array(_) => Err(MetaError::UnsupportedType {
                reason: "array in a type signature".into(),
            }),
            TypeSig::Bound { def, args } => match self.get(*def)? {
                TypeDef::Enum(def) => Ok(format!(
                    "enum({};{})",
                    def.name.full_name(),
                    if def.flags { "u4" } else { "i4" }
                )),
                TypeDef::Struct(def) => {
                    let mut parts = vec![def.name.full_name()];
                    for field in &def.fields {
                        parts.push(self.signature(&field.sig)?);
                    }
                    Ok(format!("struct({})", parts.join(";")))
                }
                TypeDef::Interface(interface) => {
                    self.check_arity(interface, args)?;
                    let declared = self.declared_guid(interface)?;
                    if args.is_empty() {
                        return Ok(match interface.kind {
                            ShapeKind::Interface => format!("{{{declared}}}"),
                            ShapeKind::Delegate => format!("delegate({{{declared}}})"),
                        });
                    }
                    let mut parts = vec![format!("{{{declared}}}")];
                    for arg in args {
                        parts.push(self.signature(arg)?);
                    }
                    let body = parts.join(";");
                    Ok(match interface.kind {
                        ShapeKind::Interface => format!("pinterface({body})"),
                        ShapeKind::Delegate => format!("pdelegate({body})"),
                    })
                }
            },
        }
    }

    /// The mangled ABI name of a shape, MIDL flavor:
    /// `__x_ABI_CWindows_CFoundation_CIClosable` for plain types,
    /// `__FIVector_1_int32` for parameterized instantiations.
    pub fn mangled_name(&self, def: DefId, args: &[TypeSig]) -> Result<String> {
        let ty = self.get(def)?;
        if let TypeDef::Interface(interface) = ty {
            self.check_arity(interface, args)?;
        } else if !args.is_empty() {
            return Err(MetaError::UnsupportedType {
                reason: format!("{} cannot take generic arguments", ty.name().full_name()),
            });
        }

        if args.is_empty() {
            let mut mangled = String::from("__x_ABI_");
            let mut first = true;
            for segment in ty.name().segments() {
                if !first {
                    mangled.push('_');
                }
                mangled.push('C');
                mangled.push_str(segment);
                first = false;
            }
            return Ok(mangled);
        }

        let mut mangled = format!("__F{}_{}", ty.name().name, args.len());
        for arg in args {
            mangled.push('_');
            mangled.push_str(&self.mangled_arg(arg)?);
        }
        Ok(mangled)
    }

    fn mangled_arg(&self, sig: &TypeSig) -> Result<String> {
        Ok(match sig {
            TypeSig::Bool => "boolean".into(),
            TypeSig::Char16 => "char16".into(),
            TypeSig::Int8 => "int8".into(),
            TypeSig::UInt8 => "uint8".into(),
            TypeSig::Int16 => "int16".into(),
            TypeSig::UInt16 => "uint16".into(),
            TypeSig::Int32 => "int32".into(),
            TypeSig::UInt32 => "uint32".into(),
            TypeSig::Int64 => "int64".into(),
            TypeSig::UInt64 => "uint64".into(),
            TypeSig::Float32 => "float".into(),
            TypeSig::Float64 => "double".into(),
            TypeSig::String => "HSTRING".into(),
            TypeSig::Guid => "GUID".into(),
            TypeSig::Object => "IInspectable".into(),
            TypeSig::Bound { def, args } => self.mangled_name(*def, args)?,
            TypeSig::GenericParam(position) => {
                return Err(MetaError::UnsupportedType {
                    reason: format!("unbound generic parameter {position} in a mangled name"),
                })
            }
            TypeSig::Array(_) => {
                return Err(MetaError::UnsupportedType {
                    reason: "array in a mangled name".into(),
                })
            }
        })
    }

    /// Enumerate the base-interface chain in derivation (base-to-derived,
    /// declaration) order, without duplicates. Diamond reachability yields
    /// each interface exactly once; generic arguments are substituted
    /// through the walk.
    pub fn base_chain(&self, def: DefId, args: &[TypeSig]) -> Result<Vec<BoundInterface>> {
        let mut visited: IndexSet<BoundInterface> = IndexSet::new();
        self.walk_bases(def, args, &mut visited)?;
        Ok(visited.into_iter().collect())
    }

    fn walk_bases(
        &self,
        def: DefId,
        args: &[TypeSig],
        visited: &mut IndexSet<BoundInterface>,
    ) -> Result<()> {
        let interface = self.interface(def)?;
        self.check_arity(interface, args)?;
        for base in &interface.bases {
            let bound = BoundInterface {
                def: base.def,
                args: base.args.iter().map(|sig| sig.substitute(args)).collect(),
            };
            if visited.contains(&bound) {
                continue;
            }
            // Ancestors precede the base itself.
            self.walk_bases(bound.def, &bound.args, visited)?;
            visited.insert(bound);
        }
        Ok(())
    }

    /// The fixed vtable slot order of a leaf interface shape: identity
    /// slots, introspection slots for the WinRT flavor, base-interface
    /// methods base-to-derived, then the interface's own methods in
    /// declaration order. Computed once per (leaf, arguments) pair and
    /// cached.
    pub fn vtable_layout(&self, def: DefId, args: &[TypeSig]) -> Result<Arc<VtableLayout>> {
        let key = BoundInterface {
            def,
            args: args.to_vec(),
        };
        if let Some(cached) = self.layout_cache.get(&key) {
            return Ok(Arc::clone(&cached));
        }

        let interface = self.interface(def)?;
        self.check_arity(interface, args)?;

        let mut slots = Vec::new();
        for name in ["QueryInterface", "AddRef", "Release"] {
            slots.push(MethodSlot {
                index: slots.len(),
                name: name.to_string(),
                kind: SlotKind::Identity,
            });
        }
        if interface.flavor == InterfaceFlavor::WinRt {
            for name in ["GetIids", "GetRuntimeClassName", "GetTrustLevel"] {
                slots.push(MethodSlot {
                    index: slots.len(),
                    name: name.to_string(),
                    kind: SlotKind::Introspection,
                });
            }
        }
        for bound in self.base_chain(def, args)? {
            let base = self.interface(bound.def)?;
            push_declared_slots(base, &mut slots);
        }
        push_declared_slots(interface, &mut slots);

        let layout = Arc::new(VtableLayout { slots });
        self.layout_cache.insert(key, Arc::clone(&layout));
        Ok(layout)
    }
}

impl Default for InterfaceRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// Declared methods in declaration order, then properties lowered to
/// get/put accessors.
fn push_declared_slots(interface: &InterfaceDef, slots: &mut Vec<MethodSlot>) {
    for MethodDef { name, .. } in &interface.methods {
        slots.push(MethodSlot {
            index: slots.len(),
            name: name.clone(),
            kind: SlotKind::Method,
        });
    }
    for PropertyDef { name, settable, .. } in &interface.properties {
        slots.push(MethodSlot {
            index: slots.len(),
            name: format!("get_{name}"),
            kind: SlotKind::Method,
        });
        if *settable {
            slots.push(MethodSlot {
                index: slots.len(),
                name: format!("put_{name}"),
                kind: SlotKind::Method,
            });
        }
    }
}
