//! Consumed metadata descriptions.
//!
//! The metadata reader (an external collaborator) lowers its binary format
//! into these plain descriptions; everything this crate computes is derived
//! from them. Definitions are arena-stored in the registry and addressed by
//! [`DefId`].

use std::fmt;

use wren_abi::Guid;

/// Index of a definition in the registry arena
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct DefId(pub u32);

impl DefId {
    /// Reserved id for placeholder/error usage
    pub const DUMMY: DefId = DefId(u32::MAX);

    #[inline]
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Namespace-qualified type name
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct TypeName {
    pub namespace: String,
    pub name: String,
}

impl TypeName {
    pub fn new(namespace: &str, name: &str) -> TypeName {
        TypeName {
            namespace: namespace.to_string(),
            name: name.to_string(),
        }
    }

    pub fn full_name(&self) -> String {
        if self.namespace.is_empty() {
            self.name.clone()
        } else {
            format!("{}.{}", self.namespace, self.name)
        }
    }

    /// Namespace segments followed by the type name
    pub fn segments(&self) -> impl Iterator<Item = &str> {
        self.namespace
            .split('.')
            .filter(|segment| !segment.is_empty())
            .chain(std::iter::once(self.name.as_str()))
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.full_name())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Visibility {
    Public,
    Assembly,
}

/// Interface-like definitions: plain interfaces and delegates share the
/// identity/dispatch machinery.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShapeKind {
    Interface,
    Delegate,
}

/// Whether a vtable carries the introspection slots after the identity
/// slots.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InterfaceFlavor {
    Com,
    WinRt,
}

/// Optional tag on a declared base interface
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BaseTag {
    None,
    Default,
    Overridable,
    Protected,
}

/// A declared base interface, possibly with generic arguments written in
/// terms of the declaring interface's parameters.
#[derive(Debug, Clone)]
pub struct BaseInterface {
    pub def: DefId,
    pub args: Vec<TypeSig>,
    pub tag: BaseTag,
}

/// A type shape reachable from metadata
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum TypeSig {
    Bool,
    Char16,
    Int8,
    UInt8,
    Int16,
    UInt16,
    Int32,
    UInt32,
    Int64,
    UInt64,
    Float32,
    Float64,
    String,
    Guid,
    /// The base introspectable object type
    Object,
    /// A named definition, with bound generic arguments when generic
    Bound { def: DefId, args: Vec<TypeSig> },
    /// A declaring type's generic parameter, by position
    GenericParam(u32),
    Array(Box<TypeSig>),
}

impl TypeSig {
    /// Replace generic parameters by position with `args`. Positions
    /// outside `args` are left untouched (arity is validated by the
    /// registry before substitution).
    pub fn substitute(&self, args: &[TypeSig]) -> TypeSig {
        match self {
            TypeSig::GenericParam(position) => args
                .get(*position as usize)
                .cloned()
                .unwrap_or_else(|| self.clone()),
            TypeSig::Bound { def, args: inner } => TypeSig::Bound {
                def: *def,
                args: inner.iter().map(|sig| sig.substitute(args)).collect(),
            },
            TypeSig::Array(element) => TypeSig::Array(Box::new(element.substitute(args))),
            other => other.clone(),
        }
    }
}

/// A method parameter; arrays are encoded in the signature, by-reference
/// passing is a marker.
#[derive(Debug, Clone)]
pub struct ParamDef {
    pub name: String,
    pub sig: TypeSig,
    pub by_ref: bool,
}

#[derive(Debug, Clone)]
pub struct MethodDef {
    pub name: String,
    pub params: Vec<ParamDef>,
    pub return_sig: Option<TypeSig>,
}

/// A property lowers to a getter (and a setter when settable) in vtable
/// order after the declared methods.
#[derive(Debug, Clone)]
pub struct PropertyDef {
    pub name: String,
    pub sig: TypeSig,
    pub settable: bool,
}

#[derive(Debug, Clone)]
pub struct InterfaceDef {
    pub name: TypeName,
    pub visibility: Visibility,
    pub kind: ShapeKind,
    pub flavor: InterfaceFlavor,
    /// Declared identifier; required for all COM-visible interfaces and
    /// delegates
    pub guid: Option<Guid>,
    pub generic_params: Vec<String>,
    pub bases: Vec<BaseInterface>,
    pub methods: Vec<MethodDef>,
    pub properties: Vec<PropertyDef>,
}

#[derive(Debug, Clone)]
pub struct FieldDef {
    pub name: String,
    pub sig: TypeSig,
}

#[derive(Debug, Clone)]
pub struct StructDef {
    pub name: TypeName,
    pub visibility: Visibility,
    pub fields: Vec<FieldDef>,
}

#[derive(Debug, Clone)]
pub struct EnumDef {
    pub name: TypeName,
    pub visibility: Visibility,
    /// Flags enums are unsigned at the ABI
    pub flags: bool,
}

#[derive(Debug, Clone)]
pub enum TypeDef {
    Interface(InterfaceDef),
    Struct(StructDef),
    Enum(EnumDef),
}

impl TypeDef {
    pub fn name(&self) -> &TypeName {
        match self {
            TypeDef::Interface(def) => &def.name,
            TypeDef::Struct(def) => &def.name,
            TypeDef::Enum(def) => &def.name,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_full_name() {
        assert_eq!(
            TypeName::new("Windows.Foundation", "IClosable").full_name(),
            "Windows.Foundation.IClosable"
        );
        assert_eq!(TypeName::new("", "IThing").full_name(), "IThing");
    }

    #[test]
    fn test_segments() {
        let name = TypeName::new("Windows.Foundation", "IClosable");
        let segments: Vec<&str> = name.segments().collect();
        assert_eq!(segments, vec!["Windows", "Foundation", "IClosable"]);
    }

    #[test]
    fn test_substitute_recurses() {
        let sig = TypeSig::Bound {
            def: DefId(3),
            args: vec![
                TypeSig::GenericParam(0),
                TypeSig::Array(Box::new(TypeSig::GenericParam(1))),
            ],
        };
        let bound = sig.substitute(&[TypeSig::Int32, TypeSig::String]);
        assert_eq!(
            bound,
            TypeSig::Bound {
                def: DefId(3),
                args: vec![
                    TypeSig::Int32,
                    TypeSig::Array(Box::new(TypeSig::String)),
                ],
            }
        );
    }
}
