use std::rc::Rc;

use bitflags::bitflags;
use strum::{Display, IntoStaticStr};

use crate::{
    heap::HeapId,
    slots::SlotTable,
    types::{Dict, GetSetDef, MethodDef},
};

bitflags! {
    /// Per-type behaviour flags.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct TypeFlags: u32 {
        /// The type may be used as a base class.
        const BASETYPE = 1 << 0;
        /// Declared at runtime through the class-building pipeline.
        const HEAPTYPE = 1 << 1;
        /// Instantiation is refused.
        const ABSTRACT = 1 << 2;
        /// Instances carry an attribute dictionary.
        const HAS_DICT = 1 << 3;
        /// Attributes of the type object itself cannot be assigned.
        const IMMUTABLE = 1 << 4;
        /// The `base` chain equals the MRO, so lookups can follow parents directly.
        const PROTOTYPICAL = 1 << 5;
        /// Attribute values of this type are called with the receiver prepended
        /// instead of being bound first.
        const METHOD_DESCRIPTOR = 1 << 6;
        const SEQUENCE = 1 << 7;
        const MAPPING = 1 << 8;
    }
}

/// Native storage layout of instances.
///
/// Two bases conflict when neither layout extends the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, IntoStaticStr)]
pub enum Layout {
    Object,
    Type,
    NoneType,
    NotImplemented,
    Int,
    Bool,
    Float,
    Str,
    Tuple,
    List,
    Dict,
    Function,
    BuiltinFunction,
    BoundMethod,
    Descriptor,
    StaticMethod,
    ClassMethod,
    Property,
    Super,
    Iterator,
    Cell,
}

impl Layout {
    /// Whether instances laid out as `self` are also valid `base` instances.
    #[must_use]
    pub fn extends(self, base: Self) -> bool {
        self == base || base == Self::Object || (self == Self::Bool && base == Self::Int)
    }
}

/// A type object: name, inheritance, slot table and attribute namespace.
#[derive(Debug)]
pub struct TypeObject {
    pub(crate) name: Rc<str>,
    pub(crate) qualname: Rc<str>,
    /// The solid base the layout is inherited from; `None` only for `object`.
    pub(crate) base: Option<HeapId>,
    pub(crate) bases: Vec<HeapId>,
    pub(crate) metatype: HeapId,
    /// Linearized ancestors, starting with the type itself.
    pub(crate) mro: Vec<HeapId>,
    pub(crate) slots: SlotTable,
    pub(crate) dict: Dict,
    pub(crate) flags: TypeFlags,
    pub(crate) layout: Layout,
    pub(crate) methods: &'static [MethodDef],
    pub(crate) getsets: &'static [GetSetDef],
    pub(crate) classmethods: &'static [MethodDef],
    /// Direct subclasses, in declaration order.
    pub(crate) subclasses: Vec<HeapId>,
}

impl TypeObject {
    #[must_use]
    pub fn name(&self) -> &str {
        &self.name
    }

    #[must_use]
    pub fn qualname(&self) -> &str {
        &self.qualname
    }

    #[must_use]
    pub fn base(&self) -> Option<HeapId> {
        self.base
    }

    #[must_use]
    pub fn bases(&self) -> &[HeapId] {
        &self.bases
    }

    #[must_use]
    pub fn mro(&self) -> &[HeapId] {
        &self.mro
    }

    #[must_use]
    pub fn flags(&self) -> TypeFlags {
        self.flags
    }

    #[must_use]
    pub fn layout(&self) -> Layout {
        self.layout
    }

    #[must_use]
    pub fn slots(&self) -> &SlotTable {
        &self.slots
    }

    #[must_use]
    pub fn is_heap_type(&self) -> bool {
        self.flags.contains(TypeFlags::HEAPTYPE)
    }
}
