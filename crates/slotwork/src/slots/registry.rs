//! The dunder registry: which special method names map onto which slots.
//!
//! Each [`SlotDef`] ties a dunder name to a slot and to the calling convention
//! used when the slot is exposed as a method (a "slot wrapper") or filled from
//! a user-declared method. The registry is built for one [`Dialect`], which
//! decides the spelling of the two renamed hooks.

use ahash::AHashMap;
use smallvec::SmallVec;
use strum::EnumCount;

use crate::{
    args::ArgValues,
    config::Dialect,
    error::{ExcType, RunResult},
    runtime::Runtime,
    slots::{CompareOp, Slot, SlotFunc, SlotId},
    suspension::{OpResult, Resumable},
    value::Value,
};

/// Calling convention of a dunder when invoked as a method.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SlotKind {
    /// `__new__(cls, *args, **kwargs)`
    New,
    /// `__init__(self, *args, **kwargs)`, must return None.
    Init,
    /// `__call__(self, *args, **kwargs)`
    Call,
    /// `__getattribute__(self, name)` and `__getattr__(self, name)`
    GetAttr,
    /// `__setattr__(self, name, value)`
    SetAttr,
    /// `__delattr__(self, name)`
    DelAttr,
    /// `__get__(self, instance, owner=None)`
    DescrGet,
    /// `__set__(self, instance, value)`
    DescrSet,
    /// `__delete__(self, instance)`
    DescrDelete,
    /// `__repr__(self)` and `__str__(self)`, must return str.
    Stringify,
    /// `__hash__(self)`, must return int.
    Hash,
    /// Truthiness hook, must return bool.
    Bool,
    /// `__len__(self)`, must return a non-negative int.
    Len,
    /// Any `op(self)` returning an object.
    Unary,
    /// Iterator advance; exhaustion raises StopIteration.
    Next,
    /// `__contains__(self, item)`
    Contains,
    /// `__getitem__(self, key)`
    GetItem,
    /// `__setitem__(self, key, value)`
    SetItem,
    /// `__delitem__(self, key)`
    DelItem,
    /// `__eq__(self, other)` and friends.
    Compare(CompareOp),
    /// `__add__(self, other)`: invoked as `slot(self, other)`.
    Binary,
    /// `__radd__(self, other)`: invoked as `slot(other, self)`.
    BinaryReflected,
}

impl SlotKind {
    /// Exact number of positional arguments after the receiver, where fixed.
    fn arity(self) -> Option<(usize, usize)> {
        match self {
            Self::New | Self::Init | Self::Call => None,
            Self::Stringify | Self::Hash | Self::Bool | Self::Len | Self::Unary | Self::Next => Some((0, 0)),
            Self::GetAttr | Self::DelAttr | Self::DescrDelete | Self::Contains | Self::GetItem | Self::DelItem => {
                Some((1, 1))
            }
            Self::Compare(_) | Self::Binary | Self::BinaryReflected => Some((1, 1)),
            Self::DescrGet => Some((1, 2)),
            Self::SetAttr | Self::DescrSet | Self::SetItem => Some((2, 2)),
        }
    }
}

/// One dunder-to-slot mapping.
#[derive(Debug, Clone, Copy)]
pub struct SlotDef {
    pub name: &'static str,
    pub slot: SlotId,
    pub kind: SlotKind,
    pub doc: &'static str,
}

macro_rules! slot_def {
    ($name:literal, $slot:ident, $kind:expr, $doc:expr) => {
        SlotDef {
            name: $name,
            slot: SlotId::$slot,
            kind: $kind,
            doc: $doc,
        }
    };
}

macro_rules! binary_defs {
    ($fwd:literal, $refl:literal, $inplace:literal, $slot:ident, $rslot:ident, $islot:ident, $sym:literal) => {
        [
            slot_def!($fwd, $slot, SlotKind::Binary, concat!("Return self", $sym, "value.")),
            slot_def!($refl, $rslot, SlotKind::BinaryReflected, concat!("Return value", $sym, "self.")),
            slot_def!($inplace, $islot, SlotKind::Binary, concat!("Return self", $sym, "=value.")),
        ]
    };
}

/// Modern-dialect definitions, in the order slot wrappers are installed.
static TYPE_SLOT_DEFS: [SlotDef; 32] = [
    slot_def!("__new__", New, SlotKind::New, "Create and return a new object."),
    slot_def!("__init__", Init, SlotKind::Init, "Initialize self."),
    slot_def!("__call__", Call, SlotKind::Call, "Call self as a function."),
    slot_def!("__getattribute__", GetAttribute, SlotKind::GetAttr, "Return getattr(self, name)."),
    slot_def!("__getattr__", GetAttr, SlotKind::GetAttr, "Fallback for a failed attribute lookup."),
    slot_def!("__setattr__", SetAttr, SlotKind::SetAttr, "Implement setattr(self, name, value)."),
    slot_def!("__delattr__", SetAttr, SlotKind::DelAttr, "Implement delattr(self, name)."),
    slot_def!("__get__", DescrGet, SlotKind::DescrGet, "Return an attribute of instance, which is of type owner."),
    slot_def!("__set__", DescrSet, SlotKind::DescrSet, "Set an attribute of instance to value."),
    slot_def!("__delete__", DescrSet, SlotKind::DescrDelete, "Delete an attribute of instance."),
    slot_def!("__repr__", Repr, SlotKind::Stringify, "Return repr(self)."),
    slot_def!("__str__", Str, SlotKind::Stringify, "Return str(self)."),
    slot_def!("__hash__", Hash, SlotKind::Hash, "Return hash(self)."),
    slot_def!("__bool__", Bool, SlotKind::Bool, "True if self else False"),
    slot_def!("__len__", Len, SlotKind::Len, "Return len(self)."),
    slot_def!("__iter__", Iter, SlotKind::Unary, "Implement iter(self)."),
    slot_def!("__next__", Next, SlotKind::Next, "Implement next(self)."),
    slot_def!("__contains__", Contains, SlotKind::Contains, "Return key in self."),
    slot_def!("__getitem__", GetItem, SlotKind::GetItem, "Return self[key]."),
    slot_def!("__setitem__", SetItem, SlotKind::SetItem, "Set self[key] to value."),
    slot_def!("__delitem__", SetItem, SlotKind::DelItem, "Delete self[key]."),
    slot_def!("__eq__", Eq, SlotKind::Compare(CompareOp::Eq), "Return self==value."),
    slot_def!("__ne__", Ne, SlotKind::Compare(CompareOp::Ne), "Return self!=value."),
    slot_def!("__lt__", Lt, SlotKind::Compare(CompareOp::Lt), "Return self<value."),
    slot_def!("__le__", Le, SlotKind::Compare(CompareOp::Le), "Return self<=value."),
    slot_def!("__gt__", Gt, SlotKind::Compare(CompareOp::Gt), "Return self>value."),
    slot_def!("__ge__", Ge, SlotKind::Compare(CompareOp::Ge), "Return self>=value."),
    slot_def!("__neg__", Neg, SlotKind::Unary, "-self"),
    slot_def!("__pos__", Pos, SlotKind::Unary, "+self"),
    slot_def!("__abs__", Abs, SlotKind::Unary, "abs(self)"),
    slot_def!("__invert__", Invert, SlotKind::Unary, "~self"),
    slot_def!("__index__", Index, SlotKind::Unary, "Return self converted to an integer, if self is suitable for use as an index into a list."),
];

static CONVERSION_SLOT_DEFS: [SlotDef; 2] = [
    slot_def!("__int__", Int, SlotKind::Unary, "int(self)"),
    slot_def!("__float__", Float, SlotKind::Unary, "float(self)"),
];

static NUMBER_SLOT_DEFS: [[SlotDef; 3]; 13] = [
    binary_defs!("__add__", "__radd__", "__iadd__", Add, RAdd, IAdd, "+"),
    binary_defs!("__sub__", "__rsub__", "__isub__", Sub, RSub, ISub, "-"),
    binary_defs!("__mul__", "__rmul__", "__imul__", Mul, RMul, IMul, "*"),
    binary_defs!("__matmul__", "__rmatmul__", "__imatmul__", MatMul, RMatMul, IMatMul, "@"),
    binary_defs!("__truediv__", "__rtruediv__", "__itruediv__", TrueDiv, RTrueDiv, ITrueDiv, "/"),
    binary_defs!("__floordiv__", "__rfloordiv__", "__ifloordiv__", FloorDiv, RFloorDiv, IFloorDiv, "//"),
    binary_defs!("__mod__", "__rmod__", "__imod__", Mod, RMod, IMod, "%"),
    binary_defs!("__pow__", "__rpow__", "__ipow__", Pow, RPow, IPow, "**"),
    binary_defs!("__lshift__", "__rlshift__", "__ilshift__", LShift, RLShift, ILShift, "<<"),
    binary_defs!("__rshift__", "__rrshift__", "__irshift__", RShift, RRShift, IRShift, ">>"),
    binary_defs!("__and__", "__rand__", "__iand__", And, RAnd, IAnd, "&"),
    binary_defs!("__xor__", "__rxor__", "__ixor__", Xor, RXor, IXor, "^"),
    binary_defs!("__or__", "__ror__", "__ior__", Or, ROr, IOr, "|"),
];

static DIVMOD_SLOT_DEFS: [SlotDef; 2] = [
    slot_def!("__divmod__", Divmod, SlotKind::Binary, "Return divmod(self, value)."),
    slot_def!("__rdivmod__", RDivmod, SlotKind::BinaryReflected, "Return divmod(value, self)."),
];

/// Hooks whose dunder name depends on the dialect: `(slot, modern, legacy)`.
pub const RENAMED_HOOKS: [(SlotId, &str, &str); 2] = [
    (SlotId::Bool, "__bool__", "__nonzero__"),
    (SlotId::Next, "__next__", "next"),
];

fn dialect_name(def: &SlotDef, dialect: Dialect) -> &'static str {
    if dialect == Dialect::Legacy {
        for (slot, modern, legacy) in RENAMED_HOOKS {
            if slot == def.slot && def.name == modern {
                return legacy;
            }
        }
    }
    def.name
}

/// Name-to-slot mapping for one dialect.
#[derive(Debug, Clone)]
pub struct DunderRegistry {
    dialect: Dialect,
    defs: Vec<SlotDef>,
    by_name: AHashMap<&'static str, usize>,
    by_slot: Vec<SmallVec<[usize; 2]>>,
}

impl DunderRegistry {
    #[must_use]
    pub fn new(dialect: Dialect) -> Self {
        let all = TYPE_SLOT_DEFS
            .iter()
            .chain(&CONVERSION_SLOT_DEFS)
            .chain(NUMBER_SLOT_DEFS.iter().flatten())
            .chain(&DIVMOD_SLOT_DEFS);
        let mut defs = Vec::new();
        let mut by_name = AHashMap::new();
        let mut by_slot = vec![SmallVec::new(); SlotId::COUNT];
        for def in all {
            let def = SlotDef {
                name: dialect_name(def, dialect),
                ..*def
            };
            by_name.insert(def.name, defs.len());
            by_slot[def.slot.index()].push(defs.len());
            defs.push(def);
        }
        Self {
            dialect,
            defs,
            by_name,
            by_slot,
        }
    }

    #[must_use]
    pub fn dialect(&self) -> Dialect {
        self.dialect
    }

    /// All definitions in installation order.
    #[must_use]
    pub fn defs(&self) -> &[SlotDef] {
        &self.defs
    }

    /// The definition for a dunder name in this dialect.
    #[must_use]
    pub fn lookup(&self, name: &str) -> Option<&SlotDef> {
        self.by_name.get(name).map(|&i| &self.defs[i])
    }

    /// Every dunder feeding `slot`; `SetAttr` has two (`__setattr__`, `__delattr__`).
    pub fn defs_for_slot(&self, slot: SlotId) -> impl Iterator<Item = &SlotDef> {
        self.by_slot[slot.index()].iter().map(|&i| &self.defs[i])
    }

    /// The dunder consulted when `slot` is resolved by name.
    #[must_use]
    pub fn primary_name(&self, slot: SlotId) -> &'static str {
        self.defs_for_slot(slot).next().map_or("", |def| def.name)
    }
}

impl SlotDef {
    /// Slot contents for a user-declared dunder. A `None` value blocks the slot.
    #[must_use]
    pub fn slot_for(&self, callable: &Value) -> Option<Slot> {
        if callable.is_none() {
            None
        } else {
            Some(Slot::Override {
                name: self.name,
                callable: callable.clone(),
            })
        }
    }

    fn check_arity(&self, args: &ArgValues) -> RunResult<()> {
        args.check_no_kwargs(self.name)?;
        let Some((min, max)) = self.kind.arity() else {
            return Ok(());
        };
        let count = args.len();
        if count < min || count > max {
            let expected = if min == max {
                format!("{min}")
            } else {
                format!("{min} to {max}")
            };
            let plural = if max == 1 { "" } else { "s" };
            return Err(ExcType::type_error(format!(
                "expected {expected} argument{plural}, got {count}"
            )));
        }
        Ok(())
    }

    /// Calls a native slot function exposed as this dunder, e.g. `int.__add__(1, 2)`.
    ///
    /// `receiver` has already been checked against the owning type.
    pub(crate) fn invoke_wrapper(
        &self,
        rt: &mut Runtime,
        func: SlotFunc,
        receiver: &Value,
        args: ArgValues,
    ) -> OpResult {
        self.check_arity(&args)?;
        let none = |r: Resumable<()>| r.map(|()| Value::None);
        match (self.kind, func) {
            (SlotKind::New, SlotFunc::New(f)) => {
                let cls = receiver.ref_id().ok_or_else(|| ExcType::type_error("__new__(X): X is not a type object"))?;
                f(rt, cls, args)
            }
            (SlotKind::Init, SlotFunc::Init(f)) => Ok(none(f(rt, receiver, args)?)),
            (SlotKind::Call, SlotFunc::Call(f)) => f(rt, receiver, args),
            (SlotKind::GetAttr, SlotFunc::GetAttro(f)) => {
                let name = attr_name_arg(rt, &args.get_one_arg(self.name)?)?;
                f(rt, receiver, &name)
            }
            (SlotKind::SetAttr, SlotFunc::SetAttro(f)) => {
                rt.hackcheck(receiver, f, self.name)?;
                let (name, value) = args.get_two_args(self.name)?;
                let name = attr_name_arg(rt, &name)?;
                Ok(none(f(rt, receiver, &name, Some(value))?))
            }
            (SlotKind::DelAttr, SlotFunc::SetAttro(f)) => {
                rt.hackcheck(receiver, f, self.name)?;
                let name = attr_name_arg(rt, &args.get_one_arg(self.name)?)?;
                Ok(none(f(rt, receiver, &name, None)?))
            }
            (SlotKind::DescrGet, SlotFunc::DescrGet(f)) => {
                let mut positional = args.positional().iter().cloned();
                let instance = positional.next().unwrap_or(Value::None);
                let owner = positional.next().unwrap_or(Value::None);
                if instance.is_none() && owner.is_none() {
                    return Err(ExcType::type_error("__get__(None, None) is invalid"));
                }
                let owner = match owner.ref_id().filter(|id| rt.is_type_id(*id)) {
                    Some(owner) => owner,
                    None => rt.type_of(&instance),
                };
                let instance = (!instance.is_none()).then_some(instance);
                f(rt, receiver, instance.as_ref(), owner)
            }
            (SlotKind::DescrSet, SlotFunc::DescrSet(f)) => {
                let (instance, value) = args.get_two_args(self.name)?;
                Ok(none(f(rt, receiver, &instance, Some(value))?))
            }
            (SlotKind::DescrDelete, SlotFunc::DescrSet(f)) => {
                let instance = args.get_one_arg(self.name)?;
                Ok(none(f(rt, receiver, &instance, None)?))
            }
            (SlotKind::Stringify, SlotFunc::Stringify(f)) => Ok(f(rt, receiver)?.map(Value::Str)),
            (SlotKind::Hash, SlotFunc::Hash(f)) => Ok(f(rt, receiver)?.map(Value::Int)),
            (SlotKind::Bool, SlotFunc::Bool(f)) => Ok(f(rt, receiver)?.map(Value::Bool)),
            (SlotKind::Len, SlotFunc::Len(f)) => Ok(f(rt, receiver)?.map(|n| Value::Int(i64::try_from(n).unwrap_or(i64::MAX)))),
            (SlotKind::Unary, SlotFunc::Unary(f)) => f(rt, receiver),
            (SlotKind::Next, SlotFunc::IterNext(f)) => f(rt, receiver)?.and_then(rt, |_, next| match next {
                Some(item) => Ok(Resumable::Done(item)),
                None => Err(ExcType::stop_iteration()),
            }),
            (SlotKind::Contains, SlotFunc::Contains(f)) => {
                let item = args.get_one_arg(self.name)?;
                Ok(f(rt, receiver, &item)?.map(Value::Bool))
            }
            (SlotKind::GetItem, SlotFunc::Binary(f)) => {
                let key = args.get_one_arg(self.name)?;
                f(rt, receiver, &key)
            }
            (SlotKind::SetItem, SlotFunc::SetItem(f)) => {
                let (key, value) = args.get_two_args(self.name)?;
                Ok(none(f(rt, receiver, &key, Some(value))?))
            }
            (SlotKind::DelItem, SlotFunc::SetItem(f)) => {
                let key = args.get_one_arg(self.name)?;
                Ok(none(f(rt, receiver, &key, None)?))
            }
            (SlotKind::Compare(op), SlotFunc::RichCompare(f, _)) => {
                let other = args.get_one_arg(self.name)?;
                f(rt, receiver, &other, op)
            }
            (SlotKind::Binary, SlotFunc::Binary(f)) => {
                let other = args.get_one_arg(self.name)?;
                f(rt, receiver, &other)
            }
            (SlotKind::BinaryReflected, SlotFunc::Binary(f)) => {
                let other = args.get_one_arg(self.name)?;
                f(rt, &other, receiver)
            }
            _ => Err(ExcType::slot_signature_mismatch(self.name)),
        }
    }
}

fn attr_name_arg(rt: &Runtime, name: &Value) -> RunResult<std::rc::Rc<str>> {
    rt.str_of(name).ok_or_else(|| {
        ExcType::type_error(format!(
            "attribute name must be string, not '{}'",
            rt.value_type_name(name)
        ))
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn legacy_dialect_renames_two_hooks() {
        let modern = DunderRegistry::new(Dialect::Modern);
        let legacy = DunderRegistry::new(Dialect::Legacy);
        assert_eq!(modern.primary_name(SlotId::Bool), "__bool__");
        assert_eq!(legacy.primary_name(SlotId::Bool), "__nonzero__");
        assert_eq!(legacy.primary_name(SlotId::Next), "next");
        assert!(legacy.lookup("__bool__").is_none());
        assert_eq!(legacy.lookup("__add__").map(|d| d.slot), Some(SlotId::Add));
    }

    #[test]
    fn multi_name_slots_list_every_dunder() {
        let registry = DunderRegistry::new(Dialect::Modern);
        let names: Vec<_> = registry.defs_for_slot(SlotId::SetAttr).map(|d| d.name).collect();
        assert_eq!(names, ["__setattr__", "__delattr__"]);
        assert_eq!(registry.lookup("__radd__").map(|d| d.kind), Some(SlotKind::BinaryReflected));
    }

    #[test]
    fn number_docs_name_the_operator() {
        let registry = DunderRegistry::new(Dialect::Modern);
        assert_eq!(registry.lookup("__add__").map(|d| d.doc), Some("Return self+value."));
        assert_eq!(registry.lookup("__rfloordiv__").map(|d| d.doc), Some("Return value//self."));
        assert_eq!(registry.lookup("__ior__").map(|d| d.doc), Some("Return self|=value."));
    }
}
