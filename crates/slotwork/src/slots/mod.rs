//! Slot tables: the fast-path function pointers behind every protocol operation.
//!
//! Each type carries one [`SlotTable`]. A populated slot is either a native
//! function ([`SlotFunc`]), a user-declared dunder callable, or a marker that
//! the implementation must be found by walking the MRO at call time.

pub mod invoke;
pub mod registry;

use std::{fmt, rc::Rc};

use strum::{Display, EnumCount, EnumIter, IntoEnumIterator, IntoStaticStr};

use crate::{
    args::ArgValues,
    heap::HeapId,
    runtime::Runtime,
    suspension::OpResult,
    value::Value,
};

/// Identifies one slot in a type's slot table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumCount, EnumIter, IntoStaticStr)]
pub enum SlotId {
    New,
    Init,
    Call,
    GetAttribute,
    /// Fallback consulted when `GetAttribute` raises AttributeError.
    GetAttr,
    /// Attribute assignment and deletion.
    SetAttr,
    DescrGet,
    /// Descriptor assignment and deletion.
    DescrSet,
    Repr,
    Str,
    Hash,
    Bool,
    Len,
    Iter,
    Next,
    Contains,
    GetItem,
    /// Item assignment and deletion.
    SetItem,
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Neg,
    Pos,
    Abs,
    Invert,
    Int,
    Float,
    Index,
    Add,
    RAdd,
    IAdd,
    Sub,
    RSub,
    ISub,
    Mul,
    RMul,
    IMul,
    MatMul,
    RMatMul,
    IMatMul,
    TrueDiv,
    RTrueDiv,
    ITrueDiv,
    FloorDiv,
    RFloorDiv,
    IFloorDiv,
    Mod,
    RMod,
    IMod,
    Divmod,
    RDivmod,
    Pow,
    RPow,
    IPow,
    LShift,
    RLShift,
    ILShift,
    RShift,
    RRShift,
    IRShift,
    And,
    RAnd,
    IAnd,
    Xor,
    RXor,
    IXor,
    Or,
    ROr,
    IOr,
}

impl SlotId {
    #[inline]
    #[must_use]
    pub fn index(self) -> usize {
        self as usize
    }

    /// The reflected companion of a forward binary slot (`Add` -> `RAdd`).
    #[must_use]
    pub fn reflected(self) -> Option<Self> {
        BinaryOp::iter().find(|op| op.slot() == self).map(BinaryOp::reflected_slot)
    }

    /// Whether a native function stored here must be a `SlotFunc` of the given shape.
    #[must_use]
    pub fn accepts(self, func: &SlotFunc) -> bool {
        match self {
            Self::New => matches!(func, SlotFunc::New(_)),
            Self::Init => matches!(func, SlotFunc::Init(_)),
            Self::Call => matches!(func, SlotFunc::Call(_)),
            Self::GetAttribute | Self::GetAttr => matches!(func, SlotFunc::GetAttro(_)),
            Self::SetAttr => matches!(func, SlotFunc::SetAttro(_)),
            Self::DescrGet => matches!(func, SlotFunc::DescrGet(_)),
            Self::DescrSet => matches!(func, SlotFunc::DescrSet(_)),
            Self::Repr | Self::Str => matches!(func, SlotFunc::Stringify(_)),
            Self::Hash => matches!(func, SlotFunc::Hash(_)),
            Self::Bool => matches!(func, SlotFunc::Bool(_)),
            Self::Len => matches!(func, SlotFunc::Len(_)),
            Self::Next => matches!(func, SlotFunc::IterNext(_)),
            Self::Contains => matches!(func, SlotFunc::Contains(_)),
            Self::SetItem => matches!(func, SlotFunc::SetItem(_)),
            Self::Eq | Self::Ne | Self::Lt | Self::Le | Self::Gt | Self::Ge => {
                matches!(func, SlotFunc::RichCompare(..))
            }
            Self::Iter | Self::Neg | Self::Pos | Self::Abs | Self::Invert | Self::Int | Self::Float | Self::Index => {
                matches!(func, SlotFunc::Unary(_))
            }
            _ => matches!(func, SlotFunc::Binary(_)),
        }
    }
}

pub type UnaryFn = fn(&mut Runtime, &Value) -> OpResult;
/// Binary operator in operand order: `f(left, right)` for both forward and reflected use.
pub type BinaryFn = fn(&mut Runtime, &Value, &Value) -> OpResult;
pub type CallFn = fn(&mut Runtime, &Value, ArgValues) -> OpResult;
pub type NewFn = fn(&mut Runtime, HeapId, ArgValues) -> OpResult;
pub type InitFn = fn(&mut Runtime, &Value, ArgValues) -> OpResult<()>;
pub type GetAttroFn = fn(&mut Runtime, &Value, &str) -> OpResult;
/// Sets the attribute when `value` is `Some`, deletes it otherwise.
pub type SetAttroFn = fn(&mut Runtime, &Value, &str, Option<Value>) -> OpResult<()>;
/// `f(descriptor, instance, owner)`; `instance` is `None` for access through the type.
pub type DescrGetFn = fn(&mut Runtime, &Value, Option<&Value>, HeapId) -> OpResult;
/// `f(descriptor, instance, value)`; `None` deletes.
pub type DescrSetFn = fn(&mut Runtime, &Value, &Value, Option<Value>) -> OpResult<()>;
pub type StringifyFn = fn(&mut Runtime, &Value) -> OpResult<Rc<str>>;
pub type HashFn = fn(&mut Runtime, &Value) -> OpResult<i64>;
pub type BoolFn = fn(&mut Runtime, &Value) -> OpResult<bool>;
pub type LenFn = fn(&mut Runtime, &Value) -> OpResult<usize>;
/// Advances an iterator; `None` means exhausted.
pub type IterNextFn = fn(&mut Runtime, &Value) -> OpResult<Option<Value>>;
pub type ContainsFn = fn(&mut Runtime, &Value, &Value) -> OpResult<bool>;
/// `f(container, key, value)`; `None` deletes.
pub type SetItemFn = fn(&mut Runtime, &Value, &Value, Option<Value>) -> OpResult<()>;
pub type RichCompareFn = fn(&mut Runtime, &Value, &Value, CompareOp) -> OpResult;

/// A native slot implementation with its typed signature.
#[derive(Clone, Copy)]
pub enum SlotFunc {
    Unary(UnaryFn),
    Binary(BinaryFn),
    Call(CallFn),
    New(NewFn),
    Init(InitFn),
    GetAttro(GetAttroFn),
    SetAttro(SetAttroFn),
    DescrGet(DescrGetFn),
    DescrSet(DescrSetFn),
    Stringify(StringifyFn),
    Hash(HashFn),
    Bool(BoolFn),
    Len(LenFn),
    IterNext(IterNextFn),
    Contains(ContainsFn),
    SetItem(SetItemFn),
    /// One rich comparison function shared by all six comparison slots.
    RichCompare(RichCompareFn, CompareOp),
}

impl SlotFunc {
    /// Address of the underlying function, used for identity checks.
    #[must_use]
    pub fn addr(&self) -> usize {
        match self {
            Self::Unary(f) => *f as usize,
            Self::Binary(f) => *f as usize,
            Self::Call(f) => *f as usize,
            Self::New(f) => *f as usize,
            Self::Init(f) => *f as usize,
            Self::GetAttro(f) => *f as usize,
            Self::SetAttro(f) => *f as usize,
            Self::DescrGet(f) => *f as usize,
            Self::DescrSet(f) => *f as usize,
            Self::Stringify(f) => *f as usize,
            Self::Hash(f) => *f as usize,
            Self::Bool(f) => *f as usize,
            Self::Len(f) => *f as usize,
            Self::IterNext(f) => *f as usize,
            Self::Contains(f) => *f as usize,
            Self::SetItem(f) => *f as usize,
            Self::RichCompare(f, _) => *f as usize,
        }
    }

    #[must_use]
    pub fn same_as(&self, other: &Self) -> bool {
        self.addr() == other.addr()
    }
}

impl fmt::Debug for SlotFunc {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let kind = match self {
            Self::Unary(_) => "Unary",
            Self::Binary(_) => "Binary",
            Self::Call(_) => "Call",
            Self::New(_) => "New",
            Self::Init(_) => "Init",
            Self::GetAttro(_) => "GetAttro",
            Self::SetAttro(_) => "SetAttro",
            Self::DescrGet(_) => "DescrGet",
            Self::DescrSet(_) => "DescrSet",
            Self::Stringify(_) => "Stringify",
            Self::Hash(_) => "Hash",
            Self::Bool(_) => "Bool",
            Self::Len(_) => "Len",
            Self::IterNext(_) => "IterNext",
            Self::Contains(_) => "Contains",
            Self::SetItem(_) => "SetItem",
            Self::RichCompare(_, op) => return write!(f, "RichCompare({op:?}@{:#x})", self.addr()),
        };
        write!(f, "{kind}@{:#x}", self.addr())
    }
}

/// Content of one populated slot.
#[derive(Debug, Clone)]
pub enum Slot {
    Native(SlotFunc),
    /// A dunder declared directly on the type; `name` is the dunder it was declared under.
    Override { name: &'static str, callable: Value },
    /// Resolve the dunder through the MRO on every invocation; `name` is the
    /// dunder the slot was derived for.
    Lookup { name: &'static str },
}

/// A slot resolved to something invocable.
#[derive(Debug, Clone)]
pub(crate) enum ResolvedSlot {
    Native(SlotFunc),
    Callable(Value),
}

impl ResolvedSlot {
    /// Identity comparison used by reflected-operand priority.
    pub fn same_as(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Native(a), Self::Native(b)) => a.same_as(b),
            (Self::Callable(a), Self::Callable(b)) => a.is(b),
            _ => false,
        }
    }
}

/// Fixed-size table of slots indexed by `SlotId`.
#[derive(Debug, Clone)]
pub struct SlotTable {
    slots: [Option<Slot>; SlotId::COUNT],
}

impl Default for SlotTable {
    fn default() -> Self {
        Self {
            slots: std::array::from_fn(|_| None),
        }
    }
}

impl SlotTable {
    #[inline]
    #[must_use]
    pub fn get(&self, id: SlotId) -> Option<&Slot> {
        self.slots[id.index()].as_ref()
    }

    #[inline]
    pub fn set(&mut self, id: SlotId, slot: Option<Slot>) {
        self.slots[id.index()] = slot;
    }

    #[must_use]
    pub fn is_populated(&self, id: SlotId) -> bool {
        self.slots[id.index()].is_some()
    }

    /// Ids of all populated slots.
    pub fn populated(&self) -> impl Iterator<Item = SlotId> + '_ {
        SlotId::iter().filter(|id| self.is_populated(*id))
    }
}

/// Binary operators dispatched through the forward/reflected/in-place slot triple.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    MatMul,
    TrueDiv,
    FloorDiv,
    Mod,
    Divmod,
    Pow,
    LShift,
    RShift,
    And,
    Xor,
    Or,
}

impl BinaryOp {
    /// Operator spelling used in error messages.
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Add => "+",
            Self::Sub => "-",
            Self::Mul => "*",
            Self::MatMul => "@",
            Self::TrueDiv => "/",
            Self::FloorDiv => "//",
            Self::Mod => "%",
            Self::Divmod => "divmod()",
            Self::Pow => "** or pow()",
            Self::LShift => "<<",
            Self::RShift => ">>",
            Self::And => "&",
            Self::Xor => "^",
            Self::Or => "|",
        }
    }

    #[must_use]
    pub fn inplace_symbol(self) -> &'static str {
        match self {
            Self::Add => "+=",
            Self::Sub => "-=",
            Self::Mul => "*=",
            Self::MatMul => "@=",
            Self::TrueDiv => "/=",
            Self::FloorDiv => "//=",
            Self::Mod => "%=",
            Self::Divmod => "divmod()",
            Self::Pow => "**=",
            Self::LShift => "<<=",
            Self::RShift => ">>=",
            Self::And => "&=",
            Self::Xor => "^=",
            Self::Or => "|=",
        }
    }

    #[must_use]
    pub fn slot(self) -> SlotId {
        match self {
            Self::Add => SlotId::Add,
            Self::Sub => SlotId::Sub,
            Self::Mul => SlotId::Mul,
            Self::MatMul => SlotId::MatMul,
            Self::TrueDiv => SlotId::TrueDiv,
            Self::FloorDiv => SlotId::FloorDiv,
            Self::Mod => SlotId::Mod,
            Self::Divmod => SlotId::Divmod,
            Self::Pow => SlotId::Pow,
            Self::LShift => SlotId::LShift,
            Self::RShift => SlotId::RShift,
            Self::And => SlotId::And,
            Self::Xor => SlotId::Xor,
            Self::Or => SlotId::Or,
        }
    }

    #[must_use]
    pub fn reflected_slot(self) -> SlotId {
        match self {
            Self::Add => SlotId::RAdd,
            Self::Sub => SlotId::RSub,
            Self::Mul => SlotId::RMul,
            Self::MatMul => SlotId::RMatMul,
            Self::TrueDiv => SlotId::RTrueDiv,
            Self::FloorDiv => SlotId::RFloorDiv,
            Self::Mod => SlotId::RMod,
            Self::Divmod => SlotId::RDivmod,
            Self::Pow => SlotId::RPow,
            Self::LShift => SlotId::RLShift,
            Self::RShift => SlotId::RRShift,
            Self::And => SlotId::RAnd,
            Self::Xor => SlotId::RXor,
            Self::Or => SlotId::ROr,
        }
    }

    /// In-place slot; `divmod` has none.
    #[must_use]
    pub fn inplace_slot(self) -> Option<SlotId> {
        Some(match self {
            Self::Add => SlotId::IAdd,
            Self::Sub => SlotId::ISub,
            Self::Mul => SlotId::IMul,
            Self::MatMul => SlotId::IMatMul,
            Self::TrueDiv => SlotId::ITrueDiv,
            Self::FloorDiv => SlotId::IFloorDiv,
            Self::Mod => SlotId::IMod,
            Self::Divmod => return None,
            Self::Pow => SlotId::IPow,
            Self::LShift => SlotId::ILShift,
            Self::RShift => SlotId::IRShift,
            Self::And => SlotId::IAnd,
            Self::Xor => SlotId::IXor,
            Self::Or => SlotId::IOr,
        })
    }
}

/// Comparison operators, including identity and membership tests.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
pub enum CompareOp {
    Eq,
    Ne,
    Lt,
    Le,
    Gt,
    Ge,
    Is,
    IsNot,
    In,
    NotIn,
}

impl CompareOp {
    #[must_use]
    pub fn symbol(self) -> &'static str {
        match self {
            Self::Eq => "==",
            Self::Ne => "!=",
            Self::Lt => "<",
            Self::Le => "<=",
            Self::Gt => ">",
            Self::Ge => ">=",
            Self::Is => "is",
            Self::IsNot => "is not",
            Self::In => "in",
            Self::NotIn => "not in",
        }
    }

    /// The operator to try on the right operand: `a < b` falls back to `b > a`.
    #[must_use]
    pub fn swapped(self) -> Self {
        match self {
            Self::Lt => Self::Gt,
            Self::Le => Self::Ge,
            Self::Gt => Self::Lt,
            Self::Ge => Self::Le,
            other => other,
        }
    }

    /// Slot for rich comparisons; identity and membership have none.
    #[must_use]
    pub fn slot(self) -> Option<SlotId> {
        match self {
            Self::Eq => Some(SlotId::Eq),
            Self::Ne => Some(SlotId::Ne),
            Self::Lt => Some(SlotId::Lt),
            Self::Le => Some(SlotId::Le),
            Self::Gt => Some(SlotId::Gt),
            Self::Ge => Some(SlotId::Ge),
            _ => None,
        }
    }

    /// Evaluates an ordering result for natively comparable operands.
    #[must_use]
    pub fn from_ordering(self, ordering: std::cmp::Ordering) -> bool {
        use std::cmp::Ordering::{Equal, Greater, Less};
        match self {
            Self::Eq => ordering == Equal,
            Self::Ne => ordering != Equal,
            Self::Lt => ordering == Less,
            Self::Le => ordering != Greater,
            Self::Gt => ordering == Greater,
            Self::Ge => ordering != Less,
            _ => false,
        }
    }

    pub(crate) const RICH: [Self; 6] = [Self::Eq, Self::Ne, Self::Lt, Self::Le, Self::Gt, Self::Ge];
}

/// Unary operators.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Display, EnumIter, IntoStaticStr)]
pub enum UnaryOp {
    Neg,
    Pos,
    Abs,
    Invert,
    /// Logical negation, derived from truthiness rather than a slot.
    Not,
}

impl UnaryOp {
    #[must_use]
    pub fn slot(self) -> Option<SlotId> {
        match self {
            Self::Neg => Some(SlotId::Neg),
            Self::Pos => Some(SlotId::Pos),
            Self::Abs => Some(SlotId::Abs),
            Self::Invert => Some(SlotId::Invert),
            Self::Not => None,
        }
    }

    /// Spelling used in "bad operand type for ..." errors.
    #[must_use]
    pub fn describe(self) -> &'static str {
        match self {
            Self::Neg => "unary -",
            Self::Pos => "unary +",
            Self::Abs => "abs()",
            Self::Invert => "unary ~",
            Self::Not => "not",
        }
    }
}
