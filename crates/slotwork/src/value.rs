use std::{
    fmt,
    hash::{Hash, Hasher},
    rc::Rc,
};

use crate::{
    error::{ExcType, RunResult},
    heap::HeapId,
};

/// A runtime value.
///
/// Immediates (`None`, booleans, integers, floats and strings) are stored inline.
/// Everything else, including type objects, lives in the heap and is referenced
/// through a `HeapId`. Values are cheap to clone: strings share their buffer.
#[derive(Debug, Clone)]
pub enum Value {
    None,
    /// Sentinel returned by binary and comparison slots that do not handle an operand pair.
    NotImplemented,
    Bool(bool),
    Int(i64),
    Float(f64),
    Str(Rc<str>),
    Ref(HeapId),
}

impl Value {
    #[must_use]
    pub fn str(s: &str) -> Self {
        Self::Str(Rc::from(s))
    }

    /// Identity comparison, the `is` operator.
    ///
    /// Immediates compare by value except strings, which compare by buffer identity.
    #[must_use]
    pub fn is(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::None, Self::None) | (Self::NotImplemented, Self::NotImplemented) => true,
            (Self::Bool(a), Self::Bool(b)) => a == b,
            (Self::Int(a), Self::Int(b)) => a == b,
            (Self::Float(a), Self::Float(b)) => a.to_bits() == b.to_bits(),
            (Self::Str(a), Self::Str(b)) => Rc::ptr_eq(a, b),
            (Self::Ref(a), Self::Ref(b)) => a == b,
            _ => false,
        }
    }

    #[must_use]
    pub fn is_none(&self) -> bool {
        matches!(self, Self::None)
    }

    #[must_use]
    pub fn is_not_implemented(&self) -> bool {
        matches!(self, Self::NotImplemented)
    }

    /// Returns the heap id for heap-allocated values.
    #[must_use]
    pub fn ref_id(&self) -> Option<HeapId> {
        match self {
            Self::Ref(id) => Some(*id),
            _ => None,
        }
    }

    /// Returns the immediate string, if this is one.
    ///
    /// Instances of `str` subclasses live in the heap; use `Runtime::str_of` to cover both.
    #[must_use]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::Str(s) => Some(s),
            _ => None,
        }
    }

    /// Returns the immediate integer value; booleans count as integers.
    #[must_use]
    pub fn as_int(&self) -> Option<i64> {
        match self {
            Self::Int(i) => Some(*i),
            Self::Bool(b) => Some(i64::from(*b)),
            _ => None,
        }
    }
}

impl From<bool> for Value {
    fn from(b: bool) -> Self {
        Self::Bool(b)
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Self::Int(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Self::Float(f)
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Self::str(s)
    }
}

impl From<Rc<str>> for Value {
    fn from(s: Rc<str>) -> Self {
        Self::Str(s)
    }
}

impl From<HeapId> for Value {
    fn from(id: HeapId) -> Self {
        Self::Ref(id)
    }
}

/// Hashable projection of a `Value` used as a dictionary key.
///
/// Booleans and integral floats collapse onto integers so `1`, `1.0` and `True`
/// address the same entry. Heap values hash by identity.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DictKey {
    None,
    NotImplemented,
    Int(i64),
    Float(u64),
    Str(Rc<str>),
    Ref(HeapId),
}

impl DictKey {
    pub fn from_value(value: &Value) -> RunResult<Self> {
        Ok(match value {
            Value::None => Self::None,
            Value::NotImplemented => Self::NotImplemented,
            Value::Bool(b) => Self::Int(i64::from(*b)),
            Value::Int(i) => Self::Int(*i),
            Value::Float(f) => {
                if f.is_nan() {
                    return Err(ExcType::value_error("NaN is not a valid dictionary key"));
                }
                float_key(*f)
            }
            Value::Str(s) => Self::Str(s.clone()),
            Value::Ref(id) => Self::Ref(*id),
        })
    }
}

#[expect(clippy::cast_possible_truncation)]
fn float_key(f: f64) -> DictKey {
    if f.fract() == 0.0 && f >= i64::MIN as f64 && f < i64::MAX as f64 {
        DictKey::Int(f as i64)
    } else {
        DictKey::Float(f.to_bits())
    }
}

const TAG_NONE: u8 = 0;
const TAG_NOT_IMPLEMENTED: u8 = 1;
const TAG_INT: u8 = 2;
const TAG_FLOAT: u8 = 3;
const TAG_STR: u8 = 4;
const TAG_REF: u8 = 5;

impl Hash for DictKey {
    fn hash<H: Hasher>(&self, state: &mut H) {
        match self {
            Self::None => TAG_NONE.hash(state),
            Self::NotImplemented => TAG_NOT_IMPLEMENTED.hash(state),
            Self::Int(i) => {
                TAG_INT.hash(state);
                i.hash(state);
            }
            Self::Float(bits) => {
                TAG_FLOAT.hash(state);
                bits.hash(state);
            }
            Self::Str(s) => StrKey(s).hash(state),
            Self::Ref(id) => {
                TAG_REF.hash(state);
                id.hash(state);
            }
        }
    }
}

/// Borrowed string key, used to probe a dictionary without allocating an `Rc<str>`.
pub(crate) struct StrKey<'a>(pub &'a str);

impl Hash for StrKey<'_> {
    fn hash<H: Hasher>(&self, state: &mut H) {
        TAG_STR.hash(state);
        self.0.hash(state);
    }
}

impl indexmap::Equivalent<DictKey> for StrKey<'_> {
    fn equivalent(&self, key: &DictKey) -> bool {
        matches!(key, DictKey::Str(s) if &**s == self.0)
    }
}

impl fmt::Display for DictKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => f.write_str("None"),
            Self::NotImplemented => f.write_str("NotImplemented"),
            Self::Int(i) => write!(f, "{i}"),
            Self::Float(bits) => write!(f, "{}", f64::from_bits(*bits)),
            Self::Str(s) => write!(f, "'{s}'"),
            Self::Ref(id) => write!(f, "<object {}>", id.index()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn numeric_keys_collapse() {
        let one = DictKey::from_value(&Value::Int(1)).unwrap();
        assert_eq!(DictKey::from_value(&Value::Bool(true)).unwrap(), one);
        assert_eq!(DictKey::from_value(&Value::Float(1.0)).unwrap(), one);
        assert_ne!(DictKey::from_value(&Value::Float(1.5)).unwrap(), one);
    }

    #[test]
    fn strings_are_equal_but_not_identical() {
        let a = Value::str("x");
        let b = Value::str("x");
        assert!(!a.is(&b));
        assert!(a.is(&a.clone()));
    }
}
