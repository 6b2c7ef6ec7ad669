//! `int`, `bool` and `float`.
//!
//! Integers are `i64`; results that do not fit raise `OverflowError`.
//! Binary slots take their operands in operand order and answer
//! `NotImplemented` for operand types they do not handle, which lets the
//! dispatcher try the other operand.

use std::rc::Rc;

use crate::{
    args::ArgValues,
    error::{ExcType, RunResult},
    heap::HeapId,
    runtime::Runtime,
    slots::{CompareOp, SlotId},
    suspension::{OpResult, Resumable},
    types::Payload,
    value::Value,
};

fn done(value: Value) -> OpResult {
    Ok(Resumable::Done(value))
}

fn not_implemented() -> OpResult {
    done(Value::NotImplemented)
}

fn overflow() -> crate::error::RunError {
    ExcType::overflow("integer overflow")
}

impl Runtime {
    /// Integer operand for arithmetic: ints, bools and int subclass instances.
    fn int_operand(&self, value: &Value) -> Option<i64> {
        match value {
            Value::Int(_) | Value::Bool(_) => value.as_int(),
            Value::Ref(_) if self.isinstance(value, self.core.int) => self.int_of(value),
            _ => None,
        }
    }

    /// Float operand for arithmetic: floats, ints, bools and their subclass instances.
    fn float_operand(&self, value: &Value) -> Option<f64> {
        match value {
            Value::Float(f) => Some(*f),
            Value::Int(_) | Value::Bool(_) => self.float_of(value),
            Value::Ref(_) if self.isinstance(value, self.core.float) || self.isinstance(value, self.core.int) => {
                self.float_of(value)
            }
            _ => None,
        }
    }

    /// Wraps a primitive for a subclass, or returns it directly for the exact type.
    fn box_primitive(&mut self, cls: HeapId, exact: HeapId, value: Value) -> Value {
        if cls == exact {
            value
        } else {
            self.alloc_instance(cls, Payload::Primitive(value))
        }
    }
}

pub(crate) fn floor_div(a: i64, b: i64) -> RunResult<i64> {
    if b == 0 {
        return Err(ExcType::zero_division("integer division or modulo by zero"));
    }
    let d = a.checked_div(b).ok_or_else(overflow)?;
    let r = a % b;
    // Python floor division rounds toward negative infinity
    Ok(if r != 0 && (a < 0) != (b < 0) { d - 1 } else { d })
}

pub(crate) fn floor_mod(a: i64, b: i64) -> RunResult<i64> {
    if b == 0 {
        return Err(ExcType::zero_division("integer division or modulo by zero"));
    }
    let r = a.checked_rem(b).unwrap_or(0);
    Ok(if r != 0 && (r < 0) != (b < 0) { r + b } else { r })
}

// === int ===

/// `int(x=0)`: converts numbers and numeric strings.
pub(crate) fn int_new(rt: &mut Runtime, cls: HeapId, args: ArgValues) -> OpResult {
    args.check_no_kwargs("int")?;
    let arg = args.get_range("int", 0, 1)?.into_iter().next();
    let value = match arg {
        None => 0,
        Some(arg) => {
            if let Some(i) = rt.int_operand(&arg) {
                i
            } else if let Some(f) = rt.float_operand(&arg) {
                float_to_int(f)?
            } else if let Some(s) = rt.str_of(&arg) {
                s.trim().replace('_', "").parse::<i64>().map_err(|_| {
                    ExcType::value_error(format!("invalid literal for int() with base 10: '{s}'"))
                })?
            } else {
                return Err(ExcType::type_error(format!(
                    "int() argument must be a string or a number, not '{}'",
                    rt.value_type_name(&arg)
                )));
            }
        }
    };
    let exact = rt.core.int;
    Ok(Resumable::Done(rt.box_primitive(cls, exact, Value::Int(value))))
}

#[expect(clippy::cast_possible_truncation)]
fn float_to_int(f: f64) -> RunResult<i64> {
    if f.is_nan() {
        return Err(ExcType::value_error("cannot convert float NaN to integer"));
    }
    if f.is_infinite() {
        return Err(ExcType::overflow("cannot convert float infinity to integer"));
    }
    let truncated = f.trunc();
    if truncated >= -9.223_372_036_854_776e18 && truncated < 9.223_372_036_854_776e18 {
        Ok(truncated as i64)
    } else {
        Err(overflow())
    }
}

pub(crate) fn int_repr(rt: &mut Runtime, value: &Value) -> OpResult<Rc<str>> {
    let i = rt.int_of(value).unwrap_or_default();
    Ok(Resumable::Done(i.to_string().into()))
}

pub(crate) fn int_hash(rt: &mut Runtime, value: &Value) -> OpResult<i64> {
    Ok(Resumable::Done(rt.int_of(value).unwrap_or_default()))
}

pub(crate) fn int_bool(rt: &mut Runtime, value: &Value) -> OpResult<bool> {
    Ok(Resumable::Done(rt.int_of(value).unwrap_or_default() != 0))
}

pub(crate) fn int_richcompare(rt: &mut Runtime, a: &Value, b: &Value, op: CompareOp) -> OpResult {
    match (rt.int_operand(a), rt.int_operand(b)) {
        (Some(x), Some(y)) => done(Value::Bool(op.from_ordering(x.cmp(&y)))),
        _ => not_implemented(),
    }
}

macro_rules! int_unary {
    ($name:ident, |$x:ident| $body:expr) => {
        pub(crate) fn $name(rt: &mut Runtime, value: &Value) -> OpResult {
            let $x = rt.int_of(value).unwrap_or_default();
            done($body)
        }
    };
}

int_unary!(int_neg, |x| Value::Int(x.checked_neg().ok_or_else(overflow)?));
int_unary!(int_pos, |x| Value::Int(x));
int_unary!(int_abs, |x| Value::Int(x.checked_abs().ok_or_else(overflow)?));
int_unary!(int_invert, |x| Value::Int(!x));
int_unary!(int_int, |x| Value::Int(x));
fn int_as_float(x: i64) -> f64 {
    x as f64
}
int_unary!(int_float, |x| Value::Float(int_as_float(x)));

macro_rules! int_binary {
    ($name:ident, |$a:ident, $b:ident| $body:expr) => {
        pub(crate) fn $name(rt: &mut Runtime, left: &Value, right: &Value) -> OpResult {
            match (rt.int_operand(left), rt.int_operand(right)) {
                (Some($a), Some($b)) => done($body),
                _ => not_implemented(),
            }
        }
    };
}

int_binary!(int_add, |a, b| Value::Int(a.checked_add(b).ok_or_else(overflow)?));
int_binary!(int_sub, |a, b| Value::Int(a.checked_sub(b).ok_or_else(overflow)?));
int_binary!(int_mul, |a, b| Value::Int(a.checked_mul(b).ok_or_else(overflow)?));
int_binary!(int_floordiv, |a, b| Value::Int(floor_div(a, b)?));
int_binary!(int_mod, |a, b| Value::Int(floor_mod(a, b)?));
int_binary!(int_and, |a, b| Value::Int(a & b));
int_binary!(int_xor, |a, b| Value::Int(a ^ b));
int_binary!(int_or, |a, b| Value::Int(a | b));

pub(crate) fn int_truediv(rt: &mut Runtime, left: &Value, right: &Value) -> OpResult {
    match (rt.int_operand(left), rt.int_operand(right)) {
        (Some(_), Some(0)) => Err(ExcType::zero_division("division by zero")),
        (Some(a), Some(b)) => done(Value::Float(int_as_float(a) / int_as_float(b))),
        _ => not_implemented(),
    }
}

pub(crate) fn int_divmod(rt: &mut Runtime, left: &Value, right: &Value) -> OpResult {
    match (rt.int_operand(left), rt.int_operand(right)) {
        (Some(a), Some(b)) => {
            let items = vec![Value::Int(floor_div(a, b)?), Value::Int(floor_mod(a, b)?)];
            done(rt.new_tuple(items))
        }
        _ => not_implemented(),
    }
}

pub(crate) fn int_pow(rt: &mut Runtime, left: &Value, right: &Value) -> OpResult {
    match (rt.int_operand(left), rt.int_operand(right)) {
        (Some(a), Some(b)) if b < 0 => {
            if a == 0 {
                return Err(ExcType::zero_division("0.0 cannot be raised to a negative power"));
            }
            let exp = i32::try_from(b).map_err(|_| overflow())?;
            done(Value::Float(int_as_float(a).powi(exp)))
        }
        (Some(a), Some(b)) => {
            let exp = u32::try_from(b).map_err(|_| overflow())?;
            done(Value::Int(a.checked_pow(exp).ok_or_else(overflow)?))
        }
        _ => not_implemented(),
    }
}

pub(crate) fn int_lshift(rt: &mut Runtime, left: &Value, right: &Value) -> OpResult {
    match (rt.int_operand(left), rt.int_operand(right)) {
        (Some(_), Some(b)) if b < 0 => Err(ExcType::value_error("negative shift count")),
        (Some(0), Some(_)) => done(Value::Int(0)),
        (Some(_), Some(b)) if b >= 64 => Err(overflow()),
        (Some(a), Some(b)) => {
            let shifted = i128::from(a) << b;
            done(Value::Int(i64::try_from(shifted).map_err(|_| overflow())?))
        }
        _ => not_implemented(),
    }
}

pub(crate) fn int_rshift(rt: &mut Runtime, left: &Value, right: &Value) -> OpResult {
    match (rt.int_operand(left), rt.int_operand(right)) {
        (Some(_), Some(b)) if b < 0 => Err(ExcType::value_error("negative shift count")),
        (Some(a), Some(b)) if b >= 64 => done(Value::Int(if a < 0 { -1 } else { 0 })),
        (Some(a), Some(b)) => done(Value::Int(a >> b)),
        _ => not_implemented(),
    }
}

// === bool ===

/// `bool(x=False)`: the truthiness of `x`.
pub(crate) fn bool_new(rt: &mut Runtime, _cls: HeapId, args: ArgValues) -> OpResult {
    args.check_no_kwargs("bool")?;
    match args.get_range("bool", 0, 1)?.into_iter().next() {
        None => done(Value::Bool(false)),
        Some(arg) => Ok(rt.is_true(&arg)?.map(Value::Bool)),
    }
}

pub(crate) fn bool_repr(_rt: &mut Runtime, value: &Value) -> OpResult<Rc<str>> {
    let text = if matches!(value, Value::Bool(true)) { "True" } else { "False" };
    Ok(Resumable::Done(Rc::from(text)))
}

macro_rules! bool_logic {
    ($name:ident, $int_op:ident, |$a:ident, $b:ident| $body:expr) => {
        /// Stays a bool when both operands are bools, otherwise integer arithmetic.
        pub(crate) fn $name(rt: &mut Runtime, left: &Value, right: &Value) -> OpResult {
            match (left, right) {
                (Value::Bool($a), Value::Bool($b)) => done(Value::Bool($body)),
                _ => $int_op(rt, left, right),
            }
        }
    };
}

bool_logic!(bool_and, int_and, |a, b| *a & *b);
bool_logic!(bool_or, int_or, |a, b| *a | *b);
bool_logic!(bool_xor, int_xor, |a, b| *a ^ *b);

// === float ===

/// `float(x=0.0)`: converts numbers and numeric strings.
pub(crate) fn float_new(rt: &mut Runtime, cls: HeapId, args: ArgValues) -> OpResult {
    args.check_no_kwargs("float")?;
    let arg = args.get_range("float", 0, 1)?.into_iter().next();
    let value = match arg {
        None => 0.0,
        Some(arg) => {
            if let Some(f) = rt.float_operand(&arg) {
                f
            } else if let Some(s) = rt.str_of(&arg) {
                parse_float(&s)?
            } else {
                return Err(ExcType::type_error(format!(
                    "float() argument must be a string or a real number, not '{}'",
                    rt.value_type_name(&arg)
                )));
            }
        }
    };
    let exact = rt.core.float;
    Ok(Resumable::Done(rt.box_primitive(cls, exact, Value::Float(value))))
}

fn parse_float(s: &str) -> RunResult<f64> {
    let trimmed = s.trim();
    match trimmed.to_ascii_lowercase().as_str() {
        "inf" | "+inf" | "infinity" | "+infinity" => Ok(f64::INFINITY),
        "-inf" | "-infinity" => Ok(f64::NEG_INFINITY),
        "nan" | "+nan" | "-nan" => Ok(f64::NAN),
        _ => trimmed
            .parse::<f64>()
            .map_err(|_| ExcType::value_error(format!("could not convert string to float: '{s}'"))),
    }
}

/// Formats a float the way `repr` shows it: integral values keep a `.0`.
pub(crate) fn format_float(f: f64) -> String {
    if f.is_nan() {
        "nan".to_owned()
    } else if f.is_infinite() {
        let text = if f > 0.0 { "inf" } else { "-inf" };
        text.to_owned()
    } else if f.fract() == 0.0 && f.abs() < 1e16 {
        format!("{f:.1}")
    } else {
        format!("{f}")
    }
}

pub(crate) fn float_repr(rt: &mut Runtime, value: &Value) -> OpResult<Rc<str>> {
    let f = rt.float_of(value).unwrap_or_default();
    Ok(Resumable::Done(format_float(f).into()))
}

/// Integral floats hash like the equal integer so `1.0` and `1` collide.
#[expect(clippy::cast_possible_wrap)]
pub(crate) fn float_hash(rt: &mut Runtime, value: &Value) -> OpResult<i64> {
    let f = rt.float_of(value).unwrap_or_default();
    let hash = match float_to_int(f) {
        Ok(i) if f.fract() == 0.0 => i,
        _ => f.to_bits() as i64,
    };
    Ok(Resumable::Done(hash))
}

pub(crate) fn float_bool(rt: &mut Runtime, value: &Value) -> OpResult<bool> {
    Ok(Resumable::Done(rt.float_of(value).unwrap_or_default() != 0.0))
}

pub(crate) fn float_richcompare(rt: &mut Runtime, a: &Value, b: &Value, op: CompareOp) -> OpResult {
    match (rt.float_operand(a), rt.float_operand(b)) {
        (Some(x), Some(y)) => {
            let result = match x.partial_cmp(&y) {
                Some(ordering) => op.from_ordering(ordering),
                // NaN compares unequal to everything
                None => op == CompareOp::Ne,
            };
            done(Value::Bool(result))
        }
        _ => not_implemented(),
    }
}

macro_rules! float_unary {
    ($name:ident, |$x:ident| $body:expr) => {
        pub(crate) fn $name(rt: &mut Runtime, value: &Value) -> OpResult {
            let $x = rt.float_of(value).unwrap_or_default();
            done($body)
        }
    };
}

float_unary!(float_neg, |x| Value::Float(-x));
float_unary!(float_pos, |x| Value::Float(x));
float_unary!(float_abs, |x| Value::Float(x.abs()));
float_unary!(float_int, |x| Value::Int(float_to_int(x)?));
float_unary!(float_float, |x| Value::Float(x));

macro_rules! float_binary {
    ($name:ident, |$a:ident, $b:ident| $body:expr) => {
        pub(crate) fn $name(rt: &mut Runtime, left: &Value, right: &Value) -> OpResult {
            match (rt.float_operand(left), rt.float_operand(right)) {
                (Some($a), Some($b)) => done($body),
                _ => not_implemented(),
            }
        }
    };
}

fn float_floor_mod(a: f64, b: f64) -> RunResult<f64> {
    if b == 0.0 {
        return Err(ExcType::zero_division("float modulo"));
    }
    let r = a % b;
    Ok(if r != 0.0 && (r < 0.0) != (b < 0.0) { r + b } else { r })
}

fn float_floor_div(a: f64, b: f64) -> RunResult<f64> {
    if b == 0.0 {
        return Err(ExcType::zero_division("float floor division by zero"));
    }
    Ok((a / b).floor())
}

float_binary!(float_add, |a, b| Value::Float(a + b));
float_binary!(float_sub, |a, b| Value::Float(a - b));
float_binary!(float_mul, |a, b| Value::Float(a * b));
float_binary!(float_floordiv, |a, b| Value::Float(float_floor_div(a, b)?));
float_binary!(float_mod, |a, b| Value::Float(float_floor_mod(a, b)?));
float_binary!(float_pow, |a, b| Value::Float(a.powf(b)));

pub(crate) fn float_truediv(rt: &mut Runtime, left: &Value, right: &Value) -> OpResult {
    match (rt.float_operand(left), rt.float_operand(right)) {
        (Some(_), Some(b)) if b == 0.0 => Err(ExcType::zero_division("float division by zero")),
        (Some(a), Some(b)) => done(Value::Float(a / b)),
        _ => not_implemented(),
    }
}

pub(crate) fn float_divmod(rt: &mut Runtime, left: &Value, right: &Value) -> OpResult {
    match (rt.float_operand(left), rt.float_operand(right)) {
        (Some(a), Some(b)) => {
            let items = vec![Value::Float(float_floor_div(a, b)?), Value::Float(float_floor_mod(a, b)?)];
            done(rt.new_tuple(items))
        }
        _ => not_implemented(),
    }
}

/// Slots shared by the int spec and checked by the builtins table.
pub(crate) const INT_BINARY_SLOTS: [(SlotId, crate::slots::BinaryFn); 13] = [
    (SlotId::Add, int_add),
    (SlotId::Sub, int_sub),
    (SlotId::Mul, int_mul),
    (SlotId::TrueDiv, int_truediv),
    (SlotId::FloorDiv, int_floordiv),
    (SlotId::Mod, int_mod),
    (SlotId::Divmod, int_divmod),
    (SlotId::Pow, int_pow),
    (SlotId::LShift, int_lshift),
    (SlotId::RShift, int_rshift),
    (SlotId::And, int_and),
    (SlotId::Xor, int_xor),
    (SlotId::Or, int_or),
];

pub(crate) const FLOAT_BINARY_SLOTS: [(SlotId, crate::slots::BinaryFn); 8] = [
    (SlotId::Add, float_add),
    (SlotId::Sub, float_sub),
    (SlotId::Mul, float_mul),
    (SlotId::TrueDiv, float_truediv),
    (SlotId::FloorDiv, float_floordiv),
    (SlotId::Mod, float_mod),
    (SlotId::Divmod, float_divmod),
    (SlotId::Pow, float_pow),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn floor_division_rounds_toward_negative_infinity() {
        assert_eq!(floor_div(7, 2).unwrap(), 3);
        assert_eq!(floor_div(-7, 2).unwrap(), -4);
        assert_eq!(floor_mod(-7, 2).unwrap(), 1);
        assert_eq!(floor_mod(7, -2).unwrap(), -1);
        assert!(floor_div(1, 0).unwrap_err().is(ExcType::ZeroDivisionError));
        assert!(floor_div(i64::MIN, -1).unwrap_err().is(ExcType::OverflowError));
    }

    #[test]
    fn float_formatting_keeps_trailing_zero() {
        assert_eq!(format_float(1.0), "1.0");
        assert_eq!(format_float(0.1), "0.1");
        assert_eq!(format_float(-2.5), "-2.5");
        assert_eq!(format_float(f64::INFINITY), "inf");
    }
}
