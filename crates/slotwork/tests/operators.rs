//! Tests for binary, unary and comparison dispatch.
//!
//! The interesting cases are about which implementation runs: forward or
//! reflected, in which order, and what happens when every candidate answers
//! `NotImplemented`.

mod common;

use common::{class, sync, sync_err};
use pretty_assertions::assert_eq;
use slotwork::{ArgValues, BinaryOp, CompareOp, ExcType, Resumable, Runtime, UnaryOp, Value};

/// A method that reports which implementation ran.
fn tag(rt: &mut Runtime, name: &str, label: &'static str) -> Value {
    rt.new_function(name, move |_, _| Ok(Resumable::Done(Value::str(label))))
}

// ============================================================================
// Built-in arithmetic
// ============================================================================

/// Integer arithmetic follows floor semantics and widens to float where needed.
#[test]
fn int_arithmetic() {
    let mut rt = Runtime::default();
    let cases = [
        (BinaryOp::Add, 7, 3, Value::Int(10)),
        (BinaryOp::Sub, 7, 3, Value::Int(4)),
        (BinaryOp::FloorDiv, -7, 2, Value::Int(-4)),
        (BinaryOp::Mod, -7, 2, Value::Int(1)),
        (BinaryOp::TrueDiv, 7, 2, Value::Float(3.5)),
        (BinaryOp::LShift, 1, 4, Value::Int(16)),
    ];
    for (op, a, b, expected) in cases {
        let result = sync(rt.binary_op(&Value::Int(a), &Value::Int(b), op));
        assert!(result.is(&expected), "{a} {} {b} gave {result:?}", op.symbol());
    }
}

/// Mixed int and float operands are handled by float's reflected slot.
#[test]
fn int_plus_float_uses_reflected_float() {
    let mut rt = Runtime::default();
    let result = sync(rt.binary_op(&Value::Int(1), &Value::Float(2.5), BinaryOp::Add));
    assert_eq!(rt.float_of(&result), Some(3.5));
}

/// Division by zero raises ZeroDivisionError.
#[test]
fn division_by_zero() {
    let mut rt = Runtime::default();
    let err = sync_err(rt.binary_op(&Value::Int(1), &Value::Int(0), BinaryOp::FloorDiv));
    assert!(err.is(ExcType::ZeroDivisionError));
    assert!(err.is(ExcType::ArithmeticError));
}

/// Overflowing the integer range raises OverflowError rather than wrapping.
#[test]
fn integer_overflow() {
    let mut rt = Runtime::default();
    let err = sync_err(rt.binary_op(&Value::Int(i64::MAX), &Value::Int(1), BinaryOp::Add));
    assert!(err.is(ExcType::OverflowError));
}

/// Strings concatenate; mixing with an int is unsupported.
#[test]
fn str_concat_and_unsupported_mix() {
    let mut rt = Runtime::default();
    let joined = sync(rt.binary_op(&Value::str("ab"), &Value::str("cd"), BinaryOp::Add));
    assert_eq!(joined.as_str(), Some("abcd"));

    let err = sync_err(rt.binary_op(&Value::str("ab"), &Value::Int(1), BinaryOp::Add));
    assert!(err.is(ExcType::TypeError));
    assert_eq!(err.message(), "unsupported operand type(s) for +: 'str' and 'int'");
}

// ============================================================================
// User-defined operators
// ============================================================================

/// A reflected method on the right operand runs when the left one declines.
#[test]
fn reflected_method_runs_when_forward_declines() {
    let mut rt = Runtime::default();
    let radd = tag(&mut rt, "__radd__", "money.__radd__");
    let money = class(&mut rt, "Money", &[], vec![("__radd__", radd)]);
    let m = sync(rt.call(&money, ArgValues::empty()));

    let result = sync(rt.binary_op(&Value::Int(1), &m, BinaryOp::Add));
    assert_eq!(result.as_str(), Some("money.__radd__"));
}

/// The reflected method receives the right operand as `self` and the left as `other`.
#[test]
fn reflected_method_argument_order() {
    let mut rt = Runtime::default();
    let rsub = rt.new_function("__rsub__", |rt, args| {
        let (this, other) = args.get_two_args("__rsub__")?;
        let marker = rt.get_attribute(&this, "marker")?.done().expect("sync");
        Ok(Resumable::Done(rt.new_tuple(vec![marker, other])))
    });
    let cls = class(&mut rt, "Right", &[], vec![("__rsub__", rsub), ("marker", Value::str("right"))]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));

    let result = sync(rt.binary_op(&Value::Int(10), &obj, BinaryOp::Sub));
    let items = rt.tuple_items(&result).unwrap();
    assert_eq!(items[0].as_str(), Some("right"));
    assert_eq!(items[1].as_int(), Some(10));
}

/// A subclass that overrides the reflected method gets priority over the left operand.
#[test]
fn subclass_reflected_method_goes_first() {
    let mut rt = Runtime::default();
    let base_add = tag(&mut rt, "__add__", "base.__add__");
    let base_radd = tag(&mut rt, "__radd__", "base.__radd__");
    let sub_radd = tag(&mut rt, "__radd__", "sub.__radd__");
    let base = class(&mut rt, "Base", &[], vec![("__add__", base_add), ("__radd__", base_radd)]);
    let sub = class(&mut rt, "Sub", &[base.clone()], vec![("__radd__", sub_radd)]);
    let b = sync(rt.call(&base, ArgValues::empty()));
    let s = sync(rt.call(&sub, ArgValues::empty()));

    assert_eq!(sync(rt.binary_op(&b, &s, BinaryOp::Add)).as_str(), Some("sub.__radd__"));
}

/// A subclass that merely inherits the reflected method does not jump the queue.
#[test]
fn inherited_reflected_method_does_not_go_first() {
    let mut rt = Runtime::default();
    let base_add = tag(&mut rt, "__add__", "base.__add__");
    let base_radd = tag(&mut rt, "__radd__", "base.__radd__");
    let base = class(&mut rt, "Base", &[], vec![("__add__", base_add), ("__radd__", base_radd)]);
    let sub = class(&mut rt, "Sub", &[base.clone()], vec![]);
    let b = sync(rt.call(&base, ArgValues::empty()));
    let s = sync(rt.call(&sub, ArgValues::empty()));

    assert_eq!(sync(rt.binary_op(&b, &s, BinaryOp::Add)).as_str(), Some("base.__add__"));
}

/// Siblings sharing an inherited reflected method still fall back to it once the forward side has none.
#[test]
fn sibling_falls_back_to_shared_reflected_method() {
    let mut rt = Runtime::default();
    let radd = tag(&mut rt, "__radd__", "c.radd");
    let c = class(&mut rt, "C", &[], vec![("__radd__", radd)]);
    let a = class(&mut rt, "A", &[c.clone()], vec![]);
    let b = class(&mut rt, "B", &[c], vec![]);
    let left = sync(rt.call(&a, ArgValues::empty()));
    let right = sync(rt.call(&b, ArgValues::empty()));

    assert_eq!(sync(rt.binary_op(&left, &right, BinaryOp::Add)).as_str(), Some("c.radd"));
}

/// A prioritized reflected method that declines is not retried after the forward one declines too.
#[test]
fn declined_reflected_method_runs_once() {
    let mut rt = Runtime::default();
    let calls = std::rc::Rc::new(std::cell::Cell::new(0));
    let counter = std::rc::Rc::clone(&calls);
    let sub_radd = rt.new_function("__radd__", move |_, _| {
        counter.set(counter.get() + 1);
        Ok(Resumable::Done(Value::NotImplemented))
    });
    let base_add = rt.new_function("__add__", |_, _| Ok(Resumable::Done(Value::NotImplemented)));
    let base = class(&mut rt, "Base", &[], vec![("__add__", base_add)]);
    let sub = class(&mut rt, "Sub", &[base.clone()], vec![("__radd__", sub_radd)]);
    let b = sync(rt.call(&base, ArgValues::empty()));
    let s = sync(rt.call(&sub, ArgValues::empty()));

    let err = sync_err(rt.binary_op(&b, &s, BinaryOp::Add));
    assert_eq!(err.message(), "unsupported operand type(s) for +: 'Base' and 'Sub'");
    assert_eq!(calls.get(), 1);
}

/// Two operands of the same type never try the reflected method.
#[test]
fn same_type_skips_reflected() {
    let mut rt = Runtime::default();
    let add = rt.new_function("__add__", |_, _| Ok(Resumable::Done(Value::NotImplemented)));
    let radd = tag(&mut rt, "__radd__", "never");
    let cls = class(&mut rt, "Lonely", &[], vec![("__add__", add), ("__radd__", radd)]);
    let a = sync(rt.call(&cls, ArgValues::empty()));
    let b = sync(rt.call(&cls, ArgValues::empty()));

    let err = sync_err(rt.binary_op(&a, &b, BinaryOp::Add));
    assert_eq!(err.message(), "unsupported operand type(s) for +: 'Lonely' and 'Lonely'");
}

/// Setting a dunder to None blocks the operation instead of inheriting it.
#[test]
fn none_blocks_an_inherited_operator() {
    let mut rt = Runtime::default();
    let neg = tag(&mut rt, "__neg__", "negated");
    let base = class(&mut rt, "Signed", &[], vec![("__neg__", neg)]);
    let sub = class(&mut rt, "Unsigned", &[base], vec![("__neg__", Value::None)]);
    let obj = sync(rt.call(&sub, ArgValues::empty()));

    let err = sync_err(rt.unary_op(&obj, UnaryOp::Neg));
    assert!(err.is(ExcType::TypeError));
}

/// `+=` prefers the in-place method and falls back to `+`.
#[test]
fn inplace_falls_back_to_binary() {
    let mut rt = Runtime::default();
    let list = rt.new_list(vec![Value::Int(1)]);
    let extra = rt.new_list(vec![Value::Int(2)]);
    let same = sync(rt.inplace_op(&list, &extra, BinaryOp::Add));
    assert!(same.is(&list));
    assert_eq!(rt.list_items(&list).unwrap().len(), 2);

    let add = tag(&mut rt, "__add__", "plain add");
    let cls = class(&mut rt, "OnlyAdd", &[], vec![("__add__", add)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));
    assert_eq!(sync(rt.inplace_op(&obj, &Value::Int(1), BinaryOp::Add)).as_str(), Some("plain add"));
}

// ============================================================================
// Unary operators and truthiness
// ============================================================================

#[test]
fn unary_int() {
    let mut rt = Runtime::default();
    assert_eq!(sync(rt.unary_op(&Value::Int(5), UnaryOp::Neg)).as_int(), Some(-5));
    assert_eq!(sync(rt.unary_op(&Value::Int(-5), UnaryOp::Abs)).as_int(), Some(5));
    assert_eq!(sync(rt.unary_op(&Value::Int(0), UnaryOp::Invert)).as_int(), Some(-1));
    assert!(sync(rt.unary_op(&Value::Int(0), UnaryOp::Not)).is(&Value::Bool(true)));
}

/// `__bool__` wins over `__len__`; `__len__` is used when `__bool__` is absent.
#[test]
fn truthiness_hooks() {
    let mut rt = Runtime::default();
    let empty_len = rt.new_function("__len__", |_, _| Ok(Resumable::Done(Value::Int(0))));
    let sized = class(&mut rt, "Sized", &[], vec![("__len__", empty_len)]);
    let obj = sync(rt.call(&sized, ArgValues::empty()));
    assert!(!sync(rt.is_true(&obj)));

    let always = rt.new_function("__bool__", |_, _| Ok(Resumable::Done(Value::Bool(true))));
    let both = class(&mut rt, "Both", &[sized], vec![("__bool__", always)]);
    let obj = sync(rt.call(&both, ArgValues::empty()));
    assert!(sync(rt.is_true(&obj)));
}

/// `__bool__` must return a bool.
#[test]
fn bool_hook_result_is_checked() {
    let mut rt = Runtime::default();
    let wrong = rt.new_function("__bool__", |_, _| Ok(Resumable::Done(Value::Int(1))));
    let cls = class(&mut rt, "Wrong", &[], vec![("__bool__", wrong)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));
    assert!(sync_err(rt.is_true(&obj)).is(ExcType::TypeError));
}

// ============================================================================
// Comparisons
// ============================================================================

/// Equality without `__eq__` falls back to identity.
#[test]
fn eq_falls_back_to_identity() {
    let mut rt = Runtime::default();
    let cls = class(&mut rt, "Plain", &[], vec![]);
    let a = sync(rt.call(&cls, ArgValues::empty()));
    let b = sync(rt.call(&cls, ArgValues::empty()));

    assert!(sync(rt.compare_bool(&a, &a, CompareOp::Eq)));
    assert!(!sync(rt.compare_bool(&a, &b, CompareOp::Eq)));
    assert!(sync(rt.compare_bool(&a, &b, CompareOp::Ne)));
}

/// Ordering between unrelated objects raises TypeError.
#[test]
fn ordering_without_hooks_raises() {
    let mut rt = Runtime::default();
    let cls = class(&mut rt, "Plain", &[], vec![]);
    let a = sync(rt.call(&cls, ArgValues::empty()));

    let err = sync_err(rt.compare(&a, &Value::Int(1), CompareOp::Lt));
    assert!(err.is(ExcType::TypeError));
    assert_eq!(err.message(), "'<' not supported between instances of 'Plain' and 'int'");
}

/// `a < b` falls back to `b > a`.
#[test]
fn comparison_uses_swapped_operator() {
    let mut rt = Runtime::default();
    let gt = tag(&mut rt, "__gt__", "swapped gt");
    let cls = class(&mut rt, "Big", &[], vec![("__gt__", gt)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));

    let result = sync(rt.compare(&Value::Int(1), &obj, CompareOp::Lt));
    assert_eq!(result.as_str(), Some("swapped gt"));
}

#[test]
fn numeric_comparisons() {
    let mut rt = Runtime::default();
    assert!(sync(rt.compare_bool(&Value::Int(1), &Value::Int(2), CompareOp::Lt)));
    assert!(sync(rt.compare_bool(&Value::Int(2), &Value::Float(2.0), CompareOp::Eq)));
    assert!(sync(rt.compare_bool(&Value::Bool(true), &Value::Int(1), CompareOp::Eq)));
    assert!(!sync(rt.compare_bool(&Value::str("a"), &Value::str("b"), CompareOp::Ge)));
}

/// Membership uses `__contains__`, else scans the iterator.
#[test]
fn membership() {
    let mut rt = Runtime::default();
    let list = rt.new_list(vec![Value::Int(1), Value::Int(2)]);
    assert!(sync(rt.contains(&list, &Value::Int(2))));
    assert!(sync(rt.compare_bool(&Value::Int(3), &list, CompareOp::NotIn)));

    let err = sync_err(rt.contains(&Value::Int(1), &Value::Int(1)));
    assert_eq!(err.message(), "argument of type 'int' is not iterable");
}

// ============================================================================
// Hashing
// ============================================================================

/// Equal numbers hash equally across int, float and bool.
#[test]
fn numeric_hash_consistency() {
    let mut rt = Runtime::default();
    let from_int = sync(rt.hash(&Value::Int(1)));
    let from_float = sync(rt.hash(&Value::Float(1.0)));
    let from_bool = sync(rt.hash(&Value::Bool(true)));
    assert_eq!(from_int, from_float);
    assert_eq!(from_int, from_bool);
}

#[test]
fn list_is_unhashable() {
    let mut rt = Runtime::default();
    let list = rt.new_list(vec![]);
    assert_eq!(sync_err(rt.hash(&list)).message(), "unhashable type: 'list'");
}
