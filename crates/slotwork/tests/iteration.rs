//! Tests for the iteration protocol: native iterators, the `__getitem__`
//! sequence fallback and user-defined iterators.

mod common;

use common::{class, sync, sync_err};
use pretty_assertions::assert_eq;
use slotwork::{ArgValues, ExcType, Resumable, RunError, Runtime, Value};

fn ints(values: &[Value]) -> Vec<Option<i64>> {
    values.iter().map(Value::as_int).collect()
}

// =============================================================================
// Native containers
// =============================================================================

#[test]
fn collect_list_and_tuple() {
    let mut rt = Runtime::default();
    let list = rt.new_list(vec![Value::Int(1), Value::Int(2)]);
    let tuple = rt.new_tuple(vec![Value::Int(3)]);
    assert_eq!(ints(&sync(rt.collect(&list))), vec![Some(1), Some(2)]);
    assert_eq!(ints(&sync(rt.collect(&tuple))), vec![Some(3)]);
}

/// Dict iteration yields keys in insertion order.
#[test]
fn dict_iterates_keys_in_order() {
    let mut rt = Runtime::default();
    let dict = rt.new_dict();
    rt.dict_set(&dict, Value::str("b"), Value::Int(2)).unwrap();
    rt.dict_set(&dict, Value::str("a"), Value::Int(1)).unwrap();
    let keys = sync(rt.collect(&dict));
    let keys: Vec<Option<&str>> = keys.iter().map(Value::as_str).collect();
    assert_eq!(keys, vec![Some("b"), Some("a")]);
}

/// Adding a key while iterating a dict is an error on the next step.
#[test]
fn dict_size_change_during_iteration() {
    let mut rt = Runtime::default();
    let dict = rt.new_dict();
    rt.dict_set(&dict, Value::str("a"), Value::Int(1)).unwrap();
    let iterator = sync(rt.get_iter(&dict));
    assert!(sync(rt.iter_next(&iterator)).is_some());

    rt.dict_set(&dict, Value::str("b"), Value::Int(2)).unwrap();
    let err = sync_err(rt.iter_next(&iterator));
    assert!(err.is(ExcType::RuntimeError));
    assert_eq!(err.message(), "dictionary changed size during iteration");
}

/// Replacing a value keeps the iterator valid.
#[test]
fn dict_value_update_during_iteration() {
    let mut rt = Runtime::default();
    let dict = rt.new_dict();
    rt.dict_set(&dict, Value::str("a"), Value::Int(1)).unwrap();
    rt.dict_set(&dict, Value::str("b"), Value::Int(2)).unwrap();
    let iterator = sync(rt.get_iter(&dict));
    sync(rt.iter_next(&iterator));
    rt.dict_set(&dict, Value::str("a"), Value::Int(10)).unwrap();
    assert_eq!(sync(rt.iter_next(&iterator)).and_then(|k| k.as_str().map(str::to_owned)), Some("b".to_owned()));
    assert!(sync(rt.iter_next(&iterator)).is_none());
}

/// A list iterator sees items appended while it runs.
#[test]
fn list_iterator_sees_appends() {
    let mut rt = Runtime::default();
    let list = rt.new_list(vec![Value::Int(1)]);
    let iterator = sync(rt.get_iter(&list));
    assert!(sync(rt.iter_next(&iterator)).is_some());
    sync(rt.invoke_method(&list, "append", ArgValues::one(Value::Int(2))));
    assert_eq!(sync(rt.iter_next(&iterator)).and_then(|v| v.as_int()), Some(2));
    assert!(sync(rt.iter_next(&iterator)).is_none());
    // exhausted iterators stay exhausted
    sync(rt.invoke_method(&list, "append", ArgValues::one(Value::Int(3))));
    assert!(sync(rt.iter_next(&iterator)).is_none());
}

#[test]
fn int_is_not_iterable() {
    let mut rt = Runtime::default();
    let err = sync_err(rt.get_iter(&Value::Int(1)));
    assert!(err.is(ExcType::TypeError));
    assert_eq!(err.message(), "'int' object is not iterable");
}

// =============================================================================
// User-defined protocols
// =============================================================================

/// A class with only `__getitem__` iterates until IndexError.
#[test]
fn getitem_sequence_iteration() {
    let mut rt = Runtime::default();
    let getitem = rt.new_function("__getitem__", |_, args| {
        let (_, index) = args.get_two_args("__getitem__")?;
        match index.as_int() {
            Some(i) if i < 3 => Ok(Resumable::Done(Value::Int(i * 10))),
            _ => Err(RunError::new(ExcType::IndexError, "index out of range")),
        }
    });
    let cls = class(&mut rt, "Tens", &[], vec![("__getitem__", getitem)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));

    assert_eq!(ints(&sync(rt.collect(&obj))), vec![Some(0), Some(10), Some(20)]);
    assert!(sync(rt.contains(&obj, &Value::Int(20))));
    assert!(!sync(rt.contains(&obj, &Value::Int(30))));
}

/// Errors other than IndexError escape the sequence iterator.
#[test]
fn getitem_iteration_propagates_other_errors() {
    let mut rt = Runtime::default();
    let getitem = rt.new_function("__getitem__", |_, _| Err(RunError::new(ExcType::KeyError, "missing")));
    let cls = class(&mut rt, "Broken", &[], vec![("__getitem__", getitem)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));
    assert!(sync_err(rt.collect(&obj)).is(ExcType::KeyError));
}

/// `__iter__` must hand back something with `__next__`.
#[test]
fn iter_must_return_an_iterator() {
    let mut rt = Runtime::default();
    let iter = rt.new_function("__iter__", |_, _| Ok(Resumable::Done(Value::Int(5))));
    let cls = class(&mut rt, "Liar", &[], vec![("__iter__", iter)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));
    let err = sync_err(rt.get_iter(&obj));
    assert_eq!(err.message(), "iter() returned non-iterator of type 'int'");
}

/// A user iterator ends on StopIteration.
#[test]
fn user_iterator_with_countdown() {
    let mut rt = Runtime::default();
    let iter = rt.new_function("__iter__", |_, args| Ok(Resumable::Done(args.get_one_arg("__iter__")?)));
    let next = rt.new_function("__next__", |rt, args| {
        let this = args.get_one_arg("__next__")?;
        let left = rt.get_attribute(&this, "left")?.done().and_then(|v| v.as_int()).unwrap_or(0);
        if left == 0 {
            return Err(RunError::new(ExcType::StopIteration, ""));
        }
        rt.set_attribute(&this, "left", Value::Int(left - 1))?;
        Ok(Resumable::Done(Value::Int(left)))
    });
    let cls = class(&mut rt, "Countdown", &[], vec![("__iter__", iter), ("__next__", next)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));
    sync(rt.set_attribute(&obj, "left", Value::Int(3)));

    assert_eq!(ints(&sync(rt.collect(&obj))), vec![Some(3), Some(2), Some(1)]);
}

/// Subscripting a class without `__getitem__` goes to `__class_getitem__`.
#[test]
fn class_getitem_on_the_class() {
    let mut rt = Runtime::default();
    let hook = rt.new_function("__class_getitem__", |rt, args| {
        let (cls, item) = args.get_two_args("__class_getitem__")?;
        let name = rt.get_attribute(&cls, "__name__")?.done().unwrap_or(Value::None);
        Ok(Resumable::Done(rt.new_tuple(vec![name, item])))
    });
    let cls = class(&mut rt, "Generic", &[], vec![("__class_getitem__", hook)]);

    let alias = sync(rt.get_item(&cls, &Value::Int(1)));
    let items = rt.tuple_items(&alias).unwrap();
    assert_eq!(items[0].as_str(), Some("Generic"));
    assert_eq!(items[1].as_int(), Some(1));

    let obj = sync(rt.call(&cls, ArgValues::empty()));
    let err = sync_err(rt.get_item(&obj, &Value::Int(1)));
    assert_eq!(err.message(), "'Generic' object is not subscriptable");
}
