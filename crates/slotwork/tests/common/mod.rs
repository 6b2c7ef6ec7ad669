//! Helpers shared by the integration tests.

use slotwork::{ArgValues, OpResult, Resumable, RunError, Runtime, Value};

/// Unwraps an operation that must complete synchronously.
pub fn sync<T: 'static>(result: OpResult<T>) -> T {
    match result.expect("operation failed") {
        Resumable::Done(value) => value,
        Resumable::Suspended(s) => panic!("unexpected suspension: {s:?}"),
    }
}

/// Unwraps the error of an operation that must fail synchronously.
pub fn sync_err<T: 'static>(result: OpResult<T>) -> RunError {
    match result {
        Err(err) => err,
        Ok(_) => panic!("expected the operation to fail"),
    }
}

/// `type(name, bases, namespace)`
pub fn class(rt: &mut Runtime, name: &str, bases: &[Value], attrs: Vec<(&str, Value)>) -> Value {
    let namespace = rt.new_namespace(attrs);
    let bases = rt.new_tuple(bases.to_vec());
    let meta = Value::Ref(rt.core().type_);
    sync(rt.call(&meta, ArgValues::new([Value::str(name), bases, namespace])))
}
