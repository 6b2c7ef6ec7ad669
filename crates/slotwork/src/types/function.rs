//! Function objects: host closures, native builtins and bound methods.

use std::{fmt, rc::Rc};

use crate::{
    args::ArgValues,
    error::{ExcType, RunResult},
    heap::HeapId,
    runtime::Runtime,
    suspension::{OpResult, Resumable},
    types::Payload,
    value::Value,
};

/// Body of a function defined by the embedding code engine.
pub type HostFn = Rc<dyn Fn(&mut Runtime, ArgValues) -> OpResult>;
/// Body of a builtin function.
pub type NativeFn = fn(&mut Runtime, ArgValues) -> OpResult;

#[derive(Clone)]
pub enum FunctionKind {
    Host(HostFn),
    Native(NativeFn),
}

impl fmt::Debug for FunctionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Host(_) => f.write_str("Host"),
            Self::Native(func) => write!(f, "Native@{:#x}", *func as usize),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Function {
    pub name: Rc<str>,
    pub kind: FunctionKind,
}

/// A callable paired with the receiver it was looked up on.
#[derive(Debug, Clone)]
pub struct BoundMethod {
    pub receiver: Value,
    pub func: Value,
}

impl Runtime {
    fn function_payload(&self, func: &Value) -> RunResult<Function> {
        match func.ref_id().and_then(|id| self.heap.payload(id)) {
            Some(Payload::Function(f)) => Ok(f.clone()),
            _ => Err(ExcType::type_error(format!(
                "expected a function, got '{}'",
                self.value_type_name(func)
            ))),
        }
    }

    fn bound_method_payload(&self, method: &Value) -> RunResult<BoundMethod> {
        match method.ref_id().and_then(|id| self.heap.payload(id)) {
            Some(Payload::BoundMethod(m)) => Ok(m.clone()),
            _ => Err(ExcType::type_error(format!(
                "expected a bound method, got '{}'",
                self.value_type_name(method)
            ))),
        }
    }

    /// Name of a function or builtin, `None` for anything else.
    #[must_use]
    pub fn function_name(&self, func: &Value) -> Option<Rc<str>> {
        match self.heap.payload(func.ref_id()?)? {
            Payload::Function(f) => Some(f.name.clone()),
            _ => None,
        }
    }
}

pub(crate) fn function_call(rt: &mut Runtime, func: &Value, args: ArgValues) -> OpResult {
    match rt.function_payload(func)?.kind {
        FunctionKind::Host(body) => body(rt, args),
        FunctionKind::Native(body) => body(rt, args),
    }
}

/// Functions found on a type bind to the instance they were looked up through.
pub(crate) fn function_descr_get(rt: &mut Runtime, func: &Value, instance: Option<&Value>, _owner: HeapId) -> OpResult {
    Ok(Resumable::Done(match instance {
        Some(instance) => rt.new_bound_method(instance.clone(), func.clone()),
        None => func.clone(),
    }))
}

pub(crate) fn function_repr(rt: &mut Runtime, func: &Value) -> OpResult<Rc<str>> {
    let name = rt.function_payload(func)?.name;
    let text = if rt.isinstance(func, rt.core.builtin_function) {
        format!("<built-in function {name}>")
    } else {
        format!("<function {name}>")
    };
    Ok(Resumable::Done(text.into()))
}

pub(crate) fn function_name_get(rt: &mut Runtime, func: &Value) -> RunResult<Value> {
    Ok(Value::Str(rt.function_payload(func)?.name))
}

pub(crate) fn method_call(rt: &mut Runtime, method: &Value, args: ArgValues) -> OpResult {
    let BoundMethod { receiver, func } = rt.bound_method_payload(method)?;
    rt.call(&func, args.prepend(receiver))
}

pub(crate) fn method_repr(rt: &mut Runtime, method: &Value) -> OpResult<Rc<str>> {
    let BoundMethod { receiver, func } = rt.bound_method_payload(method)?;
    let name = rt.function_name(&func).unwrap_or_else(|| rt.value_type_name(&func));
    rt.repr(&receiver)?
        .and_then(rt, move |_, receiver| {
            Ok(Resumable::Done(format!("<bound method {name} of {receiver}>").into()))
        })
}

pub(crate) fn method_self_get(rt: &mut Runtime, method: &Value) -> RunResult<Value> {
    Ok(rt.bound_method_payload(method)?.receiver)
}

pub(crate) fn method_func_get(rt: &mut Runtime, method: &Value) -> RunResult<Value> {
    Ok(rt.bound_method_payload(method)?.func)
}
