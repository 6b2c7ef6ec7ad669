//! User-level descriptors: `property`, `staticmethod` and `classmethod`.

use crate::{
    args::ArgValues,
    error::{ExcType, RunError, RunResult},
    heap::HeapId,
    runtime::Runtime,
    suspension::{OpResult, Resumable},
    types::{CallConvention, MethodDef, Payload},
    value::Value,
};

/// Accessor functions of a property; `Value::None` marks an absent one.
#[derive(Debug, Clone)]
pub struct Property {
    pub fget: Value,
    pub fset: Value,
    pub fdel: Value,
    pub doc: Value,
}

impl Runtime {
    fn property_payload(&self, prop: &Value) -> RunResult<Property> {
        match prop.ref_id().and_then(|id| self.heap.payload(id)) {
            Some(Payload::Property(p)) => Ok(p.clone()),
            _ => Err(ExcType::type_error(format!(
                "descriptor requires a 'property' object but received '{}'",
                self.value_type_name(prop)
            ))),
        }
    }

    fn property_payload_mut(&mut self, prop: &Value) -> RunResult<&mut Property> {
        let type_name = self.value_type_name(prop);
        match prop.ref_id().and_then(|id| self.heap.payload_mut(id)) {
            Some(Payload::Property(p)) => Ok(p),
            _ => Err(ExcType::type_error(format!(
                "descriptor requires a 'property' object but received '{type_name}'"
            ))),
        }
    }

    /// The wrapped callable of a staticmethod or classmethod.
    fn wrapped_callable(&self, wrapper: &Value) -> RunResult<Value> {
        match wrapper.ref_id().and_then(|id| self.heap.payload(id)) {
            Some(Payload::StaticMethod(func) | Payload::ClassMethod(func)) => Ok(func.clone()),
            _ => Err(ExcType::type_error(format!(
                "expected a staticmethod or classmethod, got '{}'",
                self.value_type_name(wrapper)
            ))),
        }
    }
}

// === property ===

pub(crate) fn property_new(rt: &mut Runtime, cls: HeapId, _args: ArgValues) -> OpResult {
    let empty = Property {
        fget: Value::None,
        fset: Value::None,
        fdel: Value::None,
        doc: Value::None,
    };
    Ok(Resumable::Done(rt.alloc_instance(cls, Payload::Property(empty))))
}

/// `property(fget=None, fset=None, fdel=None, doc=None)`
pub(crate) fn property_init(rt: &mut Runtime, prop: &Value, args: ArgValues) -> OpResult<()> {
    let (positional, kwargs) = args.into_parts();
    if positional.len() > 4 {
        return Err(ExcType::type_error(format!(
            "property() takes at most 4 arguments ({} given)",
            positional.len()
        )));
    }
    let mut accessors = [Value::None, Value::None, Value::None, Value::None];
    for (slot, value) in accessors.iter_mut().zip(positional) {
        *slot = value;
    }
    for (name, value) in kwargs {
        let index = match &*name {
            "fget" => 0,
            "fset" => 1,
            "fdel" => 2,
            "doc" => 3,
            other => {
                return Err(ExcType::type_error(format!(
                    "property() got an unexpected keyword argument '{other}'"
                )));
            }
        };
        accessors[index] = value;
    }
    let [fget, fset, fdel, doc] = accessors;
    *rt.property_payload_mut(prop)? = Property { fget, fset, fdel, doc };
    Ok(Resumable::Done(()))
}

pub(crate) fn property_descr_get(rt: &mut Runtime, prop: &Value, instance: Option<&Value>, _owner: HeapId) -> OpResult {
    let Some(instance) = instance else {
        return Ok(Resumable::Done(prop.clone()));
    };
    let fget = rt.property_payload(prop)?.fget;
    if fget.is_none() {
        return Err(RunError::new(ExcType::AttributeError, "unreadable attribute"));
    }
    rt.call(&fget, ArgValues::one(instance.clone()))
}

pub(crate) fn property_descr_set(rt: &mut Runtime, prop: &Value, instance: &Value, value: Option<Value>) -> OpResult<()> {
    let payload = rt.property_payload(prop)?;
    let result = match value {
        Some(value) if !payload.fset.is_none() => rt.call(&payload.fset, ArgValues::two(instance.clone(), value))?,
        None if !payload.fdel.is_none() => rt.call(&payload.fdel, ArgValues::one(instance.clone()))?,
        Some(_) => return Err(missing_accessor("set")),
        None => return Err(missing_accessor("delete")),
    };
    Ok(result.map(drop))
}

fn missing_accessor(action: &str) -> RunError {
    RunError::new(ExcType::AttributeError, format!("can't {action} attribute"))
}

/// Copy of a property with one accessor replaced, for `getter`/`setter`/`deleter`.
fn property_copy_with(rt: &mut Runtime, prop: &Value, index: usize, func: Value) -> OpResult {
    let mut copy = rt.property_payload(prop)?;
    match index {
        0 => copy.fget = func,
        1 => copy.fset = func,
        _ => copy.fdel = func,
    }
    let cls = rt.type_of(prop);
    Ok(Resumable::Done(rt.alloc_instance(cls, Payload::Property(copy))))
}

fn property_getter(rt: &mut Runtime, prop: &Value, args: ArgValues) -> OpResult {
    let func = args.get_one_arg("getter")?;
    property_copy_with(rt, prop, 0, func)
}

fn property_setter(rt: &mut Runtime, prop: &Value, args: ArgValues) -> OpResult {
    let func = args.get_one_arg("setter")?;
    property_copy_with(rt, prop, 1, func)
}

fn property_deleter(rt: &mut Runtime, prop: &Value, args: ArgValues) -> OpResult {
    let func = args.get_one_arg("deleter")?;
    property_copy_with(rt, prop, 2, func)
}

pub(crate) static PROPERTY_METHODS: [MethodDef; 3] = [
    MethodDef::new("getter", property_getter, CallConvention::OneArg)
        .with_doc("Descriptor to obtain a copy of the property with a different getter."),
    MethodDef::new("setter", property_setter, CallConvention::OneArg)
        .with_doc("Descriptor to obtain a copy of the property with a different setter."),
    MethodDef::new("deleter", property_deleter, CallConvention::OneArg)
        .with_doc("Descriptor to obtain a copy of the property with a different deleter."),
];

pub(crate) fn property_fget(rt: &mut Runtime, prop: &Value) -> RunResult<Value> {
    Ok(rt.property_payload(prop)?.fget)
}

pub(crate) fn property_fset(rt: &mut Runtime, prop: &Value) -> RunResult<Value> {
    Ok(rt.property_payload(prop)?.fset)
}

pub(crate) fn property_fdel(rt: &mut Runtime, prop: &Value) -> RunResult<Value> {
    Ok(rt.property_payload(prop)?.fdel)
}

// === staticmethod / classmethod ===

pub(crate) fn staticmethod_new(rt: &mut Runtime, cls: HeapId, _args: ArgValues) -> OpResult {
    Ok(Resumable::Done(rt.alloc_instance(cls, Payload::StaticMethod(Value::None))))
}

pub(crate) fn classmethod_new(rt: &mut Runtime, cls: HeapId, _args: ArgValues) -> OpResult {
    Ok(Resumable::Done(rt.alloc_instance(cls, Payload::ClassMethod(Value::None))))
}

/// Shared `__init__` of staticmethod and classmethod: stores the wrapped callable.
pub(crate) fn wrapper_init(rt: &mut Runtime, wrapper: &Value, args: ArgValues) -> OpResult<()> {
    let type_name = rt.value_type_name(wrapper);
    let func = args.get_one_arg(&type_name)?;
    match wrapper.ref_id().and_then(|id| rt.heap.payload_mut(id)) {
        Some(Payload::StaticMethod(slot) | Payload::ClassMethod(slot)) => *slot = func,
        _ => return Err(ExcType::type_error(format!("'{type_name}' is not a method wrapper"))),
    }
    Ok(Resumable::Done(()))
}

pub(crate) fn staticmethod_descr_get(rt: &mut Runtime, wrapper: &Value, _instance: Option<&Value>, _owner: HeapId) -> OpResult {
    Ok(Resumable::Done(rt.wrapped_callable(wrapper)?))
}

pub(crate) fn classmethod_descr_get(rt: &mut Runtime, wrapper: &Value, _instance: Option<&Value>, owner: HeapId) -> OpResult {
    let func = rt.wrapped_callable(wrapper)?;
    Ok(Resumable::Done(rt.new_bound_method(Value::Ref(owner), func)))
}

pub(crate) fn wrapped_func_get(rt: &mut Runtime, wrapper: &Value) -> RunResult<Value> {
    rt.wrapped_callable(wrapper)
}
