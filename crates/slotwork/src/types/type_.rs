//! `type`: the default metatype. Calling a type runs two-phase construction.

use std::rc::Rc;

use crate::{
    args::ArgValues,
    error::{ExcType, RunResult},
    heap::HeapId,
    runtime::Runtime,
    slots::SlotId,
    suspension::{OpResult, Resumable},
    types::{CallConvention, GetSetDef, MethodDef, TypeFlags},
    value::Value,
};

impl Runtime {
    fn expect_type(&self, value: &Value) -> RunResult<HeapId> {
        self.as_type(value).ok_or_else(|| {
            ExcType::type_error(format!(
                "descriptor requires a 'type' object but received '{}'",
                self.value_type_name(value)
            ))
        })
    }

    /// Calls `cls`: `__new__` produces the instance, then `__init__` runs on it
    /// if the instance is an instance of `cls`.
    pub(crate) fn construct(&mut self, cls: HeapId, args: ArgValues) -> OpResult {
        let Some(new_slot) = self.resolve_slot(cls, SlotId::New) else {
            return Err(ExcType::type_error(format!(
                "cannot create '{}' instances",
                self.type_name(cls)
            )));
        };
        let init_args = args.clone();
        self.invoke_new_slot(&new_slot, cls, args)?.and_then(self, move |rt, obj| {
            if !rt.isinstance(&obj, cls) {
                return Ok(Resumable::Done(obj));
            }
            let Some(init) = rt.resolve_slot(rt.type_of(&obj), SlotId::Init) else {
                return Ok(Resumable::Done(obj));
            };
            Ok(rt.invoke_init_slot(&init, &obj, init_args)?.map(move |()| obj))
        })
    }
}

/// `type.__call__`. `type(x)` with exactly one argument returns the type of `x`.
pub(crate) fn type_call(rt: &mut Runtime, callable: &Value, args: ArgValues) -> OpResult {
    let cls = rt.expect_type(callable)?;
    if cls == rt.core.type_ && args.len() == 1 && !args.has_kwargs() {
        let obj = args.get_one_arg("type")?;
        return Ok(Resumable::Done(Value::Ref(rt.type_of(&obj))));
    }
    rt.construct(cls, args)
}

/// `type.__new__(meta, name, bases, namespace, **kwargs)`
pub(crate) fn type_new(rt: &mut Runtime, meta: HeapId, args: ArgValues) -> OpResult {
    if meta == rt.core.type_ && args.len() == 1 && !args.has_kwargs() {
        let obj = args.get_one_arg("type")?;
        return Ok(Resumable::Done(Value::Ref(rt.type_of(&obj))));
    }
    let (positional, kwargs) = args.into_parts();
    let Ok([name, bases, namespace]) = <[Value; 3]>::try_from(positional.into_vec()) else {
        return Err(ExcType::type_error("type() takes 1 or 3 arguments"));
    };
    rt.type_new_from_parts(meta, &name, &bases, &namespace, kwargs)
}

/// `type.__init__` only validates the argument count.
pub(crate) fn type_init(_rt: &mut Runtime, _cls: &Value, args: ArgValues) -> OpResult<()> {
    if args.len() != 1 && args.len() != 3 {
        return Err(ExcType::type_error("type.__init__() takes 1 or 3 arguments"));
    }
    if args.len() == 1 && args.has_kwargs() {
        return Err(ExcType::type_error("type.__init__() takes no keyword arguments"));
    }
    Ok(Resumable::Done(()))
}

pub(crate) fn type_repr(rt: &mut Runtime, cls: &Value) -> OpResult<Rc<str>> {
    let id = rt.expect_type(cls)?;
    let module = match rt.type_dict_get(id, "__module__").and_then(|m| rt.str_of(&m)) {
        Some(module) if &*module != "builtins" => format!("{module}."),
        _ => String::new(),
    };
    let qualname = rt.type_object(id).map_or_else(|| rt.type_name(id), |t| t.qualname.clone());
    Ok(Resumable::Done(format!("<class '{module}{qualname}'>").into()))
}

fn check_heap_type(rt: &Runtime, id: HeapId, attr: &str) -> RunResult<()> {
    if rt.type_flags(id).contains(TypeFlags::HEAPTYPE) {
        Ok(())
    } else {
        Err(ExcType::type_error(format!(
            "cannot set '{attr}' attribute of immutable type '{}'",
            rt.type_name(id)
        )))
    }
}

fn string_value(rt: &Runtime, value: Option<Value>, id: HeapId, attr: &str) -> RunResult<Rc<str>> {
    let Some(value) = value else {
        return Err(ExcType::type_error(format!(
            "cannot delete '{attr}' attribute of type '{}'",
            rt.type_name(id)
        )));
    };
    rt.str_of(&value).ok_or_else(|| {
        ExcType::type_error(format!(
            "can only assign string to {}.{attr}, not '{}'",
            rt.type_name(id),
            rt.value_type_name(&value)
        ))
    })
}

fn type_name_get(rt: &mut Runtime, cls: &Value) -> RunResult<Value> {
    let id = rt.expect_type(cls)?;
    Ok(Value::Str(rt.type_name(id)))
}

fn type_name_set(rt: &mut Runtime, cls: &Value, value: Option<Value>) -> RunResult<()> {
    let id = rt.expect_type(cls)?;
    check_heap_type(rt, id, "__name__")?;
    let name = string_value(rt, value, id, "__name__")?;
    if let Some(t) = rt.heap.type_obj_mut(id) {
        t.name = name;
    }
    Ok(())
}

fn type_qualname_get(rt: &mut Runtime, cls: &Value) -> RunResult<Value> {
    let id = rt.expect_type(cls)?;
    Ok(rt.type_object(id).map_or(Value::None, |t| Value::Str(t.qualname.clone())))
}

fn type_qualname_set(rt: &mut Runtime, cls: &Value, value: Option<Value>) -> RunResult<()> {
    let id = rt.expect_type(cls)?;
    check_heap_type(rt, id, "__qualname__")?;
    let qualname = string_value(rt, value, id, "__qualname__")?;
    if let Some(t) = rt.heap.type_obj_mut(id) {
        t.qualname = qualname;
    }
    Ok(())
}

fn type_module_get(rt: &mut Runtime, cls: &Value) -> RunResult<Value> {
    let id = rt.expect_type(cls)?;
    Ok(rt.type_dict_get(id, "__module__").unwrap_or_else(|| Value::str("builtins")))
}

fn type_module_set(rt: &mut Runtime, cls: &Value, value: Option<Value>) -> RunResult<()> {
    let id = rt.expect_type(cls)?;
    check_heap_type(rt, id, "__module__")?;
    let module = string_value(rt, value, id, "__module__")?;
    if let Some(t) = rt.heap.type_obj_mut(id) {
        t.dict.insert_str("__module__", Value::Str(module));
    }
    Ok(())
}

fn type_mro_get(rt: &mut Runtime, cls: &Value) -> RunResult<Value> {
    let id = rt.expect_type(cls)?;
    let items = rt.mro_of(id).iter().copied().map(Value::Ref).collect();
    Ok(rt.new_tuple(items))
}

fn type_bases_get(rt: &mut Runtime, cls: &Value) -> RunResult<Value> {
    let id = rt.expect_type(cls)?;
    let items = rt
        .type_object(id)
        .map(|t| t.bases.iter().copied().map(Value::Ref).collect())
        .unwrap_or_default();
    Ok(rt.new_tuple(items))
}

fn type_bases_set(rt: &mut Runtime, cls: &Value, value: Option<Value>) -> RunResult<()> {
    let id = rt.expect_type(cls)?;
    check_heap_type(rt, id, "__bases__")?;
    let Some(value) = value else {
        return Err(ExcType::type_error(format!(
            "cannot delete '__bases__' attribute of type '{}'",
            rt.type_name(id)
        )));
    };
    let Some(items) = rt.tuple_items(&value) else {
        return Err(ExcType::type_error(format!(
            "can only assign tuple to {}.__bases__, not {}",
            rt.type_name(id),
            rt.value_type_name(&value)
        )));
    };
    let mut bases = Vec::with_capacity(items.len());
    for item in &items {
        let Some(base) = rt.as_type(item) else {
            return Err(ExcType::type_error(format!(
                "{}.__bases__ must be tuple of classes, not '{}'",
                rt.type_name(id),
                rt.value_type_name(item)
            )));
        };
        bases.push(base);
    }
    rt.set_bases(id, bases)
}

fn type_base_get(rt: &mut Runtime, cls: &Value) -> RunResult<Value> {
    let id = rt.expect_type(cls)?;
    Ok(rt
        .type_object(id)
        .and_then(|t| t.base)
        .map_or(Value::None, Value::Ref))
}

/// `__dict__` of a type: a snapshot copy of its namespace.
fn type_dict_get(rt: &mut Runtime, cls: &Value) -> RunResult<Value> {
    let id = rt.expect_type(cls)?;
    let entries: Vec<(Value, Value)> = rt
        .type_object(id)
        .map(|t| t.dict.iter().map(|(k, v)| (k.clone(), v.clone())).collect())
        .unwrap_or_default();
    let dict = rt.new_dict();
    for (key, value) in entries {
        rt.dict_set(&dict, key, value)?;
    }
    Ok(dict)
}

fn type_doc_get(rt: &mut Runtime, cls: &Value) -> RunResult<Value> {
    let id = rt.expect_type(cls)?;
    Ok(rt.type_dict_get(id, "__doc__").unwrap_or(Value::None))
}

pub(crate) static TYPE_GETSETS: [GetSetDef; 8] = [
    GetSetDef::new("__name__", type_name_get).with_setter(type_name_set),
    GetSetDef::new("__qualname__", type_qualname_get).with_setter(type_qualname_set),
    GetSetDef::new("__module__", type_module_get).with_setter(type_module_set),
    GetSetDef::new("__mro__", type_mro_get),
    GetSetDef::new("__bases__", type_bases_get).with_setter(type_bases_set),
    GetSetDef::new("__base__", type_base_get),
    GetSetDef::new("__dict__", type_dict_get),
    GetSetDef::new("__doc__", type_doc_get),
];

fn type_mro(rt: &mut Runtime, cls: &Value, _args: ArgValues) -> OpResult {
    let id = rt.expect_type(cls)?;
    let items = rt.mro_of(id).iter().copied().map(Value::Ref).collect();
    Ok(Resumable::Done(rt.new_list(items)))
}

fn type_subclasses(rt: &mut Runtime, cls: &Value, _args: ArgValues) -> OpResult {
    let id = rt.expect_type(cls)?;
    let items = rt
        .type_object(id)
        .map(|t| t.subclasses.iter().copied().map(Value::Ref).collect())
        .unwrap_or_default();
    Ok(Resumable::Done(rt.new_list(items)))
}

pub(crate) static TYPE_METHODS: [MethodDef; 2] = [
    MethodDef::new("mro", type_mro, CallConvention::NoArgs).with_doc("Return a type's method resolution order."),
    MethodDef::new("__subclasses__", type_subclasses, CallConvention::NoArgs)
        .with_doc("Return a list of immediate subclasses."),
];
