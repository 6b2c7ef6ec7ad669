//! `object`: the root of every hierarchy and the default slot implementations.

use std::rc::Rc;

use crate::{
    args::ArgValues,
    error::{ExcType, RunResult},
    heap::HeapId,
    runtime::Runtime,
    slots::{CompareOp, ResolvedSlot, SlotFunc, SlotId},
    suspension::{OpResult, Resumable},
    types::{CallConvention, GetSetDef, Layout, MethodDef, Payload, TypeFlags},
    value::Value,
};

impl Runtime {
    /// Whether `ty` resolves `slot` to the native function `func`.
    fn slot_is_native(&self, ty: HeapId, slot: SlotId, func: SlotFunc) -> bool {
        matches!(self.resolve_slot(ty, slot), Some(ResolvedSlot::Native(f)) if f.same_as(&func))
    }
}

/// `object.__new__`: allocates a plain instance.
///
/// Excess arguments are accepted only when the type overrides `__init__`
/// and keeps this `__new__`.
pub(crate) fn object_new(rt: &mut Runtime, cls: HeapId, args: ArgValues) -> OpResult {
    if !args.is_empty() || args.has_kwargs() {
        if !rt.slot_is_native(cls, SlotId::New, SlotFunc::New(object_new)) {
            return Err(ExcType::type_error(
                "object.__new__() takes exactly one argument (the type to instantiate)",
            ));
        }
        if rt.slot_is_native(cls, SlotId::Init, SlotFunc::Init(object_init)) {
            return Err(ExcType::type_error(format!("{}() takes no arguments", rt.type_name(cls))));
        }
    }
    let flags = rt.type_flags(cls);
    if flags.contains(TypeFlags::ABSTRACT) {
        return Err(ExcType::type_error(format!(
            "Can't instantiate abstract class {}",
            rt.type_name(cls)
        )));
    }
    let layout = rt.type_object(cls).map_or(Layout::Object, |t| t.layout);
    if layout != Layout::Object {
        return Err(ExcType::type_error(format!(
            "object.__new__({}) is not safe, use {}.__new__()",
            rt.type_name(cls),
            rt.type_name(cls)
        )));
    }
    Ok(Resumable::Done(rt.alloc_instance(cls, Payload::Empty)))
}

/// `object.__init__`: mirrors the excess argument rule of `object.__new__`.
pub(crate) fn object_init(rt: &mut Runtime, obj: &Value, args: ArgValues) -> OpResult<()> {
    if !args.is_empty() || args.has_kwargs() {
        let cls = rt.type_of(obj);
        if !rt.slot_is_native(cls, SlotId::Init, SlotFunc::Init(object_init)) {
            return Err(ExcType::type_error(
                "object.__init__() takes exactly one argument (the instance to initialize)",
            ));
        }
        if rt.slot_is_native(cls, SlotId::New, SlotFunc::New(object_new)) {
            return Err(ExcType::type_error(format!("{}() takes no arguments", rt.type_name(cls))));
        }
    }
    Ok(Resumable::Done(()))
}

pub(crate) fn object_repr(rt: &mut Runtime, obj: &Value) -> OpResult<Rc<str>> {
    let cls = rt.type_of(obj);
    let module = match rt.type_dict_get(cls, "__module__").and_then(|m| rt.str_of(&m)) {
        Some(module) if &*module != "builtins" => format!("{module}."),
        _ => String::new(),
    };
    let qualname = rt.type_object(cls).map_or_else(|| rt.type_name(cls), |t| t.qualname.clone());
    let address = obj.ref_id().map_or(0, HeapId::index);
    Ok(Resumable::Done(format!("<{module}{qualname} object at {address:#x}>").into()))
}

/// `object.__str__` defers to `repr`.
pub(crate) fn object_str(rt: &mut Runtime, obj: &Value) -> OpResult<Rc<str>> {
    rt.repr(obj)
}

pub(crate) fn object_hash(_rt: &mut Runtime, obj: &Value) -> OpResult<i64> {
    let id = obj.ref_id().map_or(0, HeapId::index);
    Ok(Resumable::Done(i64::try_from(id).unwrap_or(i64::MAX)))
}

/// Identity equality; `!=` inverts whatever `==` answers.
pub(crate) fn object_richcompare(rt: &mut Runtime, a: &Value, b: &Value, op: CompareOp) -> OpResult {
    match op {
        CompareOp::Eq => Ok(Resumable::Done(if a.is(b) { Value::Bool(true) } else { Value::NotImplemented })),
        CompareOp::Ne => {
            let Some(eq) = rt.resolve_slot(rt.type_of(a), SlotId::Eq) else {
                return Ok(Resumable::Done(Value::NotImplemented));
            };
            rt.invoke_compare_slot(&eq, CompareOp::Eq, a, b)?.and_then(rt, |rt, result| {
                if result.is_not_implemented() {
                    return Ok(Resumable::Done(result));
                }
                Ok(rt.is_true(&result)?.map(|truth| Value::Bool(!truth)))
            })
        }
        _ => Ok(Resumable::Done(Value::NotImplemented)),
    }
}

fn object_class_get(rt: &mut Runtime, obj: &Value) -> RunResult<Value> {
    Ok(Value::Ref(rt.type_of(obj)))
}

/// `__dict__` accessor installed on types whose instances carry a dictionary.
pub(crate) fn object_dict_get(rt: &mut Runtime, obj: &Value) -> RunResult<Value> {
    rt.instance_dict_id(obj).map(Value::Ref).ok_or_else(|| {
        ExcType::attribute_error(rt.value_type_name(obj), "__dict__")
    })
}

fn object_dict_set(rt: &mut Runtime, obj: &Value, value: Option<Value>) -> RunResult<()> {
    let Some(value) = value else {
        return Err(ExcType::type_error("cannot delete __dict__"));
    };
    let Some(dict_id) = value.ref_id().filter(|id| rt.heap.dict(*id).is_some()) else {
        return Err(ExcType::type_error(format!(
            "__dict__ must be set to a dictionary, not a '{}'",
            rt.value_type_name(&value)
        )));
    };
    match obj.ref_id().and_then(|id| rt.heap.instance_mut(id)) {
        Some(instance) if instance.dict.is_some() => {
            instance.dict = Some(dict_id);
            Ok(())
        }
        _ => Err(ExcType::attribute_error(rt.value_type_name(obj), "__dict__")),
    }
}

pub(crate) static DICT_GETSET: GetSetDef = GetSetDef::new("__dict__", object_dict_get).with_setter(object_dict_set);

pub(crate) static OBJECT_GETSETS: [GetSetDef; 1] = [GetSetDef::new("__class__", object_class_get)];

/// `object.__dir__`: names from the instance dictionary and every class in the MRO.
fn object_dir(rt: &mut Runtime, obj: &Value, _args: ArgValues) -> OpResult {
    let mut names: Vec<Value> = Vec::new();
    let mut seen = ahash::AHashSet::new();
    let mut collect = |rt: &Runtime, dict: &crate::types::Dict, names: &mut Vec<Value>| {
        for key in dict.keys() {
            if let Some(name) = rt.str_of(key)
                && seen.insert(name.clone())
            {
                names.push(Value::Str(name));
            }
        }
    };
    if let Some(dict) = rt.instance_dict_id(obj).and_then(|id| rt.heap.dict(id)) {
        collect(rt, dict, &mut names);
    }
    let cls = rt.type_of(obj);
    for ty in rt.mro_of(cls) {
        if let Some(t) = rt.heap.type_obj(*ty) {
            collect(rt, &t.dict, &mut names);
        }
    }
    Ok(Resumable::Done(rt.new_list(names)))
}

pub(crate) static OBJECT_METHODS: [MethodDef; 1] = [
    MethodDef::new("__dir__", object_dir, CallConvention::NoArgs).with_doc("Default dir() implementation."),
];

/// `object.__init_subclass__`: accepts no keyword arguments and does nothing.
fn object_init_subclass(_rt: &mut Runtime, _cls: &Value, _args: ArgValues) -> OpResult {
    Ok(Resumable::Done(Value::None))
}

pub(crate) static OBJECT_CLASSMETHODS: [MethodDef; 1] = [MethodDef::new(
    "__init_subclass__",
    object_init_subclass,
    CallConvention::NoArgs,
)
.with_doc("This method is called when a class is subclassed.")];
