//! `super(type, obj)`: attribute lookup that starts after `type` in the MRO of `obj`.

use std::rc::Rc;

use crate::{
    args::ArgValues,
    attr::generic_getattr,
    error::{ExcType, RunResult},
    heap::HeapId,
    runtime::Runtime,
    slots::SlotId,
    suspension::{OpResult, Resumable},
    types::{GetSetDef, Payload},
    value::Value,
};

#[derive(Debug, Clone)]
pub struct SuperProxy {
    /// The class whose successors are searched.
    pub(crate) start: HeapId,
    /// The bound object: an instance, or a subtype of `start`.
    pub(crate) obj: Value,
    /// The MRO walked is this type's.
    pub(crate) obj_type: HeapId,
}

impl Runtime {
    /// Creates a `super` proxy for `start` bound to `obj`.
    pub fn new_super(&mut self, start: HeapId, obj: Value) -> RunResult<Value> {
        let proxy = self.super_proxy_for(start, obj)?;
        Ok(self.alloc_instance(self.core.super_, Payload::Super(proxy)))
    }

    fn super_proxy_for(&self, start: HeapId, obj: Value) -> RunResult<SuperProxy> {
        if !self.is_type_id(start) {
            return Err(ExcType::type_error(format!(
                "super() argument 1 must be a type, not {}",
                self.type_name(start)
            )));
        }
        let obj_type = match self.as_type(&obj) {
            Some(ty) if self.is_subtype(ty, start) => ty,
            _ if self.isinstance(&obj, start) => self.type_of(&obj),
            _ => {
                return Err(ExcType::type_error(
                    "super(type, obj): obj must be an instance or subtype of type",
                ));
            }
        };
        Ok(SuperProxy { start, obj, obj_type })
    }

    fn super_payload(&self, value: &Value) -> RunResult<SuperProxy> {
        match value.ref_id().and_then(|id| self.heap.payload(id)) {
            Some(Payload::Super(proxy)) => Ok(proxy.clone()),
            _ => Err(ExcType::type_error(format!(
                "descriptor requires a 'super' object but received '{}'",
                self.value_type_name(value)
            ))),
        }
    }
}

/// `super.__new__(cls, type, obj)`
pub(crate) fn super_new(rt: &mut Runtime, cls: HeapId, args: ArgValues) -> OpResult {
    args.check_no_kwargs("super")?;
    let (start, obj) = args.get_two_args("super")?;
    let Some(start) = rt.as_type(&start) else {
        return Err(ExcType::type_error(format!(
            "super() argument 1 must be a type, not {}",
            rt.value_type_name(&start)
        )));
    };
    let proxy = rt.super_proxy_for(start, obj)?;
    Ok(Resumable::Done(rt.alloc_instance(cls, Payload::Super(proxy))))
}

/// Finds `name` in the classes following `start`, binding it to the proxied object.
///
/// `__class__` and names missing from every successor resolve on the proxy itself.
pub(crate) fn super_getattro(rt: &mut Runtime, sup: &Value, name: &str) -> OpResult {
    let proxy = rt.super_payload(sup)?;
    if name != "__class__" {
        let mro = rt.mro_of(proxy.obj_type).to_vec();
        let after = mro.iter().position(|ty| *ty == proxy.start).map_or(mro.len(), |i| i + 1);
        for &ty in &mro[after..] {
            let Some(found) = rt.type_dict_get(ty, name) else {
                continue;
            };
            let Some(get) = rt.resolve_slot(rt.type_of(&found), SlotId::DescrGet) else {
                return Ok(Resumable::Done(found));
            };
            let instance = (!proxy.obj.is(&Value::Ref(proxy.obj_type))).then_some(&proxy.obj);
            return rt.invoke_descr_get_slot(&get, &found, instance, proxy.obj_type);
        }
    }
    generic_getattr(rt, sup, name)
}

pub(crate) fn super_repr(rt: &mut Runtime, sup: &Value) -> OpResult<Rc<str>> {
    let proxy = rt.super_payload(sup)?;
    let start = rt.type_name(proxy.start);
    let text = format!("<super: <class '{start}'>, <{} object>>", rt.type_name(proxy.obj_type));
    Ok(Resumable::Done(text.into()))
}

fn super_thisclass_get(rt: &mut Runtime, sup: &Value) -> RunResult<Value> {
    Ok(Value::Ref(rt.super_payload(sup)?.start))
}

fn super_self_get(rt: &mut Runtime, sup: &Value) -> RunResult<Value> {
    Ok(rt.super_payload(sup)?.obj)
}

fn super_self_class_get(rt: &mut Runtime, sup: &Value) -> RunResult<Value> {
    Ok(Value::Ref(rt.super_payload(sup)?.obj_type))
}

pub(crate) static SUPER_GETSETS: [GetSetDef; 3] = [
    GetSetDef::new("__thisclass__", super_thisclass_get),
    GetSetDef::new("__self__", super_self_get),
    GetSetDef::new("__self_class__", super_self_class_get),
];
