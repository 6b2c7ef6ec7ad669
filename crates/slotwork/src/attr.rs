//! Attribute resolution and the descriptor protocol.
//!
//! Lookup order for instances: a data descriptor found on the type wins,
//! then the instance dictionary, then any other class attribute (bound
//! through its `__get__` when it has one). Types follow the same order with
//! the metatype in the role of the type and the class's own MRO in the role
//! of the instance dictionary.
//!
//! A type's `__getattr__` is consulted only after its `__getattribute__`
//! raised `AttributeError`; other errors propagate unchanged.

use std::rc::Rc;

use crate::{
    error::{ExcType, RunResult},
    heap::HeapId,
    runtime::Runtime,
    slots::{SetAttroFn, Slot, SlotFunc, SlotId},
    suspension::{OpResult, Resumable, try_catch},
    types::TypeFlags,
    value::Value,
};

impl Runtime {
    /// Finds `name` in the namespaces of `ty` and its ancestors, nearest first.
    ///
    /// Prototypical types follow their `base` pointers; every other type walks its MRO.
    #[must_use]
    pub fn type_lookup(&self, ty: HeapId, name: &str) -> Option<Value> {
        if self.is_prototypical(ty) {
            let mut current = Some(ty);
            while let Some(id) = current {
                let t = self.heap.type_obj(id)?;
                if let Some(found) = t.dict.get_str(name) {
                    return Some(found.clone());
                }
                current = t.base;
            }
            None
        } else {
            self.mro_of(ty).iter().find_map(|id| self.type_dict_get(*id, name))
        }
    }

    /// The special method `name` as seen from `obj`'s type, skipping the instance dictionary.
    #[must_use]
    pub fn lookup_special(&self, obj: &Value, name: &str) -> Option<Value> {
        self.type_lookup(self.type_of(obj), name)
    }

    /// Whether `attr` is a data descriptor: its type fills the descriptor-set slot.
    #[must_use]
    pub fn is_data_descriptor(&self, attr: &Value) -> bool {
        self.heap
            .type_obj(self.type_of(attr))
            .is_some_and(|t| t.slots.is_populated(SlotId::DescrSet))
    }

    /// The dunder a two-name slot is resolved under: the first for stores, the second for deletions.
    pub(crate) fn store_dunder(&self, slot: SlotId, deleting: bool) -> &'static str {
        let mut defs = self.registry.defs_for_slot(slot);
        let first = defs.next().map_or("", |def| def.name);
        if deleting { defs.next().map_or(first, |def| def.name) } else { first }
    }

    /// Applies `attr`'s `__get__` if its type has one, otherwise returns `attr` itself.
    pub(crate) fn descr_get_if_any(&mut self, attr: Value, instance: Option<&Value>, owner: HeapId) -> OpResult {
        match self.resolve_slot(self.type_of(&attr), SlotId::DescrGet) {
            Some(get) => self.invoke_descr_get_slot(&get, &attr, instance, owner),
            None => Ok(Resumable::Done(attr)),
        }
    }

    /// Runs a data descriptor's `__set__` or `__delete__`; `None` when `attr` is not a data descriptor.
    fn descr_store(&mut self, attr: &Value, obj: &Value, value: Option<Value>) -> Option<OpResult<()>> {
        if !self.is_data_descriptor(attr) {
            return None;
        }
        let attr_type = self.type_of(attr);
        let dunder = self.store_dunder(SlotId::DescrSet, value.is_none());
        Some(match self.resolve_slot_named(attr_type, SlotId::DescrSet, Some(dunder)) {
            Some(set) => self.invoke_descr_set_slot(&set, attr, obj, value),
            None => Err(ExcType::attribute_error(self.type_name(attr_type), dunder)),
        })
    }

    /// `getattr(obj, name)`: the type's `__getattribute__`, then its `__getattr__` hook on AttributeError.
    pub fn get_attribute(&mut self, obj: &Value, name: &str) -> OpResult {
        let ty = self.type_of(obj);
        let Some(primary) = self.resolve_slot(ty, SlotId::GetAttribute) else {
            return generic_getattr(self, obj, name);
        };
        let Some(fallback) = self.resolve_slot(ty, SlotId::GetAttr) else {
            return self.invoke_getattro_slot(&primary, obj, name);
        };
        let receiver = obj.clone();
        let missing: Rc<str> = Rc::from(name);
        try_catch(
            self,
            |rt| rt.invoke_getattro_slot(&primary, obj, name),
            move |rt, err| {
                if err.is(ExcType::AttributeError) {
                    rt.invoke_getattro_slot(&fallback, &receiver, &missing)
                } else {
                    Err(err)
                }
            },
        )
    }

    /// Like [`Runtime::get_attribute`] but an AttributeError, including one
    /// raised by a fallback hook, yields `None`.
    pub fn get_attribute_opt(&mut self, obj: &Value, name: &str) -> OpResult<Option<Value>> {
        try_catch(
            self,
            |rt| Ok(rt.get_attribute(obj, name)?.map(Some)),
            |_, err| {
                if err.is(ExcType::AttributeError) {
                    Ok(Resumable::Done(None))
                } else {
                    Err(err)
                }
            },
        )
    }

    /// `hasattr(obj, name)`: only AttributeError counts as absent.
    pub fn has_attribute(&mut self, obj: &Value, name: &str) -> OpResult<bool> {
        Ok(self.get_attribute_opt(obj, name)?.map(|found| found.is_some()))
    }

    /// `setattr(obj, name, value)`
    pub fn set_attribute(&mut self, obj: &Value, name: &str, value: Value) -> OpResult<()> {
        self.store_attribute(obj, name, Some(value))
    }

    /// `delattr(obj, name)`
    pub fn del_attribute(&mut self, obj: &Value, name: &str) -> OpResult<()> {
        self.store_attribute(obj, name, None)
    }

    fn store_attribute(&mut self, obj: &Value, name: &str, value: Option<Value>) -> OpResult<()> {
        let ty = self.type_of(obj);
        let dunder = self.store_dunder(SlotId::SetAttr, value.is_none());
        match self.resolve_slot_named(ty, SlotId::SetAttr, Some(dunder)) {
            Some(slot) => self.invoke_setattro_slot(&slot, obj, name, value),
            None => {
                let verb = if value.is_some() { "assign to" } else { "del" };
                Err(ExcType::type_error(format!(
                    "'{}' object has no attributes ({verb} .{name})",
                    self.type_name(ty)
                )))
            }
        }
    }

    /// Refuses a generic attribute setter applied to an object whose nearest
    /// native ancestor installs a different one, e.g. `object.__setattr__(int, "x", 1)`.
    pub(crate) fn hackcheck(&self, obj: &Value, func: SetAttroFn, name: &str) -> RunResult<()> {
        let ty = self.type_of(obj);
        let Some(&native) = self
            .mro_of(ty)
            .iter()
            .find(|id| !self.type_flags(**id).contains(TypeFlags::HEAPTYPE))
        else {
            return Ok(());
        };
        let installed = self.heap.type_obj(native).and_then(|t| t.slots.get(SlotId::SetAttr));
        match installed {
            Some(Slot::Native(current)) if !current.same_as(&SlotFunc::SetAttro(func)) => Err(ExcType::type_error(
                format!("can't apply this {name} to {} object", self.type_name(native)),
            )),
            _ => Ok(()),
        }
    }
}

/// `object.__getattribute__`
pub(crate) fn generic_getattr(rt: &mut Runtime, obj: &Value, name: &str) -> OpResult {
    let ty = rt.type_of(obj);
    let class_attr = rt.type_lookup(ty, name);
    if let Some(attr) = &class_attr
        && rt.is_data_descriptor(attr)
        && let Some(get) = rt.resolve_slot(rt.type_of(attr), SlotId::DescrGet)
    {
        return rt.invoke_descr_get_slot(&get, attr, Some(obj), ty);
    }
    if let Some(found) = rt
        .instance_dict_id(obj)
        .and_then(|id| rt.heap.dict(id))
        .and_then(|dict| dict.get_str(name))
    {
        return Ok(Resumable::Done(found.clone()));
    }
    match class_attr {
        Some(attr) => rt.descr_get_if_any(attr, Some(obj), ty),
        None => Err(ExcType::attribute_error(rt.type_name(ty), name)),
    }
}

/// `object.__setattr__` and `object.__delattr__`
pub(crate) fn generic_setattr(rt: &mut Runtime, obj: &Value, name: &str, value: Option<Value>) -> OpResult<()> {
    let ty = rt.type_of(obj);
    let class_attr = rt.type_lookup(ty, name);
    if let Some(attr) = &class_attr
        && let Some(stored) = rt.descr_store(attr, obj, value.clone())
    {
        return stored;
    }
    let type_name = rt.type_name(ty);
    let Some(dict) = rt.instance_dict_id(obj).and_then(|id| rt.heap.dict_mut(id)) else {
        return Err(if class_attr.is_some() {
            ExcType::type_error(format!("'{type_name}' object attribute '{name}' is read-only"))
        } else {
            ExcType::attribute_error(type_name, name)
        });
    };
    match value {
        Some(value) => {
            dict.insert_str(name, value);
        }
        None => {
            if dict.remove_str(name).is_none() {
                return Err(ExcType::attribute_error(type_name, name));
            }
        }
    }
    Ok(Resumable::Done(()))
}

/// `type.__getattribute__`: metatype data descriptors, then the class's MRO, then metatype attributes.
pub(crate) fn type_getattro(rt: &mut Runtime, cls_value: &Value, name: &str) -> OpResult {
    let Some(cls) = rt.as_type(cls_value) else {
        return generic_getattr(rt, cls_value, name);
    };
    let meta = rt.type_of(cls_value);
    let meta_attr = rt.type_lookup(meta, name);
    if let Some(attr) = &meta_attr
        && rt.is_data_descriptor(attr)
        && let Some(get) = rt.resolve_slot(rt.type_of(attr), SlotId::DescrGet)
    {
        return rt.invoke_descr_get_slot(&get, attr, Some(cls_value), meta);
    }
    if let Some(attr) = rt.type_lookup(cls, name) {
        return rt.descr_get_if_any(attr, None, cls);
    }
    match meta_attr {
        Some(attr) => rt.descr_get_if_any(attr, Some(cls_value), meta),
        None => Err(ExcType::type_attribute_error(rt.type_name(cls), name)),
    }
}

/// `type.__setattr__` and `type.__delattr__`. Storing a dunder re-derives the matching slot.
pub(crate) fn type_setattro(rt: &mut Runtime, cls_value: &Value, name: &str, value: Option<Value>) -> OpResult<()> {
    let Some(cls) = rt.as_type(cls_value) else {
        return generic_setattr(rt, cls_value, name, value);
    };
    if rt.type_flags(cls).contains(TypeFlags::IMMUTABLE) {
        return Err(ExcType::type_error(format!(
            "cannot set '{name}' attribute of immutable type '{}'",
            rt.type_name(cls)
        )));
    }
    if let Some(attr) = rt.lookup_special(cls_value, name)
        && let Some(stored) = rt.descr_store(&attr, cls_value, value.clone())
    {
        return stored;
    }
    let type_name = rt.type_name(cls);
    let Some(t) = rt.heap.type_obj_mut(cls) else {
        return Err(ExcType::type_attribute_error(type_name, name));
    };
    match value {
        Some(value) => {
            t.dict.insert_str(name, value);
        }
        None => {
            if t.dict.remove_str(name).is_none() {
                return Err(ExcType::type_attribute_error(type_name, name));
            }
        }
    }
    if rt.registry.lookup(name).is_some() {
        rt.update_slot(cls, name);
    }
    Ok(Resumable::Done(()))
}
