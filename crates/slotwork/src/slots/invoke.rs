//! Resolving a type's slot to something invocable and calling it.
//!
//! Native slots are called directly. User-declared dunders go through the
//! call protocol and have their results validated the way the protocol
//! requires (a truthiness hook must return a bool, `__len__` a non-negative
//! int, and so on).

use std::rc::Rc;

use crate::{
    args::ArgValues,
    error::{ExcType, RunResult},
    heap::HeapId,
    runtime::Runtime,
    slots::{CompareOp, ResolvedSlot, Slot, SlotFunc, SlotId},
    suspension::{OpResult, Resumable, try_catch},
    types::{Descriptor, Payload},
    value::Value,
};

impl Runtime {
    /// Resolves slot `id` of type `ty`.
    ///
    /// `Lookup` slots and overrides declared under a different dunder (the
    /// deletion half of `SetAttr`, `DescrSet`, `SetItem`) are found by name
    /// through the MRO; `name` selects which dunder, defaulting to the slot's primary one.
    pub(crate) fn resolve_slot_named(&self, ty: HeapId, id: SlotId, name: Option<&'static str>) -> Option<ResolvedSlot> {
        let slot = self.heap.type_obj(ty)?.slots.get(id)?;
        match slot {
            Slot::Native(func) => Some(ResolvedSlot::Native(*func)),
            Slot::Override { name: declared, callable } if name.is_none_or(|n| n == *declared) => {
                Some(ResolvedSlot::Callable(callable.clone()))
            }
            Slot::Override { .. } => {
                let name = name.unwrap_or_else(|| self.registry.primary_name(id));
                let found = self.type_lookup(ty, name)?;
                self.resolve_found(found)
            }
            Slot::Lookup { name: derived } => {
                let name = name.unwrap_or(*derived);
                // the dialect may have renamed the hook since the slot was derived
                let current = self.registry.primary_name(id);
                let found = match self.type_lookup(ty, name) {
                    Some(found) => found,
                    None if current != name => self.type_lookup(ty, current)?,
                    None => return None,
                };
                self.resolve_found(found)
            }
        }
    }

    #[inline]
    pub(crate) fn resolve_slot(&self, ty: HeapId, id: SlotId) -> Option<ResolvedSlot> {
        self.resolve_slot_named(ty, id, None)
    }

    /// A dunder found by name: `None` blocks the slot, a native slot wrapper
    /// is unwrapped to its function.
    fn resolve_found(&self, found: Value) -> Option<ResolvedSlot> {
        if found.is_none() {
            return None;
        }
        if let Some(id) = found.ref_id()
            && let Some(Payload::Descriptor(Descriptor::SlotWrapper { func, .. })) = self.heap.payload(id)
        {
            return Some(ResolvedSlot::Native(*func));
        }
        Some(ResolvedSlot::Callable(found))
    }

    pub(crate) fn invoke_unary_slot(&mut self, slot: &ResolvedSlot, id: SlotId, obj: &Value) -> OpResult {
        match slot {
            ResolvedSlot::Native(SlotFunc::Unary(f)) => f(self, obj),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(id)),
            ResolvedSlot::Callable(c) => self.call_method(c, obj, ArgValues::empty()),
        }
    }

    /// Invokes a binary slot. `left` and `right` are in operand order; when
    /// `reflected` is set the slot belongs to `right`.
    pub(crate) fn invoke_binary_slot(
        &mut self,
        slot: &ResolvedSlot,
        id: SlotId,
        left: &Value,
        right: &Value,
        reflected: bool,
    ) -> OpResult {
        match slot {
            ResolvedSlot::Native(SlotFunc::Binary(f)) => f(self, left, right),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(id)),
            ResolvedSlot::Callable(c) if reflected => self.call_method(c, right, ArgValues::one(left.clone())),
            ResolvedSlot::Callable(c) => self.call_method(c, left, ArgValues::one(right.clone())),
        }
    }

    pub(crate) fn invoke_compare_slot(&mut self, slot: &ResolvedSlot, op: CompareOp, x: &Value, y: &Value) -> OpResult {
        match slot {
            ResolvedSlot::Native(SlotFunc::RichCompare(f, _)) => f(self, x, y, op),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(op)),
            ResolvedSlot::Callable(c) => self.call_method(c, x, ArgValues::one(y.clone())),
        }
    }

    pub(crate) fn invoke_call_slot(&mut self, slot: &ResolvedSlot, callable: &Value, args: ArgValues) -> OpResult {
        match slot {
            ResolvedSlot::Native(SlotFunc::Call(f)) => f(self, callable, args),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(SlotId::Call)),
            ResolvedSlot::Callable(c) => self.call_method(c, callable, args),
        }
    }

    /// Invokes a `__new__` slot. A user `__new__` is stored as a staticmethod
    /// and receives the class as its first argument.
    pub(crate) fn invoke_new_slot(&mut self, slot: &ResolvedSlot, cls: HeapId, args: ArgValues) -> OpResult {
        match slot {
            ResolvedSlot::Native(SlotFunc::New(f)) => f(self, cls, args),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(SlotId::New)),
            ResolvedSlot::Callable(c) => {
                let func = self.unwrap_staticmethod(c);
                self.call(&func, args.prepend(Value::Ref(cls)))
            }
        }
    }

    pub(crate) fn invoke_init_slot(&mut self, slot: &ResolvedSlot, obj: &Value, args: ArgValues) -> OpResult<()> {
        match slot {
            ResolvedSlot::Native(SlotFunc::Init(f)) => f(self, obj, args),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(SlotId::Init)),
            ResolvedSlot::Callable(c) => self.call_method(c, obj, args)?.and_then(self, |rt, result| {
                if result.is_none() {
                    Ok(Resumable::Done(()))
                } else {
                    Err(ExcType::type_error(format!(
                        "__init__() should return None, not '{}'",
                        rt.value_type_name(&result)
                    )))
                }
            }),
        }
    }

    pub(crate) fn invoke_getattro_slot(&mut self, slot: &ResolvedSlot, obj: &Value, name: &str) -> OpResult {
        match slot {
            ResolvedSlot::Native(SlotFunc::GetAttro(f)) => f(self, obj, name),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(SlotId::GetAttribute)),
            ResolvedSlot::Callable(c) => self.call_method(c, obj, ArgValues::one(Value::str(name))),
        }
    }

    pub(crate) fn invoke_setattro_slot(
        &mut self,
        slot: &ResolvedSlot,
        obj: &Value,
        name: &str,
        value: Option<Value>,
    ) -> OpResult<()> {
        match slot {
            ResolvedSlot::Native(SlotFunc::SetAttro(f)) => f(self, obj, name, value),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(SlotId::SetAttr)),
            ResolvedSlot::Callable(c) => {
                let args = match value {
                    Some(value) => ArgValues::two(Value::str(name), value),
                    None => ArgValues::one(Value::str(name)),
                };
                Ok(self.call_method(c, obj, args)?.map(drop))
            }
        }
    }

    /// Invokes a descriptor's `__get__`. `instance` is `None` for access through the owner type.
    pub(crate) fn invoke_descr_get_slot(
        &mut self,
        slot: &ResolvedSlot,
        descr: &Value,
        instance: Option<&Value>,
        owner: HeapId,
    ) -> OpResult {
        match slot {
            ResolvedSlot::Native(SlotFunc::DescrGet(f)) => f(self, descr, instance, owner),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(SlotId::DescrGet)),
            ResolvedSlot::Callable(c) => {
                let instance = instance.cloned().unwrap_or(Value::None);
                self.call_method(c, descr, ArgValues::two(instance, Value::Ref(owner)))
            }
        }
    }

    pub(crate) fn invoke_descr_set_slot(
        &mut self,
        slot: &ResolvedSlot,
        descr: &Value,
        instance: &Value,
        value: Option<Value>,
    ) -> OpResult<()> {
        match slot {
            ResolvedSlot::Native(SlotFunc::DescrSet(f)) => f(self, descr, instance, value),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(SlotId::DescrSet)),
            ResolvedSlot::Callable(c) => {
                let args = match value {
                    Some(value) => ArgValues::two(instance.clone(), value),
                    None => ArgValues::one(instance.clone()),
                };
                Ok(self.call_method(c, descr, args)?.map(drop))
            }
        }
    }

    pub(crate) fn invoke_setitem_slot(
        &mut self,
        slot: &ResolvedSlot,
        obj: &Value,
        key: &Value,
        value: Option<Value>,
    ) -> OpResult<()> {
        match slot {
            ResolvedSlot::Native(SlotFunc::SetItem(f)) => f(self, obj, key, value),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(SlotId::SetItem)),
            ResolvedSlot::Callable(c) => {
                let args = match value {
                    Some(value) => ArgValues::two(key.clone(), value),
                    None => ArgValues::one(key.clone()),
                };
                Ok(self.call_method(c, obj, args)?.map(drop))
            }
        }
    }

    pub(crate) fn invoke_bool_slot(&mut self, slot: &ResolvedSlot, obj: &Value) -> OpResult<bool> {
        match slot {
            ResolvedSlot::Native(SlotFunc::Bool(f)) => f(self, obj),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(SlotId::Bool)),
            ResolvedSlot::Callable(c) => self.call_method(c, obj, ArgValues::empty())?.and_then(self, |rt, result| {
                match result {
                    Value::Bool(b) => Ok(Resumable::Done(b)),
                    other => Err(ExcType::type_error(format!(
                        "{} should return bool, returned {}",
                        rt.registry.primary_name(SlotId::Bool),
                        rt.value_type_name(&other)
                    ))),
                }
            }),
        }
    }

    pub(crate) fn invoke_len_slot(&mut self, slot: &ResolvedSlot, obj: &Value) -> OpResult<usize> {
        match slot {
            ResolvedSlot::Native(SlotFunc::Len(f)) => f(self, obj),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(SlotId::Len)),
            ResolvedSlot::Callable(c) => self.call_method(c, obj, ArgValues::empty())?.and_then(self, |rt, result| {
                let n = rt.int_of(&result).ok_or_else(|| {
                    ExcType::type_error(format!(
                        "'{}' object cannot be interpreted as an integer",
                        rt.value_type_name(&result)
                    ))
                })?;
                usize::try_from(n)
                    .map(Resumable::Done)
                    .map_err(|_| ExcType::value_error("__len__() should return >= 0"))
            }),
        }
    }

    pub(crate) fn invoke_hash_slot(&mut self, slot: &ResolvedSlot, obj: &Value) -> OpResult<i64> {
        match slot {
            ResolvedSlot::Native(SlotFunc::Hash(f)) => f(self, obj),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(SlotId::Hash)),
            ResolvedSlot::Callable(c) => self.call_method(c, obj, ArgValues::empty())?.and_then(self, |rt, result| {
                rt.int_of(&result)
                    .map(Resumable::Done)
                    .ok_or_else(|| ExcType::type_error("__hash__ method should return an integer"))
            }),
        }
    }

    pub(crate) fn invoke_stringify_slot(&mut self, slot: &ResolvedSlot, id: SlotId, obj: &Value) -> OpResult<Rc<str>> {
        match slot {
            ResolvedSlot::Native(SlotFunc::Stringify(f)) => f(self, obj),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(id)),
            ResolvedSlot::Callable(c) => self.call_method(c, obj, ArgValues::empty())?.and_then(self, move |rt, result| {
                rt.str_of(&result).map(Resumable::Done).ok_or_else(|| {
                    ExcType::type_error(format!(
                        "{} returned non-string (type {})",
                        rt.registry.primary_name(id),
                        rt.value_type_name(&result)
                    ))
                })
            }),
        }
    }

    /// Advances an iterator through its `Next` slot. A user hook signals
    /// exhaustion by raising StopIteration, which becomes `None`.
    pub(crate) fn invoke_next_slot(&mut self, slot: &ResolvedSlot, iterator: &Value) -> OpResult<Option<Value>> {
        match slot {
            ResolvedSlot::Native(SlotFunc::IterNext(f)) => f(self, iterator),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(SlotId::Next)),
            ResolvedSlot::Callable(c) => try_catch(
                self,
                |rt| Ok(rt.call_method(c, iterator, ArgValues::empty())?.map(Some)),
                |_, err| {
                    if err.is(ExcType::StopIteration) {
                        Ok(Resumable::Done(None))
                    } else {
                        Err(err)
                    }
                },
            ),
        }
    }

    pub(crate) fn invoke_contains_slot(&mut self, slot: &ResolvedSlot, container: &Value, item: &Value) -> OpResult<bool> {
        match slot {
            ResolvedSlot::Native(SlotFunc::Contains(f)) => f(self, container, item),
            ResolvedSlot::Native(_) => Err(ExcType::slot_signature_mismatch(SlotId::Contains)),
            ResolvedSlot::Callable(c) => self
                .call_method(c, container, ArgValues::one(item.clone()))?
                .and_then(self, |rt, result| rt.is_true(&result)),
        }
    }

    /// Checks a value produced by a slot that must yield an exact integer.
    pub(crate) fn expect_int_result(&self, value: &Value, what: &str) -> RunResult<i64> {
        self.int_of(value).ok_or_else(|| {
            ExcType::type_error(format!(
                "{what} returned non-int (type {})",
                self.value_type_name(value)
            ))
        })
    }
}
