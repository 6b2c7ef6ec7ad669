//! The call protocol and the iteration protocol.

use crate::{
    args::ArgValues,
    error::ExcType,
    runtime::Runtime,
    slots::SlotId,
    suspension::{LoopControl, OpResult, Resumable, iterate_with_suspension},
    types::{Payload, SeqIter, TypeFlags},
    value::Value,
};

fn done<T>(value: T) -> OpResult<T> {
    Ok(Resumable::Done(value))
}

impl Runtime {
    /// `callable(*args, **kwargs)` through the callable type's call slot.
    ///
    /// Counts toward the call-depth limit while the call runs synchronously.
    /// A call that suspends releases its depth when it returns the suspension.
    pub fn call(&mut self, callable: &Value, args: ArgValues) -> OpResult {
        let Some(slot) = self.resolve_slot(self.type_of(callable), SlotId::Call) else {
            return Err(ExcType::not_callable(self.value_type_name(callable)));
        };
        self.enter_call()?;
        let result = self.invoke_call_slot(&slot, callable, args);
        self.exit_call();
        result
    }

    /// Calls an attribute found on `receiver`'s type as a method of `receiver`.
    ///
    /// Method-like callables take the receiver as their first argument
    /// directly; anything else is bound through its `__get__` first.
    pub(crate) fn call_method(&mut self, callable: &Value, receiver: &Value, args: ArgValues) -> OpResult {
        if self.type_flags(self.type_of(callable)).contains(TypeFlags::METHOD_DESCRIPTOR) {
            return self.call(callable, args.prepend(receiver.clone()));
        }
        let owner = self.type_of(receiver);
        self.descr_get_if_any(callable.clone(), Some(receiver), owner)?
            .and_then(self, move |rt, bound| rt.call(&bound, args))
    }

    /// `obj.name(*args)`
    pub fn invoke_method(&mut self, obj: &Value, name: &str, args: ArgValues) -> OpResult {
        self.get_attribute(obj, name)?
            .and_then(self, move |rt, method| rt.call(&method, args))
    }

    /// `callable(value)`
    #[must_use]
    pub fn is_callable(&self, value: &Value) -> bool {
        self.resolve_slot(self.type_of(value), SlotId::Call).is_some()
    }

    /// `iter(obj)`: the `__iter__` hook, or a sequence iterator driving `__getitem__`.
    pub fn get_iter(&mut self, obj: &Value) -> OpResult {
        let ty = self.type_of(obj);
        if let Some(slot) = self.resolve_slot(ty, SlotId::Iter) {
            return self.invoke_unary_slot(&slot, SlotId::Iter, obj)?.and_then(self, |rt, iterator| {
                if rt.resolve_slot(rt.type_of(&iterator), SlotId::Next).is_some() {
                    done(iterator)
                } else {
                    Err(ExcType::type_error(format!(
                        "iter() returned non-iterator of type '{}'",
                        rt.value_type_name(&iterator)
                    )))
                }
            });
        }
        if self.resolve_slot(ty, SlotId::GetItem).is_some() {
            let state = Payload::SeqIter(SeqIter::new(obj.clone()));
            return done(self.alloc_instance(self.core.iterator, state));
        }
        Err(ExcType::not_iterable(self.type_name(ty)))
    }

    /// `next(iterator)`; `None` once the iterator is exhausted.
    pub fn iter_next(&mut self, iterator: &Value) -> OpResult<Option<Value>> {
        match self.resolve_slot(self.type_of(iterator), SlotId::Next) {
            Some(slot) => self.invoke_next_slot(&slot, iterator),
            None => Err(ExcType::type_error(format!(
                "'{}' object is not an iterator",
                self.value_type_name(iterator)
            ))),
        }
    }

    /// Drains `iterable` into a vector. Exact lists and tuples are copied without iterating.
    pub fn collect(&mut self, iterable: &Value) -> OpResult<Vec<Value>> {
        let ty = self.type_of(iterable);
        if (ty == self.core.list || ty == self.core.tuple)
            && let Some(items) = self.sequence_items(iterable)
        {
            return done(items);
        }
        self.get_iter(iterable)?.and_then(self, |rt, iterator| {
            iterate_with_suspension(rt, iterator, Vec::new(), |_, mut items, item| {
                items.push(item);
                done(LoopControl::Continue(items))
            })
        })
    }
}
