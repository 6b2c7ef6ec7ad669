//! Operator dispatch and the small protocols built on single slots.
//!
//! Binary operators try at most two implementations: the left operand's
//! forward slot and the right operand's reflected slot. The right operand
//! goes first when its type is a proper subtype of the left operand's type
//! and overrides the reflected slot. A `NotImplemented` result moves on to
//! the next candidate; when none remains the operator raises TypeError.
//!
//! Rich comparisons follow the same shape with the swapped operator in the
//! reflected role. `==` and `!=` fall back to identity instead of raising.

use std::rc::Rc;

use crate::{
    args::ArgValues,
    error::ExcType,
    runtime::Runtime,
    slots::{BinaryOp, CompareOp, ResolvedSlot, SlotId, UnaryOp},
    suspension::{LoopControl, OpResult, Resumable, fold_items, iterate_with_suspension},
    types::object::object_repr,
    value::Value,
};

/// One candidate implementation: the slot, its id, and whether it belongs to the right operand.
type BinaryAttempt = (ResolvedSlot, SlotId, bool);

/// One comparison candidate: the slot, the operator it is invoked with, and whether operands are swapped.
type CompareAttempt = (ResolvedSlot, CompareOp, bool);

fn done<T>(value: T) -> OpResult<T> {
    Ok(Resumable::Done(value))
}

/// Keeps trying candidates while they answer `NotImplemented`.
fn first_implemented(result: Value) -> LoopControl<Value> {
    if result.is_not_implemented() {
        LoopControl::Continue(result)
    } else {
        LoopControl::Break(result)
    }
}

impl Runtime {
    /// `left <op> right`
    pub fn binary_op(&mut self, left: &Value, right: &Value, op: BinaryOp) -> OpResult {
        self.binary_op_or_raise(left, right, op, op.symbol())
    }

    /// `left <op>= right`: the in-place slot first, then the plain binary operator.
    pub fn inplace_op(&mut self, left: &Value, right: &Value, op: BinaryOp) -> OpResult {
        let symbol = op.inplace_symbol();
        let Some((id, slot)) = op
            .inplace_slot()
            .and_then(|id| self.resolve_slot(self.type_of(left), id).map(|slot| (id, slot)))
        else {
            return self.binary_op_or_raise(left, right, op, symbol);
        };
        let (l, r) = (left.clone(), right.clone());
        self.invoke_binary_slot(&slot, id, left, right, false)?
            .and_then(self, move |rt, result| {
                if result.is_not_implemented() {
                    rt.binary_op_or_raise(&l, &r, op, symbol)
                } else {
                    done(result)
                }
            })
    }

    fn binary_op_or_raise(&mut self, left: &Value, right: &Value, op: BinaryOp, symbol: &'static str) -> OpResult {
        let (l, r) = (left.clone(), right.clone());
        self.binary_op1(left, right, op)?.and_then(self, move |rt, result| {
            if result.is_not_implemented() {
                Err(ExcType::unsupported_binary(
                    symbol,
                    rt.value_type_name(&l),
                    rt.value_type_name(&r),
                ))
            } else {
                done(result)
            }
        })
    }

    /// Runs the dispatch algorithm and returns `NotImplemented` when no candidate applies.
    pub(crate) fn binary_op1(&mut self, left: &Value, right: &Value, op: BinaryOp) -> OpResult {
        let left_type = self.type_of(left);
        let right_type = self.type_of(right);
        let forward = self.resolve_slot(left_type, op.slot());
        let reflected = if left_type == right_type {
            None
        } else {
            self.resolve_slot(right_type, op.reflected_slot())
        };
        // a subclass goes first only when it overrides the reflected slot it inherits
        let right_first = reflected.as_ref().is_some_and(|slot| {
            self.is_subtype(right_type, left_type)
                && !self
                    .resolve_slot(left_type, op.reflected_slot())
                    .is_some_and(|inherited| slot.same_as(&inherited))
        });

        let mut attempts: Vec<BinaryAttempt> = Vec::with_capacity(2);
        let reflected = reflected.map(|slot| (slot, op.reflected_slot(), true));
        let forward = forward.map(|slot| (slot, op.slot(), false));
        if right_first {
            attempts.extend(reflected);
            attempts.extend(forward);
        } else {
            attempts.extend(forward);
            attempts.extend(reflected);
        }

        let (l, r) = (left.clone(), right.clone());
        fold_items(self, attempts, Value::NotImplemented, move |rt, _, (slot, id, is_reflected)| {
            Ok(rt
                .invoke_binary_slot(&slot, id, &l, &r, is_reflected)?
                .map(first_implemented))
        })
    }

    /// `-x`, `+x`, `abs(x)`, `~x` and `not x`.
    pub fn unary_op(&mut self, operand: &Value, op: UnaryOp) -> OpResult {
        let Some(id) = op.slot() else {
            return Ok(self.is_true(operand)?.map(|truth| Value::Bool(!truth)));
        };
        match self.resolve_slot(self.type_of(operand), id) {
            Some(slot) => self.invoke_unary_slot(&slot, id, operand),
            None => Err(ExcType::unsupported_unary(op.describe(), self.value_type_name(operand))),
        }
    }

    /// Truthiness: the boolean hook, else a non-zero length, else true.
    pub fn is_true(&mut self, value: &Value) -> OpResult<bool> {
        match value {
            Value::None => done(false),
            Value::Bool(b) => done(*b),
            Value::Int(i) => done(*i != 0),
            Value::Float(f) => done(*f != 0.0),
            Value::Str(s) => done(!s.is_empty()),
            Value::NotImplemented | Value::Ref(_) => {
                let ty = self.type_of(value);
                if let Some(slot) = self.resolve_slot(ty, SlotId::Bool) {
                    self.invoke_bool_slot(&slot, value)
                } else if let Some(slot) = self.resolve_slot(ty, SlotId::Len) {
                    Ok(self.invoke_len_slot(&slot, value)?.map(|n| n > 0))
                } else {
                    done(true)
                }
            }
        }
    }

    /// `a <op> b` for every comparison operator, including identity and membership.
    pub fn compare(&mut self, a: &Value, b: &Value, op: CompareOp) -> OpResult {
        let slot_id = match op {
            CompareOp::Is => return done(Value::Bool(a.is(b))),
            CompareOp::IsNot => return done(Value::Bool(!a.is(b))),
            CompareOp::In => return Ok(self.contains(b, a)?.map(Value::Bool)),
            CompareOp::NotIn => return Ok(self.contains(b, a)?.map(|found| Value::Bool(!found))),
            rich => rich.slot(),
        };
        let swapped = op.swapped();
        let a_type = self.type_of(a);
        let b_type = self.type_of(b);
        let forward = slot_id.and_then(|id| self.resolve_slot(a_type, id));
        let reverse = swapped.slot().and_then(|id| self.resolve_slot(b_type, id));
        let reverse_first = reverse.is_some() && a_type != b_type && self.is_subtype(b_type, a_type);

        let mut attempts: Vec<CompareAttempt> = Vec::with_capacity(2);
        let reverse = reverse.map(|slot| (slot, swapped, true));
        let forward = forward.map(|slot| (slot, op, false));
        if reverse_first {
            attempts.extend(reverse);
            attempts.extend(forward);
        } else {
            attempts.extend(forward);
            attempts.extend(reverse);
        }

        let (x, y) = (a.clone(), b.clone());
        let result = fold_items(self, attempts, Value::NotImplemented, move |rt, _, (slot, slot_op, swap)| {
            let (first, second) = if swap { (&y, &x) } else { (&x, &y) };
            Ok(rt
                .invoke_compare_slot(&slot, slot_op, first, second)?
                .map(first_implemented))
        })?;
        let (x, y) = (a.clone(), b.clone());
        result.and_then(self, move |rt, result| {
            if !result.is_not_implemented() {
                return done(result);
            }
            match op {
                CompareOp::Eq => done(Value::Bool(x.is(&y))),
                CompareOp::Ne => done(Value::Bool(!x.is(&y))),
                _ => Err(ExcType::unsupported_compare(
                    op.symbol(),
                    rt.value_type_name(&x),
                    rt.value_type_name(&y),
                )),
            }
        })
    }

    /// A comparison reduced to its truth value. Identical operands are equal.
    pub fn compare_bool(&mut self, a: &Value, b: &Value, op: CompareOp) -> OpResult<bool> {
        match op {
            CompareOp::Eq if a.is(b) => done(true),
            CompareOp::Ne if a.is(b) => done(false),
            _ => self.compare(a, b, op)?.and_then(self, |rt, result| rt.is_true(&result)),
        }
    }

    /// `item in container`: the containment hook, else a linear scan of its iterator.
    pub fn contains(&mut self, container: &Value, item: &Value) -> OpResult<bool> {
        let ty = self.type_of(container);
        if let Some(slot) = self.resolve_slot(ty, SlotId::Contains) {
            return self.invoke_contains_slot(&slot, container, item);
        }
        if self.resolve_slot(ty, SlotId::Iter).is_none() && self.resolve_slot(ty, SlotId::GetItem).is_none() {
            return Err(ExcType::type_error(format!(
                "argument of type '{}' is not iterable",
                self.type_name(ty)
            )));
        }
        let needle = item.clone();
        self.get_iter(container)?.and_then(self, move |rt, iterator| {
            iterate_with_suspension(rt, iterator, false, move |rt, _, candidate| {
                Ok(rt
                    .compare_bool(&needle, &candidate, CompareOp::Eq)?
                    .map(|eq| if eq { LoopControl::Break(true) } else { LoopControl::Continue(false) }))
            })
        })
    }

    /// `hash(value)`
    pub fn hash(&mut self, value: &Value) -> OpResult<i64> {
        match self.resolve_slot(self.type_of(value), SlotId::Hash) {
            Some(slot) => self.invoke_hash_slot(&slot, value),
            None => Err(ExcType::unhashable(self.value_type_name(value))),
        }
    }

    /// `repr(value)`
    pub fn repr(&mut self, value: &Value) -> OpResult<Rc<str>> {
        match self.resolve_slot(self.type_of(value), SlotId::Repr) {
            Some(slot) => self.invoke_stringify_slot(&slot, SlotId::Repr, value),
            None => object_repr(self, value),
        }
    }

    /// `str(value)`: the `__str__` hook, else `repr`.
    pub fn to_str(&mut self, value: &Value) -> OpResult<Rc<str>> {
        if let Value::Str(s) = value {
            return done(s.clone());
        }
        match self.resolve_slot(self.type_of(value), SlotId::Str) {
            Some(slot) => self.invoke_stringify_slot(&slot, SlotId::Str, value),
            None => self.repr(value),
        }
    }

    /// `len(value)`
    pub fn length(&mut self, value: &Value) -> OpResult<usize> {
        match self.resolve_slot(self.type_of(value), SlotId::Len) {
            Some(slot) => self.invoke_len_slot(&slot, value),
            None => Err(ExcType::type_error(format!(
                "object of type '{}' has no len()",
                self.value_type_name(value)
            ))),
        }
    }

    /// `obj[key]`. Subscripting a type without `__getitem__` goes to its `__class_getitem__`.
    pub fn get_item(&mut self, obj: &Value, key: &Value) -> OpResult {
        if let Some(slot) = self.resolve_slot(self.type_of(obj), SlotId::GetItem) {
            return self.invoke_binary_slot(&slot, SlotId::GetItem, obj, key, false);
        }
        if let Some(cls) = self.as_type(obj)
            && let Some(hook) = self.type_lookup(cls, "__class_getitem__")
        {
            let key = key.clone();
            return self
                .descr_get_if_any(hook, None, cls)?
                .and_then(self, move |rt, bound| rt.call(&bound, ArgValues::one(key)));
        }
        Err(ExcType::type_error(format!(
            "'{}' object is not subscriptable",
            self.value_type_name(obj)
        )))
    }

    /// `obj[key] = value`
    pub fn set_item(&mut self, obj: &Value, key: &Value, value: Value) -> OpResult<()> {
        self.store_item(obj, key, Some(value))
    }

    /// `del obj[key]`
    pub fn del_item(&mut self, obj: &Value, key: &Value) -> OpResult<()> {
        self.store_item(obj, key, None)
    }

    fn store_item(&mut self, obj: &Value, key: &Value, value: Option<Value>) -> OpResult<()> {
        let ty = self.type_of(obj);
        let dunder = self.store_dunder(SlotId::SetItem, value.is_none());
        match self.resolve_slot_named(ty, SlotId::SetItem, Some(dunder)) {
            Some(slot) => self.invoke_setitem_slot(&slot, obj, key, value),
            None => {
                let what = if value.is_some() { "assignment" } else { "deletion" };
                Err(ExcType::type_error(format!(
                    "'{}' object does not support item {what}",
                    self.type_name(ty)
                )))
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_implemented_keeps_searching() {
        assert!(matches!(first_implemented(Value::NotImplemented), LoopControl::Continue(_)));
        assert!(matches!(first_implemented(Value::Int(3)), LoopControl::Break(Value::Int(3))));
    }
}
