//! `tuple` and `list`: the sequence slot block over a `Vec<Value>` payload.

use std::rc::Rc;

use crate::{
    args::ArgValues,
    error::{ExcType, RunError, RunResult},
    heap::HeapId,
    runtime::Runtime,
    slots::CompareOp,
    suspension::{LoopControl, OpResult, Resumable, fold_items},
    types::{CallConvention, MethodDef, Payload, SeqIter},
    value::Value,
};

impl Runtime {
    /// Items of a tuple or list (including subclass instances).
    pub(crate) fn sequence_items(&self, value: &Value) -> Option<Vec<Value>> {
        match self.heap.payload(value.ref_id()?)? {
            Payload::Tuple(items) | Payload::List(items) => Some(items.clone()),
            _ => None,
        }
    }

    fn list_vec_mut(&mut self, value: &Value) -> RunResult<&mut Vec<Value>> {
        let type_name = self.value_type_name(value);
        match value.ref_id().and_then(|id| self.heap.payload_mut(id)) {
            Some(Payload::List(items)) => Ok(items),
            _ => Err(ExcType::type_error(format!(
                "descriptor requires a 'list' object but received '{type_name}'"
            ))),
        }
    }
}

/// Resolves a possibly negative index against `len`.
pub(crate) fn normalize_index(rt: &Runtime, key: &Value, len: usize, what: &str) -> RunResult<usize> {
    let Some(index) = rt.int_of(key) else {
        return Err(ExcType::type_error(format!(
            "{what} indices must be integers, not '{}'",
            rt.value_type_name(key)
        )));
    };
    let len = i64::try_from(len).unwrap_or(i64::MAX);
    let adjusted = if index < 0 { index + len } else { index };
    if (0..len).contains(&adjusted) {
        usize::try_from(adjusted).map_err(|_| index_error(what))
    } else {
        Err(index_error(what))
    }
}

fn index_error(what: &str) -> RunError {
    RunError::new(ExcType::IndexError, format!("{what} index out of range"))
}

fn done<T>(value: T) -> OpResult<T> {
    Ok(Resumable::Done(value))
}

/// Renders `open item, item close`, with `placeholder` standing in for the container itself.
fn repr_items(
    rt: &mut Runtime,
    container: &Value,
    items: Vec<Value>,
    open: &'static str,
    close: &'static str,
    placeholder: &'static str,
) -> OpResult<Rc<str>> {
    let trailing_comma = items.len() == 1 && open == "(";
    let me = container.clone();
    let parts = fold_items(rt, items, Vec::<Rc<str>>::new(), move |rt, mut parts, item: Value| {
        if item.is(&me) {
            parts.push(Rc::from(placeholder));
            return done(LoopControl::Continue(parts));
        }
        Ok(rt.repr(&item)?.map(move |text| {
            parts.push(text);
            LoopControl::Continue(parts)
        }))
    })?;
    Ok(parts.map(move |parts| {
        let mut text = String::from(open);
        text.push_str(&parts.join(", "));
        if trailing_comma {
            text.push(',');
        }
        text.push_str(close);
        Rc::from(text)
    }))
}

/// Lexicographic comparison: the first pair that is not equal decides.
fn seq_compare(rt: &mut Runtime, left: Vec<Value>, right: Vec<Value>, op: CompareOp) -> OpResult {
    seq_compare_from(rt, left, right, op, 0)
}

fn seq_compare_from(rt: &mut Runtime, left: Vec<Value>, right: Vec<Value>, op: CompareOp, start: usize) -> OpResult {
    let mut i = start;
    while i < left.len() && i < right.len() {
        let (a, b) = (left[i].clone(), right[i].clone());
        match rt.compare_bool(&a, &b, CompareOp::Eq)? {
            Resumable::Done(true) => i += 1,
            Resumable::Done(false) => return compare_differing(rt, &a, &b, op),
            Resumable::Suspended(s) => {
                return Ok(Resumable::Suspended(s.and_then(move |rt, equal| {
                    if equal {
                        seq_compare_from(rt, left, right, op, i + 1)
                    } else {
                        compare_differing(rt, &a, &b, op)
                    }
                })));
            }
        }
    }
    done(Value::Bool(op.from_ordering(left.len().cmp(&right.len()))))
}

fn compare_differing(rt: &mut Runtime, a: &Value, b: &Value, op: CompareOp) -> OpResult {
    match op {
        CompareOp::Eq => done(Value::Bool(false)),
        CompareOp::Ne => done(Value::Bool(true)),
        _ => rt.compare(a, b, op),
    }
}

fn seq_contains(rt: &mut Runtime, seq: &Value, needle: &Value) -> OpResult<bool> {
    let items = rt.sequence_items(seq).unwrap_or_default();
    let needle = needle.clone();
    fold_items(rt, items, false, move |rt, _, item: Value| {
        Ok(rt.compare_bool(&item, &needle, CompareOp::Eq)?.map(|equal| {
            if equal {
                LoopControl::Break(true)
            } else {
                LoopControl::Continue(false)
            }
        }))
    })
}

fn seq_len(rt: &mut Runtime, seq: &Value) -> OpResult<usize> {
    done(rt.sequence_items(seq).map_or(0, |items| items.len()))
}

/// The sequence and the count of a repetition, whichever side each is on.
fn repeat_operands(rt: &Runtime, left: &Value, right: &Value, kind: HeapId) -> Option<(Vec<Value>, i64)> {
    if rt.isinstance(left, kind) {
        Some((rt.sequence_items(left)?, rt.int_of(right)?))
    } else if rt.isinstance(right, kind) {
        Some((rt.sequence_items(right)?, rt.int_of(left)?))
    } else {
        None
    }
}

fn repeat_vec(items: &[Value], count: i64) -> RunResult<Vec<Value>> {
    let count = usize::try_from(count).unwrap_or(0);
    items
        .len()
        .checked_mul(count)
        .ok_or_else(|| ExcType::overflow("repeated sequence is too long"))?;
    Ok(items.iter().cloned().cycle().take(items.len() * count).collect())
}

// === tuple ===

/// `tuple(iterable=())`
pub(crate) fn tuple_new(rt: &mut Runtime, cls: HeapId, args: ArgValues) -> OpResult {
    args.check_no_kwargs("tuple")?;
    let Some(iterable) = args.get_range("tuple", 0, 1)?.into_iter().next() else {
        return done(rt.alloc_instance(cls, Payload::Tuple(Vec::new())));
    };
    if cls == rt.core.tuple && rt.type_of(&iterable) == rt.core.tuple {
        return done(iterable);
    }
    rt.collect(&iterable)?
        .and_then(rt, move |rt, items| done(rt.alloc_instance(cls, Payload::Tuple(items))))
}

pub(crate) fn tuple_repr(rt: &mut Runtime, tuple: &Value) -> OpResult<Rc<str>> {
    let items = rt.tuple_items(tuple).unwrap_or_default();
    repr_items(rt, tuple, items, "(", ")", "(...)")
}

pub(crate) fn tuple_hash(rt: &mut Runtime, tuple: &Value) -> OpResult<i64> {
    let items = rt.tuple_items(tuple).unwrap_or_default();
    let seed = 0x0034_5678_i64;
    fold_items(rt, items, seed, |rt, acc, item: Value| {
        Ok(rt
            .hash(&item)?
            .map(move |h| LoopControl::Continue(acc.wrapping_mul(1_000_003) ^ h)))
    })
}

pub(crate) fn tuple_richcompare(rt: &mut Runtime, a: &Value, b: &Value, op: CompareOp) -> OpResult {
    match (rt.isinstance(a, rt.core.tuple), rt.isinstance(b, rt.core.tuple)) {
        (true, true) => {
            let left = rt.tuple_items(a).unwrap_or_default();
            let right = rt.tuple_items(b).unwrap_or_default();
            seq_compare(rt, left, right, op)
        }
        _ => done(Value::NotImplemented),
    }
}

pub(crate) fn tuple_len(rt: &mut Runtime, tuple: &Value) -> OpResult<usize> {
    seq_len(rt, tuple)
}

pub(crate) fn tuple_contains(rt: &mut Runtime, tuple: &Value, item: &Value) -> OpResult<bool> {
    seq_contains(rt, tuple, item)
}

pub(crate) fn tuple_getitem(rt: &mut Runtime, tuple: &Value, key: &Value) -> OpResult {
    let items = rt.tuple_items(tuple).unwrap_or_default();
    let index = normalize_index(rt, key, items.len(), "tuple")?;
    done(items[index].clone())
}

pub(crate) fn tuple_concat(rt: &mut Runtime, left: &Value, right: &Value) -> OpResult {
    if !rt.isinstance(left, rt.core.tuple) || !rt.isinstance(right, rt.core.tuple) {
        return done(Value::NotImplemented);
    }
    let mut items = rt.tuple_items(left).unwrap_or_default();
    items.extend(rt.tuple_items(right).unwrap_or_default());
    done(rt.new_tuple(items))
}

pub(crate) fn tuple_repeat(rt: &mut Runtime, left: &Value, right: &Value) -> OpResult {
    match repeat_operands(rt, left, right, rt.core.tuple) {
        Some((items, count)) => {
            let repeated = repeat_vec(&items, count)?;
            done(rt.new_tuple(repeated))
        }
        None => done(Value::NotImplemented),
    }
}

pub(crate) fn tuple_iter(rt: &mut Runtime, tuple: &Value) -> OpResult {
    done(rt.alloc_instance(rt.core.tuple_iterator, Payload::SeqIter(SeqIter::new(tuple.clone()))))
}

// === list ===

/// `list.__new__` allocates an empty list; `__init__` fills it.
pub(crate) fn list_new(rt: &mut Runtime, cls: HeapId, _args: ArgValues) -> OpResult {
    done(rt.alloc_instance(cls, Payload::List(Vec::new())))
}

/// `list(iterable=())`
pub(crate) fn list_init(rt: &mut Runtime, list: &Value, args: ArgValues) -> OpResult<()> {
    args.check_no_kwargs("list")?;
    let iterable = args.get_range("list", 0, 1)?.into_iter().next();
    rt.list_vec_mut(list)?.clear();
    let Some(iterable) = iterable else {
        return done(());
    };
    let list = list.clone();
    rt.collect(&iterable)?.and_then(rt, move |rt, items| {
        *rt.list_vec_mut(&list)? = items;
        done(())
    })
}

pub(crate) fn list_repr(rt: &mut Runtime, list: &Value) -> OpResult<Rc<str>> {
    let items = rt.list_items(list).unwrap_or_default();
    repr_items(rt, list, items, "[", "]", "[...]")
}

pub(crate) fn list_richcompare(rt: &mut Runtime, a: &Value, b: &Value, op: CompareOp) -> OpResult {
    match (rt.isinstance(a, rt.core.list), rt.isinstance(b, rt.core.list)) {
        (true, true) => {
            let left = rt.list_items(a).unwrap_or_default();
            let right = rt.list_items(b).unwrap_or_default();
            seq_compare(rt, left, right, op)
        }
        _ => done(Value::NotImplemented),
    }
}

pub(crate) fn list_len(rt: &mut Runtime, list: &Value) -> OpResult<usize> {
    seq_len(rt, list)
}

pub(crate) fn list_contains(rt: &mut Runtime, list: &Value, item: &Value) -> OpResult<bool> {
    seq_contains(rt, list, item)
}

pub(crate) fn list_getitem(rt: &mut Runtime, list: &Value, key: &Value) -> OpResult {
    let items = rt.list_items(list).unwrap_or_default();
    let index = normalize_index(rt, key, items.len(), "list")?;
    done(items[index].clone())
}

/// Item assignment, or deletion when `value` is `None`.
pub(crate) fn list_setitem(rt: &mut Runtime, list: &Value, key: &Value, value: Option<Value>) -> OpResult<()> {
    let len = rt.list_items(list).map_or(0, |items| items.len());
    let what = if value.is_some() { "list assignment" } else { "list deletion" };
    let index = normalize_index(rt, key, len, what)?;
    let items = rt.list_vec_mut(list)?;
    match value {
        Some(value) => items[index] = value,
        None => {
            items.remove(index);
        }
    }
    done(())
}

pub(crate) fn list_concat(rt: &mut Runtime, left: &Value, right: &Value) -> OpResult {
    if !rt.isinstance(left, rt.core.list) || !rt.isinstance(right, rt.core.list) {
        return done(Value::NotImplemented);
    }
    let mut items = rt.list_items(left).unwrap_or_default();
    items.extend(rt.list_items(right).unwrap_or_default());
    done(rt.new_list(items))
}

pub(crate) fn list_repeat(rt: &mut Runtime, left: &Value, right: &Value) -> OpResult {
    match repeat_operands(rt, left, right, rt.core.list) {
        Some((items, count)) => {
            let repeated = repeat_vec(&items, count)?;
            done(rt.new_list(repeated))
        }
        None => done(Value::NotImplemented),
    }
}

/// `list += iterable` extends in place and returns the same list.
pub(crate) fn list_iadd(rt: &mut Runtime, list: &Value, other: &Value) -> OpResult {
    if !rt.isinstance(list, rt.core.list) {
        return done(Value::NotImplemented);
    }
    let list = list.clone();
    rt.collect(other)?.and_then(rt, move |rt, items| {
        rt.list_vec_mut(&list)?.extend(items);
        done(list)
    })
}

pub(crate) fn list_iter(rt: &mut Runtime, list: &Value) -> OpResult {
    done(rt.alloc_instance(rt.core.list_iterator, Payload::SeqIter(SeqIter::new(list.clone()))))
}

fn list_append(rt: &mut Runtime, list: &Value, args: ArgValues) -> OpResult {
    let item = args.get_one_arg("append")?;
    rt.list_vec_mut(list)?.push(item);
    done(Value::None)
}

fn list_extend(rt: &mut Runtime, list: &Value, args: ArgValues) -> OpResult {
    let iterable = args.get_one_arg("extend")?;
    let list = list.clone();
    rt.collect(&iterable)?.and_then(rt, move |rt, items| {
        rt.list_vec_mut(&list)?.extend(items);
        done(Value::None)
    })
}

fn list_insert(rt: &mut Runtime, list: &Value, args: ArgValues) -> OpResult {
    let (index, item) = args.get_two_args("insert")?;
    let Some(index) = rt.int_of(&index) else {
        return Err(ExcType::type_error(format!(
            "'{}' object cannot be interpreted as an integer",
            rt.value_type_name(&index)
        )));
    };
    let items = rt.list_vec_mut(list)?;
    let len = i64::try_from(items.len()).unwrap_or(i64::MAX);
    let position = if index < 0 { (index + len).max(0) } else { index.min(len) };
    items.insert(usize::try_from(position).unwrap_or(0), item);
    done(Value::None)
}

fn list_pop(rt: &mut Runtime, list: &Value, args: ArgValues) -> OpResult {
    let index = args.get_range("pop", 0, 1)?.into_iter().next().unwrap_or(Value::Int(-1));
    let len = rt.list_items(list).map_or(0, |items| items.len());
    if len == 0 {
        return Err(RunError::new(ExcType::IndexError, "pop from empty list"));
    }
    let index = normalize_index(rt, &index, len, "pop")?;
    done(rt.list_vec_mut(list)?.remove(index))
}

fn list_clear(rt: &mut Runtime, list: &Value, _args: ArgValues) -> OpResult {
    rt.list_vec_mut(list)?.clear();
    done(Value::None)
}

fn list_copy(rt: &mut Runtime, list: &Value, _args: ArgValues) -> OpResult {
    let items = rt.list_items(list).unwrap_or_default();
    done(rt.new_list(items))
}

pub(crate) static LIST_METHODS: [MethodDef; 6] = [
    MethodDef::new("append", list_append, CallConvention::OneArg).with_doc("Append object to the end of the list."),
    MethodDef::new("extend", list_extend, CallConvention::OneArg)
        .with_doc("Extend list by appending elements from the iterable."),
    MethodDef::new("insert", list_insert, CallConvention::Fixed(2)).with_doc("Insert object before index."),
    MethodDef::new("pop", list_pop, CallConvention::VarArgs)
        .with_doc("Remove and return item at index (default last)."),
    MethodDef::new("clear", list_clear, CallConvention::NoArgs).with_doc("Remove all items from list."),
    MethodDef::new("copy", list_copy, CallConvention::NoArgs).with_doc("Return a shallow copy of the list."),
];
