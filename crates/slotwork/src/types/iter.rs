//! Iterator objects for dicts and sequences.
//!
//! A dict iterator records the dict's version when created and fails if the
//! dict gains or loses entries before it is exhausted. Sequence iterators read
//! their container's current items on every step. The generic `iterator` type
//! drives any object with a `__getitem__` until it raises IndexError.

use crate::{
    error::{ExcType, RunResult},
    heap::HeapId,
    runtime::Runtime,
    suspension::{OpResult, Resumable, try_catch},
    types::Payload,
    value::Value,
};

#[derive(Debug, Clone)]
pub struct DictIter {
    pub(crate) dict: HeapId,
    pub(crate) version: u64,
    pub(crate) index: usize,
}

#[derive(Debug, Clone)]
pub struct SeqIter {
    pub(crate) seq: Value,
    pub(crate) index: usize,
    pub(crate) done: bool,
}

impl SeqIter {
    pub(crate) fn new(seq: Value) -> Self {
        Self {
            seq,
            index: 0,
            done: false,
        }
    }
}

impl Runtime {
    /// Creates an iterator over the keys of `dict`.
    pub(crate) fn new_dict_iter(&mut self, dict: &Value) -> RunResult<Value> {
        let id = dict.ref_id().filter(|id| self.heap.dict(*id).is_some()).ok_or_else(|| {
            ExcType::type_error(format!("expected dict, got '{}'", self.value_type_name(dict)))
        })?;
        let version = self.heap.dict(id).map_or(0, crate::types::Dict::version);
        let iter = DictIter { dict: id, version, index: 0 };
        Ok(self.alloc_instance(self.core.dict_keyiterator, Payload::DictIter(iter)))
    }

    fn seq_iter_mut(&mut self, iterator: &Value) -> RunResult<&mut SeqIter> {
        let type_name = self.value_type_name(iterator);
        match iterator.ref_id().and_then(|id| self.heap.payload_mut(id)) {
            Some(Payload::SeqIter(it)) => Ok(it),
            _ => Err(ExcType::type_error(format!("expected a sequence iterator, got '{type_name}'"))),
        }
    }
}

/// `__iter__` of every iterator: the iterator itself.
pub(crate) fn iter_self(_rt: &mut Runtime, iterator: &Value) -> OpResult {
    Ok(Resumable::Done(iterator.clone()))
}

pub(crate) fn dict_iter_next(rt: &mut Runtime, iterator: &Value) -> OpResult<Option<Value>> {
    let Some(Payload::DictIter(state)) = iterator.ref_id().and_then(|id| rt.heap.payload(id)) else {
        return Err(ExcType::type_error("expected a dict iterator"));
    };
    let state = state.clone();
    let Some(dict) = rt.heap.dict(state.dict) else {
        return Ok(Resumable::Done(None));
    };
    if dict.version() != state.version {
        return Err(ExcType::dict_changed_size());
    }
    let key = dict.entry_at(state.index).map(|(k, _)| k.clone());
    if key.is_some()
        && let Some(Payload::DictIter(state)) = iterator.ref_id().and_then(|id| rt.heap.payload_mut(id))
    {
        state.index += 1;
    }
    Ok(Resumable::Done(key))
}

/// Advances a list or tuple iterator. A list may grow while iterated.
pub(crate) fn seq_iter_next(rt: &mut Runtime, iterator: &Value) -> OpResult<Option<Value>> {
    let it = rt.seq_iter_mut(iterator)?;
    if it.done {
        return Ok(Resumable::Done(None));
    }
    let (seq, index) = (it.seq.clone(), it.index);
    let item = rt.sequence_items(&seq).and_then(|items| items.get(index).cloned());
    let it = rt.seq_iter_mut(iterator)?;
    match item {
        Some(_) => it.index += 1,
        None => it.done = true,
    }
    Ok(Resumable::Done(item))
}

/// Advances the generic sequence iterator by subscripting with the next index.
pub(crate) fn getitem_iter_next(rt: &mut Runtime, iterator: &Value) -> OpResult<Option<Value>> {
    let it = rt.seq_iter_mut(iterator)?;
    if it.done {
        return Ok(Resumable::Done(None));
    }
    let (seq, index) = (it.seq.clone(), it.index);
    let key = Value::Int(i64::try_from(index).unwrap_or(i64::MAX));
    let advanced = iterator.clone();
    let finished = iterator.clone();
    try_catch(
        rt,
        |rt| {
            rt.get_item(&seq, &key)?.and_then(rt, move |rt, item| {
                rt.seq_iter_mut(&advanced)?.index += 1;
                Ok(Resumable::Done(Some(item)))
            })
        },
        move |rt, err| {
            if err.is(ExcType::IndexError) || err.is(ExcType::StopIteration) {
                rt.seq_iter_mut(&finished)?.done = true;
                Ok(Resumable::Done(None))
            } else {
                Err(err)
            }
        },
    )
}
