use std::rc::Rc;

use indexmap::IndexMap;

use crate::{
    args::ArgValues,
    error::{ExcType, RunError, RunResult},
    heap::HeapId,
    runtime::Runtime,
    slots::{CompareOp, SlotId},
    suspension::{LoopControl, OpResult, Resumable, fold_items},
    types::{CallConvention, MethodDef, Payload},
    value::{DictKey, StrKey, Value},
};

/// Insertion-ordered mapping used for dict objects, instance attribute
/// dictionaries and type namespaces.
///
/// Each entry keeps the original key value next to the value so iteration
/// returns keys exactly as inserted (`True` stays `True` even though it
/// shares a slot with `1`).
///
/// `version` increments whenever an entry is added or removed. Iterators record
/// it on creation and fail if it moves.
#[derive(Debug, Clone, Default)]
pub struct Dict {
    map: IndexMap<DictKey, (Value, Value), ahash::RandomState>,
    version: u64,
}

impl Dict {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.map.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.map.is_empty()
    }

    #[must_use]
    pub fn version(&self) -> u64 {
        self.version
    }

    pub fn get(&self, key: &Value) -> RunResult<Option<&Value>> {
        let key = DictKey::from_value(key)?;
        Ok(self.map.get(&key).map(|(_, v)| v))
    }

    #[must_use]
    pub fn get_str(&self, name: &str) -> Option<&Value> {
        self.map.get(&StrKey(name)).map(|(_, v)| v)
    }

    #[must_use]
    pub fn contains_str(&self, name: &str) -> bool {
        self.map.contains_key(&StrKey(name))
    }

    /// Inserts or replaces an entry, returning the previous value.
    pub fn insert(&mut self, key: Value, value: Value) -> RunResult<Option<Value>> {
        let dict_key = DictKey::from_value(&key)?;
        Ok(self.insert_keyed(dict_key, key, value))
    }

    pub fn insert_str(&mut self, name: &str, value: Value) -> Option<Value> {
        let name: Rc<str> = Rc::from(name);
        self.insert_keyed(DictKey::Str(name.clone()), Value::Str(name), value)
    }

    fn insert_keyed(&mut self, dict_key: DictKey, key: Value, value: Value) -> Option<Value> {
        if let Some(entry) = self.map.get_mut(&dict_key) {
            return Some(std::mem::replace(&mut entry.1, value));
        }
        self.map.insert(dict_key, (key, value));
        self.version += 1;
        None
    }

    pub fn remove(&mut self, key: &Value) -> RunResult<Option<Value>> {
        let key = DictKey::from_value(key)?;
        let removed = self.map.shift_remove(&key).map(|(_, v)| v);
        if removed.is_some() {
            self.version += 1;
        }
        Ok(removed)
    }

    pub fn remove_str(&mut self, name: &str) -> Option<Value> {
        let removed = self.map.shift_remove(&StrKey(name)).map(|(_, v)| v);
        if removed.is_some() {
            self.version += 1;
        }
        removed
    }

    pub fn clear(&mut self) {
        if !self.map.is_empty() {
            self.map.clear();
            self.version += 1;
        }
    }

    /// Entry at insertion position `index`.
    #[must_use]
    pub fn entry_at(&self, index: usize) -> Option<(&Value, &Value)> {
        self.map.get_index(index).map(|(_, (k, v))| (k, v))
    }

    pub fn iter(&self) -> impl Iterator<Item = (&Value, &Value)> {
        self.map.values().map(|(k, v)| (k, v))
    }

    pub fn keys(&self) -> impl Iterator<Item = &Value> {
        self.map.values().map(|(k, _)| k)
    }
}

// === native `dict` type ===

fn done<T>(value: T) -> OpResult<T> {
    Ok(Resumable::Done(value))
}

impl Runtime {
    /// Rejects keys whose type blocks hashing (lists, dicts, classes with `__eq__` but no `__hash__`).
    pub(crate) fn check_hashable(&self, key: &Value) -> RunResult<()> {
        if matches!(key, Value::Ref(_)) && self.resolve_slot(self.type_of(key), SlotId::Hash).is_none() {
            Err(ExcType::unhashable(self.value_type_name(key)))
        } else {
            Ok(())
        }
    }

    fn dict_entries(&self, dict: &Value) -> RunResult<Vec<(Value, Value)>> {
        Ok(self
            .dict_ref(dict)?
            .iter()
            .map(|(k, v)| (k.clone(), v.clone()))
            .collect())
    }
}

fn key_error(key: &Value) -> RunError {
    let shown = DictKey::from_value(key).map_or_else(|_| "?".to_owned(), |k| k.to_string());
    RunError::new(ExcType::KeyError, shown).with_payload(key.clone())
}

pub(crate) fn dict_new(rt: &mut Runtime, cls: HeapId, _args: ArgValues) -> OpResult {
    done(rt.alloc_instance(cls, Payload::Dict(Dict::new())))
}

/// `dict(mapping_or_pairs=(), **kwargs)`
pub(crate) fn dict_init(rt: &mut Runtime, dict: &Value, args: ArgValues) -> OpResult<()> {
    let (positional, kwargs) = args.into_parts();
    if positional.len() > 1 {
        return Err(ExcType::type_error(format!(
            "dict expected at most 1 argument, got {}",
            positional.len()
        )));
    }
    let source = positional.into_iter().next();
    let target = dict.clone();
    let apply_kwargs = move |rt: &mut Runtime| -> OpResult<()> {
        for (name, value) in kwargs {
            rt.dict_set(&target, Value::Str(name), value)?;
        }
        done(())
    };
    let Some(source) = source else {
        return apply_kwargs(rt);
    };
    if let Ok(entries) = rt.dict_entries(&source) {
        for (key, value) in entries {
            rt.dict_set(dict, key, value)?;
        }
        return apply_kwargs(rt);
    }
    let target = dict.clone();
    rt.collect(&source)?.and_then(rt, move |rt, pairs| {
        for (position, pair) in pairs.iter().enumerate() {
            let items = rt.sequence_items(pair).unwrap_or_default();
            let [key, value] = <[Value; 2]>::try_from(items).map_err(|items| {
                ExcType::value_error(format!(
                    "dictionary update sequence element #{position} has length {}; 2 is required",
                    items.len()
                ))
            })?;
            rt.check_hashable(&key)?;
            rt.dict_set(&target, key, value)?;
        }
        apply_kwargs(rt)
    })
}

pub(crate) fn dict_repr(rt: &mut Runtime, dict: &Value) -> OpResult<Rc<str>> {
    let entries = rt.dict_entries(dict)?;
    let me = dict.clone();
    let parts = fold_items(rt, entries, Vec::<String>::new(), move |rt, parts, (key, value): (Value, Value)| {
        let me = me.clone();
        rt.repr(&key)?.and_then(rt, move |rt, key_text| {
            let mut parts = parts;
            if value.is(&me) {
                parts.push(format!("{key_text}: {{...}}"));
                return done(LoopControl::Continue(parts));
            }
            Ok(rt.repr(&value)?.map(move |value_text| {
                parts.push(format!("{key_text}: {value_text}"));
                LoopControl::Continue(parts)
            }))
        })
    })?;
    Ok(parts.map(|parts| Rc::from(format!("{{{}}}", parts.join(", ")))))
}

/// Equality only: same keys, and equal values under each key.
pub(crate) fn dict_richcompare(rt: &mut Runtime, a: &Value, b: &Value, op: CompareOp) -> OpResult {
    if !matches!(op, CompareOp::Eq | CompareOp::Ne) || !rt.isinstance(a, rt.core.dict) || !rt.isinstance(b, rt.core.dict) {
        return done(Value::NotImplemented);
    }
    let left = rt.dict_entries(a)?;
    if left.len() != rt.dict_ref(b)?.len() {
        return done(Value::Bool(op == CompareOp::Ne));
    }
    let other = b.clone();
    let equal = fold_items(rt, left, true, move |rt, _, (key, value): (Value, Value)| {
        let Some(theirs) = rt.dict_get(&other, &key)? else {
            return done(LoopControl::Break(false));
        };
        Ok(rt.compare_bool(&value, &theirs, CompareOp::Eq)?.map(|eq| {
            if eq {
                LoopControl::Continue(true)
            } else {
                LoopControl::Break(false)
            }
        }))
    })?;
    Ok(equal.map(move |equal| Value::Bool(equal == (op == CompareOp::Eq))))
}

pub(crate) fn dict_len(rt: &mut Runtime, dict: &Value) -> OpResult<usize> {
    done(rt.dict_ref(dict)?.len())
}

pub(crate) fn dict_contains(rt: &mut Runtime, dict: &Value, key: &Value) -> OpResult<bool> {
    rt.check_hashable(key)?;
    done(rt.dict_get(dict, key)?.is_some())
}

pub(crate) fn dict_getitem(rt: &mut Runtime, dict: &Value, key: &Value) -> OpResult {
    rt.check_hashable(key)?;
    match rt.dict_get(dict, key)? {
        Some(value) => done(value),
        None => Err(key_error(key)),
    }
}

pub(crate) fn dict_setitem(rt: &mut Runtime, dict: &Value, key: &Value, value: Option<Value>) -> OpResult<()> {
    rt.check_hashable(key)?;
    match value {
        Some(value) => rt.dict_set(dict, key.clone(), value)?,
        None => {
            if rt.dict_mut(dict)?.remove(key)?.is_none() {
                return Err(key_error(key));
            }
        }
    }
    done(())
}

pub(crate) fn dict_iter(rt: &mut Runtime, dict: &Value) -> OpResult {
    done(rt.new_dict_iter(dict)?)
}

fn dict_keys(rt: &mut Runtime, dict: &Value, _args: ArgValues) -> OpResult {
    let keys = rt.dict_entries(dict)?.into_iter().map(|(k, _)| k).collect();
    done(rt.new_list(keys))
}

fn dict_values(rt: &mut Runtime, dict: &Value, _args: ArgValues) -> OpResult {
    let values = rt.dict_entries(dict)?.into_iter().map(|(_, v)| v).collect();
    done(rt.new_list(values))
}

fn dict_items(rt: &mut Runtime, dict: &Value, _args: ArgValues) -> OpResult {
    let entries = rt.dict_entries(dict)?;
    let pairs = entries.into_iter().map(|(k, v)| rt.new_tuple(vec![k, v])).collect();
    done(rt.new_list(pairs))
}

fn dict_get_method(rt: &mut Runtime, dict: &Value, args: ArgValues) -> OpResult {
    let mut args = args.get_range("get", 1, 2)?.into_iter();
    let key = args.next().unwrap_or(Value::None);
    let default = args.next().unwrap_or(Value::None);
    rt.check_hashable(&key)?;
    done(rt.dict_get(dict, &key)?.unwrap_or(default))
}

fn dict_pop(rt: &mut Runtime, dict: &Value, args: ArgValues) -> OpResult {
    let mut args = args.get_range("pop", 1, 2)?.into_iter();
    let key = args.next().unwrap_or(Value::None);
    let default = args.next();
    rt.check_hashable(&key)?;
    match (rt.dict_mut(dict)?.remove(&key)?, default) {
        (Some(value), _) | (None, Some(value)) => done(value),
        (None, None) => Err(key_error(&key)),
    }
}

fn dict_setdefault(rt: &mut Runtime, dict: &Value, args: ArgValues) -> OpResult {
    let mut args = args.get_range("setdefault", 1, 2)?.into_iter();
    let key = args.next().unwrap_or(Value::None);
    let default = args.next().unwrap_or(Value::None);
    rt.check_hashable(&key)?;
    if let Some(existing) = rt.dict_get(dict, &key)? {
        return done(existing);
    }
    rt.dict_set(dict, key, default.clone())?;
    done(default)
}

fn dict_clear(rt: &mut Runtime, dict: &Value, _args: ArgValues) -> OpResult {
    rt.dict_mut(dict)?.clear();
    done(Value::None)
}

pub(crate) static DICT_METHODS: [MethodDef; 7] = [
    MethodDef::new("keys", dict_keys, CallConvention::NoArgs).with_doc("Return a list of the dictionary's keys."),
    MethodDef::new("values", dict_values, CallConvention::NoArgs).with_doc("Return a list of the dictionary's values."),
    MethodDef::new("items", dict_items, CallConvention::NoArgs)
        .with_doc("Return a list of the dictionary's (key, value) pairs."),
    MethodDef::new("get", dict_get_method, CallConvention::VarArgs)
        .with_doc("Return the value for key if key is in the dictionary, else default."),
    MethodDef::new("pop", dict_pop, CallConvention::VarArgs)
        .with_doc("Remove specified key and return the corresponding value."),
    MethodDef::new("setdefault", dict_setdefault, CallConvention::VarArgs)
        .with_doc("Insert key with a value of default if key is not in the dictionary."),
    MethodDef::new("clear", dict_clear, CallConvention::NoArgs).with_doc("Remove all items from the dictionary."),
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn version_moves_only_on_size_change() {
        let mut dict = Dict::new();
        dict.insert_str("a", Value::Int(1));
        let v = dict.version();
        dict.insert_str("a", Value::Int(2));
        assert_eq!(dict.version(), v);
        assert_eq!(dict.get_str("a").and_then(Value::as_int), Some(2));
        dict.insert_str("b", Value::Int(3));
        assert_ne!(dict.version(), v);
    }

    #[test]
    fn keeps_original_key_value() {
        let mut dict = Dict::new();
        dict.insert(Value::Bool(true), Value::str("x")).unwrap();
        dict.insert(Value::Int(1), Value::str("y")).unwrap();
        assert_eq!(dict.len(), 1);
        assert!(matches!(dict.entry_at(0), Some((Value::Bool(true), Value::Str(s))) if &**s == "y"));
    }
}
