//! `str`: immutable text. Immediates carry exact strings; subclass instances
//! keep their content in a primitive payload.

use std::{hash::BuildHasher, rc::Rc};

use crate::{
    args::ArgValues,
    error::{ExcType, RunResult},
    heap::HeapId,
    runtime::Runtime,
    slots::CompareOp,
    suspension::{LoopControl, OpResult, Resumable, iterate_with_suspension},
    types::{CallConvention, MethodDef, Payload, sequence::normalize_index},
    value::Value,
};

fn done<T>(value: T) -> OpResult<T> {
    Ok(Resumable::Done(value))
}

impl Runtime {
    fn expect_str(&self, value: &Value) -> RunResult<Rc<str>> {
        self.str_of(value).ok_or_else(|| {
            ExcType::type_error(format!(
                "descriptor requires a 'str' object but received '{}'",
                self.value_type_name(value)
            ))
        })
    }
}

/// Quotes `text` the way `repr` shows strings.
pub(crate) fn quote(text: &str) -> String {
    let quote = if text.contains('\'') && !text.contains('"') { '"' } else { '\'' };
    let mut out = String::with_capacity(text.len() + 2);
    out.push(quote);
    for c in text.chars() {
        match c {
            '\\' => out.push_str("\\\\"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            c if c == quote => {
                out.push('\\');
                out.push(c);
            }
            c => out.push(c),
        }
    }
    out.push(quote);
    out
}

/// `str(object='')`
pub(crate) fn str_new(rt: &mut Runtime, cls: HeapId, args: ArgValues) -> OpResult {
    args.check_no_kwargs("str")?;
    let arg = args.get_range("str", 0, 1)?.into_iter().next();
    let text = match arg {
        None => Resumable::Done(Rc::from("")),
        Some(arg) => rt.to_str(&arg)?,
    };
    text.and_then(rt, move |rt, text| {
        if cls == rt.core.str_ {
            done(Value::Str(text))
        } else {
            done(rt.alloc_instance(cls, Payload::Primitive(Value::Str(text))))
        }
    })
}

pub(crate) fn str_repr(rt: &mut Runtime, value: &Value) -> OpResult<Rc<str>> {
    let text = rt.expect_str(value)?;
    done(quote(&text).into())
}

pub(crate) fn str_str(rt: &mut Runtime, value: &Value) -> OpResult<Rc<str>> {
    done(rt.expect_str(value)?)
}

/// Deterministic across runs: the hasher uses fixed seeds.
#[expect(clippy::cast_possible_wrap)]
pub(crate) fn str_hash(rt: &mut Runtime, value: &Value) -> OpResult<i64> {
    let text = rt.expect_str(value)?;
    let state = ahash::RandomState::with_seeds(0x5107, 0x3a1d, 0x9e37, 0x79b9);
    done(BuildHasher::hash_one(&state, &*text) as i64)
}

pub(crate) fn str_richcompare(rt: &mut Runtime, a: &Value, b: &Value, op: CompareOp) -> OpResult {
    match (rt.str_of(a), rt.str_of(b)) {
        (Some(x), Some(y)) => done(Value::Bool(op.from_ordering(x.cmp(&y)))),
        _ => done(Value::NotImplemented),
    }
}

pub(crate) fn str_len(rt: &mut Runtime, value: &Value) -> OpResult<usize> {
    done(rt.expect_str(value)?.chars().count())
}

pub(crate) fn str_contains(rt: &mut Runtime, value: &Value, item: &Value) -> OpResult<bool> {
    let haystack = rt.expect_str(value)?;
    let Some(needle) = rt.str_of(item) else {
        return Err(ExcType::type_error(format!(
            "'in <string>' requires string as left operand, not {}",
            rt.value_type_name(item)
        )));
    };
    done(haystack.contains(&*needle))
}

pub(crate) fn str_getitem(rt: &mut Runtime, value: &Value, key: &Value) -> OpResult {
    let text = rt.expect_str(value)?;
    let index = normalize_index(rt, key, text.chars().count(), "string")?;
    let c = text.chars().nth(index).map(String::from).unwrap_or_default();
    done(Value::Str(c.into()))
}

pub(crate) fn str_concat(rt: &mut Runtime, left: &Value, right: &Value) -> OpResult {
    match (rt.str_of(left), rt.str_of(right)) {
        (Some(a), Some(b)) => {
            let mut joined = String::with_capacity(a.len() + b.len());
            joined.push_str(&a);
            joined.push_str(&b);
            done(Value::Str(joined.into()))
        }
        _ => done(Value::NotImplemented),
    }
}

pub(crate) fn str_repeat(rt: &mut Runtime, left: &Value, right: &Value) -> OpResult {
    let (text, count) = match (rt.str_of(left), rt.str_of(right)) {
        (Some(text), None) => (text, rt.int_of(right)),
        (None, Some(text)) => (text, rt.int_of(left)),
        _ => return done(Value::NotImplemented),
    };
    let Some(count) = count else {
        return done(Value::NotImplemented);
    };
    let count = usize::try_from(count).unwrap_or(0);
    text.len()
        .checked_mul(count)
        .ok_or_else(|| ExcType::overflow("repeated string is too long"))?;
    done(Value::Str(text.repeat(count).into()))
}

fn str_upper(rt: &mut Runtime, value: &Value, _args: ArgValues) -> OpResult {
    let text = rt.expect_str(value)?;
    done(Value::Str(text.to_uppercase().into()))
}

fn str_lower(rt: &mut Runtime, value: &Value, _args: ArgValues) -> OpResult {
    let text = rt.expect_str(value)?;
    done(Value::Str(text.to_lowercase().into()))
}

fn affix_arg(rt: &Runtime, method: &str, arg: &Value) -> RunResult<Rc<str>> {
    rt.str_of(arg).ok_or_else(|| {
        ExcType::type_error(format!(
            "{method} first arg must be str, not {}",
            rt.value_type_name(arg)
        ))
    })
}

fn str_startswith(rt: &mut Runtime, value: &Value, args: ArgValues) -> OpResult {
    let text = rt.expect_str(value)?;
    let prefix = affix_arg(rt, "startswith", &args.get_one_arg("startswith")?)?;
    done(Value::Bool(text.starts_with(&*prefix)))
}

fn str_endswith(rt: &mut Runtime, value: &Value, args: ArgValues) -> OpResult {
    let text = rt.expect_str(value)?;
    let suffix = affix_arg(rt, "endswith", &args.get_one_arg("endswith")?)?;
    done(Value::Bool(text.ends_with(&*suffix)))
}

/// `sep.join(iterable)`: every item must be a string.
fn str_join(rt: &mut Runtime, value: &Value, args: ArgValues) -> OpResult {
    let separator = rt.expect_str(value)?;
    let iterable = args.get_one_arg("join")?;
    rt.get_iter(&iterable)?.and_then(rt, move |rt, iterator| {
        let parts = iterate_with_suspension(rt, iterator, Vec::<Rc<str>>::new(), |rt, mut parts, item| {
            let Some(text) = rt.str_of(&item) else {
                return Err(ExcType::type_error(format!(
                    "sequence item {}: expected str instance, {} found",
                    parts.len(),
                    rt.value_type_name(&item)
                )));
            };
            parts.push(text);
            done(LoopControl::Continue(parts))
        })?;
        Ok(parts.map(move |parts| Value::Str(parts.join(&*separator).into())))
    })
}

pub(crate) static STR_METHODS: [MethodDef; 5] = [
    MethodDef::new("upper", str_upper, CallConvention::NoArgs).with_doc("Return a copy of the string converted to uppercase."),
    MethodDef::new("lower", str_lower, CallConvention::NoArgs).with_doc("Return a copy of the string converted to lowercase."),
    MethodDef::new("startswith", str_startswith, CallConvention::OneArg)
        .with_doc("Return True if the string starts with the specified prefix, False otherwise."),
    MethodDef::new("endswith", str_endswith, CallConvention::OneArg)
        .with_doc("Return True if the string ends with the specified suffix, False otherwise."),
    MethodDef::new("join", str_join, CallConvention::OneArg).with_doc("Concatenate any number of strings."),
];
