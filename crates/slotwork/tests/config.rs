//! Tests for runtime configuration: serialized configs, the dunder dialect
//! and the limits the runtime enforces.

use std::{cell::RefCell, rc::Rc};

mod common;

use common::{class, sync, sync_err};
use pretty_assertions::assert_eq;
use slotwork::{
    ArgValues, DEFAULT_MAX_RECURSION_DEPTH, Dialect, ExcType, Resumable, RunError, Runtime, RuntimeConfig, Value,
};

// ============================================================================
// Serialized configuration
// ============================================================================

/// Missing fields take their defaults.
#[test]
fn partial_json_config() {
    let config: RuntimeConfig = serde_json::from_str(r#"{"dialect": "legacy"}"#).unwrap();
    assert_eq!(config.dialect, Dialect::Legacy);
    assert_eq!(config.max_recursion_depth, DEFAULT_MAX_RECURSION_DEPTH);
    assert_eq!(config, RuntimeConfig::new().dialect(Dialect::Legacy));
}

#[test]
fn config_serializes_dialect_in_lowercase() {
    let config = RuntimeConfig::new().max_recursion_depth(64);
    let json = serde_json::to_value(&config).unwrap();
    assert_eq!(json["dialect"], "modern");
    assert_eq!(json["max_recursion_depth"], 64);
}

#[test]
fn dialect_parses_from_str() {
    assert_eq!("legacy".parse::<Dialect>().unwrap(), Dialect::Legacy);
    assert_eq!(Dialect::Modern.to_string(), "modern");
    assert!("python2".parse::<Dialect>().is_err());
}

// ============================================================================
// Dialects
// ============================================================================

/// Under the legacy dialect truthiness is spelled `__nonzero__` and `__bool__` is an ordinary name.
#[test]
fn legacy_dialect_uses_legacy_hook_names() {
    let mut rt = Runtime::new(RuntimeConfig::new().dialect(Dialect::Legacy));
    let falsy = rt.new_function("hook", |_, _| Ok(Resumable::Done(Value::Bool(false))));

    let legacy = class(&mut rt, "Legacy", &[], vec![("__nonzero__", falsy.clone())]);
    let obj = sync(rt.call(&legacy, ArgValues::empty()));
    assert!(!sync(rt.is_true(&obj)));

    let modern = class(&mut rt, "Modern", &[], vec![("__bool__", falsy)]);
    let obj = sync(rt.call(&modern, ArgValues::empty()));
    assert!(sync(rt.is_true(&obj)));

    let int_id = rt.core().int;
    assert!(rt.type_dict_get(int_id, "__nonzero__").is_some());
    assert!(rt.type_dict_get(int_id, "__bool__").is_none());
}

/// Switching dialects renames the hooks on the core types and reports each rename.
#[test]
fn switching_dialect_migrates_core_types() {
    let mut rt = Runtime::default();
    let int_id = rt.core().int;
    let migration = rt.set_dialect(Dialect::Legacy);

    assert_eq!(migration.from, Dialect::Modern);
    assert_eq!(migration.to, Dialect::Legacy);
    assert!(
        migration
            .renamed
            .iter()
            .any(|hook| &*hook.type_name == "int" && hook.old_name == "__bool__" && hook.new_name == "__nonzero__")
    );
    assert!(rt.type_dict_get(int_id, "__nonzero__").is_some());
    assert!(rt.type_dict_get(int_id, "__bool__").is_none());
    assert_eq!(rt.dialect(), Dialect::Legacy);

    // core behavior is unaffected by the rename
    assert!(!sync(rt.is_true(&Value::Int(0))));
    let list = rt.new_list(vec![Value::Int(1)]);
    assert_eq!(sync(rt.collect(&list)).len(), 1);

    let back = rt.set_dialect(Dialect::Modern);
    assert_eq!(back.renamed.len(), migration.renamed.len());
    assert!(rt.type_dict_get(int_id, "__bool__").is_some());
}

/// A hook a user class inherits through its MRO survives a dialect switch.
#[test]
fn switching_dialect_keeps_inherited_user_hooks() {
    let mut rt = Runtime::default();
    let falsy = rt.new_function("__bool__", |_, _| Ok(Resumable::Done(Value::Bool(false))));
    let left = class(&mut rt, "Left", &[], vec![]);
    let right = class(&mut rt, "Right", &[], vec![("__bool__", falsy)]);
    let both = class(&mut rt, "Both", &[left, right], vec![]);
    assert!(!rt.is_prototypical(rt.as_type(&both).unwrap()));
    let obj = sync(rt.call(&both, ArgValues::empty()));
    assert!(!sync(rt.is_true(&obj)));

    rt.set_dialect(Dialect::Legacy);
    assert!(!sync(rt.is_true(&obj)));
    rt.set_dialect(Dialect::Modern);
    assert!(!sync(rt.is_true(&obj)));
}

/// Switching to the current dialect changes nothing.
#[test]
fn switching_to_same_dialect_is_a_no_op() {
    let mut rt = Runtime::default();
    let migration = rt.set_dialect(Dialect::Modern);
    assert!(migration.renamed.is_empty());
}

/// A legacy iterator advances through `next`.
#[test]
fn legacy_iterator_protocol() {
    let mut rt = Runtime::new(RuntimeConfig::new().dialect(Dialect::Legacy));
    let iter = rt.new_function("__iter__", |_, args| Ok(Resumable::Done(args.get_one_arg("__iter__")?)));
    let next = rt.new_function("next", |_, _| Err(RunError::new(ExcType::StopIteration, "")));
    let cls = class(&mut rt, "Empty", &[], vec![("__iter__", iter), ("next", next)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));
    assert!(sync(rt.collect(&obj)).is_empty());
}

// ============================================================================
// Limits
// ============================================================================

/// Unbounded recursion through the call protocol raises RecursionError and releases the depth.
#[test]
fn recursion_limit() {
    let mut rt = Runtime::new(RuntimeConfig::new().max_recursion_depth(50));
    let me: Rc<RefCell<Option<Value>>> = Rc::default();
    let callee = Rc::clone(&me);
    let recurse = rt.new_function("recurse", move |rt, _| {
        let target = callee.borrow().clone().expect("function not registered");
        rt.call(&target, ArgValues::empty())
    });
    *me.borrow_mut() = Some(recurse.clone());

    let err = sync_err(rt.call(&recurse, ArgValues::empty()));
    assert!(err.is(ExcType::RecursionError));
    assert!(err.is(ExcType::RuntimeError));
    assert_eq!(err.message(), "maximum recursion depth exceeded");
    assert_eq!(rt.call_depth(), 0);

    // the runtime is usable afterwards
    let ok = rt.new_function("ok", |_, _| Ok(Resumable::Done(Value::Int(1))));
    assert_eq!(sync(rt.call(&ok, ArgValues::empty())).as_int(), Some(1));
}

/// A chain of single inheritance longer than the configured limit is refused.
#[test]
fn inheritance_depth_limit() {
    let mut rt = Runtime::new(RuntimeConfig::new().max_inheritance_depth(4));
    let mut cls = class(&mut rt, "C0", &[], vec![]);
    let mut result = Ok(());
    for i in 1..10 {
        let namespace = rt.new_dict();
        let bases = rt.new_tuple(vec![cls.clone()]);
        let meta = Value::Ref(rt.core().type_);
        match rt.call(&meta, ArgValues::new([Value::str(&format!("C{i}")), bases, namespace])) {
            Ok(Resumable::Done(next)) => cls = next,
            Ok(Resumable::Suspended(_)) => panic!("unexpected suspension"),
            Err(err) => {
                result = Err(err);
                break;
            }
        }
    }
    let err = result.unwrap_err();
    assert!(err.is(ExcType::TypeError));
    assert_eq!(err.message(), "inheritance chain too deep (maximum depth 4)");
    assert_eq!(rt.type_name(rt.as_type(&cls).unwrap()).as_ref(), "C2");
}

/// Runtime statistics count the core types.
#[test]
fn heap_stats_count_types() {
    let mut rt = Runtime::default();
    let before = rt.heap_stats();
    class(&mut rt, "Counted", &[], vec![]);
    let after = rt.heap_stats();
    assert!(after.live_objects > before.live_objects);
}
