//! Tests for attribute resolution, the descriptor protocol and slot updates
//! triggered by assigning dunders on live classes.

mod common;

use common::{class, sync, sync_err};
use pretty_assertions::assert_eq;
use slotwork::{ArgValues, ExcType, Resumable, RunError, Runtime, Value};

/// A function that ignores its arguments and returns `value`.
fn constant(rt: &mut Runtime, name: &str, value: Value) -> Value {
    rt.new_function(name, move |_, _| Ok(Resumable::Done(value.clone())))
}

// === Lookup order ===

/// A data descriptor on the type shadows the instance dictionary.
#[test]
fn property_beats_instance_dict() {
    let mut rt = Runtime::default();
    let getter = constant(&mut rt, "size", Value::Int(10));
    let prop = rt.new_property(getter, Value::None, Value::None);
    let cls = class(&mut rt, "Box", &[], vec![("size", prop)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));

    let dict = sync(rt.get_attribute(&obj, "__dict__"));
    rt.dict_set(&dict, Value::str("size"), Value::Int(99)).unwrap();

    assert_eq!(sync(rt.get_attribute(&obj, "size")).as_int(), Some(10));
}

/// A read-only property refuses assignment.
#[test]
fn property_without_setter_is_read_only() {
    let mut rt = Runtime::default();
    let getter = constant(&mut rt, "size", Value::Int(10));
    let prop = rt.new_property(getter, Value::None, Value::None);
    let cls = class(&mut rt, "Box", &[], vec![("size", prop)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));

    let err = sync_err(rt.set_attribute(&obj, "size", Value::Int(1)));
    assert!(err.is(ExcType::AttributeError));
    assert_eq!(err.message(), "can't set attribute");
}

/// A property setter receives the instance and the new value.
#[test]
fn property_setter_runs() {
    let mut rt = Runtime::default();
    let getter = rt.new_function("get", |rt, args| {
        let this = args.get_one_arg("get")?;
        let dict = rt.get_attribute(&this, "__dict__")?.done().expect("sync");
        Ok(Resumable::Done(rt.dict_get(&dict, &Value::str("_celsius"))?.unwrap_or(Value::None)))
    });
    let setter = rt.new_function("set", |rt, args| {
        let (this, value) = args.get_two_args("set")?;
        let dict = rt.get_attribute(&this, "__dict__")?.done().expect("sync");
        rt.dict_set(&dict, Value::str("_celsius"), value)?;
        Ok(Resumable::Done(Value::None))
    });
    let prop = rt.new_property(getter, setter, Value::None);
    let cls = class(&mut rt, "Thermometer", &[], vec![("celsius", prop)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));

    sync(rt.set_attribute(&obj, "celsius", Value::Int(21)));
    assert_eq!(sync(rt.get_attribute(&obj, "celsius")).as_int(), Some(21));
}

/// The instance dictionary shadows a non-data descriptor such as a function.
#[test]
fn instance_dict_beats_function() {
    let mut rt = Runtime::default();
    let method = constant(&mut rt, "describe", Value::str("from class"));
    let cls = class(&mut rt, "Widget", &[], vec![("describe", method)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));

    let bound = sync(rt.invoke_method(&obj, "describe", ArgValues::empty()));
    assert_eq!(bound.as_str(), Some("from class"));

    sync(rt.set_attribute(&obj, "describe", Value::str("from instance")));
    assert_eq!(sync(rt.get_attribute(&obj, "describe")).as_str(), Some("from instance"));
}

/// A missing attribute names the type in the error message.
#[test]
fn missing_attribute_message() {
    let mut rt = Runtime::default();
    let cls = class(&mut rt, "Foo", &[], vec![]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));

    let err = sync_err(rt.get_attribute(&obj, "bar"));
    assert!(err.is(ExcType::AttributeError));
    assert_eq!(err.message(), "'Foo' object has no attribute 'bar'");

    let err = sync_err(rt.get_attribute(&cls, "bar"));
    assert_eq!(err.message(), "type object 'Foo' has no attribute 'bar'");
}

// === __getattr__ ===

/// `__getattr__` only runs after normal lookup fails.
#[test]
fn getattr_hook_is_a_fallback() {
    let mut rt = Runtime::default();
    let hook = rt.new_function("__getattr__", |_, args| {
        let (_, name) = args.get_two_args("__getattr__")?;
        Ok(Resumable::Done(name))
    });
    let cls = class(&mut rt, "Echo", &[], vec![("__getattr__", hook), ("real", Value::Int(1))]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));

    assert_eq!(sync(rt.get_attribute(&obj, "real")).as_int(), Some(1));
    assert_eq!(sync(rt.get_attribute(&obj, "anything")).as_str(), Some("anything"));
    assert!(sync(rt.has_attribute(&obj, "whatever")));
}

/// `hasattr` treats only AttributeError as "missing".
#[test]
fn has_attribute_propagates_other_errors() {
    let mut rt = Runtime::default();
    let hook = rt.new_function("__getattr__", |_, args| {
        let (_, name) = args.get_two_args("__getattr__")?;
        match name.as_str() {
            Some("broken") => Err(RunError::new(ExcType::ValueError, "boom")),
            _ => Err(RunError::new(ExcType::AttributeError, "nope")),
        }
    });
    let cls = class(&mut rt, "Picky", &[], vec![("__getattr__", hook)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));

    assert!(!sync(rt.has_attribute(&obj, "missing")));
    let err = sync_err(rt.has_attribute(&obj, "broken"));
    assert!(err.is(ExcType::ValueError));
    assert_eq!(err.message(), "boom");
}

/// A metaclass `__getattr__` serves class attribute lookups but not instance lookups.
#[test]
fn metaclass_getattr_applies_to_the_class() {
    let mut rt = Runtime::default();
    let hook = rt.new_function("__getattr__", |_, args| {
        let (_, name) = args.get_two_args("__getattr__")?;
        Ok(Resumable::Done(name))
    });
    let type_type = Value::Ref(rt.core().type_);
    let meta = class(&mut rt, "Lenient", &[type_type], vec![("__getattr__", hook)]);
    let namespace = rt.new_dict();
    let bases = rt.new_tuple(vec![]);
    let cls = sync(rt.call(&meta, ArgValues::new([Value::str("Config"), bases, namespace])));

    assert_eq!(sync(rt.get_attribute(&cls, "debug")).as_str(), Some("debug"));
    let obj = sync(rt.call(&cls, ArgValues::empty()));
    assert!(sync_err(rt.get_attribute(&obj, "debug")).is(ExcType::AttributeError));
}

// === Assignment ===

/// Built-in immutable values have no instance dictionary.
#[test]
fn int_instances_reject_attributes() {
    let mut rt = Runtime::default();
    let err = sync_err(rt.set_attribute(&Value::Int(3), "x", Value::Int(1)));
    assert!(err.is(ExcType::AttributeError));
    assert_eq!(err.message(), "'int' object has no attribute 'x'");

    let int_type = Value::Ref(rt.core().int);
    let err = sync_err(rt.set_attribute(&int_type, "x", Value::Int(1)));
    assert!(err.is(ExcType::TypeError));
    assert_eq!(err.message(), "cannot set 'x' attribute of immutable type 'int'");
}

/// Deleting an instance attribute restores the class attribute.
#[test]
fn delete_instance_attribute() {
    let mut rt = Runtime::default();
    let cls = class(&mut rt, "Layered", &[], vec![("level", Value::Int(0))]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));
    sync(rt.set_attribute(&obj, "level", Value::Int(5)));
    sync(rt.del_attribute(&obj, "level"));
    assert_eq!(sync(rt.get_attribute(&obj, "level")).as_int(), Some(0));
    assert!(sync_err(rt.del_attribute(&obj, "level")).is(ExcType::AttributeError));
}

// === Dynamic slot updates ===

/// Assigning `__len__` on a live class updates it and the subclasses that inherit it.
#[test]
fn assigning_dunder_updates_slot_in_subclasses() {
    let mut rt = Runtime::default();
    let base = class(&mut rt, "Base", &[], vec![]);
    let sub = class(&mut rt, "Sub", &[base.clone()], vec![]);
    let obj = sync(rt.call(&sub, ArgValues::empty()));

    let err = sync_err(rt.length(&obj));
    assert!(err.is(ExcType::TypeError));
    assert!(sync(rt.is_true(&obj)));

    let len = constant(&mut rt, "__len__", Value::Int(0));
    sync(rt.set_attribute(&base, "__len__", len));
    assert_eq!(sync(rt.length(&obj)), 0);
    assert!(!sync(rt.is_true(&obj)));

    sync(rt.del_attribute(&base, "__len__"));
    assert!(sync_err(rt.length(&obj)).is(ExcType::TypeError));
}

/// A subclass that declares the dunder itself keeps its own implementation.
#[test]
fn declaring_subclass_is_not_overwritten() {
    let mut rt = Runtime::default();
    let own = constant(&mut rt, "__len__", Value::Int(7));
    let base = class(&mut rt, "Base", &[], vec![]);
    let sub = class(&mut rt, "Sub", &[base.clone()], vec![("__len__", own)]);
    let obj = sync(rt.call(&sub, ArgValues::empty()));

    let replacement = constant(&mut rt, "__len__", Value::Int(1));
    sync(rt.set_attribute(&base, "__len__", replacement));
    assert_eq!(sync(rt.length(&obj)), 7);
}

/// Assigning `__bases__` re-links the class and changes what its instances inherit.
#[test]
fn reassigning_bases_changes_inheritance() {
    let mut rt = Runtime::default();
    let from_a = constant(&mut rt, "origin", Value::str("a"));
    let from_b = constant(&mut rt, "origin", Value::str("b"));
    let a = class(&mut rt, "A", &[], vec![("origin", from_a)]);
    let b = class(&mut rt, "B", &[], vec![("origin", from_b)]);
    let c = class(&mut rt, "C", &[a], vec![]);
    let obj = sync(rt.call(&c, ArgValues::empty()));
    assert_eq!(sync(rt.invoke_method(&obj, "origin", ArgValues::empty())).as_str(), Some("a"));

    let new_bases = rt.new_tuple(vec![b.clone()]);
    sync(rt.set_attribute(&c, "__bases__", new_bases));

    assert_eq!(sync(rt.invoke_method(&obj, "origin", ArgValues::empty())).as_str(), Some("b"));
    let c_id = rt.as_type(&c).unwrap();
    let b_id = rt.as_type(&b).unwrap();
    assert!(rt.is_subtype(c_id, b_id));
}

/// A `__bases__` assignment that would create a cycle is refused and leaves the class intact.
#[test]
fn reassigning_bases_rejects_cycles() {
    let mut rt = Runtime::default();
    let a = class(&mut rt, "A", &[], vec![]);
    let b = class(&mut rt, "B", &[a.clone()], vec![]);
    let new_bases = rt.new_tuple(vec![b]);
    let err = sync_err(rt.set_attribute(&a, "__bases__", new_bases));
    assert_eq!(err.message(), "a __bases__ item causes an inheritance cycle");
    let a_id = rt.as_type(&a).unwrap();
    assert_eq!(rt.mro_of(a_id).len(), 2);
}

// === Method wrappers and super ===

/// `super(B, obj).method` starts the lookup after `B` in the instance's MRO.
#[test]
fn super_skips_the_start_class() {
    let mut rt = Runtime::default();
    let base_name = constant(&mut rt, "name", Value::str("base"));
    let child_name = constant(&mut rt, "name", Value::str("child"));
    let base = class(&mut rt, "Base", &[], vec![("name", base_name)]);
    let child = class(&mut rt, "Child", &[base], vec![("name", child_name)]);
    let obj = sync(rt.call(&child, ArgValues::empty()));

    let child_id = rt.as_type(&child).unwrap();
    let proxy = rt.new_super(child_id, obj.clone()).unwrap();
    assert_eq!(sync(rt.invoke_method(&proxy, "name", ArgValues::empty())).as_str(), Some("base"));
    assert_eq!(sync(rt.invoke_method(&obj, "name", ArgValues::empty())).as_str(), Some("child"));
}

/// `super()` needs an instance or subclass of its first argument.
#[test]
fn super_checks_its_object() {
    let mut rt = Runtime::default();
    let a = class(&mut rt, "A", &[], vec![]);
    let unrelated = class(&mut rt, "Unrelated", &[], vec![]);
    let obj = sync(rt.call(&unrelated, ArgValues::empty()));
    let err = rt.new_super(rt.as_type(&a).unwrap(), obj).unwrap_err();
    assert!(err.is(ExcType::TypeError));
}

/// A staticmethod never binds; a classmethod binds to the class, even through an instance.
#[test]
fn staticmethod_and_classmethod_binding() {
    let mut rt = Runtime::default();
    let add = rt.new_function("add", |rt, args| {
        let (a, b) = args.get_two_args("add")?;
        rt.binary_op(&a, &b, slotwork::BinaryOp::Add)
    });
    let static_add = rt.new_staticmethod(add);
    let which = rt.new_function("which", |_, args| Ok(Resumable::Done(args.get_one_arg("which")?)));
    let class_which = rt.new_classmethod(which);
    let cls = class(&mut rt, "Tools", &[], vec![("add", static_add), ("which", class_which)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));

    let sum = sync(rt.invoke_method(&obj, "add", ArgValues::two(Value::Int(2), Value::Int(3))));
    assert_eq!(sum.as_int(), Some(5));
    let via_class = sync(rt.invoke_method(&cls, "add", ArgValues::two(Value::Int(4), Value::Int(4))));
    assert_eq!(via_class.as_int(), Some(8));

    assert!(sync(rt.invoke_method(&obj, "which", ArgValues::empty())).is(&cls));
    assert!(sync(rt.invoke_method(&cls, "which", ArgValues::empty())).is(&cls));
}

/// The generic `object.__setattr__` refuses objects whose native base installs its own setter.
#[test]
fn generic_setattr_cannot_bypass_type_setter() {
    let mut rt = Runtime::default();
    let object = Value::Ref(rt.core().object);
    let setattr = sync(rt.get_attribute(&object, "__setattr__"));

    let plain = class(&mut rt, "Plain", &[], vec![]);
    let obj = sync(rt.call(&plain, ArgValues::empty()));
    sync(rt.call(&setattr, ArgValues::new([obj.clone(), Value::str("x"), Value::Int(1)])));
    assert_eq!(sync(rt.get_attribute(&obj, "x")).as_int(), Some(1));

    let err = sync_err(rt.call(&setattr, ArgValues::new([plain, Value::str("x"), Value::Int(1)])));
    assert!(err.is(ExcType::TypeError));
    assert_eq!(err.message(), "can't apply this __setattr__ to type object");
}
