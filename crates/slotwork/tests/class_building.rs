//! Tests for the class-building pipeline.
//!
//! Covers three-argument `type()`, the class-statement path through
//! `Runtime::build_class`, MRO computation, base validation and the hooks
//! run once a class exists (`__set_name__`, `__init_subclass__`, the class cell).

mod common;

use common::{class, sync, sync_err};
use pretty_assertions::assert_eq;
use slotwork::{ArgValues, BinaryOp, ClassDef, ClassScope, ExcType, OpResult, Resumable, Runtime, TypeFlags, Value};

fn mro_names(rt: &Runtime, cls: &Value) -> Vec<String> {
    let id = rt.as_type(cls).expect("not a type");
    rt.mro_of(id).iter().map(|t| rt.type_name(*t).to_string()).collect()
}

// =============================================================================
// 1. Three-argument type()
// =============================================================================

/// A class built from a namespace dict exposes its functions as bound methods.
#[test]
fn three_argument_type_builds_a_usable_class() {
    let mut rt = Runtime::default();
    let greet = rt.new_function("greet", |rt, args| {
        let (this, _) = args.split_first("greet")?;
        rt.get_attribute(&this, "name")?
            .and_then(rt, |rt, name| rt.binary_op(&Value::str("hello, "), &name, BinaryOp::Add))
    });
    let greeter = class(&mut rt, "Greeter", &[], vec![("greet", greet)]);

    let obj = sync(rt.call(&greeter, ArgValues::empty()));
    sync(rt.set_attribute(&obj, "name", Value::str("Ada")));
    let greeting = sync(rt.invoke_method(&obj, "greet", ArgValues::empty()));

    assert_eq!(greeting.as_str(), Some("hello, Ada"));
    assert_eq!(mro_names(&rt, &greeter), ["Greeter", "object"]);
    let flags = rt.type_flags(rt.as_type(&greeter).unwrap());
    assert!(flags.contains(TypeFlags::HEAPTYPE | TypeFlags::HAS_DICT));
}

/// `type(x)` with a single argument is the type query, not a class declaration.
#[test]
fn one_argument_type_returns_the_type() {
    let mut rt = Runtime::default();
    let meta = Value::Ref(rt.core().type_);
    let int_type = sync(rt.call(&meta, ArgValues::one(Value::Int(3))));
    assert_eq!(rt.as_type(&int_type), Some(rt.core().int));
}

/// Arguments of the wrong kind are rejected before anything is allocated.
#[test]
fn type_new_validates_its_arguments() {
    let mut rt = Runtime::default();
    let meta = Value::Ref(rt.core().type_);
    let namespace = rt.new_dict();
    let not_a_tuple = rt.new_list(vec![]);
    let err = sync_err(rt.call(&meta, ArgValues::new([Value::str("X"), not_a_tuple, namespace])));
    assert!(err.is(ExcType::TypeError));
    assert_eq!(err.message(), "type.__new__() argument 2 must be tuple, not list");
}

// =============================================================================
// 2. MRO and bases
// =============================================================================

/// Diamond inheritance linearizes with C3.
#[test]
fn diamond_mro_is_c3() {
    let mut rt = Runtime::default();
    let a = class(&mut rt, "A", &[], vec![]);
    let b = class(&mut rt, "B", &[a.clone()], vec![]);
    let c = class(&mut rt, "C", &[a], vec![]);
    let d = class(&mut rt, "D", &[b, c], vec![]);
    assert_eq!(mro_names(&rt, &d), ["D", "B", "C", "A", "object"]);
}

/// Bases whose orders contradict each other have no consistent MRO.
#[test]
fn inconsistent_mro_is_rejected() {
    let mut rt = Runtime::default();
    let x = class(&mut rt, "X", &[], vec![]);
    let y = class(&mut rt, "Y", &[], vec![]);
    let a = class(&mut rt, "A", &[x.clone(), y.clone()], vec![]);
    let b = class(&mut rt, "B", &[y, x], vec![]);

    let namespace = rt.new_dict();
    let bases = rt.new_tuple(vec![a, b]);
    let meta = Value::Ref(rt.core().type_);
    let err = sync_err(rt.call(&meta, ArgValues::new([Value::str("C"), bases, namespace])));
    assert!(err.is(ExcType::TypeError));
    assert!(err.message().starts_with("Cannot create a consistent method resolution order"));
}

/// `bool` is final.
#[test]
fn bool_is_not_an_acceptable_base() {
    let mut rt = Runtime::default();
    let bool_type = Value::Ref(rt.core().bool_);
    let err = sync_err(rt.build_class(ClassDef::new("B").base(bool_type), |_: &mut Runtime, _: &ClassScope| {
        Ok(Resumable::Done(()))
    }));
    assert_eq!(err.message(), "type 'bool' is not an acceptable base type");
}

/// Two native layouts cannot be combined.
#[test]
fn layout_conflict_is_rejected() {
    let mut rt = Runtime::default();
    let int_type = Value::Ref(rt.core().int);
    let str_type = Value::Ref(rt.core().str_);
    let namespace = rt.new_dict();
    let bases = rt.new_tuple(vec![int_type, str_type]);
    let meta = Value::Ref(rt.core().type_);
    let err = sync_err(rt.call(&meta, ArgValues::new([Value::str("Both"), bases, namespace])));
    assert_eq!(err.message(), "multiple bases have instance lay-out conflict");
}

/// The same base twice is an error.
#[test]
fn duplicate_base_is_rejected() {
    let mut rt = Runtime::default();
    let a = class(&mut rt, "A", &[], vec![]);
    let namespace = rt.new_dict();
    let bases = rt.new_tuple(vec![a.clone(), a]);
    let meta = Value::Ref(rt.core().type_);
    let err = sync_err(rt.call(&meta, ArgValues::new([Value::str("B"), bases, namespace])));
    assert_eq!(err.message(), "duplicate base class A");
}

/// A subclass of `int` keeps the int layout and arithmetic.
#[test]
fn subclass_of_int_inherits_arithmetic() {
    let mut rt = Runtime::default();
    let int_type = Value::Ref(rt.core().int);
    let my_int = class(&mut rt, "MyInt", &[int_type], vec![]);
    let five = sync(rt.call(&my_int, ArgValues::one(Value::Int(5))));
    assert_eq!(rt.int_of(&five), Some(5));
    let sum = sync(rt.binary_op(&five, &Value::Int(2), BinaryOp::Add));
    assert_eq!(sum.as_int(), Some(7));
}

// =============================================================================
// 3. The class statement
// =============================================================================

/// The body runs against the class namespace and `__init__` receives constructor arguments.
#[test]
fn class_statement_runs_body_and_init() {
    let mut rt = Runtime::default();
    let globals = rt.new_namespace([("__name__", Value::str("shapes"))]);
    let point = sync(rt.build_class(
        ClassDef::new("Point").globals(globals),
        |rt: &mut Runtime, scope: &ClassScope| {
            let init = rt.new_function("__init__", |rt, args| {
                let (this, rest) = args.split_first("__init__")?;
                let (x, y) = rest.get_two_args("__init__")?;
                rt.set_attribute(&this, "x", x)?.and_then(rt, move |rt, ()| {
                    Ok(rt.set_attribute(&this, "y", y)?.map(|()| Value::None))
                })
            });
            scope.define(rt, "__init__", init)?;
            scope.define(rt, "dims", Value::Int(2))?;
            Ok(Resumable::Done(()))
        },
    ));

    let p = sync(rt.call(&point, ArgValues::two(Value::Int(3), Value::Int(4))));
    assert_eq!(sync(rt.get_attribute(&p, "y")).as_int(), Some(4));
    assert_eq!(sync(rt.get_attribute(&p, "dims")).as_int(), Some(2));
    let module = sync(rt.get_attribute(&point, "__module__"));
    assert_eq!(module.as_str(), Some("shapes"));
    let repr = sync(rt.repr(&point));
    assert_eq!(&*repr, "<class 'shapes.Point'>");
}

/// The metaclass of a derived class is the most derived metaclass among its bases.
#[test]
fn metaclass_is_inherited_from_bases() {
    let mut rt = Runtime::default();
    let type_type = Value::Ref(rt.core().type_);
    let meta = class(&mut rt, "Meta", &[type_type], vec![]);
    let base = sync(rt.build_class(ClassDef::new("Base").metaclass(meta.clone()), |_: &mut Runtime, _: &ClassScope| {
        Ok(Resumable::Done(()))
    }));
    let derived = sync(rt.build_class(ClassDef::new("Derived").base(base), |_: &mut Runtime, _: &ClassScope| {
        Ok(Resumable::Done(()))
    }));
    assert!(Value::Ref(rt.type_of(&derived)).is(&meta));
}

/// Unrelated metaclasses cannot be combined.
#[test]
fn unrelated_metaclasses_conflict() {
    let mut rt = Runtime::default();
    let type_type = Value::Ref(rt.core().type_);
    let meta1 = class(&mut rt, "Meta1", &[type_type.clone()], vec![]);
    let meta2 = class(&mut rt, "Meta2", &[type_type], vec![]);
    let empty = |_: &mut Runtime, _: &ClassScope| -> OpResult<()> { Ok(Resumable::Done(())) };
    let a = sync(rt.build_class(ClassDef::new("A").metaclass(meta1), empty));
    let b = sync(rt.build_class(ClassDef::new("B").metaclass(meta2), empty));
    let err = sync_err(rt.build_class(ClassDef::new("C").base(a).base(b), empty));
    assert!(err.message().starts_with("metaclass conflict"));
}

/// `__classcell__` is filled with the finished class.
#[test]
fn class_cell_receives_the_new_class() {
    let mut rt = Runtime::default();
    let mut cell = None;
    let cls = sync(rt.build_class(ClassDef::new("Cellular"), |rt: &mut Runtime, scope: &ClassScope| {
        cell = Some(scope.classcell(rt)?);
        Ok(Resumable::Done(()))
    }));
    let cell = cell.expect("body did not run");
    assert!(rt.cell_get(&cell).is_some_and(|c| c.is(&cls)));
    assert!(rt.type_dict_get(rt.as_type(&cls).unwrap(), "__classcell__").is_none());
}

/// Double-underscore names in the namespace are stored and found under the name given.
#[test]
fn private_names_keep_their_spelling() {
    let mut rt = Runtime::default();
    let vault = class(&mut rt, "Vault", &[], vec![("__secret", Value::Int(42)), ("__dunder__", Value::Int(1))]);
    let id = rt.as_type(&vault).unwrap();
    assert!(rt.type_dict_get(id, "__secret").is_some());
    assert!(rt.type_dict_get(id, "_Vault__secret").is_none());
    assert_eq!(sync(rt.get_attribute(&vault, "__secret")).as_int(), Some(42));

    let obj = sync(rt.call(&vault, ArgValues::empty()));
    assert_eq!(sync(rt.get_attribute(&obj, "__secret")).as_int(), Some(42));
    assert_eq!(sync(rt.get_attribute(&obj, "__dunder__")).as_int(), Some(1));
}

/// Defining `__eq__` without `__hash__` makes instances unhashable.
#[test]
fn eq_without_hash_disables_hashing() {
    let mut rt = Runtime::default();
    let eq = rt.new_function("__eq__", |_, _| Ok(Resumable::Done(Value::Bool(true))));
    let cls = class(&mut rt, "Eq", &[], vec![("__eq__", eq)]);
    let obj = sync(rt.call(&cls, ArgValues::empty()));
    let err = sync_err(rt.hash(&obj));
    assert_eq!(err.message(), "unhashable type: 'Eq'");

    let plain = class(&mut rt, "Plain", &[], vec![]);
    let obj = sync(rt.call(&plain, ArgValues::empty()));
    assert!(rt.hash(&obj).is_ok());
}

// =============================================================================
// 4. Creation hooks
// =============================================================================

/// `__set_name__` runs for each attribute that defines it, with the owner and the name.
#[test]
fn set_name_hook_receives_owner_and_name() {
    let mut rt = Runtime::default();
    let set_name = rt.new_function("__set_name__", |rt, args| {
        let (this, rest) = args.split_first("__set_name__")?;
        let (owner, name) = rest.get_two_args("__set_name__")?;
        rt.set_attribute(&this, "owner", owner)?.and_then(rt, move |rt, ()| {
            Ok(rt.set_attribute(&this, "name", name)?.map(|()| Value::None))
        })
    });
    let field_type = class(&mut rt, "Field", &[], vec![("__set_name__", set_name)]);
    let field = sync(rt.call(&field_type, ArgValues::empty()));
    let model = class(&mut rt, "Model", &[], vec![("title", field.clone())]);

    assert_eq!(sync(rt.get_attribute(&field, "name")).as_str(), Some("title"));
    assert!(sync(rt.get_attribute(&field, "owner")).is(&model));
}

/// Class keywords reach the parent's `__init_subclass__`, which binds to the new class.
#[test]
fn init_subclass_receives_class_keywords() {
    let mut rt = Runtime::default();
    let hook = rt.new_function("__init_subclass__", |rt, args| {
        let flavor = args.kwargs().iter().find(|(k, _)| &**k == "flavor").map(|(_, v)| v.clone());
        let (cls, _) = args.split_first("__init_subclass__")?;
        let flavor = flavor.unwrap_or(Value::None);
        Ok(rt.set_attribute(&cls, "flavor", flavor)?.map(|()| Value::None))
    });
    let base = class(&mut rt, "Plugin", &[], vec![("__init_subclass__", hook)]);
    let sub = sync(rt.build_class(
        ClassDef::new("Vanilla").base(base.clone()).keyword("flavor", Value::str("vanilla")),
        |_: &mut Runtime, _: &ClassScope| Ok(Resumable::Done(())),
    ));

    assert_eq!(sync(rt.get_attribute(&sub, "flavor")).as_str(), Some("vanilla"));
    let base_id = rt.as_type(&base).unwrap();
    assert!(rt.type_dict_get(base_id, "flavor").is_none());
}

/// `object.__init_subclass__` takes no keywords.
#[test]
fn default_init_subclass_rejects_keywords() {
    let mut rt = Runtime::default();
    let err = sync_err(rt.build_class(
        ClassDef::new("Strict").keyword("unexpected", Value::Int(1)),
        |_: &mut Runtime, _: &ClassScope| Ok(Resumable::Done(())),
    ));
    assert!(err.is(ExcType::TypeError));
}
