// Use codspeed-criterion-compat when running on CodSpeed (CI), real criterion otherwise
#[cfg(codspeed)]
use codspeed_criterion_compat::{Bencher, Criterion, black_box, criterion_group, criterion_main};
#[cfg(not(codspeed))]
use criterion::{Bencher, Criterion, black_box, criterion_group, criterion_main};
use slotwork::{ArgValues, BinaryOp, OpResult, Resumable, Runtime, Value};

fn sync<T: 'static>(result: OpResult<T>) -> T {
    match result.unwrap() {
        Resumable::Done(value) => value,
        Resumable::Suspended(_) => panic!("benchmark operation suspended"),
    }
}

/// A class with a user-defined `__add__`, and one subclass deep enough to
/// make attribute lookup walk a few MRO entries.
fn setup() -> (Runtime, Value, Value) {
    let mut rt = Runtime::default();
    let add = rt.new_function("__add__", |_, args| {
        let (_, other) = args.get_two_args("__add__")?;
        Ok(Resumable::Done(other))
    });
    let meta = Value::Ref(rt.core().type_);
    let mut cls = {
        let namespace = rt.new_namespace([("__add__", add), ("level", Value::Int(0))]);
        let bases = rt.new_tuple(vec![]);
        sync(rt.call(&meta, ArgValues::new([Value::str("Level0"), bases, namespace])))
    };
    for depth in 1..5 {
        let namespace = rt.new_dict();
        let bases = rt.new_tuple(vec![cls]);
        cls = sync(rt.call(&meta, ArgValues::new([Value::str(&format!("Level{depth}")), bases, namespace])));
    }
    let obj = sync(rt.call(&cls, ArgValues::empty()));
    (rt, cls, obj)
}

fn native_int_add(bench: &mut Bencher) {
    let mut rt = Runtime::default();
    bench.iter(|| {
        let sum = sync(rt.binary_op(black_box(&Value::Int(20)), black_box(&Value::Int(22)), BinaryOp::Add));
        black_box(sum);
    });
}

fn user_dunder_add(bench: &mut Bencher) {
    let (mut rt, _, obj) = setup();
    bench.iter(|| {
        let sum = sync(rt.binary_op(black_box(&obj), black_box(&Value::Int(1)), BinaryOp::Add));
        black_box(sum);
    });
}

fn inherited_attribute(bench: &mut Bencher) {
    let (mut rt, _, obj) = setup();
    bench.iter(|| {
        let level = sync(rt.get_attribute(black_box(&obj), "level"));
        black_box(level);
    });
}

fn instantiate(bench: &mut Bencher) {
    let (mut rt, cls, _) = setup();
    bench.iter(|| {
        let obj = sync(rt.call(black_box(&cls), ArgValues::empty()));
        black_box(obj);
    });
}

/// Configures the dispatch benchmark group.
fn criterion_benchmark(c: &mut Criterion) {
    c.bench_function("int_add__native", native_int_add);
    c.bench_function("add__user_dunder", user_dunder_add);
    c.bench_function("getattr__inherited_depth_5", inherited_attribute);
    c.bench_function("call__instantiate", instantiate);
}

criterion_group!(benches, criterion_benchmark);
criterion_main!(benches);
