use std::rc::Rc;

use smallvec::SmallVec;

use crate::{
    error::{ExcType, RunResult},
    value::Value,
};

/// Arguments for a call through the call protocol.
///
/// Positional arguments are kept inline for the common case of four or fewer,
/// which covers nearly every dunder invocation and avoids a heap allocation.
/// Keyword arguments keep their call-site order.
#[derive(Debug, Clone, Default)]
pub struct ArgValues {
    args: SmallVec<[Value; 4]>,
    kwargs: Vec<(Rc<str>, Value)>,
}

impl ArgValues {
    #[must_use]
    pub fn new(args: impl IntoIterator<Item = Value>) -> Self {
        Self {
            args: args.into_iter().collect(),
            kwargs: Vec::new(),
        }
    }

    #[must_use]
    pub fn empty() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn one(arg: Value) -> Self {
        let mut args = SmallVec::new();
        args.push(arg);
        Self { args, kwargs: Vec::new() }
    }

    #[must_use]
    pub fn two(a: Value, b: Value) -> Self {
        Self::new([a, b])
    }

    /// Adds a keyword argument.
    #[must_use]
    pub fn kwarg(mut self, name: &str, value: Value) -> Self {
        self.kwargs.push((Rc::from(name), value));
        self
    }

    /// Returns a copy of the arguments with `first` inserted as the first positional.
    ///
    /// Used to bind `self` when calling a method found on a type.
    #[must_use]
    pub fn prepend(mut self, first: Value) -> Self {
        self.args.insert(0, first);
        self
    }

    /// Splits off the first positional argument, typically the receiver of an unbound call.
    pub fn split_first(mut self, name: &str) -> RunResult<(Value, Self)> {
        if self.args.is_empty() {
            return Err(ExcType::type_error(format!(
                "descriptor '{name}' needs an argument"
            )));
        }
        let first = self.args.remove(0);
        Ok((first, self))
    }

    /// Number of positional arguments.
    #[must_use]
    pub fn len(&self) -> usize {
        self.args.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.args.is_empty() && self.kwargs.is_empty()
    }

    #[must_use]
    pub fn has_kwargs(&self) -> bool {
        !self.kwargs.is_empty()
    }

    #[must_use]
    pub fn positional(&self) -> &[Value] {
        &self.args
    }

    #[must_use]
    pub fn kwargs(&self) -> &[(Rc<str>, Value)] {
        &self.kwargs
    }

    /// Removes and returns the keyword argument `name`, if it was passed.
    pub fn take_kwarg(&mut self, name: &str) -> Option<Value> {
        let pos = self.kwargs.iter().position(|(k, _)| &**k == name)?;
        Some(self.kwargs.remove(pos).1)
    }

    pub fn into_parts(self) -> (SmallVec<[Value; 4]>, Vec<(Rc<str>, Value)>) {
        (self.args, self.kwargs)
    }

    pub fn check_no_kwargs(&self, name: &str) -> RunResult<()> {
        if self.kwargs.is_empty() {
            Ok(())
        } else {
            Err(ExcType::no_kwargs(name))
        }
    }

    /// Checks that zero arguments were passed.
    pub fn check_zero_args(&self, name: &str) -> RunResult<()> {
        self.check_no_kwargs(name)?;
        if self.args.is_empty() {
            Ok(())
        } else {
            Err(ExcType::type_error(format!(
                "{name}() takes no arguments ({} given)",
                self.args.len()
            )))
        }
    }

    /// Checks that exactly one positional argument was passed, returning it.
    pub fn get_one_arg(self, name: &str) -> RunResult<Value> {
        let [a] = self.get_exact::<1>(name)?;
        Ok(a)
    }

    /// Checks that exactly two positional arguments were passed, returning them as a tuple.
    pub fn get_two_args(self, name: &str) -> RunResult<(Value, Value)> {
        let [a, b] = self.get_exact::<2>(name)?;
        Ok((a, b))
    }

    /// Checks that exactly three positional arguments were passed, returning them as a tuple.
    pub fn get_three_args(self, name: &str) -> RunResult<(Value, Value, Value)> {
        let [a, b, c] = self.get_exact::<3>(name)?;
        Ok((a, b, c))
    }

    /// Accepts between `min` and `max` positional arguments, returning them.
    pub fn get_range(self, name: &str, min: usize, max: usize) -> RunResult<SmallVec<[Value; 4]>> {
        self.check_no_kwargs(name)?;
        let count = self.args.len();
        if count < min {
            return Err(ExcType::type_error(format!(
                "{name} expected at least {min} argument{}, got {count}",
                if min == 1 { "" } else { "s" }
            )));
        }
        if count > max {
            return Err(ExcType::type_error(format!(
                "{name} expected at most {max} argument{}, got {count}",
                if max == 1 { "" } else { "s" }
            )));
        }
        Ok(self.args)
    }

    fn get_exact<const N: usize>(self, name: &str) -> RunResult<[Value; N]> {
        self.check_no_kwargs(name)?;
        let count = self.args.len();
        self.args
            .into_vec()
            .try_into()
            .map_err(|_| ExcType::arg_count(name, N, count))
    }
}

impl From<Vec<Value>> for ArgValues {
    fn from(args: Vec<Value>) -> Self {
        Self::new(args)
    }
}

impl<const N: usize> From<[Value; N]> for ArgValues {
    fn from(args: [Value; N]) -> Self {
        Self::new(args)
    }
}
