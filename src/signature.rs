//! Callable signatures: argument declarations, call-site binding, and
//! argument type checking.
//!
//! Binding and type checking return `Result<_, String>` rather than a full
//! `CompileError`: the caller owns the call-site location and wraps the
//! message once per call.

use std::collections::HashMap;
use std::fmt;

use anyhow::{bail, Result};

use crate::types::ValueType;

/// How a declared argument binds at the call site.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ArgKind {
    Required,
    Optional,
    Var,
}

/// The type class an argument accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TypeClass {
    Boolean,
    Integer,
    Float,
    Numeric,
    String,
    Any,
}

impl TypeClass {
    fn matches_base(&self, base: ValueType) -> bool {
        match self {
            TypeClass::Boolean => base == ValueType::Boolean,
            TypeClass::Integer => base == ValueType::Integer,
            TypeClass::Float => base == ValueType::Float,
            TypeClass::Numeric => matches!(base, ValueType::Integer | ValueType::Float),
            TypeClass::String => base == ValueType::String,
            TypeClass::Any => true,
        }
    }

    fn name(&self) -> &'static str {
        match self {
            TypeClass::Boolean => "BOOLEAN",
            TypeClass::Integer => "INTEGER",
            TypeClass::Float => "FLOAT",
            TypeClass::Numeric => "INTEGER or FLOAT",
            TypeClass::String => "STRING",
            TypeClass::Any => "any type",
        }
    }
}

/// Type predicate for one declared argument.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ArgMatcher {
    class: TypeClass,
    allow_missing: bool,
}

impl ArgMatcher {
    pub fn boolean() -> Self {
        Self {
            class: TypeClass::Boolean,
            allow_missing: false,
        }
    }

    pub fn integer() -> Self {
        Self {
            class: TypeClass::Integer,
            allow_missing: false,
        }
    }

    pub fn float() -> Self {
        Self {
            class: TypeClass::Float,
            allow_missing: false,
        }
    }

    pub fn numeric() -> Self {
        Self {
            class: TypeClass::Numeric,
            allow_missing: false,
        }
    }

    pub fn string() -> Self {
        Self {
            class: TypeClass::String,
            allow_missing: false,
        }
    }

    pub fn any() -> Self {
        Self {
            class: TypeClass::Any,
            allow_missing: false,
        }
    }

    /// Also accept the optional (missing-capable) flavor of the class, and
    /// the `MISSING` type itself for `any`.
    pub fn or_missing(mut self) -> Self {
        self.allow_missing = true;
        self
    }

    pub fn matches(&self, t: ValueType) -> bool {
        if t == ValueType::Missing {
            return self.allow_missing && self.class == TypeClass::Any;
        }
        self.class.matches_base(t.base_type()) && (self.allow_missing || !t.is_optional())
    }

    /// True when only the optional wrapper is the problem: the base type
    /// would be accepted. Drives the "handle MISSING first" diagnostic.
    pub fn matches_base_only(&self, t: ValueType) -> bool {
        !self.matches(t) && t.is_optional() && self.matches(t.base_type())
    }
}

impl fmt::Display for ArgMatcher {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.allow_missing {
            write!(f, "{} | MISSING", self.class.name())
        } else {
            write!(f, "{}", self.class.name())
        }
    }
}

/// One declared argument of a callable.
#[derive(Debug, Clone)]
pub struct Arg {
    pub name: String,
    pub description: String,
    pub matcher: ArgMatcher,
    pub kind: ArgKind,
}

impl Arg {
    pub fn required(
        name: impl Into<String>,
        description: impl Into<String>,
        matcher: ArgMatcher,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            matcher,
            kind: ArgKind::Required,
        }
    }

    pub fn optional(
        name: impl Into<String>,
        description: impl Into<String>,
        matcher: ArgMatcher,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            matcher,
            kind: ArgKind::Optional,
        }
    }

    pub fn var(
        name: impl Into<String>,
        description: impl Into<String>,
        matcher: ArgMatcher,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            matcher,
            kind: ArgKind::Var,
        }
    }
}

/// Ordered argument declarations of a callable.
#[derive(Debug, Clone)]
pub struct Signature {
    args: Vec<Arg>,
}

impl Signature {
    /// Validates declaration order: all required arguments first, at most
    /// one variadic argument, and the variadic argument last.
    pub fn new(args: Vec<Arg>) -> Result<Self> {
        let mut seen_non_required = false;
        let mut seen_var = false;
        for arg in &args {
            if seen_var {
                bail!(
                    "invalid signature: argument '{}' declared after the variadic argument",
                    arg.name
                );
            }
            match arg.kind {
                ArgKind::Required => {
                    if seen_non_required {
                        bail!(
                            "invalid signature: required argument '{}' declared after an optional argument",
                            arg.name
                        );
                    }
                }
                ArgKind::Optional => seen_non_required = true,
                ArgKind::Var => {
                    seen_non_required = true;
                    seen_var = true;
                }
            }
        }
        Ok(Self { args })
    }

    pub fn args(&self) -> &[Arg] {
        &self.args
    }

    /// Index of the variadic argument, or the argument count if none.
    pub fn var_position(&self) -> usize {
        self.args
            .iter()
            .position(|arg| arg.kind == ArgKind::Var)
            .unwrap_or(self.args.len())
    }

    fn has_var(&self) -> bool {
        self.var_position() < self.args.len()
    }

    fn arg(&self, name: &str) -> Option<&Arg> {
        self.args.iter().find(|arg| arg.name == name)
    }

    /// Match call-site arguments against this signature.
    ///
    /// Positional values fill declared slots in order; positionals past the
    /// variadic position become the overflow list; named values fill the
    /// remaining slots by name. Fails on surplus positionals (without a
    /// variadic argument), double assignment, unknown names, or unfilled
    /// required arguments.
    pub fn bind<T>(
        &self,
        positional: Vec<T>,
        named: HashMap<String, T>,
    ) -> Result<BoundArguments<T>, String> {
        let var_pos = self.var_position();

        if !self.has_var() && positional.len() > self.args.len() {
            let names: Vec<&str> = self.args.iter().map(|arg| arg.name.as_str()).collect();
            return Err(format!(
                "too many arguments: expected at most {} ({}), got {}",
                self.args.len(),
                names.join(", "),
                positional.len()
            ));
        }

        let mut slots: Vec<Option<T>> = Vec::new();
        slots.resize_with(self.args.len(), || None);
        let mut variadic: Vec<T> = Vec::new();

        for (i, value) in positional.into_iter().enumerate() {
            if i < var_pos {
                slots[i] = Some(value);
            } else {
                variadic.push(value);
            }
        }

        for (name, value) in named {
            match self.args.iter().position(|arg| arg.name == name) {
                Some(i) => {
                    if slots[i].is_some() {
                        return Err(format!("argument '{}' was provided twice", name));
                    }
                    slots[i] = Some(value);
                }
                None => return Err(format!("no argument named '{}'", name)),
            }
        }

        let mut filled = Vec::new();
        for (arg, slot) in self.args.iter().zip(slots) {
            match slot {
                Some(value) => filled.push((arg.name.clone(), value)),
                None => {
                    if arg.kind == ArgKind::Required {
                        return Err(format!("missing required argument: {}", arg.name));
                    }
                }
            }
        }

        Ok(BoundArguments {
            named: filled,
            variadic,
        })
    }

    /// Validate bound argument types against the declared matchers.
    ///
    /// Reported positions are 1-based call-site positions; arguments bound
    /// after the variadic overflow are shifted by the overflow length.
    pub fn check_types(&self, bound: &BoundArguments<ValueType>) -> Result<(), String> {
        let var_pos = self.var_position();

        for (name, value_type) in bound.iter_named() {
            let arg = match self.arg(name) {
                Some(arg) => arg,
                None => continue,
            };
            if arg.matcher.matches(*value_type) {
                continue;
            }
            if arg.matcher.matches_base_only(*value_type) {
                return Err(format!(
                    "argument '{}' can be MISSING but {} is expected; \
                     handle the missing case first, e.g. with the '??' operator",
                    name, arg.matcher
                ));
            }
            let declared_index = self
                .args
                .iter()
                .position(|a| a.name == *name)
                .unwrap_or(0);
            let position = if declared_index >= var_pos {
                declared_index + bound.variadic().len().max(1)
            } else {
                declared_index + 1
            };
            return Err(format!(
                "argument {} ('{}') expects {} but got {}",
                position, name, arg.matcher, value_type
            ));
        }

        if let Some(var_arg) = self.args.get(var_pos) {
            for (i, value_type) in bound.variadic().iter().enumerate() {
                if !var_arg.matcher.matches(*value_type) {
                    if var_arg.matcher.matches_base_only(*value_type) {
                        return Err(format!(
                            "argument '{}' can be MISSING but {} is expected; \
                             handle the missing case first, e.g. with the '??' operator",
                            var_arg.name, var_arg.matcher
                        ));
                    }
                    return Err(format!(
                        "argument {} ('{}') expects {} but got {}",
                        var_pos + i + 1,
                        var_arg.name,
                        var_arg.matcher,
                        value_type
                    ));
                }
            }
        }

        Ok(())
    }
}

/// The result of a successful bind: filled declared slots in declaration
/// order plus the variadic overflow.
#[derive(Debug, Clone, PartialEq)]
pub struct BoundArguments<T> {
    named: Vec<(String, T)>,
    variadic: Vec<T>,
}

impl<T> BoundArguments<T> {
    pub fn get(&self, name: &str) -> Option<&T> {
        self.named
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, v)| v)
    }

    pub fn iter_named(&self) -> impl Iterator<Item = (&String, &T)> {
        self.named.iter().map(|(n, v)| (n, v))
    }

    pub fn variadic(&self) -> &[T] {
        &self.variadic
    }

    /// All bound values: declared slots first, then the overflow.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.named.iter().map(|(_, v)| v).chain(self.variadic.iter())
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> BoundArguments<U> {
        BoundArguments {
            named: self.named.iter().map(|(n, v)| (n.clone(), f(v))).collect(),
            variadic: self.variadic.iter().map(&mut f).collect(),
        }
    }

    pub fn try_map<U, E>(
        &self,
        mut f: impl FnMut(&T) -> Result<U, E>,
    ) -> Result<BoundArguments<U>, E> {
        let mut named = Vec::with_capacity(self.named.len());
        for (n, v) in &self.named {
            named.push((n.clone(), f(v)?));
        }
        let mut variadic = Vec::with_capacity(self.variadic.len());
        for v in &self.variadic {
            variadic.push(f(v)?);
        }
        Ok(BoundArguments { named, variadic })
    }
}
