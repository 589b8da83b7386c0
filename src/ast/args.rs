//! Call-site argument containers.

use std::collections::HashMap;

/// The arguments of a function or aggregation call: an ordered positional
/// list plus a name→value map. Insertion order of the named part is not
/// significant.
#[derive(Debug, Clone, PartialEq)]
pub struct Arguments<T> {
    positional: Vec<T>,
    named: HashMap<String, T>,
}

impl<T> Arguments<T> {
    pub fn new(positional: Vec<T>, named: HashMap<String, T>) -> Self {
        Self { positional, named }
    }

    pub fn positional(positional: Vec<T>) -> Self {
        Self {
            positional,
            named: HashMap::new(),
        }
    }

    pub fn empty() -> Self {
        Self {
            positional: Vec::new(),
            named: HashMap::new(),
        }
    }

    pub fn positional_args(&self) -> &[T] {
        &self.positional
    }

    pub fn named_args(&self) -> &HashMap<String, T> {
        &self.named
    }

    pub fn len(&self) -> usize {
        self.positional.len() + self.named.len()
    }

    pub fn is_empty(&self) -> bool {
        self.positional.is_empty() && self.named.is_empty()
    }

    /// All argument values: positional first, then named in unspecified
    /// order.
    pub fn iter(&self) -> impl Iterator<Item = &T> {
        self.positional.iter().chain(self.named.values())
    }

    pub fn map<U>(&self, mut f: impl FnMut(&T) -> U) -> Arguments<U> {
        Arguments {
            positional: self.positional.iter().map(&mut f).collect(),
            named: self.named.iter().map(|(k, v)| (k.clone(), f(v))).collect(),
        }
    }

    pub fn try_map<U, E>(
        &self,
        mut f: impl FnMut(&T) -> Result<U, E>,
    ) -> Result<Arguments<U>, E> {
        let mut positional = Vec::with_capacity(self.positional.len());
        for value in &self.positional {
            positional.push(f(value)?);
        }
        let mut named = HashMap::with_capacity(self.named.len());
        for (name, value) in &self.named {
            named.insert(name.clone(), f(value)?);
        }
        Ok(Arguments { positional, named })
    }
}
