//! Function and aggregation registry.
//!
//! The core owns only the lookup and diagnostic machinery; the callables
//! themselves are host-provided. Aggregation bodies are never evaluated
//! here — the host precomputes column-wide results and hands them to the
//! evaluation engine.

use std::collections::HashMap;
use std::sync::Arc;

use crate::eval::Computer;
use crate::fuzzy;
use crate::signature::{BoundArguments, Signature};
use crate::types::ValueType;

/// Documentation surface of a callable, used for diagnostics and fuzzy
/// name suggestions.
pub trait CallableDoc {
    fn name(&self) -> &str;

    /// Alternative search terms (e.g. "mean" for "average").
    fn keywords(&self) -> &[String] {
        &[]
    }

    fn description(&self) -> &str;
}

/// A scalar function callable from expressions.
pub trait Function: CallableDoc {
    fn signature(&self) -> &Signature;

    /// Return type given the bound argument types. A failure message is
    /// reported as a typing error at the call site.
    fn return_type(&self, args: &BoundArguments<ValueType>) -> Result<ValueType, String>;

    /// Build the result computer from the argument computers.
    fn compile(&self, args: BoundArguments<Computer>) -> Computer;
}

/// A column aggregation callable from expressions. Arguments are constants;
/// the result is computed by the host, once per table.
pub trait Aggregation: CallableDoc {
    fn signature(&self) -> &Signature;

    fn return_type(&self, args: &BoundArguments<ValueType>) -> Result<ValueType, String>;
}

/// Name → callable lookup for one expression dialect.
#[derive(Default, Clone)]
pub struct Registry {
    functions: HashMap<String, Arc<dyn Function>>,
    aggregations: HashMap<String, Arc<dyn Aggregation>>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register_function(&mut self, function: Arc<dyn Function>) {
        self.functions.insert(function.name().to_string(), function);
    }

    pub fn register_aggregation(&mut self, aggregation: Arc<dyn Aggregation>) {
        self.aggregations
            .insert(aggregation.name().to_string(), aggregation);
    }

    pub fn function(&self, name: &str) -> Option<Arc<dyn Function>> {
        self.functions.get(name).cloned()
    }

    pub fn aggregation(&self, name: &str) -> Option<Arc<dyn Aggregation>> {
        self.aggregations.get(name).cloned()
    }

    /// Closest known function names to an unknown one, best first.
    pub fn suggest_function(&self, invalid: &str) -> Vec<String> {
        Self::suggest(invalid, self.functions.values().map(|f| f.as_ref() as &dyn CallableDoc))
    }

    /// Closest known aggregation names to an unknown one, best first.
    pub fn suggest_aggregation(&self, invalid: &str) -> Vec<String> {
        Self::suggest(
            invalid,
            self.aggregations.values().map(|a| a.as_ref() as &dyn CallableDoc),
        )
    }

    fn suggest<'a>(
        invalid: &str,
        callables: impl Iterator<Item = &'a dyn CallableDoc>,
    ) -> Vec<String> {
        let mut terms: Vec<(&str, &str)> = Vec::new();
        for callable in callables {
            terms.push((callable.name(), callable.name()));
            for keyword in callable.keywords() {
                terms.push((keyword.as_str(), callable.name()));
            }
        }
        fuzzy::closest_matches(invalid, terms)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::{Arg, ArgMatcher};

    struct Average {
        signature: Signature,
        keywords: Vec<String>,
    }

    impl Average {
        fn new() -> Self {
            Self {
                signature: Signature::new(vec![Arg::required(
                    "value",
                    "value to average",
                    ArgMatcher::numeric(),
                )])
                .unwrap(),
                keywords: vec!["mean".to_string()],
            }
        }
    }

    impl CallableDoc for Average {
        fn name(&self) -> &str {
            "average"
        }
        fn keywords(&self) -> &[String] {
            &self.keywords
        }
        fn description(&self) -> &str {
            "arithmetic mean"
        }
    }

    impl Function for Average {
        fn signature(&self) -> &Signature {
            &self.signature
        }
        fn return_type(&self, _args: &BoundArguments<ValueType>) -> Result<ValueType, String> {
            Ok(ValueType::Float)
        }
        fn compile(&self, _args: BoundArguments<Computer>) -> Computer {
            Computer::Missing
        }
    }

    #[test]
    fn test_lookup() {
        let mut registry = Registry::new();
        registry.register_function(Arc::new(Average::new()));
        assert!(registry.function("average").is_some());
        assert!(registry.function("median").is_none());
        assert!(registry.aggregation("average").is_none());
    }

    #[test]
    fn test_suggestions_cover_names_and_keywords() {
        let mut registry = Registry::new();
        registry.register_function(Arc::new(Average::new()));
        assert_eq!(registry.suggest_function("avverage"), vec!["average"]);
        assert_eq!(registry.suggest_function("meen"), vec!["average"]);
        assert!(registry.suggest_function("zzzzzzzz").is_empty());
    }
}
