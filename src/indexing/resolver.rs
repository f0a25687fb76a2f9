//! Name-based call resolution.
//!
//! A call reference names its callee but not which definition it means.
//! Without type information or include scoping the resolver links the call
//! to every function with that name, so overloads, `static` functions with
//! the same name in different files and macros shadowing a function all
//! produce extra edges.

use std::collections::HashMap;

use crate::parsing::CallReference;
use crate::symbol::Symbol;
use crate::types::{CallEdge, SymbolId};

/// Function name to every function symbol carrying it.
#[derive(Debug, Default)]
pub struct CallResolver {
    functions: HashMap<String, Vec<SymbolId>>,
}

impl CallResolver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Index all function symbols in `symbols`. Other kinds are ignored.
    pub fn from_symbols<'a>(symbols: impl IntoIterator<Item = &'a Symbol>) -> Self {
        let mut resolver = Self::new();
        for symbol in symbols {
            resolver.register(symbol);
        }
        resolver
    }

    pub fn register(&mut self, symbol: &Symbol) {
        if symbol.is_function() {
            self.functions
                .entry(symbol.name.clone())
                .or_default()
                .push(symbol.id.clone());
        }
    }

    pub fn targets(&self, name: &str) -> &[SymbolId] {
        self.functions.get(name).map(Vec::as_slice).unwrap_or(&[])
    }

    /// Resolve references into edges. Names with no matching function
    /// (library calls, function pointers) produce nothing.
    pub fn resolve<'a>(&self, calls: impl IntoIterator<Item = &'a CallReference>) -> Vec<CallEdge> {
        let mut edges = Vec::new();
        for call in calls {
            for callee in self.targets(&call.callee_name) {
                edges.push(CallEdge {
                    caller_id: call.caller_id.clone(),
                    callee_id: callee.clone(),
                });
            }
        }
        edges
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::symbol::SymbolDetail;
    use crate::types::{Backend, SymbolKind};

    fn function(name: &str, file: &str) -> Symbol {
        let id = SymbolId::derive(Backend::TreeSitter, SymbolKind::Function, name, file, 1, 0);
        Symbol::new(id, name, file, 1, Backend::TreeSitter, SymbolDetail::function("int", vec![]))
    }

    fn variable(name: &str, file: &str) -> Symbol {
        let id = SymbolId::derive(Backend::TreeSitter, SymbolKind::Variable, name, file, 1, 0);
        Symbol::new(
            id,
            name,
            file,
            1,
            Backend::TreeSitter,
            SymbolDetail::Variable {
                data_type: "int".to_string(),
                is_static: false,
                is_const: false,
            },
        )
    }

    fn call(caller: &Symbol, callee: &str) -> CallReference {
        CallReference {
            caller_id: caller.id.clone(),
            callee_name: callee.to_string(),
        }
    }

    #[test]
    fn test_resolves_unique_name() {
        let foo = function("foo", "a.c");
        let bar = function("bar", "b.c");
        let resolver = CallResolver::from_symbols([&foo, &bar]);

        let edges = resolver.resolve(&[call(&foo, "bar")]);
        assert_eq!(
            edges,
            vec![CallEdge {
                caller_id: foo.id.clone(),
                callee_id: bar.id.clone()
            }]
        );
    }

    #[test]
    fn test_same_name_links_every_definition() {
        let main = function("main", "main.c");
        let helper_a = function("helper", "a.c");
        let helper_b = function("helper", "b.c");
        let resolver = CallResolver::from_symbols([&main, &helper_a, &helper_b]);

        let edges = resolver.resolve(&[call(&main, "helper")]);
        assert_eq!(edges.len(), 2);
        assert!(edges.iter().any(|e| e.callee_id == helper_a.id));
        assert!(edges.iter().any(|e| e.callee_id == helper_b.id));
    }

    #[test]
    fn test_unknown_and_non_function_names() {
        let main = function("main", "main.c");
        let counter = variable("counter", "main.c");
        let resolver = CallResolver::from_symbols([&main, &counter]);

        assert!(resolver.resolve(&[call(&main, "printf"), call(&main, "counter")]).is_empty());
        assert!(resolver.targets("counter").is_empty());
    }
}
