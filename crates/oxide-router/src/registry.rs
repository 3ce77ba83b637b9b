//! Route tables, one tree per HTTP method.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use tracing::debug;

use crate::error::{Result, RouterError};
use crate::handler::HandlerUnit;
use crate::path::normalize;
use crate::request::{Method, PathParams};
use crate::tree::{Lookup, RouteTrie};

/// A route with its chain fully assembled.
#[derive(Debug)]
pub struct Endpoint {
    pub(crate) method: Method,
    pub(crate) pattern: Arc<str>,
    pub(crate) name: Option<Arc<str>>,
    pub(crate) units: Arc<[HandlerUnit]>,
}

impl Endpoint {
    /// The method the endpoint is registered under.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// The route pattern.
    pub fn pattern(&self) -> &str {
        &self.pattern
    }

    /// The route name, if any.
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    /// Number of units in the assembled chain.
    pub fn chain_len(&self) -> usize {
        self.units.len()
    }
}

/// Every registered route, by method.
#[derive(Debug, Default)]
pub struct MethodRegistry {
    trees: HashMap<Method, RouteTrie<Arc<Endpoint>>>,
    /// Normalized patterns per method; `/ping` and `/ping/` share a key.
    keys: HashMap<Method, HashSet<String>>,
}

impl MethodRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers `endpoint`. Fails if its pattern is malformed, conflicts
    /// with a registered one, or normalizes to a registered one.
    pub fn insert(&mut self, endpoint: Endpoint) -> Result<()> {
        let method = endpoint.method.clone();
        let pattern = Arc::clone(&endpoint.pattern);
        let key = normalize(&pattern).to_string();

        if self.keys.get(&method).is_some_and(|keys| keys.contains(&key)) {
            return Err(RouterError::DuplicateRoute {
                method: method.to_string(),
                pattern: pattern.to_string(),
            });
        }

        let tree = self
            .trees
            .entry(method.clone())
            .or_insert_with(|| RouteTrie::new(method.clone()));
        if let Err(err) = tree.insert(&pattern, Arc::new(endpoint)) {
            if tree.is_empty() {
                self.trees.remove(&method);
            }
            return Err(err);
        }

        debug!(method = %method, pattern = %pattern, "route registered");
        self.keys.entry(method).or_default().insert(key);
        Ok(())
    }

    /// Returns true if at least one route uses `method`.
    pub fn has_method(&self, method: &Method) -> bool {
        self.trees.contains_key(method)
    }

    /// Looks `path` up in the tree for `method`, if there is one.
    pub fn lookup(&self, method: &Method, path: &str) -> Option<Lookup<'_, Arc<Endpoint>>> {
        self.trees.get(method).map(|tree| tree.lookup(path))
    }

    /// Case-insensitive lookup in the tree for `method`.
    pub fn find_case_insensitive(
        &self,
        method: &Method,
        path: &str,
        fix_trailing_slash: bool,
    ) -> Option<String> {
        self.trees
            .get(method)?
            .find_case_insensitive(path, fix_trailing_slash)
    }

    /// Methods other than `except` under which `path` is registered, sorted
    /// by name, with the parameters bound by the first of them.
    pub fn allowed_methods(&self, path: &str, except: &Method) -> (Vec<Method>, Option<PathParams>) {
        let mut hits: Vec<(&Method, PathParams)> = self
            .trees
            .iter()
            .filter(|(method, _)| *method != except)
            .filter_map(|(method, tree)| {
                let found = tree.lookup(path);
                found.is_match().then_some((method, found.params))
            })
            .collect();
        hits.sort_by(|a, b| a.0.as_str().cmp(b.0.as_str()));

        let params = hits.first().map(|(_, params)| params.clone());
        let methods = hits.into_iter().map(|(method, _)| method.clone()).collect();
        (methods, params)
    }

    /// Methods with at least one route, sorted by name.
    pub fn methods(&self) -> Vec<&Method> {
        let mut methods: Vec<&Method> = self.trees.keys().collect();
        methods.sort_by(|a, b| a.as_str().cmp(b.as_str()));
        methods
    }

    /// All `(method, pattern)` pairs, sorted.
    pub fn routes(&self) -> Vec<(&Method, &str)> {
        self.methods()
            .into_iter()
            .filter_map(|method| self.trees.get(method).map(|tree| (method, tree)))
            .flat_map(|(method, tree)| tree.patterns().into_iter().map(move |p| (method, p)))
            .collect()
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.trees.values().map(RouteTrie::len).sum()
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.trees.is_empty()
    }
}
