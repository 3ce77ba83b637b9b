//! Compressed prefix tree holding the routes of one method.
//!
//! Static text shared between patterns is stored once and split on demand
//! (radix compression). Below every node there are, in matching order:
//!
//! 1. static children, one per distinct first character, sorted by priority,
//! 2. at most one `{param}` child, binding one non-empty segment,
//! 3. at most one `*catch_all` child, binding the non-empty remainder.
//!
//! Lookup backtracks from static to param to catch-all, so `/a/b` beats
//! `/a/{x}` for the path `/a/b` whatever order the two were registered in.

use std::fmt;
use std::mem;

use crate::error::{Result, RouterError};
use crate::path::{toggle_trailing_slash, PathPattern, Piece, ROOT};
use crate::request::{Method, PathParams};

/// What a tree node matches.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NodeKind {
    /// Literal text.
    Static,
    /// One `{name}` segment.
    Param,
    /// The `*name` remainder of the path.
    CatchAll,
}

#[derive(Clone)]
struct Leaf<T> {
    pattern: String,
    value: T,
}

#[derive(Clone)]
struct Node<T> {
    prefix: String,
    kind: NodeKind,
    param_name: String,
    /// First character of each static child, same order as `children`.
    indices: Vec<char>,
    children: Vec<Node<T>>,
    param: Option<Box<Node<T>>>,
    catch_all: Option<Box<Node<T>>>,
    leaf: Option<Leaf<T>>,
    /// Number of routes registered at or below this node.
    priority: usize,
}

/// Where an insertion came from, for error messages.
struct Site<'a> {
    method: &'a Method,
    pattern: &'a str,
}

impl<T> Node<T> {
    fn new(kind: NodeKind, prefix: &str, param_name: &str) -> Self {
        Self {
            prefix: prefix.to_string(),
            kind,
            param_name: param_name.to_string(),
            indices: Vec::new(),
            children: Vec::new(),
            param: None,
            catch_all: None,
            leaf: None,
            priority: 0,
        }
    }

    fn insert(&mut self, pending: &str, pieces: &[Piece], leaf: Leaf<T>, at: &Site<'_>) -> Result<()> {
        self.priority += 1;
        self.descend(pending, pieces, leaf, at)
    }

    fn descend(&mut self, pending: &str, pieces: &[Piece], leaf: Leaf<T>, at: &Site<'_>) -> Result<()> {
        if let Some(first) = pending.chars().next() {
            return self.insert_static(first, pending, pieces, leaf, at);
        }

        match pieces.split_first() {
            None => self.set_leaf(leaf, at),
            Some((Piece::Static(text), rest)) => self.descend(text, rest, leaf, at),
            Some((Piece::Param(name), rest)) => {
                let child = self
                    .param
                    .get_or_insert_with(|| Box::new(Node::new(NodeKind::Param, "", name)));
                if child.param_name != *name {
                    return Err(RouterError::ParamConflict {
                        pattern: at.pattern.to_string(),
                        existing: child.param_name.clone(),
                        new: name.clone(),
                    });
                }
                child.insert("", rest, leaf, at)
            }
            Some((Piece::CatchAll(name), rest)) => {
                if !rest.is_empty() {
                    return Err(RouterError::CatchAllNotLast {
                        pattern: at.pattern.to_string(),
                    });
                }
                let child = self
                    .catch_all
                    .get_or_insert_with(|| Box::new(Node::new(NodeKind::CatchAll, "", name)));
                if child.param_name != *name {
                    return Err(RouterError::ParamConflict {
                        pattern: at.pattern.to_string(),
                        existing: child.param_name.clone(),
                        new: name.clone(),
                    });
                }
                child.insert("", rest, leaf, at)
            }
        }
    }

    fn insert_static(
        &mut self,
        first: char,
        text: &str,
        rest: &[Piece],
        leaf: Leaf<T>,
        at: &Site<'_>,
    ) -> Result<()> {
        let pos = match self.indices.iter().position(|&c| c == first) {
            Some(pos) => {
                let child = &mut self.children[pos];
                let common = common_prefix_len(&child.prefix, text);
                if common < child.prefix.len() {
                    child.split(common);
                }
                pos
            }
            None => {
                self.indices.push(first);
                self.children.push(Node::new(NodeKind::Static, text, ""));
                self.children.len() - 1
            }
        };

        let consumed = self.children[pos].prefix.len();
        self.children[pos].insert(&text[consumed..], rest, leaf, at)?;
        self.bump(pos);
        Ok(())
    }

    fn set_leaf(&mut self, leaf: Leaf<T>, at: &Site<'_>) -> Result<()> {
        if self.leaf.is_some() {
            return Err(RouterError::DuplicateRoute {
                method: at.method.to_string(),
                pattern: at.pattern.to_string(),
            });
        }
        self.leaf = Some(leaf);
        Ok(())
    }

    /// Splits this static node so that its prefix becomes `prefix[..at]`.
    fn split(&mut self, at: usize) {
        debug_assert_eq!(self.kind, NodeKind::Static);
        let suffix = self.prefix.split_off(at);
        let Some(first) = suffix.chars().next() else {
            return;
        };
        let lower = Node {
            prefix: suffix,
            kind: NodeKind::Static,
            param_name: String::new(),
            indices: mem::take(&mut self.indices),
            children: mem::take(&mut self.children),
            param: self.param.take(),
            catch_all: self.catch_all.take(),
            leaf: self.leaf.take(),
            priority: self.priority,
        };
        self.indices = vec![first];
        self.children = vec![lower];
    }

    /// Moves the child at `pos` ahead of siblings with a lower priority.
    fn bump(&mut self, mut pos: usize) {
        while pos > 0 && self.children[pos - 1].priority < self.children[pos].priority {
            self.children.swap(pos - 1, pos);
            self.indices.swap(pos - 1, pos);
            pos -= 1;
        }
    }

    /// Matches `path` below this node; the node's own prefix is already consumed.
    fn find(&self, path: &str, params: &mut PathParams) -> Option<&Leaf<T>> {
        if path.is_empty() {
            return self.leaf.as_ref();
        }

        if let Some(first) = path.chars().next() {
            if let Some(pos) = self.indices.iter().position(|&c| c == first) {
                let child = &self.children[pos];
                if let Some(rest) = path.strip_prefix(child.prefix.as_str()) {
                    if let Some(leaf) = child.find(rest, params) {
                        return Some(leaf);
                    }
                }
            }
        }

        if let Some(param) = &self.param {
            let end = path.find('/').unwrap_or(path.len());
            if end > 0 {
                let mark = params.len();
                params.push(&param.param_name, &path[..end]);
                if let Some(leaf) = param.find(&path[end..], params) {
                    return Some(leaf);
                }
                params.truncate(mark);
            }
        }

        if let Some(catch_all) = &self.catch_all {
            if let Some(leaf) = &catch_all.leaf {
                params.push(&catch_all.param_name, path);
                return Some(leaf);
            }
        }

        None
    }

    /// Case-insensitive version of [`find`](Self::find) that records the
    /// registered spelling of the matched path in `out`.
    fn find_case_insensitive(&self, path: &str, out: &mut String, fix_trailing_slash: bool) -> bool {
        if path.is_empty() {
            if self.leaf.is_some() {
                return true;
            }
            if fix_trailing_slash {
                let slash_leaf = self
                    .children
                    .iter()
                    .any(|child| child.prefix == "/" && child.leaf.is_some());
                if slash_leaf {
                    out.push('/');
                    return true;
                }
            }
            return false;
        }

        for child in &self.children {
            if let Some(rest) = strip_prefix_ignore_case(path, &child.prefix) {
                let mark = out.len();
                out.push_str(&child.prefix);
                if child.find_case_insensitive(rest, out, fix_trailing_slash) {
                    return true;
                }
                out.truncate(mark);
            } else if fix_trailing_slash && child.leaf.is_some() {
                // The path lacks the slash this child ends with.
                let stem = child.prefix.strip_suffix('/');
                if stem.and_then(|stem| strip_prefix_ignore_case(path, stem)) == Some("") {
                    out.push_str(&child.prefix);
                    return true;
                }
            }
        }

        if let Some(param) = &self.param {
            let end = path.find('/').unwrap_or(path.len());
            if end > 0 {
                let mark = out.len();
                out.push_str(&path[..end]);
                if param.find_case_insensitive(&path[end..], out, fix_trailing_slash) {
                    return true;
                }
                out.truncate(mark);
            }
        }

        if let Some(catch_all) = &self.catch_all {
            if catch_all.leaf.is_some() {
                out.push_str(path);
                return true;
            }
        }

        // Only a superfluous trailing slash is left.
        fix_trailing_slash && path == "/" && self.leaf.is_some()
    }

    fn collect_patterns<'a>(&'a self, out: &mut Vec<&'a str>) {
        if let Some(leaf) = &self.leaf {
            out.push(&leaf.pattern);
        }
        for child in &self.children {
            child.collect_patterns(out);
        }
        if let Some(param) = &self.param {
            param.collect_patterns(out);
        }
        if let Some(catch_all) = &self.catch_all {
            catch_all.collect_patterns(out);
        }
    }
}

/// Length in bytes of the longest common prefix, on a char boundary.
fn common_prefix_len(a: &str, b: &str) -> usize {
    a.char_indices()
        .zip(b.chars())
        .find(|((_, x), y)| x != y)
        .map_or_else(|| a.len().min(b.len()), |((i, _), _)| i)
}

fn strip_prefix_ignore_case<'p>(path: &'p str, prefix: &str) -> Option<&'p str> {
    let mut chars = path.char_indices();
    for expected in prefix.chars() {
        let (_, actual) = chars.next()?;
        if actual != expected && !actual.to_lowercase().eq(expected.to_lowercase()) {
            return None;
        }
    }
    let offset = chars.next().map_or(path.len(), |(i, _)| i);
    Some(&path[offset..])
}

/// Result of [`RouteTrie::lookup`].
#[derive(Debug)]
pub struct Lookup<'t, T> {
    /// The matched value.
    pub value: Option<&'t T>,
    /// The pattern the value was registered under.
    pub pattern: Option<&'t str>,
    /// Parameters bound while descending, in descent order.
    pub params: PathParams,
    /// True when the path misses but would hit with its trailing slash
    /// added or removed.
    pub trailing_slash_redirect: bool,
}

impl<T> Lookup<'_, T> {
    /// Returns true if a route matched.
    pub fn is_match(&self) -> bool {
        self.value.is_some()
    }
}

/// The routes registered for one HTTP method.
#[derive(Clone)]
pub struct RouteTrie<T> {
    method: Method,
    root: Node<T>,
}

impl<T> RouteTrie<T> {
    /// Creates an empty tree for `method`.
    pub fn new(method: Method) -> Self {
        Self {
            method,
            root: Node::new(NodeKind::Static, "", ""),
        }
    }

    /// The method this tree serves.
    pub fn method(&self) -> &Method {
        &self.method
    }

    /// Number of registered routes.
    pub fn len(&self) -> usize {
        self.root.priority
    }

    /// Returns true if nothing is registered.
    pub fn is_empty(&self) -> bool {
        self.root.priority == 0
    }

    /// Registered patterns, static branches first.
    pub fn patterns(&self) -> Vec<&str> {
        let mut out = Vec::with_capacity(self.len());
        self.root.collect_patterns(&mut out);
        out
    }

    /// Finds the value registered for `path` and binds its parameters.
    pub fn lookup(&self, path: &str) -> Lookup<'_, T> {
        let mut params = PathParams::new();
        if let Some(leaf) = self.root.find(path, &mut params) {
            return Lookup {
                value: Some(&leaf.value),
                pattern: Some(&leaf.pattern),
                params,
                trailing_slash_redirect: false,
            };
        }

        let trailing_slash_redirect = path != ROOT
            && !path.is_empty()
            && self
                .root
                .find(&toggle_trailing_slash(path), &mut PathParams::new())
                .is_some();

        Lookup {
            value: None,
            pattern: None,
            params: PathParams::new(),
            trailing_slash_redirect,
        }
    }

    /// Looks `path` up ignoring case and returns the registered spelling.
    ///
    /// With `fix_trailing_slash` a missing or superfluous trailing slash is
    /// corrected as well. Parameter values keep the caller's spelling.
    pub fn find_case_insensitive(&self, path: &str, fix_trailing_slash: bool) -> Option<String> {
        let mut out = String::with_capacity(path.len() + 1);
        self.root
            .find_case_insensitive(path, &mut out, fix_trailing_slash)
            .then_some(out)
    }
}

impl<T: Clone> RouteTrie<T> {
    /// Registers `value` under `pattern`.
    ///
    /// Fails without touching the tree when the pattern is malformed, when
    /// a parameter at the same position already has another name, or when
    /// the pattern is already registered.
    pub fn insert(&mut self, pattern: &str, value: T) -> Result<()> {
        let parsed = PathPattern::parse(pattern)?;
        let pieces = parsed.pieces();
        let site = Site {
            method: &self.method,
            pattern,
        };
        let leaf = Leaf {
            pattern: pattern.to_string(),
            value,
        };

        let mut root = self.root.clone();
        root.insert("", &pieces, leaf, &site)?;
        self.root = root;
        Ok(())
    }
}

impl<T> fmt::Debug for RouteTrie<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RouteTrie")
            .field("method", &self.method)
            .field("patterns", &self.patterns())
            .finish()
    }
}
