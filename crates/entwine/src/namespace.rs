//! Namespaces: isolated rule stores with their own method tables and scopes.

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    rc::{Rc, Weak},
};

use once_cell::sync::Lazy;
use regex::Regex;
use serde_json::Value;
use tracing::{debug, trace};

use crate::{
    Block, Collection, Declarations, Element, Error, Method, MethodFn, Outcome, Result, Rule,
    RuleList, Selector, StaticFn, StaticTable, WarnLevel,
    collection::is_reserved,
    context::Context,
    dispatch::{Dispatcher, Resolver},
    engine::{Engine, EngineInner},
};

/// Key of the base namespace in the registry.
pub const BASE_NAMESPACE: &str = "__base";

/// Namespace names are period-separated identifiers.
static NAME_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z0-9.]+$").expect("valid namespace name pattern"));

/// Is `name` a well-formed namespace name?
pub fn valid_name(name: &str) -> bool {
    NAME_PATTERN.is_match(name)
}

/// Operation name to method table, with optional fall-through to a parent table.
///
/// The base namespace's table is the engine's collection method table itself. Other
/// namespaces own a table whose lookups fall through to the base table, live.
pub struct MethodTable<E: Element> {
    /// Methods defined directly on this table.
    own: HashMap<String, Method<E>>,
    /// Table consulted when a name is not found here.
    parent: Option<Rc<RefCell<MethodTable<E>>>>,
}

impl<E: Element> MethodTable<E> {
    /// A root table.
    pub fn new() -> Self {
        Self {
            own: HashMap::new(),
            parent: None,
        }
    }

    /// A table falling through to `parent`.
    pub fn child_of(parent: Rc<RefCell<Self>>) -> Self {
        Self {
            own: HashMap::new(),
            parent: Some(parent),
        }
    }

    /// Method defined directly on this table.
    pub fn own(&self, name: &str) -> Option<&Method<E>> {
        self.own.get(name)
    }

    /// Method visible through this table, own first.
    pub fn lookup(&self, name: &str) -> Option<Method<E>> {
        match self.own.get(name) {
            Some(m) => Some(m.clone()),
            None => self.parent.as_ref().and_then(|p| p.borrow().lookup(name)),
        }
    }

    /// Define or replace a method.
    pub fn insert<S: Into<String>>(&mut self, name: S, method: Method<E>) {
        self.own.insert(name.into(), method);
    }

    /// Remove a directly defined method.
    pub fn remove(&mut self, name: &str) -> Option<Method<E>> {
        self.own.remove(name)
    }

    /// Names of directly defined dispatchers.
    pub fn dispatch_names(&self) -> Vec<String> {
        self.own
            .iter()
            .filter(|(_, m)| m.is_dispatch())
            .map(|(k, _)| k.clone())
            .collect()
    }
}

impl<E: Element> Default for MethodTable<E> {
    fn default() -> Self {
        Self::new()
    }
}

/// An isolated set of rules with its own method table and static scope.
pub struct Namespace<E: Element> {
    /// Registry key.
    name: String,
    /// Engine-wide shared state.
    context: Rc<Context<E>>,
    /// Owning engine, for opening further namespaces.
    engine: Weak<EngineInner<E>>,
    /// Operation name to sorted rules.
    store: RefCell<HashMap<String, RuleList<E>>>,
    /// Methods callable on collections bound to this namespace.
    methods: Rc<RefCell<MethodTable<E>>>,
    /// Statics reachable through this namespace's scope.
    statics: Rc<RefCell<StaticTable>>,
}

impl<E: Element> Namespace<E> {
    /// Create a namespace. The base namespace shares the engine's tables; any other
    /// namespace gets a child method table and a snapshot of the engine's statics,
    /// followed by every handler's overrides.
    ///
    /// The statics snapshot is taken now: statics defined on the engine later are not
    /// visible through this namespace.
    pub(crate) fn create(
        name: &str,
        context: Rc<Context<E>>,
        engine: Weak<EngineInner<E>>,
        base_methods: &Rc<RefCell<MethodTable<E>>>,
        base_statics: &Rc<RefCell<StaticTable>>,
    ) -> Rc<Self> {
        if !name.is_empty() && !valid_name(name) {
            context.warnings.warn(
                format!("Entwine namespace {name} is not formatted as period separated identifiers"),
                WarnLevel::BestPractice,
            );
        }
        let key = if name.is_empty() { BASE_NAMESPACE } else { name };
        if key == BASE_NAMESPACE {
            debug!("base namespace created");
            return Rc::new(Self {
                name: key.to_string(),
                context,
                engine,
                store: RefCell::new(HashMap::new()),
                methods: Rc::clone(base_methods),
                statics: Rc::clone(base_statics),
            });
        }

        let ns = Rc::new(Self {
            name: key.to_string(),
            context,
            engine,
            store: RefCell::new(HashMap::new()),
            methods: Rc::new(RefCell::new(MethodTable::child_of(Rc::clone(base_methods)))),
            statics: Rc::new(RefCell::new(base_statics.borrow().clone())),
        });
        let handlers = ns.context.handlers.borrow().snapshot();
        for handler in handlers {
            for (k, f) in handler.namespace_method_overrides(&ns) {
                ns.methods.borrow_mut().insert(k, Method::Plain(f));
            }
            for (k, f) in handler.namespace_static_overrides(&ns) {
                ns.statics.borrow_mut().insert(k, f);
            }
        }
        debug!(namespace = key, "namespace created");
        ns
    }

    /// Registry name (`__base` for the base namespace).
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Is this the base namespace?
    pub fn is_base(&self) -> bool {
        self.name == BASE_NAMESPACE
    }

    /// Shared engine state.
    pub(crate) fn context(&self) -> &Rc<Context<E>> {
        &self.context
    }

    /// Handle to the owning engine.
    pub fn engine(&self) -> Result<Engine<E>> {
        self.engine
            .upgrade()
            .map(Engine::from_inner)
            .ok_or(Error::EngineGone)
    }

    /// This namespace's static entry point.
    pub fn scope(self: &Rc<Self>) -> Scope<E> {
        Scope {
            namespace: Rc::clone(self),
        }
    }

    /// A collection of `elements` bound to this namespace, with no selector.
    pub fn wrap(self: &Rc<Self>, elements: Vec<E>) -> Collection<E> {
        Collection::new(elements, None, Rc::clone(self))
    }

    /// Resolve a namespace argument given to `entwine` on a collection bound here.
    ///
    /// From a non-base namespace: no name (or an empty one) means this namespace, a
    /// relative name is nested under it, and a leading `.` makes the name absolute.
    pub(crate) fn relative_name(&self, name: Option<&str>) -> Option<String> {
        if self.is_base() {
            return name.map(str::to_string);
        }
        match name {
            None | Some("") => Some(self.name.clone()),
            Some(n) if n.starts_with('.') => Some(n.to_string()),
            Some(n) => Some(format!("{}.{}", self.name, n)),
        }
    }

    /// Number of rules for `operation`.
    pub fn rule_count(&self, operation: &str) -> usize {
        self.store.borrow().get(operation).map_or(0, RuleList::len)
    }

    /// Rule at storage index `i` (ascending priority) for `operation`.
    pub fn rule_at(&self, operation: &str, i: usize) -> Option<Rc<Rule<E>>> {
        self.store
            .borrow()
            .get(operation)
            .and_then(|list| list.get(i).cloned())
    }

    /// Rules for `operation`, highest priority first.
    pub fn rules(&self, operation: &str) -> Vec<Rc<Rule<E>>> {
        self.store
            .borrow()
            .get(operation)
            .map(|list| list.by_priority().cloned().collect())
            .unwrap_or_default()
    }

    /// Operations with at least one rule, sorted by name.
    pub fn operations(&self) -> Vec<String> {
        let mut ops: Vec<String> = self.store.borrow().keys().cloned().collect();
        ops.sort();
        ops
    }

    /// Method visible under `operation` on collections bound here.
    pub fn lookup_method(&self, operation: &str) -> Option<Method<E>> {
        self.methods.borrow().lookup(operation)
    }

    /// The method table.
    pub(crate) fn methods(&self) -> &Rc<RefCell<MethodTable<E>>> {
        &self.methods
    }

    /// Build the per-element resolver for `operation`.
    pub fn one(self: &Rc<Self>, operation: &str, basefunc: Option<MethodFn<E>>) -> Rc<Resolver<E>> {
        Rc::new(Resolver::new(self, operation, basefunc))
    }

    /// Build the collection-level dispatcher for `operation`.
    pub fn build_proxy(
        self: &Rc<Self>,
        operation: &str,
        basefunc: Option<MethodFn<E>>,
    ) -> Rc<Dispatcher<E>> {
        Rc::new(Dispatcher::new(self.one(operation, basefunc)))
    }

    /// Add a rule with default importance and make sure a dispatcher is installed.
    pub fn bind_proxy(
        self: &Rc<Self>,
        selector: Rc<dyn Selector<E>>,
        operation: &str,
        implementation: MethodFn<E>,
    ) -> Rc<Rule<E>> {
        self.bind_proxy_with(selector, operation, implementation, 0)
    }

    /// Add a rule with the given importance and make sure a dispatcher is installed.
    ///
    /// A non-dispatch method already defined on this namespace's own table becomes the
    /// dispatcher's fallback. Reserved collection operations still get their rules and
    /// dispatcher, but cannot be called by name; a warning says so.
    pub fn bind_proxy_with(
        self: &Rc<Self>,
        selector: Rc<dyn Selector<E>>,
        operation: &str,
        implementation: MethodFn<E>,
        importance: i32,
    ) -> Rc<Rule<E>> {
        let rule = self
            .store
            .borrow_mut()
            .entry(operation.to_string())
            .or_insert_with(|| RuleList::new(operation))
            .add_rule(&self.context.sequence, selector, implementation, importance);
        debug!(
            namespace = %self.name,
            operation,
            selector = rule.selector().source(),
            specificity = %rule.specificity(),
            importance,
            sequence = rule.sequence(),
            "rule bound"
        );

        let existing = self.methods.borrow().own(operation).cloned();
        let basefunc = match existing {
            Some(Method::Dispatch(_)) => return rule,
            Some(Method::Plain(f)) => Some(f),
            None => None,
        };
        if is_reserved(operation) {
            self.context.warnings.warn(
                format!(
                    "Entwine function {operation} clashes with a collection method - it will not be callable directly on the collection"
                ),
                WarnLevel::Important,
            );
        }
        let proxy = self.build_proxy(operation, basefunc);
        self.methods
            .borrow_mut()
            .insert(operation, Method::Dispatch(proxy));
        rule
    }

    /// Offer every declaration entry to the handlers; the first claimer wins.
    ///
    /// Unclaimed entries are ignored.
    pub fn add(self: &Rc<Self>, selector: &Rc<dyn Selector<E>>, declarations: &Declarations<E>) {
        let handlers = self.context.handlers.borrow().snapshot();
        for (key, definition) in declarations.iter() {
            let claimed = handlers
                .iter()
                .any(|h| h.claim(self, selector, key, definition));
            if !claimed {
                trace!(namespace = %self.name, key, ?definition, "declaration left unclaimed");
            }
        }
    }

    /// Is every element of `collection` matched by some rule for `operation`?
    pub fn has(&self, collection: &Collection<E>, operation: &str) -> bool {
        let rules = self.rules(operation);
        // Low priority first: broad selectors tend to empty the collection quickly.
        let mut remaining = collection.clone();
        for rule in rules.iter().rev() {
            remaining = remaining.not(rule.selector().as_ref());
            if remaining.is_empty() {
                return true;
            }
        }
        false
    }

    /// Dispatch `operation` on `collection` through this namespace's table, including
    /// reserved names that cannot be reached through [`Collection::call`].
    pub fn dispatch(&self, collection: &Collection<E>, operation: &str, args: &[Value]) -> Outcome {
        match self.lookup_method(operation) {
            Some(Method::Dispatch(d)) => d.invoke(collection, args),
            Some(Method::Plain(f)) => f(collection, args),
            None => {
                trace!(namespace = %self.name, operation, "no such operation");
                Ok(None)
            }
        }
    }

    /// Static capability visible through this namespace.
    pub fn lookup_static(&self, name: &str) -> Option<StaticFn> {
        self.statics.borrow().get(name).cloned()
    }
}

impl<E: Element> fmt::Debug for Namespace<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Namespace")
            .field("name", &self.name)
            .field("operations", &self.operations())
            .finish()
    }
}

/// A namespace's static entry point: builds bound collections and exposes statics.
pub struct Scope<E: Element> {
    /// Namespace the scope produces collections for.
    namespace: Rc<Namespace<E>>,
}

impl<E: Element> Scope<E> {
    /// The namespace.
    pub fn namespace(&self) -> &Rc<Namespace<E>> {
        &self.namespace
    }

    /// Query the document and bind the result to this namespace.
    pub fn select(&self, text: &str) -> Result<Collection<E>> {
        let doc = &self.namespace.context.document;
        let selector = doc.parse(text)?;
        let elements = doc.query(selector.as_ref());
        Ok(Collection::new(
            elements,
            Some(text.to_string()),
            Rc::clone(&self.namespace),
        ))
    }

    /// Bind raw elements to this namespace.
    pub fn wrap(&self, elements: Vec<E>) -> Collection<E> {
        self.namespace.wrap(elements)
    }

    /// Call a static capability.
    pub fn call_static(&self, name: &str, args: &[Value]) -> Outcome {
        match self.namespace.lookup_static(name) {
            Some(f) => f(args),
            None => Err(Error::UnknownStatic(name.to_string())),
        }
    }

    /// Register blocks without a calling collection, e.g. to open a namespace or run
    /// using blocks. Declarations given here have no selector and are skipped.
    pub fn entwine(&self, namespace: Option<&str>, blocks: Vec<Block<E>>) -> Result<Collection<E>> {
        self.wrap(Vec::new()).entwine(namespace, blocks)
    }
}

impl<E: Element> Clone for Scope<E> {
    fn clone(&self) -> Self {
        Self {
            namespace: Rc::clone(&self.namespace),
        }
    }
}

impl<E: Element> fmt::Debug for Scope<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Scope")
            .field("namespace", &self.namespace.name)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespace_names() {
        assert!(valid_name("admin.forms"));
        assert!(valid_name("v2"));
        assert!(!valid_name("bad name"));
        assert!(!valid_name("under_score"));
        assert!(!valid_name(""));
    }
}
