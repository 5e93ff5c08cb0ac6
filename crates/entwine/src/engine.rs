//! The engine: namespace registry, base tables and the registration entry point.

use std::{cell::RefCell, collections::BTreeMap, fmt, rc::Rc};

use serde_json::Value;
use tracing::{debug, info};

use crate::{
    BASE_NAMESPACE, Block, Collection, Declarations, Document, Element, EngineConfig, Handler,
    Method, MethodFn, MethodTable, Namespace, Outcome, Result, Selector, StaticFn, StaticTable,
    WarnLevel, Warnings, context::Context,
};

/// State owned by an [`Engine`] and shared by its clones.
pub(crate) struct EngineInner<E: Element> {
    /// Shared engine state handed to every namespace.
    context: Rc<Context<E>>,
    /// Namespaces by registry name.
    namespaces: RefCell<BTreeMap<String, Rc<Namespace<E>>>>,
    /// The collection method table; also the base namespace's table.
    methods: Rc<RefCell<MethodTable<E>>>,
    /// The base static table; snapshotted into new namespaces.
    statics: Rc<RefCell<StaticTable>>,
}

/// A rule engine over one document.
///
/// Cloning an engine yields another handle to the same state. Several independent engines
/// may coexist.
pub struct Engine<E: Element> {
    /// Shared state.
    inner: Rc<EngineInner<E>>,
}

impl<E: Element> Engine<E> {
    /// An engine with default configuration.
    pub fn new(document: Rc<dyn Document<E>>) -> Self {
        Self::with_config(&EngineConfig::default(), document)
    }

    /// An engine configured by `config`.
    pub fn with_config(config: &EngineConfig, document: Rc<dyn Document<E>>) -> Self {
        let warnings = Warnings::new(config.warning_level);
        Self {
            inner: Rc::new(EngineInner {
                context: Rc::new(Context::new(document, warnings)),
                namespaces: RefCell::new(BTreeMap::new()),
                methods: Rc::new(RefCell::new(MethodTable::new())),
                statics: Rc::new(RefCell::new(StaticTable::new())),
            }),
        }
    }

    /// Rebuild a handle from shared state.
    pub(crate) fn from_inner(inner: Rc<EngineInner<E>>) -> Self {
        Self { inner }
    }

    /// The warning channel.
    pub fn warnings(&self) -> &Warnings {
        &self.inner.context.warnings
    }

    /// The document collections are selected from.
    pub fn document(&self) -> &Rc<dyn Document<E>> {
        &self.inner.context.document
    }

    /// Number of rules created so far across all namespaces.
    pub fn rules_created(&self) -> u64 {
        self.inner.context.sequence.issued()
    }

    /// Define a plain collection method, visible from every namespace.
    ///
    /// A plain method defined before rules are bound under the same name becomes the
    /// fallback of the dispatcher installed for them.
    pub fn define_method<S: Into<String>>(&self, name: S, f: MethodFn<E>) {
        let name = name.into();
        debug!(method = %name, "base method defined");
        self.inner.methods.borrow_mut().insert(name, Method::Plain(f));
    }

    /// Define a base static. Namespaces created before this call do not see it.
    pub fn define_static<S: Into<String>>(&self, name: S, f: StaticFn) {
        let name = name.into();
        debug!(name = %name, "base static defined");
        self.inner.statics.borrow_mut().insert(name, f);
    }

    /// Call a base static.
    pub fn call_static(&self, name: &str, args: &[Value]) -> Outcome {
        self.base().scope().call_static(name, args)
    }

    /// Register a declaration handler. Affects namespaces created afterwards for overrides
    /// and every later registration for claims.
    pub fn add_handler(&self, handler: Rc<dyn Handler<E>>) {
        self.inner.context.handlers.borrow_mut().add(handler);
    }

    /// Remove every handler, including the built-in method handler.
    pub fn clear_handlers(&self) {
        self.inner.context.handlers.borrow_mut().clear();
    }

    /// The base namespace.
    pub fn base(&self) -> Rc<Namespace<E>> {
        self.namespace(BASE_NAMESPACE)
    }

    /// Create and register a namespace, replacing any existing one of the same name.
    ///
    /// An empty name creates the base namespace.
    pub fn create_namespace(&self, name: &str) -> Rc<Namespace<E>> {
        let key = if name.is_empty() { BASE_NAMESPACE } else { name };
        let created_name = if key == BASE_NAMESPACE { "" } else { key };
        let ns = Namespace::create(
            created_name,
            Rc::clone(&self.inner.context),
            Rc::downgrade(&self.inner),
            &self.inner.methods,
            &self.inner.statics,
        );
        self.inner
            .namespaces
            .borrow_mut()
            .insert(key.to_string(), Rc::clone(&ns));
        ns
    }

    /// Look up a namespace, creating it if needed.
    pub fn namespace(&self, name: &str) -> Rc<Namespace<E>> {
        match self.get_namespace(name) {
            Some(ns) => ns,
            None => self.create_namespace(name),
        }
    }

    /// Look up an existing namespace. An empty name means the base namespace.
    pub fn get_namespace(&self, name: &str) -> Option<Rc<Namespace<E>>> {
        let key = if name.is_empty() { BASE_NAMESPACE } else { name };
        self.inner.namespaces.borrow().get(key).cloned()
    }

    /// Registered namespace names, sorted.
    pub fn namespace_names(&self) -> Vec<String> {
        self.inner.namespaces.borrow().keys().cloned().collect()
    }

    /// Query the document into a collection bound to the base namespace.
    pub fn select(&self, text: &str) -> Result<Collection<E>> {
        self.base().scope().select(text)
    }

    /// Bind raw elements to the base namespace.
    pub fn wrap(&self, elements: Vec<E>) -> Collection<E> {
        self.base().wrap(elements)
    }

    /// Apply `blocks` to `collection`'s selector in the named namespace.
    ///
    /// `None` or an empty name targets the base namespace; a leading `.` is stripped. The
    /// selector is recovered from the collection's descriptor, parsed only when a
    /// declaration map needs it. Returns the collection rebound into the target namespace.
    pub fn register(
        &self,
        collection: &Collection<E>,
        namespace: Option<&str>,
        blocks: Vec<Block<E>>,
    ) -> Collection<E> {
        let name = namespace.map_or("", |n| n.strip_prefix('.').unwrap_or(n));
        let ns = self.namespace(name);
        let bound = collection.rebind(&ns);
        let warnings = &self.inner.context.warnings;

        let mut selector: Option<Option<Rc<dyn Selector<E>>>> = None;
        for block in blocks {
            let declarations = match block {
                Block::Declarations(d) => Some(d),
                Block::Using(f) => f(&bound),
                Block::Bare(f) => {
                    warnings.warn(
                        "Function block inside entwine definition does not take the scope argument properly",
                        WarnLevel::Important,
                    );
                    f()
                }
            };
            let Some(declarations) = declarations.filter(|d| !d.is_empty()) else {
                continue;
            };
            let resolved = selector.get_or_insert_with(|| self.parse_descriptor(collection));
            match resolved {
                Some(sel) => ns.add(sel, &declarations),
                None => self.skip_unselected(&declarations),
            }
        }
        bound
    }

    /// Parse a collection's selector descriptor, if it has a usable one.
    fn parse_descriptor(&self, collection: &Collection<E>) -> Option<Rc<dyn Selector<E>>> {
        let text = collection.selector().filter(|s| !s.is_empty())?;
        match self.inner.context.document.parse(text) {
            Ok(sel) => Some(sel),
            Err(e) => {
                debug!(descriptor = text, error = %e, "descriptor is not a selector");
                None
            }
        }
    }

    /// Report declarations dropped for lack of a selector.
    fn skip_unselected(&self, declarations: &Declarations<E>) {
        let keys: Vec<&str> = declarations.iter().map(|(k, _)| k).collect();
        debug!(?keys, "declarations skipped");
        self.inner.context.warnings.warn(
            "Entwine block given to entwine call without selector. Make sure you register on a selected collection when using namespaces",
            WarnLevel::Important,
        );
    }

    /// Remove every namespace and every installed dispatcher.
    ///
    /// A dispatcher built over a plain method is replaced by that method again rather than
    /// deleted, so the operation behaves as if no rule had been registered. Sequence numbers
    /// are not reset. Safe to call repeatedly.
    pub fn reset_all(&self) {
        let names = self.inner.methods.borrow().dispatch_names();
        for name in &names {
            let removed = self.inner.methods.borrow_mut().remove(name);
            let Some(Method::Dispatch(d)) = removed else {
                continue;
            };
            if let Some(base) = d.basefunc() {
                self.inner
                    .methods
                    .borrow_mut()
                    .insert(name.as_str(), Method::Plain(Rc::clone(base)));
            }
        }
        let dropped = self.inner.namespaces.take();
        info!(
            namespaces = dropped.len(),
            dispatchers = names.len(),
            "entwine reset"
        );
    }
}

impl<E: Element> Clone for Engine<E> {
    fn clone(&self) -> Self {
        Self {
            inner: Rc::clone(&self.inner),
        }
    }
}

impl<E: Element> fmt::Debug for Engine<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("namespaces", &self.namespace_names())
            .field("context", &self.inner.context)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::{
        method,
        dom::{Dom, Node},
    };

    fn engine() -> (Rc<Dom>, Engine<Node>) {
        let dom = Rc::new(Dom::new());
        dom.add("div", Some("x"), &["a", "b"]);
        dom.add("span", None, &["a"]);
        let engine = Engine::new(Rc::clone(&dom) as Rc<dyn Document<Node>>);
        (dom, engine)
    }

    #[test]
    fn base_namespace_is_created_lazily() {
        let (_dom, engine) = engine();
        assert!(engine.namespace_names().is_empty());
        let base = engine.base();
        assert!(base.is_base());
        assert_eq!(engine.namespace_names(), vec![BASE_NAMESPACE.to_string()]);
        assert!(Rc::ptr_eq(&base, &engine.namespace("")));
    }

    #[test]
    fn register_strips_leading_dot() {
        let (_dom, engine) = engine();
        let c = engine.select("*.a").unwrap();
        let bound = engine.register(
            &c,
            Some(".forms"),
            vec![Declarations::new().method("go", |_, _| Ok(Some(json!(1)))).into()],
        );
        assert_eq!(bound.namespace().name(), "forms");
        assert_eq!(engine.namespace_names(), vec!["__base", "forms"]);
    }

    #[test]
    fn reset_restores_plain_fallback() {
        let (_dom, engine) = engine();
        engine.define_method("go", method(|_, _| Ok(Some(json!("plain")))));
        let c = engine.select("#x").unwrap();
        c.entwine(
            None,
            vec![Declarations::new().method("go", |_, _| Ok(Some(json!("rule")))).into()],
        )
        .unwrap();
        assert_eq!(c.call("go", &[]).unwrap(), Some(json!("rule")));

        engine.reset_all();
        engine.reset_all();
        assert!(engine.namespace_names().is_empty());
        let c = engine.select("#x").unwrap();
        assert_eq!(c.call("go", &[]).unwrap(), Some(json!("plain")));
    }

    #[test]
    fn namespaces_do_not_keep_engine_alive() {
        let (_dom, engine) = engine();
        let ns = engine.namespace("forms");
        assert!(ns.engine().is_ok());
        drop(engine);
        assert!(matches!(ns.engine(), Err(crate::Error::EngineGone)));
    }
}
