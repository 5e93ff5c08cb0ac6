//! Pluggable interpreters for declaration entries.
//!
//! Every declaration entry is offered to the registered handlers in ascending `order`;
//! the first handler that claims it wins. A handler may also contribute methods and
//! statics to every namespace created after it was registered.

use std::rc::Rc;

use tracing::debug;

use crate::{Definition, Element, MethodFn, Namespace, Selector, StaticFn};

/// Order of the built-in [`MethodHandler`].
pub const METHOD_HANDLER_ORDER: i32 = 50;

/// Interprets declaration entries.
pub trait Handler<E: Element> {
    /// Position in the registry; lower runs first.
    fn order(&self) -> i32;

    /// Claim an entry, applying its effect. Returns `false` to pass it on.
    fn claim(
        &self,
        namespace: &Rc<Namespace<E>>,
        selector: &Rc<dyn Selector<E>>,
        key: &str,
        definition: &Definition<E>,
    ) -> bool;

    /// Methods injected into each new non-base namespace.
    fn namespace_method_overrides(&self, _namespace: &Namespace<E>) -> Vec<(String, MethodFn<E>)> {
        Vec::new()
    }

    /// Statics injected into each new non-base namespace's scope.
    fn namespace_static_overrides(&self, _namespace: &Namespace<E>) -> Vec<(String, StaticFn)> {
        Vec::new()
    }
}

/// Treats implementations as dispatch-enabled operations.
#[derive(Debug, Default, Clone, Copy)]
pub struct MethodHandler;

impl<E: Element> Handler<E> for MethodHandler {
    fn order(&self) -> i32 {
        METHOD_HANDLER_ORDER
    }

    fn claim(
        &self,
        namespace: &Rc<Namespace<E>>,
        selector: &Rc<dyn Selector<E>>,
        key: &str,
        definition: &Definition<E>,
    ) -> bool {
        match definition {
            Definition::Method(f) => {
                namespace.bind_proxy(Rc::clone(selector), key, Rc::clone(f));
                true
            }
            Definition::Important { importance, method } => {
                namespace.bind_proxy_with(
                    Rc::clone(selector),
                    key,
                    Rc::clone(method),
                    *importance,
                );
                true
            }
            Definition::Value(_) | Definition::Custom(_) => false,
        }
    }
}

/// Ordered handler list.
pub struct HandlerRegistry<E: Element> {
    /// Handlers in ascending order.
    handlers: Vec<Rc<dyn Handler<E>>>,
}

impl<E: Element> HandlerRegistry<E> {
    /// An empty registry.
    pub fn new() -> Self {
        Self {
            handlers: Vec::new(),
        }
    }

    /// A registry holding the built-in [`MethodHandler`].
    pub fn with_builtins() -> Self {
        let mut reg = Self::new();
        reg.add(Rc::new(MethodHandler));
        reg
    }

    /// Insert before the first handler with a strictly greater order.
    pub fn add(&mut self, handler: Rc<dyn Handler<E>>) {
        let order = handler.order();
        let pos = self
            .handlers
            .iter()
            .position(|h| h.order() > order)
            .unwrap_or(self.handlers.len());
        debug!(order, pos, "handler registered");
        self.handlers.insert(pos, handler);
    }

    /// Remove every handler.
    pub fn clear(&mut self) {
        self.handlers.clear();
    }

    /// Number of handlers.
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True when no handlers are registered.
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Handlers in order, cloned so callers may run them without holding a borrow.
    pub fn snapshot(&self) -> Vec<Rc<dyn Handler<E>>> {
        self.handlers.clone()
    }
}

impl<E: Element> Default for HandlerRegistry<E> {
    fn default() -> Self {
        Self::new()
    }
}
