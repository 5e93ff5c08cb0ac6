//! Per-element resolution and the continuation cursors behind super calls.
//!
//! A [`Resolver`] walks an operation's rule list downward from a start index and invokes
//! the first rule whose selector matches the element. While that implementation runs the
//! element carries a cursor `(index, resolver)`; a super call re-enters the same resolver
//! just below the running rule. Cursors live on a per-element stack owned by the engine
//! context and are popped by a guard, so every exit path restores the previous cursor.

use std::{
    cell::RefCell,
    collections::HashMap,
    fmt,
    rc::{Rc, Weak},
};

use serde_json::Value;
use tracing::trace;

use crate::{Collection, Element, Error, MethodFn, Namespace, Outcome};

/// Where a super call resumes for one element.
pub(crate) struct Cursor<E: Element> {
    /// Storage index of the rule currently running.
    pub(crate) index: usize,
    /// Resolver that invoked it.
    pub(crate) resolver: Rc<Resolver<E>>,
}

impl<E: Element> Clone for Cursor<E> {
    fn clone(&self) -> Self {
        Self {
            index: self.index,
            resolver: Rc::clone(&self.resolver),
        }
    }
}

/// Cursor stacks keyed by element identity.
pub(crate) struct Cursors<E: Element> {
    /// Innermost cursor last.
    frames: RefCell<HashMap<E::Key, Vec<Cursor<E>>>>,
}

impl<E: Element> Cursors<E> {
    /// No active cursors.
    pub(crate) fn new() -> Self {
        Self {
            frames: RefCell::new(HashMap::new()),
        }
    }

    /// Push a cursor for `key`; it is popped when the guard drops.
    pub(crate) fn enter(&self, key: E::Key, cursor: Cursor<E>) -> CursorGuard<'_, E> {
        self.frames.borrow_mut().entry(key).or_default().push(cursor);
        CursorGuard { cursors: self, key }
    }

    /// Innermost cursor for `key`, if a dispatch on that element is running.
    pub(crate) fn current(&self, key: &E::Key) -> Option<Cursor<E>> {
        self.frames.borrow().get(key).and_then(|s| s.last().cloned())
    }

    /// Number of elements with an active cursor.
    pub(crate) fn active(&self) -> usize {
        self.frames.borrow().len()
    }
}

/// Restores an element's previous cursor on drop.
pub(crate) struct CursorGuard<'a, E: Element> {
    /// Owner of the stack.
    cursors: &'a Cursors<E>,
    /// Element whose stack was pushed.
    key: E::Key,
}

impl<E: Element> Drop for CursorGuard<'_, E> {
    fn drop(&mut self) {
        let mut frames = self.cursors.frames.borrow_mut();
        if let Some(stack) = frames.get_mut(&self.key) {
            stack.pop();
            if stack.is_empty() {
                frames.remove(&self.key);
            }
        }
    }
}

/// Resolves one operation of one namespace against single elements.
pub struct Resolver<E: Element> {
    /// Owning namespace; weak so dispatchers stored in its tables do not keep it alive.
    namespace: Weak<Namespace<E>>,
    /// Name of the owning namespace, for errors.
    namespace_name: String,
    /// Operation being resolved.
    operation: String,
    /// Non-dispatch implementation used when no rule matches.
    basefunc: Option<MethodFn<E>>,
}

impl<E: Element> Resolver<E> {
    /// Build a resolver for `operation` in `namespace`.
    pub(crate) fn new(
        namespace: &Rc<Namespace<E>>,
        operation: &str,
        basefunc: Option<MethodFn<E>>,
    ) -> Self {
        Self {
            namespace: Rc::downgrade(namespace),
            namespace_name: namespace.name().to_string(),
            operation: operation.to_string(),
            basefunc,
        }
    }

    /// Operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Fallback implementation, if any.
    pub fn basefunc(&self) -> Option<&MethodFn<E>> {
        self.basefunc.as_ref()
    }

    /// Invoke the highest-priority rule below `start` that matches `element`.
    ///
    /// `start` defaults to the rule count, so the full list is searched. With no match the
    /// fallback runs; with no fallback the call is a no-op returning `None`.
    pub fn resolve(self: &Rc<Self>, element: &E, args: &[Value], start: Option<usize>) -> Outcome {
        let ns = self
            .namespace
            .upgrade()
            .ok_or_else(|| Error::NamespaceGone(self.namespace_name.clone()))?;
        let mut i = start.unwrap_or_else(|| ns.rule_count(&self.operation));
        while i > 0 {
            i -= 1;
            let Some(rule) = ns.rule_at(&self.operation, i) else {
                continue;
            };
            if !rule.selector().matches(element) {
                continue;
            }
            trace!(
                namespace = ns.name(),
                operation = %self.operation,
                selector = rule.selector().source(),
                index = i,
                element = ?element,
                "rule matched"
            );
            let this = ns.wrap(vec![element.clone()]);
            let _cursor = ns.context().cursors.enter(
                element.key(),
                Cursor {
                    index: i,
                    resolver: Rc::clone(self),
                },
            );
            return (rule.implementation())(&this, args);
        }
        match &self.basefunc {
            Some(base) => base(&ns.wrap(vec![element.clone()]), args),
            None => Ok(None),
        }
    }
}

impl<E: Element> fmt::Debug for Resolver<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Resolver")
            .field("namespace", &self.namespace_name)
            .field("operation", &self.operation)
            .field("basefunc", &self.basefunc.is_some())
            .finish()
    }
}

/// The dispatch-enabled operation installed in a method table.
pub struct Dispatcher<E: Element> {
    /// Per-element resolver shared with continuation cursors.
    resolver: Rc<Resolver<E>>,
}

impl<E: Element> Dispatcher<E> {
    /// Wrap a resolver.
    pub(crate) fn new(resolver: Rc<Resolver<E>>) -> Self {
        Self { resolver }
    }

    /// Operation name.
    pub fn operation(&self) -> &str {
        self.resolver.operation()
    }

    /// Fallback the dispatcher was built over.
    pub fn basefunc(&self) -> Option<&MethodFn<E>> {
        self.resolver.basefunc()
    }

    /// The underlying resolver.
    pub fn resolver(&self) -> &Rc<Resolver<E>> {
        &self.resolver
    }

    /// Resolve every element, last to first, returning the first element's result.
    ///
    /// Multi-element calls are for side effects; only the first element's value comes back.
    /// A failure stops the walk and propagates.
    pub fn invoke(&self, collection: &Collection<E>, args: &[Value]) -> Outcome {
        let mut rv = None;
        for el in collection.iter().rev() {
            rv = self.resolver.resolve(el, args, None)?;
        }
        Ok(rv)
    }
}

impl<E: Element> fmt::Debug for Dispatcher<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Dispatcher")
            .field("resolver", &self.resolver)
            .finish()
    }
}
