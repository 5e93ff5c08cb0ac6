//! Namespace-bound element collections.

use std::{fmt, rc::Rc, slice};

use serde_json::Value;

use crate::{Block, Element, Error, Namespace, Outcome, Result, Scope, Selector};

/// Operation names owned by the collection itself. Rules may be bound under these names
/// but cannot be invoked through [`Collection::call`].
pub const RESERVED_OPERATIONS: &[&str] = &[
    "call", "end", "entwine", "eq", "filter", "first", "has", "len", "not", "push_stack",
    "slice", "super",
];

/// Is `operation` owned by the collection type?
pub fn is_reserved(operation: &str) -> bool {
    RESERVED_OPERATIONS.contains(&operation)
}

/// An ordered set of elements bound to a namespace.
///
/// Operation calls on a collection resolve through its namespace's method table. The
/// collection remembers how it was selected so registrations can recover a selector.
pub struct Collection<E: Element> {
    /// Elements in document order.
    elements: Vec<E>,
    /// Description of how the collection was selected.
    selector: Option<String>,
    /// Namespace operation calls resolve against.
    namespace: Rc<Namespace<E>>,
    /// Collection this one was derived from.
    prev: Option<Rc<Collection<E>>>,
}

impl<E: Element> Collection<E> {
    /// Build a collection bound to `namespace`.
    pub(crate) fn new(
        elements: Vec<E>,
        selector: Option<String>,
        namespace: Rc<Namespace<E>>,
    ) -> Self {
        Self {
            elements,
            selector,
            namespace,
            prev: None,
        }
    }

    /// Number of elements.
    pub fn len(&self) -> usize {
        self.elements.len()
    }

    /// True when the collection holds no elements.
    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    /// Element at `i`.
    pub fn get(&self, i: usize) -> Option<&E> {
        self.elements.get(i)
    }

    /// Elements in order.
    pub fn iter(&self) -> slice::Iter<'_, E> {
        self.elements.iter()
    }

    /// Elements as a slice.
    pub fn elements(&self) -> &[E] {
        &self.elements
    }

    /// How this collection was selected, if known.
    pub fn selector(&self) -> Option<&str> {
        self.selector.as_deref()
    }

    /// Bound namespace.
    pub fn namespace(&self) -> &Rc<Namespace<E>> {
        &self.namespace
    }

    /// The bound namespace's static entry point.
    pub fn scope(&self) -> Scope<E> {
        self.namespace.scope()
    }

    /// The same elements and selector, bound to `namespace`.
    pub fn rebind(&self, namespace: &Rc<Namespace<E>>) -> Self {
        Self {
            elements: self.elements.clone(),
            selector: self.selector.clone(),
            namespace: Rc::clone(namespace),
            prev: None,
        }
    }

    /// Derive a collection from this one, recording provenance.
    ///
    /// The derived selector reads `<selector>.<name>(<arg>)`, which usually does not parse
    /// as a selector; registering on derived collections therefore warns.
    pub fn push_stack(&self, elements: Vec<E>, name: &str, arg: &str) -> Self {
        let base = self.selector.as_deref().unwrap_or_default();
        let selector = if name.is_empty() {
            self.selector.clone()
        } else {
            Some(format!("{base}.{name}({arg})"))
        };
        Self {
            elements,
            selector,
            namespace: Rc::clone(&self.namespace),
            prev: Some(Rc::new(self.clone())),
        }
    }

    /// The collection this one was derived from, or an empty one.
    pub fn end(&self) -> Self {
        match &self.prev {
            Some(prev) => prev.as_ref().clone(),
            None => self.namespace.wrap(Vec::new()),
        }
    }

    /// Elements matching `text`.
    pub fn filter(&self, text: &str) -> Result<Self> {
        let selector = self.namespace.context().document.parse(text)?;
        let kept = self
            .elements
            .iter()
            .filter(|el| selector.matches(el))
            .cloned()
            .collect();
        Ok(self.push_stack(kept, "filter", text))
    }

    /// Elements not matching `selector`.
    pub fn not(&self, selector: &dyn Selector<E>) -> Self {
        let kept = self
            .elements
            .iter()
            .filter(|el| !selector.matches(el))
            .cloned()
            .collect();
        self.push_stack(kept, "not", selector.source())
    }

    /// Elements in `start..end`, clamped to the collection.
    pub fn slice(&self, start: usize, end: usize) -> Self {
        let end = end.min(self.len());
        let start = start.min(end);
        self.push_stack(
            self.elements[start..end].to_vec(),
            "slice",
            &format!("{start},{end}"),
        )
    }

    /// The element at `i` as a collection.
    pub fn eq(&self, i: usize) -> Self {
        let kept = self.elements.get(i).cloned().into_iter().collect();
        self.push_stack(kept, "eq", &i.to_string())
    }

    /// The first element as a collection.
    pub fn first(&self) -> Self {
        self.eq(0)
    }

    /// Call `operation` through the bound namespace's method table.
    ///
    /// Unknown operations are a no-op returning `None`. Reserved names are refused.
    pub fn call(&self, operation: &str, args: &[Value]) -> Outcome {
        if is_reserved(operation) {
            return Err(Error::ReservedOperation {
                operation: operation.to_string(),
            });
        }
        self.namespace.dispatch(self, operation, args)
    }

    /// Run the next less specific implementation of the operation currently dispatching
    /// on the first element.
    ///
    /// Only the first element's cursor is used, and the next implementation runs once for
    /// that element. It is not repeated per element of a multi-element collection.
    pub fn super_call(&self, args: &[Value]) -> Outcome {
        let el = self.elements.first().ok_or(Error::SuperOnEmpty)?;
        let cursor = self
            .namespace
            .context()
            .cursors
            .current(&el.key())
            .ok_or_else(|| Error::SuperOutsideDispatch {
                element: format!("{el:?}"),
            })?;
        cursor.resolver.resolve(el, args, Some(cursor.index))
    }

    /// Does every element have a rule for `operation` in the bound namespace?
    pub fn has(&self, operation: &str) -> bool {
        self.namespace.has(self, operation)
    }

    /// Register blocks against this collection's selector.
    ///
    /// On a collection bound to a non-base namespace, `None` targets that namespace and a
    /// relative name nests under it; a leading `.` makes a name absolute.
    pub fn entwine(&self, namespace: Option<&str>, blocks: Vec<Block<E>>) -> Result<Self> {
        let engine = self.namespace.engine()?;
        let target = self.namespace.relative_name(namespace);
        Ok(engine.register(self, target.as_deref(), blocks))
    }
}

impl<E: Element> Clone for Collection<E> {
    fn clone(&self) -> Self {
        Self {
            elements: self.elements.clone(),
            selector: self.selector.clone(),
            namespace: Rc::clone(&self.namespace),
            prev: self.prev.clone(),
        }
    }
}

impl<E: Element> fmt::Debug for Collection<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Collection")
            .field("namespace", &self.namespace.name())
            .field("selector", &self.selector)
            .field("elements", &self.elements)
            .finish()
    }
}

impl<'a, E: Element> IntoIterator for &'a Collection<E> {
    type Item = &'a E;
    type IntoIter = slice::Iter<'a, E>;

    fn into_iter(self) -> Self::IntoIter {
        self.iter()
    }
}
