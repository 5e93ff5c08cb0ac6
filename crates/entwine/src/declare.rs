//! Declaration maps and registration blocks.

use std::{any::Any, fmt, rc::Rc};

use serde_json::Value;

use crate::{Collection, Element, MethodFn, Outcome};

/// The value side of a declaration entry. Handlers decide which kinds they claim.
pub enum Definition<E: Element> {
    /// An operation implementation; claimed by the built-in method handler.
    Method(MethodFn<E>),
    /// An operation implementation with an explicit importance.
    Important {
        /// Importance, overriding selector specificity.
        importance: i32,
        /// The implementation.
        method: MethodFn<E>,
    },
    /// A plain data value.
    Value(Value),
    /// Anything else, for third-party handlers.
    Custom(Rc<dyn Any>),
}

impl<E: Element> Clone for Definition<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Method(m) => Self::Method(Rc::clone(m)),
            Self::Important { importance, method } => Self::Important {
                importance: *importance,
                method: Rc::clone(method),
            },
            Self::Value(v) => Self::Value(v.clone()),
            Self::Custom(c) => Self::Custom(Rc::clone(c)),
        }
    }
}

impl<E: Element> fmt::Debug for Definition<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Method(_) => f.write_str("Method"),
            Self::Important { importance, .. } => write!(f, "Important({importance})"),
            Self::Value(v) => write!(f, "Value({v})"),
            Self::Custom(_) => f.write_str("Custom"),
        }
    }
}

/// An ordered map from keys to definitions.
pub struct Declarations<E: Element> {
    /// Entries in declaration order.
    entries: Vec<(String, Definition<E>)>,
}

impl<E: Element> Declarations<E> {
    /// An empty map.
    pub fn new() -> Self {
        Self {
            entries: Vec::new(),
        }
    }

    /// Add an entry.
    pub fn insert<K: Into<String>>(&mut self, key: K, definition: Definition<E>) {
        self.entries.push((key.into(), definition));
    }

    /// Builder form of [`Declarations::insert`].
    pub fn with<K: Into<String>>(mut self, key: K, definition: Definition<E>) -> Self {
        self.insert(key, definition);
        self
    }

    /// Declare an operation implementation.
    pub fn method<K, F>(self, key: K, f: F) -> Self
    where
        K: Into<String>,
        F: Fn(&Collection<E>, &[Value]) -> Outcome + 'static,
    {
        self.with(key, Definition::Method(Rc::new(f)))
    }

    /// Declare an operation implementation with an importance.
    pub fn important<K, F>(self, key: K, importance: i32, f: F) -> Self
    where
        K: Into<String>,
        F: Fn(&Collection<E>, &[Value]) -> Outcome + 'static,
    {
        self.with(
            key,
            Definition::Important {
                importance,
                method: Rc::new(f),
            },
        )
    }

    /// Declare a plain value.
    pub fn value<K: Into<String>>(self, key: K, value: Value) -> Self {
        self.with(key, Definition::Value(value))
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// True when there are no entries.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Entries in declaration order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &Definition<E>)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v))
    }
}

impl<E: Element> Default for Declarations<E> {
    fn default() -> Self {
        Self::new()
    }
}

impl<E: Element> fmt::Debug for Declarations<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_map()
            .entries(self.entries.iter().map(|(k, v)| (k, v)))
            .finish()
    }
}

/// Produces declarations from the collection, rebound into the target namespace.
pub type UsingFn<E> = Box<dyn FnOnce(&Collection<E>) -> Option<Declarations<E>>>;

/// Produces declarations without looking at the collection.
pub type BareFn<E> = Box<dyn FnOnce() -> Option<Declarations<E>>>;

/// One argument to a registration call.
pub enum Block<E: Element> {
    /// A declaration map applied to the calling selector.
    Declarations(Declarations<E>),
    /// A block given the namespaced collection; may return declarations.
    Using(UsingFn<E>),
    /// A block that does not accept the collection. Invoked with a warning.
    Bare(BareFn<E>),
}

impl<E: Element> Block<E> {
    /// Wrap a closure taking the namespaced collection.
    pub fn using<F>(f: F) -> Self
    where
        F: FnOnce(&Collection<E>) -> Option<Declarations<E>> + 'static,
    {
        Self::Using(Box::new(f))
    }

    /// Wrap a closure taking no arguments.
    pub fn bare<F>(f: F) -> Self
    where
        F: FnOnce() -> Option<Declarations<E>> + 'static,
    {
        Self::Bare(Box::new(f))
    }
}

impl<E: Element> From<Declarations<E>> for Block<E> {
    fn from(decls: Declarations<E>) -> Self {
        Self::Declarations(decls)
    }
}
