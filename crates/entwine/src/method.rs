//! Callable shapes stored in method and static tables.

use std::{collections::BTreeMap, fmt, rc::Rc};

use serde_json::Value;

use crate::{Collection, Element, Result, dispatch::Dispatcher};

/// Result of invoking an operation. `None` means "no value".
pub type Outcome = Result<Option<Value>>;

/// An operation implementation. The collection is the call target (`this`).
pub type MethodFn<E> = Rc<dyn Fn(&Collection<E>, &[Value]) -> Outcome>;

/// A static capability of a scope (not bound to any collection).
pub type StaticFn = Rc<dyn Fn(&[Value]) -> Outcome>;

/// Wrap a closure as a [`MethodFn`].
pub fn method<E, F>(f: F) -> MethodFn<E>
where
    E: Element,
    F: Fn(&Collection<E>, &[Value]) -> Outcome + 'static,
{
    Rc::new(f)
}

/// Wrap a closure as a [`StaticFn`].
pub fn static_fn<F>(f: F) -> StaticFn
where
    F: Fn(&[Value]) -> Outcome + 'static,
{
    Rc::new(f)
}

/// An entry in a method table.
pub enum Method<E: Element> {
    /// An ordinary method; called once with the whole collection.
    Plain(MethodFn<E>),
    /// A dispatch-enabled operation resolved per element.
    Dispatch(Rc<Dispatcher<E>>),
}

impl<E: Element> Method<E> {
    /// Is this a dispatcher?
    pub fn is_dispatch(&self) -> bool {
        matches!(self, Self::Dispatch(_))
    }
}

impl<E: Element> Clone for Method<E> {
    fn clone(&self) -> Self {
        match self {
            Self::Plain(f) => Self::Plain(Rc::clone(f)),
            Self::Dispatch(d) => Self::Dispatch(Rc::clone(d)),
        }
    }
}

impl<E: Element> fmt::Debug for Method<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Plain(_) => f.write_str("Plain"),
            Self::Dispatch(d) => write!(f, "Dispatch({})", d.operation()),
        }
    }
}

/// Static capabilities keyed by name.
pub type StaticTable = BTreeMap<String, StaticFn>;
