//! State shared by every namespace of one engine.

use std::{cell::RefCell, fmt, rc::Rc};

use crate::{
    Document, Element, HandlerRegistry, Warnings, dispatch::Cursors, rule::Sequence,
};

/// Engine-wide state reachable from namespaces and collections.
pub(crate) struct Context<E: Element> {
    /// Element source and selector language.
    pub(crate) document: Rc<dyn Document<E>>,
    /// Warning channel.
    pub(crate) warnings: Warnings,
    /// Rule sequence numbers; never reset.
    pub(crate) sequence: Sequence,
    /// Declaration interpreters.
    pub(crate) handlers: RefCell<HandlerRegistry<E>>,
    /// Active continuation cursors per element.
    pub(crate) cursors: Cursors<E>,
}

impl<E: Element> Context<E> {
    /// Fresh state with the built-in handlers.
    pub(crate) fn new(document: Rc<dyn Document<E>>, warnings: Warnings) -> Self {
        Self {
            document,
            warnings,
            sequence: Sequence::default(),
            handlers: RefCell::new(HandlerRegistry::with_builtins()),
            cursors: Cursors::new(),
        }
    }
}

impl<E: Element> fmt::Debug for Context<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("warnings", &self.warnings)
            .field("sequence", &self.sequence)
            .field("handlers", &self.handlers.borrow().len())
            .field("active_cursors", &self.cursors.active())
            .finish()
    }
}
