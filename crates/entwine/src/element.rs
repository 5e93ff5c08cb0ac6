//! Element and document contracts consumed by the engine.

use std::{fmt, hash::Hash, rc::Rc};

use crate::{Result, Selector};

/// An addressable element.
///
/// Cloning must be cheap; the engine clones elements into single-element collections for
/// every dispatched call. `key` identifies the element across clones.
pub trait Element: Clone + fmt::Debug + 'static {
    /// Identity of the element.
    type Key: Copy + Eq + Hash + fmt::Debug;

    /// Stable identity shared by every clone of this element.
    fn key(&self) -> Self::Key;
}

/// The element source and selector language the engine runs against.
pub trait Document<E: Element> {
    /// Parse selector text into a selector.
    fn parse(&self, text: &str) -> Result<Rc<dyn Selector<E>>>;

    /// Every element matched by `selector`, in document order.
    fn query(&self, selector: &dyn Selector<E>) -> Vec<E>;
}
