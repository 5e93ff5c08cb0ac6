//! Selector contract consumed by the engine.

use std::fmt;

/// Three-component cascade priority, compared lexicographically.
///
/// Conventionally `(ids, classes, tags)`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
pub struct Specificity(pub u32, pub u32, pub u32);

impl fmt::Display for Specificity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({},{},{})", self.0, self.1, self.2)
    }
}

/// A predicate over elements with a cascade specificity.
///
/// Selectors are immutable once built and are shared between the rules that hold them.
pub trait Selector<E>: fmt::Debug {
    /// Priority of this selector relative to others.
    fn specificity(&self) -> Specificity;

    /// Does `element` satisfy this selector?
    fn matches(&self, element: &E) -> bool;

    /// Textual form the selector was built from.
    fn source(&self) -> &str;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn specificity_is_lexicographic() {
        assert!(Specificity(1, 0, 0) > Specificity(0, 9, 9));
        assert!(Specificity(0, 2, 0) > Specificity(0, 1, 5));
        assert!(Specificity(0, 1, 1) > Specificity(0, 1, 0));
        assert_eq!(Specificity(0, 2, 1).to_string(), "(0,2,1)");
    }
}
