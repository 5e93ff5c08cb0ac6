//! Rules and the per-operation sorted rule list.

use std::{cell::Cell, cmp::Ordering, fmt, iter::Rev, rc::Rc, slice};

use crate::{Element, MethodFn, Selector, Specificity};

/// Source of rule sequence numbers. Monotonic for the lifetime of an engine.
#[derive(Debug, Default)]
pub struct Sequence(Cell<u64>);

impl Sequence {
    /// Take the next number.
    pub fn issue(&self) -> u64 {
        let n = self.0.get();
        self.0.set(n + 1);
        n
    }

    /// Number of sequence values handed out so far.
    pub fn issued(&self) -> u64 {
        self.0.get()
    }
}

/// One selector-guarded implementation of an operation.
pub struct Rule<E: Element> {
    /// Guard for this rule.
    selector: Rc<dyn Selector<E>>,
    /// Cached from the selector at creation.
    specificity: Specificity,
    /// Operation the rule implements.
    operation: String,
    /// The implementation.
    implementation: MethodFn<E>,
    /// Overrides specificity when non-zero.
    importance: i32,
    /// Creation order.
    sequence: u64,
}

impl<E: Element> Rule<E> {
    /// Selector guarding this rule.
    pub fn selector(&self) -> &Rc<dyn Selector<E>> {
        &self.selector
    }

    /// Specificity captured at creation.
    pub fn specificity(&self) -> Specificity {
        self.specificity
    }

    /// Operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Implementation invoked on a match.
    pub fn implementation(&self) -> &MethodFn<E> {
        &self.implementation
    }

    /// Importance (default 0).
    pub fn importance(&self) -> i32 {
        self.importance
    }

    /// Global creation sequence number.
    pub fn sequence(&self) -> u64 {
        self.sequence
    }

    /// Ascending priority order: importance, then specificity, then creation order.
    pub fn compare(a: &Self, b: &Self) -> Ordering {
        a.importance
            .cmp(&b.importance)
            .then(a.specificity.cmp(&b.specificity))
            .then(a.sequence.cmp(&b.sequence))
    }
}

impl<E: Element> fmt::Debug for Rule<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Rule")
            .field("selector", &self.selector.source())
            .field("operation", &self.operation)
            .field("specificity", &self.specificity)
            .field("importance", &self.importance)
            .field("sequence", &self.sequence)
            .finish()
    }
}

/// Rules for one operation, kept sorted.
///
/// Storage is ascending: the lowest-priority rule sits at index 0, so resolution walks
/// from the end. Use [`RuleList::by_priority`] for highest-first iteration.
pub struct RuleList<E: Element> {
    /// Operation every rule in the list implements.
    operation: String,
    /// Rules in ascending priority.
    rules: Vec<Rc<Rule<E>>>,
}

impl<E: Element> RuleList<E> {
    /// An empty list for `operation`.
    pub fn new<S: Into<String>>(operation: S) -> Self {
        Self {
            operation: operation.into(),
            rules: Vec::new(),
        }
    }

    /// Operation name.
    pub fn operation(&self) -> &str {
        &self.operation
    }

    /// Build a rule with the next sequence number, insert it and re-sort.
    pub fn add_rule(
        &mut self,
        sequence: &Sequence,
        selector: Rc<dyn Selector<E>>,
        implementation: MethodFn<E>,
        importance: i32,
    ) -> Rc<Rule<E>> {
        let rule = Rc::new(Rule {
            specificity: selector.specificity(),
            selector,
            operation: self.operation.clone(),
            implementation,
            importance,
            sequence: sequence.issue(),
        });
        self.rules.push(Rc::clone(&rule));
        // Full stable re-sort, never an incremental insert.
        self.rules.sort_by(|a, b| Rule::compare(a, b));
        rule
    }

    /// Number of rules.
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    /// True when no rules are present.
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Rule at storage index `i` (ascending priority).
    pub fn get(&self, i: usize) -> Option<&Rc<Rule<E>>> {
        self.rules.get(i)
    }

    /// Rules from lowest to highest priority.
    pub fn ascending(&self) -> slice::Iter<'_, Rc<Rule<E>>> {
        self.rules.iter()
    }

    /// Rules from highest to lowest priority.
    pub fn by_priority(&self) -> Rev<slice::Iter<'_, Rc<Rule<E>>>> {
        self.rules.iter().rev()
    }
}

impl<E: Element> fmt::Debug for RuleList<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RuleList")
            .field("operation", &self.operation)
            .field("rules", &self.rules)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use proptest::prelude::*;

    use super::*;
    use crate::method;

    /// Selector stub with a fixed specificity.
    #[derive(Debug)]
    struct Fixed(Specificity, String);

    impl Selector<()> for Fixed {
        fn specificity(&self) -> Specificity {
            self.0
        }
        fn matches(&self, _element: &()) -> bool {
            true
        }
        fn source(&self) -> &str {
            &self.1
        }
    }

    fn fixed(a: u32, b: u32, c: u32) -> Rc<dyn Selector<()>> {
        Rc::new(Fixed(Specificity(a, b, c), format!("{a}-{b}-{c}")))
    }

    impl Element for () {
        type Key = ();
        fn key(&self) -> Self::Key {}
    }

    fn noop() -> MethodFn<()> {
        method(|_, _| Ok(None))
    }

    #[test]
    fn later_rule_wins_ties() {
        let seq = Sequence::default();
        let mut list = RuleList::new("speak");
        let first = list.add_rule(&seq, fixed(0, 1, 0), noop(), 0);
        let second = list.add_rule(&seq, fixed(0, 1, 0), noop(), 0);
        let order: Vec<u64> = list.by_priority().map(|r| r.sequence()).collect();
        assert_eq!(order, vec![second.sequence(), first.sequence()]);
    }

    #[test]
    fn importance_beats_specificity() {
        let seq = Sequence::default();
        let mut list = RuleList::new("speak");
        list.add_rule(&seq, fixed(3, 0, 0), noop(), 0);
        let important = list.add_rule(&seq, fixed(0, 0, 0), noop(), 1);
        assert_eq!(list.by_priority().next().unwrap().sequence(), important.sequence());
        assert_eq!(list.len(), 2);
        assert_eq!(list.get(1).unwrap().operation(), "speak");
    }

    #[test]
    fn sequence_survives_across_lists() {
        let seq = Sequence::default();
        let mut a = RuleList::new("a");
        let mut b = RuleList::new("b");
        let r1 = a.add_rule(&seq, fixed(0, 0, 0), noop(), 0);
        let r2 = b.add_rule(&seq, fixed(0, 0, 0), noop(), 0);
        assert!(r2.sequence() > r1.sequence());
        assert_eq!(seq.issued(), 2);
    }

    fn rule_strategy() -> impl Strategy<Value = (i32, u32, u32, u32)> {
        (-2i32..3, 0u32..3, 0u32..3, 0u32..3)
    }

    proptest! {
        #[test]
        fn list_is_always_in_priority_order(
            specs in proptest::collection::vec(rule_strategy(), 1..24),
        ) {
            let seq = Sequence::default();
            let mut list = RuleList::new("op");
            for (imp, a, b, c) in specs {
                list.add_rule(&seq, fixed(a, b, c), noop(), imp);
            }
            let ordered: Vec<_> = list.by_priority().collect();
            for pair in ordered.windows(2) {
                let (hi, lo) = (&pair[0], &pair[1]);
                let hi_key = (hi.importance(), hi.specificity(), hi.sequence());
                let lo_key = (lo.importance(), lo.specificity(), lo.sequence());
                prop_assert!(hi_key > lo_key);
            }
        }
    }
}
