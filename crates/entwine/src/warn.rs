//! Leveled warning channel.
//!
//! Warnings are side effects only: they never alter control flow. A warning is emitted
//! when its level is at or below the configured threshold. By default warnings go to
//! `tracing::warn!`; a sink can be installed to capture them instead.

use std::{
    cell::{Cell, RefCell},
    fmt,
};

use serde::Deserialize;
use tracing::warn;

use crate::Error;

/// Warning severity, ordered from always-shown to most pedantic.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WarnLevel {
    /// Only warnings emitted at this level are shown.
    #[default]
    None = 0,
    /// Misconfiguration that changes behavior (clashes, skipped declarations).
    Important = 1,
    /// Style problems such as badly formatted namespace names.
    BestPractice = 2,
}

/// A single emitted warning.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Warning {
    /// Level the warning was emitted at.
    pub level: WarnLevel,
    /// Rendered message.
    pub message: String,
}

/// Receives emitted warnings in place of the default tracing output.
pub type WarnSink = Box<dyn Fn(&Warning)>;

/// Threshold-gated warning channel owned by an engine.
pub struct Warnings {
    /// Highest level that is still emitted.
    threshold: Cell<WarnLevel>,
    /// Optional replacement output.
    sink: RefCell<Option<WarnSink>>,
}

impl Warnings {
    /// Create a channel with the given threshold.
    pub fn new(threshold: WarnLevel) -> Self {
        Self {
            threshold: Cell::new(threshold),
            sink: RefCell::new(None),
        }
    }

    /// Current threshold.
    pub fn level(&self) -> WarnLevel {
        self.threshold.get()
    }

    /// Change the threshold.
    pub fn set_level(&self, level: WarnLevel) {
        self.threshold.set(level);
    }

    /// Route warnings to `sink` instead of tracing.
    pub fn set_sink(&self, sink: WarnSink) {
        *self.sink.borrow_mut() = Some(sink);
    }

    /// Restore the default tracing output.
    pub fn clear_sink(&self) {
        *self.sink.borrow_mut() = None;
    }

    /// Emit `message` if `level` passes the threshold.
    pub fn warn<M: Into<String>>(&self, message: M, level: WarnLevel) {
        if level > self.threshold.get() {
            return;
        }
        self.emit(Warning {
            level,
            message: message.into(),
        });
    }

    /// Report a failure that escaped an implementation.
    ///
    /// Emitted at [`WarnLevel::Important`].
    pub fn warn_exception(&self, context: &str, on: Option<&dyn fmt::Debug>, err: &Error) {
        if WarnLevel::Important > self.threshold.get() {
            return;
        }
        let message = match on {
            Some(el) => format!("Uncaught failure {err} in {context} on {el:?}"),
            None => format!("Uncaught failure {err} in {context}"),
        };
        self.emit(Warning {
            level: WarnLevel::Important,
            message,
        });
    }

    /// Deliver to the sink, or to tracing when none is set.
    fn emit(&self, warning: Warning) {
        match self.sink.borrow().as_ref() {
            Some(sink) => sink(&warning),
            None => warn!(level = ?warning.level, "{}", warning.message),
        }
    }
}

impl Default for Warnings {
    fn default() -> Self {
        Self::new(WarnLevel::None)
    }
}

impl fmt::Debug for Warnings {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Warnings")
            .field("threshold", &self.threshold.get())
            .field("sink", &self.sink.borrow().is_some())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::rc::Rc;

    use super::*;

    fn capture(w: &Warnings) -> Rc<RefCell<Vec<Warning>>> {
        let seen = Rc::new(RefCell::new(Vec::new()));
        let sink_seen = Rc::clone(&seen);
        w.set_sink(Box::new(move |warning: &Warning| {
            sink_seen.borrow_mut().push(warning.clone());
        }));
        seen
    }

    #[test]
    fn threshold_gates_levels() {
        let w = Warnings::new(WarnLevel::Important);
        let seen = capture(&w);
        w.warn("style", WarnLevel::BestPractice);
        w.warn("clash", WarnLevel::Important);
        w.warn("always", WarnLevel::None);
        let seen = seen.borrow();
        let msgs: Vec<_> = seen.iter().map(|w| w.message.as_str()).collect();
        assert_eq!(msgs, vec!["clash", "always"]);
    }

    #[test]
    fn exception_needs_important() {
        let w = Warnings::new(WarnLevel::None);
        let seen = capture(&w);
        let err = Error::method("speak", "boom");
        w.warn_exception("speak", None, &err);
        assert!(seen.borrow().is_empty());

        w.set_level(WarnLevel::BestPractice);
        w.warn_exception("speak", Some(&"node#1"), &err);
        let seen = seen.borrow();
        assert_eq!(seen.len(), 1);
        assert!(seen[0].message.contains("in speak on \"node#1\""));
        assert_eq!(seen[0].level, WarnLevel::Important);
    }

    #[test]
    fn levels_parse_from_ron() {
        let lvl: WarnLevel = ron::from_str("best_practice").unwrap();
        assert_eq!(lvl, WarnLevel::BestPractice);
    }
}
