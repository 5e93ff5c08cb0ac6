//! Error types for rule registration and dispatch.

use std::result;

use thiserror::Error;

/// Convenient result type for entwine operations.
pub type Result<T> = result::Result<T, Error>;

/// Errors surfaced by the engine.
///
/// Configuration problems (bad namespace names, blocks without a selector, name clashes)
/// are reported through [`crate::Warnings`] and never show up here. Only implementation
/// failures and misuse of the public contracts do.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum Error {
    /// The document's selector engine could not parse a selector.
    #[error("Invalid selector '{selector}': {message}")]
    Selector {
        /// Selector text as supplied.
        selector: String,
        /// Human-readable parse failure.
        message: String,
    },
    /// The operation name belongs to the collection itself and cannot be called by name.
    #[error("Operation '{operation}' is reserved by the collection and cannot be called directly")]
    ReservedOperation {
        /// Name of the reserved operation.
        operation: String,
    },
    /// A super call was made from outside any dispatch for the target element.
    #[error("Super called on {element} outside of a dispatch")]
    SuperOutsideDispatch {
        /// Debug rendering of the element the super call targeted.
        element: String,
    },
    /// A super call was made on an empty collection.
    #[error("Super called on an empty collection")]
    SuperOnEmpty,
    /// No static capability with this name is visible from the scope.
    #[error("Unknown static '{0}'")]
    UnknownStatic(String),
    /// A namespace was dropped while a dispatcher still referred to it.
    #[error("Namespace '{0}' is no longer available")]
    NamespaceGone(String),
    /// The engine owning a namespace was dropped.
    #[error("Engine has been dropped")]
    EngineGone,
    /// Engine configuration could not be parsed.
    #[error("Configuration error: {0}")]
    Config(String),
    /// An operation implementation failed.
    #[error("Operation '{operation}' failed: {message}")]
    Method {
        /// Operation whose implementation failed.
        operation: String,
        /// Failure description.
        message: String,
    },
}

impl Error {
    /// Helper for implementations reporting their own failure.
    pub fn method<O: Into<String>, M: Into<String>>(operation: O, message: M) -> Self {
        Self::Method {
            operation: operation.into(),
            message: message.into(),
        }
    }

    /// Helper to build a selector error.
    pub fn selector<S: Into<String>, M: Into<String>>(selector: S, message: M) -> Self {
        Self::Selector {
            selector: selector.into(),
            message: message.into(),
        }
    }
}
