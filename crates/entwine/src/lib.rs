//! Entwine
//!
//! Selector-scoped operations with cascade-ordered dispatch. Implementations of a named
//! operation are bound to selectors; calling the operation on a collection runs, per
//! element, the most specific matching implementation, which can defer to the next less
//! specific one with [`Collection::super_call`].
//!
//! - [`Engine`]: owns namespaces, handlers and warnings for one [`Document`]
//! - [`Namespace`] and [`Scope`]: isolated rule stores and their entry points
//! - [`Collection`]: the call target operations dispatch on
//! - [`Handler`]: pluggable interpretation of declaration entries
//!
//! The engine is single-threaded. [`dom`] provides a small reference document.
mod collection;
mod config;
mod context;
mod declare;
mod dispatch;
mod element;
mod engine;
mod error;
mod handler;
mod method;
mod namespace;
mod rule;
mod selector;
mod warn;

pub mod dom;

pub use collection::{Collection, RESERVED_OPERATIONS, is_reserved};
pub use config::EngineConfig;
pub use declare::{BareFn, Block, Declarations, Definition, UsingFn};
pub use dispatch::{Dispatcher, Resolver};
pub use element::{Document, Element};
pub use engine::Engine;
pub use error::{Error, Result};
pub use handler::{Handler, HandlerRegistry, METHOD_HANDLER_ORDER, MethodHandler};
pub use method::{Method, MethodFn, Outcome, StaticFn, StaticTable, method, static_fn};
pub use namespace::{BASE_NAMESPACE, MethodTable, Namespace, Scope, valid_name};
pub use rule::{Rule, RuleList, Sequence};
pub use selector::{Selector, Specificity};
pub use warn::{WarnLevel, WarnSink, Warning, Warnings};
