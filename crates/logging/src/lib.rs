//! Shared logging helpers and CLI argument definitions for the entwine workspace.
//!
//! Binaries flatten [`LogArgs`] into their own argument parser, then build an
//! [`EnvFilter`] from [`LogArgs::spec`].

use std::env;

use clap::Args;
use tracing_subscriber::EnvFilter;

/// Logging controls for CLI apps.
#[derive(Debug, Clone, Default, Args)]
pub struct LogArgs {
    /// Set global log level to trace (our crates only)
    #[arg(long, conflicts_with_all = ["debug", "log_level", "log_filter"])]
    pub trace: bool,

    /// Set global log level to debug (our crates only)
    #[arg(long, conflicts_with_all = ["trace", "log_level", "log_filter"])]
    pub debug: bool,

    /// Set a single global log level for our crates (error|warn|info|debug|trace)
    #[arg(long)]
    pub log_level: Option<String>,

    /// Set an explicit tracing filter directive (overrides other flags)
    /// e.g. "entwine=trace,entwine_cli=debug"
    #[arg(long)]
    pub log_filter: Option<String>,
}

impl LogArgs {
    /// Filter spec selected by these flags.
    pub fn spec(&self) -> String {
        compute_spec(
            self.trace,
            self.debug,
            self.log_level.as_deref(),
            self.log_filter.as_deref(),
        )
    }
}

/// List of crate targets that constitute "our" logs.
pub fn our_crates() -> &'static [&'static str] {
    &["entwine", "entwine_cli", "logging"]
}

/// Build a filter directive string that sets the same `level` for all of our crates.
pub fn level_spec_for(level: &str) -> String {
    let lvl = level.to_ascii_lowercase();
    our_crates()
        .iter()
        .map(|t| format!("{t}={lvl}"))
        .collect::<Vec<_>>()
        .join(",")
}

/// Compute the final filter spec string with precedence:
/// - `log_filter`
/// - `trace`/`debug`/`log_level` (crate-scoped)
/// - `RUST_LOG` env
/// - default to crate-scoped `warn`, so engine warnings are visible
pub fn compute_spec(
    trace: bool,
    debug: bool,
    log_level: Option<&str>,
    log_filter: Option<&str>,
) -> String {
    if let Some(spec) = log_filter {
        return spec.to_string();
    }
    if trace {
        return level_spec_for("trace");
    }
    if debug {
        return level_spec_for("debug");
    }
    if let Some(lvl) = log_level {
        return level_spec_for(lvl);
    }
    env::var("RUST_LOG").unwrap_or_else(|_| level_spec_for("warn"))
}

/// Create an `EnvFilter` from a spec string.
pub fn env_filter_from_spec(spec: &str) -> EnvFilter {
    EnvFilter::new(spec)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn explicit_filter_wins() {
        let spec = compute_spec(false, false, Some("info"), Some("entwine=trace"));
        assert_eq!(spec, "entwine=trace");
    }

    #[test]
    fn flags_scope_level_to_our_crates() {
        assert_eq!(
            compute_spec(true, false, None, None),
            "entwine=trace,entwine_cli=trace,logging=trace"
        );
        assert_eq!(
            compute_spec(false, true, None, None),
            "entwine=debug,entwine_cli=debug,logging=debug"
        );
        assert_eq!(
            level_spec_for("INFO"),
            "entwine=info,entwine_cli=info,logging=info"
        );
    }

    #[test]
    fn args_delegate_to_compute_spec() {
        let args = LogArgs {
            log_level: Some("error".into()),
            ..LogArgs::default()
        };
        assert_eq!(args.spec(), level_spec_for("error"));
    }
}
