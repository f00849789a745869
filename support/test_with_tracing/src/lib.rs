// Copyright (c) Microsoft Corporation.
// Licensed under the MIT License.

//! Test harness support for crates that log through `tracing`.
//!
//! Annotate tests with [`test`] instead of `#[test]` to get their `tracing`
//! output captured by the test runner. Output is filtered by the `RUST_LOG`
//! environment variable, using `target=level` directives separated by commas.
//! Without it, everything at `DEBUG` and above is shown, and the backdoor
//! crates are shown down to `TRACE`.

#[cfg(test)]
extern crate self as test_with_tracing;

pub use test_with_tracing_macro::test;
use tracing::metadata::LevelFilter;
use tracing_subscriber::filter::Targets;
use tracing_subscriber::prelude::*;

/// Targets that log at `TRACE` when `RUST_LOG` is not set.
const VERBOSE_TARGETS: &[&str] = &["vmw_backdoor", "tdcall"];

fn default_targets() -> Targets {
    VERBOSE_TARGETS
        .iter()
        .fold(Targets::new().with_default(LevelFilter::DEBUG), |t, target| {
            t.with_target(*target, LevelFilter::TRACE)
        })
}

#[doc(hidden)]
/// Installs the global subscriber. Called by the code generated by
/// [`test`]; later calls do nothing.
pub fn init() {
    static ONCE: std::sync::Once = std::sync::Once::new();

    ONCE.call_once(|| {
        let targets = match std::env::var("RUST_LOG") {
            Ok(var) => var.parse().unwrap_or_else(|err| {
                eprintln!("ignoring malformed RUST_LOG {var:?}: {err}");
                default_targets()
            }),
            Err(_) => default_targets(),
        };
        tracing_subscriber::fmt()
            .with_ansi(false)
            .with_test_writer()
            .with_max_level(LevelFilter::TRACE)
            .finish()
            .with(targets)
            .init();
    });
}
