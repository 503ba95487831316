//! Shared helpers for callseq integration tests.
#![allow(dead_code)]

use callseq::{Harness, ScriptEngine};
use std::sync::Once;

static INIT: Once = Once::new();

/// Initializes tracing output for tests. Safe to call repeatedly.
pub fn init_test_logging() {
    INIT.call_once(|| {
        let filter = tracing_subscriber::EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info"));
        let _ = tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_test_writer()
            .try_init();
    });
}

/// A fresh harness plus a scripted engine consuming its counter.
pub fn rig() -> (Harness, ScriptEngine) {
    init_test_logging();
    let harness = Harness::new();
    let engine = ScriptEngine::new(&harness);
    (harness, engine)
}

/// Invokes `order` on the engine, one call after another.
pub fn run_order(engine: &ScriptEngine, order: &[&str]) {
    for label in order {
        engine.invoke(label);
    }
}

macro_rules! test_phase {
    ($name:expr) => {
        tracing::info!(phase = $name, "=== {} ===", $name);
    };
}
