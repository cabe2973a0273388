//! Scripting interpreter seam.
//!
//! The original grammar lets a spec embed a script body in two places: a
//! one-shot init script run when the source is constructed, and a `<script>`
//! fetch-data node evaluated on every expansion. Neither distilled spec nor
//! this crate implement a real interpreter; both are modeled as a narrow
//! trait so a host can plug in whatever engine it already embeds (Lua, JS,
//! a DSL) without the pipeline caring which.

use async_trait::async_trait;

/// Executes spec-embedded script bodies.
///
/// `execute` mirrors the "run a string, get back a string or nothing"
/// contract of the original scripting hook: a falsy/empty result is treated
/// the same as any other fetch-node producing `None`.
#[async_trait]
pub trait ScriptEngine: Send + Sync {
    /// Run `body` and return its result, or `None` if it produced nothing.
    async fn execute(&self, body: &str) -> Option<String>;
}

/// Default engine used when a source is built without one: every script
/// node evaluates to `None`.
#[derive(Debug, Default, Clone, Copy)]
pub struct NullScriptEngine;

#[async_trait]
impl ScriptEngine for NullScriptEngine {
    async fn execute(&self, _body: &str) -> Option<String> {
        None
    }
}
