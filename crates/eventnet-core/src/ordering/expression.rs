//! Template rendering for sort keys and agent options.
//!
//! Expressions are Tera templates (`{{ date }}`, `{{ file_pointer.file }}`)
//! rendered against an event payload plus injected variables such as
//! [`INDEX_VAR`]. The engine sits behind [`ExpressionRenderer`] so callers can
//! swap it out.

use serde_json::Value;
use tera::{Context, Tera};

use eventnet_store::Payload;

/// Variable bound to an event's zero-based position in its sorting batch.
pub const INDEX_VAR: &str = "_index_";

/// A template failed to parse or render.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
#[error("cannot render {template:?}: {reason}")]
pub struct RenderError {
    pub template: String,
    pub reason: String,
}

/// Renders a template against a JSON object context. Must not have side effects.
pub trait ExpressionRenderer: Send + Sync {
    /// Parse `template` without rendering it (configuration-time check).
    fn check(&self, template: &str) -> Result<(), RenderError>;

    /// Render `template` with the variables in `context`.
    fn render(&self, template: &str, context: &Payload) -> Result<String, RenderError>;
}

/// [`ExpressionRenderer`] backed by Tera, with autoescaping disabled.
#[derive(Debug, Clone, Copy, Default)]
pub struct TeraRenderer;

impl TeraRenderer {
    pub fn new() -> Self {
        Self
    }
}

fn describe(template: &str, err: &tera::Error) -> RenderError {
    // Tera nests the useful message (unknown variable, syntax error) in the
    // source chain; flatten it.
    let mut reason = err.to_string();
    let mut source = std::error::Error::source(err);
    while let Some(inner) = source {
        reason.push_str(": ");
        reason.push_str(&inner.to_string());
        source = inner.source();
    }
    RenderError {
        template: template.to_string(),
        reason,
    }
}

impl ExpressionRenderer for TeraRenderer {
    fn check(&self, template: &str) -> Result<(), RenderError> {
        let mut tera = Tera::default();
        tera.add_raw_template("expression", template)
            .map_err(|e| describe(template, &e))
    }

    fn render(&self, template: &str, context: &Payload) -> Result<String, RenderError> {
        let context = Context::from_value(Value::Object(context.clone()))
            .map_err(|e| describe(template, &e))?;
        Tera::one_off(template, &context, false).map_err(|e| describe(template, &e))
    }
}

/// Render `template`, falling back to the literal template text on failure.
///
/// The failure is logged at `warn` and counted; it never aborts the caller.
pub fn render_or_fallback(
    renderer: &dyn ExpressionRenderer,
    template: &str,
    context: &Payload,
) -> String {
    match renderer.render(template, context) {
        Ok(rendered) => rendered,
        Err(err) => {
            crate::obs::emit_render_fallback(template, &err);
            crate::metrics::METRICS.inc_render_fallbacks();
            template.to_string()
        }
    }
}
