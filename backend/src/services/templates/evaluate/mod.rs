//! Template evaluation.
//!
//! Two interchangeable strategies, selected once per body by syntax
//! sniffing: templates carrying Handlebars block markers run through the
//! Handlebars-compatible engine; everything else runs through the legacy
//! bracket-block evaluator.

pub mod helpers;
pub mod legacy;

use common::model::resolution::PlaceholderResolutionResult;

use crate::error::GenerationError;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EvaluationStrategy {
    Legacy,
    Handlebars,
}

const HANDLEBARS_MARKERS: &[&str] = &[
    "{{#if", "{{#each", "{{#unless", "{{#with", "{{/if}}", "{{/each}}", "{{else}}",
];

pub fn detect_strategy(body: &str) -> EvaluationStrategy {
    if HANDLEBARS_MARKERS.iter().any(|marker| body.contains(marker)) {
        EvaluationStrategy::Handlebars
    } else {
        EvaluationStrategy::Legacy
    }
}

/// Populates a template body from the resolved value map.
pub fn evaluate(
    body: &str,
    values: &PlaceholderResolutionResult,
) -> Result<String, GenerationError> {
    match detect_strategy(body) {
        EvaluationStrategy::Legacy => Ok(legacy::evaluate(body, values)),
        EvaluationStrategy::Handlebars => helpers::evaluate(body, values),
    }
}
