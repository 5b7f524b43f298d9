//! The bracket-block template evaluator.
//!
//! Three ordered passes over the body: conditional blocks, list blocks, then
//! simple substitution. Block replacements are planned first as immutable
//! spans and applied once from the highest offset to the lowest, so earlier
//! offsets stay valid while later spans are rewritten.

use common::model::resolution::PlaceholderResolutionResult;
use serde_json::Value;

use crate::services::letters::format;
use crate::services::templates::parse::{self, BlockKind};

pub fn evaluate(body: &str, values: &PlaceholderResolutionResult) -> String {
    let body = apply_conditionals(body, values);
    let body = apply_lists(&body, values);
    substitute(&body, values)
}

/// A planned splice: replace `start..end` with `text`.
struct Replacement {
    start: usize,
    end: usize,
    text: String,
}

fn apply_plan(body: &str, mut plan: Vec<Replacement>) -> String {
    plan.sort_by(|a, b| b.start.cmp(&a.start));
    let mut out = body.to_string();
    for r in plan {
        out.replace_range(r.start..r.end, &r.text);
    }
    out
}

fn apply_conditionals(body: &str, values: &PlaceholderResolutionResult) -> String {
    let plan = parse::paired_blocks(body, BlockKind::Conditional)
        .into_iter()
        .map(|block| {
            let truthy = values
                .raw(&block.key)
                .map(format::is_truthy)
                .unwrap_or(false);
            Replacement {
                start: block.start,
                end: block.end,
                text: if truthy {
                    body[block.content_start..block.content_end].to_string()
                } else {
                    String::new()
                },
            }
        })
        .collect();
    apply_plan(body, plan)
}

fn apply_lists(body: &str, values: &PlaceholderResolutionResult) -> String {
    let plan = parse::paired_blocks(body, BlockKind::List)
        .into_iter()
        .map(|block| Replacement {
            start: block.start,
            end: block.end,
            text: render_list_block(
                &body[block.content_start..block.content_end],
                values.raw(&block.key),
            ),
        })
        .collect();
    apply_plan(body, plan)
}

/// Renders the inner template once per array element, newline-joined. Empty
/// or non-array data renders to nothing.
fn render_list_block(inner: &str, value: Option<&Value>) -> String {
    let items = match value {
        Some(Value::Array(items)) if !items.is_empty() => items,
        _ => return String::new(),
    };
    let inner = inner.trim();
    items
        .iter()
        .map(|item| render_list_item(inner, item))
        .collect::<Vec<_>>()
        .join("\n")
}

fn render_list_item(inner: &str, item: &Value) -> String {
    match item {
        Value::Object(fields) => {
            let mut out = inner.to_string();
            for (field, value) in fields {
                out = out.replace(&format!("{{{{{}}}}}", field), &format::coerce_string(value));
            }
            out
        }
        primitive => inner.replace("{{item}}", &format::coerce_string(primitive)),
    }
}

/// Replaces every remaining `{{key}}` and `{{type:key:format}}` occurrence
/// with the resolved formatted value. Array- and object-valued keys are
/// intentionally left alone; list blocks own those.
fn substitute(body: &str, values: &PlaceholderResolutionResult) -> String {
    let plan = parse::span_regex()
        .captures_iter(body)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let inner = caps.get(1)?.as_str().trim();
            let text = substitution_for(inner, values)?;
            Some(Replacement {
                start: whole.start(),
                end: whole.end(),
                text,
            })
        })
        .collect();
    apply_plan(body, plan)
}

fn substitution_for(inner: &str, values: &PlaceholderResolutionResult) -> Option<String> {
    if inner == "endif" || inner == "endlist" {
        return None;
    }
    if inner.starts_with("if:") || inner.starts_with("list:") {
        return None;
    }
    if inner.matches(':').count() == 2 {
        let mut parts = inner.splitn(3, ':');
        let type_token = parts.next()?.trim();
        let key = parts.next()?.trim();
        let occurrence_format = parts.next()?.trim();
        let resolved = values.placeholders.get(key)?;
        if resolved.value.is_array() || resolved.value.is_object() {
            return None;
        }
        let placeholder_type =
            parse::parse_type_token(type_token).unwrap_or(resolved.placeholder_type);
        return Some(format::format_value(
            placeholder_type,
            &resolved.value,
            Some(occurrence_format).filter(|f| !f.is_empty()),
        ));
    }
    let resolved = values.placeholders.get(inner)?;
    if resolved.value.is_array() || resolved.value.is_object() {
        return None;
    }
    Some(resolved.formatted_value.clone())
}
