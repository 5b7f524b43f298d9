//! The Handlebars-compatible evaluator and its fixed helper library.
//!
//! The date and currency helpers delegate to the same formatter the legacy
//! engine uses, so both syntaxes stay interchangeable within one template
//! family.

use common::model::resolution::PlaceholderResolutionResult;
use handlebars::{
    handlebars_helper, no_escape, Context, Handlebars, Helper, HelperResult, Output, RenderContext,
};
use serde_json::{Map, Value};
use std::sync::OnceLock;

use crate::error::GenerationError;
use crate::services::letters::format;

pub fn evaluate(
    body: &str,
    values: &PlaceholderResolutionResult,
) -> Result<String, GenerationError> {
    static REGISTRY: OnceLock<Handlebars<'static>> = OnceLock::new();
    let registry = REGISTRY.get_or_init(build_registry);
    registry
        .render_template(body, &data_tree(values))
        .map_err(|e| GenerationError::TemplateParsingFailed(e.to_string()))
}

/// Builds the data tree the template renders against: raw resolved values,
/// with dotted keys expanded into nested objects so `{{client.name}}`
/// resolves as a path.
fn data_tree(values: &PlaceholderResolutionResult) -> Value {
    let mut root = Map::new();
    for (key, resolved) in &values.placeholders {
        insert_path(&mut root, key, resolved.value.clone());
    }
    Value::Object(root)
}

fn insert_path(map: &mut Map<String, Value>, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            map.entry(path.to_string()).or_insert(value);
        }
        Some((head, rest)) => {
            let entry = map
                .entry(head.to_string())
                .or_insert_with(|| Value::Object(Map::new()));
            if let Value::Object(child) = entry {
                insert_path(child, rest, value);
            }
        }
    }
}

/// Whole results render as integers rather than `14.0`.
fn number_value(n: f64) -> Value {
    if n.fract() == 0.0 && n.abs() < 1e15 {
        Value::from(n as i64)
    } else {
        Value::from(n)
    }
}

handlebars_helper!(eq: |a: Json, b: Json| a == b);
handlebars_helper!(ne: |a: Json, b: Json| a != b);
handlebars_helper!(lt: |a: f64, b: f64| a < b);
handlebars_helper!(lte: |a: f64, b: f64| a <= b);
handlebars_helper!(gt: |a: f64, b: f64| a > b);
handlebars_helper!(gte: |a: f64, b: f64| a >= b);
handlebars_helper!(and: |a: Json, b: Json| format::is_truthy(a) && format::is_truthy(b));
handlebars_helper!(or: |a: Json, b: Json| format::is_truthy(a) || format::is_truthy(b));
handlebars_helper!(not: |a: Json| !format::is_truthy(a));
handlebars_helper!(add: |a: f64, b: f64| number_value(a + b));
handlebars_helper!(subtract: |a: f64, b: f64| number_value(a - b));
handlebars_helper!(multiply: |a: f64, b: f64| number_value(a * b));
handlebars_helper!(divide: |a: f64, b: f64| number_value(if b == 0.0 { 0.0 } else { a / b }));
handlebars_helper!(uppercase: |s: str| s.to_uppercase());
handlebars_helper!(lowercase: |s: str| s.to_lowercase());
handlebars_helper!(capitalize: |s: str| {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
});
handlebars_helper!(length: |v: Json| match v {
    Value::Array(items) => items.len() as u64,
    Value::Object(fields) => fields.len() as u64,
    Value::String(s) => s.chars().count() as u64,
    _ => 0,
});

fn format_date_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let null = Value::Null;
    let value = h.param(0).map(|p| p.value()).unwrap_or(&null);
    let fmt = h
        .param(1)
        .and_then(|p| p.value().as_str())
        .unwrap_or(format::DEFAULT_DATE_FORMAT);
    out.write(&format::format_date(value, fmt))?;
    Ok(())
}

fn currency_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let null = Value::Null;
    let value = h.param(0).map(|p| p.value()).unwrap_or(&null);
    out.write(&format::format_currency(value))?;
    Ok(())
}

/// Sums an `annualized` (falling back to `fee`) field across a list,
/// rendered with two decimal places.
fn calculate_annual_total_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let total: f64 = h
        .param(0)
        .and_then(|p| p.value().as_array())
        .map(|items| {
            items
                .iter()
                .filter_map(|item| {
                    item.get("annualized")
                        .and_then(format::numeric)
                        .or_else(|| item.get("fee").and_then(format::numeric))
                })
                .sum()
        })
        .unwrap_or(0.0);
    out.write(&format!("{:.2}", total))?;
    Ok(())
}

fn days_until_due_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let null = Value::Null;
    let value = h.param(0).map(|p| p.value()).unwrap_or(&null);
    if let Some(due) = format::parse_date(value) {
        let days = (due - format::today()).num_days();
        out.write(&days.to_string())?;
    }
    Ok(())
}

fn today_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let fmt = h
        .param(0)
        .and_then(|p| p.value().as_str())
        .unwrap_or(format::DEFAULT_DATE_FORMAT);
    out.write(&format::render_date(format::today(), fmt))?;
    Ok(())
}

fn default_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let null = Value::Null;
    let value = h.param(0).map(|p| p.value()).unwrap_or(&null);
    let fallback = h.param(1).map(|p| p.value()).unwrap_or(&null);
    let chosen = if format::is_empty_value(value) {
        fallback
    } else {
        value
    };
    out.write(&format::coerce_string(chosen))?;
    Ok(())
}

fn join_helper(
    h: &Helper,
    _: &Handlebars,
    _: &Context,
    _: &mut RenderContext,
    out: &mut dyn Output,
) -> HelperResult {
    let separator = h
        .param(1)
        .and_then(|p| p.value().as_str())
        .unwrap_or(", ")
        .to_string();
    if let Some(items) = h.param(0).and_then(|p| p.value().as_array()) {
        let joined = items
            .iter()
            .map(format::coerce_string)
            .collect::<Vec<_>>()
            .join(&separator);
        out.write(&joined)?;
    }
    Ok(())
}

fn build_registry() -> Handlebars<'static> {
    let mut registry = Handlebars::new();
    registry.register_escape_fn(no_escape);

    registry.register_helper("formatDate", Box::new(format_date_helper));
    registry.register_helper("currency", Box::new(currency_helper));
    registry.register_helper("formatCurrency", Box::new(currency_helper));
    registry.register_helper("calculateAnnualTotal", Box::new(calculate_annual_total_helper));
    registry.register_helper("daysUntilDue", Box::new(days_until_due_helper));
    registry.register_helper("today", Box::new(today_helper));
    registry.register_helper("default", Box::new(default_helper));
    registry.register_helper("join", Box::new(join_helper));

    registry.register_helper("eq", Box::new(eq));
    registry.register_helper("ne", Box::new(ne));
    registry.register_helper("lt", Box::new(lt));
    registry.register_helper("lte", Box::new(lte));
    registry.register_helper("gt", Box::new(gt));
    registry.register_helper("gte", Box::new(gte));
    registry.register_helper("and", Box::new(and));
    registry.register_helper("or", Box::new(or));
    registry.register_helper("not", Box::new(not));
    registry.register_helper("add", Box::new(add));
    registry.register_helper("subtract", Box::new(subtract));
    registry.register_helper("multiply", Box::new(multiply));
    registry.register_helper("divide", Box::new(divide));
    registry.register_helper("uppercase", Box::new(uppercase));
    registry.register_helper("lowercase", Box::new(lowercase));
    registry.register_helper("capitalize", Box::new(capitalize));
    registry.register_helper("length", Box::new(length));

    registry
}

#[cfg(test)]
mod tests {
    use super::*;
    use common::model::placeholder::{PlaceholderSource, PlaceholderType};
    use common::model::resolution::ResolvedPlaceholder;
    use serde_json::json;

    fn values(entries: &[(&str, Value)]) -> PlaceholderResolutionResult {
        let mut result = PlaceholderResolutionResult::default();
        for (key, value) in entries {
            result.placeholders.insert(
                key.to_string(),
                ResolvedPlaceholder {
                    key: key.to_string(),
                    formatted_value: format::coerce_string(value),
                    value: value.clone(),
                    source: PlaceholderSource::Manual,
                    placeholder_type: PlaceholderType::Text,
                },
            );
        }
        result
    }

    #[test]
    fn if_else_block() {
        let out = evaluate(
            "Dear {{name}}, {{#if isCompany}}Company{{else}}Individual{{/if}}",
            &values(&[("name", json!("John")), ("isCompany", json!(true))]),
        )
        .unwrap();
        assert_eq!(out, "Dear John, Company");
    }

    #[test]
    fn each_block_with_this() {
        let out = evaluate(
            "{{#each items}}{{this}},{{/each}}",
            &values(&[("items", json!(["A", "B", "C"]))]),
        )
        .unwrap();
        assert_eq!(out, "A,B,C,");
    }

    #[test]
    fn annual_total_sums_annualized_then_fee() {
        let out = evaluate(
            "{{calculateAnnualTotal services}}",
            &values(&[(
                "services",
                json!([{"annualized": 1000}, {"annualized": 500}]),
            )]),
        )
        .unwrap();
        assert_eq!(out, "1500.00");

        let out = evaluate(
            "{{calculateAnnualTotal services}}",
            &values(&[("services", json!([{"fee": 250.5}, {"annualized": 100}]))]),
        )
        .unwrap();
        assert_eq!(out, "350.50");
    }

    #[test]
    fn comparison_in_subexpression() {
        let out = evaluate(
            "{{#if (eq status \"Active\")}}live{{else}}closed{{/if}}",
            &values(&[("status", json!("Active"))]),
        )
        .unwrap();
        assert_eq!(out, "live");
    }

    #[test]
    fn date_and_currency_match_legacy_formatting() {
        let out = evaluate(
            "{{formatDate due \"DD/MM/YYYY\"}} for {{currency fee}}",
            &values(&[("due", json!("2025-11-25")), ("fee", json!(1500))]),
        )
        .unwrap();
        assert_eq!(out, "25/11/2025 for £1,500");
    }

    #[test]
    fn case_default_and_join_helpers() {
        let vals = values(&[
            ("name", json!("acme ltd")),
            ("missing", Value::Null),
            ("tags", json!(["vat", "paye"])),
        ]);
        assert_eq!(evaluate("{{uppercase name}}", &vals).unwrap(), "ACME LTD");
        assert_eq!(evaluate("{{capitalize name}}", &vals).unwrap(), "Acme ltd");
        assert_eq!(
            evaluate("{{default missing \"n/a\"}}", &vals).unwrap(),
            "n/a"
        );
        assert_eq!(evaluate("{{join tags \" | \"}}", &vals).unwrap(), "vat | paye");
        assert_eq!(evaluate("{{length tags}}", &vals).unwrap(), "2");
    }

    #[test]
    fn arithmetic_helpers() {
        let vals = values(&[("a", json!(10)), ("b", json!(4))]);
        assert_eq!(evaluate("{{add a b}}", &vals).unwrap(), "14");
        assert_eq!(evaluate("{{subtract a b}}", &vals).unwrap(), "6");
        assert_eq!(evaluate("{{multiply a b}}", &vals).unwrap(), "40");
        assert_eq!(evaluate("{{divide a b}}", &vals).unwrap(), "2.5");
    }

    #[test]
    fn dotted_keys_resolve_as_paths() {
        let out = evaluate(
            "{{client.name}} ({{client.postcode}})",
            &values(&[
                ("client.name", json!("Acme Ltd")),
                ("client.postcode", json!("LS1 1AA")),
            ]),
        )
        .unwrap();
        assert_eq!(out, "Acme Ltd (LS1 1AA)");
    }

    #[test]
    fn values_are_not_html_escaped() {
        let out = evaluate(
            "{{name}}",
            &values(&[("name", json!("Smith & Sons <Holdings>"))]),
        )
        .unwrap();
        assert_eq!(out, "Smith & Sons <Holdings>");
    }

    #[test]
    fn malformed_template_surfaces_parse_error() {
        let err = evaluate("{{#if open}}never closed", &values(&[])).unwrap_err();
        assert_eq!(err.code(), "TEMPLATE_PARSING_FAILED");
    }
}
