//! Placeholder resolution.
//!
//! Data bundles are fetched once per generation, then every placeholder is
//! resolved through a fixed precedence chain: manual override, explicit
//! source path, best-effort key lookup across the bundles, declared default,
//! null. Resolution always runs to completion and reports every problem it
//! finds; only a genuinely absent client or service aborts.

use chrono::{Datelike, Local};
use common::model::placeholder::{PlaceholderSource, TemplatePlaceholder};
use common::model::resolution::{
    PlaceholderContext, PlaceholderError, PlaceholderResolutionResult, ResolvedPlaceholder,
};
use regex::Regex;
use serde_json::{json, Value};
use std::sync::OnceLock;

use crate::config::PracticeDetails;
use crate::error::GenerationError;
use crate::services::letters::format;
use crate::stores::{ClientDirectory, ServiceDirectory};

pub struct PlaceholderResolver<'a> {
    clients: &'a dyn ClientDirectory,
    services: &'a dyn ServiceDirectory,
    practice: &'a PracticeDetails,
}

/// Data bundles for one generation, fetched up front.
pub struct ResolutionBundles {
    pub client: Option<Value>,
    pub service: Option<Value>,
    pub system: Value,
    pub practice: Value,
    /// Display name of the resolved client, for result reporting.
    pub client_name: Option<String>,
    /// Bundle-level fetch failures, carried into the resolution result.
    errors: Vec<PlaceholderError>,
}

impl<'a> PlaceholderResolver<'a> {
    pub fn new(
        clients: &'a dyn ClientDirectory,
        services: &'a dyn ServiceDirectory,
        practice: &'a PracticeDetails,
    ) -> Self {
        Self {
            clients,
            services,
            practice,
        }
    }

    /// Fetches bundles and resolves the full placeholder set.
    pub fn resolve(
        &self,
        placeholders: &[TemplatePlaceholder],
        ctx: &PlaceholderContext,
    ) -> Result<PlaceholderResolutionResult, GenerationError> {
        let bundles = self.fetch_bundles(ctx)?;
        Ok(self.resolve_with_bundles(placeholders, ctx, &bundles))
    }

    /// Fetches the client and (when requested) service bundles exactly once.
    ///
    /// An absent record is a structural failure and aborts; an I/O failure is
    /// recorded as a bundle-level error so placeholders that do not depend on
    /// that bundle still resolve.
    pub fn fetch_bundles(
        &self,
        ctx: &PlaceholderContext,
    ) -> Result<ResolutionBundles, GenerationError> {
        let mut errors = Vec::new();

        let (client, client_name) = match self.clients.find_one(&ctx.client_id) {
            Ok(Some(record)) => {
                let name = record.name.clone();
                (Some(bundle_value(&record, &mut errors)), Some(name))
            }
            Ok(None) => return Err(GenerationError::ClientNotFound(ctx.client_id.clone())),
            Err(e) => {
                log::warn!("client bundle fetch failed for {}: {}", ctx.client_id, e);
                errors.push(PlaceholderError {
                    key: None,
                    code: "CLIENT_FETCH_FAILED",
                    message: format!("Could not load client data: {}", e),
                });
                (None, None)
            }
        };

        let service = match &ctx.service_id {
            Some(service_id) => match self.services.find_one(service_id) {
                Ok(Some(record)) => Some(bundle_value(&record, &mut errors)),
                Ok(None) => return Err(GenerationError::ServiceNotFound(service_id.clone())),
                Err(e) => {
                    log::warn!("service bundle fetch failed for {}: {}", service_id, e);
                    errors.push(PlaceholderError {
                        key: None,
                        code: "SERVICE_FETCH_FAILED",
                        message: format!("Could not load service data: {}", e),
                    });
                    None
                }
            },
            None => None,
        };

        Ok(ResolutionBundles {
            client,
            service,
            system: system_bundle(),
            practice: json!({
                "name": self.practice.name,
                "address": self.practice.address,
                "phone": self.practice.phone,
                "email": self.practice.email,
            }),
            client_name,
            errors,
        })
    }

    /// Resolves, validates and formats every placeholder against pre-fetched
    /// bundles. Never short-circuits: each placeholder gets an entry even
    /// when it resolves to null.
    pub fn resolve_with_bundles(
        &self,
        placeholders: &[TemplatePlaceholder],
        ctx: &PlaceholderContext,
        bundles: &ResolutionBundles,
    ) -> PlaceholderResolutionResult {
        let mut result = PlaceholderResolutionResult {
            errors: bundles.errors.clone(),
            ..Default::default()
        };

        for placeholder in placeholders {
            let (value, source) = resolve_value(placeholder, ctx, bundles);
            let formatted_value = format::format_value(
                placeholder.placeholder_type,
                &value,
                placeholder.format.as_deref(),
            );

            if format::is_empty_value(&value) {
                if placeholder.required {
                    result.missing_required.push(placeholder.key.clone());
                    result.errors.push(PlaceholderError {
                        key: Some(placeholder.key.clone()),
                        code: "REQUIRED_FIELD_MISSING",
                        message: format!("{} is required", placeholder.label),
                    });
                }
            } else {
                result.errors.extend(validate(placeholder, &value));
            }

            result.placeholders.insert(
                placeholder.key.clone(),
                ResolvedPlaceholder {
                    key: placeholder.key.clone(),
                    value,
                    formatted_value,
                    source,
                    placeholder_type: placeholder.placeholder_type,
                },
            );
        }

        result
    }
}

fn bundle_value<T: serde::Serialize>(record: &T, errors: &mut Vec<PlaceholderError>) -> Value {
    match serde_json::to_value(record) {
        Ok(v) => v,
        Err(e) => {
            errors.push(PlaceholderError {
                key: None,
                code: "BUNDLE_ENCODING_FAILED",
                message: e.to_string(),
            });
            Value::Null
        }
    }
}

fn system_bundle() -> Value {
    let now = Local::now();
    let today = now.date_naive();
    json!({
        "date": today.format("%Y-%m-%d").to_string(),
        "today": today.format("%Y-%m-%d").to_string(),
        "time": now.format("%H:%M").to_string(),
        "dateTime": now.to_rfc3339(),
        "year": today.year(),
    })
}

/// First match wins: manual value, explicit source path, best-effort key
/// lookup (client, then service, then system), declared default, null.
fn resolve_value(
    placeholder: &TemplatePlaceholder,
    ctx: &PlaceholderContext,
    bundles: &ResolutionBundles,
) -> (Value, PlaceholderSource) {
    let declared = placeholder.source.unwrap_or(PlaceholderSource::Manual);

    if let Some(value) = ctx.manual_values.get(&placeholder.key) {
        return (value.clone(), PlaceholderSource::Manual);
    }

    if let (Some(source), Some(path)) = (placeholder.source, placeholder.source_path.as_deref()) {
        if let Some(bundle) = bundle_for(source, bundles) {
            if let Some(value) = lookup_path(bundle, path) {
                return (value.clone(), source);
            }
        }
    }

    let fallbacks = [
        (bundles.client.as_ref(), PlaceholderSource::Client),
        (bundles.service.as_ref(), PlaceholderSource::Service),
        (Some(&bundles.system), PlaceholderSource::System),
    ];
    for (bundle, source) in fallbacks {
        let Some(bundle) = bundle else { continue };
        if let Some(value) = lookup_path(bundle, &placeholder.key)
            .or_else(|| lookup_path(bundle, &placeholder.key.to_lowercase()))
        {
            return (value.clone(), source);
        }
    }

    if let Some(default) = &placeholder.default_value {
        return (default.clone(), declared);
    }

    (Value::Null, declared)
}

fn bundle_for(source: PlaceholderSource, bundles: &ResolutionBundles) -> Option<&Value> {
    match source {
        PlaceholderSource::Client | PlaceholderSource::Profile => bundles.client.as_ref(),
        PlaceholderSource::Service => bundles.service.as_ref(),
        PlaceholderSource::System => Some(&bundles.system),
        PlaceholderSource::Practice => Some(&bundles.practice),
        PlaceholderSource::User | PlaceholderSource::Manual => None,
    }
}

/// Dotted lookup into a JSON tree.
fn lookup_path<'v>(bundle: &'v Value, path: &str) -> Option<&'v Value> {
    path.split('.')
        .try_fold(bundle, |node, segment| node.get(segment))
        .filter(|v| !v.is_null())
}

fn email_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[^@\s]+@[^@\s]+\.[^@\s]+$").expect("email regex"))
}

/// Syntactic checks for a non-empty resolved value, plus any declared
/// constraints.
fn validate(placeholder: &TemplatePlaceholder, value: &Value) -> Vec<PlaceholderError> {
    use common::model::placeholder::PlaceholderType;

    let mut errors = Vec::new();
    let key = || Some(placeholder.key.clone());
    let text = format::coerce_string(value);

    match placeholder.placeholder_type {
        PlaceholderType::Email => {
            if !email_regex().is_match(text.trim()) {
                errors.push(PlaceholderError {
                    key: key(),
                    code: "INVALID_EMAIL",
                    message: format!("{} must be a valid email address", placeholder.label),
                });
            }
        }
        PlaceholderType::Phone => {
            let digits = text.chars().filter(|c| c.is_ascii_digit()).count();
            if digits < 10 {
                errors.push(PlaceholderError {
                    key: key(),
                    code: "INVALID_PHONE",
                    message: format!("{} must be a valid phone number", placeholder.label),
                });
            }
        }
        PlaceholderType::Date => {
            if format::parse_date(value).is_none() {
                errors.push(PlaceholderError {
                    key: key(),
                    code: "INVALID_DATE",
                    message: format!("{} must be a valid date", placeholder.label),
                });
            }
        }
        PlaceholderType::Number => {
            if format::numeric(value).is_none() {
                errors.push(PlaceholderError {
                    key: key(),
                    code: "INVALID_NUMBER",
                    message: format!("{} must be a number", placeholder.label),
                });
            }
        }
        _ => {}
    }

    let Some(rules) = &placeholder.validation else {
        return errors;
    };

    if let Some(min_length) = rules.min_length {
        if text.chars().count() < min_length {
            errors.push(PlaceholderError {
                key: key(),
                code: "MIN_LENGTH",
                message: format!(
                    "{} must be at least {} characters",
                    placeholder.label, min_length
                ),
            });
        }
    }
    if let Some(max_length) = rules.max_length {
        if text.chars().count() > max_length {
            errors.push(PlaceholderError {
                key: key(),
                code: "MAX_LENGTH",
                message: format!(
                    "{} must be at most {} characters",
                    placeholder.label, max_length
                ),
            });
        }
    }
    if let Some(pattern) = &rules.pattern {
        match Regex::new(pattern) {
            Ok(re) => {
                if !re.is_match(&text) {
                    errors.push(PlaceholderError {
                        key: key(),
                        code: "PATTERN_MISMATCH",
                        message: format!("{} does not match the expected format", placeholder.label),
                    });
                }
            }
            Err(e) => {
                log::warn!("invalid validation pattern for {}: {}", placeholder.key, e);
                errors.push(PlaceholderError {
                    key: key(),
                    code: "INVALID_PATTERN",
                    message: format!("Validation pattern for {} is invalid", placeholder.label),
                });
            }
        }
    }
    if let Some(min) = rules.min {
        if format::numeric(value).map(|n| n < min).unwrap_or(false) {
            errors.push(PlaceholderError {
                key: key(),
                code: "MIN_VALUE",
                message: format!("{} must be at least {}", placeholder.label, min),
            });
        }
    }
    if let Some(max) = rules.max {
        if format::numeric(value).map(|n| n > max).unwrap_or(false) {
            errors.push(PlaceholderError {
                key: key(),
                code: "MAX_VALUE",
                message: format!("{} must be at most {}", placeholder.label, max),
            });
        }
    }

    errors
}
