//! Placeholder extraction from raw template text.
//!
//! A single pass over the body collects every `{{...}}` span and classifies
//! it: block terminators (`endif`/`endlist`), block openers (`if:`/`list:`),
//! explicitly typed placeholders (`{{type:key:format}}`, exactly two colons)
//! and plain keys. Keys are deduplicated; the first occurrence wins.
//!
//! Block openers pair with terminators positionally: the Nth `if:` opener
//! pairs with the Nth `{{endif}}` in document order. Nested or interleaved
//! blocks are not supported.

use common::model::placeholder::{PlaceholderSource, PlaceholderType, TemplatePlaceholder};
use regex::Regex;
use std::collections::HashSet;
use std::fs;
use std::path::Path;
use std::sync::OnceLock;

use crate::error::GenerationError;

pub(crate) fn span_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"\{\{([^{}]+)\}\}").expect("placeholder span regex"))
}

/// Extracts the deduplicated placeholder set from template text.
///
/// Re-parsing identical text yields an identical result.
pub fn extract_placeholders(text: &str) -> Vec<TemplatePlaceholder> {
    let mut seen: HashSet<String> = HashSet::new();
    let mut placeholders = Vec::new();

    for caps in span_regex().captures_iter(text) {
        let inner = caps[1].trim();
        for parsed in classify_span(inner) {
            if seen.insert(parsed.key.clone()) {
                placeholders.push(build_placeholder(parsed));
            }
        }
    }

    placeholders
}

/// Reads a template file and extracts its placeholders.
pub fn extract_placeholders_from_file(path: &Path) -> Result<Vec<TemplatePlaceholder>, GenerationError> {
    if !path.exists() {
        return Err(GenerationError::TemplateFileNotFound(
            path.display().to_string(),
        ));
    }
    let text = fs::read_to_string(path).map_err(|e| {
        GenerationError::TemplateParsingFailed(format!("{}: {}", path.display(), e))
    })?;
    Ok(extract_placeholders(&text))
}

struct ParsedSpan {
    key: String,
    explicit_type: Option<PlaceholderType>,
    format: Option<String>,
}

fn classify_span(inner: &str) -> Vec<ParsedSpan> {
    // terminators of both syntaxes
    if inner == "endif" || inner == "endlist" || inner == "else" || inner.starts_with('/') {
        return Vec::new();
    }
    if inner == "this" || inner.starts_with("this.") || inner.starts_with('@') {
        return Vec::new();
    }
    if let Some(condition) = inner.strip_prefix("if:") {
        return vec![ParsedSpan {
            key: condition.trim().to_string(),
            explicit_type: Some(PlaceholderType::Conditional),
            format: None,
        }];
    }
    if let Some(key) = inner.strip_prefix("list:") {
        return vec![ParsedSpan {
            key: key.trim().to_string(),
            explicit_type: Some(PlaceholderType::List),
            format: None,
        }];
    }
    if inner.starts_with('#') {
        return handlebars_block_spans(inner);
    }
    if inner.matches(':').count() == 2 {
        let mut parts = inner.splitn(3, ':');
        let type_token = parts.next().unwrap_or_default().trim();
        let key = parts.next().unwrap_or_default().trim();
        let format = parts.next().unwrap_or_default().trim();
        return vec![ParsedSpan {
            key: key.to_string(),
            explicit_type: parse_type_token(type_token),
            format: if format.is_empty() {
                None
            } else {
                Some(format.to_string())
            },
        }];
    }
    if inner.contains(char::is_whitespace) {
        // Handlebars helper invocation: every bare path argument is a
        // placeholder reference.
        return handlebars_keys(inner)
            .into_iter()
            .map(|key| ParsedSpan {
                key,
                explicit_type: None,
                format: None,
            })
            .collect();
    }
    vec![ParsedSpan {
        key: inner.to_string(),
        explicit_type: None,
        format: None,
    }]
}

/// Spans for a Handlebars block opener (`#if cond`, `#each list`, ...).
/// A bare condition/subject keeps the block's own type; arguments buried in
/// subexpressions fall back to inference.
fn handlebars_block_spans(inner: &str) -> Vec<ParsedSpan> {
    let block_type = match inner.split_whitespace().next().unwrap_or_default() {
        "#if" | "#unless" => Some(PlaceholderType::Conditional),
        "#each" => Some(PlaceholderType::List),
        "#with" => None,
        _ => return Vec::new(),
    };
    let bare_subject = inner
        .split_whitespace()
        .nth(1)
        .filter(|t| !t.starts_with('('))
        .is_some();
    handlebars_keys(inner)
        .into_iter()
        .enumerate()
        .map(|(i, key)| ParsedSpan {
            key,
            explicit_type: if i == 0 && bare_subject {
                block_type
            } else {
                None
            },
            format: None,
        })
        .collect()
}

/// Extracts bare path arguments from a Handlebars expression, skipping the
/// helper name, subexpression helper names, string/number literals and
/// keywords.
fn handlebars_keys(inner: &str) -> Vec<String> {
    let mut keys = Vec::new();
    for (i, raw) in inner.split_whitespace().enumerate() {
        if i == 0 {
            continue; // helper or block name
        }
        if raw.starts_with('(') {
            continue; // helper name opening a subexpression
        }
        let token = raw.trim_matches(|c: char| c == '(' || c == ')');
        if token.is_empty() || token.starts_with('"') || token.starts_with('\'') {
            continue;
        }
        if matches!(token, "true" | "false" | "null" | "this" | "else") {
            continue;
        }
        let mut chars = token.chars();
        let starts_like_path = chars
            .next()
            .map(|c| c.is_alphabetic() || c == '_')
            .unwrap_or(false);
        if !starts_like_path
            || !token
                .chars()
                .all(|c| c.is_alphanumeric() || c == '_' || c == '.')
        {
            continue;
        }
        keys.push(token.to_string());
    }
    keys
}

pub(crate) fn parse_type_token(token: &str) -> Option<PlaceholderType> {
    match token.to_lowercase().as_str() {
        "text" => Some(PlaceholderType::Text),
        "date" => Some(PlaceholderType::Date),
        "currency" => Some(PlaceholderType::Currency),
        "number" => Some(PlaceholderType::Number),
        "email" => Some(PlaceholderType::Email),
        "phone" => Some(PlaceholderType::Phone),
        "address" => Some(PlaceholderType::Address),
        "list" => Some(PlaceholderType::List),
        _ => None,
    }
}

fn build_placeholder(span: ParsedSpan) -> TemplatePlaceholder {
    let placeholder_type = span
        .explicit_type
        .unwrap_or_else(|| infer_type(&span.key));
    let (source, source_path) = infer_source(&span.key);
    TemplatePlaceholder {
        label: label_for_key(&span.key),
        key: span.key,
        placeholder_type,
        required: false,
        format: span.format,
        source: Some(source),
        source_path: Some(source_path),
        default_value: None,
        validation: None,
    }
}

/// Predicate over a lower-cased placeholder key.
enum KeyPredicate {
    ContainsAny(&'static [&'static str]),
    EndsWithAny(&'static [&'static str]),
}

impl KeyPredicate {
    fn matches(&self, key: &str) -> bool {
        match self {
            KeyPredicate::ContainsAny(tokens) => tokens.iter().any(|t| key.contains(t)),
            KeyPredicate::EndsWithAny(tokens) => tokens.iter().any(|t| key.ends_with(t)),
        }
    }
}

/// Ordered type-inference rules, evaluated top to bottom. New heuristics are
/// added as rows, not branches.
static TYPE_RULES: &[(KeyPredicate, PlaceholderType)] = &[
    (
        KeyPredicate::ContainsAny(&["date", "time"]),
        PlaceholderType::Date,
    ),
    (
        KeyPredicate::EndsWithAny(&["at", "on"]),
        PlaceholderType::Date,
    ),
    (
        KeyPredicate::ContainsAny(&["fee", "price", "cost", "amount", "payment"]),
        PlaceholderType::Currency,
    ),
    (
        KeyPredicate::ContainsAny(&["number", "count", "qty"]),
        PlaceholderType::Number,
    ),
    (
        KeyPredicate::ContainsAny(&["email"]),
        PlaceholderType::Email,
    ),
    (
        KeyPredicate::ContainsAny(&["phone", "mobile", "tel"]),
        PlaceholderType::Phone,
    ),
    (
        KeyPredicate::ContainsAny(&["address", "postcode"]),
        PlaceholderType::Address,
    ),
    (
        KeyPredicate::ContainsAny(&["directors", "shareholders", "items", "list"]),
        PlaceholderType::List,
    ),
];

fn infer_type(key: &str) -> PlaceholderType {
    let key = key.to_lowercase();
    for (predicate, placeholder_type) in TYPE_RULES {
        if predicate.matches(&key) {
            return *placeholder_type;
        }
    }
    PlaceholderType::Text
}

/// Ordered source-inference rules. The matched token doubles as the prefix
/// stripped from the key when deriving the bundle lookup path.
static SOURCE_RULES: &[(&[&str], PlaceholderSource)] = &[
    (&["client", "company"], PlaceholderSource::Client),
    (&["profile"], PlaceholderSource::Profile),
    (&["service", "engagement", "fee", "due"], PlaceholderSource::Service),
    (
        &["user", "advisor", "preparedby", "accountant"],
        PlaceholderSource::User,
    ),
    (&["practice"], PlaceholderSource::Practice),
    (&["system", "current", "today"], PlaceholderSource::System),
];

fn infer_source(key: &str) -> (PlaceholderSource, String) {
    let lowered = key.to_lowercase();
    let root = lowered.split('.').next().unwrap_or(&lowered);

    for (tokens, source) in SOURCE_RULES {
        for token in *tokens {
            let hit = if lowered.contains('.') {
                root == *token
            } else {
                lowered.contains(token)
            };
            if hit {
                return (*source, derive_source_path(key, token));
            }
        }
    }
    (PlaceholderSource::Manual, lower_first(key))
}

/// Strips the matched source token from the key and lower-cases the first
/// remaining character, producing a dotted path into the data bundle.
fn derive_source_path(key: &str, token: &str) -> String {
    let lowered = key.to_lowercase();
    let rest = if let Some(after_dot) = key
        .split_once('.')
        .filter(|(root, _)| root.to_lowercase() == token)
        .map(|(_, rest)| rest)
    {
        after_dot
    } else if lowered.starts_with(token) {
        &key[token.len()..]
    } else {
        key
    };
    if rest.is_empty() {
        lower_first(key)
    } else {
        lower_first(rest)
    }
}

fn lower_first(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_lowercase().collect::<String>() + chars.as_str(),
        None => String::new(),
    }
}

/// Turns a camelCase/snake_case key into space-separated, title-cased words
/// for user-facing validation messages.
fn label_for_key(key: &str) -> String {
    let mut words: Vec<String> = Vec::new();
    let mut current = String::new();
    for ch in key.chars() {
        if ch == '_' || ch == '.' || ch == '-' || ch == ' ' {
            if !current.is_empty() {
                words.push(std::mem::take(&mut current));
            }
        } else if ch.is_uppercase() && !current.is_empty() {
            words.push(std::mem::take(&mut current));
            current.push(ch);
        } else {
            current.push(ch);
        }
    }
    if !current.is_empty() {
        words.push(current);
    }
    words
        .iter()
        .map(|w| {
            let mut chars = w.chars();
            match chars.next() {
                Some(first) => {
                    first.to_uppercase().collect::<String>() + &chars.as_str().to_lowercase()
                }
                None => String::new(),
            }
        })
        .collect::<Vec<_>>()
        .join(" ")
}

/// Block flavor for paired extraction.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum BlockKind {
    Conditional,
    List,
}

impl BlockKind {
    fn opener_regex(self) -> &'static Regex {
        static IF_RE: OnceLock<Regex> = OnceLock::new();
        static LIST_RE: OnceLock<Regex> = OnceLock::new();
        match self {
            BlockKind::Conditional => IF_RE
                .get_or_init(|| Regex::new(r"\{\{if:([^{}]+)\}\}").expect("if opener regex")),
            BlockKind::List => LIST_RE
                .get_or_init(|| Regex::new(r"\{\{list:([^{}]+)\}\}").expect("list opener regex")),
        }
    }

    fn terminator(self) -> &'static str {
        match self {
            BlockKind::Conditional => "{{endif}}",
            BlockKind::List => "{{endlist}}",
        }
    }
}

/// One paired block span, all offsets in bytes into the original text.
#[derive(Debug, Clone)]
pub(crate) struct BlockSpan {
    pub key: String,
    /// Start of the opener tag.
    pub start: usize,
    /// First byte after the opener tag (start of inner content).
    pub content_start: usize,
    /// Start of the terminator tag (end of inner content).
    pub content_end: usize,
    /// First byte after the terminator tag.
    pub end: usize,
}

/// Pairs the Nth opener with the Nth terminator, in document order. Pairs
/// whose terminator precedes the opener are dropped; nesting is unsupported
/// and such input produces whatever the positional pairing yields.
pub(crate) fn paired_blocks(text: &str, kind: BlockKind) -> Vec<BlockSpan> {
    let openers: Vec<_> = kind
        .opener_regex()
        .captures_iter(text)
        .filter_map(|caps| {
            let whole = caps.get(0)?;
            let key = caps.get(1)?.as_str().trim().to_string();
            Some((whole.start(), whole.end(), key))
        })
        .collect();
    let terminators: Vec<_> = text.match_indices(kind.terminator()).collect();

    openers
        .into_iter()
        .zip(terminators)
        .filter_map(|((start, content_start, key), (term_start, term))| {
            if term_start < content_start {
                return None;
            }
            Some(BlockSpan {
                key,
                start,
                content_start,
                content_end: term_start,
                end: term_start + term.len(),
            })
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_simple_and_typed_placeholders() {
        let text = "Dear {{clientName}}, your fee is {{currency:annualFee:GBP}}.";
        let placeholders = extract_placeholders(text);
        assert_eq!(placeholders.len(), 2);

        assert_eq!(placeholders[0].key, "clientName");
        assert_eq!(placeholders[0].placeholder_type, PlaceholderType::Text);
        assert_eq!(placeholders[0].source, Some(PlaceholderSource::Client));
        assert_eq!(placeholders[0].source_path.as_deref(), Some("name"));

        assert_eq!(placeholders[1].key, "annualFee");
        assert_eq!(placeholders[1].placeholder_type, PlaceholderType::Currency);
        assert_eq!(placeholders[1].format.as_deref(), Some("GBP"));
    }

    #[test]
    fn dedupes_keys_first_occurrence_wins() {
        let text = "{{date:start:DD/MM/YYYY}} and again {{start}}";
        let placeholders = extract_placeholders(text);
        assert_eq!(placeholders.len(), 1);
        assert_eq!(placeholders[0].placeholder_type, PlaceholderType::Date);
        assert_eq!(placeholders[0].format.as_deref(), Some("DD/MM/YYYY"));
    }

    #[test]
    fn typed_span_format_may_contain_spaces() {
        let placeholders = extract_placeholders("{{date:nextAccountsDue:DD MMMM YYYY}}");
        assert_eq!(placeholders.len(), 1);
        assert_eq!(placeholders[0].key, "nextAccountsDue");
        assert_eq!(placeholders[0].placeholder_type, PlaceholderType::Date);
        assert_eq!(placeholders[0].format.as_deref(), Some("DD MMMM YYYY"));
    }

    #[test]
    fn reparsing_is_idempotent() {
        let text = "{{a}} {{if:cond}}x{{endif}} {{a}} {{b}}";
        let first = extract_placeholders(text);
        let second = extract_placeholders(text);
        let keys: Vec<_> = first.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(keys, vec!["a", "cond", "b"]);
        assert_eq!(first.len(), second.len());
    }

    #[test]
    fn block_tags_classify_as_conditional_and_list() {
        let text = "{{if:isCompany}}Yes{{endif}} {{list:directors}}{{item}}{{endlist}}";
        let placeholders = extract_placeholders(text);
        let cond = placeholders.iter().find(|p| p.key == "isCompany").unwrap();
        assert_eq!(cond.placeholder_type, PlaceholderType::Conditional);
        let list = placeholders.iter().find(|p| p.key == "directors").unwrap();
        assert_eq!(list.placeholder_type, PlaceholderType::List);
        // the inner {{item}} token is still collected as a simple placeholder
        assert!(placeholders.iter().any(|p| p.key == "item"));
    }

    #[test]
    fn type_inference_heuristics() {
        assert_eq!(infer_type("signedDate"), PlaceholderType::Date);
        assert_eq!(infer_type("createdAt"), PlaceholderType::Date);
        assert_eq!(infer_type("annualFee"), PlaceholderType::Currency);
        assert_eq!(infer_type("paymentTotal"), PlaceholderType::Currency);
        assert_eq!(infer_type("employeeCount"), PlaceholderType::Number);
        assert_eq!(infer_type("contactEmail"), PlaceholderType::Email);
        assert_eq!(infer_type("mobile"), PlaceholderType::Phone);
        assert_eq!(infer_type("registeredAddress"), PlaceholderType::Address);
        assert_eq!(infer_type("directors"), PlaceholderType::List);
        assert_eq!(infer_type("greeting"), PlaceholderType::Text);
    }

    #[test]
    fn source_inference_with_dot_paths() {
        let (source, path) = infer_source("client.companyName");
        assert_eq!(source, PlaceholderSource::Client);
        assert_eq!(path, "companyName");

        let (source, path) = infer_source("currentDate");
        assert_eq!(source, PlaceholderSource::System);
        assert_eq!(path, "date");

        let (source, path) = infer_source("salutation");
        assert_eq!(source, PlaceholderSource::Manual);
        assert_eq!(path, "salutation");

        let (source, path) = infer_source("practiceName");
        assert_eq!(source, PlaceholderSource::Practice);
        assert_eq!(path, "name");
    }

    #[test]
    fn handlebars_spans_extract_referenced_keys() {
        let text = "Dear {{clientName}}, {{#if isCompany}}Company{{else}}Individual{{/if}} \
                    {{#each services}}{{this}}{{/each}} {{currency annualFee}} \
                    {{#if (eq status \"Active\")}}live{{/if}}";
        let placeholders = extract_placeholders(text);
        let keys: Vec<_> = placeholders.iter().map(|p| p.key.as_str()).collect();
        assert_eq!(
            keys,
            vec!["clientName", "isCompany", "services", "annualFee", "status"]
        );

        let cond = placeholders.iter().find(|p| p.key == "isCompany").unwrap();
        assert_eq!(cond.placeholder_type, PlaceholderType::Conditional);
        let each = placeholders.iter().find(|p| p.key == "services").unwrap();
        assert_eq!(each.placeholder_type, PlaceholderType::List);
        // subexpression argument falls back to inference
        let status = placeholders.iter().find(|p| p.key == "status").unwrap();
        assert_eq!(status.placeholder_type, PlaceholderType::Text);
    }

    #[test]
    fn labels_split_camel_and_snake_case() {
        let placeholders = extract_placeholders("{{companyName}} {{company_number}}");
        assert_eq!(placeholders[0].label, "Company Name");
        assert_eq!(placeholders[1].label, "Company Number");
    }

    #[test]
    fn pairs_blocks_positionally() {
        let text = "a {{if:x}}one{{endif}} b {{if:y}}two{{endif}} c";
        let blocks = paired_blocks(text, BlockKind::Conditional);
        assert_eq!(blocks.len(), 2);
        assert_eq!(blocks[0].key, "x");
        assert_eq!(&text[blocks[0].content_start..blocks[0].content_end], "one");
        assert_eq!(blocks[1].key, "y");
        assert_eq!(&text[blocks[1].content_start..blocks[1].content_end], "two");
    }

    #[test]
    fn unterminated_block_is_dropped() {
        let text = "a {{if:x}}one b";
        assert!(paired_blocks(text, BlockKind::Conditional).is_empty());
    }

    #[test]
    fn missing_file_surfaces_not_found() {
        let err = extract_placeholders_from_file(Path::new("/nonexistent/template.txt"))
            .unwrap_err();
        assert_eq!(err.code(), "TEMPLATE_FILE_NOT_FOUND");
    }
}
