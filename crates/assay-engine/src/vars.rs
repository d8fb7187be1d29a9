//! Context variable substitution for request bodies, URLs, and headers.
//!
//! Two spellings are honored: `{{name}}` and the property-expansion form
//! `${#TestCase#name}`. A reference with no value in the context is left
//! in the text verbatim, so a typo stays visible in the outgoing request
//! instead of silently becoming an empty string.

use std::collections::HashMap;
use std::sync::OnceLock;

use regex::Regex;

static MUSTACHE_REGEX: OnceLock<Regex> = OnceLock::new();
static PROPERTY_REGEX: OnceLock<Regex> = OnceLock::new();

fn get_mustache_regex() -> &'static Regex {
    MUSTACHE_REGEX.get_or_init(|| Regex::new(r"\{\{\s*([\w.-]+)\s*\}\}").unwrap())
}

fn get_property_regex() -> &'static Regex {
    PROPERTY_REGEX.get_or_init(|| Regex::new(r"\$\{#TestCase#([^}]+)\}").unwrap())
}

/// Substitute every resolvable variable reference in `text`. Single pass
/// per spelling; substituted values are not themselves re-expanded.
pub fn substitute(text: &str, context: &HashMap<String, String>) -> String {
    let pass = get_mustache_regex().replace_all(text, |caps: &regex::Captures| {
        match context.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        }
    });
    get_property_regex()
        .replace_all(&pass, |caps: &regex::Captures| match context.get(&caps[1]) {
            Some(value) => value.clone(),
            None => caps[0].to_string(),
        })
        .to_string()
}

/// Whether the text references any variable, resolvable or not.
pub fn has_variables(text: &str) -> bool {
    get_mustache_regex().is_match(text) || get_property_regex().is_match(text)
}
