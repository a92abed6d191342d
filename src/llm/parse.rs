//! Deterministic parsing of free-form model output.
//!
//! Models sometimes wrap JSON in markdown fences, sometimes return bare JSON,
//! and sometimes ignore the format entirely. [`parse_model_output`] resolves
//! all three into a tagged result instead of relying on error control flow.

use serde_json::Value;

/// Outcome of parsing a model reply.
#[derive(Debug, Clone, PartialEq)]
pub enum ModelOutput {
    /// The (fence-stripped) text was valid JSON.
    Parsed(Value),
    /// The text was not JSON; carries the fence-stripped text.
    Raw(String),
}

/// Removes a leading ```` ```json ```` or ```` ``` ```` marker and a trailing
/// ```` ``` ```` marker, then trims.
pub fn strip_code_fence(text: &str) -> &str {
    let mut text = text.trim();
    if let Some(rest) = text.strip_prefix("```json") {
        text = rest;
    } else if let Some(rest) = text.strip_prefix("```") {
        text = rest;
    }
    if let Some(rest) = text.strip_suffix("```") {
        text = rest;
    }
    text.trim()
}

pub fn parse_model_output(text: &str) -> ModelOutput {
    let cleaned = strip_code_fence(text);
    match serde_json::from_str::<Value>(cleaned) {
        Ok(value) => ModelOutput::Parsed(value),
        Err(_) => ModelOutput::Raw(cleaned.to_string()),
    }
}

/// Extracts an insight list; `None` unless the output is a JSON array of
/// strings.
pub fn insights_from_output(output: ModelOutput) -> Option<Vec<String>> {
    let ModelOutput::Parsed(Value::Array(items)) = output else {
        return None;
    };
    items
        .into_iter()
        .map(|item| match item {
            Value::String(s) => Some(s),
            _ => None,
        })
        .collect()
}

/// Trims and removes one layer of double quotes, then one of single quotes.
pub fn clean_quote(raw: &str) -> String {
    let mut quote = raw.trim();
    if quote.len() >= 2 && quote.starts_with('"') && quote.ends_with('"') {
        quote = &quote[1..quote.len() - 1];
    }
    if quote.len() >= 2 && quote.starts_with('\'') && quote.ends_with('\'') {
        quote = &quote[1..quote.len() - 1];
    }
    quote.to_string()
}
