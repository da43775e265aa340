//! Text helpers shared by source adapters.

use std::sync::LazyLock;

use regex::Regex;

/// Compiles a regex at static init; panics on invalid pattern.
pub(crate) fn compile_static_regex(pattern: &str) -> Regex {
    Regex::new(pattern).unwrap_or_else(|e| panic!("invalid static regex '{pattern}': {e}"))
}

static WHITESPACE_RE: LazyLock<Regex> = LazyLock::new(|| compile_static_regex(r"\s+"));

// Characters with meaning in arXiv's query grammar.
static QUERY_PUNCT_RE: LazyLock<Regex> =
    LazyLock::new(|| compile_static_regex(r#"["():\[\]{}\\^~*?!+]"#));

/// Collapses runs of whitespace (including newlines) into single spaces.
#[must_use]
pub(crate) fn collapse_whitespace(value: &str) -> String {
    WHITESPACE_RE.replace_all(value.trim(), " ").into_owned()
}

/// Normalizes a title for a phrase search: query punctuation removed,
/// whitespace collapsed, trailing period dropped.
#[must_use]
pub(crate) fn normalize_title(title: &str) -> String {
    let stripped = QUERY_PUNCT_RE.replace_all(title, " ");
    collapse_whitespace(&stripped)
        .trim_end_matches('.')
        .trim_end()
        .to_string()
}

/// Returns `Some(trimmed)` for non-blank text.
#[must_use]
pub(crate) fn non_blank(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|v| !v.is_empty())
        .map(str::to_string)
}
