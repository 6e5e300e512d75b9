//! Normalization of declared types and default expressions.
//!
//! Databases report types and defaults in their own spelling
//! (`'x'::character varying`, `(0)`, `CURRENT_TIMESTAMP`). Both sides of
//! a comparison go through these functions first.

use std::sync::OnceLock;

use regex::Regex;

use crate::error::{Result, SchemaError};

fn sized_type_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^([a-z][a-z0-9_ ]*?)\s*\(\s*(\d+)\s*\)$").expect("Invalid sized type regex")
    })
}

/// Base names whose single numeric argument is stored as `varchar_len`.
const LENGTH_TYPES: &[&str] = &[
    "varchar",
    "character varying",
    "nvarchar",
    "char",
    "character",
    "nchar",
];

/// Splits a declared type into a lowercase base name and a `VARCHAR`
/// length (0 when absent).
///
/// Only character types carry a length. Other parameterised types such
/// as `numeric(10,2)` are returned whole.
///
/// # Errors
///
/// Returns [`SchemaError::InvalidType`] for an empty type or an
/// unbalanced or non-numeric length on a character type.
pub fn parse_sql_type(declared: &str) -> Result<(String, u32)> {
    let lowered = declared.trim().to_lowercase();
    if lowered.is_empty() {
        return Err(SchemaError::InvalidType(declared.to_string()));
    }
    if lowered.matches('(').count() != lowered.matches(')').count() {
        return Err(SchemaError::InvalidType(declared.to_string()));
    }

    if let Some(caps) = sized_type_regex().captures(&lowered) {
        let base = caps[1].trim().to_string();
        if LENGTH_TYPES.contains(&base.as_str()) {
            let len = caps[2]
                .parse::<u32>()
                .map_err(|_| SchemaError::InvalidType(declared.to_string()))?;
            return Ok((base, len));
        }
        return Ok((compact_params(&lowered), 0));
    }

    let base = lowered.split('(').next().unwrap_or_default().trim();
    if lowered.contains('(') && LENGTH_TYPES.contains(&base) {
        return Err(SchemaError::InvalidType(declared.to_string()));
    }
    Ok((compact_params(&lowered), 0))
}

/// Drops whitespace around and inside a parameter list:
/// `numeric (10, 2)` becomes `numeric(10,2)`.
fn compact_params(lowered: &str) -> String {
    match lowered.find('(') {
        Some(open) => {
            let params: String = lowered[open..]
                .chars()
                .filter(|c| !c.is_whitespace())
                .collect();
            format!("{}{params}", lowered[..open].trim_end())
        }
        None => lowered.to_string(),
    }
}

/// Normalizes a default expression for comparison.
///
/// Trims whitespace, unwraps enclosing parentheses, strips `::type`
/// casts outside string literals and lowercases everything except string
/// literals. `NULL` normalizes to the empty string.
#[must_use]
pub fn default_value(expr: &str) -> String {
    let mut current = expr.trim().to_string();
    loop {
        let next = strip_cast(unwrap_parens(&current)).trim().to_string();
        if next == current {
            break;
        }
        current = next;
    }
    if current.eq_ignore_ascii_case("null") {
        return String::new();
    }
    lowercase_outside_quotes(&current)
}

fn unwrap_parens(expr: &str) -> &str {
    let mut inner = expr.trim();
    while inner.starts_with('(') && inner.ends_with(')') && closes_at_end(inner) {
        inner = inner[1..inner.len() - 1].trim();
    }
    inner
}

/// Returns true if the opening paren at index 0 is closed by the last char.
fn closes_at_end(expr: &str) -> bool {
    let mut depth = 0usize;
    let mut in_quote = false;
    let last = expr.len() - 1;
    for (i, ch) in expr.char_indices() {
        match ch {
            '\'' => in_quote = !in_quote,
            '(' if !in_quote => depth += 1,
            ')' if !in_quote => {
                depth = depth.saturating_sub(1);
                if depth == 0 {
                    return i == last;
                }
            }
            _ => {}
        }
    }
    false
}

/// Removes a trailing `::type` cast that is not inside a string literal.
fn strip_cast(expr: &str) -> &str {
    let mut in_quote = false;
    let mut depth = 0usize;
    let mut cast_at = None;
    let bytes = expr.as_bytes();
    for (i, &b) in bytes.iter().enumerate() {
        match b {
            b'\'' => in_quote = !in_quote,
            b'(' if !in_quote => depth += 1,
            b')' if !in_quote => depth = depth.saturating_sub(1),
            b':' if !in_quote && depth == 0 && bytes.get(i + 1) == Some(&b':') => {
                cast_at = Some(i);
                break;
            }
            _ => {}
        }
    }
    cast_at.map_or(expr, |i| &expr[..i])
}

fn lowercase_outside_quotes(expr: &str) -> String {
    let mut out = String::with_capacity(expr.len());
    let mut in_quote = false;
    for ch in expr.chars() {
        if ch == '\'' {
            in_quote = !in_quote;
        }
        if in_quote {
            out.push(ch);
        } else {
            out.extend(ch.to_lowercase());
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_varchar() {
        assert_eq!(parse_sql_type("VARCHAR(255)").unwrap(), ("varchar".into(), 255));
        assert_eq!(
            parse_sql_type("character varying(20)").unwrap(),
            ("character varying".into(), 20)
        );
        assert_eq!(parse_sql_type(" text ").unwrap(), ("text".into(), 0));
    }

    #[test]
    fn test_parse_other_parameterised() {
        assert_eq!(parse_sql_type("NUMERIC(10,2)").unwrap(), ("numeric(10,2)".into(), 0));
        assert_eq!(parse_sql_type("timestamp(3)").unwrap(), ("timestamp(3)".into(), 0));
        assert_eq!(
            parse_sql_type("numeric (10, 2)").unwrap(),
            ("numeric(10,2)".into(), 0)
        );
    }

    #[test]
    fn test_parse_invalid() {
        assert!(parse_sql_type("").is_err());
        assert!(parse_sql_type("varchar(abc)").is_err());
        assert!(parse_sql_type("varchar(10").is_err());
    }

    #[test]
    fn test_default_casts_and_parens() {
        assert_eq!(default_value("'abc'::character varying"), "'abc'");
        assert_eq!(default_value("(0)"), "0");
        assert_eq!(default_value("((1))"), "1");
        assert_eq!(default_value("'a::b'"), "'a::b'");
        assert_eq!(default_value("('x'::text)"), "'x'");
    }

    #[test]
    fn test_default_case() {
        assert_eq!(default_value("CURRENT_TIMESTAMP"), "current_timestamp");
        assert_eq!(default_value("'Hello'"), "'Hello'");
        assert_eq!(default_value("NULL"), "");
        assert_eq!(default_value("NULL::character varying"), "");
        assert_eq!(default_value("  "), "");
    }

    #[test]
    fn test_default_keeps_function_parens() {
        assert_eq!(default_value("now()"), "now()");
        assert_eq!(default_value("(now())"), "now()");
        assert_eq!(default_value("(a) + (b)"), "(a) + (b)");
    }
}
