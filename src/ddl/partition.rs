//! Partition expressions.
//!
//! Normalizes partition specs such as `year(ts)` or `bucket(16, id)` so the
//! column argument is always backtick-quoted exactly once.

use std::sync::OnceLock;

use regex::Regex;

fn one_arg() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\w+)\s*\(\s*([^,()]+?)\s*\)\s*$").expect("valid partition pattern")
    })
}

fn two_args() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| {
        Regex::new(r"^\s*(\w+)\s*\(\s*([^,()]+?)\s*,\s*([^,()]+?)\s*\)\s*$")
            .expect("valid partition pattern")
    })
}

/// Strips whitespace and any backtick or double-quote quoting from a column
/// reference.
pub fn column_name(expr: &str) -> &str {
    expr.trim_matches(|c: char| c == '`' || c == '"' || c.is_whitespace())
}

fn quoted(column: &str) -> String {
    format!("`{}`", column_name(column))
}

/// Normalizes one partition expression.
///
/// `fn(col)` and `fn(arg, col)` keep the function name and the literal
/// argument as written; anything else is treated as a bare column.
pub fn normalize(expr: &str) -> String {
    if let Some(caps) = two_args().captures(expr) {
        return format!("{}({}, {})", &caps[1], &caps[2], quoted(&caps[3]));
    }
    if let Some(caps) = one_arg().captures(expr) {
        return format!("{}({})", &caps[1], quoted(&caps[2]));
    }
    quoted(expr)
}

/// Returns true if the expression applies a transform to its column.
pub fn is_transform(expr: &str) -> bool {
    one_arg().is_match(expr) || two_args().is_match(expr)
}
