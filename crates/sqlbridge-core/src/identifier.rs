//! Identifier normalization for column and dataset names

use regex::Regex;
use std::sync::OnceLock;

fn non_identifier_chars() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[^a-z0-9_]+").expect("static regex"))
}

/// Normalize a column label into an identifier
///
/// The label is lowercased, every run of characters outside `[a-z0-9_]`
/// becomes a single `_`, and leading/trailing underscores are trimmed.
/// Identifiers starting with a digit are prefixed with `c`. An empty
/// result falls back to `column`.
pub fn to_identifier(label: &str) -> String {
    let lowered = label.trim().to_lowercase();
    let replaced = non_identifier_chars().replace_all(&lowered, "_");
    let trimmed = replaced.trim_matches('_');

    if trimmed.is_empty() {
        return "column".to_string();
    }

    if trimmed.starts_with(|c: char| c.is_ascii_digit()) {
        format!("c{}", trimmed)
    } else {
        trimmed.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn plain_names_are_lowercased() {
        assert_eq!(to_identifier("CUSTOMER_ID"), "customer_id");
        assert_eq!(to_identifier("amount"), "amount");
    }

    #[test]
    fn punctuation_and_spaces_collapse() {
        assert_eq!(to_identifier("Order Date"), "order_date");
        assert_eq!(to_identifier("  total (USD) "), "total_usd");
        assert_eq!(to_identifier("a--b..c"), "a_b_c");
    }

    #[test]
    fn leading_digit_gets_prefix() {
        assert_eq!(to_identifier("2020 revenue"), "c2020_revenue");
    }

    #[test]
    fn empty_label_falls_back() {
        assert_eq!(to_identifier(""), "column");
        assert_eq!(to_identifier("?!"), "column");
    }
}
