//! Locale-tolerant decimal parsing for scraped and feed prices.

use rust_decimal::Decimal;
use std::str::FromStr;

const CURRENCY_MARKERS: [&str; 6] = ["TRY", "TL", "₺", "$", "€", "£"];

/// Parses a price written with either `,` or `.` as the decimal separator.
///
/// When both separators appear, the last one is the decimal separator and the
/// other is a thousands separator. A separator repeated more than once is a
/// thousands separator. A single lone separator is the decimal separator.
/// Currency markers and whitespace are ignored.
pub fn parse_localized_decimal(raw: &str) -> Option<Decimal> {
    let text = strip_markers(raw);
    if text.is_empty() {
        return None;
    }

    let last_comma = text.rfind(',');
    let last_dot = text.rfind('.');
    let decimal_separator = match (last_comma, last_dot) {
        (Some(c), Some(d)) => Some(if c > d { ',' } else { '.' }),
        (Some(_), None) => lone_separator(&text, ','),
        (None, Some(_)) => lone_separator(&text, '.'),
        (None, None) => None,
    };

    let normalized: String = match decimal_separator {
        Some(sep) => text
            .chars()
            .filter(|c| *c == sep || (*c != ',' && *c != '.'))
            .map(|c| if c == sep { '.' } else { c })
            .collect(),
        None => text.chars().filter(|c| *c != ',' && *c != '.').collect(),
    };

    Decimal::from_str(&normalized).ok()
}

/// Parses a price in Turkish notation: `.` groups thousands, `,` marks the
/// decimal part. `1.500 TL` is fifteen hundred, never one and a half.
pub fn parse_turkish_decimal(raw: &str) -> Option<Decimal> {
    let text = strip_markers(raw);
    if text.is_empty() {
        return None;
    }
    let normalized: String = text
        .chars()
        .filter(|c| *c != '.')
        .map(|c| if c == ',' { '.' } else { c })
        .collect();
    Decimal::from_str(&normalized).ok()
}

/// Decimal from a JSON number or numeric string.
pub fn json_decimal(value: &serde_json::Value) -> Option<Decimal> {
    match value {
        serde_json::Value::Number(n) => Decimal::from_str(&n.to_string())
            .or_else(|_| Decimal::from_scientific(&n.to_string()))
            .ok(),
        serde_json::Value::String(s) => parse_localized_decimal(s),
        _ => None,
    }
}

fn strip_markers(raw: &str) -> String {
    let mut text = raw.to_string();
    for marker in CURRENCY_MARKERS {
        text = text.replace(marker, "");
    }
    text.chars().filter(|c| !c.is_whitespace()).collect()
}

fn lone_separator(text: &str, separator: char) -> Option<char> {
    if text.matches(separator).count() == 1 {
        Some(separator)
    } else {
        None
    }
}

/// True when the text reads like a price: a currency marker, or digits grouped
/// with a decimal comma.
pub fn looks_like_price(text: &str) -> bool {
    let text = text.trim();
    if text.contains("TL") || text.contains('₺') {
        return true;
    }
    text.contains(',')
        && text.chars().any(|c| c.is_ascii_digit())
        && text.chars().all(|c| c.is_ascii_digit() || c == ',' || c == '.')
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dec(s: &str) -> Decimal {
        Decimal::from_str(s).unwrap()
    }

    #[test]
    fn test_separator_style_does_not_change_value() {
        let cases = [
            ("1.234.567,891", "1,234,567.891", "1234567.891"),
            ("12,345678", "12.345678", "12.345678"),
            ("1.234,5", "1,234.5", "1234.5"),
            ("0,05", "0.05", "0.05"),
            ("1.000.000", "1,000,000", "1000000"),
            ("42", "42", "42"),
        ];
        for (comma_style, dot_style, expected) in cases {
            assert_eq!(parse_localized_decimal(comma_style), Some(dec(expected)), "{comma_style}");
            assert_eq!(parse_localized_decimal(dot_style), Some(dec(expected)), "{dot_style}");
        }
    }

    #[test]
    fn test_currency_markers_and_whitespace_are_stripped() {
        assert_eq!(parse_localized_decimal("1.234,56 TL"), Some(dec("1234.56")));
        assert_eq!(parse_localized_decimal("₺ 3,141592"), Some(dec("3.141592")));
        assert_eq!(parse_localized_decimal(" 34.1234 TRY "), Some(dec("34.1234")));
    }

    #[test]
    fn test_unparsable_text_is_rejected() {
        assert_eq!(parse_localized_decimal(""), None);
        assert_eq!(parse_localized_decimal("TL"), None);
        assert_eq!(parse_localized_decimal("n/a"), None);
        assert_eq!(parse_localized_decimal("1,2,3,4x"), None);
    }

    #[test]
    fn test_turkish_notation_treats_dot_as_grouping() {
        assert_eq!(parse_turkish_decimal("1.500 TL"), Some(dec("1500")));
        assert_eq!(parse_turkish_decimal("1.234,56"), Some(dec("1234.56")));
        assert_eq!(parse_turkish_decimal("12,345678"), Some(dec("12.345678")));
        assert_eq!(parse_turkish_decimal("₺ 1.000.000"), Some(dec("1000000")));
        assert_eq!(parse_turkish_decimal("TL"), None);
        assert_eq!(parse_turkish_decimal("1,2,3"), None);
    }

    #[test]
    fn test_json_decimal_accepts_numbers_and_strings() {
        assert_eq!(json_decimal(&serde_json::json!(310.25)), Some(dec("310.25")));
        assert_eq!(json_decimal(&serde_json::json!("310,25")), Some(dec("310.25")));
        assert_eq!(json_decimal(&serde_json::json!(42)), Some(dec("42")));
        assert_eq!(json_decimal(&serde_json::json!(null)), None);
        assert_eq!(json_decimal(&serde_json::json!([1])), None);
    }

    #[test]
    fn test_looks_like_price() {
        assert!(looks_like_price("12,345678 TL"));
        assert!(looks_like_price("1.234,56"));
        assert!(!looks_like_price("Fiyat"));
        assert!(!looks_like_price("2024"));
        assert!(!looks_like_price(","));
    }
}
