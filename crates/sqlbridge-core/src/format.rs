//! Date format patterns
//!
//! Schema files store date formats as `yyyy-MM-dd` style patterns. They are
//! converted to chrono `strftime` patterns at render and parse time.

/// Date format attached to every inferred DATE column
pub const DEFAULT_DATE_FORMAT: &str = "yyyy-MM-dd";

/// Format used to render timestamps outside DATE columns
pub const DEFAULT_DATETIME_FORMAT: &str = "yyyy-MM-dd HH:mm:ss";

/// Convert a `yyyy-MM-dd HH:mm:ss` style pattern to a chrono format string
///
/// Supported letters: `y`, `M`, `d`, `H`, `h`, `m`, `s`, `S`, `a`, `E`.
/// Text in single quotes is copied literally (`''` is a single quote).
/// Unknown letters and other characters are copied as they are.
pub fn to_chrono_pattern(pattern: &str) -> String {
    let chars: Vec<char> = pattern.chars().collect();
    let mut out = String::with_capacity(pattern.len() * 2);
    let mut i = 0;

    while i < chars.len() {
        let c = chars[i];

        if c == '\'' {
            i += 1;
            if i < chars.len() && chars[i] == '\'' {
                out.push('\'');
                i += 1;
                continue;
            }
            while i < chars.len() && chars[i] != '\'' {
                push_literal(&mut out, chars[i]);
                i += 1;
            }
            i += 1;
            continue;
        }

        let mut run = 1;
        while i + run < chars.len() && chars[i + run] == c {
            run += 1;
        }

        match (c, run) {
            ('y', 2) => out.push_str("%y"),
            ('y', _) => out.push_str("%Y"),
            ('M', 1) => out.push_str("%-m"),
            ('M', 2) => out.push_str("%m"),
            ('M', 3) => out.push_str("%b"),
            ('M', _) => out.push_str("%B"),
            ('d', 1) => out.push_str("%-d"),
            ('d', _) => out.push_str("%d"),
            ('H', 1) => out.push_str("%-H"),
            ('H', _) => out.push_str("%H"),
            ('h', 1) => out.push_str("%-I"),
            ('h', _) => out.push_str("%I"),
            ('m', _) => out.push_str("%M"),
            ('s', _) => out.push_str("%S"),
            ('S', 1..=3) => out.push_str("%3f"),
            ('S', 4..=6) => out.push_str("%6f"),
            ('S', _) => out.push_str("%9f"),
            ('a', _) => out.push_str("%p"),
            ('E', 1..=3) => out.push_str("%a"),
            ('E', _) => out.push_str("%A"),
            _ => {
                for _ in 0..run {
                    push_literal(&mut out, c);
                }
            }
        }

        i += run;
    }

    out
}

fn push_literal(out: &mut String, c: char) {
    if c == '%' {
        out.push_str("%%");
    } else {
        out.push(c);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, NaiveDateTime};

    #[test]
    fn default_formats() {
        assert_eq!(to_chrono_pattern(DEFAULT_DATE_FORMAT), "%Y-%m-%d");
        assert_eq!(to_chrono_pattern(DEFAULT_DATETIME_FORMAT), "%Y-%m-%d %H:%M:%S");
    }

    #[test]
    fn other_patterns() {
        assert_eq!(to_chrono_pattern("dd/MM/yy"), "%d/%m/%y");
        assert_eq!(to_chrono_pattern("MMM d, yyyy"), "%b %-d, %Y");
        assert_eq!(to_chrono_pattern("HH:mm:ss.SSS"), "%H:%M:%S.%3f");
        assert_eq!(to_chrono_pattern("yyyy'T'HH"), "%YT%H");
        assert_eq!(to_chrono_pattern("100%"), "100%%");
    }

    #[test]
    fn render_and_parse_back() {
        let pattern = to_chrono_pattern(DEFAULT_DATE_FORMAT);
        let date = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
        let rendered = date.format(&pattern).to_string();

        assert_eq!(rendered, "2020-01-01");
        assert_eq!(NaiveDate::parse_from_str(&rendered, &pattern).unwrap(), date);
    }

    #[test]
    fn datetime_roundtrip() {
        let pattern = to_chrono_pattern(DEFAULT_DATETIME_FORMAT);
        let ts = NaiveDate::from_ymd_opt(2021, 6, 30)
            .unwrap()
            .and_hms_opt(13, 5, 9)
            .unwrap();
        let rendered = ts.format(&pattern).to_string();

        assert_eq!(rendered, "2021-06-30 13:05:09");
        assert_eq!(NaiveDateTime::parse_from_str(&rendered, &pattern).unwrap(), ts);
    }
}
