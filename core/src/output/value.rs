use std::num::ParseFloatError;
use std::sync::OnceLock;

use regex::Regex;

/// Condition script output (digits only) that means "fire".
pub const TRUE_INDICATOR: &str = "1";

fn non_digits_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new("[^0-9]+").expect("digit pattern is a valid regex"))
}

/// Parse a sampled value as a float.
///
/// Accepts both `.` and `,` as the decimal separator and, for multi-line
/// output, only looks at the last line.
pub fn parse_value(input: &str) -> Result<f64, ParseFloatError> {
    let clean = input.trim().replace(',', ".");
    let last = match clean.rfind('\n') {
        Some(idx) => &clean[idx + 1..],
        None => clean.as_str(),
    };
    last.trim().parse()
}

/// Remove every character that is not an ASCII digit.
pub fn strip_non_digits(output: &str) -> String {
    non_digits_regex().replace_all(output, "").into_owned()
}

/// Whether a condition script's output counts as true.
pub fn is_truthy(output: &str) -> bool {
    strip_non_digits(output) == TRUE_INDICATOR
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_regular_number() {
        assert_eq!(parse_value("123").unwrap(), 123.0);
    }

    #[test]
    fn parses_decimal_point() {
        assert_eq!(parse_value("123.456").unwrap(), 123.456);
    }

    #[test]
    fn parses_decimal_comma() {
        assert_eq!(parse_value("123,456").unwrap(), 123.456);
    }

    #[test]
    fn parses_number_surrounded_by_whitespace() {
        assert_eq!(parse_value("         \t 123 \t \n    ").unwrap(), 123.0);
    }

    #[test]
    fn parses_last_line_only() {
        assert_eq!(parse_value("123\n456").unwrap(), 456.0);
        assert_eq!(parse_value("header\r\n 7,5\r\n").unwrap(), 7.5);
    }

    #[test]
    fn rejects_non_numeric_input() {
        assert!(parse_value("n/a").is_err());
        assert!(parse_value("").is_err());
    }

    #[test]
    fn truthy_only_for_single_one() {
        assert!(is_truthy("1"));
        assert!(is_truthy("1\n"));
        assert!(is_truthy("result: 1 (ok)"));
        assert!(!is_truthy("0"));
        assert!(!is_truthy("11"));
        assert!(!is_truthy("true"));
        assert!(!is_truthy(""));
    }

    #[test]
    fn digit_stripping_is_idempotent() {
        let inputs = [
            "1",
            "",
            "abc",
            " 1 \n",
            "v=1.0",
            "exit 1; code 0",
            "\x1b[31m1\x1b[0m",
            "１",
        ];
        for input in inputs {
            let once = strip_non_digits(input);
            let twice = strip_non_digits(&once);
            assert_eq!(once, twice, "input: {input:?}");
            assert_eq!(is_truthy(input), is_truthy(&once), "input: {input:?}");
        }
    }
}
