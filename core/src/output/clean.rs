use std::sync::OnceLock;

use regex::Regex;

/// Escape sequences and control characters removed from script output.
///
/// Alternation order matters (leftmost-first): CSI, then OSC terminated by
/// BEL or ST, then DCS/SOS/PM/APC strings, then any other two-or-more byte
/// escape, then bare C0 controls other than `\t`, `\n` and `\r`.
const ANSI_PATTERN: &str = concat!(
    r"\x1b\[[0-?]*[ -/]*[@-~]",
    r"|\x1b\][^\x07\x1b]*(?:\x07|\x1b\\)",
    r"|\x1b[PX^_][^\x1b]*\x1b\\",
    r"|\x1b[ -/]*[0-~]",
    r"|[\x00-\x08\x0b\x0c\x0e-\x1f\x7f]",
);

fn ansi_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(ANSI_PATTERN).expect("ANSI pattern is a valid regex"))
}

/// Remove ANSI escape sequences and stray control characters from `text`.
///
/// Newlines, tabs and carriage returns are kept; [`cleanup_output`] deals
/// with carriage returns separately.
pub fn strip_ansi(text: &str) -> String {
    ansi_regex().replace_all(text, "").into_owned()
}

/// Trim whitespace and drop everything up to and including the first
/// carriage return that survives the trim.
///
/// Terminals redraw prompts with `\r`, so only the text after it is what
/// the user would actually see.
pub fn cleanup_output(output: &str) -> String {
    let trimmed = output.trim();
    match trimmed.find('\r') {
        Some(idx) => trimmed[idx + 1..].to_string(),
        None => trimmed.to_string(),
    }
}

/// Clean a single line of interactive session output.
pub fn clean_line(line: &str) -> String {
    cleanup_output(&strip_ansi(line))
}
