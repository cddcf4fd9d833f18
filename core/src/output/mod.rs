//! Pure text helpers for cleaning and interpreting script output.
//!
//! No I/O and no async: everything here is a plain function over strings
//! so it can be tested exhaustively.

pub mod clean;
pub mod value;

pub use clean::{clean_line, cleanup_output, strip_ansi};
pub use value::{is_truthy, parse_value, strip_non_digits, TRUE_INDICATOR};
