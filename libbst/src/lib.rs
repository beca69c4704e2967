//! Shared utilities used by both the server binary and its tests.
//!
//! Kept deliberately small: a result alias, a couple of size constants, and
//! the console's argument tokenizer.

pub mod util;

use std::error::Error;

/// A generic result used for the handful of fallible startup paths (port
/// parsing, socket binding, pre-startup lock checks).
pub type TResult<T> = Result<T, Box<dyn Error + Send + Sync>>;

/// Maximum length, in bytes, of a key or a value.
pub const MAX_FIELD_LEN: usize = 256;
/// Maximum length, in bytes, of a single protocol line (request or response).
pub const MAX_LINE_LEN: usize = 1023;

use std::str::FromStr;

lazy_static::lazy_static! {
    static ref ARG_RE: regex::Regex = regex::Regex::from_str(r#"("[^"]*"|'[^']*'|[\S]+)+"#).unwrap();
}

/// Splits an operator console line into whitespace-delimited tokens, honoring
/// single- or double-quoted runs so a `p "my file.txt"` path can contain
/// spaces.
pub fn split_into_args(line: &str) -> Vec<String> {
    ARG_RE
        .find_iter(line)
        .map(|m| m.as_str().replace('\'', "").replace('"', ""))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn splits_plain_tokens() {
        assert_eq!(split_into_args("p /tmp/out.txt"), vec!["p", "/tmp/out.txt"]);
    }

    #[test]
    fn honors_quoted_paths() {
        assert_eq!(
            split_into_args(r#"p "my file.txt""#),
            vec!["p", "my file.txt"]
        );
    }
}
