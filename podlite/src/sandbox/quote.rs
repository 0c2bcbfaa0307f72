//! Quoting of argument arrays for unit-file `ExecStart=`/`ExecStop=` lines.
//!
//! Each argument becomes a double-quoted string literal with non-printable
//! characters, `"` and `\` escaped. On top of that `'` becomes `\'`, and in
//! every argument but the first `$` becomes `$$` so systemd does not expand
//! it. The binary path (argv[0]) is never subject to expansion.

use crate::error::{PodliteError, PodliteResult};
use std::fmt::Write;

/// Whether `c` is written literally. Controls, non-ASCII spaces, line and
/// paragraph separators, format characters, private use and noncharacters
/// are escaped.
fn is_printable(c: char) -> bool {
    let code = c as u32;
    if c.is_control() {
        return false;
    }
    if (code & 0xfffe) == 0xfffe || (0xfdd0..=0xfdef).contains(&code) {
        return false;
    }
    !matches!(
        code,
        0x00a0
            | 0x00ad
            | 0x0600..=0x0605
            | 0x061c
            | 0x06dd
            | 0x070f
            | 0x0890..=0x0891
            | 0x08e2
            | 0x1680
            | 0x180e
            | 0x2000..=0x200f
            | 0x2028..=0x202f
            | 0x205f..=0x2064
            | 0x2066..=0x206f
            | 0x3000
            | 0xe000..=0xf8ff
            | 0xfeff
            | 0xfff9..=0xfffb
            | 0x110bd
            | 0x110cd
            | 0x13430..=0x1343f
            | 0x1bca0..=0x1bca3
            | 0x1d173..=0x1d17a
            | 0xe0001
            | 0xe0020..=0xe007f
            | 0xf0000..=0x10ffff
    )
}

/// Double-quoted string literal of `s` with non-printable characters escaped.
fn quote_literal(s: &str) -> String {
    let mut out = String::with_capacity(s.len() + 2);
    out.push('"');
    for c in s.chars() {
        match c {
            '"' => out.push_str("\\\""),
            '\\' => out.push_str("\\\\"),
            '\x07' => out.push_str("\\a"),
            '\x08' => out.push_str("\\b"),
            '\x0c' => out.push_str("\\f"),
            '\n' => out.push_str("\\n"),
            '\r' => out.push_str("\\r"),
            '\t' => out.push_str("\\t"),
            '\x0b' => out.push_str("\\v"),
            c if (c as u32) < 0x20 || c == '\x7f' => {
                let _ = write!(out, "\\x{:02x}", c as u32);
            }
            c if !is_printable(c) => {
                let code = c as u32;
                if code > 0xffff {
                    let _ = write!(out, "\\U{code:08x}");
                } else {
                    let _ = write!(out, "\\u{code:04x}");
                }
            }
            c => out.push(c),
        }
    }
    out.push('"');
    out
}

/// Quote the `index`-th argument of a command line.
pub fn exec_escape(index: usize, arg: &str) -> String {
    let quoted = quote_literal(arg);
    let mut out = String::with_capacity(quoted.len());
    for c in quoted.chars() {
        match c {
            '\'' => out.push_str("\\'"),
            '$' if index > 0 => out.push_str("$$"),
            c => out.push(c),
        }
    }
    out
}

/// Quote a whole argument array, space separated.
///
/// An empty array is a caller bug and reported as [`PodliteError::InvariantViolated`].
pub fn quote_exec(exec: &[String]) -> PodliteResult<String> {
    if exec.is_empty() {
        return Err(PodliteError::InvariantViolated(
            "cannot quote an empty exec array".into(),
        ));
    }

    Ok(exec
        .iter()
        .enumerate()
        .map(|(i, arg)| exec_escape(i, arg))
        .collect::<Vec<_>>()
        .join(" "))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn args(v: &[&str]) -> Vec<String> {
        v.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_quote_single_quote_and_dollar() {
        assert_eq!(
            quote_exec(&args(&["/bin/echo", "it's $HOME"])).unwrap(),
            r#""/bin/echo" "it\'s $$HOME""#
        );
    }

    #[test]
    fn test_first_argument_keeps_dollar() {
        assert_eq!(exec_escape(0, "/opt/$bin"), r#""/opt/$bin""#);
        assert_eq!(exec_escape(1, "/opt/$bin"), r#""/opt/$$bin""#);
    }

    #[test]
    fn test_control_characters() {
        assert_eq!(
            exec_escape(1, "a\"b\\c\nd\te\x01\x7f"),
            r#""a\"b\\c\nd\te\x01\x7f""#
        );
        assert_eq!(exec_escape(1, "\u{85}"), r#""\u0085""#);
        assert_eq!(exec_escape(1, "héllo"), "\"héllo\"");
    }

    #[test]
    fn test_invisible_code_points() {
        assert_eq!(exec_escape(1, "a\u{a0}b"), r#""a\u00a0b""#);
        assert_eq!(exec_escape(1, "\u{200b}"), r#""\u200b""#);
        assert_eq!(exec_escape(1, "\u{feff}x"), r#""\ufeffx""#);
        assert_eq!(exec_escape(1, "\u{e0001}"), r#""\U000e0001""#);
        // Printable non-ASCII stays literal
        assert_eq!(exec_escape(1, "日本 ü"), "\"日本 ü\"");
    }

    #[test]
    fn test_empty_exec_is_invariant_violation() {
        let err = quote_exec(&[]).unwrap_err();
        assert!(matches!(err, PodliteError::InvariantViolated(_)));
    }
}
