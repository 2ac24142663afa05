//! Indentation threading helpers.

use lazy_static::lazy_static;
use regex::Regex;

/// Name of the generated parameter carrying the caller's indentation.
pub const INDENT_PARAM: &str = "$sp";

lazy_static! {
    /// Nested callable literal in generated code, capturing its parameter list.
    static ref CALLABLE_LITERAL_RE: Regex = Regex::new(r"\bfunction\s*\((.*?)\)\s*\{").unwrap();
}

/// Same callable with the indentation parameter captured from the enclosing scope.
const CAPTURING_CALLABLE: &str = "function(${1})use($$sp){";

/// Leads generated code that starts a line and indents its own output. That
/// line gets no `$sp` prefix from [`thread_indent`].
pub const SELF_INDENTED_MARK: &str = "!!\u{7}SeLfInDeNt\u{7}!!";

/// Prefixes the start of every line with `prefix`.
///
/// A trailing newline does not open a new line, so `"a\nb\n"` gets two
/// prefixes. Empty input still gets one.
pub fn prefix_lines(text: &str, prefix: &str) -> String {
    if prefix.is_empty() {
        return text.to_string();
    }
    if text.is_empty() {
        return prefix.to_string();
    }
    let mut out = String::with_capacity(text.len() + prefix.len());
    for line in text.split_inclusive('\n') {
        out.push_str(prefix);
        out.push_str(line);
    }
    out
}

/// Rewrites a compiled body so every output line starts with the runtime
/// indentation parameter and nested callables capture it. Lines led by
/// [`SELF_INDENTED_MARK`] are left unprefixed.
pub fn thread_indent(code: &str, separator: &str) -> String {
    let marker = format!("'{sep}{param}{sep}'", sep = separator, param = INDENT_PARAM);
    let prefixed = prefix_lines(code, &marker)
        .replace(&format!("{}{}", marker, SELF_INDENTED_MARK), "")
        .replace(SELF_INDENTED_MARK, "");
    CALLABLE_LITERAL_RE
        .replace_all(&prefixed, CAPTURING_CALLABLE)
        .into_owned()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_prefix_lines_skips_trailing_newline() {
        assert_eq!(prefix_lines("a\nb\n", "  "), "  a\n  b\n");
        assert_eq!(prefix_lines("a\nb", "  "), "  a\n  b");
    }

    #[test]
    fn test_prefix_lines_edge_cases() {
        assert_eq!(prefix_lines("", ">"), ">");
        assert_eq!(prefix_lines("x\ny", ""), "x\ny");
        assert_eq!(prefix_lines("\n", "-"), "-\n");
    }

    #[test]
    fn test_thread_indent_prefixes_lines() {
        let out = thread_indent("one\ntwo", ".");
        assert_eq!(out, "'.$sp.'one\n'.$sp.'two");
    }

    #[test]
    fn test_thread_indent_captures_in_nested_callables() {
        let out = thread_indent("x'.LR::wi($cx, function($cx, $in) {return 'y';}).'", ".");
        assert!(out.contains("function($cx, $in)use($sp){return 'y';}"));
    }

    #[test]
    fn test_thread_indent_skips_self_indented_lines() {
        let code = format!(
            "o\n{mark}'.call($sp.'  ').'{mark}'.call($sp.'').'",
            mark = SELF_INDENTED_MARK
        );
        assert_eq!(
            thread_indent(&code, "."),
            "'.$sp.'o\n'.call($sp.'  ').''.call($sp.'').'"
        );
    }
}
