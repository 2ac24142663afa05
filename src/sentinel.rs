//! Function-keyword masking for local compilation.
//!
//! Generated code uses the `function` keyword for nested callables, and the
//! indentation pass rewrites those literals. Template text that happens to
//! contain the same word is swapped for a private token before compiling
//! and swapped back afterwards, so only generated callables are rewritten.

pub const FUNCTION_KEYWORD: &str = "function";

/// Bell characters cannot appear in a well-formed template, which keeps the
/// token from colliding with user text.
pub const FUNCTION_SENTINEL: &str = "!!\u{7}FuNcTiOn\u{7}!!";

pub fn mask_keyword(template: &str) -> String {
    template.replace(FUNCTION_KEYWORD, FUNCTION_SENTINEL)
}

pub fn unmask_keyword(code: &str) -> String {
    code.replace(FUNCTION_SENTINEL, FUNCTION_KEYWORD)
}
