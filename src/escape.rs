/// Makes resolved template text safe to embed inside a generated string
/// literal. Backslashes are doubled; quoting of `'` is left to the code
/// generator, which sees the literal boundaries.
pub fn escape_template(template: &str) -> String {
    template.replace('\\', "\\\\")
}

/// Escapes a literal run for a single-quoted generated string.
pub fn quote_literal(text: &str) -> String {
    text.replace('\'', "\\'")
}
