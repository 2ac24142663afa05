//! Host Template Compiler
//!
//! The partial pipeline calls back into a host compiler for every fragment it
//! compiles. `HandlebarsHost` is a small reference host that understands the
//! partial-related subset of Handlebars:
//!
//! - literal text and `{{name}}` variable output
//! - `{{> name}}` partial references
//! - `{{> (name)}}` partial names looked up at render time
//! - `{{#> name}}…{{/name}}` partial blocks and `{{> @partial-block}}`
//! - `{{#*inline "name"}}…{{/inline}}` inline partial definitions
//!
//! Output is the interior of a single-quoted string literal of the target
//! language; code is spliced in as `'{sep}expr{sep}'`.

use lazy_static::lazy_static;
use regex::Regex;

use crate::context::{CompileContext, FEATURE_DYNAMIC_PARTIAL, FEATURE_INLINE_PARTIAL};
use crate::error::CompileError;
use crate::escape::quote_literal;
use crate::indent::{prefix_lines, INDENT_PARAM, SELF_INDENTED_MARK};
use crate::partial::{compile_dynamic, compile_local, compile_static, read_partial};
use crate::sentinel::unmask_keyword;

/// Turns template text into generated code.
pub trait TemplateCompiler {
    fn compile_template(&self, ctx: &mut CompileContext, source: &str) -> String;
}

pub const PARTIAL_BLOCK_NAME: &str = "@partial-block";

lazy_static! {
    static ref TAG_RE: Regex = Regex::new(r"(?s)\{\{(.*?)\}\}").unwrap();
    static ref INLINE_OPEN_RE: Regex = Regex::new(r#"^#\*inline\s+["']([^"']+)["']$"#).unwrap();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum PartialRef<'a> {
    Named(&'a str),
    Dynamic(&'a str),
    Block,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Tag<'a> {
    Partial(PartialRef<'a>),
    PartialBlock(&'a str),
    Inline(&'a str),
    Close(&'a str),
    Variable(&'a str),
}

fn classify(inner: &str) -> Tag<'_> {
    if let Some(rest) = inner.strip_prefix("#>") {
        return Tag::PartialBlock(first_word(rest));
    }
    if let Some(rest) = inner.strip_prefix('>') {
        let rest = rest.trim();
        if let Some(expr) = rest.strip_prefix('(').and_then(|r| r.strip_suffix(')')) {
            return Tag::Partial(PartialRef::Dynamic(expr.trim()));
        }
        let name = first_word(rest);
        if name == PARTIAL_BLOCK_NAME {
            return Tag::Partial(PartialRef::Block);
        }
        return Tag::Partial(PartialRef::Named(name));
    }
    if let Some(caps) = INLINE_OPEN_RE.captures(inner) {
        if let Some(name) = caps.get(1) {
            return Tag::Inline(name.as_str());
        }
    }
    if let Some(rest) = inner.strip_prefix('/') {
        return Tag::Close(rest.trim());
    }
    Tag::Variable(inner)
}

fn first_word(text: &str) -> &str {
    let word = text.split_whitespace().next().unwrap_or("");
    word.trim_matches(|c| c == '"' || c == '\'')
}

/// Span of the whole line around a tag when nothing but whitespace shares
/// the line with it: `(line_start, end_after_newline)`.
fn standalone_span(
    source: &str,
    floor: usize,
    start: usize,
    end: usize,
) -> Option<(usize, usize)> {
    let line_start = source[..start].rfind('\n').map(|i| i + 1).unwrap_or(0);
    if line_start < floor || !source[line_start..start].chars().all(|c| c == ' ' || c == '\t') {
        return None;
    }
    let line_end = source[end..]
        .find('\n')
        .map(|i| end + i + 1)
        .unwrap_or(source.len());
    if !source[end..line_end].trim().is_empty() {
        return None;
    }
    Some((line_start, line_end))
}

/// Finds `{{/name}}` after `from`: `(tag_start, tag_end)`.
fn find_close(source: &str, from: usize, name: &str) -> Option<(usize, usize)> {
    TAG_RE.find_iter(&source[from..]).find_map(|m| {
        let inner = m.as_str()[2..m.as_str().len() - 2].trim();
        match classify(inner) {
            Tag::Close(closed) if closed == name => Some((from + m.start(), from + m.end())),
            _ => None,
        }
    })
}

#[derive(Debug, Clone, Copy, Default)]
pub struct HandlebarsHost;

impl HandlebarsHost {
    fn splice(ctx: &CompileContext, expr: &str) -> String {
        format!("'{sep}{expr}{sep}'", sep = ctx.ops.separator, expr = expr)
    }

    /// Dispatch call for a runtime partial. `indent` is set when the tag
    /// stood alone on its line; inside a callable that binds `$sp` the
    /// callee is then passed the caller's indentation plus the line's own.
    fn runtime_call(
        ctx: &CompileContext,
        name_code: &str,
        indent: Option<&str>,
        block: Option<&str>,
    ) -> String {
        let mut args = String::new();
        let mut self_indented = false;
        if !ctx.flags.no_indent {
            let arg = match indent {
                Some(indent) if ctx.tokens.indent_scope => {
                    self_indented = true;
                    format!("{}{}'{}'", INDENT_PARAM, ctx.ops.separator, indent)
                }
                Some(indent) => format!("'{}'", indent),
                None => "''".to_string(),
            };
            args.push_str(", ");
            args.push_str(&arg);
        }
        if let Some(block) = block {
            args.push_str(", ");
            args.push_str(block);
        }

        let call = Self::splice(ctx, &format!("LR::p($cx, {}, $in{})", name_code, args));
        if self_indented {
            format!("{}{}", SELF_INDENTED_MARK, call)
        } else {
            call
        }
    }

    /// Body end and closing-tag end of a block opened at `open_end`. An
    /// unclosed block runs to the end of the source.
    fn block_span(
        ctx: &mut CompileContext,
        source: &str,
        open_end: usize,
        name: &str,
    ) -> (usize, usize) {
        find_close(source, open_end, name).unwrap_or_else(|| {
            ctx.report(CompileError::Host(format!("Unclosed block '{}'", name)));
            (source.len(), source.len())
        })
    }

    fn partial(
        &self,
        ctx: &mut CompileContext,
        reference: PartialRef<'_>,
        indent: Option<&str>,
    ) -> String {
        let line_indent = indent.unwrap_or("").to_string();
        let saved = std::mem::replace(&mut ctx.tokens.partial_ind, line_indent);

        let code = match reference {
            PartialRef::Named(name) => {
                read_partial(ctx, self, name);
                let target = ctx.resolved_name(name).to_string();
                if ctx.flags.runtime_partial {
                    Self::runtime_call(ctx, &format!("'{}'", target), indent, None)
                } else {
                    compile_static(ctx, self, &target)
                }
            }
            PartialRef::Dynamic(expr) => {
                ctx.count_feature(FEATURE_DYNAMIC_PARTIAL);
                if !ctx.flags.runtime_partial && !ctx.flags.allow_dynamic_partial_name {
                    ctx.report(CompileError::DynamicPartialName {
                        expr: expr.to_string(),
                    });
                }
                let name_code = format!("$in['{}']", quote_literal(expr));
                Self::runtime_call(ctx, &name_code, indent, None)
            }
            PartialRef::Block => self.partial_block_ref(ctx, indent),
        };

        ctx.tokens.partial_ind = saved;
        code
    }

    fn partial_block_ref(&self, ctx: &mut CompileContext, indent: Option<&str>) -> String {
        match ctx.partial_block.pop() {
            Some(body) => {
                // The block body may itself reference the enclosing block.
                let code = self.compile_template(ctx, &prefix_lines(&body, indent.unwrap_or("")));
                ctx.partial_block.push(body);
                code
            }
            None if ctx.flags.runtime_partial => Self::splice(ctx, "LR::pb($cx, $in)"),
            None => {
                ctx.report(CompileError::Host(format!(
                    "Can not find {} outside of a partial block",
                    PARTIAL_BLOCK_NAME
                )));
                String::new()
            }
        }
    }

    fn partial_with_block(&self, ctx: &mut CompileContext, name: &str, body: &str) -> String {
        let saved = std::mem::take(&mut ctx.tokens.partial_ind);
        read_partial(ctx, self, name);
        let target = ctx.resolved_name(name).to_string();

        let code = if ctx.flags.runtime_partial {
            let block = compile_local(ctx, self, body);
            Self::runtime_call(ctx, &format!("'{}'", target), None, Some(&block))
        } else {
            ctx.partial_block.push(body.to_string());
            let code = compile_static(ctx, self, &target);
            ctx.partial_block.pop();
            code
        };

        ctx.tokens.partial_ind = saved;
        code
    }

    fn define_inline(&self, ctx: &mut CompileContext, name: &str, body: &str) {
        ctx.count_feature(FEATURE_INLINE_PARTIAL);
        let body = unmask_keyword(body);
        ctx.inline_partial.insert(name.to_string(), body.clone());
        if !ctx.used_partial.contains_key(name) {
            ctx.used_partial.insert(name.to_string(), body);
            compile_dynamic(ctx, self, name);
        }
    }
}

impl TemplateCompiler for HandlebarsHost {
    fn compile_template(&self, ctx: &mut CompileContext, source: &str) -> String {
        let mut out = String::new();
        let mut pos = 0;

        while let Some(m) = TAG_RE.find_at(source, pos) {
            let inner = source[m.start() + 2..m.end() - 2].trim();
            let mut literal_end = m.start();
            let mut next = m.end();

            let code = match classify(inner) {
                Tag::Partial(reference) => {
                    let mut indent = None;
                    let span = standalone_span(source, pos, m.start(), m.end());
                    if let Some((line_start, line_end)) = span {
                        indent = Some(&source[line_start..m.start()]);
                        literal_end = line_start;
                        next = line_end;
                    }
                    out.push_str(&quote_literal(&source[pos..literal_end]));
                    self.partial(ctx, reference, indent)
                }
                Tag::PartialBlock(name) => {
                    let (body_end, close_end) = Self::block_span(ctx, source, m.end(), name);
                    next = close_end;
                    out.push_str(&quote_literal(&source[pos..literal_end]));
                    self.partial_with_block(ctx, name, &source[m.end()..body_end])
                }
                Tag::Inline(name) => {
                    let (body_end, close_end) = Self::block_span(ctx, source, m.end(), "inline");
                    next = close_end;
                    out.push_str(&quote_literal(&source[pos..literal_end]));
                    self.define_inline(ctx, name, &source[m.end()..body_end]);
                    String::new()
                }
                Tag::Close(name) => {
                    ctx.report(CompileError::Host(format!("Unexpected closing tag '{}'", name)));
                    out.push_str(&quote_literal(&source[pos..literal_end]));
                    String::new()
                }
                Tag::Variable(var) => {
                    out.push_str(&quote_literal(&source[pos..literal_end]));
                    Self::splice(ctx, &format!("$in['{}']", quote_literal(var)))
                }
            };

            out.push_str(&code);
            pos = next;
        }

        out.push_str(&quote_literal(&source[pos..]));
        out
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::options::CompileOptions;

    fn ctx_with(opts: CompileOptions) -> CompileContext {
        CompileContext::new(&opts)
    }

    #[test]
    fn test_classify_tags() {
        assert_eq!(classify("> header"), Tag::Partial(PartialRef::Named("header")));
        assert_eq!(classify("> 'quoted' arg"), Tag::Partial(PartialRef::Named("quoted")));
        assert_eq!(classify("> (which)"), Tag::Partial(PartialRef::Dynamic("which")));
        assert_eq!(classify("> @partial-block"), Tag::Partial(PartialRef::Block));
        assert_eq!(classify("#> layout"), Tag::PartialBlock("layout"));
        assert_eq!(classify("#*inline \"row\""), Tag::Inline("row"));
        assert_eq!(classify("/inline"), Tag::Close("inline"));
        assert_eq!(classify("title"), Tag::Variable("title"));
    }

    #[test]
    fn test_literal_and_variable_output() {
        let mut ctx = ctx_with(CompileOptions::default());
        let code = HandlebarsHost.compile_template(&mut ctx, "it's {{name}}!");
        assert_eq!(code, r"it\'s '.$in['name'].'!");
        assert!(ctx.error.is_empty());
    }

    #[test]
    fn test_quotes_in_tag_names_are_escaped() {
        let mut opts = CompileOptions::default();
        opts.flags.allow_dynamic_partial_name = true;
        let mut ctx = ctx_with(opts);

        let code = HandlebarsHost.compile_template(&mut ctx, "{{it's}} {{> (o'k)}}");
        assert_eq!(code, r"'.$in['it\'s'].' '.LR::p($cx, $in['o\'k'], $in, '').'");
        assert!(ctx.error.is_empty());
    }

    #[test]
    fn test_standalone_detection() {
        let src = "a\n  {{> x}}\nb";
        let start = src.find("{{").unwrap();
        let end = src.find("}}").unwrap() + 2;
        assert_eq!(standalone_span(src, 0, start, end), Some((2, end + 1)));

        let inline = "a {{> x}} b";
        let start = inline.find("{{").unwrap();
        let end = inline.find("}}").unwrap() + 2;
        assert_eq!(standalone_span(inline, 0, start, end), None);
    }

    #[test]
    fn test_static_partial_is_inlined() {
        let mut ctx = ctx_with(CompileOptions::default().with_partial("who", "world"));
        let code = HandlebarsHost.compile_template(&mut ctx, "hello {{> who}}!");
        assert_eq!(code, "hello world!");
    }

    #[test]
    fn test_runtime_partial_emits_dispatch_call() {
        let mut opts = CompileOptions::default().with_partial("who", "world");
        opts.flags.runtime_partial = true;
        let mut ctx = ctx_with(opts);

        let code = HandlebarsHost.compile_template(&mut ctx, "hello {{> who}}!");
        assert_eq!(code, "hello '.LR::p($cx, 'who', $in, '').'!");
        assert!(ctx.partial_code.contains("who"));
    }

    #[test]
    fn test_dynamic_name_requires_runtime_mode() {
        let mut ctx = ctx_with(CompileOptions::default());
        let code = HandlebarsHost.compile_template(&mut ctx, "{{> (pick)}}");
        assert_eq!(code, "'.LR::p($cx, $in['pick'], $in, '').'");
        assert_eq!(ctx.feature(FEATURE_DYNAMIC_PARTIAL), 1);
        assert_eq!(
            ctx.error,
            vec![CompileError::DynamicPartialName {
                expr: "pick".to_string()
            }]
        );
    }

    #[test]
    fn test_dynamic_name_allowed_by_flag() {
        let mut opts = CompileOptions::default();
        opts.flags.allow_dynamic_partial_name = true;
        let mut ctx = ctx_with(opts);
        HandlebarsHost.compile_template(&mut ctx, "{{> (pick)}}");
        assert!(ctx.error.is_empty());
    }

    #[test]
    fn test_inline_partial_definition_and_use() {
        let mut ctx = ctx_with(CompileOptions::default());
        let code = HandlebarsHost
            .compile_template(&mut ctx, "{{#*inline \"row\"}}<td/>{{/inline}}<tr>{{> row}}</tr>");
        assert_eq!(code, "<tr><td/></tr>");
        assert_eq!(ctx.inline_partial.get("row").map(|s| s.as_str()), Some("<td/>"));
        assert_eq!(ctx.feature(FEATURE_INLINE_PARTIAL), 1);
        assert!(ctx.error.is_empty());
    }

    #[test]
    fn test_static_partial_block() {
        let opts = CompileOptions::default().with_partial("layout", "<main>{{> @partial-block}}</main>");
        let mut ctx = ctx_with(opts);
        let code = HandlebarsHost.compile_template(&mut ctx, "{{#> layout}}body{{/layout}}");
        assert_eq!(code, "<main>body</main>");
        assert!(ctx.partial_block.is_empty());
        assert!(ctx.error.is_empty());
    }

    #[test]
    fn test_partial_block_reference_outside_block() {
        let mut ctx = ctx_with(CompileOptions::default());
        let code = HandlebarsHost.compile_template(&mut ctx, "{{> @partial-block}}");
        assert_eq!(code, "");
        assert_eq!(ctx.error.len(), 1);
    }

    #[test]
    fn test_unclosed_and_stray_blocks_are_reported() {
        let mut ctx = ctx_with(CompileOptions::default());
        HandlebarsHost.compile_template(&mut ctx, "{{#*inline \"x\"}}never closed");
        HandlebarsHost.compile_template(&mut ctx, "text{{/oops}}");
        assert_eq!(ctx.error.len(), 2);
        assert_eq!(ctx.error[0], CompileError::Host("Unclosed block 'inline'".to_string()));
        assert_eq!(ctx.error[1], CompileError::Host("Unexpected closing tag 'oops'".to_string()));
    }
}
