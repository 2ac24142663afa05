//! Partial Module
//!
//! Reading, caching and compiling named partials. A partial is either
//! embedded into its caller at compile time (static mode, guarded against
//! recursive inclusion) or compiled once into a standalone callable that the
//! generated program dispatches to by name (runtime mode).

use std::collections::HashSet;

use crate::context::{CompileContext, FEATURE_DYNAMIC_PARTIAL, FEATURE_PARTIAL};
use crate::error::CompileError;
use crate::escape::escape_template;
use crate::host::TemplateCompiler;
use crate::indent::{prefix_lines, thread_indent, INDENT_PARAM};
use crate::resolver::resolve_partial;
use crate::sentinel::{mask_keyword, unmask_keyword};

// ═══════════════════════════════════════════════════════════════════════════════
// CACHE
// ═══════════════════════════════════════════════════════════════════════════════

/// Resolves and caches `name` for the rest of the compilation.
///
/// Every call counts as one partial reference. The first successful call
/// stores the escaped source and, in runtime mode, registers the compiled
/// callable; its definition is returned. Later calls return `None` without
/// touching the resolver. A name rewritten by the preprocessing hook is
/// remembered, see [`CompileContext::resolved_name`].
pub fn read_partial<C>(ctx: &mut CompileContext, host: &C, name: &str) -> Option<String>
where
    C: TemplateCompiler + ?Sized,
{
    ctx.count_feature(FEATURE_PARTIAL);

    if ctx.used_partial.contains_key(ctx.resolved_name(name)) {
        return None;
    }

    let mut resolved_name = name.to_string();
    match resolve_partial(ctx, &mut resolved_name) {
        Some(source) => {
            if resolved_name != name {
                tracing::debug!(
                    partial = %name,
                    renamed = %resolved_name,
                    "partial renamed by hook"
                );
                ctx.partial_alias
                    .entry(name.to_string())
                    .or_insert_with(|| resolved_name.clone());
            }
            tracing::debug!(partial = %resolved_name, "caching partial");
            ctx.used_partial
                .entry(resolved_name.clone())
                .or_insert_with(|| escape_template(&source));
            compile_dynamic(ctx, host, &resolved_name)
        }
        None => {
            if !ctx.flags.skip_partial {
                ctx.report(CompileError::MissingPartial {
                    name: name.to_string(),
                });
            }
            None
        }
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// STATIC EMBEDDING
// ═══════════════════════════════════════════════════════════════════════════════

/// Compiles the cached source of `name` for inlining at the reference site.
///
/// Outside runtime mode the name is pushed on the partial stack while it
/// compiles. If it is already on the stack the full chain is reported and
/// nothing is inlined for this inclusion, which stops the cycle. A name with
/// nothing cached inlines nothing.
pub fn compile_static<C>(ctx: &mut CompileContext, host: &C, name: &str) -> String
where
    C: TemplateCompiler + ?Sized,
{
    let name = ctx.resolved_name(name).to_string();
    let source = match ctx.used_partial.get(&name) {
        Some(source) => source.clone(),
        None => {
            let error = CompileError::MissingPartial { name };
            if !ctx.flags.skip_partial && !ctx.error.contains(&error) {
                ctx.report(error);
            }
            return String::new();
        }
    };

    let guarded = !ctx.flags.runtime_partial;
    if guarded {
        ctx.partial_stack.push(name);
        let distinct = ctx.partial_stack.iter().collect::<HashSet<_>>().len();
        if distinct != ctx.partial_stack.len() {
            let error = CompileError::recursive(&ctx.partial_stack);
            tracing::warn!("{}", error);
            ctx.report(error);
            ctx.partial_stack.pop();
            return String::new();
        }
    }

    let indent = if ctx.flags.no_indent {
        String::new()
    } else {
        ctx.tokens.partial_ind.clone()
    };
    let code = host.compile_template(ctx, &prefix_lines(&source, &indent));

    if guarded {
        ctx.partial_stack.pop();
    }

    code
}

// ═══════════════════════════════════════════════════════════════════════════════
// RUNTIME PARTIALS
// ═══════════════════════════════════════════════════════════════════════════════

/// Compiles the cached source of `name` into a callable and registers it in
/// the dispatch table. Does nothing outside runtime mode or once the name
/// has been registered.
pub fn compile_dynamic<C>(ctx: &mut CompileContext, host: &C, name: &str) -> Option<String>
where
    C: TemplateCompiler + ?Sized,
{
    if !ctx.flags.runtime_partial || ctx.partial_code.contains(name) {
        return None;
    }
    let source = ctx.used_partial.get(name)?.clone();

    let func = compile_local(ctx, host, &source);
    if ctx
        .partial_code
        .insert_if_absent(name, format!("'{}' => {}", name, func))
    {
        tracing::debug!(partial = %name, "registered runtime partial");
    }
    Some(func)
}

/// Compiles `template` into a standalone callable definition.
///
/// The fragment is compiled against a copy of the context with no inline
/// partials or partial blocks in scope; errors, counters and new partial
/// registrations are merged back afterwards.
pub fn compile_local<C>(ctx: &mut CompileContext, host: &C, template: &str) -> String
where
    C: TemplateCompiler + ?Sized,
{
    let mut local = ctx.clone();
    local.inline_partial.clear();
    local.partial_block.clear();
    local.tokens.indent_scope = !local.flags.no_indent;

    let code = host.compile_template(&mut local, &mask_keyword(template));
    ctx.merge_from(local);

    let (params, code) = if ctx.flags.no_indent {
        (String::new(), code)
    } else {
        (
            format!(", {}", INDENT_PARAM),
            thread_indent(&code, &ctx.ops.separator),
        )
    };
    let code = unmask_keyword(&code);

    format!(
        "function ($cx, $in{}) {{{}'{}'{}}}",
        params, ctx.ops.op_start, code, ctx.ops.op_end
    )
}

// ═══════════════════════════════════════════════════════════════════════════════
// DYNAMIC PARTIAL NAMES
// ═══════════════════════════════════════════════════════════════════════════════

/// Reads every registered partial when the template names a partial only at
/// render time, so the dispatch table can serve any of them.
///
/// Partials registered after this call are not covered.
pub fn handle_dynamic_partial<C>(ctx: &mut CompileContext, host: &C)
where
    C: TemplateCompiler + ?Sized,
{
    if ctx.feature(FEATURE_DYNAMIC_PARTIAL) == 0 {
        return;
    }

    let names = ctx.partials.keys().cloned().collect::<Vec<_>>();
    tracing::debug!(count = names.len(), "preloading partials for dynamic names");
    for name in names {
        read_partial(ctx, host, &name);
    }
}
