//! Partial source lookup.
//!
//! Inline registrations win over files. Files are searched directory-major:
//! every extension is tried in the first directory before moving on.

use std::fs;
use std::path::PathBuf;

use crate::context::CompileContext;

/// Runs the configured preprocessing hook, if any. The hook may rename the
/// partial through `name`.
pub fn pre_partial(ctx: &CompileContext, template: &str, name: &mut String) -> String {
    match &ctx.prepartial {
        Some(hook) => hook.call(ctx, template, name),
        None => template.to_string(),
    }
}

/// Finds the raw source for `name`, passed through the preprocessing hook.
pub fn resolve_partial(ctx: &CompileContext, name: &mut String) -> Option<String> {
    if let Some(source) = ctx.partials.get(name.as_str()) {
        tracing::debug!(partial = %name, "resolved inline partial");
        return Some(pre_partial(ctx, source, name));
    }

    let lookup = name.clone();
    for path in candidate_paths(ctx, &lookup) {
        if !path.is_file() {
            continue;
        }
        match fs::read_to_string(&path) {
            Ok(source) => {
                tracing::debug!(partial = %name, path = %path.display(), "resolved partial file");
                return Some(pre_partial(ctx, &source, name));
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), "failed to read partial file: {}", e);
            }
        }
    }

    None
}

fn candidate_paths<'a>(
    ctx: &'a CompileContext,
    name: &'a str,
) -> impl Iterator<Item = PathBuf> + 'a {
    ctx.basedir.iter().flat_map(move |dir| {
        ctx.fileext
            .iter()
            .map(move |ext| dir.join(format!("{}{}", name, ext)))
    })
}
