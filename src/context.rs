//! Compile context shared by every partial operation.
//!
//! One `CompileContext` lives for a whole compilation and is threaded through
//! the pipeline as `&mut`. Isolated nested compilations work on a clone and
//! fold their results back with [`CompileContext::merge_from`].

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;
use std::sync::Arc;

use crate::error::CompileError;
use crate::options::CompileOptions;
use crate::registry::PartialTable;

// ═══════════════════════════════════════════════════════════════════════════════
// FEATURE COUNTERS
// ═══════════════════════════════════════════════════════════════════════════════

/// Partial references compiled, cache hits included.
pub const FEATURE_PARTIAL: &str = "partial";
/// Partial references whose name is only known at render time.
pub const FEATURE_DYNAMIC_PARTIAL: &str = "dynpartial";
/// Inline partial definitions.
pub const FEATURE_INLINE_PARTIAL: &str = "inlpartial";

// ═══════════════════════════════════════════════════════════════════════════════
// SETTINGS
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct Flags {
    /// Unresolved partials are skipped without a diagnostic.
    pub skip_partial: bool,
    /// Partials become dispatchable units instead of being inlined.
    pub runtime_partial: bool,
    /// Disables indentation threading.
    pub no_indent: bool,
    pub allow_dynamic_partial_name: bool,
}

/// Host-owned markers used while assembling code.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Tokens {
    /// Indentation of the line holding the partial currently being embedded.
    pub partial_ind: String,
    /// `$sp` is bound in the code being generated.
    pub indent_scope: bool,
}

/// Statement fragments of the target language.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CodeOps {
    pub separator: String,
    pub op_start: String,
    pub op_end: String,
}

impl Default for CodeOps {
    fn default() -> Self {
        Self {
            separator: ".".to_string(),
            op_start: "return ".to_string(),
            op_end: ";".to_string(),
        }
    }
}

/// User preprocessing hook: `(context, raw template, name) -> processed`.
/// The hook may rewrite `name`; the rewritten name is the one cached.
pub type PrePartialFn = dyn Fn(&CompileContext, &str, &mut String) -> String + Send + Sync;

#[derive(Clone)]
pub struct PrePartial(pub Arc<PrePartialFn>);

impl PrePartial {
    pub fn new<F>(f: F) -> Self
    where
        F: Fn(&CompileContext, &str, &mut String) -> String + Send + Sync + 'static,
    {
        PrePartial(Arc::new(f))
    }

    pub fn call(&self, ctx: &CompileContext, template: &str, name: &mut String) -> String {
        (self.0)(ctx, template, name)
    }
}

impl fmt::Debug for PrePartial {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("PrePartial(..)")
    }
}

// ═══════════════════════════════════════════════════════════════════════════════
// CONTEXT
// ═══════════════════════════════════════════════════════════════════════════════

#[derive(Debug, Clone, Default)]
pub struct CompileContext {
    pub flags: Flags,
    /// Inline-registered partial sources, searched before the filesystem.
    pub partials: IndexMap<String, String>,
    /// Resolved and escaped partial sources, first resolution wins.
    pub used_partial: IndexMap<String, String>,
    /// Requested name -> name given by the preprocessing hook.
    pub partial_alias: IndexMap<String, String>,
    pub used_feature: IndexMap<String, u32>,
    pub basedir: Vec<PathBuf>,
    pub fileext: Vec<String>,
    pub prepartial: Option<PrePartial>,
    /// Static embedding chain, innermost last.
    pub partial_stack: Vec<String>,
    pub partial_code: PartialTable,
    pub error: Vec<CompileError>,
    pub tokens: Tokens,
    pub ops: CodeOps,
    /// Inline partials defined in the scope being compiled.
    pub inline_partial: IndexMap<String, String>,
    /// Partial-block bodies of the enclosing partial calls.
    pub partial_block: Vec<String>,
}

impl CompileContext {
    pub fn new(options: &CompileOptions) -> Self {
        let mut used_feature = IndexMap::new();
        for feature in [FEATURE_PARTIAL, FEATURE_DYNAMIC_PARTIAL, FEATURE_INLINE_PARTIAL] {
            used_feature.insert(feature.to_string(), 0);
        }

        Self {
            flags: options.flags,
            partials: options.partials.clone(),
            used_feature,
            basedir: options.search_dirs(),
            fileext: options.fileext.clone(),
            prepartial: options.prepartial.clone(),
            ops: options.ops.clone(),
            ..Default::default()
        }
    }

    /// Name a reference to `name` is cached and dispatched under.
    pub fn resolved_name<'a>(&'a self, name: &'a str) -> &'a str {
        self.partial_alias.get(name).map(|s| s.as_str()).unwrap_or(name)
    }

    pub fn feature(&self, name: &str) -> u32 {
        self.used_feature.get(name).copied().unwrap_or(0)
    }

    pub fn count_feature(&mut self, name: &str) {
        *self.used_feature.entry(name.to_string()).or_insert(0) += 1;
    }

    pub fn report(&mut self, error: CompileError) {
        tracing::debug!(code = error.code(), "{}", error);
        self.error.push(error);
    }

    /// Folds an isolated working copy back into this context.
    ///
    /// `child` must have been cloned from `self` with nothing appended to
    /// `self` since. Errors and counters are carried over; cached sources,
    /// dispatch entries and partial registrations are added only where this
    /// context has none. Scope-local state (`partial_stack`,
    /// `inline_partial`, `partial_block`, `tokens`) stays behind.
    pub fn merge_from(&mut self, child: CompileContext) {
        let CompileContext {
            partials,
            used_partial,
            partial_alias,
            used_feature,
            partial_code,
            error,
            ..
        } = child;

        let known = self.error.len();
        self.error.extend(error.into_iter().skip(known));

        for (feature, count) in used_feature {
            let slot = self.used_feature.entry(feature).or_insert(0);
            *slot = (*slot).max(count);
        }

        for (name, source) in used_partial {
            self.used_partial.entry(name).or_insert(source);
        }
        for (name, renamed) in partial_alias {
            self.partial_alias.entry(name).or_insert(renamed);
        }
        for (name, source) in partials {
            self.partials.entry(name).or_insert(source);
        }
        self.partial_code.absorb(partial_code);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn ctx() -> CompileContext {
        CompileContext::new(&CompileOptions::default())
    }

    #[test]
    fn test_new_seeds_feature_counters() {
        let c = ctx();
        assert_eq!(c.feature(FEATURE_PARTIAL), 0);
        assert_eq!(c.feature(FEATURE_DYNAMIC_PARTIAL), 0);
        assert_eq!(c.feature("unknown"), 0);
        assert_eq!(c.fileext, vec![".tmpl".to_string()]);
    }

    #[test]
    fn test_merge_appends_only_new_errors() {
        let mut parent = ctx();
        parent.report(CompileError::Host("first".into()));

        let mut child = parent.clone();
        child.report(CompileError::Host("second".into()));

        parent.merge_from(child);
        assert_eq!(parent.error.len(), 2);
        assert_eq!(parent.error[1], CompileError::Host("second".into()));
    }

    #[test]
    fn test_merge_keeps_first_resolution() {
        let mut parent = ctx();
        parent.used_partial.insert("a".into(), "parent".into());

        let mut child = parent.clone();
        child.used_partial.insert("a".into(), "child".into());
        child.used_partial.insert("b".into(), "child-b".into());
        child.partial_alias.insert("c".into(), "b".into());
        child.partial_code.insert_if_absent("b", "'b' => f".into());
        child.count_feature(FEATURE_PARTIAL);
        child.count_feature(FEATURE_PARTIAL);

        parent.merge_from(child);
        assert_eq!(parent.used_partial["a"], "parent");
        assert_eq!(parent.used_partial["b"], "child-b");
        assert_eq!(parent.resolved_name("c"), "b");
        assert!(parent.partial_code.contains("b"));
        assert_eq!(parent.feature(FEATURE_PARTIAL), 2);
    }

    #[test]
    fn test_merge_does_not_leak_scope_state() {
        let mut parent = ctx();
        let mut child = parent.clone();
        child.inline_partial.insert("x".into(), "body".into());
        child.partial_block.push("block".into());
        child.partial_stack.push("x".into());
        child.tokens.indent_scope = true;

        parent.merge_from(child);
        assert!(parent.inline_partial.is_empty());
        assert!(parent.partial_block.is_empty());
        assert!(parent.partial_stack.is_empty());
        assert!(!parent.tokens.indent_scope);
    }

    #[test]
    fn test_resolved_name_follows_alias() {
        let mut c = ctx();
        assert_eq!(c.resolved_name("nav"), "nav");
        c.partial_alias.insert("nav".into(), "nav_v2".into());
        assert_eq!(c.resolved_name("nav"), "nav_v2");
    }
}
