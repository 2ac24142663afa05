//! Compile driver: one template in, code plus dispatch table and diagnostics out.

use indexmap::IndexMap;
use serde::Serialize;

use crate::context::CompileContext;
use crate::error::CompileError;
use crate::escape::escape_template;
use crate::host::{HandlebarsHost, TemplateCompiler};
use crate::options::CompileOptions;
use crate::partial::handle_dynamic_partial;
use crate::registry::PartialTable;

/// Best-effort compilation output. `code` is produced even when `errors` is
/// not empty; the caller decides whether diagnostics fail the build.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompileResult {
    pub code: String,
    pub partial_code: PartialTable,
    pub used_partial: IndexMap<String, String>,
    pub used_feature: IndexMap<String, u32>,
    pub errors: Vec<CompileError>,
}

impl CompileResult {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error_messages(&self) -> Vec<String> {
        self.errors.iter().map(|e| e.to_string()).collect()
    }
}

pub fn compile(source: &str, options: &CompileOptions) -> CompileResult {
    compile_with(&HandlebarsHost, source, options)
}

pub fn compile_with<C>(host: &C, source: &str, options: &CompileOptions) -> CompileResult
where
    C: TemplateCompiler + ?Sized,
{
    let _span = tracing::debug_span!("compile_partials").entered();

    let mut ctx = CompileContext::new(options);
    let code = host.compile_template(&mut ctx, &escape_template(source));
    handle_dynamic_partial(&mut ctx, host);

    if !ctx.error.is_empty() {
        tracing::debug!(errors = ctx.error.len(), "compiled with diagnostics");
    }

    CompileResult {
        code,
        partial_code: ctx.partial_code,
        used_partial: ctx.used_partial,
        used_feature: ctx.used_feature,
        errors: ctx.error,
    }
}
