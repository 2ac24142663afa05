//! # Partial Template Compiler
//!
//! Resolves named partial templates, merges their compiled form into the
//! surrounding compilation unit, and guards against recursive inclusion.
//!
//! ## Strategies
//!
//! 1. **Static embedding** (default): a partial's compiled code is inlined at
//!    the reference site. The partial stack detects any name repeating in the
//!    inclusion chain and reports the whole chain.
//!
//! 2. **Runtime partials** (`runtime_partial`): every partial is compiled once
//!    into a standalone callable registered in the dispatch table
//!    (`partial_code`). Recursion is legal and names may be computed at render
//!    time; in that case every registered partial is preloaded.
//!
//! ## Context Threading
//!
//! A single `CompileContext` is passed as `&mut` through every operation.
//! Local compilation works on a clone with nested-scope state cleared and
//! merges errors, counters and new registrations back. Cached sources and
//! dispatch entries are insert-if-absent: the first resolution wins.
//!
//! Problems never abort compilation. They are collected as `CompileError`s
//! next to the (possibly partial) artifact.

#[cfg(feature = "napi")]
use napi_derive::napi;

mod compile;
mod context;
mod error;
mod escape;
mod host;
mod indent;
mod options;
mod partial;
mod registry;
mod resolver;
mod sentinel;


pub use compile::{compile, compile_with, CompileResult};
pub use context::{
    CodeOps, CompileContext, Flags, PrePartial, PrePartialFn, Tokens, FEATURE_DYNAMIC_PARTIAL,
    FEATURE_INLINE_PARTIAL, FEATURE_PARTIAL,
};
pub use error::CompileError;
pub use escape::escape_template;
pub use host::{HandlebarsHost, TemplateCompiler};
pub use options::CompileOptions;
pub use partial::{
    compile_dynamic, compile_local, compile_static, handle_dynamic_partial, read_partial,
};
pub use registry::PartialTable;
pub use resolver::{pre_partial, resolve_partial};
pub use sentinel::{mask_keyword, unmask_keyword};

/// Compiles `template` with options given as JSON and returns the
/// `CompileResult` as JSON.
#[cfg(feature = "napi")]
#[napi]
pub fn compile_partials_native(template: String, options_json: String) -> napi::Result<String> {
    let options = CompileOptions::from_json(&options_json)
        .map_err(|e| napi::Error::from_reason(format!("Invalid compile options: {}", e)))?;
    let result = compile(&template, &options);
    serde_json::to_string(&result)
        .map_err(|e| napi::Error::from_reason(format!("Failed to serialize result: {}", e)))
}
