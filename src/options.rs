//! Compile options.
//!
//! Deserializable from the camelCase JSON the bindings receive; the
//! preprocessing hook can only be attached from Rust.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::context::{CodeOps, Flags, PrePartial};

pub const DEFAULT_FILE_EXT: &str = ".tmpl";

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct CompileOptions {
    #[serde(flatten)]
    pub flags: Flags,
    /// Directories searched for partial files, in order.
    pub basedir: Vec<PathBuf>,
    /// File extensions tried inside each directory, in order.
    pub fileext: Vec<String>,
    /// Partials registered by name; these win over files.
    pub partials: IndexMap<String, String>,
    pub ops: CodeOps,
    #[serde(skip)]
    pub prepartial: Option<PrePartial>,
}

impl Default for CompileOptions {
    fn default() -> Self {
        Self {
            flags: Flags::default(),
            basedir: Vec::new(),
            fileext: vec![DEFAULT_FILE_EXT.to_string()],
            partials: IndexMap::new(),
            ops: CodeOps::default(),
            prepartial: None,
        }
    }
}

impl CompileOptions {
    pub fn from_json(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    pub fn with_partial(mut self, name: &str, source: &str) -> Self {
        self.partials.insert(name.to_string(), source.to_string());
        self
    }

    pub fn with_prepartial(mut self, hook: PrePartial) -> Self {
        self.prepartial = Some(hook);
        self
    }

    /// Configured directories that exist, or the working directory when
    /// none are usable.
    pub fn search_dirs(&self) -> Vec<PathBuf> {
        let mut dirs = Vec::new();
        for dir in &self.basedir {
            if dir.is_dir() {
                dirs.push(dir.clone());
            } else {
                tracing::warn!(dir = %dir.display(), "partial basedir is not a directory, ignored");
            }
        }
        if dirs.is_empty() {
            if let Ok(cwd) = std::env::current_dir() {
                dirs.push(cwd);
            }
        }
        dirs
    }
}
