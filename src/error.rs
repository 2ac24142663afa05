//! Compile diagnostics.
//!
//! Nothing in the partial pipeline aborts a compilation. Every problem is
//! recorded as a [`CompileError`] on the context and compilation continues,
//! so the caller always gets an artifact plus the full list of problems.

use serde::{Serialize, Serializer};

// ═══════════════════════════════════════════════════════════════════════════════
// ERROR CODES
// ═══════════════════════════════════════════════════════════════════════════════

pub const ERR_MISSING_PARTIAL: &str = "P-ERR-MISSING";
pub const ERR_RECURSIVE_PARTIAL: &str = "P-ERR-RECURSIVE";
pub const ERR_DYNAMIC_PARTIAL_NAME: &str = "P-ERR-DYNAMIC-NAME";
pub const ERR_HOST: &str = "P-ERR-HOST";

#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum CompileError {
    /// No inline registration and no file on any `basedir × fileext` candidate.
    #[error("Cannot find partial '{name}', check the basedir and fileext options")]
    MissingPartial { name: String },

    /// A partial name repeated inside the static embedding chain.
    #[error("Recursive partial inclusion along the path: {chain}! Fix the template or compile with the runtime partial option.")]
    RecursivePartial { chain: String },

    /// A partial name computed at render time without runtime partials enabled.
    #[error("Dynamic partial name '{expr}' only works with the runtime partial option")]
    DynamicPartialName { expr: String },

    /// Anything reported by the host template compiler.
    #[error("{0}")]
    Host(String),
}

impl CompileError {
    pub fn code(&self) -> &'static str {
        match self {
            CompileError::MissingPartial { .. } => ERR_MISSING_PARTIAL,
            CompileError::RecursivePartial { .. } => ERR_RECURSIVE_PARTIAL,
            CompileError::DynamicPartialName { .. } => ERR_DYNAMIC_PARTIAL_NAME,
            CompileError::Host(_) => ERR_HOST,
        }
    }

    /// Builds the recursion diagnostic from the current in-progress chain.
    pub fn recursive<S: AsRef<str>>(stack: &[S]) -> Self {
        let chain = stack
            .iter()
            .map(|s| s.as_ref())
            .collect::<Vec<_>>()
            .join(" -> ");
        CompileError::RecursivePartial { chain }
    }
}

impl Serialize for CompileError {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        use serde::ser::SerializeStruct;
        let mut s = serializer.serialize_struct("CompileError", 2)?;
        s.serialize_field("code", self.code())?;
        s.serialize_field("message", &self.to_string())?;
        s.end()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_partial_message_names_partial() {
        let err = CompileError::MissingPartial {
            name: "header".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("'header'"));
        assert!(msg.contains("basedir"));
        assert!(msg.contains("fileext"));
        assert_eq!(err.code(), ERR_MISSING_PARTIAL);
    }

    #[test]
    fn test_recursive_chain_is_joined_in_order() {
        let err = CompileError::recursive(&["A", "B", "A"]);
        assert_eq!(
            err,
            CompileError::RecursivePartial {
                chain: "A -> B -> A".to_string()
            }
        );
        assert!(err.to_string().contains("A -> B -> A!"));
    }

    #[test]
    fn test_serializes_code_and_message() {
        let err = CompileError::Host("bad tag".to_string());
        let json = serde_json::to_value(&err).unwrap();
        assert_eq!(json["code"], ERR_HOST);
        assert_eq!(json["message"], "bad tag");
    }
}
