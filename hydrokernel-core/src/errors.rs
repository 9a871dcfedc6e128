use thiserror::Error;

/// Error type for invalid operations.
///
/// All fatal failures carry the offending names, counts or positions so the
/// caller never has to re-derive "what" from "which check failed".
/// Non-fatal findings (NaN/Inf/negative values, state dimensionality) are
/// logged and returned as plain data, never as an error.
#[derive(Error, Debug)]
pub enum KernelError {
    #[error("{0}")]
    Error(String),

    /// An array dimension disagrees with the component contract.
    #[error("Shape mismatch in {context}: expected {expected}, got {actual}. {hint}")]
    ShapeMismatch {
        context: String,
        expected: usize,
        actual: usize,
        hint: String,
    },

    /// A declared name is absent from a runtime bag.
    #[error("Missing {category}: {missing:?} (available: {available:?})")]
    MissingKey {
        category: String,
        missing: Vec<String>,
        available: Vec<String>,
    },

    /// An ordered component chain has an unsatisfied input dependency.
    #[error(
        "Component #{position} '{component}' has unsatisfied inputs {missing:?} \
         (available: {available:?})"
    )]
    ChainValidation {
        position: usize,
        component: String,
        missing: Vec<String>,
        available: Vec<String>,
    },

    /// A kernel spec is malformed; raised at compile time, never at call time.
    #[error("Structural error while building kernel: {details}")]
    StructuralBuild { details: String },

    /// A kernel referenced a variable that no binding or computation defined.
    #[error("Undefined variable '{name}' during kernel evaluation")]
    UndefinedVariable { name: String },

    /// A call expression resolved to neither a builtin nor a network slot.
    #[error("Unknown function '{name}': not a builtin and no network slot with that name")]
    UnknownFunction { name: String },
}

/// Convenience type for `Result<T, KernelError>`.
pub type KernelResult<T> = Result<T, KernelError>;
