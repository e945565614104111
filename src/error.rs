//! Error types for the ion script compiler and validator

use std::path::PathBuf;
use thiserror::Error;

/// Everything that can go wrong between source text and a finished tree.
///
/// Messages live on the kind alone; file and line are carried separately so
/// callers can format diagnostics however they like.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum CompileErrorKind {
    // File errors
    #[error("circular import")]
    CircularImport,
    #[error("missing import file")]
    MissingImportFile,

    // Lexical errors
    #[error("unknown symbol")]
    UnknownSymbol,

    // Syntactic errors
    #[error("unexpected function")]
    UnexpectedFunction,
    #[error("unexpected identifier")]
    UnexpectedIdentifier,
    #[error("unexpected literal")]
    UnexpectedLiteral,
    #[error("unexpected operator")]
    UnexpectedOperator,
    #[error("unexpected rule")]
    UnexpectedRule,
    #[error("unexpected separator")]
    UnexpectedSeparator,
    #[error("unexpected unit")]
    UnexpectedUnit,
    #[error("missing separator")]
    MissingSeparator,
    #[error("invalid function arguments")]
    InvalidFunctionArguments,
}

/// A compile failure, pinned to the file and line that produced it.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} in {} at line {line}", file.display())]
pub struct CompileError {
    pub kind: CompileErrorKind,
    pub file: PathBuf,
    pub line: usize,
}

impl CompileError {
    pub fn new(kind: CompileErrorKind, file: impl Into<PathBuf>, line: usize) -> Self {
        Self {
            kind,
            file: file.into(),
            line,
        }
    }

    /// Attach a file path to an error raised before the path was known,
    /// e.g. inside an import worker.
    pub fn with_file(mut self, file: impl Into<PathBuf>) -> Self {
        self.file = file.into();
        self
    }
}

/// Schema violations found while validating a tree.
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum ValidateErrorKind {
    #[error("abstract class instantiated")]
    AbstractClassInstantiated,
    #[error("ambiguous class")]
    AmbiguousClass,
    #[error("missing required class")]
    MissingRequiredClass,
    #[error("missing required property")]
    MissingRequiredProperty,
    #[error("unexpected class")]
    UnexpectedClass,
    #[error("unexpected property")]
    UnexpectedProperty,
    #[error("invalid property arguments")]
    InvalidPropertyArguments,
}

/// A single validation failure, attributed to a dotted object path.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("{kind} at {fully_qualified_name}")]
pub struct ValidateError {
    pub kind: ValidateErrorKind,
    pub fully_qualified_name: String,
}

impl ValidateError {
    pub fn new(kind: ValidateErrorKind, fully_qualified_name: impl Into<String>) -> Self {
        Self {
            kind,
            fully_qualified_name: fully_qualified_name.into(),
        }
    }
}

pub type Result<T> = std::result::Result<T, CompileError>;
