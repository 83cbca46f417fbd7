//! Error types for the assembly parser.

use qforge_ir::IrError;
use thiserror::Error;

/// Errors that can occur during parsing.
#[derive(Debug, Error)]
#[non_exhaustive]
pub enum ParseError {
    /// Lexer error (invalid token).
    #[error("Lexer error at line {line}: {message}")]
    LexerError { line: usize, message: String },

    /// Unexpected token.
    #[error("Unexpected token at line {line}: expected {expected}, found {found}")]
    UnexpectedToken {
        line: usize,
        expected: String,
        found: String,
    },

    /// Unexpected end of input.
    #[error("Unexpected end of input: {0}")]
    UnexpectedEof(String),

    /// Invalid version.
    #[error("Invalid OPENQASM version: {0}")]
    InvalidVersion(String),

    /// Reference to a register that was never declared.
    #[error("Undefined register at line {line}: {name}")]
    UndefinedRegister { line: usize, name: String },

    /// Duplicate declaration.
    #[error("Duplicate declaration: {0}")]
    DuplicateDeclaration(String),

    /// No qubit register was declared before the first operation.
    #[error("No qubit register declared")]
    NoQubits,

    /// Index out of bounds.
    #[error("Index {index} out of bounds for register '{register}' of size {size}")]
    IndexOutOfBounds {
        register: String,
        index: u64,
        size: u32,
    },

    /// Register broadcast that cannot be expanded.
    #[error("Unsupported register broadcast at line {line}: {message}")]
    UnsupportedBroadcast { line: usize, message: String },

    /// IR error during circuit construction.
    #[error("Circuit error: {0}")]
    CircuitError(#[from] IrError),
}

/// Result type for parsing operations.
pub type ParseResult<T> = Result<T, ParseError>;
