use std::fmt;

use thiserror::Error;

/// 1-indexed source position. Column resets after every newline.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Position {
    pub line: u32,
    pub column: u32,
}

impl Position {
    pub fn new(line: u32, column: u32) -> Self {
        Self { line, column }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "[{}, {}]", self.line, self.column)
    }
}

/// Compile-time diagnostic kinds emitted by the lexer, parser, and type
/// checker. The display text is the canonical message surfaced to users.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum DiagnosticKind {
    #[error("Invalid symbol")]
    InvalidSymbol,
    #[error("Missing comment close")]
    MissingCommentClose,
    #[error("Max string length exceeded")]
    MaxStringLengthExceeded,
    #[error("Max identifier length exceeded")]
    MaxIdentifierLengthExceeded,
    #[error("Max comment length exceeded")]
    MaxCommentLengthExceeded,
    #[error("Invalid value")]
    InvalidValue,
    #[error("Unexpected token")]
    UnexpectedToken,
    #[error("Missing parentheses")]
    MissingParentheses,
    #[error("Invalid declaration")]
    InvalidDeclaration,
    #[error("Invalid condition")]
    InvalidCondition,
    #[error("Invalid type")]
    InvalidType,
    #[error("Invalid argument type")]
    InvalidArgumentType,
    #[error("Function/Method redeclaration")]
    FunctionRedeclaration,
    #[error("Undeclared variable")]
    UndeclaredVariable,
}

/// A positioned diagnostic. Recoverable stage errors accumulate into a
/// list; any non-empty list stops the pipeline after the current stage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Diagnostic {
    pub kind: DiagnosticKind,
    pub position: Position,
}

impl Diagnostic {
    pub fn new(kind: DiagnosticKind, position: Position) -> Self {
        Self { kind, position }
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {}", self.position, self.kind)
    }
}

/// Runtime fault kinds. The interpreter is fail-fast: the first fault
/// unwinds every scope and call context and terminates the run.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum FaultKind {
    #[error("Undeclared variable")]
    UndeclaredVariable,
    #[error("Type conversion exception")]
    TypeConversion,
    #[error("File not found")]
    FileNotFound,
    #[error("List index out of bounds")]
    ListIndexOutOfBounds,
    #[error("Division by zero")]
    DivisionByZero,
    #[error("Call stack limit exceeded")]
    CallStackLimitExceeded,
    #[error("Invalid condition")]
    InvalidCondition,
    #[error("Invalid value")]
    InvalidValue,
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
#[error("{position} {kind}")]
pub struct Fault {
    pub kind: FaultKind,
    pub position: Position,
}

impl Fault {
    pub fn new(kind: FaultKind, position: Position) -> Self {
        Self { kind, position }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_diagnostic_with_position() {
        let diagnostic = Diagnostic::new(DiagnosticKind::InvalidType, Position::new(1, 9));
        assert_eq!(diagnostic.to_string(), "[1, 9] Invalid type");
    }

    #[test]
    fn formats_fault_with_position() {
        let fault = Fault::new(FaultKind::DivisionByZero, Position::new(3, 12));
        assert_eq!(fault.to_string(), "[3, 12] Division by zero");
    }
}
