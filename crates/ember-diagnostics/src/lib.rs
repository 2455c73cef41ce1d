//! Ember diagnostics.
//!
//! Every pipeline stage (lexer, parser, evaluator) reports problems into a
//! shared [`Diagnostics`] sink instead of failing fast; the front end drains
//! and prints the sink between stages.

use std::cell::RefCell;
use std::fmt;
use std::rc::Rc;

/// Source position, 1-indexed. The column resets on every newline.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct Position {
    pub row: u32,
    pub col: u32,
}

impl Position {
    pub fn new(row: u32, col: u32) -> Self {
        Self { row, col }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Severity {
    Parse,
    Runtime,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Severity::Parse => write!(f, "Parse Error"),
            Severity::Runtime => write!(f, "Runtime Error"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Diagnostic {
    pub severity: Severity,
    pub position: Position,
    pub message: String,
}

impl Diagnostic {
    pub fn new(severity: Severity, position: Position, message: impl Into<String>) -> Self {
        Self {
            severity,
            position,
            message: message.into(),
        }
    }

    pub fn parse(position: Position, message: impl Into<String>) -> Self {
        Self::new(Severity::Parse, position, message)
    }

    pub fn runtime(position: Position, message: impl Into<String>) -> Self {
        Self::new(Severity::Runtime, position, message)
    }
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} [Line {}:{}]: {}",
            self.severity, self.position.row, self.position.col, self.message
        )
    }
}

/// Append-only diagnostic sink shared by every stage of one interpreter run.
///
/// Cloning is cheap and every clone views the same list.
#[derive(Clone, Debug, Default)]
pub struct Diagnostics {
    list: Rc<RefCell<Vec<Diagnostic>>>,
}

impl Diagnostics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn report(&self, diagnostic: Diagnostic) {
        self.list.borrow_mut().push(diagnostic);
    }

    pub fn parse_error(&self, position: Position, message: impl Into<String>) {
        self.report(Diagnostic::parse(position, message));
    }

    pub fn runtime_error(&self, position: Position, message: impl Into<String>) {
        self.report(Diagnostic::runtime(position, message));
    }

    pub fn has_errors(&self) -> bool {
        !self.list.borrow().is_empty()
    }

    pub fn len(&self) -> usize {
        self.list.borrow().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list.borrow().is_empty()
    }

    /// Drain all pending diagnostics, leaving the sink empty.
    pub fn take(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.list.borrow_mut())
    }

    pub fn clear(&self) {
        self.list.borrow_mut().clear();
    }
}
