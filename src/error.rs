//! Purpose: Crate-wide error type shared by the parser, writer, and binder.
//! Exports: `Error`, `ErrorKind`.
//! Role: Single error currency so every failure path reports position and kind uniformly.
//! Invariants: Kinds map one-to-one onto the failure categories callers can dispatch on.
//! Invariants: Position is a character offset when known, absent otherwise.

use std::error::Error as StdError;
use std::fmt;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum ErrorKind {
    /// Malformed JSON text (missing or unexpected character, bad escape, early end).
    Syntax,
    /// A target instance could not be created.
    Instantiation,
    /// A value could not be converted to the requested type.
    Conversion,
    /// A reference cycle was detected during serialization.
    Cycle,
    /// A collection element did not fit the element type (e.g. null into a number slot).
    ElementType,
    /// The collected-error budget was exhausted.
    ErrorBudget,
    /// Invalid registration or configuration (e.g. duplicate wire names).
    Config,
}

#[derive(Debug)]
pub struct Error {
    kind: ErrorKind,
    message: Option<String>,
    position: Option<u64>,
    type_name: Option<String>,
    source: Option<Box<dyn StdError + Send + Sync>>,
}

impl Error {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            message: None,
            position: None,
            type_name: None,
            source: None,
        }
    }

    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    pub fn position(&self) -> Option<u64> {
        self.position
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }

    pub fn with_position(mut self, position: u64) -> Self {
        self.position = Some(position);
        self
    }

    pub fn with_type_name(mut self, type_name: impl Into<String>) -> Self {
        self.type_name = Some(type_name.into());
        self
    }

    pub fn with_source(mut self, source: impl StdError + Send + Sync + 'static) -> Self {
        self.source = Some(Box::new(source));
        self
    }
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self.kind)?;
        if let Some(message) = &self.message {
            write!(f, ": {message}")?;
        }
        if let Some(position) = self.position {
            write!(f, " (position: {position})")?;
        }
        if let Some(type_name) = &self.type_name {
            write!(f, " (type: {type_name})")?;
        }
        Ok(())
    }
}

impl StdError for Error {
    fn source(&self) -> Option<&(dyn StdError + 'static)> {
        self.source
            .as_ref()
            .map(|source| source.as_ref() as &(dyn StdError + 'static))
    }
}
