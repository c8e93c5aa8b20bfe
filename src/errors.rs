//! Transformer Error Handling
//!
//! A closed set of error kinds plus an explicit context chain. Every hard failure raised by an
//! `Op`, a `Mapping` or a pipeline stage is a [`TransformError`]; "no match" is never an error.

use miette::Diagnostic;
use std::fmt;
use thiserror::Error;

// ============================================================================
// ERROR KINDS
// ============================================================================

/// Everything that can go wrong while checking, constructing or assembling a pipeline.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ErrorKind {
    #[error("variable {name:?} redeclared ({previous} vs {current})")]
    VariableRedeclared {
        name: String,
        previous: String,
        current: String,
    },
    #[error("variable {name:?} is not defined")]
    VariableNotDefined { name: String },
    #[error("expected object, got {found}")]
    ExpectedObject { found: String },
    #[error("expected list, got {found}")]
    ExpectedList { found: String },
    #[error("expected value, got {found}")]
    ExpectedValue { found: String },
    #[error("unhandled value: {value} in {context}")]
    UnhandledValueIn { value: String, context: String },
    #[error("expected node to be nil, got: {found}")]
    UnexpectedNode { found: String },
    #[error("unexpected value: {value}")]
    UnexpectedValue { value: String },
    #[error("unexpected type: {found}")]
    UnexpectedType { found: String },
    #[error("map has ambiguous value {value} for key {key:?}")]
    AmbiguousValue { key: String, value: String },
    #[error("mapping should contain multiple steps, got {steps}")]
    FewSteps { steps: usize },
    #[error("field was not used: {key}")]
    UnusedField { key: String },
    #[error("duplicate field: {key}")]
    DuplicateField { key: String },
    #[error("internal error: {message}")]
    Internal { message: String },

    // Outer layers: driver configuration, files and serialization
    #[error("invalid driver configuration: {message}")]
    Config { message: String },
    #[error("i/o error: {message}")]
    Io { message: String },
    #[error("serialization error: {message}")]
    Serialization { message: String },
}

impl ErrorKind {
    /// Get error code suffix for diagnostic codes
    pub const fn code_suffix(&self) -> &'static str {
        match self {
            Self::VariableRedeclared { .. } => "variable_redeclared",
            Self::VariableNotDefined { .. } => "variable_not_defined",
            Self::ExpectedObject { .. } => "expected_object",
            Self::ExpectedList { .. } => "expected_list",
            Self::ExpectedValue { .. } => "expected_value",
            Self::UnhandledValueIn { .. } => "unhandled_value",
            Self::UnexpectedNode { .. } => "unexpected_node",
            Self::UnexpectedValue { .. } => "unexpected_value",
            Self::UnexpectedType { .. } => "unexpected_type",
            Self::AmbiguousValue { .. } => "ambiguous_value",
            Self::FewSteps { .. } => "few_steps",
            Self::UnusedField { .. } => "unused_field",
            Self::DuplicateField { .. } => "duplicate_field",
            Self::Internal { .. } => "internal",
            Self::Config { .. } => "config",
            Self::Io { .. } => "io",
            Self::Serialization { .. } => "serialization",
        }
    }
}

// ============================================================================
// CONTEXT FRAMES
// ============================================================================

/// One level of positional context attached while an error propagates outward.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ErrorFrame {
    /// Operand of a sequence op.
    Operand { index: usize, op: &'static str },
    /// Field of an object op.
    Key(String),
    /// Element of an array op.
    Elem { index: usize, op: &'static str },
    Append,
    Mapping(String),
    Stage { index: usize, name: String },
    Check,
    Construct,
}

impl fmt::Display for ErrorFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorFrame::Operand { index, op } => write!(f, "op {} ({})", index, op),
            ErrorFrame::Key(key) => write!(f, "key {:?}", key),
            ErrorFrame::Elem { index, op } => write!(f, "elem {} ({})", index, op),
            ErrorFrame::Append => write!(f, "append"),
            ErrorFrame::Mapping(name) => write!(f, "mapping {:?}", name),
            ErrorFrame::Stage { index, name } => write!(f, "stage {} ({})", index, name),
            ErrorFrame::Check => write!(f, "check"),
            ErrorFrame::Construct => write!(f, "construct"),
        }
    }
}

// ============================================================================
// TRANSFORM ERROR
// ============================================================================

/// The single error type of the crate: a kind and the frames it crossed on its way out.
#[derive(Debug, Clone, PartialEq)]
pub struct TransformError {
    kind: ErrorKind,
    /// Innermost frame first.
    context: Vec<ErrorFrame>,
}

pub type Result<T, E = TransformError> = std::result::Result<T, E>;

impl TransformError {
    pub fn new(kind: ErrorKind) -> Self {
        Self {
            kind,
            context: Vec::new(),
        }
    }

    /// Creates an internal error. These indicate a broken invariant, not a bad rule or tree.
    pub fn internal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal {
            message: message.into(),
        })
    }

    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config {
            message: message.into(),
        })
    }

    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    /// Attaches an outer frame.
    pub fn within(mut self, frame: ErrorFrame) -> Self {
        self.context.push(frame);
        self
    }

    /// Context frames, outermost first.
    pub fn frames(&self) -> impl Iterator<Item = &ErrorFrame> {
        self.context.iter().rev()
    }
}

impl fmt::Display for TransformError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for frame in self.frames() {
            write!(f, "{}: ", frame)?;
        }
        write!(f, "{}", self.kind)
    }
}

impl std::error::Error for TransformError {}

impl Diagnostic for TransformError {
    fn code<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        Some(Box::new(format!("uast::{}", self.kind.code_suffix())))
    }

    fn help<'a>(&'a self) -> Option<Box<dyn fmt::Display + 'a>> {
        let help = match self.kind {
            ErrorKind::Internal { .. } => {
                "This is an internal engine error. Please report this as a bug."
            }
            ErrorKind::UnusedField { .. } => {
                "Reference the field in the rule, or wrap the object pattern in Part to keep extra fields."
            }
            ErrorKind::FewSteps { .. } => "A mapping needs at least a matcher and a constructor step.",
            _ => return None,
        };
        Some(Box::new(help))
    }
}

impl From<ErrorKind> for TransformError {
    fn from(kind: ErrorKind) -> Self {
        Self::new(kind)
    }
}

impl From<std::io::Error> for TransformError {
    fn from(err: std::io::Error) -> Self {
        Self::new(ErrorKind::Io {
            message: err.to_string(),
        })
    }
}

impl From<serde_json::Error> for TransformError {
    fn from(err: serde_json::Error) -> Self {
        Self::new(ErrorKind::Serialization {
            message: err.to_string(),
        })
    }
}

impl From<serde_yaml::Error> for TransformError {
    fn from(err: serde_yaml::Error) -> Self {
        Self::new(ErrorKind::Serialization {
            message: err.to_string(),
        })
    }
}

/// Attaches context frames to fallible results as they propagate outward.
pub trait ResultExt<T> {
    fn within(self, frame: ErrorFrame) -> Result<T>;

    fn at_key(self, key: &str) -> Result<T>
    where
        Self: Sized,
    {
        self.within(ErrorFrame::Key(key.to_string()))
    }
}

impl<T> ResultExt<T> for Result<T> {
    fn within(self, frame: ErrorFrame) -> Result<T> {
        self.map_err(|e| e.within(frame))
    }
}
