use thiserror::Error;

use crate::diagnostic::{Diagnostic, RawDiagnostic};

pub type XmlStrResult<T> = Result<T, XmlStrError>;

type BoxedSource = Box<dyn std::error::Error + Send + Sync + 'static>;

#[derive(Error, Debug)]
pub enum XmlStrError {
    #[error("Invalid argument: {0}")]
    InvalidArgument(String),

    #[error(transparent)]
    Parse(#[from] ParseError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl From<serde_yaml::Error> for XmlStrError {
    fn from(err: serde_yaml::Error) -> Self {
        XmlStrError::Config(err.to_string())
    }
}

/// A failed parse, carrying every diagnostic the parser reported.
///
/// The display message is the full human-readable report built by
/// [`crate::report::failure_message`] when raised by the parser, so printing
/// the error is usually all a caller needs to do.
#[derive(Error, Debug)]
#[error("{message}")]
pub struct ParseError {
    message: String,
    code: i64,
    errors: Vec<Diagnostic>,
    #[source]
    source: Option<BoxedSource>,
}

impl ParseError {
    /// Build an error from heterogeneous diagnostic records.
    ///
    /// Each record is normalized through [`RawDiagnostic::normalize`]; records
    /// that normalize to nothing are dropped and the order of the rest is kept.
    pub fn new<I, R>(errors: I, message: impl Into<String>) -> Self
    where
        I: IntoIterator<Item = R>,
        R: Into<RawDiagnostic>,
    {
        let errors = errors
            .into_iter()
            .filter_map(|raw| raw.into().normalize())
            .collect();

        Self {
            message: message.into(),
            code: 0,
            errors,
            source: None,
        }
    }

    pub fn with_code(mut self, code: i64) -> Self {
        self.code = code;
        self
    }

    pub fn with_source<S>(mut self, source: S) -> Self
    where
        S: Into<BoxedSource>,
    {
        self.source = Some(source.into());
        self
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn code(&self) -> i64 {
        self.code
    }

    /// The normalized diagnostics, in the order they were reported.
    pub fn errors(&self) -> &[Diagnostic] {
        &self.errors
    }

    pub fn into_errors(self) -> Vec<Diagnostic> {
        self.errors
    }
}
