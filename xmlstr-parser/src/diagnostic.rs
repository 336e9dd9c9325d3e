use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

use crate::report::{is_blank, newline_position_offset, position_at};

/// Stable diagnostic codes attached to parser failures.
pub mod codes {
    /// Malformed markup with no more specific code.
    pub const SYNTAX: u32 = 1;
    /// Document has no root element.
    pub const DOCUMENT_EMPTY: u32 = 4;
    /// Input ended before the document was complete.
    pub const DOCUMENT_END: u32 = 5;
    /// Reference to an entity that was never declared.
    pub const UNDECLARED_ENTITY: u32 = 26;
    /// Attribute value could not be read.
    pub const ATTRIBUTE_VALUE: u32 = 38;
    /// Same attribute given twice on one element.
    pub const ATTRIBUTE_REDEFINED: u32 = 42;
    /// Closing tag does not match the open element.
    pub const TAG_NAME_MISMATCH: u32 = 76;
    /// Entity expansion refers back to itself.
    pub const ENTITY_LOOP: u32 = 89;
    /// A DOCTYPE was found while DTDs are disabled.
    pub const DTD_FORBIDDEN: u32 = 94;
    /// Namespace declaration uses a relative URI.
    pub const NS_URI_RELATIVE: u32 = 100;
    /// Prefix used without a namespace declaration.
    pub const UNDEFINED_NAMESPACE: u32 = 201;
    /// The node-count safety limit was hit.
    pub const RESOURCE_LIMIT: u32 = 300;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Warning,
    Error,
    Fatal,
}

impl Severity {
    /// Map a numeric level (1 = warning, 2 = error, 3 = fatal).
    pub fn from_level(level: i64) -> Option<Self> {
        match level {
            1 => Some(Severity::Warning),
            2 => Some(Severity::Error),
            3 => Some(Severity::Fatal),
            _ => None,
        }
    }

    pub fn as_level(self) -> i64 {
        match self {
            Severity::Warning => 1,
            Severity::Error => 2,
            Severity::Fatal => 3,
        }
    }

    fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "warning" => Some(Severity::Warning),
            "error" => Some(Severity::Error),
            "fatal" => Some(Severity::Fatal),
            _ => None,
        }
    }

    /// The label used in rendered reports.
    pub fn label(self) -> &'static str {
        match self {
            Severity::Warning => "Warning",
            Severity::Error => "Error",
            Severity::Fatal => "Fatal Error",
        }
    }
}

/// A single parser diagnostic in its normalized shape.
///
/// Every field is optional: records coming from outside the parser are often
/// partial, and the report renderer has a fallback for each missing piece.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub level: Option<Severity>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub column: Option<i64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub file: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub line: Option<i64>,
}

impl Diagnostic {
    /// A diagnostic carrying only a message.
    pub fn from_message(message: impl Into<String>) -> Self {
        Self {
            message: Some(message.into()),
            ..Self::default()
        }
    }

    pub fn is_warning(&self) -> bool {
        self.level == Some(Severity::Warning)
    }

    /// Map a loosely typed record onto the known diagnostic keys.
    ///
    /// Returns `None` when no known key is present. A known key whose value
    /// cannot be represented still counts as a match and leaves the field unset.
    fn from_record(record: &Map<String, Value>) -> Option<Self> {
        let mut diagnostic = Diagnostic::default();
        let mut matched = false;

        for (key, value) in record {
            match key.as_str() {
                "level" => diagnostic.level = level_from_value(value),
                "code" => diagnostic.code = scalar_to_string(value),
                "column" => diagnostic.column = integer_from_value(value),
                "message" => diagnostic.message = scalar_to_string(value),
                "file" => diagnostic.file = value.as_str().map(str::to_string),
                "line" => diagnostic.line = integer_from_value(value),
                _ => continue,
            }
            matched = true;
        }

        matched.then_some(diagnostic)
    }
}

fn level_from_value(value: &Value) -> Option<Severity> {
    if let Some(level) = integer_from_value(value) {
        return Severity::from_level(level);
    }
    value.as_str().and_then(Severity::from_name)
}

/// Integers, integral floats, and strings holding either.
fn integer_from_value(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => n.as_i64().or_else(|| n.as_f64().and_then(integral)),
        Value::String(s) => {
            let s = s.trim();
            s.parse::<i64>()
                .ok()
                .or_else(|| s.parse::<f64>().ok().and_then(integral))
        }
        _ => None,
    }
}

fn integral(f: f64) -> Option<i64> {
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then(|| f as i64)
}

fn scalar_to_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

/// A diagnostic record as handed to [`crate::ParseError::new`], before normalization.
#[derive(Debug, Clone, PartialEq)]
pub enum RawDiagnostic {
    Diagnostic(Diagnostic),
    Value(Value),
}

impl RawDiagnostic {
    /// Use the `Display` output of any value as a message-only record.
    pub fn from_display(value: &impl fmt::Display) -> Self {
        RawDiagnostic::Value(Value::String(value.to_string()))
    }

    /// Normalize into a [`Diagnostic`], or `None` if nothing usable is left.
    ///
    /// Objects are mapped field by field; strings and numbers fall back to a
    /// message, provided the text is not blank.
    pub fn normalize(self) -> Option<Diagnostic> {
        let value = match self {
            RawDiagnostic::Diagnostic(diagnostic) => return Some(diagnostic),
            RawDiagnostic::Value(value) => value,
        };

        if let Value::Object(record) = &value {
            if let Some(diagnostic) = Diagnostic::from_record(record) {
                return Some(diagnostic);
            }
        }

        let message = match value {
            Value::String(s) => s,
            Value::Number(n) => n.to_string(),
            _ => return None,
        };

        if is_blank(&message) {
            return None;
        }

        Some(Diagnostic::from_message(message))
    }
}

impl From<Diagnostic> for RawDiagnostic {
    fn from(diagnostic: Diagnostic) -> Self {
        RawDiagnostic::Diagnostic(diagnostic)
    }
}

impl From<Value> for RawDiagnostic {
    fn from(value: Value) -> Self {
        RawDiagnostic::Value(value)
    }
}

impl From<&str> for RawDiagnostic {
    fn from(message: &str) -> Self {
        RawDiagnostic::Value(Value::from(message))
    }
}

impl From<String> for RawDiagnostic {
    fn from(message: String) -> Self {
        RawDiagnostic::Value(Value::from(message))
    }
}

impl From<i64> for RawDiagnostic {
    fn from(n: i64) -> Self {
        RawDiagnostic::Value(Value::from(n))
    }
}

impl From<f64> for RawDiagnostic {
    fn from(n: f64) -> Self {
        // non-finite floats become null and normalize to nothing
        RawDiagnostic::Value(Value::from(n))
    }
}

impl From<&roxmltree::Error> for Diagnostic {
    fn from(err: &roxmltree::Error) -> Self {
        let pos = err.pos();
        let text = err.to_string();
        let suffix = format!(" at {}:{}", pos.row, pos.col);
        let message = text.strip_suffix(&suffix).unwrap_or(&text).to_string();

        Diagnostic {
            level: Some(Severity::Fatal),
            code: Some(error_code(err).to_string()),
            column: Some(i64::from(pos.col)),
            message: Some(message),
            file: None,
            line: Some(i64::from(pos.row)),
        }
    }
}

impl Diagnostic {
    /// Convert a parser error, locating it in `source` with the same line
    /// breaks the report uses.
    ///
    /// The parser itself only counts `\n`, so a document broken with `\r`
    /// or other breaks would otherwise be annotated on the wrong line.
    pub fn from_parse_error(err: &roxmltree::Error, source: &str) -> Self {
        let pos = err.pos();
        let offset = newline_position_offset(source, pos.row, pos.col);
        let (line, column) = position_at(source, offset);

        Diagnostic {
            line: Some(line),
            column: Some(column),
            ..Diagnostic::from(err)
        }
    }
}

impl From<roxmltree::Error> for RawDiagnostic {
    fn from(err: roxmltree::Error) -> Self {
        RawDiagnostic::Diagnostic(Diagnostic::from(&err))
    }
}

fn error_code(err: &roxmltree::Error) -> u32 {
    use roxmltree::Error as E;

    match err {
        E::NoRootNode => codes::DOCUMENT_EMPTY,
        E::UnexpectedEndOfStream => codes::DOCUMENT_END,
        E::UnknownEntityReference(..) => codes::UNDECLARED_ENTITY,
        E::InvalidAttributeValue(..) => codes::ATTRIBUTE_VALUE,
        E::DuplicatedAttribute(..) => codes::ATTRIBUTE_REDEFINED,
        E::UnexpectedCloseTag(..) => codes::TAG_NAME_MISMATCH,
        E::EntityReferenceLoop(..) => codes::ENTITY_LOOP,
        E::DtdDetected => codes::DTD_FORBIDDEN,
        E::UnknownNamespace(..) => codes::UNDEFINED_NAMESPACE,
        E::NodesLimitReached => codes::RESOURCE_LIMIT,
        _ => codes::SYNTAX,
    }
}
