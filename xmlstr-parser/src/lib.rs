//! # xmlstr parser
//!
//! A reusable, configurable XML string parser that reports failures as a
//! single descriptive error.
//!
//! ## Features
//! - One parser configuration, many parses: option flags, namespace focus,
//!   DTD / entity loader policy and the produced element type
//! - Every parser diagnostic kept and normalized (level, code, line, column, file)
//! - Console-printable failure reports with the offending source line and a
//!   caret under the column
//! - YAML parser configuration
//!
//! ## Example
//! ```ignore
//! use xmlstr_parser::{ParseXmlString, XmlStringParser, ParseOptions};
//!
//! let mut parser = XmlStringParser::new();
//! parser.set_options(ParseOptions::NO_BLANKS);
//!
//! match parser.parse_xml_string("<a bad-param=\">ONE</a>") {
//!     Ok(root) => println!("root element: {}", root.name()),
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

pub mod config;
pub mod diagnostic;
pub mod element;
pub mod error;
pub mod options;
pub mod parser;
pub mod report;

// --- Core types ---
pub use config::ParserConfig;
pub use diagnostic::{Diagnostic, RawDiagnostic, Severity};
pub use element::{Attribute, Element, FromElement};
pub use error::{ParseError, XmlStrError, XmlStrResult};
pub use options::ParseOptions;
pub use parser::{ParseXmlString, XmlStringParser};

// --- Report rendering ---
pub use report::{failure_message, render_diagnostic, render_diagnostics, summarize_source};

/// Parse an XML string with default settings.
pub fn parse_xml_string(xml: &str) -> Result<Element, ParseError> {
    XmlStringParser::new().parse_xml_string(xml)
}

/// Parse an XML string with settings loaded from a YAML configuration.
pub fn parse_xml_string_with_config(xml: &str, config: &ParserConfig) -> XmlStrResult<Element> {
    let parser: XmlStringParser = config.build()?;
    Ok(parser.parse_xml_string(xml)?)
}
