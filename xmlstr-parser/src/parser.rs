use regex::Regex;
use roxmltree::{Document, ParsingOptions};
use std::collections::HashSet;
use std::fmt;
use std::marker::PhantomData;
use std::sync::OnceLock;
use tracing::{debug, trace};

use crate::config::ParserConfig;
use crate::diagnostic::{codes, Diagnostic, Severity};
use crate::element::{build_element, Element, FromElement, NamespaceFocus};
use crate::error::{ParseError, XmlStrError, XmlStrResult};
use crate::options::ParseOptions;
use crate::report::{failure_message, position_at};

/// A configured parser that turns XML strings into a structured tree.
///
/// Implementations may be called repeatedly; diagnostics never carry over
/// from one call to the next.
pub trait ParseXmlString {
    type Output;

    /// Parse `data`, failing with every diagnostic the parser reported.
    fn parse_xml_string(&self, data: &str) -> Result<Self::Output, ParseError>;
}

/// Reusable parser configuration.
///
/// `E` is the element type produced by a successful parse. It defaults to
/// [`Element`]; any [`FromElement`] type can be used instead.
pub struct XmlStringParser<E = Element> {
    options: ParseOptions,
    namespace: String,
    is_prefix: bool,
    disable_entity_loader: Option<bool>,
    element: PhantomData<fn() -> E>,
}

impl XmlStringParser {
    /// A parser with default settings producing [`Element`] trees.
    pub fn new() -> Self {
        Self::with_element()
    }
}

impl Default for XmlStringParser {
    fn default() -> Self {
        Self::new()
    }
}

impl<E> XmlStringParser<E> {
    /// A parser with default settings producing `E`.
    pub fn with_element() -> Self {
        Self {
            options: ParseOptions::empty(),
            namespace: String::new(),
            is_prefix: false,
            disable_entity_loader: None,
            element: PhantomData,
        }
    }

    /// Build a parser from a loaded configuration.
    pub fn from_config(config: &ParserConfig) -> XmlStrResult<Self> {
        let mut parser = Self::with_element();
        parser
            .set_options(ParseOptions::from_names(&config.options)?)
            .set_disable_entity_loader(config.disable_entity_loader)
            .set_namespace(config.namespace.clone())?
            .set_prefix(config.is_prefix)?;
        Ok(parser)
    }

    /// Keep the settings but produce a different element type.
    pub fn into_element<F>(self) -> XmlStringParser<F> {
        XmlStringParser {
            options: self.options,
            namespace: self.namespace,
            is_prefix: self.is_prefix,
            disable_entity_loader: self.disable_entity_loader,
            element: PhantomData,
        }
    }

    pub fn options(&self) -> ParseOptions {
        self.options
    }

    pub fn set_options(&mut self, options: ParseOptions) -> &mut Self {
        self.options = options;
        self
    }

    /// Set options from a raw option word, rejecting unknown bits.
    pub fn set_options_bits(&mut self, bits: u32) -> XmlStrResult<&mut Self> {
        self.options = ParseOptions::from_bits_checked(bits)?;
        Ok(self)
    }

    pub fn namespace(&self) -> &str {
        &self.namespace
    }

    /// Restrict child elements and attributes to a namespace.
    ///
    /// The value is a URI, or a prefix when [`is_prefix`](Self::is_prefix)
    /// is set. An empty value removes the restriction.
    pub fn set_namespace(&mut self, namespace: impl Into<String>) -> XmlStrResult<&mut Self> {
        let namespace = namespace.into();
        validate_namespace(&namespace, self.is_prefix)?;
        self.namespace = namespace;
        Ok(self)
    }

    pub fn is_prefix(&self) -> bool {
        self.is_prefix
    }

    pub fn set_prefix(&mut self, is_prefix: bool) -> XmlStrResult<&mut Self> {
        validate_namespace(&self.namespace, is_prefix)?;
        self.is_prefix = is_prefix;
        Ok(self)
    }

    pub fn disable_entity_loader(&self) -> Option<bool> {
        self.disable_entity_loader
    }

    /// `Some(true)` rejects any DTD, `Some(false)` accepts one, and `None`
    /// defers to [`ParseOptions::ALLOW_DTD`].
    pub fn set_disable_entity_loader(&mut self, disable: Option<bool>) -> &mut Self {
        self.disable_entity_loader = disable;
        self
    }

    fn allows_dtd(&self) -> bool {
        match self.disable_entity_loader {
            Some(disable) => !disable,
            None => self.options.contains(ParseOptions::ALLOW_DTD),
        }
    }
}

impl<E: FromElement> XmlStringParser<E> {
    /// Parse raw bytes, which must be valid UTF-8.
    pub fn parse_xml_bytes(&self, data: &[u8]) -> XmlStrResult<E> {
        let data = std::str::from_utf8(data).map_err(|e| {
            XmlStrError::InvalidArgument(format!("data must be valid UTF-8: {}", e))
        })?;
        Ok(self.parse_xml_string(data)?)
    }
}

impl<E: FromElement> ParseXmlString for XmlStringParser<E> {
    type Output = E;

    fn parse_xml_string(&self, data: &str) -> Result<E, ParseError> {
        debug!(
            len = data.len(),
            options = ?self.options,
            namespace = %self.namespace,
            "parsing xml string"
        );

        let mut parsing = ParsingOptions::default();
        parsing.allow_dtd = self.allows_dtd();
        parsing.nodes_limit = self.options.nodes_limit();

        let (document, mut diagnostics) = match Document::parse_with_options(data, parsing) {
            Ok(document) => {
                let warnings = if self.options.contains(ParseOptions::NO_WARNING) {
                    Vec::new()
                } else {
                    namespace_warnings(&document, data)
                };
                (Some(document), warnings)
            }
            Err(err) => (None, vec![Diagnostic::from_parse_error(&err, data)]),
        };

        if self.options.contains(ParseOptions::NO_ERROR) {
            diagnostics.retain(Diagnostic::is_warning);
        }

        for diagnostic in &diagnostics {
            trace!(?diagnostic, "parser diagnostic");
        }

        match document {
            Some(document) if diagnostics.is_empty() => {
                let root = document.root_element();
                let focus = NamespaceFocus::resolve(root, &self.namespace, self.is_prefix);
                let element = build_element(root, &focus, self.options);
                debug!(root = %element.name, "parsed xml string");
                Ok(E::from_element(element))
            }
            _ => {
                debug!(diagnostics = diagnostics.len(), "xml string failed to parse");
                let message = failure_message(data, &diagnostics);
                Err(ParseError::new(diagnostics, message))
            }
        }
    }
}

impl<E> Clone for XmlStringParser<E> {
    fn clone(&self) -> Self {
        Self {
            options: self.options,
            namespace: self.namespace.clone(),
            is_prefix: self.is_prefix,
            disable_entity_loader: self.disable_entity_loader,
            element: PhantomData,
        }
    }
}

impl<E> fmt::Debug for XmlStringParser<E> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("XmlStringParser")
            .field("element", &std::any::type_name::<E>())
            .field("options", &self.options)
            .field("namespace", &self.namespace)
            .field("is_prefix", &self.is_prefix)
            .field("disable_entity_loader", &self.disable_entity_loader)
            .finish()
    }
}

fn validate_namespace(namespace: &str, is_prefix: bool) -> XmlStrResult<()> {
    if namespace.chars().any(char::is_whitespace) {
        return Err(XmlStrError::InvalidArgument(format!(
            "namespace '{}' must not contain whitespace",
            namespace
        )));
    }

    if is_prefix && namespace.contains(':') {
        return Err(XmlStrError::InvalidArgument(format!(
            "namespace prefix '{}' must not contain ':'",
            namespace
        )));
    }

    Ok(())
}

// ─── Warnings ────────────────────────────────────────────────────────────────

fn is_absolute_uri(uri: &str) -> bool {
    static SCHEME_REGEX: OnceLock<Regex> = OnceLock::new();
    let re = SCHEME_REGEX.get_or_init(|| Regex::new(r"^[A-Za-z][A-Za-z0-9+.\-]*:").unwrap());
    re.is_match(uri)
}

/// One warning per namespace declaration whose URI has no scheme.
fn namespace_warnings(document: &Document<'_>, source: &str) -> Vec<Diagnostic> {
    let mut seen = HashSet::new();
    let mut warnings = Vec::new();

    for node in document.descendants().filter(|n| n.is_element()) {
        for ns in node.namespaces() {
            let uri = ns.uri();
            if uri.is_empty() || is_absolute_uri(uri) || !seen.insert((ns.name(), uri)) {
                continue;
            }

            let message = match ns.name() {
                Some(prefix) => format!("xmlns:{}: URI {} is not absolute", prefix, uri),
                None => format!("xmlns: URI {} is not absolute", uri),
            };
            let (line, column) = position_at(source, node.range().start);

            warnings.push(Diagnostic {
                level: Some(Severity::Warning),
                code: Some(codes::NS_URI_RELATIVE.to_string()),
                column: Some(column),
                message: Some(message),
                file: None,
                line: Some(line),
            });
        }
    }

    warnings
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::report::NO_ERRORS;

    const BAD_XML: &str = r#"<a bad-param=">ONE</a>"#;
    const DTD_XML: &str = r#"<!DOCTYPE a [<!ENTITY e "hello">]><a>&e;</a>"#;

    #[derive(Debug, PartialEq)]
    struct Outline {
        tag: String,
        children: Vec<Outline>,
    }

    impl FromElement for Outline {
        fn from_element(element: Element) -> Self {
            Outline {
                tag: element.name,
                children: element
                    .children
                    .into_iter()
                    .map(Outline::from_element)
                    .collect(),
            }
        }
    }

    #[test]
    fn test_parse_default_element() {
        let root = XmlStringParser::new()
            .parse_xml_string("<a><b></b><c></c></a>")
            .unwrap();

        assert_eq!(root.name(), "a");
        assert!(root.child("b").is_some());
        assert!(root.child("c").is_some());
    }

    #[test]
    fn test_parse_custom_element_type() {
        let parser: XmlStringParser<Outline> = XmlStringParser::with_element();
        let outline = parser.parse_xml_string("<a><b></b><c></c></a>").unwrap();

        assert_eq!(outline.tag, "a");
        let tags: Vec<_> = outline.children.iter().map(|c| c.tag.as_str()).collect();
        assert_eq!(tags, vec!["b", "c"]);
    }

    #[test]
    fn test_into_element_keeps_settings() {
        let mut parser = XmlStringParser::new();
        parser.set_options(ParseOptions::NO_BLANKS);
        parser.set_namespace("urn:x").unwrap();

        let parser = parser.into_element::<Outline>();
        assert_eq!(parser.options(), ParseOptions::NO_BLANKS);
        assert_eq!(parser.namespace(), "urn:x");
    }

    #[test]
    fn test_parse_error_message() {
        let err = XmlStringParser::new().parse_xml_string(BAD_XML).unwrap_err();

        let headline = format!(
            "unable to parse xml string like `{}`, internal error(s):\n\n",
            BAD_XML
        );
        assert!(err.message().starts_with(&headline), "got: {}", err.message());
        assert!(err.message().contains("Fatal Error ("));
        assert!(err.message().ends_with("--------------------------------------------"));

        assert_eq!(err.errors().len(), 1);
        let diagnostic = &err.errors()[0];
        assert_eq!(diagnostic.level, Some(Severity::Fatal));
        assert_eq!(diagnostic.line, Some(1));
    }

    #[test]
    fn test_parse_error_truncates_long_input() {
        let data = format!("<>{}-123456789abcdefghijklmnop", "-+".repeat(45));
        let err = XmlStringParser::new().parse_xml_string(&data).unwrap_err();

        let expected_start = format!(
            "unable to parse xml string like `<>{}-...efghijklmnop`, internal error(s):",
            "-+".repeat(31)
        );
        assert!(
            err.message().starts_with(&expected_start),
            "got: {}",
            err.message()
        );
    }

    #[test]
    fn test_dtd_rejected_by_default() {
        let err = XmlStringParser::new().parse_xml_string(DTD_XML).unwrap_err();
        assert_eq!(
            err.errors()[0].code,
            Some(codes::DTD_FORBIDDEN.to_string())
        );
    }

    #[test]
    fn test_dtd_allowed_by_option() {
        let mut parser = XmlStringParser::new();
        parser.set_options(ParseOptions::ALLOW_DTD);
        let root = parser.parse_xml_string(DTD_XML).unwrap();
        assert_eq!(root.text(), "hello");
    }

    #[test]
    fn test_entity_loader_setting_overrides_option() {
        let mut parser = XmlStringParser::new();
        parser
            .set_options(ParseOptions::ALLOW_DTD)
            .set_disable_entity_loader(Some(true));
        assert!(parser.parse_xml_string(DTD_XML).is_err());

        parser
            .set_options(ParseOptions::empty())
            .set_disable_entity_loader(Some(false));
        assert!(parser.parse_xml_string(DTD_XML).is_ok());
    }

    #[test]
    fn test_relative_namespace_warns() {
        let xml = "<a xmlns=\"local\">\n  <b xmlns:p=\"also-local\"/>\n</a>";
        let err = XmlStringParser::new().parse_xml_string(xml).unwrap_err();

        let messages: Vec<_> = err
            .errors()
            .iter()
            .map(|d| d.message.as_deref().unwrap_or_default())
            .collect();
        assert_eq!(
            messages,
            vec![
                "xmlns: URI local is not absolute",
                "xmlns:p: URI also-local is not absolute",
            ]
        );
        assert!(err.errors().iter().all(Diagnostic::is_warning));
        assert_eq!(err.errors()[1].line, Some(2));
        assert!(err.message().contains("Warning (100): xmlns: URI local is not absolute"));
    }

    #[test]
    fn test_report_points_at_line_after_carriage_returns() {
        let err = XmlStringParser::new()
            .parse_xml_string("<a>\r<b>\r</c>\r</a>")
            .unwrap_err();

        assert_eq!(err.errors()[0].line, Some(3));
        assert!(
            err.message().contains("\n\n</c>\n-^\nFatal Error (76): "),
            "got: {}",
            err.message()
        );
    }

    #[test]
    fn test_warning_located_after_carriage_return() {
        let err = XmlStringParser::new()
            .parse_xml_string("<a>\r  <b xmlns=\"local\"/>\r</a>")
            .unwrap_err();

        assert_eq!(err.errors()[0].line, Some(2));
        assert_eq!(err.errors()[0].column, Some(3));
    }

    #[test]
    fn test_no_warning_accepts_relative_namespace() {
        let mut parser = XmlStringParser::new();
        parser.set_options(ParseOptions::NO_WARNING);
        let root = parser.parse_xml_string(r#"<a xmlns="local"/>"#).unwrap();
        assert_eq!(root.namespace(), Some("local"));
    }

    #[test]
    fn test_no_error_still_fails_with_empty_report() {
        let mut parser = XmlStringParser::new();
        parser.set_options(ParseOptions::NO_ERROR);
        let err = parser.parse_xml_string(BAD_XML).unwrap_err();

        assert!(err.errors().is_empty());
        assert!(err.message().ends_with(NO_ERRORS), "got: {}", err.message());
    }

    #[test]
    fn test_repeated_parses_are_independent() {
        let parser = XmlStringParser::new();
        assert!(parser.parse_xml_string(BAD_XML).is_err());
        assert!(parser.parse_xml_string("<ok/>").is_ok());

        let err = parser.parse_xml_string("<a></b>").unwrap_err();
        assert_eq!(err.errors().len(), 1);
    }

    #[test]
    fn test_namespace_validation() {
        let mut parser = XmlStringParser::new();
        assert!(matches!(
            parser.set_namespace("urn:a b"),
            Err(XmlStrError::InvalidArgument(_))
        ));

        parser.set_namespace("urn:meta").unwrap();
        assert!(parser.set_prefix(true).is_err());
        assert!(!parser.is_prefix());

        parser.set_namespace("m").unwrap().set_prefix(true).unwrap();
        assert!(parser.set_namespace("m:x").is_err());
        assert_eq!(parser.namespace(), "m");
    }

    #[test]
    fn test_options_bits_validation() {
        let mut parser = XmlStringParser::new();
        parser.set_options_bits(1 << 8).unwrap();
        assert_eq!(parser.options(), ParseOptions::NO_BLANKS);
        assert!(parser.set_options_bits(1 << 30).is_err());
        assert_eq!(parser.options(), ParseOptions::NO_BLANKS);
    }

    #[test]
    fn test_parse_bytes() {
        let parser = XmlStringParser::new();
        assert_eq!(parser.parse_xml_bytes(b"<a/>").unwrap().name(), "a");
        assert!(matches!(
            parser.parse_xml_bytes(&[b'<', 0xff, b'/', b'>']),
            Err(XmlStrError::InvalidArgument(_))
        ));
        assert!(matches!(
            parser.parse_xml_bytes(b"<a>"),
            Err(XmlStrError::Parse(_))
        ));
    }
}
