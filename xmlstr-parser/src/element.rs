use roxmltree::Node;
use serde::{Deserialize, Serialize};

use crate::options::ParseOptions;

/// An attribute of a parsed element.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Attribute {
    /// Local name, without prefix
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    pub value: String,
}

/// An owned XML element tree.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Element {
    /// Local name, without prefix
    pub name: String,
    /// Namespace URI, if the element is in one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub namespace: Option<String>,
    /// Prefix the element was written with
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<String>,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub attributes: Vec<Attribute>,
    /// Direct text content, concatenated in document order
    #[serde(skip_serializing_if = "String::is_empty", default)]
    pub text: String,
    #[serde(skip_serializing_if = "Vec::is_empty", default)]
    pub children: Vec<Element>,
}

impl Element {
    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn namespace(&self) -> Option<&str> {
        self.namespace.as_deref()
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    /// First child element with the given local name.
    pub fn child(&self, name: &str) -> Option<&Element> {
        self.children.iter().find(|c| c.name == name)
    }

    pub fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a Element> + 'a {
        self.children.iter().filter(move |c| c.name == name)
    }

    /// Value of the first attribute with the given local name.
    pub fn attribute(&self, name: &str) -> Option<&str> {
        self.attributes
            .iter()
            .find(|a| a.name == name)
            .map(|a| a.value.as_str())
    }

    /// This element and all elements below it, depth-first in document order.
    pub fn descendants(&self) -> Descendants<'_> {
        Descendants { stack: vec![self] }
    }
}

pub struct Descendants<'a> {
    stack: Vec<&'a Element>,
}

impl<'a> Iterator for Descendants<'a> {
    type Item = &'a Element;

    fn next(&mut self) -> Option<Self::Item> {
        let element = self.stack.pop()?;
        self.stack.extend(element.children.iter().rev());
        Some(element)
    }
}

/// A type the parser can produce from a parsed document.
///
/// The parser always builds an [`Element`] tree first and then hands the
/// root to `from_element`. Implement this to parse straight into a domain
/// type; every nested node can be converted the same way.
pub trait FromElement: Sized {
    fn from_element(element: Element) -> Self;
}

impl FromElement for Element {
    fn from_element(element: Element) -> Self {
        element
    }
}

// ─── Tree building ───────────────────────────────────────────────────────────

/// Which namespace child elements and attributes are restricted to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum NamespaceFocus {
    /// No restriction
    Any,
    Uri(String),
    /// A prefix that the document never declares; nothing matches
    Unresolved,
}

impl NamespaceFocus {
    pub(crate) fn resolve(root: Node<'_, '_>, namespace: &str, is_prefix: bool) -> Self {
        if namespace.is_empty() {
            return NamespaceFocus::Any;
        }

        if !is_prefix {
            return NamespaceFocus::Uri(namespace.to_string());
        }

        match root.lookup_namespace_uri(Some(namespace)) {
            Some(uri) => NamespaceFocus::Uri(uri.to_string()),
            None => NamespaceFocus::Unresolved,
        }
    }

    fn matches(&self, namespace: Option<&str>) -> bool {
        match self {
            NamespaceFocus::Any => true,
            NamespaceFocus::Uri(uri) => namespace == Some(uri.as_str()),
            NamespaceFocus::Unresolved => false,
        }
    }
}

/// Build an owned element from a parsed node.
pub(crate) fn build_element(
    node: Node<'_, '_>,
    focus: &NamespaceFocus,
    options: ParseOptions,
) -> Element {
    let tag = node.tag_name();
    let namespace = tag.namespace().map(str::to_string);
    let prefix = tag.namespace().and_then(|_| written_prefix(node));

    let attributes = node
        .attributes()
        .filter(|a| focus.matches(a.namespace()))
        .map(|a| Attribute {
            name: a.name().to_string(),
            namespace: a.namespace().map(str::to_string),
            value: a.value().to_string(),
        })
        .collect();

    let mut text = String::new();
    let mut children = Vec::new();

    for child in node.children() {
        if child.is_element() {
            if focus.matches(child.tag_name().namespace()) {
                children.push(build_element(child, focus, options));
            }
        } else if child.is_text() {
            let Some(chunk) = child.text() else { continue };
            if options.contains(ParseOptions::NO_BLANKS) && is_xml_blank(chunk) {
                continue;
            }
            text.push_str(chunk);
        }
    }

    Element {
        name: tag.name().to_string(),
        namespace,
        prefix,
        attributes,
        text,
        children,
    }
}

/// The prefix as it appears in the start tag, which can differ from the first
/// in-scope declaration for the same URI.
fn written_prefix(node: Node<'_, '_>) -> Option<String> {
    let tag = node.document().input_text().get(node.range().start + 1..)?;
    let end = tag
        .find(|c: char| c.is_whitespace() || c == '/' || c == '>')
        .unwrap_or(tag.len());
    tag[..end]
        .split_once(':')
        .map(|(prefix, _)| prefix.to_string())
}

fn is_xml_blank(s: &str) -> bool {
    s.chars().all(|c| matches!(c, ' ' | '\t' | '\n' | '\r'))
}
