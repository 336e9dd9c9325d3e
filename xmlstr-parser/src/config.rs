use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

use crate::error::XmlStrResult;
use crate::parser::XmlStringParser;

/// Parser settings as stored in a YAML file.
///
/// ```yaml
/// options: [NO_BLANKS, HUGE]
/// namespace: urn:example:catalog
/// is_prefix: false
/// disable_entity_loader: true
/// ```
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ParserConfig {
    /// Option flag names, e.g. `NO_BLANKS`
    pub options: Vec<String>,
    pub namespace: String,
    pub is_prefix: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub disable_entity_loader: Option<bool>,
}

impl ParserConfig {
    pub fn from_yaml_str(yaml: &str) -> XmlStrResult<Self> {
        Ok(serde_yaml::from_str(yaml)?)
    }

    pub fn from_file(path: impl AsRef<Path>) -> XmlStrResult<Self> {
        let content = fs::read_to_string(path)?;
        Self::from_yaml_str(&content)
    }

    /// Validate the settings and build a parser producing `E`.
    pub fn build<E>(&self) -> XmlStrResult<XmlStringParser<E>> {
        XmlStringParser::from_config(self)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::element::Element;
    use crate::error::XmlStrError;
    use crate::options::ParseOptions;
    use std::io::Write;

    #[test]
    fn test_empty_config_is_default() {
        let config = ParserConfig::from_yaml_str("{}").unwrap();
        assert_eq!(config, ParserConfig::default());

        let parser = config.build::<Element>().unwrap();
        assert_eq!(parser.options(), ParseOptions::empty());
        assert_eq!(parser.namespace(), "");
        assert!(!parser.is_prefix());
        assert_eq!(parser.disable_entity_loader(), None);
    }

    #[test]
    fn test_full_config() {
        let yaml = r#"
options: [NO_BLANKS, huge]
namespace: m
is_prefix: true
disable_entity_loader: false
"#;
        let parser = ParserConfig::from_yaml_str(yaml)
            .unwrap()
            .build::<Element>()
            .unwrap();

        assert_eq!(parser.options(), ParseOptions::NO_BLANKS | ParseOptions::HUGE);
        assert_eq!(parser.namespace(), "m");
        assert!(parser.is_prefix());
        assert_eq!(parser.disable_entity_loader(), Some(false));
    }

    #[test]
    fn test_unknown_option_is_rejected() {
        let config = ParserConfig::from_yaml_str("options: [NO_NET]").unwrap();
        assert!(matches!(
            config.build::<Element>(),
            Err(XmlStrError::InvalidArgument(_))
        ));
    }

    #[test]
    fn test_prefix_with_colon_is_rejected() {
        let config = ParserConfig::from_yaml_str("namespace: \"urn:x\"\nis_prefix: true").unwrap();
        assert!(config.build::<Element>().is_err());
    }

    #[test]
    fn test_unknown_key_is_config_error() {
        let err = ParserConfig::from_yaml_str("class_name: Foo").unwrap_err();
        assert!(matches!(err, XmlStrError::Config(_)));
    }

    #[test]
    fn test_from_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        writeln!(file, "options: [NO_WARNING]").unwrap();

        let config = ParserConfig::from_file(file.path()).unwrap();
        assert_eq!(config.options, vec!["NO_WARNING".to_string()]);

        let missing = ParserConfig::from_file(file.path().with_extension("missing"));
        assert!(matches!(missing, Err(XmlStrError::Io(_))));
    }
}
