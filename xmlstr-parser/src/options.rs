use bitflags::bitflags;

use crate::error::{XmlStrError, XmlStrResult};

/// Node-count ceiling applied unless [`ParseOptions::HUGE`] is set.
pub const DEFAULT_NODES_LIMIT: u32 = 10_000_000;

bitflags! {
    /// Parser option flags.
    ///
    /// Bit positions follow the libxml numbering so numeric option words
    /// read the same as they do in other tooling.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct ParseOptions: u32 {
        /// Accept a DOCTYPE with internal entity declarations.
        const ALLOW_DTD = 1 << 2;
        /// Leave error and fatal diagnostics out of the report.
        const NO_ERROR = 1 << 5;
        /// Suppress warnings.
        const NO_WARNING = 1 << 6;
        /// Drop whitespace-only text nodes.
        const NO_BLANKS = 1 << 8;
        /// Lift the node-count safety limit.
        const HUGE = 1 << 19;
    }
}

impl ParseOptions {
    /// Build options from a raw option word, rejecting unknown bits.
    pub fn from_bits_checked(bits: u32) -> XmlStrResult<Self> {
        Self::from_bits(bits).ok_or_else(|| {
            XmlStrError::InvalidArgument(format!(
                "options must only contain known flags, got unknown bits {:#x}",
                bits & !Self::all().bits()
            ))
        })
    }

    /// Build options from flag names such as `NO_BLANKS` (case-insensitive).
    pub fn from_names<I, S>(names: I) -> XmlStrResult<Self>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let mut options = Self::empty();
        for name in names {
            let name = name.as_ref().trim();
            let flag = Self::from_name(&name.to_ascii_uppercase()).ok_or_else(|| {
                XmlStrError::InvalidArgument(format!("unknown parser option '{}'", name))
            })?;
            options |= flag;
        }
        Ok(options)
    }

    pub fn nodes_limit(self) -> u32 {
        if self.contains(Self::HUGE) {
            u32::MAX
        } else {
            DEFAULT_NODES_LIMIT
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_bits_checked() {
        let options = ParseOptions::from_bits_checked(256 | 4).unwrap();
        assert_eq!(options, ParseOptions::NO_BLANKS | ParseOptions::ALLOW_DTD);

        let err = ParseOptions::from_bits_checked(1 << 1).unwrap_err();
        assert!(matches!(err, XmlStrError::InvalidArgument(_)));
        assert!(err.to_string().contains("0x2"));
    }

    #[test]
    fn test_from_names() {
        let options = ParseOptions::from_names(["no_blanks", " HUGE "]).unwrap();
        assert_eq!(options, ParseOptions::NO_BLANKS | ParseOptions::HUGE);

        assert_eq!(
            ParseOptions::from_names(Vec::<String>::new()).unwrap(),
            ParseOptions::empty()
        );

        let err = ParseOptions::from_names(["NO_SUCH_FLAG"]).unwrap_err();
        assert_eq!(err.to_string(), "Invalid argument: unknown parser option 'NO_SUCH_FLAG'");
    }

    #[test]
    fn test_nodes_limit() {
        assert_eq!(ParseOptions::empty().nodes_limit(), DEFAULT_NODES_LIMIT);
        assert_eq!(ParseOptions::HUGE.nodes_limit(), u32::MAX);
    }
}
