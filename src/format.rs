//! Comment serialization formats.

use std::fmt;
use std::str::FromStr;

use crate::error::QueryTagsError;

/// The serialization used for the rendered comment.
///
/// - `Legacy` renders `key:value` pairs in configured order.
/// - `SqlCommenter` renders `key='percent-encoded-value'` pairs sorted by key,
///   following <https://google.github.io/sqlcommenter/>.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum CommentFormat {
    /// Human-readable output. Values are only guarded against closing the
    /// comment, so a value containing `,` or `:` is emitted as-is and the
    /// result cannot always be split back into pairs.
    #[default]
    Legacy,
    SqlCommenter,
}

impl CommentFormat {
    pub fn as_str(&self) -> &'static str {
        match self {
            CommentFormat::Legacy => "legacy",
            CommentFormat::SqlCommenter => "sqlcommenter",
        }
    }

    /// Separator placed between a key and its value.
    pub(crate) fn key_value_separator(&self) -> &'static str {
        match self {
            CommentFormat::Legacy => ":",
            CommentFormat::SqlCommenter => "=",
        }
    }

    /// Whether pairs are sorted by key before joining.
    pub(crate) fn sorted(&self) -> bool {
        matches!(self, CommentFormat::SqlCommenter)
    }
}

impl fmt::Display for CommentFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for CommentFormat {
    type Err = QueryTagsError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "legacy" => Ok(CommentFormat::Legacy),
            "sqlcommenter" | "sql_commenter" => Ok(CommentFormat::SqlCommenter),
            _ => Err(QueryTagsError::UnknownFormat(s.to_string())),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_format() {
        assert_eq!("legacy".parse::<CommentFormat>().unwrap(), CommentFormat::Legacy);
        assert_eq!(
            "SqlCommenter".parse::<CommentFormat>().unwrap(),
            CommentFormat::SqlCommenter
        );
        assert_eq!(
            "sql_commenter".parse::<CommentFormat>().unwrap(),
            CommentFormat::SqlCommenter
        );
    }

    #[test]
    fn test_parse_unknown_format() {
        let err = "json".parse::<CommentFormat>().unwrap_err();
        assert!(matches!(err, QueryTagsError::UnknownFormat(ref s) if s == "json"));
    }

    #[test]
    fn test_default_is_legacy() {
        assert_eq!(CommentFormat::default(), CommentFormat::Legacy);
        assert_eq!(CommentFormat::SqlCommenter.to_string(), "sqlcommenter");
    }
}
