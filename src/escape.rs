//! Escaping of tag content placed inside a `/* ... */` SQL comment.

use once_cell::sync::Lazy;
use percent_encoding::{utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use regex::Regex;

use crate::format::CommentFormat;

/// Characters left as-is by sqlcommenter value encoding (RFC 3986 unreserved).
const SQLCOMMENTER_VALUE: &AsciiSet = &NON_ALPHANUMERIC
    .remove(b'-')
    .remove(b'_')
    .remove(b'.')
    .remove(b'~');

/// A comment wrapper around the whole content: `/*`, `/*+` or `*/`,
/// with at most one space on the inner side.
static COMMENT_WRAPPER_REGEX: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\A\s*/\*\+?\s?|\s?\*/\s*\z").unwrap());

/// Make a whole comment body safe to embed inside a SQL comment.
///
/// A surrounding comment wrapper is stripped, then every `*/` and `/*` is
/// split with a space until none remain.
///
/// ```rust
/// use sea_orm_query_tags::escape_sql_comment;
///
/// assert_eq!(escape_sql_comment("app:foo"), "app:foo");
/// assert_eq!(escape_sql_comment("/* app:foo */"), "app:foo");
/// assert!(!escape_sql_comment("**//").contains("*/"));
/// ```
pub fn escape_sql_comment(content: &str) -> String {
    guard_comment_delimiters(&COMMENT_WRAPPER_REGEX.replace_all(content, ""))
}

/// Split every `*/` and `/*` with a space until none remain.
///
/// Unlike [`escape_sql_comment`] nothing is removed, so a tag value keeps
/// all of its text.
pub fn guard_comment_delimiters(content: &str) -> String {
    let mut comment = content.to_string();

    loop {
        if comment.contains("*/") {
            comment = comment.replace("*/", "* /");
        } else if comment.contains("/*") {
            comment = comment.replace("/*", "/ *");
        } else {
            return comment;
        }
    }
}

/// Percent-encode a value for the sqlcommenter format.
///
/// Everything except ASCII alphanumerics and `-_.~` is escaped.
pub fn percent_encode_value(value: &str) -> String {
    utf8_percent_encode(value, SQLCOMMENTER_VALUE).to_string()
}

/// Escape a raw tag value (or key) for the given format.
///
/// Legacy content only gets its comment delimiters split. Sqlcommenter
/// content is percent-encoded first, then guarded the same way.
pub fn escape(raw: &str, format: CommentFormat) -> String {
    match format {
        CommentFormat::Legacy => guard_comment_delimiters(raw),
        CommentFormat::SqlCommenter => guard_comment_delimiters(&percent_encode_value(raw)),
    }
}
