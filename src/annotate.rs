//! Attaching a rendered comment to a SQL statement.

/// Prepend or append `comment` to `sql`, separated by a single space.
///
/// An empty comment leaves `sql` untouched. Whitespace on the joined side of
/// `sql` is trimmed so the result never contains a double space.
///
/// ```rust
/// use sea_orm_query_tags::annotate;
///
/// let comment = "/*application:active_record*/";
/// assert_eq!(
///     annotate("select id from posts", comment, false),
///     "select id from posts /*application:active_record*/"
/// );
/// assert_eq!(
///     annotate("select id from posts", comment, true),
///     "/*application:active_record*/ select id from posts"
/// );
/// ```
pub fn annotate(sql: &str, comment: &str, prepend: bool) -> String {
    if comment.is_empty() {
        return sql.to_string();
    }

    if prepend {
        format!("{comment} {}", sql.trim_start())
    } else {
        format!("{} {comment}", sql.trim_end())
    }
}
