//! SQL text helpers: literal quoting and binding the data location into a
//! query template.

/// Token a query template uses where the signed data location goes.
pub const LOCATION_PLACEHOLDER: &str = "S3_PRESIGNED_URL";

/// Renders `value` as a single-quoted SQL string literal.
///
/// Embedded single quotes are doubled, which is the only escape SQL string
/// literals need.
#[must_use]
pub fn quote_literal(value: &str) -> String {
    let mut out = String::with_capacity(value.len() + 2);
    out.push('\'');
    for ch in value.chars() {
        if ch == '\'' {
            out.push('\'');
        }
        out.push(ch);
    }
    out.push('\'');
    out
}

/// Substitutes every [`LOCATION_PLACEHOLDER`] in `template` with the quoted
/// `url`.
///
/// This is plain text substitution: the template author is responsible for
/// placing the token where a string literal is valid, typically as the
/// argument of `read_parquet(...)`.
#[must_use]
pub fn bind_location(template: &str, url: &str) -> String {
    template.replace(LOCATION_PLACEHOLDER, &quote_literal(url))
}

/// Composes the ad-hoc search query for a `WHERE` body.
#[must_use]
pub fn search_query(where_clause: &str) -> String {
    format!("SELECT * FROM read_parquet({LOCATION_PLACEHOLDER}) WHERE {where_clause}")
}
