//! LIKE pattern translation into the SQL `%`/`_` convention.

use geoquery_core::filter::{tokenize_like, LikeToken};

/// Translate a pattern written with custom wildcard, single-char and escape
/// characters. Escaped characters come out as plain literals; a literal `%`,
/// `_` or `\` is backslash-escaped so SQL does not read it as a wildcard;
/// callers must then declare `ESCAPE '\'` on the LIKE clause.
pub fn to_sql_pattern(pattern: &str, wildcard: char, single_char: char, escape: char) -> String {
    let mut out = String::with_capacity(pattern.len());
    for token in tokenize_like(pattern, wildcard, single_char, escape) {
        match token {
            LikeToken::Any => out.push('%'),
            LikeToken::One => out.push('_'),
            LikeToken::Literal(c @ ('%' | '_' | '\\')) => {
                out.push('\\');
                out.push(c);
            }
            LikeToken::Literal(c) => out.push(c),
        }
    }
    out
}
