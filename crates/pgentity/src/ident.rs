//! SQL identifier quoting.
//!
//! Every table and column name emitted by the engine is double-quoted. Embedded
//! `"` characters are escaped as `""`, so metadata names never need to match
//! the unquoted identifier grammar.

/// Quote a single identifier: `name` -> `"name"`.
pub fn quote_ident(name: &str) -> String {
    let mut out = String::with_capacity(name.len() + 2);
    push_ident(&mut out, name);
    out
}

/// Append a quoted identifier to `out`.
pub fn push_ident(out: &mut String, name: &str) {
    out.push('"');
    for c in name.chars() {
        if c == '"' {
            out.push('"');
        }
        out.push(c);
    }
    out.push('"');
}

/// Quote and comma-join a list of identifiers (no spaces, matching the
/// column list format of generated statements).
pub fn quote_ident_list<'a>(names: impl IntoIterator<Item = &'a str>) -> String {
    let mut out = String::new();
    for (i, name) in names.into_iter().enumerate() {
        if i > 0 {
            out.push(',');
        }
        push_ident(&mut out, name);
    }
    out
}
