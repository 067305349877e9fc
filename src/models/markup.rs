//! Host markup escaping.
//!
//! The host stores record bodies and filter definitions with `&`, `<` and `>`
//! replaced by numeric character references. Filters are written against the
//! raw text, so bodies are decoded before filtering and re-encoded afterwards.

/// Encodes `&`, `<` and `>` as numeric character references.
///
/// `&` is handled first so existing references are escaped once more, which
/// keeps [`decode_entities`] an exact inverse.
#[must_use]
pub fn encode_entities(text: &str) -> String {
    let mut out = String::with_capacity(text.len() + text.len() / 8);
    for c in text.chars() {
        match c {
            '&' => out.push_str("&#38;"),
            '<' => out.push_str("&#60;"),
            '>' => out.push_str("&#62;"),
            _ => out.push(c),
        }
    }
    out
}

/// Decodes the references produced by [`encode_entities`].
///
/// The named forms `&lt;`, `&gt;` and `&amp;` are accepted too. Any other
/// reference is left as is.
#[must_use]
pub fn decode_entities(text: &str) -> String {
    const REFERENCES: [(&str, char); 6] = [
        ("&#60;", '<'),
        ("&lt;", '<'),
        ("&#62;", '>'),
        ("&gt;", '>'),
        ("&#38;", '&'),
        ("&amp;", '&'),
    ];

    let mut out = String::with_capacity(text.len());
    let mut rest = text;
    'scan: while let Some(pos) = rest.find('&') {
        out.push_str(&rest[..pos]);
        rest = &rest[pos..];
        for (reference, c) in REFERENCES {
            if let Some(tail) = rest.strip_prefix(reference) {
                out.push(c);
                rest = tail;
                continue 'scan;
            }
        }
        out.push('&');
        rest = &rest[1..];
    }
    out.push_str(rest);
    out
}
