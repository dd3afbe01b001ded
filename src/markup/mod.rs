//! Conversion between Markdown-style text and the HTML subset Notes accepts.
//!
//! The two directions are not inverses. Encoding the decoded form of HTML
//! this module produced yields the same block structure again, but markup
//! without an equivalent (underline, fonts, nested lists) is flattened.

mod decode;
mod encode;

pub use decode::{decode, html_to_plaintext};
pub use encode::encode;

pub(crate) fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for ch in text.chars() {
        match ch {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(ch),
        }
    }
    out
}

/// Resolve the named entities Notes emits. Numeric references are handled
/// by the tokenizer before this is consulted.
pub(crate) fn resolve_entity(name: &str) -> Option<&'static str> {
    match name {
        "amp" => Some("&"),
        "lt" => Some("<"),
        "gt" => Some(">"),
        "quot" => Some("\""),
        "apos" => Some("'"),
        "nbsp" => Some(" "),
        "ndash" => Some("–"),
        "mdash" => Some("—"),
        "hellip" => Some("…"),
        "lsquo" => Some("‘"),
        "rsquo" => Some("’"),
        "ldquo" => Some("“"),
        "rdquo" => Some("”"),
        _ => None,
    }
}
