use std::borrow::Cow;
use std::sync::OnceLock;

use quick_xml::Reader;
use quick_xml::events::{BytesStart, Event};
use regex::{Captures, Regex};

use super::resolve_entity;

const VOID_ELEMENTS: &[&str] = &["br", "hr", "img", "input", "meta", "link", "wbr", "col"];
const SKIPPED_ELEMENTS: &[&str] = &["head", "style", "script", "title"];
const BLOCK_ELEMENTS: &[&str] = &[
    "div", "p", "h1", "h2", "h3", "h4", "h5", "h6", "ul", "ol", "li", "blockquote", "pre",
    "body", "html", "section", "article", "table", "tbody", "tr", "td", "object",
];

#[derive(Debug)]
enum Node {
    Element(Element),
    Text(String),
}

#[derive(Debug)]
struct Element {
    name: String,
    href: Option<String>,
    children: Vec<Node>,
}

impl Element {
    fn new(name: impl Into<String>) -> Self {
        Self { name: name.into(), href: None, children: Vec::new() }
    }

    fn from_start(start: &BytesStart) -> Self {
        let name = String::from_utf8_lossy(start.name().as_ref()).to_ascii_lowercase();
        let href = start
            .html_attributes()
            .flatten()
            .find(|attr| attr.key.as_ref().eq_ignore_ascii_case(b"href"))
            .map(|attr| match attr.unescape_value() {
                Ok(value) => value.into_owned(),
                Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
            });
        Self { name, href, children: Vec::new() }
    }

    fn has_block_child(&self) -> bool {
        self.children.iter().any(|child| match child {
            Node::Element(el) => is_block(&el.name),
            Node::Text(_) => false,
        })
    }
}

fn is_block(name: &str) -> bool {
    BLOCK_ELEMENTS.contains(&name)
}

fn is_skipped(name: &str) -> bool {
    SKIPPED_ELEMENTS.contains(&name)
}

/// Convert Notes HTML to Markdown-style text, one paragraph per block with a
/// blank line between blocks. HTML that cannot be tokenized falls back to its
/// visible text.
pub fn decode(html: &str) -> String {
    let Some(root) = parse(html) else {
        tracing::debug!("html did not tokenize; using plain text fallback");
        return html_to_plaintext(html);
    };
    let mut blocks = Vec::new();
    collect_blocks(&root.children, &mut blocks);
    blocks.join("\n\n")
}

/// Build a forgiving element tree: void tags never open, stray end tags are
/// ignored and an end tag closes everything opened after its match.
fn parse(html: &str) -> Option<Element> {
    let html = escape_stray_lt(html);
    let mut reader = Reader::from_str(&html);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.check_comments = false;

    let mut stack = vec![Element::new("#root")];
    loop {
        match reader.read_event() {
            Ok(Event::Start(start)) => {
                let el = Element::from_start(&start);
                if VOID_ELEMENTS.contains(&el.name.as_str()) {
                    append(&mut stack, Node::Element(el));
                } else {
                    stack.push(el);
                }
            }
            Ok(Event::Empty(start)) => {
                append(&mut stack, Node::Element(Element::from_start(&start)));
            }
            Ok(Event::End(end)) => {
                let name = String::from_utf8_lossy(end.name().as_ref()).to_ascii_lowercase();
                if let Some(depth) = stack.iter().rposition(|el| el.name == name) {
                    if depth > 0 {
                        close_to(&mut stack, depth);
                    }
                }
            }
            Ok(Event::Text(text)) => {
                let value = match text.unescape_with(resolve_entity) {
                    Ok(value) => value.into_owned(),
                    Err(_) => String::from_utf8_lossy(&text).into_owned(),
                };
                append(&mut stack, Node::Text(value));
            }
            Ok(Event::CData(data)) => {
                let value = String::from_utf8_lossy(&data).into_owned();
                append(&mut stack, Node::Text(value));
            }
            Ok(Event::Eof) => break,
            Ok(_) => {}
            Err(err) => {
                tracing::debug!(error = %err, "html tokenizer error");
                return None;
            }
        }
    }

    close_to(&mut stack, 1);
    stack.pop()
}

/// A `<` that cannot open a tag is text, as in `a < b`.
fn escape_stray_lt(html: &str) -> Cow<'_, str> {
    if !html.contains('<') {
        return Cow::Borrowed(html);
    }
    let mut out = String::with_capacity(html.len());
    let mut chars = html.chars().peekable();
    while let Some(c) = chars.next() {
        let opens_tag = chars
            .peek()
            .is_some_and(|next| next.is_ascii_alphabetic() || matches!(next, '/' | '!' | '?'));
        if c == '<' && !opens_tag {
            out.push_str("&lt;");
        } else {
            out.push(c);
        }
    }
    Cow::Owned(out)
}

fn append(stack: &mut [Element], node: Node) {
    if let Some(current) = stack.last_mut() {
        current.children.push(node);
    }
}

/// Pop open elements until only `depth` remain, attaching each to its parent.
fn close_to(stack: &mut Vec<Element>, depth: usize) {
    while stack.len() > depth.max(1) {
        if let Some(el) = stack.pop() {
            append(stack, Node::Element(el));
        }
    }
}

fn collect_blocks(nodes: &[Node], out: &mut Vec<String>) {
    let mut pending = String::new();
    for node in nodes {
        match node {
            Node::Element(el) if is_block(&el.name) => {
                flush(&mut pending, out);
                convert_block(el, out);
            }
            // between blocks a bare <br> only separates paragraphs
            Node::Element(el) if el.name == "br" => flush(&mut pending, out),
            other => pending.push_str(&convert_inline(other)),
        }
    }
    flush(&mut pending, out);
}

fn flush(pending: &mut String, out: &mut Vec<String>) {
    let text = pending.trim();
    if !text.is_empty() {
        out.push(text.to_string());
    }
    pending.clear();
}

fn convert_block(el: &Element, out: &mut Vec<String>) {
    match el.name.as_str() {
        "h1" | "h2" | "h3" | "h4" | "h5" | "h6" => {
            let level = el.name[1..].parse::<usize>().unwrap_or(1);
            let text = inline_children(el);
            let text = text.trim();
            if !text.is_empty() {
                out.push(format!("{} {}", "#".repeat(level), text));
            }
        }
        "ul" | "ol" => {
            let list = convert_list(el);
            if !list.is_empty() {
                out.push(list);
            }
        }
        "li" => {
            let text = list_item_text(el);
            if !text.is_empty() {
                out.push(format!("- {text}"));
            }
        }
        _ if el.has_block_child() => collect_blocks(&el.children, out),
        _ => {
            let mut pending = inline_children(el);
            flush(&mut pending, out);
        }
    }
}

/// Ordered items are renumbered from 1 whatever the source numbering was.
fn convert_list(el: &Element) -> String {
    let ordered = el.name == "ol";
    el.children
        .iter()
        .filter_map(|child| match child {
            Node::Element(li) if li.name == "li" => Some(li),
            _ => None,
        })
        .enumerate()
        .map(|(i, li)| {
            let text = list_item_text(li);
            if ordered {
                format!("{}. {text}", i + 1)
            } else {
                format!("- {text}")
            }
        })
        .collect::<Vec<_>>()
        .join("\n")
}

fn list_item_text(li: &Element) -> String {
    inline_children(li)
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

fn inline_children(el: &Element) -> String {
    el.children.iter().map(convert_inline).collect()
}

fn convert_inline(node: &Node) -> String {
    let el = match node {
        Node::Text(text) => return text.clone(),
        Node::Element(el) => el,
    };
    match el.name.as_str() {
        "br" => "\n".to_string(),
        "b" | "strong" => wrap(&inline_children(el), "**"),
        "i" | "em" => wrap(&inline_children(el), "*"),
        "strike" | "s" | "del" => wrap(&inline_children(el), "~~"),
        "code" | "tt" => wrap(&inline_children(el), "`"),
        "a" => {
            let label = inline_children(el);
            match &el.href {
                Some(href) if !label.trim().is_empty() => format!("[{}]({href})", label.trim()),
                _ => label,
            }
        }
        // underline has no markup equivalent
        "u" => inline_children(el),
        name if is_skipped(name) => String::new(),
        _ => inline_children(el),
    }
}

/// Wrap text in a marker, keeping surrounding whitespace outside it so
/// `<b>word </b>` becomes `**word** `.
fn wrap(inner: &str, marker: &str) -> String {
    let trimmed = inner.trim();
    if trimmed.is_empty() {
        return inner.to_string();
    }
    let start = inner.len() - inner.trim_start().len();
    let end = start + trimmed.len();
    format!("{}{marker}{trimmed}{marker}{}", &inner[..start], &inner[end..])
}

struct PlaintextPatterns {
    script: Regex,
    style: Regex,
    br: Regex,
    paragraph_end: Regex,
    block_end: Regex,
    item_start: Regex,
    tag: Regex,
    entity: Regex,
    blank_run: Regex,
}

fn plaintext_patterns() -> &'static PlaintextPatterns {
    static PATTERNS: OnceLock<PlaintextPatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("plaintext pattern compiles");
        PlaintextPatterns {
            script: re(r"(?is)<script[^>]*>.*?</script>"),
            style: re(r"(?is)<style[^>]*>.*?</style>"),
            br: re(r"(?i)<br\s*/?>"),
            paragraph_end: re(r"(?i)</p>"),
            block_end: re(r"(?i)</(div|h[1-6])>"),
            item_start: re(r"(?i)<li[^>]*>"),
            tag: re(r"</?[A-Za-z!?][^>]*>"),
            entity: re(r"&(#[xX]?[0-9A-Fa-f]+|[A-Za-z]+);"),
            blank_run: re(r"\n{3,}"),
        }
    })
}

/// Strip tags, keeping line structure. Used when HTML is too broken to parse
/// and when plain text output is asked for.
pub fn html_to_plaintext(html: &str) -> String {
    if html.is_empty() {
        return String::new();
    }
    let pats = plaintext_patterns();
    let text = pats.script.replace_all(html, "");
    let text = pats.style.replace_all(&text, "");
    let text = pats.br.replace_all(&text, "\n");
    let text = pats.paragraph_end.replace_all(&text, "\n\n");
    let text = pats.block_end.replace_all(&text, "\n");
    let text = text.replace("</li>", "\n").replace("</LI>", "\n");
    let text = pats.item_start.replace_all(&text, "- ");
    let text = pats.tag.replace_all(&text, "");
    let text = pats.entity.replace_all(&text, |caps: &Captures| {
        decode_entity(&caps[1]).unwrap_or_else(|| caps[0].to_string())
    });
    let text = pats.blank_run.replace_all(&text, "\n\n");
    text.trim().to_string()
}

fn decode_entity(body: &str) -> Option<String> {
    if let Some(num) = body.strip_prefix('#') {
        let code = match num.strip_prefix(['x', 'X']) {
            Some(hex) => u32::from_str_radix(hex, 16).ok()?,
            None => num.parse().ok()?,
        };
        return char::from_u32(code).map(String::from);
    }
    resolve_entity(body).map(str::to_string)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn divs_become_paragraphs() {
        let md = decode("<div>one</div><div>two</div>");
        assert_eq!(md, "one\n\ntwo");
    }

    #[test]
    fn inline_elements() {
        let md = decode(
            r#"<div><b>b</b> <i>i</i> <strike>s</strike> <u>u</u> <a href="https://x.io">l</a></div>"#,
        );
        assert_eq!(md, "**b** *i* ~~s~~ u [l](https://x.io)");
    }

    #[test]
    fn br_inside_block_is_newline() {
        assert_eq!(decode("<div>a<br>b</div>"), "a\nb");
    }

    #[test]
    fn apple_blank_line_divs_are_skipped() {
        let html = "<div><b>Title</b></div><div><br></div><div>body</div>";
        assert_eq!(decode(html), "**Title**\n\nbody");
    }

    #[test]
    fn ordered_list_renumbers() {
        let html = "<ol start=\"5\"><li>a</li><li>b</li></ol>";
        assert_eq!(decode(html), "1. a\n2. b");
    }

    #[test]
    fn unordered_list_keeps_inline_markup() {
        let html = "<ul><li><b>x</b> y</li><li>z</li></ul>";
        assert_eq!(decode(html), "- **x** y\n- z");
    }

    #[test]
    fn headings_nested_in_divs_survive() {
        let html = "<div><h1>Plan</h1></div><div>text</div>";
        assert_eq!(decode(html), "# Plan\n\ntext");
    }

    #[test]
    fn unknown_elements_recurse() {
        let html = r#"<div><span style="font-size: 12px">plain <font>old</font></span></div>"#;
        assert_eq!(decode(html), "plain old");
    }

    #[test]
    fn nested_emphasis() {
        assert_eq!(
            decode("<div><b>bold <i>and italic</i></b></div>"),
            "**bold *and italic***"
        );
    }

    #[test]
    fn whitespace_moves_outside_markers() {
        assert_eq!(decode("<div><b>word </b>next</div>"), "**word** next");
    }

    #[test]
    fn entities_are_decoded() {
        assert_eq!(decode("<div>a &amp; b&nbsp;&lt;c&gt; &#39;d&#39;</div>"), "a & b <c> 'd'");
    }

    #[test]
    fn head_content_is_skipped() {
        let html = "<html><head><title>t</title><style>p{}</style></head><body><div>x</div></body></html>";
        assert_eq!(decode(html), "x");
    }

    #[test]
    fn unclosed_tags_are_tolerated() {
        assert_eq!(decode("<div>open <b>bold"), "open **bold**");
    }

    #[test]
    fn stray_angle_bracket_stays_text() {
        let md = decode("<div>a < b</div><div>c</div>");
        assert_eq!(md, "a < b\n\nc");
        assert_eq!(decode("<div>1 <2 and 3 <</div>"), "1 <2 and 3 <");
        assert_eq!(decode("<div><< x</div>"), "<< x");
    }

    #[test]
    fn plaintext_keeps_stray_angle_brackets() {
        assert_eq!(html_to_plaintext("<div>a < b</div><div>c</div>"), "a < b\nc");
    }

    #[test]
    fn plaintext_keeps_structure() {
        let html = "<div>one</div><ul><li>a</li><li>b</li></ul><p>two</p><br>x &amp; y";
        assert_eq!(html_to_plaintext(html), "one\n- a\n- b\ntwo\n\nx & y");
    }
}
