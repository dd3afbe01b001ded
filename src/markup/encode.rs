use std::sync::OnceLock;

use regex::{Captures, Regex};

use super::escape_html;

struct InlinePatterns {
    code: Regex,
    link_target: Regex,
    bold_star: Regex,
    bold_under: Regex,
    italic_star: Regex,
    italic_under: Regex,
    link: Regex,
    slot: Regex,
    ordered: Regex,
}

fn patterns() -> &'static InlinePatterns {
    static PATTERNS: OnceLock<InlinePatterns> = OnceLock::new();
    PATTERNS.get_or_init(|| {
        let re = |p: &str| Regex::new(p).expect("inline pattern compiles");
        InlinePatterns {
            code: re(r"`([^`]+)`"),
            link_target: re(r"\]\(([^)\s]+)\)"),
            // `\*?` lets the closing run of `***` end bold after a nested italic
            bold_star: re(r"\*\*(.+?\*?)\*\*"),
            bold_under: re(r"__(.+?_?)__"),
            italic_star: re(r"\*([^*]+)\*"),
            italic_under: re(r"_([^_]+)_"),
            link: re(r"\[([^\]]+)\]\(([^)]+)\)"),
            slot: re("\u{E000}(\\d+)\u{E001}"),
            ordered: re(r"^\d+\.\s"),
        }
    })
}

/// Convert Markdown-style text to Notes HTML, one block element per line.
///
/// Blank lines become `<br>`; list containers close as soon as a line of
/// another kind appears, so every `<ul>`/`<ol>` emitted is also closed.
pub fn encode(markup: &str) -> String {
    if markup.is_empty() {
        return String::new();
    }

    let pats = patterns();
    let mut html: Vec<String> = Vec::new();
    let mut in_ul = false;
    let mut in_ol = false;

    for line in markup.split('\n') {
        let stripped = line.trim();
        let ul_item = stripped
            .strip_prefix("- ")
            .or_else(|| stripped.strip_prefix("* "));
        let ol_item = pats
            .ordered
            .find(stripped)
            .map(|m| &stripped[m.end()..]);

        if in_ul && ul_item.is_none() {
            html.push("</ul>".to_string());
            in_ul = false;
        }
        if in_ol && ol_item.is_none() {
            html.push("</ol>".to_string());
            in_ol = false;
        }

        if stripped.is_empty() {
            html.push("<br>".to_string());
            continue;
        }

        if let Some((level, rest)) = heading(stripped) {
            html.push(format!("<h{level}>{}</h{level}>", convert_inline(rest)));
        } else if let Some(item) = ul_item {
            if !in_ul {
                html.push("<ul>".to_string());
                in_ul = true;
            }
            html.push(format!("<li>{}</li>", convert_inline(item)));
        } else if let Some(item) = ol_item {
            if !in_ol {
                html.push("<ol>".to_string());
                in_ol = true;
            }
            html.push(format!("<li>{}</li>", convert_inline(item)));
        } else {
            html.push(format!("<div>{}</div>", convert_inline(stripped)));
        }
    }

    if in_ul {
        html.push("</ul>".to_string());
    }
    if in_ol {
        html.push("</ol>".to_string());
    }

    html.join("\n")
}

fn heading(line: &str) -> Option<(usize, &str)> {
    [("### ", 3), ("## ", 2), ("# ", 1)]
        .into_iter()
        .find_map(|(prefix, level)| line.strip_prefix(prefix).map(|rest| (level, rest)))
}

/// Spans pulled out of the text so later passes cannot rewrite them.
#[derive(Default)]
struct Shield {
    slots: Vec<String>,
}

impl Shield {
    fn stash(&mut self, html: String) -> String {
        let token = format!("\u{E000}{}\u{E001}", self.slots.len());
        self.slots.push(html);
        token
    }

    /// Put stashed spans back. A slot only expands tokens stashed before it,
    /// so nested tokens resolve and self references cannot loop.
    fn restore(&self, text: &str) -> String {
        self.restore_below(text, self.slots.len())
    }

    fn restore_below(&self, text: &str, limit: usize) -> String {
        patterns()
            .slot
            .replace_all(text, |caps: &Captures| {
                caps[1]
                    .parse::<usize>()
                    .ok()
                    .filter(|i| *i < limit)
                    .and_then(|i| self.slots.get(i).map(|s| self.restore_below(s, i)))
                    .unwrap_or_default()
            })
            .into_owned()
    }
}

/// Inline passes in fixed order: code, bold, italic, link.
pub(crate) fn convert_inline(text: &str) -> String {
    let pats = patterns();
    let mut shield = Shield::default();

    // sentinels typed by the user would collide with stash tokens
    let text = escape_html(&text.replace(['\u{E000}', '\u{E001}'], ""));
    let text = pats
        .code
        .replace_all(&text, |caps: &Captures| {
            shield.stash(format!("<code>{}</code>", &caps[1]))
        })
        .into_owned();
    let text = pats
        .link_target
        .replace_all(&text, |caps: &Captures| {
            format!("]({})", shield.stash(caps[1].to_string()))
        })
        .into_owned();

    let text = pats.bold_star.replace_all(&text, "<b>$1</b>");
    let text = pats.bold_under.replace_all(&text, "<b>$1</b>");
    let text = pats.italic_star.replace_all(&text, "<i>$1</i>");
    let text = pats.italic_under.replace_all(&text, "<i>$1</i>");
    let text = pats.link.replace_all(&text, r#"<a href="$2">$1</a>"#);

    shield.restore(&text)
}
