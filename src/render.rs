use pulldown_cmark::{Event, HeadingLevel, Options, Parser, Tag, TagEnd};
use yansi::Paint;

/// Styling categories used when coloring markdown output.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
enum Style {
    Heading,
    Bullet,
    Rule,
    Code,
    Emphasis,
    Strong,
    Strike,
    Link,
    Muted,
    Body,
}

/// Render note markup for the terminal. Block structure is normalized either
/// way; ANSI styling is only added when `use_color` is set.
pub fn render_markdown(input: &str, use_color: bool) -> String {
    let mut rendered = String::new();
    // one entry per open list: next number for ordered lists
    let mut lists: Vec<Option<u64>> = Vec::new();
    let mut styles: Vec<Style> = Vec::new();
    let mut link_targets: Vec<String> = Vec::new();

    for event in Parser::new_ext(input, Options::ENABLE_STRIKETHROUGH) {
        match event {
            Event::Start(Tag::Heading { level, .. }) => {
                start_block(&mut rendered);
                let mark = match level {
                    HeadingLevel::H1 => "# ",
                    HeadingLevel::H2 => "## ",
                    HeadingLevel::H3 => "### ",
                    HeadingLevel::H4 => "#### ",
                    HeadingLevel::H5 => "##### ",
                    _ => "###### ",
                };
                push_styled(&mut rendered, mark, Style::Heading, use_color);
                styles.push(Style::Heading);
            }
            Event::End(TagEnd::Heading(_)) => {
                styles.pop();
                rendered.push('\n');
            }
            Event::Start(Tag::Paragraph) => {
                if lists.is_empty() {
                    start_block(&mut rendered);
                }
            }
            Event::End(TagEnd::Paragraph) => end_line(&mut rendered),
            Event::Start(Tag::List(start)) => {
                if lists.is_empty() {
                    start_block(&mut rendered);
                } else {
                    end_line(&mut rendered);
                }
                lists.push(start);
            }
            Event::End(TagEnd::List(_)) => {
                lists.pop();
                end_line(&mut rendered);
            }
            Event::Start(Tag::Item) => {
                rendered.push_str(&"  ".repeat(lists.len().saturating_sub(1)));
                let bullet = match lists.last_mut() {
                    Some(Some(n)) => {
                        let mark = format!("{n}. ");
                        *n += 1;
                        mark
                    }
                    _ => "- ".to_string(),
                };
                push_styled(&mut rendered, &bullet, Style::Bullet, use_color);
            }
            Event::End(TagEnd::Item) => end_line(&mut rendered),
            Event::Start(Tag::CodeBlock(_)) => {
                start_block(&mut rendered);
                styles.push(Style::Code);
            }
            Event::End(TagEnd::CodeBlock) => {
                styles.pop();
                end_line(&mut rendered);
            }
            Event::Start(Tag::Emphasis) => styles.push(Style::Emphasis),
            Event::Start(Tag::Strong) => styles.push(Style::Strong),
            Event::Start(Tag::Strikethrough) => styles.push(Style::Strike),
            Event::End(TagEnd::Emphasis | TagEnd::Strong | TagEnd::Strikethrough) => {
                styles.pop();
            }
            Event::Start(Tag::Link { dest_url, .. }) => {
                styles.push(Style::Link);
                link_targets.push(dest_url.to_string());
            }
            Event::End(TagEnd::Link) => {
                styles.pop();
                if let Some(dest) = link_targets.pop() {
                    push_styled(&mut rendered, &format!(" ({dest})"), Style::Muted, use_color);
                }
            }
            Event::Text(t) => {
                let style = styles.last().copied().unwrap_or(Style::Body);
                push_styled(&mut rendered, &t, style, use_color);
            }
            Event::Code(t) => push_styled(&mut rendered, &t, Style::Code, use_color),
            Event::SoftBreak | Event::HardBreak => rendered.push('\n'),
            Event::Rule => {
                start_block(&mut rendered);
                push_styled(&mut rendered, "---", Style::Rule, use_color);
                rendered.push('\n');
            }
            Event::Html(t) | Event::InlineHtml(t) => rendered.push_str(&t),
            _ => {}
        }
    }

    rendered.trim().to_string()
}

/// Leave exactly one blank line before the next block.
fn start_block(buf: &mut String) {
    if buf.is_empty() || buf.ends_with("\n\n") {
        return;
    }
    end_line(buf);
    buf.push('\n');
}

fn end_line(buf: &mut String) {
    if !buf.is_empty() && !buf.ends_with('\n') {
        buf.push('\n');
    }
}

fn push_styled(buf: &mut String, text: &str, style: Style, use_color: bool) {
    if use_color {
        let painted = match style {
            Style::Heading => Paint::cyan(text).bold(),
            Style::Bullet => Paint::yellow(text).bold(),
            Style::Rule | Style::Muted => Paint::new(text).dim(),
            Style::Code => Paint::blue(text),
            Style::Emphasis => Paint::new(text).italic(),
            Style::Strong => Paint::new(text).bold(),
            Style::Strike => Paint::new(text).strike(),
            Style::Link => Paint::magenta(text).underline(),
            Style::Body => Paint::new(text),
        };
        buf.push_str(&painted.to_string());
    } else {
        buf.push_str(text);
    }
}
