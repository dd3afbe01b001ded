//! Text recovery from the gzip-compressed note body blobs.
//!
//! The blob is an undocumented protobuf document. Instead of decoding it we
//! scan for runs of text-looking bytes and keep the plausible ones. The
//! scan is lossy on purpose: multi-byte characters whose continuation bytes
//! fall below 0xC0 split a run, and display filtering gives up after a burst
//! of noise lines, which can drop real text that follows attachment or table
//! internals.

use std::io::Read;
use std::sync::OnceLock;

use flate2::read::GzDecoder;
use regex::Regex;

/// Runs shorter than this are framing noise, not words.
const MIN_RUN_LEN: usize = 3;
/// Lines up to this many characters are checked for being binary noise.
const SHORT_LINE_MAX: usize = 10;
/// Display output stops once this many noise lines have been seen in a row.
const MAX_CONSECUTIVE_JUNK: usize = 3;

const FONT_ARTIFACTS: &[&str] = &["Helvetica", "Helvetica Neue", "SF Pro"];
const TYPE_ID_PREFIXES: &[&str] = &["public.", "com.apple."];
const ATTACHMENT_PLACEHOLDER: &str = "[Attachment]";

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Mode {
    /// Fragments joined by spaces, only good for substring matching.
    Search,
    /// Line-structured text with metadata noise filtered out.
    Display,
}

/// Extract text from a compressed note body. Never fails: anything that is
/// not a gzip stream yields an empty string.
pub fn extract(blob: &[u8], mode: Mode) -> String {
    if blob.is_empty() {
        return String::new();
    }
    let mut decompressed = Vec::new();
    if GzDecoder::new(blob).read_to_end(&mut decompressed).is_err() {
        return String::new();
    }

    let fragments = text_fragments(&decompressed);
    match mode {
        Mode::Search => fragments.join(" "),
        Mode::Display => display_text(&fragments),
    }
}

pub fn search_text(blob: &[u8]) -> String {
    extract(blob, Mode::Search)
}

fn is_text_byte(b: u8) -> bool {
    matches!(b, 0x20..=0x7E | b'\t' | b'\n' | b'\r') || b >= 0xC0
}

/// Split raw bytes into runs of text-looking bytes, in scan order.
pub(crate) fn text_fragments(bytes: &[u8]) -> Vec<String> {
    let mut fragments = Vec::new();
    let mut start = None;

    for (i, &b) in bytes.iter().enumerate() {
        if is_text_byte(b) {
            start.get_or_insert(i);
        } else if let Some(s) = start.take() {
            push_fragment(&mut fragments, &bytes[s..i]);
        }
    }
    if let Some(s) = start {
        push_fragment(&mut fragments, &bytes[s..]);
    }
    fragments
}

fn push_fragment(fragments: &mut Vec<String>, run: &[u8]) {
    if run.len() < MIN_RUN_LEN {
        return;
    }
    let mut text = String::with_capacity(run.len());
    for chunk in run.utf8_chunks() {
        // invalid sequences are skipped, the valid remainder is kept
        text.push_str(chunk.valid());
    }
    if !text.is_empty() {
        fragments.push(text);
    }
}

fn uuid_pattern() -> &'static Regex {
    static UUID: OnceLock<Regex> = OnceLock::new();
    UUID.get_or_init(|| {
        Regex::new(
            r"^\$?[0-9a-fA-F]{8}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{4}-[0-9a-fA-F]{12}$",
        )
        .expect("uuid pattern compiles")
    })
}

fn is_metadata_line(stripped: &str) -> bool {
    FONT_ARTIFACTS.contains(&stripped)
        || uuid_pattern().is_match(stripped)
        || TYPE_ID_PREFIXES.iter().any(|p| stripped.starts_with(p))
}

fn looks_like_noise(stripped: &str) -> bool {
    let len = stripped.chars().count();
    if len > SHORT_LINE_MAX {
        return false;
    }
    let alpha = stripped.chars().filter(|c| c.is_alphabetic()).count();
    alpha * 2 <= len
}

pub(crate) fn display_text(fragments: &[String]) -> String {
    let mut kept: Vec<&str> = Vec::new();
    let mut junk_run = 0;

    for line in fragments.iter().flat_map(|f| f.split('\n')) {
        let stripped = line.trim();
        if stripped.is_empty() || is_metadata_line(stripped) {
            continue;
        }
        if looks_like_noise(stripped) {
            junk_run += 1;
            if junk_run > MAX_CONSECUTIVE_JUNK {
                break;
            }
            continue;
        }
        junk_run = 0;
        kept.push(line);
    }

    kept.join("\n")
        .replace('\u{FFFC}', ATTACHMENT_PLACEHOLDER)
        .trim()
        .to_string()
}
