//! Rich-text helpers for page HTML
//! Measures and splits editor HTML by visible (plain-text) characters

use quick_xml::escape::{resolve_html5_entity, unescape_with};
use quick_xml::events::Event;
use quick_xml::Reader;

/// Elements that never carry a closing tag
const VOID_ELEMENTS: &[&str] = &[
    "area", "br", "col", "embed", "hr", "img", "input", "link", "meta", "source", "wbr",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TagKind {
    Open,
    Close,
    /// Void element, self-closing tag, comment or doctype
    Standalone,
}

#[derive(Debug, Clone)]
enum Token<'a> {
    /// One visible character, ending at byte `end` of the source
    Char { ch: char, end: usize },
    Tag {
        kind: TagKind,
        name: String,
        raw: &'a str,
        end: usize,
    },
}

fn reader_offset(reader: &Reader<&[u8]>) -> usize {
    usize::try_from(reader.buffer_position()).unwrap_or(usize::MAX)
}

fn tag_name(raw: &[u8]) -> String {
    String::from_utf8_lossy(raw).to_ascii_lowercase()
}

/// Tokenizes HTML into visible characters and tags.
/// Returns `None` when the markup cannot be read (e.g. an unterminated tag).
fn tokenize(html: &str) -> Option<Vec<Token<'_>>> {
    let mut reader = Reader::from_str(html);
    let config = reader.config_mut();
    config.trim_text(false);
    config.check_end_names = false;
    config.allow_unmatched_ends = true;
    config.allow_dangling_amp = true;

    let mut tokens = Vec::new();
    loop {
        let start = reader_offset(&reader);
        let event = reader.read_event().ok()?;
        let end = reader_offset(&reader).min(html.len());
        let raw = html.get(start..end)?;

        match event {
            Event::Start(e) => {
                let name = tag_name(e.name().as_ref());
                let kind = if VOID_ELEMENTS.contains(&name.as_str()) {
                    TagKind::Standalone
                } else {
                    TagKind::Open
                };
                tokens.push(Token::Tag { kind, name, raw, end });
            }
            Event::End(e) => tokens.push(Token::Tag {
                kind: TagKind::Close,
                name: tag_name(e.name().as_ref()),
                raw,
                end,
            }),
            Event::Text(_) => push_chars(&mut tokens, raw, start),
            Event::GeneralRef(_) => match unescape_with(raw, resolve_html5_entity) {
                Ok(decoded) if decoded != raw => {
                    tokens.extend(decoded.chars().map(|ch| Token::Char { ch, end }))
                }
                // Unknown entities read as the literal text
                _ => push_chars(&mut tokens, raw, start),
            },
            Event::Eof => break,
            _ => tokens.push(Token::Tag {
                kind: TagKind::Standalone,
                name: String::new(),
                raw,
                end,
            }),
        }
    }

    Some(tokens)
}

fn push_chars(tokens: &mut Vec<Token<'_>>, text: &str, offset: usize) {
    tokens.extend(text.char_indices().map(|(i, ch)| Token::Char {
        ch,
        end: offset + i + ch.len_utf8(),
    }));
}

/// Visible text of an HTML fragment (tags removed, entities decoded).
/// Malformed markup yields an empty string.
pub fn plain_text(html: &str) -> String {
    match tokenize(html) {
        Some(tokens) => tokens
            .iter()
            .filter_map(|t| match t {
                Token::Char { ch, .. } => Some(*ch),
                Token::Tag { .. } => None,
            })
            .collect(),
        None => String::new(),
    }
}

/// Number of visible characters in an HTML fragment.
pub fn text_len(html: &str) -> usize {
    match tokenize(html) {
        Some(tokens) => tokens
            .iter()
            .filter(|t| matches!(t, Token::Char { .. }))
            .count(),
        None => 0,
    }
}

/// Splits HTML after `chars` visible characters.
///
/// Inline elements open at the cut are closed at the end of the head and
/// reopened at the start of the tail, so both halves stay well formed.
/// Closing tags directly after the cut stay with the head.
pub fn split_at_char(html: &str, chars: usize) -> (String, String) {
    let Some(tokens) = tokenize(html) else {
        return (String::new(), String::new());
    };
    if chars == 0 {
        return (String::new(), html.to_string());
    }

    let mut open: Vec<(&str, &str)> = Vec::new();
    let mut seen = 0;
    let mut cut = html.len();
    let mut idx = 0;

    while idx < tokens.len() {
        match &tokens[idx] {
            Token::Char { end, .. } => {
                seen += 1;
                if seen == chars {
                    cut = *end;
                    idx += 1;
                    // Let trailing closing tags stay with the head
                    while let Some(Token::Tag {
                        kind: TagKind::Close,
                        name,
                        end,
                        ..
                    }) = tokens.get(idx)
                    {
                        close_tag(&mut open, name);
                        cut = *end;
                        idx += 1;
                    }
                    break;
                }
            }
            Token::Tag { kind, name, raw, .. } => match kind {
                TagKind::Open => open.push((name.as_str(), *raw)),
                TagKind::Close => close_tag(&mut open, name),
                TagKind::Standalone => {}
            },
        }
        idx += 1;
    }

    if cut >= html.len() {
        return (html.to_string(), String::new());
    }

    let mut head = html[..cut].to_string();
    for (name, _) in open.iter().rev() {
        head.push_str("</");
        head.push_str(name);
        head.push('>');
    }

    let mut tail = String::new();
    for (_, raw) in &open {
        tail.push_str(raw);
    }
    tail.push_str(&html[cut..]);

    (head, tail)
}

fn close_tag(open: &mut Vec<(&str, &str)>, name: &str) {
    if let Some(pos) = open.iter().rposition(|(n, _)| *n == name) {
        open.truncate(pos);
    }
}
