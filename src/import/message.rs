//! Word counting for native message files

use super::source::PipelineError;
use mail_parser::{MessageParser, MessagePart, MimeHeaders, PartType};
use regex::bytes::Regex;
use std::path::Path;
use std::sync::OnceLock;

/// Count the words of a raw message file.
///
/// The count is the number of whitespace-delimited tokens in the message's
/// plain-text content plus one, so it is never zero. Historical audit data
/// carries the same bias.
pub fn count_words(path: &Path) -> Result<u64, PipelineError> {
    let raw = std::fs::read(path).map_err(|source| PipelineError::MessageFile {
        path: path.to_path_buf(),
        source,
    })?;
    Ok(word_count(&counted_text(&raw)))
}

/// Tokens in `text` plus one
pub fn word_count(text: &str) -> u64 {
    text.split_whitespace().count() as u64 + 1
}

/// Text a message contributes to its word count.
///
/// Content without a leading header line is all body. Multipart messages
/// contribute their top-level `text/plain` parts, concatenated as-is; parts
/// nested in an inner multipart are not counted. Anything else contributes
/// its single body.
fn counted_text(raw: &[u8]) -> String {
    if !header_line_pattern().is_match(raw) {
        return String::from_utf8_lossy(raw).into_owned();
    }
    let Some(message) = MessageParser::default().parse(raw) else {
        return String::from_utf8_lossy(raw).into_owned();
    };
    let Some(root) = message.parts.first() else {
        return String::new();
    };

    match &root.body {
        PartType::Multipart(children) => children
            .iter()
            .filter_map(|&id| message.parts.get(id as usize))
            .filter(|part| is_plain_text(part))
            .filter_map(|part| match &part.body {
                PartType::Text(text) => Some(text.as_ref()),
                _ => None,
            })
            .collect(),
        PartType::Text(text) | PartType::Html(text) => text.to_string(),
        PartType::Binary(bytes) | PartType::InlineBinary(bytes) => {
            String::from_utf8_lossy(bytes).into_owned()
        }
        _ => String::new(),
    }
}

/// A header field, an mbox `From ` line or a folded continuation
fn header_line_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"^(?:From |[\x21-\x39\x3B-\x7E]*:|[\t ])").expect("header pattern is valid")
    })
}

/// Parts without a Content-Type default to text/plain
fn is_plain_text(part: &MessagePart) -> bool {
    match part.content_type() {
        Some(ct) => {
            ct.ctype().eq_ignore_ascii_case("text")
                && ct.subtype().map_or(true, |s| s.eq_ignore_ascii_case("plain"))
        }
        None => true,
    }
}
