use crate::models::chat::{EmoteRef, MessageSegment};
use once_cell::sync::Lazy;
use regex::{CaptureMatches, Regex};

const EMOTE_CDN: &str = "https://files.kick.com/emotes";

/// Inline marker used by Kick when no positional emote list is sent
static EMOTE_MARKER: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\[emote:(\d+):([^\]]+)\]").expect("emote marker pattern is valid"));

pub fn emote_image_url(emote_id: &str) -> String {
    format!("{}/{}/fullsize", EMOTE_CDN, emote_id)
}

/// Split a message into text and emote segments.
///
/// Positional refs win when present; otherwise the text is scanned for
/// `[emote:<id>:<name>]` markers. The two sources are never merged.
pub fn segment_message<'t>(text: &'t str, emotes: &[EmoteRef]) -> Segments<'t> {
    let mode = if emotes.is_empty() {
        Mode::Markers {
            matches: EMOTE_MARKER.captures_iter(text),
            last: 0,
        }
    } else {
        let mut sorted = emotes.to_vec();
        sorted.sort_by_key(|e| e.start);

        // Byte offset of every char start, plus the end of the text
        let mut boundaries: Vec<usize> = text.char_indices().map(|(i, _)| i).collect();
        boundaries.push(text.len());

        Mode::Offsets {
            emotes: sorted.into_iter(),
            boundaries,
            last: 0,
        }
    };

    Segments {
        text,
        mode,
        pending: None,
    }
}

/// Flatten a message into plain text, emotes shown as `:name:`
pub fn render_plain(text: &str, emotes: &[EmoteRef]) -> String {
    segment_message(text, emotes)
        .map(|segment| match segment {
            MessageSegment::Text { content } => content,
            MessageSegment::Emote { name, .. } => format!(":{}:", name),
        })
        .collect()
}

enum Mode<'t> {
    Markers {
        matches: CaptureMatches<'static, 't>,
        last: usize,
    },
    Offsets {
        emotes: std::vec::IntoIter<EmoteRef>,
        boundaries: Vec<usize>,
        // char offset
        last: usize,
    },
}

/// Lazy segment sequence; recompute per call, it cannot be restarted
pub struct Segments<'t> {
    text: &'t str,
    mode: Mode<'t>,
    pending: Option<MessageSegment>,
}

impl Iterator for Segments<'_> {
    type Item = MessageSegment;

    fn next(&mut self) -> Option<MessageSegment> {
        if let Some(segment) = self.pending.take() {
            return Some(segment);
        }

        let text = self.text;
        let (before, emote) = match &mut self.mode {
            Mode::Markers { matches, last } => match matches.next() {
                Some(caps) => {
                    let whole = caps.get(0)?;
                    let before = &text[*last..whole.start()];
                    *last = whole.end();
                    let emote_id = caps[1].to_string();
                    let emote = MessageSegment::Emote {
                        name: caps[2].to_string(),
                        emote_url: Some(emote_image_url(&emote_id)),
                        emote_id: Some(emote_id),
                    };
                    (before, emote)
                }
                None => {
                    let rest = &text[*last..];
                    *last = text.len();
                    return (!rest.is_empty()).then(|| MessageSegment::text(rest));
                }
            },
            Mode::Offsets {
                emotes,
                boundaries,
                last,
            } => {
                let char_count = boundaries.len() - 1;
                let byte_at = |ci: usize| boundaries[ci.min(char_count)];
                match emotes.next() {
                    Some(emote) => {
                        let before = if emote.start > *last {
                            &text[byte_at(*last)..byte_at(emote.start)]
                        } else {
                            ""
                        };
                        *last = (*last).max(emote.end.saturating_add(1));
                        (before, offset_emote(emote))
                    }
                    None => {
                        let rest = if *last < char_count {
                            &text[byte_at(*last)..]
                        } else {
                            ""
                        };
                        *last = char_count;
                        return (!rest.is_empty()).then(|| MessageSegment::text(rest));
                    }
                }
            }
        };

        if before.is_empty() {
            Some(emote)
        } else {
            self.pending = Some(emote);
            Some(MessageSegment::text(before))
        }
    }
}

fn offset_emote(emote: EmoteRef) -> MessageSegment {
    let emote_url = emote
        .src
        .filter(|src| !src.is_empty())
        .or_else(|| emote.id.as_deref().map(emote_image_url));
    MessageSegment::Emote {
        name: emote.name,
        emote_id: emote.id,
        emote_url,
    }
}
