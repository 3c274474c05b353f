use crate::models::{Chunk, Document, WindowConfig};
use regex::Regex;
use std::sync::OnceLock;
use tracing::debug;

/// Separators tried, in order, when picking where a retrieval window ends.
const WINDOW_SEPARATORS: [&str; 4] = ["\n\n", "\n", ". ", " "];

const PARAGRAPH_JOINER: &str = "\n\n";

pub fn page_marker(number: u32) -> String {
    format!("--- Page {number} ---")
}

fn page_marker_re() -> &'static Regex {
    static PAGE_MARKER: OnceLock<Regex> = OnceLock::new();
    PAGE_MARKER.get_or_init(|| {
        Regex::new(r"(?m)^[ \t]*--- Page \d+ ---[ \t]*$").expect("page marker pattern is valid")
    })
}

fn blank_line_re() -> &'static Regex {
    static BLANK_LINE: OnceLock<Regex> = OnceLock::new();
    BLANK_LINE.get_or_init(|| Regex::new(r"\n[ \t]*\n").expect("blank line pattern is valid"))
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Collapses runs of spaces and tabs inside lines and squeezes blank-line runs
/// down to a single paragraph break. Line and paragraph structure survives.
pub fn normalize_page_text(text: &str) -> String {
    let mut lines = Vec::new();
    let mut previous_blank = true;

    for line in text.replace('\u{a0}', " ").lines() {
        let collapsed = line.split_whitespace().collect::<Vec<_>>().join(" ");
        if collapsed.is_empty() {
            if !previous_blank {
                lines.push(String::new());
            }
            previous_blank = true;
        } else {
            lines.push(collapsed);
            previous_blank = false;
        }
    }

    while lines.last().is_some_and(|line| line.is_empty()) {
        lines.pop();
    }

    lines.join("\n")
}

/// Splits `text` into pieces of at most `max_chars` characters, preferring page
/// markers, then blank-line paragraph breaks, and cutting by length only for
/// paragraphs that are too large on their own.
pub fn split_into_chunks(text: &str, max_chars: usize) -> Vec<String> {
    let max_chars = max_chars.max(1);
    if char_len(text) <= max_chars {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut current = String::new();

    for section in split_pages(text) {
        let section = section.trim();
        if section.is_empty() {
            continue;
        }

        if char_len(section) <= max_chars {
            push_segment(&mut chunks, &mut current, section, max_chars);
            continue;
        }

        for paragraph in split_paragraphs(section) {
            if char_len(paragraph) <= max_chars {
                push_segment(&mut chunks, &mut current, paragraph, max_chars);
            } else {
                flush(&mut chunks, &mut current);
                chunks.extend(hard_split(paragraph, max_chars));
            }
        }
    }

    flush(&mut chunks, &mut current);

    if chunks.is_empty() {
        debug!(chars = char_len(text), "no split point found, keeping text whole");
        return vec![text.to_string()];
    }

    chunks
}

fn split_pages(text: &str) -> Vec<&str> {
    let mut sections = Vec::new();
    let mut cursor = 0;

    for marker in page_marker_re().find_iter(text) {
        if marker.start() > cursor {
            sections.push(&text[cursor..marker.start()]);
        }
        cursor = marker.start();
    }

    sections.push(&text[cursor..]);
    sections
}

fn split_paragraphs(section: &str) -> Vec<&str> {
    blank_line_re()
        .split(section)
        .map(str::trim)
        .filter(|paragraph| !paragraph.is_empty())
        .collect()
}

fn push_segment(chunks: &mut Vec<String>, current: &mut String, segment: &str, max_chars: usize) {
    if current.is_empty() {
        current.push_str(segment);
        return;
    }

    if char_len(current) + PARAGRAPH_JOINER.len() + char_len(segment) <= max_chars {
        current.push_str(PARAGRAPH_JOINER);
        current.push_str(segment);
    } else {
        chunks.push(std::mem::take(current));
        current.push_str(segment);
    }
}

fn flush(chunks: &mut Vec<String>, current: &mut String) {
    if !current.is_empty() {
        chunks.push(std::mem::take(current));
    }
}

fn hard_split(text: &str, max_chars: usize) -> Vec<String> {
    let chars: Vec<char> = text.chars().collect();
    chars
        .chunks(max_chars)
        .map(|piece| piece.iter().collect())
        .collect()
}

/// Overlapping windows for the retrieval index. Each window holds at most
/// `config.size` characters and starts `config.overlap` characters before the
/// previous one ended.
pub fn split_windows(text: &str, config: WindowConfig) -> Vec<String> {
    let size = config.size.max(1);
    let overlap = config.overlap.min(size - 1);
    let chars: Vec<char> = text.chars().collect();

    let mut windows = Vec::new();
    let mut start = 0;

    while start < chars.len() {
        let end = if chars.len() - start <= size {
            chars.len()
        } else {
            let floor = start + (size / 2).max(overlap + 1);
            find_break(&chars, floor, start + size)
        };

        let window: String = chars[start..end].iter().collect();
        let trimmed = window.trim();
        if !trimmed.is_empty() {
            windows.push(trimmed.to_string());
        }

        if end == chars.len() {
            break;
        }
        start = end - overlap;
    }

    windows
}

/// Latest position in `floor..=ceiling` that ends a separator, by separator priority.
fn find_break(chars: &[char], floor: usize, ceiling: usize) -> usize {
    for separator in WINDOW_SEPARATORS {
        let separator: Vec<char> = separator.chars().collect();
        let lowest = floor.max(separator.len());
        let mut position = ceiling;

        while position >= lowest {
            if chars[position - separator.len()..position] == separator[..] {
                return position;
            }
            position -= 1;
        }
    }

    ceiling
}

pub fn chunk_document(document: &Document, max_chars: usize) -> Vec<Chunk> {
    into_chunks(&document.id, split_into_chunks(&document.text, max_chars))
}

pub fn window_document(document: &Document, config: WindowConfig) -> Vec<Chunk> {
    into_chunks(&document.id, split_windows(&document.text, config))
}

fn into_chunks(document_id: &str, texts: Vec<String>) -> Vec<Chunk> {
    let total = texts.len();
    texts
        .into_iter()
        .enumerate()
        .map(|(index, text)| Chunk {
            document_id: document_id.to_string(),
            index,
            total,
            text,
        })
        .collect()
}
