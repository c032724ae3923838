//! Splitting outbound text into platform-sized messages.
//!
//! Lengths are counted in characters. Fenced code blocks are kept whole when
//! they fit; a block too long for one message is cut and re-fenced so every
//! fragment renders on its own.

use regex::Regex;
use std::sync::LazyLock;

/// Discord's per-message character limit.
pub const DISCORD_MESSAGE_LIMIT: usize = 2000;

const FENCE: &str = "```";
const FENCE_CLOSE: &str = "\n```";

static CODE_BLOCK_REGEX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?s)```.*?```").expect("hardcoded code block regex"));

/// Split `text` into chunks of at most `limit` characters, in order.
///
/// Never returns an empty list. Concatenating the chunks gives back `text`,
/// except for fences added around a code block that had to be cut and
/// whitespace-only pieces, which are dropped since they cannot be posted.
pub fn split(text: &str, limit: usize) -> Vec<String> {
    let limit = limit.max(1);
    if char_len(text) <= limit {
        return vec![text.to_string()];
    }

    let mut chunks = Vec::new();
    let mut remaining = text.to_string();
    while char_len(&remaining) > limit {
        let (chunk, rest) = next_chunk(&remaining, limit);
        chunks.push(chunk);
        remaining = rest;
    }
    if !remaining.is_empty() {
        chunks.push(remaining);
    }

    if chunks.iter().all(|chunk| is_blank(chunk)) {
        return chunks;
    }
    chunks.retain(|chunk| !is_blank(chunk));
    chunks
}

/// Cut one chunk off the front of `text`, which is longer than `limit`.
fn next_chunk(text: &str, limit: usize) -> (String, String) {
    if let Some(block) = CODE_BLOCK_REGEX.find(text) {
        let start = char_len(&text[..block.start()]);
        let end = char_len(&text[..block.end()]);

        if end <= limit {
            return split_at(text, block.end());
        }

        if start < limit {
            let head = &text[..block.start()];
            match head.rfind('\n') {
                Some(newline) if !is_blank(&head[..newline]) => {
                    return split_at(text, newline + 1);
                }
                _ => return force_split_block(text, block, limit),
            }
        }
    }

    split_at_line(text, limit)
}

/// Prefer the last newline within `limit` when it is past the midpoint.
fn split_at_line(text: &str, limit: usize) -> (String, String) {
    let limit_byte = byte_offset(text, limit);
    match text[..limit_byte].rfind('\n') {
        Some(newline) if char_len(&text[..newline]) > limit / 2 => split_at(text, newline + 1),
        _ => split_at(text, limit_byte),
    }
}

/// Cut inside a code block, closing the fence on the emitted chunk and
/// reopening it, with the same info string, on the remainder.
///
/// When the chunk would end before any of the block's code, the text in
/// front of the block is emitted alone instead.
fn force_split_block(text: &str, block: regex::Match<'_>, limit: usize) -> (String, String) {
    let start = char_len(&text[..block.start()]);
    let opening = opening_fence(block.as_str());

    if start + char_len(opening) + FENCE_CLOSE.len() >= limit {
        if start > 0 {
            return split_at(text, block.start());
        }
        return split_at(text, byte_offset(text, limit));
    }

    let reopen = if opening.ends_with('\n') {
        opening.to_string()
    } else {
        format!("{opening}\n")
    };
    let cut = byte_offset(text, limit - FENCE_CLOSE.len());
    let chunk = format!("{}{FENCE_CLOSE}", &text[..cut]);
    let rest = format!("{reopen}{}", &text[cut..]);
    (chunk, rest)
}

/// The fence line that opens `block`, including its info string and newline.
/// A block with no newline opens with a bare fence.
fn opening_fence(block: &str) -> &str {
    match block.find('\n') {
        Some(newline) => &block[..=newline],
        None => FENCE,
    }
}

fn is_blank(text: &str) -> bool {
    text.trim().is_empty()
}

fn split_at(text: &str, byte_index: usize) -> (String, String) {
    let (head, tail) = text.split_at(byte_index);
    (head.to_string(), tail.to_string())
}

fn char_len(text: &str) -> usize {
    text.chars().count()
}

/// Byte index of the `chars`-th character, or the end of `text`.
fn byte_offset(text: &str, chars: usize) -> usize {
    text.char_indices()
        .nth(chars)
        .map_or(text.len(), |(index, _)| index)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn fence_count(chunk: &str) -> usize {
        chunk.matches("```").count()
    }

    fn assert_within_limit(chunks: &[String], limit: usize) {
        for chunk in chunks {
            assert!(
                char_len(chunk) <= limit,
                "chunk of {} chars exceeds {limit}",
                char_len(chunk)
            );
        }
    }

    #[test]
    fn short_text_is_returned_whole() {
        assert_eq!(split("hello", 2000), vec!["hello"]);
        assert_eq!(split("", 2000), vec![""]);
    }

    #[test]
    fn long_unbroken_text_splits_at_limit() {
        let text = "a".repeat(2500);
        let chunks = split(&text, 2000);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].len(), 2000);
        assert_eq!(chunks[1].len(), 500);
    }

    #[test]
    fn prefers_newlines_past_the_midpoint() {
        let text = "this is a line of prose\n".repeat(200);
        let chunks = split(&text, 2000);

        assert_within_limit(&chunks, 2000);
        assert_eq!(chunks.concat(), text);
        for chunk in &chunks[..chunks.len() - 1] {
            assert!(chunk.ends_with('\n'));
        }
    }

    #[test]
    fn ignores_newlines_before_the_midpoint() {
        let text = format!("a\n{}", "b".repeat(3000));
        let chunks = split(&text, 2000);
        assert_eq!(char_len(&chunks[0]), 2000);
        assert_eq!(chunks.concat(), text);
    }

    #[test]
    fn small_code_block_is_never_broken() {
        let block = format!("```\n{}```", "let x = 1;\n".repeat(20));
        let text = format!(
            "{}{block}\n{}",
            "intro line\n".repeat(150),
            "tail line\n".repeat(100)
        );

        let chunks = split(&text, 2000);

        assert_within_limit(&chunks, 2000);
        assert_eq!(chunks.concat(), text);
        assert!(chunks.iter().any(|chunk| chunk.contains(&block)));
        assert!(chunks.iter().all(|chunk| fence_count(chunk) % 2 == 0));
    }

    #[test]
    fn straddling_block_moves_to_next_chunk() {
        let prefix = "line\n".repeat(300);
        let block = format!("```\n{}\n```", "y".repeat(1000));
        let text = format!("{prefix}{block}");

        assert_eq!(split(&text, 2000), vec![prefix, block]);
    }

    #[test]
    fn oversized_block_is_refenced() {
        let text = format!("```\n{}\n```", "z".repeat(3000));
        let chunks = split(&text, 2000);

        assert_within_limit(&chunks, 2000);
        assert_eq!(chunks.len(), 2);
        assert!(chunks[0].ends_with(FENCE_CLOSE));
        assert!(chunks[1].starts_with("```\n"));
        assert!(chunks.iter().all(|chunk| fence_count(chunk) == 2));
    }

    #[test]
    fn counts_characters_not_bytes() {
        let text = "é".repeat(2500);
        let chunks = split(&text, 2000);
        assert_eq!(char_len(&chunks[0]), 2000);
        assert_eq!(char_len(&chunks[1]), 500);
    }

    #[test]
    fn every_chunk_fits_for_mixed_text() {
        let text = (0..400)
            .map(|i| format!("item {i}: {}\n", "word ".repeat(i % 13)))
            .collect::<String>();

        for limit in [50, 333, 2000] {
            let chunks = split(&text, limit);
            assert_within_limit(&chunks, limit);
            assert_eq!(chunks.concat(), text);
        }
    }

    #[test]
    fn blank_lines_before_an_oversized_block_never_form_a_chunk() {
        let text = format!("{}\n\n```\n{}\n```", "a".repeat(1999), "z".repeat(3000));

        let chunks = split(&text, 2000);

        assert_within_limit(&chunks, 2000);
        assert!(chunks.iter().all(|chunk| !chunk.trim().is_empty()), "{chunks:?}");
        assert!(chunks.iter().all(|chunk| fence_count(chunk) % 2 == 0));
        assert_eq!(chunks[0], format!("{}\n", "a".repeat(1999)));
    }

    #[test]
    fn trailing_newline_after_a_full_block_is_dropped() {
        let block = format!("```\n{}\n```", "y".repeat(1992));
        let text = format!("{block}\n");

        assert_eq!(split(&text, 2000), vec![block]);
    }

    #[test]
    fn block_opening_at_the_limit_moves_to_the_next_chunk() {
        let prose = "a".repeat(1997);
        let text = format!("{prose}```\n{}\n```", "z".repeat(3000));

        let chunks = split(&text, 2000);

        assert_within_limit(&chunks, 2000);
        assert_eq!(chunks[0], prose);
        assert_eq!(
            chunks.iter().map(|chunk| fence_count(chunk)).collect::<Vec<_>>(),
            vec![0, 2, 2]
        );
    }

    #[test]
    fn refenced_fragments_keep_the_language_tag() {
        let text = format!("```rust\n{}```", "let x = 1;\n".repeat(300));

        let chunks = split(&text, 2000);

        assert_within_limit(&chunks, 2000);
        assert!(chunks.len() > 1);
        for chunk in &chunks {
            assert!(chunk.starts_with("```rust\n"), "{chunk:?}");
            assert_eq!(fence_count(chunk), 2);
        }
    }
}
