//! Markdown link extraction from raw text, skipping code spans and fences.

use std::ops::Range;
use std::sync::LazyLock;

use regex::bytes::Regex;

use crate::types::LinkOccurrence;

/// Inline link or image: `[text](target)` or `![alt](target "title")`.
/// Targets with whitespace, parentheses or angle brackets are not matched,
/// which leaves those links untouched.
#[allow(clippy::expect_used, reason = "hardcoded pattern, compile-time invariant")]
static LINK_PATTERN: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"!?\[([^\[\]\n]*)\]\(([^()\s<>]*)(\s+(?:"[^"\n]*"|'[^'\n]*'))?\)"#)
        .expect("valid regex")
});

/// A fence opener: its marker character and run length.
struct Fence {
    /// Number of marker characters in the opening run.
    len: usize,
    /// Either a backtick or a tilde.
    marker: char,
}

/// Extract every inline link outside code from a markdown document.
/// Links are returned in document order.
pub fn extract_links(text: &str) -> Vec<LinkOccurrence> {
    let masked = mask_code(text);
    let line_starts = line_start_offsets(text);
    let mut links = Vec::new();

    for cap in LINK_PATTERN.captures_iter(&masked) {
        let (Some(whole), Some(label), Some(target)) = (cap.get(0), cap.get(1), cap.get(2)) else {
            continue;
        };
        if is_escaped(&masked, whole.start()) {
            continue;
        }
        if let Some(link) = build_occurrence(text, &line_starts, whole.range(), label.range(), target.range()) {
            links.push(link);
        }
    }

    return links;
}

/// Assemble a `LinkOccurrence` from match ranges over the original text.
fn build_occurrence(
    text: &str,
    line_starts: &[usize],
    span: Range<usize>,
    label: Range<usize>,
    target: Range<usize>,
) -> Option<LinkOccurrence> {
    let raw_text = text.get(span.clone())?.to_string();
    let link_text = text.get(label)?.to_string();
    let target_str = text.get(target.clone())?.to_string();

    let line_idx = line_starts.partition_point(|&start| return start <= span.start).saturating_sub(1);
    let line_start = line_starts.get(line_idx).copied().unwrap_or(0);
    let line_end = text
        .get(line_start..)
        .and_then(|rest| return rest.find('\n'))
        .map_or(text.len(), |i| return line_start.saturating_add(i));
    let line_context = text.get(line_start..line_end).unwrap_or("").trim_end_matches('\r').to_string();

    return Some(LinkOccurrence {
        line: u32::try_from(line_idx.saturating_add(1)).unwrap_or(u32::MAX),
        line_context,
        link_text,
        raw_text,
        target: target_str,
        target_span: target,
    });
}

/// Whether the byte at `pos` is preceded by an odd number of backslashes.
fn is_escaped(bytes: &[u8], pos: usize) -> bool {
    let preceding = bytes.get(..pos).unwrap_or(&[]);
    let backslashes = preceding.iter().rev().take_while(|&&b| return b == b'\\').count();
    return !backslashes.is_multiple_of(2);
}

/// Byte offset of the start of every line.
fn line_start_offsets(text: &str) -> Vec<usize> {
    let mut starts = vec![0];
    starts.extend(text.match_indices('\n').map(|(i, _)| return i.saturating_add(1)));
    return starts;
}

/// Copy of `text` with every byte inside a code fence or code span replaced
/// by a space. Newlines are kept so offsets and line numbers still line up.
fn mask_code(text: &str) -> Vec<u8> {
    let mut bytes = text.as_bytes().to_vec();
    let fences = fenced_block_ranges(text);

    for range in &fences {
        blank(&mut bytes, range.clone());
    }
    for range in code_span_ranges(text, &fences) {
        blank(&mut bytes, range);
    }

    return bytes;
}

/// Replace the bytes in `range` with spaces, keeping line breaks.
fn blank(bytes: &mut [u8], range: Range<usize>) {
    if let Some(slice) = bytes.get_mut(range) {
        for b in slice.iter_mut().filter(|b| return **b != b'\n') {
            *b = b' ';
        }
    }
}

/// Parse a fence marker at the start of a line (up to three spaces of indent).
fn parse_fence(line: &str) -> Option<(Fence, &str)> {
    let indent = line.len().saturating_sub(line.trim_start_matches(' ').len());
    if indent > 3 {
        return None;
    }
    let rest = line.get(indent..)?;
    let marker = rest.chars().next().filter(|c| return *c == '`' || *c == '~')?;
    let len = rest.chars().take_while(|c| return *c == marker).count();
    if len < 3 {
        return None;
    }
    let info = rest.get(len..).unwrap_or("");
    return Some((Fence { len, marker }, info));
}

/// Byte ranges of fenced code blocks, opener and closer lines included.
/// An unclosed fence runs to the end of the document.
fn fenced_block_ranges(text: &str) -> Vec<Range<usize>> {
    let mut ranges = Vec::new();
    let mut open: Option<(Fence, usize)> = None;
    let mut offset = 0_usize;

    for line in text.split_inclusive('\n') {
        let line_end = offset.saturating_add(line.len());
        let content = line.trim_end_matches(['\n', '\r']);

        match open.take() {
            None => {
                if let Some((fence, info)) = parse_fence(content)
                    && !(fence.marker == '`' && info.contains('`'))
                {
                    open = Some((fence, offset));
                }
            },
            Some((fence, start)) => {
                let closes = parse_fence(content).is_some_and(|(closer, info)| {
                    return closer.marker == fence.marker && closer.len >= fence.len && info.trim().is_empty();
                });
                if closes {
                    ranges.push(start..line_end);
                } else {
                    open = Some((fence, start));
                }
            },
        }
        offset = line_end;
    }

    if let Some((_, start)) = open {
        ranges.push(start..text.len());
    }
    return ranges;
}

/// Byte ranges of inline code spans outside fenced blocks. A backtick run
/// opens a span only if a run of the same length closes it within the same
/// paragraph and before the next fence; otherwise the backticks are literal.
fn code_span_ranges(text: &str, fences: &[Range<usize>]) -> Vec<Range<usize>> {
    let bytes = text.as_bytes();
    let mut ranges = Vec::new();
    let mut pos = 0_usize;

    while pos < bytes.len() {
        if let Some(fence) = fences.iter().find(|f| return f.contains(&pos)) {
            pos = fence.end;
            continue;
        }
        if bytes.get(pos) != Some(&b'`') {
            pos = pos.saturating_add(1);
            continue;
        }

        let run = backtick_run_len(bytes, pos);
        let search_from = pos.saturating_add(run);
        let limit = fences
            .iter()
            .map(|f| return f.start)
            .filter(|&s| return s >= search_from)
            .min()
            .unwrap_or(bytes.len())
            .min(paragraph_end(text, search_from));

        match find_closing_run(bytes, search_from, limit, run) {
            Some(end) => {
                ranges.push(pos..end);
                pos = end;
            },
            None => pos = search_from,
        }
    }

    return ranges;
}

/// Offset of the first blank line after the line holding `from`, or the
/// end of the text. Code spans never cross a paragraph break.
fn paragraph_end(text: &str, from: usize) -> usize {
    let Some(rest) = text.get(from..) else {
        return text.len();
    };
    let mut lines = rest.split_inclusive('\n');
    let mut offset = from.saturating_add(lines.next().map_or(0, str::len));
    for line in lines {
        if line.trim().is_empty() {
            return offset;
        }
        offset = offset.saturating_add(line.len());
    }
    return text.len();
}

/// Length of the backtick run starting at `pos`.
fn backtick_run_len(bytes: &[u8], pos: usize) -> usize {
    return bytes.get(pos..).unwrap_or(&[]).iter().take_while(|&&b| return b == b'`').count();
}

/// Find a backtick run of exactly `run` bytes in `from..limit`; returns the
/// offset just past it.
fn find_closing_run(bytes: &[u8], from: usize, limit: usize, run: usize) -> Option<usize> {
    let mut pos = from;
    while pos < limit {
        if bytes.get(pos) == Some(&b'`') {
            let len = backtick_run_len(bytes, pos);
            let end = pos.saturating_add(len);
            if len == run && end <= limit {
                return Some(end);
            }
            pos = end;
        } else {
            pos = pos.saturating_add(1);
        }
    }
    return None;
}

#[cfg(test)]
#[allow(
    clippy::indexing_slicing,
    clippy::missing_docs_in_private_items,
    clippy::unwrap_used,
    reason = "tests"
)]
mod tests {
    use super::*;

    fn targets(text: &str) -> Vec<String> {
        return extract_links(text).into_iter().map(|l| return l.target).collect();
    }

    #[test]
    fn finds_links_and_images_with_positions() {
        let text = "# Title\n\nSee [Identity Addressing](/docs/concepts/identity-addressing) and ![diagram](img/Flow.png \"Flow\").\n";
        let links = extract_links(text);

        assert_eq!(links.len(), 2);
        let first = &links[0];
        assert_eq!(first.link_text, "Identity Addressing");
        assert_eq!(first.target, "/docs/concepts/identity-addressing");
        assert_eq!(first.raw_text, "[Identity Addressing](/docs/concepts/identity-addressing)");
        assert_eq!(first.line, 3);
        assert_eq!(&text[first.target_span.clone()], first.target);
        assert!(first.line_context.starts_with("See ["));

        assert_eq!(links[1].target, "img/Flow.png");
        assert_eq!(links[1].raw_text, "![diagram](img/Flow.png \"Flow\")");
    }

    #[test]
    fn skips_inline_code_spans() {
        assert!(targets("Use `[a](/docs/b)` literally.").is_empty());
        assert!(targets("Use ``code with ` and [a](/docs/b)`` here.").is_empty());
        assert_eq!(targets("`x` then [a](b.md) then `y`"), vec!["b.md"]);
    }

    #[test]
    fn unmatched_backtick_is_literal() {
        assert_eq!(targets("a ` stray then [a](b.md)"), vec!["b.md"]);
    }

    #[test]
    fn stray_backtick_does_not_reach_past_the_paragraph() {
        let text = "Press the ` key to open.\n\nSee [b](/docs/b.md).\n\nRun `ls` now.\n";
        assert_eq!(targets(text), vec!["/docs/b.md"]);
    }

    #[test]
    fn code_span_may_wrap_within_a_paragraph() {
        assert!(targets("Use `a\n[x](/docs/y)` here.").is_empty());
        assert_eq!(targets("Use `a\n  \n[x](y.md)` here."), vec!["y.md"]);
    }

    #[test]
    fn skips_fenced_blocks() {
        let text = "[before](a.md)\n```md\n[inside](/docs/b)\n```\n~~~\n[tilde](c)\n~~~\n[after](d.md)\n";
        assert_eq!(targets(text), vec!["a.md", "d.md"]);
    }

    #[test]
    fn unclosed_fence_runs_to_end() {
        assert_eq!(targets("[a](a.md)\n````\n[b](b)\n```\n[c](c)\n"), vec!["a.md"]);
    }

    #[test]
    fn malformed_links_are_ignored() {
        assert!(targets("[broken](no close").is_empty());
        assert!(targets("[spaced](a file.md)").is_empty());
        assert!(targets("[angle](<a file.md>)").is_empty());
        assert!(targets("\\[escaped](x.md)").is_empty());
    }

    #[test]
    fn nested_badge_matches_only_inner_image() {
        let text = "[![build](Badge.svg)](https://ci.example.com)";
        assert_eq!(targets(text), vec!["Badge.svg"]);
    }

    #[test]
    fn multibyte_text_inside_code_keeps_offsets() {
        let text = "`héllo [x](y)` and [ok](Zürich.md)";
        let links = extract_links(text);
        assert_eq!(links.len(), 1);
        assert_eq!(&text[links[0].target_span.clone()], "Zürich.md");
    }
}
