//! Numbered-list response parsing and count-parity repair.

use metrics::counter;
use tracing::warn;

/// Outcome of parsing an engine response against an expected batch size.
#[derive(Debug, Clone, PartialEq)]
pub enum ParseOutcome {
    /// Exactly the expected number of items parsed.
    Parsed(Vec<String>),
    /// Some numbered items parsed, but not the expected count.
    PartiallyParsed { items: Vec<String>, expected: usize },
    /// No numbered items found at all.
    Unparseable { raw: String },
}

/// Parse an engine response into numbered items.
///
/// A numbered item starts with `N.`, `N)` or `N:`; lines without a number
/// continue the previous item. Markdown code fences around the whole
/// response are stripped first.
pub fn parse_numbered_response(raw: &str, expected: usize) -> ParseOutcome {
    let body = strip_fences(raw);

    let mut items: Vec<String> = Vec::new();
    for line in body.lines() {
        let trimmed = line.trim();
        if trimmed.is_empty() {
            continue;
        }
        match split_numbered(trimmed) {
            Some(text) => items.push(text.to_string()),
            None => {
                if let Some(last) = items.last_mut() {
                    last.push('\n');
                    last.push_str(trimmed);
                }
                // Preamble before the first numbered item is dropped
            }
        }
    }

    if items.is_empty() {
        ParseOutcome::Unparseable {
            raw: body.to_string(),
        }
    } else if items.len() == expected {
        ParseOutcome::Parsed(items)
    } else {
        ParseOutcome::PartiallyParsed { items, expected }
    }
}

/// Strip a leading "N." / "N)" / "N:" marker, returning the remainder.
fn split_numbered(line: &str) -> Option<&str> {
    let digits = line.chars().take_while(|c| c.is_ascii_digit()).count();
    if digits == 0 {
        return None;
    }
    let rest = &line[digits..];
    let rest = rest
        .strip_prefix('.')
        .or_else(|| rest.strip_prefix(')'))
        .or_else(|| rest.strip_prefix(':'))?;
    Some(rest.trim_start())
}

/// Strip a markdown code fence wrapping the whole response.
fn strip_fences(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    // Skip the info string on the opening fence line
    let inner = match inner.find('\n') {
        Some(pos) => &inner[pos + 1..],
        None => inner,
    };
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

/// Force `outcome` into exactly `expected` items, repairing count mismatches.
///
/// Excess items are merged pairwise from the tail (the engine split one
/// input into two outputs); a fully unparseable response falls back to its
/// non-empty lines; any remaining shortfall is padded with the original
/// untranslated text so no entry is ever dropped. This is best-effort
/// realignment, which is why callers still run a final parity check.
pub fn align_batch(outcome: ParseOutcome, expected: usize, originals: &[String]) -> Vec<String> {
    debug_assert_eq!(originals.len(), expected);

    let mut items = match outcome {
        ParseOutcome::Parsed(items) => items,
        ParseOutcome::PartiallyParsed { items, .. } => items,
        ParseOutcome::Unparseable { raw } => {
            warn!("Engine response had no numbered items, falling back to raw lines");
            counter!("subflow_translation_repairs_total", "kind" => "line_fallback").increment(1);
            raw.lines()
                .map(str::trim)
                .filter(|l| !l.is_empty())
                .map(String::from)
                .collect()
        }
    };

    if items.len() > expected {
        warn!(
            got = items.len(),
            expected, "Engine returned excess items, merging from the tail"
        );
        counter!("subflow_translation_repairs_total", "kind" => "merge_excess").increment(1);
        while items.len() > expected {
            // Join the last two items so tail entries re-align
            let tail = items.pop().unwrap_or_default();
            if let Some(prev) = items.last_mut() {
                prev.push('\n');
                prev.push_str(&tail);
            }
        }
    }

    if items.len() < expected {
        warn!(
            got = items.len(),
            expected, "Engine returned too few items, padding with original text"
        );
        counter!("subflow_translation_repairs_total", "kind" => "pad_original")
            .increment((expected - items.len()) as u64);
        for original in &originals[items.len()..] {
            items.push(original.clone());
        }
    }

    items
}

#[cfg(test)]
mod tests {
    use super::*;

    fn originals(n: usize) -> Vec<String> {
        (1..=n).map(|i| format!("original {}", i)).collect()
    }

    #[test]
    fn test_parse_clean_numbered_list() {
        let raw = "1. First line\n2. Second line\n3. Third line";
        match parse_numbered_response(raw, 3) {
            ParseOutcome::Parsed(items) => {
                assert_eq!(items, vec!["First line", "Second line", "Third line"]);
            }
            other => panic!("expected Parsed, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_alternate_markers_and_fences() {
        let raw = "```\n1) One\n2: Two\n```";
        match parse_numbered_response(raw, 2) {
            ParseOutcome::Parsed(items) => assert_eq!(items, vec!["One", "Two"]),
            other => panic!("expected Parsed, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_continuation_lines_join() {
        let raw = "1. First part\nstill first\n2. Second";
        match parse_numbered_response(raw, 2) {
            ParseOutcome::Parsed(items) => {
                assert_eq!(items[0], "First part\nstill first");
                assert_eq!(items[1], "Second");
            }
            other => panic!("expected Parsed, got {:?}", other),
        }
    }

    #[test]
    fn test_parse_unparseable() {
        let raw = "Sorry, I cannot translate that.";
        assert!(matches!(
            parse_numbered_response(raw, 3),
            ParseOutcome::Unparseable { .. }
        ));
    }

    #[test]
    fn test_align_merges_trailing_excess() {
        let outcome = parse_numbered_response("1. a\n2. b\n3. c\n4. d", 3);
        let items = align_batch(outcome, 3, &originals(3));
        assert_eq!(items, vec!["a", "b", "c\nd"]);
    }

    #[test]
    fn test_align_merges_multiple_excess() {
        let outcome = parse_numbered_response("1. a\n2. b\n3. c\n4. d\n5. e", 3);
        let items = align_batch(outcome, 3, &originals(3));
        assert_eq!(items, vec!["a", "b", "c\nd\ne"]);
    }

    #[test]
    fn test_align_pads_shortfall_with_originals() {
        let outcome = parse_numbered_response("1. a\n2. b", 4);
        let items = align_batch(outcome, 4, &originals(4));
        assert_eq!(items, vec!["a", "b", "original 3", "original 4"]);
    }

    #[test]
    fn test_align_unparseable_falls_back_to_lines() {
        let outcome = ParseOutcome::Unparseable {
            raw: "uno\ndos\ntres".to_string(),
        };
        let items = align_batch(outcome, 3, &originals(3));
        assert_eq!(items, vec!["uno", "dos", "tres"]);
    }

    #[test]
    fn test_align_unparseable_short_pads() {
        let outcome = ParseOutcome::Unparseable {
            raw: "only line".to_string(),
        };
        let items = align_batch(outcome, 3, &originals(3));
        assert_eq!(items, vec!["only line", "original 2", "original 3"]);
    }
}
