//! Deterministic subtitle line reflow.
//!
//! Translation engines format their answers however they like; display
//! rules do not care. This module repositions line breaks so every entry
//! fits the subtitle layout: at most two lines, a fixed visible-width
//! budget per line, and dialogue entries always rendered as two
//! dash-prefixed lines. It never drops or fabricates text.

/// Visible-character budget per subtitle line.
pub const MAX_LINE_WIDTH: usize = 42;

const DASH_MARKERS: [char; 3] = ['-', '\u{2013}', '\u{2014}'];

/// Visible length of a string: inline markup tags like `<i>` are zero-width.
/// A `<` with no closing `>` is ordinary text, not the start of a tag.
pub fn visible_len(s: &str) -> usize {
    let mut len = 0;
    let mut rest = s;
    while let Some(open) = rest.find('<') {
        len += rest[..open].chars().count();
        match rest[open + 1..].find('>') {
            // "<>" carries no markup; both characters are visible
            Some(0) => {
                len += 2;
                rest = &rest[open + 2..];
            }
            Some(close) => rest = &rest[open + 1 + close + 1..],
            None => {
                len += rest[open..].chars().count();
                return len;
            }
        }
    }
    len + rest.chars().count()
}

/// Collapse escaped newlines, spaced ellipses, and whitespace runs into a
/// clean single-spaced string.
fn normalize(s: &str) -> String {
    // Literal "\n" or "/n" (any case) in the text are botched line breaks,
    // not content
    let s = s
        .replace("\\n", " ")
        .replace("\\N", " ")
        .replace("/n", " ")
        .replace("/N", " ");
    let collapsed = collapse_spaced_ellipsis(&s);
    collapsed.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Turn ". . ." style spaced ellipses into a tight "...".
fn collapse_spaced_ellipsis(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut chars = s.chars().peekable();
    while let Some(c) = chars.next() {
        out.push(c);
        if c != '.' {
            continue;
        }
        // Swallow whitespace that sits between consecutive dots
        loop {
            let mut lookahead = chars.clone();
            let mut skipped = false;
            while matches!(lookahead.peek(), Some(w) if w.is_whitespace()) {
                lookahead.next();
                skipped = true;
            }
            if skipped && lookahead.peek() == Some(&'.') {
                lookahead.next();
                out.push('.');
                chars = lookahead;
            } else {
                break;
            }
        }
    }
    out
}

/// A text is dialogue when at least two of its lines open with a dash.
fn looks_like_dialogue(text: &str) -> bool {
    text.lines()
        .filter(|line| {
            let trimmed = line.trim_start();
            trimmed.starts_with(DASH_MARKERS)
        })
        .count()
        >= 2
}

/// Reflow `translated` to satisfy display rules, using `original` only to
/// decide whether the entry is two-speaker dialogue.
pub fn reflow(original: &str, translated: &str) -> String {
    let normalized = normalize(translated);
    if normalized.is_empty() {
        return String::new();
    }

    // Either side looking like dialogue makes the entry dialogue
    if looks_like_dialogue(original) || looks_like_dialogue(translated) {
        return reflow_dialogue(translated, &normalized);
    }

    if visible_len(&normalized) <= MAX_LINE_WIDTH {
        return normalized;
    }

    match best_split(&normalized) {
        Some((line1, line2)) => format!("{}\n{}", line1, line2),
        None => normalized,
    }
}

/// Force exactly two dash-prefixed lines for a dialogue entry.
fn reflow_dialogue(raw_translated: &str, normalized: &str) -> String {
    // A line holding only literal break sequences is empty after
    // normalization and carries no content
    let real_lines: Vec<&str> = raw_translated
        .lines()
        .map(str::trim)
        .filter(|l| !normalize(l).is_empty())
        .collect();

    let (line1, line2) = if real_lines.len() >= 2 {
        (
            normalize(real_lines[0]),
            normalize(&real_lines[1..].join(" ")),
        )
    } else if let Some((a, b)) = split_at_second_dash(normalized) {
        (a, b)
    } else if let Some((a, b)) = best_split(normalized) {
        (a, b)
    } else {
        // Single word; nothing to split without fabricating text
        return ensure_dash(normalized);
    };

    format!("{}\n{}", ensure_dash(&line1), ensure_dash(&line2))
}

/// Split a one-line dialogue at the second dash marker, if the engine kept
/// the speakers separated by " - " style punctuation.
fn split_at_second_dash(s: &str) -> Option<(String, String)> {
    for marker in [" - ", " \u{2013} ", " \u{2014} "] {
        let mut search_from = 0;
        while let Some(rel) = s[search_from..].find(marker) {
            let pos = search_from + rel;
            // Skip a leading dash; the split point must sit inside the text
            if s[..pos].chars().count() > 2 {
                let first = s[..pos].trim();
                let second = s[pos + marker.len()..].trim();
                if !first.is_empty() && !second.is_empty() {
                    return Some((first.to_string(), second.to_string()));
                }
            }
            search_from = pos + marker.len();
        }
    }
    None
}

fn ensure_dash(line: &str) -> String {
    let trimmed = line.trim();
    if trimmed.starts_with(DASH_MARKERS) {
        trimmed.to_string()
    } else {
        format!("- {}", trimmed)
    }
}

/// Best-balanced two-line split over all word boundaries.
///
/// Candidates are scored lexicographically by (both lines fit the width
/// budget, length of the longer line, imbalance between the lines); the
/// scoring is total, so some boundary always wins even when nothing fits.
fn best_split(s: &str) -> Option<(String, String)> {
    let words: Vec<&str> = s.split_whitespace().collect();
    if words.len() < 2 {
        return None;
    }

    let mut best: Option<((usize, usize, usize), usize)> = None;
    for i in 1..words.len() {
        let len1: usize = visible_len(&words[..i].join(" "));
        let len2: usize = visible_len(&words[i..].join(" "));
        let fits = usize::from(len1 > MAX_LINE_WIDTH || len2 > MAX_LINE_WIDTH);
        let score = (fits, len1.max(len2), len1.abs_diff(len2));
        if best.map_or(true, |(s, _)| score < s) {
            best = Some((score, i));
        }
    }

    let (_, i) = best?;
    Some((words[..i].join(" "), words[i..].join(" ")))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_visible_len_ignores_tags() {
        assert_eq!(visible_len("<i>hello</i>"), 5);
        assert_eq!(visible_len("plain"), 5);
        assert_eq!(visible_len("<b>a</b> <i>b</i>"), 3);
    }

    #[test]
    fn test_visible_len_counts_bare_angle_bracket() {
        assert_eq!(visible_len("i <3 you"), 8);
        assert_eq!(visible_len("2 < 3"), 5);
        assert_eq!(visible_len("a<>b"), 4);
        // With a later ">" present, the run from "<" to it is one tag
        assert_eq!(visible_len("x < y <i>z</i>"), 3);
    }

    #[test]
    fn test_overwidth_line_with_bare_angle_bracket_still_splits() {
        let text = "when the count says 2 < 3 this very long sentence still has to wrap neatly";
        assert!(visible_len(text) > MAX_LINE_WIDTH);
        let out = reflow("x", text);
        assert_eq!(out.lines().count(), 2);
        assert_eq!(out.replace('\n', " "), text);
    }

    #[test]
    fn test_normalize_escaped_newlines_and_ellipsis() {
        assert_eq!(normalize("one\\ntwo"), "one two");
        assert_eq!(normalize("one/ntwo"), "one two");
        assert_eq!(normalize("one\\Ntwo"), "one two");
        assert_eq!(normalize("one/Ntwo"), "one two");
        assert_eq!(normalize("Wait. . ."), "Wait...");
        assert_eq!(normalize("  a   b\tc  "), "a b c");
    }

    #[test]
    fn test_short_entry_stays_single_line() {
        let out = reflow("Olá.", "Hello there.");
        assert_eq!(out, "Hello there.");
        assert!(!out.contains('\n'));
    }

    #[test]
    fn test_long_entry_splits_into_two_balanced_lines() {
        // 60 visible characters, no markup
        let text = "This translated sentence is exactly sixty characters long ok";
        assert_eq!(visible_len(text), 60);
        let out = reflow("original", text);

        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);

        // Brute-force check: no other word-boundary split scores better
        let words: Vec<&str> = text.split_whitespace().collect();
        let score = |l1: &str, l2: &str| {
            let (a, b) = (visible_len(l1), visible_len(l2));
            (
                usize::from(a > MAX_LINE_WIDTH || b > MAX_LINE_WIDTH),
                a.max(b),
                a.abs_diff(b),
            )
        };
        let chosen = score(lines[0], lines[1]);
        for i in 1..words.len() {
            let candidate = score(&words[..i].join(" "), &words[i..].join(" "));
            assert!(chosen <= candidate);
        }
    }

    #[test]
    fn test_split_never_drops_characters() {
        let text = "a very long line that absolutely must be split into exactly two output lines";
        let out = reflow("x", text);
        assert_eq!(out.replace('\n', " "), text);
    }

    #[test]
    fn test_dialogue_single_line_split_at_second_dash() {
        let out = reflow("- Estás bem?\n- Sim, estou.", "- You okay? - Yes, I am.");
        assert_eq!(out, "- You okay?\n- Yes, I am.");
    }

    #[test]
    fn test_dialogue_without_any_dash_uses_best_split() {
        let out = reflow("- Estás bem?\n- Sim, estou.", "You okay? Yes, I am.");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines[0].starts_with("- "));
        assert!(lines[1].starts_with("- "));
        assert_eq!(out.replace("- ", "").replace('\n', " "), "You okay? Yes, I am.");
    }

    #[test]
    fn test_dialogue_multi_line_translation_keeps_first_line() {
        let out = reflow(
            "- Vamos?\n- Sim.",
            "- Shall we go?\n- Yes.\n- Right now.",
        );
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "- Shall we go?");
        assert_eq!(lines[1], "- Yes. - Right now.");
    }

    #[test]
    fn test_dialogue_skips_lines_that_are_only_literal_breaks() {
        let out = reflow("- Olá.\n- Tudo bem?", "- Hello there. - Fine.\n\\n");
        assert_eq!(out, "- Hello there.\n- Fine.");
    }

    #[test]
    fn test_dialogue_detected_from_translated_side() {
        // Original is one speaker, engine produced dialogue formatting
        let out = reflow("single line", "- First speaker\n- Second speaker");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert!(lines.iter().all(|l| l.starts_with('-')));
    }

    #[test]
    fn test_empty_translation_stays_empty() {
        assert_eq!(reflow("something", "   "), "");
        assert_eq!(reflow("- a\n- b", ""), "");
    }

    #[test]
    fn test_unicode_dash_markers() {
        let original = "\u{2013} Sim?\n\u{2013} Não.";
        let out = reflow(original, "\u{2013} Yes? \u{2013} No.");
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[0], "\u{2013} Yes?");
        // Second half lost its dash at the split point and gets a plain one
        assert_eq!(lines[1], "- No.");
    }
}
