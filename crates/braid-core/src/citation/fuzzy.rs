//! Approximate string matching for quote verification.
//!
//! `partial_ratio` scores how well a quote occurs inside a passage. It aligns
//! the quote against the passage substring that minimises the Indel distance
//! `d` (insertions and deletions cost 1, a substitution costs 2) and reports
//! the Indel similarity `100 · (1 − d / (|quote| + |substring|))`.
//!
//! The quote is always the needle: text the quote adds beyond the passage
//! counts as deletions, so a quote that wraps the whole passage in invented
//! text cannot score 100. Comparison is case-insensitive and whitespace runs
//! collapse to a single space, so line breaks from PDF extraction do not
//! count as edits. Cost is `O(|quote| · |passage|)`.

/// Lowercase and collapse whitespace.
pub fn normalize(text: &str) -> Vec<char> {
    let mut out = Vec::with_capacity(text.len());
    let mut pending_space = false;
    for c in text.trim().chars() {
        if c.is_whitespace() {
            pending_space = true;
            continue;
        }
        if pending_space {
            out.push(' ');
            pending_space = false;
        }
        out.extend(c.to_lowercase());
    }
    out
}

/// Similarity of `quote` as a substring of `passage`, in `0.0..=100.0`.
///
/// An exact substring scores 100; an empty quote scores 0.
pub fn partial_ratio(quote: &str, passage: &str) -> f32 {
    let needle = normalize(quote);
    let haystack = normalize(passage);

    if needle.is_empty() {
        return 0.0;
    }
    if needle.len() <= haystack.len() && contains(&haystack, &needle) {
        return 100.0;
    }

    let alignment = best_substring_alignment(&needle, &haystack);
    let total = needle.len() + alignment.length;
    (100.0 * (1.0 - alignment.distance as f64 / total as f64)).max(0.0) as f32
}

/// Result of aligning a needle against its best haystack substring.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Alignment {
    /// Indel distance between the needle and the substring.
    pub distance: usize,
    /// Length of the substring, in chars.
    pub length: usize,
}

/// Semi-global alignment of `needle` inside `haystack`.
///
/// The substring may start and end anywhere for free; every needle char must
/// be matched or deleted. Among equal distances the longer substring wins,
/// since it gives the higher similarity.
pub fn best_substring_alignment(needle: &[char], haystack: &[char]) -> Alignment {
    // (distance, substring start) for the needle prefix ending at column j
    let mut prev: Vec<(usize, usize)> = (0..=haystack.len()).map(|j| (0, j)).collect();
    let mut curr = prev.clone();

    for (i, &cn) in needle.iter().enumerate() {
        curr[0] = (i + 1, 0);
        for (j, &ch) in haystack.iter().enumerate() {
            let diagonal = (prev[j].0 + if cn == ch { 0 } else { 2 }, prev[j].1);
            let delete = (prev[j + 1].0 + 1, prev[j + 1].1);
            let insert = (curr[j].0 + 1, curr[j].1);
            curr[j + 1] = [diagonal, delete, insert]
                .into_iter()
                .min()
                .unwrap_or(diagonal);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev.iter()
        .enumerate()
        .map(|(end, &(distance, start))| Alignment {
            distance,
            length: end - start,
        })
        .min_by(|a, b| {
            let ra = a.distance as f64 / (needle.len() + a.length) as f64;
            let rb = b.distance as f64 / (needle.len() + b.length) as f64;
            ra.total_cmp(&rb)
        })
        .unwrap_or(Alignment {
            distance: needle.len(),
            length: 0,
        })
}

fn contains(haystack: &[char], needle: &[char]) -> bool {
    haystack.windows(needle.len()).any(|w| w == needle)
}

/// Maximal ASCII digit runs, in order of appearance.
pub fn digit_runs(text: &str) -> Vec<&str> {
    let mut runs = Vec::new();
    let mut start = None;
    for (i, c) in text.char_indices() {
        match (c.is_ascii_digit(), start) {
            (true, None) => start = Some(i),
            (false, Some(s)) => {
                runs.push(&text[s..i]);
                start = None;
            }
            _ => {}
        }
    }
    if let Some(s) = start {
        runs.push(&text[s..]);
    }
    runs
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_exact_substring_is_100() {
        let passage = "By mid 2027, OpenBrain has a week-long lead over its rivals.";
        assert_eq!(partial_ratio("OpenBrain has a week-long lead", passage), 100.0);
        assert_eq!(partial_ratio("openbrain HAS a week-long lead", passage), 100.0);
        assert_eq!(partial_ratio(passage, passage), 100.0);
    }

    #[test]
    fn test_single_substitution() {
        // one substitution = distance 2 over a 16-char quote: 100 * (1 - 2/32)
        let score = partial_ratio("Agent-9 launches", "Agent-1 launches");
        assert!((score - 93.75).abs() < 1e-4);
    }

    #[test]
    fn test_unrelated_text_scores_low() {
        let score = partial_ratio(
            "the committee votes to slow down",
            "Agent-4 escapes and copies its weights to external servers",
        );
        assert!(score < 85.0, "score was {}", score);
    }

    #[test]
    fn test_quote_wrapping_passage_is_penalized() {
        let passage = "Agent-1 launches and speeds up research.";
        let quote = "Agent-1 launches and speeds up research. Then the machines seize every \
                     government on Earth and abolish elections forever.";
        let score = partial_ratio(quote, passage);
        assert!(score < 85.0, "score was {}", score);

        // the passage inside a longer quote is not an exact match
        assert!(partial_ratio(quote, passage) < partial_ratio(passage, quote));
    }

    #[test]
    fn test_whitespace_and_case_collapse() {
        let passage = "The President\n   signs the\tbill.";
        assert_eq!(partial_ratio("the president signs the bill", passage), 100.0);
    }

    #[test]
    fn test_empty_inputs() {
        assert_eq!(partial_ratio("", "anything"), 0.0);
        assert_eq!(partial_ratio("   ", ""), 0.0);
        assert_eq!(partial_ratio("a quote", ""), 0.0);
        assert_eq!(partial_ratio("a quote", "   "), 0.0);
    }

    #[test]
    fn test_best_substring_alignment() {
        let chars = |s: &str| s.chars().collect::<Vec<_>>();
        let align = |n: &str, h: &str| best_substring_alignment(&chars(n), &chars(h));

        assert_eq!(align("ace", "xxacexx"), Alignment { distance: 0, length: 3 });
        // one insertion: "abde" against "abcde"
        assert_eq!(align("abde", "xxabcdexx"), Alignment { distance: 1, length: 5 });
        assert_eq!(align("abc", ""), Alignment { distance: 3, length: 0 });
        // three trailing deletions
        assert_eq!(align("abcdef", "abc"), Alignment { distance: 3, length: 3 });
    }

    #[test]
    fn test_digit_runs() {
        assert_eq!(digit_runs("Agent-4 in mid 2027, v1.25"), vec!["4", "2027", "1", "25"]);
        assert!(digit_runs("no numbers").is_empty());
        assert_eq!(digit_runs("2026"), vec!["2026"]);
    }
}
