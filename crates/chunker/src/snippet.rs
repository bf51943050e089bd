//! Snippet derivation — short previews for low-detail index tiers.

use engram_core::SnippetStrategy;

/// Derive a preview of at most `max_chars` characters from `content`.
///
/// All strategies are deterministic. A truncated preview ends in `…`.
pub fn make_snippet(content: &str, strategy: SnippetStrategy, max_chars: usize) -> String {
    if max_chars == 0 || content.is_empty() {
        return String::new();
    }
    let text = match strategy {
        SnippetStrategy::First => content.trim_start(),
        SnippetStrategy::SemanticCore => core_sentence(content),
        SnippetStrategy::Summary => return clamp(&summarize(content, max_chars), max_chars),
    };
    clamp(text, max_chars)
}

/// Truncate to `max_chars` characters on a char boundary, marking the cut.
fn clamp(text: &str, max_chars: usize) -> String {
    let mut chars = text.chars();
    let mut out: String = chars.by_ref().take(max_chars).collect();
    if chars.next().is_some() {
        out.pop();
        out.push('…');
    }
    out
}

/// Sentence boundaries: `.`, `!`, `?`, and newlines.
fn sentences(content: &str) -> Vec<&str> {
    content
        .split_inclusive(['.', '!', '?', '\n'])
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

/// The highest-information sentence: longest, weighted toward the front of
/// the content. Ties resolve to the earlier sentence.
fn core_sentence(content: &str) -> &str {
    let sentences = sentences(content);
    let mut best: &str = content;
    let mut best_score = f32::MIN;
    for (idx, sentence) in sentences.iter().enumerate() {
        let weight = 1.0 / (1.0 + idx as f32 * 0.15);
        let score = sentence.chars().count() as f32 * weight;
        if score > best_score {
            best_score = score;
            best = *sentence;
        }
    }
    best
}

/// "first sentence … last sentence" elision.
fn summarize(content: &str, max_chars: usize) -> String {
    let sentences = sentences(content);
    match sentences.as_slice() {
        [] => String::new(),
        [only] => (*only).to_string(),
        [first, .., last] => {
            // Give each end half the budget so both survive the final clamp.
            let half = (max_chars / 2).saturating_sub(2).max(1);
            format!("{} … {}", clamp(first, half), clamp(last, half))
        }
    }
}
