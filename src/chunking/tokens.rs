//! Token counting and token-bounded splitting.
//!
//! - Token counting: prefer `tiktoken-rs` for the configured encoding/model; fall back to a
//!   whitespace counter when the tokenizer cannot be loaded.
//! - Splitting: `semchunk-rs` produces semantic windows. Any window it leaves over the budget is
//!   re-split at line breaks, then words, then characters. An optional sliding overlap prepends
//!   the tail of the previous window without exceeding the budget.

use anyhow::Error as TokenizerError;
use semchunk_rs::Chunker;
use std::sync::Arc;
use tiktoken_rs::{
    CoreBPE, cl100k_base, get_bpe_from_model, o200k_base, p50k_base, p50k_edit, r50k_base,
};

/// Shared token counting function.
pub type TokenCounter = Arc<dyn Fn(&str) -> usize + Send + Sync>;

/// Build a token counter for the given model or encoding name.
///
/// Falls back to whitespace counting (logged at `warn`) when no BPE encoding can be loaded.
pub fn build_token_counter(model: &str) -> TokenCounter {
    match build_tiktoken_counter(model) {
        Ok(counter) => counter,
        Err(error) => {
            tracing::warn!(
                model,
                error = %error,
                "Tokenizer unavailable; falling back to whitespace counter"
            );
            whitespace_token_counter()
        }
    }
}

fn build_tiktoken_counter(model: &str) -> Result<TokenCounter, TokenizerError> {
    let normalized = model.trim();
    let target = if normalized.is_empty() {
        "cl100k_base"
    } else {
        normalized
    };
    let encoding = Arc::new(resolve_encoding(target)?);

    Ok(Arc::new(move |segment: &str| {
        encoding.encode_ordinary(segment).len()
    }))
}

fn resolve_encoding(model: &str) -> Result<CoreBPE, TokenizerError> {
    if let Some(candidate) = encoding_from_name(model) {
        return candidate;
    }
    match get_bpe_from_model(model) {
        Ok(encoding) => Ok(encoding),
        Err(model_err) => {
            tracing::warn!(
                model,
                error = %model_err,
                "Unknown tokenizer model; using 'cl100k_base'"
            );
            cl100k_base()
        }
    }
}

fn encoding_from_name(name: &str) -> Option<Result<CoreBPE, TokenizerError>> {
    match name {
        "cl100k_base" => Some(cl100k_base()),
        "o200k_base" => Some(o200k_base()),
        "p50k_base" => Some(p50k_base()),
        "p50k_edit" => Some(p50k_edit()),
        "r50k_base" | "gpt2" => Some(r50k_base()),
        _ => None,
    }
}

/// Counter treating every whitespace-separated word as one token.
pub fn whitespace_token_counter() -> TokenCounter {
    Arc::new(|segment: &str| {
        let tokens = segment.split_whitespace().count();
        if tokens == 0 && !segment.is_empty() {
            1
        } else {
            tokens
        }
    })
}

/// Approximate token count reported in chunk metadata.
pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Split `text` into windows of at most `max_tokens`, overlapping by up to `overlap` tokens.
///
/// Returns an empty vector for whitespace-only input.
pub(crate) fn split_with_overlap(
    text: &str,
    max_tokens: usize,
    overlap: usize,
    token_counter: &TokenCounter,
) -> Vec<String> {
    if max_tokens == 0 || text.trim().is_empty() {
        return Vec::new();
    }

    let counter_for_chunker = token_counter.clone();
    let chunker = Chunker::new(
        max_tokens,
        Box::new(move |segment: &str| counter_for_chunker.as_ref()(segment)),
    );
    let windows = chunker
        .chunk(text)
        .into_iter()
        .flat_map(|window| enforce_budget(window, max_tokens, token_counter))
        .collect();
    apply_overlap(windows, max_tokens, overlap, token_counter)
}

fn enforce_budget(window: String, max_tokens: usize, token_counter: &TokenCounter) -> Vec<String> {
    if token_counter.as_ref()(&window) <= max_tokens {
        return vec![window];
    }

    let lines: Vec<&str> = window
        .lines()
        .map(str::trim)
        .filter(|line| !line.is_empty())
        .collect();
    let pieces = if lines.len() > 1 {
        pack(&lines, "\n", max_tokens, token_counter)
    } else {
        let words: Vec<&str> = window.split_whitespace().collect();
        if words.len() > 1 {
            pack(&words, " ", max_tokens, token_counter)
        } else {
            return split_chars(window.trim(), max_tokens, token_counter);
        }
    };

    pieces
        .into_iter()
        .flat_map(|piece| enforce_budget(piece, max_tokens, token_counter))
        .collect()
}

/// Greedily join `pieces` with `separator` while each window stays within `max_tokens`.
///
/// A single piece over the budget becomes a window of its own.
fn pack(
    pieces: &[&str],
    separator: &str,
    max_tokens: usize,
    token_counter: &TokenCounter,
) -> Vec<String> {
    let mut windows = Vec::new();
    let mut current = String::new();
    for piece in pieces {
        if current.is_empty() {
            current.push_str(piece);
            continue;
        }
        let candidate = format!("{current}{separator}{piece}");
        if token_counter.as_ref()(&candidate) <= max_tokens {
            current = candidate;
        } else {
            windows.push(std::mem::replace(&mut current, (*piece).to_string()));
        }
    }
    if !current.is_empty() {
        windows.push(current);
    }
    windows
}

/// Cut a whitespace-free run into the longest prefixes that fit, at least one char each.
fn split_chars(text: &str, max_tokens: usize, token_counter: &TokenCounter) -> Vec<String> {
    let ends: Vec<usize> = text
        .char_indices()
        .map(|(offset, ch)| offset + ch.len_utf8())
        .collect();
    let mut windows = Vec::new();
    let mut start = 0;
    let mut first = 0;
    while first < ends.len() {
        let candidates = &ends[first..];
        let fit = candidates
            .partition_point(|&end| token_counter.as_ref()(&text[start..end]) <= max_tokens);
        let take = fit.max(1);
        let end = candidates[take - 1];
        windows.push(text[start..end].to_string());
        start = end;
        first += take;
    }
    windows
}

fn apply_overlap(
    chunks: Vec<String>,
    max_tokens: usize,
    overlap: usize,
    token_counter: &TokenCounter,
) -> Vec<String> {
    let effective_overlap = overlap.min(max_tokens.saturating_sub(1));
    if effective_overlap == 0 || chunks.len() < 2 {
        return chunks;
    }

    let mut overlapped = Vec::with_capacity(chunks.len());
    let mut previous: Option<String> = None;

    for current in chunks {
        let next = match &previous {
            Some(prev) => build_overlapped_chunk(
                prev,
                &current,
                effective_overlap,
                max_tokens,
                token_counter,
            ),
            None => current.clone(),
        };
        overlapped.push(next);
        previous = Some(current);
    }

    overlapped
}

fn build_overlapped_chunk(
    previous: &str,
    current: &str,
    overlap: usize,
    max_tokens: usize,
    token_counter: &TokenCounter,
) -> String {
    let tail = tail_within_budget(previous, overlap, token_counter);
    let mut combined = String::with_capacity(tail.len() + current.len() + 1);

    if !tail.is_empty() {
        combined.push_str(tail);
        if !ends_with_whitespace(tail) && !starts_with_whitespace(current) {
            combined.push(' ');
        }
    }

    combined.push_str(current);
    tail_within_budget(&combined, max_tokens, token_counter).to_string()
}

/// Longest word-aligned suffix of `text` (left-trimmed) whose token count fits in `budget`.
///
/// Suffix counts shrink as the start moves right, so the cut point is binary searched.
fn tail_within_budget<'a>(text: &'a str, budget: usize, token_counter: &TokenCounter) -> &'a str {
    if budget == 0 {
        return "";
    }

    let text = text.trim_start();
    if token_counter.as_ref()(text) <= budget {
        return text;
    }

    let starts = word_starts(text);
    let first_fit =
        starts.partition_point(|&start| token_counter.as_ref()(&text[start..]) > budget);
    starts.get(first_fit).map_or("", |&start| &text[start..])
}

/// Byte offsets of every word after the first.
fn word_starts(text: &str) -> Vec<usize> {
    let mut starts = Vec::new();
    let mut after_whitespace = false;
    for (offset, ch) in text.char_indices() {
        let whitespace = ch.is_whitespace();
        if after_whitespace && !whitespace {
            starts.push(offset);
        }
        after_whitespace = whitespace;
    }
    starts
}

fn starts_with_whitespace(text: &str) -> bool {
    text.chars().next().is_some_and(char::is_whitespace)
}

fn ends_with_whitespace(text: &str) -> bool {
    text.chars().next_back().is_some_and(char::is_whitespace)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn split_respects_budget_with_whitespace_counter() {
        let text = "one two three four five";
        let chunks = split_with_overlap(text, 2, 0, &whitespace_token_counter());
        assert_eq!(chunks, vec!["one two", "three four", "five"]);
    }

    #[test]
    fn split_applies_overlap_within_budget() {
        let counter = whitespace_token_counter();
        let chunks = split_with_overlap("one two three four five", 3, 1, &counter);
        assert_eq!(chunks, vec!["one two three", "three four five"]);
        for chunk in &chunks {
            assert!(counter.as_ref()(chunk) <= 3);
        }
    }

    #[test]
    fn multi_line_windows_are_resplit_to_fit_the_budget() {
        let counter = whitespace_token_counter();

        let table = split_with_overlap("cmd | effect\nrun | go", 4, 0, &counter);
        assert_eq!(table, vec!["cmd | effect", "run | go"]);

        let lines = split_with_overlap("a b c\nd e f", 4, 0, &counter);
        assert_eq!(lines, vec!["a b c", "d e f"]);

        let long_line = split_with_overlap("a b c d e f g\nh", 3, 0, &counter);
        for window in &long_line {
            assert!(counter.as_ref()(window) <= 3, "{window:?}");
        }
        assert_eq!(long_line.join(" ").split_whitespace().count(), 8);
    }

    #[test]
    fn unbroken_runs_are_cut_by_characters() {
        let counter: TokenCounter = Arc::new(|segment: &str| segment.chars().count());
        let windows = split_with_overlap("abcdefgh", 3, 0, &counter);
        for window in &windows {
            assert!(window.chars().count() <= 3, "{window:?}");
        }
        assert_eq!(windows.concat(), "abcdefgh");
    }

    #[test]
    fn tail_is_cut_at_word_boundaries() {
        let counter = whitespace_token_counter();
        assert_eq!(
            tail_within_budget("alpha beta gamma delta", 2, &counter),
            "gamma delta"
        );
        assert_eq!(tail_within_budget("  alpha beta", 5, &counter), "alpha beta");
        assert_eq!(tail_within_budget("alpha", 0, &counter), "");
    }

    #[test]
    fn tail_search_counts_logarithmically() {
        use std::sync::atomic::{AtomicUsize, Ordering};

        let calls = Arc::new(AtomicUsize::new(0));
        let seen = calls.clone();
        let counter: TokenCounter = Arc::new(move |segment: &str| {
            seen.fetch_add(1, Ordering::Relaxed);
            segment.split_whitespace().count()
        });
        let text = vec!["word"; 4096].join(" ");

        let tail = tail_within_budget(&text, 10, &counter);

        assert_eq!(tail.split_whitespace().count(), 10);
        assert!(calls.load(Ordering::Relaxed) <= 16);
    }

    #[test]
    fn split_ignores_blank_input() {
        assert!(split_with_overlap("   \n", 8, 0, &whitespace_token_counter()).is_empty());
    }

    #[test]
    fn tiktoken_counter_loads_default_encoding() {
        let counter = build_token_counter("cl100k_base");
        assert!(counter.as_ref()("The quick brown fox") >= 4);
    }

    #[test]
    fn word_count_splits_on_any_whitespace() {
        assert_eq!(word_count("alpha\tbeta\n gamma  "), 3);
        assert_eq!(word_count(""), 0);
    }
}
