//! Line planning and context stitching.
//!
//! Each non-empty input line becomes one utterance. Optionally a few words
//! of the neighboring lines are borrowed so the engine hears the line in
//! context: the tail of the previous line is prepended as a short sentence,
//! and the head of the next line is appended with an ellipsis. The borrowed
//! words end up in the audio and are meant to be trimmed by hand.

use crate::config::SILENCE_MARKER;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StitchOptions {
    /// Prepend the last words of the previous line.
    pub append_prev: bool,
    /// Append the first words of the next line.
    pub append_next: bool,
    /// Number of words to borrow.
    pub context_words: usize,
}

impl Default for StitchOptions {
    fn default() -> Self {
        Self {
            append_prev: false,
            append_next: false,
            context_words: 3,
        }
    }
}

/// One utterance to synthesize.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlannedLine {
    /// Position of the line in the input text, counting empty lines.
    pub original_index: usize,
    /// Text handed to the engine, marker removed and context applied.
    pub text: String,
    /// The line carried the silence marker.
    pub add_silence: bool,
}

/// Split `text` into utterances, one per non-empty line.
///
/// Neighbors are looked up by position in the original text, so an empty
/// line between two lines means neither borrows from the other.
pub fn plan_lines(text: &str, options: &StitchOptions) -> Vec<PlannedLine> {
    let lines: Vec<&str> = text.split('\n').collect();
    let mut planned = Vec::new();

    for (idx, raw) in lines.iter().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            continue;
        }

        let (body, add_silence) = strip_marker(trimmed);
        let mut line = body;

        if options.append_prev && idx > 0 {
            let prev = lines[idx - 1];
            // a marked previous line ends a passage, so start fresh
            if !prev.trim().is_empty() && !prev.contains(SILENCE_MARKER) {
                if let Some(prefix) = previous_context(prev, options.context_words) {
                    line = prefix + &line;
                }
            }
        }

        if options.append_next {
            if let Some(next) = lines.get(idx + 1).filter(|l| !l.trim().is_empty()) {
                let (next, _) = strip_marker(next.trim());
                if let Some(suffix) = next_context(&next, options.context_words) {
                    line.push_str(&suffix);
                }
            }
        }

        planned.push(PlannedLine {
            original_index: idx,
            text: line,
            add_silence,
        });
    }

    planned
}

/// Remove every silence marker from `line`.
///
/// Returns the cleaned line and whether a marker was present.
pub fn strip_marker(line: &str) -> (String, bool) {
    if line.contains(SILENCE_MARKER) {
        (line.replace(SILENCE_MARKER, "").trim().to_string(), true)
    } else {
        (line.to_string(), false)
    }
}

/// `"Brown fox jumps."` -> `"Fox jumps. "`-style sentence built from the
/// last `words` words of `prev`.
fn previous_context(prev: &str, words: usize) -> Option<String> {
    let tokens: Vec<&str> = prev.split_whitespace().collect();
    if tokens.is_empty() || words == 0 {
        return None;
    }
    let tail = tokens[tokens.len().saturating_sub(words)..]
        .join(" ")
        .to_lowercase();
    let tail = tail.trim_end_matches('.');
    Some(format!("{}. ", capitalize(tail)))
}

fn next_context(next: &str, words: usize) -> Option<String> {
    let head: Vec<&str> = next.split_whitespace().take(words).collect();
    if head.is_empty() {
        return None;
    }
    Some(format!(" {}...", head.join(" ")))
}

fn capitalize(s: &str) -> String {
    let mut chars = s.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn both_ways() -> StitchOptions {
        StitchOptions {
            append_prev: true,
            append_next: true,
            context_words: 3,
        }
    }

    fn texts(planned: &[PlannedLine]) -> Vec<&str> {
        planned.iter().map(|p| p.text.as_str()).collect()
    }

    #[test]
    fn skips_empty_lines_and_keeps_original_positions() {
        let planned = plan_lines("One.\n\n  \nTwo.\n", &StitchOptions::default());
        assert_eq!(texts(&planned), vec!["One.", "Two."]);
        assert_eq!(
            planned.iter().map(|p| p.original_index).collect::<Vec<_>>(),
            vec![0, 3]
        );
    }

    #[test]
    fn marker_is_removed_and_recorded() {
        let planned = plan_lines("Pause here.[silence]\nGo on.", &StitchOptions::default());
        assert_eq!(planned[0].text, "Pause here.");
        assert!(planned[0].add_silence);
        assert!(!planned[1].add_silence);
    }

    #[test]
    fn appends_head_of_next_line_without_marker() {
        let options = StitchOptions {
            append_next: true,
            ..StitchOptions::default()
        };
        let planned = plan_lines("Hello world today.\n[silence]Goodbye now.", &options);
        assert_eq!(planned[0].text, "Hello world today. Goodbye now....");
        assert!(!planned[0].text.contains(SILENCE_MARKER));
        assert_eq!(planned[1].text, "Goodbye now.");
    }

    #[test]
    fn borrows_at_most_three_words_from_next_line() {
        let options = StitchOptions {
            append_next: true,
            ..StitchOptions::default()
        };
        let planned = plan_lines("First.\nThe quick brown fox jumps.", &options);
        assert_eq!(planned[0].text, "First. The quick brown...");
    }

    #[test]
    fn prepends_tail_of_previous_line_as_sentence() {
        let options = StitchOptions {
            append_prev: true,
            ..StitchOptions::default()
        };
        let planned = plan_lines("The Quick brown FOX jumps...\nOver the dog.", &options);
        assert_eq!(planned[0].text, "The Quick brown FOX jumps...");
        assert_eq!(planned[1].text, "Brown fox jumps. Over the dog.");
    }

    #[test]
    fn marked_previous_line_gives_fresh_start() {
        let planned = plan_lines("The end.[silence]\nA new chapter.", &both_ways());
        assert_eq!(planned[0].text, "The end. A new chapter....");
        assert_eq!(planned[1].text, "A new chapter.");
    }

    #[test]
    fn empty_neighbors_are_not_borrowed_from() {
        let planned = plan_lines("Alpha beta.\n\nGamma delta.", &both_ways());
        assert_eq!(texts(&planned), vec!["Alpha beta.", "Gamma delta."]);
    }

    #[test]
    fn last_line_has_nothing_to_borrow() {
        let planned = plan_lines("Only line here.", &both_ways());
        assert_eq!(texts(&planned), vec!["Only line here."]);
    }

    #[test]
    fn marker_only_line_is_kept_with_empty_text() {
        let planned = plan_lines("[silence]", &StitchOptions::default());
        assert_eq!(planned.len(), 1);
        assert_eq!(planned[0].text, "");
        assert!(planned[0].add_silence);
    }
}
