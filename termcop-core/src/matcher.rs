//! Term scanning over file contents.
//!
//! The matcher reports every word that contains a configured term,
//! not just the literal term itself: searching for `test` also flags
//! `helloTest` and `Testing`, and the whole containing word is what
//! gets reported and compared against the allow-list.

use anyhow::{Context, Result};
use regex::RegexBuilder;
use serde::{Deserialize, Serialize};

/// A single hit of a company-specific term inside a file.
///
/// `line_number` and `start` are 1-based; `end` is exclusive, so
/// `end - start` equals the character length of `word_found`.
/// `word_found` preserves the casing of the file text.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TermOccurrence {
    pub line_number: u32,
    pub start: u32,
    pub end: u32,
    pub term_searched: String,
    pub word_found: String,
    pub file_path: String,
}

/// Scan `text` for words containing `term`, case-insensitively.
///
/// Matches whose whole word appears in `accepted_terms` (compared
/// lower-cased) are discarded. Occurrences come back in line order,
/// then left-to-right within a line.
pub fn find_term_occurrences(
    text: &str,
    term: &str,
    file_path: &str,
    accepted_terms: &[String],
) -> Result<Vec<TermOccurrence>> {
    let pattern = format!("[a-zA-Z]*{}[a-zA-Z]*", regex::escape(term));
    let word_pattern = RegexBuilder::new(&pattern)
        .case_insensitive(true)
        .build()
        .with_context(|| format!("Failed to build search pattern for term {:?}", term))?;

    let accepted: Vec<String> = accepted_terms.iter().map(|t| t.to_lowercase()).collect();

    let mut occurrences = Vec::new();
    for (line_index, line) in text.lines().enumerate() {
        for found in word_pattern.find_iter(line) {
            let word_found = found.as_str();
            if accepted.contains(&word_found.to_lowercase()) {
                continue;
            }

            let start = line[..found.start()].chars().count() as u32 + 1;
            let end = start + word_found.chars().count() as u32;
            occurrences.push(TermOccurrence {
                line_number: line_index as u32 + 1,
                start,
                end,
                term_searched: term.to_string(),
                word_found: word_found.to_string(),
                file_path: file_path.to_string(),
            });
        }
    }

    Ok(occurrences)
}
