//! In-memory filtering and ordering of short candidate lists.

use std::cmp::Reverse;

use tracing::trace;

use crate::{hydrate::Candidate, text::TextNormalizer};

/// Keeps candidates whose transliterated name contains the first term and
/// orders them for display.
///
/// With `use_starts_with_boost` names that start with the first term come
/// first. Ties fall back to relevance descending, then lower-cased name. The
/// relevance score is cleared on every returned candidate.
#[must_use]
pub fn rerank<S: AsRef<str>>(
    candidates: Vec<Candidate>,
    terms: &[S],
    use_starts_with_boost: bool,
    normalizer: &TextNormalizer,
) -> Vec<Candidate> {
    let needle = terms
        .first()
        .map(|term| normalizer.transliterate(term.as_ref().trim()))
        .filter(|needle| !needle.is_empty());
    let before = candidates.len();

    let mut keyed = candidates
        .into_iter()
        .filter_map(|candidate| {
            let folded = normalizer.transliterate(&candidate.name);
            let starts = match &needle {
                Some(needle) if !folded.contains(needle.as_str()) => return None,
                Some(needle) => folded.starts_with(needle.as_str()),
                None => false,
            };
            Some(((starts, candidate.name.to_lowercase()), candidate))
        })
        .collect::<Vec<_>>();

    keyed.sort_by_key(|((starts, lowered), candidate)| {
        (
            Reverse(use_starts_with_boost && *starts),
            Reverse(candidate.relevance_score.unwrap_or(i64::MIN)),
            lowered.clone(),
        )
    });
    trace!(before, after = keyed.len(), "Candidates reranked");

    keyed
        .into_iter()
        .map(|(_, mut candidate)| {
            candidate.relevance_score = None;
            candidate
        })
        .collect()
}
