//! Title resolution
//!
//! Resolution order, first success wins:
//! 1. Alias table
//! 2. Keyword shortlist (fixed confidences, predates the alias table)
//! 3. Fuzzy match against every canonical title: containment, then token overlap
//! 4. `Other`

use playbill_common::CanonicalWork;
use std::collections::HashSet;

use super::Normalizer;

/// Resolved work and confidence for one raw title
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TitleMatch {
    pub work: CanonicalWork,
    pub confidence: f64,
}

impl TitleMatch {
    pub fn new(work: CanonicalWork, confidence: f64) -> Self {
        Self { work, confidence }
    }
}

const KEYWORD_SHORTLIST: [(&str, CanonicalWork, f64); 6] = [
    ("hamlet", CanonicalWork::Hamlet, 0.8),
    ("macbeth", CanonicalWork::Macbeth, 0.8),
    ("othello", CanonicalWork::Othello, 0.8),
    ("lear", CanonicalWork::KingLear, 0.7),
    ("caesar", CanonicalWork::JuliusCaesar, 0.7),
    ("tempest", CanonicalWork::Tempest, 0.8),
];

const STOPWORDS: [&str; 19] = [
    "the", "of", "a", "an", "and", "to", "for", "with", "in", "on", "by", "from", "be", "being",
    "is", "are", "it", "at", "as",
];

const CONTAINMENT_CONFIDENCE: f64 = 0.95;
const OVERLAP_BASE_CONFIDENCE: f64 = 0.78;
const OVERLAP_MAX_BONUS: f64 = 0.17;

impl Normalizer {
    /// Resolve a free-text title to a canonical work
    pub fn resolve_title(&self, raw: &str) -> TitleMatch {
        if let Some(alias) = self.aliases.iter().find(|a| a.matches(raw)) {
            return TitleMatch::new(alias.work, alias.confidence);
        }

        let lower = raw.to_lowercase();

        for (keyword, work, confidence) in KEYWORD_SHORTLIST {
            if lower.contains(keyword) {
                return TitleMatch::new(work, confidence);
            }
        }

        if let Some(found) = fuzzy_match(&lower) {
            return found;
        }

        let confidence = if lower.contains("shakespeare") { 0.4 } else { 0.2 };
        TitleMatch::new(CanonicalWork::Other, confidence)
    }
}

fn fuzzy_match(lower: &str) -> Option<TitleMatch> {
    let stripped = strip_to_alphanumeric(lower);
    let title_tokens: HashSet<&str> = tokenize(lower).collect();
    let mut best: Option<TitleMatch> = None;

    for work in CanonicalWork::ALL.iter().copied().filter(|w| !w.is_other()) {
        let full = work.title().to_lowercase();
        let stripped_full = strip_to_alphanumeric(&full);
        if stripped_full.len() < 5 {
            continue;
        }

        if stripped.contains(&stripped_full) {
            return Some(TitleMatch::new(work, CONTAINMENT_CONFIDENCE));
        }

        let full_tokens: Vec<&str> = tokenize(&full).collect();
        let meaningful = full_tokens.iter().filter(|t| !is_stopword(t)).count();
        let overlap = full_tokens
            .iter()
            .filter(|t| !is_stopword(t) && title_tokens.contains(*t))
            .count();

        if overlap == 0 {
            continue;
        }

        let ratio = overlap as f64 / meaningful.max(1) as f64;
        if ratio >= 0.5 && overlap >= meaningful.min(2) {
            let confidence = OVERLAP_BASE_CONFIDENCE + (ratio * 0.25).min(OVERLAP_MAX_BONUS);
            if best.map_or(true, |b| confidence > b.confidence) {
                best = Some(TitleMatch::new(work, confidence));
            }
        }
    }

    best
}

fn strip_to_alphanumeric(text: &str) -> String {
    text.chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit())
        .collect()
}

fn tokenize(text: &str) -> impl Iterator<Item = &str> {
    text.split(|c: char| !(c.is_ascii_lowercase() || c.is_ascii_digit()))
        .filter(|t| !t.is_empty())
}

fn is_stopword(token: &str) -> bool {
    STOPWORDS.contains(&token)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn normalizer() -> Normalizer {
        Normalizer::new().with_current_year(2024)
    }

    #[test]
    fn test_alias_scenarios() {
        let n = normalizer();
        assert_eq!(n.resolve_title("R&J"), TitleMatch::new(CanonicalWork::RomeoAndJuliet, 0.9));
        assert_eq!(
            n.resolve_title("The Scottish Play"),
            TitleMatch::new(CanonicalWork::Macbeth, 0.95)
        );
        assert_eq!(n.resolve_title("12th Night").work, CanonicalWork::TwelfthNight);
    }

    #[test]
    fn test_keyword_shortlist() {
        let n = normalizer();
        // "lear" without "king" misses the alias table
        assert_eq!(n.resolve_title("Lear Reimagined"), TitleMatch::new(CanonicalWork::KingLear, 0.7));
        assert_eq!(n.resolve_title("Caesar!"), TitleMatch::new(CanonicalWork::JuliusCaesar, 0.7));
    }

    #[test]
    fn test_fuzzy_containment() {
        let n = normalizer();
        // No whitespace, so the "king\s+john" alias misses
        let m = n.resolve_title("KingJohn: a history");
        assert_eq!(m, TitleMatch::new(CanonicalWork::KingJohn, 0.95));
    }

    #[test]
    fn test_fuzzy_token_overlap() {
        let n = normalizer();
        // Both meaningful tokens of "Timon of Athens", out of order
        let m = n.resolve_title("Athens: Timon Returns");
        assert_eq!(m.work, CanonicalWork::TimonOfAthens);
        assert!((m.confidence - 0.95).abs() < 1e-9);

        // One of four meaningful tokens of "Much Ado About Nothing"
        let m = n.resolve_title("Nothing Ventured");
        assert_eq!(m.work, CanonicalWork::Other);
    }

    #[test]
    fn test_partial_overlap_confidence() {
        let n = normalizer();
        // "merry" + "windsor" of merry/wives/windsor: ratio 2/3
        let m = n.resolve_title("Merry Windsor");
        assert_eq!(m.work, CanonicalWork::MerryWivesOfWindsor);
        let expected = 0.78 + (2.0_f64 / 3.0 * 0.25).min(0.17);
        assert!((m.confidence - expected).abs() < 1e-9);
        assert!(m.confidence < 0.95);
    }

    #[test]
    fn test_other_fallback() {
        let n = normalizer();
        assert_eq!(
            n.resolve_title("Shakespeare in the Park Gala"),
            TitleMatch::new(CanonicalWork::Other, 0.4)
        );
        assert_eq!(n.resolve_title("The Nutcracker"), TitleMatch::new(CanonicalWork::Other, 0.2));
    }

    #[test]
    fn test_resolution_is_deterministic() {
        let n = normalizer();
        for title in ["Much Ado", "Henry V", "A Winter Evening", "Othello in Concert"] {
            assert_eq!(n.resolve_title(title), n.resolve_title(title));
        }
    }
}
