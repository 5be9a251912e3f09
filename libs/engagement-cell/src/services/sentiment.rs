use regex::Regex;
use tracing::debug;

use crate::models::SentimentLabel;

// Clinic-review lexicon. Matching is whole-word against lowercased text;
// a negator within the two preceding words flips a term's polarity.
const POSITIVE_TERMS: &[&str] = &[
    "great", "excellent", "friendly", "helpful", "caring", "professional", "clean", "quick",
    "recommend", "recommended", "thorough", "attentive", "kind", "painless", "efficient",
    "wonderful", "amazing", "reassuring", "patient", "good",
];

const NEGATIVE_TERMS: &[&str] = &[
    "rude", "slow", "dirty", "terrible", "awful", "unhelpful", "painful", "expensive",
    "disappointed", "disappointing", "worst", "crowded", "dismissive", "late", "poor", "bad",
    "unprofessional", "wait", "waiting", "queue",
];

const NEGATORS: &[&str] = &[
    "not", "no", "never", "hardly", "barely", "isn't", "wasn't", "don't", "didn't", "won't",
    "can't", "cannot", "without",
];

pub struct SentimentAnalyzer {
    token_re: Regex,
}

impl Default for SentimentAnalyzer {
    fn default() -> Self {
        Self::new()
    }
}

impl SentimentAnalyzer {
    pub fn new() -> Self {
        Self {
            // Keeps apostrophes so "didn't" survives tokenization.
            token_re: Regex::new(r"[a-z']+").expect("token pattern is valid"),
        }
    }

    /// Score text in [-1, 1] and label it.
    pub fn analyze(&self, content: &str) -> (f32, SentimentLabel) {
        let lowered = content.to_lowercase();
        let tokens: Vec<&str> = self
            .token_re
            .find_iter(&lowered)
            .map(|m| m.as_str())
            .collect();

        let mut positive_hits = 0i32;
        let mut negative_hits = 0i32;

        for (index, token) in tokens.iter().enumerate() {
            let negated = is_negated(&tokens, index);

            if POSITIVE_TERMS.contains(token) {
                if negated {
                    negative_hits += 1;
                } else {
                    positive_hits += 1;
                }
            } else if NEGATIVE_TERMS.contains(token) {
                if negated {
                    positive_hits += 1;
                } else {
                    negative_hits += 1;
                }
            }
        }

        let total = positive_hits + negative_hits;
        let score = (positive_hits - negative_hits) as f32 / total.max(1) as f32;
        let label = SentimentLabel::from_score(score);

        debug!(
            "Sentiment: {} positive, {} negative, score {:.2} ({:?})",
            positive_hits, negative_hits, score, label
        );
        (score, label)
    }
}

fn is_negated(tokens: &[&str], index: usize) -> bool {
    tokens[index.saturating_sub(2)..index]
        .iter()
        .any(|token| NEGATORS.contains(token))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn positive_review_scores_positive() {
        let analyzer = SentimentAnalyzer::new();
        let (score, label) =
            analyzer.analyze("The staff were friendly and the doctor was thorough and caring.");

        assert!(score > 0.2, "score was {}", score);
        assert_eq!(label, SentimentLabel::Positive);
    }

    #[test]
    fn negative_review_scores_negative() {
        let analyzer = SentimentAnalyzer::new();
        let (score, label) =
            analyzer.analyze("Terrible experience, the reception was rude and the wait was awful.");

        assert!(score < -0.2, "score was {}", score);
        assert_eq!(label, SentimentLabel::Negative);
    }

    #[test]
    fn mixed_review_lands_neutral() {
        let analyzer = SentimentAnalyzer::new();
        let (score, label) =
            analyzer.analyze("The doctor was friendly but the queue was slow and painful. Clean clinic though.");

        assert!((-0.2..=0.2).contains(&score), "score was {}", score);
        assert_eq!(label, SentimentLabel::Neutral);
    }

    #[test]
    fn text_without_lexicon_terms_is_neutral() {
        let analyzer = SentimentAnalyzer::new();
        let (score, label) = analyzer.analyze("I visited the clinic on Tuesday afternoon.");

        assert_eq!(score, 0.0);
        assert_eq!(label, SentimentLabel::Neutral);
    }

    #[test]
    fn negation_flips_polarity() {
        let analyzer = SentimentAnalyzer::new();

        let (negative, _) = analyzer.analyze("The doctor was not helpful.");
        assert!(negative < 0.0, "score was {}", negative);

        let (positive, _) = analyzer.analyze("There was no wait at all.");
        assert!(positive > 0.0, "score was {}", positive);
    }
}
