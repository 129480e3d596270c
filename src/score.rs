//! Token similarity between free-text input and learned signatures
//!
//! The tokenizer here is the same one the learning pass uses, so input
//! tokens and signature keywords live in the same vocabulary.

use crate::patterns::LearnedSignature;

/// Viability threshold: matches at or below this score are noise
pub const MIN_VIABLE_SCORE: f64 = 0.3;

/// How many viable matches suggestion synthesis looks at
pub const MAX_VIABLE_MATCHES: usize = 3;

/// Filler words of Italian request language that carry no category signal
const STOP_WORDS: &[&str] = &[
    "cerco", "vorrei", "qualcosa", "della", "dello", "delle", "degli", "questo", "questa",
    "sono", "come", "dove", "quando", "avrei", "bisogno", "urgente", "possibilmente",
    "oppure", "anche", "molto", "qualche", "fare", "avere",
];

/// Anything this short is an article, preposition or conjunction in practice
const MIN_TOKEN_CHARS: usize = 4;

/// A signature scored against the current input
#[derive(Debug, Clone)]
pub struct ScoredMatch {
    pub signature: LearnedSignature,
    pub score: f64,
}

/// Split free text into the tokens worth matching: whitespace-separated,
/// lower-cased, stripped of surrounding punctuation, deduplicated, with
/// short words and stop words dropped.
pub fn tokenize(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    for word in input.split_whitespace() {
        let cleaned: String = word
            .to_lowercase()
            .trim_matches(|c: char| !c.is_alphanumeric())
            .to_string();
        if cleaned.chars().count() < MIN_TOKEN_CHARS {
            continue;
        }
        if STOP_WORDS.contains(&cleaned.as_str()) {
            continue;
        }
        if !tokens.contains(&cleaned) {
            tokens.push(cleaned);
        }
    }
    tokens
}

fn token_matches(token: &str, keyword: &str) -> bool {
    token.contains(keyword) || keyword.contains(token)
}

/// Similarity in [0,1] between input tokens and one signature.
///
/// The denominator is the larger of the two sets: short inputs can still
/// score high when everything matches a small keyword set, while broad
/// signatures dilute the score unless many tokens match.
pub fn score(tokens: &[String], signature: &LearnedSignature) -> f64 {
    if tokens.is_empty() || signature.keywords.is_empty() {
        return 0.0;
    }
    let matched = tokens
        .iter()
        .filter(|t| signature.keywords.iter().any(|k| token_matches(t, k)))
        .count();
    matched as f64 / tokens.len().max(signature.keywords.len()) as f64
}

/// Viable matches, best first, capped at [`MAX_VIABLE_MATCHES`].
pub fn rank(tokens: &[String], signatures: &[LearnedSignature]) -> Vec<ScoredMatch> {
    let mut matches: Vec<ScoredMatch> = signatures
        .iter()
        .map(|s| ScoredMatch {
            signature: s.clone(),
            score: score(tokens, s),
        })
        .filter(|m| m.score > MIN_VIABLE_SCORE)
        .collect();
    matches.sort_by(|a, b| b.score.partial_cmp(&a.score).unwrap_or(std::cmp::Ordering::Equal));
    matches.truncate(MAX_VIABLE_MATCHES);
    matches
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signature(category: &str, keywords: &[&str]) -> LearnedSignature {
        LearnedSignature {
            category: category.to_string(),
            keywords: keywords.iter().map(|k| k.to_string()).collect(),
            avg_budget: 500.0,
            min_budget: 250.0,
            max_budget: 750.0,
            sample_count: 5,
        }
    }

    #[test]
    fn test_tokenize_drops_fillers_and_short_words() {
        let tokens = tokenize("cerco un divano blu per il salotto");
        assert_eq!(tokens, vec!["divano", "salotto"]);
    }

    #[test]
    fn test_tokenize_deduplicates_and_strips_punctuation() {
        let tokens = tokenize("Tavolo, tavolo antico!");
        assert_eq!(tokens, vec!["tavolo", "antico"]);
    }

    #[test]
    fn test_score_uses_larger_set_as_denominator() {
        let sig = signature("Casa e Giardino", &["divano", "tavolo", "arredamento"]);
        let tokens = vec!["divano".to_string(), "salotto".to_string()];
        let s = score(&tokens, &sig);
        assert!((s - 1.0 / 3.0).abs() < 1e-9);
        assert!(s > MIN_VIABLE_SCORE);
    }

    #[test]
    fn test_substring_containment_matches_both_directions() {
        // Token extends the keyword.
        let sig = signature("Elettronica", &["telefon"]);
        assert!(score(&["telefonino".to_string()], &sig) > 0.9);
        // Keyword extends the token.
        let sig = signature("Elettronica", &["telefonino"]);
        assert!(score(&["telefon".to_string()], &sig) > 0.9);
    }

    #[test]
    fn test_distinct_words_sharing_a_stem_prefix_do_not_match() {
        // "telefono" and "telefonino" share a stem but neither contains
        // the other, so containment matching must reject the pair.
        let sig = signature("Elettronica", &["telefono"]);
        assert_eq!(score(&["telefonino".to_string()], &sig), 0.0);
    }

    #[test]
    fn test_rank_filters_and_caps() {
        let signatures = vec![
            signature("A", &["divano"]),
            signature("B", &["divano", "salotto"]),
            signature("C", &["bicicletta"]),
            signature("D", &["divano", "poltrona"]),
            signature("E", &["salotto"]),
        ];
        let tokens = vec!["divano".to_string(), "salotto".to_string()];
        let ranked = rank(&tokens, &signatures);

        assert_eq!(ranked.len(), MAX_VIABLE_MATCHES);
        assert_eq!(ranked[0].signature.category, "B");
        assert!(ranked.iter().all(|m| m.score > MIN_VIABLE_SCORE));
        assert!(ranked.iter().all(|m| m.signature.category != "C"));
    }

    #[test]
    fn test_empty_input_scores_zero() {
        let sig = signature("Moda", &["scarpe"]);
        assert_eq!(score(&[], &sig), 0.0);
    }
}
