//! Clarification state machine
//!
//! Decides when a clarifying question beats a direct suggestion, picks the
//! question from a fixed priority order of contexts, and folds the user's
//! answer back into a denser input for re-scoring. Hard invariant: a
//! session never surfaces more than two questions.

use crate::patterns::LearnedSignature;
use crate::score;
use crate::synth::Suggestion;
use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// The "I don't know" choice present on every question
pub const ESCAPE_OPTION: &str = "Non lo so";

/// Questions one session may ask for one evolving input
pub const MAX_QUESTIONS_PER_SESSION: usize = 2;

/// Inputs shorter than this are too thin to score with any confidence
const MIN_CONFIDENT_INPUT_CHARS: usize = 10;

/// Phrases that signal the user does not yet know what they want.
/// "cerco" alone is deliberately absent: it opens most specific requests too.
const VAGUE_MARKERS: &[&str] = &[
    "qualcosa",
    "aiuto",
    "non so",
    "consigli",
    "ho bisogno",
    "cosa posso",
];

/// Catch-all buckets that tell the user nothing about their request
pub const GENERIC_BUCKETS: &[&str] = &["Altro", "Servizi Professionali"];

/// Fixed budget brackets offered by budget questions
pub const BUDGET_BRACKETS: &[&str] = &["50-100€", "100-500€", "500-1500€", "1500-5000€"];

/// What a question is trying to pin down, in the order contexts are tried
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum QuestionContext {
    Category,
    Budget,
    Specificity,
    #[serde(rename = "type")]
    Kind,
}

impl QuestionContext {
    /// All contexts in selection priority order.
    pub fn all() -> [QuestionContext; 4] {
        [
            QuestionContext::Category,
            QuestionContext::Budget,
            QuestionContext::Specificity,
            QuestionContext::Kind,
        ]
    }

    pub fn key(&self) -> &'static str {
        match self {
            QuestionContext::Category => "category",
            QuestionContext::Budget => "budget",
            QuestionContext::Specificity => "specificity",
            QuestionContext::Kind => "type",
        }
    }
}

/// One clarifying question, destroyed once answered
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Question {
    pub id: String,
    pub text: String,
    pub options: Vec<String>,
    pub context: QuestionContext,
}

impl Question {
    fn new(context: QuestionContext, text: &str, mut options: Vec<String>) -> Self {
        options.push(ESCAPE_OPTION.to_string());
        Self {
            id: format!("{}-{}", context.key(), Utc::now().timestamp_millis()),
            text: text.to_string(),
            options,
            context,
        }
    }

    pub fn is_escape(&self, answer: &str) -> bool {
        answer.trim().eq_ignore_ascii_case(ESCAPE_OPTION)
    }
}

/// Answers collected so far in one session, keyed by context
#[derive(Debug, Default, Clone)]
pub struct AnsweredQuestions {
    answers: HashMap<QuestionContext, String>,
    history: Vec<String>,
}

impl AnsweredQuestions {
    pub fn record(&mut self, question: &Question, answer: &str) {
        self.answers.insert(question.context, answer.to_string());
        self.history.push(question.id.clone());
    }

    pub fn has(&self, context: QuestionContext) -> bool {
        self.answers.contains_key(&context)
    }

    pub fn answer_for(&self, context: QuestionContext) -> Option<&str> {
        self.answers.get(&context).map(String::as_str)
    }

    /// Answers in context priority order, so downstream matching is
    /// deterministic.
    pub fn values(&self) -> impl Iterator<Item = &str> + '_ {
        QuestionContext::all()
            .into_iter()
            .filter_map(|c| self.answers.get(&c))
            .map(String::as_str)
    }

    /// Questions asked so far this session.
    pub fn asked(&self) -> usize {
        self.history.len()
    }

    pub fn clear(&mut self) {
        self.answers.clear();
        self.history.clear();
    }
}

/// True when the input reads like the user has not decided yet.
pub(crate) fn is_vague(input: &str) -> bool {
    let normalized = input.trim().to_lowercase();
    normalized.chars().count() < MIN_CONFIDENT_INPUT_CHARS
        || VAGUE_MARKERS.iter().any(|m| normalized.contains(m))
}

/// Should the engine ask a question instead of suggesting directly?
///
/// True when the input is vague, the candidate suggestion is empty or
/// purely generic, or no signature scores above the viability threshold.
pub fn should_clarify(
    input: &str,
    candidate: &Suggestion,
    signatures: &[LearnedSignature],
) -> bool {
    if is_vague(input) {
        return true;
    }
    if candidate.categories.is_empty() {
        return true;
    }
    if candidate
        .categories
        .iter()
        .all(|c| GENERIC_BUCKETS.iter().any(|g| g.eq_ignore_ascii_case(c)))
    {
        return true;
    }
    let tokens = score::tokenize(input);
    score::rank(&tokens, signatures).is_empty()
}

/// Pick the first unanswered context in priority order and build its
/// question. Returns `None` when the category context is due but the
/// catalog has no entries to offer.
pub fn generate_question(catalog: &[String], answered: &AnsweredQuestions) -> Option<Question> {
    for context in QuestionContext::all() {
        if answered.has(context) {
            continue;
        }
        return match context {
            QuestionContext::Category => {
                if catalog.is_empty() {
                    return None;
                }
                let options: Vec<String> = catalog.iter().take(4).cloned().collect();
                Some(Question::new(
                    context,
                    "In quale categoria rientra la tua richiesta?",
                    options,
                ))
            }
            QuestionContext::Budget => Some(Question::new(
                context,
                "Quanto vorresti spendere, indicativamente?",
                BUDGET_BRACKETS.iter().map(|b| b.to_string()).collect(),
            )),
            QuestionContext::Specificity => Some(Question::new(
                context,
                "Stai cercando un prodotto o un servizio?",
                vec![
                    "Un prodotto specifico".to_string(),
                    "Un servizio".to_string(),
                    "Una consulenza".to_string(),
                ],
            )),
            QuestionContext::Kind => Some(Question::new(
                context,
                "Preferisci nuovo o usato?",
                vec![
                    "Nuovo".to_string(),
                    "Usato".to_string(),
                    "Indifferente".to_string(),
                ],
            )),
        };
    }
    None
}

/// Fold an answer into the original input for re-scoring.
///
/// The escape option returns `None`: do not refine, fall back to the
/// generic path. Budget answers contribute their numeric bracket; an
/// answer without one is appended as plain text rather than rejected.
pub fn refine_input(input: &str, question: &Question, answer: &str) -> Option<String> {
    if question.is_escape(answer) {
        return None;
    }
    let answer = answer.trim();
    let refined = match question.context {
        QuestionContext::Budget => match extract_bracket(answer) {
            Some(bracket) => format!("{} budget {}", input, bracket),
            None => format!("{} {}", input, answer.to_lowercase()),
        },
        _ => format!("{} {}", input, answer.to_lowercase()),
    };
    Some(refined)
}

/// First `min-max` numeric bracket in the text, if any.
pub(crate) fn extract_bracket(text: &str) -> Option<String> {
    Regex::new(r"\d+\s*-\s*\d+")
        .ok()?
        .find(text)
        .map(|m| m.as_str().replace(' ', ""))
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
            sample_count: 4,
        }
    }

    fn candidate(categories: &[&str]) -> Suggestion {
        Suggestion {
            categories: categories.iter().map(|c| c.to_string()).collect(),
            budget_range: "100-1000€".to_string(),
            budget_min: Some(100.0),
            budget_max: Some(1000.0),
            clarification: None,
        }
    }

    #[test]
    fn test_short_input_needs_clarification() {
        let sigs = vec![signature("Casa e Giardino", &["divano"])];
        assert!(should_clarify("divano", &candidate(&["Casa e Giardino"]), &sigs));
    }

    #[test]
    fn test_vague_marker_needs_clarification() {
        let sigs = vec![signature("Casa e Giardino", &["divano", "salotto"])];
        assert!(should_clarify(
            "qualcosa di comodo per il salotto",
            &candidate(&["Casa e Giardino"]),
            &sigs
        ));
    }

    #[test]
    fn test_generic_buckets_need_clarification() {
        let sigs = vec![signature("Altro", &["generico", "varie", "oggetti"])];
        assert!(should_clarify(
            "oggetti generico varie",
            &candidate(&["Altro", "Servizi Professionali"]),
            &sigs
        ));
    }

    #[test]
    fn test_no_viable_match_needs_clarification() {
        let sigs = vec![signature("Moda", &["scarpe", "borsa", "giacca"])];
        assert!(should_clarify(
            "pannelli fotovoltaici balcone",
            &candidate(&["Elettronica"]),
            &sigs
        ));
    }

    #[test]
    fn test_confident_match_suggests_directly() {
        let sigs = vec![signature("Casa e Giardino", &["divano", "poltrona", "salotto"])];
        assert!(!should_clarify(
            "divano poltrona per il salotto",
            &candidate(&["Casa e Giardino"]),
            &sigs
        ));
    }

    #[test]
    fn test_question_priority_order() {
        let catalog = vec!["Casa e Giardino".to_string(), "Elettronica".to_string()];
        let mut answered = AnsweredQuestions::default();

        let first = generate_question(&catalog, &answered).unwrap();
        assert_eq!(first.context, QuestionContext::Category);
        answered.record(&first, "Elettronica");

        let second = generate_question(&catalog, &answered).unwrap();
        assert_eq!(second.context, QuestionContext::Budget);
        answered.record(&second, "100-500€");

        let third = generate_question(&catalog, &answered).unwrap();
        assert_eq!(third.context, QuestionContext::Specificity);
    }

    #[test]
    fn test_category_question_needs_catalog() {
        assert!(generate_question(&[], &AnsweredQuestions::default()).is_none());
    }

    #[test]
    fn test_category_options_cap_and_escape() {
        let catalog: Vec<String> = (0..6).map(|i| format!("Categoria {}", i)).collect();
        let question = generate_question(&catalog, &AnsweredQuestions::default()).unwrap();

        assert_eq!(question.options.len(), 5);
        assert_eq!(question.options.last().unwrap(), ESCAPE_OPTION);
    }

    #[test]
    fn test_every_question_carries_escape() {
        let catalog = vec!["Moda".to_string()];
        let mut answered = AnsweredQuestions::default();
        while let Some(question) = generate_question(&catalog, &answered) {
            assert_eq!(question.options.last().unwrap(), ESCAPE_OPTION);
            answered.record(&question, ESCAPE_OPTION);
        }
        assert_eq!(answered.asked(), 4);
    }

    #[test]
    fn test_refine_escape_returns_none() {
        let question = Question::new(QuestionContext::Category, "?", vec!["Moda".to_string()]);
        assert!(refine_input("cerco scarpe", &question, "non lo so").is_none());
    }

    #[test]
    fn test_refine_budget_extracts_bracket() {
        let question = Question::new(QuestionContext::Budget, "?", vec![]);
        let refined = refine_input("divano per salotto", &question, "100-500€").unwrap();
        assert_eq!(refined, "divano per salotto budget 100-500");
    }

    #[test]
    fn test_refine_malformed_budget_appends_plain_text() {
        let question = Question::new(QuestionContext::Budget, "?", vec![]);
        let refined = refine_input("divano per salotto", &question, "Poco").unwrap();
        assert_eq!(refined, "divano per salotto poco");
    }

    #[test]
    fn test_refine_appends_lowercased_answer() {
        let question = Question::new(QuestionContext::Kind, "?", vec!["Usato".to_string()]);
        let refined = refine_input("bici da corsa", &question, "Usato").unwrap();
        assert_eq!(refined, "bici da corsa usato");
    }

    #[test]
    fn test_answers_iterate_in_priority_order() {
        let mut answered = AnsweredQuestions::default();
        let budget = Question::new(QuestionContext::Budget, "?", vec![]);
        let category = Question::new(QuestionContext::Category, "?", vec![]);
        answered.record(&budget, "100-500€");
        answered.record(&category, "Moda");

        let values: Vec<&str> = answered.values().collect();
        assert_eq!(values, vec!["Moda", "100-500€"]);
    }
}
