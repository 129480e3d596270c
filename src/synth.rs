//! Suggestion synthesis
//!
//! Merges scorer output, session answers and a static keyword table into
//! one suggestion. Branches are evaluated in strict priority order and the
//! first applicable branch wins; the ordering of the static table rows is
//! load-bearing, so they are a literal sequence scanned top to bottom.

use crate::clarify::{self, AnsweredQuestions};
use crate::patterns::LearnedSignature;
use crate::score;
use serde::{Deserialize, Serialize};

/// Wide range offered when nothing is known about the budget
pub const DEFAULT_BUDGET_RANGE: (f64, f64) = (100.0, 1000.0);

/// Categories offered when both patterns and catalog are empty
const DEFAULT_CATEGORIES: &[&str] = &["Casa e Giardino", "Elettronica", "Altro"];

/// Below this score the best pattern match still deserves a nudge for detail
const CONFIDENT_SCORE: f64 = 0.6;

/// Final output of one evaluation pass; recomputed on every input change,
/// never persisted.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Suggestion {
    pub categories: Vec<String>,
    pub budget_range: String,
    pub budget_min: Option<f64>,
    pub budget_max: Option<f64>,
    pub clarification: Option<String>,
}

/// One row of the static fallback table: any keyword hit maps the input to
/// a category and a budget bracket.
struct FallbackRule {
    keywords: &'static [&'static str],
    category: &'static str,
    budget: &'static str,
}

const FALLBACK_RULES: &[FallbackRule] = &[
    FallbackRule {
        keywords: &[
            "divano", "tavolo", "sedia", "armadio", "letto", "arredamento", "cucina", "giardino",
            "mobile", "casa",
        ],
        category: "Casa e Giardino",
        budget: "400-1500€",
    },
    FallbackRule {
        keywords: &[
            "telefono", "smartphone", "computer", "laptop", "tablet", "televisore", "monitor",
            "stampante", "console",
        ],
        category: "Elettronica",
        budget: "200-1200€",
    },
    FallbackRule {
        keywords: &["auto", "macchina", "moto", "scooter", "bicicletta", "furgone"],
        category: "Veicoli",
        budget: "2000-15000€",
    },
    FallbackRule {
        keywords: &["vestito", "abito", "scarpe", "borsa", "giacca", "abbigliamento"],
        category: "Moda",
        budget: "50-300€",
    },
    FallbackRule {
        keywords: &[
            "sito", "logo", "sviluppo", "software", "grafica", "traduzione", "avvocato",
            "commercialista", "consulenza",
        ],
        category: "Servizi Professionali",
        budget: "300-3000€",
    },
    FallbackRule {
        keywords: &["appartamento", "affitto", "monolocale", "bilocale", "villa", "ufficio"],
        category: "Immobili",
        budget: "500-2000€",
    },
    FallbackRule {
        keywords: &["palestra", "tennis", "calcio", "trekking", "campeggio", "pesca"],
        category: "Sport e Tempo Libero",
        budget: "100-800€",
    },
    FallbackRule {
        keywords: &["lavoro", "assunzione", "impiego", "stagista", "collaboratore"],
        category: "Lavoro",
        budget: "1000-2500€",
    },
];

/// Reconcile a category name against the live catalog: exact
/// case-insensitive match first, then a substring match on the name's
/// first word. Short names can cross-match surprisingly; downstream data
/// depends on the existing matches, so the heuristic stays as-is.
pub(crate) fn reconcile_strict(category: &str, catalog: &[String]) -> Option<String> {
    let lower = category.to_lowercase();
    if let Some(exact) = catalog.iter().find(|c| c.to_lowercase() == lower) {
        return Some(exact.clone());
    }
    let first_word = lower.split_whitespace().next().unwrap_or(lower.as_str());
    catalog
        .iter()
        .find(|c| c.to_lowercase().contains(first_word))
        .cloned()
}

/// Like [`reconcile_strict`], but unmatched names pass through unchanged.
fn reconcile(category: &str, catalog: &[String]) -> String {
    reconcile_strict(category, catalog).unwrap_or_else(|| category.to_string())
}

fn format_range(min: f64, max: f64) -> String {
    format!("{}-{}€", min.round() as i64, max.round() as i64)
}

/// Parse a `min-max` bracket, tolerating a trailing currency sign.
pub(crate) fn parse_bracket(text: &str) -> Option<(f64, f64)> {
    let (min, max) = text.trim().trim_end_matches('€').split_once('-')?;
    let min: f64 = min.trim().parse().ok()?;
    let max: f64 = max.trim().parse().ok()?;
    Some((min, max))
}

fn with_range(mut suggestion: Suggestion, min: f64, max: f64) -> Suggestion {
    suggestion.budget_range = format_range(min, max);
    suggestion.budget_min = Some(min);
    suggestion.budget_max = Some(max);
    suggestion
}

/// Produce the best local suggestion for the current input.
pub fn synthesize(
    input: &str,
    catalog: &[String],
    signatures: &[LearnedSignature],
    answered: &AnsweredQuestions,
) -> Suggestion {
    // Answers the user already gave trump everything else. A category
    // answer decides the whole suggestion; a budget answer only pins the
    // range and leaves categories to the later branches.
    let mut budget_override = None;
    for answer in answered.values() {
        let lower = answer.to_lowercase();
        if let Some(entry) = catalog.iter().find(|c| {
            let c_lower = c.to_lowercase();
            c_lower.contains(&lower) || lower.contains(&c_lower)
        }) {
            let signature = signatures
                .iter()
                .find(|s| reconcile(&s.category, catalog) == *entry);
            let (min, max) = signature
                .map(|s| (s.min_budget, s.max_budget))
                .unwrap_or(DEFAULT_BUDGET_RANGE);
            return with_range(
                Suggestion {
                    categories: vec![entry.clone()],
                    ..Suggestion::default()
                },
                min,
                max,
            );
        }
        if budget_override.is_none() && (lower.contains('€') || lower.contains("budget")) {
            budget_override = clarify::extract_bracket(&lower).and_then(|b| parse_bracket(&b));
        }
    }

    let mut suggestion = synthesize_base(input, catalog, signatures);
    if let Some((min, max)) = budget_override {
        suggestion = with_range(suggestion, min, max);
    }
    suggestion
}

fn synthesize_base(
    input: &str,
    catalog: &[String],
    signatures: &[LearnedSignature],
) -> Suggestion {
    // Pattern-driven: the best viable match leads, the next two follow.
    let tokens = score::tokenize(input);
    let matches = score::rank(&tokens, signatures);
    if let Some(best) = matches.first() {
        let mut categories = vec![reconcile(&best.signature.category, catalog)];
        for m in matches.iter().skip(1).take(2) {
            let resolved = reconcile(&m.signature.category, catalog);
            if !categories.contains(&resolved) {
                categories.push(resolved);
            }
        }
        let clarification = (best.score < CONFIDENT_SCORE).then(|| {
            format!(
                "Abbiamo trovato {} richieste simili in {}: aggiungi qualche dettaglio per una stima più precisa.",
                best.signature.sample_count, best.signature.category
            )
        });
        let mut suggestion = with_range(
            Suggestion {
                categories,
                ..Suggestion::default()
            },
            best.signature.min_budget,
            best.signature.max_budget,
        );
        suggestion.clarification = clarification;
        return suggestion;
    }

    // Vague input, or nothing at all to go on.
    if clarify::is_vague(input) || (signatures.is_empty() && catalog.is_empty()) {
        let categories: Vec<String> = if !signatures.is_empty() {
            signatures.iter().take(3).map(|s| s.category.clone()).collect()
        } else if !catalog.is_empty() {
            catalog.iter().take(3).cloned().collect()
        } else {
            DEFAULT_CATEGORIES.iter().map(|c| c.to_string()).collect()
        };
        let (min, max) = DEFAULT_BUDGET_RANGE;
        let mut suggestion = with_range(
            Suggestion {
                categories,
                ..Suggestion::default()
            },
            min,
            max,
        );
        suggestion.clarification = Some(
            "Dicci qualcosa in più su cosa stai cercando: anche una sola parola chiave aiuta a restringere la categoria."
                .to_string(),
        );
        return suggestion;
    }

    // Static keyword table, first hit wins.
    let lower = input.to_lowercase();
    for rule in FALLBACK_RULES {
        if rule.keywords.iter().any(|k| lower.contains(k)) {
            let primary = reconcile(rule.category, catalog);
            let mut categories = vec![primary.clone()];
            // Related catalog entries share the primary's first word.
            let prefix = primary
                .split_whitespace()
                .next()
                .unwrap_or_default()
                .to_lowercase();
            if !prefix.is_empty() {
                for entry in catalog {
                    if categories.len() >= 3 {
                        break;
                    }
                    if *entry != primary && entry.to_lowercase().starts_with(&prefix) {
                        categories.push(entry.clone());
                    }
                }
            }
            let (budget_min, budget_max) = match parse_bracket(rule.budget) {
                Some((min, max)) => (Some(min), Some(max)),
                None => (None, None),
            };
            return Suggestion {
                categories,
                budget_range: rule.budget.to_string(),
                budget_min,
                budget_max,
                clarification: None,
            };
        }
    }

    // Default: something is always better than nothing.
    let categories = if catalog.is_empty() {
        vec!["Altro".to_string()]
    } else {
        catalog.iter().take(2).cloned().collect()
    };
    let (min, max) = DEFAULT_BUDGET_RANGE;
    let mut suggestion = with_range(
        Suggestion {
            categories,
            ..Suggestion::default()
        },
        min,
        max,
    );
    suggestion.clarification =
        Some("Prova a descrivere la richiesta in modo più specifico.".to_string());
    suggestion
}
