//! Optional external completion service
//!
//! Best-effort enhancement of locally synthesized suggestions. Missing
//! configuration is a normal state, not an error, and no failure here ever
//! reaches the user: the caller falls back to the local suggestion.

mod client;
mod parse;

pub use client::AssistClient;
pub use parse::{extract_json_block, parse_proposal, AssistProposal};

use crate::patterns::LearnedSignature;
use crate::synth::{self, Suggestion};

/// How many signatures the prompt embeds as context
const PROMPT_SIGNATURES: usize = 5;

pub const SYSTEM_PROMPT: &str = "Sei l'assistente di un marketplace di richieste. \
Dato il testo di una richiesta, proponi le categorie più adatte e una fascia di budget. \
Rispondi SOLO con un oggetto JSON: \
{\"categories\": [\"...\"], \"budgetRange\": \"min-max€\", \"budgetMin\": 0, \"budgetMax\": 0, \"clarification\": null}";

/// Structured prompt embedding the raw input, the catalog slice and the
/// strongest learned signatures.
pub fn build_prompt(input: &str, catalog: &[String], signatures: &[LearnedSignature]) -> String {
    let mut prompt = format!("Richiesta dell'utente: \"{}\"\n\n", input.trim());

    if !catalog.is_empty() {
        prompt.push_str("Categorie disponibili:\n");
        for entry in catalog {
            prompt.push_str(&format!("- {}\n", entry));
        }
        prompt.push('\n');
    }

    let top: Vec<&LearnedSignature> = signatures.iter().take(PROMPT_SIGNATURES).collect();
    if !top.is_empty() {
        prompt.push_str("Profili appresi dalle richieste recenti:\n");
        for sig in top {
            prompt.push_str(&format!(
                "- {} ({} richieste, budget {:.0}-{:.0}€, parole chiave: {})\n",
                sig.category,
                sig.sample_count,
                sig.min_budget,
                sig.max_budget,
                sig.keywords.join(", ")
            ));
        }
        prompt.push('\n');
    }

    prompt.push_str("Scegli solo tra le categorie disponibili quando possibile.");
    prompt
}

/// Apply an external proposal on top of the local suggestion.
///
/// Only catalog-reconciled categories survive; when none do, the local
/// suggestion is returned untouched. Fields the service omitted keep their
/// local values.
pub fn apply_proposal(
    local: &Suggestion,
    proposal: AssistProposal,
    catalog: &[String],
) -> Suggestion {
    let mut categories: Vec<String> = Vec::new();
    for category in &proposal.categories {
        if let Some(resolved) = synth::reconcile_strict(category, catalog) {
            if !categories.contains(&resolved) {
                categories.push(resolved);
            }
        }
    }
    if categories.is_empty() {
        return local.clone();
    }

    let mut merged = local.clone();
    merged.categories = categories;
    if let Some(range) = proposal.budget_range.filter(|r| !r.trim().is_empty()) {
        merged.budget_range = range;
    }
    if proposal.budget_min.is_some() {
        merged.budget_min = proposal.budget_min;
    }
    if proposal.budget_max.is_some() {
        merged.budget_max = proposal.budget_max;
    }
    if proposal.clarification.is_some() {
        merged.clarification = proposal.clarification;
    }
    merged
}
