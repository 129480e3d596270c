//! Tolerant parsing of completion-service responses
//!
//! Models love wrapping JSON in prose and markdown fences. The proposal is
//! extracted from the first balanced-brace block found in the text.

use anyhow::Result;
use serde::Deserialize;

/// What the external service proposes for the current input
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AssistProposal {
    #[serde(default)]
    pub categories: Vec<String>,
    #[serde(default)]
    pub budget_range: Option<String>,
    #[serde(default)]
    pub budget_min: Option<f64>,
    #[serde(default)]
    pub budget_max: Option<f64>,
    #[serde(default)]
    pub clarification: Option<String>,
}

fn strip_markdown_fences(text: &str) -> &str {
    let trimmed = text.trim();
    let clean = if let Some(rest) = trimmed.strip_prefix("```json") {
        rest
    } else if let Some(rest) = trimmed.strip_prefix("```") {
        rest
    } else {
        trimmed
    };
    clean.strip_suffix("```").unwrap_or(clean).trim()
}

/// First balanced-brace JSON block in the text, if any.
///
/// Braces inside string literals don't count toward the balance.
pub fn extract_json_block(text: &str) -> Option<&str> {
    let mut depth: i32 = 0;
    let mut start = None;
    let mut in_string = false;
    let mut escaped = false;

    for (i, c) in text.char_indices() {
        if in_string {
            if escaped {
                escaped = false;
            } else if c == '\\' {
                escaped = true;
            } else if c == '"' {
                in_string = false;
            }
            continue;
        }
        match c {
            '"' if depth > 0 => in_string = true,
            '{' => {
                if depth == 0 {
                    start = Some(i);
                }
                depth += 1;
            }
            '}' => {
                if depth > 0 {
                    depth -= 1;
                    if depth == 0 {
                        return start.map(|s| &text[s..=i]);
                    }
                }
            }
            _ => {}
        }
    }
    None
}

/// Parse a proposal out of a possibly prose-wrapped response.
pub fn parse_proposal(response: &str) -> Result<AssistProposal> {
    let clean = strip_markdown_fences(response);
    let block = extract_json_block(clean)
        .ok_or_else(|| anyhow::anyhow!("no JSON object found in response"))?;
    serde_json::from_str(block).map_err(|e| anyhow::anyhow!("malformed proposal: {}", e))
}
