//! Session controller
//!
//! One controller per evolving user input. It debounces input changes,
//! sequences question → answer → re-suggestion, and reports everything
//! over an event channel. Each input change bumps a generation counter;
//! results of a superseded debounce cycle are dropped on arrival, so the
//! last input always wins.

use crate::assist::{self, AssistClient};
use crate::clarify::{self, AnsweredQuestions, Question, MAX_QUESTIONS_PER_SESSION};
use crate::patterns::{LearnedSignature, PatternStore};
use crate::store::RecordStore;
use crate::synth::{self, Suggestion};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::mpsc;

/// Trailing debounce before an input change is processed
pub const DEBOUNCE_MS: u64 = 1000;

/// Inputs shorter than this clear all state and trigger no work
const MIN_INPUT_CHARS: usize = 3;

/// How many catalog entries one evaluation works with
const CATALOG_LIMIT: usize = 20;

/// Everything the UI collaborator hears from the engine
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Input dropped below the minimum; suggestion and question state gone
    Cleared,
    /// The engine wants one clarifying answer before suggesting
    Question(Question),
    /// Final suggestion for the current input
    Suggestion(Suggestion),
    /// User clicked a suggested category
    CategoryChosen(String),
    /// User clicked a suggested budget
    BudgetChosen(String),
}

struct SessionState {
    input: String,
    answered: AnsweredQuestions,
    pending: Option<Question>,
}

/// Orchestrates pattern loading, clarification and synthesis for one
/// user input stream.
#[derive(Clone)]
pub struct SessionController {
    records: Arc<dyn RecordStore>,
    patterns: Arc<PatternStore>,
    assist: Option<Arc<AssistClient>>,
    state: Arc<Mutex<SessionState>>,
    generation: Arc<AtomicU64>,
    events: mpsc::UnboundedSender<SessionEvent>,
    debounce: Duration,
}

impl SessionController {
    pub fn new(
        records: Arc<dyn RecordStore>,
        patterns: Arc<PatternStore>,
        assist: Option<Arc<AssistClient>>,
    ) -> (Self, mpsc::UnboundedReceiver<SessionEvent>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let controller = Self {
            records,
            patterns,
            assist,
            state: Arc::new(Mutex::new(SessionState {
                input: String::new(),
                answered: AnsweredQuestions::default(),
                pending: None,
            })),
            generation: Arc::new(AtomicU64::new(0)),
            events: tx,
            debounce: Duration::from_millis(DEBOUNCE_MS),
        };
        (controller, rx)
    }

    /// Override the debounce interval (configuration, tests).
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// The user edited the raw input. Supersedes any in-flight cycle.
    pub fn input_changed(&self, text: &str) {
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        let text = text.trim().to_string();

        if text.chars().count() < MIN_INPUT_CHARS {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            state.input.clear();
            state.answered.clear();
            state.pending = None;
            drop(state);
            let _ = self.events.send(SessionEvent::Cleared);
            return;
        }

        {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            state.input = text.clone();
        }

        let controller = self.clone();
        let debounce = self.debounce;
        tokio::spawn(async move {
            tokio::time::sleep(debounce).await;
            if controller.generation.load(Ordering::SeqCst) != generation {
                return;
            }
            controller.evaluate(generation, text).await;
        });
    }

    /// The user answered the pending question. Answers to unknown or stale
    /// question ids are ignored.
    pub async fn answer(&self, question_id: &str, answer: &str) {
        let (question, input) = {
            let Ok(mut state) = self.state.lock() else {
                return;
            };
            let question = match state.pending.take() {
                Some(q) if q.id == question_id => q,
                other => {
                    state.pending = other;
                    return;
                }
            };
            state.answered.record(&question, answer);
            (question, state.input.clone())
        };

        // Escape answers re-evaluate from the original input directly.
        let effective = clarify::refine_input(&input, &question, answer).unwrap_or(input);

        // An answer supersedes any in-flight debounce cycle.
        let generation = self.generation.fetch_add(1, Ordering::SeqCst) + 1;
        self.evaluate(generation, effective).await;
    }

    /// Forget everything about the current input stream.
    pub fn reset(&self) {
        self.generation.fetch_add(1, Ordering::SeqCst);
        let Ok(mut state) = self.state.lock() else {
            return;
        };
        state.input.clear();
        state.answered.clear();
        state.pending = None;
        drop(state);
        let _ = self.events.send(SessionEvent::Cleared);
    }

    /// The user clicked a rendered category. Never fired automatically.
    pub fn choose_category(&self, category: &str) {
        let _ = self
            .events
            .send(SessionEvent::CategoryChosen(category.to_string()));
    }

    /// The user clicked a rendered budget. Never fired automatically.
    pub fn choose_budget(&self, value: &str) {
        let _ = self.events.send(SessionEvent::BudgetChosen(value.to_string()));
    }

    async fn evaluate(&self, generation: u64, input: String) {
        let signatures = self.patterns.load().await;
        let catalog = match self.records.active_categories(CATALOG_LIMIT).await {
            Ok(catalog) => catalog,
            Err(err) => {
                eprintln!("  Warning: catalog unavailable: {}", err);
                Vec::new()
            }
        };

        let (answered, question_pending, asked) = {
            let Ok(state) = self.state.lock() else {
                return;
            };
            (
                state.answered.clone(),
                state.pending.is_some(),
                state.answered.asked(),
            )
        };

        let baseline = synth::synthesize(&input, &catalog, &signatures, &answered);

        if clarify::should_clarify(&input, &baseline, &signatures)
            && !question_pending
            && asked < MAX_QUESTIONS_PER_SESSION
        {
            if let Some(question) = clarify::generate_question(&catalog, &answered) {
                if self.generation.load(Ordering::SeqCst) != generation {
                    return;
                }
                let Ok(mut state) = self.state.lock() else {
                    return;
                };
                state.pending = Some(question.clone());
                drop(state);
                let _ = self.events.send(SessionEvent::Question(question));
                return;
            }
        }

        let suggestion = self
            .enhance(&input, &catalog, &signatures, baseline)
            .await;
        if self.generation.load(Ordering::SeqCst) != generation {
            return;
        }
        let _ = self.events.send(SessionEvent::Suggestion(suggestion));
    }

    async fn enhance(
        &self,
        input: &str,
        catalog: &[String],
        signatures: &[LearnedSignature],
        local: Suggestion,
    ) -> Suggestion {
        let Some(client) = &self.assist else {
            return local;
        };
        let prompt = assist::build_prompt(input, catalog, signatures);
        let result = match client.complete(assist::SYSTEM_PROMPT, &prompt).await {
            Ok(text) => assist::parse_proposal(&text),
            Err(err) => Err(err),
        };
        match result {
            Ok(proposal) => assist::apply_proposal(&local, proposal, catalog),
            Err(err) => {
                eprintln!(
                    "  Warning: completion service unavailable, using local suggestion: {}",
                    err
                );
                local
            }
        }
    }
}
