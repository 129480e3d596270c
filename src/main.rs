//! Interactive demo for the richiesta engine
//!
//! Each line you type is treated as an input change; the engine answers
//! with a suggestion or a clarifying question after the debounce window.

use clap::Parser;
use richiesta::assist::AssistClient;
use richiesta::cache::{FileCache, MemoryCache, PatternCache};
use richiesta::clarify::Question;
use richiesta::config::Config;
use richiesta::patterns::PatternStore;
use richiesta::session::{SessionController, SessionEvent};
use richiesta::store::{HistoricalRecord, MemoryStore, RecordStatus};
use std::io::BufRead;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};
use std::time::Duration;

#[derive(Parser)]
#[command(
    name = "richiesta",
    about = "Adaptive suggestion engine for marketplace requests",
    version
)]
struct Cli {
    /// JSON snapshot of historical requests and categories
    #[arg(long)]
    data: Option<PathBuf>,

    /// Skip the pattern cache and force a fresh learning pass
    #[arg(long)]
    no_cache: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    let config = Config::load();

    let store = Arc::new(match &cli.data {
        Some(path) => MemoryStore::from_json_file(path)?,
        None => demo_store(),
    });

    let cache: Arc<dyn PatternCache> = if cli.no_cache {
        Arc::new(MemoryCache::default())
    } else {
        match FileCache::new() {
            Some(cache) => Arc::new(cache),
            None => Arc::new(MemoryCache::default()),
        }
    };

    let patterns = Arc::new(PatternStore::new(store.clone(), cache));
    let assist = AssistClient::from_config(&config).map(Arc::new);
    if assist.is_none() {
        println!("  (nessuna chiave API: suggerimenti solo locali)");
    }

    let (controller, mut events) = SessionController::new(store, patterns, assist);
    let controller = controller.with_debounce(Duration::from_millis(config.debounce_ms));

    let pending: Arc<Mutex<Option<Question>>> = Arc::new(Mutex::new(None));
    let pending_writer = pending.clone();
    tokio::spawn(async move {
        while let Some(event) = events.recv().await {
            match event {
                SessionEvent::Cleared => println!("  (stato azzerato)"),
                SessionEvent::Question(question) => {
                    println!("\n  ? {}", question.text);
                    for (i, option) in question.options.iter().enumerate() {
                        println!("    {}. {}", i + 1, option);
                    }
                    println!("  rispondi con /a <numero>");
                    if let Ok(mut slot) = pending_writer.lock() {
                        *slot = Some(question);
                    }
                }
                SessionEvent::Suggestion(suggestion) => {
                    println!("\n  Categorie: {}", suggestion.categories.join(", "));
                    println!("  Budget:    {}", suggestion.budget_range);
                    if let Some(note) = &suggestion.clarification {
                        println!("  Nota:      {}", note);
                    }
                }
                SessionEvent::CategoryChosen(category) => {
                    println!("  categoria scelta: {}", category)
                }
                SessionEvent::BudgetChosen(value) => println!("  budget scelto: {}", value),
            }
        }
    });

    println!("Scrivi la tua richiesta (/r azzera, /q esce):");
    let stdin = std::io::stdin();
    for line in stdin.lock().lines() {
        let line = line?;
        let trimmed = line.trim();
        match trimmed {
            "/q" => break,
            "/r" => controller.reset(),
            _ if trimmed.starts_with("/a ") => {
                let question = pending.lock().ok().and_then(|mut slot| slot.take());
                let Some(question) = question else {
                    println!("  nessuna domanda in sospeso");
                    continue;
                };
                let choice = trimmed[3..].trim().parse::<usize>().ok();
                match choice.and_then(|n| question.options.get(n.wrapping_sub(1))) {
                    Some(option) => controller.answer(&question.id, option).await,
                    None => {
                        println!("  scelta non valida");
                        if let Ok(mut slot) = pending.lock() {
                            *slot = Some(question);
                        }
                    }
                }
            }
            _ => controller.input_changed(trimmed),
        }
    }

    Ok(())
}

/// Small built-in dataset so the demo works without a snapshot file.
fn demo_store() -> MemoryStore {
    let record = |title: &str, category: &str, budget: f64| HistoricalRecord {
        title: title.to_string(),
        category: Some(category.to_string()),
        budget: Some(budget),
        status: RecordStatus::Active,
    };

    MemoryStore::new(
        vec![
            record("divano angolare in pelle", "Casa e Giardino", 650.0),
            record("tavolo allungabile rovere", "Casa e Giardino", 320.0),
            record("poltrona relax elettrica", "Casa e Giardino", 480.0),
            record("smartphone ricondizionato", "Elettronica", 210.0),
            record("televisore oled pollici", "Elettronica", 890.0),
            record("portatile per ufficio", "Elettronica", 560.0),
            record("scarpe running taglia quarantadue", "Moda", 90.0),
            record("borsa vintage pelle", "Moda", 140.0),
            record("sviluppo sito vetrina", "Servizi Professionali", 1200.0),
            record("logo per nuova attività", "Servizi Professionali", 350.0),
        ],
        vec![
            "Casa e Giardino".to_string(),
            "Elettronica".to_string(),
            "Moda".to_string(),
            "Servizi Professionali".to_string(),
            "Veicoli".to_string(),
        ],
    )
}
