//! `aru memory`: inspect and maintain long-term memory.

use super::runtime::open_memory;
use aru_config::AppConfig;
use aru_core::memory::{MemoryRecord, MemoryType};
use clap::Subcommand;
use serde_json::Map;
use std::path::PathBuf;

#[derive(Subcommand)]
pub enum MemoryAction {
    /// Search memories by relevance (decay applied)
    Search {
        query: String,
        #[arg(short, long, default_value_t = 10)]
        limit: usize,
        /// Only episodic, semantic or procedural records
        #[arg(short = 't', long = "type", value_parser = parse_memory_type)]
        memory_type: Option<MemoryType>,
    },
    /// List stored memories
    List {
        #[arg(short = 't', long = "type", value_parser = parse_memory_type)]
        memory_type: Option<MemoryType>,
    },
    /// Store a fact or preference
    AddFact {
        fact: String,
        #[arg(short, long, default_value = "general")]
        category: String,
    },
    /// Write all memories to a JSON file
    Export { output: PathBuf },
    /// Load memories from a JSON file written by `export`
    Import { input: PathBuf },
    /// Delete one memory by id
    Delete { id: String },
    /// Show backend and record counts
    Stats,
}

fn parse_memory_type(value: &str) -> Result<MemoryType, String> {
    value.parse().map_err(|e: aru_core::error::MemoryError| e.to_string())
}

fn preview(content: &str, max_chars: usize) -> String {
    let first_line = content.lines().next().unwrap_or_default();
    if first_line.chars().count() > max_chars || content.lines().nth(1).is_some() {
        let cut: String = first_line.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        first_line.to_string()
    }
}

fn print_record(index: usize, record: &MemoryRecord, with_score: bool) {
    let when = record
        .created_at
        .map(|t| t.format("%Y-%m-%d").to_string())
        .unwrap_or_else(|| "undated".into());
    if with_score {
        println!(
            "  {:>2}. [{} {:.2}] {} ({when})",
            index + 1,
            record.memory_type,
            record.score,
            preview(&record.content, 80)
        );
    } else {
        println!("  {:>2}. [{}] {} ({when})", index + 1, record.memory_type, preview(&record.content, 80));
    }
    println!("      id: {}", record.id);
}

pub async fn run(config: AppConfig, action: MemoryAction) -> anyhow::Result<()> {
    let memory = open_memory(&config, None).await?;

    match action {
        MemoryAction::Search {
            query,
            limit,
            memory_type,
        } => {
            println!("🔍 Searching memories for: \"{query}\"\n");
            let results = memory.search(&query, memory_type, limit, true).await?;
            if results.is_empty() {
                println!("   No memories found.");
            }
            for (i, record) in results.iter().enumerate() {
                print_record(i, record, true);
            }
        }
        MemoryAction::List { memory_type } => {
            let records = memory.get_all(memory_type).await?;
            if records.is_empty() {
                println!("   No memories stored for {}.", memory.user_id());
            }
            for (i, record) in records.iter().enumerate() {
                print_record(i, record, false);
            }
        }
        MemoryAction::AddFact { fact, category } => {
            let id = memory.add_fact(&fact, &category, Map::new()).await?;
            println!("✅ Stored fact {id}");
        }
        MemoryAction::Export { output } => {
            let count = memory.export_json(&output).await?;
            println!("📤 Exported {count} memories to {}", output.display());
        }
        MemoryAction::Import { input } => {
            let count = memory.import_json(&input).await?;
            println!("📥 Imported {count} memories from {}", input.display());
        }
        MemoryAction::Delete { id } => {
            if memory.delete(&id).await? {
                println!("🗑️  Deleted memory {id}");
            } else {
                println!("   No memory with id {id}");
            }
        }
        MemoryAction::Stats => {
            let records = memory.get_all(None).await?;
            let of_type = |t: MemoryType| records.iter().filter(|r| r.memory_type == t).count();
            let decay = memory.decay_policy();

            println!("🧠 Memory Statistics");
            println!("====================");
            println!("  User:       {}", memory.user_id());
            println!("  Backend:    {} ({})", memory.backend_name(), config.memory_path().display());
            println!("  Total:      {}", records.len());
            println!("  Episodic:   {}", of_type(MemoryType::Episodic));
            println!("  Semantic:   {}", of_type(MemoryType::Semantic));
            println!("  Procedural: {}", of_type(MemoryType::Procedural));
            println!(
                "  Decay:      {} days, threshold {:.2}",
                decay.window_days, decay.threshold
            );
        }
    }

    Ok(())
}
