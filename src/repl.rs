//! Interactive chat session.
//!
//! Reads user turns from stdin, dispatches slash commands, and routes
//! questions to the tool-calling agent or the simple RAG chain. A failed
//! turn is reported and the loop continues; `/quit` and end-of-input both
//! terminate normally.

use anyhow::Result;
use std::io::{self, BufRead, Write};
use std::path::Path;
use std::sync::Arc;
use uuid::Uuid;

use crate::agent::{Agent, SimpleRag};
use crate::config::Config;
use crate::embedding::EmbeddingProvider;
use crate::ingest;
use crate::llm::ChatModel;
use crate::registry;
use crate::retriever::Retriever;
use crate::store::VectorStore;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Mode {
    Agent,
    Simple,
}

fn print_banner() {
    println!();
    println!("============================================================");
    println!("Shiori — light-novel reading companion");
    println!("============================================================");
    println!("Ask questions about your volumes.");
    println!("Commands: /help, /status, /ingest, /clear, /simple, /agent, /quit");
    println!("============================================================");
    println!();
}

fn print_help() {
    println!(
        "
Available commands:
  /help          - Show this help message
  /status        - Show ingestion status
  /ingest        - Ingest all files from the library directory
  /ingest <path> - Ingest a specific file
  /clear         - Clear conversation history
  /simple        - Switch to simple RAG mode (no tools)
  /agent         - Switch to full agent mode (with tools)
  /quit          - Exit

Anything else is sent to the assistant as a question.
"
    );
}

/// Run the interactive loop until `/quit` or end-of-input.
pub async fn run(
    config: &Config,
    store: Arc<dyn VectorStore>,
    embedder: Arc<dyn EmbeddingProvider>,
    model: Arc<dyn ChatModel>,
) -> Result<()> {
    print_banner();

    let reg = registry::load_registry(&config.db.registry_path)?;
    if reg.is_empty() {
        println!("No volumes ingested yet.");
        println!("  put PDFs in: {}", config.library.docs_dir.display());
        println!("  then run: /ingest");
        println!();
    }

    let retriever = Retriever::new(store.clone(), embedder.clone(), config.retrieval.clone());
    let mut agent = Agent::new(
        model.clone(),
        retriever.clone(),
        &config.ollama,
        &config.memory,
    );
    let mut simple = SimpleRag::new(model, retriever, &config.ollama, &config.memory);

    let session_id = Uuid::new_v4().to_string();
    let mut mode = Mode::Agent;

    println!("Ready. Type a question or /help for commands.");

    let stdin = io::stdin();
    loop {
        print!("\nYou: ");
        io::stdout().flush()?;

        let mut line = String::new();
        if stdin.lock().read_line(&mut line)? == 0 {
            // End of input.
            println!("\nGoodbye!");
            return Ok(());
        }

        let input = line.trim();
        if input.is_empty() {
            continue;
        }

        if let Some(command) = input.strip_prefix('/') {
            if !handle_command(
                command,
                config,
                store.as_ref(),
                embedder.as_ref(),
                &mut agent,
                &mut simple,
                &session_id,
                &mut mode,
            )
            .await?
            {
                return Ok(());
            }
            continue;
        }

        println!("\nThinking...\n");
        let result = match mode {
            Mode::Agent => agent.chat(&session_id, input).await,
            Mode::Simple => simple.query(input).await,
        };

        match result {
            Ok(answer) => println!("Assistant: {}", answer),
            Err(e) => eprintln!("Error: {:#}", e),
        }
    }
}

/// Handle one slash command. Returns `false` to quit.
#[allow(clippy::too_many_arguments)]
async fn handle_command(
    command: &str,
    config: &Config,
    store: &dyn VectorStore,
    embedder: &dyn EmbeddingProvider,
    agent: &mut Agent,
    simple: &mut SimpleRag,
    session_id: &str,
    mode: &mut Mode,
) -> Result<bool> {
    let (name, arg) = match command.split_once(char::is_whitespace) {
        Some((n, a)) => (n, a.trim()),
        None => (command, ""),
    };

    match name.to_lowercase().as_str() {
        "quit" | "exit" => {
            println!("Goodbye!");
            return Ok(false);
        }
        "help" => print_help(),
        "status" => {
            if let Err(e) = ingest::print_status(config, store).await {
                eprintln!("Error: {:#}", e);
            }
        }
        "ingest" => {
            if arg.is_empty() {
                println!("Ingesting files from {}...", config.library.docs_dir.display());
                if let Err(e) =
                    ingest::ingest_directory(config, store, embedder, &config.library.docs_dir, false)
                        .await
                {
                    eprintln!("Error: {:#}", e);
                }
            } else {
                let path = Path::new(arg);
                if path.exists() {
                    let outcome = ingest::ingest_file(config, store, embedder, path, false).await;
                    println!("Result: {:?}", outcome.status);
                    if let Some(detail) = outcome.detail {
                        println!("  {}", detail);
                    }
                } else {
                    println!("File not found: {}", arg);
                }
            }
        }
        "clear" => {
            agent.clear_history(session_id);
            simple.clear_history();
            println!("Conversation history cleared.");
        }
        "simple" => {
            *mode = Mode::Simple;
            println!("Switched to simple RAG mode.");
        }
        "agent" => {
            *mode = Mode::Agent;
            println!("Switched to full agent mode.");
        }
        other => {
            println!("Unknown command: /{}", other);
            println!("Type /help for available commands.");
        }
    }

    Ok(true)
}
