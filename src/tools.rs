//! Tool registry and built-in tools for the agent loop.
//!
//! Each tool carries a name, a one-line description, and an OpenAI-style
//! function-calling JSON Schema for its parameters. The registry is an
//! explicit name → spec map validated for uniqueness at registration;
//! execution goes through [`ToolRuntime`], which holds the retriever and
//! chat handles the tools need.

use anyhow::{bail, Result};
use serde_json::Value;
use std::collections::BTreeMap;
use std::sync::Arc;

use crate::config::OllamaConfig;
use crate::llm::{ChatMessage, ChatModel};
use crate::prompt;
use crate::retriever::Retriever;

/// Volumes considered when locating an event. Deliberately small so the
/// aggregated answer names at most a few volumes.
const FIND_VOLUME_K: usize = 3;

/// Declared interface of one tool.
#[derive(Debug, Clone)]
pub struct ToolSpec {
    pub name: String,
    pub description: String,
    /// OpenAI function-calling JSON Schema for the tool's parameters.
    pub parameters: Value,
}

impl ToolSpec {
    /// Single required string parameter, the shape every built-in uses.
    fn string_param(name: &str, description: &str, param: &str, param_desc: &str) -> Self {
        Self {
            name: name.to_string(),
            description: description.to_string(),
            parameters: serde_json::json!({
                "type": "object",
                "properties": {
                    param: { "type": "string", "description": param_desc }
                },
                "required": [param],
            }),
        }
    }

    /// Wire form for the model request.
    pub fn to_wire(&self) -> Value {
        serde_json::json!({
            "type": "function",
            "function": {
                "name": self.name,
                "description": self.description,
                "parameters": self.parameters,
            },
        })
    }
}

/// Name → spec map with registration-time uniqueness validation.
#[derive(Debug, Clone, Default)]
pub struct ToolRegistry {
    specs: BTreeMap<String, ToolSpec>,
}

impl ToolRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// All five built-in tools.
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        for spec in builtin_specs() {
            registry
                .register(spec)
                .expect("built-in tool names are unique");
        }
        registry
    }

    /// Register a tool, rejecting duplicate names.
    pub fn register(&mut self, spec: ToolSpec) -> Result<()> {
        if self.specs.contains_key(&spec.name) {
            bail!("Duplicate tool name: '{}'", spec.name);
        }
        self.specs.insert(spec.name.clone(), spec);
        Ok(())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.specs.contains_key(name)
    }

    /// Specs to bind into a model request.
    pub fn specs(&self) -> Vec<ToolSpec> {
        self.specs.values().cloned().collect()
    }
}

fn builtin_specs() -> Vec<ToolSpec> {
    vec![
        ToolSpec::string_param(
            "search_novels",
            prompt::SEARCH_TOOL_DESCRIPTION,
            "query",
            "A specific question or topic to search for",
        ),
        ToolSpec::string_param(
            "search_character",
            prompt::CHARACTER_TOOL_DESCRIPTION,
            "character_query",
            "A character name or character-related question",
        ),
        ToolSpec::string_param(
            "find_volume",
            prompt::VOLUME_FINDER_DESCRIPTION,
            "event_description",
            "A description of the event or information to locate",
        ),
        ToolSpec::string_param(
            "summarize_content",
            prompt::SUMMARIZER_DESCRIPTION,
            "text_to_summarize",
            "The text to summarize",
        ),
        ToolSpec::string_param(
            "analyze_timeline",
            prompt::TIMELINE_TOOL_DESCRIPTION,
            "timeline_query",
            "A timeline-related question",
        ),
    ]
}

/// Executes tool calls against the retriever and chat model.
pub struct ToolRuntime {
    retriever: Retriever,
    chat: Arc<dyn ChatModel>,
    ollama: OllamaConfig,
}

impl ToolRuntime {
    pub fn new(retriever: Retriever, chat: Arc<dyn ChatModel>, ollama: OllamaConfig) -> Self {
        Self {
            retriever,
            chat,
            ollama,
        }
    }

    /// Invoke a tool by name with the model-supplied arguments.
    ///
    /// Unknown names are an error here; the agent loop checks the registry
    /// first and skips unregistered names without calling in.
    pub async fn invoke(&self, name: &str, args: &Value) -> Result<String> {
        match name {
            "search_novels" => self.search_novels(&arg_str(args, "query")?).await,
            "search_character" => {
                self.search_character(&arg_str(args, "character_query")?).await
            }
            "find_volume" => self.find_volume(&arg_str(args, "event_description")?).await,
            "summarize_content" => {
                self.summarize_content(&arg_str(args, "text_to_summarize")?).await
            }
            "analyze_timeline" => {
                self.analyze_timeline(&arg_str(args, "timeline_query")?).await
            }
            other => bail!("Unknown tool: '{}'", other),
        }
    }

    async fn search_novels(&self, query: &str) -> Result<String> {
        let k = self.retriever.default_k();
        let mode = self.retriever.default_mode()?;
        let results = self.retriever.retrieve(query, k, mode).await?;

        if results.is_empty() {
            return Ok("No relevant passages found in the volume database.".to_string());
        }

        let parts: Vec<String> = results
            .iter()
            .enumerate()
            .map(|(i, r)| {
                format!(
                    "[Result {} - {}, Page {}]\n{}",
                    i + 1,
                    r.chunk.source_file,
                    r.chunk.page,
                    r.chunk.text
                )
            })
            .collect();

        Ok(parts.join("\n\n---\n\n"))
    }

    async fn search_character(&self, character_query: &str) -> Result<String> {
        // Bias retrieval toward descriptive passages about the character.
        let enhanced = format!(
            "character {} description appearance personality",
            character_query
        );
        let k = self.retriever.default_k();
        let mode = self.retriever.default_mode()?;
        let results = self.retriever.retrieve(&enhanced, k, mode).await?;

        if results.is_empty() {
            return Ok(format!(
                "No information found about '{}' in the volume database.",
                character_query
            ));
        }

        let parts: Vec<String> = results
            .iter()
            .enumerate()
            .map(|(i, r)| {
                format!(
                    "[Character Info {} - {}, Page {}]\n{}",
                    i + 1,
                    r.chunk.source_file,
                    r.chunk.page,
                    r.chunk.text
                )
            })
            .collect();

        Ok(parts.join("\n\n---\n\n"))
    }

    async fn find_volume(&self, event_description: &str) -> Result<String> {
        let results = self
            .retriever
            .retrieve(
                event_description,
                FIND_VOLUME_K,
                self.retriever.default_mode()?,
            )
            .await?;

        if results.is_empty() {
            return Ok("Could not locate this event in any of the available volumes.".to_string());
        }

        let mut volumes_found: Vec<&str> = Vec::new();
        let mut lines = Vec::new();

        for r in &results {
            let source = r.chunk.source_file.as_str();
            if !volumes_found.contains(&source) {
                volumes_found.push(source);
            }
            lines.push(format!("Found in: {}, Page {}", source, r.chunk.page));
            lines.push(format!("Context: {}", excerpt(&r.chunk.text, 300)));
        }

        Ok(format!(
            "This event appears in: {}\n\n{}",
            volumes_found.join(", "),
            lines.join("\n\n")
        ))
    }

    async fn summarize_content(&self, text: &str) -> Result<String> {
        let summary_prompt = format!(
            "Please summarize the following text concisely, preserving the key \
             information and events:\n\n{}\n\nSummary:",
            text
        );

        let response = self
            .chat
            .complete(
                &[ChatMessage::user(summary_prompt)],
                &[],
                self.ollama.summary_temperature,
            )
            .await?;

        Ok(response.text)
    }

    async fn analyze_timeline(&self, timeline_query: &str) -> Result<String> {
        let k = self.retriever.default_k();
        let mode = self.retriever.default_mode()?;
        let results = self.retriever.retrieve(timeline_query, k, mode).await?;

        if results.is_empty() {
            return Ok("No timeline information found for this query.".to_string());
        }

        // Passages are listed in retrieval-rank order, not in-story order.
        let mut out = String::from("Timeline Analysis:\n\n");
        for (i, r) in results.iter().enumerate() {
            out.push_str(&format!(
                "{}. [{}, Page {}]\n   {}\n\n",
                i + 1,
                r.chunk.source_file,
                r.chunk.page,
                excerpt(&r.chunk.text, 200)
            ));
        }

        Ok(out)
    }
}

/// Extract a required string argument, accepting either an object field or
/// a bare string value.
fn arg_str(args: &Value, key: &str) -> Result<String> {
    if let Some(s) = args.as_str() {
        return Ok(s.to_string());
    }
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
        .ok_or_else(|| anyhow::anyhow!("Missing tool argument: '{}'", key))
}

/// First `max_chars` characters with a trailing ellipsis.
fn excerpt(text: &str, max_chars: usize) -> String {
    let taken: String = text.chars().take(max_chars).collect();
    format!("{}...", taken)
}
