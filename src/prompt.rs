//! Persona and prompt assembly.
//!
//! The persona is a static deployment string. It instructs the model to
//! answer only from supplied context, to say so when the context is
//! insufficient, and to cite sources. Two request forms are produced from
//! the same ingredients: a single flattened prompt for the simple RAG path
//! and a structured message list for the tool-calling path.

use crate::llm::ChatMessage;
use crate::memory::ConversationMemory;

/// System persona for the tool-calling agent.
pub const AGENT_SYSTEM_PROMPT: &str = "\
You are an expert assistant for a personal library of light-novel volumes. \
You can retrieve relevant passages from the embedded volumes to answer questions \
about characters, plot, events, and themes.

Guidelines:
1. Base your answers only on retrieved context from the volumes.
2. If the context does not contain the answer, say \"I couldn't find this in the available volumes\" rather than inventing one.
3. Cite the volume and page the information comes from when available.
4. Distinguish between events from different volumes.
5. Be precise and engaging when discussing the story.";

/// System persona for the simple RAG chain.
pub const RAG_SYSTEM_PROMPT: &str = "\
You are a helpful assistant that answers questions based on provided context \
from light-novel volumes.

1. Answer the question based only on the provided context.
2. If the context doesn't contain the answer, say \"I couldn't find this information in the available volumes\".
3. Cite the source (volume, page) when providing information.
4. Be accurate and avoid making up information.";

pub const SEARCH_TOOL_DESCRIPTION: &str = "Search the volume database for relevant passages. \
Use this to find information about any topic in the volumes: characters, plot events, \
relationships, specific scenes, or world-building details.";

pub const CHARACTER_TOOL_DESCRIPTION: &str = "Find information about a specific character: \
descriptions, appearance, backstory, relationships, and development. \
Input is a character name or character-related question.";

pub const VOLUME_FINDER_DESCRIPTION: &str = "Identify which volume contains a specific event \
or piece of information. Input is a description of the event to locate.";

pub const SUMMARIZER_DESCRIPTION: &str = "Condense a long passage into a concise summary, \
preserving key information and events. Input is the text to summarize.";

pub const TIMELINE_TOOL_DESCRIPTION: &str = "Collect passages related to a topic's story \
progression, with volume and page attribution. Input is a timeline-related question.";

/// Flattened single-prompt form used by the simple RAG path.
///
/// Carries the same information as [`assemble_messages`]: persona, a
/// labeled context section, a labeled history section, and the question.
pub fn assemble_flat(
    persona: &str,
    retrieved_context: &str,
    memory: &ConversationMemory,
    user_input: &str,
) -> String {
    format!(
        "{persona}\n\n\
         ## Context from the volumes:\n{context}\n\n\
         ## Conversation history:\n{history}\n\n\
         ## User question:\n{question}\n\n\
         Please provide a helpful answer based on the context above.",
        persona = persona,
        context = retrieved_context,
        history = memory.formatted_history(),
        question = user_input,
    )
}

/// Structured message-list form used by the tool-calling path: system
/// persona, prior turns in order, then the user's new message.
pub fn assemble_messages(
    persona: &str,
    memory: &ConversationMemory,
    user_input: &str,
) -> Vec<ChatMessage> {
    let mut messages = Vec::with_capacity(memory.len() + 2);
    messages.push(ChatMessage::system(persona));
    messages.extend(memory.as_messages());
    messages.push(ChatMessage::user(user_input));
    messages
}

/// Synthetic follow-up turn carrying tool results back to the model.
pub fn tool_results_followup(results_block: &str) -> String {
    format!(
        "Based on the retrieved information:\n{}\n\nProvide a helpful answer.",
        results_block
    )
}
