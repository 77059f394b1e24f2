//! Conversation state: bounded history, optional document context, and a
//! per-message record of the chunks each answer was given.

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::Arc;

use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use locai_core::chunker::ChunkingConfig;
use locai_core::config::{Settings, HISTORY_PAIRS_LIMIT};
use locai_core::error::{Error, Result};
use locai_core::prompt::build_prompt;
use locai_core::traits::{Embedder, Generator};
use locai_core::types::{GenerationOptions, Message, RetrievedChunk, Role};
use locai_vector::{BuildReport, IndexBuilder, Retriever, SnapshotHandle};

use crate::generate::generate;
use crate::template::ChatTemplate;

/// What a user message was answered with.
#[derive(Debug, Clone, PartialEq)]
pub struct ContextRecord {
    pub query: String,
    pub chunks: Vec<RetrievedChunk>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Reply {
    /// Key for [`ChatSession::context`].
    pub message_id: u64,
    pub text: String,
    pub used_context: bool,
}

pub struct ChatSession {
    generator: Arc<dyn Generator>,
    embedder: Arc<dyn Embedder>,
    snapshots: Arc<SnapshotHandle>,
    template: ChatTemplate,
    options: GenerationOptions,
    chunking: ChunkingConfig,
    batch_size: usize,
    top_k: usize,
    rag_enabled: bool,
    history_pairs: usize,
    history: Vec<Message>,
    contexts: BTreeMap<u64, ContextRecord>,
    next_message_id: u64,
}

impl ChatSession {
    pub fn new(
        generator: Arc<dyn Generator>,
        embedder: Arc<dyn Embedder>,
        snapshots: Arc<SnapshotHandle>,
        settings: &Settings,
    ) -> Self {
        let template = ChatTemplate::default();
        Self {
            generator,
            embedder,
            snapshots,
            options: GenerationOptions {
                max_tokens: settings.generation.max_tokens,
                threads: settings.generation.threads,
                stop: template.stop_sequences(),
            },
            template,
            chunking: settings.chunking,
            batch_size: settings.embedding.batch_size,
            top_k: settings.rag.top_k,
            rag_enabled: settings.rag.enabled,
            history_pairs: settings.generation.history_pairs,
            history: Vec::new(),
            contexts: BTreeMap::new(),
            next_message_id: 0,
        }
    }

    pub fn with_template(mut self, template: ChatTemplate) -> Self {
        self.template = template;
        self.options.stop = template.stop_sequences();
        self
    }

    pub fn history(&self) -> &[Message] { &self.history }

    pub fn rag_enabled(&self) -> bool { self.rag_enabled }

    pub fn set_rag_enabled(&mut self, enabled: bool) {
        self.rag_enabled = enabled;
        info!("RAG context {}", if enabled { "enabled" } else { "disabled" });
    }

    pub fn history_pairs(&self) -> usize { self.history_pairs }

    /// Change how many user/assistant pairs are remembered; applies immediately.
    pub fn set_history_pairs(&mut self, pairs: usize) -> Result<()> {
        if pairs == 0 || pairs > HISTORY_PAIRS_LIMIT {
            return Err(Error::InvalidConfig(format!(
                "conversation memory must be between 1 and {HISTORY_PAIRS_LIMIT} pairs"
            )));
        }
        self.history_pairs = pairs;
        self.trim_history();
        Ok(())
    }

    pub fn context(&self, message_id: u64) -> Option<&ContextRecord> { self.contexts.get(&message_id) }

    pub fn clear(&mut self) {
        self.history.clear();
        self.contexts.clear();
        self.next_message_id = 0;
    }

    /// Answer `input`, using retrieved document chunks when RAG is on and an index is loaded.
    ///
    /// On failure or cancellation the user message and its context record are
    /// removed again, so the history never holds an unanswered question.
    pub fn send(&mut self, input: &str, cancel: &CancellationToken) -> Result<Reply> {
        let input = input.trim();
        if input.is_empty() {
            return Err(Error::NoInput("empty message".to_string()));
        }
        if cancel.is_cancelled() {
            return Err(Error::Cancelled);
        }
        self.history.push(Message::user(input));
        let message_id = self.next_message_id;
        self.next_message_id += 1;

        match self.answer(input, message_id, cancel) {
            Ok(reply) => {
                self.history.push(Message::assistant(reply.text.clone()));
                self.trim_history();
                Ok(reply)
            }
            Err(e) => {
                if self.history.last().is_some_and(|m| m.role == Role::User) {
                    self.history.pop();
                }
                self.contexts.remove(&message_id);
                Err(e)
            }
        }
    }

    fn answer(&mut self, input: &str, message_id: u64, cancel: &CancellationToken) -> Result<Reply> {
        let chunks = if self.rag_enabled { self.retrieve(input)? } else { Vec::new() };
        self.contexts.insert(message_id, ContextRecord { query: input.to_string(), chunks: chunks.clone() });

        let used_context = !chunks.is_empty();
        let prompt = if used_context {
            let texts: Vec<&str> = chunks.iter().map(|c| c.text.as_str()).collect();
            build_prompt(&texts, input)
        } else {
            input.to_string()
        };
        let prior = &self.history[..self.history.len() - 1];
        let rendered = self.template.render(prior, &prompt);
        let text = generate(self.generator.as_ref(), &rendered, &self.options, cancel)?;
        Ok(Reply { message_id, text, used_context })
    }

    fn retrieve(&self, input: &str) -> Result<Vec<RetrievedChunk>> {
        match self.snapshots.current() {
            Some(snapshot) => Retriever::new(snapshot, self.embedder.clone()).retrieve_hits(input, self.top_k),
            None => {
                warn!("No index loaded from {}; answering without document context", self.snapshots.dir().display());
                Ok(Vec::new())
            }
        }
    }

    fn trim_history(&mut self) {
        let max_messages = self.history_pairs * 2;
        if self.history.len() > max_messages {
            self.history.drain(..self.history.len() - max_messages);
        }
        // Only answered turns have records, one per remembered pair.
        while self.contexts.len() > self.history.len() / 2 {
            self.contexts.pop_first();
        }
    }

    /// Rebuild the index from `documents_dir` and make it the session's snapshot.
    pub fn update_index(&self, documents_dir: &Path) -> Result<BuildReport> {
        IndexBuilder::new(self.embedder.clone(), self.chunking)
            .with_batch_size(self.batch_size)
            .with_progress(true)
            .rebuild(documents_dir, &self.snapshots)
    }
}
