use std::ops::ControlFlow;

use crate::types::GenerationOptions;

/// Text → fixed-length vector backend.
///
/// Implementations must be pure functions of their input text: the same string
/// always maps to the same vector, and `embed_batch` preserves input order.
pub trait Embedder: Send + Sync {
    /// Stable identifier for the model (e.g. `minilm:all-MiniLM-L6-v2:d384`).
    fn embedder_id(&self) -> &str;
    fn dim(&self) -> usize;
    fn max_len(&self) -> usize;
    fn embed_batch(&self, texts: &[String]) -> anyhow::Result<Vec<Vec<f32>>>;
}

/// Language-model backend that streams generated text piece by piece.
///
/// `on_token` is called for every decoded piece; returning `Break` asks the
/// backend to stop as soon as possible. Backends that cannot stream may call
/// it once with the whole completion.
pub trait Generator: Send + Sync {
    fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        on_token: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> anyhow::Result<()>;
}
