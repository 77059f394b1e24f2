//! Conversation layer: chat templates, generation backends and the RAG-aware session.

pub mod generate;
#[cfg(feature = "llama")]
pub mod llama;
pub mod session;
pub mod template;

pub use generate::{generate, EchoGenerator};
#[cfg(feature = "llama")]
pub use llama::LlamaGenerator;
pub use session::{ChatSession, ContextRecord, Reply};
pub use template::ChatTemplate;
