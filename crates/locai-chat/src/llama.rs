//! GGUF inference through llama.cpp.

use anyhow::{anyhow, bail, Result};
use std::num::NonZeroU32;
use std::ops::ControlFlow;
use std::path::Path;
use std::time::Instant;

use llama_cpp_2::{
    context::params::LlamaContextParams,
    llama_backend::LlamaBackend,
    llama_batch::LlamaBatch,
    model::{params::LlamaModelParams, AddBos, LlamaModel, Special},
    sampling::LlamaSampler,
};
use tracing::{debug, info, warn};

use locai_core::traits::Generator;
use locai_core::types::GenerationOptions;

pub struct LlamaGenerator {
    backend: LlamaBackend,
    model: LlamaModel,
    context_size: u32,
}

impl LlamaGenerator {
    /// Load a GGUF model for CPU inference.
    pub fn load(model_path: &Path, context_size: usize) -> Result<Self> {
        let backend = LlamaBackend::init().map_err(|e| anyhow!("Failed to initialize backend: {:?}", e))?;
        let model_params = LlamaModelParams::default().with_n_gpu_layers(0);
        let model = LlamaModel::load_from_file(&backend, model_path, &model_params)
            .map_err(|e| anyhow!("Failed to load model {}: {:?}", model_path.display(), e))?;
        info!("Loaded language model {}", model_path.display());
        Ok(Self { backend, model, context_size: context_size as u32 })
    }
}

impl Generator for LlamaGenerator {
    fn generate_stream(
        &self,
        prompt: &str,
        options: &GenerationOptions,
        on_token: &mut dyn FnMut(&str) -> ControlFlow<()>,
    ) -> Result<()> {
        let start = Instant::now();
        let prompt = prompt.replace('\0', "");
        let tokens = self
            .model
            .str_to_token(&prompt, AddBos::Always)
            .map_err(|e| anyhow!("Failed to tokenize: {:?}", e))?;
        if tokens.is_empty() {
            bail!("prompt produced no tokens");
        }
        let limit = tokens.len() + options.max_tokens;
        if limit > self.context_size as usize {
            bail!("prompt of {} tokens plus {} new tokens exceeds context size {}", tokens.len(), options.max_tokens, self.context_size);
        }

        let threads = i32::try_from(options.threads.max(1)).unwrap_or(1);
        let ctx_params = LlamaContextParams::default()
            .with_n_ctx(NonZeroU32::new(self.context_size))
            .with_n_batch(self.context_size)
            .with_n_threads(threads)
            .with_n_threads_batch(threads);
        let mut context = self
            .model
            .new_context(&self.backend, ctx_params)
            .map_err(|e| anyhow!("Failed to create context: {:?}", e))?;

        let mut batch = LlamaBatch::new(tokens.len().max(512), 1);
        let last = tokens.len() - 1;
        for (i, &token) in tokens.iter().enumerate() {
            batch
                .add(token, i as i32, &[0], i == last)
                .map_err(|e| anyhow!("Failed to add token to batch: {:?}", e))?;
        }
        context.decode(&mut batch).map_err(|e| anyhow!("Decode failed: {:?}", e))?;

        let eos = self.model.token_eos();
        let mut sampler = LlamaSampler::chain_simple([
            LlamaSampler::temp(0.7),
            LlamaSampler::top_p(0.95, 1),
            LlamaSampler::greedy(),
        ]);
        let mut n_cur = tokens.len();
        while n_cur < limit {
            let token = sampler.sample(&context, -1);
            if token == eos {
                break;
            }
            match self.model.token_to_str(token, Special::Plaintext) {
                Ok(piece) => {
                    if on_token(&piece).is_break() {
                        break;
                    }
                }
                Err(e) => warn!("Skipping undecodable token {}: {:?}", token, e),
            }
            batch.clear();
            batch.add(token, n_cur as i32, &[0], true).map_err(|e| anyhow!("Failed to add token: {:?}", e))?;
            context.decode(&mut batch).map_err(|e| anyhow!("Decode failed: {:?}", e))?;
            n_cur += 1;
        }
        debug!("Generated {} tokens in {:?}", n_cur - tokens.len(), start.elapsed());
        Ok(())
    }
}
