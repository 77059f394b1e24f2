//! Embedding backends.
//!
//! `MiniLmEmbedder` runs a sentence-transformers BERT checkpoint (by default
//! all-MiniLM-L6-v2, 384 dimensions) with candle. `FakeEmbedder` is a
//! deterministic stand-in selected with `APP_USE_FAKE_EMBEDDINGS=1`.

use anyhow::{Result, anyhow, bail};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use candle_core::{DType, Device, Tensor};
use candle_nn::VarBuilder;
use candle_transformers::models::bert::{BertModel, Config as BertConfig};
use tokenizers::Tokenizer;
use tracing::{debug, info};

use locai_core::config::EmbeddingSettings;

pub mod cache;
pub mod device;
pub mod fake;
pub mod pool;
pub mod tokenize;

pub use cache::CachedEmbedder;
pub use fake::FakeEmbedder;
pub use locai_core::traits::Embedder;
pub use pool::masked_mean_l2;

pub const DEFAULT_MODEL_NAME: &str = "all-MiniLM-L6-v2";
pub const FAKE_EMBEDDING_DIM: usize = 384;

pub struct MiniLmEmbedder {
    model: BertModel,
    tokenizer: Tokenizer,
    device: Device,
    id: String,
    dim: usize,
    max_len: usize,
    batch_size: usize,
    pad_id: u32,
}

impl MiniLmEmbedder {
    pub fn new(model_dir: &Path, settings: &EmbeddingSettings) -> Result<Self> {
        let device = device::select_device();
        info!("Loading embedding model from {}", model_dir.display());

        let tokenizer_path = model_dir.join("tokenizer.json");
        let tokenizer = Tokenizer::from_file(&tokenizer_path)
            .map_err(|e| anyhow!("Failed to load tokenizer from {}: {}", tokenizer_path.display(), e))?;
        let pad_id = tokenizer.token_to_id("[PAD]").unwrap_or(0);

        let config_text = std::fs::read_to_string(model_dir.join("config.json"))?;
        let config: BertConfig = serde_json::from_str(&config_text)?;
        let raw: serde_json::Value = serde_json::from_str(&config_text)?;
        let dim = raw
            .get("hidden_size")
            .and_then(serde_json::Value::as_u64)
            .ok_or_else(|| anyhow!("config.json has no hidden_size"))? as usize;

        let safetensors = model_dir.join("model.safetensors");
        let weights: std::collections::HashMap<String, Tensor> = if safetensors.exists() {
            candle_core::safetensors::load(&safetensors, &device)?
        } else {
            candle_core::pickle::read_all(model_dir.join("pytorch_model.bin"))?.into_iter().collect()
        };
        let vb = VarBuilder::from_tensors(weights, DType::F32, &device);
        let model = BertModel::load(vb, &config)?;

        let name = model_dir.file_name().map(|n| n.to_string_lossy().to_string()).unwrap_or_else(|| DEFAULT_MODEL_NAME.to_string());
        let id = format!("minilm:{name}:d{dim}");
        info!("Embedding model ready: {id}");
        Ok(Self { model, tokenizer, device, id, dim, max_len: settings.max_len, batch_size: settings.batch_size.max(1), pad_id })
    }

    fn embed_chunk(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let (input_ids, attention_mask) = tokenize::tokenize_batch(&self.tokenizer, texts, self.max_len, self.pad_id, &self.device)?;
        let token_type_ids = input_ids.zeros_like()?;
        let hidden = self.model.forward(&input_ids, &token_type_ids, Some(&attention_mask))?;
        let pooled = masked_mean_l2(&hidden, &attention_mask)?;
        let rows: Vec<Vec<f32>> = pooled.to_device(&Device::Cpu)?.to_vec2()?;
        Ok(rows)
    }
}

impl Embedder for MiniLmEmbedder {
    fn embedder_id(&self) -> &str { &self.id }
    fn dim(&self) -> usize { self.dim }
    fn max_len(&self) -> usize { self.max_len }

    fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let start = Instant::now();
        let mut out = Vec::with_capacity(texts.len());
        for batch in texts.chunks(self.batch_size) {
            let rows = self.embed_chunk(batch)?;
            if rows.len() != batch.len() { bail!("model returned {} rows for {} inputs", rows.len(), batch.len()); }
            out.extend(rows);
        }
        debug!("Embedded {} texts in {:?}", texts.len(), start.elapsed());
        Ok(out)
    }
}

/// Construct the process-wide embedder. Built once and shared by reference.
pub fn get_default_embedder(settings: &EmbeddingSettings) -> Result<Arc<dyn Embedder>> {
    let use_fake = std::env::var("APP_USE_FAKE_EMBEDDINGS").ok().map(|v| v == "1" || v.eq_ignore_ascii_case("true")).unwrap_or(false);
    if use_fake {
        info!("Using FakeEmbedder (APP_USE_FAKE_EMBEDDINGS)");
        return Ok(Arc::new(FakeEmbedder::new(FAKE_EMBEDDING_DIM)));
    }
    let model_dir = resolve_model_dir(settings.model_dir.as_deref())?;
    Ok(Arc::new(MiniLmEmbedder::new(&model_dir, settings)?))
}

fn resolve_model_dir(configured: Option<&Path>) -> Result<PathBuf> {
    if let Some(p) = configured { if p.exists() { return Ok(p.to_path_buf()); } bail!("Configured embedding model dir {} does not exist", p.display()); }
    for var in ["APP_MODEL_DIR", "MODEL_DIR"] {
        if let Ok(dir) = std::env::var(var) { let p = PathBuf::from(&dir); if p.exists() { debug!("Using {var}: {}", p.display()); return Ok(p); } }
    }
    for candidate in [Path::new("models").join(DEFAULT_MODEL_NAME), Path::new("../models").join(DEFAULT_MODEL_NAME)] {
        if candidate.exists() { return Ok(candidate); }
    }
    Err(anyhow!("Could not locate the {DEFAULT_MODEL_NAME} model directory; set embedding.model_dir or APP_MODEL_DIR"))
}
