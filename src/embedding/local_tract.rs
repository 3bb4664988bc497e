//! Pure-Rust local embedding via tract (fallback for musl and Intel Mac).
//!
//! Loads the ONNX export with tract-onnx and tokenizes with the tokenizers
//! crate. Inference runs inside `spawn_blocking`; there are no ONNX Runtime
//! or system library dependencies.
#![cfg_attr(
    all(feature = "local-embeddings-fastembed", feature = "local-embeddings-tract"),
    allow(dead_code)
)]

use anyhow::{anyhow, bail, Context, Result};
use std::path::{Path, PathBuf};
use tract_onnx::prelude::*;

const MAX_SEQ_LEN: usize = 256;

/// Where a supported model's files live on Hugging Face.
struct ModelFiles {
    repo: &'static str,
    onnx: &'static str,
    tokenizer: &'static str,
    dims: usize,
}

fn model_files(model_name: &str) -> Result<ModelFiles> {
    match model_name {
        "multilingual-e5-small" => Ok(ModelFiles {
            repo: "intfloat/multilingual-e5-small",
            onnx: "onnx/model.onnx",
            tokenizer: "tokenizer.json",
            dims: 384,
        }),
        "all-minilm-l6-v2" => Ok(ModelFiles {
            repo: "sentence-transformers/all-MiniLM-L6-v2",
            onnx: "onnx/model.onnx",
            tokenizer: "tokenizer.json",
            dims: 384,
        }),
        other => bail!(
            "Tract backend supports multilingual-e5-small and all-minilm-l6-v2. Requested: '{}'",
            other
        ),
    }
}

fn cache_dir() -> Result<PathBuf> {
    let base = std::env::var("HOME").unwrap_or_else(|_| ".".to_string());
    let dir = PathBuf::from(base)
        .join(".cache")
        .join("session-recall")
        .join("models");
    std::fs::create_dir_all(&dir).with_context(|| format!("Create cache dir {}", dir.display()))?;
    Ok(dir)
}

fn fetch_once(repo: &str, rel: &str, dest: &Path) -> Result<()> {
    if dest.exists() {
        return Ok(());
    }
    let url = format!("https://huggingface.co/{}/resolve/main/{}", repo, rel);
    tracing::info!(%url, "downloading model file");

    let bytes = reqwest::blocking::get(&url)
        .and_then(|r| r.error_for_status())
        .and_then(|r| r.bytes())
        .with_context(|| format!("Download {}", url))?;

    if let Some(parent) = dest.parent() {
        std::fs::create_dir_all(parent)?;
    }
    std::fs::write(dest, &bytes).with_context(|| format!("Write {}", dest.display()))?;
    Ok(())
}

/// Embed prepared inputs with the named model.
pub async fn embed_local_tract(
    model_name: &str,
    batch_size: usize,
    inputs: Vec<String>,
) -> Result<Vec<Vec<f32>>> {
    let model_name = model_name.to_string();
    tokio::task::spawn_blocking(move || run(&model_name, batch_size.max(1), &inputs)).await?
}

fn run(model_name: &str, batch_size: usize, inputs: &[String]) -> Result<Vec<Vec<f32>>> {
    let files = model_files(model_name)?;
    let model_dir = cache_dir()?.join(model_name);
    let onnx_path = model_dir.join(files.onnx);
    let tokenizer_path = model_dir.join(files.tokenizer);
    fetch_once(files.repo, files.onnx, &onnx_path)?;
    fetch_once(files.repo, files.tokenizer, &tokenizer_path)?;

    let tokenizer = tokenizers::Tokenizer::from_file(&tokenizer_path)
        .map_err(|e| anyhow!("Load tokenizer: {}", e))?;

    let typed = tract_onnx::onnx()
        .model_for_path(&onnx_path)
        .map_err(|e| anyhow!("Load ONNX: {}", e))?
        .into_optimized()
        .map_err(|e| anyhow!("Optimize: {}", e))?;
    // BERT-style exports (e5) also take token_type_ids.
    let wants_token_types = typed.inputs.len() == 3;
    let plan = typed
        .into_runnable()
        .map_err(|e| anyhow!("Build tract runnable: {}", e))?;

    let mut vectors = Vec::with_capacity(inputs.len());

    for batch in inputs.chunks(batch_size) {
        let encodings = batch
            .iter()
            .map(|s| {
                tokenizer
                    .encode(s.as_str(), true)
                    .map_err(|e| anyhow!("Tokenize: {}", e))
            })
            .collect::<Result<Vec<_>>>()?;

        let seq_len = encodings
            .iter()
            .map(|e| e.get_ids().len())
            .max()
            .unwrap_or(1)
            .clamp(1, MAX_SEQ_LEN);
        let rows = encodings.len();

        let mut ids = vec![0i64; rows * seq_len];
        let mut mask = vec![0i64; rows * seq_len];
        let mut lengths = Vec::with_capacity(rows);
        for (i, enc) in encodings.iter().enumerate() {
            let len = enc.get_ids().len().min(seq_len);
            for (j, &id) in enc.get_ids().iter().take(len).enumerate() {
                ids[i * seq_len + j] = id as i64;
                mask[i * seq_len + j] = 1;
            }
            lengths.push(len);
        }

        let shape = (rows, seq_len);
        let ids: Tensor = ndarray::Array2::from_shape_vec(shape, ids)?.into();
        let mask: Tensor = ndarray::Array2::from_shape_vec(shape, mask)?.into();
        let mut feed = tvec!(ids.into(), mask.into());
        if wants_token_types {
            let types: Tensor = ndarray::Array2::<i64>::zeros(shape).into();
            feed.push(types.into());
        }

        let outputs = plan.run(feed)?;
        let output = outputs
            .into_iter()
            .next()
            .ok_or_else(|| anyhow!("No output tensor"))?;
        let view = output.to_array_view::<f32>()?;

        match view.shape().len() {
            // Already pooled: [batch, dims]
            2 => {
                for i in 0..rows {
                    let row = view.slice(ndarray::s![i, ..]);
                    vectors.push(l2_normalize(row.iter().copied().collect()));
                }
            }
            // last_hidden_state: [batch, seq, dims], mean-pool the unmasked tokens
            3 => {
                for (i, &len) in lengths.iter().enumerate() {
                    let mut sum = vec![0f32; files.dims];
                    for j in 0..len {
                        for (k, &v) in view.slice(ndarray::s![i, j, ..]).iter().enumerate() {
                            if k < files.dims {
                                sum[k] += v;
                            }
                        }
                    }
                    if len > 0 {
                        sum.iter_mut().for_each(|x| *x /= len as f32);
                    }
                    vectors.push(l2_normalize(sum));
                }
            }
            _ => bail!("Unexpected output shape: {:?}", view.shape()),
        }
    }

    Ok(vectors)
}

fn l2_normalize(mut v: Vec<f32>) -> Vec<f32> {
    let norm = v.iter().map(|x| x * x).sum::<f32>().sqrt();
    if norm > 1e-9 {
        v.iter_mut().for_each(|x| *x /= norm);
    }
    v
}
