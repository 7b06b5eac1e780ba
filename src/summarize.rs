//! PDF to narration text: extract, chunk, retrieve the most relevant chunks
//! by embedding similarity, then ask a chat model for a plain summary.

use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::path::Path;
use tracing::{debug, info};

use crate::config::AppConfig;
use crate::error::{PipelineError, PipelineResult};

pub const SUMMARY_QUERY: &str = "firstly summarize as detailed as you can in 3 paragraphs, \
     it should be simplified too for 40-50 year olds to understand";

pub const CHUNK_SIZE: usize = 2500;
pub const CHUNK_OVERLAP: usize = 100;
pub const TOP_K: usize = 4;

#[derive(Debug, Serialize)]
struct EmbeddingRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingResponse {
    data: Vec<EmbeddingItem>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingItem {
    #[serde(default)]
    index: usize,
    embedding: Vec<f32>,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage>,
    temperature: f32,
}

#[derive(Debug, Serialize, Deserialize)]
struct ChatMessage {
    role: String,
    content: String,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

pub struct Summarizer {
    http: reqwest::Client,
    base_url: String,
    api_key: String,
    chat_model: String,
    embedding_model: String,
}

impl Summarizer {
    pub fn from_config(config: &AppConfig) -> PipelineResult<Self> {
        Ok(Self {
            http: config.http_client()?,
            base_url: config.openai_base_url.trim_end_matches('/').to_string(),
            api_key: config.openai_key()?.to_string(),
            chat_model: config.openai_chat_model.clone(),
            embedding_model: config.openai_embedding_model.clone(),
        })
    }

    pub async fn summarize_pdf(&self, path: &Path) -> PipelineResult<String> {
        let text = extract_pdf_text(path).await?;
        info!("Extracted {} characters from {}", text.len(), path.display());
        self.summarize_text(&text).await
    }

    pub async fn summarize_text(&self, text: &str) -> PipelineResult<String> {
        let chunks = split_text(text, CHUNK_SIZE, CHUNK_OVERLAP);
        if chunks.is_empty() {
            return Err(PipelineError::Pdf("document has no extractable text".into()));
        }
        info!("Split document into {} chunks", chunks.len());

        let chunk_vectors = self.embed(&chunks).await?;
        let query_vector = self
            .embed(&[SUMMARY_QUERY.to_string()])
            .await?
            .into_iter()
            .next()
            .ok_or_else(|| PipelineError::upstream("empty embedding response for query"))?;

        let selected: Vec<&str> = rank_chunks(&query_vector, &chunk_vectors, TOP_K)
            .into_iter()
            .map(|i| chunks[i].as_str())
            .collect();
        debug!("Selected {} chunks for the summary prompt", selected.len());

        let summary = self.complete(&stuff_prompt(&selected, SUMMARY_QUERY)).await?;
        Ok(summary.trim().to_string())
    }

    async fn embed(&self, input: &[String]) -> PipelineResult<Vec<Vec<f32>>> {
        let res = self
            .http
            .post(format!("{}/v1/embeddings", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&EmbeddingRequest {
                model: &self.embedding_model,
                input,
            })
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(PipelineError::upstream(format!(
                "embeddings returned {}",
                res.status()
            )));
        }

        let mut parsed: EmbeddingResponse = res.json().await?;
        if parsed.data.len() != input.len() {
            return Err(PipelineError::upstream(format!(
                "expected {} embeddings, got {}",
                input.len(),
                parsed.data.len()
            )));
        }
        parsed.data.sort_by_key(|d| d.index);
        Ok(parsed.data.into_iter().map(|d| d.embedding).collect())
    }

    async fn complete(&self, prompt: &str) -> PipelineResult<String> {
        let res = self
            .http
            .post(format!("{}/v1/chat/completions", self.base_url))
            .bearer_auth(&self.api_key)
            .json(&ChatRequest {
                model: &self.chat_model,
                messages: vec![ChatMessage {
                    role: "user".into(),
                    content: prompt.to_string(),
                }],
                temperature: 0.7,
            })
            .send()
            .await?;
        if !res.status().is_success() {
            return Err(PipelineError::upstream(format!(
                "chat completion returned {}",
                res.status()
            )));
        }

        let parsed: ChatResponse = res.json().await?;
        parsed
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content)
            .filter(|c| !c.trim().is_empty())
            .ok_or_else(|| PipelineError::upstream("chat completion had no content"))
    }
}

pub async fn extract_pdf_text(path: &Path) -> PipelineResult<String> {
    let bytes = tokio::fs::read(path).await?;
    tokio::task::spawn_blocking(move || pdf_extract::extract_text_from_mem(&bytes))
        .await
        .map_err(|e| PipelineError::Pdf(e.to_string()))?
        .map_err(|e| PipelineError::Pdf(e.to_string()))
}

/// Split on newlines and greedily merge lines into chunks of at most
/// `chunk_size` characters, carrying up to `overlap` characters of trailing
/// lines into the next chunk. A single line longer than `chunk_size` becomes
/// its own oversized chunk.
pub fn split_text(text: &str, chunk_size: usize, overlap: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current: VecDeque<&str> = VecDeque::new();
    let mut total = 0usize;

    for line in text.split('\n').map(str::trim).filter(|l| !l.is_empty()) {
        let len = line.chars().count();
        let sep = usize::from(!current.is_empty());

        if total + len + sep > chunk_size && !current.is_empty() {
            chunks.push(join_lines(&current));
            while total > overlap
                || (total > 0 && total + len + usize::from(!current.is_empty()) > chunk_size)
            {
                let Some(first) = current.pop_front() else {
                    break;
                };
                total -= first.chars().count() + usize::from(!current.is_empty());
            }
        }

        total += len + usize::from(!current.is_empty());
        current.push_back(line);
    }

    if !current.is_empty() {
        chunks.push(join_lines(&current));
    }
    chunks
}

fn join_lines(lines: &VecDeque<&str>) -> String {
    lines.iter().copied().collect::<Vec<_>>().join("\n")
}

pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let dot: f32 = a.iter().zip(b).map(|(x, y)| x * y).sum();
    let na = a.iter().map(|x| x * x).sum::<f32>().sqrt();
    let nb = b.iter().map(|x| x * x).sum::<f32>().sqrt();
    if na == 0.0 || nb == 0.0 {
        return 0.0;
    }
    dot / (na * nb)
}

/// Indices of the `k` vectors most similar to `query`, best first.
pub fn rank_chunks(query: &[f32], vectors: &[Vec<f32>], k: usize) -> Vec<usize> {
    let mut scored: Vec<(usize, f32)> = vectors
        .iter()
        .enumerate()
        .map(|(i, v)| (i, cosine_similarity(query, v)))
        .collect();
    scored.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    scored.into_iter().take(k).map(|(i, _)| i).collect()
}

fn stuff_prompt(chunks: &[&str], question: &str) -> String {
    format!(
        "Use the following pieces of context to answer the question at the end. \
         If you don't know the answer, just say that you don't know, don't try to make up an answer.\n\n\
         {}\n\nQuestion: {}\nHelpful Answer:",
        chunks.join("\n\n"),
        question
    )
}
