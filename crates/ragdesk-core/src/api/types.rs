//! Request and response bodies of the RAG backend.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::provider::{ChunkMode, ModelProvider};
use crate::state::RetrievalHit;

fn default_chunk_size() -> u32 {
    500
}

fn default_overlap() -> u32 {
    100
}

/// Summary row returned by `GET /document/list`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct DocumentInfo {
    pub doc_id: String,
    pub filename: String,
    pub chunk_count: u32,
    pub status: String,
    #[serde(default)]
    pub model_provider: String,
    #[serde(default = "default_chunk_mode")]
    pub chunk_mode: String,
    #[serde(default = "default_chunk_size")]
    pub chunk_size: u32,
    #[serde(default = "default_overlap")]
    pub overlap: u32,
}

fn default_chunk_mode() -> String {
    ChunkMode::default().as_str().to_string()
}

impl DocumentInfo {
    pub fn is_completed(&self) -> bool {
        self.status == "completed"
    }
}

/// Multipart fields sent alongside the file on upload.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UploadOptions {
    pub chunk_mode: ChunkMode,
    pub chunk_size: u32,
    pub overlap: u32,
    pub model_provider: ModelProvider,
}

#[derive(Debug, Deserialize)]
pub(crate) struct UploadResponse {
    pub doc_id: Option<String>,
    pub chunk_count: Option<u32>,
    pub error: Option<String>,
}

/// A successfully ingested document.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Uploaded {
    pub doc_id: String,
    pub chunk_count: u32,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChunkConfig {
    pub chunk_mode: String,
    pub chunk_size: u32,
    pub overlap: u32,
    pub model_provider: String,
}

#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChunkDetail {
    pub index: u32,
    pub token_count: u32,
    pub char_count: u32,
    pub content: String,
    pub embedding_dim: u32,
    #[serde(default)]
    pub embedding_preview: Vec<f64>,
}

/// Response of `GET /document/{id}/chunks`.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct ChunkResults {
    pub doc_id: String,
    pub filename: String,
    #[serde(default)]
    pub created_at: String,
    pub config: ChunkConfig,
    pub total_chunks: u32,
    pub chunks: Vec<ChunkDetail>,
}

/// Response of `GET /document/{id}/milvus`: the raw vector-store view of a
/// document, only ever displayed.
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
pub struct VectorDump {
    #[serde(default)]
    pub collection: String,
    #[serde(default)]
    pub schema: Value,
    #[serde(default)]
    pub total_records: u64,
    #[serde(default)]
    pub records: Vec<Value>,
}

/// Everything the document detail view shows.
#[derive(Debug, Clone, PartialEq)]
pub struct DocumentDetail {
    pub chunks: ChunkResults,
    pub vectors: VectorDump,
}

/// API-key configuration held by the backend. Keys come back masked.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize, Serialize)]
pub struct AppSettings {
    #[serde(default)]
    pub openai_api_key: String,
    #[serde(default)]
    pub openai_base_url: String,
    #[serde(default)]
    pub bailian_api_key: String,
}

/// Plain `{ "message": ... }` acknowledgement.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Ack {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct Health {
    pub status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct QueryRequest {
    pub question: String,
    pub model_provider: ModelProvider,
    pub top_k: u32,
    pub use_rerank: bool,
}

/// Response of the non-streaming `POST /query`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct QueryResponse {
    pub answer: String,
    #[serde(default)]
    pub contexts: Vec<String>,
    #[serde(default)]
    pub retrieval: Option<Vec<RetrievalHit>>,
    #[serde(default)]
    pub use_rerank: bool,
    #[serde(default)]
    pub prompt: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_info_fills_server_defaults() {
        let doc: DocumentInfo = serde_json::from_str(
            r#"{"doc_id":"a1","filename":"x.pdf","chunk_count":3,"status":"completed"}"#,
        )
        .unwrap();
        assert_eq!(doc.chunk_mode, "sliding");
        assert_eq!(doc.chunk_size, 500);
        assert_eq!(doc.overlap, 100);
        assert!(doc.is_completed());
    }

    #[test]
    fn test_query_request_serializes_provider_as_string() {
        let req = QueryRequest {
            question: "why?".to_string(),
            model_provider: ModelProvider::Bailian,
            top_k: 5,
            use_rerank: true,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert_eq!(value["model_provider"], "bailian");
        assert_eq!(value["top_k"], 5);
    }

    #[test]
    fn test_query_response_without_retrieval() {
        let resp: QueryResponse =
            serde_json::from_str(r#"{"answer":"none found","contexts":[]}"#).unwrap();
        assert!(resp.retrieval.is_none());
        assert!(!resp.use_rerank);
    }
}
