use std::path::Path;

use reqwest::header::ACCEPT;
use reqwest::multipart::{Form, Part};
use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use super::stream::{pump_events, StreamHandler, StreamOutcome};
use super::types::{
    Ack, AppSettings, ChunkResults, DocumentDetail, DocumentInfo, Health, QueryRequest,
    QueryResponse, UploadOptions, UploadResponse, Uploaded, VectorDump,
};
use crate::error::{ClientError, Result};
use crate::provider::ModelProvider;

/// HTTP client for the RAG backend.
///
/// `base_url` includes the API prefix, e.g. `http://localhost:8000/api`.
#[derive(Clone)]
pub struct RagClient {
    client: Client,
    base_url: String,
}

impl RagClient {
    pub fn new(base_url: &str) -> Self {
        Self {
            client: Client::new(),
            base_url: base_url.trim_end_matches('/').to_string(),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    pub async fn health(&self) -> Result<Health> {
        let response = self.client.get(self.url("/health")).send().await?;
        read_json(response).await
    }

    /// Upload a file for chunking and embedding.
    ///
    /// `chunk_size` and `overlap` are always sent, even for chunk modes that
    /// ignore them.
    pub async fn upload_document(&self, path: &Path, options: &UploadOptions) -> Result<Uploaded> {
        let bytes = tokio::fs::read(path).await?;
        let filename = path
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|| "upload".to_string());

        info!(
            file = %filename,
            size = bytes.len(),
            chunk_mode = options.chunk_mode.as_str(),
            provider = options.model_provider.as_str(),
            "uploading document"
        );

        let form = Form::new()
            .part("file", Part::bytes(bytes).file_name(filename))
            .text("chunk_mode", options.chunk_mode.as_str())
            .text("chunk_size", options.chunk_size.to_string())
            .text("overlap", options.overlap.to_string())
            .text("model_provider", options.model_provider.as_str());

        let response = self
            .client
            .post(self.url("/document/upload"))
            .multipart(form)
            .send()
            .await?;

        let body: UploadResponse = read_json(response).await?;
        if let Some(error) = body.error {
            return Err(ClientError::Server(error));
        }
        match (body.doc_id, body.chunk_count) {
            (Some(doc_id), Some(chunk_count)) => Ok(Uploaded { doc_id, chunk_count }),
            _ => Err(ClientError::Server(
                "upload response is missing doc_id or chunk_count".to_string(),
            )),
        }
    }

    pub async fn list_documents(&self) -> Result<Vec<DocumentInfo>> {
        let response = self.client.get(self.url("/document/list")).send().await?;
        read_json(response).await
    }

    pub async fn chunk_results(&self, doc_id: &str) -> Result<ChunkResults> {
        let url = self.url(&format!("/document/{}/chunks", doc_id));
        let response = self.client.get(url).send().await?;
        read_json(response).await
    }

    pub async fn vector_dump(&self, doc_id: &str) -> Result<VectorDump> {
        let url = self.url(&format!("/document/{}/milvus", doc_id));
        let response = self.client.get(url).send().await?;
        read_json(response).await
    }

    /// Chunk results and the vector-store dump, fetched concurrently.
    pub async fn document_detail(&self, doc_id: &str) -> Result<DocumentDetail> {
        let (chunks, vectors) =
            tokio::try_join!(self.chunk_results(doc_id), self.vector_dump(doc_id))?;
        Ok(DocumentDetail { chunks, vectors })
    }

    pub async fn delete_document(&self, doc_id: &str, provider: ModelProvider) -> Result<Ack> {
        let url = self.url(&format!("/document/{}", doc_id));
        let response = self
            .client
            .delete(url)
            .query(&[("model_provider", provider.as_str())])
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn settings(&self) -> Result<AppSettings> {
        let response = self.client.get(self.url("/settings")).send().await?;
        read_json(response).await
    }

    /// Save API keys. The backend skips empty values and values that still
    /// contain mask characters, so sending back what `settings()` returned is
    /// harmless.
    pub async fn save_settings(&self, settings: &AppSettings) -> Result<Ack> {
        let response = self
            .client
            .post(self.url("/settings"))
            .json(settings)
            .send()
            .await?;
        read_json(response).await
    }

    pub async fn query(&self, request: &QueryRequest) -> Result<QueryResponse> {
        let response = self
            .client
            .post(self.url("/query"))
            .json(request)
            .send()
            .await?;
        read_json(response).await
    }

    /// Ask a question and stream the answer into `handler`.
    ///
    /// Any failure, including a non-2xx status, is reported through
    /// `handler.on_error` exactly once. Cancelling `cancel` ends the call
    /// quietly with [`StreamOutcome::Aborted`].
    pub async fn query_stream<H>(
        &self,
        request: &QueryRequest,
        handler: &mut H,
        cancel: &CancellationToken,
    ) -> StreamOutcome
    where
        H: StreamHandler + ?Sized,
    {
        debug!(
            provider = request.model_provider.as_str(),
            top_k = request.top_k,
            use_rerank = request.use_rerank,
            "opening answer stream"
        );

        let response = match self.open_stream(request, cancel).await {
            Ok(response) => response,
            Err(err) if err.is_aborted() => return StreamOutcome::Aborted,
            Err(err) => {
                handler.on_error(&err);
                return StreamOutcome::Failed;
            }
        };

        pump_events(response.bytes_stream(), cancel, handler).await
    }

    async fn open_stream(&self, request: &QueryRequest, cancel: &CancellationToken) -> Result<Response> {
        let send = self
            .client
            .post(self.url("/query/stream"))
            .header(ACCEPT, "text/event-stream")
            .json(request)
            .send();

        let response = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Err(ClientError::Aborted),
            response = send => response?,
        };
        ensure_success(response).await
    }
}

async fn ensure_success(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(ClientError::Http { status, body })
}

async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
    let response = ensure_success(response).await?;
    let text = response.text().await?;
    match serde_json::from_str(&text) {
        Ok(value) => Ok(value),
        Err(source) => Err(ClientError::Decode {
            payload: text,
            source,
        }),
    }
}
