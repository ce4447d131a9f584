pub mod client;
pub mod stream;
pub mod types;

pub use client::RagClient;
pub use stream::{pump_events, StreamDecoder, StreamEvent, StreamHandler, StreamMetadata, StreamOutcome};
pub use types::{
    Ack, AppSettings, ChunkConfig, ChunkDetail, ChunkResults, DocumentDetail, DocumentInfo, Health,
    QueryRequest, QueryResponse, UploadOptions, Uploaded, VectorDump,
};
