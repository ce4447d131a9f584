pub mod api;
pub mod chat;
pub mod config;
pub mod error;
pub mod provider;
pub mod state;
pub mod transcript;

// Re-export main types for convenience
pub use api::{
    RagClient, StreamDecoder, StreamEvent, StreamHandler, StreamMetadata, StreamOutcome,
};
pub use chat::{ChatChange, ChatObserver, ChatSession, ChatState, MessageHandle, Submission};
pub use config::Config;
pub use error::ClientError;
pub use provider::{ChunkMode, ModelProvider};
pub use state::{ChatMessage, ChatRole, RetrievalHit};
pub use transcript::TranscriptStore;
