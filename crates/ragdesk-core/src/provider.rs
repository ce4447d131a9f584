use serde::{Deserialize, Serialize};

/// Backend model provider. Opaque to the client beyond being forwarded as
/// `model_provider` on every request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelProvider {
    #[default]
    OpenAI,
    Bailian,
}

impl ModelProvider {
    pub fn as_str(&self) -> &'static str {
        match self {
            ModelProvider::OpenAI => "openai",
            ModelProvider::Bailian => "bailian",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "openai" => Some(ModelProvider::OpenAI),
            "bailian" => Some(ModelProvider::Bailian),
            _ => None,
        }
    }

    pub fn all() -> Vec<ModelProvider> {
        vec![ModelProvider::OpenAI, ModelProvider::Bailian]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ModelProvider::OpenAI => "OpenAI",
            ModelProvider::Bailian => "Bailian (DashScope)",
        }
    }

    /// The next provider in `all()` order, wrapping around.
    pub fn next(&self) -> Self {
        let all = Self::all();
        let i = all.iter().position(|p| p == self).unwrap_or(0);
        all[(i + 1) % all.len()]
    }
}

/// How the backend slices an uploaded document.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChunkMode {
    #[default]
    Sliding,
    Semantic,
    Hybrid,
}

impl ChunkMode {
    pub fn as_str(&self) -> &'static str {
        match self {
            ChunkMode::Sliding => "sliding",
            ChunkMode::Semantic => "semantic",
            ChunkMode::Hybrid => "hybrid",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "sliding" => Some(ChunkMode::Sliding),
            "semantic" => Some(ChunkMode::Semantic),
            "hybrid" => Some(ChunkMode::Hybrid),
            _ => None,
        }
    }

    pub fn all() -> Vec<ChunkMode> {
        vec![ChunkMode::Sliding, ChunkMode::Semantic, ChunkMode::Hybrid]
    }

    pub fn display_name(&self) -> &'static str {
        match self {
            ChunkMode::Sliding => "Sliding window",
            ChunkMode::Semantic => "Semantic",
            ChunkMode::Hybrid => "Hybrid",
        }
    }

    pub fn description(&self) -> &'static str {
        match self {
            ChunkMode::Sliding => {
                "Fixed token window that slides across the text; overlap keeps context between chunks"
            }
            ChunkMode::Semantic => {
                "The model splits paragraphs by meaning; no length or overlap needed"
            }
            ChunkMode::Hybrid => {
                "Semantic split first, then oversized chunks are trimmed with a sliding window"
            }
        }
    }

    /// Whether chunk size and overlap mean anything for this mode.
    ///
    /// Only affects what the UI shows; the stored values are still sent.
    pub fn uses_window(&self) -> bool {
        !matches!(self, ChunkMode::Semantic)
    }
}
