//! Domain types shared by the retrieval stages.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use serde::{Deserialize, Serialize};
use std::fmt;

pub type ChunkId = String;

/// Which index a chunk lives in. Each modality has its own collection and its
/// own embedding dimensionality.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Modality {
    Text,
    Image,
}

impl Modality {
    pub fn as_str(&self) -> &'static str {
        match self {
            Modality::Text => "text",
            Modality::Image => "image",
        }
    }
}

impl fmt::Display for Modality {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A passage of text extracted from a source document.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TextChunk {
    pub id: ChunkId,
    pub document_id: String,
    pub document_name: String,
    pub content: String,
}

/// One image extracted from (or uploaded as) a source document.
///
/// `image_payload` is base64 encoded; `description` is the caption used
/// wherever a textual stand-in is needed.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ImageChunk {
    pub id: ChunkId,
    pub document_id: String,
    pub document_name: String,
    pub image_payload: String,
    pub description: String,
}

/// A retrievable unit of content. Carries only the fields valid for its modality.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "modality", rename_all = "lowercase")]
pub enum Chunk {
    Text(TextChunk),
    Image(ImageChunk),
}

impl Chunk {
    pub fn id(&self) -> &str {
        match self {
            Chunk::Text(c) => &c.id,
            Chunk::Image(c) => &c.id,
        }
    }

    pub fn document_id(&self) -> &str {
        match self {
            Chunk::Text(c) => &c.document_id,
            Chunk::Image(c) => &c.document_id,
        }
    }

    pub fn document_name(&self) -> &str {
        match self {
            Chunk::Text(c) => &c.document_name,
            Chunk::Image(c) => &c.document_name,
        }
    }

    pub fn modality(&self) -> Modality {
        match self {
            Chunk::Text(_) => Modality::Text,
            Chunk::Image(_) => Modality::Image,
        }
    }

    /// Textual representation used for lexical scoring and reranking.
    pub fn text(&self) -> &str {
        match self {
            Chunk::Text(c) => &c.content,
            Chunk::Image(c) => &c.description,
        }
    }
}

impl From<TextChunk> for Chunk {
    fn from(c: TextChunk) -> Self {
        Chunk::Text(c)
    }
}

impl From<ImageChunk> for Chunk {
    fn from(c: ImageChunk) -> Self {
        Chunk::Image(c)
    }
}

/// A chunk annotated with the scores assigned by each pipeline stage.
///
/// - `similarity_score`: cosine similarity from the vector channel (channel-local)
/// - `lexical_score`: term-frequency heuristic, set when the lexical channel saw it
/// - `fused_score`: reciprocal-rank-fusion score
/// - `relevance_score`: cross-encoder score, or the similarity score on fallback
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ScoredChunk {
    pub chunk: Chunk,
    pub similarity_score: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lexical_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fused_score: Option<f32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub relevance_score: Option<f32>,
    #[serde(default)]
    pub rerank_fallback: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_url: Option<String>,
}

impl ScoredChunk {
    pub fn new(chunk: Chunk, similarity_score: f32) -> Self {
        Self {
            chunk,
            similarity_score,
            lexical_score: None,
            fused_score: None,
            relevance_score: None,
            rerank_fallback: false,
            file_url: None,
        }
    }

    pub fn id(&self) -> &str {
        self.chunk.id()
    }

    /// Score used to order results across modalities.
    pub fn score(&self) -> f32 {
        self.relevance_score.unwrap_or(self.similarity_score)
    }
}

/// Ordered result of one channel, of fusion, or of reranking.
pub type RankedList = Vec<ScoredChunk>;

/// A raw nearest-neighbour hit returned by a vector index.
#[derive(Debug, Clone, PartialEq)]
pub struct VectorHit {
    pub chunk: Chunk,
    pub score: f32,
}

impl From<VectorHit> for ScoredChunk {
    fn from(hit: VectorHit) -> Self {
        ScoredChunk::new(hit.chunk, hit.score)
    }
}

/// An image supplied with a query, either raw bytes or already base64 encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ImageInput {
    Bytes(Vec<u8>),
    Base64(String),
}

impl ImageInput {
    pub fn to_base64(&self) -> String {
        match self {
            ImageInput::Bytes(bytes) => STANDARD.encode(bytes),
            ImageInput::Base64(s) => s.clone(),
        }
    }
}
