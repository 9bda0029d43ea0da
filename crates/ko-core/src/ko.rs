use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Classification of a knowledge object.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum KoType {
    /// Default: a raw captured note.
    #[default]
    Fragment,
    /// A bridge note created from a positive collision between two KOs.
    Synthesis,
    /// A recorded observation about existing material.
    Observation,
}

impl KoType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Fragment => "fragment",
            Self::Synthesis => "synthesis",
            Self::Observation => "observation",
        }
    }

    pub fn from_str_lossy(s: &str) -> Self {
        match s {
            "synthesis" => Self::Synthesis,
            "observation" => Self::Observation,
            _ => Self::Fragment,
        }
    }
}

/// A single note in the corpus. Identity is immutable; content fields
/// are replaced wholesale on update.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct KnowledgeObject {
    pub id: Uuid,
    pub title: String,
    pub content: String,
    pub content_hash: String,
    pub ko_type: KoType,
    pub tags: Vec<String>,
    pub created_at: u64,
    pub updated_at: u64,
}

impl KnowledgeObject {
    pub fn new(title: &str, content: &str, ko_type: KoType, tags: Vec<String>, now_ms: u64) -> Self {
        Self {
            id: Uuid::new_v4(),
            title: title.to_string(),
            content: content.to_string(),
            content_hash: content_hash(content),
            ko_type,
            tags,
            created_at: now_ms,
            updated_at: now_ms,
        }
    }

    /// Replace content fields wholesale. Returns false (and leaves
    /// updated_at alone) when the content hash is unchanged — callers
    /// use this to skip re-embedding.
    pub fn update_content(&mut self, title: &str, content: &str, tags: Vec<String>, now_ms: u64) -> bool {
        let hash = content_hash(content);
        if hash == self.content_hash && title == self.title && tags == self.tags {
            return false;
        }
        self.title = title.to_string();
        self.content = content.to_string();
        self.content_hash = hash;
        self.tags = tags;
        self.updated_at = now_ms;
        true
    }

    /// Text fed to the embedder: title and content together.
    pub fn embedding_text(&self) -> String {
        format!("{} {}", self.title, self.content)
    }
}

/// FNV-1a 64-bit content hash, hex-encoded.
pub fn content_hash(content: &str) -> String {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;

    let mut hash = FNV_OFFSET;
    for byte in content.as_bytes() {
        hash ^= u64::from(*byte);
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{hash:016x}")
}
