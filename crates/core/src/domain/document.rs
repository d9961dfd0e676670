use serde::{Deserialize, Serialize};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DocumentKind {
    Resume,
    Background,
}

impl DocumentKind {
    pub const ALL: [DocumentKind; 2] = [DocumentKind::Resume, DocumentKind::Background];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Resume => "resume",
            Self::Background => "background",
        }
    }
}

/// A parsed grounding document. Immutable once cached.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct GroundingDocument {
    pub kind: DocumentKind,
    pub byte_len: usize,
    pub text: String,
}
