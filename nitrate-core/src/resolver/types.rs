use serde::{Deserialize, Serialize};

/// `movie` or `tv`, as produced by Stage A and consumed by Stage B
/// (SPEC_FULL.md §4.3).
#[derive(Debug, Clone, Copy, Hash, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    Movie,
    Tv,
}

impl MediaType {
    pub fn other(self) -> MediaType {
        match self {
            MediaType::Movie => MediaType::Tv,
            MediaType::Tv => MediaType::Movie,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            MediaType::Movie => "movie",
            MediaType::Tv => "tv",
        }
    }
}

/// Stage A output: an unverified structured parse of a filename.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilenameGuess {
    pub title: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub year: Option<i32>,
    pub season: Option<u32>,
    pub episode: Option<u32>,
}

/// Stage B output: the canonical record the Worker persists as
/// `processed_data` (SPEC_FULL.md §3, glossary: "Resolved record").
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedRecord {
    pub tmdb_id: i64,
    pub media_type: MediaType,
    pub title: String,
    pub year: Option<i32>,
    /// The provider's result verbatim, for operator inspection and as the
    /// durable `processed_data` payload.
    pub raw: serde_json::Value,
}
