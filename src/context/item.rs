use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ItemType {
    File,
    Note,
    LazyDiff,
    Diff,
    DiffError,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum ItemPayload {
    File { path: String },
    Note { text: String },
    LazyDiff { argv: Vec<String> },
    Diff { content: String },
    DiffError { stderr: String },
}

impl ItemPayload {
    pub fn type_name(&self) -> &'static str {
        match self {
            ItemPayload::File { .. } => "file",
            ItemPayload::Note { .. } => "note",
            ItemPayload::LazyDiff { .. } => "lazy-diff",
            ItemPayload::Diff { .. } => "diff",
            ItemPayload::DiffError { .. } => "diff-error",
        }
    }

    pub fn item_type(&self) -> ItemType {
        match self {
            ItemPayload::File { .. } => ItemType::File,
            ItemPayload::Note { .. } => ItemType::Note,
            ItemPayload::LazyDiff { .. } => ItemType::LazyDiff,
            ItemPayload::Diff { .. } => ItemType::Diff,
            ItemPayload::DiffError { .. } => ItemType::DiffError,
        }
    }
}

/// One entry in a mode's ordered context list. `id` is assigned by
/// `max(existing) + 1`; removal never renumbers survivors.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ContextItem {
    pub id: i64,
    pub label: String,
    pub payload: ItemPayload,
}
