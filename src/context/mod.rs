//! Context Manager (C4): the ordered list of context items feeding a
//! mode's assembled prompt, plus the pure argv helpers scripts call into.

mod item;
mod materialize;

pub use item::{ContextItem, ItemPayload, ItemType};
pub use materialize::{build_prompt, MaterializeOutcome};

use thiserror::Error;

use crate::procs::{self, ProcError};

#[derive(Debug, Error)]
pub enum ContextError {
    #[error("item {0} not found")]
    ItemNotFound(i64),

    #[error("cannot edit a {0} item directly; edit the underlying file instead")]
    NotEditable(&'static str),

    #[error(transparent)]
    Proc(#[from] ProcError),
}

/// Owns the in-memory item list for one mode activation. Persistence of
/// the list itself is the caller's job (it lives under the mode's state
/// contract slot); this type is the pure in-memory model plus the
/// canonical operations over it.
#[derive(Debug, Default, Clone)]
pub struct ContextManager {
    items: Vec<ContextItem>,
}

impl ContextManager {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_items(items: Vec<ContextItem>) -> Self {
        Self { items }
    }

    pub fn items(&self) -> &[ContextItem] {
        &self.items
    }

    fn next_id(&self) -> i64 {
        self.items.iter().map(|i| i.id).max().map(|m| m + 1).unwrap_or(0)
    }

    /// `add <path...>`: canonicalize each path and register a `file` item.
    /// Paths that don't exist yet are still recorded; missing-ness is
    /// reported at list/materialize time, not at add time.
    pub fn add_file(&mut self, path: &str) -> &ContextItem {
        let canonical = std::fs::canonicalize(path)
            .map(|p| p.to_string_lossy().to_string())
            .unwrap_or_else(|_| path.to_string());
        let id = self.next_id();
        self.items.push(ContextItem {
            id,
            label: canonical.clone(),
            payload: ItemPayload::File { path: canonical },
        });
        self.items.last().unwrap()
    }

    /// `diff <argv...>`: store a `lazy-diff` item. Empty argv defaults to
    /// `["HEAD~1"]`.
    pub fn add_diff(&mut self, argv: Vec<String>) -> &ContextItem {
        let argv = if argv.is_empty() {
            vec!["HEAD~1".to_string()]
        } else {
            argv
        };
        let label = format!("diff {}", crate::argv::format_argv(&argv));
        let id = self.next_id();
        self.items.push(ContextItem {
            id,
            label,
            payload: ItemPayload::LazyDiff { argv },
        });
        self.items.last().unwrap()
    }

    /// `note <text>`: freeform text, editable later via the host editor.
    pub fn add_note(&mut self, text: impl Into<String>) -> &ContextItem {
        let text = text.into();
        let id = self.next_id();
        let label = first_line_preview(&text);
        self.items.push(ContextItem {
            id,
            label,
            payload: ItemPayload::Note { text },
        });
        self.items.last().unwrap()
    }

    pub fn remove(&mut self, id: i64) -> Result<ContextItem, ContextError> {
        let idx = self
            .items
            .iter()
            .position(|i| i.id == id)
            .ok_or(ContextError::ItemNotFound(id))?;
        Ok(self.items.remove(idx))
    }

    pub fn find(&self, id: i64) -> Result<&ContextItem, ContextError> {
        self.items.iter().find(|i| i.id == id).ok_or(ContextError::ItemNotFound(id))
    }

    /// `edit <id>`: opens the host editor for `note` items only. `file`
    /// items forbid direct edits (edit the file on disk instead).
    pub fn edit_note(&mut self, id: i64, new_text: String) -> Result<(), ContextError> {
        let item = self
            .items
            .iter_mut()
            .find(|i| i.id == id)
            .ok_or(ContextError::ItemNotFound(id))?;
        match &mut item.payload {
            ItemPayload::Note { text } => {
                *text = new_text.clone();
                item.label = first_line_preview(&new_text);
                Ok(())
            }
            ItemPayload::File { .. } => Err(ContextError::NotEditable("file")),
            ItemPayload::LazyDiff { .. } => Err(ContextError::NotEditable("lazy-diff")),
            ItemPayload::Diff { .. } => Err(ContextError::NotEditable("diff")),
            ItemPayload::DiffError { .. } => Err(ContextError::NotEditable("diff-error")),
        }
    }

    /// `show <id>`: a human-readable rendering of one item, reading file
    /// contents fresh from disk.
    pub fn show(&self, id: i64) -> Result<String, ContextError> {
        let item = self.find(id)?;
        Ok(match &item.payload {
            ItemPayload::File { path } => match std::fs::read_to_string(path) {
                Ok(content) => content,
                Err(_) => format!("(missing) {path}"),
            },
            ItemPayload::Note { text } => text.clone(),
            ItemPayload::LazyDiff { argv } => crate::argv::format_argv(argv),
            ItemPayload::Diff { content } => content.clone(),
            ItemPayload::DiffError { stderr } => stderr.clone(),
        })
    }

    /// `list`: display labels, annotating `file` items whose path no
    /// longer resolves. Does not remove missing entries.
    pub fn list_display(&self) -> Vec<String> {
        self.items
            .iter()
            .map(|item| match &item.payload {
                ItemPayload::File { path } if !std::path::Path::new(path).exists() => {
                    format!("[{}] {} (missing)", item.id, item.label)
                }
                _ => format!("[{}] {} ({})", item.id, item.label, item.payload.type_name()),
            })
            .collect()
    }

    /// `copy`: build the full prompt and hand it to the host clipboard.
    pub fn copy(&self, clipboard_command: Option<&str>) -> Result<(), ContextError> {
        let outcome = build_prompt(&self.items);
        procs::clipboard_copy(&outcome.text, clipboard_command)?;
        Ok(())
    }
}

fn first_line_preview(text: &str) -> String {
    text.lines().next().unwrap_or("").chars().take(60).collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn add_diff_defaults_to_head_minus_one() {
        let mut cm = ContextManager::new();
        cm.add_diff(vec![]);
        match &cm.items()[0].payload {
            ItemPayload::LazyDiff { argv } => assert_eq!(argv, &vec!["HEAD~1".to_string()]),
            _ => panic!("expected lazy-diff"),
        }
    }

    #[test]
    fn ids_assigned_by_max_plus_one_and_removal_does_not_renumber() {
        let mut cm = ContextManager::new();
        cm.add_note("a");
        cm.add_note("b");
        cm.add_note("c");
        cm.remove(1).unwrap();
        cm.add_note("d");
        let ids: Vec<i64> = cm.items().iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![0, 2, 3]);
    }

    #[test]
    fn file_items_cannot_be_edited_directly() {
        let mut cm = ContextManager::new();
        cm.add_file("Cargo.toml");
        let id = cm.items()[0].id;
        assert!(matches!(cm.edit_note(id, "x".into()), Err(ContextError::NotEditable("file"))));
    }

    #[test]
    fn missing_file_is_annotated_but_not_removed() {
        let mut cm = ContextManager::new();
        cm.add_file("/no/such/path/definitely");
        let display = cm.list_display();
        assert!(display[0].contains("(missing)"));
        assert_eq!(cm.items().len(), 1);
    }
}
