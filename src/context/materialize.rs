//! Turns the stored context item list into the single text prompt: notes
//! and materialized diffs first, then a txtar block of all `file` items.
//! Lazy diffs are executed here but the stored `lazy-diff` records are
//! never replaced — materialization is read-only with respect to `items`.

use crate::txtar::{build_txtar, TxtarFile};

use super::item::{ContextItem, ItemPayload};

pub struct MaterializeOutcome {
    pub text: String,
    /// One entry per lazy-diff item actually executed, in list order —
    /// exposed for tests asserting the §8 invariant that exactly one
    /// diff/diff-error section is emitted per lazy diff.
    pub diff_sections: usize,
}

/// Runs a stored lazy-diff argv vector against git, returning stdout on
/// success or the captured stderr on failure.
pub trait DiffRunner {
    fn run(&self, argv: &[String]) -> Result<String, String>;
}

impl<F: Fn(&[String]) -> Result<String, String>> DiffRunner for F {
    fn run(&self, argv: &[String]) -> Result<String, String> {
        self(argv)
    }
}

pub fn build_prompt(items: &[ContextItem]) -> MaterializeOutcome {
    build_prompt_with(items, &crate::procs::run_git_diff)
}

pub fn build_prompt_with(items: &[ContextItem], runner: &dyn DiffRunner) -> MaterializeOutcome {
    let mut notes = Vec::new();
    let mut diff_blocks = Vec::new();
    let mut file_entries = Vec::new();
    let mut diff_sections = 0usize;

    for item in items {
        match &item.payload {
            ItemPayload::Note { text } => notes.push(text.clone()),
            ItemPayload::LazyDiff { argv } => {
                diff_sections += 1;
                match runner.run(argv) {
                    Ok(out) => diff_blocks.push(format!("### Diff: {}\n{}", item.label, out)),
                    Err(err) => diff_blocks.push(format!("### Diff Error: {}\n{}", item.label, err)),
                }
            }
            ItemPayload::Diff { content } => {
                diff_sections += 1;
                diff_blocks.push(format!("### Diff: {}\n{}", item.label, content));
            }
            ItemPayload::DiffError { stderr } => {
                diff_sections += 1;
                diff_blocks.push(format!("### Diff Error: {}\n{}", item.label, stderr));
            }
            ItemPayload::File { path } => file_entries.push((item.label.clone(), path.clone())),
        }
    }

    let txtar_files: Vec<(String, String)> = file_entries
        .iter()
        .map(|(label, path)| {
            let content = std::fs::read_to_string(path)
                .unwrap_or_else(|_| format!("(missing: {label})"));
            (label.clone(), content)
        })
        .collect();
    let txtar_refs: Vec<TxtarFile<'_>> = txtar_files
        .iter()
        .map(|(label, content)| TxtarFile {
            path: label,
            content,
        })
        .collect();
    let txtar_block = build_txtar(&txtar_refs);

    let mut parts = Vec::new();
    if !notes.is_empty() {
        parts.push(notes.join("\n\n"));
    }
    if !diff_blocks.is_empty() {
        parts.push(diff_blocks.join("\n\n"));
    }
    if !txtar_block.is_empty() {
        parts.push(txtar_block);
    }

    MaterializeOutcome {
        text: parts.join("\n\n"),
        diff_sections,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn succeeding_runner(_: &[String]) -> Result<String, String> {
        Ok("diff output".to_string())
    }

    fn failing_runner(_: &[String]) -> Result<String, String> {
        Err("fatal: bad revision".to_string())
    }

    #[test]
    fn lazy_diff_produces_exactly_one_section_and_stays_lazy() {
        let items = vec![ContextItem {
            id: 0,
            label: "diff HEAD~1".to_string(),
            payload: ItemPayload::LazyDiff {
                argv: vec!["HEAD~1".to_string()],
            },
        }];
        let outcome = build_prompt_with(&items, &succeeding_runner);
        assert_eq!(outcome.diff_sections, 1);
        assert!(outcome.text.contains("### Diff:"));
        // Stored items are untouched by the caller — materialize.rs never
        // mutates `items` itself, it only reads.
        assert!(matches!(items[0].payload, ItemPayload::LazyDiff { .. }));
    }

    #[test]
    fn failing_diff_emits_diff_error_section() {
        let items = vec![ContextItem {
            id: 0,
            label: "diff bad".to_string(),
            payload: ItemPayload::LazyDiff {
                argv: vec!["bad-rev".to_string()],
            },
        }];
        let outcome = build_prompt_with(&items, &failing_runner);
        assert!(outcome.text.contains("### Diff Error:"));
    }

    #[test]
    fn notes_precede_diffs_precede_txtar_block() {
        let items = vec![
            ContextItem {
                id: 0,
                label: "note".to_string(),
                payload: ItemPayload::Note {
                    text: "a note".to_string(),
                },
            },
            ContextItem {
                id: 1,
                label: "diff".to_string(),
                payload: ItemPayload::LazyDiff {
                    argv: vec!["HEAD~1".to_string()],
                },
            },
        ];
        let outcome = build_prompt_with(&items, &succeeding_runner);
        let note_pos = outcome.text.find("a note").unwrap();
        let diff_pos = outcome.text.find("### Diff:").unwrap();
        assert!(note_pos < diff_pos);
    }
}
