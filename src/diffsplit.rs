//! Pure unified-diff splitter: chunks a diff at file/hunk boundaries under
//! a bounded line budget. No I/O; fully deterministic.

/// Default per-chunk line budget when the caller passes `max_lines <= 0`.
pub const DEFAULT_MAX_LINES: usize = 500;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DiffChunk {
    pub index: usize,
    pub total: usize,
    pub files: Vec<String>,
    pub content: String,
    pub lines: usize,
}

struct Segment {
    path: String,
    header: String,
    hunks: Vec<String>,
}

/// Number of lines in `s`: newline count, plus one if non-empty and not
/// newline-terminated.
fn line_count(s: &str) -> usize {
    if s.is_empty() {
        return 0;
    }
    let newlines = s.matches('\n').count();
    if s.ends_with('\n') { newlines } else { newlines + 1 }
}

/// Extract the display path from a `diff --git a/<path> b/<path>` header
/// line, using the *last* occurrence of ` b/` to tolerate paths that
/// themselves contain `" b/"`. Falls back to the raw line if malformed.
fn extract_path(header_line: &str) -> String {
    match header_line.rfind(" b/") {
        Some(idx) => header_line[idx + 3..].trim().to_string(),
        None => header_line.to_string(),
    }
}

fn partition_into_segments(trimmed: &str) -> Vec<Segment> {
    let lines: Vec<&str> = trimmed.split('\n').collect();

    let mut starts = Vec::new();
    for (i, line) in lines.iter().enumerate() {
        if line.starts_with("diff --git ") {
            starts.push(i);
        }
    }

    let mut segments = Vec::with_capacity(starts.len());
    for (seg_idx, &start) in starts.iter().enumerate() {
        let end = starts.get(seg_idx + 1).copied().unwrap_or(lines.len());
        let body = &lines[start..end];

        // Split the per-file body into a leading header (everything before
        // the first `@@` hunk marker) and a list of hunks (each one starts
        // at a `@@` line and runs to the next `@@` line or end of segment).
        let mut hunk_starts = Vec::new();
        for (i, line) in body.iter().enumerate() {
            if line.starts_with("@@") {
                hunk_starts.push(i);
            }
        }

        let header_end = hunk_starts.first().copied().unwrap_or(body.len());
        let header = body[..header_end].join("\n");

        let mut hunks = Vec::with_capacity(hunk_starts.len());
        for (h_idx, &h_start) in hunk_starts.iter().enumerate() {
            let h_end = hunk_starts.get(h_idx + 1).copied().unwrap_or(body.len());
            hunks.push(body[h_start..h_end].join("\n"));
        }

        segments.push(Segment {
            path: extract_path(body[0]),
            header,
            hunks,
        });
    }

    segments
}

/// Render a segment's header plus a subset of its hunks as one chunk body.
fn render_segment(header: &str, hunks: &[&str]) -> String {
    let mut parts = vec![header.to_string()];
    parts.extend(hunks.iter().map(|h| h.to_string()));
    parts.join("\n")
}

struct PendingChunk {
    files: Vec<String>,
    parts: Vec<String>,
    lines: usize,
}

impl PendingChunk {
    fn new() -> Self {
        Self {
            files: Vec::new(),
            parts: Vec::new(),
            lines: 0,
        }
    }

    fn push(&mut self, path: String, text: String) {
        let n = line_count(&text);
        self.files.push(path);
        self.lines += n;
        self.parts.push(text);
    }

    fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    fn finish(self, index: usize) -> DiffChunk {
        DiffChunk {
            index,
            total: 0, // stamped by caller
            files: self.files,
            content: self.parts.join("\n"),
            lines: self.lines,
        }
    }
}

/// Split a unified diff into ordered chunks, each at most `max_lines` lines
/// (best effort — a single hunk larger than the budget is emitted intact
/// rather than split mid-hunk). `max_lines <= 0` uses [`DEFAULT_MAX_LINES`].
pub fn split_diff(diff: &str, max_lines: i64) -> Vec<DiffChunk> {
    let max_lines = if max_lines <= 0 {
        DEFAULT_MAX_LINES
    } else {
        max_lines as usize
    };

    let trimmed = diff.strip_suffix('\n').unwrap_or(diff);
    if trimmed.is_empty() {
        return Vec::new();
    }

    let segments = partition_into_segments(trimmed);
    let mut chunks = Vec::new();
    let mut pending = PendingChunk::new();

    for seg in &segments {
        let whole = render_segment(
            &seg.header,
            &seg.hunks.iter().map(|s| s.as_str()).collect::<Vec<_>>(),
        );
        let whole_lines = line_count(&whole);

        if whole_lines > max_lines {
            // Single file exceeds the budget: split at hunk boundaries,
            // reprinting the header in each sub-chunk. A hunk larger than
            // the budget on its own is still emitted intact (oversized
            // chunk preferred over a mid-hunk split).
            if !pending.is_empty() {
                chunks.push(std::mem::replace(&mut pending, PendingChunk::new()).finish(chunks.len()));
            }

            if seg.hunks.is_empty() {
                let mut p = PendingChunk::new();
                p.push(seg.path.clone(), whole);
                chunks.push(p.finish(chunks.len()));
                continue;
            }

            let mut sub = PendingChunk::new();
            for hunk in &seg.hunks {
                let piece = render_segment(&seg.header, std::slice::from_ref(&hunk.as_str()));
                let piece_lines = line_count(&piece);

                if !sub.is_empty() && sub.lines + piece_lines > max_lines {
                    chunks.push(std::mem::replace(&mut sub, PendingChunk::new()).finish(chunks.len()));
                }
                sub.push(seg.path.clone(), piece);
            }
            if !sub.is_empty() {
                chunks.push(sub.finish(chunks.len()));
            }
            continue;
        }

        if !pending.is_empty() && pending.lines + whole_lines > max_lines {
            chunks.push(std::mem::replace(&mut pending, PendingChunk::new()).finish(chunks.len()));
        }
        pending.push(seg.path.clone(), whole);
    }

    if !pending.is_empty() {
        chunks.push(pending.finish(chunks.len()));
    }

    let total = chunks.len();
    for (i, chunk) in chunks.iter_mut().enumerate() {
        chunk.index = i;
        chunk.total = total;
    }
    chunks
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    fn sample_diff() -> String {
        let mut out = String::new();
        out.push_str("diff --git a/a.go b/a.go\n");
        out.push_str("index 111..222 100644\n");
        out.push_str("--- a/a.go\n");
        out.push_str("+++ b/a.go\n");
        out.push_str("@@ -1,3 +1,3 @@\n");
        for i in 0..6 {
            out.push_str(&format!("+line {i}\n"));
        }
        out.push_str("diff --git a/b.go b/b.go\n");
        out.push_str("index 333..444 100644\n");
        out.push_str("--- a/b.go\n");
        out.push_str("+++ b/b.go\n");
        out.push_str("@@ -1,3 +1,3 @@\n");
        for i in 0..6 {
            out.push_str(&format!("+line {i}\n"));
        }
        out
    }

    #[test]
    fn empty_input_yields_empty_chunks() {
        assert!(split_diff("", 500).is_empty());
    }

    #[test]
    fn unbounded_budget_yields_single_chunk() {
        let diff = sample_diff();
        let chunks = split_diff(&diff, i64::MAX);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].content, diff.trim_end_matches('\n'));
        assert_eq!(chunks[0].total, 1);
    }

    #[test]
    fn two_files_split_by_budget() {
        // Each file segment is header (4 lines) + 6 body lines = 10 lines;
        // a budget of 15 fits one file but not two.
        let diff = sample_diff();
        let chunks = split_diff(&diff, 15);
        assert_eq!(chunks.len(), 2);
        assert_eq!(chunks[0].files, vec!["a.go".to_string()]);
        assert_eq!(chunks[1].files, vec!["b.go".to_string()]);
        for c in &chunks {
            assert_eq!(c.total, 2);
        }
    }

    #[test]
    fn every_plus_line_appears_exactly_once() {
        let diff = sample_diff();
        let chunks = split_diff(&diff, 12);
        let mut plus_lines = Vec::new();
        for c in &chunks {
            for line in c.content.lines() {
                if line.starts_with('+') && !line.starts_with("+++") {
                    plus_lines.push(line.to_string());
                }
            }
        }
        let expected: Vec<_> = diff
            .lines()
            .filter(|l| l.starts_with('+') && !l.starts_with("+++"))
            .map(String::from)
            .collect();
        assert_eq!(plus_lines, expected);
    }

    #[test]
    fn oversized_single_file_with_no_hunks_is_one_chunk() {
        let mut diff = String::from("diff --git a/big.bin b/big.bin\n");
        for i in 0..20 {
            diff.push_str(&format!("Binary line {i}\n"));
        }
        let chunks = split_diff(&diff, 5);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].files, vec!["big.bin".to_string()]);
    }

    #[test]
    fn malformed_header_falls_back_to_raw_line() {
        let diff = "diff --git weird-no-b-marker\n@@ -1 +1 @@\n+x\n";
        let chunks = split_diff(diff, 500);
        assert_eq!(chunks.len(), 1);
        assert_eq!(chunks[0].files, vec!["diff --git weird-no-b-marker".to_string()]);
    }

    proptest! {
        #[test]
        fn indices_and_totals_are_consistent(n_files in 1usize..5, lines_per_hunk in 1usize..8) {
            let mut diff = String::new();
            for f in 0..n_files {
                diff.push_str(&format!("diff --git a/f{f}.txt b/f{f}.txt\n"));
                diff.push_str("index 000..111 100644\n");
                diff.push_str(&format!("--- a/f{f}.txt\n+++ b/f{f}.txt\n"));
                diff.push_str("@@ -1 +1 @@\n");
                for i in 0..lines_per_hunk {
                    diff.push_str(&format!("+l{i}\n"));
                }
            }
            let chunks = split_diff(&diff, 6);
            let total = chunks.len();
            for (i, c) in chunks.iter().enumerate() {
                prop_assert_eq!(c.index, i);
                prop_assert_eq!(c.total, total);
            }
        }
    }
}
