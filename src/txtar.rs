//! txtar archive serialization: packs several named file bodies into one
//! plaintext string, tolerant of content that happens to contain the
//! separator sequence.

/// One file entry going into an archive: its display path and content.
pub struct TxtarFile<'a> {
    pub path: &'a str,
    pub content: &'a str,
}

const BASE_MARKER: &str = "-- ";

/// Serialize `files` into a single txtar-style string. Chooses a comment
/// marker not present in any file's content so embedded marker-like text
/// never confuses a reader re-splitting the archive.
pub fn build_txtar(files: &[TxtarFile<'_>]) -> String {
    let marker = pick_marker(files);
    let mut out = String::new();
    for f in files {
        out.push_str(&marker);
        out.push(' ');
        out.push_str(f.path);
        out.push_str(" --\n");
        out.push_str(f.content);
        if !f.content.ends_with('\n') {
            out.push('\n');
        }
    }
    out
}

fn pick_marker(files: &[TxtarFile<'_>]) -> String {
    let mut marker = BASE_MARKER.trim_end().to_string();
    while files.iter().any(|f| f.content.contains(&marker)) {
        marker.push('-');
    }
    marker
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn single_file_round_trips_visually() {
        let files = vec![TxtarFile {
            path: "src/main.rs",
            content: "fn main() {}\n",
        }];
        let archive = build_txtar(&files);
        assert!(archive.starts_with("-- src/main.rs --\n"));
        assert!(archive.contains("fn main() {}\n"));
    }

    #[test]
    fn content_containing_marker_gets_a_longer_marker() {
        let files = vec![TxtarFile {
            path: "weird.txt",
            content: "look: -- fake --\n",
        }];
        let archive = build_txtar(&files);
        assert!(archive.starts_with("--- weird.txt ---\n"));
    }

    #[test]
    fn multiple_files_in_insertion_order() {
        let files = vec![
            TxtarFile {
                path: "a.txt",
                content: "A",
            },
            TxtarFile {
                path: "b.txt",
                content: "B",
            },
        ];
        let archive = build_txtar(&files);
        let a_pos = archive.find("a.txt").unwrap();
        let b_pos = archive.find("b.txt").unwrap();
        assert!(a_pos < b_pos);
    }
}
