//! External Process Helpers (C8): editor spawn, clipboard, and git
//! invocation with POSIX process-group teardown so a cancelled host never
//! leaves orphaned children behind.

#[cfg(unix)]
mod posix;

use std::io::Write;
use std::path::PathBuf;
use std::process::{Command, Stdio};

use thiserror::Error;

#[derive(Debug, Error)]
pub enum ProcError {
    #[error("no editor configured: set $VISUAL or $EDITOR")]
    NoEditor,

    #[error("editor I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("editor exited with a signal and produced no output")]
    EditorKilled,

    #[error("clipboard command failed: {0}")]
    ClipboardFailed(String),

    #[error("no clipboard mechanism available on this platform")]
    NoClipboard,

    #[error("git exited with status {status}: {stderr}")]
    GitFailed { status: i32, stderr: String },
}

/// Resolve the editor command: `$VISUAL`, then `$EDITOR`, then a platform
/// default.
pub fn resolve_editor() -> Option<String> {
    std::env::var("VISUAL")
        .ok()
        .filter(|s| !s.is_empty())
        .or_else(|| std::env::var("EDITOR").ok().filter(|s| !s.is_empty()))
        .or_else(|| {
            if cfg!(windows) {
                Some("notepad".to_string())
            } else {
                Some("vi".to_string())
            }
        })
}

/// Open the resolved editor on a scoped temp file seeded with `initial`,
/// wait for it to exit, then read the file back and delete it. A
/// non-zero exit with unreadable/empty content is treated as "no change"
/// rather than an error.
pub fn open_editor(label: &str, initial: &str) -> Result<String, ProcError> {
    let editor = resolve_editor().ok_or(ProcError::NoEditor)?;

    let sanitized_label: String = label
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
        .collect();
    let mut path = std::env::temp_dir();
    path.push(format!("ctxforge-{sanitized_label}-{}.md", std::process::id()));

    std::fs::write(&path, initial)?;

    let argv = crate::argv::parse_argv(&editor);
    let (program, args) = argv.split_first().ok_or(ProcError::NoEditor)?;
    let status = Command::new(program).args(args).arg(&path).status();

    let result = match status {
        Ok(status) if status.success() => std::fs::read_to_string(&path).unwrap_or_default(),
        Ok(_) => std::fs::read_to_string(&path).unwrap_or_default(),
        Err(_) => {
            let _ = std::fs::remove_file(&path);
            return Err(ProcError::EditorKilled);
        }
    };

    let _ = std::fs::remove_file(&path);
    Ok(result)
}

/// Copy `text` to the clipboard via `$CTXFORGE_CLIPBOARD` if set (or the
/// explicit `override_command`), otherwise a platform default
/// (`pbcopy` / `wl-copy` / `xclip -selection clipboard`).
pub fn clipboard_copy(text: &str, override_command: Option<&str>) -> Result<(), ProcError> {
    let command = override_command
        .map(str::to_string)
        .or_else(|| std::env::var("CTXFORGE_CLIPBOARD").ok().filter(|s| !s.is_empty()))
        .or_else(platform_default_clipboard)
        .ok_or(ProcError::NoClipboard)?;

    let argv = crate::argv::parse_argv(&command);
    let (program, args) = argv.split_first().ok_or(ProcError::NoClipboard)?;

    let mut child = Command::new(program)
        .args(args)
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()
        .map_err(|e| ProcError::ClipboardFailed(e.to_string()))?;

    child
        .stdin
        .take()
        .expect("piped stdin")
        .write_all(text.as_bytes())
        .map_err(|e| ProcError::ClipboardFailed(e.to_string()))?;

    let output = child
        .wait_with_output()
        .map_err(|e| ProcError::ClipboardFailed(e.to_string()))?;
    if !output.status.success() {
        return Err(ProcError::ClipboardFailed(
            String::from_utf8_lossy(&output.stderr).to_string(),
        ));
    }
    Ok(())
}

#[cfg(target_os = "macos")]
fn platform_default_clipboard() -> Option<String> {
    Some("pbcopy".to_string())
}

#[cfg(all(unix, not(target_os = "macos")))]
fn platform_default_clipboard() -> Option<String> {
    if which::which("wl-copy").is_ok() {
        Some("wl-copy".to_string())
    } else {
        Some("xclip -selection clipboard".to_string())
    }
}

#[cfg(windows)]
fn platform_default_clipboard() -> Option<String> {
    Some("clip".to_string())
}

/// Run `git <argv...>` to completion, spawned in its own process group on
/// unix so a cancelling host can kill the whole subtree. Returns stdout
/// on success, stderr on failure.
pub fn run_git_diff(argv: &[String]) -> Result<String, String> {
    let output = build_git_command(argv).output();
    match output {
        Ok(out) if out.status.success() => Ok(String::from_utf8_lossy(&out.stdout).to_string()),
        Ok(out) => Err(String::from_utf8_lossy(&out.stderr).to_string()),
        Err(e) => Err(e.to_string()),
    }
}

fn build_git_command(argv: &[String]) -> Command {
    let mut cmd = Command::new("git");
    cmd.args(argv);
    #[cfg(unix)]
    posix::put_in_own_process_group(&mut cmd);
    cmd
}

/// Spawn `git <argv...>` for long-running/streamed invocations, handing
/// back a handle that can be cancelled via [`posix::terminate_process_group`].
pub fn spawn_git(argv: &[String]) -> Result<std::process::Child, ProcError> {
    build_git_command(argv).stdout(Stdio::piped()).stderr(Stdio::piped()).spawn().map_err(ProcError::Io)
}

#[cfg(unix)]
pub fn terminate_process_group(child: &mut std::process::Child) {
    posix::terminate_process_group(child)
}

#[cfg(not(unix))]
pub fn terminate_process_group(child: &mut std::process::Child) {
    let _ = child.kill();
}

pub fn editor_temp_dir_for_tests() -> PathBuf {
    std::env::temp_dir()
}

#[cfg(test)]
#[allow(unsafe_code)]
mod tests {
    use super::*;

    #[test]
    fn resolve_editor_falls_back_to_platform_default() {
        // SAFETY: tests run single-threaded within this process' test
        // harness; no other test reads these vars concurrently.
        unsafe {
            std::env::remove_var("VISUAL");
            std::env::remove_var("EDITOR");
        }
        let editor = resolve_editor().unwrap();
        assert!(!editor.is_empty());
    }

    #[test]
    fn resolve_editor_prefers_visual_over_editor() {
        unsafe {
            std::env::set_var("VISUAL", "my-visual");
            std::env::set_var("EDITOR", "my-editor");
        }
        assert_eq!(resolve_editor().unwrap(), "my-visual");
        unsafe {
            std::env::remove_var("VISUAL");
            std::env::remove_var("EDITOR");
        }
    }
}
