//! TUI Host Bridge (C7): runs a scripted `init`/`update`/`view` program
//! full-screen, in alt-screen mode with optional mouse capture, dispatching
//! decoded key/mouse/resize messages and rendering the returned view.

pub mod keymap;

use std::io::Write;
use std::time::Duration;

use crossterm::cursor;
use crossterm::event::{self, DisableMouseCapture, EnableMouseCapture, Event, KeyCode};
use crossterm::terminal::{EnterAlternateScreen, LeaveAlternateScreen};
use crossterm::{execute, queue};
use serde_json::Value;
use thiserror::Error;
use unicode_width::UnicodeWidthStr;

#[derive(Debug, Error)]
pub enum TuiError {
    #[error("no TTY available to run a full-screen program")]
    NoTty,

    #[error("terminal I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("script callback failed: {0}")]
    Callback(String),
}

/// The three scripted callbacks a terminal program provides.
pub trait TerminalProgram {
    fn init(&mut self) -> Result<Value, TuiError>;
    fn update(&mut self, msg: Value, state: Value) -> Result<(Value, Option<Value>), TuiError>;
    fn view(&mut self, state: &Value) -> Result<String, TuiError>;
}

/// Host actions a script's `update` return value can request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Quit,
    ClearScreen,
    Scroll(i64),
    Noop,
}

fn parse_command(value: &Option<Value>) -> Command {
    let Some(value) = value else { return Command::Noop };
    let Some(name) = value.get("type").and_then(Value::as_str) else {
        return Command::Noop;
    };
    match name {
        "quit" => Command::Quit,
        "clearScreen" => Command::ClearScreen,
        "scroll" => Command::Scroll(value.get("amount").and_then(Value::as_i64).unwrap_or(0)),
        _ => Command::Noop,
    }
}

fn key_message(key: keymap::Key) -> Value {
    match key {
        keymap::Key::Named(name) => serde_json::json!({"type": "keyPress", "key": name}),
        keymap::Key::Ctrl(c) => serde_json::json!({"type": "keyPress", "key": format!("ctrl+{c}")}),
        keymap::Key::Char(c) => serde_json::json!({"type": "keyPress", "key": c.to_string()}),
    }
}

/// Runs `program` full-screen until it emits `quit` or the terminal
/// vanishes. `enable_mouse` toggles mouse-capture registration.
pub fn run_terminal_program(
    program: &mut dyn TerminalProgram,
    enable_mouse: bool,
) -> Result<(), TuiError> {
    use std::io::IsTerminal;
    if !std::io::stdout().is_terminal() {
        return Err(TuiError::NoTty);
    }

    crossterm::terminal::enable_raw_mode()?;
    let mut stdout = std::io::stdout();
    execute!(stdout, EnterAlternateScreen, cursor::Hide)?;
    if enable_mouse {
        execute!(stdout, EnableMouseCapture)?;
    }

    let result = run_loop(program, &mut stdout);

    if enable_mouse {
        let _ = execute!(stdout, DisableMouseCapture);
    }
    let _ = execute!(stdout, cursor::Show, LeaveAlternateScreen);
    let _ = crossterm::terminal::disable_raw_mode();

    result
}

fn run_loop(program: &mut dyn TerminalProgram, stdout: &mut std::io::Stdout) -> Result<(), TuiError> {
    let mut state = program.init()?;

    let (cols, rows) = crossterm::terminal::size()?;
    let (next_state, cmd) = program.update(
        serde_json::json!({"type": "windowSize", "width": cols, "height": rows}),
        state,
    )?;
    state = next_state;
    if handle_command(parse_command(&cmd), stdout)? {
        return Ok(());
    }

    render(program, &state, stdout)?;

    loop {
        if !event::poll(Duration::from_millis(100))? {
            continue;
        }

        let msg = match event::read()? {
            Event::Resize(cols, rows) => serde_json::json!({"type": "windowSize", "width": cols, "height": rows}),
            Event::Key(key_event) => match crossterm_key_to_msg(key_event) {
                Some(msg) => msg,
                None => continue,
            },
            Event::Mouse(mouse_event) => serde_json::json!({
                "type": "mouse",
                "x": mouse_event.column,
                "y": mouse_event.row,
                "button": format!("{:?}", mouse_event.kind),
                "action": format!("{:?}", mouse_event.kind),
            }),
            _ => continue,
        };

        let (next_state, cmd) = program.update(msg, state)?;
        state = next_state;

        match parse_command(&cmd) {
            Command::Quit => return Ok(()),
            other => {
                handle_command(other, stdout)?;
            }
        }

        render(program, &state, stdout)?;
    }
}

fn handle_command(cmd: Command, stdout: &mut std::io::Stdout) -> Result<bool, TuiError> {
    match cmd {
        Command::Quit => return Ok(true),
        Command::ClearScreen => {
            queue!(stdout, crossterm::terminal::Clear(crossterm::terminal::ClearType::All))?;
            stdout.flush()?;
        }
        Command::Scroll(_) | Command::Noop => {}
    }
    Ok(false)
}

fn render(program: &mut dyn TerminalProgram, state: &Value, stdout: &mut std::io::Stdout) -> Result<(), TuiError> {
    let view = program.view(state)?;
    let (cols, _rows) = crossterm::terminal::size()?;
    queue!(
        stdout,
        crossterm::terminal::Clear(crossterm::terminal::ClearType::All),
        cursor::MoveTo(0, 0)
    )?;
    for line in view.split('\n') {
        write!(stdout, "{}\r\n", clip_to_width(line, cols as usize))?;
    }
    stdout.flush()?;
    Ok(())
}

/// Truncates `line` to at most `max_width` display columns, counting
/// double-width (e.g. CJK) characters as two — a plain byte or `.chars()`
/// count would let wide-character lines overrun the terminal and wrap
/// unpredictably outside the alt-screen buffer.
fn clip_to_width(line: &str, max_width: usize) -> String {
    if line.width() <= max_width {
        return line.to_string();
    }
    let mut out = String::new();
    let mut width = 0;
    for ch in line.chars() {
        let w = unicode_width::UnicodeWidthChar::width(ch).unwrap_or(0);
        if width + w > max_width {
            break;
        }
        out.push(ch);
        width += w;
    }
    out
}

fn crossterm_key_to_msg(key_event: event::KeyEvent) -> Option<Value> {
    let key = match key_event.code {
        KeyCode::Up => keymap::Key::Named("up"),
        KeyCode::Down => keymap::Key::Named("down"),
        KeyCode::Left => keymap::Key::Named("left"),
        KeyCode::Right => keymap::Key::Named("right"),
        KeyCode::Home => keymap::Key::Named("home"),
        KeyCode::End => keymap::Key::Named("end"),
        KeyCode::PageUp => keymap::Key::Named("page-up"),
        KeyCode::PageDown => keymap::Key::Named("page-down"),
        KeyCode::Enter => keymap::Key::Named("enter"),
        KeyCode::Backspace => keymap::Key::Named("backspace"),
        KeyCode::Tab => keymap::Key::Named("tab"),
        KeyCode::Esc => keymap::Key::Named("escape"),
        KeyCode::Char(c) => keymap::Key::Char(c),
        _ => return None,
    };
    Some(key_message(key))
}

/// Debug-overlay markers a script may print around a JSON state snapshot.
/// Consumers must normalize line breaks before extracting the payload,
/// since a wrapped terminal can split the markers across lines.
pub const DEBUG_OVERLAY_START: &str = "__JSON_START__";
pub const DEBUG_OVERLAY_END: &str = "__JSON_END__";

/// Extracts the JSON payload between the debug-overlay markers from
/// possibly line-wrapped captured output.
pub fn extract_debug_overlay(captured: &str) -> Option<Value> {
    let normalized = captured.replace("\r\n", "\n");
    let joined: String = normalized.replace('\n', "");
    let start = joined.find(DEBUG_OVERLAY_START)? + DEBUG_OVERLAY_START.len();
    let end = joined[start..].find(DEBUG_OVERLAY_END)? + start;
    serde_json::from_str(joined[start..end].trim()).ok()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn quit_command_is_recognized() {
        let cmd = parse_command(&Some(serde_json::json!({"type": "quit"})));
        assert_eq!(cmd, Command::Quit);
    }

    #[test]
    fn missing_command_is_noop() {
        assert_eq!(parse_command(&None), Command::Noop);
    }

    #[test]
    fn debug_overlay_extracts_across_wrapped_lines() {
        let captured = "prefix __JSON_START__\n{\"a\":1}\n__JSON_END__ suffix";
        let value = extract_debug_overlay(captured).unwrap();
        assert_eq!(value, serde_json::json!({"a": 1}));
    }

    #[test]
    fn debug_overlay_missing_markers_yields_none() {
        assert!(extract_debug_overlay("nothing here").is_none());
    }

    #[test]
    fn clip_to_width_leaves_short_lines_untouched() {
        assert_eq!(clip_to_width("hello", 80), "hello");
    }

    #[test]
    fn clip_to_width_truncates_by_display_width_not_byte_count() {
        // Each CJK character below is double-width; 3 of them is width 6.
        let line = "中文内容测试";
        let clipped = clip_to_width(line, 6);
        assert_eq!(clipped.chars().count(), 3);
    }
}
