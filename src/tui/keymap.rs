//! Canonical escape-sequence-to-key-name table (§6), reproduced verbatim
//! so recorded test traces from other implementations stay comparable.
//! Matching is longest-prefix-first so a bare `ESC` doesn't eat the `[A`
//! tail of a cursor-key sequence.

/// One decoded key event handed to a script's `update(msg, state)`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Key {
    Named(&'static str),
    Ctrl(char),
    Char(char),
}

/// Every recognized sequence, longest byte-strings first within each
/// group so the matcher can do prefix matching without ambiguity.
const SEQUENCES: &[(&[u8], &str)] = &[
    (b"\x1b[1~", "home"),
    (b"\x1b[2~", "insert"),
    (b"\x1b[3~", "delete"),
    (b"\x1b[4~", "end"),
    (b"\x1b[5~", "page-up"),
    (b"\x1b[6~", "page-down"),
    (b"\x1b[A", "up"),
    (b"\x1b[B", "down"),
    (b"\x1b[C", "right"),
    (b"\x1b[D", "left"),
];

/// Attempts to match the longest known sequence at the start of `input`.
/// Returns the matched key and how many bytes it consumed. Falls back to
/// single-byte decoding (`Escape`, `Tab`, `Enter`, `Backspace`, `Ctrl+x`,
/// or a plain char) when no multi-byte sequence matches.
pub fn decode_next(input: &[u8]) -> Option<(Key, usize)> {
    if input.is_empty() {
        return None;
    }

    let mut best: Option<(&'static str, usize)> = None;
    for (seq, name) in SEQUENCES {
        if input.starts_with(seq) && seq.len() > best.map(|(_, l)| l).unwrap_or(0) {
            best = Some((name, seq.len()));
        }
    }
    if let Some((name, len)) = best {
        return Some((Key::Named(name), len));
    }

    match input[0] {
        0x1b if input.len() == 1 => Some((Key::Named("escape"), 1)),
        0x1b => None, // incomplete sequence; caller should read more bytes
        0x09 => Some((Key::Named("tab"), 1)),
        0x0d => Some((Key::Named("enter"), 1)),
        0x08 | 0x7f => Some((Key::Named("backspace"), 1)),
        b @ 0x01..=0x1a => {
            let letter = (b - 1 + b'a') as char;
            Some((Key::Ctrl(letter), 1))
        }
        _ => {
            let s = std::str::from_utf8(&input[..1]).ok()?;
            Some((Key::Char(s.chars().next()?), 1))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn bare_escape_maps_to_escape_not_partial_sequence() {
        assert_eq!(decode_next(b"\x1b"), Some((Key::Named("escape"), 1)));
    }

    #[test]
    fn esc_bracket_a_maps_to_up_not_escape_plus_bracket_a() {
        assert_eq!(decode_next(b"\x1b[A"), Some((Key::Named("up"), 3)));
    }

    #[test]
    fn home_sequence_is_longest_match() {
        assert_eq!(decode_next(b"\x1b[1~rest"), Some((Key::Named("home"), 4)));
    }

    #[test]
    fn tab_and_enter_map_to_named_keys() {
        assert_eq!(decode_next(b"\t"), Some((Key::Named("tab"), 1)));
        assert_eq!(decode_next(b"\r"), Some((Key::Named("enter"), 1)));
    }

    #[test]
    fn backspace_from_either_0x08_or_0x7f() {
        assert_eq!(decode_next(&[0x08]), Some((Key::Named("backspace"), 1)));
        assert_eq!(decode_next(&[0x7f]), Some((Key::Named("backspace"), 1)));
    }

    #[test]
    fn ctrl_letters_decode_correctly() {
        assert_eq!(decode_next(&[0x01]), Some((Key::Ctrl('a'), 1)));
        assert_eq!(decode_next(&[0x03]), Some((Key::Ctrl('c'), 1)));
        assert_eq!(decode_next(&[0x1a]), Some((Key::Ctrl('z'), 1)));
    }

    #[test]
    fn plain_char_falls_through() {
        assert_eq!(decode_next(b"x"), Some((Key::Char('x'), 1)));
    }
}
