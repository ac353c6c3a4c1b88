//! POSIX-like argv tokenizer and its inverse.
//!
//! `parse_argv` and `format_argv` are pure functions with no I/O, callable
//! both from Rust and (via the scripting engine's host API) from scripts.
//! They exist to let a `lazy-diff` context item store an argv vector as a
//! single persisted string while round-tripping exactly:
//! `parse_argv(&format_argv(&v)) == v` for any token list.

/// Tokenize a command line the way a POSIX shell would, supporting single
/// and double quotes, backslash escapes inside double quotes, and
/// empty-string tokens produced by `""` or `''`.
pub fn parse_argv(input: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut in_token = false;

    let mut chars = input.chars().peekable();
    while let Some(c) = chars.next() {
        match c {
            c if c.is_whitespace() => {
                if in_token {
                    tokens.push(std::mem::take(&mut current));
                    in_token = false;
                }
            }
            '\'' => {
                in_token = true;
                for c in chars.by_ref() {
                    if c == '\'' {
                        break;
                    }
                    current.push(c);
                }
            }
            '"' => {
                in_token = true;
                while let Some(c) = chars.next() {
                    match c {
                        '"' => break,
                        '\\' => {
                            // Backslash escapes inside double quotes only retain their
                            // special meaning before ", \, or $ (POSIX); otherwise the
                            // backslash is kept literally.
                            match chars.peek() {
                                Some('"') | Some('\\') | Some('$') | Some('`') => {
                                    current.push(chars.next().unwrap());
                                }
                                _ => current.push('\\'),
                            }
                        }
                        other => current.push(other),
                    }
                }
            }
            '\\' => {
                // Outside quotes, backslash escapes the next character verbatim.
                in_token = true;
                if let Some(next) = chars.next() {
                    current.push(next);
                }
            }
            other => {
                in_token = true;
                current.push(other);
            }
        }
    }

    if in_token {
        tokens.push(current);
    }

    tokens
}

/// Inverse of [`parse_argv`]. Quotes any token containing whitespace, an
/// empty string, or a quote character; escapes embedded double quotes.
pub fn format_argv(tokens: &[String]) -> String {
    tokens
        .iter()
        .map(|t| format_token(t))
        .collect::<Vec<_>>()
        .join(" ")
}

fn format_token(token: &str) -> String {
    let needs_quoting = token.is_empty()
        || token
            .chars()
            .any(|c| c.is_whitespace() || c == '"' || c == '\'' || c == '\\');

    if !needs_quoting {
        return token.to_string();
    }

    let mut out = String::with_capacity(token.len() + 2);
    out.push('"');
    for c in token.chars() {
        if c == '"' || c == '\\' {
            out.push('\\');
        }
        out.push(c);
    }
    out.push('"');
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn parses_double_quoted_escaped_quote() {
        let got = parse_argv(r#"git log --grep "He said \"hello\"""#);
        assert_eq!(
            got,
            vec!["git", "log", "--grep", "He said \"hello\""]
                .into_iter()
                .map(String::from)
                .collect::<Vec<_>>()
        );
    }

    #[test]
    fn parses_empty_single_quoted_token() {
        let got = parse_argv("git diff ''");
        assert_eq!(got, vec!["git", "diff", ""]);
    }

    #[test]
    fn parses_empty_double_quoted_token() {
        let got = parse_argv(r#"git diff """#);
        assert_eq!(got, vec!["git", "diff", ""]);
    }

    #[test]
    fn default_diff_argv() {
        assert_eq!(parse_argv("HEAD~1"), vec!["HEAD~1"]);
    }

    #[test]
    fn format_quotes_whitespace_and_empty() {
        let tokens = vec!["git".to_string(), "".to_string(), "a b".to_string()];
        let formatted = format_argv(&tokens);
        assert_eq!(formatted, r#"git "" "a b""#);
        assert_eq!(parse_argv(&formatted), tokens);
    }

    #[test]
    fn format_escapes_embedded_quotes() {
        let tokens = vec!["He said \"hi\"".to_string()];
        let formatted = format_argv(&tokens);
        assert_eq!(parse_argv(&formatted), tokens);
    }

    proptest! {
        #[test]
        fn round_trip(tokens in prop::collection::vec(
            "[ -~]{0,12}", // printable ASCII, including empty strings
            0..8,
        )) {
            let formatted = format_argv(&tokens);
            prop_assert_eq!(parse_argv(&formatted), tokens);
        }
    }
}
