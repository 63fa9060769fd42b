//! Source preprocessing
//!
//! Blanks out comments so the declaration parser never sees them, keeping
//! every byte offset and line break where it was so diagnostics still point
//! into the original text.

use octofhir_refresh_diagnostics::{Diagnostic, REF0003, REF0004, Span};

#[derive(Clone, Copy, PartialEq, Eq)]
enum State {
    Code,
    LineComment,
    BlockComment,
    String,
    QuotedIdentifier,
    BacktickIdentifier,
}

/// Strip comments, reporting unterminated strings and quoted identifiers
pub fn preprocess(source: &str) -> Result<String, Vec<Diagnostic>> {
    let mut out = String::with_capacity(source.len());
    let mut state = State::Code;
    let mut opened_at = 0usize;
    let mut chars = source.char_indices().peekable();

    while let Some((pos, c)) = chars.next() {
        match state {
            State::Code => match c {
                '/' if chars.peek().map(|(_, n)| *n) == Some('/') => {
                    state = State::LineComment;
                    out.push(' ');
                }
                '/' if chars.peek().map(|(_, n)| *n) == Some('*') => {
                    chars.next();
                    state = State::BlockComment;
                    out.push_str("  ");
                }
                '\'' | '"' | '`' => {
                    state = match c {
                        '\'' => State::String,
                        '"' => State::QuotedIdentifier,
                        _ => State::BacktickIdentifier,
                    };
                    opened_at = pos;
                    out.push(c);
                }
                _ => out.push(c),
            },
            State::LineComment => {
                if c == '\n' {
                    state = State::Code;
                    out.push('\n');
                } else {
                    blank(&mut out, c);
                }
            }
            State::BlockComment => {
                if c == '*' && chars.peek().map(|(_, n)| *n) == Some('/') {
                    chars.next();
                    state = State::Code;
                    out.push_str("  ");
                } else {
                    blank(&mut out, c);
                }
            }
            State::String | State::QuotedIdentifier | State::BacktickIdentifier => {
                out.push(c);
                if c == '\\' {
                    if let Some((_, escaped)) = chars.next() {
                        out.push(escaped);
                    }
                    continue;
                }
                let closes = matches!(
                    (state, c),
                    (State::String, '\'')
                        | (State::QuotedIdentifier, '"')
                        | (State::BacktickIdentifier, '`')
                );
                if closes {
                    state = State::Code;
                }
            }
        }
    }

    let unterminated = match state {
        State::String => Some((REF0003, "Unterminated string literal")),
        State::QuotedIdentifier | State::BacktickIdentifier => {
            Some((REF0004, "Unterminated quoted identifier"))
        }
        _ => None,
    };
    match unterminated {
        Some((code, message)) => {
            let end = line_end(source, opened_at);
            Err(vec![
                Diagnostic::error(code, message).with_span(Span::new(opened_at, end), source),
            ])
        }
        None => Ok(out),
    }
}

/// Replace single-quoted string contents with spaces, keeping the quotes
pub fn blank_strings(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut in_string = false;
    let mut escaped = false;
    for c in text.chars() {
        if in_string {
            if escaped {
                escaped = false;
                blank(&mut out, c);
            } else if c == '\\' {
                escaped = true;
                out.push(' ');
            } else if c == '\'' {
                in_string = false;
                out.push(c);
            } else {
                blank(&mut out, c);
            }
        } else {
            if c == '\'' {
                in_string = true;
            }
            out.push(c);
        }
    }
    out
}

/// Keep byte length and line breaks of a blanked character
fn blank(out: &mut String, c: char) {
    if c == '\n' {
        out.push('\n');
    } else {
        out.extend(std::iter::repeat_n(' ', c.len_utf8()));
    }
}

fn line_end(source: &str, from: usize) -> usize {
    source[from..]
        .find('\n')
        .map(|i| from + i)
        .unwrap_or(source.len())
}
