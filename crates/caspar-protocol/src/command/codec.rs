//! Argument quoting and tokenisation for the line protocol.
//!
//! Arguments without whitespace travel as bare tokens. Anything else is
//! wrapped in double quotes with a minimal escape set. On the way back in, a
//! line is split on single spaces and a run of tokens opened by a quote is
//! merged until a token ends in an unescaped quote: a closing quote preceded
//! by an even number of backslashes ends the run, an odd number escapes it.

use std::borrow::Cow;

use super::LINE_END;
use crate::error::SyntaxError;

/// Encodes one argument for the wire.
pub(crate) fn encode_argument(argument: &str) -> Cow<'_, str> {
    if needs_quoting(argument) {
        Cow::Owned(quote(argument))
    } else {
        Cow::Borrowed(argument)
    }
}

fn needs_quoting(argument: &str) -> bool {
    argument.is_empty() || argument.starts_with('"') || argument.chars().any(char::is_whitespace)
}

fn quote(argument: &str) -> String {
    let mut quoted = String::with_capacity(argument.len() + 2);
    quoted.push('"');
    for character in argument.chars() {
        match character {
            '\\' => quoted.push_str("\\\\"),
            '"' => quoted.push_str("\\\""),
            '\n' => quoted.push_str("\\n"),
            '\r' => quoted.push_str("\\r"),
            '\t' => quoted.push_str("\\t"),
            other => quoted.push(other),
        }
    }
    quoted.push('"');
    quoted
}

/// Renders `<verb> <args...>` followed by the line terminator.
pub(crate) fn render_line<'a>(verb: &str, arguments: impl IntoIterator<Item = &'a str>) -> String {
    let mut line = String::from(verb);
    for argument in arguments {
        line.push(' ');
        line.push_str(&encode_argument(argument));
    }
    line.push_str(LINE_END);
    line
}

/// Splits a single line into tokens, merging and decoding quoted runs.
///
/// Bare tokens are returned verbatim, including the empty tokens produced by
/// consecutive spaces.
///
/// # Errors
///
/// Returns [`SyntaxError::UnterminatedQuote`] when a quoted run never closes.
pub fn tokenize(line: &str) -> Result<Vec<String>, SyntaxError> {
    let mut tokens = Vec::new();
    let mut run: Option<String> = None;

    for token in line.split(' ') {
        if let Some(mut buffer) = run.take() {
            buffer.push(' ');
            buffer.push_str(token);
            if closes_run(token, false) {
                tokens.push(decode_quoted(&buffer));
            } else {
                run = Some(buffer);
            }
        } else if token.starts_with('"') {
            if closes_run(token, true) {
                tokens.push(decode_quoted(token));
            } else {
                run = Some(token.to_owned());
            }
        } else {
            tokens.push(token.to_owned());
        }
    }

    if run.is_some() {
        return Err(SyntaxError::UnterminatedQuote {
            command: line.to_owned(),
        });
    }
    Ok(tokens)
}

/// Returns `true` when `token` ends a quoted run.
///
/// The opening quote of the first token of a run never counts as its closing
/// quote.
fn closes_run(token: &str, opening: bool) -> bool {
    let body = if opening {
        token.strip_prefix('"').unwrap_or(token)
    } else {
        token
    };
    let Some(inner) = body.strip_suffix('"') else {
        return false;
    };
    let escapes = inner.chars().rev().take_while(|c| *c == '\\').count();
    escapes.is_multiple_of(2)
}

/// Strips the surrounding quotes of a run and resolves escapes.
///
/// Unknown escape sequences are kept verbatim so Windows paths such as
/// `"C:\some clip.mp4"` survive.
fn decode_quoted(run: &str) -> String {
    let opened = run.strip_prefix('"').unwrap_or(run);
    let inner = opened.strip_suffix('"').unwrap_or(opened);

    let mut decoded = String::with_capacity(inner.len());
    let mut characters = inner.chars();
    while let Some(character) = characters.next() {
        if character != '\\' {
            decoded.push(character);
            continue;
        }
        match characters.next() {
            Some('"') => decoded.push('"'),
            Some('\\') => decoded.push('\\'),
            Some('/') => decoded.push('/'),
            Some('n') => decoded.push('\n'),
            Some('r') => decoded.push('\r'),
            Some('t') => decoded.push('\t'),
            Some(other) => {
                decoded.push('\\');
                decoded.push(other);
            }
            None => decoded.push('\\'),
        }
    }
    decoded
}
