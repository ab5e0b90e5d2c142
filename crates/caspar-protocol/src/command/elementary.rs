//! A single verb with its arguments: the unit the server answers to.

use std::fmt;
use std::str::FromStr;

use super::LINE_END;
use super::codec::{render_line, tokenize};
use crate::error::SyntaxError;

/// One protocol line: a verb followed by its ordered arguments.
///
/// Every elementary command that leaves the client is answered by exactly
/// one status line, which is why batches are split into elementaries before
/// waiters are registered.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Elementary {
    verb: String,
    args: Vec<String>,
}

impl Elementary {
    /// Builds a command from a verb and its arguments.
    ///
    /// # Errors
    ///
    /// Returns a [`SyntaxError`] when the verb is empty, contains whitespace
    /// or a line break, or starts with a quote.
    pub fn new<V, I, A>(verb: V, args: I) -> Result<Self, SyntaxError>
    where
        V: Into<String>,
        I: IntoIterator<Item = A>,
        A: Into<String>,
    {
        let verb_text = verb.into();
        validate_verb(&verb_text)?;
        Ok(Self {
            verb: verb_text,
            args: args.into_iter().map(Into::into).collect(),
        })
    }

    /// Parses one line of command text.
    ///
    /// A single trailing line terminator is accepted and ignored.
    ///
    /// # Errors
    ///
    /// Returns [`SyntaxError::LineBreak`] when the text holds more than one
    /// line, [`SyntaxError::EmptyCommand`] for blank input,
    /// [`SyntaxError::QuotedVerb`] when the verb is quoted, and
    /// [`SyntaxError::UnterminatedQuote`] for an unclosed argument.
    pub fn parse(text: &str) -> Result<Self, SyntaxError> {
        let line = text.strip_suffix(LINE_END).unwrap_or(text);
        if line.contains(['\r', '\n']) {
            return Err(SyntaxError::LineBreak);
        }
        if line.is_empty() {
            return Err(SyntaxError::EmptyCommand);
        }
        if line.starts_with('"') {
            return Err(SyntaxError::QuotedVerb);
        }

        let mut tokens = tokenize(line)?.into_iter();
        let verb = tokens.next().ok_or(SyntaxError::EmptyCommand)?;
        Self::new(verb, tokens)
    }

    /// Command verb as written.
    #[must_use]
    pub fn verb(&self) -> &str {
        &self.verb
    }

    /// Upper-cased verb used to correlate responses.
    #[must_use]
    pub fn verb_key(&self) -> String {
        self.verb.to_ascii_uppercase()
    }

    /// Ordered arguments.
    #[must_use]
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// Serialises the command, including the line terminator.
    #[must_use]
    pub fn to_wire(&self) -> String {
        render_line(&self.verb, self.args.iter().map(String::as_str))
    }
}

impl fmt::Display for Elementary {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let wire = self.to_wire();
        formatter.write_str(wire.trim_end_matches(LINE_END))
    }
}

impl FromStr for Elementary {
    type Err = SyntaxError;

    fn from_str(text: &str) -> Result<Self, Self::Err> {
        Self::parse(text)
    }
}

pub(crate) fn validate_verb(verb: &str) -> Result<(), SyntaxError> {
    if verb.is_empty() {
        return Err(SyntaxError::EmptyCommand);
    }
    if verb.contains(['\r', '\n']) {
        return Err(SyntaxError::LineBreak);
    }
    if verb.starts_with('"') {
        return Err(SyntaxError::QuotedVerb);
    }
    if verb.chars().any(char::is_whitespace) {
        return Err(SyntaxError::InvalidVerb {
            verb: verb.to_owned(),
        });
    }
    Ok(())
}

/// Splits a buffer holding several command lines into elementaries.
///
/// Empty lines are discarded; every remaining line is parsed on its own.
///
/// # Errors
///
/// Returns the first [`SyntaxError`] raised by [`Elementary::parse`].
pub fn interpret(buffer: &str) -> Result<Vec<Elementary>, SyntaxError> {
    buffer
        .split(LINE_END)
        .filter(|line| !line.is_empty())
        .map(Elementary::parse)
        .collect()
}
