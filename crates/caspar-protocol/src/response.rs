//! Status lines from the server and the framer that assembles them.
//!
//! Inbound text arrives in arbitrary chunks. The framer buffers the trailing
//! partial line, and when a status line's payload has not fully arrived it
//! keeps that status line and everything after it for the next chunk.

use tracing::warn;

use crate::command::LINE_END;

pub(crate) const FRAMER_TARGET: &str = "caspar_protocol::framer";

/// One decoded server response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Response {
    /// Three-digit status code.
    pub code: u16,
    /// Verb echoed by the server; absent for codes 400 and 500.
    pub verb: Option<String>,
    /// Payload lines following the status line.
    pub data: Vec<String>,
}

impl Response {
    /// Returns `true` for 2xx codes.
    #[must_use]
    pub const fn is_success(&self) -> bool {
        self.code >= 200 && self.code < 300
    }

    /// Returns `true` for codes below 200, which never settle a request.
    #[must_use]
    pub const fn is_informational(&self) -> bool {
        self.code < 200
    }

    /// Upper-cased verb used to correlate the response.
    #[must_use]
    pub fn verb_key(&self) -> Option<String> {
        self.verb.as_deref().map(str::to_ascii_uppercase)
    }
}

/// Outcome of reading the payload that belongs to one status line.
#[derive(Debug, PartialEq, Eq)]
enum PayloadRead {
    /// The payload is complete; `consumed` counts the status line, payload
    /// lines, and any terminator.
    Complete { data: Vec<String>, consumed: usize },
    /// Not enough lines are buffered yet.
    Incomplete,
}

/// Incremental decoder for the response stream.
#[derive(Debug, Default)]
pub struct ResponseFramer {
    pending: String,
}

impl ResponseFramer {
    /// Creates an empty framer.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `chunk` and returns every response that is now complete.
    pub fn push(&mut self, chunk: &str) -> Vec<Response> {
        self.pending.push_str(chunk);
        let buffered = std::mem::take(&mut self.pending);

        let mut lines: Vec<&str> = buffered.split(LINE_END).collect();
        let partial = lines.pop().unwrap_or_default();
        let mut responses = Vec::new();
        let mut cursor = 0;

        while let Some(window) = lines.get(cursor..) {
            let Some((line, following)) = window.split_first() else {
                break;
            };
            if line.is_empty() {
                cursor += 1;
                continue;
            }
            let Some((code, verb)) = parse_status(line) else {
                warn!(target: FRAMER_TARGET, line = %line, "skipping malformed status line");
                cursor += 1;
                continue;
            };
            match read_payload(code, following) {
                PayloadRead::Complete { data, consumed } => {
                    responses.push(Response { code, verb, data });
                    cursor += consumed;
                }
                PayloadRead::Incomplete => {
                    self.pending = window.join(LINE_END);
                    self.pending.push_str(LINE_END);
                    break;
                }
            }
        }

        self.pending.push_str(partial);
        responses
    }

    /// Returns `true` when text is waiting for more input.
    #[must_use]
    pub fn has_pending(&self) -> bool {
        !self.pending.is_empty()
    }
}

/// Splits a status line into its code and, where the code carries one, verb.
fn parse_status(line: &str) -> Option<(u16, Option<String>)> {
    let (code_text, rest) = line.split_once(' ').unwrap_or((line, ""));
    if code_text.len() != 3 || !code_text.bytes().all(|byte| byte.is_ascii_digit()) {
        return None;
    }
    let code = code_text.parse().ok()?;
    let verb = if matches!(code, 400 | 500) {
        None
    } else {
        rest.split(' ')
            .next()
            .filter(|verb| !verb.is_empty())
            .map(str::to_owned)
    };
    Some((code, verb))
}

/// Reads the payload that follows a status line with `code`.
fn read_payload(code: u16, following: &[&str]) -> PayloadRead {
    match code {
        101 | 201 | 400 => following.first().map_or(PayloadRead::Incomplete, |line| {
            PayloadRead::Complete {
                data: vec![(*line).to_owned()],
                consumed: 2,
            }
        }),
        200 => following
            .iter()
            .position(|line| line.is_empty())
            .map_or(PayloadRead::Incomplete, |end| {
                let data = following
                    .iter()
                    .take(end)
                    .map(|line| (*line).to_owned())
                    .collect();
                PayloadRead::Complete {
                    data,
                    consumed: end + 2,
                }
            }),
        _ => PayloadRead::Complete {
            data: Vec::new(),
            consumed: 1,
        },
    }
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    fn response(code: u16, verb: Option<&str>, data: &[&str]) -> Response {
        Response {
            code,
            verb: verb.map(str::to_owned),
            data: data.iter().map(|line| (*line).to_owned()).collect(),
        }
    }

    #[test]
    fn bodiless_success() {
        let mut framer = ResponseFramer::new();
        assert_eq!(
            framer.push("202 PLAY OK\r\n"),
            vec![response(202, Some("PLAY"), &[])]
        );
        assert!(!framer.has_pending());
    }

    #[test]
    fn multi_line_payload_consumes_terminator() {
        let read = read_payload(200, &["foo", "bar", "", "202 PLAY OK"]);
        assert_eq!(
            read,
            PayloadRead::Complete {
                data: vec!["foo".to_owned(), "bar".to_owned()],
                consumed: 4,
            }
        );

        let mut framer = ResponseFramer::new();
        assert_eq!(
            framer.push("200 INFO OK\r\nfoo\r\nbar\r\n\r\n"),
            vec![response(200, Some("INFO"), &["foo", "bar"])]
        );
    }

    #[rstest]
    #[case(101, "101 INFO\r\nstarting\r\n", Some("INFO"))]
    #[case(201, "201 DATA RETRIEVE OK\r\n<xml/>\r\n", Some("DATA"))]
    #[case(400, "400 ERROR\r\nINFO 99 BOGUS\r\n", None)]
    fn single_payload_line(#[case] code: u16, #[case] text: &str, #[case] verb: Option<&str>) {
        let mut framer = ResponseFramer::new();
        let responses = framer.push(text);
        assert_eq!(responses.len(), 1);
        let first = responses.first().expect("one response");
        assert_eq!(first.code, code);
        assert_eq!(first.verb.as_deref(), verb);
        assert_eq!(first.data.len(), 1);
    }

    #[test]
    fn server_error_carries_no_verb() {
        let mut framer = ResponseFramer::new();
        assert_eq!(
            framer.push("500 FAILED\r\n"),
            vec![response(500, None, &[])]
        );
    }

    #[test]
    fn partial_line_is_held_until_completed() {
        let mut framer = ResponseFramer::new();
        assert!(framer.push("202 PL").is_empty());
        assert!(framer.has_pending());
        assert_eq!(
            framer.push("AY OK\r\n"),
            vec![response(202, Some("PLAY"), &[])]
        );
    }

    #[test]
    fn incomplete_payload_is_rebuffered_with_following_lines() {
        let mut framer = ResponseFramer::new();
        assert!(framer.push("200 TLS OK\r\nAMB\r\n").is_empty());
        assert!(framer.push("CG/LOWER").is_empty());

        let responses = framer.push("\r\n\r\n202 PLAY OK\r\n");
        assert_eq!(
            responses,
            vec![
                response(200, Some("TLS"), &["AMB", "CG/LOWER"]),
                response(202, Some("PLAY"), &[]),
            ]
        );
        assert!(!framer.has_pending());
    }

    #[test]
    fn single_payload_split_across_chunks() {
        let mut framer = ResponseFramer::new();
        assert!(framer.push("201 DATA OK\r\n").is_empty());
        assert_eq!(
            framer.push("payload\r\n"),
            vec![response(201, Some("DATA"), &["payload"])]
        );
    }

    #[test]
    fn malformed_and_blank_lines_are_skipped() {
        let mut framer = ResponseFramer::new();
        assert_eq!(
            framer.push("\r\nhello there\r\n20 SHORT\r\n202 CLEAR OK\r\n"),
            vec![response(202, Some("CLEAR"), &[])]
        );
    }

    #[test]
    fn success_classification() {
        assert!(response(202, Some("PLAY"), &[]).is_success());
        assert!(!response(404, Some("PLAY"), &[]).is_success());
        assert!(response(101, Some("INFO"), &[]).is_informational());
        assert_eq!(
            response(202, Some("play"), &[]).verb_key().as_deref(),
            Some("PLAY")
        );
    }
}
