//! Unit tests for the CLI runtime.

use std::ffi::OsString;
use std::io::{BufRead, BufReader, Write};
use std::net::TcpListener;
use std::thread::{self, JoinHandle};

use caspar_config::{LogFormat, ServerEndpoint};
use caspar_protocol::Response;
use clap::Parser;
use rstest::rstest;

use super::*;

fn args(values: &[&str]) -> Vec<OsString> {
    std::iter::once("casparctl")
        .chain(values.iter().copied())
        .map(OsString::from)
        .collect()
}

struct Outcome {
    code: ExitCode,
    stdout: String,
    stderr: String,
}

fn invoke(values: &[&str]) -> Outcome {
    let mut stdout = Vec::new();
    let mut stderr = Vec::new();
    let code = run(args(values), &mut stdout, &mut stderr);
    Outcome {
        code,
        stdout: String::from_utf8(stdout).expect("utf-8 stdout"),
        stderr: String::from_utf8(stderr).expect("utf-8 stderr"),
    }
}

/// Accepts one connection and answers each received line with the next
/// reply, then waits for the client to hang up.
fn fake_server(replies: Vec<&'static str>) -> (u16, JoinHandle<Vec<String>>) {
    let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
    let port = listener.local_addr().expect("local address").port();
    let handle = thread::spawn(move || {
        let (stream, _) = listener.accept().expect("accept client");
        let mut reader = BufReader::new(stream.try_clone().expect("clone stream"));
        let mut writer = stream;
        let mut received = Vec::new();
        for reply in replies {
            let mut line = String::new();
            if reader.read_line(&mut line).expect("read command") == 0 {
                break;
            }
            received.push(line.trim_end().to_owned());
            writer.write_all(reply.as_bytes()).expect("write reply");
        }
        let mut rest = String::new();
        while reader.read_line(&mut rest).unwrap_or(0) != 0 {
            rest.clear();
        }
        received
    });
    (port, handle)
}

#[rstest]
fn flags_become_overrides() {
    let cli = Cli::try_parse_from(args(&[
        "--host",
        "playout.local",
        "--port",
        "5251",
        "--timeout-ms",
        "250",
        "--log-filter",
        "debug",
        "--log-format",
        "JSON",
        "INFO",
    ]))
    .expect("valid arguments");

    let overrides = cli.overrides();

    assert_eq!(overrides.host.as_deref(), Some("playout.local"));
    assert_eq!(overrides.port, Some(5251));
    assert_eq!(overrides.request_timeout_ms, Some(250));
    assert_eq!(overrides.log_filter.as_deref(), Some("debug"));
    assert_eq!(overrides.log_format, Some(LogFormat::Json));
    assert_eq!(cli.commands, ["INFO"]);
}

#[rstest]
#[case(&[], true)]
#[case(&["INFO"], false)]
#[case(&["--templates"], false)]
fn emptiness(#[case] values: &[&str], #[case] expected: bool) {
    let cli = Cli::try_parse_from(args(values)).expect("valid arguments");
    assert_eq!(cli.is_empty(), expected);
}

#[rstest]
fn bare_invocation_fails() {
    let outcome = invoke(&[]);

    assert_eq!(outcome.code, ExitCode::FAILURE);
    assert!(outcome.stderr.contains("nothing to do"));
}

#[rstest]
fn help_goes_to_stdout() {
    let outcome = invoke(&["--help"]);

    assert_eq!(outcome.code, ExitCode::SUCCESS);
    assert!(outcome.stdout.contains("casparctl"));
    assert!(outcome.stderr.is_empty());
}

#[rstest]
#[case("\"PLAY\" 1-10")]
#[case("PLAY 1-10 \"unterminated")]
fn malformed_command_fails_before_connecting(#[case] line: &str) {
    let outcome = invoke(&["--port", "1", line]);

    assert_eq!(outcome.code, ExitCode::FAILURE);
    assert!(outcome.stderr.contains("invalid command"), "{}", outcome.stderr);
}

#[rstest]
fn server_flag_sets_the_endpoint() {
    let cli = Cli::try_parse_from(args(&["--server", "tcp://playout.local:6250", "INFO"]))
        .expect("valid arguments");

    assert_eq!(
        cli.overrides().server,
        Some(ServerEndpoint::new("playout.local", 6250))
    );
}

#[rstest]
#[case("udp://playout.local:6250")]
#[case("playout.local")]
fn unusable_server_flag_is_a_usage_error(#[case] endpoint: &str) {
    let outcome = invoke(&["--server", endpoint, "INFO"]);

    assert_eq!(outcome.code, ExitCode::FAILURE);
    assert!(outcome.stderr.contains("--server"), "{}", outcome.stderr);
    assert!(outcome.stdout.is_empty());
}

#[rstest]
fn invalid_log_filter_fails_before_connecting() {
    let outcome = invoke(&["--port", "1", "--log-filter", "caspar_protocol=loud", "INFO"]);

    assert_eq!(outcome.code, ExitCode::FAILURE);
    assert!(outcome.stderr.contains("invalid log filter"), "{}", outcome.stderr);
}

#[rstest]
fn missing_configuration_file_is_reported() {
    let outcome = invoke(&["--config", "/nonexistent/casparctl.toml", "INFO"]);

    assert_eq!(outcome.code, ExitCode::FAILURE);
    assert!(outcome.stderr.contains("failed to load configuration"));
}

#[rstest]
fn refused_connection_is_reported() {
    let port = {
        let listener = TcpListener::bind("127.0.0.1:0").expect("bind listener");
        listener.local_addr().expect("local address").port()
    };
    let outcome = invoke(&["--port", &port.to_string(), "INFO"]);

    assert_eq!(outcome.code, ExitCode::FAILURE);
    assert!(outcome.stderr.contains("failed to connect"));
}

#[rstest]
fn commands_run_in_order_and_print_replies() {
    let (port, server) = fake_server(vec![
        "200 INFO OK\r\n1 720p5000 PLAYING\r\n\r\n",
        "202 PLAY OK\r\n",
    ]);

    let outcome = invoke(&["--port", &port.to_string(), "INFO", "PLAY 1-10 \"my clip\""]);

    assert_eq!(outcome.code, ExitCode::SUCCESS, "{}", outcome.stderr);
    assert_eq!(outcome.stdout, "200 INFO\n1 720p5000 PLAYING\n202 PLAY\n");
    assert_eq!(
        server.join().expect("server thread"),
        ["INFO", "PLAY 1-10 \"my clip\""]
    );
}

#[rstest]
fn server_flag_selects_the_connection() {
    let (port, server) = fake_server(vec!["201 INFO OK\r\n1 720p5000 PLAYING\r\n"]);

    let outcome = invoke(&["--server", &format!("tcp://127.0.0.1:{port}"), "INFO"]);

    assert_eq!(outcome.code, ExitCode::SUCCESS, "{}", outcome.stderr);
    assert_eq!(outcome.stdout, "201 INFO\n1 720p5000 PLAYING\n");
    assert_eq!(server.join().expect("server thread"), ["INFO"]);
}

#[rstest]
fn refused_command_fails() {
    let (port, server) = fake_server(vec!["404 PLAY FAILED\r\n"]);

    let outcome = invoke(&["--port", &port.to_string(), "PLAY 1-10 MISSING"]);

    assert_eq!(outcome.code, ExitCode::FAILURE);
    assert!(outcome.stderr.contains("command failed"));
    assert!(outcome.stdout.is_empty());
    server.join().expect("server thread");
}

#[rstest]
fn unanswered_command_times_out() {
    let (port, server) = fake_server(vec![""]);

    let outcome = invoke(&["--port", &port.to_string(), "--timeout-ms", "100", "INFO"]);

    assert_eq!(outcome.code, ExitCode::FAILURE);
    assert!(outcome.stderr.contains("command failed"));
    server.join().expect("server thread");
}

#[rstest]
fn templates_are_listed() {
    let (port, server) = fake_server(vec![
        "200 TLS OK\r\n\"LOWER/NAME\" 1024 20240101120000 HTML\r\nCLOCK.ft 2048 20240101120000 FLASH\r\n\r\n",
    ]);

    let outcome = invoke(&["--port", &port.to_string(), "--templates"]);

    assert_eq!(outcome.code, ExitCode::SUCCESS, "{}", outcome.stderr);
    assert_eq!(
        outcome.stdout,
        "LOWER/NAME\thtml\tLOWER/NAME\nCLOCK\tflash\tCLOCK.ft\n"
    );
    assert_eq!(server.join().expect("server thread"), ["TLS"]);
}

#[rstest]
fn response_without_verb_prints_code_only() {
    let mut out = Vec::new();
    let response = Response {
        code: 400,
        verb: None,
        data: vec!["BOGUS".to_owned()],
    };

    session::write_response(&mut out, &response).expect("in-memory write");

    assert_eq!(out, b"400\nBOGUS\n");
}
